use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::Assistant;
use crate::infrastructure::AppConfig;

/// The assistant holds a single conversation, so requests take turns on it.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Mutex<Assistant>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(assistant: Assistant, config: AppConfig) -> Self {
        Self {
            assistant: Arc::new(Mutex::new(assistant)),
            config: Arc::new(config),
        }
    }

    /// Only chat requests hold the lock, and they need a ready assistant, so
    /// a busy assistant counts as ready.
    pub fn is_ready(&self) -> bool {
        match self.assistant.try_lock() {
            Ok(assistant) => assistant.is_ready(),
            Err(_) => true,
        }
    }
}
