use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workspace_assistant::api::{create_router, AppState};
use workspace_assistant::infrastructure::{build_assistant, AppConfig, AppMode, LogFormat, RigLlm};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.config.log_format);

    let llm = Arc::new(RigLlm::from_config(&config.config.llm));
    let mut assistant = build_assistant(&config, llm)?;
    assistant
        .initialize()
        .await
        .context("failed to initialize the assistant")?;

    match config.config.mode {
        AppMode::Chat => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            workspace_assistant::cli::run(&mut assistant, stdin, &mut stdout).await?;
        }
        AppMode::Api => {
            let server = &config.config.server;
            let addr = SocketAddr::new(server.host.parse()?, server.port);
            let app = create_router(AppState::new(assistant, config));

            info!("API server listening on {}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "workspace_assistant=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    // stdout belongs to the terminal chat.
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => registry.with(layer).init(),
        LogFormat::Json => registry.with(layer.json()).init(),
    }
}
