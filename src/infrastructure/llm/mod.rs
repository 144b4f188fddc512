mod provider;

pub use provider::RigLlm;
