use anyhow::Context;
use std::path::Path;
use traintrack_core::config::{Config, WarnLevel};
use traintrack_server::AppState;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => tracing::error!("{}", w.message),
        }
    }

    let port = port.unwrap_or(config.server.port);
    let secret = config.auth.secret_from_env();
    let state = AppState::open(root, config, secret)
        .with_context(|| format!("failed to open data root {}", root.display()))?;

    tracing::info!(root = %root.display(), "serving TrainTrack");
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(traintrack_server::serve(state, port))
}
