use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use kyb_config::KybConfig;
use kyb_db::KybService;
use kyb_monitor::{Monitor, Scheduler};
use kyb_registry::AdapterRegistry;

use crate::cli::GlobalFlags;

/// Load configuration, honoring `--config-dir` and a `.env` file next to it.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<KybConfig> {
    let config = match flags.config_dir.as_deref() {
        Some(dir) => {
            load_dotenv(&Path::new(dir).join(".env"))?;
            KybConfig::load_from(Path::new(dir))
                .with_context(|| format!("failed to load configuration from {dir}"))?
        }
        None => KybConfig::load_with_dotenv().context("failed to load configuration")?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_dotenv(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        dotenvy::from_path(path)
            .with_context(|| format!("failed to load dotenv file at {}", path.display()))?;
    }
    Ok(())
}

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub monitor: Arc<Monitor>,
    pub scheduler: Scheduler,
}

impl AppContext {
    pub async fn init(config: KybConfig) -> anyhow::Result<Self> {
        let service = KybService::open(&config.database)
            .await
            .context("failed to open the kyb database")?;
        let adapters = AdapterRegistry::from_config(&config.sources, &config.matching)
            .context("failed to build registry clients")?;
        tracing::debug!(sources = ?adapters.sources(), "registry adapters ready");

        let monitor = Arc::new(Monitor::new(Arc::new(service), adapters, config));
        let scheduler = Scheduler::new(Arc::clone(&monitor));
        Ok(Self { monitor, scheduler })
    }
}
