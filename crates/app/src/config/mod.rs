//! Configuration
//!
//! Every setting can come from a flag or an environment variable; a `.env`
//! file in the working directory is read first when present.

use clap::Args;

use crate::config::{
    api::ApiConfig, logging::LoggingConfig, storage::StorageConfig, sync::SyncConfig,
};

pub mod api;
pub mod logging;
pub mod storage;
pub mod sync;

pub use logging::LogFormat;
pub use sync::MergeMatchArg;

/// Settings shared by every command.
#[derive(Debug, Args)]
pub struct CartConfig {
    /// Storefront API settings.
    #[command(flatten)]
    pub api: ApiConfig,

    /// Local snapshot settings.
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Reconciliation settings.
    #[command(flatten)]
    pub sync: SyncConfig,
}

/// Load `.env` if present. Missing files are ignored.
pub fn load_dotenv() {
    _ = dotenvy::dotenv();
}
