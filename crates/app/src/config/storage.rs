//! Storage Config

use std::path::PathBuf;

use clap::Args;

/// Local snapshot settings.
#[derive(Debug, Args)]
pub struct StorageConfig {
    /// Directory holding the cart snapshot
    #[arg(long, env = "CART_STORAGE_DIR", default_value = ".duka-cart")]
    pub storage_dir: PathBuf,

    /// Key the snapshot is stored under
    #[arg(long, env = "CART_STORAGE_KEY", default_value = "cart")]
    pub storage_key: String,
}
