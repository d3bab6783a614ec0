//! Storage Config

use std::path::PathBuf;

use clap::Args;

/// Where client-local state is kept between runs.
#[derive(Debug, Args)]
pub struct StorageConfig {
    /// Directory holding the stored cart id and customer token
    #[arg(long, env = "TROLLEY_STATE_DIR", default_value = ".trolley")]
    pub state_dir: PathBuf,
}
