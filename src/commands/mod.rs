//! CLI command handlers.

mod download;
pub(crate) mod init;
mod purge;
mod search;
mod stats;

pub use download::run_download_command;
pub use init::run_init_command;
pub use purge::run_purge_command;
pub use search::run_search_command;
pub use stats::run_stats_command;
