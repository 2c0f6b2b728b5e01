//! Command implementations for the CLI.

mod alias;
mod clock;
mod config;
mod read;
mod reset;
mod scan;
mod set;
mod settings;
mod watch;

pub use alias::cmd_alias;
pub use clock::cmd_clock;
pub use config::cmd_config;
pub use read::{ReadArgs, cmd_read};
pub use reset::cmd_reset;
pub use scan::cmd_scan;
pub use set::cmd_set;
pub use settings::cmd_settings;
pub use watch::{WatchArgs, cmd_watch};
