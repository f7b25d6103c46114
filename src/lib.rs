//! Transactional multi-file edits.
//!
//! A batch of file creations, modifications, deletions and renames is
//! staged in a [`ops::TransactionManager`] and applied as one unit: either
//! every operation succeeds, or the ones already applied are undone from
//! backups captured when they were staged.

pub mod cli;
pub mod command;
pub mod error;
pub mod ops;
pub mod validation;

pub use error::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> Result<()> {
    use clap::Parser;
    use command::Command;

    let cli = cli::Cli::parse();

    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level()),
    )
    .format_timestamp(None)
    .try_init();

    match cli.command {
        Command::Apply(args) => command::apply::execute(args),
    }
}
