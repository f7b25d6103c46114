pub mod apply;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Apply a batch of file operations as one transaction.
    Apply(apply::ApplyArgs),
}
