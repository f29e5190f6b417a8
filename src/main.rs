//! viewstats CLI entry point.

use viewstats::cli::{self, Cli};
use viewstats::core::Result;

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli)
}
