use clap::Parser;
use tracing::debug;

use tax_cli::app::{self, Cli};
use tax_cli::logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref(), cli.log_file.as_deref())?;

    debug!("running {:?}", cli.command);
    let output = app::run(&cli)?;
    print!("{output}");

    Ok(())
}
