use std::process::ExitCode;

use clap::Parser;
use protover::LayoutError;
use protover_cli::{init_tracing, run, Cli, CliConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(err);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> anyhow::Result<String> {
    let config = CliConfig::load(cli.config.as_deref())?;
    init_tracing(config.max_level(cli.log_level.as_deref())?)?;
    run(&cli.command, &config)
}

fn report(err: anyhow::Error) {
    match err.downcast::<LayoutError>() {
        Ok(layout) => eprintln!("{:?}", miette::Report::new(layout)),
        Err(other) => eprintln!("error: {other:?}"),
    }
}
