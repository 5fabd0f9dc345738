use check_power::check;
use check_power::cli::Cli;
use check_power::Status;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode, anyhow::Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors must not exit with 2, which means CRITICAL.
            let code = if e.use_stderr() {
                Status::Unknown.exit_code()
            } else {
                0
            };
            let _ = e.print();
            return Ok(ExitCode::from(code));
        }
    };

    let debug = cli.debug;
    let default_filter = if debug { "check_power=debug" } else { "off" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let settings = match cli.into_settings() {
        Ok(settings) => settings,
        Err(e) if debug => return Err(e),
        Err(e) => {
            error!(error = %e, "invalid configuration");
            println!("{} - Invalid configuration", Status::Unknown);
            return Ok(ExitCode::from(Status::Unknown.exit_code()));
        }
    };

    let outcome = check::execute(&settings)?;
    println!("{}", outcome.line);
    Ok(ExitCode::from(outcome.status.exit_code()))
}
