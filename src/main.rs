use anyhow::Result;
use bumpsemver::{arguments::Arguments, cli, errors::BumpError};
use clap::Parser;
use log::{LevelFilter, error, warn};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Arguments::parse();
    pretty_env_logger::env_logger::builder()
        .filter_level(match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        })
        .format_timestamp(None)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = match err.downcast_ref::<BumpError>() {
                Some(err @ BumpError::MixedNewLine { .. }) => {
                    warn!("{}", err);
                    err.exit_code()
                }
                Some(err @ BumpError::WorkingDirectoryIsDirty { .. }) => {
                    error!(
                        "{}\n\nUse --allow-dirty to override this if you know what you're doing.",
                        err
                    );
                    err.exit_code()
                }
                Some(err) => {
                    error!("{}", err);
                    err.exit_code()
                }
                None => {
                    error!("Unexpected error occurred: {:#}", err);
                    128
                }
            };
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(args: &Arguments) -> Result<()> {
    cli::run(args)?;
    Ok(())
}
