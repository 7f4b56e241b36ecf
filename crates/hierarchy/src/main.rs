mod cli;
mod commands;
mod error;
mod logging;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use hierarchy_platform::AppPaths;

use cli::{Cli, Commands};
use error::AppError;
use settings::AppSettings;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (settings, settings_error) = match AppSettings::load() {
        Ok(settings) => (settings, None),
        Err(err) => (AppSettings::default(), Some(err)),
    };

    let log_path = AppPaths::new().ok().and_then(|paths| {
        paths.ensure_dirs().ok()?;
        Some(paths.log_file())
    });
    logging::init_logging(
        log_path.as_deref(),
        cli.verbose || settings.debug_logging,
        settings.max_log_size_bytes,
    );
    if let Some(err) = settings_error {
        log::warn!("Using default settings, {err}");
    }

    match run(cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, settings: &AppSettings) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    runtime.block_on(async {
        match cli.command {
            Commands::Serve(args) => commands::serve::execute(args, settings).await,
            Commands::Browse(args) => commands::browse::execute(args, settings).await,
        }
    })
}
