use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use log::{error, info};

use miso::prelude::*;

/// `miso [--path=<data-path>] [<key>=<value>...]`
fn parse_arguments() -> anyhow::Result<EngineOptions> {
    let mut options = EngineOptions::default();

    for argument in std::env::args().skip(1) {
        if let Some(path) = argument.strip_prefix("--path=") {
            options.path = PathBuf::from(expand_home(path));
        } else if let Some((key, value)) = argument.split_once('=') {
            options
                .overrides
                .push((key.to_string(), value.to_string()));
        } else {
            anyhow::bail!("unrecognized argument `{argument}`");
        }
    }

    Ok(options)
}

/// Expand a leading `~` (POSIX) or `%AppData%` (Windows) prefix.
fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}{rest}", home.to_string_lossy());
        }
    }
    if let Some(rest) = path.strip_prefix("%AppData%") {
        if let Some(appdata) = std::env::var_os("AppData") {
            return format!("{}{rest}", appdata.to_string_lossy());
        }
    }
    path.to_string()
}

fn boot() -> anyhow::Result<()> {
    let options = parse_arguments()?;

    let mut engine = Engine::new(&options).context("can't create the engine")?;
    if engine.configuration().system.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }

    engine.run().context("engine terminated abnormally")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match boot() {
        Ok(()) => {
            info!("goodbye");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
