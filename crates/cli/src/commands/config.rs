// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use crate::cli::ConfigCommand;
use crate::config::RemoteConfig;
use crate::error::{Error, Result};

use super::Context;

/// Execute a config subcommand.
pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            println!("# state dir: {}", ctx.state_dir.display());
            let text = toml::to_string_pretty(&ctx.config)
                .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
            print!("{}", text);
            Ok(())
        }
        ConfigCommand::Remote { url } => set_remote(ctx, url),
    }
}

fn set_remote(ctx: &Context, url: String) -> Result<()> {
    RemoteConfig {
        url: url.clone(),
        ..RemoteConfig::default()
    }
    .validate_url()?;

    let mut config = ctx.config.clone();
    config.remote.url = url;
    config.save(&ctx.state_dir)?;
    println!("Remote set to {}", config.remote.url);
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
