use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use mithermo_core::ConnectionMode;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;
mod util;

use cli::{Cli, Commands, DEFAULT_SCAN_SECS, OutputFormat};
use commands::{
    ReadArgs, WatchArgs, cmd_alias, cmd_clock, cmd_config, cmd_read, cmd_reset, cmd_scan, cmd_set,
    cmd_settings, cmd_watch,
};
use config::Config;
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "mithermo", &mut io::stdout());
        return Ok(());
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::path);
    let config = Config::load_from(&config_path);
    let no_color = cli.no_color || config.no_color;
    let json = cli.json;
    let pick = |format: OutputFormat| if json { OutputFormat::Json } else { format };
    let base_opts = FormatOptions::new(no_color, config.fahrenheit).with_compact(cli.compact);
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Scan {
            timeout,
            all,
            format,
            no_header,
        } => {
            let opts = base_opts.with_no_header(no_header);
            let timeout = timeout.or(config.scan_duration).unwrap_or(DEFAULT_SCAN_SECS);
            cmd_scan(timeout, all, pick(format), output, cli.quiet, &opts).await?;
        }
        Commands::Read {
            device,
            output: out,
            mode,
            wait,
        } => {
            let opts = FormatOptions::new(no_color, out.resolve_fahrenheit(config.fahrenheit))
                .with_no_header(out.no_header)
                .with_compact(cli.compact);
            let mode = mode
                .map(ConnectionMode::from)
                .or(config.mode)
                .unwrap_or(ConnectionMode::Connection);
            cmd_read(ReadArgs {
                timeout: device.timeout(config.timeout),
                device: device.device,
                mode,
                wait: Duration::from_secs(wait),
                format: pick(out.format),
                output,
                quiet: cli.quiet,
                opts: &opts,
                config: &config,
            })
            .await?;
        }
        Commands::Watch {
            device,
            output: out,
            duration,
            no_init,
        } => {
            let opts = FormatOptions::new(no_color, out.resolve_fahrenheit(config.fahrenheit))
                .with_no_header(out.no_header)
                .with_compact(cli.compact);
            cmd_watch(WatchArgs {
                timeout: device.timeout(config.timeout),
                devices: device.device,
                duration: (duration > 0).then(|| Duration::from_secs(duration)),
                init: !no_init,
                format: pick(out.format),
                output,
                quiet: cli.quiet,
                opts: &opts,
                config: &config,
            })
            .await?;
        }
        Commands::Settings { device, format } => {
            let timeout = device.timeout(config.timeout);
            cmd_settings(
                device.device,
                timeout,
                pick(format),
                output,
                &base_opts,
                &config,
            )
            .await?;
        }
        Commands::Set {
            device,
            force,
            setting,
        } => {
            let timeout = device.timeout(config.timeout);
            cmd_set(device.device, timeout, setting, cli.quiet, force, &config).await?;
        }
        Commands::Reset { device, force } => {
            let timeout = device.timeout(config.timeout);
            cmd_reset(
                device.device,
                timeout,
                force,
                output,
                cli.quiet,
                &base_opts,
                &config,
            )
            .await?;
        }
        Commands::Clock { device, epoch } => {
            let timeout = device.timeout(config.timeout);
            cmd_clock(device.device, timeout, epoch, cli.quiet, &config).await?;
        }
        Commands::Config { action } => cmd_config(action, &config_path)?,
        Commands::Alias { action } => cmd_alias(action, &config_path, cli.quiet)?,
        Commands::Completions { .. } => unreachable!("handled before tracing init"),
    }

    Ok(())
}
