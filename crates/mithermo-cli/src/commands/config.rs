//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use mithermo_core::ConnectionMode;

use crate::cli::{ConfigAction, ConfigKey};
use crate::config::Config;

pub fn cmd_config(action: ConfigAction, path: &Path) -> Result<()> {
    let mut config = Config::load_from(path);

    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("# {}", path.display());
            print!("{}", content);
        }
        ConfigAction::Get { key } => {
            println!("{}", get_value(&config, key).unwrap_or_default());
        }
        ConfigAction::Set { key, value } => {
            set_value(&mut config, key, &value)?;
            config.save_to(path)?;
            println!("Set {:?} = {}", key, value);
        }
        ConfigAction::Unset { key } => {
            unset_value(&mut config, key);
            config.save_to(path)?;
            println!("Unset {:?}", key);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            if path.exists() {
                bail!("Config already exists at {}", path.display());
            }
            Config::default().save_to(path)?;
            println!("Created {}", path.display());
        }
    }

    Ok(())
}

fn get_value(config: &Config, key: ConfigKey) -> Option<String> {
    match key {
        ConfigKey::Device => config.device.clone(),
        ConfigKey::Mode => config.mode.map(|m| m.to_string()),
        ConfigKey::Timeout => config.timeout.map(|t| t.to_string()),
        ConfigKey::ScanDuration => config.scan_duration.map(|t| t.to_string()),
        ConfigKey::NoColor => Some(config.no_color.to_string()),
        ConfigKey::Fahrenheit => Some(config.fahrenheit.to_string()),
    }
}

fn set_value(config: &mut Config, key: ConfigKey, value: &str) -> Result<()> {
    match key {
        ConfigKey::Device => config.device = Some(value.to_string()),
        ConfigKey::Mode => config.mode = Some(value.parse::<ConnectionMode>()?),
        ConfigKey::Timeout => config.timeout = Some(parse_seconds(value)?),
        ConfigKey::ScanDuration => config.scan_duration = Some(parse_seconds(value)?),
        ConfigKey::NoColor => config.no_color = parse_bool(value)?,
        ConfigKey::Fahrenheit => config.fahrenheit = parse_bool(value)?,
    }
    Ok(())
}

fn unset_value(config: &mut Config, key: ConfigKey) {
    match key {
        ConfigKey::Device => config.device = None,
        ConfigKey::Mode => config.mode = None,
        ConfigKey::Timeout => config.timeout = None,
        ConfigKey::ScanDuration => config.scan_duration = None,
        ConfigKey::NoColor => config.no_color = false,
        ConfigKey::Fahrenheit => config.fahrenheit = false,
    }
}

fn parse_seconds(value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("'{}' is not a number of seconds", value))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("'{}' is not a boolean (use true/false)", value),
    }
}
