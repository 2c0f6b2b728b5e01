//! Alias command implementation.
//!
//! Manages friendly device names (aliases) that map to MAC addresses.

use std::path::Path;

use anyhow::{Result, bail};
use tabled::{builder::Builder, settings::Style};

use crate::cli::AliasSubcommand;
use crate::config::Config;
use crate::util::parse_address;

pub fn cmd_alias(action: AliasSubcommand, path: &Path, quiet: bool) -> Result<()> {
    let mut config = Config::load_from(path);

    if let AliasSubcommand::List = action {
        list_aliases(&config, quiet);
        return Ok(());
    }

    let message = apply_alias(&mut config, action)?;
    config.save_to(path)?;
    if !quiet {
        println!("{}", message);
    }
    Ok(())
}

fn list_aliases(config: &Config, quiet: bool) {
    if config.aliases.is_empty() {
        if !quiet {
            println!("No aliases configured.");
            println!();
            println!("Add an alias with: mithermo alias set <name> <address>");
        }
        return;
    }
    println!("{}", alias_table(config));
}

fn alias_table(config: &Config) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Alias", "Device Address"]);

    let mut aliases: Vec<_> = config.aliases.iter().collect();
    aliases.sort_by_key(|(name, _)| name.as_str());
    for (name, address) in aliases {
        builder.push_record([name.as_str(), address.as_str()]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Apply a set or remove to `config`, returning what changed.
fn apply_alias(config: &mut Config, action: AliasSubcommand) -> Result<String> {
    match action {
        AliasSubcommand::List => Ok(String::new()),
        AliasSubcommand::Set { name, address } => {
            if looks_like_address(&name) {
                bail!(
                    "Alias name '{}' looks like a device address. \
                     Use a friendly name instead (e.g., 'kitchen', 'bedroom').",
                    name
                );
            }
            let address = parse_address(&address)?.to_string();

            let was_update = config.aliases.contains_key(&name);
            config.aliases.insert(name.clone(), address.clone());
            if was_update {
                Ok(format!("Updated alias '{}' → {}", name, address))
            } else {
                Ok(format!("Added alias '{}' → {}", name, address))
            }
        }
        AliasSubcommand::Remove { name } => {
            if config.aliases.remove(&name).is_none() {
                bail!("Alias '{}' not found", name);
            }
            Ok(format!("Removed alias '{}'", name))
        }
    }
}

/// Check if a string looks like a MAC address.
fn looks_like_address(s: &str) -> bool {
    s.chars().filter(|c| *c == ':').count() >= 5
        && s.chars().all(|c| c.is_ascii_hexdigit() || c == ':')
}
