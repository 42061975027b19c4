//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use quill_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str =
    "vault_dir, sync_folder, api_url, api_version, api_token, request_interval_ms, max_attempts, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "vault_dir": config.vault_dir,
                    "sync_folder": config.sync_folder,
                    "api_url": config.api_url,
                    "api_version": config.api_version,
                    "api_token": config.api_token.as_deref().map(mask_token),
                    "request_interval_ms": config.request_interval_ms,
                    "max_attempts": config.max_attempts,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.vault_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  vault_dir:           {}", config.vault_dir.display());
            println!("  sync_folder:         {}", config.sync_folder.display());
            println!("  api_url:             {}", config.api_url);
            println!("  api_version:         {}", config.api_version);
            println!(
                "  api_token:           {}",
                config
                    .api_token
                    .as_deref()
                    .map(mask_token)
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  request_interval_ms: {}", config.request_interval_ms);
            println!("  max_attempts:        {}", config.max_attempts);
            println!(
                "  log_file:            {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key == "api_token" {
        mask_token(&value)
    } else {
        value
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "vault_dir" => config.vault_dir = value.into(),
        "sync_folder" => config.sync_folder = value.into(),
        "api_url" => config.api_url = value.to_string(),
        "api_version" => config.api_version = value.to_string(),
        "api_token" => config.api_token = optional(value),
        "request_interval_ms" => {
            config.request_interval_ms = value
                .parse()
                .context("Invalid value for request_interval_ms. Use a whole number.")?;
        }
        "max_attempts" => {
            config.max_attempts = value
                .parse()
                .context("Invalid value for max_attempts. Use a whole number.")?;
        }
        "log_file" => config.log_file = optional(value).map(PathBuf::from),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Keep only the last four characters of a secret
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
