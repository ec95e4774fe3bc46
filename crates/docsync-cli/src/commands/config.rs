//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use docsync_core::{Config, RelateMode};

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config: &Config, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!("  use_cache:           {}", config.use_cache);
            println!("  batch_size:          {}", config.batch_size);
            println!("  relate_mode:         {:?}", config.relate_mode);
            println!("  max_relate_attempts: {}", config.max_relate_attempts);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    mut config: Config,
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    apply(&mut config, &key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    save(&config, &save_path)?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "use_cache" => {
            config.use_cache = value
                .parse()
                .context("Invalid value for use_cache. Use 'true' or 'false'.")?;
        }
        "batch_size" => {
            config.batch_size = value
                .parse()
                .context("Invalid value for batch_size. Use a number from 1 to 10.")?;
        }
        "relate_mode" => {
            config.relate_mode = value
                .parse::<RelateMode>()
                .map_err(|e| anyhow::anyhow!("{}. Use 'checked' or 'unchecked'.", e))?;
        }
        "max_relate_attempts" => {
            config.max_relate_attempts = value
                .parse()
                .context("Invalid value for max_relate_attempts. Use a positive number.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, use_cache, batch_size, relate_mode, max_relate_attempts",
                key
            );
        }
    }
    Ok(())
}

fn save(config: &Config, path: &Path) -> Result<()> {
    config
        .save_to_path(path)
        .context("Failed to save configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "use_cache", "false").unwrap();
        apply(&mut config, "batch_size", "3").unwrap();
        apply(&mut config, "relate_mode", "unchecked").unwrap();
        apply(&mut config, "data_dir", "/tmp/docsync").unwrap();

        assert!(!config.use_cache);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.relate_mode, RelateMode::Unchecked);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/docsync"));
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();

        assert!(apply(&mut config, "sync_url", "ws://x").is_err());
        assert!(apply(&mut config, "batch_size", "many").is_err());
        assert!(apply(&mut config, "relate_mode", "sometimes").is_err());
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_set_writes_config_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            Config::default(),
            "batch_size".to_string(),
            "4".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("batch_size = 4"));
    }
}
