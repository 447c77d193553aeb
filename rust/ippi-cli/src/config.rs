//! Configuration file parsing for `ippi.toml`.
//!
//! Searches the current directory then its ancestors. No file means
//! defaults; command-line flags override whatever is found.

use ippi_vm::ExecOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "ippi.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid toml in '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct IppiConfig {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct RunSection {
    /// Instruction budget for one run.
    pub max_steps: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct LogSection {
    /// Filter directive such as `warn` or `ippi_vm=debug`.
    pub level: Option<String>,
}

impl IppiConfig {
    /// Load `ippi.toml` from the current directory or the nearest ancestor
    /// that has one.
    pub fn load() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        match std::env::current_dir() {
            Ok(dir) => Self::find_from(&dir),
            Err(_) => Ok(None),
        }
    }

    /// Search `start` and its ancestors.
    pub fn find_from(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        for dir in start.ancestors() {
            let path = dir.join(CONFIG_FILE);
            if path.is_file() {
                let cfg = Self::load_from(&path)?;
                return Ok(Some((path, cfg)));
            }
        }
        Ok(None)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Engine options, with `max_steps` from the command line taking
    /// precedence.
    pub fn exec_options(&self, max_steps: Option<u64>) -> ExecOptions {
        ExecOptions {
            max_steps: max_steps.or(self.run.max_steps),
        }
    }

    /// Log filter: `--verbose` wins, then `[log] level`, then `warn`.
    pub fn log_directive(&self, verbose: bool) -> String {
        if verbose {
            return "debug".to_string();
        }
        self.log.level.clone().unwrap_or_else(|| "warn".to_string())
    }

    /// Template written by `ippi init`.
    pub fn default_template() -> &'static str {
        r#"# ippi configuration

[run]
# Abort a run after this many instructions.
# max_steps = 1000000

[log]
# Filter directive for diagnostics on stderr (RUST_LOG overrides it).
level = "warn"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let cfg: IppiConfig = toml::from_str(
            r#"
[run]
max_steps = 500

[log]
level = "ippi_vm=trace"
"#,
        )
        .unwrap();
        assert_eq!(cfg.run.max_steps, Some(500));
        assert_eq!(cfg.log.level.as_deref(), Some("ippi_vm=trace"));
    }

    #[test]
    fn test_parse_empty() {
        let cfg: IppiConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, IppiConfig::default());
    }

    #[test]
    fn test_template_parses() {
        let cfg: IppiConfig = toml::from_str(IppiConfig::default_template()).unwrap();
        assert_eq!(cfg.run.max_steps, None);
        assert_eq!(cfg.log.level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_flag_overrides_file() {
        let cfg = IppiConfig {
            run: RunSection {
                max_steps: Some(10),
            },
            log: LogSection::default(),
        };
        assert_eq!(cfg.exec_options(None).max_steps, Some(10));
        assert_eq!(cfg.exec_options(Some(3)).max_steps, Some(3));
    }

    #[test]
    fn test_log_directive_precedence() {
        let mut cfg = IppiConfig::default();
        assert_eq!(cfg.log_directive(false), "warn");
        cfg.log.level = Some("info".into());
        assert_eq!(cfg.log_directive(false), "info");
        assert_eq!(cfg.log_directive(true), "debug");
    }
}
