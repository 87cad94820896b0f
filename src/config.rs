//! Configuration for engine runs
//!
//! Reads `grove.yaml` / `grove.yml` / `grove.json` style files, picking the format from the
//! file extension. Every section is optional.

use crate::diagnostic::Severity;
use crate::fixer::FixMode;
use crate::syntax::ModuleName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Visit independent modules in parallel
    pub parallel: bool,

    /// Number of worker threads (0 = one per CPU)
    pub jobs: usize,

    /// Reuse results of unchanged modules across runs
    pub cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
            cache: false,
        }
    }
}

/// Rule selection and overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Ignore rules by name prefix
    pub ignore: Vec<String>,

    /// Severity overrides (rule name -> severity)
    pub severity: BTreeMap<String, Severity>,

    /// Per-module rule ignores (module name glob -> rule names, `all` for every rule)
    pub per_module: BTreeMap<String, Vec<String>>,
}

/// Fix application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixesConfig {
    pub mode: FixMode,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Other configuration files this one builds on, relative to it
    pub extends: Vec<String>,

    pub engine: EngineConfig,

    pub rules: RulesConfig,

    pub fixes: FixesConfig,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };
        config.validate()?;

        if config.extends.is_empty() {
            return Ok(config);
        }

        let base_dir = path.parent().unwrap_or(Path::new("."));
        let mut base = Self::default();
        for extend in &config.extends {
            let extend_path = if Path::new(extend).is_absolute() {
                PathBuf::from(extend)
            } else {
                base_dir.join(extend)
            };
            base.merge(Self::load_with_depth(&extend_path, depth + 1)?);
        }
        base.merge(config);
        Ok(base)
    }

    /// Reject module patterns that are not valid globs
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in self.rules.per_module.keys() {
            globset::Glob::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("Invalid module pattern `{}`: {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        self.engine.parallel = other.engine.parallel;
        if other.engine.cache {
            self.engine.cache = true;
        }

        self.rules.disabled.extend(other.rules.disabled);
        if !other.rules.enabled.is_empty() {
            self.rules.enabled = other.rules.enabled;
        }
        self.rules.ignore.extend(other.rules.ignore);
        self.rules.severity.extend(other.rules.severity);
        for (pattern, rules) in other.rules.per_module {
            self.rules.per_module.entry(pattern).or_default().extend(rules);
        }

        if other.fixes.mode != FixMode::default() {
            self.fixes.mode = other.fixes.mode;
        }
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_name: &str) -> bool {
        if self.rules.disabled.iter().any(|r| r == rule_name) {
            return false;
        }

        let lower = rule_name.to_lowercase();
        if self
            .rules
            .ignore
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
        {
            return false;
        }

        self.rules.enabled.is_empty() || self.rules.enabled.iter().any(|r| r == rule_name)
    }

    /// Severity for a rule's diagnostics, honouring overrides
    pub fn severity_for(&self, rule_name: &str, default: Severity) -> Severity {
        self.rules.severity.get(rule_name).copied().unwrap_or(default)
    }

    /// Check if a rule should be ignored for a module
    pub fn should_ignore_rule_for_module(&self, rule_name: &str, module: &ModuleName) -> bool {
        let module = module.to_string();

        for (pattern, rules) in &self.rules.per_module {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&module)
                    && rules.iter().any(|r| r == "all" || r == rule_name)
                {
                    return true;
                }
            }
        }

        false
    }
}
