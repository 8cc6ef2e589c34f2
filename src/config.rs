use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

pub(crate) const DEFAULT_MAX_DEFAULT_DEPTH: usize = 16;
const DEFAULT_IDENTIFIER_ATTRIBUTE: &str = "id";

const ENV_MAX_DEFAULT_DEPTH: &str = "STUBBY_MAX_DEFAULT_DEPTH";
const ENV_IDENTIFIER_ATTRIBUTE: &str = "STUBBY_IDENTIFIER_ATTRIBUTE";
const ENV_STRICT_SLOTS: &str = "STUBBY_STRICT_SLOTS";

/// Tunables of the double factory and the scenario engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubbyConfig {
    /// Maximum nesting of blueprint default producers before a build fails
    /// with `CyclicDefault`
    pub max_default_depth: usize,
    /// Identifier attribute used by types that do not declare their own
    pub identifier_attribute: String,
    /// Warn when a scenario rebinds a slot another scenario produced
    pub strict_slots: bool,
}

impl Default for StubbyConfig {
    fn default() -> Self {
        Self {
            max_default_depth: DEFAULT_MAX_DEFAULT_DEPTH,
            identifier_attribute: DEFAULT_IDENTIFIER_ATTRIBUTE.to_string(),
            strict_slots: false,
        }
    }
}

impl StubbyConfig {
    /// Defaults overridden by `STUBBY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the given file, then the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.apply_partial(load_config_file(path)?);
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.max_default_depth > 0,
            "max_default_depth must be at least 1"
        );
        anyhow::ensure!(
            !self.identifier_attribute.trim().is_empty(),
            "identifier_attribute must not be empty"
        );
        Ok(())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        let PartialConfig {
            max_default_depth,
            identifier_attribute,
            strict_slots,
        } = partial;

        if let Some(depth) = max_default_depth {
            self.max_default_depth = depth;
        }
        if let Some(identifier) = identifier_attribute {
            self.identifier_attribute = identifier.trim().to_string();
        }
        if let Some(strict) = strict_slots {
            self.strict_slots = strict;
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(depth) = env::var(ENV_MAX_DEFAULT_DEPTH) {
            self.max_default_depth = depth
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_DEFAULT_DEPTH} must be a positive integer"))?;
        }
        if let Ok(identifier) = env::var(ENV_IDENTIFIER_ATTRIBUTE) {
            self.identifier_attribute = identifier.trim().to_string();
        }
        if let Ok(strict) = env::var(ENV_STRICT_SLOTS) {
            self.strict_slots = matches!(
                strict.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    max_default_depth: Option<usize>,
    identifier_attribute: Option<String>,
    strict_slots: Option<bool>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        "toml" => toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
