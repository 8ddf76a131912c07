//! Runtime Configuration
//!
//! Everything the pipeline lets callers tune lives in [`RuntimeConfig`]. The
//! struct deserializes from JSON with every field optional, so a config file
//! only needs to mention what it changes:
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{ "delimiters": { "open": "${", "close": "}" } }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The pair of literal strings that mark an interpolation in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Delimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// How a binding change reaches the live tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// Update the shadow tree and let the next flush diff and patch it.
    #[default]
    Rediff,

    /// Patch the bound text or attribute on the live node immediately.
    ///
    /// The shadow tree and the baseline snapshot are updated together, so
    /// the following diff does not report the change a second time.
    Direct,
}

/// Configuration for a [`Mount`](crate::mount::Mount) and its evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interpolation markers for text nodes.
    pub delimiters: Delimiters,

    /// Whether bindings go through diff/patch or patch the live node directly.
    pub binding_mode: BindingMode,

    /// Attribute name prefixes that mark a bound attribute.
    ///
    /// The prefix is stripped to get the rendered attribute name, so
    /// `:title="user.name"` renders as `title`.
    pub bind_prefixes: Vec<String>,

    /// Attribute that marks a two-way binding. It renders as `value`.
    pub model_attribute: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            binding_mode: BindingMode::default(),
            bind_prefixes: vec![":".to_string(), "v-bind:".to_string()],
            model_attribute: "v-model".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiters.open.is_empty() || self.delimiters.close.is_empty() {
            return Err(ConfigError::InvalidDelimiters {
                open: self.delimiters.open.clone(),
                close: self.delimiters.close.clone(),
            });
        }
        Ok(())
    }

    /// If `name` is a bound attribute, return the attribute it renders as.
    pub fn bound_attribute<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.bind_prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .find_map(|prefix| name.strip_prefix(prefix.as_str()))
            .filter(|stripped| !stripped.is_empty())
    }
}
