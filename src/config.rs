//! Service configuration.

use crate::core::types::Language;
use crate::error::ConfigError;
use crate::learning::OverflowPolicy;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Service configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Language codes served for the lifetime of the process
    pub languages: Vec<String>,

    /// Words per download page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Capacity of each language's page partition (bytes)
    #[serde(default = "default_partition_max_bytes")]
    pub partition_max_bytes: u64,

    /// Pending learn submissions per language
    #[serde(default = "default_learn_queue_capacity")]
    pub learn_queue_capacity: usize,

    /// Behaviour when a learn queue is full
    #[serde(default)]
    pub learn_overflow: OverflowPolicy,

    /// This node's id on the page ring
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Other node ids sharing the page ring
    #[serde(default)]
    pub peers: Vec<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            page_size: default_page_size(),
            partition_max_bytes: default_partition_max_bytes(),
            learn_queue_capacity: default_learn_queue_capacity(),
            learn_overflow: OverflowPolicy::default(),
            node_id: default_node_id(),
            peers: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.languages.is_empty() {
            return Err(ConfigError::Invalid("at least one language is required".into()));
        }
        let mut seen = HashSet::new();
        for code in &self.languages {
            if code.trim().is_empty() {
                return Err(ConfigError::Invalid("empty language code".into()));
            }
            if !seen.insert(code.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate language: {}", code)));
            }
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.learn_queue_capacity == 0 {
            return Err(ConfigError::Invalid("learn_queue_capacity must be positive".into()));
        }
        if self.peers.iter().any(|p| p == &self.node_id) {
            return Err(ConfigError::Invalid(format!("node {} lists itself as a peer", self.node_id)));
        }
        Ok(())
    }

    pub fn language_set(&self) -> Vec<Language> {
        self.languages.iter().map(|code| Language::new(code.as_str())).collect()
    }
}

fn default_page_size() -> usize {
    100
}

fn default_partition_max_bytes() -> u64 {
    100 << 20 // 100MB
}

fn default_learn_queue_capacity() -> usize {
    1024
}

fn default_node_id() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
