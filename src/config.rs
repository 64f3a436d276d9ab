//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.participation.toml` files.

use crate::api::ClientConfig;
use crate::pipeline::AggregationRequest;
use crate::report::LayoutOptions;
use crate::table::DEFAULT_EXCLUDE_MARKERS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".participation.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Canvas API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Number of courses fetched concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: None,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Canvas API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Access token. Prefer the CANVAS_TOKEN environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Records requested per page.
    #[serde(default = "default_per_page")]
    pub per_page: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            per_page: default_per_page(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    ClientConfig::default().base_url
}

fn default_per_page() -> usize {
    100
}

fn default_timeout() -> u64 {
    60
}

/// Report content settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Add one delivery column per assignment.
    #[serde(default)]
    pub include_assignments: bool,

    /// Build the summary sheet even for a single course.
    #[serde(default)]
    pub summary: bool,

    /// Only list non-participants on course sheets.
    #[serde(default)]
    pub non_participants_only: bool,

    /// Assignment-name markers excluded from delivery columns
    /// (accent- and case-insensitive).
    #[serde(default = "default_exclude_markers")]
    pub exclude_markers: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_assignments: false,
            summary: false,
            non_participants_only: false,
            exclude_markers: default_exclude_markers(),
        }
    }
}

fn default_exclude_markers() -> Vec<String> {
    DEFAULT_EXCLUDE_MARKERS
        .iter()
        .map(|marker| marker.to_string())
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Flags can only switch features on; options override when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(ref token) = args.token {
            self.api.token = Some(token.clone());
        }
        if let Some(per_page) = args.per_page {
            self.api.per_page = per_page;
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        if args.assignments {
            self.report.include_assignments = true;
        }
        if args.summary {
            self.report.summary = true;
        }
        if args.non_participants_only {
            self.report.non_participants_only = true;
        }
    }

    /// HTTP client settings.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            token: self.api.token.clone().unwrap_or_default(),
            per_page: self.api.per_page.max(1),
            timeout_seconds: self.api.timeout_seconds.max(1),
        }
    }

    /// Aggregation request for the given course ids.
    pub fn aggregation_request(&self, course_ids: Vec<String>) -> AggregationRequest {
        AggregationRequest {
            course_ids,
            include_assignments: self.report.include_assignments,
            summary: self.report.summary,
            concurrency: self.general.concurrency.max(1),
            exclude_markers: self.report.exclude_markers.clone(),
        }
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            non_participants_only: self.report.non_participants_only,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
