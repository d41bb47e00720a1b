//! # Transfer Configuration
//!
//! Builder-constructed settings for one transfer run.
//!
//! ## Overview
//!
//! [`TransferConfig`] is built through [`TransferConfigBuilder`], which fills in
//! defaults and validates the result before handing it out. Invalid values fail
//! fast with [`Error::Config`] naming the offending setting.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::TransferConfig;
//! use std::time::Duration;
//!
//! let config = TransferConfig::builder()
//!     .workers(8)
//!     .max_retries(5)
//!     .retry_base_delay(Duration::from_millis(250))
//!     .metadata_output("run.csv")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::storage::ExportFormat;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on concurrent workers
pub const MAX_WORKERS: usize = 64;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Names skipped during the walk unless overridden
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[".git", "__pycache__", ".DS_Store", "node_modules"];

/// Serialization format of the per-item metadata records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    Csv,
    Json,
}

impl MetadataFormat {
    /// Infer the format from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Where the metadata records are written after the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOutput {
    pub path: PathBuf,
    pub format: MetadataFormat,
}

impl MetadataOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = MetadataFormat::from_path(&path);
        Self { path, format }
    }

    pub fn with_format(mut self, format: MetadataFormat) -> Self {
        self.format = format;
        self
    }
}

/// Settings for one transfer run
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Number of concurrent item workers (`W`)
    pub workers: usize,

    /// Retries after the first attempt (`R`); total attempts are `R + 1`
    pub max_retries: u32,

    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,

    /// Source MIME type → export format, layered over the built-in table
    pub export_overrides: BTreeMap<String, ExportFormat>,

    /// Exact names or `*`-globs skipped during the walk
    pub exclude_patterns: Vec<String>,

    pub metadata_output: Option<MetadataOutput>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            export_overrides: BTreeMap::new(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            metadata_output: None,
        }
    }
}

impl TransferConfig {
    pub fn builder() -> TransferConfigBuilder {
        TransferConfigBuilder::default()
    }

    /// Validates the configuration
    ///
    /// This checks:
    /// - `workers` is within `1..=MAX_WORKERS`
    /// - retry delays are non-zero and `base <= max`
    /// - export overrides name a MIME type and a dotted extension
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(Error::Config(format!(
                "workers must be between 1 and {} (got {})",
                MAX_WORKERS, self.workers
            )));
        }

        if self.retry_base_delay.is_zero() {
            return Err(Error::Config(
                "retry_base_delay must be greater than zero".to_string(),
            ));
        }

        if self.retry_base_delay > self.retry_max_delay {
            return Err(Error::Config(format!(
                "retry_base_delay ({:?}) cannot exceed retry_max_delay ({:?})",
                self.retry_base_delay, self.retry_max_delay
            )));
        }

        for (source, format) in &self.export_overrides {
            if source.is_empty() || format.mime_type.is_empty() {
                return Err(Error::Config(
                    "export overrides need both a source and a target MIME type".to_string(),
                ));
            }
            if !format.extension.starts_with('.') || format.extension.len() < 2 {
                return Err(Error::Config(format!(
                    "export extension for {} must look like \".ext\" (got {:?})",
                    source, format.extension
                )));
            }
        }

        if self.exclude_patterns.iter().any(|p| p.is_empty()) {
            return Err(Error::Config(
                "exclude patterns cannot be empty strings".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`TransferConfig`]
#[derive(Debug, Default)]
pub struct TransferConfigBuilder {
    workers: Option<usize>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    retry_max_delay: Option<Duration>,
    export_overrides: BTreeMap<String, ExportFormat>,
    exclude_patterns: Option<Vec<String>>,
    metadata_output: Option<MetadataOutput>,
}

impl TransferConfigBuilder {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = Some(delay);
        self
    }

    /// Export documents of `source_mime_type` as `format` instead of the default
    pub fn export_override(mut self, source_mime_type: impl Into<String>, format: ExportFormat) -> Self {
        self.export_overrides.insert(source_mime_type.into(), format);
        self
    }

    /// Replace the default exclude list
    pub fn exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Write metadata records to `path`, format inferred from its extension
    pub fn metadata_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.metadata_output = Some(MetadataOutput::new(path));
        self
    }

    pub fn metadata_output_with_format<P: Into<PathBuf>>(mut self, path: P, format: MetadataFormat) -> Self {
        self.metadata_output = Some(MetadataOutput::new(path).with_format(format));
        self
    }

    /// Builds and validates the configuration
    pub fn build(self) -> Result<TransferConfig> {
        let defaults = TransferConfig::default();

        let config = TransferConfig {
            workers: self.workers.unwrap_or(defaults.workers),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_base_delay: self.retry_base_delay.unwrap_or(defaults.retry_base_delay),
            retry_max_delay: self.retry_max_delay.unwrap_or(defaults.retry_max_delay),
            export_overrides: self.export_overrides,
            exclude_patterns: self.exclude_patterns.unwrap_or(defaults.exclude_patterns),
            metadata_output: self.metadata_output,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = TransferConfig::builder().build().unwrap();

        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
        assert_eq!(config.retry_max_delay, Duration::from_secs(30));
        assert!(config.exclude_patterns.contains(&".git".to_string()));
        assert!(config.metadata_output.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = TransferConfig::builder()
            .workers(16)
            .max_retries(0)
            .exclude_patterns(["*.tmp"])
            .metadata_output("out/run.JSON")
            .build()
            .unwrap();

        assert_eq!(config.workers, 16);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.exclude_patterns, vec!["*.tmp".to_string()]);
        assert_eq!(
            config.metadata_output.unwrap().format,
            MetadataFormat::Json
        );
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let result = TransferConfig::builder().workers(0).build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("workers")));
    }

    #[test]
    fn test_validate_rejects_excessive_workers() {
        let result = TransferConfig::builder().workers(MAX_WORKERS + 1).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let result = TransferConfig::builder()
            .retry_base_delay(Duration::from_secs(10))
            .retry_max_delay(Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_export_extension() {
        let result = TransferConfig::builder()
            .export_override(
                "application/vnd.google-apps.document",
                ExportFormat::new("application/pdf", "pdf"),
            )
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("extension")));
    }

    #[test]
    fn test_metadata_format_from_path() {
        assert_eq!(MetadataFormat::from_path(Path::new("a.csv")), MetadataFormat::Csv);
        assert_eq!(MetadataFormat::from_path(Path::new("a.json")), MetadataFormat::Json);
        assert_eq!(MetadataFormat::from_path(Path::new("records")), MetadataFormat::Csv);
    }
}
