use crate::endpoint::{Connection, Endpoint};
use anyhow::{Context, Result};
use bridge_traits::storage::ExportFormat;
use bridge_traits::time::LogLevel;
use clap::{Parser, ValueEnum};
use core_runtime::config::{MetadataFormat, TransferConfig, DEFAULT_EXCLUDE_PATTERNS};
use core_runtime::logging::{LogFormat, LoggingConfig};
use provider_s3::S3Options;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "tree-transfer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy a folder tree between Google Drive, S3 and local storage")]
#[command(long_about = r#"
Copies every file under SOURCE into DESTINATION, recreating the folder
structure and recording one metadata row per item.

Endpoints:
  gdrive:<folder-id>   A Google Drive folder (gdrive:root for My Drive)
  s3://<bucket>/<key>  A key prefix in an S3 bucket
  local:<path>         A local directory (the prefix is optional)

Examples:
  tree-transfer gdrive:1AbC ./backup
  tree-transfer ./photos gdrive:root --workers 8
  tree-transfer gdrive:1AbC s3://archive/drive --s3-region eu-west-1
  tree-transfer gdrive:1AbC --list --metadata tree.json
"#)]
pub struct CliArgs {
    /// Folder to copy from
    #[arg(value_name = "SOURCE")]
    pub source: Endpoint,

    /// Folder to copy into
    #[arg(value_name = "DESTINATION", required_unless_present = "list", conflicts_with = "list")]
    pub destination: Option<Endpoint>,

    /// Walk SOURCE and write its inventory instead of transferring
    #[arg(long)]
    pub list: bool,

    /// Number of parallel workers (1-64)
    #[arg(short = 'w', long, default_value_t = core_runtime::config::DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Retries after the first attempt for transient failures
    #[arg(short = 'r', long, default_value_t = core_runtime::config::DEFAULT_MAX_RETRIES, value_name = "NUM")]
    pub retries: u32,

    /// Base backoff delay in milliseconds, doubled per retry
    #[arg(long, default_value_t = 500, value_name = "MS")]
    pub retry_base_ms: u64,

    /// Upper bound on a single backoff delay in milliseconds
    #[arg(long, default_value_t = 30_000, value_name = "MS")]
    pub retry_max_ms: u64,

    /// Metadata output file (.csv or .json)
    #[arg(short = 'm', long, value_name = "PATH", conflicts_with = "no_metadata")]
    pub metadata: Option<PathBuf>,

    /// Metadata format, overriding the file extension
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub metadata_format: Option<MetadataFormatArg>,

    /// Do not write a metadata file
    #[arg(long)]
    pub no_metadata: bool,

    /// Name pattern to skip while walking; replaces the default list when given
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Override a document export, as SOURCE_MIME=TARGET_MIME,.ext
    #[arg(long = "export-as", value_name = "RULE", value_parser = parse_export_rule)]
    pub export_as: Vec<(String, ExportFormat)>,

    /// OAuth access token for Google Drive endpoints
    #[arg(long, env = "GDRIVE_ACCESS_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub access_token: Option<String>,

    /// AWS region for s3:// endpoints
    #[arg(long, env = "AWS_REGION", value_name = "REGION")]
    pub s3_region: Option<String>,

    /// Endpoint URL of an S3-compatible service
    #[arg(long, env = "AWS_ENDPOINT_URL_S3", value_name = "URL")]
    pub s3_endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub s3_path_style: bool,

    /// Log output format (pretty, json, compact)
    #[arg(long, default_value = "compact", value_parser = parse_log_format, value_name = "FORMAT")]
    pub log_format: LogFormat,

    /// Minimum log level for this tool
    #[arg(long, value_enum, default_value = "info", value_name = "LEVEL")]
    pub log_level: LogLevelArg,

    /// Raw tracing filter, e.g. "core_transfer=debug,reqwest=warn"
    #[arg(long, env = "TRANSFER_LOG", value_name = "FILTER")]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetadataFormatArg {
    Csv,
    Json,
}

impl From<MetadataFormatArg> for MetadataFormat {
    fn from(arg: MetadataFormatArg) -> Self {
        match arg {
            MetadataFormatArg::Csv => MetadataFormat::Csv,
            MetadataFormatArg::Json => MetadataFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Trace => LogLevel::Trace,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Error => LogLevel::Error,
        }
    }
}

fn parse_log_format(s: &str) -> std::result::Result<LogFormat, String> {
    s.parse::<LogFormat>().map_err(|e| e.to_string())
}

fn parse_export_rule(s: &str) -> std::result::Result<(String, ExportFormat), String> {
    let (source, target) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE_MIME=TARGET_MIME,.ext, got '{s}'"))?;
    let (mime, extension) = target
        .split_once(',')
        .ok_or_else(|| format!("missing extension in '{s}'"))?;
    if source.is_empty() || mime.is_empty() || extension.is_empty() {
        return Err(format!("empty field in '{s}'"));
    }
    let extension = if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{extension}")
    };
    Ok((source.to_string(), ExportFormat::new(mime, extension)))
}

/// `<stem>_<YYYYmmdd_HHMMSS>.csv` in the working directory
pub fn default_metadata_path(stem: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{stem}_{stamp}.csv"))
}

impl CliArgs {
    pub fn metadata_path(&self) -> Option<PathBuf> {
        if self.no_metadata {
            return None;
        }
        let stem = if self.list {
            "transfer_inventory"
        } else {
            "transfer_metadata"
        };
        Some(
            self.metadata
                .clone()
                .unwrap_or_else(|| default_metadata_path(stem)),
        )
    }

    pub fn connection(&self) -> Connection {
        Connection {
            access_token: self.access_token.clone(),
            s3: S3Options {
                region: self.s3_region.clone(),
                endpoint_url: self.s3_endpoint.clone(),
                force_path_style: self.s3_path_style,
                ..S3Options::default()
            },
        }
    }

    pub fn transfer_config(&self) -> Result<TransferConfig> {
        let mut builder = TransferConfig::builder()
            .workers(self.workers)
            .max_retries(self.retries)
            .retry_base_delay(Duration::from_millis(self.retry_base_ms))
            .retry_max_delay(Duration::from_millis(self.retry_max_ms));

        if !self.exclude.is_empty() {
            builder = builder.exclude_patterns(self.exclude.iter().cloned());
        }
        for (source_mime, format) in &self.export_as {
            builder = builder.export_override(source_mime.clone(), format.clone());
        }
        if let Some(path) = self.metadata_path() {
            builder = match self.metadata_format {
                Some(format) => builder.metadata_output_with_format(path, format.into()),
                None => builder.metadata_output(path),
            };
        }

        builder.build().context("invalid transfer settings")
    }

    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig::default()
            .with_format(self.log_format)
            .with_level(self.log_level.into());
        if let Some(filter) = &self.log_filter {
            config = config.with_filter(filter.clone());
        }
        config
    }

    /// Patterns in effect for this run, for the startup log line
    pub fn effective_excludes(&self) -> Vec<String> {
        if self.exclude.is_empty() {
            DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()).collect()
        } else {
            self.exclude.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Connection, Endpoint};

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("tree-transfer").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_map_onto_config() {
        let args = parse(&["gdrive:abc", "./out", "--no-metadata"]);
        let config = args.transfer_config().unwrap();

        assert!(args.source.is_drive());
        assert_eq!(
            args.destination,
            Some(Endpoint::Local {
                path: PathBuf::from("./out")
            })
        );
        assert!(!args.list);
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
        assert!(config.metadata_output.is_none());
        assert_eq!(config.exclude_patterns, args.effective_excludes());
    }

    #[test]
    fn test_explicit_flags() {
        let args = parse(&[
            "local:src",
            "gdrive:root",
            "-w",
            "8",
            "--retries",
            "5",
            "--exclude",
            "*.tmp",
            "--metadata",
            "report.json",
            "--export-as",
            "application/vnd.google-apps.document=application/pdf,pdf",
        ]);
        let config = args.transfer_config().unwrap();

        assert_eq!(config.workers, 8);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.exclude_patterns, vec!["*.tmp".to_string()]);
        let output = config.metadata_output.unwrap();
        assert_eq!(output.format, MetadataFormat::Json);
        let format = &config.export_overrides["application/vnd.google-apps.document"];
        assert_eq!(format.extension, ".pdf");
    }

    #[test]
    fn test_invalid_worker_count_is_rejected() {
        let args = parse(&["a", "b", "--workers", "0", "--no-metadata"]);
        assert!(args.transfer_config().is_err());
    }

    #[test]
    fn test_default_metadata_name() {
        let args = parse(&["a", "b"]);
        let path = args.metadata_path().unwrap();
        let name = path.to_string_lossy();
        assert!(name.starts_with("transfer_metadata_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "transfer_metadata_20240101_120000.csv".len());
    }

    #[test]
    fn test_metadata_flags_conflict() {
        let result = CliArgs::try_parse_from(["tree-transfer", "a", "b", "--metadata", "x.csv", "--no-metadata"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_export_rule_parsing() {
        assert!(parse_export_rule("a=b").is_err());
        let (source, format) = parse_export_rule("x/y=application/zip,.zip").unwrap();
        assert_eq!(source, "x/y");
        assert_eq!(format.mime_type, "application/zip");
    }

    #[test]
    fn test_list_mode_needs_no_destination() {
        let args = parse(&["s3://bucket/photos", "--list", "--metadata", "tree.json"]);
        assert!(args.list);
        assert!(args.destination.is_none());
        assert!(matches!(args.source, Endpoint::S3 { .. }));
        let config = args.transfer_config().unwrap();
        assert_eq!(config.metadata_output.unwrap().format, MetadataFormat::Json);

        let default_name = parse(&["./photos", "--list"]).metadata_path().unwrap();
        assert!(default_name.to_string_lossy().starts_with("transfer_inventory_"));
    }

    #[test]
    fn test_destination_required_outside_list_mode() {
        assert!(CliArgs::try_parse_from(["tree-transfer", "./photos"]).is_err());
        assert!(CliArgs::try_parse_from(["tree-transfer", "a", "b", "--list"]).is_err());
    }

    #[test]
    fn test_s3_flags_reach_connection() {
        let args = parse(&[
            "./photos",
            "s3://bucket/backup",
            "--s3-region",
            "eu-west-1",
            "--s3-endpoint",
            "http://localhost:9000",
            "--s3-path-style",
        ]);
        let connection = args.connection();
        assert_eq!(connection.s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(connection.s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert!(connection.s3.force_path_style);
    }
}
