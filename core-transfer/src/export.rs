//! Serialization of run records to CSV or JSON.

use crate::error::{Result, TransferError};
use crate::stats::{Stats, TransferRecord};
use core_runtime::config::{MetadataFormat, MetadataOutput};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::info;

/// Writes a [`Stats`] snapshot to a sink
pub trait MetadataExporter {
    fn export(&self, stats: &Stats, sink: &mut dyn Write) -> Result<()>;
}

/// One header row followed by one row per record
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvExporter;

impl MetadataExporter for CsvExporter {
    fn export(&self, stats: &Stats, sink: &mut dyn Write) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);

        writer
            .write_record(TransferRecord::COLUMNS)
            .map_err(|e| TransferError::Export(e.to_string()))?;
        for record in &stats.records {
            writer
                .serialize(record)
                .map_err(|e| TransferError::Export(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| TransferError::Export(e.to_string()))
    }
}

/// Pretty-printed totals and records
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter;

impl MetadataExporter for JsonExporter {
    fn export(&self, stats: &Stats, sink: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *sink, stats)
            .map_err(|e| TransferError::Export(e.to_string()))?;
        sink.write_all(b"\n")
            .and_then(|_| sink.flush())
            .map_err(|e| TransferError::Export(e.to_string()))
    }
}

pub fn exporter_for(format: MetadataFormat) -> Box<dyn MetadataExporter + Send + Sync> {
    match format {
        MetadataFormat::Csv => Box::new(CsvExporter),
        MetadataFormat::Json => Box::new(JsonExporter),
    }
}

/// Opens the output file, creating parent directories
pub(crate) fn create_sink(output: &MetadataOutput) -> Result<BufWriter<File>> {
    if let Some(parent) = output.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            TransferError::Export(format!("{}: {}", parent.display(), e))
        })?;
    }

    let file = File::create(&output.path)
        .map_err(|e| TransferError::Export(format!("{}: {}", output.path.display(), e)))?;
    Ok(BufWriter::new(file))
}

/// Write `stats` to the configured file, creating parent directories
pub fn export_metadata(stats: &Stats, output: &MetadataOutput) -> Result<()> {
    let mut sink = create_sink(output)?;
    exporter_for(output.format).export(stats, &mut sink)?;

    info!(
        path = %output.path.display(),
        format = output.format.extension(),
        records = stats.records.len(),
        "Metadata exported"
    );
    Ok(())
}
