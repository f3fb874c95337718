//! Save the sample log to disk.
//!
//! # Formats
//!
//! - CSV (default): `tag,value,timestamp` header, one row per sample in log order
//! - JSON: an array of `{tag, value, timestamp}` objects
//!
//! The format is picked from the file extension. Saving always overwrites.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;

use crate::sample::Sample;

/// File written when the user does not name one.
pub const DEFAULT_EXPORT_PATH: &str = "inspection_data.csv";

/// CSV header row.
pub const CSV_HEADER: &str = "tag,value,timestamp";

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// `.json` selects JSON; anything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Why a save failed. None of these affect the running stream.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to save: the sample log is empty")]
    EmptyLog,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode samples as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a successful save wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub rows: usize,
}

/// Write `samples` to `path`, replacing any existing file.
pub fn export_samples(path: &Path, samples: &[Sample]) -> Result<ExportSummary, ExportError> {
    if samples.is_empty() {
        return Err(ExportError::EmptyLog);
    }
    let format = ExportFormat::from_path(path);
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    match format {
        ExportFormat::Csv => write_csv(&mut out, samples).map_err(io_err)?,
        ExportFormat::Json => write_json(&mut out, samples)?,
    }
    out.flush().map_err(io_err)?;

    log::info!(
        "saved {} samples to {} ({format})",
        samples.len(),
        path.display()
    );
    Ok(ExportSummary {
        path: path.to_path_buf(),
        format,
        rows: samples.len(),
    })
}

/// Write the CSV header and one row per sample.
pub fn write_csv<W: Write>(out: &mut W, samples: &[Sample]) -> io::Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for s in samples {
        writeln!(
            out,
            "{},{},{}",
            s.tag,
            csv_field(&s.value.to_string()),
            s.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        )?;
    }
    Ok(())
}

/// Write the samples as a pretty-printed JSON array.
pub fn write_json<W: Write>(out: &mut W, samples: &[Sample]) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut *out, samples)?;
    writeln!(out).map_err(serde_json::Error::io)?;
    Ok(())
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
