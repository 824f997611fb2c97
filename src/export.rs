//! CSV export of the record set: `id,type,value,timestamp,uid`, one row per
//! record, artifact named `{subset}_sensors_data.csv`. An empty subset is the
//! header row alone.

use chrono::SecondsFormat;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::{SensorKind, SensorRecord};
use crate::error::ConsoleError;

const HEADER: [&str; 5] = ["id", "type", "value", "timestamp", "uid"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportSubset {
    #[default]
    All,
    Temperature,
    Luminosity,
}

impl ExportSubset {
    pub fn name(self) -> &'static str {
        match self {
            ExportSubset::All => "all",
            ExportSubset::Temperature => "temperature",
            ExportSubset::Luminosity => "luminosity",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}_sensors_data.csv", self.name())
    }

    /// kinds in export order
    pub fn kinds(self) -> &'static [SensorKind] {
        match self {
            ExportSubset::All => &SensorKind::ALL,
            ExportSubset::Temperature => &[SensorKind::Temperature],
            ExportSubset::Luminosity => &[SensorKind::Luminosity],
        }
    }
}

impl fmt::Display for ExportSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportSubset {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ExportSubset::All),
            "temperature" => Ok(ExportSubset::Temperature),
            "luminosity" => Ok(ExportSubset::Luminosity),
            other => Err(ConsoleError::ValidationFailed(format!(
                "unknown export subset '{}'",
                other
            ))),
        }
    }
}

pub struct Exporter {
    directory: PathBuf,
}

impl Exporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn render(records: &[&SensorRecord]) -> Result<Vec<u8>, ConsoleError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADER).map_err(export_error)?;
        for record in records {
            let value = record.value.plain();
            let timestamp = record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
            let uid = record.uid.to_string();
            writer
                .write_record([record.id.as_str(), record.kind.segment(), value.as_str(), timestamp.as_str(), uid.as_str()])
                .map_err(export_error)?;
        }
        writer.into_inner().map_err(|e| ConsoleError::Export(e.to_string()))
    }

    /// Write `{subset}_sensors_data.csv` into the export directory.
    pub fn write(&self, subset: ExportSubset, records: &[&SensorRecord]) -> Result<PathBuf, ConsoleError> {
        let bytes = Self::render(records)?;
        let path = self.path_for(subset);
        std::fs::write(&path, bytes).map_err(|e| ConsoleError::Export(format!("{}: {}", path.display(), e)))?;
        tracing::info!("[EXPORT] {} data exported to {} ({} records)", subset, path.display(), records.len());
        Ok(path)
    }

    pub fn path_for(&self, subset: ExportSubset) -> PathBuf {
        self.directory.join(subset.file_name())
    }
}

fn export_error(error: csv::Error) -> ConsoleError {
    ConsoleError::Export(error.to_string())
}
