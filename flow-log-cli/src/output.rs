//! Record output (text lines or JSON lines)

use crate::config::OutputFormat;
use anyhow::Result;
use flow_log_decoder::{FlowFormatter, FlowRecord, LogHeader};
use serde_json::json;
use std::io::Write;

/// Writes log headers and records in the chosen format
pub struct Printer<W: Write> {
    out: W,
    format: OutputFormat,
    formatter: FlowFormatter,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, format: OutputFormat, formatter: FlowFormatter) -> Self {
        Self { out, format, formatter }
    }

    /// Announce the start of a log file
    pub fn header(&mut self, path: &str, header: &LogHeader) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.out, "{}", self.formatter.format_header(path, header))?
            }
            OutputFormat::Json => {
                let value = json!({ "logfile": path, "header": header });
                serde_json::to_writer(&mut self.out, &value)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn record(&mut self, record: &FlowRecord) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", self.formatter.format(record))?,
            OutputFormat::Json => {
                let mask = self.formatter.config().field_mask;
                serde_json::to_writer(&mut self.out, &record.masked(mask))?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
