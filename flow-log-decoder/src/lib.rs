//! Flow Log Decoder Library
//!
//! A stateless, reusable library for reading the binary flow logs written by
//! the `flowd` NetFlow collector and rendering them as text.
//!
//! # Architecture
//!
//! - [`store`] holds the on-disk format: CRC-32 engine, field table, record
//!   decoder and the log reader that ties them together
//! - [`format`] renders decoded records as single-line text
//! - [`time`] renders timestamps and intervals
//!
//! The library does NOT write logs, capture traffic or interpret field values
//! beyond their length and checksum. Opening files from the command line,
//! choosing masks and picking output destinations is left to the application
//! layer (flow-log-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use flow_log_decoder::{FlowFormatter, FlowLog, FormatConfig};
//! use std::path::Path;
//!
//! let mut log = FlowLog::open_path(Path::new("flowd.log")).unwrap();
//! let formatter = FlowFormatter::new(FormatConfig::new().with_utc(true));
//!
//! for record in log.records() {
//!     match record {
//!         Ok(flow) => println!("{}", formatter.format(&flow)),
//!         Err(e) => eprintln!("Decode error: {}", e),
//!     }
//! }
//! ```

// Public modules
pub mod config;
pub mod format;
pub mod store;
pub mod time;
pub mod types;

// Re-export main types for convenience
pub use config::FormatConfig;
pub use format::{format_flow, format_header_line, FlowFormatter};
pub use store::{decode_record, Crc32, FieldId, FieldMask, FlowLog, LogHeader};
pub use time::{interval_time, interval_time_ms, iso_time};
pub use types::{
    AddressFamily, DecoderError, FieldValue, FlowRecord, Key, MaskedRecord, Result, Value,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
