//! On-disk flow log format
//!
//! A log is a 16-byte [`LogHeader`] followed by flow records until end of
//! file. All integers are big-endian.

pub mod crc32;
pub mod fields;
pub mod header;
pub mod reader;
pub mod record;

// Re-export the pieces most callers need
pub use crc32::{crc32, Crc32};
pub use fields::{FieldDescriptor, FieldId, FieldMask, FieldShape, Slot, FIELD_TABLE};
pub use header::LogHeader;
pub use reader::{FlowLog, Records};
pub use record::{decode_field, decode_record};
