//! Flow log reader
//!
//! Validates the log header, then hands out records one at a time. Reading is
//! strictly sequential: the reader never seeks and never buffers more than the
//! record being decoded. A decode error ends the stream, since there is no
//! reliable way to find the next record boundary after a corrupt one.

use crate::store::header::LogHeader;
use crate::store::record::{decode_record, read_full};
use crate::types::{DecoderError, FlowRecord, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug)]
enum State {
    Open,
    /// An earlier record failed to decode
    Aborted,
    /// Source exhausted at a record boundary
    Finished,
    Closed,
}

/// An open flow log
pub struct FlowLog<R: Read> {
    source: Option<R>,
    header: LogHeader,
    state: State,
    records_read: u64,
}

impl FlowLog<BufReader<File>> {
    /// Open a flow log file with buffered reading
    pub fn open_path(path: &Path) -> Result<Self> {
        log::info!("Opening flow log: {:?}", path);
        let file = File::open(path)?;
        FlowLog::open(BufReader::new(file))
    }
}

impl<R: Read> FlowLog<R> {
    /// Read and validate the header from `source`
    pub fn open(mut source: R) -> Result<Self> {
        let mut buf = [0u8; LogHeader::SIZE];
        let got = read_full(&mut source, &mut buf)?;
        if got < LogHeader::SIZE {
            return Err(DecoderError::ShortHeader { got });
        }
        let header = LogHeader::parse(&buf)?;
        log::debug!(
            "Flow log header: version {}, start_time {}, flags 0x{:08x}",
            header.version,
            header.start_time,
            header.flags
        );

        Ok(FlowLog {
            source: Some(source),
            header,
            state: State::Open,
            records_read: 0,
        })
    }

    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    pub fn start_time(&self) -> u32 {
        self.header.start_time
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    /// Records successfully decoded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Decode the next record. `Ok(None)` means the log ended cleanly.
    pub fn next_record(&mut self) -> Result<Option<FlowRecord>> {
        match self.state {
            State::Open => {}
            State::Finished => return Ok(None),
            State::Aborted => return Err(DecoderError::StreamAborted),
            State::Closed => return Err(DecoderError::Closed),
        }
        let source = self.source.as_mut().ok_or(DecoderError::Closed)?;

        match decode_record(source) {
            Ok(Some(record)) => {
                self.records_read += 1;
                Ok(Some(record))
            }
            Ok(None) => {
                log::debug!("End of flow log after {} records", self.records_read);
                self.state = State::Finished;
                Ok(None)
            }
            Err(e) => {
                log::debug!("Aborting flow log after {} records: {}", self.records_read, e);
                self.state = State::Aborted;
                Err(e)
            }
        }
    }

    /// Release the underlying source. Calling this more than once is harmless.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::debug!("Closed flow log after {} records", self.records_read);
        }
        self.state = State::Closed;
    }

    /// Iterate over the remaining records
    pub fn records(&mut self) -> Records<'_, R> {
        Records { log: self, done: false }
    }
}

/// Iterator over the records of a [`FlowLog`]. Yields the first decode error
/// and then stops.
pub struct Records<'a, R: Read> {
    log: &'a mut FlowLog<R>,
    done: bool,
}

impl<'a, R: Read> Iterator for Records<'a, R> {
    type Item = Result<FlowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.log.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> Iterator for FlowLog<R> {
    type Item = Result<FlowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if !matches!(self.state, State::Open) {
            return None;
        }
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::crc32::crc32;
    use crate::store::fields::FieldMask;

    fn header(magic: u32, version: u32, start: u32, flags: u32) -> Vec<u8> {
        [magic, version, start, flags]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect()
    }

    fn tag_record(tag: u32) -> Vec<u8> {
        let mut out = (FieldMask::TAG | FieldMask::CRC32).bits().to_be_bytes().to_vec();
        out.extend_from_slice(&tag.to_be_bytes());
        let crc = crc32(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    #[test]
    fn test_open_exposes_header() {
        let bytes = header(LogHeader::MAGIC, 2, 1_234_567_890, 7);
        let log = FlowLog::open(bytes.as_slice()).unwrap();
        assert_eq!(log.start_time(), 1_234_567_890);
        assert_eq!(log.flags(), 7);
        assert_eq!(log.header().version, LogHeader::VERSION);
    }

    #[test]
    fn test_short_header() {
        let bytes = header(LogHeader::MAGIC, 2, 0, 0);
        let err = FlowLog::open(&bytes[..15]).err().unwrap();
        assert!(matches!(err, DecoderError::ShortHeader { got: 15 }));
    }

    #[test]
    fn test_bad_magic() {
        let bytes = header(0, 2, 0, 0);
        let err = FlowLog::open(bytes.as_slice()).err().unwrap();
        assert!(matches!(err, DecoderError::BadMagic(0)));
    }

    #[test]
    fn test_reads_until_end() {
        let mut bytes = header(LogHeader::MAGIC, 2, 0, 0);
        bytes.extend(tag_record(1));
        bytes.extend(tag_record(2));

        let mut log = FlowLog::open(bytes.as_slice()).unwrap();
        let tags: Vec<u32> = log.records().map(|r| r.unwrap().tag().unwrap()).collect();
        assert_eq!(tags, vec![1, 2]);
        assert_eq!(log.records_read(), 2);
        assert!(log.next_record().unwrap().is_none());
    }

    #[test]
    fn test_error_aborts_stream() {
        let mut bytes = header(LogHeader::MAGIC, 2, 0, 0);
        let mut bad = tag_record(1);
        bad[6] ^= 0xff;
        bytes.extend(bad);
        bytes.extend(tag_record(2));

        let mut log = FlowLog::open(bytes.as_slice()).unwrap();
        let results: Vec<Result<FlowRecord>> = log.records().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DecoderError::ChecksumMismatch { .. })));
        assert!(matches!(log.next_record(), Err(DecoderError::StreamAborted)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut bytes = header(LogHeader::MAGIC, 2, 0, 0);
        bytes.extend(tag_record(1));
        let mut log = FlowLog::open(bytes.as_slice()).unwrap();
        log.close();
        log.close();
        assert!(matches!(log.next_record(), Err(DecoderError::Closed)));
        assert!(log.next().is_none());
    }

    #[test]
    fn test_log_is_an_iterator() {
        let mut bytes = header(LogHeader::MAGIC, 2, 0, 0);
        bytes.extend(tag_record(5));
        let log = FlowLog::open(bytes.as_slice()).unwrap();
        let records: Vec<FlowRecord> = log.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag(), Some(5));
    }

    #[test]
    fn test_mut_log_in_for_loop() {
        let mut bytes = header(LogHeader::MAGIC, 2, 0, 0);
        bytes.extend(tag_record(3));
        bytes.extend(tag_record(4));
        let mut log = FlowLog::open(bytes.as_slice()).unwrap();
        let mut tags = Vec::new();
        for record in &mut log {
            tags.push(record.unwrap().tag().unwrap());
        }
        assert_eq!(tags, vec![3, 4]);
        assert_eq!(log.records_read(), 2);
    }
}
