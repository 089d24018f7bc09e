//! MRT record framing.
//!
//! Every MRT record starts with a 12-byte common header whose last field is
//! the length of the rest of the record. [`RecordReader`] reads exactly one
//! header plus `length` bytes per call and only then hands the bytes to
//! `bgpkit-parser`, so a record that fails to decode (unknown type or
//! subtype, bad body, oversized length) never shifts the position of the
//! records after it.

use bgpkit_parser::{parse_mrt_record, MrtRecord};
use std::io::{ErrorKind, Read};

/// Size of the MRT common header.
pub const MRT_HEADER_LEN: usize = 12;

/// Records longer than this are not decoded; their bytes are discarded.
pub const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// One step through an archive.
#[derive(Debug)]
pub enum Frame {
    Record(Box<MrtRecord>),
    /// A complete record that could not be decoded
    Malformed(String),
    /// Clean end of the archive, on a record boundary
    End,
}

/// Reads an archive one framed record at a time.
///
/// Errors returned by [`RecordReader::next_frame`] concern the stream
/// itself (I/O failure, archive truncated inside a record); nothing after
/// them can be read.
pub struct RecordReader<R> {
    input: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    pub fn next_frame(&mut self) -> std::io::Result<Frame> {
        let mut header = [0u8; MRT_HEADER_LEN];
        let filled = read_full(&mut self.input, &mut header)?;
        if filled == 0 {
            return Ok(Frame::End);
        }
        if filled < MRT_HEADER_LEN {
            return Err(truncated(format!(
                "archive ends inside a record header ({} of {} bytes)",
                filled, MRT_HEADER_LEN
            )));
        }

        let length = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        if length > MAX_RECORD_LEN {
            let discarded =
                std::io::copy(&mut (&mut self.input).take(length as u64), &mut std::io::sink())?;
            if discarded < length as u64 {
                return Err(truncated(format!(
                    "archive ends inside a record body ({} of {} bytes)",
                    discarded, length
                )));
            }
            return Ok(Frame::Malformed(format!(
                "record length {} exceeds {} bytes",
                length, MAX_RECORD_LEN
            )));
        }

        let mut bytes = vec![0u8; MRT_HEADER_LEN + length];
        bytes[..MRT_HEADER_LEN].copy_from_slice(&header);
        let body = read_full(&mut self.input, &mut bytes[MRT_HEADER_LEN..])?;
        if body < length {
            return Err(truncated(format!(
                "archive ends inside a record body ({} of {} bytes)",
                body, length
            )));
        }

        match parse_mrt_record(&mut bytes.as_slice()) {
            Ok(record) => Ok(Frame::Record(Box::new(record))),
            Err(e) => Ok(Frame::Malformed(e.to_string())),
        }
    }
}

fn truncated(msg: String) -> std::io::Error {
    std::io::Error::new(ErrorKind::UnexpectedEof, msg)
}

/// Fill `buf` as far as the input allows, returning the number of bytes read.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
