//! Split a raw byte stream into ASTERIX records.
//!
//! Responsibilities:
//! - Walk the stream record by record using the 3-octet header
//!   (category, big-endian total length including the header)
//! - Stop cleanly on truncation, keeping every complete record seen so far
//! - Enforce an optional cap on the number of records returned
//!
//! The framer does not look inside payloads; category dispatch happens in
//! `decoder`.

use log::warn;

use crate::types::be_u16;

/// Octets in the record header: category + 16-bit length.
pub const HEADER_LEN: usize = 3;

/// One framed ASTERIX record, payload borrowed from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub category: u8,
    /// Declared total length including the 3-octet header.
    pub length: u16,
    /// Record body: FSPEC plus data items.
    pub payload: &'a [u8],
}

/// Walk `buf` and collect complete records, at most `max_records` if set.
///
/// A declared length shorter than the header or running past the end of the
/// buffer terminates the walk; records framed before that point are kept.
pub fn frame_records(buf: &[u8], max_records: Option<usize>) -> Vec<RawRecord<'_>> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos + HEADER_LEN <= buf.len() {
        if let Some(cap) = max_records {
            if records.len() >= cap {
                break;
            }
        }

        let category = buf[pos];
        let length = be_u16(&buf[pos + 1..pos + 3]);
        if (length as usize) < HEADER_LEN {
            warn!("record at offset {pos}: declared length {length} shorter than header, stopping");
            break;
        }
        let end = pos + length as usize;
        if end > buf.len() {
            warn!(
                "record at offset {pos}: declared length {length} runs past end of buffer ({} octets left), stopping",
                buf.len() - pos
            );
            break;
        }

        records.push(RawRecord {
            category,
            length,
            payload: &buf[pos + HEADER_LEN..end],
        });
        pos = end;
    }

    records
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: u8, payload: &[u8]) -> Vec<u8> {
        let len = (HEADER_LEN + payload.len()) as u16;
        let mut out = vec![category];
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_frame_single_record() {
        let buf = record(48, &[0xAA, 0xBB]);
        let recs = frame_records(&buf, None);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].category, 48);
        assert_eq!(recs[0].length, 5);
        assert_eq!(recs[0].payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_frame_lengths_sum_to_buffer() {
        let mut buf = record(21, &[1, 2, 3, 4]);
        buf.extend(record(48, &[5, 6]));
        buf.extend(record(62, &[7]));
        let recs = frame_records(&buf, None);
        assert_eq!(recs.len(), 3);
        let total: usize = recs.iter().map(|r| r.length as usize).sum();
        assert_eq!(total, buf.len(), "record lengths should cover the whole buffer");
    }

    #[test]
    fn test_frame_truncated_final_record() {
        let mut buf = record(21, &[1, 2, 3]);
        // Header claims 10 octets but only 4 follow
        buf.extend_from_slice(&[48, 0x00, 0x0A, 0xFF]);
        let recs = frame_records(&buf, None);
        assert_eq!(recs.len(), 1, "only the complete record should survive");
        assert_eq!(recs[0].category, 21);
    }

    #[test]
    fn test_frame_undersized_length_stops() {
        let mut buf = record(48, &[9]);
        buf.extend_from_slice(&[21, 0x00, 0x02]);
        buf.extend(record(48, &[8]));
        let recs = frame_records(&buf, None);
        // Length 2 < header, walk stops, later record is unreachable
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn test_frame_record_cap() {
        let mut buf = Vec::new();
        for i in 0..5u8 {
            buf.extend(record(48, &[i]));
        }
        let recs = frame_records(&buf, Some(2));
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].payload, &[1]);
    }

    #[test]
    fn test_frame_empty_and_header_only() {
        assert!(frame_records(&[], None).is_empty());
        assert!(frame_records(&[48, 0x00], None).is_empty());
        let recs = frame_records(&[48, 0x00, 0x03], None);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].payload.is_empty());
    }
}
