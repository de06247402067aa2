//! Top-level decode orchestration.
//!
//! Frames the input buffer into records, dispatches each record to its
//! category decoder, and optionally fans the per-record work out over a
//! rayon thread pool. Records of unsupported categories are dropped.
//! Decoding one record never affects another: the category decoders are
//! total functions over their payload bytes.

use std::path::Path;

use log::{debug, info};
use rayon::prelude::*;

use crate::cat21::decode_cat21;
use crate::cat48::decode_cat48;
use crate::framer::{frame_records, RawRecord};
use crate::geo::{GeoTransform, Geodetic};
use crate::types::{AsterixError, DecodedMessage, Result};

/// Worker cap; beyond this the per-record work is too small to scale.
const MAX_WORKERS: usize = 8;

/// Decode configuration.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Decode records on a thread pool. Output order is unaffected.
    pub parallel: bool,
    /// Stop framing after this many records.
    pub max_messages: Option<usize>,
    /// Radar site (lat/lon radians, height meters) for the CAT048
    /// position backout. Without it CAT048 records decode but carry no
    /// WGS-84 position.
    pub radar_site: Option<Geodetic>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            parallel: true,
            max_messages: None,
            radar_site: None,
        }
    }
}

fn decode_record(
    record: &RawRecord<'_>,
    geo: &GeoTransform,
    site: Option<Geodetic>,
) -> Option<DecodedMessage> {
    match record.category {
        21 => Some(DecodedMessage::Cat21(decode_cat21(record.payload))),
        48 => Some(DecodedMessage::Cat48(decode_cat48(record.payload, geo, site))),
        other => {
            debug!("skipping record of unsupported category {other}");
            None
        }
    }
}

fn worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.saturating_sub(1).clamp(1, MAX_WORKERS)
}

/// Decode every supported record in `buf`, in stream order.
pub fn decode_buffer(buf: &[u8], options: &DecodeOptions) -> Vec<DecodedMessage> {
    let records = frame_records(buf, options.max_messages);
    let geo = GeoTransform::new();
    let site = options.radar_site;

    let decoded: Vec<Option<DecodedMessage>> = if options.parallel {
        match rayon::ThreadPoolBuilder::new().num_threads(worker_count()).build() {
            Ok(pool) => pool.install(|| {
                records
                    .par_iter()
                    .map(|r| decode_record(r, &geo, site))
                    .collect()
            }),
            Err(e) => {
                debug!("thread pool unavailable ({e}), decoding sequentially");
                records.iter().map(|r| decode_record(r, &geo, site)).collect()
            }
        }
    } else {
        records.iter().map(|r| decode_record(r, &geo, site)).collect()
    };

    decoded.into_iter().flatten().collect()
}

/// Read a file and decode it with [`decode_buffer`].
pub fn decode_file<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> Result<Vec<DecodedMessage>> {
    let buf = std::fs::read(path.as_ref()).map_err(AsterixError::Io)?;
    let messages = decode_buffer(&buf, options);
    info!(
        "decoded {} messages from {} ({} bytes)",
        messages.len(),
        path.as_ref().display(),
        buf.len()
    );
    Ok(messages)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal CAT021 record: SAC/SIC + high-resolution position.
    fn cat21_record(sac: u8, lat_raw: i32, lon_raw: i32) -> Vec<u8> {
        let mut payload = vec![0b1000_0010, sac, 0x05];
        payload.extend_from_slice(&lat_raw.to_be_bytes());
        payload.extend_from_slice(&lon_raw.to_be_bytes());
        let mut rec = vec![21];
        rec.extend_from_slice(&((payload.len() + 3) as u16).to_be_bytes());
        rec.extend(payload);
        rec
    }

    /// Minimal CAT048 record: SAC/SIC only.
    fn cat48_record(sac: u8) -> Vec<u8> {
        vec![48, 0x00, 0x06, 0b1000_0000, sac, 0x0E]
    }

    fn sequential() -> DecodeOptions {
        DecodeOptions { parallel: false, ..Default::default() }
    }

    #[test]
    fn test_mixed_categories_in_order() {
        let mut buf = cat21_record(1, 1 << 28, 0);
        buf.extend(cat48_record(2));
        buf.extend(cat21_record(3, 0, 1 << 28));
        let messages = decode_buffer(&buf, &sequential());
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].category(), 21);
        assert_eq!(messages[1].category(), 48);
        match &messages[2] {
            DecodedMessage::Cat21(m) => assert_eq!(m.sac, Some(3)),
            other => panic!("expected Cat21, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_category_dropped() {
        let mut buf = vec![62, 0x00, 0x05, 0xAA, 0xBB];
        buf.extend(cat48_record(7));
        let messages = decode_buffer(&buf, &sequential());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].category(), 48);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut buf = Vec::new();
        for i in 0..40u8 {
            buf.extend(cat21_record(i, (i as i32) << 20, -((i as i32) << 19)));
            buf.extend(cat48_record(i));
        }
        let seq = decode_buffer(&buf, &sequential());
        let par = decode_buffer(&buf, &DecodeOptions::default());
        assert_eq!(seq.len(), 80);
        assert_eq!(seq, par, "parallel output must match sequential order and content");
    }

    #[test]
    fn test_max_messages_cap() {
        let mut buf = Vec::new();
        for i in 0..10u8 {
            buf.extend(cat48_record(i));
        }
        let messages = decode_buffer(
            &buf,
            &DecodeOptions { max_messages: Some(4), parallel: false, ..Default::default() },
        );
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn test_truncated_tail_keeps_prior_records() {
        let mut buf = cat48_record(1);
        buf.extend_from_slice(&[48, 0x00, 0x20, 0x80]); // claims 32 octets
        let messages = decode_buffer(&buf, &sequential());
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_decode_file_missing() {
        let err = decode_file("/nonexistent/asterix.bin", &sequential());
        assert!(matches!(err, Err(AsterixError::Io(_))));
    }
}
