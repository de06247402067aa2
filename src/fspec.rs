//! FSPEC presence octets and table-driven UAP field dispatch.
//!
//! Responsibilities:
//! - Read the leading FSPEC (7 presence bits + FX continuation per octet)
//!   into an ascending list of Field Reference Numbers
//! - Re-encode an FRN list back to its minimal FSPEC form
//! - Drive a category's UAP table over the payload, stopping at the first
//!   unknown FRN or short field so the octet cursor never desynchronizes

use log::warn;

use crate::types::FieldError;

/// Cap on FSPEC octets; real streams need at most 7 for CAT021.
pub const MAX_FSPEC_OCTETS: usize = 8;

/// Cap on octets consumed by any other FX-extended run.
pub const MAX_FX_OCTETS: usize = 16;

// ---------------------------------------------------------------------------
// FSPEC read / encode
// ---------------------------------------------------------------------------

/// Read the FSPEC at the start of `data`.
///
/// Returns the present FRNs in ascending order and the number of octets
/// consumed. The loop is bounded by [`MAX_FSPEC_OCTETS`] even if the FX
/// bit never clears.
pub fn read_fspec(data: &[u8]) -> (Vec<u8>, usize) {
    let mut frns = Vec::new();
    let mut consumed = 0;

    for (octet_idx, &octet) in data.iter().take(MAX_FSPEC_OCTETS).enumerate() {
        consumed += 1;
        for bit in 0..7 {
            if octet & (0x80 >> bit) != 0 {
                frns.push((octet_idx * 7 + bit + 1) as u8);
            }
        }
        if octet & 0x01 == 0 {
            break;
        }
        if octet_idx + 1 == MAX_FSPEC_OCTETS {
            warn!("FSPEC FX chain exceeds {MAX_FSPEC_OCTETS} octets, truncating");
        }
    }

    (frns, consumed)
}

/// Re-encode an ascending FRN list as a minimal FSPEC.
///
/// Inverse of [`read_fspec`] for any FSPEC with no trailing all-zero
/// octets.
pub fn encode_fspec(frns: &[u8]) -> Vec<u8> {
    let octets = match frns.last() {
        Some(&max) => (max as usize).div_ceil(7),
        None => return vec![0],
    };
    let mut out = vec![0u8; octets];
    for &frn in frns {
        let idx = (frn as usize - 1) / 7;
        let bit = (frn as usize - 1) % 7;
        out[idx] |= 0x80 >> bit;
    }
    for octet in &mut out[..octets - 1] {
        *octet |= 0x01;
    }
    out
}

/// Length of an FX-extended run starting at `data[0]`, bounded by
/// [`MAX_FX_OCTETS`].
pub fn fx_run_len(data: &[u8]) -> Result<usize, FieldError> {
    for (i, &octet) in data.iter().take(MAX_FX_OCTETS).enumerate() {
        if octet & 0x01 == 0 {
            return Ok(i + 1);
        }
    }
    if data.len() >= MAX_FX_OCTETS {
        warn!("FX run exceeds {MAX_FX_OCTETS} octets, truncating");
        return Ok(MAX_FX_OCTETS);
    }
    Err(FieldError::InsufficientData {
        needed: data.len() + 1,
        remaining: data.len(),
    })
}

// ---------------------------------------------------------------------------
// UAP tables and dispatch
// ---------------------------------------------------------------------------

/// How to decode one data item for message type `M`.
pub(crate) enum FieldDecoder<M: 'static> {
    /// Fixed-length item, `apply` gets exactly `octets` bytes.
    Fixed {
        octets: usize,
        apply: fn(&mut M, &[u8]),
    },
    /// Fixed-length item that is parsed for the cursor but not kept.
    Skip(usize),
    /// FX-extended item that is not kept.
    SkipFx,
    /// Variable-length item; returns octets consumed.
    Dynamic(fn(&mut M, &[u8]) -> Result<usize, FieldError>),
}

/// One UAP entry: FRN, item name for diagnostics, decoder.
pub(crate) struct FieldSpec<M: 'static> {
    pub frn: u8,
    pub name: &'static str,
    pub decoder: FieldDecoder<M>,
}

/// Apply a UAP table to the data items following the FSPEC.
///
/// `frns` must be ascending (as produced by [`read_fspec`]). Decoding stops
/// at the first unknown FRN or short field; everything decoded before the
/// stop point stays on `msg`. Returns the final cursor position.
pub(crate) fn dispatch_fields<M>(
    msg: &mut M,
    category: u8,
    uap: &[FieldSpec<M>],
    frns: &[u8],
    data: &[u8],
    start: usize,
) -> usize {
    let mut pos = start;

    for &frn in frns {
        let spec = match uap.iter().find(|s| s.frn == frn) {
            Some(s) => s,
            None => {
                let e = FieldError::UnknownField(frn);
                warn!("CAT{category:03}: {e}, stopping at octet {pos}");
                break;
            }
        };
        let remaining = &data[pos..];
        let consumed = match spec.decoder {
            FieldDecoder::Fixed { octets, apply } => {
                if remaining.len() < octets {
                    warn!(
                        "CAT{category:03} {}: needs {octets} octets, {} remain, stopping",
                        spec.name,
                        remaining.len()
                    );
                    break;
                }
                apply(msg, &remaining[..octets]);
                octets
            }
            FieldDecoder::Skip(octets) => {
                if remaining.len() < octets {
                    warn!(
                        "CAT{category:03} {}: needs {octets} octets, {} remain, stopping",
                        spec.name,
                        remaining.len()
                    );
                    break;
                }
                octets
            }
            FieldDecoder::SkipFx => match fx_run_len(remaining) {
                Ok(n) => n,
                Err(e) => {
                    warn!("CAT{category:03} {}: {e}, stopping", spec.name);
                    break;
                }
            },
            FieldDecoder::Dynamic(apply) => match apply(msg, remaining) {
                Ok(n) => n,
                Err(e) => {
                    warn!("CAT{category:03} {}: {e}, stopping", spec.name);
                    break;
                }
            },
        };
        pos += consumed;
    }

    pos
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_single_octet_fspec() {
        // Bits 1, 3, 5 set, FX clear
        let (frns, consumed) = read_fspec(&[0b1010_1000]);
        assert_eq!(frns, vec![1, 3, 5]);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_read_extended_fspec() {
        // First octet: FRN 1 + FX, second octet: FRN 8 and 14
        let (frns, consumed) = read_fspec(&[0b1000_0001, 0b1000_0010]);
        assert_eq!(frns, vec![1, 8, 14]);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_fspec_fx_chain_bounded() {
        let data = [0xFFu8; 12];
        let (frns, consumed) = read_fspec(&data);
        assert_eq!(consumed, MAX_FSPEC_OCTETS);
        assert_eq!(frns.len(), MAX_FSPEC_OCTETS * 7);
    }

    #[test]
    fn test_encode_round_trip() {
        for fspec in [
            vec![0b1010_1000u8],
            vec![0b1000_0001, 0b1000_0010],
            vec![0b1111_1111, 0b1111_1111, 0b0000_0010],
            vec![0b0000_0011, 0b0100_0000],
        ] {
            let (frns, consumed) = read_fspec(&fspec);
            assert_eq!(consumed, fspec.len());
            assert_eq!(encode_fspec(&frns), fspec, "round trip of {fspec:?}");
        }
    }

    #[test]
    fn test_fx_run_len() {
        assert_eq!(fx_run_len(&[0x00]), Ok(1));
        assert_eq!(fx_run_len(&[0x01, 0x01, 0x00, 0xFE]), Ok(3));
        assert_eq!(
            fx_run_len(&[0x01]),
            Err(FieldError::InsufficientData { needed: 2, remaining: 1 })
        );
    }

    // Tiny message type for dispatch tests
    #[derive(Default)]
    struct Probe {
        a: Option<u8>,
        b: Option<u16>,
    }

    const PROBE_UAP: &[FieldSpec<Probe>] = &[
        FieldSpec {
            frn: 1,
            name: "A",
            decoder: FieldDecoder::Fixed { octets: 1, apply: |m, d| m.a = Some(d[0]) },
        },
        FieldSpec { frn: 2, name: "GAP", decoder: FieldDecoder::Skip(2) },
        FieldSpec {
            frn: 3,
            name: "B",
            decoder: FieldDecoder::Fixed {
                octets: 2,
                apply: |m, d| m.b = Some(u16::from_be_bytes([d[0], d[1]])),
            },
        },
    ];

    #[test]
    fn test_dispatch_skips_and_decodes() {
        let mut msg = Probe::default();
        let data = [0x07, 0xAA, 0xBB, 0x12, 0x34];
        let pos = dispatch_fields(&mut msg, 0, PROBE_UAP, &[1, 2, 3], &data, 0);
        assert_eq!(pos, 5);
        assert_eq!(msg.a, Some(0x07));
        assert_eq!(msg.b, Some(0x1234));
    }

    #[test]
    fn test_dispatch_stops_on_unknown_frn() {
        let mut msg = Probe::default();
        let data = [0x07, 0x12, 0x34];
        // FRN 5 is not in the UAP, FRN 3 after it must not be decoded
        let pos = dispatch_fields(&mut msg, 0, PROBE_UAP, &[1, 5, 3], &data, 0);
        assert_eq!(pos, 1);
        assert_eq!(msg.a, Some(0x07));
        assert_eq!(msg.b, None);
    }

    #[test]
    fn test_dispatch_stops_on_short_field() {
        let mut msg = Probe::default();
        let data = [0x07, 0x12];
        let pos = dispatch_fields(&mut msg, 0, PROBE_UAP, &[1, 3], &data, 0);
        assert_eq!(pos, 1, "partial field should not advance the cursor");
        assert_eq!(msg.a, Some(0x07));
        assert_eq!(msg.b, None);
    }
}
