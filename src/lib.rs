//! asterix-decode: ASTERIX CAT021/CAT048 surveillance message decoding.
//!
//! No async, no network I/O, just algorithms: record framing, FSPEC/UAP
//! field dispatch, comm-B register extraction, and the WGS-84 transform
//! stack that backs out latitude/longitude from radar slant polar plots.

pub mod bds;
pub mod cat21;
pub mod cat48;
pub mod decoder;
pub mod framer;
pub mod fspec;
pub mod geo;
pub mod types;

// Re-export commonly used types at crate root
pub use cat21::Cat21;
pub use cat48::Cat48;
pub use decoder::{decode_buffer, decode_file, DecodeOptions};
pub use framer::{frame_records, RawRecord};
pub use geo::{Ecef, GeoTransform, Geodetic, RadarCartesian, RadarPolar, Stereographic};
pub use types::{AsterixError, DecodedMessage, FieldError, Result};
