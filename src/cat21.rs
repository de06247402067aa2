//! ASTERIX Category 021 (ADS-B target reports) decoder, ED-102A UAP.
//!
//! Responsibilities:
//! - Decode the operationally interesting items: data source, report
//!   descriptor, high-resolution WGS-84 position, airspeed, address,
//!   reception time, Mode 3/A, flight level, heading, target status,
//!   ground vector, identification, barometric pressure setting
//! - Skip every other item by its exact declared length so the cursor stays
//!   aligned, including the compound Met Info, Trajectory Intent, Mode S
//!   MB and Data Ages items
//! - Derive barometric altitude, corrected by the pressure setting from
//!   the expansion field when one is transmitted

use serde::Serialize;

use crate::fspec::{self, FieldDecoder, FieldSpec};
use crate::types::{
    be_i32, be_u16, be_u24, format_day_time, address_to_hex, ia5_string, mode3a_digits,
    FieldError,
};

/// High-resolution WGS-84 position LSB, degrees.
const WGS84_LSB: f64 = 180.0 / (1u64 << 30) as f64;

// ---------------------------------------------------------------------------
// Decoded message
// ---------------------------------------------------------------------------

/// Airspeed item, IAS in knots or a Mach number depending on the IM bit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "unit", content = "value")]
pub enum AirSpeed {
    Ias(f64),
    Mach(f64),
}

/// Target status labels from I021/200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub vfi: &'static str,
    pub rab: &'static str,
    pub gbs: &'static str,
    pub nrm: &'static str,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Cat21 {
    pub category: u8,
    pub sac: Option<u8>,
    pub sic: Option<u8>,
    // I021/040 target report descriptor
    pub address_type: Option<&'static str>,
    pub altitude_reporting: Option<&'static str>,
    pub range_check: Option<&'static str>,
    pub report_source: Option<&'static str>,
    pub ground_bit: Option<bool>,
    // I021/131 high-resolution position, degrees
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub air_speed: Option<AirSpeed>,
    /// I021/080, 6 hex digits.
    pub icao_address: Option<String>,
    pub time_of_reception_s: Option<f64>,
    pub time_of_reception_utc: Option<String>,
    /// I021/070, four octal digits.
    pub mode3a_code: Option<String>,
    pub flight_level: Option<f64>,
    pub altitude_ft: Option<f64>,
    pub altitude_m: Option<f64>,
    pub magnetic_heading_deg: Option<f64>,
    pub target_status: Option<TargetStatus>,
    pub ground_speed_kt: Option<f64>,
    pub track_angle_deg: Option<f64>,
    pub target_identification: Option<String>,
    /// Barometric pressure setting from the expansion field, millibars.
    pub barometric_pressure_mb: Option<f64>,
}

// ---------------------------------------------------------------------------
// Item decoders
// ---------------------------------------------------------------------------

fn apply_data_source(msg: &mut Cat21, d: &[u8]) {
    msg.sac = Some(d[0]);
    msg.sic = Some(d[1]);
}

const ATP_LABELS: [&str; 4] = [
    "24-Bit ICAO address",
    "Duplicate address",
    "Surface vehicle address",
    "Anonymous address",
];
const ARC_LABELS: [&str; 4] = ["25 ft", "100 ft", "Unknown", "Invalid"];

/// I021/040: one octet plus FX extensions. The ground bit lives at bit
/// index 2 of the first extension octet.
fn apply_report_descriptor(msg: &mut Cat21, d: &[u8]) -> Result<usize, FieldError> {
    let run = fspec::fx_run_len(d)?;
    let first = d[0];
    let atp = (first >> 5) & 0b111;
    let arc = (first >> 3) & 0b11;
    msg.address_type = Some(ATP_LABELS.get(atp as usize).copied().unwrap_or("Reserved"));
    msg.altitude_reporting = Some(ARC_LABELS[arc as usize]);
    msg.range_check = Some(if first & 0b100 == 0 {
        "Range check passed"
    } else {
        "Range check failed"
    });
    msg.report_source = Some(if first & 0b010 == 0 {
        "Report from ADS-B transceiver"
    } else {
        "Report from field monitor"
    });
    if run > 1 {
        msg.ground_bit = Some(d[1] & 0b0010_0000 != 0);
    }
    Ok(run)
}

fn apply_position_high_res(msg: &mut Cat21, d: &[u8]) {
    msg.latitude = Some(be_i32(&d[0..4]) as f64 * WGS84_LSB);
    msg.longitude = Some(be_i32(&d[4..8]) as f64 * WGS84_LSB);
}

fn apply_air_speed(msg: &mut Cat21, d: &[u8]) {
    let raw = be_u16(d);
    let magnitude = (raw & 0x3FFF) as f64;
    msg.air_speed = match raw >> 14 {
        0 => Some(AirSpeed::Ias(magnitude)),
        1 => Some(AirSpeed::Mach(magnitude * 0.001)),
        // IM 2 and 3 are not defined
        _ => None,
    };
}

fn apply_target_address(msg: &mut Cat21, d: &[u8]) {
    msg.icao_address = Some(address_to_hex(be_u24(d)));
}

fn apply_time_of_reception(msg: &mut Cat21, d: &[u8]) {
    let seconds = be_u24(d) as f64 / 128.0;
    msg.time_of_reception_s = Some(seconds);
    msg.time_of_reception_utc = Some(format_day_time(seconds));
}

fn apply_mode3a(msg: &mut Cat21, d: &[u8]) {
    msg.mode3a_code = Some(mode3a_digits(be_u16(d)));
}

fn apply_flight_level(msg: &mut Cat21, d: &[u8]) {
    let fl = be_u16(d) as i16 as f64 / 4.0;
    msg.flight_level = Some(fl);
    msg.altitude_ft = Some(fl * 100.0);
    msg.altitude_m = Some(fl * 30.48);
}

fn apply_magnetic_heading(msg: &mut Cat21, d: &[u8]) {
    msg.magnetic_heading_deg = Some(be_u16(d) as f64 * (360.0 / 65536.0));
}

fn apply_target_status(msg: &mut Cat21, d: &[u8]) {
    let v = d[0];
    let two = |code: u8, zero: &'static str, one: &'static str| match code {
        0 => zero,
        1 => one,
        _ => "Reserved",
    };
    msg.target_status = Some(TargetStatus {
        vfi: two((v >> 6) & 0b11, "Valid", "Invalid"),
        rab: two((v >> 4) & 0b11, "Reported by ADS-B", "Reported by RBM"),
        gbs: two((v >> 2) & 0b11, "No ground bit", "Ground bit set"),
        nrm: two(v & 0b11, "Normal", "Degraded"),
    });
}

fn apply_ground_vector(msg: &mut Cat21, d: &[u8]) {
    // LSB 2^-14 NM/s, reported in knots
    msg.ground_speed_kt = Some(be_u16(&d[0..2]) as f64 * (3600.0 / 16384.0));
    msg.track_angle_deg = Some(be_u16(&d[2..4]) as f64 * (360.0 / 65536.0));
}

fn apply_target_identification(msg: &mut Cat21, d: &[u8]) {
    let bits = d.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    msg.target_identification = Some(ia5_string(bits));
}

/// Met Information compound: presence octet, then wind speed (2), wind
/// direction (2), temperature (2), turbulence (1) for each set bit.
fn skip_met_info(_msg: &mut Cat21, d: &[u8]) -> Result<usize, FieldError> {
    if d.is_empty() {
        return Err(FieldError::InsufficientData { needed: 1, remaining: 0 });
    }
    let presence = d[0];
    let mut octets = 1;
    for (bit, len) in [(0x80u8, 2usize), (0x40, 2), (0x20, 2), (0x10, 1)] {
        if presence & bit != 0 {
            octets += len;
        }
    }
    if d.len() < octets {
        return Err(FieldError::InsufficientData { needed: octets, remaining: d.len() });
    }
    Ok(octets)
}

/// Repetitive item: REP octet then `rep` blocks of `block` octets.
fn skip_repetitive(d: &[u8], block: usize) -> Result<usize, FieldError> {
    if d.is_empty() {
        return Err(FieldError::InsufficientData { needed: 1, remaining: 0 });
    }
    let octets = 1 + d[0] as usize * block;
    if d.len() < octets {
        return Err(FieldError::InsufficientData { needed: octets, remaining: d.len() });
    }
    Ok(octets)
}

fn skip_trajectory_intent(_msg: &mut Cat21, d: &[u8]) -> Result<usize, FieldError> {
    skip_repetitive(d, 15)
}

fn skip_mode_s_mb(_msg: &mut Cat21, d: &[u8]) -> Result<usize, FieldError> {
    skip_repetitive(d, 8)
}

/// Data Ages: FX-terminated presence map, then one octet per present bit.
fn skip_data_ages(_msg: &mut Cat21, d: &[u8]) -> Result<usize, FieldError> {
    let (subfields, consumed) = fspec::read_fspec(d);
    let octets = consumed + subfields.len();
    if d.len() < octets {
        return Err(FieldError::InsufficientData { needed: octets, remaining: d.len() });
    }
    Ok(octets)
}

/// Expansion field: leading length octet (total, indicator included),
/// then a subfield presence octet. The only subfield decoded is the
/// barometric pressure setting, 12 bits with LSB 0.1 mb offset 800.
fn apply_expansion(msg: &mut Cat21, d: &[u8]) -> Result<usize, FieldError> {
    if d.is_empty() {
        return Err(FieldError::InsufficientData { needed: 1, remaining: 0 });
    }
    let total = d[0] as usize;
    if total < 1 || d.len() < total {
        return Err(FieldError::InsufficientData {
            needed: total.max(1),
            remaining: d.len(),
        });
    }
    if total >= 4 && d[1] & 0x80 != 0 {
        let raw = be_u16(&d[2..4]) & 0x0FFF;
        msg.barometric_pressure_mb = Some(raw as f64 * 0.1 + 800.0);
    }
    Ok(total)
}

/// Special purpose field: leading length octet, contents ignored.
fn skip_special_purpose(_msg: &mut Cat21, d: &[u8]) -> Result<usize, FieldError> {
    if d.is_empty() {
        return Err(FieldError::InsufficientData { needed: 1, remaining: 0 });
    }
    let total = (d[0] as usize).max(1);
    if d.len() < total {
        return Err(FieldError::InsufficientData { needed: total, remaining: d.len() });
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// UAP
// ---------------------------------------------------------------------------

macro_rules! fixed {
    ($frn:expr, $name:expr, $octets:expr, $apply:expr) => {
        FieldSpec {
            frn: $frn,
            name: $name,
            decoder: FieldDecoder::Fixed { octets: $octets, apply: $apply },
        }
    };
}

macro_rules! skip {
    ($frn:expr, $name:expr, $octets:expr) => {
        FieldSpec { frn: $frn, name: $name, decoder: FieldDecoder::Skip($octets) }
    };
}

macro_rules! skip_fx {
    ($frn:expr, $name:expr) => {
        FieldSpec { frn: $frn, name: $name, decoder: FieldDecoder::SkipFx }
    };
}

macro_rules! dynamic {
    ($frn:expr, $name:expr, $apply:expr) => {
        FieldSpec { frn: $frn, name: $name, decoder: FieldDecoder::Dynamic($apply) }
    };
}

static UAP: &[FieldSpec<Cat21>] = &[
    fixed!(1, "Data Source Identification", 2, apply_data_source),
    dynamic!(2, "Target Report Descriptor", apply_report_descriptor),
    skip!(3, "Track Number", 2),
    skip!(4, "Service Identification", 1),
    skip!(5, "Time of Applicability for Position", 3),
    skip!(6, "Position in WGS-84 Co-ordinates", 6),
    fixed!(7, "Position in WGS-84 Co-ordinates High Resolution", 8, apply_position_high_res),
    skip!(8, "Time of Applicability for Velocity", 3),
    fixed!(9, "Air Speed", 2, apply_air_speed),
    skip!(10, "True Air Speed", 2),
    fixed!(11, "Target Address", 3, apply_target_address),
    fixed!(12, "Time of Message Reception of Position", 3, apply_time_of_reception),
    skip!(13, "Time of Message Reception of Position-High Precision", 4),
    skip!(14, "Time of Message Reception for Velocity", 3),
    skip!(15, "Time of Message Reception of Velocity-High Precision", 4),
    skip!(16, "Geometric Height", 2),
    skip_fx!(17, "Quality Indicators"),
    skip!(18, "MOPS Version", 1),
    fixed!(19, "Mode 3/A Code", 2, apply_mode3a),
    skip!(20, "Roll Angle", 2),
    fixed!(21, "Flight Level", 2, apply_flight_level),
    fixed!(22, "Magnetic Heading", 2, apply_magnetic_heading),
    fixed!(23, "Target Status", 1, apply_target_status),
    skip!(24, "Barometric Vertical Rate", 2),
    skip!(25, "Geometric Vertical Rate", 2),
    fixed!(26, "Airborne Ground Vector", 4, apply_ground_vector),
    skip!(27, "Track Angle Rate", 2),
    skip!(28, "Time of Report Transmission", 3),
    fixed!(29, "Target Identification", 6, apply_target_identification),
    skip!(30, "Emitter Category", 1),
    dynamic!(31, "Met Information", skip_met_info),
    skip!(32, "Selected Altitude", 2),
    skip!(33, "Final State Selected Altitude", 2),
    dynamic!(34, "Trajectory Intent", skip_trajectory_intent),
    skip!(35, "Service Management", 1),
    skip!(36, "Aircraft Operational Status", 1),
    skip_fx!(37, "Surface Capabilities and Characteristics"),
    skip!(38, "Message Amplitude", 1),
    dynamic!(39, "Mode S MB Data", skip_mode_s_mb),
    skip!(40, "ACAS Resolution Advisory Report", 7),
    skip!(41, "Receiver ID", 1),
    dynamic!(42, "Data Ages", skip_data_ages),
    dynamic!(48, "Reserved Expansion Field", apply_expansion),
    dynamic!(49, "Special Purpose Field", skip_special_purpose),
];

// ---------------------------------------------------------------------------
// Record decode
// ---------------------------------------------------------------------------

/// Decode one CAT021 record payload (FSPEC plus data items).
pub fn decode_cat21(payload: &[u8]) -> Cat21 {
    let mut msg = Cat21 { category: 21, ..Default::default() };
    let (frns, fspec_len) = fspec::read_fspec(payload);
    fspec::dispatch_fields(&mut msg, 21, UAP, &frns, payload, fspec_len);

    // Barometric altitude: ground-tagged targets without a flight level
    // sit at zero; a transmitted pressure setting replaces the standard
    // atmosphere assumption.
    if msg.flight_level.is_none() && msg.ground_bit == Some(true) {
        msg.flight_level = Some(0.0);
        msg.altitude_ft = Some(0.0);
        msg.altitude_m = Some(0.0);
    }
    if let (Some(fl), Some(bps)) = (msg.flight_level, msg.barometric_pressure_mb) {
        let corrected = fl * 100.0 + (1013.25 - bps) * 30.0;
        msg.altitude_ft = Some(corrected);
        msg.altitude_m = Some(corrected * 0.3048);
    }

    msg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
