//! ASTERIX Category 048 (monoradar target reports) decoder.
//!
//! Responsibilities:
//! - Decode the track items: data source, time of day, target report
//!   description, slant polar position, Mode 3/A, flight level, radar
//!   plot characteristics, aircraft address and identification, comm-B
//!   registers, track number/status/velocity, measured height,
//!   warning/error conditions, communications capability
//! - Skip the remaining UAP items by their exact lengths, including the
//!   compound radial Doppler item
//! - Back out a WGS-84 position from the slant polar plot when a radar
//!   site and an altitude (or an on-ground flight status) are available
//! - Correct Mode C altitude with the BDS 4,0 pressure setting for low
//!   flight levels

use log::debug;
use serde::Serialize;

use crate::bds::{self, Bds40, Bds50, Bds60};
use crate::fspec::{self, FieldDecoder, FieldSpec};
use crate::geo::{
    self, GeoTransform, Geodetic, RadarPolar, EARTH_RADIUS_M, FEET2METERS, METERS2FEET, NM2METERS,
};
use crate::types::{
    address_to_hex, be_u16, be_u24, format_day_time, ia5_string, mode3a_digits, sign_extend,
    FieldError,
};

// ---------------------------------------------------------------------------
// Decoded message
// ---------------------------------------------------------------------------

/// I048/020 target report description labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetDescription {
    pub detection_type: &'static str,
    pub simulated: bool,
    pub rdp_chain_2: bool,
    pub spi: bool,
    pub from_fixed_transponder: bool,
    pub test_target: Option<bool>,
    pub extended_range: Option<bool>,
    pub x_pulse: Option<bool>,
    pub military_emergency: Option<bool>,
    pub military_identification: Option<bool>,
}

/// I048/070 Mode 3/A code with its validity flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mode3A {
    pub valid: bool,
    pub garbled: bool,
    /// Four octal digits.
    pub code: String,
}

/// I048/090 flight level with its validity flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlightLevel {
    pub valid: bool,
    pub garbled: bool,
    /// Quarter-FL LSB applied, so this is in whole flight levels.
    pub level: f64,
}

/// I048/130 radar plot characteristics, all subfields optional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlotCharacteristics {
    /// SSR plot runlength, degrees.
    pub ssr_runlength_deg: Option<f64>,
    /// Number of received SSR replies.
    pub ssr_replies: Option<u8>,
    /// SSR reply amplitude, dBm.
    pub ssr_amplitude_dbm: Option<i8>,
    /// Primary plot runlength, degrees.
    pub psr_runlength_deg: Option<f64>,
    /// Primary plot amplitude, dBm.
    pub psr_amplitude_dbm: Option<i8>,
    /// Difference in range between PSR and SSR plot, NM.
    pub range_difference_nm: Option<f64>,
    /// Difference in azimuth between PSR and SSR plot, degrees.
    pub azimuth_difference_deg: Option<f64>,
}

/// I048/170 track status labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackStatus {
    pub confirmed: bool,
    pub sensor: &'static str,
    pub low_confidence: bool,
    pub horizontal_manoeuvre: bool,
    pub climb_descent: &'static str,
    pub end_of_track: Option<bool>,
    pub ghost_target: Option<bool>,
    pub secondary_track: Option<bool>,
    pub slant_corrected: Option<bool>,
}

/// I048/230 communications and ACAS capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommCapability {
    pub communications: &'static str,
    pub flight_status: &'static str,
    pub si_code_capable: bool,
    pub mode_s_specific_service: bool,
    pub altitude_25ft: bool,
    pub aircraft_identification_capable: bool,
    pub b1a: bool,
    pub b1b: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Cat48 {
    pub category: u8,
    pub sac: Option<u8>,
    pub sic: Option<u8>,
    pub time_of_day_s: Option<f64>,
    pub time_of_day_utc: Option<String>,
    pub target_description: Option<TargetDescription>,
    // I048/040 measured position, slant polar
    pub range_nm: Option<f64>,
    pub range_m: Option<f64>,
    pub azimuth_deg: Option<f64>,
    pub mode3a: Option<Mode3A>,
    pub flight_level: Option<FlightLevel>,
    pub plot_characteristics: Option<PlotCharacteristics>,
    /// I048/220, 6 hex digits.
    pub aircraft_address: Option<String>,
    pub aircraft_identification: Option<String>,
    /// Register codes seen in I048/250 (0x40, 0x50, ...).
    pub bds_registers: Vec<u8>,
    pub bds40: Option<Bds40>,
    pub bds50: Option<Bds50>,
    pub bds60: Option<Bds60>,
    pub track_number: Option<u16>,
    // I048/042 calculated position, cartesian NM
    pub position_x_nm: Option<f64>,
    pub position_y_nm: Option<f64>,
    pub ground_speed_kt: Option<f64>,
    pub heading_deg: Option<f64>,
    pub track_status: Option<TrackStatus>,
    /// I048/030 7-bit warning/error codes in transmission order.
    pub warning_conditions: Vec<u8>,
    /// I048/110 3D height, feet.
    pub measured_height_ft: Option<f64>,
    pub comm_capability: Option<CommCapability>,
    pub on_ground: bool,
    // Backed-out WGS-84 position
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub height_wgs84_m: Option<f64>,
    pub height_wgs84_ft: Option<f64>,
    /// Mode C corrected by the BDS 4,0 pressure setting, feet.
    pub corrected_mode_c_ft: Option<f64>,
}

// ---------------------------------------------------------------------------
// Item decoders
// ---------------------------------------------------------------------------

fn apply_data_source(msg: &mut Cat48, d: &[u8]) {
    msg.sac = Some(d[0]);
    msg.sic = Some(d[1]);
}

fn apply_time_of_day(msg: &mut Cat48, d: &[u8]) {
    let seconds = be_u24(d) as f64 / 128.0;
    msg.time_of_day_s = Some(seconds);
    msg.time_of_day_utc = Some(format_day_time(seconds));
}

const DETECTION_LABELS: [&str; 8] = [
    "No detection",
    "PSR",
    "SSR",
    "SSR+PSR",
    "Mode S all call",
    "Mode S roll call",
    "Mode S all call + PSR",
    "Mode S roll call + PSR",
];

fn apply_target_description(msg: &mut Cat48, d: &[u8]) -> Result<usize, FieldError> {
    let run = fspec::fx_run_len(d)?;
    let first = d[0];
    let mut td = TargetDescription {
        detection_type: DETECTION_LABELS[(first >> 5) as usize],
        simulated: first & 0x10 != 0,
        rdp_chain_2: first & 0x08 != 0,
        spi: first & 0x04 != 0,
        from_fixed_transponder: first & 0x02 != 0,
        test_target: None,
        extended_range: None,
        x_pulse: None,
        military_emergency: None,
        military_identification: None,
    };
    if run > 1 {
        let ext = d[1];
        td.test_target = Some(ext & 0x80 != 0);
        td.extended_range = Some(ext & 0x40 != 0);
        td.x_pulse = Some(ext & 0x20 != 0);
        td.military_emergency = Some(ext & 0x10 != 0);
        td.military_identification = Some(ext & 0x08 != 0);
    }
    msg.target_description = Some(td);
    Ok(run)
}

fn apply_position_polar(msg: &mut Cat48, d: &[u8]) {
    let rho = be_u16(&d[0..2]) as f64 / 256.0;
    msg.range_nm = Some(rho);
    msg.range_m = Some(rho * NM2METERS);
    msg.azimuth_deg = Some(be_u16(&d[2..4]) as f64 * (360.0 / 65536.0));
}

fn apply_mode3a(msg: &mut Cat48, d: &[u8]) {
    let raw = be_u16(d);
    msg.mode3a = Some(Mode3A {
        valid: raw & 0x8000 == 0,
        garbled: raw & 0x4000 != 0,
        code: mode3a_digits(raw),
    });
}

fn apply_flight_level(msg: &mut Cat48, d: &[u8]) {
    let raw = be_u16(d);
    msg.flight_level = Some(FlightLevel {
        valid: raw & 0x8000 == 0,
        garbled: raw & 0x4000 != 0,
        level: sign_extend((raw & 0x3FFF) as u32, 14) as f64 / 4.0,
    });
}

/// I048/130: presence octet then one octet per present subfield.
fn apply_plot_characteristics(msg: &mut Cat48, d: &[u8]) -> Result<usize, FieldError> {
    if d.is_empty() {
        return Err(FieldError::InsufficientData { needed: 1, remaining: 0 });
    }
    let presence = d[0];
    let subfields = (presence & 0xFE).count_ones() as usize;
    let mut needed = 1 + subfields;
    if presence & 0x01 != 0 {
        // FX set: extension octets carry subfields this decoder does not
        // model, consume the run to stay aligned
        needed += fspec::fx_run_len(&d[needed.min(d.len())..])?;
    }
    if d.len() < needed {
        return Err(FieldError::InsufficientData { needed, remaining: d.len() });
    }

    let mut pc = PlotCharacteristics::default();
    let mut pos = 1;
    let mut take = || {
        let v = d[pos];
        pos += 1;
        v
    };
    if presence & 0x80 != 0 {
        pc.ssr_runlength_deg = Some(take() as f64 * (360.0 / 8192.0));
    }
    if presence & 0x40 != 0 {
        pc.ssr_replies = Some(take());
    }
    if presence & 0x20 != 0 {
        pc.ssr_amplitude_dbm = Some(take() as i8);
    }
    if presence & 0x10 != 0 {
        pc.psr_runlength_deg = Some(take() as f64 * (360.0 / 8192.0));
    }
    if presence & 0x08 != 0 {
        pc.psr_amplitude_dbm = Some(take() as i8);
    }
    if presence & 0x04 != 0 {
        pc.range_difference_nm = Some(take() as i8 as f64 / 256.0);
    }
    if presence & 0x02 != 0 {
        pc.azimuth_difference_deg = Some(take() as i8 as f64 * (360.0 / 16384.0));
    }
    msg.plot_characteristics = Some(pc);
    Ok(needed)
}

fn apply_aircraft_address(msg: &mut Cat48, d: &[u8]) {
    msg.aircraft_address = Some(address_to_hex(be_u24(d)));
}

fn apply_aircraft_identification(msg: &mut Cat48, d: &[u8]) {
    let bits = d.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    msg.aircraft_identification = Some(ia5_string(bits));
}

/// I048/250: REP octet then blocks of 7 register octets + 1 BDS code
/// octet. Registers 4,0 / 5,0 / 6,0 are decoded; others only recorded.
fn apply_mode_s_mb(msg: &mut Cat48, d: &[u8]) -> Result<usize, FieldError> {
    if d.is_empty() {
        return Err(FieldError::InsufficientData { needed: 1, remaining: 0 });
    }
    let rep = d[0] as usize;
    let needed = 1 + rep * 8;
    if d.len() < needed {
        return Err(FieldError::InsufficientData { needed, remaining: d.len() });
    }
    for i in 0..rep {
        let block = &d[1 + i * 8..1 + i * 8 + 8];
        let mut reg_octets = [0u8; 7];
        reg_octets.copy_from_slice(&block[..7]);
        let reg = bds::register_bits(&reg_octets);
        let code = block[7];
        msg.bds_registers.push(code);
        match code {
            0x40 => msg.bds40 = Some(bds::decode_bds40(reg)),
            0x50 => msg.bds50 = Some(bds::decode_bds50(reg)),
            0x60 => msg.bds60 = Some(bds::decode_bds60(reg)),
            other => debug!("CAT048 I048/250: register {other:02X} not decoded"),
        }
    }
    Ok(needed)
}

fn apply_track_number(msg: &mut Cat48, d: &[u8]) {
    msg.track_number = Some(be_u16(d) & 0x0FFF);
}

fn apply_position_cartesian(msg: &mut Cat48, d: &[u8]) {
    msg.position_x_nm = Some(be_u16(&d[0..2]) as i16 as f64 / 128.0);
    msg.position_y_nm = Some(be_u16(&d[2..4]) as i16 as f64 / 128.0);
}

fn apply_velocity_polar(msg: &mut Cat48, d: &[u8]) {
    msg.ground_speed_kt = Some(be_u16(&d[0..2]) as f64 * 0.22);
    msg.heading_deg = Some(be_u16(&d[2..4]) as f64 * (360.0 / 65536.0));
}

fn apply_track_status(msg: &mut Cat48, d: &[u8]) -> Result<usize, FieldError> {
    let run = fspec::fx_run_len(d)?;
    let first = d[0];
    let mut ts = TrackStatus {
        confirmed: first & 0x80 == 0,
        sensor: match (first >> 5) & 0b11 {
            0 => "Combined",
            1 => "PSR",
            2 => "SSR/Mode S",
            _ => "Invalid",
        },
        low_confidence: first & 0x10 != 0,
        horizontal_manoeuvre: first & 0x08 != 0,
        climb_descent: match (first >> 1) & 0b11 {
            0 => "Maintaining",
            1 => "Climbing",
            2 => "Descending",
            _ => "Unknown",
        },
        end_of_track: None,
        ghost_target: None,
        secondary_track: None,
        slant_corrected: None,
    };
    if run > 1 {
        let ext = d[1];
        ts.end_of_track = Some(ext & 0x80 != 0);
        ts.ghost_target = Some(ext & 0x40 != 0);
        ts.secondary_track = Some(ext & 0x20 != 0);
        ts.slant_corrected = Some(ext & 0x10 == 0);
    }
    msg.track_status = Some(ts);
    Ok(run)
}

/// I048/030: each octet of the FX run carries a 7-bit condition code.
fn apply_warning_conditions(msg: &mut Cat48, d: &[u8]) -> Result<usize, FieldError> {
    let run = fspec::fx_run_len(d)?;
    msg.warning_conditions = d[..run].iter().map(|o| o >> 1).collect();
    Ok(run)
}

fn apply_measured_height(msg: &mut Cat48, d: &[u8]) {
    let raw = (be_u16(d) & 0x3FFF) as u32;
    msg.measured_height_ft = Some(sign_extend(raw, 14) as f64 * 25.0);
}

/// I048/120 radial Doppler speed: a compound item that is skipped whole.
/// CAL is 2 octets, RDS is a REP octet plus 6-octet blocks.
fn skip_radial_doppler(_msg: &mut Cat48, d: &[u8]) -> Result<usize, FieldError> {
    if d.is_empty() {
        return Err(FieldError::InsufficientData { needed: 1, remaining: 0 });
    }
    let presence = d[0];
    let mut needed = 1;
    if presence & 0x80 != 0 {
        needed += 2;
    }
    if presence & 0x40 != 0 {
        if d.len() < needed + 1 {
            return Err(FieldError::InsufficientData { needed: needed + 1, remaining: d.len() });
        }
        needed += 1 + d[needed] as usize * 6;
    }
    if d.len() < needed {
        return Err(FieldError::InsufficientData { needed, remaining: d.len() });
    }
    Ok(needed)
}

const COM_LABELS: [&str; 8] = [
    "No communication capability",
    "COMM.A and COMM.B capability",
    "COMM.A and COMM.B and Uplink ELM",
    "COMM.A and COMM.B and Uplink and Downlink ELM",
    "Level 5 transponder capability",
    "Not assigned",
    "Not assigned",
    "Not assigned",
];

const STAT_LABELS: [&str; 8] = [
    "No alert, no SPI, aircraft airborne",
    "No alert, no SPI, aircraft on ground",
    "Alert, no SPI, aircraft airborne",
    "Alert, no SPI, aircraft on ground",
    "Alert, SPI, aircraft airborne or on ground",
    "No alert, SPI, aircraft airborne or on ground",
    "Not assigned",
    "Unknown",
];

fn apply_comm_capability(msg: &mut Cat48, d: &[u8]) {
    let first = d[0];
    let second = d[1];
    let stat = (first >> 2) & 0b111;
    msg.comm_capability = Some(CommCapability {
        communications: COM_LABELS[(first >> 5) as usize],
        flight_status: STAT_LABELS[stat as usize],
        si_code_capable: first & 0x02 == 0,
        mode_s_specific_service: second & 0x80 != 0,
        altitude_25ft: second & 0x40 != 0,
        aircraft_identification_capable: second & 0x20 != 0,
        b1a: second & 0x10 != 0,
        b1b: second & 0x0F,
    });
    if stat == 1 || stat == 3 {
        msg.on_ground = true;
    }
}

/// RE/SP: leading length octet covering the whole item.
fn skip_length_prefixed(_msg: &mut Cat48, d: &[u8]) -> Result<usize, FieldError> {
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

macro_rules! dynamic {
    ($frn:expr, $name:expr, $apply:expr) => {
        FieldSpec { frn: $frn, name: $name, decoder: FieldDecoder::Dynamic($apply) }
    };
}

static UAP: &[FieldSpec<Cat48>] = &[
    fixed!(1, "Data Source Identifier", 2, apply_data_source),
    fixed!(2, "Time of Day", 3, apply_time_of_day),
    dynamic!(3, "Target Report Descriptor", apply_target_description),
    fixed!(4, "Measured Position Polar", 4, apply_position_polar),
    fixed!(5, "Mode-3/A Code", 2, apply_mode3a),
    fixed!(6, "Flight Level", 2, apply_flight_level),
    dynamic!(7, "Radar Plot Characteristics", apply_plot_characteristics),
    fixed!(8, "Aircraft Address", 3, apply_aircraft_address),
    fixed!(9, "Aircraft Identification", 6, apply_aircraft_identification),
    dynamic!(10, "Mode S MB Data", apply_mode_s_mb),
    fixed!(11, "Track Number", 2, apply_track_number),
    fixed!(12, "Calculated Position Cartesian", 4, apply_position_cartesian),
    fixed!(13, "Calculated Track Velocity Polar", 4, apply_velocity_polar),
    dynamic!(14, "Track Status", apply_track_status),
    skip!(15, "Track Quality", 4),
    dynamic!(16, "Warning/Error Conditions", apply_warning_conditions),
    skip!(17, "Mode-3/A Confidence", 2),
    skip!(18, "Mode-C Confidence", 4),
    fixed!(19, "Height Measured by 3D Radar", 2, apply_measured_height),
    dynamic!(20, "Radial Doppler Speed", skip_radial_doppler),
    fixed!(21, "Communications/ACAS Capability", 2, apply_comm_capability),
    skip!(22, "ACAS Resolution Advisory Report", 7),
    skip!(23, "Mode-1 Code Confidence", 1),
    skip!(24, "Mode-2 Code Confidence", 2),
    skip!(25, "Mode-1 Code", 1),
    skip!(26, "Mode-2 Code", 2),
    dynamic!(27, "Special Purpose Field", skip_length_prefixed),
    dynamic!(28, "Reserved Expansion Field", skip_length_prefixed),
];

// ---------------------------------------------------------------------------
// Record decode and position backout
// ---------------------------------------------------------------------------

/// Decode one CAT048 record payload. A radar site enables the WGS-84
/// position backout from the slant polar plot.
pub fn decode_cat48(payload: &[u8], geo: &GeoTransform, site: Option<Geodetic>) -> Cat48 {
    let mut msg = Cat48 { category: 48, ..Default::default() };
    let (frns, fspec_len) = fspec::read_fspec(payload);
    fspec::dispatch_fields(&mut msg, 48, UAP, &frns, payload, fspec_len);

    if let Some(site) = site {
        compute_position(&mut msg, geo, site);
    }
    correct_mode_c(&mut msg);

    msg
}

/// Back out latitude/longitude from the measured polar plot: elevation
/// from the altitude and earth curvature, then radar cartesian to ECEF
/// via the site frame, then iterative geodetic refinement.
fn compute_position(msg: &mut Cat48, geo: &GeoTransform, site: Geodetic) {
    let (Some(range_m), Some(azimuth_deg)) = (msg.range_m, msg.azimuth_deg) else {
        return;
    };
    // Altitude priority: flight level if transmitted, zero for
    // ground-tagged targets, otherwise no position can be derived.
    let altitude_m = match msg.flight_level {
        Some(fl) if fl.level > 0.0 => fl.level * 100.0 * FEET2METERS,
        Some(_) => 0.0,
        None if msg.on_ground => 0.0,
        None => return,
    };

    let elevation = geo::calculate_elevation(site.height, EARTH_RADIUS_M, range_m, altitude_m);
    let polar = RadarPolar {
        range: range_m,
        azimuth: azimuth_deg.to_radians(),
        elevation,
    };
    let cartesian = geo::radar_polar_to_cartesian(polar);
    let geocentric = geo.radar_cartesian_to_geocentric(site, cartesian);
    let geodetic = geo::geocentric_to_geodetic(geocentric);

    msg.latitude = Some(geodetic.lat.to_degrees());
    msg.longitude = Some(geodetic.lon.to_degrees());
    msg.height_wgs84_m = Some(geodetic.height);
    msg.height_wgs84_ft = Some(geodetic.height * METERS2FEET);
}

/// Below FL60 with a pressure setting above the standard atmosphere,
/// replace the Mode C value with the QNH-corrected altitude.
fn correct_mode_c(msg: &mut Cat48) {
    let (Some(fl), Some(bp)) = (
        msg.flight_level,
        msg.bds40.and_then(|b| b.barometric_setting_mb),
    ) else {
        return;
    };
    if fl.level <= 60.0 && bp > 1013.3 {
        msg.corrected_mode_c_ft = Some(fl.level * 100.0 + (bp - 1013.2) * 30.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
