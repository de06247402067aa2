//! Mode S comm-B register (BDS) decoders.
//!
//! Covers the three registers radar trackers actually consume: 4,0
//! (selected vertical intention), 5,0 (track and turn) and 6,0 (heading
//! and speed). Each register is 56 bits; every quantity is guarded by a
//! status bit and absent when the bit is clear.
//!
//! Bit indices follow the register documents: bit 0 is the MSB of the
//! 56-bit payload.

use serde::Serialize;

/// Status bit at `idx` (0 = MSB).
fn bit(reg: u64, idx: u32) -> bool {
    (reg >> (55 - idx)) & 1 != 0
}

/// Unsigned field of `len` bits starting at `start` (0 = MSB).
fn field(reg: u64, start: u32, len: u32) -> u32 {
    ((reg >> (56 - start - len)) & ((1u64 << len) - 1)) as u32
}

/// Two's-complement field of `len` bits starting at `start`.
fn signed_field(reg: u64, start: u32, len: u32) -> i32 {
    let raw = field(reg, start, len);
    let shift = 32 - len;
    ((raw << shift) as i32) >> shift
}

/// Assemble the 56-bit register from its 7 transmitted octets.
pub fn register_bits(data: &[u8; 7]) -> u64 {
    data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

// ---------------------------------------------------------------------------
// BDS 4,0 selected vertical intention
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bds40 {
    /// MCP/FCU selected altitude, feet.
    pub mcp_altitude_ft: Option<f64>,
    /// FMS selected altitude, feet.
    pub fms_altitude_ft: Option<f64>,
    /// Barometric pressure setting, millibars.
    pub barometric_setting_mb: Option<f64>,
    pub vnav_mode: Option<bool>,
    pub alt_hold_mode: Option<bool>,
    pub approach_mode: Option<bool>,
    /// Source of the target altitude: 0 unknown, 1 aircraft, 2 MCP, 3 FMS.
    pub target_altitude_source: Option<u8>,
}

pub fn decode_bds40(reg: u64) -> Bds40 {
    let mut out = Bds40::default();
    if bit(reg, 0) {
        out.mcp_altitude_ft = Some(field(reg, 1, 12) as f64 * 16.0);
    }
    if bit(reg, 13) {
        out.fms_altitude_ft = Some(field(reg, 14, 12) as f64 * 16.0);
    }
    if bit(reg, 26) {
        out.barometric_setting_mb = Some(field(reg, 27, 12) as f64 * 0.1 + 800.0);
    }
    if bit(reg, 47) {
        out.vnav_mode = Some(bit(reg, 48));
        out.alt_hold_mode = Some(bit(reg, 49));
        out.approach_mode = Some(bit(reg, 50));
    }
    if bit(reg, 53) {
        out.target_altitude_source = Some(field(reg, 54, 2) as u8);
    }
    out
}

// ---------------------------------------------------------------------------
// BDS 5,0 track and turn report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bds50 {
    /// Roll angle, degrees, positive right wing down.
    pub roll_angle_deg: Option<f64>,
    /// True track angle, degrees, positive clockwise.
    pub true_track_deg: Option<f64>,
    pub ground_speed_kt: Option<f64>,
    /// Track angle rate, degrees per second.
    pub track_rate_deg_s: Option<f64>,
    pub true_airspeed_kt: Option<f64>,
}

pub fn decode_bds50(reg: u64) -> Bds50 {
    let mut out = Bds50::default();
    if bit(reg, 0) {
        out.roll_angle_deg = Some(signed_field(reg, 1, 10) as f64 * 45.0 / 256.0);
    }
    if bit(reg, 11) {
        out.true_track_deg = Some(signed_field(reg, 12, 11) as f64 * 90.0 / 512.0);
    }
    if bit(reg, 23) {
        out.ground_speed_kt = Some(field(reg, 24, 10) as f64 * 2.0);
    }
    if bit(reg, 34) {
        out.track_rate_deg_s = Some(signed_field(reg, 35, 10) as f64 * 8.0 / 256.0);
    }
    if bit(reg, 45) {
        out.true_airspeed_kt = Some(field(reg, 46, 10) as f64 * 2.0);
    }
    out
}

// ---------------------------------------------------------------------------
// BDS 6,0 heading and speed report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bds60 {
    /// Magnetic heading, degrees, positive clockwise.
    pub magnetic_heading_deg: Option<f64>,
    pub indicated_airspeed_kt: Option<f64>,
    pub mach: Option<f64>,
    /// Barometric altitude rate, feet per minute.
    pub barometric_rate_fpm: Option<f64>,
    /// Inertial vertical velocity, feet per minute.
    pub inertial_vertical_rate_fpm: Option<f64>,
}

pub fn decode_bds60(reg: u64) -> Bds60 {
    let mut out = Bds60::default();
    if bit(reg, 0) {
        out.magnetic_heading_deg = Some(signed_field(reg, 1, 11) as f64 * 90.0 / 512.0);
    }
    if bit(reg, 12) {
        out.indicated_airspeed_kt = Some(field(reg, 13, 10) as f64);
    }
    if bit(reg, 23) {
        out.mach = Some(field(reg, 24, 10) as f64 * 2.048 / 512.0);
    }
    if bit(reg, 34) {
        out.barometric_rate_fpm = Some(signed_field(reg, 35, 10) as f64 * 32.0);
    }
    if bit(reg, 45) {
        out.inertial_vertical_rate_fpm = Some(signed_field(reg, 46, 10) as f64 * 32.0);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_bits() {
        let reg = register_bits(&[0x80, 0, 0, 0, 0, 0, 0x01]);
        assert_eq!(reg, (1 << 55) | 1);
    }

    #[test]
    fn test_bds40_mcp_altitude() {
        // Status bit 0 set, 12-bit field = 2000 -> 32000 ft
        let reg = (1u64 << 55) | (2000u64 << 43);
        let d = decode_bds40(reg);
        assert_eq!(d.mcp_altitude_ft, Some(32_000.0));
        assert_eq!(d.fms_altitude_ft, None, "FMS status clear");
        assert_eq!(d.barometric_setting_mb, None);
    }

    #[test]
    fn test_bds40_barometric_setting() {
        // BP field 2132 -> 0.1 * 2132 + 800 = 1013.2 mb
        let mut reg = 0u64;
        reg |= 1 << (55 - 26);
        reg |= 2132 << (56 - 27 - 12);
        let d = decode_bds40(reg);
        let bp = d.barometric_setting_mb.unwrap();
        assert!((bp - 1013.2).abs() < 1e-9, "got {bp}");
    }

    #[test]
    fn test_bds40_mode_and_source() {
        let mut reg = 0u64;
        reg |= 1 << (55 - 47); // mode status
        reg |= 1 << (55 - 49); // alt hold
        reg |= 1 << (55 - 53); // target alt source status
        reg |= 0b10; // source bits 54-55
        let d = decode_bds40(reg);
        assert_eq!(d.vnav_mode, Some(false));
        assert_eq!(d.alt_hold_mode, Some(true));
        assert_eq!(d.approach_mode, Some(false));
        assert_eq!(d.target_altitude_source, Some(2));
    }

    #[test]
    fn test_bds50_negative_roll() {
        // 10-bit two's complement -57 -> about -10 degrees
        let raw = (-57i32 as u32) & 0x3FF;
        let mut reg = 1u64 << 55;
        reg |= (raw as u64) << (56 - 1 - 10);
        let d = decode_bds50(reg);
        let roll = d.roll_angle_deg.unwrap();
        assert!((roll + 10.02).abs() < 0.1, "got {roll}");
    }

    #[test]
    fn test_bds50_speeds() {
        let mut reg = 0u64;
        reg |= 1 << (55 - 23);
        reg |= 242 << (56 - 24 - 10); // GS 484 kt
        reg |= 1 << (55 - 45);
        reg |= 230 << (56 - 46 - 10); // TAS 460 kt
        let d = decode_bds50(reg);
        assert_eq!(d.ground_speed_kt, Some(484.0));
        assert_eq!(d.true_airspeed_kt, Some(460.0));
        assert_eq!(d.roll_angle_deg, None);
    }

    #[test]
    fn test_bds60_heading_and_mach() {
        let mut reg = 1u64 << 55;
        reg |= 400 << (56 - 1 - 11); // heading 400 * 90/512 = 70.3125
        reg |= 1 << (55 - 23);
        reg |= 200 << (56 - 24 - 10); // mach 200 * 2.048/512 = 0.8
        let d = decode_bds60(reg);
        let hdg = d.magnetic_heading_deg.unwrap();
        assert!((hdg - 70.3125).abs() < 1e-9, "got {hdg}");
        let mach = d.mach.unwrap();
        assert!((mach - 0.8).abs() < 1e-9, "got {mach}");
    }

    #[test]
    fn test_bds60_descent_rate() {
        let raw = (-60i32 as u32) & 0x3FF; // -1920 fpm
        let mut reg = 0u64;
        reg |= 1 << (55 - 34);
        reg |= (raw as u64) << (56 - 35 - 10);
        let d = decode_bds60(reg);
        assert_eq!(d.barometric_rate_fpm, Some(-1920.0));
        assert_eq!(d.inertial_vertical_rate_fpm, None);
    }

    #[test]
    fn test_all_status_clear_gives_empty() {
        assert_eq!(decode_bds40(0), Bds40::default());
        assert_eq!(decode_bds50(0), Bds50::default());
        assert_eq!(decode_bds60(0), Bds60::default());
    }
}
