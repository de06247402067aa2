//! WGS-84 geodetic transform engine.
//!
//! Responsibilities:
//! - Geodetic <-> geocentric (ECEF) conversions on the WGS-84 ellipsoid
//! - Radar slant polar <-> local cartesian, azimuth and elevation helpers
//! - Local radar frames: rotation/translation into ECEF, cached per site
//! - Stereographic projection around an optional system center
//!
//! Angles are radians and distances meters throughout; the category
//! decoders convert to degrees/feet at their own edges.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Ellipsoid and unit constants
// ---------------------------------------------------------------------------

/// WGS-84 semi-major axis, meters.
pub const A: f64 = 6_378_137.0;
/// WGS-84 semi-minor axis, meters.
pub const B: f64 = 6_356_752.3142;
/// WGS-84 first eccentricity squared.
pub const E2: f64 = 0.006_694_379_990_13;

/// Mean earth radius used for the elevation backout, meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub const ALMOST_ZERO: f64 = 1e-10;
const REQUIRED_PRECISION: f64 = 1e-8;
const MAX_ITERATIONS: u32 = 50;

pub const FEET2METERS: f64 = 0.3048;
pub const METERS2FEET: f64 = 3.28084;
pub const NM2METERS: f64 = 1852.0;

// ---------------------------------------------------------------------------
// Coordinate value types
// ---------------------------------------------------------------------------

/// WGS-84 latitude/longitude in radians, height in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geodetic {
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
}

impl Geodetic {
    pub fn new(lat: f64, lon: f64, height: f64) -> Self {
        Geodetic { lat, lon, height }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64, height: f64) -> Self {
        Geodetic {
            lat: lat_deg.to_radians(),
            lon: lon_deg.to_radians(),
            height,
        }
    }
}

/// Earth-centered earth-fixed cartesian, meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Slant range (m), azimuth clockwise from north (rad), elevation (rad).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarPolar {
    pub range: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

/// Local cartesian at a radar site: x east, y north, z up, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarCartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Stereographic plane coordinates around the system center, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stereographic {
    pub u: f64,
    pub v: f64,
    pub height: f64,
}

/// Row-major 3x3 matrix, just enough linear algebra for the frames here.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Mat3([[f64; 3]; 3]);

impl Mat3 {
    fn mul_vec(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    fn transposed(&self) -> Mat3 {
        let m = &self.0;
        Mat3([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }
}

// ---------------------------------------------------------------------------
// Pure conversions
// ---------------------------------------------------------------------------

/// Geodetic to ECEF on the WGS-84 ellipsoid.
pub fn geodetic_to_geocentric(c: Geodetic) -> Ecef {
    let sin_lat = c.lat.sin();
    let cos_lat = c.lat.cos();
    let nu = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    Ecef {
        x: (nu + c.height) * cos_lat * c.lon.cos(),
        y: (nu + c.height) * cos_lat * c.lon.sin(),
        z: (nu * (1.0 - E2) + c.height) * sin_lat,
    }
}

/// ECEF to geodetic by iterative latitude/height refinement.
///
/// Converges to 1e-8 rad in a handful of iterations for airborne targets;
/// after 50 iterations the last estimate is returned as-is. Points on the
/// polar axis take a direct formula instead.
pub fn geocentric_to_geodetic(c: Ecef) -> Geodetic {
    if c.x.abs() < ALMOST_ZERO && c.y.abs() < ALMOST_ZERO {
        let lat = if c.z.abs() < ALMOST_ZERO || c.z > 0.0 {
            std::f64::consts::FRAC_PI_2
        } else {
            -std::f64::consts::FRAC_PI_2
        };
        return Geodetic {
            lat,
            lon: 0.0,
            height: c.z.abs() - B,
        };
    }

    let d_xy = (c.x * c.x + c.y * c.y).sqrt();
    let mut lat = ((c.z / d_xy) / (1.0 - (A * E2) / (d_xy * d_xy + c.z * c.z).sqrt())).atan();
    let sin_lat = lat.sin();
    let mut nu = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let mut height = d_xy / lat.cos() - nu;

    for _ in 0..MAX_ITERATIONS {
        let lat_prev = lat;
        let sin_lat = lat.sin();
        nu = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
        lat = ((c.z + height) / nu / (d_xy * (1.0 - E2 + height / nu))).atan();
        height = d_xy / lat.cos() - nu;
        if (lat - lat_prev).abs() <= REQUIRED_PRECISION {
            break;
        }
    }

    Geodetic {
        lat,
        lon: c.y.atan2(c.x),
        height,
    }
}

/// Slant polar plot to local cartesian (x east, y north, z up).
pub fn radar_polar_to_cartesian(p: RadarPolar) -> RadarCartesian {
    let cos_el = p.elevation.cos();
    RadarCartesian {
        x: p.range * cos_el * p.azimuth.sin(),
        y: p.range * cos_el * p.azimuth.cos(),
        z: p.range * p.elevation.sin(),
    }
}

/// Local cartesian back to slant polar.
pub fn radar_cartesian_to_polar(c: RadarCartesian) -> RadarPolar {
    let range = (c.x * c.x + c.y * c.y + c.z * c.z).sqrt();
    RadarPolar {
        range,
        azimuth: calculate_azimuth(c.x, c.y),
        elevation: if range == 0.0 { 0.0 } else { (c.z / range).asin() },
    }
}

/// Azimuth clockwise from north in [0, 2pi).
pub fn calculate_azimuth(x: f64, y: f64) -> f64 {
    let theta = if y.abs() < ALMOST_ZERO {
        if x == 0.0 {
            0.0
        } else {
            x.signum() * std::f64::consts::FRAC_PI_2
        }
    } else {
        x.atan2(y)
    };
    if theta < 0.0 {
        theta + 2.0 * std::f64::consts::PI
    } else {
        theta
    }
}

/// Elevation angle of a target at altitude `target_height` seen at slant
/// range `range` from a site at height `site_height`, on a sphere of
/// radius `earth_radius`.
///
/// Measurement noise can push the asin argument past [-1, 1]; it is
/// clamped so the result never leaves [-pi/2, pi/2]. Zero range gives
/// zero elevation.
pub fn calculate_elevation(
    site_height: f64,
    earth_radius: f64,
    range: f64,
    target_height: f64,
) -> f64 {
    if range < ALMOST_ZERO {
        return 0.0;
    }
    let temp = (2.0 * earth_radius * (target_height - site_height) + target_height * target_height
        - site_height * site_height
        - range * range)
        / (2.0 * range * (earth_radius + site_height));
    temp.clamp(-1.0, 1.0).asin()
}

/// Gaussian radius of curvature of the ellipsoid at a latitude.
pub fn earth_radius_at(lat: f64) -> f64 {
    let sin_lat = lat.sin();
    (A * (1.0 - E2)) / (1.0 - E2 * sin_lat * sin_lat).powf(1.5)
}

/// ECEF-to-local-ENU rotation for a site at (lat, lon).
fn rotation_matrix(lat: f64, lon: f64) -> Mat3 {
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();
    Mat3([
        [-sin_lon, cos_lon, 0.0],
        [-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat],
        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat],
    ])
}

// ---------------------------------------------------------------------------
// Site frames and per-site cache
// ---------------------------------------------------------------------------

/// Rotation and ECEF origin for one radar site.
#[derive(Debug, Clone, Copy)]
struct SiteFrame {
    rotation: Mat3,
    translation: [f64; 3],
}

impl SiteFrame {
    fn new(site: Geodetic) -> Self {
        let origin = geodetic_to_geocentric(site);
        SiteFrame {
            rotation: rotation_matrix(site.lat, site.lon),
            translation: [origin.x, origin.y, origin.z],
        }
    }
}

/// Cache key: coordinates rounded to 1e-10 so float noise in repeated
/// site records still hits the same entry.
type SiteKey = (i64, i64, i64);

fn site_key(site: Geodetic) -> SiteKey {
    (
        (site.lat * 1e10).round() as i64,
        (site.lon * 1e10).round() as i64,
        (site.height * 1e10).round() as i64,
    )
}

/// System center for the stereographic plane, height forced to zero.
#[derive(Debug, Clone, Copy)]
struct CenterProjection {
    center: Geodetic,
    /// Gaussian earth radius at the center latitude.
    r_s: f64,
    frame: SiteFrame,
}

/// Geodetic transform context: optional projection center plus a cache
/// of per-radar-site frames. Shared across worker threads.
#[derive(Debug, Default)]
pub struct GeoTransform {
    center: Option<CenterProjection>,
    sites: Mutex<HashMap<SiteKey, SiteFrame>>,
}

impl GeoTransform {
    pub fn new() -> Self {
        GeoTransform::default()
    }

    /// Fix the stereographic projection center. The center height is
    /// forced to zero like the site surveys expect.
    pub fn set_center_projection(&mut self, c: Geodetic) {
        let center = Geodetic::new(c.lat, c.lon, 0.0);
        self.center = Some(CenterProjection {
            center,
            r_s: earth_radius_at(center.lat),
            frame: SiteFrame::new(center),
        });
    }

    pub fn center_projection(&self) -> Option<Geodetic> {
        self.center.map(|c| c.center)
    }

    fn site_frame(&self, site: Geodetic) -> SiteFrame {
        let mut sites = match self.sites.lock() {
            Ok(g) => g,
            // A panic while holding the lock cannot corrupt the map,
            // entries are insert-only.
            Err(poisoned) => poisoned.into_inner(),
        };
        *sites
            .entry(site_key(site))
            .or_insert_with(|| SiteFrame::new(site))
    }

    /// Local cartesian at `site` to ECEF.
    pub fn radar_cartesian_to_geocentric(&self, site: Geodetic, c: RadarCartesian) -> Ecef {
        let frame = self.site_frame(site);
        let v = frame.rotation.transposed().mul_vec([c.x, c.y, c.z]);
        Ecef {
            x: v[0] + frame.translation[0],
            y: v[1] + frame.translation[1],
            z: v[2] + frame.translation[2],
        }
    }

    /// ECEF to local cartesian at `site`.
    pub fn geocentric_to_radar_cartesian(&self, site: Geodetic, c: Ecef) -> RadarCartesian {
        let frame = self.site_frame(site);
        let v = frame.rotation.mul_vec([
            c.x - frame.translation[0],
            c.y - frame.translation[1],
            c.z - frame.translation[2],
        ]);
        RadarCartesian { x: v[0], y: v[1], z: v[2] }
    }

    /// ECEF to the system cartesian frame at the projection center.
    pub fn geocentric_to_system_cartesian(&self, c: Ecef) -> Option<RadarCartesian> {
        let center = self.center?;
        let v = center.frame.rotation.mul_vec([
            c.x - center.frame.translation[0],
            c.y - center.frame.translation[1],
            c.z - center.frame.translation[2],
        ]);
        Some(RadarCartesian { x: v[0], y: v[1], z: v[2] })
    }

    /// System cartesian back to ECEF.
    pub fn system_cartesian_to_geocentric(&self, c: RadarCartesian) -> Option<Ecef> {
        let center = self.center?;
        let v = center.frame.rotation.transposed().mul_vec([c.x, c.y, c.z]);
        Some(Ecef {
            x: v[0] + center.frame.translation[0],
            y: v[1] + center.frame.translation[1],
            z: v[2] + center.frame.translation[2],
        })
    }

    /// System cartesian to the stereographic plane.
    pub fn system_cartesian_to_stereographic(&self, c: RadarCartesian) -> Option<Stereographic> {
        let center = self.center?;
        let d_xy2 = c.x * c.x + c.y * c.y;
        let denom = c.z + center.center.height + center.r_s;
        let height = (d_xy2 + denom * denom).sqrt() - center.r_s;
        let k = (2.0 * center.r_s) / (2.0 * center.r_s + center.center.height + c.z + height);
        Some(Stereographic {
            u: k * c.x,
            v: k * c.y,
            height,
        })
    }

    /// Stereographic plane back to system cartesian.
    pub fn stereographic_to_system_cartesian(&self, c: Stereographic) -> Option<RadarCartesian> {
        let center = self.center?;
        let d_uv2 = c.u * c.u + c.v * c.v;
        let four_rs2 = 4.0 * center.r_s * center.r_s;
        let z = (c.height + center.r_s) * ((four_rs2 - d_uv2) / (four_rs2 + d_uv2))
            - (center.r_s + center.center.height);
        let k = (2.0 * center.r_s) / (2.0 * center.r_s + center.center.height + z + c.height);
        Some(RadarCartesian {
            x: c.u / k,
            y: c.v / k,
            z,
        })
    }

    /// Local cartesian at `site` into the system cartesian frame.
    pub fn radar_cartesian_to_system_cartesian(
        &self,
        site: Geodetic,
        c: RadarCartesian,
    ) -> Option<RadarCartesian> {
        let geo = self.radar_cartesian_to_geocentric(site, c);
        self.geocentric_to_system_cartesian(geo)
    }

    /// System cartesian frame into local cartesian at `site`.
    pub fn system_cartesian_to_radar_cartesian(
        &self,
        site: Geodetic,
        c: RadarCartesian,
    ) -> Option<RadarCartesian> {
        let geo = self.system_cartesian_to_geocentric(c)?;
        Some(self.geocentric_to_radar_cartesian(site, geo))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_geodetic_to_geocentric_equator() {
        let c = geodetic_to_geocentric(Geodetic::new(0.0, 0.0, 0.0));
        assert!((c.x - A).abs() < 1e-6, "equator x should be A, got {}", c.x);
        assert!(c.y.abs() < 1e-6);
        assert!(c.z.abs() < 1e-6);
    }

    #[test]
    fn test_geodetic_round_trip() {
        let cases = [
            Geodetic::from_degrees(41.3, 2.1, 27.3),
            Geodetic::from_degrees(-33.9, 151.2, 1000.0),
            Geodetic::from_degrees(88.9, -70.0, 50_000.0),
            Geodetic::from_degrees(-88.9, 179.9, -1000.0),
            Geodetic::from_degrees(0.0, -179.99, 0.0),
        ];
        for g in cases {
            let back = geocentric_to_geodetic(geodetic_to_geocentric(g));
            assert!(
                (back.lat - g.lat).abs() < 1e-8,
                "lat round trip: {} vs {}",
                back.lat,
                g.lat
            );
            assert!((back.lon - g.lon).abs() < 1e-8);
            assert!(
                (back.height - g.height).abs() < 1e-3,
                "height round trip: {} vs {}",
                back.height,
                g.height
            );
        }
    }

    #[test]
    fn test_geocentric_to_geodetic_poles() {
        let north = geocentric_to_geodetic(Ecef { x: 0.0, y: 0.0, z: B + 100.0 });
        assert!((north.lat - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(north.lon, 0.0);
        assert!((north.height - 100.0).abs() < 1e-6);

        let south = geocentric_to_geodetic(Ecef { x: 0.0, y: 0.0, z: -(B + 250.0) });
        assert!((south.lat + FRAC_PI_2).abs() < 1e-12);
        assert!((south.height - 250.0).abs() < 1e-6);

        // Degenerate origin counts as the north pole
        let origin = geocentric_to_geodetic(Ecef { x: 0.0, y: 0.0, z: 0.0 });
        assert!((origin.lat - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_azimuth_quadrants() {
        assert!((calculate_azimuth(0.0, 1.0) - 0.0).abs() < 1e-12, "north");
        assert!((calculate_azimuth(1.0, 0.0) - FRAC_PI_2).abs() < 1e-12, "east");
        assert!((calculate_azimuth(0.0, -1.0) - PI).abs() < 1e-12, "south");
        assert!((calculate_azimuth(-1.0, 0.0) - 1.5 * PI).abs() < 1e-12, "west");
        assert_eq!(calculate_azimuth(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_polar_cartesian_round_trip() {
        let p = RadarPolar {
            range: 92_600.0,
            azimuth: 1.2,
            elevation: 0.05,
        };
        let back = radar_cartesian_to_polar(radar_polar_to_cartesian(p));
        assert!((back.range - p.range).abs() < 1e-6);
        assert!((back.azimuth - p.azimuth).abs() < 1e-9);
        assert!((back.elevation - p.elevation).abs() < 1e-9);
    }

    #[test]
    fn test_elevation_clamp() {
        // Target far above anything the slant range allows
        let up = calculate_elevation(0.0, EARTH_RADIUS_M, 100.0, 50_000.0);
        assert_eq!(up, FRAC_PI_2);
        // Target far below
        let down = calculate_elevation(50_000.0, EARTH_RADIUS_M, 100.0, 0.0);
        assert_eq!(down, -FRAC_PI_2);
        // Zero range
        assert_eq!(calculate_elevation(27.0, EARTH_RADIUS_M, 0.0, 3000.0), 0.0);
    }

    #[test]
    fn test_elevation_level_target_slightly_negative() {
        // Same height as the site: earth curvature pulls the target below
        // the local horizontal
        let e = calculate_elevation(0.0, EARTH_RADIUS_M, 50_000.0, 0.0);
        assert!(e < 0.0 && e > -0.01, "expected small negative elevation, got {e}");
    }

    #[test]
    fn test_site_frame_round_trip() {
        let gt = GeoTransform::new();
        let site = Geodetic::from_degrees(41.3, 2.1, 27.3);
        let local = RadarCartesian { x: 10_000.0, y: -4_000.0, z: 900.0 };
        let geo = gt.radar_cartesian_to_geocentric(site, local);
        let back = gt.geocentric_to_radar_cartesian(site, geo);
        assert!((back.x - local.x).abs() < 1e-6);
        assert!((back.y - local.y).abs() < 1e-6);
        assert!((back.z - local.z).abs() < 1e-6);
    }

    #[test]
    fn test_target_north_of_site_moves_latitude_north() {
        let gt = GeoTransform::new();
        let site = Geodetic::from_degrees(40.0, -3.0, 600.0);
        let local = RadarCartesian { x: 0.0, y: 50_000.0, z: 3_000.0 };
        let target = geocentric_to_geodetic(gt.radar_cartesian_to_geocentric(site, local));
        assert!(target.lat > site.lat, "northward offset should raise latitude");
        assert!((target.lon - site.lon).abs() < 1e-4, "longitude should barely move");
    }

    #[test]
    fn test_stereographic_round_trip() {
        let mut gt = GeoTransform::new();
        gt.set_center_projection(Geodetic::from_degrees(41.0, 2.0, 500.0));
        // Center height forced to zero
        let center = gt.center_projection().unwrap();
        assert_eq!(center.height, 0.0);

        let c = RadarCartesian { x: 30_000.0, y: -12_000.0, z: 800.0 };
        let st = gt.system_cartesian_to_stereographic(c).unwrap();
        let back = gt.stereographic_to_system_cartesian(st).unwrap();
        assert!((back.x - c.x).abs() < 1e-6);
        assert!((back.y - c.y).abs() < 1e-6);
        assert!((back.z - c.z).abs() < 1e-6);
    }

    #[test]
    fn test_projection_requires_center() {
        let gt = GeoTransform::new();
        let c = RadarCartesian { x: 1.0, y: 2.0, z: 3.0 };
        assert!(gt.geocentric_to_system_cartesian(Ecef { x: 0.0, y: 0.0, z: 0.0 }).is_none());
        assert!(gt.system_cartesian_to_stereographic(c).is_none());
    }
}
