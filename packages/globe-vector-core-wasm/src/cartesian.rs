// WGS84 ellipsoid helpers: geodetic degrees to earth-fixed cartesians and local frames
use nalgebra::{Matrix4, Rotation3, Vector3};

pub type Cartesian3 = Vector3<f64>;

const WGS84_RADII: [f64; 3] = [6378137.0, 6378137.0, 6356752.314245179];
// Used for small-distance spherical approximations (circle paths, extents)
pub const MEAN_EARTH_RADIUS: f64 = 6371008.8;
const EPSILON: f64 = 1e-12;

fn radii_squared() -> Vector3<f64> {
    Vector3::new(
        WGS84_RADII[0] * WGS84_RADII[0],
        WGS84_RADII[1] * WGS84_RADII[1],
        WGS84_RADII[2] * WGS84_RADII[2],
    )
}

/// Surface normal of the ellipsoid at a geodetic longitude/latitude in degrees.
pub fn geodetic_surface_normal_degrees(longitude: f64, latitude: f64) -> Vector3<f64> {
    let (lon, lat) = (longitude.to_radians(), latitude.to_radians());
    let cos_lat = lat.cos();
    Vector3::new(cos_lat * lon.cos(), cos_lat * lon.sin(), lat.sin()).normalize()
}

/// Surface normal of the ellipsoid below an earth-fixed position.
pub fn geodetic_surface_normal(position: &Cartesian3) -> Vector3<f64> {
    let one_over_radii_squared = radii_squared().map(|r| 1.0 / r);
    position.component_mul(&one_over_radii_squared).normalize()
}

pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Cartesian3 {
    let n = geodetic_surface_normal_degrees(longitude, latitude);
    let k = radii_squared().component_mul(&n);
    let gamma = n.dot(&k).sqrt();
    k / gamma + n * height
}

/// Earth-fixed position back to `(lon°, lat°, height)`, iterating on the latitude.
pub fn to_geodetic(position: &Cartesian3) -> (f64, f64, f64) {
    let [a, _, b] = WGS84_RADII;
    let e2 = 1.0 - (b * b) / (a * a);
    let p = (position.x * position.x + position.y * position.y).sqrt();
    let longitude = position.y.atan2(position.x);

    if p < EPSILON {
        let latitude = if position.z >= 0.0 { 90.0 } else { -90.0 };
        return (longitude.to_degrees(), latitude, position.z.abs() - b);
    }

    let mut latitude = position.z.atan2(p * (1.0 - e2));
    let mut height = 0.0;
    for _ in 0..6 {
        let sin_lat = latitude.sin();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        height = p / latitude.cos() - n;
        latitude = position.z.atan2(p * (1.0 - e2 * n / (n + height)));
    }
    (longitude.to_degrees(), latitude.to_degrees(), height)
}

/// Places a `[lon, lat, ..]` coordinate at the given height, ignoring any coordinate height.
pub fn from_coordinate(coordinate: &[f64], height: f64) -> Cartesian3 {
    from_degrees(coordinate[0], coordinate[1], height)
}

/// Local east-north-up frame at `origin`, expressed in earth-fixed coordinates.
pub fn east_north_up_to_fixed_frame(origin: &Cartesian3) -> Matrix4<f64> {
    let up = geodetic_surface_normal(origin);
    let east = if origin.x.abs() < EPSILON && origin.y.abs() < EPSILON {
        // at the poles any east works
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(-origin.y, origin.x, 0.0).normalize()
    };
    let north = up.cross(&east);

    Matrix4::new(
        east.x, north.x, up.x, origin.x, //
        east.y, north.y, up.y, origin.y, //
        east.z, north.z, up.z, origin.z, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Rotation for heading (clockwise from north), pitch and roll given in degrees.
pub fn heading_pitch_roll_rotation(heading: f64, pitch: f64, roll: f64) -> Rotation3<f64> {
    Rotation3::from_euler_angles(roll.to_radians(), -pitch.to_radians(), -heading.to_radians())
}

/// Spherical destination point, bearing in radians clockwise from north, distance in metres.
pub fn destination(longitude: f64, latitude: f64, bearing: f64, distance: f64) -> (f64, f64) {
    let delta = distance / MEAN_EARTH_RADIUS;
    let (lat1, lon1) = (latitude.to_radians(), longitude.to_radians());

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    (lon2.to_degrees(), lat2.to_degrees())
}

/// Half extent in degrees (longitude, latitude) of a circle with `radius` metres at `latitude`.
pub fn radius_in_degrees(radius: f64, latitude: f64) -> (f64, f64) {
    let lat_delta = (radius / MEAN_EARTH_RADIUS).to_degrees();
    let cos_lat = latitude.to_radians().cos().abs().max(EPSILON);
    (lat_delta / cos_lat, lat_delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equator_prime_meridian_sits_on_the_semi_major_axis() {
        let p = from_degrees(0.0, 0.0, 0.0);
        assert!((p.x - 6378137.0).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6 && p.z.abs() < 1e-6);

        let lifted = from_degrees(0.0, 0.0, 100.0);
        assert!((lifted.x - 6378237.0).abs() < 1e-6);
    }

    #[test]
    fn north_pole_uses_the_semi_minor_axis() {
        let p = from_degrees(0.0, 90.0, 0.0);
        assert!((p.z - 6356752.314245179).abs() < 1e-6);
    }

    #[test]
    fn enu_frame_up_matches_surface_normal() {
        let origin = from_degrees(10.0, 50.0, 0.0);
        let frame = east_north_up_to_fixed_frame(&origin);
        let up = Vector3::new(frame[(0, 2)], frame[(1, 2)], frame[(2, 2)]);
        let normal = geodetic_surface_normal_degrees(10.0, 50.0);
        assert!((up - normal).norm() < 1e-9);
        assert!((frame[(0, 3)] - origin.x).abs() < 1e-9);
    }

    #[test]
    fn geodetic_round_trip() {
        for (lon, lat, height) in [(10.0, 50.0, 120.0), (-75.5, -33.2, -20.0), (179.0, 1.0, 0.0)] {
            let (x, y, h) = to_geodetic(&from_degrees(lon, lat, height));
            assert!((x - lon).abs() < 1e-9);
            assert!((y - lat).abs() < 1e-9);
            assert!((h - height).abs() < 1e-4);
        }
    }

    #[test]
    fn destination_moves_the_requested_distance() {
        let (lon, lat) = destination(0.0, 0.0, 0.0, 1000.0);
        assert!(lon.abs() < 1e-9);
        let expected = (1000.0 / MEAN_EARTH_RADIUS).to_degrees();
        assert!((lat - expected).abs() < 1e-9);
    }
}
