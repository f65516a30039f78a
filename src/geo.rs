//! Great-circle distance and lat/lon bounding boxes

use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

/// Mean Earth radius in miles
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Haversine distance in miles between two points given in degrees
pub fn distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = ((d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MILES * c
}

pub fn distance_between(a: Coordinates, b: Coordinates) -> f64 {
    distance_miles(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Round to one decimal place
pub fn round_tenths(miles: f64) -> f64 {
    (miles * 10.0).round() / 10.0
}

/// Axis-aligned lat/lon rectangle, south-west to north-east
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    /// Smallest box covering every point, or `None` for no points
    pub fn covering<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinates>,
    {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Bounds::new(p.latitude, p.longitude, p.latitude, p.longitude),
                Some(b) => Bounds::new(
                    b.south.min(p.latitude),
                    b.west.min(p.longitude),
                    b.north.max(p.latitude),
                    b.east.max(p.longitude),
                ),
            })
        })
    }

    /// Grow each axis by `fraction` of its span on both sides
    pub fn padded(&self, fraction: f64) -> Self {
        let lat_pad = (self.north - self.south) * fraction;
        let lon_pad = (self.east - self.west) * fraction;
        Bounds::new(
            self.south - lat_pad,
            self.west - lon_pad,
            self.north + lat_pad,
            self.east + lon_pad,
        )
    }

    pub fn contains(&self, p: Coordinates) -> bool {
        p.latitude >= self.south
            && p.latitude <= self.north
            && p.longitude >= self.west
            && p.longitude <= self.east
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points() {
        for &(lat, lon) in &[(0.0, 0.0), (40.75, -73.99), (-33.86, 151.2), (89.9, 179.9)] {
            assert_eq!(distance_miles(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ((40.75, -73.99), (34.05, -118.24)),
            ((51.5, -0.12), (-33.86, 151.2)),
            ((0.0, 179.5), (0.0, -179.5)),
        ];
        for ((a1, a2), (b1, b2)) in pairs {
            let ab = distance_miles(a1, a2, b1, b2);
            let ba = distance_miles(b1, b2, a1, a2);
            assert!((ab - ba).abs() < 1e-9);
        }
    }

    #[test]
    fn test_antipodal() {
        let d = distance_miles(0.0, 0.0, 0.0, 180.0);
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_MILES;
        assert!((d - half_circumference).abs() < 1e-6);
        assert!((d - 12_437.0).abs() < 20.0);
    }

    #[test]
    fn test_known_distance() {
        // New York to Los Angeles, roughly 2445 miles
        let d = distance_miles(40.7128, -74.0060, 34.0522, -118.2437);
        assert!((d - 2445.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_round_tenths() {
        assert_eq!(round_tenths(1.24), 1.2);
        assert_eq!(round_tenths(1.25), 1.3);
        assert_eq!(round_tenths(0.04), 0.0);
    }

    #[test]
    fn test_covering_bounds() {
        let points = vec![
            Coordinates::new(40.0, -74.0),
            Coordinates::new(42.0, -71.0),
            Coordinates::new(39.0, -75.5),
        ];
        let b = Bounds::covering(points).unwrap();
        assert_eq!(b, Bounds::new(39.0, -75.5, 42.0, -71.0));
        assert!(Bounds::covering(Vec::new()).is_none());
    }

    #[test]
    fn test_padding_and_contains() {
        let b = Bounds::new(40.0, -75.0, 41.0, -74.0).padded(0.1);
        assert!((b.south - 39.9).abs() < 1e-9);
        assert!((b.east - -73.9).abs() < 1e-9);
        assert!(b.contains(Coordinates::new(41.05, -74.95)));
        assert!(!b.contains(Coordinates::new(41.2, -74.5)));
    }
}
