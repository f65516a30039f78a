//! Zip- and city-level coordinate tables and record resolution
//!
//! Zip coordinates win over city coordinates. A record that matches neither
//! keeps `CoordinateSource::None` and is skipped by proximity and map code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::info;

use crate::models::{CoordinateSource, Coordinates, GeoOrganization, OrganizationRecord};

/// `{"coordinates": {"<zip>": {"latitude": .., "longitude": ..}}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZipCoordinateTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub coordinates: HashMap<String, Coordinates>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_zips: Vec<String>,
}

impl ZipCoordinateTable {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn get(&self, zip: &str) -> Option<Coordinates> {
        self.coordinates.get(zip).copied()
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

impl FromIterator<(String, Coordinates)> for ZipCoordinateTable {
    fn from_iter<I: IntoIterator<Item = (String, Coordinates)>>(iter: I) -> Self {
        Self {
            coordinates: iter.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// `{"city_coordinates": {"City, ST": {"latitude": .., "longitude": ..}}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityCoordinateTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub city_coordinates: HashMap<String, Coordinates>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_cities: Vec<String>,
}

impl CityCoordinateTable {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn get(&self, city_key: &str) -> Option<Coordinates> {
        self.city_coordinates.get(city_key).copied()
    }

    pub fn len(&self) -> usize {
        self.city_coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.city_coordinates.is_empty()
    }
}

impl FromIterator<(String, Coordinates)> for CityCoordinateTable {
    fn from_iter<I: IntoIterator<Item = (String, Coordinates)>>(iter: I) -> Self {
        Self {
            city_coordinates: iter.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// Resolve a single record: zip table first, then `"City, ST"`
pub fn resolve_record(
    record: &OrganizationRecord,
    zips: &ZipCoordinateTable,
    cities: Option<&CityCoordinateTable>,
) -> GeoOrganization {
    let by_zip = Some(record.zip.as_str())
        .filter(|zip| !zip.trim().is_empty())
        .and_then(|zip| zips.get(zip));
    if let Some(at) = by_zip {
        return GeoOrganization::located(record.clone(), at, CoordinateSource::Zip);
    }

    match cities.and_then(|table| table.get(&record.city_key())) {
        Some(at) => GeoOrganization::located(record.clone(), at, CoordinateSource::City),
        None => GeoOrganization::unlocated(record.clone()),
    }
}

/// Resolve every record; output is 1:1 with the input, in order
pub fn resolve_all(
    records: &[OrganizationRecord],
    zips: &ZipCoordinateTable,
    cities: Option<&CityCoordinateTable>,
) -> Vec<GeoOrganization> {
    let resolved: Vec<GeoOrganization> = records
        .iter()
        .map(|r| resolve_record(r, zips, cities))
        .collect();

    info!("Coordinates loaded: {}", ProvenanceStats::tally(&resolved));

    resolved
}

/// Count of records per coordinate source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProvenanceStats {
    pub zip: usize,
    pub city: usize,
    pub none: usize,
}

impl ProvenanceStats {
    pub fn tally(records: &[GeoOrganization]) -> Self {
        records.iter().fold(Self::default(), |mut s, r| {
            match r.coordinate_source {
                CoordinateSource::Zip => s.zip += 1,
                CoordinateSource::City => s.city += 1,
                CoordinateSource::None => s.none += 1,
            }
            s
        })
    }
}

impl fmt::Display for ProvenanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} zip-based, {} city-based, {} no coordinates",
            self.zip, self.city, self.none
        )
    }
}
