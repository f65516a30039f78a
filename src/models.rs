use serde::{Deserialize, Serialize};

/// Placeholder for a required text field the source row did not supply
pub const UNKNOWN: &str = "Unknown";

/// Organization as read from one CSV row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub zip: String,
    pub city: String,
    pub state: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl OrganizationRecord {
    /// `"City, ST"` key used by the city coordinate table
    pub fn city_key(&self) -> String {
        format!("{}, {}", self.city, self.state)
    }
}

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Lookup tier that supplied a record's coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSource {
    Zip,
    City,
    None,
}

impl CoordinateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateSource::Zip => "zip",
            CoordinateSource::City => "city",
            CoordinateSource::None => "none",
        }
    }
}

/// Organization joined against the coordinate tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoOrganization {
    #[serde(flatten)]
    pub record: OrganizationRecord,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "coordinateSource")]
    pub coordinate_source: CoordinateSource,
}

impl GeoOrganization {
    pub fn located(record: OrganizationRecord, at: Coordinates, source: CoordinateSource) -> Self {
        Self {
            record,
            latitude: Some(at.latitude),
            longitude: Some(at.longitude),
            coordinate_source: source,
        }
    }

    pub fn unlocated(record: OrganizationRecord) -> Self {
        Self {
            record,
            latitude: None,
            longitude: None,
            coordinate_source: CoordinateSource::None,
        }
    }

    /// Both coordinates, if present and finite
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)).filter(Coordinates::is_finite),
            _ => None,
        }
    }
}

/// One entry of a search result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub organization: GeoOrganization,
    /// Miles from the search origin, one decimal; proximity searches only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl SearchResult {
    pub fn record(&self) -> &OrganizationRecord {
        &self.organization.record
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.organization.coordinates()
    }
}

impl From<GeoOrganization> for SearchResult {
    fn from(organization: GeoOrganization) -> Self {
        Self {
            organization,
            distance: None,
        }
    }
}

/// Flat row used for CSV export of a result set
#[derive(Debug, Serialize)]
pub struct ResultRow<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub service_type: &'a str,
    pub zip: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub address: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub coordinate_source: &'static str,
    pub distance: Option<f64>,
}

impl<'a> From<&'a SearchResult> for ResultRow<'a> {
    fn from(r: &'a SearchResult) -> Self {
        let record = r.record();
        Self {
            name: &record.name,
            service_type: &record.service_type,
            zip: &record.zip,
            city: &record.city,
            state: &record.state,
            phone: &record.phone,
            email: &record.email,
            address: &record.address,
            latitude: r.organization.latitude,
            longitude: r.organization.longitude,
            coordinate_source: r.organization.coordinate_source.as_str(),
            distance: r.distance,
        }
    }
}
