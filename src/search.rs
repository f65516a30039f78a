//! Attribute and proximity search over the loaded directory

use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use crate::coordinates::{resolve_all, CityCoordinateTable, ProvenanceStats, ZipCoordinateTable};
use crate::geo::{distance_between, round_tenths};
use crate::models::{Coordinates, GeoOrganization, OrganizationRecord, SearchResult, UNKNOWN};

/// Largest radius the "expand search" action will reach
pub const MAX_EXPANDED_RADIUS_MILES: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please select at least one search option: Enter a zip code, select a state, or choose a service type. You cannot search for all services in all states at once.")]
    NoCriteria,
    #[error("Please enter a valid zip code (e.g., 12345)")]
    InvalidZip(String),
    #[error("Please select a valid search radius")]
    InvalidRadius,
}

/// Keep only ASCII digits
pub fn normalize_zip(zip: &str) -> String {
    zip.chars().filter(char::is_ascii_digit).collect()
}

/// `12345` or `12345-6789`
pub fn is_valid_zip(zip: &str) -> bool {
    let bytes = zip.as_bytes();
    let digits = |s: &[u8]| s.iter().all(u8::is_ascii_digit);
    match bytes.len() {
        5 => digits(bytes),
        10 => digits(&bytes[..5]) && bytes[5] == b'-' && digits(&bytes[6..]),
        _ => false,
    }
}

/// Double the radius, capped at [`MAX_EXPANDED_RADIUS_MILES`]
pub fn expand_radius(radius_miles: f64) -> f64 {
    (radius_miles * 2.0).min(MAX_EXPANDED_RADIUS_MILES)
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Zip/state/type criteria, combined with AND. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeFilter {
    pub zip: Option<String>,
    pub state: Option<String>,
    pub service_type: Option<String>,
}

impl AttributeFilter {
    pub fn zip(zip: &str) -> Self {
        Self {
            zip: non_blank(zip),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.zip.is_none() && self.state.is_none() && self.service_type.is_none()
    }
}

/// Raw filter inputs as typed or selected by the user
#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    pub zip: String,
    pub state: String,
    pub service_type: String,
}

impl FilterRequest {
    pub fn validate(&self) -> Result<AttributeFilter, ValidationError> {
        let filter = AttributeFilter {
            zip: non_blank(&self.zip),
            state: non_blank(&self.state),
            service_type: non_blank(&self.service_type),
        };

        if filter.is_empty() {
            return Err(ValidationError::NoCriteria);
        }
        if let Some(zip) = &filter.zip {
            if !is_valid_zip(zip) {
                return Err(ValidationError::InvalidZip(zip.clone()));
            }
        }

        Ok(filter)
    }
}

/// Radius and optional type for a proximity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityFilter {
    pub radius_miles: f64,
    pub service_type: Option<String>,
}

impl ProximityFilter {
    pub fn new(radius_miles: f64, service_type: &str) -> Result<Self, ValidationError> {
        if !radius_miles.is_finite() || radius_miles <= 0.0 {
            return Err(ValidationError::InvalidRadius);
        }
        Ok(Self {
            radius_miles,
            service_type: non_blank(service_type),
        })
    }

    pub fn expanded(&self) -> Self {
        Self {
            radius_miles: expand_radius(self.radius_miles),
            service_type: self.service_type.clone(),
        }
    }
}

/// The geo-resolved organization set held in memory after a load
#[derive(Debug, Clone, Default)]
pub struct Directory {
    organizations: Vec<GeoOrganization>,
}

impl Directory {
    pub fn new(organizations: Vec<GeoOrganization>) -> Self {
        Self { organizations }
    }

    pub fn from_records(
        records: &[OrganizationRecord],
        zips: &ZipCoordinateTable,
        cities: Option<&CityCoordinateTable>,
    ) -> Self {
        Self::new(resolve_all(records, zips, cities))
    }

    pub fn organizations(&self) -> &[GeoOrganization] {
        &self.organizations
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }

    pub fn provenance(&self) -> ProvenanceStats {
        ProvenanceStats::tally(&self.organizations)
    }

    /// Records matching every supplied criterion, in directory order
    pub fn search(&self, filter: &AttributeFilter) -> Vec<SearchResult> {
        let zip = filter.zip.as_deref().map(normalize_zip);

        let results: Vec<SearchResult> = self
            .organizations
            .iter()
            .filter(|org| {
                let r = &org.record;
                zip.as_ref().map_or(true, |z| normalize_zip(&r.zip) == *z)
                    && filter.state.as_ref().map_or(true, |s| r.state == *s)
                    && filter.service_type.as_ref().map_or(true, |t| r.service_type == *t)
            })
            .cloned()
            .map(SearchResult::from)
            .collect();

        debug!("Attribute search {:?} matched {}", filter, results.len());
        results
    }

    pub fn search_by_zip(&self, zip: &str) -> Vec<SearchResult> {
        self.search(&AttributeFilter::zip(zip))
    }

    /// Located records within the radius, nearest first.
    ///
    /// Both the exact and the reported (rounded) distance must be within the
    /// radius. Equal distances keep directory order.
    pub fn search_nearby(&self, origin: Coordinates, filter: &ProximityFilter) -> Vec<SearchResult> {
        let mut hits: Vec<(f64, &GeoOrganization)> = self
            .organizations
            .iter()
            .filter(|org| {
                filter
                    .service_type
                    .as_ref()
                    .map_or(true, |t| org.record.service_type == *t)
            })
            .filter_map(|org| {
                let at = org.coordinates()?;
                let miles = distance_between(origin, at);
                let reported = round_tenths(miles);
                let within = miles <= filter.radius_miles && reported <= filter.radius_miles;
                within.then_some((reported, org))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));

        debug!(
            "Proximity search within {} miles matched {}",
            filter.radius_miles,
            hits.len()
        );

        hits.into_iter()
            .map(|(distance, org)| SearchResult {
                organization: org.clone(),
                distance: Some(distance),
            })
            .collect()
    }

    /// Distinct two-letter state codes, sorted
    pub fn states(&self) -> Vec<String> {
        self.organizations
            .iter()
            .map(|o| o.record.state.as_str())
            .filter(|s| s.chars().count() == 2)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Distinct service types other than the unknown placeholder, sorted
    pub fn service_types(&self) -> Vec<String> {
        self.organizations
            .iter()
            .map(|o| o.record.service_type.as_str())
            .filter(|t| !t.is_empty() && *t != UNKNOWN)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Zip,
    Filters,
    Proximity,
}

/// The active filters of a search, used to explain an empty result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchContext {
    pub kind: SearchKind,
    pub zip: Option<String>,
    pub state: Option<String>,
    pub service_type: Option<String>,
    pub radius_miles: Option<f64>,
}

impl From<&AttributeFilter> for SearchContext {
    fn from(f: &AttributeFilter) -> Self {
        Self {
            kind: if f.zip.is_some() { SearchKind::Zip } else { SearchKind::Filters },
            zip: f.zip.clone(),
            state: f.state.clone(),
            service_type: f.service_type.clone(),
            radius_miles: None,
        }
    }
}

impl From<&ProximityFilter> for SearchContext {
    fn from(f: &ProximityFilter) -> Self {
        Self {
            kind: SearchKind::Proximity,
            zip: None,
            state: None,
            service_type: f.service_type.clone(),
            radius_miles: Some(f.radius_miles),
        }
    }
}

pub fn no_results_message(ctx: &SearchContext) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(t) = &ctx.service_type {
        parts.push(format!("\"{}\"", t));
    }

    match (ctx.kind, &ctx.zip, &ctx.state) {
        (SearchKind::Proximity, zip, _) => {
            if let Some(r) = ctx.radius_miles {
                parts.push(format!("within {} miles", r));
            }
            match zip {
                Some(z) => parts.push(format!("of zip code {}", z)),
                None => parts.push("near your location".to_string()),
            }
        }
        (_, Some(z), _) => parts.push(format!("in zip code {}", z)),
        (_, None, Some(s)) => parts.push(format!("in {}", s)),
        _ => {}
    }

    if let (Some(s), Some(_)) = (&ctx.state, &ctx.zip) {
        parts.push(format!("in {}", s));
    }

    let mut message = "No services found".to_string();
    if !parts.is_empty() {
        message.push(' ');
        message.push_str(&parts.join(" "));
    }
    message + ". Try expanding your search or checking nearby areas."
}

pub fn result_count_label(count: usize) -> String {
    format!("{} service{} found", count, if count == 1 { "" } else { "s" })
}

/// A finished search: its results and the filters that produced them
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub context: SearchContext,
    pub results: Vec<SearchResult>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result count, or the no-results explanation
    pub fn summary(&self) -> String {
        if self.results.is_empty() {
            no_results_message(&self.context)
        } else {
            result_count_label(self.results.len())
        }
    }
}
