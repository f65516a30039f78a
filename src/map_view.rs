//! Map rendering decisions: heat layer vs. markers, viewport culling and
//! bounds fitting.
//!
//! The controller never draws anything itself. Each redraw produces a
//! [`RenderPlan`] describing which heat points and markers the map widget
//! should show for the current results and viewport.

use serde::Serialize;
use std::f64::consts::PI;
use tracing::debug;

use crate::geo::Bounds;
use crate::models::{Coordinates, SearchResult};

/// Above this zoom, markers join the heat layer and geometry is culled
pub const MARKER_ZOOM_THRESHOLD: f64 = 6.0;
pub const MAX_HEAT_POINTS: usize = 5000;
pub const MAX_MARKERS: usize = 2000;
/// Fraction of the visible span added on each side before culling
pub const VIEWPORT_PADDING: f64 = 0.1;
pub const FIT_PADDING_PX: u32 = 50;
pub const FIT_MAX_ZOOM: f64 = 12.0;
pub const INITIAL_CENTER: Coordinates = Coordinates {
    latitude: 39.8283,
    longitude: -98.5795,
};
pub const INITIAL_ZOOM: f64 = 4.0;

const TILE_SIZE: f64 = 256.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Normalized Web Mercator position in `[0, 1]` on both axes
fn project(p: Coordinates) -> (f64, f64) {
    let lat = p.latitude.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (p.longitude + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}

fn unproject(x: f64, y: f64) -> Coordinates {
    let lon = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    Coordinates::new(lat, lon)
}

/// Visible map area
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: Coordinates,
    pub zoom: f64,
    pub bounds: Bounds,
}

impl Viewport {
    /// Viewport of a `width` x `height` pixel map centered on `center`
    pub fn around(center: Coordinates, zoom: f64, (width, height): (u32, u32)) -> Self {
        let world = TILE_SIZE * zoom.exp2();
        let (cx, cy) = project(center);
        let half_w = f64::from(width) / 2.0 / world;
        let half_h = f64::from(height) / 2.0 / world;

        let north_west = unproject(cx - half_w, (cy - half_h).max(0.0));
        let south_east = unproject(cx + half_w, (cy + half_h).min(1.0));

        Self {
            center,
            zoom,
            bounds: Bounds::new(
                south_east.latitude,
                north_west.longitude,
                north_west.latitude,
                south_east.longitude,
            ),
        }
    }
}

/// Optional rendering capabilities of the map widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub heat_layer: bool,
    pub clustering: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            heat_layer: true,
            clustering: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Position of the record in the current result set
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerLayer {
    Clustered,
    Direct,
}

/// What the map should show after a redraw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPlan {
    pub viewport: Viewport,
    /// `None` when the heat layer is off or unsupported
    pub heat: Option<Vec<HeatPoint>>,
    pub markers: Vec<Marker>,
    pub marker_layer: MarkerLayer,
    /// Padded bounds used for culling, when culling applied
    pub culled_to: Option<Bounds>,
}

impl RenderPlan {
    fn empty(viewport: Viewport, marker_layer: MarkerLayer) -> Self {
        Self {
            viewport,
            heat: None,
            markers: Vec::new(),
            marker_layer,
            culled_to: None,
        }
    }
}

/// Request for the widget to frame a set of points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitBounds {
    pub bounds: Bounds,
    pub padding_px: (u32, u32),
    pub max_zoom: f64,
}

impl FitBounds {
    pub fn covering<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinates>,
    {
        Bounds::covering(points).map(|bounds| Self {
            bounds,
            padding_px: (FIT_PADDING_PX, FIT_PADDING_PX),
            max_zoom: FIT_MAX_ZOOM,
        })
    }

    /// Largest whole zoom at which the padded box fits the map, capped at
    /// `max_zoom`
    pub fn zoom_for(&self, (width, height): (u32, u32)) -> f64 {
        let (west, north) = project(Coordinates::new(self.bounds.north, self.bounds.west));
        let (east, south) = project(Coordinates::new(self.bounds.south, self.bounds.east));
        let span_x = (east - west) * TILE_SIZE;
        let span_y = (south - north) * TILE_SIZE;

        let avail_x = f64::from(width.saturating_sub(2 * self.padding_px.0).max(1));
        let avail_y = f64::from(height.saturating_sub(2 * self.padding_px.1).max(1));

        let fit = |avail: f64, span: f64| {
            if span <= 0.0 {
                f64::INFINITY
            } else {
                (avail / span).log2()
            }
        };

        fit(avail_x, span_x)
            .min(fit(avail_y, span_y))
            .floor()
            .clamp(0.0, self.max_zoom)
    }

    pub fn viewport(&self, map_size: (u32, u32)) -> Viewport {
        Viewport::around(self.bounds.center(), self.zoom_for(map_size), map_size)
    }
}

/// Owns the heat toggle, the viewport and the last result set
#[derive(Debug, Clone)]
pub struct MapViewController {
    show_heat_map: bool,
    capabilities: Capabilities,
    map_size: (u32, u32),
    viewport: Viewport,
    results: Vec<SearchResult>,
}

impl MapViewController {
    pub fn new(capabilities: Capabilities, map_size: (u32, u32)) -> Self {
        Self {
            show_heat_map: true,
            capabilities,
            map_size,
            viewport: Viewport::around(INITIAL_CENTER, INITIAL_ZOOM, map_size),
            results: Vec::new(),
        }
    }

    pub fn show_heat_map(&self) -> bool {
        self.show_heat_map
    }

    pub fn set_show_heat_map(&mut self, on: bool) {
        self.show_heat_map = on;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    /// Replace the result set, frame it, and plan the redraw
    pub fn show_results(&mut self, results: Vec<SearchResult>) -> RenderPlan {
        self.results = results;
        if let Some(fitted) = self.fit_bounds().map(|f| f.viewport(self.map_size)) {
            self.viewport = fitted;
        }
        self.plan()
    }

    /// Accept a settled (debounced) viewport and plan the redraw
    pub fn on_viewport_settled(&mut self, viewport: Viewport) -> RenderPlan {
        self.viewport = viewport;
        self.plan()
    }

    /// Box around every located result, or `None` if none are located
    pub fn fit_bounds(&self) -> Option<FitBounds> {
        FitBounds::covering(self.results.iter().filter_map(SearchResult::coordinates))
    }

    pub fn plan(&self) -> RenderPlan {
        let marker_layer = if self.capabilities.clustering {
            MarkerLayer::Clustered
        } else {
            MarkerLayer::Direct
        };

        let located: Vec<(usize, &SearchResult, Coordinates)> = self
            .results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.coordinates().map(|c| (i, r, c)))
            .collect();

        if located.is_empty() {
            debug!("No results with coordinates to display on map");
            return RenderPlan::empty(self.viewport, marker_layer);
        }

        let zoomed_in = self.viewport.zoom > MARKER_ZOOM_THRESHOLD;
        let culled_to = zoomed_in.then(|| self.viewport.bounds.padded(VIEWPORT_PADDING));
        let visible = |c: &Coordinates| culled_to.map_or(true, |b| b.contains(*c));

        let heat_mode = self.show_heat_map && self.capabilities.heat_layer;

        let heat = heat_mode.then(|| {
            located
                .iter()
                .take(MAX_HEAT_POINTS)
                .filter(|(_, _, c)| visible(c))
                .map(|(_, _, c)| HeatPoint {
                    latitude: c.latitude,
                    longitude: c.longitude,
                    intensity: 1.0,
                })
                .collect::<Vec<_>>()
        });

        let markers: Vec<Marker> = if !heat_mode || zoomed_in {
            located
                .iter()
                .filter(|(_, _, c)| visible(c))
                .take(MAX_MARKERS)
                .map(|(i, r, c)| Marker {
                    index: *i,
                    latitude: c.latitude,
                    longitude: c.longitude,
                    title: r.record().name.clone(),
                    distance: r.distance,
                })
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            "Map redraw at zoom {}: {} heat points, {} markers from {} located results",
            self.viewport.zoom,
            heat.as_ref().map_or(0, Vec::len),
            markers.len(),
            located.len()
        );

        RenderPlan {
            viewport: self.viewport,
            heat,
            markers,
            marker_layer,
            culled_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoordinateSource, GeoOrganization, OrganizationRecord};

    const MAP_SIZE: (u32, u32) = (1024, 768);

    fn result(name: &str, at: Option<(f64, f64)>) -> SearchResult {
        let record = OrganizationRecord {
            name: name.to_string(),
            service_type: "Shelter".to_string(),
            zip: String::new(),
            city: "City".to_string(),
            state: "NY".to_string(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
        };
        let org = match at {
            Some((lat, lon)) => GeoOrganization::located(record, Coordinates::new(lat, lon), CoordinateSource::Zip),
            None => GeoOrganization::unlocated(record),
        };
        SearchResult::from(org)
    }

    fn viewport(zoom: f64, bounds: Bounds) -> Viewport {
        Viewport {
            center: bounds.center(),
            zoom,
            bounds,
        }
    }

    fn controller_with(results: Vec<SearchResult>) -> MapViewController {
        let mut c = MapViewController::new(Capabilities::default(), MAP_SIZE);
        c.results = results;
        c
    }

    #[test]
    fn test_zoomed_out_heat_only_no_culling() {
        let mut c = controller_with(vec![
            result("ny", Some((40.7, -74.0))),
            result("la", Some((34.0, -118.2))),
            result("nowhere", None),
        ]);
        c.set_viewport(viewport(4.0, Bounds::new(40.0, -75.0, 41.0, -73.0)));

        let plan = c.plan();
        assert_eq!(plan.heat.as_ref().map(Vec::len), Some(2));
        assert!(plan.markers.is_empty());
        assert_eq!(plan.culled_to, None);
    }

    #[test]
    fn test_zoomed_in_dual_view_is_culled() {
        let mut c = controller_with(vec![
            result("inside", Some((40.5, -74.0))),
            result("edge", Some((41.05, -74.0))),
            result("outside", Some((34.0, -118.2))),
        ]);
        c.set_viewport(viewport(8.0, Bounds::new(40.0, -75.0, 41.0, -73.0)));

        let plan = c.plan();
        assert_eq!(plan.heat.as_ref().map(Vec::len), Some(2));
        let titles: Vec<&str> = plan.markers.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["inside", "edge"]);
        assert!(plan.culled_to.is_some());
    }

    #[test]
    fn test_heat_disabled_shows_markers() {
        let mut c = controller_with(vec![result("ny", Some((40.7, -74.0)))]);
        c.set_show_heat_map(false);
        c.set_viewport(viewport(4.0, Bounds::new(20.0, -130.0, 50.0, -60.0)));

        let plan = c.plan();
        assert_eq!(plan.heat, None);
        assert_eq!(plan.markers.len(), 1);
        assert_eq!(plan.marker_layer, MarkerLayer::Clustered);
    }

    #[test]
    fn test_heat_unsupported_falls_back_to_markers() {
        let caps = Capabilities {
            heat_layer: false,
            clustering: false,
        };
        let mut c = MapViewController::new(caps, MAP_SIZE);
        c.results = vec![result("ny", Some((40.7, -74.0)))];
        let plan = c.plan();
        assert_eq!(plan.heat, None);
        assert_eq!(plan.markers.len(), 1);
        assert_eq!(plan.marker_layer, MarkerLayer::Direct);
    }

    #[test]
    fn test_caps() {
        let many: Vec<SearchResult> = (0..6000)
            .map(|i| result(&format!("org{}", i), Some((40.0 + (i as f64) * 1e-4, -74.0))))
            .collect();
        let mut c = controller_with(many);

        c.set_viewport(viewport(3.0, Bounds::new(20.0, -130.0, 50.0, -60.0)));
        assert_eq!(c.plan().heat.map(|h| h.len()), Some(MAX_HEAT_POINTS));

        c.set_show_heat_map(false);
        let plan = c.plan();
        assert_eq!(plan.markers.len(), MAX_MARKERS);
        assert_eq!(plan.markers[0].index, 0);
        assert_eq!(plan.markers[MAX_MARKERS - 1].index, MAX_MARKERS - 1);
    }

    #[test]
    fn test_no_located_results_is_empty_plan() {
        let c = controller_with(vec![result("nowhere", None)]);
        let plan = c.plan();
        assert_eq!(plan.heat, None);
        assert!(plan.markers.is_empty());
        assert!(c.fit_bounds().is_none());
    }

    #[test]
    fn test_fit_single_point_stops_at_max_zoom() {
        let fit = FitBounds::covering([Coordinates::new(40.75, -73.99)]).unwrap();
        assert_eq!(fit.zoom_for(MAP_SIZE), FIT_MAX_ZOOM);
        assert_eq!(fit.padding_px, (50, 50));
    }

    #[test]
    fn test_fit_continental_spread() {
        let fit = FitBounds::covering([
            Coordinates::new(40.7, -74.0),
            Coordinates::new(34.0, -118.2),
        ])
        .unwrap();
        let zoom = fit.zoom_for(MAP_SIZE);
        assert!((2.0..=4.0).contains(&zoom), "zoom {}", zoom);

        let view = fit.viewport(MAP_SIZE);
        assert!(view.bounds.contains(Coordinates::new(40.7, -74.0)));
        assert!(view.bounds.contains(Coordinates::new(34.0, -118.2)));
    }

    #[test]
    fn test_show_results_fits_and_plans() {
        let mut c = MapViewController::new(Capabilities::default(), MAP_SIZE);
        let plan = c.show_results(vec![
            result("a", Some((40.75, -73.99))),
            result("b", Some((40.76, -73.98))),
        ]);
        assert!(c.viewport().zoom > MARKER_ZOOM_THRESHOLD);
        assert!(c.viewport().zoom <= FIT_MAX_ZOOM);
        assert_eq!(plan.markers.len(), 2);
        assert_eq!(plan.heat.map(|h| h.len()), Some(2));
    }

    #[test]
    fn test_viewport_around_is_centered() {
        let v = Viewport::around(INITIAL_CENTER, INITIAL_ZOOM, MAP_SIZE);
        assert!(v.bounds.contains(INITIAL_CENTER));
        assert!(v.bounds.west < v.bounds.east);
        assert!(v.bounds.south < v.bounds.north);
        assert!(((v.bounds.west + v.bounds.east) / 2.0 - INITIAL_CENTER.longitude).abs() < 1e-9);
    }

    #[test]
    fn test_projection_round_trip() {
        let p = Coordinates::new(40.75, -73.99);
        let (x, y) = project(p);
        let back = unproject(x, y);
        assert!((back.latitude - p.latitude).abs() < 1e-9);
        assert!((back.longitude - p.longitude).abs() < 1e-9);
    }
}
