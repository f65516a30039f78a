//! Application state and the operations the UI triggers
//!
//! `SearchApp` is the single owner of the loaded directory, the current
//! result set and the map controller. Every mutation goes through its
//! methods, so callers only need one `&mut SearchApp`.

use std::error::Error as StdError;
use thiserror::Error;
use tracing::{error, info};

use crate::config::DataSources;
use crate::geolocation::{locate, GeolocationError, Geolocator, GEOLOCATION_TIMEOUT};
use crate::loader::{load_directory, Fetcher, LoadError};
use crate::map_view::{Capabilities, MapViewController, RenderPlan, Viewport};
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::search::{
    Directory, FilterRequest, ProximityFilter, SearchContext, SearchOutcome, ValidationError,
};

/// Default map widget size in pixels
pub const DEFAULT_MAP_SIZE: (u32, u32) = (1024, 768);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Data is still loading. Please wait a moment and try again.")]
    NotLoaded,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}", .0.user_message())]
    Geolocation(#[from] GeolocationError),
    #[error("Service data is unavailable. Please try again.")]
    Load(#[from] LoadError),
    #[error("No previous proximity search to expand")]
    NothingToExpand,
}

pub struct SearchApp {
    fetcher: Fetcher,
    sources: DataSources,
    directory: Option<Directory>,
    current: Option<SearchOutcome>,
    last_proximity: Option<ProximityFilter>,
    map: MapViewController,
}

impl SearchApp {
    pub fn new(fetcher: Fetcher, sources: DataSources, capabilities: Capabilities) -> Self {
        Self {
            fetcher,
            sources,
            directory: None,
            current: None,
            last_proximity: None,
            map: MapViewController::new(capabilities, DEFAULT_MAP_SIZE),
        }
    }

    /// An app over an already resolved directory
    pub fn with_directory(directory: Directory) -> Self {
        let mut app = Self::new(Fetcher::default(), DataSources::default(), Capabilities::default());
        app.directory = Some(directory);
        app
    }

    /// Load (or reload) all data. A failed reload keeps the previous data.
    pub async fn load(&mut self) -> Result<OutboundMessage, AppError> {
        match load_directory(&self.fetcher, &self.sources).await {
            Ok(directory) => {
                info!(
                    "Directory ready: {} organizations ({})",
                    directory.len(),
                    directory.provenance()
                );
                self.directory = Some(directory);
                self.current = None;
                self.last_proximity = None;
                Ok(self.ready_message().unwrap_or_else(|| OutboundMessage::ready(0)))
            }
            Err(e) => {
                error!("Error loading data: {}", error_chain(&e));
                Err(AppError::Load(e))
            }
        }
    }

    /// Retry after a failed load, or refresh from the sources
    pub async fn reload(&mut self) -> Result<OutboundMessage, AppError> {
        self.load().await
    }

    pub fn is_loaded(&self) -> bool {
        self.directory.is_some()
    }

    pub fn directory(&self) -> Result<&Directory, AppError> {
        self.directory.as_ref().ok_or(AppError::NotLoaded)
    }

    fn ensure_loaded(&self) -> Result<(), AppError> {
        self.directory().map(|_| ())
    }

    pub fn ready_message(&self) -> Option<OutboundMessage> {
        self.directory.as_ref().map(|d| OutboundMessage::ready(d.len()))
    }

    pub fn current(&self) -> Option<&SearchOutcome> {
        self.current.as_ref()
    }

    pub fn map(&self) -> &MapViewController {
        &self.map
    }

    /// Zip/state/type search. Rejected before touching data if invalid.
    pub fn search_with_filters(&mut self, request: &FilterRequest) -> Result<SearchOutcome, AppError> {
        let directory = self.directory()?;
        let filter = request.validate()?;

        let outcome = SearchOutcome {
            context: SearchContext::from(&filter),
            results: directory.search(&filter),
        };
        self.publish(outcome.clone());
        Ok(outcome)
    }

    /// Proximity search around the user's current position
    pub async fn search_nearby<G: Geolocator>(
        &mut self,
        locator: &G,
        radius_miles: f64,
        service_type: &str,
    ) -> Result<SearchOutcome, AppError> {
        self.ensure_loaded()?;
        let filter = ProximityFilter::new(radius_miles, service_type)?;
        self.run_nearby(locator, filter).await
    }

    /// Repeat the last proximity search with a doubled (capped) radius
    pub async fn expand_nearby<G: Geolocator>(&mut self, locator: &G) -> Result<SearchOutcome, AppError> {
        self.ensure_loaded()?;
        let filter = self
            .last_proximity
            .as_ref()
            .map(ProximityFilter::expanded)
            .ok_or(AppError::NothingToExpand)?;
        self.run_nearby(locator, filter).await
    }

    async fn run_nearby<G: Geolocator>(
        &mut self,
        locator: &G,
        filter: ProximityFilter,
    ) -> Result<SearchOutcome, AppError> {
        let origin = locate(locator, GEOLOCATION_TIMEOUT).await?;
        let outcome = SearchOutcome {
            context: SearchContext::from(&filter),
            results: self.directory()?.search_nearby(origin, &filter),
        };
        self.last_proximity = Some(filter);
        self.publish(outcome.clone());
        Ok(outcome)
    }

    /// Answer a message from the embedding host
    pub fn handle_inbound(&mut self, message: InboundMessage) -> OutboundMessage {
        match message {
            InboundMessage::SearchByZip { zip_code } => {
                let request = FilterRequest {
                    zip: zip_code.clone(),
                    ..Default::default()
                };
                match self.search_with_filters(&request) {
                    Ok(outcome) => OutboundMessage::SearchResults {
                        zip_code,
                        count: outcome.results.len(),
                        summary: outcome.summary(),
                        results: outcome.results,
                    },
                    Err(e) => OutboundMessage::SearchError {
                        zip_code,
                        message: e.to_string(),
                    },
                }
            }
        }
    }

    pub fn set_show_heat_map(&mut self, on: bool) -> RenderPlan {
        self.map.set_show_heat_map(on);
        self.map.plan()
    }

    pub fn on_viewport_settled(&mut self, viewport: Viewport) -> RenderPlan {
        self.map.on_viewport_settled(viewport)
    }

    fn publish(&mut self, outcome: SearchOutcome) {
        info!("{}", outcome.summary());
        self.map.show_results(outcome.results.clone());
        self.current = Some(outcome);
    }
}

/// `outer: cause: root cause`
fn error_chain(e: &LoadError) -> String {
    let mut message = e.to_string();
    let mut source = StdError::source(e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
