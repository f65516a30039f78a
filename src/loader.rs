//! Loading the directory: CSV first, then both coordinate tables concurrently

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{DataSources, Location};
use crate::coordinates::{CityCoordinateTable, ZipCoordinateTable};
use crate::normalize::parse_csv;
use crate::search::Directory;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("HTTP error loading {location}: status {status}")]
    Status {
        location: String,
        status: reqwest::StatusCode,
    },
    #[error("request for {location} failed")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read {location}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid coordinate table {location}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads assets from HTTP(S) URLs or local paths
#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch_text(&self, location: &Location) -> Result<String, LoadError> {
        let name = location.to_string();
        match location {
            Location::Remote(url) => {
                let response = self.client.get(url).send().await.map_err(|source| LoadError::Http {
                    location: name.clone(),
                    source,
                })?;

                if !response.status().is_success() {
                    return Err(LoadError::Status {
                        location: name,
                        status: response.status(),
                    });
                }

                response
                    .text()
                    .await
                    .map_err(|source| LoadError::Http { location: name, source })
            }
            Location::Local(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| LoadError::Io { location: name, source }),
        }
    }

    pub async fn zip_table(&self, location: &Location) -> Result<ZipCoordinateTable, LoadError> {
        let text = self.fetch_text(location).await?;
        ZipCoordinateTable::from_json(&text).map_err(|source| LoadError::Json {
            location: location.to_string(),
            source,
        })
    }

    pub async fn city_table(&self, location: &Location) -> Result<CityCoordinateTable, LoadError> {
        let text = self.fetch_text(location).await?;
        CityCoordinateTable::from_json(&text).map_err(|source| LoadError::Json {
            location: location.to_string(),
            source,
        })
    }
}

/// Load and resolve the whole directory.
///
/// The CSV and zip table are required; the city table is not.
pub async fn load_directory(fetcher: &Fetcher, sources: &DataSources) -> Result<Directory, LoadError> {
    info!("Loading organizations from {}", sources.csv);
    let csv_text = fetcher.fetch_text(&sources.csv).await?;
    let records = parse_csv(&csv_text);
    info!("Parsed {} organizations", records.len());

    let (zips, cities) = tokio::join!(
        fetcher.zip_table(&sources.zip_coordinates),
        fetcher.city_table(&sources.city_coordinates),
    );

    let zips = zips?;
    let cities = match cities {
        Ok(table) => Some(table),
        Err(e) => {
            warn!("City coordinates unavailable ({}); using zip coordinates only", e);
            None
        }
    };

    info!(
        "Coordinate tables: {} zips, {} cities",
        zips.len(),
        cities.as_ref().map_or(0, CityCoordinateTable::len)
    );

    Ok(Directory::from_records(&records, &zips, cities.as_ref()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::CoordinateSource;
    use std::path::PathBuf;

    /// Scratch directory holding a CSV, zip table and (optionally) city table
    pub(crate) fn write_fixture(name: &str, with_cities: bool) -> (PathBuf, DataSources) {
        let dir = std::env::temp_dir().join(format!("service_finder_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let csv = "name,type,zip,city,state\n\
                   Helping Hands,Shelter,10001,New York,NY\n\
                   Capital Pantry,Food,,Albany,NY\n\
                   Lost Org,Food,,Nowhere,ZZ\n";
        std::fs::write(dir.join("orgs.csv"), csv).unwrap();
        std::fs::write(
            dir.join("zips.json"),
            r#"{"coordinates": {"10001": {"latitude": 40.75, "longitude": -73.99}}}"#,
        )
        .unwrap();
        let city_path = dir.join("cities.json");
        if with_cities {
            std::fs::write(
                &city_path,
                r#"{"city_coordinates": {"Albany, NY": {"latitude": 42.65, "longitude": -73.75}}}"#,
            )
            .unwrap();
        } else {
            let _ = std::fs::remove_file(&city_path);
        }

        let sources = DataSources {
            csv: Location::Local(dir.join("orgs.csv")),
            zip_coordinates: Location::Local(dir.join("zips.json")),
            city_coordinates: Location::Local(city_path),
        };
        (dir, sources)
    }

    #[tokio::test]
    async fn test_load_with_city_table() {
        let (dir, sources) = write_fixture("with_cities", true);
        let directory = load_directory(&Fetcher::default(), &sources).await.unwrap();

        let sources_seen: Vec<CoordinateSource> = directory
            .organizations()
            .iter()
            .map(|o| o.coordinate_source)
            .collect();
        assert_eq!(
            sources_seen,
            vec![CoordinateSource::Zip, CoordinateSource::City, CoordinateSource::None]
        );
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_city_table_degrades() {
        let (dir, sources) = write_fixture("without_cities", false);
        let directory = load_directory(&Fetcher::default(), &sources).await.unwrap();

        assert_eq!(directory.len(), 3);
        let stats = directory.provenance();
        assert_eq!((stats.zip, stats.city, stats.none), (1, 0, 2));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_zip_table_is_fatal() {
        let (dir, mut sources) = write_fixture("without_zips", true);
        sources.zip_coordinates = Location::Local(dir.join("absent.json"));

        let err = load_directory(&Fetcher::default(), &sources).await.unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_malformed_zip_table_is_fatal() {
        let (dir, sources) = write_fixture("bad_zips", true);
        std::fs::write(dir.join("zips.json"), "not json").unwrap();

        let err = load_directory(&Fetcher::default(), &sources).await.unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_csv_is_fatal() {
        let (dir, mut sources) = write_fixture("without_csv", true);
        sources.csv = Location::Local(dir.join("absent.csv"));

        assert!(load_directory(&Fetcher::default(), &sources).await.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
