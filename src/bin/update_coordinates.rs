//! Coordinate table maintenance
//!
//! Geocodes zips and cities that appear in the organization CSV but not yet in
//! the coordinate tables, through the public Nominatim search API. Existing
//! entries are kept; only new keys are requested, one per second.
//!
//! Usage:
//!   update_coordinates zips   --csv <PATH> --output <PATH>
//!   update_coordinates cities --csv <PATH> --output <PATH>

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use service_finder::{
    coordinates::{CityCoordinateTable, ZipCoordinateTable},
    models::{Coordinates, OrganizationRecord, UNKNOWN},
    normalize::parse_csv,
};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "OrganizationSearch/1.0";
const REQUEST_DELAY: Duration = Duration::from_secs(1);
const RETRY_DELAY: Duration = Duration::from_secs(2);
const CITY_ATTEMPTS: u32 = 3;

#[derive(Parser, Debug)]
#[command(name = "update_coordinates")]
#[command(about = "Fetch coordinates for new zips and cities in the organization CSV")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Geocode zip codes missing from the zip table
    Zips {
        #[arg(long, default_value = "01_master_all_states.csv")]
        csv: PathBuf,
        #[arg(long, default_value = "zip_coordinates.json")]
        output: PathBuf,
    },
    /// Geocode "City, ST" keys for rows without a zip
    Cities {
        #[arg(long, default_value = "01_master_all_states.csv")]
        csv: PathBuf,
        #[arg(long, default_value = "city_coordinates.json")]
        output: PathBuf,
    },
}

/// One Nominatim search hit; coordinates arrive as strings
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Place {
    fn coordinates(&self) -> Option<Coordinates> {
        let at = Coordinates::new(self.lat.parse().ok()?, self.lon.parse().ok()?);
        at.is_finite().then_some(at)
    }
}

fn is_five_digit_zip(zip: &str) -> bool {
    zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit())
}

/// Valid zips in the CSV that the table does not cover yet
fn new_zips(records: &[OrganizationRecord], table: &ZipCoordinateTable) -> BTreeSet<String> {
    records
        .iter()
        .map(|r| r.zip.trim())
        .filter(|zip| is_five_digit_zip(zip) && table.get(zip).is_none())
        .map(str::to_string)
        .collect()
}

/// City keys for zip-less rows that the table does not cover yet
fn new_city_keys(records: &[OrganizationRecord], table: &CityCoordinateTable) -> BTreeSet<String> {
    records
        .iter()
        .filter(|r| r.zip.is_empty())
        .filter(|r| !r.city.is_empty() && r.city != UNKNOWN && !r.state.is_empty() && r.state != UNKNOWN)
        .map(OrganizationRecord::city_key)
        .filter(|key| table.get(key).is_none())
        .collect()
}

struct Geocoder {
    client: reqwest::Client,
}

impl Geocoder {
    fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }

    async fn search(&self, query: &[(&str, &str)]) -> Result<Option<Coordinates>> {
        let places: Vec<Place> = self
            .client
            .get(NOMINATIM_URL)
            .query(query)
            .query(&[("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(places.first().and_then(Place::coordinates))
    }

    async fn zip(&self, zip: &str) -> Result<Option<Coordinates>> {
        self.search(&[("postalcode", zip), ("country", "US")]).await
    }

    /// Request errors are retried; an empty answer is not
    async fn city(&self, city_key: &str) -> Option<Coordinates> {
        for attempt in 1..=CITY_ATTEMPTS {
            match self.search(&[("q", city_key), ("countrycodes", "us")]).await {
                Ok(found) => return found,
                Err(e) => {
                    warn!("Error fetching {} (attempt {}): {}", city_key, attempt, e);
                    if attempt < CITY_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
        None
    }
}

async fn read_records(csv: &Path) -> Result<Vec<OrganizationRecord>> {
    info!("Reading CSV from {:?}", csv);
    let text = tokio::fs::read_to_string(csv)
        .await
        .with_context(|| format!("CSV file {:?} not found", csv))?;
    Ok(parse_csv(&text))
}

/// Existing table, or an empty one when the file is missing or unreadable
async fn read_table<T: Default + serde::de::DeserializeOwned>(path: &Path) -> T {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Error loading {:?}: {}; starting fresh", path, e);
            T::default()
        }),
        Err(_) => {
            info!("{:?} not found; starting fresh", path);
            T::default()
        }
    }
}

async fn write_table<T: serde::Serialize>(path: &Path, table: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(table)?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("failed to write {:?}", path))
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

async fn update_zips(geocoder: &Geocoder, csv: &Path, output: &Path) -> Result<()> {
    let records = read_records(csv).await?;
    let mut table: ZipCoordinateTable = read_table(output).await;
    info!("Existing coordinates: {} zip codes", table.len());

    let pending = new_zips(&records, &table);
    if pending.is_empty() {
        info!("No new zip codes found. No update needed.");
        return Ok(());
    }
    info!("Found {} new zip codes to process", pending.len());

    let mut found: HashMap<String, Coordinates> = HashMap::new();
    let mut failed = Vec::new();
    for (i, zip) in pending.iter().enumerate() {
        match geocoder.zip(zip).await {
            Ok(Some(at)) => {
                info!("[{}/{}] {} ({:.4}, {:.4})", i + 1, pending.len(), zip, at.latitude, at.longitude);
                found.insert(zip.clone(), at);
            }
            Ok(None) => {
                warn!("[{}/{}] {}: no coordinates found", i + 1, pending.len(), zip);
                failed.push(zip.clone());
            }
            Err(e) => {
                warn!("[{}/{}] {}: {}", i + 1, pending.len(), zip, e);
                failed.push(zip.clone());
            }
        }
        tokio::time::sleep(REQUEST_DELAY).await;
    }

    let added = found.len();
    table.coordinates.extend(found);
    table.metadata = Some(json!({
        "total_zips": table.len(),
        "failed_zips": failed.len(),
        "last_updated": timestamp(),
        "source": "Incremental Update",
    }));
    table.failed_zips = failed;
    write_table(output, &table).await?;

    info!(
        "Update complete: {}/{} new, {} failed, {} total",
        added,
        pending.len(),
        table.failed_zips.len(),
        table.len()
    );
    Ok(())
}

async fn update_cities(geocoder: &Geocoder, csv: &Path, output: &Path) -> Result<()> {
    let records = read_records(csv).await?;
    let mut table: CityCoordinateTable = read_table(output).await;
    info!("Existing coordinates: {} cities", table.len());

    let pending = new_city_keys(&records, &table);
    if pending.is_empty() {
        info!("No new cities found. No update needed.");
        return Ok(());
    }
    info!("Found {} new cities to process", pending.len());

    let mut failed = Vec::new();
    let mut added = 0;
    for (i, key) in pending.iter().enumerate() {
        match geocoder.city(key).await {
            Some(at) => {
                info!("[{}/{}] {} ({:.4}, {:.4})", i + 1, pending.len(), key, at.latitude, at.longitude);
                table.city_coordinates.insert(key.clone(), at);
                added += 1;
            }
            None => {
                warn!("[{}/{}] {}: no coordinates found", i + 1, pending.len(), key);
                failed.push(key.clone());
            }
        }
        tokio::time::sleep(REQUEST_DELAY).await;
    }

    table.metadata = Some(json!({
        "total_cities": table.len(),
        "successful": added,
        "failed": failed.len(),
        "generated_at": timestamp(),
        "description": "Coordinates for cities with missing zip codes",
    }));
    table.failed_cities = failed;
    write_table(output, &table).await?;

    info!(
        "Update complete: {}/{} new, {} failed, {} total",
        added,
        pending.len(),
        table.failed_cities.len(),
        table.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();
    let geocoder = Geocoder::new()?;

    match args.command {
        Command::Zips { csv, output } => update_zips(&geocoder, &csv, &output).await,
        Command::Cities { csv, output } => update_cities(&geocoder, &csv, &output).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "name,type,zip,city,state\n\
                       A,Food,10001,New York,NY\n\
                       B,Food,10001,New York,NY\n\
                       C,Food,02139,Cambridge,MA\n\
                       D,Food,12345-6789,Somewhere,NY\n\
                       E,Food,,Albany,NY\n\
                       F,Food,,Albany,NY\n\
                       G,Food,,Troy,NY\n\
                       H,Food,,,NY\n";

    #[test]
    fn test_new_zips_skips_known_and_invalid() {
        let records = parse_csv(CSV);
        let table: ZipCoordinateTable =
            [("10001".to_string(), Coordinates::new(40.75, -73.99))].into_iter().collect();

        let pending: Vec<String> = new_zips(&records, &table).into_iter().collect();
        assert_eq!(pending, vec!["02139"]);
    }

    #[test]
    fn test_new_city_keys_only_for_zipless_rows() {
        let records = parse_csv(CSV);
        let table: CityCoordinateTable =
            [("Troy, NY".to_string(), Coordinates::new(42.73, -73.69))].into_iter().collect();

        let pending: Vec<String> = new_city_keys(&records, &table).into_iter().collect();
        assert_eq!(pending, vec!["Albany, NY"]);
    }

    #[test]
    fn test_place_coordinates_parse() {
        let places: Vec<Place> =
            serde_json::from_str(r#"[{"lat": "40.7506", "lon": "-73.9972", "display_name": "x"}]"#).unwrap();
        assert_eq!(places[0].coordinates(), Some(Coordinates::new(40.7506, -73.9972)));

        let bad = Place {
            lat: "north".to_string(),
            lon: "0".to_string(),
        };
        assert_eq!(bad.coordinates(), None);
    }
}
