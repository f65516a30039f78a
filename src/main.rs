//! Command-line front end for the service directory
//!
//! Usage:
//!   service_finder [--csv SRC] [--zip-coords SRC] [--city-coords SRC] <COMMAND>
//!
//! Sources may be http(s) URLs or local paths and default to the published
//! assets. Each can also be set through SERVICE_FINDER_CSV,
//! SERVICE_FINDER_ZIP_COORDS and SERVICE_FINDER_CITY_COORDS.
//!
//! Commands:
//!   facets                               States and service types in the data
//!   search [--zip Z] [--state S] [--type T]
//!   nearby --lat LAT --lon LON [--radius MILES] [--type T] [--expand]
//!   map    [search filters] [--no-heat] [--zoom Z ...]
//!   embed                                Host message protocol on stdin/stdout
//!
//! Results go to stdout (JSON or CSV); logs go to stderr.

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use csv::WriterBuilder;
use serde_json::json;
use service_finder::{
    app::{SearchApp, DEFAULT_MAP_SIZE},
    config::{
        DataSources, Location, DEFAULT_CITY_COORDINATES_URL, DEFAULT_CSV_URL,
        DEFAULT_ZIP_COORDINATES_URL,
    },
    debounce::{Debouncer, VIEWPORT_DEBOUNCE},
    geolocation::FixedLocator,
    loader::Fetcher,
    map_view::{Capabilities, Viewport},
    models::{Coordinates, ResultRow},
    protocol::InboundMessage,
    search::{FilterRequest, SearchOutcome},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "service_finder")]
#[command(about = "Search a directory of service organizations by zip, state, type or distance")]
struct Cli {
    /// Organization CSV (URL or path)
    #[arg(long, env = "SERVICE_FINDER_CSV", default_value = DEFAULT_CSV_URL)]
    csv: String,

    /// Zip coordinate table JSON (URL or path)
    #[arg(long, env = "SERVICE_FINDER_ZIP_COORDS", default_value = DEFAULT_ZIP_COORDINATES_URL)]
    zip_coords: String,

    /// City coordinate table JSON (URL or path); optional at load time
    #[arg(long, env = "SERVICE_FINDER_CITY_COORDS", default_value = DEFAULT_CITY_COORDINATES_URL)]
    city_coords: String,

    /// Output format for result sets
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Zip code, 12345 or 12345-6789
    #[arg(long, default_value = "")]
    zip: String,

    /// Two-letter state code
    #[arg(long, default_value = "")]
    state: String,

    /// Service type
    #[arg(long = "type", default_value = "")]
    service_type: String,
}

impl From<FilterArgs> for FilterRequest {
    fn from(a: FilterArgs) -> Self {
        FilterRequest {
            zip: a.zip,
            state: a.state,
            service_type: a.service_type,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the states and service types present in the data
    Facets,
    /// Search by zip code, state and/or service type
    Search {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Search within a radius of a position
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Radius in miles
        #[arg(long, default_value = "10")]
        radius: f64,
        #[arg(long = "type", default_value = "")]
        service_type: String,
        /// Run once more with a doubled radius (capped at 50 miles)
        #[arg(long)]
        expand: bool,
    },
    /// Search, then print the map render plan
    Map {
        #[command(flatten)]
        filters: FilterArgs,
        /// Markers only, no heat layer
        #[arg(long)]
        no_heat: bool,
        /// Zoom changes to apply after fitting; only the last one is rendered
        #[arg(long = "zoom")]
        zooms: Vec<f64>,
    },
    /// Speak the host message protocol as JSON lines on stdin/stdout
    Embed,
}

fn print_outcome(outcome: &SearchOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let body = json!({
                "summary": outcome.summary(),
                "context": outcome.context,
                "results": outcome.results,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Csv => {
            let mut writer = WriterBuilder::new().from_writer(std::io::stdout());
            for result in &outcome.results {
                writer.serialize(ResultRow::from(result))?;
            }
            writer.flush()?;
            info!("{}", outcome.summary());
        }
    }
    Ok(())
}

async fn embed(app: &mut SearchApp) -> Result<()> {
    if let Some(ready) = app.ready_message() {
        println!("{}", ready.to_json()?);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match InboundMessage::parse(&line) {
            Ok(message) => println!("{}", app.handle_inbound(message).to_json()?),
            Err(e) => warn!("Ignoring host message: {}", e),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let cli = Cli::parse();

    let sources = DataSources {
        csv: Location::from(cli.csv.as_str()),
        zip_coordinates: Location::from(cli.zip_coords.as_str()),
        city_coordinates: Location::from(cli.city_coords.as_str()),
    };

    let mut app = SearchApp::new(Fetcher::default(), sources, Capabilities::default());
    app.load().await?;

    match cli.command {
        Command::Facets => {
            let directory = app.directory()?;
            let body = json!({
                "dataCount": directory.len(),
                "coordinates": directory.provenance(),
                "states": directory.states(),
                "serviceTypes": directory.service_types(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Search { filters } => {
            let outcome = app.search_with_filters(&filters.into())?;
            print_outcome(&outcome, cli.format)?;
        }
        Command::Nearby {
            lat,
            lon,
            radius,
            service_type,
            expand,
        } => {
            let here = FixedLocator(Coordinates::new(lat, lon));
            let mut outcome = app.search_nearby(&here, radius, &service_type).await?;
            if expand {
                info!("{}", outcome.summary());
                outcome = app.expand_nearby(&here).await?;
            }
            print_outcome(&outcome, cli.format)?;
        }
        Command::Map {
            filters,
            no_heat,
            zooms,
        } => {
            let outcome = app.search_with_filters(&filters.into())?;
            let mut plan = app.set_show_heat_map(!no_heat);

            if !zooms.is_empty() {
                let center = app.map().viewport().center;
                let (mut debouncer, mut settled) = Debouncer::new(VIEWPORT_DEBOUNCE);
                for zoom in zooms {
                    debouncer.push(Viewport::around(center, zoom, DEFAULT_MAP_SIZE));
                }
                if let Some(viewport) = settled.recv().await {
                    plan = app.on_viewport_settled(viewport);
                }
            }

            let body = json!({
                "summary": outcome.summary(),
                "fitBounds": app.map().fit_bounds(),
                "plan": plan,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Embed => embed(&mut app).await?,
    }

    Ok(())
}
