//! Where the directory data comes from

use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_CSV_URL: &str =
    "https://raw.githubusercontent.com/jwalith/Test_github_pages/main/01_master_all_states.csv";
pub const DEFAULT_ZIP_COORDINATES_URL: &str =
    "https://raw.githubusercontent.com/jwalith/Test_github_pages/main/zip_coordinates.json";
pub const DEFAULT_CITY_COORDINATES_URL: &str =
    "https://raw.githubusercontent.com/jwalith/Test_github_pages/main/city_coordinates.json";

/// A data asset: fetched over HTTP or read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(String),
    Local(PathBuf),
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Location::Remote(s.to_string())
        } else {
            Location::Local(PathBuf::from(s.strip_prefix("file://").unwrap_or(s)))
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Remote(url) => write!(f, "{}", url),
            Location::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The three assets a directory load reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSources {
    pub csv: Location,
    pub zip_coordinates: Location,
    /// Optional; a failed read only disables city fallback
    pub city_coordinates: Location,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            csv: Location::from(DEFAULT_CSV_URL),
            zip_coordinates: Location::from(DEFAULT_ZIP_COORDINATES_URL),
            city_coordinates: Location::from(DEFAULT_CITY_COORDINATES_URL),
        }
    }
}
