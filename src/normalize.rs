//! CSV normalization for the organization directory
//!
//! A row is one physical line. Fields may be wrapped in double quotes to carry
//! commas, and `""` inside a quoted field is a literal quote. Line breaks
//! inside quotes are not supported.

use tracing::{debug, warn};

use crate::models::{OrganizationRecord, UNKNOWN};

const NAME_COLUMNS: &[&str] = &["name", "organization", "org name"];
const TYPE_COLUMNS: &[&str] = &["housing_type", "type", "category", "org type"];
const ZIP_COLUMNS: &[&str] = &["zip", "zip code", "zipcode"];
const STATE_COLUMNS: &[&str] = &["state", "state code"];

/// Split one line into trimmed fields, honoring double-quoted sections
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                let field = std::mem::take(&mut current);
                fields.push(field.trim().to_string());
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Drop one leading and one trailing `"` if still present
fn strip_outer_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

/// Lower-cased column names from the header line
struct Header {
    columns: Vec<String>,
}

impl Header {
    fn parse(line: &str) -> Self {
        let columns = split_line(line)
            .iter()
            .map(|h| strip_outer_quotes(&h.trim().to_lowercase()).to_string())
            .collect();
        Self { columns }
    }

    fn len(&self) -> usize {
        self.columns.len()
    }

    /// First non-blank value among the synonym columns
    fn pick<'a>(&self, values: &'a [String], names: &[&str]) -> Option<&'a str> {
        names.iter().find_map(|name| {
            self.columns
                .iter()
                .rposition(|c| c == name)
                .map(|i| values[i].as_str())
                .filter(|v| !v.is_empty())
        })
    }

    fn to_record(&self, values: &[String]) -> OrganizationRecord {
        let or_unknown = |v: Option<&str>| v.unwrap_or(UNKNOWN).to_string();
        let or_empty = |v: Option<&str>| v.unwrap_or_default().to_string();

        OrganizationRecord {
            name: or_unknown(self.pick(values, NAME_COLUMNS)),
            service_type: or_unknown(self.pick(values, TYPE_COLUMNS)),
            zip: or_empty(self.pick(values, ZIP_COLUMNS)),
            city: or_unknown(self.pick(values, &["city"])),
            state: or_unknown(self.pick(values, STATE_COLUMNS)),
            phone: or_empty(self.pick(values, &["phone"])),
            email: or_empty(self.pick(values, &["email"])),
            address: or_empty(self.pick(values, &["address"])),
        }
    }
}

/// Parse directory CSV text into organization records.
///
/// Blank lines are skipped and rows with fewer fields than the header are
/// dropped. Surplus trailing fields are ignored.
pub fn parse_csv(text: &str) -> Vec<OrganizationRecord> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 2 {
        warn!("CSV file appears to be empty or invalid");
        return Vec::new();
    }

    let header = Header::parse(lines[0]);
    let mut records = Vec::with_capacity(lines.len() - 1);
    let mut dropped = 0usize;

    for (i, line) in lines.iter().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let values: Vec<String> = split_line(line)
            .iter()
            .map(|v| strip_outer_quotes(v).to_string())
            .collect();

        if values.len() < header.len() {
            debug!(
                "Dropping line {}: {} fields, header has {}",
                i + 1,
                values.len(),
                header.len()
            );
            dropped += 1;
            continue;
        }

        records.push(header.to_record(&values));
    }

    if dropped > 0 {
        warn!("Dropped {} malformed CSV rows", dropped);
    }
    debug!("Parsed {} organization records", records.len());

    records
}
