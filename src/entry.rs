// Work entry model and raw form input

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use eyre::{Result, eyre};
use serde::Serialize;
use tracing::debug;

/// Calendar date format used for input, persistence and export
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One recorded unit of work performed for a client
///
/// Serialize-only: persisted blobs are read by `codec::decode_persisted`,
/// which applies the per-field defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEntry {
    pub id: String,
    pub client_name: String,
    pub date: NaiveDate,
    pub location: String,
    pub description: String,
    pub hours: f64,
    pub amount: f64,
    pub materials: String,
}

impl WorkEntry {
    /// Create an entry with only the required fields set
    pub fn new(id: impl Into<String>, client_name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            client_name: client_name.into(),
            date,
            location: String::new(),
            description: String::new(),
            hours: 0.0,
            amount: 0.0,
            materials: String::new(),
        }
    }

    /// Whether any searchable text field contains `needle`.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.client_name, &self.location, &self.description, &self.materials]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Parse user-supplied decimal text, falling back to 0.0.
///
/// Unparsable, negative and non-finite input all become 0.0.
pub fn parse_decimal(input: &str) -> f64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        Ok(value) => {
            debug!(input = trimmed, value, "Out of range decimal input, using 0.0");
            0.0
        }
        Err(e) => {
            debug!(input = trimmed, error = %e, "Invalid decimal input, using 0.0");
            0.0
        }
    }
}

/// Parse a calendar date.
///
/// Accepts `yyyy-MM-dd` as well as ISO-8601 date-times, keeping only the date part.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.date());
    }
    DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive())
}

/// Raw field text as collected from the user, before parsing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryForm {
    pub client_name: String,
    pub date: String,
    pub location: String,
    pub description: String,
    pub hours: String,
    pub amount: String,
    pub materials: String,
}

impl EntryForm {
    /// Prefill a form from an existing entry (for editing)
    pub fn from_entry(entry: &WorkEntry) -> Self {
        Self {
            client_name: entry.client_name.clone(),
            date: entry.date.format(DATE_FORMAT).to_string(),
            location: entry.location.clone(),
            description: entry.description.clone(),
            hours: entry.hours.to_string(),
            amount: entry.amount.to_string(),
            materials: entry.materials.clone(),
        }
    }

    /// Check the required fields, returning the parsed date
    pub fn validate(&self) -> Result<NaiveDate> {
        if self.client_name.trim().is_empty() {
            return Err(eyre!("Client name is required"));
        }

        parse_date(&self.date).ok_or_else(|| eyre!("Invalid date: '{}' (expected yyyy-MM-dd)", self.date.trim()))
    }

    /// Build a new entry with the given id
    pub fn into_entry(self, id: impl Into<String>) -> Result<WorkEntry> {
        let date = self.validate()?;

        Ok(WorkEntry {
            id: id.into(),
            client_name: self.client_name.trim().to_string(),
            date,
            location: self.location.trim().to_string(),
            description: self.description.trim().to_string(),
            hours: parse_decimal(&self.hours),
            amount: parse_decimal(&self.amount),
            materials: self.materials.trim().to_string(),
        })
    }

    /// Replace every field of `entry` except its id
    pub fn apply_to(self, entry: &WorkEntry) -> Result<WorkEntry> {
        self.into_entry(entry.id.clone())
    }
}
