// Persisted JSON form and CSV export for work entries

use crate::entry::{DATE_FORMAT, WorkEntry, parse_date, parse_decimal};
use eyre::{Context, Result, eyre};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Header row of the CSV export
pub const CSV_HEADER: [&str; 7] = ["Date", "Client", "Location", "Description", "Hours", "Amount", "Materials"];

/// Serialize entries to the persisted blob (a JSON array of objects)
pub fn to_persisted(entries: &[WorkEntry]) -> Result<String> {
    serde_json::to_string(entries).context("Failed to serialize work entries")
}

/// Decode the persisted blob, treating any malformed blob as empty
pub fn from_persisted(blob: &str) -> Vec<WorkEntry> {
    match decode_persisted(blob) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Malformed persisted data, starting empty");
            Vec::new()
        }
    }
}

/// Decode the persisted blob.
///
/// Fails if the blob is not a JSON array of objects. Individual records
/// missing `id`, `clientName` or a readable `date` are skipped, as are
/// repeated ids after their first occurrence.
pub fn decode_persisted(blob: &str) -> Result<Vec<WorkEntry>> {
    let value: Value = serde_json::from_str(blob).context("Persisted data is not valid JSON")?;

    let Value::Array(items) = value else {
        return Err(eyre!("Persisted data is not a JSON array"));
    };

    let mut entries = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            return Err(eyre!("Record {} is not a JSON object", index));
        };

        let entry = match decode_record(fields) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(record = index, error = %e, "Skipping unreadable record");
                continue;
            }
        };

        if !seen.insert(entry.id.clone()) {
            warn!(record = index, id = %entry.id, "Skipping record with duplicate id");
            continue;
        }

        entries.push(entry);
    }

    debug!(count = entries.len(), "Decoded persisted entries");
    Ok(entries)
}

fn decode_record(fields: &Map<String, Value>) -> Result<WorkEntry> {
    let id = required_text(fields, "id")?;
    if id.trim().is_empty() {
        return Err(eyre!("Field 'id' is empty"));
    }

    let client_name = required_text(fields, "clientName")?;
    let raw_date = required_text(fields, "date")?;
    let date = parse_date(&raw_date).ok_or_else(|| eyre!("Field 'date' is not a date: {}", raw_date))?;

    Ok(WorkEntry {
        id,
        client_name,
        date,
        location: optional_text(fields, "location"),
        description: optional_text(fields, "description"),
        hours: optional_decimal(fields, "hours"),
        amount: optional_decimal(fields, "amount"),
        materials: optional_text(fields, "materials"),
    })
}

fn required_text(fields: &Map<String, Value>, name: &str) -> Result<String> {
    match fields.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(eyre!("Field '{}' is not a string: {}", name, other)),
        None => Err(eyre!("Missing field '{}'", name)),
    }
}

/// Absent, null or non-string values default to ""
fn optional_text(fields: &Map<String, Value>, name: &str) -> String {
    match fields.get(name) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Numbers and numeric strings are accepted, anything else defaults to 0.0
fn optional_decimal(fields: &Map<String, Value>, name: &str) -> f64 {
    match fields.get(name) {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0),
        Some(Value::String(s)) => parse_decimal(s),
        _ => 0.0,
    }
}

/// Render entries as CSV text, in the given order
///
/// A field is quoted when it contains a comma, a double quote, `\n` or `\r`;
/// a bare carriage return counts as a line break.
pub fn to_csv(entries: &[WorkEntry]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(CSV_HEADER)?;

    for entry in entries {
        wtr.write_record([
            entry.date.format(DATE_FORMAT).to_string(),
            entry.client_name.clone(),
            entry.location.clone(),
            entry.description.clone(),
            entry.hours.to_string(),
            entry.amount.to_string(),
            entry.materials.clone(),
        ])?;
    }

    let bytes = wtr.into_inner().map_err(|e| eyre!("CSV flush error: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn sample() -> Vec<WorkEntry> {
        vec![
            WorkEntry {
                id: "1".to_string(),
                client_name: "Bob".to_string(),
                date: date("2024-01-01"),
                location: "12 Elm St".to_string(),
                description: "Exterior trim".to_string(),
                hours: 4.0,
                amount: 500.0,
                materials: "Gloss white".to_string(),
            },
            WorkEntry {
                id: "2".to_string(),
                client_name: "Smith, \"Painter\" Co.".to_string(),
                date: date("2024-02-29"),
                location: String::new(),
                description: "Line one\nline two".to_string(),
                hours: 2.5,
                amount: 199.99,
                materials: String::new(),
            },
        ]
    }

    #[test]
    fn test_persisted_round_trip() {
        let entries = sample();
        let blob = to_persisted(&entries).unwrap();
        assert_eq!(from_persisted(&blob), entries);
    }

    #[test]
    fn test_persisted_field_names() {
        let blob = to_persisted(&sample()[..1]).unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        let object = value[0].as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["amount", "clientName", "date", "description", "hours", "id", "location", "materials"]
        );
        assert_eq!(object["date"], "2024-01-01");
        assert_eq!(object["hours"], 4.0);
    }

    #[test]
    fn test_malformed_blob_is_empty() {
        assert!(from_persisted("not json").is_empty());
        assert!(from_persisted("{}").is_empty());
        assert!(from_persisted("").is_empty());
        assert!(from_persisted("[1, 2]").is_empty());
        assert!(from_persisted("[{\"id\":\"1\",\"clientName\":\"A\",\"date\":\"2024-01-01\"}, \"x\"]").is_empty());

        assert!(decode_persisted("{}").is_err());
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let entries = from_persisted(r#"[{"id":"7","clientName":"Ann","date":"2024-05-06"}]"#);
        assert_eq!(entries, vec![WorkEntry::new("7", "Ann", date("2024-05-06"))]);
    }

    #[test]
    fn test_lenient_numbers_and_datetimes() {
        let entries = from_persisted(
            r#"[{"id":"7","clientName":"Ann","date":"2024-05-06T00:00:00.000",
                 "hours":"3.5","amount":null,"location":42}]"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, date("2024-05-06"));
        assert_eq!(entries[0].hours, 3.5);
        assert_eq!(entries[0].amount, 0.0);
        assert_eq!(entries[0].location, "");
    }

    #[test]
    fn test_records_missing_required_fields_are_skipped() {
        let entries = from_persisted(
            r#"[
                {"clientName":"No id","date":"2024-01-01"},
                {"id":"","clientName":"Empty id","date":"2024-01-01"},
                {"id":"2","date":"2024-01-01"},
                {"id":"3","clientName":"Bad date","date":"soon"},
                {"id":"4","clientName":"Kept","date":"2024-01-01"}
            ]"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "4");
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let entries = from_persisted(
            r#"[
                {"id":"1","clientName":"First","date":"2024-01-01"},
                {"id":"1","clientName":"Second","date":"2024-01-02"}
            ]"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].client_name, "First");
    }

    #[test]
    fn test_csv_header_and_rows() {
        let csv = to_csv(&sample()[..1]).unwrap();
        assert_eq!(
            csv,
            "Date,Client,Location,Description,Hours,Amount,Materials\n\
             2024-01-01,Bob,12 Elm St,Exterior trim,4,500,Gloss white\n"
        );
    }

    #[test]
    fn test_csv_escaping() {
        let csv = to_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.splitn(3, '\n').collect();

        assert_eq!(
            lines[2],
            "2024-02-29,\"Smith, \"\"Painter\"\" Co.\",,\"Line one\nline two\",2.5,199.99,\n"
        );
    }

    #[test]
    fn test_csv_quotes_carriage_return_only_when_present() {
        let mut entry = WorkEntry::new("1", "a\rb", date("2024-01-01"));
        entry.location = "plain text".to_string();
        entry.materials = "it's fine".to_string();

        let csv = to_csv(&[entry]).unwrap();
        assert_eq!(csv.lines().nth(1).unwrap(), "2024-01-01,\"a\rb\",plain text,,0,0,it's fine");
    }

    #[test]
    fn test_csv_empty_list_is_header_only() {
        assert_eq!(to_csv(&[]).unwrap(), "Date,Client,Location,Description,Hours,Amount,Materials\n");
    }

    #[test]
    fn test_csv_keeps_given_order() {
        let mut entries = sample();
        entries.reverse();
        let csv = to_csv(&entries).unwrap();
        let first_row = csv.lines().nth(1).unwrap();
        assert!(first_row.starts_with("2024-02-29,"));
    }
}
