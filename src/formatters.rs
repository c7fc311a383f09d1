use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::constants::CSV_COLUMNS;
use crate::models::{Reading, Site};
use crate::service::CollectionRun;

/// Formats the site catalog into a human-readable listing
pub fn format_sites(sites: &[Site]) -> String {
    if sites.is_empty() {
        return "No monitoring sites found.".to_string();
    }

    let mut output = format!("Total site records: {}\n", sites.len());
    for site in sites {
        let coords = match (site.longitude, site.latitude) {
            (Some(lon), Some(lat)) => format!("[{lon:.4}, {lat:.4}]"),
            _ => "unknown".to_string(),
        };
        let _ = writeln!(
            output,
            "- {} ({})  id={}  coords={}",
            site.name.as_deref().unwrap_or("unnamed"),
            site.site_type.as_deref().unwrap_or("unknown type"),
            site.id,
            coords
        );
    }
    output
}

/// Formats the end-of-run summary, including every failed site
pub fn format_summary(run: &CollectionRun) -> String {
    let mut output = format!(
        "Sites considered: {}\nSites collected: {}\nSites failed: {}\nReading rows: {}\n",
        run.sites_total(),
        run.collected,
        run.failures.len(),
        run.readings.len()
    );
    if !run.failures.is_empty() {
        output.push_str("\nFailed sites:\n");
        for failure in &run.failures {
            let _ = writeln!(output, "- {} :: {}", failure.site_id, failure.reason);
        }
    }
    output
}

/// First `limit` rows, one line each
pub fn format_preview(readings: &[Reading], limit: usize) -> String {
    if readings.is_empty() || limit == 0 {
        return String::new();
    }
    let mut output = String::from("Preview:\n");
    for reading in readings.iter().take(limit) {
        let _ = writeln!(
            output,
            "  {} {} [{}] {} {} {}",
            reading.site_id,
            reading.parameter.as_deref().unwrap_or("?"),
            reading.series.as_deref().unwrap_or("?"),
            timestamp(reading.since),
            reading
                .average_value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
            reading.unit.as_deref().unwrap_or("")
        );
    }
    output
}

/// Renders readings as CSV with a header row. Absent values are empty cells.
pub fn readings_to_csv(readings: &[Reading]) -> String {
    let mut output = CSV_COLUMNS.join(",");
    output.push('\n');
    for reading in readings {
        let cells = [
            reading.site_id.clone(),
            text(&reading.parameter),
            text(&reading.unit),
            text(&reading.series),
            timestamp(reading.since),
            timestamp(reading.until),
            reading.average_value.map(|v| v.to_string()).unwrap_or_default(),
            text(&reading.health_advice),
            text(&reading.health_advice_color),
            text(&reading.health_code),
        ];
        let row: Vec<String> = cells.iter().map(|cell| escape(cell)).collect();
        output.push_str(&row.join(","));
        output.push('\n');
    }
    output
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
