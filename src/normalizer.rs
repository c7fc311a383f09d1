//! Flattens parameter → series → reading payloads into [`Reading`] rows.
//!
//! Health-advice fields are taken from the reading entry. Under
//! [`AdvicePolicy::Inherit`] a field the reading omits is filled from its
//! series block, then from its parameter block; under
//! [`AdvicePolicy::ReadingOnly`] it stays absent.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::AdvicePolicy;
use crate::models::{HealthAdvice, RawSitePayload, Reading};

/// Rows for one site, in payload order
pub fn normalize(payload: &RawSitePayload, policy: AdvicePolicy) -> Vec<Reading> {
    let mut rows = Vec::new();
    for parameter in &payload.parameters {
        for series in &parameter.time_series {
            let enclosing = series.advice.or(&parameter.advice);
            for entry in &series.readings {
                let advice = match policy {
                    AdvicePolicy::Inherit => entry.advice.or(&enclosing),
                    AdvicePolicy::ReadingOnly => entry.advice.clone(),
                };
                let HealthAdvice { text, color, code } = advice;

                rows.push(Reading {
                    site_id: payload.site_id.clone(),
                    parameter: parameter.name.clone(),
                    unit: parameter.unit.clone(),
                    series: series.name.clone(),
                    since: parse_timestamp(entry.since.as_deref()),
                    until: parse_timestamp(entry.until.as_deref()),
                    average_value: entry.average_value,
                    health_advice: text,
                    health_advice_color: color,
                    health_code: code,
                });
            }
        }
    }
    rows
}

/// Rows for every payload, sorted by (site, parameter, series, since) with
/// repeated keys dropped after their first occurrence. Rows without a window
/// start have no usable key and are all kept.
pub fn normalize_all(payloads: &[RawSitePayload], policy: AdvicePolicy) -> Vec<Reading> {
    let mut rows: Vec<Reading> = payloads
        .iter()
        .flat_map(|payload| normalize(payload, policy))
        .collect();
    rows.sort_by(|a, b| a.key().cmp(&b.key()));

    let before = rows.len();
    let mut seen = HashSet::with_capacity(rows.len());
    rows.retain(|row| row.since.is_none() || seen.insert(row.key()));
    if rows.len() != before {
        tracing::warn!(dropped = before - rows.len(), "dropped readings with repeated keys");
    }
    rows
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS` taken as UTC. Anything else is absent.
fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => Some(naive.and_utc()),
        Err(_) => {
            tracing::debug!(value, "unparsable reading timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParametersResponse;
    use chrono::TimeZone;
    use serde_json::json;

    fn payload(site_id: &str, body: serde_json::Value) -> RawSitePayload {
        let response: ParametersResponse = serde_json::from_value(body).unwrap();
        RawSitePayload {
            site_id: site_id.to_string(),
            parameters: response.parameters,
        }
    }

    #[test]
    fn emits_one_row_per_reading_with_attribution() {
        let payload = payload(
            "site-1",
            json!({"parameters": [
                {"name": "PM2.5", "unit": "µg/m³", "timeSeriesReadings": [
                    {"timeSeriesName": "1HR_AV", "readings": [
                        {"since": "2024-05-01T00:00:00Z", "until": "2024-05-01T01:00:00Z", "averageValue": 4.2}
                    ]},
                    {"timeSeriesName": "24HR_AV", "readings": [
                        {"since": "2024-04-30T01:00:00Z", "until": "2024-05-01T01:00:00Z", "averageValue": 5.0}
                    ]}
                ]},
                {"name": "O3", "unit": "ppb", "timeSeriesReadings": [
                    {"timeSeriesName": "1HR_AV", "readings": []}
                ]}
            ]}),
        );

        let rows = normalize(&payload, AdvicePolicy::Inherit);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.site_id == "site-1"));
        assert!(rows.iter().all(|r| r.parameter.as_deref() == Some("PM2.5")));
        assert_eq!(rows[0].series.as_deref(), Some("1HR_AV"));
        assert_eq!(rows[1].series.as_deref(), Some("24HR_AV"));
        assert_eq!(rows[0].unit.as_deref(), Some("µg/m³"));
        assert_eq!(
            rows[0].since,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn missing_average_is_not_zero() {
        let payload = payload(
            "s",
            json!({"parameters": [{"name": "CO", "timeSeriesReadings": [
                {"timeSeriesName": "1HR_AV", "readings": [
                    {"since": "2024-05-01T00:00:00Z"},
                    {"since": "2024-05-01T01:00:00Z", "averageValue": 0},
                    {"since": "2024-05-01T02:00:00Z", "averageValue": null}
                ]}
            ]}]}),
        );

        let values: Vec<Option<f64>> = normalize(&payload, AdvicePolicy::Inherit)
            .iter()
            .map(|r| r.average_value)
            .collect();
        assert_eq!(values, vec![None, Some(0.0), None]);
    }

    #[test]
    fn advice_falls_back_to_nearest_enclosing_level() {
        let body = json!({"parameters": [{
            "name": "PM10",
            "healthAdvice": "Fair", "healthAdviceColor": "#FFFF00", "healthCode": "P",
            "timeSeriesReadings": [{
                "timeSeriesName": "1HR_AV",
                "healthAdviceColor": "#00E400",
                "readings": [
                    {"since": "2024-05-01T00:00:00Z", "healthAdvice": "Good"},
                    {"since": "2024-05-01T01:00:00Z"}
                ]
            }]
        }]});

        let inherited = normalize(&payload("s", body.clone()), AdvicePolicy::Inherit);
        assert_eq!(inherited[0].health_advice.as_deref(), Some("Good"));
        assert_eq!(inherited[0].health_advice_color.as_deref(), Some("#00E400"));
        assert_eq!(inherited[0].health_code.as_deref(), Some("P"));
        assert_eq!(inherited[1].health_advice.as_deref(), Some("Fair"));

        let strict = normalize(&payload("s", body), AdvicePolicy::ReadingOnly);
        assert_eq!(strict[0].health_advice.as_deref(), Some("Good"));
        assert_eq!(strict[0].health_advice_color, None);
        assert_eq!(strict[1].health_advice, None);
        assert_eq!(strict[1].health_code, None);
    }

    #[test]
    fn combined_rows_are_sorted_and_unique() {
        let reading = |since: &str| json!({"since": since, "averageValue": 1.0});
        let b = payload(
            "b",
            json!({"parameters": [{"name": "NO2", "timeSeriesReadings": [
                {"timeSeriesName": "1HR_AV", "readings": [
                    reading("2024-05-01T02:00:00Z"),
                    reading("2024-05-01T01:00:00Z"),
                    reading("2024-05-01T02:00:00Z")
                ]}
            ]}]}),
        );
        let a = payload(
            "a",
            json!({"parameters": [{"name": "NO2", "timeSeriesReadings": [
                {"timeSeriesName": "1HR_AV", "readings": [reading("2024-05-01T05:00:00Z")]}
            ]}]}),
        );

        let rows = normalize_all(&[b, a], AdvicePolicy::Inherit);
        let keys: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.site_id.clone(), r.since.unwrap().format("%H").to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), "05".to_string()),
                ("b".to_string(), "01".to_string()),
                ("b".to_string(), "02".to_string()),
            ]
        );
    }

    #[test]
    fn readings_without_window_start_are_never_merged() {
        let body = json!({"parameters": [{"name": "SO2", "timeSeriesReadings": [
            {"timeSeriesName": "1HR_AV", "readings": [
                {"averageValue": 1.0},
                {"averageValue": 2.0},
                {"since": "garbage", "averageValue": 3.0}
            ]}
        ]}]});

        let rows = normalize_all(&[payload("s", body)], AdvicePolicy::Inherit);
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.average_value).collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert!(rows.iter().all(|r| r.since.is_none()));
    }

    #[test]
    fn timestamps_tolerate_offsets_and_garbage() {
        assert_eq!(
            parse_timestamp(Some("2024-05-01T10:00:00+10:00")),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp(Some("2024-05-01T10:00:00")),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(Some("yesterday")), None);
        assert_eq!(parse_timestamp(None), None);
    }
}
