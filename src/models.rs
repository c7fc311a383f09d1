use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

// ============================================================================
// Sites API Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SitesResponse {
    #[serde(rename = "totalRecords", default)]
    pub total_records: Option<u64>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub records: Vec<SiteRecord>,
}

#[derive(Debug, Deserialize)]
pub struct SiteRecord {
    #[serde(rename = "siteID")]
    pub site_id: Option<String>,
    #[serde(rename = "siteName")]
    pub site_name: Option<String>,
    #[serde(rename = "siteType")]
    pub site_type: Option<String>,
    pub geometry: Option<Geometry>,
}

/// GeoJSON point, coordinates ordered `[longitude, latitude]`
#[derive(Debug, Deserialize)]
pub struct Geometry {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub coordinates: Vec<f64>,
}

// ============================================================================
// Site Parameters API Models
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParametersResponse {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub parameters: Vec<ParameterBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParameterBlock {
    pub name: Option<String>,
    pub unit: Option<String>,
    #[serde(rename = "timeSeriesReadings", default, deserialize_with = "nullable_vec")]
    pub time_series: Vec<TimeSeriesBlock>,
    #[serde(flatten)]
    pub advice: HealthAdvice,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSeriesBlock {
    /// Granularity label such as `1HR_AV` or `24HR_AV`
    #[serde(rename = "timeSeriesName")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub readings: Vec<ReadingEntry>,
    #[serde(flatten)]
    pub advice: HealthAdvice,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadingEntry {
    pub since: Option<String>,
    pub until: Option<String>,
    #[serde(rename = "averageValue")]
    pub average_value: Option<f64>,
    #[serde(flatten)]
    pub advice: HealthAdvice,
}

/// Health-advice triple. Any level of the parameters payload may carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HealthAdvice {
    #[serde(rename = "healthAdvice")]
    pub text: Option<String>,
    #[serde(rename = "healthAdviceColor")]
    pub color: Option<String>,
    #[serde(rename = "healthCode", default, deserialize_with = "text_or_number")]
    pub code: Option<String>,
}

impl HealthAdvice {
    /// Field-wise fallback: keeps each present field, fills absent ones from `outer`
    pub fn or(&self, outer: &HealthAdvice) -> HealthAdvice {
        HealthAdvice {
            text: self.text.clone().or_else(|| outer.text.clone()),
            color: self.color.clone().or_else(|| outer.color.clone()),
            code: self.code.clone().or_else(|| outer.code.clone()),
        }
    }
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Code>::deserialize(deserializer)?.map(|code| match code {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    }))
}

// ============================================================================
// Domain Models
// ============================================================================

/// A monitoring site as listed by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: String,
    pub name: Option<String>,
    pub site_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Site {
    /// Returns `None` for records without a site identifier
    pub fn from_record(record: SiteRecord) -> Option<Self> {
        let id = record.site_id.filter(|id| !id.trim().is_empty())?;
        let coordinates = record.geometry.map(|g| g.coordinates).unwrap_or_default();

        Some(Self {
            id,
            name: record.site_name,
            site_type: record.site_type,
            longitude: coordinates.first().copied(),
            latitude: coordinates.get(1).copied(),
        })
    }
}

/// Unparsed parameter blocks for one site
#[derive(Debug, Clone)]
pub struct RawSitePayload {
    pub site_id: String,
    pub parameters: Vec<ParameterBlock>,
}

/// One normalized output row
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub site_id: String,
    pub parameter: Option<String>,
    pub unit: Option<String>,
    pub series: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// `None` when the service sent no value; never coerced to zero
    pub average_value: Option<f64>,
    pub health_advice: Option<String>,
    pub health_advice_color: Option<String>,
    pub health_code: Option<String>,
}

/// Identity of a reading: (site, parameter, series, window start)
pub type ReadingKey = (String, Option<String>, Option<String>, Option<DateTime<Utc>>);

impl Reading {
    pub fn key(&self) -> ReadingKey {
        (
            self.site_id.clone(),
            self.parameter.clone(),
            self.series.clone(),
            self.since,
        )
    }
}
