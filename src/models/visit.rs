use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw value of the `url` tracking parameter. Also the storage partition key.
///
/// Never normalized: `https%3A%2F%2Fa.b` and `https%253A%252F%252Fa.b` are different keys even
/// though both decode to the same destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationKey(String);

impl DestinationKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geolocation metadata returned by a lookup provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl GeoInfo {
    pub fn is_empty(&self) -> bool {
        self.ip.is_none() && self.city.is_none() && self.region.is_none() && self.country.is_none()
    }
}

/// Fields of a visit known before it is appended; the store assigns the timestamp.
pub type VisitRecordInput = GeoInfo;

/// One recorded visit. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl VisitRecord {
    pub fn stamped(input: VisitRecordInput, timestamp: DateTime<Utc>) -> Self {
        Self {
            ip: input.ip,
            city: input.city,
            region: input.region,
            country: input.country,
            timestamp,
        }
    }
}

/// Append-only, chronologically ordered visits for one key
pub type VisitLog = Vec<VisitRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_record_wire_format() {
        let record = VisitRecord {
            ip: Some("1.2.3.4".to_string()),
            city: None,
            region: Some("TS".to_string()),
            country: Some("Testland".to_string()),
            timestamp: DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ip"], "1.2.3.4");
        assert!(json["city"].is_null());
        assert_eq!(json["country"], "Testland");
        assert_eq!(json["timestamp"], "2025-03-01T12:00:00Z");
    }

    #[test]
    fn test_visit_record_accepts_browser_written_logs() {
        // Logs written by the browser-only version omit fields the lookup did not return.
        let raw = r#"[{"ip":"1.2.3.4","timestamp":"2024-06-01T08:30:00.000Z"}]"#;
        let log: VisitLog = serde_json::from_str(raw).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].ip.as_deref(), Some("1.2.3.4"));
        assert!(log[0].city.is_none());
    }
}
