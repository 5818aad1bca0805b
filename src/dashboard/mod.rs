//! Visit history grouped by destination

pub mod render;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec;
use crate::models::{DestinationKey, VisitRecord};
use crate::storage::{StorageResult, VisitLogs, VisitStore};

pub use render::{render_html, render_text};

/// Shown for any geo field the lookup did not provide
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    Empty,
    Groups(Vec<DestinationGroup>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationGroup {
    pub key: DestinationKey,
    /// Decoded key, for display
    pub destination: String,
    pub visits: Vec<VisitRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitRow {
    pub ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub visited_at: String,
}

impl VisitRow {
    fn from_record(record: &VisitRecord) -> Self {
        let or_unknown = |field: &Option<String>| {
            field
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };

        Self {
            ip: or_unknown(&record.ip),
            city: or_unknown(&record.city),
            region: or_unknown(&record.region),
            country: or_unknown(&record.country),
            visited_at: format_timestamp(&record.timestamp),
        }
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

impl DashboardView {
    /// Group every log by key. Keys keep the store's sorted order, visits their stored order.
    pub fn from_logs(logs: VisitLogs) -> Self {
        if logs.is_empty() {
            return DashboardView::Empty;
        }

        let groups = logs
            .into_iter()
            .map(|(key, log)| DestinationGroup {
                destination: codec::decode(key.as_str()),
                visits: log.iter().map(VisitRow::from_record).collect(),
                key,
            })
            .collect();

        DashboardView::Groups(groups)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DashboardView::Empty)
    }

    pub fn into_groups(self) -> Vec<DestinationGroup> {
        match self {
            DashboardView::Empty => Vec::new(),
            DashboardView::Groups(groups) => groups,
        }
    }

    pub fn total_visits(&self) -> usize {
        match self {
            DashboardView::Empty => 0,
            DashboardView::Groups(groups) => groups.iter().map(|g| g.visits.len()).sum(),
        }
    }
}

/// Read the whole store and build the view
pub async fn build(store: &dyn VisitStore) -> StorageResult<DashboardView> {
    Ok(DashboardView::from_logs(store.list_all().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoInfo;
    use crate::storage::{MemoryBackend, NamespacedVisitStore};
    use std::sync::Arc;

    fn store() -> NamespacedVisitStore {
        NamespacedVisitStore::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_view() {
        let view = build(&store()).await.unwrap();
        assert_eq!(view, DashboardView::Empty);
        assert!(view.is_empty());
        assert_eq!(view.total_visits(), 0);
    }

    #[tokio::test]
    async fn test_groups_decode_keys_and_fill_placeholders() {
        let store = store();
        store
            .append(
                &DestinationKey::new("https%3A%2F%2Fb.example"),
                GeoInfo {
                    ip: Some("1.2.3.4".to_string()),
                    city: Some("Testville".to_string()),
                    region: None,
                    country: Some("Testland".to_string()),
                },
            )
            .await
            .unwrap();
        store
            .append(&DestinationKey::new("https%3A%2F%2Fa.example"), GeoInfo::default())
            .await
            .unwrap();

        let view = build(&store).await.unwrap();
        let DashboardView::Groups(groups) = view else {
            panic!("expected groups");
        };

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].destination, "https://a.example");
        assert_eq!(groups[0].visits[0].ip, UNKNOWN);
        assert_eq!(groups[0].visits[0].country, UNKNOWN);

        assert_eq!(groups[1].destination, "https://b.example");
        let row = &groups[1].visits[0];
        assert_eq!(row.ip, "1.2.3.4");
        assert_eq!(row.city, "Testville");
        assert_eq!(row.region, UNKNOWN);
        assert_eq!(row.country, "Testland");
        assert!(row.visited_at.ends_with(" UTC"));
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2025-01-02T03:04:05.678Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2025-01-02 03:04:05 UTC");
    }
}
