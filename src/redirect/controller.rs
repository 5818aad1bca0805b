//! Page-load state machine
//!
//! ```text
//! Idle -> Detecting -+-> SkipRecording                        (authoring page)
//!                    +-> Recording -> Redirecting -> Done     (notice page, then navigate)
//! ```
//!
//! `Recording` only dispatches the lookup-and-append task. Redirecting does not wait for it:
//! a slow geolocation service costs a visit record, never the visitor's navigation.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::codec;
use crate::geo::GeoLookup;
use crate::models::DestinationKey;
use crate::storage::VisitStore;

/// Name of the query parameter that selects redirect mode
pub const TRACKING_PARAM: &str = "url";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Detecting,
    Recording,
    SkipRecording,
    Redirecting,
    Done,
}

/// How the dispatched recording task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    LookupUnavailable,
    StoreFailed,
}

#[derive(Debug)]
pub struct Redirect {
    /// Raw tracking parameter value; the visit is stored under it
    pub key: DestinationKey,
    /// Where the visitor is sent
    pub destination: String,
    /// Grace period before navigation
    pub delay: Duration,
    /// Recording task. Dropping the handle detaches it.
    pub recording: JoinHandle<RecordOutcome>,
    pub trail: Vec<Phase>,
}

#[derive(Debug)]
pub enum PageLoad {
    Authoring { trail: Vec<Phase> },
    Redirect(Redirect),
}

pub struct RedirectController {
    store: Arc<dyn VisitStore>,
    geo: Arc<dyn GeoLookup>,
    delay: Duration,
}

/// Phases visited during one page load
struct Trail(Vec<Phase>);

impl Trail {
    fn new() -> Self {
        Self(vec![Phase::Idle])
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.0.last(), to = ?phase, "redirect controller transition");
        self.0.push(phase);
    }

    /// The trail without the implicit starting state
    fn finish(mut self) -> Vec<Phase> {
        self.0.remove(0);
        self.0
    }
}

impl RedirectController {
    pub fn new(store: Arc<dyn VisitStore>, geo: Arc<dyn GeoLookup>, delay: Duration) -> Self {
        Self { store, geo, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Find the tracking parameter in a raw query string.
    ///
    /// The value is returned exactly as it appears in the query, undecoded. An empty value
    /// does not count. A `+` stays a literal `+`; it is not read as a space.
    pub fn detect(raw_query: Option<&str>) -> Option<DestinationKey> {
        raw_query?
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(name, _)| *name == TRACKING_PARAM)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
            .map(DestinationKey::new)
    }

    /// Run the state machine for one page load.
    ///
    /// `client_ip` is the visitor address to geolocate, or `None` to let the provider infer it.
    /// Must be called inside a Tokio runtime.
    pub fn on_page_load(&self, raw_query: Option<&str>, client_ip: Option<IpAddr>) -> PageLoad {
        let mut trail = Trail::new();
        trail.enter(Phase::Detecting);

        let Some(key) = Self::detect(raw_query) else {
            trail.enter(Phase::SkipRecording);
            return PageLoad::Authoring {
                trail: trail.finish(),
            };
        };

        let destination = codec::decode(key.as_str());

        trail.enter(Phase::Recording);
        let recording = self.dispatch_recording(key.clone(), client_ip);

        trail.enter(Phase::Redirecting);
        debug!(key = %key, destination = %destination, "redirecting visitor");
        trail.enter(Phase::Done);

        PageLoad::Redirect(Redirect {
            key,
            destination,
            delay: self.delay,
            recording,
            trail: trail.finish(),
        })
    }

    /// Non-blocking dispatch of the visit recording.
    ///
    /// The returned handle is informational; nothing on the redirect path awaits it.
    pub fn dispatch_recording(
        &self,
        key: DestinationKey,
        client_ip: Option<IpAddr>,
    ) -> JoinHandle<RecordOutcome> {
        let store = Arc::clone(&self.store);
        let geo = Arc::clone(&self.geo);

        tokio::spawn(async move {
            let info = match geo.lookup(client_ip).await {
                Ok(info) => info,
                Err(err) => {
                    debug!(key = %key, error = %err, "geolocation unavailable, visit not recorded");
                    return RecordOutcome::LookupUnavailable;
                }
            };

            match store.append(&key, info).await {
                Ok(_) => RecordOutcome::Recorded,
                Err(err) => {
                    warn!(key = %key, error = %err, "failed to store visit");
                    RecordOutcome::StoreFailed
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_absent() {
        assert_eq!(RedirectController::detect(None), None);
        assert_eq!(RedirectController::detect(Some("")), None);
        assert_eq!(RedirectController::detect(Some("foo=bar")), None);
        assert_eq!(RedirectController::detect(Some("urls=x")), None);
    }

    #[test]
    fn test_detect_empty_value_is_absent() {
        assert_eq!(RedirectController::detect(Some("url=")), None);
        assert_eq!(RedirectController::detect(Some("url")), None);
    }

    #[test]
    fn test_detect_keeps_plus_literal() {
        let key = RedirectController::detect(Some("url=https%3A%2F%2Fexample.com%2F%3Fq%3Da+b"));
        assert_eq!(
            key,
            Some(DestinationKey::new("https%3A%2F%2Fexample.com%2F%3Fq%3Da+b"))
        );
        assert_eq!(
            codec::decode(key.unwrap().as_str()),
            "https://example.com/?q=a+b"
        );
    }

    #[test]
    fn test_detect_returns_raw_value() {
        let key = RedirectController::detect(Some("a=1&url=https%3A%2F%2Fexample.com&b=2"));
        assert_eq!(
            key,
            Some(DestinationKey::new("https%3A%2F%2Fexample.com"))
        );
    }

    #[test]
    fn test_detect_first_occurrence_wins() {
        let key = RedirectController::detect(Some("url=first&url=second"));
        assert_eq!(key, Some(DestinationKey::new("first")));
    }
}
