//! Destination validation and tracking link composition

use axum::http::{header, HeaderMap};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::codec;
use crate::redirect::TRACKING_PARAM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("A destination URL is required.")]
    Empty,
    #[error("The destination must start with http:// or https://")]
    InvalidScheme,
}

/// Check that `input` is something we are willing to build a tracking link for.
pub fn validate(input: &str) -> Result<(), ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or(ValidationError::InvalidScheme)?;

    match rest.chars().next() {
        Some(c) if !matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}') => Ok(()),
        _ => Err(ValidationError::InvalidScheme),
    }
}

/// Shareable address that carries an encoded destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TrackingLink(String);

impl TrackingLink {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build `<base>?url=<encoded destination>`. Query and fragment of `base` are dropped.
pub fn compose_tracking_link(base: &Url, destination: &str) -> TrackingLink {
    let mut base = base.clone();
    base.set_query(None);
    base.set_fragment(None);

    let key = codec::encode(destination.trim());
    TrackingLink(format!("{}?{}={}", base, TRACKING_PARAM, key))
}

/// Address of the page that serves tracking links.
///
/// The configured public URL wins; otherwise the request's Host header is used.
pub fn base_address(public_base_url: Option<&str>, headers: &HeaderMap) -> Option<Url> {
    if let Some(configured) = public_base_url {
        return Url::parse(configured).ok();
    }

    let host = headers.get(header::HOST)?.to_str().ok()?;
    Url::parse(&format!("http://{}/", host)).ok()
}

/// What the authoring form shows after the last edit or submission.
#[derive(Debug, Clone, Default)]
pub struct AuthoringState {
    pub input: String,
    pub error: Option<ValidationError>,
    pub link: Option<TrackingLink>,
}

impl AuthoringState {
    /// Validate a submission and compose its link when it passes.
    pub fn submit(base: &Url, input: &str) -> Self {
        match validate(input) {
            Ok(()) => Self {
                // The form is cleared once a link has been produced.
                input: String::new(),
                error: None,
                link: Some(compose_tracking_link(base, input)),
            },
            Err(err) => Self {
                input: input.to_string(),
                error: Some(err),
                link: None,
            },
        }
    }

    /// The create action is available only while the current input is valid.
    pub fn submit_enabled(&self) -> bool {
        self.error.is_none() && validate(&self.input).is_ok()
    }
}
