//! HTTP client for ipapi.co-style geolocation services

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;

use crate::geo::{GeoLookup, LookupUnavailable};
use crate::models::GeoInfo;

/// Shape of a successful response. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
}

pub struct IpApiClient {
    client: reqwest::Client,
    endpoint: String,
    ip_endpoint: String,
}

impl IpApiClient {
    /// `endpoint` geolocates the requester; `ip_endpoint` has `{ip}` substituted.
    pub fn new(endpoint: impl Into<String>, ip_endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("trackly/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build geolocation HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            ip_endpoint: ip_endpoint.into(),
        })
    }

    fn url_for(&self, client_ip: Option<IpAddr>) -> String {
        match client_ip {
            Some(ip) => self.ip_endpoint.replace("{ip}", &ip.to_string()),
            None => self.endpoint.clone(),
        }
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    async fn lookup(
        &self,
        client_ip: Option<IpAddr>,
    ) -> std::result::Result<GeoInfo, LookupUnavailable> {
        let url = self.url_for(client_ip);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(LookupUnavailable::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupUnavailable::Status(status.as_u16()));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LookupUnavailable::Malformed(e.to_string()))?;

        if body.error {
            return Err(LookupUnavailable::Rejected(
                body.reason.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }

        let info = GeoInfo {
            ip: body.ip,
            city: body.city,
            region: body.region,
            country: body.country_name,
        };
        if info.is_empty() {
            return Err(LookupUnavailable::Malformed(
                "response carries none of ip, city, region, country_name".to_string(),
            ));
        }

        Ok(info)
    }
}
