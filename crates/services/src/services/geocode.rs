//! Reverse geocoding seam. The gateway treats this as best-effort: callers
//! wrap the lookup in a timeout and drop the result on any failure.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Geocoder returned status {0}")]
    BadStatus(u16),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodedPlace {
    pub address: Option<String>,
    pub city: Option<String>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, lat: f64, lng: f64) -> Result<GeocodedPlace, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

/// OSM Nominatim client. Base URL is overridable for self-hosted instances
/// via `FIELDOPS_GEOCODER_URL`.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn from_env() -> Self {
        let base_url = std::env::var("FIELDOPS_GEOCODER_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, lat: f64, lng: f64) -> Result<GeocodedPlace, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
            ])
            .header("User-Agent", "fieldops-server")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeocodeError::BadStatus(response.status().as_u16()));
        }
        let parsed: NominatimResponse = response.json().await?;
        let city = parsed
            .address
            .city
            .or(parsed.address.town)
            .or(parsed.address.village);
        Ok(GeocodedPlace {
            address: parsed.display_name,
            city,
        })
    }
}
