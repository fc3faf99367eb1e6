use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoRecord {
    /// ISO-3166-1 alpha-2 country code
    pub country: Option<String>,
    pub city: Option<String>,
    /// ISO code of the first subdivision (state, region), if known
    pub subdivision: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum GeoError {
    #[error("No location is known for {0}")]
    NotFound(IpAddr),
    #[error("Geo service error: {0}")]
    ServiceError(String),
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn resolve(&self, ip: IpAddr) -> Result<GeoRecord, GeoError>;
}
