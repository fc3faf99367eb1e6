use std::{collections::HashMap, net::IpAddr, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::traits::{GeoError, GeoLocator, GeoRecord};

/// Resolves IP addresses from a fixed table. Unknown addresses are an error.
#[derive(Debug, Clone, Default)]
pub struct StaticGeoLocator {
    records: Arc<RwLock<HashMap<IpAddr, GeoRecord>>>,
}

impl StaticGeoLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, ip: IpAddr, record: GeoRecord) {
        self.records.write().await.insert(ip, record);
    }

    /// Shorthand for an address that is only known down to its country.
    pub async fn insert_country(&self, ip: IpAddr, country: &str) {
        let record = GeoRecord { country: Some(country.to_string()), ..Default::default() };
        self.insert(ip, record).await;
    }
}

#[async_trait]
impl GeoLocator for StaticGeoLocator {
    async fn resolve(&self, ip: IpAddr) -> Result<GeoRecord, GeoError> {
        self.records.read().await.get(&ip).cloned().ok_or(GeoError::NotFound(ip))
    }
}
