// Destination seam: the four operations the engine needs from NetBox.

use std::future::Future;

use acisync_api::{Endpoint, NetBoxClient};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::record::DestRecord;

/// Bulk read, create, partial update and single read against the
/// destination inventory.
pub trait Destination: Send + Sync {
    /// Every object of `endpoint` matching `filters`.
    fn list(
        &self,
        endpoint: Endpoint,
        filters: &[(&'static str, String)],
    ) -> impl Future<Output = Result<Vec<DestRecord>, CoreError>> + Send;

    fn create(
        &self,
        endpoint: Endpoint,
        body: &Map<String, Value>,
    ) -> impl Future<Output = Result<DestRecord, CoreError>> + Send;

    fn update(
        &self,
        endpoint: Endpoint,
        id: u64,
        body: &Map<String, Value>,
    ) -> impl Future<Output = Result<DestRecord, CoreError>> + Send;

    fn get(
        &self,
        endpoint: Endpoint,
        id: u64,
    ) -> impl Future<Output = Result<DestRecord, CoreError>> + Send;
}

impl Destination for NetBoxClient {
    async fn list(
        &self,
        endpoint: Endpoint,
        filters: &[(&'static str, String)],
    ) -> Result<Vec<DestRecord>, CoreError> {
        let objects = NetBoxClient::list(self, endpoint, filters).await?;
        Ok(objects.into_iter().map(DestRecord::from).collect())
    }

    async fn create(
        &self,
        endpoint: Endpoint,
        body: &Map<String, Value>,
    ) -> Result<DestRecord, CoreError> {
        Ok(NetBoxClient::create(self, endpoint, body).await?.into())
    }

    async fn update(
        &self,
        endpoint: Endpoint,
        id: u64,
        body: &Map<String, Value>,
    ) -> Result<DestRecord, CoreError> {
        Ok(NetBoxClient::update(self, endpoint, id, body).await?.into())
    }

    async fn get(&self, endpoint: Endpoint, id: u64) -> Result<DestRecord, CoreError> {
        Ok(NetBoxClient::get(self, endpoint, id).await?.into())
    }
}
