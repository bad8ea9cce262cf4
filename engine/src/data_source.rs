//! Remote flow data source
//!
//! The engine only ever talks to the data source through [`DataSource`]; the
//! HTTP implementation follows the `{code, message, data}` envelope layout.

use crate::config::EngineConfig;
use crate::error::FetchError;
use serde::de::DeserializeOwned;
use shared::{
    ApiEnvelope, AreaId, Chunk, DataKind, Edge, Location, LocationFlows, Scene, SceneId,
};
use std::future::Future;
use std::time::Duration;

pub trait DataSource: Send + Sync + 'static {
    /// `GET scenes`
    fn scenes(&self) -> impl Future<Output = Result<Vec<Scene>, FetchError>> + Send;

    /// `GET scenes/{id}/locations`
    fn locations(
        &self,
        scene_id: SceneId,
    ) -> impl Future<Output = Result<Vec<Location>, FetchError>> + Send;

    /// `GET graph?area_id=`
    fn graph(&self, area_id: AreaId) -> impl Future<Output = Result<Vec<Edge>, FetchError>> + Send;

    /// `GET scenes/{id}/measurements|predictions?start_time=&step=`
    ///
    /// A successful response without records is an empty chunk, not an error.
    fn chunk(
        &self,
        scene_id: SceneId,
        kind: DataKind,
        start_time: i64,
        step_count: usize,
    ) -> impl Future<Output = Result<Chunk, FetchError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDataSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, FetchError> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_envelope<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, FetchError>
    where
        T: DeserializeOwned + Default,
    {
        let url = format!("{}/{}", self.base_url, path);
        log::debug!("GET {} {:?}", url, query);

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.into_data()?)
    }
}

impl DataSource for HttpDataSource {
    async fn scenes(&self) -> Result<Vec<Scene>, FetchError> {
        self.get_envelope("scenes", &[]).await
    }

    async fn locations(&self, scene_id: SceneId) -> Result<Vec<Location>, FetchError> {
        self.get_envelope(&format!("scenes/{}/locations", scene_id), &[])
            .await
    }

    async fn graph(&self, area_id: AreaId) -> Result<Vec<Edge>, FetchError> {
        self.get_envelope("graph", &[("area_id", area_id.to_string())])
            .await
    }

    async fn chunk(
        &self,
        scene_id: SceneId,
        kind: DataKind,
        start_time: i64,
        step_count: usize,
    ) -> Result<Chunk, FetchError> {
        let path = format!("scenes/{}/{}", scene_id, kind.endpoint());
        let query = [
            ("start_time", start_time.to_string()),
            ("step", step_count.to_string()),
        ];
        let locations: Vec<LocationFlows> = self.get_envelope(&path, &query).await?;

        Ok(Chunk::from_location_flows(
            start_time, step_count, kind, locations,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let source = HttpDataSource::new("http://localhost:8090/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.base_url(), "http://localhost:8090/api");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);
        let source =
            HttpDataSource::new(format!("http://{}", address), Duration::from_millis(500)).unwrap();

        let error = source.scenes().await.unwrap_err();
        assert!(matches!(error, FetchError::Transport(_)));
    }
}
