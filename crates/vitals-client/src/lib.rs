//! Typed client for a running vitals registry.
//!
//! Probes use [`VitalsClient::report_worker`] to push their results; the
//! other methods mirror the read and config endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use vitals_core::{
    DaemonHealth, ServiceConfig, ServiceListResponse, ServiceResponse, ServiceStatusHealth,
    ServiceWorkerResponse,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry returned {status}: {detail}")]
    Api { status: u16, detail: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct VitalsClient {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl VitalsClient {
    /// `base_url` like `http://127.0.0.1:4242`; `api_key` is attached as a
    /// bearer token when set.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.filter(|k| !k.is_empty()),
            http,
        })
    }

    pub async fn health(&self) -> ClientResult<DaemonHealth> {
        self.get("/health").await
    }

    pub async fn list_services(&self) -> ClientResult<ServiceListResponse> {
        self.get("/health/service").await
    }

    pub async fn get_service(&self, service: &str) -> ClientResult<ServiceResponse> {
        self.get(&format!("/health/service/{service}")).await
    }

    pub async fn update_config(
        &self,
        service: &str,
        config: &ServiceConfig,
    ) -> ClientResult<ServiceResponse> {
        self.post(&format!("/health/service/{service}/config"), config)
            .await
    }

    pub async fn report_worker(
        &self,
        service: &str,
        worker: &str,
        health: &ServiceStatusHealth,
    ) -> ClientResult<ServiceWorkerResponse> {
        self.post(
            &format!("/health/service/{service}/worker/{worker}"),
            health,
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let mut request = self.http.get(self.url(path));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        Self::decode(request.send().await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        Self::decode(request.send().await?).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = VitalsClient::new("http://localhost:4242/", None).unwrap();
        assert_eq!(
            client.url("/health/service/db"),
            "http://localhost:4242/health/service/db"
        );
    }

    #[test]
    fn empty_api_key_is_dropped() {
        let client = VitalsClient::new("http://localhost:4242", Some(String::new())).unwrap();
        assert!(client.api_key.is_none());
    }
}
