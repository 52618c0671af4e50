//! HTTP client implementation

use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use storage_api::models::ErrorResponse;
use tracing::{debug, error};

use crate::errors::HostError;

/// HTTP client for backend communication and object downloads
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Create a new HTTP client authenticated with an API key
    pub fn with_api_key(base_url: &str, api_key: SecretString) -> Result<Self, HostError> {
        let mut client = Self::new(base_url)?;
        client.api_key = Some(api_key);
        Ok(client)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key.expose_secret())
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", key.expose_secret()),
                );
        }
        request
    }

    async fn check(response: Response, what: &str) -> Result<Response, HostError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.describe())
            .unwrap_or(body);
        error!("{} failed: {} - {}", what, status, detail);
        Err(HostError::Storage(format!("{}: {}", status, detail)))
    }

    /// GET a backend path and decode JSON
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, HostError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self.authorize(self.client.get(&url));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = Self::check(request.send().await?, "HTTP GET").await?;
        Ok(response.json().await?)
    }

    /// POST JSON to a backend path and decode JSON
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HostError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let request = self.authorize(self.client.post(&url).json(body));
        let response = Self::check(request.send().await?, "HTTP POST").await?;
        Ok(response.json().await?)
    }

    /// Fetch an absolute URL; any non-2xx status is an error
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HostError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HostError::Storage(format!(
                "download of {} failed with status {}",
                url, status
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Fetch an absolute URL as UTF-8 text
    pub async fn fetch_text(&self, url: &str) -> Result<String, HostError> {
        let bytes = self.fetch_bytes(url).await?;
        String::from_utf8(bytes)
            .map_err(|e| HostError::Storage(format!("{} is not valid UTF-8: {}", url, e)))
    }
}
