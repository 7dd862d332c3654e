use crate::error::{Result, SonarrError};
use crate::http::{ApiRequest, ApiResponse, Transport};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};
use url::Url;

/// Authenticated access to one Sonarr server's `/api/v3` resources.
///
/// Every non-success status becomes [`SonarrError::RemoteApi`]. Nothing is retried here.
#[derive(Clone, Copy)]
pub struct Gateway<'a> {
    transport: &'a dyn Transport,
    base_url: &'a str,
    api_key: &'a str,
}

impl<'a> Gateway<'a> {
    pub fn new(transport: &'a dyn Transport, base_url: &'a str, api_key: &'a str) -> Self {
        Self { transport, base_url, api_key }
    }

    pub fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/api/v3/{}",
            self.base_url.trim_end_matches('/'),
            path
        ))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(Method::GET, path, query, None).await?;
        decode(&response)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.send(Method::POST, path, &[], Some(body)).await?;
        decode(&response)
    }

    /// PUT that tolerates `204 No Content`, returning `None` instead of decoding an
    /// empty body.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let body = serde_json::to_value(body)?;
        let response = self.send(Method::PUT, path, &[], Some(body)).await?;
        if response.status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        decode(&response).map(Some)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.delete_with_query(path, &[]).await
    }

    pub async fn delete_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        self.send(Method::DELETE, path, query, None).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path, query)?;
        debug!("Sonarr {} {}", method, path);

        let response = self
            .transport
            .execute(ApiRequest {
                method: method.clone(),
                url,
                api_key: self.api_key.to_string(),
                body,
            })
            .await?;

        if !response.status.is_success() {
            error!("Sonarr {} {} failed with status: {}", method, path, response.status);
            return Err(SonarrError::RemoteApi {
                status: response.status.as_u16(),
                status_text: status_text(response.status),
            });
        }

        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T> {
    Ok(serde_json::from_str(&response.body)?)
}

pub(crate) fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}
