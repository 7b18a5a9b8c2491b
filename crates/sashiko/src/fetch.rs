use bytes::Bytes;
use url::Url;

use crate::{
    error::{SashikoError, SashikoResult},
    util::http::HttpClient,
};

/// Performs one manifest GET per call. No retries: transport failures are
/// reported immediately and recovery policy belongs to the caller.
#[derive(Clone, Default)]
pub struct PlaylistFetcher {
    client: HttpClient,
}

impl PlaylistFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, url: &Url) -> SashikoResult<Bytes> {
        let response =
            self.client
                .get(url.clone())
                .send()
                .await
                .map_err(|error| SashikoError::RequestError {
                    url: url.clone(),
                    status: error.status(),
                    source: error,
                })?;

        let status = response.status();
        if let Err(error) = response.error_for_status_ref() {
            if let Ok(body) = response.text().await {
                tracing::warn!("Error body: {body}");
            }
            return Err(SashikoError::RequestError {
                url: url.clone(),
                status: Some(status),
                source: error,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| SashikoError::RequestError {
                url: url.clone(),
                status: Some(status),
                source: error,
            })?;
        if bytes.is_empty() {
            return Err(SashikoError::UnexpectedEmptyResponse {
                url: url.clone(),
                status: Some(status),
            });
        }

        Ok(bytes)
    }
}
