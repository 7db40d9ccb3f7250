use crate::config::Config;
use crate::types::{Credentials, EventCallbackUrlPayload, SendMessagePayload};
use axum::body::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const SEND_MESSAGE_PATH: &str = "/v3/send/message";
pub const EVENT_CALLBACK_URL_PATH: &str = "/v3/REST/eventcallbackurl";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid provider URL: {url}")]
    InvalidUrl { url: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Status and body returned by Mailjet, passed back to the caller as-is.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// What `/events/setup` did at Mailjet.
#[derive(Debug)]
pub enum CallbackSetup {
    /// The lookup was rejected; nothing was changed.
    Unauthorized,
    Created(ProviderResponse),
    Updated(ProviderResponse),
}

/// Thin client for the Mailjet Send and REST APIs.
#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
    config: Arc<Config>,
}

impl ProviderClient {
    pub fn new(config: Arc<Config>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ProviderError::Client)?;
        Ok(Self { http, config })
    }

    pub async fn send_message(
        &self,
        credentials: &Credentials,
        message: &SendMessagePayload,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = self.config.endpoint(SEND_MESSAGE_PATH);
        let request = self.http.post(&url).json(message);
        let response = self.execute(request, credentials, &url).await?;
        info!(%url, status = %response.status, "payload POST-ed to Mailjet Send API");
        Ok(response)
    }

    /// Point the callback for `payload.event_type` at `payload.url`, creating
    /// the callback when Mailjet does not know it yet and updating it otherwise.
    pub async fn setup_event_callback(
        &self,
        credentials: &Credentials,
        payload: &EventCallbackUrlPayload,
    ) -> Result<CallbackSetup, ProviderError> {
        let collection_url = self.config.endpoint(EVENT_CALLBACK_URL_PATH);
        let item_url = callback_item_url(&collection_url, &payload.event_type)?;

        let lookup = self
            .execute(self.http.get(item_url.clone()), credentials, item_url.as_str())
            .await?;
        info!(url = %item_url, status = %lookup.status, "Mailjet eventcallbackurl lookup");

        match lookup.status {
            StatusCode::UNAUTHORIZED => Ok(CallbackSetup::Unauthorized),
            StatusCode::NOT_FOUND => {
                let request = self.http.post(&collection_url).json(payload);
                let response = self.execute(request, credentials, &collection_url).await?;
                info!(url = %collection_url, status = %response.status, "Mailjet eventcallbackurl created");
                Ok(CallbackSetup::Created(response))
            }
            _ => {
                let request = self.http.put(item_url.clone()).json(payload);
                let response = self
                    .execute(request, credentials, item_url.as_str())
                    .await?;
                info!(url = %item_url, status = %response.status, "Mailjet eventcallbackurl updated");
                Ok(CallbackSetup::Updated(response))
            }
        }
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        credentials: &Credentials,
        url: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let request_error = |source| ProviderError::Request {
            url: url.to_string(),
            source,
        };
        let response = request
            .basic_auth(&credentials.api_key, Some(&credentials.api_secret))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(request_error)?;
        Ok(ProviderResponse { status, body })
    }
}

/// `<collection>/<event_type>|false`, the REST id of a non-backup callback.
fn callback_item_url(collection_url: &str, event_type: &str) -> Result<Url, ProviderError> {
    let invalid = || ProviderError::InvalidUrl {
        url: collection_url.to_string(),
    };
    let mut url = Url::parse(collection_url).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .push(event_type);
    // `|` is escaped by hand; path segment encoding leaves it literal
    let path = format!("{}%7Cfalse", url.path());
    url.set_path(&path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_url_appends_escaped_id() {
        let url = callback_item_url("https://api.mailjet.com/v3/REST/eventcallbackurl", "open")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.mailjet.com/v3/REST/eventcallbackurl/open%7Cfalse"
        );
    }

    #[test]
    fn item_url_escapes_path_separators_in_event_type() {
        let url =
            callback_item_url("http://localhost:9000/v3/REST/eventcallbackurl", "a/b").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/v3/REST/eventcallbackurl/a%2Fb%7Cfalse"
        );
    }

    #[test]
    fn item_url_rejects_relative_base() {
        assert!(matches!(
            callback_item_url("/v3/REST/eventcallbackurl", "open"),
            Err(ProviderError::InvalidUrl { .. })
        ));
    }
}
