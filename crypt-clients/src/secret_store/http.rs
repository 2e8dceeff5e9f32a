//! HTTP secret store client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{SecretStoreClient, SecretValue, StoreId};
use crate::error::{ClientError, Result};

/// Header carrying the requester's user key.
pub const USER_KEY_HEADER: &str = "x-user-key";

/// Secret store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretStoreConfig {
    /// Base URL (e.g. `http://localhost:8090`)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreRequest<'a> {
    values: &'a [SecretValue],
    authorized_keys: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreResponse {
    store_id: StoreId,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    value: String,
}

/// HTTP client for a secret store service.
///
/// - `POST {base}/stores` stores values, returns `{"storeId": ...}`
/// - `GET {base}/stores/{id}/secrets/{name}` returns `{"value": ...}`
pub struct HttpSecretStore {
    client: Client,
    base_url: Url,
}

impl HttpSecretStore {
    pub fn new(config: &SecretStoreConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::DataIntegrity(format!("invalid secret store URL: {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::DataIntegrity("secret store URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl SecretStoreClient for HttpSecretStore {
    async fn store(
        &self,
        values: Vec<SecretValue>,
        authorized_keys: Vec<String>,
    ) -> Result<StoreId> {
        let url = self.url(&["stores"])?;
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&StoreRequest {
                values: &values,
                authorized_keys: &authorized_keys,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Server { status, message });
        }
        let body: StoreResponse = response.json().await?;
        Ok(body.store_id)
    }

    async fn retrieve(&self, store_id: &StoreId, name: &str, requester_key: &str) -> Result<String> {
        let url = self.url(&["stores", store_id.as_str(), "secrets", name])?;
        let response = self
            .client
            .get(url)
            .header(USER_KEY_HEADER, requester_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(ClientError::SecretNotFound {
                    store_id: store_id.clone(),
                    name: name.to_string(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ClientError::SecretUnauthorized(store_id.clone()))
            }
            status if !status.is_success() => {
                let message = response.text().await.unwrap_or_default();
                return Err(ClientError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            _ => {}
        }

        let body: RetrieveResponse = response.json().await?;
        Ok(body.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpSecretStore {
        HttpSecretStore::new(&SecretStoreConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_posts_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stores"))
            .and(body_partial_json(json!({
                "values": [{"name": "crypt_key_bafy", "value": "a2V5"}],
                "authorizedKeys": ["warden-key"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"storeId": "store-42"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .store(
                vec![SecretValue::new("crypt_key_bafy", "a2V5")],
                vec!["warden-key".into()],
            )
            .await
            .unwrap();
        assert_eq!(id, StoreId::from("store-42"));
    }

    #[tokio::test]
    async fn test_retrieve_sends_user_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stores/store-42/secrets/crypt_key_bafy"))
            .and(header_eq(USER_KEY_HEADER, "warden-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "a2V5"})))
            .mount(&server)
            .await;

        let value = client(&server)
            .retrieve(&StoreId::from("store-42"), "crypt_key_bafy", "warden-key")
            .await
            .unwrap();
        assert_eq!(value, "a2V5");
    }

    #[tokio::test]
    async fn test_retrieve_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stores/missing/secrets/n"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stores/locked/secrets/n"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stores/down/secrets/n"))
            .respond_with(ResponseTemplate::new(503).set_body_string("cluster unavailable"))
            .mount(&server)
            .await;

        let store = client(&server);
        assert!(matches!(
            store.retrieve(&StoreId::from("missing"), "n", "k").await,
            Err(ClientError::SecretNotFound { .. })
        ));
        assert!(matches!(
            store.retrieve(&StoreId::from("locked"), "n", "k").await,
            Err(ClientError::SecretUnauthorized(_))
        ));
        let err = store
            .retrieve(&StoreId::from("down"), "n", "k")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
