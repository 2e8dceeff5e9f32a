//! JSON-RPC 2.0 transport shared by the ledger and oracle clients.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crypt_core::{Address, RegistryError};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Connection settings for a JSON-RPC node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Node endpoint, e.g. `http://localhost:8545`
    pub endpoint: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Bearer token, if the node requires one
    pub api_key: Option<String>,
    /// Crypt registry contract, sent as `to` on crypt calls
    #[serde(default)]
    pub crypt_registry: Option<Address>,
    /// Warden registry contract, sent as `to` on warden calls
    #[serde(default)]
    pub warden_registry: Option<Address>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            timeout_secs: 30,
            api_key: None,
            crypt_registry: None,
            warden_registry: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Token amounts arrive as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub(crate) struct Amount(#[serde(with = "crypt_core::types::decimal")] pub u128);

pub struct RpcTransport {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RpcTransport {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ClientError::DataIntegrity(format!("invalid API key: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke `method` and decode its result.
    ///
    /// Error objects whose `data` is a serialized [`RegistryError`] come back
    /// as [`ClientError::Registry`], so callers can match on ledger errors
    /// regardless of transport.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "RPC call");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(method, status, "RPC transport error");
            return Err(ClientError::Server { status, message });
        }

        let body: RpcResponse = response.json().await?;
        if let Some(err) = body.error {
            if let Some(registry) = err
                .data
                .and_then(|data| serde_json::from_value::<RegistryError>(data).ok())
            {
                return Err(ClientError::Registry(registry));
            }
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = body.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypt_core::CryptId;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport(server: &MockServer) -> RpcTransport {
        RpcTransport::new(&RpcConfig {
            endpoint: server.uri(),
            timeout_secs: 5,
            api_key: Some("token".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_call_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "getWardenStakeInToken"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "340282366920938463463374607431768211455"
            })))
            .mount(&server)
            .await;

        let amount: Amount = transport(&server)
            .await
            .call("getWardenStakeInToken", json!({}))
            .await
            .unwrap();
        assert_eq!(amount.0, u128::MAX);
    }

    #[tokio::test]
    async fn test_registry_error_in_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {
                    "code": -32000,
                    "message": "execution reverted",
                    "data": {"error": "already_revealed", "detail": 3}
                }
            })))
            .mount(&server)
            .await;

        let err = transport(&server)
            .await
            .call::<()>("setDecryptionKey", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Registry(RegistryError::AlreadyRevealed(CryptId(3)))
        ));
    }

    #[tokio::test]
    async fn test_opaque_rpc_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"code": -32603, "message": "internal error"}
            })))
            .mount(&server)
            .await;

        let err = transport(&server)
            .await
            .call::<Value>("getCrypts", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_http_status_maps_to_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = transport(&server)
            .await
            .call::<Value>("getCrypts", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 502, .. }));
        assert!(err.is_transient());
    }
}
