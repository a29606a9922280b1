//! Pact Node Client - per-shard local queries
//!
//! Sends read-only `local` commands to chainweb nodes:
//! 1. Every configured Pact API base is tried in order
//! 2. When a node rejects the envelope (HTTP 4xx other than 429), the same
//!    command is re-sent wrapped as `{"cmd": envelope}`, then as
//!    `{"cmd": "<stringified envelope>"}`; some gateways only accept those
//! 3. Transport errors, timeouts, 429 and 5xx skip straight to the next base
//!
//! Every call carries the node timeout; nothing here retries with backoff.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::providers::transport::{HttpRequest, HttpTransport};
use crate::utils::constants::{PACT_GAS_LIMIT, PACT_GAS_PRICE, PACT_TTL_SECS};

/// How the local command is wrapped on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeEncoding {
    /// The command object itself
    Plain,
    /// `{"cmd": <command object>}`
    WrappedCmd,
    /// `{"cmd": "<command as JSON string>"}`
    StringifiedCmd,
}

impl EnvelopeEncoding {
    /// Order in which encodings are attempted against one base
    pub const ATTEMPT_ORDER: [EnvelopeEncoding; 3] = [
        EnvelopeEncoding::Plain,
        EnvelopeEncoding::WrappedCmd,
        EnvelopeEncoding::StringifiedCmd,
    ];

    pub fn encode(&self, command: &Value) -> Value {
        match self {
            Self::Plain => command.clone(),
            Self::WrappedCmd => json!({ "cmd": command }),
            Self::StringifiedCmd => json!({ "cmd": command.to_string() }),
        }
    }
}

/// Outcome of one shard query
#[derive(Debug)]
pub struct ShardQueryResult {
    pub chain_id: u32,
    pub outcome: AppResult<Value>,
}

impl ShardQueryResult {
    /// Positive balance carried by the response, if any
    pub fn balance(&self) -> Option<f64> {
        self.outcome.as_ref().ok().and_then(balance_from_local)
    }
}

/// Pact expression reading the coin balance of `address`
pub fn balance_code(address: &str) -> String {
    let escaped = address.replace('\\', "\\\\").replace('"', "\\\"");
    format!("(coin.get-balance \"{}\")", escaped)
}

/// Read-only command for `chain_id`, stamped with `creation_time`
pub fn build_command(network_id: &str, chain_id: u32, code: &str, creation_time: i64) -> Value {
    json!({
        "networkId": network_id,
        "payload": {
            "exec": {
                "code": code,
                "data": {}
            }
        },
        "signers": [],
        "meta": {
            "chainId": chain_id.to_string(),
            "gasLimit": PACT_GAS_LIMIT,
            "gasPrice": PACT_GAS_PRICE,
            "ttl": PACT_TTL_SECS,
            "creationTime": creation_time
        }
    })
}

pub fn local_url(base: &str, network_id: &str, chain_id: u32) -> String {
    format!(
        "{}/chainweb/0.0/{}/chain/{}/pact/api/v1/local",
        base.trim_end_matches('/'),
        network_id,
        chain_id
    )
}

/// Coerce the Pact representations of a decimal to `f64`:
/// `{"int": "100"}`, `{"decimal": "1.5"}`, plain numbers and numeric strings.
pub fn normalize_balance(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => map
            .get("int")
            .or_else(|| map.get("decimal"))
            .and_then(normalize_balance),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Balance out of a `local` response; failed Pact results and non-positive
/// values yield `None`.
pub fn balance_from_local(body: &Value) -> Option<f64> {
    let result = body.get("result")?;
    if result.get("status").and_then(Value::as_str) == Some("failure") {
        return None;
    }
    normalize_balance(result.get("data")?).filter(|v| *v > 0.0)
}

#[derive(Clone)]
pub struct PactClient {
    transport: Arc<dyn HttpTransport>,
    bases: Vec<String>,
    network_id: String,
    timeout: Duration,
}

impl PactClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        bases: Vec<String>,
        network_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            bases,
            network_id: network_id.into(),
            timeout,
        }
    }

    /// Balance query for one shard, reported with its chain id
    pub async fn query_balance(&self, chain_id: u32, address: &str) -> ShardQueryResult {
        ShardQueryResult {
            chain_id,
            outcome: self.local(chain_id, &balance_code(address)).await,
        }
    }

    /// Run `code` as a local command on `chain_id`, first base that answers wins
    pub async fn local(&self, chain_id: u32, code: &str) -> AppResult<Value> {
        if self.bases.is_empty() {
            return Err(AppError::no_endpoints("No Pact API base configured"));
        }

        let command = build_command(&self.network_id, chain_id, code, Utc::now().timestamp());
        let mut last_error = None;

        for base in &self.bases {
            let url = local_url(base, &self.network_id, chain_id);
            match self.local_on_base(&url, &command).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    debug!("⚠️ Chain {} via {} failed: {}", chain_id, base, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::no_endpoints("No Pact API base answered")))
    }

    async fn local_on_base(&self, url: &str, command: &Value) -> AppResult<Value> {
        let mut last_error = AppError::new(ErrorCode::Unknown, "no envelope attempted");

        for encoding in EnvelopeEncoding::ATTEMPT_ORDER {
            let request =
                HttpRequest::post(url, encoding.encode(command)).with_timeout(self.timeout);
            let outcome = match tokio::time::timeout(self.timeout, self.transport.execute(request))
                .await
            {
                Ok(result) => result,
                Err(elapsed) => Err(elapsed.into()),
            };

            match outcome {
                Ok(body) => return Ok(body),
                Err(e) if e.code.is_rejection() => {
                    debug!("↩️ {} rejected {:?} envelope: {}", url, encoding, e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockTransport;
    use crate::providers::transport::HttpRequest;

    fn client(mock: &MockTransport, bases: &[&str]) -> PactClient {
        PactClient::new(
            Arc::new(mock.clone()),
            bases.iter().map(|b| b.to_string()).collect(),
            "mainnet01",
            Duration::from_secs(8),
        )
    }

    fn success(data: Value) -> Value {
        json!({"result": {"status": "success", "data": data}})
    }

    #[test]
    fn test_balance_code_escapes_quotes() {
        assert_eq!(balance_code("k:abc"), r#"(coin.get-balance "k:abc")"#);
        assert_eq!(balance_code(r#"a"b\c"#), r#"(coin.get-balance "a\"b\\c")"#);
    }

    #[test]
    fn test_command_shape() {
        let cmd = build_command("mainnet01", 7, "(+ 1 2)", 1_700_000_000);
        assert_eq!(cmd["networkId"], "mainnet01");
        assert_eq!(cmd["payload"]["exec"]["code"], "(+ 1 2)");
        assert_eq!(cmd["meta"]["chainId"], "7");
        assert_eq!(cmd["meta"]["gasLimit"], 150_000);
        assert_eq!(cmd["meta"]["ttl"], 600);
        assert_eq!(cmd["meta"]["creationTime"], 1_700_000_000i64);
        assert!(cmd["signers"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_local_url() {
        assert_eq!(
            local_url("https://api.chainweb.com/", "mainnet01", 3),
            "https://api.chainweb.com/chainweb/0.0/mainnet01/chain/3/pact/api/v1/local"
        );
    }

    #[test]
    fn test_normalize_balance() {
        assert_eq!(normalize_balance(&json!({"int": "100000000"})), Some(100_000_000.0));
        assert_eq!(normalize_balance(&json!({"decimal": "1.25"})), Some(1.25));
        assert_eq!(normalize_balance(&json!(12.5)), Some(12.5));
        assert_eq!(normalize_balance(&json!("0.0")), Some(0.0));
        assert_eq!(normalize_balance(&json!("abc")), None);
        assert_eq!(normalize_balance(&json!(null)), None);
    }

    #[test]
    fn test_balance_from_local() {
        assert_eq!(balance_from_local(&success(json!(5.0))), Some(5.0));
        assert_eq!(balance_from_local(&success(json!(0.0))), None);
        assert_eq!(balance_from_local(&success(json!(-2))), None);
        assert_eq!(
            balance_from_local(&json!({"result": {"status": "failure", "error": {"message": "row not found"}}})),
            None
        );
        assert_eq!(balance_from_local(&json!({})), None);
    }

    #[test]
    fn test_envelope_encodings() {
        let cmd = json!({"a": 1});
        assert_eq!(EnvelopeEncoding::Plain.encode(&cmd), cmd);
        assert_eq!(EnvelopeEncoding::WrappedCmd.encode(&cmd), json!({"cmd": {"a": 1}}));
        assert_eq!(EnvelopeEncoding::StringifiedCmd.encode(&cmd), json!({"cmd": "{\"a\":1}"}));
    }

    #[tokio::test]
    async fn test_rejection_tries_alternate_envelopes() {
        let mock = MockTransport::new(|req: &HttpRequest| {
            match req.body.as_ref().and_then(|b| b.get("cmd")) {
                Some(Value::String(_)) => Ok(success(json!({"int": "42"}))),
                _ => Err(AppError::from_status(400, "missing cmd")),
            }
        });
        let result = client(&mock, &["https://a"]).query_balance(2, "k:abc").await;
        assert_eq!(result.chain_id, 2);
        assert_eq!(result.balance(), Some(42.0));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_moves_to_next_base() {
        let mock = MockTransport::new(|req: &HttpRequest| {
            if req.url.starts_with("https://down") {
                Err(AppError::connection_failed("refused"))
            } else {
                Ok(success(json!(3.5)))
            }
        });
        let result = client(&mock, &["https://down", "https://up"]).query_balance(0, "k:abc").await;
        assert_eq!(result.balance(), Some(3.5));
        // no envelope alternates on a transport failure
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.requests_to("https://down").len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_a_rejection() {
        let mock = MockTransport::new(|_: &HttpRequest| Err(AppError::from_status(429, "slow down")));
        let result = client(&mock, &["https://a", "https://b"]).query_balance(0, "k:abc").await;
        assert!(result.outcome.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_all_rejections_exhaust_every_base() {
        let mock = MockTransport::new(|_: &HttpRequest| Err(AppError::from_status(400, "bad")));
        let result = client(&mock, &["https://a", "https://b"]).query_balance(0, "k:abc").await;
        assert_eq!(result.outcome.unwrap_err().code, ErrorCode::RpcRejected);
        assert_eq!(mock.call_count(), 6);
    }

    #[tokio::test]
    async fn test_no_bases() {
        let mock = MockTransport::failing();
        let result = client(&mock, &[]).query_balance(0, "k:abc").await;
        assert_eq!(result.outcome.unwrap_err().code, ErrorCode::RpcNoEndpoints);
        assert_eq!(mock.call_count(), 0);
    }
}
