use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::hash::UdfFields;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway reported a duplicate transaction: {0}")]
    Duplicate(String),
    #[error("gateway temporarily unavailable: {0}")]
    Retryable(String),
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
    #[error("gateway response was not understood: {0}")]
    InvalidResponse(String),
    #[error("gateway circuit breaker open")]
    CircuitOpen,
}

/// Reply body for initiation and command calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReply {
    pub status: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub gateway_txn_id: Option<String>,
    #[serde(default)]
    pub error_desc: Option<String>,
}

/// Error body the gateway returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(default)]
    error_desc: Option<String>,
}

/// Signed field set posted to the gateway to open a payment attempt.
#[derive(Debug, Clone)]
pub struct InitiationForm {
    pub key: String,
    pub txnid: String,
    pub amount: String,
    pub product_info: String,
    pub first_name: String,
    pub email: String,
    pub udfs: UdfFields,
    pub hash: String,
}

const DUPLICATE_PHRASES: &[&str] = &["duplicate transaction"];
const RETRYABLE_PHRASES: &[&str] = &[
    "timed out",
    "timeout",
    "temporarily unavailable",
    "try again",
    "server busy",
];

/// Classifies the gateway's free-text error description. The gateway has
/// no machine-readable error codes; known phrases are the contract.
pub fn classify_error_desc(desc: &str) -> GatewayError {
    let lower = desc.to_lowercase();
    if DUPLICATE_PHRASES.iter().any(|p| lower.contains(p)) {
        GatewayError::Duplicate(desc.to_string())
    } else if RETRYABLE_PHRASES.iter().any(|p| lower.contains(p)) {
        GatewayError::Retryable(desc.to_string())
    } else {
        GatewayError::Rejected(desc.to_string())
    }
}

/// Classifies a raw error body, tolerating non-JSON payloads.
pub fn classify_error_body(body: &str) -> GatewayError {
    match serde_json::from_str::<GatewayErrorBody>(body) {
        Ok(GatewayErrorBody {
            error_desc: Some(desc),
        }) => classify_error_desc(&desc),
        _ => classify_error_desc(body),
    }
}

/// HTTP client for the payment gateway. All calls run behind a
/// consecutive-failures circuit breaker and an explicit request timeout.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl GatewayClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        GatewayClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker.
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Opens a payment attempt with the gateway. A timeout or connection
    /// failure is retryable at the application layer; this client never
    /// retries on its own.
    pub async fn initiate(&self, form: &InitiationForm) -> Result<GatewayReply, GatewayError> {
        let url = format!("{}/payment/initiate", self.base_url.trim_end_matches('/'));

        let mut params: Vec<(&str, &str)> = vec![
            ("key", &form.key),
            ("txnid", &form.txnid),
            ("amount", &form.amount),
            ("productinfo", &form.product_info),
            ("firstname", &form.first_name),
            ("email", &form.email),
        ];
        let udf_names = [
            "udf1", "udf2", "udf3", "udf4", "udf5", "udf6", "udf7", "udf8", "udf9", "udf10",
        ];
        for (i, name) in udf_names.iter().enumerate() {
            params.push((name, form.udfs.slot(i + 1)));
        }
        params.push(("hash", &form.hash));

        self.post_form(&url, &params).await
    }

    /// Server-to-server refund command for a confirmed payment.
    pub async fn refund(
        &self,
        key: &str,
        gateway_txn_id: &str,
        txnid: &str,
        amount: &str,
        hash: &str,
    ) -> Result<GatewayReply, GatewayError> {
        let url = format!("{}/payment/refund", self.base_url.trim_end_matches('/'));
        let params: Vec<(&str, &str)> = vec![
            ("key", key),
            ("command", "refund_transaction"),
            ("var1", gateway_txn_id),
            ("var2", txnid),
            ("var3", amount),
            ("hash", hash),
        ];

        self.post_form(&url, &params).await
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<GatewayReply, GatewayError> {
        let client = self.client.clone();
        let url = url.to_string();
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .form(&params)
                    .send()
                    .await
                    .map_err(classify_transport_error)?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_error_body(&body));
                }

                let reply = response
                    .json::<GatewayReply>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

                if let Some(desc) = &reply.error_desc {
                    return Err(classify_error_desc(desc));
                }

                Ok(reply)
            })
            .await;

        match result {
            Ok(reply) => Ok(reply),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() || err.is_connect() {
        GatewayError::Retryable(err.to_string())
    } else {
        GatewayError::Request(err)
    }
}
