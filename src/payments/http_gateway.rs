//! JSON-over-HTTP gateway adapter.
//!
//! `POST {base_url}/payments` opens a payment, `GET {base_url}/payments/{id}`
//! reads it back. Transport errors, non-2xx responses and 2xx bodies carrying
//! a non-success business code all become `GatewayFault`s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response};

use crate::config::schema::GatewayApiConfig;
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{Payment, PaymentRequest};
use crate::resilience::fault::GatewayFault;

pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayFault> {
        let response = self
            .client
            .post(self.url("/payments"))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", &request.reference)
            .json(request)
            .send()
            .await?;
        read_payment(response).await
    }

    async fn verify_payment(&self, payment_id: &str) -> Result<Payment, GatewayFault> {
        let response = self
            .client
            .get(self.url(&format!("/payments/{}", payment_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        read_payment(response).await
    }
}

async fn read_payment(response: Response) -> Result<Payment, GatewayFault> {
    let status = response.status();
    let retry_after = retry_after(response.headers());
    let body = response.text().await?;

    if !status.is_success() {
        return Err(GatewayFault::from_status(
            status.as_u16(),
            retry_after.as_deref(),
            &body,
        ));
    }

    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| GatewayFault::new(format!("malformed gateway response: {}", e)))?;

    if let Some(code) = value.get("code").and_then(|v| v.as_str()) {
        let message = value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("payment declined by gateway");
        let fault = GatewayFault::gateway_declined(code, message);
        if fault.is_declined() {
            return Err(fault);
        }
    }

    serde_json::from_value(value)
        .map_err(|e| GatewayFault::new(format!("malformed gateway response: {}", e)))
}

fn retry_after(headers: &HeaderMap) -> Option<String> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
