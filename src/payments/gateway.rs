//! Payment gateway seam and its circuit-protected wrapper.
//!
//! # Responsibilities
//! - Define the operations the service performs against the gateway
//! - Route every call through a dedicated circuit with classified retries
//!
//! # Design Decisions
//! - Adapters return `GatewayFault` so failures classify the same way
//!   whatever transport the adapter uses
//! - One circuit per operation: a failing verify endpoint does not stop
//!   payment creation

use std::sync::Arc;

use async_trait::async_trait;

use crate::resilience::circuit_breaker::CircuitBreakerConfig;
use crate::resilience::classifier::ClassifiedError;
use crate::resilience::client::ResilientClient;
use crate::resilience::fallback::Fallback;
use crate::resilience::fault::GatewayFault;
use crate::resilience::gate::Outcome;
use crate::payments::types::{Payment, PaymentRequest};

pub const CREATE_PAYMENT: &str = "gateway.create_payment";
pub const VERIFY_PAYMENT: &str = "gateway.verify_payment";

/// Operations offered by a payment gateway adapter.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayFault>;

    async fn verify_payment(&self, payment_id: &str) -> Result<Payment, GatewayFault>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayFault> {
        (**self).create_payment(request).await
    }

    async fn verify_payment(&self, payment_id: &str) -> Result<Payment, GatewayFault> {
        (**self).verify_payment(payment_id).await
    }
}

/// A gateway adapter whose calls go through circuits.
pub struct ProtectedGateway<G> {
    inner: G,
    client: ResilientClient,
}

impl<G: PaymentGateway> ProtectedGateway<G> {
    /// Wrap `inner`, configuring both operation circuits with `circuit_config`.
    pub fn new<F>(inner: G, client: ResilientClient, circuit_config: F) -> Self
    where
        F: Fn(&str) -> CircuitBreakerConfig,
    {
        for name in [CREATE_PAYMENT, VERIFY_PAYMENT] {
            client.gate().configure(name, circuit_config(name));
        }
        Self { inner, client }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Open a payment. Never served from a fallback.
    pub async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, ClassifiedError> {
        let outcome = self
            .client
            .execute(
                CREATE_PAYMENT,
                || self.inner.create_payment(request),
                Fallback::None,
            )
            .await?;
        tracing::info!(
            payment_id = %outcome.value.payment_id,
            reference = %request.reference,
            "Payment created"
        );
        Ok(outcome.value)
    }

    /// Look up a payment, falling back to `fallback` (e.g. the last known
    /// status) once the gateway cannot answer.
    pub async fn verify_payment(
        &self,
        payment_id: &str,
        fallback: Fallback<Payment>,
    ) -> Result<Outcome<Payment>, ClassifiedError> {
        let outcome = self
            .client
            .execute(
                VERIFY_PAYMENT,
                || self.inner.verify_payment(payment_id),
                fallback,
            )
            .await?;
        if outcome.from_fallback {
            tracing::warn!(payment_id = %payment_id, "Payment status served from fallback");
        }
        Ok(outcome)
    }
}
