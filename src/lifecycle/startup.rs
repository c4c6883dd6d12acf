//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the core components from a validated configuration
//! - Register the configured circuits
//! - Apply reloaded configuration to the running core
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Components are built in dependency order: events, gate, classifier,
//!   client, validator, gateway adapter
//! - `Core` is the only owner; everything else receives `Arc` clones

use std::sync::Arc;

use crate::config::schema::GatewayConfig;
use crate::observability::events::EventBus;
use crate::payments::gateway::ProtectedGateway;
use crate::payments::http_gateway::HttpPaymentGateway;
use crate::resilience::classifier::ErrorClassifier;
use crate::resilience::client::ResilientClient;
use crate::resilience::gate::ResilienceGate;
use crate::security::access_control::AllowListError;
use crate::security::webhook::WebhookValidator;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("webhook allow-list: {0}")]
    AllowList(#[from] AllowListError),

    #[error("gateway client: {0}")]
    GatewayClient(#[from] reqwest::Error),
}

/// The composed resilience core.
#[derive(Clone)]
pub struct Core {
    pub events: EventBus,
    pub gate: Arc<ResilienceGate>,
    pub classifier: Arc<ErrorClassifier>,
    pub client: ResilientClient,
    pub validator: Arc<WebhookValidator>,
    /// Present when `gateway.base_url` is configured.
    pub payments: Option<Arc<ProtectedGateway<HttpPaymentGateway>>>,
}

impl Core {
    pub fn build(config: &GatewayConfig) -> Result<Self, StartupError> {
        let events = EventBus::new(config.events.buffer);

        let gate = Arc::new(ResilienceGate::new(
            config.circuit_breaker.clone(),
            events.clone(),
        ));
        for (name, circuit) in &config.circuits {
            gate.register(name, circuit.clone());
        }

        let classifier = Arc::new(ErrorClassifier::new(config.retry.clone(), events.clone()));
        let client = ResilientClient::new(gate.clone(), classifier.clone());
        let validator = Arc::new(WebhookValidator::new(config.webhook.clone(), events.clone())?);

        let payments = if config.gateway.base_url.is_empty() {
            None
        } else {
            let adapter = HttpPaymentGateway::new(&config.gateway)?;
            Some(Arc::new(ProtectedGateway::new(adapter, client.clone(), |name| {
                config.circuit_config(name)
            })))
        };

        tracing::info!(
            circuits = gate.names().len(),
            webhook_enabled = config.webhook.enabled,
            gateway_configured = payments.is_some(),
            "Core initialized"
        );

        Ok(Self {
            events,
            gate,
            classifier,
            client,
            validator,
            payments,
        })
    }

    /// Apply a reloaded configuration. Circuit state, counters and caches are
    /// kept; listeners, the event buffer and the gateway adapter need a restart.
    pub fn apply(&self, config: &GatewayConfig) -> Result<(), AllowListError> {
        self.validator.update(config.webhook.clone())?;

        self.gate.set_defaults(config.circuit_breaker.clone());
        let mut names = self.gate.names();
        names.extend(config.circuits.keys().cloned());
        names.sort();
        names.dedup();
        for name in &names {
            self.gate.configure(name, config.circuit_config(name));
        }

        self.classifier.set_policy(config.retry.clone());

        tracing::info!(circuits = names.len(), "Configuration applied");
        Ok(())
    }
}
