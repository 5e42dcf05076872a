use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::domain::{
    EnquiryId, EnquiryStatus, PaymentOrder, PaymentOrderId, PaymentPhase, PaymentStatus,
};
use super::error::MarketError;
use super::policy::MarketPolicy;
use super::principal::{require_customer, Principal};
use super::repository::{EnquiryStore, PaymentStore, StoreError};

type HmacSha256 = Hmac<Sha256>;

static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_payment_id() -> PaymentOrderId {
    let id = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentOrderId(format!("pay-{id:06}"))
}

/// Outbound request to the gateway. Amounts are integer minor units; the
/// receipt doubles as an idempotency key on the gateway side.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
}

/// The gateway's handle for a created payment intent.
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub order_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway rejected the order: {0}")]
    Rejected(String),
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
}

/// Outbound boundary to the external payment processor.
pub trait PaymentGateway: Send + Sync {
    fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError>;
}

/// Inbound payment outcome asserted by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    pub state: String,
}

/// HMAC-SHA256 check over the exact received payload bytes.
///
/// This is the system's external trust boundary: verification happens
/// before any parsing or lookup, and the comparison is constant-time.
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> Result<(), MarketError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| MarketError::Internal(format!("invalid webhook secret: {err}")))?;
        mac.update(payload);
        let computed = mac.finalize().into_bytes();

        let Ok(claimed) = hex::decode(signature_hex.trim()) else {
            return Err(MarketError::Authentication);
        };
        if claimed.len() != computed.len() {
            return Err(MarketError::Authentication);
        }
        if bool::from(computed.as_slice().ct_eq(claimed.as_slice())) {
            Ok(())
        } else {
            Err(MarketError::Authentication)
        }
    }

    /// Signature for an outgoing payload; used by in-process gateways and
    /// tests to produce notifications this verifier accepts.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key size");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Opens gateway payment intents against draft enquiries and reconciles the
/// gateway's signed callbacks into local payment state.
pub struct PaymentService<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    verifier: WebhookVerifier,
    policy: MarketPolicy,
}

impl<S, G> PaymentService<S, G>
where
    S: EnquiryStore + PaymentStore,
    G: PaymentGateway,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        verifier: WebhookVerifier,
        policy: MarketPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            policy,
        }
    }

    /// Open a payment intent for one settlement phase of a draft enquiry.
    pub fn create_order(
        &self,
        caller: &Principal,
        enquiry_id: &EnquiryId,
        phase: PaymentPhase,
    ) -> Result<PaymentOrder, MarketError> {
        let customer = require_customer(caller)?;
        let enquiry = self
            .store
            .fetch_enquiry(enquiry_id)?
            .filter(|enquiry| enquiry.customer == customer.id)
            .ok_or_else(|| MarketError::NotFound("enquiry not found".to_string()))?;

        if enquiry.status != EnquiryStatus::Draft {
            return Err(MarketError::Conflict(format!(
                "payment can only be initiated for draft enquiries; this one is {}",
                enquiry.status.label()
            )));
        }

        let pending_for_phase = self
            .store
            .payments_for_enquiry(enquiry_id)?
            .iter()
            .any(|order| order.phase == phase && order.status == PaymentStatus::Pending);
        if pending_for_phase {
            return Err(MarketError::Conflict(format!(
                "a pending {} payment order already exists for this enquiry",
                phase.label()
            )));
        }

        let request = CreateOrderRequest {
            amount_minor: enquiry.inspection_budget_minor,
            currency: self.policy.currency.clone(),
            receipt: format!("receipt_{}_{}", enquiry.id.0, phase.label()),
        };
        let gateway_order = self.gateway.create_order(&request)?;

        let order = PaymentOrder {
            id: next_payment_id(),
            enquiry: enquiry.id.clone(),
            customer: customer.id.clone(),
            amount_minor: request.amount_minor,
            currency: request.currency.clone(),
            phase,
            status: PaymentStatus::Pending,
            gateway_order_id: gateway_order.order_id,
            gateway_payment_id: None,
            created_at: Utc::now(),
        };

        let stored = self.store.insert_payment(order).map_err(|err| match err {
            StoreError::Conflict => MarketError::Conflict(
                "a pending payment order was created concurrently for this phase".to_string(),
            ),
            other => other.into(),
        })?;
        info!(
            order = %stored.id.0,
            enquiry = %stored.enquiry.0,
            gateway_order = %stored.gateway_order_id,
            amount_minor = stored.amount_minor,
            "payment order opened"
        );
        Ok(stored)
    }

    /// Reconcile an inbound gateway callback into local payment state.
    ///
    /// Only the payment order is ever written here: a callback arriving
    /// after the customer cancelled the enquiry updates the order and
    /// nothing else.
    pub fn reconcile(
        &self,
        payload: &[u8],
        signature_hex: &str,
    ) -> Result<PaymentOrder, MarketError> {
        if let Err(err) = self.verifier.verify(payload, signature_hex) {
            warn!("gateway callback rejected: signature verification failed");
            return Err(err);
        }

        let notification: GatewayNotification = serde_json::from_slice(payload)
            .map_err(|err| MarketError::Validation(format!("malformed gateway notification: {err}")))?;

        let mut order = self
            .store
            .fetch_payment_by_gateway_order(&notification.order_id)?
            .ok_or_else(|| MarketError::NotFound("payment order not found".to_string()))?;

        order.status = match notification.state.as_str() {
            "captured" | "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            other => {
                warn!(state = other, order = %order.id.0, "ignoring unrecognized gateway state");
                order.status
            }
        };
        if let Some(payment_id) = notification.payment_id {
            order.gateway_payment_id = Some(payment_id);
        }

        self.store.update_payment(order.clone())?;
        info!(order = %order.id.0, status = order.status.label(), "payment order reconciled");
        Ok(order)
    }

    /// Whether the caller currently holds any paid settlement.
    pub fn has_paid_entitlement(&self, caller: &Principal) -> Result<bool, MarketError> {
        let customer = require_customer(caller)?;
        Ok(self
            .store
            .payments_for_customer(&customer.id)?
            .iter()
            .any(|order| order.status == PaymentStatus::Paid))
    }
}
