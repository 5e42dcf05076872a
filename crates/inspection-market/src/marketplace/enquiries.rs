use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{Enquiry, EnquiryDraft, EnquiryId, EnquiryStatus, PaymentPhase, PaymentStatus};
use super::error::MarketError;
use super::policy::MarketPolicy;
use super::principal::{require_customer, require_inspector, CustomerProfile, Principal,
    PrincipalDirectory};
use super::repository::{EnquiryStore, PaymentStore, StoreError};

static ENQUIRY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_enquiry_id() -> EnquiryId {
    let id = ENQUIRY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EnquiryId(format!("enq-{id:06}"))
}

/// Owns the enquiry state machine and the gating rules on each transition.
pub struct EnquiryService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    policy: MarketPolicy,
}

impl<S, D> EnquiryService<S, D>
where
    S: EnquiryStore + PaymentStore,
    D: PrincipalDirectory,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, policy: MarketPolicy) -> Self {
        Self {
            store,
            directory,
            policy,
        }
    }

    /// Create an enquiry in `draft`, freezing the platform fee.
    pub fn create(
        &self,
        caller: &Principal,
        draft: EnquiryDraft,
    ) -> Result<Enquiry, MarketError> {
        let customer = require_customer(caller)?;
        let enquiry = draft
            .into_enquiry(next_enquiry_id(), customer.id.clone(), Utc::now())
            .map_err(|rejection| MarketError::Validation(rejection.to_string()))?;
        let stored = self.store.insert_enquiry(enquiry)?;
        info!(enquiry = %stored.id.0, customer = %customer.id.0, "enquiry created in draft");
        Ok(stored)
    }

    /// Publish a draft enquiry to inspectors (`draft -> submitted`).
    ///
    /// `now` is the caller's wall clock; it is converted to the platform
    /// reference clock for the business-hour gate so the decision is
    /// testable at the window boundaries.
    pub fn submit(
        &self,
        caller: &Principal,
        enquiry_id: &EnquiryId,
        now: DateTime<Utc>,
    ) -> Result<Enquiry, MarketError> {
        let customer = require_customer(caller)?;
        let enquiry = self.owned_enquiry(customer, enquiry_id)?;

        if enquiry.status != EnquiryStatus::Draft {
            return Err(MarketError::Conflict(format!(
                "only draft enquiries can be submitted; this one is {}",
                enquiry.status.label()
            )));
        }
        if !enquiry.inspection_types.at_least_one() {
            return Err(MarketError::Validation(
                "at least one inspection type (physical or chemical) must be selected".to_string(),
            ));
        }

        // The eligibility flag may have changed since the session token was
        // issued, so the gate reads the directory, not the caller snapshot.
        let profile = self
            .directory
            .fetch_customer(&customer.id)?
            .ok_or_else(|| MarketError::NotFound("customer profile not found".to_string()))?;
        if profile.publish_requirements {
            let missing = profile.documents.missing();
            if !missing.is_empty() {
                return Err(MarketError::Validation(format!(
                    "upload the following before submitting: {}",
                    missing.join(" and ")
                )));
            }
        }

        if !self.policy.business_hours.contains(now) {
            return Err(MarketError::Conflict(format!(
                "enquiries can only be submitted between {} platform time; try again later",
                self.policy.business_hours.describe()
            )));
        }

        if self.policy.payment_gates_submission {
            let paid = self
                .store
                .payments_for_enquiry(enquiry_id)?
                .iter()
                .any(|order| {
                    order.phase == PaymentPhase::Initial && order.status == PaymentStatus::Paid
                });
            if !paid {
                return Err(MarketError::Conflict(
                    "initial payment must be completed before submission".to_string(),
                ));
            }
        }

        let updated = self
            .store
            .transition_enquiry(enquiry_id, &[EnquiryStatus::Draft], EnquiryStatus::Submitted)
            .map_err(|err| match err {
                StoreError::Conflict => MarketError::Conflict(
                    "enquiry changed state concurrently; refresh and retry".to_string(),
                ),
                other => other.into(),
            })?;
        info!(enquiry = %updated.id.0, "enquiry submitted");
        Ok(updated)
    }

    /// Abandon a draft or withdraw a live enquiry (`draft|submitted -> cancelled`).
    pub fn cancel(
        &self,
        caller: &Principal,
        enquiry_id: &EnquiryId,
    ) -> Result<Enquiry, MarketError> {
        let customer = require_customer(caller)?;
        let enquiry = self.owned_enquiry(customer, enquiry_id)?;
        if enquiry.status.is_terminal() {
            return Err(MarketError::Conflict(format!(
                "enquiry is already {}",
                enquiry.status.label()
            )));
        }

        let updated = self
            .store
            .transition_enquiry(
                enquiry_id,
                &[EnquiryStatus::Draft, EnquiryStatus::Submitted],
                EnquiryStatus::Cancelled,
            )
            .map_err(|err| match err {
                StoreError::Conflict => MarketError::Conflict(
                    "enquiry changed state concurrently; refresh and retry".to_string(),
                ),
                other => other.into(),
            })?;
        info!(enquiry = %updated.id.0, "enquiry cancelled");
        Ok(updated)
    }

    /// The caller's own enquiries, newest first.
    pub fn my_enquiries(&self, caller: &Principal) -> Result<Vec<Enquiry>, MarketError> {
        let customer = require_customer(caller)?;
        Ok(self.store.enquiries_for_customer(&customer.id)?)
    }

    /// Everything currently open for bidding, newest first.
    pub fn open_for_bidding(&self, caller: &Principal) -> Result<Vec<Enquiry>, MarketError> {
        require_inspector(caller)?;
        Ok(self.store.open_enquiries()?)
    }

    /// Fetch one of the caller's enquiries; absence and foreign ownership
    /// are indistinguishable to the caller.
    fn owned_enquiry(
        &self,
        customer: &CustomerProfile,
        enquiry_id: &EnquiryId,
    ) -> Result<Enquiry, MarketError> {
        self.store
            .fetch_enquiry(enquiry_id)?
            .filter(|enquiry| enquiry.customer == customer.id)
            .ok_or_else(|| MarketError::NotFound("enquiry not found".to_string()))
    }
}
