use std::sync::Arc;

use tracing::info;

use super::domain::{BidId, BidStatus, EnquiryStatus};
use super::error::MarketError;
use super::principal::{require_customer, Principal};
use super::repository::{
    BidStore, ConfirmationOutcome, ConfirmationStore, EnquiryStore, StoreError,
};

/// The cross-entity winner-resolution operation.
///
/// Preconditions are checked optimistically here; the store transaction
/// re-validates them under its serialization guard, so a race between two
/// confirmation attempts (or a confirmation and a late bid state change)
/// resolves to exactly one winner and a `Conflict` for everyone else.
pub struct ConfirmationService<S> {
    store: Arc<S>,
}

impl<S> ConfirmationService<S>
where
    S: EnquiryStore + BidStore + ConfirmationStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn confirm(
        &self,
        caller: &Principal,
        bid_id: &BidId,
    ) -> Result<ConfirmationOutcome, MarketError> {
        let customer = require_customer(caller)?;

        let bid = self
            .store
            .fetch_bid(bid_id)?
            .ok_or_else(|| MarketError::NotFound("bid not found".to_string()))?;
        let enquiry = self
            .store
            .fetch_enquiry(&bid.enquiry)?
            .filter(|enquiry| enquiry.customer == customer.id)
            .ok_or_else(|| MarketError::NotFound("bid not found".to_string()))?;

        if bid.status != BidStatus::Active {
            return Err(MarketError::Conflict(format!(
                "only active bids can be confirmed; this one is {}",
                bid.status.label()
            )));
        }
        if enquiry.status != EnquiryStatus::Submitted {
            return Err(MarketError::Conflict(format!(
                "enquiry is no longer open for confirmation; it is {}",
                enquiry.status.label()
            )));
        }

        let outcome = self
            .store
            .confirm_winner(&enquiry.id, &bid.id)
            .map_err(|err| match err {
                StoreError::Conflict => MarketError::Conflict(
                    "enquiry was confirmed or changed concurrently".to_string(),
                ),
                other => other.into(),
            })?;

        info!(
            enquiry = %outcome.enquiry.id.0,
            winning_bid = %outcome.winning_bid.id.0,
            lost = outcome.lost_bids.len(),
            "bid confirmed, enquiry completed"
        );
        Ok(outcome)
    }
}
