use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Bid, BidId, BidStatus, CustomerBidView, EnquiryId, EnquiryStatus, MAX_NOTE_LEN,
};
use super::error::MarketError;
use super::fees;
use super::principal::{require_customer, require_inspector, Principal, PrincipalDirectory};
use super::repository::{BidStore, EnquiryStore, StoreError};

static BID_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_bid_id() -> BidId {
    let id = BID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BidId(format!("bid-{id:06}"))
}

/// Inspector-supplied payload when placing or replacing a bid.
#[derive(Debug, Clone, Deserialize)]
pub struct BidRequest {
    pub amount_minor: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Bids on one enquiry as shown to the owning customer.
#[derive(Debug, Clone, Serialize)]
pub struct EnquiryBidsView {
    pub bids: Vec<CustomerBidView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BidStats>,
}

/// Spread statistics over the customer-facing amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidStats {
    pub lowest_minor: i64,
    pub highest_minor: i64,
    pub average_minor: i64,
    pub total: usize,
}

/// One row of the lowest-bid market overview.
#[derive(Debug, Clone, Serialize)]
pub struct LowestBidEntry {
    pub enquiry_id: EnquiryId,
    pub summary: String,
    pub inspection_location: String,
    pub country: String,
    pub lowest_amount_minor: i64,
    pub active_bids: usize,
}

/// Owns the bid state machine, the per-inspector uniqueness rule, and the
/// customer- and market-facing bid reads.
pub struct BidService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
}

impl<S, D> BidService<S, D>
where
    S: EnquiryStore + BidStore,
    D: PrincipalDirectory,
{
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self { store, directory }
    }

    /// Place a bid, or replace the caller's existing active bid in place.
    pub fn place(
        &self,
        caller: &Principal,
        enquiry_id: &EnquiryId,
        request: BidRequest,
    ) -> Result<Bid, MarketError> {
        let inspector = require_inspector(caller)?;

        let profile = self
            .directory
            .fetch_inspector(&inspector.id)?
            .ok_or_else(|| MarketError::NotFound("inspector profile not found".to_string()))?;
        if profile.accepts_requests {
            let missing = profile.compliance_missing();
            if !missing.is_empty() {
                return Err(MarketError::Validation(format!(
                    "complete your profile before bidding: missing {}",
                    missing.join(", ")
                )));
            }
        }

        if request.amount_minor < 0 {
            return Err(MarketError::Validation(
                "bid amount must be non-negative".to_string(),
            ));
        }
        if let Some(note) = &request.note {
            if note.chars().count() > MAX_NOTE_LEN {
                return Err(MarketError::Validation(format!(
                    "note exceeds the {MAX_NOTE_LEN} character limit"
                )));
            }
        }

        let enquiry = self
            .store
            .fetch_enquiry(enquiry_id)?
            .ok_or_else(|| MarketError::NotFound("enquiry not found".to_string()))?;
        if enquiry.status != EnquiryStatus::Submitted {
            return Err(MarketError::Conflict(
                "enquiry is not open for bidding".to_string(),
            ));
        }

        let now = Utc::now();
        let candidate = Bid {
            id: next_bid_id(),
            enquiry: enquiry.id.clone(),
            inspector: profile.id.clone(),
            amount_minor: request.amount_minor,
            customer_view_minor: fees::customer_view(
                request.amount_minor,
                enquiry.platform_fee_minor,
            ),
            note: request.note,
            status: BidStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.upsert_bid(candidate).map_err(|err| match err {
            StoreError::Conflict => MarketError::Conflict(
                "your previous bid on this enquiry is no longer active and cannot be replaced"
                    .to_string(),
            ),
            other => other.into(),
        })?;
        info!(bid = %stored.id.0, enquiry = %enquiry.id.0, inspector = %profile.id.0, "bid placed");
        Ok(stored)
    }

    /// Withdraw the caller's active bid; terminal for that bid.
    pub fn withdraw(&self, caller: &Principal, bid_id: &BidId) -> Result<Bid, MarketError> {
        let inspector = require_inspector(caller)?;
        let bid = self
            .store
            .fetch_bid(bid_id)?
            .filter(|bid| bid.inspector == inspector.id)
            .ok_or_else(|| MarketError::NotFound("bid not found".to_string()))?;
        if bid.status != BidStatus::Active {
            return Err(MarketError::Conflict(format!(
                "only active bids can be withdrawn; this one is {}",
                bid.status.label()
            )));
        }

        let updated = self
            .store
            .transition_bid(&bid.id, BidStatus::Active, BidStatus::Withdrawn)
            .map_err(|err| match err {
                StoreError::Conflict => MarketError::Conflict(
                    "bid changed state concurrently; refresh and retry".to_string(),
                ),
                other => other.into(),
            })?;
        info!(bid = %updated.id.0, "bid withdrawn");
        Ok(updated)
    }

    /// The caller's bids, newest first.
    pub fn my_bids(&self, caller: &Principal) -> Result<Vec<Bid>, MarketError> {
        let inspector = require_inspector(caller)?;
        Ok(self.store.bids_for_inspector(&inspector.id)?)
    }

    /// Live and winning bids on one of the caller's enquiries, with spread
    /// statistics over the customer-facing amounts.
    pub fn bids_for_enquiry(
        &self,
        caller: &Principal,
        enquiry_id: &EnquiryId,
    ) -> Result<EnquiryBidsView, MarketError> {
        let customer = require_customer(caller)?;
        let enquiry = self
            .store
            .fetch_enquiry(enquiry_id)?
            .filter(|enquiry| enquiry.customer == customer.id)
            .ok_or_else(|| MarketError::NotFound("enquiry not found".to_string()))?;

        let visible: Vec<Bid> = self
            .store
            .bids_for_enquiry(&enquiry.id)?
            .into_iter()
            .filter(|bid| matches!(bid.status, BidStatus::Active | BidStatus::Won))
            .collect();

        let stats = bid_stats(&visible);
        Ok(EnquiryBidsView {
            bids: visible.iter().map(Bid::customer_view).collect(),
            stats,
        })
    }

    /// Market overview: for every enquiry with at least one active bid, the
    /// minimum ask, the active count, and identifying metadata, ascending by
    /// minimum ask. Read-only; no role restriction.
    pub fn lowest_bids(&self) -> Result<Vec<LowestBidEntry>, MarketError> {
        let mut per_enquiry: HashMap<EnquiryId, (i64, usize)> = HashMap::new();
        for bid in self.store.active_bids()? {
            per_enquiry
                .entry(bid.enquiry.clone())
                .and_modify(|(lowest, count)| {
                    *lowest = (*lowest).min(bid.amount_minor);
                    *count += 1;
                })
                .or_insert((bid.amount_minor, 1));
        }

        let mut entries = Vec::with_capacity(per_enquiry.len());
        for (enquiry_id, (lowest_amount_minor, active_bids)) in per_enquiry {
            let Some(enquiry) = self.store.fetch_enquiry(&enquiry_id)? else {
                continue;
            };
            entries.push(LowestBidEntry {
                summary: enquiry.summary(),
                inspection_location: enquiry.inspection_location,
                country: enquiry.country,
                enquiry_id,
                lowest_amount_minor,
                active_bids,
            });
        }
        entries.sort_by(|lhs, rhs| {
            lhs.lowest_amount_minor
                .cmp(&rhs.lowest_amount_minor)
                .then_with(|| lhs.enquiry_id.0.cmp(&rhs.enquiry_id.0))
        });
        Ok(entries)
    }
}

fn bid_stats(bids: &[Bid]) -> Option<BidStats> {
    let (first, rest) = bids.split_first()?;
    let mut lowest = first.customer_view_minor;
    let mut highest = first.customer_view_minor;
    let mut sum = first.customer_view_minor;
    for bid in rest {
        lowest = lowest.min(bid.customer_view_minor);
        highest = highest.max(bid.customer_view_minor);
        sum += bid.customer_view_minor;
    }
    Some(BidStats {
        lowest_minor: lowest,
        highest_minor: highest,
        average_minor: sum / bids.len() as i64,
        total: bids.len(),
    })
}
