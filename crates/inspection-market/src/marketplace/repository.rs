use super::domain::{
    Bid, BidId, BidStatus, Enquiry, EnquiryId, EnquiryStatus, PaymentOrder, PaymentOrderId,
};
use super::principal::{CustomerId, InspectorId};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conditional write guard rejected the update")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Enquiry persistence. All writes are single-document; `transition_enquiry`
/// carries an expected-status guard and fails with [`StoreError::Conflict`]
/// when the stored status is not among the expected set.
pub trait EnquiryStore: Send + Sync {
    fn insert_enquiry(&self, enquiry: Enquiry) -> Result<Enquiry, StoreError>;
    fn fetch_enquiry(&self, id: &EnquiryId) -> Result<Option<Enquiry>, StoreError>;
    fn transition_enquiry(
        &self,
        id: &EnquiryId,
        expected: &[EnquiryStatus],
        next: EnquiryStatus,
    ) -> Result<Enquiry, StoreError>;
    /// Customer's enquiries, newest first.
    fn enquiries_for_customer(&self, customer: &CustomerId) -> Result<Vec<Enquiry>, StoreError>;
    /// All `submitted` enquiries, newest first.
    fn open_enquiries(&self) -> Result<Vec<Enquiry>, StoreError>;
}

/// Bid persistence. `upsert_bid` owns the composite `(enquiry, inspector)`
/// uniqueness invariant: concurrent upserts from the same inspector must
/// never create a duplicate row. When a row already exists it is replaced in
/// place while `active` (preserving its id) and rejected with
/// [`StoreError::Conflict`] otherwise.
pub trait BidStore: Send + Sync {
    fn upsert_bid(&self, candidate: Bid) -> Result<Bid, StoreError>;
    fn fetch_bid(&self, id: &BidId) -> Result<Option<Bid>, StoreError>;
    fn transition_bid(
        &self,
        id: &BidId,
        expected: BidStatus,
        next: BidStatus,
    ) -> Result<Bid, StoreError>;
    fn bids_for_enquiry(&self, enquiry: &EnquiryId) -> Result<Vec<Bid>, StoreError>;
    /// Inspector's bids, newest first.
    fn bids_for_inspector(&self, inspector: &InspectorId) -> Result<Vec<Bid>, StoreError>;
    fn active_bids(&self) -> Result<Vec<Bid>, StoreError>;
}

/// Result of the winner-resolution transaction.
#[derive(Debug, Clone)]
pub struct ConfirmationOutcome {
    pub enquiry: Enquiry,
    pub winning_bid: Bid,
    pub lost_bids: Vec<Bid>,
}

/// The one multi-entity transaction in the system.
///
/// Implementations must apply all three effects under a single serialization
/// guard, re-validating that the bid is still `active` and the enquiry still
/// `submitted` inside the guard: target bid to `won`, every other `active`
/// bid on the enquiry to `lost`, enquiry to `completed` with `confirmed_bid`
/// set. A loser of the race observes [`StoreError::Conflict`]; partial
/// visibility of the three writes must be impossible.
pub trait ConfirmationStore: Send + Sync {
    fn confirm_winner(
        &self,
        enquiry: &EnquiryId,
        bid: &BidId,
    ) -> Result<ConfirmationOutcome, StoreError>;
}

/// Payment order persistence. `insert_payment` enforces at most one
/// `pending` order per `(enquiry, phase)`.
pub trait PaymentStore: Send + Sync {
    fn insert_payment(&self, order: PaymentOrder) -> Result<PaymentOrder, StoreError>;
    fn fetch_payment(&self, id: &PaymentOrderId) -> Result<Option<PaymentOrder>, StoreError>;
    fn fetch_payment_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentOrder>, StoreError>;
    fn update_payment(&self, order: PaymentOrder) -> Result<(), StoreError>;
    fn payments_for_enquiry(&self, enquiry: &EnquiryId) -> Result<Vec<PaymentOrder>, StoreError>;
    fn payments_for_customer(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<PaymentOrder>, StoreError>;
}

/// Convenience bound for a store backing the whole marketplace.
pub trait MarketStore: EnquiryStore + BidStore + ConfirmationStore + PaymentStore {}

impl<T> MarketStore for T where T: EnquiryStore + BidStore + ConfirmationStore + PaymentStore {}
