//! In-process reference implementations of the storage and gateway seams.
//!
//! One mutex covers every collection, so the `confirm_winner` transaction is
//! serialized against all concurrent writes by construction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Bid, BidId, BidStatus, Enquiry, EnquiryId, EnquiryStatus, PaymentOrder, PaymentOrderId,
    PaymentStatus,
};
use super::payments::{CreateOrderRequest, GatewayError, GatewayOrder, PaymentGateway};
use super::principal::{
    CustomerId, CustomerProfile, DirectoryError, InspectorId, InspectorProfile, Principal,
    PrincipalDirectory,
};
use super::repository::{
    BidStore, ConfirmationOutcome, ConfirmationStore, EnquiryStore, PaymentStore, StoreError,
};

#[derive(Default)]
struct MarketCollections {
    enquiries: HashMap<EnquiryId, Enquiry>,
    bids: HashMap<BidId, Bid>,
    payments: HashMap<PaymentOrderId, PaymentOrder>,
}

/// Mutex-backed market store.
#[derive(Default)]
pub struct InMemoryMarketStore {
    inner: Mutex<MarketCollections>,
}

impl InMemoryMarketStore {
    fn lock(&self) -> MutexGuard<'_, MarketCollections> {
        self.inner.lock().expect("market store mutex poisoned")
    }
}

fn newest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
    rows
}

impl EnquiryStore for InMemoryMarketStore {
    fn insert_enquiry(&self, enquiry: Enquiry) -> Result<Enquiry, StoreError> {
        let mut guard = self.lock();
        if guard.enquiries.contains_key(&enquiry.id) {
            return Err(StoreError::Conflict);
        }
        guard.enquiries.insert(enquiry.id.clone(), enquiry.clone());
        Ok(enquiry)
    }

    fn fetch_enquiry(&self, id: &EnquiryId) -> Result<Option<Enquiry>, StoreError> {
        Ok(self.lock().enquiries.get(id).cloned())
    }

    fn transition_enquiry(
        &self,
        id: &EnquiryId,
        expected: &[EnquiryStatus],
        next: EnquiryStatus,
    ) -> Result<Enquiry, StoreError> {
        let mut guard = self.lock();
        let enquiry = guard.enquiries.get_mut(id).ok_or(StoreError::NotFound)?;
        if !expected.contains(&enquiry.status) {
            return Err(StoreError::Conflict);
        }
        enquiry.status = next;
        Ok(enquiry.clone())
    }

    fn enquiries_for_customer(&self, customer: &CustomerId) -> Result<Vec<Enquiry>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .enquiries
            .values()
            .filter(|enquiry| &enquiry.customer == customer)
            .cloned()
            .collect();
        Ok(newest_first(rows, |enquiry| {
            (enquiry.created_at, enquiry.id.0.clone())
        }))
    }

    fn open_enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .enquiries
            .values()
            .filter(|enquiry| enquiry.status == EnquiryStatus::Submitted)
            .cloned()
            .collect();
        Ok(newest_first(rows, |enquiry| {
            (enquiry.created_at, enquiry.id.0.clone())
        }))
    }
}

impl BidStore for InMemoryMarketStore {
    fn upsert_bid(&self, candidate: Bid) -> Result<Bid, StoreError> {
        let mut guard = self.lock();
        let existing = guard
            .bids
            .values()
            .find(|bid| bid.enquiry == candidate.enquiry && bid.inspector == candidate.inspector)
            .map(|bid| bid.id.clone());

        match existing {
            None => {
                guard.bids.insert(candidate.id.clone(), candidate.clone());
                Ok(candidate)
            }
            Some(id) => {
                let row = guard.bids.get_mut(&id).ok_or(StoreError::NotFound)?;
                if row.status != BidStatus::Active {
                    return Err(StoreError::Conflict);
                }
                row.amount_minor = candidate.amount_minor;
                row.customer_view_minor = candidate.customer_view_minor;
                row.note = candidate.note;
                row.updated_at = candidate.updated_at;
                Ok(row.clone())
            }
        }
    }

    fn fetch_bid(&self, id: &BidId) -> Result<Option<Bid>, StoreError> {
        Ok(self.lock().bids.get(id).cloned())
    }

    fn transition_bid(
        &self,
        id: &BidId,
        expected: BidStatus,
        next: BidStatus,
    ) -> Result<Bid, StoreError> {
        let mut guard = self.lock();
        let bid = guard.bids.get_mut(id).ok_or(StoreError::NotFound)?;
        if bid.status != expected {
            return Err(StoreError::Conflict);
        }
        bid.status = next;
        Ok(bid.clone())
    }

    fn bids_for_enquiry(&self, enquiry: &EnquiryId) -> Result<Vec<Bid>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .bids
            .values()
            .filter(|bid| &bid.enquiry == enquiry)
            .cloned()
            .collect();
        Ok(newest_first(rows, |bid| (bid.created_at, bid.id.0.clone())))
    }

    fn bids_for_inspector(&self, inspector: &InspectorId) -> Result<Vec<Bid>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .bids
            .values()
            .filter(|bid| &bid.inspector == inspector)
            .cloned()
            .collect();
        Ok(newest_first(rows, |bid| (bid.created_at, bid.id.0.clone())))
    }

    fn active_bids(&self) -> Result<Vec<Bid>, StoreError> {
        let guard = self.lock();
        Ok(guard
            .bids
            .values()
            .filter(|bid| bid.status == BidStatus::Active)
            .cloned()
            .collect())
    }
}

impl ConfirmationStore for InMemoryMarketStore {
    fn confirm_winner(
        &self,
        enquiry: &EnquiryId,
        bid: &BidId,
    ) -> Result<ConfirmationOutcome, StoreError> {
        let mut guard = self.lock();

        // Re-validate both guards inside the lock; the caller's earlier
        // reads may be stale by the time it gets here.
        match guard.bids.get(bid) {
            None => return Err(StoreError::NotFound),
            Some(row) if row.status != BidStatus::Active || &row.enquiry != enquiry => {
                return Err(StoreError::Conflict)
            }
            Some(_) => {}
        }
        match guard.enquiries.get(enquiry) {
            None => return Err(StoreError::NotFound),
            Some(row) if row.status != EnquiryStatus::Submitted => {
                return Err(StoreError::Conflict)
            }
            Some(_) => {}
        }

        let mut lost_bids = Vec::new();
        for row in guard.bids.values_mut() {
            if &row.enquiry != enquiry {
                continue;
            }
            if row.id == *bid {
                row.status = BidStatus::Won;
            } else if row.status == BidStatus::Active {
                row.status = BidStatus::Lost;
                lost_bids.push(row.clone());
            }
        }

        let winning_bid = guard
            .bids
            .get(bid)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        let record = guard.enquiries.get_mut(enquiry).ok_or(StoreError::NotFound)?;
        record.status = EnquiryStatus::Completed;
        record.confirmed_bid = Some(bid.clone());
        let enquiry = record.clone();

        Ok(ConfirmationOutcome {
            enquiry,
            winning_bid,
            lost_bids,
        })
    }
}

impl PaymentStore for InMemoryMarketStore {
    fn insert_payment(&self, order: PaymentOrder) -> Result<PaymentOrder, StoreError> {
        let mut guard = self.lock();
        if guard.payments.contains_key(&order.id) {
            return Err(StoreError::Conflict);
        }
        let pending_for_phase = guard.payments.values().any(|row| {
            row.enquiry == order.enquiry
                && row.phase == order.phase
                && row.status == PaymentStatus::Pending
        });
        if pending_for_phase {
            return Err(StoreError::Conflict);
        }
        guard.payments.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    fn fetch_payment(&self, id: &PaymentOrderId) -> Result<Option<PaymentOrder>, StoreError> {
        Ok(self.lock().payments.get(id).cloned())
    }

    fn fetch_payment_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentOrder>, StoreError> {
        let guard = self.lock();
        Ok(guard
            .payments
            .values()
            .find(|row| row.gateway_order_id == gateway_order_id)
            .cloned())
    }

    fn update_payment(&self, order: PaymentOrder) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if !guard.payments.contains_key(&order.id) {
            return Err(StoreError::NotFound);
        }
        guard.payments.insert(order.id.clone(), order);
        Ok(())
    }

    fn payments_for_enquiry(&self, enquiry: &EnquiryId) -> Result<Vec<PaymentOrder>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .payments
            .values()
            .filter(|row| &row.enquiry == enquiry)
            .cloned()
            .collect();
        Ok(newest_first(rows, |row| (row.created_at, row.id.0.clone())))
    }

    fn payments_for_customer(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<PaymentOrder>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .payments
            .values()
            .filter(|row| &row.customer == customer)
            .cloned()
            .collect();
        Ok(newest_first(rows, |row| (row.created_at, row.id.0.clone())))
    }
}

/// Mutex-backed principal directory keyed by subject id.
#[derive(Default)]
pub struct MemoryDirectory {
    principals: Mutex<HashMap<String, Principal>>,
}

impl MemoryDirectory {
    pub fn insert(&self, principal: Principal) {
        let mut guard = self.principals.lock().expect("directory mutex poisoned");
        guard.insert(principal.subject_id().to_string(), principal);
    }
}

impl PrincipalDirectory for MemoryDirectory {
    fn resolve_by_email(&self, email: &str) -> Result<Option<Principal>, DirectoryError> {
        let guard = self.principals.lock().expect("directory mutex poisoned");
        Ok(guard
            .values()
            .find(|principal| principal.email().eq_ignore_ascii_case(email))
            .cloned())
    }

    fn resolve_by_id(&self, id: &str) -> Result<Option<Principal>, DirectoryError> {
        let guard = self.principals.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_customer(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, DirectoryError> {
        match self.resolve_by_id(&id.0)? {
            Some(Principal::Customer(profile)) => Ok(Some(profile)),
            _ => Ok(None),
        }
    }

    fn fetch_inspector(
        &self,
        id: &InspectorId,
    ) -> Result<Option<InspectorProfile>, DirectoryError> {
        match self.resolve_by_id(&id.0)? {
            Some(Principal::Inspector(profile)) => Ok(Some(profile)),
            _ => Ok(None),
        }
    }

    fn save_customer(&self, profile: CustomerProfile) -> Result<(), DirectoryError> {
        self.insert(Principal::Customer(profile));
        Ok(())
    }

    fn save_inspector(&self, profile: InspectorProfile) -> Result<(), DirectoryError> {
        self.insert(Principal::Inspector(profile));
        Ok(())
    }
}

/// Gateway double that hands out sequential order ids and records every
/// request so callers can assert what crossed the boundary.
#[derive(Default)]
pub struct RecordingGateway {
    sequence: AtomicU64,
    requests: Arc<Mutex<Vec<CreateOrderRequest>>>,
}

impl RecordingGateway {
    pub fn requests(&self) -> Vec<CreateOrderRequest> {
        self.requests.lock().expect("gateway mutex poisoned").clone()
    }
}

impl PaymentGateway for RecordingGateway {
    fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.requests
            .lock()
            .expect("gateway mutex poisoned")
            .push(request.clone());
        Ok(GatewayOrder {
            order_id: format!("order_{sequence:06}"),
        })
    }
}
