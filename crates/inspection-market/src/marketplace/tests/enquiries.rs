use super::common::*;

use crate::marketplace::domain::{
    ChemicalParameter, EnquiryStatus, InspectionTypes, PaymentPhase, PaymentStatus,
    MAX_BUDGET_MINOR,
};
use crate::marketplace::policy::MarketPolicy;
use crate::marketplace::repository::PaymentStore;
use crate::marketplace::MarketError;

#[test]
fn create_freezes_platform_fee_and_starts_in_draft() {
    let harness = harness();
    let caller = customer();

    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");

    assert_eq!(enquiry.status, EnquiryStatus::Draft);
    assert_eq!(enquiry.inspection_budget_minor, 100_000);
    assert_eq!(enquiry.platform_fee_minor, 30_000);
    assert_eq!(enquiry.inspector_net_budget_minor(), 70_000);
    assert!(enquiry.confirmed_bid.is_none());
}

#[test]
fn create_rejects_draft_with_no_inspection_type() {
    let harness = harness();
    let mut input = draft();
    input.inspection_types = InspectionTypes::default();

    let error = harness
        .market
        .enquiries
        .create(&customer(), input)
        .expect_err("no type");
    assert!(matches!(error, MarketError::Validation(_)));
}

#[test]
fn create_rejects_negative_budget() {
    let harness = harness();
    let mut input = draft();
    input.inspection_budget_minor = -1;

    let error = harness
        .market
        .enquiries
        .create(&customer(), input)
        .expect_err("negative budget");
    assert!(matches!(error, MarketError::Validation(_)));
}

#[test]
fn create_rejects_budget_above_the_limit() {
    let harness = harness();
    let mut input = draft();
    input.inspection_budget_minor = MAX_BUDGET_MINOR + 1;

    let error = harness
        .market
        .enquiries
        .create(&customer(), input)
        .expect_err("over limit");
    assert!(matches!(error, MarketError::Validation(_)));
}

#[test]
fn create_rejects_overlong_description() {
    let harness = harness();
    let mut input = draft();
    input.description = Some("x".repeat(2001));

    let error = harness
        .market
        .enquiries
        .create(&customer(), input)
        .expect_err("too long");
    assert!(matches!(error, MarketError::Validation(_)));
}

#[test]
fn create_requires_customer_role() {
    let harness = harness();
    let error = harness
        .market
        .enquiries
        .create(&inspector(), draft())
        .expect_err("wrong role");
    assert!(matches!(error, MarketError::Authorization(_)));
}

#[test]
fn create_drops_parameters_for_unselected_disciplines() {
    let harness = harness();
    let mut input = draft();
    input.inspection_types = InspectionTypes {
        physical: true,
        chemical: false,
    };
    input.chemical_parameters = vec![ChemicalParameter::HeavyMetalsTesting];

    let enquiry = harness
        .market
        .enquiries
        .create(&customer(), input)
        .expect("create");
    assert!(enquiry.chemical_parameters.is_empty());
    assert!(enquiry.physical_parameters.is_some());
}

#[test]
fn submit_moves_paid_draft_to_submitted() {
    let harness = harness();
    let caller = customer();
    let enquiry = submitted_enquiry(&harness, &caller);

    assert_eq!(enquiry.status, EnquiryStatus::Submitted);
    let payments = harness.store.payments_for_enquiry(&enquiry.id).expect("payments");
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].phase, PaymentPhase::Initial);
    assert_eq!(payments[0].status, PaymentStatus::Paid);
}

#[test]
fn submit_requires_initial_payment() {
    let harness = harness();
    let caller = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");

    let error = harness
        .market
        .enquiries
        .submit(&caller, &enquiry.id, in_window())
        .expect_err("unpaid");
    match error {
        MarketError::Conflict(message) => assert!(message.contains("initial payment")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn submit_skips_payment_gate_when_policy_disables_it() {
    let policy = MarketPolicy {
        payment_gates_submission: false,
        ..MarketPolicy::default()
    };
    let harness = harness_with_policy(policy);
    let caller = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");

    let submitted = harness
        .market
        .enquiries
        .submit(&caller, &enquiry.id, in_window())
        .expect("submit");
    assert_eq!(submitted.status, EnquiryStatus::Submitted);
}

#[test]
fn submit_outside_business_hours_is_rejected() {
    let harness = harness();
    let caller = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");
    pay_initial(&harness, &caller, &enquiry);

    let error = harness
        .market
        .enquiries
        .submit(&caller, &enquiry.id, out_of_window())
        .expect_err("closed");
    match error {
        MarketError::Conflict(message) => assert!(message.contains("09:00-23:00")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn submit_names_missing_documents_when_publishing_is_enabled() {
    let harness = harness();
    let caller = undocumented_publisher();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");

    let error = harness
        .market
        .enquiries
        .submit(&caller, &enquiry.id, in_window())
        .expect_err("docs missing");
    match error {
        MarketError::Validation(message) => {
            assert!(message.contains("trade license"));
            assert!(message.contains("import/export certificate"));
        }
        other => panic!("expected validation, got {other:?}"),
    }
}

#[test]
fn submit_skips_document_check_while_publishing_is_disabled() {
    let harness = harness();
    let caller = gated_customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");
    pay_initial(&harness, &caller, &enquiry);

    let submitted = harness
        .market
        .enquiries
        .submit(&caller, &enquiry.id, in_window())
        .expect("submit");
    assert_eq!(submitted.status, EnquiryStatus::Submitted);
}

#[test]
fn submit_succeeds_at_the_opening_minute() {
    let harness = harness();
    let caller = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");
    pay_initial(&harness, &caller, &enquiry);

    let submitted = harness
        .market
        .enquiries
        .submit(&caller, &enquiry.id, window_opening())
        .expect("submit");
    assert_eq!(submitted.status, EnquiryStatus::Submitted);
}

#[test]
fn submit_hides_foreign_enquiries() {
    let harness = harness();
    let owner = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&owner, draft())
        .expect("create");

    let error = harness
        .market
        .enquiries
        .submit(&gated_customer(), &enquiry.id, in_window())
        .expect_err("foreign");
    assert!(matches!(error, MarketError::NotFound(_)));
}

#[test]
fn submit_twice_conflicts() {
    let harness = harness();
    let caller = customer();
    let enquiry = submitted_enquiry(&harness, &caller);

    let error = harness
        .market
        .enquiries
        .submit(&caller, &enquiry.id, in_window())
        .expect_err("resubmit");
    assert!(matches!(error, MarketError::Conflict(_)));
}

#[test]
fn cancel_works_from_draft_and_submitted() {
    let harness = harness();
    let caller = customer();

    let draft_enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");
    let cancelled = harness
        .market
        .enquiries
        .cancel(&caller, &draft_enquiry.id)
        .expect("cancel draft");
    assert_eq!(cancelled.status, EnquiryStatus::Cancelled);

    let live = submitted_enquiry(&harness, &caller);
    let withdrawn = harness
        .market
        .enquiries
        .cancel(&caller, &live.id)
        .expect("cancel submitted");
    assert_eq!(withdrawn.status, EnquiryStatus::Cancelled);
}

#[test]
fn cancel_is_rejected_once_terminal() {
    let harness = harness();
    let caller = customer();
    let enquiry = harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("create");
    harness
        .market
        .enquiries
        .cancel(&caller, &enquiry.id)
        .expect("first cancel");

    let error = harness
        .market
        .enquiries
        .cancel(&caller, &enquiry.id)
        .expect_err("already cancelled");
    match error {
        MarketError::Conflict(message) => assert!(message.contains("cancelled")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn my_enquiries_returns_only_the_callers_rows() {
    let harness = harness();
    let owner = customer();
    let other = gated_customer();
    let mine = harness
        .market
        .enquiries
        .create(&owner, draft())
        .expect("mine");
    harness
        .market
        .enquiries
        .create(&other, draft())
        .expect("theirs");

    let rows = harness.market.enquiries.my_enquiries(&owner).expect("list");
    assert!(rows.iter().any(|row| row.id == mine.id));
    assert!(rows.iter().all(|row| row.customer.0 == "cust-01"));
}

#[test]
fn open_for_bidding_lists_only_submitted_enquiries() {
    let harness = harness();
    let caller = customer();
    harness
        .market
        .enquiries
        .create(&caller, draft())
        .expect("draft stays hidden");
    let live = submitted_enquiry(&harness, &caller);

    let rows = harness
        .market
        .enquiries
        .open_for_bidding(&inspector())
        .expect("open list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, live.id);
}

#[test]
fn open_for_bidding_requires_the_inspector_role() {
    let harness = harness();
    let error = harness
        .market
        .enquiries
        .open_for_bidding(&customer())
        .expect_err("wrong role");
    assert!(matches!(error, MarketError::Authorization(_)));
}
