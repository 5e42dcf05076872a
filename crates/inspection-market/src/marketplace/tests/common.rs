use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::marketplace::domain::{
    Enquiry, EnquiryDraft, InspectionTypes, PaymentPhase, PhysicalParameters, UrgencyLevel,
};
use crate::marketplace::memory::{InMemoryMarketStore, MemoryDirectory, RecordingGateway};
use crate::marketplace::payments::{
    CreateOrderRequest, GatewayError, GatewayOrder, PaymentGateway, WebhookVerifier,
};
use crate::marketplace::policy::MarketPolicy;
use crate::marketplace::principal::{
    BillingDetails, CompanyId, CompanyProfile, CustomerDocuments, CustomerId, CustomerProfile,
    IdentityDocuments, InspectorId, InspectorProfile, Principal,
};
use crate::marketplace::Marketplace;

pub(super) const WEBHOOK_SECRET: &[u8] = b"test-webhook-secret";

pub(super) type TestMarket = Marketplace<InMemoryMarketStore, MemoryDirectory, RecordingGateway>;

pub(super) struct Harness {
    pub market: Arc<TestMarket>,
    pub store: Arc<InMemoryMarketStore>,
    pub directory: Arc<MemoryDirectory>,
    pub gateway: Arc<RecordingGateway>,
}

pub(super) fn harness() -> Harness {
    harness_with_policy(MarketPolicy::default())
}

pub(super) fn harness_with_policy(policy: MarketPolicy) -> Harness {
    let store = Arc::new(InMemoryMarketStore::default());
    let directory = Arc::new(MemoryDirectory::default());
    let gateway = Arc::new(RecordingGateway::default());
    directory.insert(customer());
    directory.insert(gated_customer());
    directory.insert(undocumented_publisher());
    directory.insert(inspector());
    directory.insert(second_inspector());
    directory.insert(gated_inspector());
    directory.insert(uncompliant_bidder());
    directory.insert(company());
    let market = Arc::new(Marketplace::new(
        Arc::clone(&store),
        Arc::clone(&directory),
        Arc::clone(&gateway),
        policy,
        WEBHOOK_SECRET,
    ));
    Harness {
        market,
        store,
        directory,
        gateway,
    }
}

pub(super) fn customer() -> Principal {
    Principal::Customer(CustomerProfile {
        id: CustomerId("cust-01".to_string()),
        name: "Meera Traders".to_string(),
        email: "meera@traders.example".to_string(),
        publish_requirements: true,
        documents: CustomerDocuments {
            trade_license: Some("docs/trade-license.pdf".to_string()),
            import_export_certificate: Some("docs/iec.pdf".to_string()),
        },
    })
}

pub(super) fn gated_customer() -> Principal {
    Principal::Customer(CustomerProfile {
        id: CustomerId("cust-02".to_string()),
        name: "Fresh Grains Co".to_string(),
        email: "ops@freshgrains.example".to_string(),
        publish_requirements: false,
        documents: CustomerDocuments::default(),
    })
}

/// Publishing enabled, but neither compliance document on file.
pub(super) fn undocumented_publisher() -> Principal {
    Principal::Customer(CustomerProfile {
        id: CustomerId("cust-03".to_string()),
        name: "Harvest Exports".to_string(),
        email: "desk@harvest.example".to_string(),
        publish_requirements: true,
        documents: CustomerDocuments::default(),
    })
}

pub(super) fn inspector() -> Principal {
    Principal::Inspector(InspectorProfile {
        id: InspectorId("insp-01".to_string()),
        name: "Arun Qureshi".to_string(),
        email: "arun@inspect.example".to_string(),
        accepts_requests: true,
        identity_documents: IdentityDocuments {
            aadhaar_card: Some("docs/aadhaar-01.pdf".to_string()),
        },
        billing_details: BillingDetails {
            account_number: Some("000111222333".to_string()),
            bank_name: Some("State Bank".to_string()),
            ifsc_code: Some("SBIN0001234".to_string()),
        },
    })
}

pub(super) fn second_inspector() -> Principal {
    Principal::Inspector(InspectorProfile {
        id: InspectorId("insp-02".to_string()),
        name: "Divya Rao".to_string(),
        email: "divya@inspect.example".to_string(),
        accepts_requests: true,
        identity_documents: IdentityDocuments {
            aadhaar_card: Some("docs/aadhaar-02.pdf".to_string()),
        },
        billing_details: BillingDetails {
            account_number: Some("444555666777".to_string()),
            bank_name: Some("Canara Bank".to_string()),
            ifsc_code: Some("CNRB0005678".to_string()),
        },
    })
}

pub(super) fn gated_inspector() -> Principal {
    Principal::Inspector(InspectorProfile {
        id: InspectorId("insp-03".to_string()),
        name: "Noor Shaikh".to_string(),
        email: "noor@inspect.example".to_string(),
        accepts_requests: false,
        identity_documents: IdentityDocuments::default(),
        billing_details: BillingDetails::default(),
    })
}

/// Accepts requests, but with the compliance profile still incomplete.
pub(super) fn uncompliant_bidder() -> Principal {
    Principal::Inspector(InspectorProfile {
        id: InspectorId("insp-04".to_string()),
        name: "Pravin Joshi".to_string(),
        email: "pravin@inspect.example".to_string(),
        accepts_requests: true,
        identity_documents: IdentityDocuments::default(),
        billing_details: BillingDetails::default(),
    })
}

pub(super) fn company() -> Principal {
    Principal::Company(CompanyProfile {
        id: CompanyId("comp-01".to_string()),
        company_name: "Veritas Inspections Pvt Ltd".to_string(),
        company_email: "hello@veritas.example".to_string(),
        contact_person_name: "S. Banerjee".to_string(),
    })
}

/// A valid draft with a 100_000 minor-unit budget (30_000 platform fee).
pub(super) fn draft() -> EnquiryDraft {
    EnquiryDraft {
        commodity_category: "Rice".to_string(),
        sub_commodity: "Basmati".to_string(),
        volume: "200 MT".to_string(),
        inspection_location: "Kandla Port".to_string(),
        country: "India".to_string(),
        urgency_level: UrgencyLevel::Medium,
        inspection_types: InspectionTypes {
            physical: true,
            chemical: false,
        },
        physical_parameters: Some(PhysicalParameters {
            broken: Some(5.0),
            purity: Some(95.0),
            damaged_kernels: Some(2.0),
            average_grain_length: Some(7.1),
            milling_degree: Some("well milled".to_string()),
        }),
        chemical_parameters: Vec::new(),
        inspection_budget_minor: 100_000,
        special_requirements: None,
        description: Some("Pre-shipment inspection".to_string()),
    }
}

/// 12:00 in the +05:30 reference zone, well inside the 09:00-23:00 window.
pub(super) fn in_window() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 6, 30, 0).single().unwrap()
}

/// Exactly 09:00 in the +05:30 reference zone, the opening minute.
pub(super) fn window_opening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 3, 30, 0).single().unwrap()
}

/// 03:30 in the +05:30 reference zone, outside the window.
pub(super) fn out_of_window() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 9, 22, 0, 0).single().unwrap()
}

pub(super) fn sign_payload(payload: &[u8]) -> String {
    WebhookVerifier::new(WEBHOOK_SECRET).sign(payload)
}

/// Drive an order through the gateway round trip until it is `paid`.
pub(super) fn pay_initial(harness: &Harness, caller: &Principal, enquiry: &Enquiry) {
    let order = harness
        .market
        .payments
        .create_order(caller, &enquiry.id, PaymentPhase::Initial)
        .expect("payment order");
    let payload = serde_json::json!({
        "order_id": order.gateway_order_id,
        "payment_id": format!("gw_{}", order.id.0),
        "state": "captured",
    });
    let body = serde_json::to_vec(&payload).expect("payload");
    harness
        .market
        .payments
        .reconcile(&body, &sign_payload(&body))
        .expect("reconcile");
}

/// Create, pay, and submit an enquiry owned by `caller`.
pub(super) fn submitted_enquiry(harness: &Harness, caller: &Principal) -> Enquiry {
    let enquiry = harness
        .market
        .enquiries
        .create(caller, draft())
        .expect("create enquiry");
    pay_initial(harness, caller, &enquiry);
    harness
        .market
        .enquiries
        .submit(caller, &enquiry.id, in_window())
        .expect("submit enquiry")
}

/// Gateway double whose orders always fail to open.
pub(super) struct FailingGateway;

impl PaymentGateway for FailingGateway {
    fn create_order(&self, _request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        Err(GatewayError::Unreachable("connection refused".to_string()))
    }
}
