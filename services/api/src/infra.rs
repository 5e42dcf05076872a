use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use inspection_market::marketplace::memory::MemoryDirectory;
use inspection_market::marketplace::principal::{
    BillingDetails, CustomerDocuments, CustomerId, CustomerProfile, IdentityDocuments,
    InspectorId, InspectorProfile, Principal,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Seed a starter set of principals so the service is usable out of the box.
/// Sessions are the principal ids sent in the `x-auth-subject` header.
pub(crate) fn seed_principals(directory: &MemoryDirectory) {
    directory.insert(Principal::Customer(CustomerProfile {
        id: CustomerId("cust-demo".to_string()),
        name: "Demo Exports Ltd".to_string(),
        email: "desk@demo-exports.example".to_string(),
        publish_requirements: true,
        documents: CustomerDocuments {
            trade_license: Some("seed/trade-license.pdf".to_string()),
            import_export_certificate: Some("seed/iec.pdf".to_string()),
        },
    }));
    directory.insert(Principal::Customer(CustomerProfile {
        id: CustomerId("cust-new".to_string()),
        name: "New Trader".to_string(),
        email: "owner@new-trader.example".to_string(),
        publish_requirements: false,
        documents: CustomerDocuments::default(),
    }));
    directory.insert(Principal::Inspector(InspectorProfile {
        id: InspectorId("insp-demo".to_string()),
        name: "Demo Inspector".to_string(),
        email: "demo@inspectors.example".to_string(),
        accepts_requests: true,
        identity_documents: IdentityDocuments {
            aadhaar_card: Some("seed/aadhaar.pdf".to_string()),
        },
        billing_details: BillingDetails {
            account_number: Some("000123456789".to_string()),
            bank_name: Some("Demo Bank".to_string()),
            ifsc_code: Some("DEMO0000001".to_string()),
        },
    }));
    directory.insert(Principal::Inspector(InspectorProfile {
        id: InspectorId("insp-new".to_string()),
        name: "New Inspector".to_string(),
        email: "new@inspectors.example".to_string(),
        accepts_requests: false,
        identity_documents: IdentityDocuments::default(),
        billing_details: BillingDetails::default(),
    }));
}
