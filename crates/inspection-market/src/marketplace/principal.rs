use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::MarketError;

/// Identifier wrapper for goods owners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Identifier wrapper for independent inspectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InspectorId(pub String);

/// Identifier wrapper for inspection companies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

/// The three role kinds the marketplace recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Inspector,
    InspectionCompany,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Inspector => "inspector",
            Role::InspectionCompany => "inspection company",
        }
    }
}

/// Opaque storage references for the customer's compliance documents.
///
/// The core never inspects file content; it only tests presence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDocuments {
    pub trade_license: Option<String>,
    pub import_export_certificate: Option<String>,
}

impl CustomerDocuments {
    pub fn complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !has_reference(&self.trade_license) {
            missing.push("trade license");
        }
        if !has_reference(&self.import_export_certificate) {
            missing.push("import/export certificate");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub publish_requirements: bool,
    pub documents: CustomerDocuments,
}

/// Identity document references required before an inspector may bid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDocuments {
    pub aadhaar_card: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub ifsc_code: Option<String>,
}

impl BillingDetails {
    pub fn complete(&self) -> bool {
        has_reference(&self.account_number)
            && has_reference(&self.bank_name)
            && has_reference(&self.ifsc_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectorProfile {
    pub id: InspectorId,
    pub name: String,
    pub email: String,
    pub accepts_requests: bool,
    pub identity_documents: IdentityDocuments,
    pub billing_details: BillingDetails,
}

impl InspectorProfile {
    /// Requirements still outstanding before the inspector may bid.
    pub fn compliance_missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !has_reference(&self.identity_documents.aadhaar_card) {
            missing.push("identity document");
        }
        if !self.billing_details.complete() {
            missing.push("full banking details");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: CompanyId,
    pub company_name: String,
    pub company_email: String,
    pub contact_person_name: String,
}

/// A resolved, authenticated caller.
///
/// Replaces the source system's string-role dispatch with a closed variant
/// set; every marketplace operation receives one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Principal {
    Customer(CustomerProfile),
    Inspector(InspectorProfile),
    Company(CompanyProfile),
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Customer(_) => Role::Customer,
            Principal::Inspector(_) => Role::Inspector,
            Principal::Company(_) => Role::InspectionCompany,
        }
    }

    pub fn subject_id(&self) -> &str {
        match self {
            Principal::Customer(profile) => &profile.id.0,
            Principal::Inspector(profile) => &profile.id.0,
            Principal::Company(profile) => &profile.id.0,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Principal::Customer(profile) => &profile.email,
            Principal::Inspector(profile) => &profile.email,
            Principal::Company(profile) => &profile.company_email,
        }
    }
}

/// Resolver over the registered principals.
pub trait PrincipalDirectory: Send + Sync {
    fn resolve_by_email(&self, email: &str) -> Result<Option<Principal>, DirectoryError>;
    fn resolve_by_id(&self, id: &str) -> Result<Option<Principal>, DirectoryError>;
    fn fetch_customer(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, DirectoryError>;
    fn fetch_inspector(&self, id: &InspectorId)
        -> Result<Option<InspectorProfile>, DirectoryError>;
    fn save_customer(&self, profile: CustomerProfile) -> Result<(), DirectoryError>;
    fn save_inspector(&self, profile: InspectorProfile) -> Result<(), DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("principal not found")]
    NotFound,
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

pub(crate) fn require_customer(principal: &Principal) -> Result<&CustomerProfile, MarketError> {
    match principal {
        Principal::Customer(profile) => Ok(profile),
        other => Err(MarketError::Authorization(format!(
            "operation requires the customer role, caller is {}",
            other.role().label()
        ))),
    }
}

pub(crate) fn require_inspector(principal: &Principal) -> Result<&InspectorProfile, MarketError> {
    match principal {
        Principal::Inspector(profile) => Ok(profile),
        other => Err(MarketError::Authorization(format!(
            "operation requires the inspector role, caller is {}",
            other.role().label()
        ))),
    }
}

/// Upload result references for the customer compliance documents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDocumentUpdate {
    pub trade_license: Option<String>,
    pub import_export_certificate: Option<String>,
}

impl CustomerDocumentUpdate {
    fn is_empty(&self) -> bool {
        !has_reference(&self.trade_license) && !has_reference(&self.import_export_certificate)
    }
}

/// Upload/detail references for the inspector compliance requirements.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectorComplianceUpdate {
    pub aadhaar_card: Option<String>,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub ifsc_code: Option<String>,
}

impl InspectorComplianceUpdate {
    fn is_empty(&self) -> bool {
        !has_reference(&self.aadhaar_card)
            && !has_reference(&self.account_number)
            && !has_reference(&self.bank_name)
            && !has_reference(&self.ifsc_code)
    }
}

/// Merges uploaded document references into profiles and flips the
/// eligibility flags once a profile becomes complete.
pub struct ProfileService<D> {
    directory: Arc<D>,
}

impl<D> ProfileService<D>
where
    D: PrincipalDirectory,
{
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    pub fn update_customer_documents(
        &self,
        caller: &Principal,
        update: CustomerDocumentUpdate,
    ) -> Result<CustomerProfile, MarketError> {
        let customer = require_customer(caller)?;
        if update.is_empty() {
            return Err(MarketError::Validation(
                "no document references supplied".to_string(),
            ));
        }

        let mut profile = self
            .directory
            .fetch_customer(&customer.id)?
            .ok_or_else(|| MarketError::NotFound("customer profile not found".to_string()))?;

        if has_reference(&update.trade_license) {
            profile.documents.trade_license = update.trade_license;
        }
        if has_reference(&update.import_export_certificate) {
            profile.documents.import_export_certificate = update.import_export_certificate;
        }
        if profile.documents.complete() {
            profile.publish_requirements = true;
        }

        self.directory.save_customer(profile.clone())?;
        tracing::info!(customer = %profile.id.0, publish_requirements = profile.publish_requirements, "customer documents updated");
        Ok(profile)
    }

    pub fn update_inspector_compliance(
        &self,
        caller: &Principal,
        update: InspectorComplianceUpdate,
    ) -> Result<InspectorProfile, MarketError> {
        let inspector = require_inspector(caller)?;
        if update.is_empty() {
            return Err(MarketError::Validation(
                "no compliance references supplied".to_string(),
            ));
        }

        let mut profile = self
            .directory
            .fetch_inspector(&inspector.id)?
            .ok_or_else(|| MarketError::NotFound("inspector profile not found".to_string()))?;

        if has_reference(&update.aadhaar_card) {
            profile.identity_documents.aadhaar_card = update.aadhaar_card;
        }
        if has_reference(&update.account_number) {
            profile.billing_details.account_number = update.account_number;
        }
        if has_reference(&update.bank_name) {
            profile.billing_details.bank_name = update.bank_name;
        }
        if has_reference(&update.ifsc_code) {
            profile.billing_details.ifsc_code = update.ifsc_code;
        }
        if profile.compliance_missing().is_empty() {
            profile.accepts_requests = true;
        }

        self.directory.save_inspector(profile.clone())?;
        tracing::info!(inspector = %profile.id.0, accepts_requests = profile.accepts_requests, "inspector compliance updated");
        Ok(profile)
    }
}

fn has_reference(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|reference| !reference.trim().is_empty())
        .unwrap_or(false)
}
