use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fees;
use super::principal::{CustomerId, InspectorId};

pub const MAX_DESCRIPTION_LEN: usize = 2000;
/// Upper bound on a gross budget, in minor units. Keeps the fee
/// multiplication well inside `i64`.
pub const MAX_BUDGET_MINOR: i64 = 1_000_000_000_000;
pub const MAX_SPECIAL_REQUIREMENTS_LEN: usize = 1000;
pub const MAX_NOTE_LEN: usize = 1000;

/// Identifier wrapper for inspection enquiries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnquiryId(pub String);

/// Identifier wrapper for bids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidId(pub String);

/// Identifier wrapper for payment orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentOrderId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Highest,
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        UrgencyLevel::Medium
    }
}

/// Which inspection disciplines the customer requests. At least one must be
/// selected before the enquiry can exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionTypes {
    #[serde(default)]
    pub physical: bool,
    #[serde(default)]
    pub chemical: bool,
}

impl InspectionTypes {
    pub fn at_least_one(&self) -> bool {
        self.physical || self.chemical
    }
}

/// Physical grading thresholds attached to a physical inspection request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    pub broken: Option<f32>,
    pub purity: Option<f32>,
    pub damaged_kernels: Option<f32>,
    pub average_grain_length: Option<f32>,
    pub milling_degree: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChemicalParameter {
    PesticideResidueAnalysis,
    HeavyMetalsTesting,
    NutritionalContentAnalysis,
    MicrobiologicalTesting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnquiryStatus {
    Draft,
    Submitted,
    Cancelled,
    Completed,
}

impl EnquiryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnquiryStatus::Draft => "draft",
            EnquiryStatus::Submitted => "submitted",
            EnquiryStatus::Cancelled => "cancelled",
            EnquiryStatus::Completed => "completed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, EnquiryStatus::Cancelled | EnquiryStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Active,
    Withdrawn,
    Won,
    Lost,
}

impl BidStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BidStatus::Active => "active",
            BidStatus::Withdrawn => "withdrawn",
            BidStatus::Won => "won",
            BidStatus::Lost => "lost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPhase {
    Initial,
    Mid,
    Final,
}

impl Default for PaymentPhase {
    fn default() -> Self {
        PaymentPhase::Initial
    }
}

impl PaymentPhase {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentPhase::Initial => "initial",
            PaymentPhase::Mid => "mid",
            PaymentPhase::Final => "final",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Customer-supplied payload for a new enquiry.
#[derive(Debug, Clone, Deserialize)]
pub struct EnquiryDraft {
    pub commodity_category: String,
    pub sub_commodity: String,
    pub volume: String,
    pub inspection_location: String,
    pub country: String,
    #[serde(default)]
    pub urgency_level: UrgencyLevel,
    pub inspection_types: InspectionTypes,
    #[serde(default)]
    pub physical_parameters: Option<PhysicalParameters>,
    #[serde(default)]
    pub chemical_parameters: Vec<ChemicalParameter>,
    pub inspection_budget_minor: i64,
    #[serde(default)]
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DraftRejection {
    #[error("at least one inspection type (physical or chemical) must be selected")]
    NoInspectionType,
    #[error("inspection budget must be non-negative")]
    NegativeBudget,
    #[error("inspection budget exceeds the {MAX_BUDGET_MINOR} minor-unit limit")]
    BudgetTooLarge,
    #[error("{field} exceeds the {max} character limit")]
    TextTooLong { field: &'static str, max: usize },
}

impl EnquiryDraft {
    /// Validate the draft and freeze it into an enquiry.
    ///
    /// The platform fee is derived here, exactly once; parameter sets are
    /// retained only for the disciplines actually selected.
    pub fn into_enquiry(
        self,
        id: EnquiryId,
        customer: CustomerId,
        created_at: DateTime<Utc>,
    ) -> Result<Enquiry, DraftRejection> {
        if !self.inspection_types.at_least_one() {
            return Err(DraftRejection::NoInspectionType);
        }
        if self.inspection_budget_minor < 0 {
            return Err(DraftRejection::NegativeBudget);
        }
        if self.inspection_budget_minor > MAX_BUDGET_MINOR {
            return Err(DraftRejection::BudgetTooLarge);
        }
        bounded_text(&self.description, "description", MAX_DESCRIPTION_LEN)?;
        bounded_text(
            &self.special_requirements,
            "special requirements",
            MAX_SPECIAL_REQUIREMENTS_LEN,
        )?;

        let physical_parameters = if self.inspection_types.physical {
            self.physical_parameters
        } else {
            None
        };
        let chemical_parameters = if self.inspection_types.chemical {
            self.chemical_parameters
        } else {
            Vec::new()
        };

        let platform_fee_minor = fees::platform_fee(self.inspection_budget_minor);

        Ok(Enquiry {
            id,
            customer,
            confirmed_bid: None,
            status: EnquiryStatus::Draft,
            commodity_category: self.commodity_category,
            sub_commodity: self.sub_commodity,
            volume: self.volume,
            inspection_location: self.inspection_location,
            country: self.country,
            urgency_level: self.urgency_level,
            inspection_types: self.inspection_types,
            physical_parameters,
            chemical_parameters,
            inspection_budget_minor: self.inspection_budget_minor,
            platform_fee_minor,
            special_requirements: self.special_requirements,
            description: self.description,
            created_at,
        })
    }
}

fn bounded_text(
    value: &Option<String>,
    field: &'static str,
    max: usize,
) -> Result<(), DraftRejection> {
    match value {
        Some(text) if text.chars().count() > max => {
            Err(DraftRejection::TextTooLong { field, max })
        }
        _ => Ok(()),
    }
}

/// A customer's inspection request with its frozen commercial terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: EnquiryId,
    pub customer: CustomerId,
    pub confirmed_bid: Option<BidId>,
    pub status: EnquiryStatus,
    pub commodity_category: String,
    pub sub_commodity: String,
    pub volume: String,
    pub inspection_location: String,
    pub country: String,
    pub urgency_level: UrgencyLevel,
    pub inspection_types: InspectionTypes,
    pub physical_parameters: Option<PhysicalParameters>,
    pub chemical_parameters: Vec<ChemicalParameter>,
    pub inspection_budget_minor: i64,
    pub platform_fee_minor: i64,
    pub special_requirements: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Enquiry {
    /// The budget as presented to inspectors: gross minus the frozen fee.
    pub fn inspector_net_budget_minor(&self) -> i64 {
        fees::inspector_view(self.inspection_budget_minor, self.platform_fee_minor)
    }

    pub fn summary(&self) -> String {
        format!("{} / {}", self.commodity_category, self.sub_commodity)
    }
}

/// An inspector's priced offer against one enquiry.
///
/// `customer_view_minor` is derived at write time from the net ask plus the
/// enquiry's frozen platform fee; the two sides of the marketplace never see
/// the same number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub enquiry: EnquiryId,
    pub inspector: InspectorId,
    pub amount_minor: i64,
    pub customer_view_minor: i64,
    pub note: Option<String>,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bid as rendered for the owning customer (gross amount).
#[derive(Debug, Clone, Serialize)]
pub struct CustomerBidView {
    pub bid_id: BidId,
    pub enquiry_id: EnquiryId,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub status: &'static str,
}

/// Bid as rendered for the owning inspector (net amount).
#[derive(Debug, Clone, Serialize)]
pub struct InspectorBidView {
    pub bid_id: BidId,
    pub enquiry_id: EnquiryId,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub status: &'static str,
}

impl Bid {
    pub fn customer_view(&self) -> CustomerBidView {
        CustomerBidView {
            bid_id: self.id.clone(),
            enquiry_id: self.enquiry.clone(),
            amount_minor: self.customer_view_minor,
            note: self.note.clone(),
            status: self.status.label(),
        }
    }

    pub fn inspector_view(&self) -> InspectorBidView {
        InspectorBidView {
            bid_id: self.id.clone(),
            enquiry_id: self.enquiry.clone(),
            amount_minor: self.amount_minor,
            note: self.note.clone(),
            status: self.status.label(),
        }
    }
}

/// Staged settlement record against one enquiry, reconciled asynchronously
/// by the payment gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: PaymentOrderId,
    pub enquiry: EnquiryId,
    pub customer: CustomerId,
    pub amount_minor: i64,
    pub currency: String,
    pub phase: PaymentPhase,
    pub status: PaymentStatus,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
