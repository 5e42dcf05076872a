use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::bids::{BidRequest, BidService, EnquiryBidsView, LowestBidEntry};
use super::confirmation::ConfirmationService;
use super::domain::{
    BidId, ChemicalParameter, CustomerBidView, Enquiry, EnquiryDraft, EnquiryId, InspectionTypes,
    PaymentOrder, PaymentPhase, PhysicalParameters, UrgencyLevel,
};
use super::enquiries::EnquiryService;
use super::error::MarketError;
use super::payments::{PaymentGateway, PaymentService, WebhookVerifier};
use super::policy::MarketPolicy;
use super::principal::{
    CustomerDocumentUpdate, InspectorComplianceUpdate, Principal, PrincipalDirectory,
    ProfileService,
};
use super::repository::MarketStore;

/// Session header carrying the resolved principal id.
pub const AUTH_SUBJECT_HEADER: &str = "x-auth-subject";

/// Header carrying the gateway's hex HMAC over the webhook body.
pub const GATEWAY_SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Facade bundling every marketplace service over one store and directory.
pub struct Marketplace<S, D, G> {
    pub enquiries: EnquiryService<S, D>,
    pub bids: BidService<S, D>,
    pub confirmations: ConfirmationService<S>,
    pub payments: PaymentService<S, G>,
    pub profiles: ProfileService<D>,
    directory: Arc<D>,
}

impl<S, D, G> Marketplace<S, D, G>
where
    S: MarketStore,
    D: PrincipalDirectory,
    G: PaymentGateway,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        gateway: Arc<G>,
        policy: MarketPolicy,
        webhook_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            enquiries: EnquiryService::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                policy.clone(),
            ),
            bids: BidService::new(Arc::clone(&store), Arc::clone(&directory)),
            confirmations: ConfirmationService::new(Arc::clone(&store)),
            payments: PaymentService::new(
                store,
                gateway,
                WebhookVerifier::new(webhook_secret),
                policy,
            ),
            profiles: ProfileService::new(Arc::clone(&directory)),
            directory,
        }
    }

    /// Resolve the session header into a principal.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, MarketError> {
        let subject = headers
            .get(AUTH_SUBJECT_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(MarketError::Authentication)?;
        self.directory
            .resolve_by_id(subject)
            .map_err(MarketError::from)?
            .ok_or(MarketError::Authentication)
    }
}

/// Router builder exposing the marketplace HTTP surface.
pub fn marketplace_router<S, D, G>(market: Arc<Marketplace<S, D, G>>) -> Router
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/api/v1/enquiries", post(create_enquiry::<S, D, G>))
        .route("/api/v1/enquiries", get(list_enquiries::<S, D, G>))
        .route("/api/v1/enquiries/open", get(open_enquiries::<S, D, G>))
        .route(
            "/api/v1/enquiries/:enquiry_id/submit",
            post(submit_enquiry::<S, D, G>),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id/cancel",
            post(cancel_enquiry::<S, D, G>),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id/bids",
            get(enquiry_bids::<S, D, G>),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id/bid",
            put(place_bid::<S, D, G>),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id/payments",
            post(create_payment::<S, D, G>),
        )
        .route("/api/v1/bids", get(list_bids::<S, D, G>))
        .route("/api/v1/bids/lowest", get(lowest_bids::<S, D, G>))
        .route(
            "/api/v1/bids/:bid_id/withdraw",
            post(withdraw_bid::<S, D, G>),
        )
        .route("/api/v1/bids/:bid_id/confirm", post(confirm_bid::<S, D, G>))
        .route("/api/v1/payments/webhook", post(payment_webhook::<S, D, G>))
        .route(
            "/api/v1/payments/entitlement",
            get(payment_entitlement::<S, D, G>),
        )
        .route(
            "/api/v1/profile/documents",
            put(update_documents::<S, D, G>),
        )
        .route(
            "/api/v1/profile/compliance",
            put(update_compliance::<S, D, G>),
        )
        .with_state(market)
}

/// Enquiry as rendered for its owning customer. The frozen platform fee is
/// internal and never serialized.
#[derive(Debug, Serialize)]
pub struct CustomerEnquiryView {
    pub enquiry_id: EnquiryId,
    pub status: &'static str,
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
    pub special_requirements: Option<String>,
    pub description: Option<String>,
    pub confirmed_bid: Option<BidId>,
    pub created_at: DateTime<Utc>,
}

impl From<Enquiry> for CustomerEnquiryView {
    fn from(enquiry: Enquiry) -> Self {
        Self {
            enquiry_id: enquiry.id,
            status: enquiry.status.label(),
            commodity_category: enquiry.commodity_category,
            sub_commodity: enquiry.sub_commodity,
            volume: enquiry.volume,
            inspection_location: enquiry.inspection_location,
            country: enquiry.country,
            urgency_level: enquiry.urgency_level,
            inspection_types: enquiry.inspection_types,
            physical_parameters: enquiry.physical_parameters,
            chemical_parameters: enquiry.chemical_parameters,
            inspection_budget_minor: enquiry.inspection_budget_minor,
            special_requirements: enquiry.special_requirements,
            description: enquiry.description,
            confirmed_bid: enquiry.confirmed_bid,
            created_at: enquiry.created_at,
        }
    }
}

/// Enquiry as rendered for browsing inspectors: the budget shown is net of
/// the platform fee, and the owning customer is not identified.
#[derive(Debug, Serialize)]
pub struct InspectorEnquiryView {
    pub enquiry_id: EnquiryId,
    pub status: &'static str,
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
    pub special_requirements: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Enquiry> for InspectorEnquiryView {
    fn from(enquiry: Enquiry) -> Self {
        let budget = enquiry.inspector_net_budget_minor();
        Self {
            enquiry_id: enquiry.id,
            status: enquiry.status.label(),
            commodity_category: enquiry.commodity_category,
            sub_commodity: enquiry.sub_commodity,
            volume: enquiry.volume,
            inspection_location: enquiry.inspection_location,
            country: enquiry.country,
            urgency_level: enquiry.urgency_level,
            inspection_types: enquiry.inspection_types,
            physical_parameters: enquiry.physical_parameters,
            chemical_parameters: enquiry.chemical_parameters,
            inspection_budget_minor: budget,
            special_requirements: enquiry.special_requirements,
            description: enquiry.description,
            created_at: enquiry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentOrderView {
    pub order_id: String,
    pub enquiry_id: EnquiryId,
    pub amount_minor: i64,
    pub currency: String,
    pub phase: &'static str,
    pub status: &'static str,
    pub gateway_order_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentOrder> for PaymentOrderView {
    fn from(order: PaymentOrder) -> Self {
        Self {
            order_id: order.id.0,
            enquiry_id: order.enquiry,
            amount_minor: order.amount_minor,
            currency: order.currency,
            phase: order.phase.label(),
            status: order.status.label(),
            gateway_order_id: order.gateway_order_id,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CreatePaymentRequest {
    #[serde(default)]
    phase: PaymentPhase,
}

#[derive(Debug, Serialize)]
struct ConfirmationView {
    enquiry: CustomerEnquiryView,
    winning_bid: CustomerBidView,
    lost_bids: usize,
}

type MarketState<S, D, G> = State<Arc<Marketplace<S, D, G>>>;

async fn create_enquiry<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Json(draft): Json<EnquiryDraft>,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let enquiry = market.enquiries.create(&caller, draft)?;
    let view = CustomerEnquiryView::from(enquiry);
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

async fn list_enquiries<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
) -> Result<Json<Vec<CustomerEnquiryView>>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let enquiries = market.enquiries.my_enquiries(&caller)?;
    Ok(Json(
        enquiries.into_iter().map(CustomerEnquiryView::from).collect(),
    ))
}

async fn open_enquiries<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
) -> Result<Json<Vec<InspectorEnquiryView>>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let enquiries = market.enquiries.open_for_bidding(&caller)?;
    Ok(Json(
        enquiries
            .into_iter()
            .map(InspectorEnquiryView::from)
            .collect(),
    ))
}

async fn submit_enquiry<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
) -> Result<Json<CustomerEnquiryView>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let enquiry = market
        .enquiries
        .submit(&caller, &EnquiryId(enquiry_id), Utc::now())?;
    Ok(Json(CustomerEnquiryView::from(enquiry)))
}

async fn cancel_enquiry<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
) -> Result<Json<CustomerEnquiryView>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let enquiry = market.enquiries.cancel(&caller, &EnquiryId(enquiry_id))?;
    Ok(Json(CustomerEnquiryView::from(enquiry)))
}

async fn enquiry_bids<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
) -> Result<Json<EnquiryBidsView>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let view = market
        .bids
        .bids_for_enquiry(&caller, &EnquiryId(enquiry_id))?;
    Ok(Json(view))
}

async fn place_bid<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
    Json(request): Json<BidRequest>,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let bid = market
        .bids
        .place(&caller, &EnquiryId(enquiry_id), request)?;
    Ok((StatusCode::CREATED, Json(bid.inspector_view())).into_response())
}

async fn withdraw_bid<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Path(bid_id): Path<String>,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let bid = market.bids.withdraw(&caller, &BidId(bid_id))?;
    Ok(Json(bid.inspector_view()).into_response())
}

async fn list_bids<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let bids = market.bids.my_bids(&caller)?;
    let views: Vec<_> = bids.iter().map(|bid| bid.inspector_view()).collect();
    Ok(Json(views).into_response())
}

async fn lowest_bids<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
) -> Result<Json<Vec<LowestBidEntry>>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    market.authenticate(&headers)?;
    Ok(Json(market.bids.lowest_bids()?))
}

async fn confirm_bid<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Path(bid_id): Path<String>,
) -> Result<Json<ConfirmationView>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let outcome = market.confirmations.confirm(&caller, &BidId(bid_id))?;
    Ok(Json(ConfirmationView {
        enquiry: CustomerEnquiryView::from(outcome.enquiry),
        winning_bid: outcome.winning_bid.customer_view(),
        lost_bids: outcome.lost_bids.len(),
    }))
}

async fn create_payment<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Path(enquiry_id): Path<String>,
    body: Option<Json<CreatePaymentRequest>>,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let Json(request) = body.unwrap_or_default();
    let order = market
        .payments
        .create_order(&caller, &EnquiryId(enquiry_id), request.phase)?;
    Ok((StatusCode::CREATED, Json(PaymentOrderView::from(order))).into_response())
}

async fn payment_webhook<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentOrderView>, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let signature = headers
        .get(GATEWAY_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(MarketError::Authentication)?;
    let order = market.payments.reconcile(&body, signature)?;
    Ok(Json(PaymentOrderView::from(order)))
}

async fn payment_entitlement<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let entitled = market.payments.has_paid_entitlement(&caller)?;
    Ok(Json(json!({ "entitled": entitled })).into_response())
}

async fn update_documents<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Json(update): Json<CustomerDocumentUpdate>,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let profile = market.profiles.update_customer_documents(&caller, update)?;
    Ok(Json(json!({
        "customer_id": profile.id.0,
        "publish_requirements": profile.publish_requirements,
        "missing_documents": profile.documents.missing(),
    }))
    .into_response())
}

async fn update_compliance<S, D, G>(
    State(market): MarketState<S, D, G>,
    headers: HeaderMap,
    Json(update): Json<InspectorComplianceUpdate>,
) -> Result<Response, MarketError>
where
    S: MarketStore + 'static,
    D: PrincipalDirectory + 'static,
    G: PaymentGateway + 'static,
{
    let caller = market.authenticate(&headers)?;
    let profile = market
        .profiles
        .update_inspector_compliance(&caller, update)?;
    Ok(Json(json!({
        "inspector_id": profile.id.0,
        "accepts_requests": profile.accepts_requests,
        "compliance_missing": profile.compliance_missing(),
    }))
    .into_response())
}
