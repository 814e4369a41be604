//! Client of the Core Backend, the system of record for clients,
//! properties, payments, and identity verification. The orchestrator
//! and tools only ever see the [`CoreGateway`] trait; whether calls go
//! over HTTP or to the simulated backend is decided once at bootstrap.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;
pub mod simulated;

pub use http::HttpCoreGateway;
pub use simulated::SimulatedCoreGateway;

#[derive(Debug, Error)]
#[error("core backend error (status {status_code}): {message}")]
pub struct BackendError {
    pub status_code: u16,
    pub message: String,
}

impl BackendError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self { status_code, message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub dni: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub client_id: String,
    pub client_name: String,
    /// Negative means the client owes money.
    pub balance: Decimal,
    pub next_payment_due: Option<String>,
    pub last_payment: Option<PaymentRecord>,
    #[serde(default)]
    pub properties: Vec<ManagedProperty>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub amount: Decimal,
    pub currency: String,
    pub paid_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedProperty {
    pub id: String,
    pub address: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReport {
    pub client_id: String,
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
    pub whatsapp_jid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub report_id: String,
    pub status: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintCategory {
    Plumbing,
    Electric,
    Heating,
    Cleaning,
    Security,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintUrgency {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintRequest {
    pub client_id: String,
    pub property_id: Option<String>,
    pub category: ComplaintCategory,
    pub description: String,
    pub urgency: ComplaintUrgency,
    pub whatsapp_jid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintReceipt {
    pub ticket_id: String,
    pub status: String,
    pub message: String,
}

/// Outcome of submitting an identity document number. `CodeSent` means
/// the backend dispatched a verification code out of band.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IdentityValidation {
    NotFound,
    CodeSent { client_id: String, client_name: String, masked_email: Option<String> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CodeConfirmation {
    Invalid { message: String },
    Verified { client_id: String, client_name: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Rent,
    Sale,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilters {
    pub operation: Option<Operation>,
    pub kind: Option<String>,
    pub city: Option<String>,
    pub rooms: Option<u32>,
    pub max_price: Option<Decimal>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListing {
    pub id: String,
    pub title: String,
    pub address: String,
    pub zone: Option<String>,
    pub kind: String,
    pub operation: Operation,
    pub rooms: Option<u32>,
    pub price: Decimal,
    pub currency: String,
    pub surface_m2: Option<u32>,
    pub url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityAvailability {
    pub city: String,
    pub rent: u32,
    pub sale: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    Showing,
    Meeting,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowingRequest {
    pub kind: AppointmentKind,
    pub property_id: Option<String>,
    pub client_name: String,
    pub client_phone: String,
    pub preferred_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowingConfirmation {
    pub showing_id: String,
    pub confirmation_sent: bool,
}

#[async_trait]
pub trait CoreGateway: Send + Sync {
    /// Look up the client already linked to a WhatsApp identity.
    /// `Ok(None)` means no link exists, which is not a fault.
    async fn client_by_jid(&self, jid: &str) -> Result<Option<ClientRecord>, BackendError>;

    async fn account_status(&self, client_id: &str) -> Result<AccountStatus, BackendError>;

    async fn report_payment(&self, report: PaymentReport) -> Result<PaymentReceipt, BackendError>;

    async fn create_complaint(
        &self,
        request: ComplaintRequest,
    ) -> Result<ComplaintReceipt, BackendError>;

    /// Begin verification for a document number. On a match the backend
    /// sends a one-time code to the client's registered contact.
    async fn validate_identity(
        &self,
        dni: &str,
        jid: &str,
    ) -> Result<IdentityValidation, BackendError>;

    async fn confirm_verification_code(
        &self,
        code: &str,
        jid: &str,
    ) -> Result<CodeConfirmation, BackendError>;

    async fn link_client_to_caller(
        &self,
        client_id: &str,
        jid: &str,
    ) -> Result<(), BackendError>;

    async fn search_properties(
        &self,
        filters: PropertyFilters,
    ) -> Result<Vec<PropertyListing>, BackendError>;

    async fn available_cities(&self) -> Result<Vec<CityAvailability>, BackendError>;

    async fn schedule_showing(
        &self,
        request: ShowingRequest,
    ) -> Result<ShowingConfirmation, BackendError>;
}
