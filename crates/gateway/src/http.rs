use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{
    AccountStatus, BackendError, CityAvailability, ClientRecord, CodeConfirmation,
    ComplaintReceipt, ComplaintRequest, CoreGateway, IdentityValidation, PaymentReceipt,
    PaymentReport, PropertyFilters, PropertyListing, ShowingConfirmation, ShowingRequest,
};

/// Live Core Backend over HTTP. Every request carries the service key
/// in `x-api-key` and is bounded by the configured timeout.
pub struct HttpCoreGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCoreGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| BackendError::new(500, "api key contains invalid header characters"))?;
        headers.insert("x-api-key", key);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| BackendError::new(500, format!("http client build failed: {e}")))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response =
            self.client.get(self.url(path)).send().await.map_err(transport_error)?;
        decode_response(response).await
    }

    /// Lookup variant of `get_json`: a 404 is an absent record, not a fault.
    async fn get_json_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, BackendError> {
        let response =
            self.client.get(self.url(path)).send().await.map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode_response(response).await.map(Some)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode_response(response).await
    }
}

fn transport_error(error: reqwest::Error) -> BackendError {
    let status = error.status().map(|s| s.as_u16()).unwrap_or(500);
    BackendError::new(status, format!("core backend request failed: {error}"))
}

async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            format!("core backend returned {status}")
        } else {
            body
        };
        tracing::warn!(event_name = "core_backend.request_failed", status = status.as_u16(), "core backend request failed");
        return Err(BackendError::new(status.as_u16(), message));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| BackendError::new(502, format!("core backend response decode failed: {e}")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateIdentityBody<'a> {
    dni: &'a str,
    whatsapp_jid: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeBody<'a> {
    otp: &'a str,
    whatsapp_jid: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkCallerBody<'a> {
    whatsapp_jid: &'a str,
}

#[async_trait::async_trait]
impl CoreGateway for HttpCoreGateway {
    async fn client_by_jid(&self, jid: &str) -> Result<Option<ClientRecord>, BackendError> {
        self.get_json_optional(&format!("/api/v1/bot/client/by-jid/{jid}")).await
    }

    async fn account_status(&self, client_id: &str) -> Result<AccountStatus, BackendError> {
        self.get_json(&format!("/api/v1/bot/client/{client_id}/balance")).await
    }

    async fn report_payment(&self, report: PaymentReport) -> Result<PaymentReceipt, BackendError> {
        self.post_json("/api/payments/report", &report).await
    }

    async fn create_complaint(
        &self,
        request: ComplaintRequest,
    ) -> Result<ComplaintReceipt, BackendError> {
        let path = format!("/api/v1/bot/client/{}/complaints", request.client_id);
        self.post_json(&path, &request).await
    }

    async fn validate_identity(
        &self,
        dni: &str,
        jid: &str,
    ) -> Result<IdentityValidation, BackendError> {
        let body = ValidateIdentityBody { dni, whatsapp_jid: jid };
        self.post_json("/api/v1/bot/auth/validate-identity", &body).await
    }

    async fn confirm_verification_code(
        &self,
        code: &str,
        jid: &str,
    ) -> Result<CodeConfirmation, BackendError> {
        let body = VerifyCodeBody { otp: code, whatsapp_jid: jid };
        self.post_json("/api/v1/bot/auth/verify-otp", &body).await
    }

    async fn link_client_to_caller(
        &self,
        client_id: &str,
        jid: &str,
    ) -> Result<(), BackendError> {
        let body = LinkCallerBody { whatsapp_jid: jid };
        let response = self
            .client
            .post(self.url(&format!("/api/clients/{client_id}/link-whatsapp")))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::new(status.as_u16(), message));
        }
        Ok(())
    }

    async fn search_properties(
        &self,
        filters: PropertyFilters,
    ) -> Result<Vec<PropertyListing>, BackendError> {
        self.post_json("/api/v1/bot/properties/search", &filters).await
    }

    async fn available_cities(&self) -> Result<Vec<CityAvailability>, BackendError> {
        self.get_json("/api/v1/bot/properties/cities").await
    }

    async fn schedule_showing(
        &self,
        request: ShowingRequest,
    ) -> Result<ShowingConfirmation, BackendError> {
        self.post_json("/api/showings", &request).await
    }
}
