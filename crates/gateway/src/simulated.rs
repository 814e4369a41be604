use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::{
    AccountStatus, BackendError, CityAvailability, ClientRecord, CodeConfirmation,
    ComplaintReceipt, ComplaintRequest, CoreGateway, IdentityValidation, ManagedProperty,
    Operation, PaymentReceipt, PaymentRecord, PaymentReport, PropertyFilters, PropertyListing,
    ShowingConfirmation, ShowingRequest,
};

/// Deterministic in-process backend for development and tests. Carries
/// a small canned dataset and real verification-session state, so the
/// full identity flow can be exercised without the live backend.
pub struct SimulatedCoreGateway {
    clients: Vec<ClientRecord>,
    accounts: HashMap<String, AccountStatus>,
    listings: Vec<PropertyListing>,
    cities: Vec<CityAvailability>,
    sessions: RwLock<HashMap<String, VerificationSession>>,
    ticket_counter: AtomicU64,
    payment_counter: AtomicU64,
    showing_counter: AtomicU64,
}

#[derive(Clone, Debug)]
struct VerificationSession {
    client_id: String,
    client_name: String,
}

impl Default for SimulatedCoreGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCoreGateway {
    pub fn new() -> Self {
        let clients = vec![
            ClientRecord {
                id: "client_001".to_string(),
                name: "Juan Pérez".to_string(),
                dni: "12345678".to_string(),
                email: Some("juan.perez@example.com".to_string()),
                phone: Some("5492804503151@s.whatsapp.net".to_string()),
            },
            ClientRecord {
                id: "client_002".to_string(),
                name: "María González".to_string(),
                dni: "87654321".to_string(),
                email: Some("maria.gonzalez@example.com".to_string()),
                phone: Some("5491198765432@s.whatsapp.net".to_string()),
            },
        ];

        let mut accounts = HashMap::new();
        accounts.insert(
            "client_001".to_string(),
            AccountStatus {
                client_id: "client_001".to_string(),
                client_name: "Juan Pérez".to_string(),
                balance: Decimal::from(-50_000),
                next_payment_due: Some("2026-09-10".to_string()),
                last_payment: Some(PaymentRecord {
                    amount: Decimal::from(120_000),
                    currency: "ARS".to_string(),
                    paid_at: "2026-07-10T14:30:00Z".to_string(),
                }),
                properties: vec![ManagedProperty {
                    id: "prop_001".to_string(),
                    address: "Av. Libertador 1234".to_string(),
                }],
            },
        );
        accounts.insert(
            "client_002".to_string(),
            AccountStatus {
                client_id: "client_002".to_string(),
                client_name: "María González".to_string(),
                balance: Decimal::ZERO,
                next_payment_due: Some("2026-09-05".to_string()),
                last_payment: Some(PaymentRecord {
                    amount: Decimal::from(95_000),
                    currency: "ARS".to_string(),
                    paid_at: "2026-08-05T10:00:00Z".to_string(),
                }),
                properties: vec![ManagedProperty {
                    id: "prop_002".to_string(),
                    address: "Belgrano 456".to_string(),
                }],
            },
        );

        let listings = vec![
            PropertyListing {
                id: "prop_003".to_string(),
                title: "2 ambientes en Palermo".to_string(),
                address: "Thames 1500".to_string(),
                zone: Some("Palermo".to_string()),
                kind: "apartment".to_string(),
                operation: Operation::Rent,
                rooms: Some(2),
                price: Decimal::from(180_000),
                currency: "ARS".to_string(),
                surface_m2: Some(50),
                url: Some("https://listings.example.com/prop_003".to_string()),
            },
            PropertyListing {
                id: "prop_004".to_string(),
                title: "Casa 3 dormitorios zona norte".to_string(),
                address: "Los Aromos 220".to_string(),
                zone: Some("Zona Norte".to_string()),
                kind: "house".to_string(),
                operation: Operation::Rent,
                rooms: Some(3),
                price: Decimal::from(250_000),
                currency: "ARS".to_string(),
                surface_m2: Some(120),
                url: Some("https://listings.example.com/prop_004".to_string()),
            },
        ];

        let cities = vec![
            CityAvailability { city: "Rawson".to_string(), rent: 6, sale: 1 },
            CityAvailability { city: "Playa Unión".to_string(), rent: 2, sale: 0 },
        ];

        Self {
            clients,
            accounts,
            listings,
            cities,
            sessions: RwLock::new(HashMap::new()),
            ticket_counter: AtomicU64::new(1),
            payment_counter: AtomicU64::new(1),
            showing_counter: AtomicU64::new(1),
        }
    }

    fn mask_email(email: &str) -> String {
        match email.split_once('@') {
            Some((local, domain)) if local.chars().count() > 2 => {
                let prefix: String = local.chars().take(2).collect();
                format!("{prefix}***@{domain}")
            }
            Some((_, domain)) => format!("***@{domain}"),
            None => "***".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl CoreGateway for SimulatedCoreGateway {
    async fn client_by_jid(&self, jid: &str) -> Result<Option<ClientRecord>, BackendError> {
        Ok(self.clients.iter().find(|client| client.phone.as_deref() == Some(jid)).cloned())
    }

    async fn account_status(&self, client_id: &str) -> Result<AccountStatus, BackendError> {
        self.accounts
            .get(client_id)
            .cloned()
            .ok_or_else(|| BackendError::new(404, format!("unknown client `{client_id}`")))
    }

    async fn report_payment(&self, report: PaymentReport) -> Result<PaymentReceipt, BackendError> {
        if !self.accounts.contains_key(&report.client_id) {
            return Err(BackendError::new(404, format!("unknown client `{}`", report.client_id)));
        }
        let id = self.payment_counter.fetch_add(1, Ordering::Relaxed);
        Ok(PaymentReceipt { report_id: format!("pay_{id:04}"), status: "received".to_string() })
    }

    async fn create_complaint(
        &self,
        request: ComplaintRequest,
    ) -> Result<ComplaintReceipt, BackendError> {
        if !self.accounts.contains_key(&request.client_id) {
            return Err(BackendError::new(
                404,
                format!("unknown client `{}`", request.client_id),
            ));
        }

        let id = self.ticket_counter.fetch_add(1, Ordering::Relaxed);
        Ok(ComplaintReceipt {
            ticket_id: format!("TKT-{id:04}"),
            status: "open".to_string(),
            message: "Complaint registered, a technician will be assigned".to_string(),
        })
    }

    async fn validate_identity(
        &self,
        dni: &str,
        jid: &str,
    ) -> Result<IdentityValidation, BackendError> {
        let Some(client) = self.clients.iter().find(|client| client.dni == dni) else {
            return Ok(IdentityValidation::NotFound);
        };

        self.sessions.write().await.insert(
            jid.to_string(),
            VerificationSession {
                client_id: client.id.clone(),
                client_name: client.name.clone(),
            },
        );

        Ok(IdentityValidation::CodeSent {
            client_id: client.id.clone(),
            client_name: client.name.clone(),
            masked_email: client.email.as_deref().map(Self::mask_email),
        })
    }

    async fn confirm_verification_code(
        &self,
        code: &str,
        jid: &str,
    ) -> Result<CodeConfirmation, BackendError> {
        let session = self.sessions.read().await.get(jid).cloned();
        let Some(session) = session else {
            return Ok(CodeConfirmation::Invalid {
                message: "no verification in progress for this conversation".to_string(),
            });
        };

        // Any six digit code is accepted in simulation.
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(CodeConfirmation::Invalid {
                message: "the code must be exactly six digits".to_string(),
            });
        }

        self.sessions.write().await.remove(jid);
        Ok(CodeConfirmation::Verified {
            client_id: session.client_id,
            client_name: session.client_name,
        })
    }

    async fn link_client_to_caller(
        &self,
        client_id: &str,
        _jid: &str,
    ) -> Result<(), BackendError> {
        if !self.accounts.contains_key(client_id) {
            return Err(BackendError::new(404, format!("unknown client `{client_id}`")));
        }
        Ok(())
    }

    async fn search_properties(
        &self,
        filters: PropertyFilters,
    ) -> Result<Vec<PropertyListing>, BackendError> {
        let matches = self
            .listings
            .iter()
            .filter(|listing| {
                filters.operation.map_or(true, |operation| listing.operation == operation)
            })
            .filter(|listing| {
                filters.kind.as_deref().map_or(true, |kind| listing.kind == kind)
            })
            .filter(|listing| {
                // City is a partial, case-insensitive match ("playa" finds "Playa Unión").
                filters.city.as_deref().map_or(true, |city| {
                    listing
                        .zone
                        .as_deref()
                        .unwrap_or("")
                        .to_lowercase()
                        .contains(&city.to_lowercase())
                })
            })
            .filter(|listing| filters.rooms.map_or(true, |rooms| listing.rooms == Some(rooms)))
            .filter(|listing| filters.max_price.map_or(true, |max| listing.price <= max))
            .cloned()
            .collect();

        Ok(matches)
    }

    async fn available_cities(&self) -> Result<Vec<CityAvailability>, BackendError> {
        Ok(self.cities.clone())
    }

    async fn schedule_showing(
        &self,
        _request: ShowingRequest,
    ) -> Result<ShowingConfirmation, BackendError> {
        let id = self.showing_counter.fetch_add(1, Ordering::Relaxed);
        Ok(ShowingConfirmation {
            showing_id: format!("show_{id:04}"),
            confirmation_sent: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::SimulatedCoreGateway;
    use crate::{
        CodeConfirmation, CoreGateway, IdentityValidation, Operation, PropertyFilters,
    };

    #[tokio::test]
    async fn known_jid_resolves_to_client() {
        let gateway = SimulatedCoreGateway::new();
        let client = gateway
            .client_by_jid("5492804503151@s.whatsapp.net")
            .await
            .expect("lookup")
            .expect("client exists");
        assert_eq!(client.id, "client_001");

        let missing = gateway.client_by_jid("0@s.whatsapp.net").await.expect("lookup");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn account_status_reports_debt() {
        let gateway = SimulatedCoreGateway::new();
        let status = gateway.account_status("client_001").await.expect("status");
        assert_eq!(status.balance, Decimal::from(-50_000));

        let error = gateway.account_status("client_999").await.expect_err("unknown client");
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn verification_flow_requires_an_open_session() {
        let gateway = SimulatedCoreGateway::new();
        let jid = "5492800000000@s.whatsapp.net";

        // No session yet.
        let premature =
            gateway.confirm_verification_code("123456", jid).await.expect("confirm");
        assert!(matches!(premature, CodeConfirmation::Invalid { .. }));

        let validation = gateway.validate_identity("12345678", jid).await.expect("validate");
        assert!(matches!(validation, IdentityValidation::CodeSent { .. }));

        let confirmed =
            gateway.confirm_verification_code("123456", jid).await.expect("confirm");
        match confirmed {
            CodeConfirmation::Verified { client_id, client_name } => {
                assert_eq!(client_id, "client_001");
                assert_eq!(client_name, "Juan Pérez");
            }
            other => panic!("expected verified confirmation, got {other:?}"),
        }

        // Session is consumed by a successful confirmation.
        let replay = gateway.confirm_verification_code("123456", jid).await.expect("confirm");
        assert!(matches!(replay, CodeConfirmation::Invalid { .. }));
    }

    #[test]
    fn email_mask_keeps_two_leading_characters_of_any_alphabet() {
        assert_eq!(SimulatedCoreGateway::mask_email("juan.perez@mail.com"), "ju***@mail.com");
        assert_eq!(SimulatedCoreGateway::mask_email("ñandú@dominio.com"), "ña***@dominio.com");
        assert_eq!(SimulatedCoreGateway::mask_email("ab@mail.com"), "***@mail.com");
        assert_eq!(SimulatedCoreGateway::mask_email("sin-arroba"), "***");
    }

    #[tokio::test]
    async fn unknown_dni_does_not_open_a_session() {
        let gateway = SimulatedCoreGateway::new();
        let jid = "5492800000001@s.whatsapp.net";

        let validation = gateway.validate_identity("00000000", jid).await.expect("validate");
        assert!(matches!(validation, IdentityValidation::NotFound));

        let confirmed =
            gateway.confirm_verification_code("123456", jid).await.expect("confirm");
        assert!(matches!(confirmed, CodeConfirmation::Invalid { .. }));
    }

    #[tokio::test]
    async fn property_search_applies_filters() {
        let gateway = SimulatedCoreGateway::new();

        let all = gateway
            .search_properties(PropertyFilters {
                operation: Some(Operation::Rent),
                ..PropertyFilters::default()
            })
            .await
            .expect("search");
        assert_eq!(all.len(), 2);

        let capped = gateway
            .search_properties(PropertyFilters {
                max_price: Some(Decimal::from(200_000)),
                ..PropertyFilters::default()
            })
            .await
            .expect("search");
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, "prop_003");

        let none = gateway
            .search_properties(PropertyFilters {
                operation: Some(Operation::Sale),
                ..PropertyFilters::default()
            })
            .await
            .expect("search");
        assert!(none.is_empty());
    }
}
