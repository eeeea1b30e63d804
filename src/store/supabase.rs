//! [`Store`] over Supabase PostgREST.
//!
//! Tables and the `apply_balance_change` function are defined in `migrations/0001_schema.sql`.
//! Requests authenticate with the service-role key, which bypasses row-level security; the
//! server enforces ownership itself.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use smm_types::account::{LedgerEntry, LedgerKind, NewProfile, Profile};
use smm_types::catalog::{Service, ServiceDraft};
use smm_types::order::{NewOrder, Order, OrderFilter, OrderStatus, OrderUpdate};
use smm_types::page::Page;
use smm_types::payment::{NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentStatus};
use smm_types::settings::Settings;
use smm_types::ticket::{
    NewTicket, NewTicketMessage, Ticket, TicketFilter, TicketMessage, TicketStatus, TicketThread,
};
use std::fmt::Display;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use super::{Store, StoreError};

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_REPRESENTATION: &str = "resolution=merge-duplicates,return=representation";
/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
const SETTINGS_ROW_ID: i32 = 1;

type Query = Vec<(&'static str, String)>;

fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

fn paged(mut query: Query, order: &'static str, page: Page) -> Query {
    query.push(("order", order.to_string()));
    query.push(("limit", page.limit().to_string()));
    query.push(("offset", page.offset().to_string()));
    query
}

/// Error body PostgREST returns for failed requests and raised exceptions.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsRow {
    id: i32,
    value: Settings,
}

#[derive(Clone, Debug)]
pub struct SupabaseStore {
    rest_url: Url,
    service_key: String,
    client: Client,
    timeout: Duration,
}

impl SupabaseStore {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// `url` is the project URL; PostgREST lives under `/rest/v1/`.
    pub fn try_new(url: &Url, service_key: impl Into<String>) -> Result<Self, StoreError> {
        let rest_url = url.join("rest/v1/").map_err(|e| StoreError::UrlParse {
            context: "Failed to construct rest/v1/ URL",
            source: e,
        })?;
        Ok(Self {
            rest_url,
            service_key: service_key.into(),
            client: Client::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str, query: &[(&'static str, String)]) -> Result<Url, StoreError> {
        let mut url = self.rest_url.join(path).map_err(|e| StoreError::UrlParse {
            context: "Failed to construct table URL",
            source: e,
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<RequestBuilder, StoreError> {
        let url = self.url(path, query)?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .timeout(self.timeout))
    }

    /// Sends the request and decodes a JSON body, translating PostgREST errors.
    async fn send<T: DeserializeOwned>(
        &self,
        context: &'static str,
        request: RequestBuilder,
    ) -> Result<T, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Http { context, source: e })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::ResponseBodyRead { context, source: e })?;

        if !status.is_success() {
            return Err(classify_error(context, status, body));
        }
        serde_json::from_str(&body)
            .map_err(|e| StoreError::JsonDeserialization { context, source: e })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        context: &'static str,
        table: &str,
        query: Query,
    ) -> Result<Vec<T>, StoreError> {
        let request = self.request(Method::GET, table, &query)?;
        self.send(context, request).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        context: &'static str,
        table: &str,
        mut query: Query,
    ) -> Result<Option<T>, StoreError> {
        query.push(("limit", "1".to_string()));
        let rows: Vec<T> = self.select(context, table, query).await?;
        Ok(rows.into_iter().next())
    }

    /// Writes rows and returns the first row PostgREST hands back.
    #[allow(clippy::too_many_arguments)]
    async fn write_one<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        context: &'static str,
        method: Method,
        table: &str,
        query: Query,
        prefer: &'static str,
        body: &B,
        missing: &'static str,
    ) -> Result<T, StoreError> {
        let rows: Vec<T> = self
            .write_many(context, method, table, query, prefer, body)
            .await?;
        rows.into_iter().next().ok_or(StoreError::NotFound(missing))
    }

    async fn write_many<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        context: &'static str,
        method: Method,
        table: &str,
        query: Query,
        prefer: &'static str,
        body: &B,
    ) -> Result<Vec<T>, StoreError> {
        let request = self
            .request(method, table, &query)?
            .header("Prefer", prefer)
            .json(body);
        self.send(context, request).await
    }
}

fn classify_error(context: &'static str, status: reqwest::StatusCode, body: String) -> StoreError {
    let parsed = serde_json::from_str::<PostgrestError>(&body).ok();
    let message = parsed.as_ref().and_then(|e| e.message.as_deref());
    match (parsed.as_ref().and_then(|e| e.code.as_deref()), message) {
        (_, Some("insufficient_balance")) => {
            let available = parsed
                .as_ref()
                .and_then(|e| e.details.as_deref())
                .and_then(|d| d.parse::<Decimal>().ok())
                .unwrap_or(Decimal::ZERO);
            StoreError::InsufficientBalance { available }
        }
        (_, Some("profile_not_found")) => StoreError::NotFound("profile"),
        (Some(UNIQUE_VIOLATION), _) => {
            StoreError::Conflict(format!("{context}: row already exists"))
        }
        _ => {
            tracing::error!(%status, body = %body, context, "PostgREST request failed");
            StoreError::HttpStatus {
                context,
                status,
                body,
            }
        }
    }
}

#[async_trait]
impl Store for SupabaseStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        self.select_one("GET profiles", "profiles", vec![("id", eq(id))])
            .await
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        self.write_one(
            "POST profiles",
            Method::POST,
            "profiles",
            vec![],
            RETURN_REPRESENTATION,
            &profile,
            "profile",
        )
        .await
    }

    async fn list_profiles(&self, page: Page) -> Result<Vec<Profile>, StoreError> {
        let query = paged(vec![], "created_at.desc", page);
        self.select("GET profiles", "profiles", query).await
    }

    async fn apply_balance_change(
        &self,
        user_id: Uuid,
        delta: Decimal,
        kind: LedgerKind,
        reference: Option<String>,
    ) -> Result<LedgerEntry, StoreError> {
        let body = json!({
            "p_user_id": user_id,
            "p_delta": delta,
            "p_kind": kind,
            "p_reference": reference,
        });
        let request = self
            .request(Method::POST, "rpc/apply_balance_change", &[])?
            .json(&body);
        self.send("POST rpc/apply_balance_change", request).await
    }

    async fn list_ledger(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let query = paged(vec![("user_id", eq(user_id))], "id.desc", page);
        self.select("GET ledger", "ledger", query).await
    }

    async fn list_services(&self, active_only: bool) -> Result<Vec<Service>, StoreError> {
        let mut query = vec![("order", "category.asc,id.asc".to_string())];
        if active_only {
            query.push(("active", eq(true)));
        }
        self.select("GET services", "services", query).await
    }

    async fn get_service(&self, id: i64) -> Result<Option<Service>, StoreError> {
        self.select_one("GET services", "services", vec![("id", eq(id))])
            .await
    }

    async fn upsert_service(&self, draft: ServiceDraft) -> Result<Service, StoreError> {
        self.write_one(
            "POST services",
            Method::POST,
            "services",
            vec![("on_conflict", "provider_id,provider_service_id".to_string())],
            UPSERT_REPRESENTATION,
            &draft,
            "service",
        )
        .await
    }

    async fn set_service_active(&self, id: i64, active: bool) -> Result<Service, StoreError> {
        self.write_one(
            "PATCH services",
            Method::PATCH,
            "services",
            vec![("id", eq(id))],
            RETURN_REPRESENTATION,
            &json!({ "active": active }),
            "service",
        )
        .await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        self.write_one(
            "POST orders",
            Method::POST,
            "orders",
            vec![],
            RETURN_REPRESENTATION,
            &order,
            "order",
        )
        .await
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        self.select_one("GET orders", "orders", vec![("id", eq(id))])
            .await
    }

    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order, StoreError> {
        self.write_one(
            "PATCH orders",
            Method::PATCH,
            "orders",
            vec![("id", eq(id))],
            RETURN_REPRESENTATION,
            &update,
            "order",
        )
        .await
    }

    async fn transition_order(
        &self,
        id: i64,
        from: OrderStatus,
        update: OrderUpdate,
    ) -> Result<Option<Order>, StoreError> {
        let rows: Vec<Order> = self
            .write_many(
                "PATCH orders",
                Method::PATCH,
                "orders",
                vec![("id", eq(id)), ("status", eq(from))],
                RETURN_REPRESENTATION,
                &update,
            )
            .await?;
        match rows.into_iter().next() {
            Some(order) => Ok(Some(order)),
            None => match self.get_order(id).await? {
                Some(_) => Ok(None),
                None => Err(StoreError::NotFound("order")),
            },
        }
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>, StoreError> {
        let mut query = vec![];
        if let Some(user_id) = filter.user_id {
            query.push(("user_id", eq(user_id)));
        }
        if let Some(status) = filter.status {
            query.push(("status", eq(status)));
        }
        let query = paged(query, "id.desc", page);
        self.select("GET orders", "orders", query).await
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        self.write_one(
            "POST payments",
            Method::POST,
            "payments",
            vec![],
            RETURN_REPRESENTATION,
            &payment,
            "payment",
        )
        .await
    }

    async fn get_payment(&self, id: i64) -> Result<Option<Payment>, StoreError> {
        self.select_one("GET payments", "payments", vec![("id", eq(id))])
            .await
    }

    async fn find_payment_by_reference(
        &self,
        method: PaymentMethod,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let query = vec![("method", eq(method)), ("reference", eq(reference))];
        self.select_one("GET payments", "payments", query).await
    }

    async fn attach_invoice(
        &self,
        id: i64,
        reference: &str,
        invoice_url: &str,
    ) -> Result<Payment, StoreError> {
        self.write_one(
            "PATCH payments",
            Method::PATCH,
            "payments",
            vec![("id", eq(id))],
            RETURN_REPRESENTATION,
            &json!({ "reference": reference, "invoice_url": invoice_url }),
            "payment",
        )
        .await
    }

    async fn transition_payment(
        &self,
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
        note: Option<String>,
    ) -> Result<Option<Payment>, StoreError> {
        let mut body = json!({ "status": to });
        if let Some(note) = note {
            body["note"] = json!(note);
        }
        let rows: Vec<Payment> = self
            .write_many(
                "PATCH payments",
                Method::PATCH,
                "payments",
                vec![("id", eq(id)), ("status", eq(from))],
                RETURN_REPRESENTATION,
                &body,
            )
            .await?;
        match rows.into_iter().next() {
            Some(payment) => Ok(Some(payment)),
            None => match self.get_payment(id).await? {
                Some(_) => Ok(None),
                None => Err(StoreError::NotFound("payment")),
            },
        }
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: Page,
    ) -> Result<Vec<Payment>, StoreError> {
        let mut query = vec![];
        if let Some(user_id) = filter.user_id {
            query.push(("user_id", eq(user_id)));
        }
        if let Some(status) = filter.status {
            query.push(("status", eq(status)));
        }
        if let Some(method) = filter.method {
            query.push(("method", eq(method)));
        }
        let query = paged(query, "id.desc", page);
        self.select("GET payments", "payments", query).await
    }

    async fn insert_ticket(
        &self,
        ticket: NewTicket,
        first_message: String,
    ) -> Result<TicketThread, StoreError> {
        let author_id = ticket.user_id;
        let ticket: Ticket = self
            .write_one(
                "POST tickets",
                Method::POST,
                "tickets",
                vec![],
                RETURN_REPRESENTATION,
                &ticket,
                "ticket",
            )
            .await?;
        let message = self
            .insert_ticket_message(NewTicketMessage {
                ticket_id: ticket.id,
                author_id,
                staff: false,
                body: first_message,
            })
            .await?;
        Ok(TicketThread {
            ticket,
            messages: vec![message],
        })
    }

    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        self.select_one("GET tickets", "tickets", vec![("id", eq(id))])
            .await
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut query = vec![];
        if let Some(user_id) = filter.user_id {
            query.push(("user_id", eq(user_id)));
        }
        if let Some(status) = filter.status {
            query.push(("status", eq(status_str(&status)?)));
        }
        let query = paged(query, "updated_at.desc,id.desc", page);
        self.select("GET tickets", "tickets", query).await
    }

    async fn insert_ticket_message(
        &self,
        message: NewTicketMessage,
    ) -> Result<TicketMessage, StoreError> {
        self.write_one(
            "POST ticket_messages",
            Method::POST,
            "ticket_messages",
            vec![],
            RETURN_REPRESENTATION,
            &message,
            "ticket",
        )
        .await
    }

    async fn list_ticket_messages(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketMessage>, StoreError> {
        let query = vec![
            ("ticket_id", eq(ticket_id)),
            ("order", "id.asc".to_string()),
        ];
        self.select("GET ticket_messages", "ticket_messages", query)
            .await
    }

    async fn set_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
    ) -> Result<Ticket, StoreError> {
        self.write_one(
            "PATCH tickets",
            Method::PATCH,
            "tickets",
            vec![("id", eq(id))],
            RETURN_REPRESENTATION,
            &json!({ "status": status }),
            "ticket",
        )
        .await
    }

    async fn get_settings(&self) -> Result<Settings, StoreError> {
        let row: Option<SettingsRow> = self
            .select_one("GET settings", "settings", vec![("id", eq(SETTINGS_ROW_ID))])
            .await?;
        Ok(row.map(|r| r.value).unwrap_or_default())
    }

    async fn put_settings(&self, settings: Settings) -> Result<Settings, StoreError> {
        let row: SettingsRow = self
            .write_one(
                "POST settings",
                Method::POST,
                "settings",
                vec![("on_conflict", "id".to_string())],
                UPSERT_REPRESENTATION,
                &SettingsRow {
                    id: SETTINGS_ROW_ID,
                    value: settings,
                },
                "settings",
            )
            .await?;
        Ok(row.value)
    }
}

/// Wire name of a serde-serialized unit variant.
fn status_str<T: Serialize>(status: &T) -> Result<String, StoreError> {
    match serde_json::to_value(status) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Ok(other.to_string()),
        Err(e) => Err(StoreError::JsonDeserialization {
            context: "encode status filter",
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store(server: &MockServer) -> SupabaseStore {
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        SupabaseStore::try_new(&url, "service-key").unwrap()
    }

    fn order_json(id: i64, user: Uuid, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": user,
            "service_id": 3,
            "link": "https://instagram.com/p/abc",
            "quantity": 1000,
            "charge": 1.5,
            "status": status,
            "provider_order_id": null,
            "start_count": null,
            "remains": null,
            "error": null,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn select_sends_keys_and_filters() {
        let server = MockServer::start().await;
        let user = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/rest/v1/orders"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .and(query_param("user_id", format!("eq.{user}")))
            .and(query_param("status", "eq.processing"))
            .and(query_param("order", "id.desc"))
            .and(query_param("limit", "20"))
            .and(query_param("offset", "20"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([order_json(7, user, "processing")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let orders = store(&server)
            .await
            .list_orders(
                &OrderFilter {
                    user_id: Some(user),
                    status: Some(OrderStatus::Processing),
                },
                Page {
                    page: 2,
                    per_page: 20,
                },
            )
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].charge, Decimal::new(15, 1));
        assert_eq!(orders[0].status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn balance_change_goes_through_rpc() {
        let server = MockServer::start().await;
        let user = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/apply_balance_change"))
            .and(body_json(json!({
                "p_user_id": user,
                "p_delta": "-1.5",
                "p_kind": "order_charge",
                "p_reference": "order:7"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 11,
                "user_id": user,
                "amount": -1.5,
                "kind": "order_charge",
                "reference": "order:7",
                "balance_after": 8.5,
                "created_at": "2024-05-01T10:00:00Z"
            })))
            .mount(&server)
            .await;

        let entry = store(&server)
            .await
            .apply_balance_change(
                user,
                Decimal::new(-15, 1),
                LedgerKind::OrderCharge,
                Some("order:7".into()),
            )
            .await
            .unwrap();
        assert_eq!(entry.balance_after, Decimal::new(85, 1));
    }

    #[tokio::test]
    async fn raised_exceptions_map_to_store_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/apply_balance_change"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "P0001",
                "message": "insufficient_balance",
                "details": "0.75",
                "hint": null
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .apply_balance_change(Uuid::new_v4(), Decimal::NEGATIVE_ONE, LedgerKind::OrderCharge, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::InsufficientBalance { available } if available == Decimal::new(75, 2))
        );
    }

    #[tokio::test]
    async fn unique_violation_is_a_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profiles"))
            .and(header("prefer", RETURN_REPRESENTATION))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"profiles_pkey\"",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .create_profile(NewProfile {
                id: Uuid::new_v4(),
                email: "a@example.com".into(),
                username: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_transition_returns_none() {
        let server = MockServer::start().await;
        let user = Uuid::new_v4();
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/payments"))
            .and(query_param("id", "eq.5"))
            .and(query_param("status", "eq.pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/payments"))
            .and(query_param("id", "eq.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 5,
                "user_id": user,
                "method": "manual",
                "amount": 10,
                "currency": "USD",
                "status": "completed",
                "reference": "TX-9",
                "invoice_url": null,
                "note": null,
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:05:00Z"
            }])))
            .mount(&server)
            .await;

        let result = store(&server)
            .await
            .transition_payment(5, PaymentStatus::Pending, PaymentStatus::Completed, None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn order_transition_filters_on_current_status() {
        let server = MockServer::start().await;
        let user = Uuid::new_v4();
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/orders"))
            .and(query_param("id", "eq.7"))
            .and(query_param("status", "eq.processing"))
            .and(header("prefer", RETURN_REPRESENTATION))
            .and(body_json(json!({ "status": "canceled" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/orders"))
            .and(query_param("id", "eq.7"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([order_json(7, user, "canceled")])),
            )
            .mount(&server)
            .await;

        let result = store(&server)
            .await
            .transition_order(
                7,
                OrderStatus::Processing,
                OrderUpdate::status(OrderStatus::Canceled),
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn missing_settings_fall_back_to_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/settings"))
            .and(query_param("id", "eq.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let settings = store(&server).await.get_settings().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn server_errors_keep_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = store(&server).await.get_order(1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::HttpStatus { status, ref body, .. }
                if status == reqwest::StatusCode::SERVICE_UNAVAILABLE && body == "upstream down"
        ));
    }
}
