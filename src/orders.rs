//! Order placement and provider synchronisation.
//!
//! Placing an order is a straight sequence: validate, debit the balance, forward to the
//! provider, and refund if the provider refuses. There is no transaction spanning the
//! database and the provider; a crash between the debit and the provider call leaves a
//! `pending` order with its charge taken, visible to admins who can cancel and refund it.

use rust_decimal::Decimal;
use serde::Deserialize;
use smm_types::account::{LedgerKind, order_reference};
use smm_types::money::{order_charge, partial_refund};
use smm_types::order::{NewOrder, Order, OrderStatus, OrderUpdate};
use smm_upstream::{ProviderClient, ProviderRegistry};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::{Store, StoreError};

pub const MAX_LINK_LEN: usize = 2048;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceOrder {
    pub service_id: i64,
    pub link: String,
    pub quantity: u32,
}

/// Trims a target link and checks it is a single non-empty token of sane length.
pub fn clean_link(link: &str) -> Result<&str, ApiError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(ApiError::validation("link is required"));
    }
    if link.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("link must not contain whitespace"));
    }
    if link.chars().count() > MAX_LINK_LEN {
        return Err(ApiError::validation("link is too long"));
    }
    Ok(link)
}

pub struct OrderDesk {
    store: Arc<dyn Store>,
    providers: Arc<ProviderRegistry>,
}

impl OrderDesk {
    pub fn new(store: Arc<dyn Store>, providers: Arc<ProviderRegistry>) -> Self {
        Self { store, providers }
    }

    #[instrument(skip_all, fields(user_id = %user_id, service_id = request.service_id, quantity = request.quantity))]
    pub async fn place_order(&self, user_id: Uuid, request: PlaceOrder) -> Result<Order, ApiError> {
        let service = self
            .store
            .get_service(request.service_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| ApiError::BadRequest("service unavailable".to_string()))?;

        let link = clean_link(&request.link)?;
        if !service.accepts_quantity(request.quantity) {
            return Err(ApiError::validation(format!(
                "quantity must be between {} and {}",
                service.min, service.max
            )));
        }
        let charge = order_charge(service.rate, request.quantity);
        if charge <= Decimal::ZERO {
            return Err(ApiError::validation("order total is too small"));
        }

        let available = self
            .store
            .get_profile(user_id)
            .await?
            .map(|p| p.balance)
            .unwrap_or(Decimal::ZERO);
        if available < charge {
            return Err(ApiError::InsufficientBalance {
                required: Some(charge),
                available,
            });
        }

        let order = self
            .store
            .insert_order(NewOrder {
                user_id,
                service_id: service.id,
                link: link.to_string(),
                quantity: request.quantity,
                charge,
                status: OrderStatus::Pending,
            })
            .await?;

        match self
            .store
            .apply_balance_change(
                user_id,
                -charge,
                LedgerKind::OrderCharge,
                Some(order_reference(order.id)),
            )
            .await
        {
            Ok(_) => {}
            Err(StoreError::InsufficientBalance { available }) => {
                self.store
                    .update_order(order.id, OrderUpdate::failed("insufficient balance"))
                    .await?;
                return Err(ApiError::InsufficientBalance {
                    required: Some(charge),
                    available,
                });
            }
            Err(err) => {
                tracing::error!(order_id = order.id, error = %err, "Failed to charge order");
                self.store
                    .update_order(order.id, OrderUpdate::failed("charge failed"))
                    .await?;
                return Err(err.into());
            }
        }

        let Some(provider) = self.providers.by_id(&service.provider_id) else {
            tracing::error!(
                order_id = order.id,
                provider_id = %service.provider_id,
                "Service points to an unconfigured provider"
            );
            self.fail_and_refund(&order, "provider unavailable").await?;
            return Err(ApiError::Upstream("provider unavailable".to_string()));
        };

        match provider
            .add_order(&service.provider_service_id, link, request.quantity)
            .await
        {
            Ok(provider_order_id) => {
                let update = OrderUpdate {
                    status: Some(OrderStatus::Processing),
                    provider_order_id: Some(provider_order_id),
                    ..OrderUpdate::default()
                };
                match self
                    .store
                    .transition_order(order.id, OrderStatus::Pending, update)
                    .await?
                {
                    Some(order) => {
                        tracing::info!(order_id = order.id, charge = %charge, "Order placed");
                        Ok(order)
                    }
                    None => {
                        tracing::warn!(order_id = order.id, "Order settled while being forwarded");
                        self.current(order.id).await
                    }
                }
            }
            Err(err) => {
                let message = err.customer_message();
                tracing::warn!(order_id = order.id, error = %err, "Provider refused order");
                self.fail_and_refund(&order, &message).await?;
                Err(ApiError::Upstream(message))
            }
        }
    }

    /// Pulls the provider's view of a live order and applies it.
    #[instrument(skip_all, fields(order_id = order.id))]
    pub async fn refresh_order(&self, order: Order) -> Result<Order, ApiError> {
        if order.status.is_terminal() {
            return Ok(order);
        }
        let Some(provider_order_id) = order.provider_order_id.clone() else {
            return Ok(order);
        };
        let provider = self.provider_for(&order).await?;
        let remote = provider.order_status(&provider_order_id).await?;

        let mut update = OrderUpdate {
            start_count: remote.start_count,
            remains: remote.remains,
            ..OrderUpdate::default()
        };
        let mapped = OrderStatus::from_provider(&remote.status);
        if mapped.is_none() {
            tracing::warn!(status = %remote.status, "Unknown provider status");
        }
        let Some(next) = mapped.filter(|s| *s != order.status) else {
            return Ok(self.store.update_order(order.id, update).await?);
        };
        update.status = Some(next);
        let Some(updated) = self
            .store
            .transition_order(order.id, order.status, update)
            .await?
        else {
            tracing::debug!("Order changed concurrently, keeping stored state");
            return self.current(order.id).await;
        };

        let refund = match next {
            OrderStatus::Canceled => order.charge,
            OrderStatus::Partial => partial_refund(
                order.charge,
                updated.remains.unwrap_or(0),
                order.quantity,
            ),
            _ => Decimal::ZERO,
        };
        if refund > Decimal::ZERO {
            self.refund(&updated, refund).await?;
        }
        tracing::info!(from = %order.status, to = %next, refund = %refund, "Order status changed");
        Ok(updated)
    }

    /// Admin cancellation: asks the provider to stop, then refunds the full charge.
    #[instrument(skip_all, fields(order_id = order.id))]
    pub async fn cancel_order(&self, order: Order) -> Result<Order, ApiError> {
        if order.status.is_terminal() {
            return Err(ApiError::Conflict(format!("order is already {}", order.status)));
        }
        if let Some(provider_order_id) = order.provider_order_id.as_deref() {
            match self.provider_for(&order).await {
                Ok(provider) => {
                    if let Err(err) = provider.cancel(provider_order_id).await {
                        tracing::warn!(error = %err, "Provider cancel failed, cancelling locally");
                    }
                }
                Err(err) => tracing::warn!(error = %err, "No provider to cancel with"),
            }
        }
        let updated = self
            .store
            .transition_order(order.id, order.status, OrderUpdate::status(OrderStatus::Canceled))
            .await?;
        let Some(updated) = updated else {
            let current = self.current(order.id).await?;
            return Err(ApiError::Conflict(format!("order is already {}", current.status)));
        };
        self.refund(&updated, order.charge).await?;
        tracing::info!(refund = %order.charge, "Order cancelled by admin");
        Ok(updated)
    }

    async fn provider_for(&self, order: &Order) -> Result<&ProviderClient, ApiError> {
        let service = self
            .store
            .get_service(order.service_id)
            .await?
            .ok_or_else(|| ApiError::not_found("service"))?;
        self.providers
            .by_id(&service.provider_id)
            .ok_or_else(|| ApiError::Upstream("provider unavailable".to_string()))
    }

    /// Fails a pending order and refunds its charge, unless it already left `pending`.
    async fn fail_and_refund(&self, order: &Order, reason: &str) -> Result<(), ApiError> {
        let failed = self
            .store
            .transition_order(order.id, OrderStatus::Pending, OrderUpdate::failed(reason))
            .await?;
        if failed.is_some() {
            self.refund(order, order.charge).await?;
        }
        Ok(())
    }

    async fn current(&self, id: i64) -> Result<Order, ApiError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ApiError::not_found("order"))
    }

    async fn refund(&self, order: &Order, amount: Decimal) -> Result<(), ApiError> {
        self.store
            .apply_balance_change(
                order.user_id,
                amount,
                LedgerKind::Refund,
                Some(order_reference(order.id)),
            )
            .await
            .inspect_err(|e| {
                tracing::error!(order_id = order.id, amount = %amount, error = %e, "Refund failed");
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use smm_types::account::NewProfile;
    use smm_types::catalog::ServiceDraft;
    use smm_types::page::Page;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        desk: OrderDesk,
        store: Arc<MemoryStore>,
        user: Uuid,
        service_id: i64,
        _server: MockServer,
    }

    async fn fixture(server: MockServer, balance: Decimal) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        store
            .create_profile(NewProfile {
                id: user,
                email: "buyer@example.com".into(),
                username: None,
            })
            .await
            .unwrap();
        if !balance.is_zero() {
            store
                .apply_balance_change(user, balance, LedgerKind::Deposit, None)
                .await
                .unwrap();
        }
        let service = store
            .upsert_service(ServiceDraft {
                provider_id: "main".into(),
                provider_service_id: "101".into(),
                name: "Instagram Followers".into(),
                category: "Instagram".into(),
                description: None,
                rate: Decimal::new(250, 2),
                min: 100,
                max: 10_000,
                active: true,
                refill: false,
                cancel: true,
            })
            .await
            .unwrap();
        let api_url = Url::parse(&format!("{}/api/v2", server.uri())).unwrap();
        let providers = ProviderRegistry::new([ProviderClient::new("main", api_url, "key")]);
        Fixture {
            desk: OrderDesk::new(store.clone(), Arc::new(providers)),
            store,
            user,
            service_id: service.id,
            _server: server,
        }
    }

    fn request(service_id: i64, quantity: u32) -> PlaceOrder {
        PlaceOrder {
            service_id,
            link: "  https://instagram.com/someone  ".into(),
            quantity,
        }
    }

    async fn balance(f: &Fixture) -> Decimal {
        f.store.get_profile(f.user).await.unwrap().unwrap().balance
    }

    async fn mock_action(server: &MockServer, action: &str, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(body_string_contains(format!("action={action}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn links_are_validated() {
        assert_eq!(clean_link(" https://t.me/x ").unwrap(), "https://t.me/x");
        assert!(clean_link("   ").is_err());
        assert!(clean_link("https://a.b/c d").is_err());
        assert!(clean_link(&"x".repeat(MAX_LINK_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn placed_order_is_charged_and_forwarded() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "order": 23501 })).await;
        let f = fixture(server, Decimal::TEN).await;

        let order = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.provider_order_id.as_deref(), Some("23501"));
        assert_eq!(order.link, "https://instagram.com/someone");
        assert_eq!(order.charge, Decimal::new(25, 1));
        assert_eq!(balance(&f).await, Decimal::new(75, 1));
    }

    #[tokio::test]
    async fn provider_rejection_refunds_and_fails_order() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "error": "Incorrect link" })).await;
        let f = fixture(server, Decimal::TEN).await;

        let err = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(ref m) if m == "Incorrect link"));
        assert_eq!(balance(&f).await, Decimal::TEN);

        let orders = f
            .store
            .list_orders(&Default::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(orders[0].status, OrderStatus::Failed);
        assert_eq!(orders[0].error.as_deref(), Some("Incorrect link"));

        let ledger = f.store.list_ledger(f.user, Page::default()).await.unwrap();
        let kinds: Vec<_> = ledger.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![LedgerKind::Refund, LedgerKind::OrderCharge, LedgerKind::Deposit]
        );
    }

    #[tokio::test]
    async fn insufficient_balance_creates_nothing() {
        let server = MockServer::start().await;
        let f = fixture(server, Decimal::ONE).await;

        let err = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::InsufficientBalance { required, available }
                if required == Some(Decimal::new(25, 1)) && available == Decimal::ONE
        ));
        let orders = f
            .store
            .list_orders(&Default::default(), Page::default())
            .await
            .unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn input_is_validated_before_charging() {
        let server = MockServer::start().await;
        let f = fixture(server, Decimal::TEN).await;

        let err = f
            .desk
            .place_order(f.user, request(f.service_id, 50))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = f
            .desk
            .place_order(f.user, request(f.service_id + 1000, 500))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "service unavailable"));

        f.store.set_service_active(f.service_id, false).await.unwrap();
        let err = f
            .desk
            .place_order(f.user, request(f.service_id, 500))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(balance(&f).await, Decimal::TEN);
    }

    #[tokio::test]
    async fn partial_completion_refunds_remains_once() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "order": 9 })).await;
        mock_action(
            &server,
            "status",
            json!({ "charge": "2.5", "start_count": "120", "status": "Partial", "remains": "400", "currency": "USD" }),
        )
        .await;
        let f = fixture(server, Decimal::TEN).await;
        let order = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap();

        let refreshed = f.desk.refresh_order(order).await.unwrap();
        assert_eq!(refreshed.status, OrderStatus::Partial);
        assert_eq!(refreshed.remains, Some(400));
        assert_eq!(refreshed.start_count, Some(120));
        // 2.5 * 400 / 1000
        assert_eq!(balance(&f).await, Decimal::new(85, 1));

        let again = f.desk.refresh_order(refreshed).await.unwrap();
        assert_eq!(again.status, OrderStatus::Partial);
        assert_eq!(balance(&f).await, Decimal::new(85, 1));
    }

    #[tokio::test]
    async fn provider_cancellation_refunds_in_full() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "order": 9 })).await;
        mock_action(&server, "status", json!({ "status": "Canceled", "remains": 1000 })).await;
        let f = fixture(server, Decimal::TEN).await;
        let order = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap();

        let refreshed = f.desk.refresh_order(order).await.unwrap();
        assert_eq!(refreshed.status, OrderStatus::Canceled);
        assert_eq!(balance(&f).await, Decimal::TEN);
    }

    #[tokio::test]
    async fn unknown_status_only_updates_counts() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "order": 9 })).await;
        mock_action(&server, "status", json!({ "status": "Queued", "start_count": 5, "remains": 1000 })).await;
        let f = fixture(server, Decimal::TEN).await;
        let order = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap();

        let refreshed = f.desk.refresh_order(order).await.unwrap();
        assert_eq!(refreshed.status, OrderStatus::Processing);
        assert_eq!(refreshed.start_count, Some(5));
        assert_eq!(balance(&f).await, Decimal::new(75, 1));
    }

    #[tokio::test]
    async fn admin_cancel_refunds_and_rejects_terminal_orders() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "order": 9 })).await;
        mock_action(&server, "cancel", json!([{ "order": 9, "cancel": { "error": "Not supported" } }])).await;
        let f = fixture(server, Decimal::TEN).await;
        let order = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap();

        let canceled = f.desk.cancel_order(order).await.unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(balance(&f).await, Decimal::TEN);

        let err = f.desk.cancel_order(canceled).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(balance(&f).await, Decimal::TEN);
    }

    #[tokio::test]
    async fn concurrent_refreshes_refund_once() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "order": 9 })).await;
        mock_action(&server, "status", json!({ "status": "Canceled", "remains": 1000 })).await;
        let f = fixture(server, Decimal::TEN).await;
        let order = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            f.desk.refresh_order(order.clone()),
            f.desk.refresh_order(order.clone())
        );
        assert_eq!(a.unwrap().status, OrderStatus::Canceled);
        assert_eq!(b.unwrap().status, OrderStatus::Canceled);
        assert_eq!(balance(&f).await, Decimal::TEN);

        let ledger = f.store.list_ledger(f.user, Page::default()).await.unwrap();
        let refunds = ledger.iter().filter(|e| e.kind == LedgerKind::Refund).count();
        assert_eq!(refunds, 1);
    }

    #[tokio::test]
    async fn refresh_racing_admin_cancel_refunds_once() {
        let server = MockServer::start().await;
        mock_action(&server, "add", json!({ "order": 9 })).await;
        mock_action(&server, "status", json!({ "status": "Canceled", "remains": 1000 })).await;
        mock_action(&server, "cancel", json!([{ "order": 9, "cancel": 1 }])).await;
        let f = fixture(server, Decimal::TEN).await;
        let order = f
            .desk
            .place_order(f.user, request(f.service_id, 1000))
            .await
            .unwrap();

        let (refreshed, canceled) = tokio::join!(
            f.desk.refresh_order(order.clone()),
            f.desk.cancel_order(order.clone())
        );
        assert!(refreshed.is_ok() || canceled.is_ok());
        if let Err(err) = canceled {
            assert!(matches!(err, ApiError::Conflict(_)));
        }
        assert_eq!(balance(&f).await, Decimal::TEN);

        // A stale copy of the live order cannot cancel twice either.
        let err = f.desk.cancel_order(order).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(balance(&f).await, Decimal::TEN);
    }

    #[tokio::test]
    async fn unconfigured_provider_refunds_and_fails_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 1 })))
            .expect(0)
            .mount(&server)
            .await;
        let f = fixture(server, Decimal::TEN).await;
        let orphan = f
            .store
            .upsert_service(ServiceDraft {
                provider_id: "retired".into(),
                provider_service_id: "7".into(),
                name: "TikTok Views".into(),
                category: "TikTok".into(),
                description: None,
                rate: Decimal::ONE,
                min: 100,
                max: 10_000,
                active: true,
                refill: false,
                cancel: false,
            })
            .await
            .unwrap();

        let err = f
            .desk
            .place_order(f.user, request(orphan.id, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(ref m) if m == "provider unavailable"));
        assert_eq!(balance(&f).await, Decimal::TEN);

        let orders = f
            .store
            .list_orders(&Default::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(orders[0].status, OrderStatus::Failed);
        assert_eq!(orders[0].error.as_deref(), Some("provider unavailable"));
        let ledger = f.store.list_ledger(f.user, Page::default()).await.unwrap();
        assert_eq!(ledger[0].kind, LedgerKind::Refund);
        assert_eq!(ledger[0].amount, Decimal::ONE);
    }

    fn order_row(user: Uuid, status: &str, error: Option<&str>) -> serde_json::Value {
        json!({
            "id": 41,
            "user_id": user,
            "service_id": 3,
            "link": "https://instagram.com/someone",
            "quantity": 1000,
            "charge": 2.5,
            "status": status,
            "error": error,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn debit_losing_a_race_fails_the_order_without_charging() {
        use crate::store::SupabaseStore;
        use wiremock::matchers::{body_json, path};

        let db = MockServer::start().await;
        let provider = MockServer::start().await;
        let user = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/rest/v1/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 3,
                "provider_id": "main",
                "provider_service_id": "101",
                "name": "Instagram Followers",
                "category": "Instagram",
                "rate": 2.5,
                "min": 100,
                "max": 10000,
                "active": true
            }])))
            .mount(&db)
            .await;
        // The balance read passes the fast check, the debit then finds it spent.
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": user,
                "email": "buyer@example.com",
                "balance": 10,
                "role": "user",
                "created_at": "2024-05-01T10:00:00Z"
            }])))
            .mount(&db)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/orders"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([order_row(user, "pending", None)])),
            )
            .mount(&db)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/apply_balance_change"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "P0001",
                "message": "insufficient_balance",
                "details": "1.0",
                "hint": null
            })))
            .expect(1)
            .mount(&db)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/orders"))
            .and(body_json(json!({ "status": "failed", "error": "insufficient balance" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([order_row(
                user,
                "failed",
                Some("insufficient balance")
            )])))
            .expect(1)
            .mount(&db)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 1 })))
            .expect(0)
            .mount(&provider)
            .await;

        let db_url = Url::parse(&format!("{}/", db.uri())).unwrap();
        let api_url = Url::parse(&format!("{}/api/v2", provider.uri())).unwrap();
        let desk = OrderDesk::new(
            Arc::new(SupabaseStore::try_new(&db_url, "key").unwrap()),
            Arc::new(ProviderRegistry::new([ProviderClient::new("main", api_url, "key")])),
        );

        let err = desk.place_order(user, request(3, 1000)).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::InsufficientBalance { required, available }
                if required == Some(Decimal::new(25, 1)) && available == Decimal::ONE
        ));
    }
}
