//! HTTP endpoints of the storefront.
//!
//! Handlers stay thin: they authenticate through the [`AuthUser`](crate::auth::AuthUser) and
//! [`AdminUser`](crate::auth::AdminUser) extractors, check ownership, and hand the rest to
//! the desks held in [`AppState`]. Every failure is an [`ApiError`] rendered as
//! `{"error": ..}` with the matching status code.

mod account;
mod admin;
mod orders;
mod payments;
mod tickets;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post, put};
use serde_json::json;
use smm_types::settings::PublicConfig;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(get_health))
        .route("/config/public", get(get_public_config))
        .route("/auth/signup", post(account::post_signup))
        .route("/auth/login", post(account::post_login))
        .route("/auth/me", get(account::get_me))
        .route("/balance/ledger", get(account::get_ledger))
        .route("/services", get(orders::get_services))
        .route("/orders", get(orders::get_orders).post(orders::post_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/refresh", post(orders::post_order_refresh))
        .route("/payments", get(payments::get_payments))
        .route("/payments/manual", post(payments::post_manual_payment))
        .route("/payments/crypto", post(payments::post_crypto_payment))
        .route(
            "/payments/crypto/callback",
            post(payments::post_crypto_callback),
        )
        .route("/tickets", get(tickets::get_tickets).post(tickets::post_ticket))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}/messages", post(tickets::post_ticket_message))
        .route("/tickets/{id}/close", post(tickets::post_ticket_close))
        .merge(admin_routes())
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(admin::get_users))
        .route("/admin/users/{id}/balance", post(admin::post_user_balance))
        .route("/admin/orders", get(admin::get_orders))
        .route("/admin/orders/{id}/cancel", post(admin::post_order_cancel))
        .route("/admin/payments", get(admin::get_payments))
        .route(
            "/admin/payments/{id}/approve",
            post(admin::post_payment_approve),
        )
        .route("/admin/payments/{id}/reject", post(admin::post_payment_reject))
        .route(
            "/admin/services",
            get(admin::get_services).post(admin::post_service),
        )
        .route("/admin/services/{id}/active", post(admin::post_service_active))
        .route("/admin/providers/{id}/sync", post(admin::post_provider_sync))
        .route(
            "/admin/providers/{id}/balance",
            get(admin::get_provider_balance),
        )
        .route("/admin/tickets", get(admin::get_tickets))
        .route("/admin/tickets/{id}", get(admin::get_ticket))
        .route("/admin/tickets/{id}/messages", post(admin::post_ticket_message))
        .route("/admin/tickets/{id}/close", post(admin::post_ticket_close))
        .route("/admin/settings", put(admin::put_settings))
}

/// `GET /health`
pub async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /config/public`: site settings for anonymous visitors, served from cache.
pub async fn get_public_config(
    State(state): State<AppState>,
) -> Result<Json<PublicConfig>, ApiError> {
    let config = state
        .public_config
        .get_or_load(state.store.as_ref())
        .await?;
    Ok(Json(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_token;
    use crate::identity::{IdentityError, IdentityProvider, IdentityUser, Session, SignUp};
    use crate::state::Components;
    use crate::store::{MemoryStore, Store};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use smm_types::catalog::ServiceDraft;
    use smm_upstream::{ProviderClient, ProviderRegistry};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "test-jwt-secret-with-enough-length-for-hs256";
    const ADMIN_EMAIL: &str = "owner@example.com";

    struct FakeIdentity {
        user: Uuid,
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn sign_up(
            &self,
            email: &str,
            _password: &str,
            _username: Option<&str>,
        ) -> Result<SignUp, IdentityError> {
            Ok(SignUp {
                user: IdentityUser {
                    id: self.user,
                    email: Some(email.to_string()),
                },
                session: None,
            })
        }

        async fn sign_in(&self, email: &str, _password: &str) -> Result<Session, IdentityError> {
            Ok(Session {
                access_token: test_token(SECRET, self.user, email),
                refresh_token: "refresh".into(),
                expires_in: 3600,
                user: IdentityUser {
                    id: self.user,
                    email: Some(email.to_string()),
                },
            })
        }
    }

    struct Harness {
        app: Router,
        store: Arc<MemoryStore>,
        server: MockServer,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let api_url = Url::parse(&format!("{}/api/v2", server.uri())).unwrap();
        let state: AppState = Components {
            store: store.clone(),
            identity: Arc::new(FakeIdentity {
                user: Uuid::new_v4(),
            }),
            jwt_secret: SECRET.to_string(),
            providers: ProviderRegistry::new([ProviderClient::new("main", api_url, "key")]),
            markups: BTreeMap::from([("main".to_string(), Decimal::from(20))]),
            crypto: None,
            public_config_ttl: Duration::from_secs(60),
            admin_emails: vec![ADMIN_EMAIL.to_string()],
        }
        .into();
        Harness {
            app: routes().with_state(state),
            store,
            server,
        }
    }

    impl Harness {
        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => request.body(Body::empty()),
            }
            .unwrap();
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn active_service(&self) -> i64 {
            self.store
                .upsert_service(ServiceDraft {
                    provider_id: "main".into(),
                    provider_service_id: "101".into(),
                    name: "Instagram Followers".into(),
                    category: "Instagram".into(),
                    description: None,
                    rate: Decimal::from(2),
                    min: 100,
                    max: 10_000,
                    active: true,
                    refill: false,
                    cancel: false,
                })
                .await
                .unwrap()
                .id
        }
    }

    fn user_token() -> (Uuid, String) {
        let user = Uuid::new_v4();
        (user, test_token(SECRET, user, "buyer@example.com"))
    }

    fn admin_token() -> String {
        test_token(SECRET, Uuid::new_v4(), ADMIN_EMAIL)
    }

    #[tokio::test]
    async fn health_and_public_config_are_anonymous() {
        let h = harness().await;
        let (status, body) = h.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = h.call(Method::GET, "/config/public", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["site_name"], "SMM Panel");
        assert_eq!(body["crypto_enabled"], false);
    }

    #[tokio::test]
    async fn me_requires_token_and_creates_profile() {
        let h = harness().await;
        let (status, _) = h.call(Method::GET, "/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = h
            .call(Method::GET, "/auth/me", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (user, token) = user_token();
        let (status, body) = h.call(Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user.to_string());
        assert_eq!(body["balance"], "0");
        assert!(h.store.get_profile(user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn signup_creates_profile() {
        let h = harness().await;
        let (status, body) = h
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "New@Example.com", "password": "hunter22", "username": "neo" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();
        let profile = h.store.get_profile(id).await.unwrap().unwrap();
        assert_eq!(profile.email, "new@example.com");
        assert_eq!(profile.username.as_deref(), Some("neo"));

        let (status, _) = h
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "x@example.com", "password": "123" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn order_flow_through_admin_credit() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(body_string_contains("action=add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 555 })))
            .mount(&h.server)
            .await;
        let service_id = h.active_service().await;
        let (user, token) = user_token();
        h.call(Method::GET, "/auth/me", Some(&token), None).await;

        let order = json!({ "service_id": service_id, "link": "https://instagram.com/x", "quantity": 1000 });
        let (status, body) = h
            .call(Method::POST, "/orders", Some(&token), Some(order.clone()))
            .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["required"], "2");
        assert_eq!(body["available"], "0");

        let (status, _) = h
            .call(
                Method::POST,
                &format!("/admin/users/{user}/balance"),
                Some(&token),
                Some(json!({ "delta": "5", "reason": "bonus" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = h
            .call(
                Method::POST,
                &format!("/admin/users/{user}/balance"),
                Some(&admin_token()),
                Some(json!({ "delta": "5", "reason": "bonus" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "adjustment");

        let (status, body) = h
            .call(Method::POST, "/orders", Some(&token), Some(order))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "processing");
        assert_eq!(body["provider_order_id"], "555");
        let order_id = body["id"].as_i64().unwrap();

        let (status, body) = h.call(Method::GET, "/orders", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, stranger) = user_token();
        let (status, _) = h
            .call(Method::GET, &format!("/orders/{order_id}"), Some(&stranger), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = h
            .call(Method::GET, "/auth/me", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], "3");

        let (status, body) = h
            .call(Method::GET, "/balance/ledger?per_page=10", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn admin_balance_adjustment_rules() {
        let h = harness().await;
        let (user, token) = user_token();
        h.call(Method::GET, "/auth/me", Some(&token), None).await;
        let uri = format!("/admin/users/{user}/balance");
        let admin = admin_token();

        let (status, _) = h
            .call(Method::POST, &uri, Some(&admin), Some(json!({ "delta": 0, "reason": "x" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = h
            .call(Method::POST, &uri, Some(&admin), Some(json!({ "delta": 1, "reason": " " })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = h
            .call(Method::POST, &uri, Some(&admin), Some(json!({ "delta": -1, "reason": "chargeback" })))
            .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["required"], "1");
        assert_eq!(body["available"], "0");
        let (status, _) = h
            .call(
                Method::POST,
                &format!("/admin/users/{}/balance", Uuid::new_v4()),
                Some(&admin),
                Some(json!({ "delta": 1, "reason": "typo" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn settings_update_refreshes_public_config() {
        let h = harness().await;
        let admin = admin_token();
        h.call(Method::GET, "/config/public", None, None).await;

        let mut settings = serde_json::to_value(smm_types::settings::Settings::default()).unwrap();
        settings["currency"] = json!("EURO");
        let (status, _) = h
            .call(Method::PUT, "/admin/settings", Some(&admin), Some(settings.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        settings["currency"] = json!("EUR");
        settings["site_name"] = json!("Boost Shop");
        let (status, _) = h
            .call(Method::PUT, "/admin/settings", Some(&admin), Some(settings))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = h.call(Method::GET, "/config/public", None, None).await;
        assert_eq!(body["site_name"], "Boost Shop");
        assert_eq!(body["currency"], "EUR");
    }

    #[tokio::test]
    async fn manual_payment_approved_by_admin() {
        let h = harness().await;
        let (_, token) = user_token();
        h.call(Method::GET, "/auth/me", Some(&token), None).await;

        let (status, body) = h
            .call(
                Method::POST,
                "/payments/manual",
                Some(&token),
                Some(json!({ "amount": "12.50", "reference": "TX-42" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().unwrap();

        let admin = admin_token();
        let (status, body) = h
            .call(Method::GET, "/admin/payments?status=pending", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/admin/payments/{id}/approve");
        let (status, body) = h.call(Method::POST, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        let (status, _) = h.call(Method::POST, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = h.call(Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(body["balance"], "12.5");
    }

    #[tokio::test]
    async fn crypto_endpoints_unavailable_without_gateway() {
        let h = harness().await;
        let (_, token) = user_token();
        let (status, _) = h
            .call(
                Method::POST,
                "/payments/crypto",
                Some(&token),
                Some(json!({ "amount": 10 })),
            )
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = h
            .call(
                Method::POST,
                "/payments/crypto/callback",
                None,
                Some(json!({ "order_id": "1" })),
            )
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ticket_conversation_between_customer_and_staff() {
        let h = harness().await;
        let (_, token) = user_token();
        let admin = admin_token();

        let (status, body) = h
            .call(
                Method::POST,
                "/tickets",
                Some(&token),
                Some(json!({ "subject": "Slow delivery", "message": "Order 12 is slow" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "open");
        assert_eq!(body["subject"], "Slow delivery");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        let id = body["id"].as_i64().unwrap();

        let (status, body) = h
            .call(
                Method::POST,
                &format!("/admin/tickets/{id}/messages"),
                Some(&admin),
                Some(json!({ "message": "It is on its way" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "answered");
        assert_eq!(body["messages"][1]["staff"], true);

        let (status, body) = h
            .call(Method::GET, &format!("/admin/tickets/{id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        let (status, body) = h
            .call(Method::GET, "/admin/tickets?status=answered", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, stranger) = user_token();
        let (status, _) = h
            .call(Method::GET, &format!("/tickets/{id}"), Some(&stranger), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = h
            .call(Method::POST, &format!("/tickets/{id}/close"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "closed");
    }

    #[tokio::test]
    async fn services_listing_hides_inactive() {
        let h = harness().await;
        let id = h.active_service().await;
        let admin = admin_token();

        let (_, body) = h.call(Method::GET, "/services", None, None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = h
            .call(
                Method::POST,
                &format!("/admin/services/{id}/active"),
                Some(&admin),
                Some(json!({ "active": false })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = h.call(Method::GET, "/services", None, None).await;
        assert!(body.as_array().unwrap().is_empty());
        let (_, body) = h.call(Method::GET, "/admin/services", Some(&admin), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }
}
