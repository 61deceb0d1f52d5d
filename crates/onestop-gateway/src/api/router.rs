//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        // Auth and OTP
        .route("/auth/register", post(handlers::register))
        .route("/auth/register/officer", post(handlers::register_officer))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/otp/request", post(handlers::request_otp))
        .route("/auth/otp/verify", post(handlers::verify_otp))
        // Businesses and teams
        .route("/businesses", post(handlers::create_business))
        .route("/businesses", get(handlers::list_businesses))
        .route("/businesses/:id/members", get(handlers::list_members))
        .route("/businesses/:id/invitations", post(handlers::invite_member))
        .route("/businesses/:id/invitations", get(handlers::list_invitations))
        .route("/invitations/accept", post(handlers::accept_invitation))
        .route("/invitations/:id/revoke", post(handlers::revoke_invitation))
        // Documents
        .route("/documents", post(handlers::upload_document))
        .route("/documents", get(handlers::list_my_documents))
        .route("/documents/:id", get(handlers::get_document))
        .route("/documents/:id/attach", post(handlers::attach_document))
        .route("/documents/:id/verify", post(handlers::verify_document))
        .route("/documents/:id/reject", post(handlers::reject_document))
        // Projects and review
        .route("/projects", post(handlers::create_project))
        .route("/projects", get(handlers::list_projects))
        .route("/projects/:id", get(handlers::get_project))
        .route("/projects/:id", put(handlers::update_project))
        .route("/projects/:id/submit", post(handlers::submit_project))
        .route("/projects/:id/approve", post(handlers::approve_project))
        .route("/projects/:id/reject", post(handlers::reject_project))
        .route("/projects/:id/history", get(handlers::project_history))
        .route(
            "/projects/:id/documents",
            get(handlers::list_project_documents),
        )
        .route(
            "/projects/:id/invoices",
            get(handlers::list_project_invoices),
        )
        // Review chain configuration and the officer queue
        .route("/review/stages/:module", get(handlers::list_stages))
        .route("/review/stages/:module/:name", put(handlers::upsert_stage))
        .route("/review/queue/:module", get(handlers::review_queue))
        // Billing
        .route("/billing/invoices/:id", get(handlers::get_invoice))
        .route("/billing/invoices/:id/pay", post(handlers::pay_invoice))
        .route(
            "/billing/invoices/:id/reconcile",
            post(handlers::reconcile_invoice),
        )
        .route(
            "/billing/invoices/:id/cancel",
            post(handlers::cancel_invoice),
        )
        .route("/billing/callback", post(handlers::payment_callback))
        .route("/billing/outstanding", get(handlers::outstanding_bills))
        // Notifications
        .route("/notifications/devices", post(handlers::register_device))
        .route("/notifications", get(handlers::list_notifications))
        // Admin
        .route("/admin/shutdown", post(handlers::shutdown));

    // Build router with middleware
    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        router = router.layer(cors_layer(&server.cors_origins));
    }

    router.with_state(state)
}

/// No configured origins means any origin; the API carries no cookies.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::SharedStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use onestop_accounts::AccountService;
    use onestop_billing::BillingService;
    use onestop_documents::DocumentService;
    use onestop_mbmb::{MbmbApi, StaticMbmb};
    use onestop_notify::{CaptureSender, NotifyService, OtpSender, OtpService};
    use onestop_review::{PaymentGate, ReviewService};
    use onestop_storage::memory::InMemoryStore;
    use onestop_storage::AccountStore;
    use onestop_types::PlatformRole;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tower::ServiceExt;

    const PASSWORD: &str = "kuat-gila-123";

    struct Harness {
        router: Router,
        store: Arc<InMemoryStore>,
        otp_sender: Arc<CaptureSender>,
        shutdown_rx: watch::Receiver<bool>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let shared: SharedStore = store.clone();
        let mbmb: Arc<dyn MbmbApi> = Arc::new(StaticMbmb::new());
        let otp_sender = Arc::new(CaptureSender::new());
        let sender: Arc<dyn OtpSender> = otp_sender.clone();

        let accounts = Arc::new(AccountService::new(shared.clone()));
        let documents = Arc::new(DocumentService::new(shared.clone()));
        let billing = Arc::new(BillingService::new(shared.clone(), mbmb));
        let gate: Arc<dyn PaymentGate> = billing.clone();
        let review = Arc::new(ReviewService::new(shared.clone(), gate));
        let notify = Arc::new(NotifyService::new(shared.clone()));
        let otp = Arc::new(OtpService::new(shared, sender));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::new(
            accounts,
            documents,
            review,
            billing,
            notify,
            otp,
            "callback-secret".to_string(),
            shutdown_tx,
        );
        let router = create_router(state, &ServerConfig::default());
        Harness {
            router,
            store,
            otp_sender,
            shutdown_rx,
        }
    }

    fn authorized(
        builder: axum::http::request::Builder,
        token: Option<&str>,
    ) -> axum::http::request::Builder {
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    fn get_req(path: &str, token: Option<&str>) -> Request<Body> {
        authorized(Request::builder().method("GET").uri(path), token)
            .body(Body::empty())
            .unwrap()
    }

    fn post_empty(path: &str, token: Option<&str>) -> Request<Body> {
        authorized(Request::builder().method("POST").uri(path), token)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(path: &str, token: Option<&str>, body: Value) -> Request<Body> {
        authorized(Request::builder().method("POST").uri(path), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn put_json(path: &str, token: Option<&str>, body: Value) -> Request<Body> {
        authorized(Request::builder().method("PUT").uri(path), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn callback_req(token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/billing/callback")
            .header(header::CONTENT_TYPE, "application/json")
            .header(handlers::CALLBACK_TOKEN_HEADER, token)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn login(router: &Router, email: &str) -> String {
        let (status, body) = send(
            router,
            post_json(
                "/api/v1/auth/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Register, verify the phone through the captured OTP, and log in.
    async fn register_and_login(
        harness: &Harness,
        name: &str,
        email: &str,
        phone: &str,
        ic: &str,
    ) -> String {
        let (status, _) = send(
            &harness.router,
            post_json(
                "/api/v1/auth/register",
                None,
                json!({
                    "full_name": name,
                    "email": email,
                    "phone": phone,
                    "ic_number": ic,
                    "password": PASSWORD,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &harness.router,
            post_json("/api/v1/auth/otp/request", None, json!({ "phone": phone })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let code = harness.otp_sender.last_code_for(phone).await.unwrap();
        let (status, body) = send(
            &harness.router,
            post_json(
                "/api/v1/auth/otp/verify",
                None,
                json!({ "phone": phone, "code": code }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], json!(true));
        assert_eq!(body["account_updated"], json!(true));

        login(&harness.router, email).await
    }

    /// Register a regular account and promote it straight in the store.
    async fn seed_admin(harness: &Harness) -> String {
        let token = register_and_login(
            harness,
            "Azlan bin Harun",
            "azlan@mbmb.gov.my",
            "+60112000001",
            "750101-04-5001",
        )
        .await;
        let mut admin = harness
            .store
            .get_user_by_email("azlan@mbmb.gov.my")
            .await
            .unwrap()
            .unwrap();
        admin.role = PlatformRole::Admin;
        harness.store.update_user(admin).await.unwrap();
        token
    }

    #[tokio::test]
    async fn health_and_status_are_open() {
        let harness = harness();

        let (status, body) = send(&harness.router, get_req("/api/v1/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("healthy"));

        let (status, body) = send(&harness.router, get_req("/api/v1/status", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn protected_routes_require_a_session() {
        let harness = harness();

        let (status, body) = send(&harness.router, get_req("/api/v1/projects", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], json!("UNAUTHORIZED"));

        let (status, _) = send(
            &harness.router,
            get_req("/api/v1/projects", Some("not-a-real-token")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stage_configuration_is_admin_only() {
        let harness = harness();
        let applicant = register_and_login(
            &harness,
            "Mei Lin Tan",
            "meilin@example.my",
            "+60112000002",
            "880202-04-5002",
        )
        .await;

        let (status, body) = send(
            &harness.router,
            put_json(
                "/api/v1/review/stages/roadworks/screening",
                Some(&applicant),
                json!({ "ordinal": 1 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], json!("FORBIDDEN"));
    }

    #[tokio::test]
    async fn callback_is_gated_by_the_shared_token() {
        let harness = harness();

        let body = json!({ "reference": "MBMB-unknown", "status": "paid" });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/billing/callback")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _) = send(&harness.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Right token, unknown reference.
        let (status, body) = send(
            &harness.router,
            callback_req(
                "callback-secret",
                json!({ "reference": "MBMB-unknown", "status": "paid" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("NOT_FOUND"));

        // Non-paid statuses are acknowledged without touching anything.
        let (status, body) = send(
            &harness.router,
            callback_req(
                "callback-secret",
                json!({ "reference": "MBMB-unknown", "status": "failed" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], json!(false));
    }

    #[tokio::test]
    async fn shutdown_route_flips_the_watch_channel() {
        let harness = harness();
        let admin = seed_admin(&harness).await;
        let applicant = register_and_login(
            &harness,
            "Siti Aminah",
            "siti@example.my",
            "+60112000003",
            "900303-04-5003",
        )
        .await;

        let (status, _) = send(
            &harness.router,
            post_empty("/api/v1/admin/shutdown", Some(&applicant)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!*harness.shutdown_rx.borrow());

        let (status, body) = send(
            &harness.router,
            post_empty("/api/v1/admin/shutdown", Some(&admin)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["shutting_down"], json!(true));
        assert!(*harness.shutdown_rx.borrow());
    }

    /// The whole journey: register and verify, form a business, configure
    /// the chain, upload and verify a document, submit, pay the processing
    /// fee, clear review, pay the permit fee, end approved.
    #[tokio::test]
    async fn full_application_flow() {
        let harness = harness();
        let router = &harness.router;

        let admin = seed_admin(&harness).await;
        let applicant = register_and_login(
            &harness,
            "Farid bin Osman",
            "farid@example.my",
            "+60112000010",
            "850505-04-5010",
        )
        .await;

        // Officer account via the admin route; the phone arrives verified.
        let (status, _) = send(
            router,
            post_json(
                "/api/v1/auth/register/officer",
                Some(&admin),
                json!({
                    "full_name": "Rahim bin Kassim",
                    "email": "rahim@mbmb.gov.my",
                    "phone": "+60112000011",
                    "ic_number": "780808-04-5011",
                    "password": PASSWORD,
                    "role": "officer",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let officer = login(router, "rahim@mbmb.gov.my").await;

        // One-stage review chain for the roadworks module.
        let (status, _) = send(
            router,
            put_json(
                "/api/v1/review/stages/roadworks/screening",
                Some(&admin),
                json!({ "ordinal": 1, "reviewers": ["rahim@mbmb.gov.my"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Business.
        let (status, business) = send(
            router,
            post_json(
                "/api/v1/businesses",
                Some(&applicant),
                json!({ "name": "Osman Trading", "ssm_number": "202301012345" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let business_id = business["id"].as_str().unwrap().to_string();

        // Upload.
        let upload = authorized(
            Request::builder()
                .method("POST")
                .uri("/api/v1/documents?file_name=site-plan.pdf"),
            Some(&applicant),
        )
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from(&b"%PDF-1.7 site plan"[..]))
        .unwrap();
        let (status, document) = send(router, upload).await;
        assert_eq!(status, StatusCode::OK);
        let document_id = document["id"].as_str().unwrap().to_string();
        assert_eq!(document["status"], json!("pending"));

        // Draft project.
        let (status, project) = send(
            router,
            post_json(
                "/api/v1/projects",
                Some(&applicant),
                json!({
                    "business_id": business_id,
                    "module": "roadworks",
                    "title": "Trench crossing at Jalan Hang Jebat",
                    "site_address": "12 Jalan Hang Jebat, 75200 Melaka",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let project_id = project["id"].as_str().unwrap().to_string();
        assert_eq!(project["status"], json!("draft"));

        // Attach, then the officer verifies.
        let (status, _) = send(
            router,
            post_json(
                &format!("/api/v1/documents/{document_id}/attach"),
                Some(&applicant),
                json!({ "project_id": project_id }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, document) = send(
            router,
            post_empty(
                &format!("/api/v1/documents/{document_id}/verify"),
                Some(&officer),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["status"], json!("verified"));

        // Submit; the processing invoice rides along.
        let (status, submitted) = send(
            router,
            post_empty(
                &format!("/api/v1/projects/{project_id}/submit"),
                Some(&applicant),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(submitted["project"]["status"], json!("in_review"));
        let processing = &submitted["processing_invoice"];
        assert_eq!(processing["kind"], json!("processing_fee"));
        assert_eq!(processing["amount_sen"], json!(15_000));
        let processing_id = processing["id"].as_str().unwrap().to_string();

        // Approving before the processing fee settles is refused.
        let (status, body) = send(
            router,
            post_empty(
                &format!("/api/v1/projects/{project_id}/approve"),
                Some(&officer),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], json!("PAYMENT_REQUIRED"));

        // Pay the processing fee through the hosted session.
        let (status, session) = send(
            router,
            post_empty(
                &format!("/api/v1/billing/invoices/{processing_id}/pay"),
                Some(&applicant),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reference = session["reference"].as_str().unwrap().to_string();

        let (status, confirmed) = send(
            router,
            callback_req(
                "callback-secret",
                json!({ "reference": reference, "status": "paid", "receipt_no": "RCT-1001" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["processed"], json!(true));
        assert_eq!(confirmed["invoice"]["status"], json!("paid"));

        // Clear the only stage; the permit invoice is issued.
        let (status, approved) = send(
            router,
            post_json(
                &format!("/api/v1/projects/{project_id}/approve"),
                Some(&officer),
                json!({ "remarks": "Site plan in order" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            approved["project"]["status"],
            json!("pending_permit_payment")
        );
        let permit = &approved["permit_invoice"];
        assert_eq!(permit["kind"], json!("permit_fee"));
        assert_eq!(permit["amount_sen"], json!(250_000));
        let permit_id = permit["id"].as_str().unwrap().to_string();

        // Pay the permit fee; the callback releases the approval.
        let (status, session) = send(
            router,
            post_empty(
                &format!("/api/v1/billing/invoices/{permit_id}/pay"),
                Some(&applicant),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reference = session["reference"].as_str().unwrap().to_string();

        let (status, confirmed) = send(
            router,
            callback_req(
                "callback-secret",
                json!({ "reference": reference, "status": "paid", "receipt_no": "RCT-1002" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["processed"], json!(true));

        let (status, project) = send(
            router,
            get_req(&format!("/api/v1/projects/{project_id}"), Some(&applicant)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(project["status"], json!("approved"));

        // A replayed callback stays idempotent.
        let (status, confirmed) = send(
            router,
            callback_req(
                "callback-secret",
                json!({ "reference": reference, "status": "paid", "receipt_no": "RCT-1002" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["processed"], json!(true));

        // The decision trail recorded both stage outcomes.
        let (status, history) = send(
            router,
            get_req(
                &format!("/api/v1/projects/{project_id}/history"),
                Some(&applicant),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!history.as_array().unwrap().is_empty());

        // Review and payment milestones landed in the applicant's feed.
        let (status, feed) = send(router, get_req("/api/v1/notifications", Some(&applicant))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!feed.as_array().unwrap().is_empty());
    }
}
