//! HTTP surface: JSON API, page routes and static assets.

use crate::engine::{EngineError, EngineHandle};
use crate::gate::{self, GateError, GateOutcome};
use crate::history::{self, HistoryOutcome, LoginEntry};
use crate::pages;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use facegate_audit::AuditStore;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};

/// Shared handler state.
pub struct AppState {
    pub engine: EngineHandle,
    pub audit: AuditStore,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// `data:<mime>;base64,<payload>` snapshot from the browser.
    pub image: String,
}

/// Internal failure during a login attempt. Distinct from a denial.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Gate(#[from] GateError),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "login attempt failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Build the application router with cookie sessions attached.
pub fn router(state: AppState, secure_cookies: bool) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name("facegate_session")
        .with_secure(secure_cookies);

    Router::new()
        .route("/", get(pages::index))
        .route("/dashboard", get(pages::dashboard))
        .route("/logout", get(pages::logout))
        .route("/static/js/login.js", get(pages::login_js))
        .route("/static/js/dashboard.js", get(pages::dashboard_js))
        .route("/api/login", post(api_login))
        .route("/api/logins", get(api_logins))
        .route("/health", get(health))
        .layer(sessions)
        .with_state(Arc::new(state))
}

async fn api_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, LoginError> {
    let Json(req) = body?;
    let result = state.engine.identify(req.image).await?;

    let body = match gate::on_attempt(result, &session, &state.audit).await? {
        GateOutcome::Granted { identity, redirect } => {
            tracing::debug!(%identity, redirect, "redirecting to dashboard");
            json!({ "success": true, "redirect": redirect })
        }
        GateOutcome::Denied { message } => json!({ "success": false, "message": message }),
    };
    Ok(Json(body))
}

async fn api_logins(State(state): State<Arc<AppState>>, session: Session) -> Response {
    match history::recent(&session, &state.audit).await {
        Ok(HistoryOutcome::Records(records)) => {
            let entries: Vec<LoginEntry> = records.into_iter().map(LoginEntry::from).collect();
            Json(entries).into_response()
        }
        Ok(HistoryOutcome::Unauthorized) => (StatusCode::UNAUTHORIZED, Json(json!([]))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "history read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "gallery": state.engine.gallery_len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use crate::engine::tests::{alice_bob, data_url, RowEncoder};
    use axum::body::Body;
    use axum::http::{header, Request};
    use facegate_core::FirstMatchMatcher;
    use tower::ServiceExt;

    async fn app() -> (Router, AuditStore) {
        let audit = AuditStore::open_in_memory().await.unwrap();
        let engine =
            spawn_engine(Box::new(RowEncoder), alice_bob(), FirstMatchMatcher::default(), 4).unwrap();
        let router = router(
            AppState {
                engine,
                audit: audit.clone(),
            },
            false,
        );
        (router, audit)
    }

    fn login_request(image: &str) -> Request<Body> {
        Request::post("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "image": image }).to_string()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_cookie(resp: &Response) -> String {
        let raw = resp
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_match_redirects_and_records() {
        let (app, audit) = app().await;

        let resp = app.oneshot(login_request(&data_url(&[[30, 0, 0]]))).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(header::SET_COOKIE));
        assert_eq!(json_body(resp).await, json!({ "success": true, "redirect": "/dashboard" }));
        assert_eq!(audit.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_login_no_match_denied_without_record() {
        let (app, audit) = app().await;

        // (0.5, 0.49) is 0.7 from both alice and bob.
        let resp = app
            .oneshot(login_request(&data_url(&[[50, 49, 0]])))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({ "success": false, "message": "Access Denied: Face not recognized." })
        );
        assert_eq!(audit.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login_no_face_denied() {
        let (app, audit) = app().await;
        let resp = app.oneshot(login_request(&data_url(&[]))).await.unwrap();
        assert_eq!(json_body(resp).await["success"], json!(false));
        assert_eq!(audit.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login_bad_payload_is_server_error() {
        let (app, audit) = app().await;

        let resp = app
            .oneshot(login_request("data:image/png;base64,!!!"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert_eq!(audit.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login_missing_image_field_is_server_error() {
        let (app, _) = app().await;
        let req = Request::post("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["success"], json!(false));
    }

    #[tokio::test]
    async fn test_login_audit_failure_is_server_error() {
        let (app, audit) = app().await;
        audit.close().await.unwrap();

        let resp = app.oneshot(login_request(&data_url(&[[30, 0, 0]]))).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["success"], json!(false));
        assert!(body.get("redirect").is_none());
    }

    #[tokio::test]
    async fn test_logins_requires_session() {
        let (app, audit) = app().await;
        audit.append("alice").await.unwrap();

        let resp = app
            .oneshot(Request::get("/api/logins").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await, json!([]));
    }

    #[tokio::test]
    async fn test_logins_after_login_newest_first() {
        let (app, audit) = app().await;
        for i in 0..24 {
            audit.append(&format!("user{i}")).await.unwrap();
        }

        let login = app
            .clone()
            .oneshot(login_request(&data_url(&[[100, 0, 0]])))
            .await
            .unwrap();
        let cookie = session_cookie(&login);

        let resp = app
            .oneshot(
                Request::get("/api/logins")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0]["username"], json!("bob"));
        assert_eq!(rows[1]["username"], json!("user23"));
        let ts = rows[0]["timestamp"].as_str().unwrap();
        assert!(ts.ends_with(" AM") || ts.ends_with(" PM"), "timestamp {ts}");
        assert_eq!(ts.len(), "2024-01-01 12:00:00 AM".len());
    }

    #[tokio::test]
    async fn test_login_rotates_session_id() {
        let (app, _) = app().await;

        let first = app
            .clone()
            .oneshot(login_request(&data_url(&[[30, 0, 0]])))
            .await
            .unwrap();
        let old_cookie = session_cookie(&first);

        let mut relogin = login_request(&data_url(&[[100, 0, 0]]));
        relogin
            .headers_mut()
            .insert(header::COOKIE, old_cookie.parse().unwrap());
        let second = app.clone().oneshot(relogin).await.unwrap();
        let new_cookie = session_cookie(&second);
        assert_ne!(new_cookie, old_cookie);

        let stale = app
            .oneshot(
                Request::get("/api/logins")
                    .header(header::COOKIE, old_cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_reports_gallery() {
        let (app, _) = app().await;
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(resp).await["gallery"], json!(2));
    }
}
