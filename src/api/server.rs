use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_rule, deactivate_rule, health_check, list_rules, stats, test_rule, AppState,
};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Delivery counters
        .route("/stats", get(stats))
        // Rule administration
        .route("/rules", get(list_rules))
        .route("/rules", post(create_rule))
        .route("/rules/:id", delete(deactivate_rule))
        .route("/rules/:id/test", post(test_rule))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn run_server<F>(
    host: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting borderwatch API on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("borderwatch API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertRule, Dispatcher, MessageContext};
    use crate::gateway::testing::RecordingGateway;
    use crate::stats::DeliveryStats;
    use crate::store::MemoryRuleStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    struct TestApp {
        app: Router,
        store: Arc<MemoryRuleStore>,
        email: Arc<RecordingGateway>,
        stats: Arc<DeliveryStats>,
    }

    fn create_test_app() -> TestApp {
        let store = Arc::new(MemoryRuleStore::new());
        let email = Arc::new(RecordingGateway::new());
        let stats = Arc::new(DeliveryStats::new());
        let dispatcher = Arc::new(Dispatcher::new(
            email.clone(),
            Arc::new(RecordingGateway::new()),
            MessageContext {
                crossing: "San Ysidro".to_string(),
                dashboard_url: "http://localhost/alerts".to_string(),
            },
            stats.clone(),
        ));
        let state = Arc::new(AppState {
            store: store.clone(),
            stats: stats.clone(),
            dispatcher,
        });
        TestApp {
            app: build_router(state),
            store,
            email,
            stats,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let t = create_test_app();

        let response = t
            .app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_list_and_deactivate() {
        let t = create_test_app();

        let response = t
            .app
            .clone()
            .oneshot(post_json(
                "/rules",
                serde_json::json!({
                    "type": "standard",
                    "condition": "below",
                    "waitTime": 30,
                    "email": "a@x.com",
                    "smsEmail": "5551234567@txt.example"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["rule"]["smsEmail"], "5551234567@txt.example");

        let response = t
            .app
            .clone()
            .oneshot(Request::builder().uri("/rules").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed = body_json(response).await;
        assert_eq!(listed["rules"].as_array().unwrap().len(), 1);

        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/rules/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!t.store.get(1).unwrap().active);

        let response = t
            .app
            .oneshot(
                Request::builder()
                    .uri("/rules?all=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let listed = body_json(response).await;
        assert_eq!(listed["rules"][0]["active"], false);
    }

    #[tokio::test]
    async fn test_invalid_rule_is_rejected() {
        let t = create_test_app();

        let response = t
            .app
            .oneshot(post_json(
                "/rules",
                serde_json::json!({
                    "type": "standard",
                    "condition": "below",
                    "waitTime": 30
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(t.store.list().is_empty());
    }

    #[tokio::test]
    async fn test_mistyped_body_uses_error_shape() {
        let t = create_test_app();

        let response = t
            .app
            .clone()
            .oneshot(post_json(
                "/rules",
                serde_json::json!({
                    "type": "standard",
                    "condition": "below",
                    "waitTime": "30",
                    "email": "a@x.com"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

        let response = t
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rules")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
        assert!(t.store.list().is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_unknown_rule() {
        let t = create_test_app();

        let response = t
            .app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/rules/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_test_message() {
        let t = create_test_app();
        t.store
            .insert(AlertRule::new(5, "sentri", "above", 60, "a@x.com"))
            .unwrap();

        let response = t
            .app
            .oneshot(post_json("/rules/5/test", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["outcomes"][0]["channel"], "email");
        assert_eq!(body["outcomes"][0]["success"], true);
        assert_eq!(t.email.sent()[0].subject, "Border Alert Test");
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let t = create_test_app();
        t.stats.record_cycle();
        t.stats.record_sent();

        let response = t
            .app
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["cycles_run"], 1);
        assert_eq!(body["sent"], 1);
        assert!(body["last_error"].is_null());
    }
}
