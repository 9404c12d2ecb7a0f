//! Tests for HTTP request handlers.

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::driver::fake::{FakeEngine, FakeProcessRuntime};
    use crate::driver::Backends;
    use crate::orchestrator::Orchestrator;
    use crate::server::create_router;
    use crate::server::state::AppState;
    use crate::state::{RuntimeRecord, StateStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const STACK: &str = r#"
services:
  db:
    image: postgres:16
    volumes: ["data:/var/lib/postgresql/data"]
  web:
    image: nginx
    ports: ["8080:80"]
    depends_on: [db]
  worker:
    driver: process
    command: ./worker --queue jobs
    depends_on: [web]
"#;

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        engine: Arc<FakeEngine>,
        _dir: TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = StateStore::new(dir.path().join("state.lock"));
            let engine = Arc::new(FakeEngine::new());
            let processes = Arc::new(FakeProcessRuntime::new());
            let backends = Backends::new(engine.clone(), processes);
            let orchestrator = Orchestrator::new(backends, store, &Config::default());
            let state = Arc::new(AppState::new(orchestrator));

            Self {
                router: create_router(state.clone()),
                state,
                engine,
                _dir: dir,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn post(&self, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/yaml")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn state_file(&self) -> serde_json::Value {
            let orchestrator = self.state.orchestrator.lock().await;
            let content = std::fs::read(orchestrator.store().path()).unwrap();
            serde_json::from_slice(&content).unwrap()
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = TestApp::new();

        let (status, body) = app.get("/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_list_services_empty() {
        let app = TestApp::new();

        let (status, body) = app.get("/api/v1/services").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 0);
        assert!(body["data"]["network"].is_null());
    }

    #[tokio::test]
    async fn test_start_command_launches_and_saves() {
        let app = TestApp::new();

        let (status, body) = app.post("/api/v1/commands/start", STACK).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["command"], "start");
        let output = body["data"]["output"].as_str().unwrap();
        assert!(output.contains("RUNNING"));
        assert!(output.contains("worker"));
        assert_eq!(app.engine.count("start_container:"), 2);

        let saved = app.state_file().await;
        assert_eq!(saved["Containers"]["db"]["Status"], "RUNNING");
        assert_eq!(saved["Processes"]["worker"]["Driver"], "process");
        assert_eq!(saved["NetworkID"], "kumiage-network-id");

        let (_, body) = app.get("/api/v1/services").await;
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["services"][0]["name"], "db");
        assert_eq!(body["data"]["services"][2]["name"], "worker");
    }

    #[tokio::test]
    async fn test_start_requires_definition() {
        let app = TestApp::new();

        let (status, body) = app.post("/api/v1/commands/start", "").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E008");
        assert_eq!(app.state.stats.commands_failed(), 1);
    }

    #[tokio::test]
    async fn test_start_with_invalid_yaml() {
        let app = TestApp::new();

        let (status, body) = app
            .post("/api/v1/commands/start", "services: [not, a, map]")
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E001");
        assert!(app.engine.journal().is_empty());
    }

    #[tokio::test]
    async fn test_start_with_cycle_is_unprocessable() {
        let app = TestApp::new();
        let yaml = r#"
services:
  a: { image: alpine, depends_on: [b] }
  b: { image: alpine, depends_on: [a] }
"#;

        let (status, body) = app.post("/api/v1/commands/start", yaml).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "E003");
        assert!(app.engine.journal().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let app = TestApp::new();

        let (status, body) = app.post("/api/v1/commands/deploy", "").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E008");
    }

    #[tokio::test]
    async fn test_ps_command_renders_table() {
        let app = TestApp::new();
        {
            let orchestrator = app.state.orchestrator.lock().await;
            orchestrator
                .store()
                .upsert_container("db", RuntimeRecord::container("abcdef0123456789", None));
        }

        let (status, body) = app.post("/api/v1/commands/ps", "").await;

        assert_eq!(status, StatusCode::OK);
        let output = body["data"]["output"].as_str().unwrap();
        assert!(output.contains("abcdef0123"));
        assert!(!output.contains("abcdef01234"));
    }

    #[tokio::test]
    async fn test_stop_then_clean() {
        let app = TestApp::new();
        app.post("/api/v1/commands/start", STACK).await;

        let (status, body) = app.post("/api/v1/commands/stop", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["output"]
            .as_str()
            .unwrap()
            .contains("Stopped db [container]"));

        let (status, body) = app.post("/api/v1/commands/rm", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["command"], "clean");
        let output = body["data"]["output"].as_str().unwrap();
        assert!(output.contains("Removing Network: kumiage-network-id [REMOVED]"));
        assert!(output.contains("Removing Volume: data [REMOVED]"));

        let saved = app.state_file().await;
        assert!(saved["Containers"].as_object().unwrap().is_empty());
        assert!(saved["NetworkID"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = TestApp::new();

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
