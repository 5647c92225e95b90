mod compile;
mod health;

use axum::Router;

use crate::server::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", health::router().merge(compile::router()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{body::Body, http::Request, http::StatusCode, Router};
    use kiln_core::{
        BuildErrorBody, BuildOrchestrator, BuildOutputEvent, BuildResult, CompileRequest, Error,
        ProjectHandle,
    };
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::build_client::RemoteBuildService;
    use crate::forge::{Compiler, ToolchainStatus};
    use crate::server::{serve, AppState};

    /// Succeeds for every contract except `Broken`
    struct FakeCompiler;

    #[async_trait]
    impl Compiler for FakeCompiler {
        async fn compile(
            &self,
            request: &CompileRequest,
            lines: mpsc::UnboundedSender<String>,
        ) -> Result<BuildResult, BuildErrorBody> {
            let _ = lines.send("Compiling 1 files with 0.8.24".to_string());
            if request.contract.as_deref() == Some("Broken") {
                let _ = lines.send("Error (2314): Expected ';'".to_string());
                return Err(BuildErrorBody {
                    error: "forge build exited with 1".to_string(),
                    output: "Compiling 1 files with 0.8.24\nError (2314): Expected ';'\n"
                        .to_string(),
                });
            }
            let _ = lines.send("Compiler run successful!".to_string());
            Ok(BuildResult {
                bytecode: "0x6080604052".to_string(),
                metadata: serde_json::json!({
                    "name": "Counter",
                    "abi": [{"type": "constructor", "inputs": [], "stateMutability": "nonpayable"}]
                }),
                output: "Compiling 1 files with 0.8.24\nCompiler run successful!\n".to_string(),
            })
        }

        async fn check(&self) -> ToolchainStatus {
            ToolchainStatus {
                installed: true,
                version: Some("forge 1.0.0".to_string()),
                error: None,
            }
        }
    }

    fn app() -> Router {
        super::create_router(AppState::new(Arc::new(FakeCompiler)))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_compile(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/contracts/compile")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_check_env() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/contracts/check-env")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["installed"], true);
        assert_eq!(body["version"], "forge 1.0.0");
    }

    #[tokio::test]
    async fn test_compile_success() {
        let response = app()
            .oneshot(post_compile(r#"{"projectPath": "/work/counter"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["bytecode"], "0x6080604052");
        assert_eq!(body["metadata"]["name"], "Counter");
    }

    #[tokio::test]
    async fn test_compile_failure_is_unprocessable() {
        let response = app()
            .oneshot(post_compile(
                r#"{"projectPath": "/work/counter", "contract": "Broken"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"], "forge build exited with 1");
        assert!(body["output"].as_str().unwrap().contains("Expected ';'"));
    }

    #[tokio::test]
    async fn test_compile_malformed_request() {
        let response = app()
            .oneshot(post_compile(r#"{"contract": "Counter"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "BAD_REQUEST");
    }

    async fn running_service() -> BuildOrchestrator {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(FakeCompiler)));

        let client = RemoteBuildService::new(&format!("http://{}", addr)).unwrap();
        BuildOrchestrator::new(Arc::new(client), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_stream_end_to_end() {
        let orchestrator = running_service().await;
        let mut stream = orchestrator
            .compile_stream(&ProjectHandle::new("/work/counter"))
            .await
            .unwrap();

        let mut lines = Vec::new();
        let artifact = loop {
            match stream.next().await.unwrap() {
                BuildOutputEvent::Line(line) => lines.push(line),
                BuildOutputEvent::Complete(artifact) => break artifact,
                BuildOutputEvent::Error(e) => panic!("unexpected build error: {e}"),
            }
        };

        assert_eq!(
            lines,
            vec!["Compiling 1 files with 0.8.24", "Compiler run successful!"]
        );
        assert_eq!(artifact.name(), "Counter");
        assert!(artifact.build_log().contains("Compiler run successful!"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_failure_end_to_end() {
        let orchestrator = running_service().await;
        let handle = ProjectHandle::new("/work/counter").with_contract("Broken");

        let err = orchestrator
            .compile_streaming(&handle, |_| {})
            .await
            .unwrap_err();

        match err {
            Error::BuildFailure { message, log } => {
                assert_eq!(message, "forge build exited with 1");
                assert!(log.contains("Expected ';'"));
            }
            other => panic!("expected a build failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_request_response_end_to_end() {
        let orchestrator = running_service().await;

        let artifact = orchestrator
            .compile(&ProjectHandle::new("/work/counter"))
            .await
            .unwrap();
        assert_eq!(artifact.binary(), &[0x60, 0x80, 0x60, 0x40, 0x52]);

        let err = orchestrator
            .compile(&ProjectHandle::new("/work/counter").with_contract("Broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BuildFailure { .. }));
    }
}
