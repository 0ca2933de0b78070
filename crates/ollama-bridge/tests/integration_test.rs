use actix_web::{http::StatusCode, test, web, App};
use ollama_bridge::{
    config::BridgeConfig,
    server::{routes, AppState},
};
use serde_json::{json, Value};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state_for(base_url: &str, timeout_secs: u64) -> web::Data<AppState> {
    let config = BridgeConfig {
        ollama_base_url: base_url.to_string(),
        request_timeout_secs: timeout_secs,
        ..BridgeConfig::default()
    };
    web::Data::new(AppState::new(&config).unwrap())
}

// Nothing listens on port 1, so connects are refused immediately.
const UNREACHABLE: &str = "http://127.0.0.1:1";

/// Serve one chunked NDJSON response on a raw socket, pausing `gap` before
/// each line.
async fn spawn_trickling_backend(lines: Vec<&'static str>, gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();
        for line in lines {
            tokio::time::sleep(gap).await;
            let chunk = format!("{:x}\r\n{}\r\n", line.len(), line);
            socket.write_all(chunk.as_bytes()).await.unwrap();
        }
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        // Hold the connection until the client lets go of it.
        let mut rest = [0u8; 64];
        let _ = socket.read(&mut rest).await;
    });
    format!("http://{}", addr)
}

async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buf[..n]);
        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + length {
            return;
        }
    }
}

#[actix_rt::test]
async fn test_chat_reshapes_request_and_returns_backend_json_verbatim() {
    let server = MockServer::start().await;
    let backend_body = r#"{"message":{"role":"assistant","content":"4"},"done":true}"#;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({
            "model": "llama3.1:8b",
            "messages": [
                {"role": "user", "content": "What is 2+2?"},
                {"role": "assistant", "tool_calls": [
                    {"function": {"name": "calculator", "arguments": {"expression": "2+2"}}}
                ]},
                {"role": "tool", "content": "4"}
            ],
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(backend_body, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({
            "messages": [
                {"role": "user", "content": "What is 2+2?"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "ignored", "function": {"name": "calculator", "arguments": {"expression": "2+2"}}}
                ]},
                {"role": "tool", "content": "4"}
            ],
            "options": {},
            "keep_alive": null
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body.as_ref(), backend_body.as_bytes());
}

#[actix_rt::test]
async fn test_chat_streams_lines_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("{\"a\":1}\n{\"b\":2}\n", "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({
            "model": "qwen2.5:7b",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/x-ndjson")
    );
    let body = test::read_body(resp).await;
    assert_eq!(body.as_ref(), b"{\"a\":1}\n{\"b\":2}\n");

    let received = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent["model"], "qwen2.5:7b");
    assert_eq!(sent["stream"], true);
}

#[actix_rt::test]
async fn test_chat_backend_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'nope' not found"))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"model": "nope", "messages": [{"role": "user", "content": "hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("model 'nope' not found"));
}

#[actix_rt::test]
async fn test_chat_timeout_is_504() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"done": true}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 1))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"messages": [{"role": "user", "content": "hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[actix_rt::test]
async fn test_slow_stream_outlives_request_timeout() {
    let lines = vec![
        "{\"message\":{\"content\":\"1\"}}\n",
        "{\"message\":{\"content\":\"2\"}}\n",
        "{\"message\":{\"content\":\"3\"}}\n",
        "{\"message\":{\"content\":\"4\"}}\n",
        "{\"done\":true}\n",
    ];
    let expected = lines.concat();
    // 5 x 400ms runs past the 1s timeout, but no single gap does.
    let uri = spawn_trickling_backend(lines, Duration::from_millis(400)).await;

    let app = test::init_service(App::new().app_data(state_for(&uri, 1)).configure(routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({
            "stream": true,
            "messages": [{"role": "user", "content": "count to four"}]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    assert_eq!(body.as_ref(), expected.as_bytes());
}

#[actix_rt::test]
async fn test_unreachable_backend_degrades_health_and_fails_chat_with_503() {
    let app = test::init_service(
        App::new()
            .app_data(state_for(UNREACHABLE, 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["ollama_status"], "unhealthy");
    assert_eq!(body["available_models"], json!([]));
    assert!(body["timestamp"].is_string());

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"messages": [{"role": "user", "content": "hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Unable to connect to Ollama service");

    let req = test::TestRequest::get().uri("/api/models").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_rt::test]
async fn test_health_lists_backend_models_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "llama3.1:8b", "size": 4661224676u64},
                {"name": "qwen2.5:7b"},
                {"name": "mistral:latest"}
            ]
        })))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ollama_status"], "healthy");
    assert_eq!(
        body["available_models"],
        json!(["llama3.1:8b", "qwen2.5:7b", "mistral:latest"])
    );
}

#[actix_rt::test]
async fn test_health_non_200_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["ollama_status"], "unhealthy");
}

#[actix_rt::test]
async fn test_models_passthrough_and_failure() {
    let server = MockServer::start().await;
    let tags = r#"{"models":[{"name":"llama3.1:8b","modified_at":"2024-07-23T10:00:00Z"}]}"#;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(tags, "application/json"))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/models").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body.as_ref(), tags.as_bytes());

    let failing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&failing)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&failing.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/models").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_rt::test]
async fn test_model_info_not_found_mentions_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .and(body_json(json!({"name": "foo"})))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .and(body_json(json!({"name": "llama3.1:8b"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modelfile": "FROM llama3.1",
            "details": {"family": "llama"}
        })))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/models/foo").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Model 'foo' not found");

    let req = test::TestRequest::get()
        .uri("/api/models/llama3.1:8b")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["details"]["family"], "llama");
}

#[actix_rt::test]
async fn test_model_info_other_failure_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/show"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/models/bar").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_rt::test]
async fn test_generate_passthrough() {
    let server = MockServer::start().await;
    let request = json!({"model": "llama3.1:8b", "prompt": "hi", "stream": false, "raw": true});
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(request.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "hello",
            "done": true
        })))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_json(&request)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["response"], "hello");
}

#[actix_rt::test]
async fn test_generate_streams_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\"response\":\"he\"}\n{\"response\":\"llo\",\"done\":true}\n",
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_json(json!({"model": "llama3.1:8b", "prompt": "hi"}))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(
        body.as_ref(),
        b"{\"response\":\"he\"}\n{\"response\":\"llo\",\"done\":true}\n"
    );
}

#[actix_rt::test]
async fn test_generate_backend_error_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(400).set_body_string("missing prompt"))
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_json(json!({"model": "llama3.1:8b", "stream": false}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].as_str().unwrap().contains("missing prompt"));
}

#[actix_rt::test]
async fn test_unreachable_backend_fails_model_info_and_generate_with_500() {
    let app = test::init_service(
        App::new()
            .app_data(state_for(UNREACHABLE, 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/models/foo").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_json(json!({"model": "llama3.1:8b", "prompt": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_rt::test]
async fn test_models_timeout_is_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"models": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let app = test::init_service(
        App::new()
            .app_data(state_for(&server.uri(), 1))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/models").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Unable to connect to Ollama service");
}

#[actix_rt::test]
async fn test_service_info() {
    let app = test::init_service(
        App::new()
            .app_data(state_for(UNREACHABLE, 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["endpoints"]["chat"], "/api/chat");
}

#[actix_rt::test]
async fn test_malformed_chat_body_is_422() {
    let app = test::init_service(
        App::new()
            .app_data(state_for(UNREACHABLE, 5))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/chat")
        .set_json(json!({"model": "llama3.1:8b"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[::core::prelude::v1::test]
fn test_config_file_loading() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("ollama-bridge.yml");

    fs::write(
        &config_path,
        r#"
server:
  port: 9000
backend:
  base_url: "http://gpu-box:11434/"
  default_model: "qwen2.5:7b"
logging:
  file: "logs/app.log"
"#,
    )
    .unwrap();

    let config = BridgeConfig::from_yaml_file(&config_path).unwrap();
    assert_eq!(config.port, 9000);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.ollama_base_url_trimmed(), "http://gpu-box:11434");
    assert_eq!(config.default_model, "qwen2.5:7b");
    assert_eq!(config.request_timeout_secs, 720);
    assert_eq!(
        config.log_file.as_deref(),
        Some(std::path::Path::new("logs/app.log"))
    );

    assert!(BridgeConfig::from_yaml_file(dir.path().join("missing.yml")).is_err());
}
