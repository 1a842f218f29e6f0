use async_trait::async_trait;
use diagram_server::core::diagram::{DiagramRequest, ImageType};
use diagram_server::core::generator::{GenerateError, Generator};
use diagram_server::settings::Config;
use diagram_server::{AppState, init_route};
use parking_lot::Mutex;
use poem::http::{StatusCode, header};
use poem::test::{TestClient, TestResponse};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

const RENDERED: &[u8] = b"\x89PNG fixed diagram bytes";

/// Writes a fixed artifact and remembers what it was asked to render.
#[derive(Default)]
struct StubGenerator {
    seen: Mutex<Vec<DiagramRequest>>,
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, diagram: &DiagramRequest) -> Result<(), GenerateError> {
        self.seen.lock().push(diagram.clone());
        tokio::fs::write(diagram.output_path(), RENDERED)
            .await
            .map_err(GenerateError::Finalize)
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _: &DiagramRequest) -> Result<(), GenerateError> {
        Err(GenerateError::Input(std::io::Error::other(
            "syntax error in graph",
        )))
    }
}

/// Claims success without writing anything.
struct SilentGenerator;

#[async_trait]
impl Generator for SilentGenerator {
    async fn generate(&self, _: &DiagramRequest) -> Result<(), GenerateError> {
        Ok(())
    }
}

struct Harness {
    client: TestClient<poem::endpoint::BoxEndpoint<'static>>,
    _dir: TempDir,
}

fn harness(generator: Arc<dyn Generator>, config: Config) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let app_state = Arc::new(AppState {
        generator,
        output_dir: dir.path().to_path_buf(),
    });
    Harness {
        client: TestClient::new(init_route(app_state, &config)),
        _dir: dir,
    }
}

fn stub() -> (Arc<StubGenerator>, Harness) {
    let generator = Arc::new(StubGenerator::default());
    let harness = harness(generator.clone(), Config::default());
    (generator, harness)
}

fn content_type(resp: &TestResponse) -> String {
    resp.0
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn error_message(resp: TestResponse) -> String {
    assert!(content_type(&resp).starts_with("application/json"));
    let body = resp.0.into_body().into_string().await.unwrap();
    let json: Value = serde_json::from_str(&body).unwrap();
    json["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn get_png_end_to_end() {
    let (generator, h) = stub();

    let resp = h
        .client
        .get("/generate?data=A%2D%3EB&type=png&scale=20")
        .send()
        .await;
    resp.assert_status_is_ok();
    assert_eq!(content_type(&resp), "image/png");
    let body = resp.0.into_body().into_vec().await.unwrap();
    assert_eq!(body, RENDERED);

    let seen = generator.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].description(), b"A->B");
    assert_eq!(seen[0].image_type(), ImageType::Png);
    assert_eq!(seen[0].scale().get(), 20);
}

#[tokio::test]
async fn post_defaults_to_svg() {
    let (generator, h) = stub();

    let resp = h.client.post("/generate").body("A->B").send().await;
    resp.assert_status_is_ok();
    assert_eq!(content_type(&resp), "image/svg+xml");

    let seen = generator.seen.lock();
    assert_eq!(seen[0].description(), b"A->B");
    assert_eq!(seen[0].image_type(), ImageType::Svg);
    assert_eq!(seen[0].scale().get(), 10);
}

#[tokio::test]
async fn get_binary_description() {
    let (generator, h) = stub();

    let resp = h.client.get("/generate?data=A%FFB%00").send().await;
    resp.assert_status_is_ok();
    assert_eq!(generator.seen.lock()[0].description(), [0x41, 0xFF, 0x42, 0x00]);
}

#[tokio::test]
async fn post_binary_body() {
    let (generator, h) = stub();

    let payload = vec![0x00, 0xFF, 0xFE, b'A'];
    let resp = h.client.post("/generate").body(payload.clone()).send().await;
    resp.assert_status_is_ok();
    assert_eq!(generator.seen.lock()[0].description(), payload);
}

#[tokio::test]
async fn post_empty_body_reaches_generator() {
    let (generator, h) = stub();

    let resp = h.client.post("/generate?type=png").send().await;
    resp.assert_status_is_ok();
    assert_eq!(content_type(&resp), "image/png");
    assert!(generator.seen.lock()[0].description().is_empty());
}

#[tokio::test]
async fn image_type_selection() {
    let (_, h) = stub();

    for (query, expected) in [
        ("type=svg&", "image/svg+xml"),
        ("type=png&", "image/png"),
        ("type=&", "image/svg+xml"),
        ("", "image/svg+xml"),
    ] {
        let resp = h
            .client
            .get(format!("/generate?{query}data=A"))
            .send()
            .await;
        resp.assert_status_is_ok();
        assert_eq!(content_type(&resp), expected, "{query}");
    }

    let resp = h.client.get("/generate?type=gif&data=A").send().await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(error_message(resp).await.contains("unsupported image type"));
}

#[tokio::test]
async fn image_type_checked_before_method() {
    let (generator, h) = stub();

    let resp = h.client.put("/generate?type=bmp").send().await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(error_message(resp).await.contains("unsupported image type"));
    assert!(generator.seen.lock().is_empty());
}

#[tokio::test]
async fn unsupported_method() {
    let (generator, h) = stub();

    let resp = h.client.put("/generate?data=A").body("A->B").send().await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(error_message(resp).await.contains("unsupported method"));

    let resp = h.client.delete("/generate").send().await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(generator.seen.lock().is_empty());
}

#[tokio::test]
async fn get_missing_data() {
    let (generator, h) = stub();

    for uri in ["/generate", "/generate?data=", "/generate?data=%20%20%09"] {
        let resp = h.client.get(uri).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(error_message(resp).await.contains("missing data"), "{uri}");
    }
    assert!(generator.seen.lock().is_empty());
}

#[tokio::test]
async fn get_bad_escape() {
    let (_, h) = stub();

    let resp = h.client.get("/generate?data=100%25").send().await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(error_message(resp).await.contains("decode failure"));
}

#[tokio::test]
async fn scale_validation() {
    let (generator, h) = stub();

    for bad in ["0", "101", "-3", "abc", "1e2"] {
        let resp = h
            .client
            .get(format!("/generate?data=A&scale={bad}"))
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(error_message(resp).await.contains("invalid scale"), "{bad}");
    }
    assert!(generator.seen.lock().is_empty());

    for good in [1u8, 55, 100] {
        let resp = h
            .client
            .get(format!("/generate?data=A&scale={good}"))
            .send()
            .await;
        resp.assert_status_is_ok();
    }
    let scales: Vec<u8> = generator
        .seen
        .lock()
        .iter()
        .map(|d| d.scale().get())
        .collect();
    assert_eq!(scales, [1, 55, 100]);
}

#[tokio::test]
async fn missing_data_reported_before_bad_scale() {
    let (_, h) = stub();

    let resp = h.client.get("/generate?scale=500").send().await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(error_message(resp).await.contains("missing data"));
}

#[tokio::test]
async fn generator_failure() {
    let h = harness(Arc::new(FailingGenerator), Config::default());

    let resp = h.client.post("/generate").body("A->").send().await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let message = error_message(resp).await;
    assert!(message.contains("could not generate diagram"));
    assert!(message.contains("syntax error in graph"));
}

#[tokio::test]
async fn missing_artifact() {
    let h = harness(Arc::new(SilentGenerator), Config::default());

    let resp = h.client.get("/generate?data=A").send().await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(resp).await.contains("could not read diagram bytes"));
}

#[tokio::test]
async fn prefix_nesting() {
    let config = Config {
        prefix: Some("/api".to_string()),
        ..Config::default()
    };
    let h = harness(Arc::new(StubGenerator::default()), config);

    h.client
        .get("/api/generate?data=A")
        .send()
        .await
        .assert_status_is_ok();
    h.client
        .get("/generate?data=A")
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn allow_all_origins() {
    let config = Config {
        allow_all_origins: true,
        ..Config::default()
    };
    let h = harness(Arc::new(StubGenerator::default()), config);

    let resp = h
        .client
        .get("/generate?data=A")
        .header(header::ORIGIN, "https://example.com")
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.assert_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "https://example.com");

    let resp = h.client.get("/generate").send().await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    resp.assert_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
}

#[tokio::test]
async fn no_cors_header_by_default() {
    let (_, h) = stub();

    let resp = h
        .client
        .get("/generate?data=A")
        .header(header::ORIGIN, "https://example.com")
        .send()
        .await;
    resp.assert_status_is_ok();
    resp.assert_header_is_not_exist(header::ACCESS_CONTROL_ALLOW_ORIGIN);
}
