//! HTTP generator against a mock endpoint.
#![cfg(feature = "http-generator")]

use image::{Rgb, RgbImage};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pixcache::generator::HttpGenerator;
use pixcache::pixel::encode_rgb_png;
use pixcache::{ImageGenerator, PixcacheError};

fn sample_png() -> Vec<u8> {
    let image = RgbImage::from_fn(32, 24, |x, y| Rgb([x as u8 * 8, y as u8 * 10, 90]));
    encode_rgb_png(&image).unwrap()
}

#[tokio::test]
async fn test_generate_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_json(json!({"prompt": "a cat"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(sample_png()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let generator = HttpGenerator::new(format!("{}/generate", mock_server.uri())).unwrap();
    let image = generator.generate("a cat").await.unwrap();

    assert_eq!((image.width(), image.height()), (32, 24));
    assert_eq!(generator.name(), "http");
}

#[tokio::test]
async fn test_generate_sends_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_png()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let generator = HttpGenerator::new(mock_server.uri())
        .unwrap()
        .api_key("test-key");
    assert!(generator.generate("a cat").await.is_ok());
}

#[tokio::test]
async fn test_generate_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&mock_server)
        .await;

    let generator = HttpGenerator::new(mock_server.uri()).unwrap();
    let err = generator.generate("a cat").await.unwrap_err();

    match err {
        PixcacheError::Generation(msg) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("CUDA out of memory"));
        }
        other => panic!("expected Generation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_generate_garbage_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let generator = HttpGenerator::new(mock_server.uri()).unwrap();
    let err = generator.generate("a cat").await.unwrap_err();
    assert!(matches!(err, PixcacheError::Generation(msg) if msg.contains("no image")));
}

#[tokio::test]
async fn test_generate_empty_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let generator = HttpGenerator::new(mock_server.uri()).unwrap();
    assert!(matches!(
        generator.generate("a cat").await,
        Err(PixcacheError::Generation(_))
    ));
}

#[tokio::test]
async fn test_generate_unreachable_endpoint() {
    // Nothing listens on port 9 (discard) in the test environment.
    let generator = HttpGenerator::new("http://127.0.0.1:9/generate").unwrap();
    assert!(matches!(
        generator.generate("a cat").await,
        Err(PixcacheError::Generation(_))
    ));
}
