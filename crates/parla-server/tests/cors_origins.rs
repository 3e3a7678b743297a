mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{test_state, FixedSpeech, ScriptedLanguage, ALLOWED_ORIGIN};
use parla_server::app;
use parla_voice::ConvaiConfig;
use tower::ServiceExt;

fn router(origins: &[&str]) -> axum::Router {
    app(test_state(
        ScriptedLanguage::replying("unused"),
        FixedSpeech::returning(b"audio"),
        ConvaiConfig::default(),
        origins,
    ))
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/configurar-agente")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn listed_origins_get_credentialed_preflight() {
    let origins = [
        ALLOWED_ORIGIN,
        "https://0j7f3mhw-4200.use2.devtunnels.ms",
        "https://agente-lait.web.app",
    ];
    let app = router(&origins);

    for origin in origins {
        let response = app.clone().oneshot(preflight(origin)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some(origin)
        );
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_METHODS)
                .and_then(|v| v.to_str().ok()),
            Some("POST")
        );
    }
}

#[tokio::test]
async fn unlisted_origin_gets_no_cors_headers() {
    let app = router(&[ALLOWED_ORIGIN]);

    let response = app
        .oneshot(preflight("https://evil.example"))
        .await
        .unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn simple_request_echoes_listed_origin() {
    let app = router(&[ALLOWED_ORIGIN]);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, ALLOWED_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some(ALLOWED_ORIGIN)
    );
}

#[tokio::test]
async fn wildcard_allows_any_origin_without_credentials() {
    let app = router(&["*"]);

    let response = app
        .oneshot(preflight("https://anywhere.example"))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    assert!(headers
        .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
        .is_none());
}
