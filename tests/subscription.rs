//! End-to-end tests: manifest → feeds → merged base64 payload → HTTP response.
//!
//! Feeds and the remote manifest are served by wiremock; the router is driven
//! in-process with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use submerge::feed::MergeError;
use submerge::manifest::ManifestError;
use submerge::server::build_router;
use submerge::{aggregate, AggregateError, Config};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USERINFO: &str = "upload=235205700; download=1883111384; total=0; expire=0";

fn remote_config(manifest_url: String) -> Config {
    Config {
        manifest_url: Some(manifest_url),
        sub_name: "Family".to_owned(),
        ..Config::default()
    }
}

async fn mount_manifest(server: &MockServer, manifest: String) {
    Mock::given(method("GET"))
        .and(path("/configs.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
        .mount(server)
        .await;
}

async fn mount_feed(server: &MockServer, route: &str, body: &str, headers: &[(&str, &str)]) {
    let mut template = ResponseTemplate::new(200).set_body_string(STANDARD.encode(body));
    for (name, value) in headers {
        template = template.insert_header(*name, *value);
    }
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn decode(payload: &str) -> String {
    String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap()
}

// ============================================================================
// aggregate()
// ============================================================================

#[tokio::test]
async fn test_aggregate_merges_feeds_and_direct_links_in_order() {
    let server = MockServer::start().await;
    let manifest = format!(
        "# panels\n{uri}/down/\n{uri}/nl/\n\nvless://direct@d:443#Direct-u7-3D⏳\n{uri}/de/\n",
        uri = server.uri()
    );
    mount_manifest(&server, manifest).await;
    Mock::given(method("GET"))
        .and(path("/down/alice"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_feed(
        &server,
        "/nl/alice",
        "vless://n1@nl:443#NL-alice-30D,5H⏳\n",
        &[
            ("subscription-userinfo", USERINFO),
            ("profile-update-interval", "12"),
        ],
    )
    .await;
    mount_feed(
        &server,
        "/de/alice",
        "vless://d1@de:443#DE-alice\nvless://d2@de:443#DE2\n",
        &[
            ("subscription-userinfo", "download=500"),
            ("profile-web-page-url", "https://de.example"),
        ],
    )
    .await;

    let config = remote_config(format!("{}/configs.txt", server.uri()));
    let result = aggregate(&config, "alice").await.unwrap();

    assert_eq!(
        decode(&result.payload).split('\n').collect::<Vec<_>>(),
        vec![
            "vless://n1@nl:443#NL%20%E2%86%931.75GB",
            "vless://d1@de:443#DE%20%E2%86%93500B",
            "vless://d2@de:443#DE2%20%E2%86%93500B",
            "vless://direct@d:443#Direct",
        ]
    );

    // Only the first successful feed contributes headers
    assert_eq!(
        result.headers.get("subscription-userinfo").map(String::as_str),
        Some(USERINFO)
    );
    assert_eq!(
        result.headers.get("profile-update-interval").map(String::as_str),
        Some("12")
    );
    assert!(!result.headers.contains_key("profile-web-page-url"));
}

#[tokio::test]
async fn test_aggregate_empty_manifest_is_nothing_to_aggregate() {
    let server = MockServer::start().await;
    mount_manifest(&server, "# nothing here\n\nvmess://ignored\n".to_owned()).await;

    let config = remote_config(format!("{}/configs.txt", server.uri()));
    let err = aggregate(&config, "alice").await.unwrap_err();
    assert!(matches!(
        err,
        AggregateError::Merge(MergeError::NothingToAggregate)
    ));
}

#[tokio::test]
async fn test_aggregate_missing_remote_manifest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = remote_config(format!("{}/configs.txt", server.uri()));
    let err = aggregate(&config, "alice").await.unwrap_err();
    assert!(matches!(
        err,
        AggregateError::Manifest(ManifestError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_aggregate_local_manifest() {
    let server = MockServer::start().await;
    mount_feed(&server, "/sub/bob", "vless://a@h:443#A\n", &[]).await;

    let dir = std::env::temp_dir().join("submerge_it_local_manifest");
    std::fs::create_dir_all(&dir).unwrap();
    let manifest_path = dir.join("configs.txt");
    std::fs::write(
        &manifest_path,
        format!("{}/sub/\nvless://x@y:443#Y\n", server.uri()),
    )
    .unwrap();

    let config = Config {
        local_mode: true,
        manifest_path,
        ..Config::default()
    };
    let result = aggregate(&config, "bob").await.unwrap();
    assert_eq!(decode(&result.payload), "vless://a@h:443#A\nvless://x@y:443#Y");
    assert!(result.headers.is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_aggregate_slow_feed_is_skipped() {
    let server = MockServer::start().await;
    let manifest = format!("{uri}/slow/\n{uri}/fast/\n", uri = server.uri());
    mount_manifest(&server, manifest).await;
    Mock::given(method("GET"))
        .and(path("/slow/id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(STANDARD.encode("vless://slow@h:443#slow\n"))
                .insert_header("profile-update-interval", "1")
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount_feed(
        &server,
        "/fast/id",
        "vless://fast@h:443#fast\n",
        &[("profile-update-interval", "24")],
    )
    .await;

    let mut config = remote_config(format!("{}/configs.txt", server.uri()));
    config.feed_timeout_secs = 1;
    let result = aggregate(&config, "id").await.unwrap();

    assert_eq!(decode(&result.payload), "vless://fast@h:443#fast\n");
    assert_eq!(
        result.headers.get("profile-update-interval").map(String::as_str),
        Some("24")
    );
}

// ============================================================================
// HTTP router
// ============================================================================

#[tokio::test]
async fn test_http_success_response() {
    let server = MockServer::start().await;
    mount_manifest(&server, format!("{}/sub/\n", server.uri())).await;
    mount_feed(
        &server,
        "/sub/carol",
        "vless://c@h:443#C-carol\n",
        &[("subscription-userinfo", USERINFO)],
    )
    .await;

    let config = remote_config(format!("{}/configs.txt", server.uri()));
    let app = build_router(Arc::new(config));

    let response = app
        .oneshot(Request::get("/sub/carol").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(headers["profile-title"], "Family");
    assert_eq!(headers["content-disposition"], "attachment; filename=Family");
    assert_eq!(headers["subscription-userinfo"], USERINFO);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let payload = std::str::from_utf8(&body).unwrap();
    assert_eq!(decode(payload), "vless://c@h:443#C%20%E2%86%931.75GB\n");
}

#[tokio::test]
async fn test_http_default_route_uses_default_sub_id() {
    let server = MockServer::start().await;
    mount_manifest(&server, format!("{}/sub/\n", server.uri())).await;
    mount_feed(&server, "/sub/fallback", "vless://f@h:443#F\n", &[]).await;

    let mut config = remote_config(format!("{}/configs.txt", server.uri()));
    config.route_path = "/hidden/".to_owned();
    config.default_sub_id = "fallback".to_owned();
    let app = build_router(Arc::new(config));

    let response = app
        .oneshot(Request::get("/hidden").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        decode(std::str::from_utf8(&body).unwrap()),
        "vless://f@h:443#F\n"
    );
}

#[tokio::test]
async fn test_http_missing_manifest_is_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = remote_config(format!("{}/configs.txt", server.uri()));
    let app = build_router(Arc::new(config));

    let response = app
        .oneshot(Request::get("/sub/anyone").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_http_nothing_to_return_is_500() {
    let server = MockServer::start().await;
    mount_manifest(&server, format!("{}/sub/\n", server.uri())).await;
    Mock::given(method("GET"))
        .and(path("/sub/dave"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let config = remote_config(format!("{}/configs.txt", server.uri()));
    let app = build_router(Arc::new(config));

    let response = app
        .oneshot(Request::get("/sub/dave").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"There is nothing to return");
}

#[tokio::test]
async fn test_http_unknown_path_is_404() {
    let config = remote_config("http://127.0.0.1:1/configs.txt".to_owned());
    let app = build_router(Arc::new(config));

    let response = app
        .oneshot(Request::get("/elsewhere/x").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
