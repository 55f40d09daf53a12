#![allow(clippy::unwrap_used)]
// Integration tests for `Session` using wiremock.

use serde_json::json;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use uncli_api::{Error, Session, SessionConfig, StatusCode};

// ── Helpers ─────────────────────────────────────────────────────────

const LOGIN: &str = "/api/auth/login";
const USERS: &str = "/proxy/network/api/s/default/rest/user";
const STAMGR: &str = "/proxy/network/api/s/default/cmd/stamgr";

async fn setup() -> (MockServer, Session) {
    let server = MockServer::start().await;
    let config = SessionConfig::default()
        .with_endpoint(server.uri())
        .with_credentials("admin", "hunter2");
    let session = Session::new(config).unwrap();
    (server, session)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-csrf-token", "tok-1")
                .set_body_json(json!({ "username": "admin" })),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn ok_envelope() -> serde_json::Value {
    json!({ "meta": { "rc": "ok" }, "data": [] })
}

// ── Construction ────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_session_performs_no_io() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let _default = Session::new(SessionConfig::default().with_endpoint(server.uri())).unwrap();
    let _with_creds = Session::new(
        SessionConfig::default()
            .with_endpoint(server.uri())
            .with_credentials("admin", "pw"),
    )
    .unwrap();
    let _unconfigured = Session::new(SessionConfig {
        endpoint: server.uri(),
        credentials: None,
        ..SessionConfig::default()
    })
    .unwrap();
}

#[test]
fn test_invalid_endpoint_is_rejected() {
    let result = Session::new(SessionConfig::default().with_endpoint("not a url"));
    assert!(
        matches!(result, Err(Error::InvalidUrl(_))),
        "expected InvalidUrl"
    );
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_sends_credentials_and_headers() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(header("accept", "application/json"))
        .and(header("origin", server.uri().as_str()))
        .and(header("user-agent", "unifibot/2.0"))
        .and(body_json(json!({
            "username": "admin",
            "password": "hunter2",
            "strict": "true",
            "remember": "true",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(session.login().await.unwrap(), "welcome");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_login_is_cached_after_success() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    let first = session.login().await.unwrap();
    let second = session.login().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(session.csrf_token(), Some("tok-1"));
}

#[tokio::test]
async fn test_failed_login_short_circuits_everything() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USERS))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(0)
        .mount(&server)
        .await;

    let err = session.login().await.unwrap_err();
    assert!(matches!(err.latest(), Error::Authentication { .. }));
    assert_eq!(err.original().status(), Some(StatusCode::UNAUTHORIZED));

    let again = session.login().await.unwrap_err();
    assert_eq!(again.to_string(), err.to_string());

    let listed = session.list_devices().await.unwrap_err();
    assert!(listed.to_string().contains("401 Unauthorized"));
    assert!(session.kick("aa:bb:cc:dd:ee:ff").await.is_err());
}

#[tokio::test]
async fn test_unconfigured_session_refuses_login() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = Session::new(SessionConfig {
        endpoint: server.uri(),
        credentials: None,
        ..SessionConfig::default()
    })
    .unwrap();

    let err = session.login().await.unwrap_err();
    assert!(matches!(err.latest(), Error::Uninitialized));
    assert!(session.block("aa:bb:cc:dd:ee:ff").await.is_err());
    assert!(session.error().is_some());
}

#[tokio::test]
async fn test_session_cookie_is_replayed() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "TOKEN=abc123; Path=/")
                .set_body_string("{}"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USERS))
        .and(header("cookie", "TOKEN=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(1)
        .mount(&server)
        .await;

    let devices = session.list_devices().await.unwrap();
    assert!(devices.is_empty());
    assert_eq!(session.cookie_header().as_deref(), Some("TOKEN=abc123"));
}

// ── Device tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_sorted_by_last_seen() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    let envelope = json!({
        "meta": { "rc": "ok" },
        "data": [
            { "_id": "c", "mac": "00:00:00:00:00:03", "name": "tv", "last_seen": 300 },
            { "_id": "a", "mac": "00:00:00:00:00:01", "hostname": "phone", "last_seen": 100 },
            { "_id": "b", "mac": "00:00:00:00:00:02", "last_seen": 200, "blocked": true }
        ]
    });

    Mock::given(method("GET"))
        .and(path(USERS))
        .and(header("x-csrf-token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&envelope))
        .expect(1)
        .mount(&server)
        .await;

    let devices = session.list_devices().await.unwrap();

    let seen: Vec<i64> = devices.iter().map(|d| d.last_seen).collect();
    assert_eq!(seen, vec![100, 200, 300]);
    assert_eq!(devices[0].display_name(), "phone");
    assert!(devices[1].blocked);
}

#[tokio::test]
async fn test_null_fields_do_not_break_the_listing() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    let envelope = json!({
        "meta": { "rc": "ok" },
        "data": [
            { "mac": "00:00:00:00:00:01", "name": "tv", "last_seen": 50 },
            { "mac": "00:00:00:00:00:02", "last_seen": null, "blocked": null }
        ]
    });

    Mock::given(method("GET"))
        .and(path(USERS))
        .respond_with(ResponseTemplate::new(200).set_body_json(&envelope))
        .expect(2)
        .mount(&server)
        .await;

    let devices = session.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].mac, "00:00:00:00:00:02");
    assert!(!devices[0].blocked);
    assert_eq!(devices[1].display_name(), "tv");

    // Still healthy: a second listing goes over the wire.
    assert!(session.list_devices().await.is_ok());
}

#[tokio::test]
async fn test_undecodable_listing_is_sticky() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(USERS))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = session.list_devices().await.unwrap_err();
    assert!(matches!(err.latest(), Error::Deserialization { .. }));
    assert!(session.list_devices().await.is_err());
}

#[tokio::test]
async fn test_rejected_envelope_is_an_error() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(USERS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": { "rc": "error", "msg": "api.err.NoSiteContext" },
            "data": []
        })))
        .mount(&server)
        .await;

    let err = session.list_devices().await.unwrap_err();
    assert!(err.to_string().contains("NoSiteContext"));
}

// ── Station command tests ───────────────────────────────────────────

#[tokio::test]
async fn test_block_replays_csrf_token() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path(STAMGR))
        .and(header("x-csrf-token", "tok-1"))
        .and(body_json(json!({ "cmd": "block-sta", "mac": "aa:bb:cc:dd:ee:ff" })))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"meta":{"rc":"ok"}}"#))
        .expect(1)
        .mount(&server)
        .await;

    let body = session.block("aa:bb:cc:dd:ee:ff").await.unwrap();
    assert_eq!(body, r#"{"meta":{"rc":"ok"}}"#);
}

#[tokio::test]
async fn test_rotated_csrf_token_is_used_next() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path(STAMGR))
        .and(body_json(json!({ "cmd": "unblock-sta", "mac": "aa:bb:cc:dd:ee:ff" })))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "tok-2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STAMGR))
        .and(header("x-csrf-token", "tok-2"))
        .and(body_json(json!({ "cmd": "kick-sta", "mac": "aa:bb:cc:dd:ee:ff" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    session.unblock("aa:bb:cc:dd:ee:ff").await.unwrap();
    session.kick("aa:bb:cc:dd:ee:ff").await.unwrap();
    assert_eq!(session.csrf_token(), Some("tok-2"));
}

#[tokio::test]
async fn test_forbidden_is_sticky_and_keeps_body() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    let denied = r#"{"meta":{"rc":"error","msg":"api.err.NoPermission"}}"#;
    Mock::given(method("POST"))
        .and(path(STAMGR))
        .respond_with(ResponseTemplate::new(403).set_body_string(denied))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USERS))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(0)
        .mount(&server)
        .await;

    let err = session.block("aa:bb:cc:dd:ee:ff").await.unwrap_err();
    assert!(err.to_string().contains("Forbidden"), "got: {err}");
    assert_eq!(err.response_body(), Some(denied));

    for result in [
        session.unblock("aa:bb:cc:dd:ee:ff").await,
        session.kick("aa:bb:cc:dd:ee:ff").await,
        session.block("aa:bb:cc:dd:ee:ff").await,
    ] {
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Forbidden"));
    }
    let listed = session.list_devices().await.unwrap_err();
    assert!(listed.to_string().contains("Forbidden"));
}

#[tokio::test]
async fn test_site_is_part_of_the_path() {
    let server = MockServer::start().await;
    let mut session = Session::new(
        SessionConfig::default()
            .with_endpoint(format!("{}/", server.uri()))
            .with_site("branch"),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_json(json!({
            "username": "ubnt",
            "password": "ubnt",
            "strict": "true",
            "remember": "true",
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/proxy/network/api/s/branch/cmd/stamgr"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(session.kick("aa:bb:cc:dd:ee:ff").await.unwrap(), "done");
}
