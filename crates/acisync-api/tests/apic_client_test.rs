#![allow(clippy::unwrap_used)]
// Integration tests for `ApicClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use acisync_api::{ApicClient, ClassQuery, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApicClient) {
    let server = MockServer::start().await;
    let client = ApicClient::new(&server.uri(), &TransportConfig::default()).unwrap();
    (server, client)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/aaaLogin.json"))
        .and(body_partial_json(
            json!({"aaaUser": {"attributes": {"name": "admin"}}}),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "APIC-cookie=abc123; path=/")
                .set_body_json(json!({
                    "totalCount": "1",
                    "imdata": [{"aaaLogin": {"attributes": {"token": "abc123"}}}]
                })),
        )
        .mount(server)
        .await;
}

fn password() -> SecretString {
    "secret".to_string().into()
}

// ── Session ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    client.login("admin", &password()).await.unwrap();
    assert!(client.is_logged_in());
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/aaaLogin.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "totalCount": "1",
            "imdata": [{"error": {"attributes": {"code": "401", "text": "Username or password is incorrect"}}}]
        })))
        .mount(&server)
        .await;

    let result = client.login("admin", &password()).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_query_before_login_is_refused() {
    let (_server, client) = setup().await;
    let result = client.query_class("fvTenant", &ClassQuery::default()).await;
    assert!(matches!(result, Err(Error::NotLoggedIn)));
}

// ── Class queries ───────────────────────────────────────────────────

#[tokio::test]
async fn test_query_class_with_children_and_tenant_filter() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/class/fvBD.json"))
        .and(query_param("rsp-subtree", "children"))
        .and(query_param("query-target-filter", "wcard(fvBD.dn,\"tn-prod/\")"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": "1",
            "imdata": [{
                "fvBD": {
                    "attributes": {"dn": "uni/tn-prod/BD-web", "name": "web", "unicastRoute": "yes"},
                    "children": [
                        {"fvRsCtx": {"attributes": {"tDn": "uni/tn-prod/ctx-main", "tnFvCtxName": "main"}}},
                        {"fvSubnet": {"attributes": {"ip": "10.0.0.1/24"}}}
                    ]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.login("admin", &password()).await.unwrap();
    let bds = client
        .query_class("fvBD", &ClassQuery::with_children().in_tenant(Some("prod")))
        .await
        .unwrap();

    assert_eq!(bds.len(), 1);
    assert_eq!(bds[0].dn(), "uni/tn-prod/BD-web");
    assert_eq!(bds[0].attr("unicastRoute"), Some("yes"));
    let ctx = bds[0].child("fvRsCtx").unwrap();
    assert_eq!(ctx.attr("tnFvCtxName"), Some("main"));
    assert_eq!(bds[0].children_of("fvSubnet").count(), 1);
}

#[tokio::test]
async fn test_error_object_in_imdata_is_surfaced() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/class/fvNope.json"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "totalCount": "1",
            "imdata": [{"error": {"attributes": {"code": "122", "text": "unknown class fvNope"}}}]
        })))
        .mount(&server)
        .await;

    client.login("admin", &password()).await.unwrap();
    let result = client.query_class("fvNope", &ClassQuery::default()).await;

    match result {
        Err(Error::Apic { code, message }) => {
            assert_eq!(code, "122");
            assert!(message.contains("unknown class"));
        }
        other => panic!("expected Apic error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_session_maps_to_authentication() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/class/fvTenant.json"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Token was invalid"))
        .mount(&server)
        .await;

    client.login("admin", &password()).await.unwrap();
    let result = client.query_class("fvTenant", &ClassQuery::default()).await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_logout_posts_once() {
    let (server, client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/aaaLogout.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"imdata": []})))
        .expect(1)
        .mount(&server)
        .await;

    client.login("admin", &password()).await.unwrap();
    client.logout("admin").await.unwrap();
    client.logout("admin").await.unwrap();
    assert!(!client.is_logged_in());
}
