//! Router-level tests driving the full vault API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures::future::join_all;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use edvault_common::DocumentId;
use edvault_http::{router, AppState, ServerConfig};

const ALPHA: &str = "did:example:alpha";
const BETA: &str = "did:example:beta";
const IDENTITY_HEADER: &str = "x-edv-controller";

struct TestApp {
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let config = ServerConfig {
            base_uri: "https://edv.example".to_string(),
            ..ServerConfig::default()
        };
        let state = AppState::in_memory(&config).unwrap();
        Self {
            router: router(Arc::new(state), &config),
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            request = request.header(IDENTITY_HEADER, caller);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Create a vault for `controller` and return its local id.
    async fn create_vault(&self, controller: &str) -> String {
        let (status, body) = self
            .call(Method::POST, "/edvs", Some(controller), Some(vault_config(controller)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"]
            .as_str()
            .and_then(|id| id.rsplit('/').next())
            .unwrap()
            .to_string()
    }

    async fn ensure_index(&self, vault: &str, attribute: &str) {
        let (status, _) = self
            .call(
                Method::POST,
                &format!("/edvs/{vault}/indexes"),
                Some(ALPHA),
                Some(json!({"attribute": attribute})),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}

fn vault_config(controller: &str) -> Value {
    json!({
        "sequence": 0,
        "controller": controller,
        "keyAgreementKey": {"id": "urn:kak:1", "type": "X25519KeyAgreementKey2019"},
        "hmac": {"id": "urn:hmac:1", "type": "Sha256HmacKey2019"}
    })
}

fn document(id: &DocumentId, sequence: u64, attributes: Value) -> Value {
    json!({
        "id": id.as_str(),
        "sequence": sequence,
        "indexed": [{
            "hmac": {"id": "urn:hmac:1", "type": "Sha256HmacKey2019"},
            "sequence": sequence,
            "attributes": attributes
        }],
        "content": {"protected": "eyJlbmMiOiJDMjBQIn0", "ciphertext": "c2VjcmV0"}
    })
}

fn ids(body: &Value) -> Vec<String> {
    let mut ids: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;
    let docs = format!("/edvs/{vault}/documents");

    // Plain document without indexed attributes.
    let a = DocumentId::generate();
    let plain = json!({"id": a.as_str(), "sequence": 0, "content": {"ciphertext": "YQ"}});
    let (status, body) = app.call(Method::POST, &docs, Some(ALPHA), Some(plain)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence"], 0);
    assert_eq!(body["indexed"][0]["attributes"].as_array().unwrap().len(), 0);

    app.ensure_index(&vault, "content.apples").await;

    let b = DocumentId::generate();
    let (status, body) = app
        .call(
            Method::POST,
            &docs,
            Some(ALPHA),
            Some(document(&b, 0, json!([{"name": "content.apples", "value": "blind-b"}]))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["indexed"][0]["attributes"].as_array().unwrap().len(), 1);

    let c = DocumentId::generate();
    let (status, _) = app
        .call(
            Method::POST,
            &docs,
            Some(ALPHA),
            Some(document(&c, 0, json!([{"name": "content.apples", "value": "blind-c"}]))),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let query = format!("/edvs/{vault}/query");
    let (status, body) = app
        .call(Method::POST, &query, Some(ALPHA), Some(json!({"has": ["content.apples"]})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut expected = vec![b.to_string(), c.to_string()];
    expected.sort();
    assert_eq!(ids(&body), expected);

    let (_, body) = app
        .call(
            Method::POST,
            &query,
            Some(ALPHA),
            Some(json!({"equals": [{"content.apples": "blind-b"}]})),
        )
        .await;
    assert_eq!(ids(&body), vec![b.to_string()]);

    let (_, body) = app
        .call(Method::POST, &query, Some(ALPHA), Some(json!({"has": ["content.pears"]})))
        .await;
    assert_eq!(body, json!([]));

    let (_, body) = app
        .call(
            Method::POST,
            &query,
            Some(ALPHA),
            Some(json!({"has": ["content.apples"], "count": true})),
        )
        .await;
    assert_eq!(body, json!({"count": 2}));
}

#[tokio::test]
async fn test_create_vault_for_other_controller_is_denied() {
    let app = TestApp::new();
    let (status, body) = app
        .call(Method::POST, "/edvs", Some(BETA), Some(vault_config(ALPHA)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "PermissionDenied");

    let (status, _) = app
        .call(Method::POST, "/edvs", None, Some(vault_config(ALPHA)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_vault_returns_config() {
    let app = TestApp::new();
    let (status, body) = app
        .call(Method::POST, "/edvs", Some(ALPHA), Some(vault_config(ALPHA)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().unwrap().starts_with("https://edv.example/edvs/z"));
    assert_eq!(body["sequence"], 0);
    assert_eq!(body["controller"], ALPHA);
    assert_eq!(body["keyAgreementKey"]["id"], "urn:kak:1");
    assert_eq!(body["hmac"]["type"], "Sha256HmacKey2019");

    let (status, body) = app
        .call(
            Method::POST,
            "/edvs",
            Some(ALPHA),
            Some(json!({"sequence": 0, "controller": ALPHA})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
}

#[tokio::test]
async fn test_vault_config_update_and_lookup() {
    let app = TestApp::new();
    let mut config = vault_config(ALPHA);
    config["referenceId"] = json!("primary");
    let (_, created) = app
        .call(Method::POST, "/edvs", Some(ALPHA), Some(config.clone()))
        .await;
    let vault = created["id"].as_str().unwrap().rsplit('/').next().unwrap().to_string();

    let (status, body) = app
        .call(Method::POST, "/edvs", Some(ALPHA), Some(config))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["type"], "DuplicateError");

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/edvs?controller={ALPHA}&referenceId=primary"),
            Some(ALPHA),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let mut update = created.clone();
    update["sequence"] = json!(1);
    update["invoker"] = json!([ALPHA, BETA]);
    let (status, body) = app
        .call(Method::POST, &format!("/edvs/{vault}"), Some(ALPHA), Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sequence"], 1);

    let (status, body) = app
        .call(Method::POST, &format!("/edvs/{vault}"), Some(ALPHA), Some(update))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["type"], "InvalidStateError");

    // Beta is now an invoker and may read documents, but not the index setup.
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/edvs/{vault}/query"),
            Some(BETA),
            Some(json!({"has": ["content.apples"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/edvs/{vault}/indexes"),
            Some(BETA),
            Some(json!({"attribute": "content.apples"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_foreign_caller_cannot_touch_documents() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;
    let id = DocumentId::generate();

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/edvs/{vault}/documents/{id}"),
            Some(BETA),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["type"], "PermissionDenied");
}

#[tokio::test]
async fn test_duplicate_insert_keeps_first() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;
    let docs = format!("/edvs/{vault}/documents");
    let id = DocumentId::generate();

    let (status, _) = app
        .call(Method::POST, &docs, Some(ALPHA), Some(document(&id, 0, json!([]))))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut second = document(&id, 0, json!([]));
    second["content"] = json!({"ciphertext": "other"});
    let (status, body) = app
        .call(Method::POST, &docs, Some(ALPHA), Some(second))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["type"], "DuplicateError");

    let (_, body) = app
        .call(Method::GET, &format!("{docs}/{id}"), Some(ALPHA), None)
        .await;
    assert_eq!(body["content"]["ciphertext"], "c2VjcmV0");
}

#[tokio::test]
async fn test_update_and_upsert_sequences() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;
    let docs = format!("/edvs/{vault}/documents");

    // Upsert of an absent document stores it at sequence 0.
    let id = DocumentId::generate();
    let (status, body) = app
        .call(Method::POST, &format!("{docs}/{id}"), Some(ALPHA), Some(document(&id, 7, json!([]))))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sequence"], 0);

    let (status, body) = app
        .call(Method::POST, &format!("{docs}/{id}"), Some(ALPHA), Some(document(&id, 1, json!([]))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sequence"], 1);

    let (status, body) = app
        .call(Method::POST, &format!("{docs}/{id}"), Some(ALPHA), Some(document(&id, 1, json!([]))))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["type"], "InvalidStateError");

    let other = DocumentId::generate();
    let (status, body) = app
        .call(Method::POST, &format!("{docs}/{other}"), Some(ALPHA), Some(document(&id, 2, json!([]))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
}

#[tokio::test]
async fn test_get_distinguishes_syntax_from_not_found() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/edvs/{vault}/documents/does-not-exist"),
            Some(ALPHA),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "SyntaxError");

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/edvs/{vault}/documents/z1ABxUcbcnSyMtnenFmeARhxx"),
            Some(ALPHA),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["type"], "NotFoundError");
}

#[tokio::test]
async fn test_delete_reports_whether_removed() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;
    let docs = format!("/edvs/{vault}/documents");
    let id = DocumentId::generate();
    app.call(Method::POST, &docs, Some(ALPHA), Some(document(&id, 0, json!([]))))
        .await;

    let (status, body) = app
        .call(Method::DELETE, &format!("{docs}/{id}"), Some(ALPHA), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(true));

    let (status, _) = app
        .call(Method::GET, &format!("{docs}/{id}"), Some(ALPHA), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(Method::DELETE, &format!("{docs}/{id}"), Some(ALPHA), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(false));
}

#[tokio::test]
async fn test_chunks_follow_document() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;
    let docs = format!("/edvs/{vault}/documents");
    let id = DocumentId::generate();
    app.call(Method::POST, &docs, Some(ALPHA), Some(document(&id, 0, json!([]))))
        .await;

    let chunk_url = format!("{docs}/{id}/chunks/0");
    let chunk = json!({"index": 0, "offset": 0, "sequence": 0, "jwe": {"ciphertext": "Y2h1bms"}});
    let (status, _) = app
        .call(Method::POST, &chunk_url, Some(ALPHA), Some(chunk))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.call(Method::GET, &chunk_url, Some(ALPHA), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jwe"]["ciphertext"], "Y2h1bms");

    let stale = json!({"index": 1, "sequence": 4, "jwe": {}});
    let (status, body) = app
        .call(Method::POST, &format!("{docs}/{id}/chunks/1"), Some(ALPHA), Some(stale))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["type"], "InvalidStateError");

    app.call(Method::DELETE, &format!("{docs}/{id}"), Some(ALPHA), None)
        .await;
    let (status, _) = app.call(Method::GET, &chunk_url, Some(ALPHA), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_racing_updates_have_one_winner() {
    let app = TestApp::new();
    let vault = app.create_vault(ALPHA).await;
    let docs = format!("/edvs/{vault}/documents");
    let id = DocumentId::generate();
    app.call(Method::POST, &docs, Some(ALPHA), Some(document(&id, 0, json!([]))))
        .await;

    let url = format!("{docs}/{id}");
    let attempts = (0..6).map(|_| {
        app.call(Method::POST, &url, Some(ALPHA), Some(document(&id, 1, json!([]))))
    });
    let results = join_all(attempts).await;

    let winners = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::OK)
        .count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .all(|(status, _)| *status == StatusCode::OK || *status == StatusCode::CONFLICT));
}
