mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tempfile::TempDir;

use chapter_vault::analysis::FormattingAnalyzer;
use chapter_vault::config::VersionNumbering;
use chapter_vault::routes;
use chapter_vault::state::AppState;

use common::{vault, StubAnalyzer};

/// 라우터를 실제 리스너에 띄우고 base url 반환
async fn spawn_app(state: AppState) -> String {
    let app = routes::router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{}", addr)
}

fn chapter_form(filename: &str, body: &[u8]) -> Form {
    Form::new().part(
        "file",
        Part::bytes(body.to_vec()).file_name(filename.to_string()),
    )
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(vault(&dir, VersionNumbering::Monotonic, None)).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_upload_list_current_and_download() {
    let dir = TempDir::new().unwrap();
    let stub = StubAnalyzer::new(93.0);
    let base = spawn_app(vault(
        &dir,
        VersionNumbering::Monotonic,
        Some(stub.clone() as Arc<dyn FormattingAnalyzer>),
    ))
    .await;
    let client = reqwest::Client::new();
    let versions_url = format!("{}/api/groups/12/chapters/2/versions", base);

    let resp = client
        .post(&versions_url)
        .multipart(chapter_form("Literature Review.pdf", b"first draft"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let first: Value = resp.json().await.unwrap();
    assert_eq!(first["success"], true);
    assert_eq!(first["version"], 1);
    assert_eq!(first["is_current"], true);
    assert_eq!(first["original_filename"], "Literature Review.pdf");
    assert_eq!(first["analysis"]["success"], true);
    assert_eq!(first["analysis"]["score"], 93.0);

    let form = chapter_form("Literature Review.pdf", b"second draft").text("analyze", "false");
    let second: Value = client
        .post(&versions_url)
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["version"], 2);
    assert!(second.get("analysis").is_none());
    assert_eq!(stub.calls(), 1);

    let listing: Value = client.get(&versions_url).send().await.unwrap().json().await.unwrap();
    let versions = listing["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["version"], 2);
    assert_eq!(versions[0]["is_current"], true);
    assert_eq!(versions[1]["is_current"], false);

    let current: Value = client
        .get(format!("{}/api/groups/12/chapters/2/current", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["version"]["version"], 2);

    let resp = client
        .get(format!("{}/1/file", versions_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("Literature_Review.pdf"));
    assert_eq!(&resp.bytes().await.unwrap()[..], b"first draft");

    let analysis: Value = client
        .get(format!("{}/1/analysis", versions_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analysis["analysis"]["score"], 93.0);

    let reanalyzed: Value = client
        .post(format!("{}/api/groups/12/chapters/2/analysis", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reanalyzed["version"], 2);
    assert_eq!(reanalyzed["analysis"]["success"], true);
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn test_upload_errors_use_status_codes() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(vault(&dir, VersionNumbering::Monotonic, None)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/groups/1/chapters/1/versions", base))
        .multipart(Form::new().text("analyze", "true"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "INVALID_REQUEST");

    let resp = client
        .post(format!("{}/api/groups/0/chapters/1/versions", base))
        .multipart(chapter_form("a.pdf", b"x"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!("{}/api/groups/1/chapters/1/current", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "LINEAGE_EMPTY");

    let resp = client
        .get(format!("{}/api/groups/1/chapters/1/versions/4/file", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_delete_envelope_accepts_form_and_json() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(vault(&dir, VersionNumbering::Monotonic, None)).await;
    let client = reqwest::Client::new();
    let versions_url = format!("{}/api/groups/3/chapters/1/versions", base);
    for body in [b"v1".as_slice(), b"v2".as_slice()] {
        client
            .post(&versions_url)
            .multipart(chapter_form("ch1.pdf", body))
            .send()
            .await
            .unwrap();
    }
    let delete_url = format!("{}/api/chapters/delete", base);

    let resp = client
        .post(&delete_url)
        .form(&[("group_id", "3"), ("chapter_number", "1"), ("version", "2")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"success": true}));

    let listing: Value = client.get(&versions_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(listing["versions"][0]["version"], 1);
    assert_eq!(listing["versions"][0]["is_current"], true);

    let body: Value = client
        .post(&delete_url)
        .json(&json!({"group_id": 3, "chapter_number": 1, "version": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    // 이미 없는 버전도 성공
    let body: Value = client
        .post(&delete_url)
        .json(&json!({"group_id": 3, "chapter_number": 1, "version": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    // 실패도 200 + success:false
    let resp = client
        .post(&delete_url)
        .form(&[("group_id", "3"), ("chapter_number", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());

    let resp = client
        .post(&delete_url)
        .json(&json!({"group_id": 3, "chapter_number": 1, "version": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_actor_headers_reach_audit_log() {
    let dir = TempDir::new().unwrap();
    let base = spawn_app(vault(&dir, VersionNumbering::Monotonic, None)).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/groups/4/chapters/1/versions", base))
        .header("X-Actor-Id", "17")
        .header("X-Actor-Name", "Choi")
        .header("X-Actor-Role", "student")
        .multipart(chapter_form("intro.docx", b"x"))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/api/chapters/delete", base))
        .json(&json!({"group_id": 4, "chapter_number": 1, "version": 1}))
        .send()
        .await
        .unwrap();

    let body: Value = client
        .get(format!("{}/api/audit?limit=10", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);

    assert_eq!(events[0]["action_kind"], "delete_chapter");
    assert_eq!(events[0]["actor_name"], "anonymous");
    assert_eq!(events[0]["actor_role"], "unknown");
    assert_eq!(events[0]["ip_address"], "127.0.0.1");

    assert_eq!(events[1]["action_kind"], "upload_chapter");
    assert_eq!(events[1]["actor_id"], "17");
    assert_eq!(events[1]["actor_name"], "Choi");
    assert!(events[1]["details"].as_str().unwrap().contains("intro.docx"));

    let resp = client
        .get(format!("{}/api/audit?limit=0", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

async fn upload_ip(trust_forwarded_for: bool) -> Value {
    let dir = TempDir::new().unwrap();
    let mut state = vault(&dir, VersionNumbering::Monotonic, None);
    state.config.trust_forwarded_for = trust_forwarded_for;
    let base = spawn_app(state).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/groups/5/chapters/1/versions", base))
        .header("X-Forwarded-For", "203.0.113.50")
        .multipart(chapter_form("intro.pdf", b"x"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = client
        .get(format!("{}/api/audit", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["events"][0]["ip_address"].clone()
}

#[tokio::test]
async fn test_forwarded_for_is_trusted_only_behind_proxy() {
    assert_eq!(upload_ip(false).await, "127.0.0.1");
    assert_eq!(upload_ip(true).await, "203.0.113.50");
}
