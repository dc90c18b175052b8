use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, JsonValue) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, body)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, JsonValue) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn send_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: &JsonValue,
) -> (StatusCode, JsonValue) {
    send(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn taxonomy_admin_flow_end_to_end() {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("PUBLIC_RPS", "1000");
    env::set_var("ADMIN_USER_ID", Uuid::new_v4().to_string());
    env::set_var(
        "UPLOADS_DIR",
        env::temp_dir()
            .join(format!("board-test-{}", Uuid::new_v4()))
            .display()
            .to_string(),
    );

    opportunity_board::config::init_config().expect("init config");
    let pool = opportunity_board::database::pool::create_pool()
        .await
        .expect("pool");
    opportunity_board::database::pool::run_migrations(&pool)
        .await
        .expect("migrations");

    let state = opportunity_board::AppState::new(pool.clone()).expect("state");
    let app = opportunity_board::app(state);

    let run = Uuid::new_v4().simple().to_string();
    let marker = &run[..10];

    // Legacy kind names are accepted on the way in, canonical on the way out.
    let (status, parent) = send_json(
        &app,
        "POST",
        "/api/admin/taxonomies",
        &json!({ "title": format!("Data {}", marker), "kind": "job_category" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(parent["kind"], json!("opportunity_category"));
    assert_eq!(parent["slug"], json!(format!("data-{}", marker)));
    assert_eq!(parent["status"], json!(1));
    assert_eq!(parent["parent_id"], JsonValue::Null);
    let parent_id = parent["id"].as_i64().unwrap();

    // Same title within the kind group grows a slug discriminator.
    let (status, sibling) = send_json(
        &app,
        "POST",
        "/api/admin/taxonomies",
        &json!({ "title": format!("Data {}", marker), "kind": "opportunity_category" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sibling["slug"], json!(format!("data-{}2", marker)));

    let (status, child) = send_json(
        &app,
        "POST",
        "/api/admin/taxonomies",
        &json!({
            "title": format!("Pipelines {}", marker),
            "kind": "opportunity_category",
            "parent_id": parent_id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(child["parent_id"], json!(parent_id));
    let child_id = child["id"].as_i64().unwrap();

    // Rejections: blank titles, unknown kinds, cross-group parents.
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/admin/taxonomies",
        &json!({ "title": "", "kind": "opportunity_category" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["title"][0], json!("Title is required"));

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/admin/taxonomies",
        &json!({ "title": "!!!", "kind": "opportunity_category" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["title"][0],
        json!("Title must contain at least one letter or number")
    );

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/admin/taxonomies",
        &json!({ "title": format!("Blog {}", marker), "kind": "blog_category" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["kind"][0], json!("The selected kind is invalid"));

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/admin/taxonomies",
        &json!({
            "title": format!("Orphan Tag {}", marker),
            "kind": "opportunity_tag",
            "parent_id": parent_id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["parent_id"][0],
        json!("The selected parent is invalid")
    );

    // Kind-scoped admin listing accepts either spelling of the kind.
    let (status, body) = get(&app, "/api/admin/taxonomies?kind=blog_category").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("The selected kind is invalid"));

    for kind in ["job_category", "opportunity_category"] {
        let (status, listed) = get(&app, &format!("/api/admin/taxonomies?kind={}", kind)).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        assert!(titles.contains(&format!("Data {}", marker).as_str()));
        assert!(titles.contains(&format!("Pipelines {}", marker).as_str()));
    }

    // Update keeps the slug fixed and validates status and parent.
    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/api/admin/taxonomies/{}", parent_id),
        &json!({ "status": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["status"][0],
        json!("The selected status is invalid")
    );

    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/api/admin/taxonomies/{}", parent_id),
        &json!({ "parent_id": parent_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["parent_id"][0],
        json!("The selected parent is invalid")
    );

    let (status, renamed) = send_json(
        &app,
        "PATCH",
        &format!("/api/admin/taxonomies/{}", parent_id),
        &json!({ "title": format!("Data Platform {}", marker) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["title"], json!(format!("Data Platform {}", marker)));
    assert_eq!(renamed["slug"], json!(format!("data-{}", marker)));

    // Public tree: the child nests under its active parent, then surfaces as
    // a root once the parent is deactivated.
    let (_, tree) = get(&app, "/api/taxonomies").await;
    let parent_node = tree["categories"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == json!(parent_id))
        .expect("parent visible");
    assert!(parent_node["children"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["id"] == json!(child_id)));

    let (status, deactivated) = send_json(
        &app,
        "PATCH",
        &format!("/api/admin/taxonomies/{}", parent_id),
        &json!({ "status": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["status"], json!(0));

    let (_, tree) = get(&app, "/api/taxonomies").await;
    let categories = tree["categories"].as_array().unwrap();
    assert!(!categories.iter().any(|c| c["id"] == json!(parent_id)));
    let orphan = categories
        .iter()
        .find(|c| c["id"] == json!(child_id))
        .expect("child promoted to root");
    assert!(orphan["children"].as_array().unwrap().is_empty());

    // Deletion is final; repeat calls and unknown ids are 404s.
    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/taxonomies/{}", child_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/taxonomies/{}", child_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Category not found"));

    let (status, _) = send_json(
        &app,
        "PATCH",
        "/api/admin/taxonomies/999999999",
        &json!({ "title": "Ghost" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
