use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "----board-apply-test";

fn text_part(name: &str, value: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
        b = BOUNDARY
    )
}

fn file_part(name: &str, file_name: &str, contents: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n{contents}\r\n",
        b = BOUNDARY
    )
}

fn apply_request(slug: &str, parts: &[String]) -> Request<Body> {
    let mut body = parts.concat();
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    Request::builder()
        .method("POST")
        .uri(format!("/api/opportunities/{}/apply", slug))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

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

async fn send_raw(app: &axum::Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
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

async fn patch(app: &axum::Router, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method("PATCH").uri(uri);
    let req = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            builder.body(Body::from(value.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, req).await
}

async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(name)
        .bind(format!("user_{}@example.com", id))
        .execute(pool)
        .await
        .expect("seed user");
    id
}

fn valid_answers(applicant: Uuid) -> Vec<String> {
    vec![
        text_part("applicant_id", &applicant.to_string()),
        text_part("fields[Email]", "candidate@example.com"),
        text_part("fields[Years]", "7"),
        file_part("fields[Resume]", "resume.pdf", "%PDF-1.4 resume body"),
        text_part("fields[Cover Letter]", "I would love to join."),
    ]
}

#[tokio::test]
async fn application_flow_end_to_end() {
    dotenvy::dotenv().ok();
    env::remove_var("MAIL_WEBHOOK_URL");
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

    let run = Uuid::new_v4().simple().to_string();
    let marker = &run[..10];

    let owner = seed_user(&pool, &format!("Hiring Manager {}", marker)).await;
    let first = seed_user(&pool, &format!("First Applicant {}", marker)).await;
    let second = seed_user(&pool, &format!("Second Applicant {}", marker)).await;

    let slug = format!("staff-engineer-{}", marker);
    let fields = json!([
        { "label": "Email", "type": "email" },
        { "label": "Years", "type": "number" },
        { "label": "Resume", "type": "file" },
        { "label": "Cover Letter", "type": "textarea" }
    ]);
    let opening_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO openings (user_id, title, slug, description, short_description, type,
            status, apply_type, fields, live_expire_at)
         VALUES ($1, $2, $3, 'Long form.', 'Short form.', 'job_full_time', 1, 0, $4, $5)
         RETURNING id",
    )
    .bind(owner)
    .bind(format!("Staff Engineer {}", marker))
    .bind(&slug)
    .bind(&fields)
    .bind(Utc::now() + Duration::days(30))
    .fetch_one(&pool)
    .await
    .expect("seed opening");

    let external_slug = format!("external-role-{}", marker);
    sqlx::query(
        "INSERT INTO openings (user_id, title, slug, description, short_description, type,
            status, apply_type, live_expire_at)
         VALUES ($1, $2, $3, 'Long form.', 'Short form.', 'job_full_time', 1, 1, $4)",
    )
    .bind(owner)
    .bind(format!("External Role {}", marker))
    .bind(&external_slug)
    .bind(Utc::now() + Duration::days(30))
    .execute(&pool)
    .await
    .expect("seed external opening");

    let state = opportunity_board::AppState::new(pool.clone()).expect("state");
    let app = opportunity_board::app(state);

    // Happy path: answers land in the stored order, the owner gets notified.
    let (status, body) = send(&app, apply_request(&slug, &valid_answers(first))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], json!("Application submitted successfully."));
    assert_eq!(body["opening_id"], json!(opening_id.to_string()));
    let owner_notifications = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND title = 'New application'",
    )
    .bind(owner)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(owner_notifications, 1);

    let (status, body) = send(&app, apply_request(&slug, &valid_answers(first))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        json!("You have already applied for this opportunity.")
    );

    // Answer validation, message per declared field.
    let broken = vec![
        text_part("applicant_id", &second.to_string()),
        text_part("fields[Email]", "not-an-address"),
        text_part("fields[Years]", "several"),
        text_part("fields[Cover Letter]", "Hello."),
    ];
    let (status, body) = send(&app, apply_request(&slug, &broken)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["fields"],
        json!([
            "Email must be a valid email.",
            "Years must be a number.",
            "Resume is required."
        ])
    );

    let wrong_extension = vec![
        text_part("applicant_id", &second.to_string()),
        text_part("fields[Email]", "candidate@example.com"),
        text_part("fields[Years]", "3"),
        file_part("fields[Resume]", "resume.exe", "MZ fake"),
        text_part("fields[Cover Letter]", "Hello."),
    ];
    let (status, body) = send(&app, apply_request(&slug, &wrong_extension)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["fields"],
        json!(["Resume must be a file of type: pdf, doc, docx."])
    );

    let oversized = vec![
        text_part("applicant_id", &second.to_string()),
        text_part("fields[Email]", "candidate@example.com"),
        text_part("fields[Years]", "3"),
        file_part("fields[Resume]", "resume.pdf", &"a".repeat(5 * 1024 * 1024 + 1)),
        text_part("fields[Cover Letter]", "Hello."),
    ];
    let (status, body) = send(&app, apply_request(&slug, &oversized)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["fields"],
        json!(["Resume may not be greater than 5 megabytes."])
    );

    let file_for_text = vec![
        text_part("applicant_id", &second.to_string()),
        file_part("fields[Email]", "email.pdf", "%PDF-1.4"),
        text_part("fields[Years]", "3"),
        file_part("fields[Resume]", "resume.pdf", "%PDF-1.4"),
        text_part("fields[Cover Letter]", "Hello."),
    ];
    let (status, body) = send(&app, apply_request(&slug, &file_for_text)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["fields"], json!(["Email is invalid."]));

    // Gatekeeping around the form itself.
    let (status, body) = send(&app, apply_request(&external_slug, &valid_answers(second))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!("Applications are handled externally for this opportunity.")
    );

    let (status, body) = send(
        &app,
        apply_request("no-such-opening-here", &valid_answers(second)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Opportunity not found"));

    let (status, body) = send(
        &app,
        apply_request(&slug, &[text_part("applicant_id", "not-a-uuid")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("applicant_id must be a valid UUID"));

    let (status, body) = send(
        &app,
        apply_request(&slug, &[text_part("fields[Email]", "a@b.com")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("applicant_id is required"));

    let (status, body) = send(&app, apply_request(&slug, &valid_answers(Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("User not found"));

    let (status, _) = send(&app, apply_request(&slug, &valid_answers(second))).await;
    assert_eq!(status, StatusCode::CREATED);

    // The viewer flag on the public detail page.
    let (_, detail) = get(
        &app,
        &format!("/api/opportunities/{}?viewer_id={}", slug, first),
    )
    .await;
    assert_eq!(detail["already_applied"], json!(true));
    let (_, detail) = get(
        &app,
        &format!("/api/opportunities/{}?viewer_id={}", slug, Uuid::new_v4()),
    )
    .await;
    assert_eq!(detail["already_applied"], json!(false));

    // Employer inbox, oldest first when asked.
    let inbox_base = format!("/api/employer/{}/opportunities/{}/applicants", owner, slug);
    let (status, inbox) = get(&app, &inbox_base).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox["total"], json!(2));
    assert_eq!(
        inbox["items"][0]["applicant"]["name"],
        json!(format!("Second Applicant {}", marker))
    );
    let resume = &inbox["items"][0]["answers"][2];
    assert_eq!(resume["label"], json!("Resume"));
    assert_eq!(resume["type"], json!("file"));
    let stored_path = resume["value"].as_str().unwrap();
    assert!(stored_path.contains("/applications/"));
    assert!(stored_path.ends_with(".pdf"));

    let (_, oldest_first) = get(&app, &format!("{}?order=asc", inbox_base)).await;
    assert_eq!(
        oldest_first["items"][0]["applicant"]["name"],
        json!(format!("First Applicant {}", marker))
    );
    let first_application_id = oldest_first["items"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = get(
        &app,
        &format!(
            "/api/employer/{}/opportunities/{}/applicants",
            Uuid::new_v4(),
            slug
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, all) = get(&app, &format!("/api/employer/{}/applicants", owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total"], json!(2));

    // Seen keeps its first timestamp; hired toggles both ways.
    let seen_uri = format!(
        "/api/employer/{}/applications/{}/seen",
        owner, first_application_id
    );
    let (status, _) = patch(&app, &seen_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let seen_at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT seen_at FROM applications WHERE id = $1",
    )
    .bind(Uuid::parse_str(&first_application_id).unwrap())
    .fetch_one(&pool)
    .await
    .unwrap()
    .expect("seen stamp");
    let (status, _) = patch(&app, &seen_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let seen_again = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT seen_at FROM applications WHERE id = $1",
    )
    .bind(Uuid::parse_str(&first_application_id).unwrap())
    .fetch_one(&pool)
    .await
    .unwrap()
    .expect("seen stamp");
    assert_eq!(seen_at, seen_again);

    let (status, _) = patch(
        &app,
        &format!(
            "/api/employer/{}/applications/{}/seen",
            Uuid::new_v4(),
            first_application_id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let hired_uri = format!(
        "/api/employer/{}/applications/{}/hired",
        owner, first_application_id
    );
    let (status, _) = patch(&app, &hired_uri, Some(json!({ "hired": true }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, inbox) = get(&app, &format!("{}?order=asc", inbox_base)).await;
    assert_eq!(inbox["items"][0]["is_hired"], json!(true));
    let (status, _) = patch(&app, &hired_uri, Some(json!({ "hired": false }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, inbox) = get(&app, &format!("{}?order=asc", inbox_base)).await;
    assert_eq!(inbox["items"][0]["is_hired"], json!(false));

    // Spreadsheet download for the whole inbox.
    let (status, headers, sheet) = send_raw(
        &app,
        Request::builder()
            .method("GET")
            .uri(format!("{}/export", inbox_base))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        format!("attachment; filename=\"{}-applicants.xlsx\"", slug).as_str()
    );
    assert!(sheet.starts_with(b"PK"));

    let (status, _) = get(
        &app,
        &format!(
            "/api/employer/{}/opportunities/{}/applicants/export",
            Uuid::new_v4(),
            slug
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
