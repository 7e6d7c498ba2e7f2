use actix_web::{test, web, App};
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::PgPool;

use taskhub::auth::AuthMiddleware;
use taskhub::config::Config;
use taskhub::routes;

// All tests here exercise comment threads and the attachment lifecycle
// against a real database; run with `cargo test -- --ignored`.

async fn db_pool() -> PgPool {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for DB tests");
    let pool = PgPool::connect(&url).await.expect("Failed to connect to test DB");
    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");
    pool
}

fn test_config(upload_dir: &str) -> Config {
    Config {
        database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
        jwt_secret: "integration-test-secret".to_string(),
        upload_dir: upload_dir.to_string(),
        server_port: 0,
        server_host: "127.0.0.1".to_string(),
    }
}

async fn test_app(
    pool: PgPool,
    upload_dir: &str,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(pool))
            .app_data(web::Data::new(test_config(upload_dir)))
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            ),
    )
    .await
}

async fn status_of(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    req: actix_http::Request,
) -> u16 {
    match test::try_call_service(app, req).await {
        Ok(resp) => resp.status().as_u16(),
        Err(err) => err.error_response().status().as_u16(),
    }
}

struct TestUser {
    id: i64,
    token: String,
}

async fn register_user(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    name: &str,
) -> TestUser {
    let email = format!("{}-{}@example.com", name, uuid::Uuid::new_v4());
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "name": name, "email": email, "password": "password123" }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status().as_u16(), 201, "registration failed");
    let body: serde_json::Value = test::read_body_json(resp).await;
    TestUser {
        id: body["data"]["user"]["id"].as_i64().unwrap(),
        token: body["data"]["token"].as_str().unwrap().to_string(),
    }
}

fn bearer(user: &TestUser) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", user.token))
}

async fn create_task(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    owner: &TestUser,
    assigned_to: &[i64],
) -> String {
    let req = test::TestRequest::post()
        .uri("/api/tasks")
        .insert_header(bearer(owner))
        .set_json(json!({ "title": "Discussion task", "assigned_to": assigned_to }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    body["data"]["id"].as_str().unwrap().to_string()
}

#[ignore]
#[actix_rt::test]
async fn test_comment_thread_access() {
    let pool = db_pool().await;
    let app = test_app(pool.clone(), "uploads-test").await;

    let creator = register_user(&app, "commenter").await;
    let assignee = register_user(&app, "replier").await;
    let outsider = register_user(&app, "lurker").await;

    let task_id = create_task(&app, &creator, &[assignee.id]).await;

    // The creator comments; the assignee replies; the outsider may not.
    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/tasks/{}", task_id))
        .insert_header(bearer(&creator))
        .set_json(json!({ "body": "First!" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let root_id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/tasks/{}", task_id))
        .insert_header(bearer(&assignee))
        .set_json(json!({ "body": "A reply", "parent_id": root_id }))
        .to_request();
    assert_eq!(status_of(&app, req).await, 201);

    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/tasks/{}", task_id))
        .insert_header(bearer(&outsider))
        .set_json(json!({ "body": "Drive-by" }))
        .to_request();
    assert_eq!(status_of(&app, req).await, 403);

    // Comments list oldest first.
    let req = test::TestRequest::get()
        .uri(&format!("/api/comments/tasks/{}", task_id))
        .insert_header(bearer(&assignee))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let comments = body["data"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["body"], "First!");

    // Only the author (or an admin) may edit, even with task access.
    let req = test::TestRequest::put()
        .uri(&format!("/api/comments/{}", root_id))
        .insert_header(bearer(&assignee))
        .set_json(json!({ "body": "Hijacked" }))
        .to_request();
    assert_eq!(status_of(&app, req).await, 403);

    let req = test::TestRequest::put()
        .uri(&format!("/api/comments/{}", root_id))
        .insert_header(bearer(&creator))
        .set_json(json!({ "body": "First, edited" }))
        .to_request();
    assert_eq!(status_of(&app, req).await, 200);

    // A blank body is rejected.
    let req = test::TestRequest::put()
        .uri(&format!("/api/comments/{}", root_id))
        .insert_header(bearer(&creator))
        .set_json(json!({ "body": "   " }))
        .to_request();
    assert_eq!(status_of(&app, req).await, 400);

    // Soft-deleted comments disappear from the thread.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/comments/{}", root_id))
        .insert_header(bearer(&creator))
        .to_request();
    assert_eq!(status_of(&app, req).await, 200);

    let req = test::TestRequest::get()
        .uri(&format!("/api/comments/tasks/{}", task_id))
        .insert_header(bearer(&creator))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[ignore]
#[actix_rt::test]
async fn test_parent_comment_must_share_task() {
    let pool = db_pool().await;
    let app = test_app(pool.clone(), "uploads-test").await;

    let user = register_user(&app, "threader").await;
    let task_a = create_task(&app, &user, &[]).await;
    let task_b = create_task(&app, &user, &[]).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/tasks/{}", task_a))
        .insert_header(bearer(&user))
        .set_json(json!({ "body": "On task A" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let comment_a = body["data"]["id"].as_str().unwrap().to_string();

    // A reply on task B cannot hang off a comment on task A.
    let req = test::TestRequest::post()
        .uri(&format!("/api/comments/tasks/{}", task_b))
        .insert_header(bearer(&user))
        .set_json(json!({ "body": "Cross-thread", "parent_id": comment_a }))
        .to_request();
    assert_eq!(status_of(&app, req).await, 400);
}

fn multipart_body(boundary: &str, files: &[(&str, &str, &str)]) -> String {
    let mut body = String::new();
    for (filename, content_type, data) in files {
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{f}\"\r\n\
             Content-Type: {t}\r\n\r\n{d}\r\n",
            b = boundary,
            f = filename,
            t = content_type,
            d = data
        ));
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    body
}

#[ignore]
#[actix_rt::test]
async fn test_file_upload_download_delete() {
    let pool = db_pool().await;
    let upload_dir = format!("uploads-test-{}", uuid::Uuid::new_v4());
    let app = test_app(pool.clone(), &upload_dir).await;

    let user = register_user(&app, "uploader").await;
    let task_id = create_task(&app, &user, &[]).await;

    // Upload a small text file.
    let boundary = "taskhub-test-boundary";
    let req = test::TestRequest::post()
        .uri(&format!("/api/files/upload/{}", task_id))
        .insert_header(bearer(&user))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(multipart_body(boundary, &[("note.txt", "text/plain", "hello")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let file_id = body["data"][0]["id"].as_str().unwrap().to_string();
    let storage_path = body["data"][0]["storage_path"].as_str().unwrap().to_string();
    assert_eq!(body["data"][0]["filename"], "note.txt");

    // Download round-trips the bytes.
    let req = test::TestRequest::get()
        .uri(&format!("/api/files/download/{}", file_id))
        .insert_header(bearer(&user))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
    let bytes = test::read_body(resp).await;
    assert_eq!(&bytes[..], b"hello");

    // A disallowed MIME type fails the request.
    let req = test::TestRequest::post()
        .uri(&format!("/api/files/upload/{}", task_id))
        .insert_header(bearer(&user))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(multipart_body(
            boundary,
            &[("run.sh", "application/x-sh", "#!/bin/sh")],
        ))
        .to_request();
    assert_eq!(status_of(&app, req).await, 400);

    // Remove the blob behind the API's back: download 404s, delete still
    // soft-deletes the metadata.
    std::fs::remove_file(&storage_path).unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/files/download/{}", file_id))
        .insert_header(bearer(&user))
        .to_request();
    assert_eq!(status_of(&app, req).await, 404);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/files/{}", file_id))
        .insert_header(bearer(&user))
        .to_request();
    assert_eq!(status_of(&app, req).await, 200);

    // Gone from the listing afterwards.
    let req = test::TestRequest::get()
        .uri(&format!("/api/files/task/{}", task_id))
        .insert_header(bearer(&user))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let _ = std::fs::remove_dir_all(&upload_dir);
}

#[ignore]
#[actix_rt::test]
async fn test_rejected_upload_batch_leaves_nothing() {
    let pool = db_pool().await;
    let upload_dir = format!("uploads-test-{}", uuid::Uuid::new_v4());
    let app = test_app(pool.clone(), &upload_dir).await;

    let user = register_user(&app, "batcher").await;
    let task_id = create_task(&app, &user, &[]).await;

    // An acceptable file followed by a rejected one: the request fails as a
    // whole, and the accepted file must not survive it either.
    let boundary = "taskhub-test-boundary";
    let req = test::TestRequest::post()
        .uri(&format!("/api/files/upload/{}", task_id))
        .insert_header(bearer(&user))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(multipart_body(
            boundary,
            &[
                ("notes.txt", "text/plain", "legitimate"),
                ("evil.sh", "application/x-sh", "#!/bin/sh"),
            ],
        ))
        .to_request();
    assert_eq!(status_of(&app, req).await, 400);

    // No metadata rows for any file of the batch.
    let req = test::TestRequest::get()
        .uri(&format!("/api/files/task/{}", task_id))
        .insert_header(bearer(&user))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // And no blobs on disk.
    let task_dir = std::path::Path::new(&upload_dir).join(&task_id);
    let blobs = match std::fs::read_dir(&task_dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    assert_eq!(blobs, 0);

    let _ = std::fs::remove_dir_all(&upload_dir);
}
