//! Integration tests for the task endpoints.
//!
//! Every request goes through the full router, authentication layer included.

mod common;

use axum::http::StatusCode;
use rstest::rstest;
use serde_json::{Value, json};

use common::{
    TASKS_URI, TestApp, TestRequest, create_empty_app, create_seeded_app, path_of, task_uri,
};
use todo_api::domain::TaskId;

const TASKS: &str = "/todo/api/v1.0/tasks";

fn task_path(id: i64) -> String {
    format!("{TASKS}/{id}")
}

async fn task_count(app: &TestApp) -> u64 {
    app.task_repository.count().await.unwrap()
}

// =============================================================================
// GET /tasks
// =============================================================================

#[rstest]
#[tokio::test]
async fn list_returns_rendered_tasks() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::get(TASKS).send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "tasks": [
                {
                    "uri": task_uri(1),
                    "title": "Buy groceries",
                    "description": "Milk, Cheese, Pizza, Fruit, Tylenol",
                    "done": false
                },
                {
                    "uri": task_uri(2),
                    "title": "Learn Python",
                    "description": "Need to find a good Python tutorial on the web",
                    "done": false
                }
            ]
        })
    );
}

#[rstest]
#[tokio::test]
async fn list_on_empty_store_is_empty() {
    let app = create_empty_app().await;

    let (status, body) = TestRequest::get(TASKS).send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"tasks": []}));
}

#[rstest]
#[tokio::test]
async fn rendered_tasks_never_expose_id() {
    let app = create_seeded_app().await;

    let (_, body) = TestRequest::get(TASKS).send(&app).await;

    for task in body["tasks"].as_array().unwrap() {
        let task = task.as_object().unwrap();
        assert!(task.contains_key("uri"));
        assert!(!task.contains_key("id"));
    }
}

// =============================================================================
// GET /tasks/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn get_returns_single_task() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::get(task_path(2)).send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["uri"], task_uri(2));
    assert_eq!(body["task"]["title"], "Learn Python");
}

#[rstest]
#[case("/todo/api/v1.0/tasks/42")]
#[case("/todo/api/v1.0/tasks/0")]
#[case("/todo/api/v1.0/tasks/-1")]
#[case("/todo/api/v1.0/tasks/abc")]
#[tokio::test]
async fn get_unknown_task_is_not_found(#[case] path: &str) {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::get(path).send(&app).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Not found"}));
}

// =============================================================================
// POST /tasks
// =============================================================================

#[rstest]
#[tokio::test]
async fn create_then_fetch_by_uri() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::post(TASKS)
        .json(&json!({"title": "Read a book"}))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["title"], "Read a book");
    assert_eq!(body["task"]["description"], "");
    assert_eq!(body["task"]["done"], false);
    assert_eq!(body["task"]["uri"], task_uri(3));

    let uri = body["task"]["uri"].as_str().unwrap().to_string();
    let (status, fetched) = TestRequest::get(path_of(&uri)).send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, body);
}

#[rstest]
#[tokio::test]
async fn create_on_empty_store_gets_first_id() {
    let app = create_empty_app().await;

    let (status, body) = TestRequest::post(TASKS)
        .json(&json!({"title": "Read a book"}))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["uri"], format!("{TASKS_URI}/{}", TaskId::FIRST));
}

#[rstest]
#[tokio::test]
async fn create_accepts_description() {
    let app = create_empty_app().await;

    let (status, body) = TestRequest::post(TASKS)
        .json(&json!({"title": "Ship it", "description": "v1.0"}))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["description"], "v1.0");
    assert_eq!(body["task"]["done"], false);
}

#[rstest]
#[case(json!({"title": "Ship it", "done": true}))]
#[case(json!({"title": "Ship it", "done": "yes"}))]
#[tokio::test]
async fn create_ignores_done(#[case] body: Value) {
    let app = create_empty_app().await;

    let (status, created) = TestRequest::post(TASKS).json(&body).send(&app).await;
    let (_, fetched) = TestRequest::get(task_path(1)).send(&app).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["task"]["done"], false);
    assert_eq!(fetched["task"]["done"], false);
}

#[rstest]
#[tokio::test]
async fn deleted_highest_id_is_not_reused() {
    let app = create_seeded_app().await;

    let (status, _) = TestRequest::delete(task_path(2)).send(&app).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = TestRequest::post(TASKS)
        .json(&json!({"title": "Read a book"}))
        .send(&app)
        .await;

    assert_eq!(body["task"]["uri"], task_uri(3));
}

#[rstest]
#[case(json!({"description": "fake_news"}))]
#[case(json!({"title": ""}))]
#[case(json!({"title": 1}))]
#[case(json!({"title": "Ok", "description": 5}))]
#[case(json!({}))]
#[case(json!(["Read a book"]))]
#[tokio::test]
async fn create_with_invalid_body_is_bad_request(#[case] body: Value) {
    let app = create_seeded_app().await;

    let (status, response) = TestRequest::post(TASKS).json(&body).send(&app).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response, json!({"error": "Bad request"}));
    assert_eq!(task_count(&app).await, 2);
}

#[rstest]
#[case("text/plain", r#"{"title": "Read a book"}"#)]
#[case("application/json", "{not json")]
#[case("application/json", "")]
#[tokio::test]
async fn create_with_non_json_body_is_bad_request(
    #[case] content_type: &'static str,
    #[case] body: &str,
) {
    let app = create_seeded_app().await;

    let (status, _) = TestRequest::post(TASKS)
        .raw(content_type, body)
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(task_count(&app).await, 2);
}

// =============================================================================
// PUT /tasks/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn update_done_keeps_other_fields() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::put(task_path(2))
        .json(&json!({"done": true}))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "task": {
                "uri": task_uri(2),
                "title": "Learn Python",
                "description": "Need to find a good Python tutorial on the web",
                "done": true
            }
        })
    );

    let (_, fetched) = TestRequest::get(task_path(2)).send(&app).await;
    assert_eq!(fetched, body);
}

#[rstest]
#[tokio::test]
async fn update_is_idempotent() {
    let app = create_seeded_app().await;
    let patch = json!({"title": "Learn Rust", "done": true});

    let (_, first) = TestRequest::put(task_path(2)).json(&patch).send(&app).await;
    let (status, second) = TestRequest::put(task_path(2)).json(&patch).send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    let stored = app
        .task_repository
        .find_by_id(TaskId::new(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.revision, 2);
}

#[rstest]
#[tokio::test]
async fn update_ignores_unknown_fields() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::put(task_path(1))
        .json(&json!({"description": "", "id": 99, "uri": "elsewhere"}))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["uri"], task_uri(1));
    assert_eq!(body["task"]["description"], "");
}

#[rstest]
#[case(json!({"title": 1}))]
#[case(json!({"description": 1}))]
#[case(json!({"done": 1}))]
#[case(json!({"done": "true"}))]
#[case(json!({}))]
#[case(json!([true]))]
#[tokio::test]
async fn update_with_invalid_body_is_bad_request(#[case] body: Value) {
    let app = create_seeded_app().await;

    let (status, response) = TestRequest::put(task_path(2)).json(&body).send(&app).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response, json!({"error": "Bad request"}));
    let (_, fetched) = TestRequest::get(task_path(2)).send(&app).await;
    assert_eq!(fetched["task"]["done"], false);
    assert_eq!(fetched["task"]["title"], "Learn Python");
}

#[rstest]
#[tokio::test]
async fn update_with_non_json_body_is_bad_request() {
    let app = create_seeded_app().await;

    let (status, _) = TestRequest::put(task_path(2))
        .raw("text/plain", "done=true")
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn update_missing_task_is_not_found() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::put(task_path(6))
        .json(&json!({"done": true}))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Not found"}));
}

#[rstest]
#[tokio::test]
async fn update_missing_task_with_bad_body_is_not_found() {
    let app = create_seeded_app().await;

    let (status, _) = TestRequest::put(task_path(6))
        .raw("text/plain", "nonsense")
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// DELETE /tasks/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn delete_then_get_is_not_found() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::delete(task_path(1)).send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": true}));
    assert_eq!(task_count(&app).await, 1);

    let (status, _) = TestRequest::get(task_path(1)).send(&app).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn delete_twice_is_not_found() {
    let app = create_seeded_app().await;

    TestRequest::delete(task_path(1)).send(&app).await;
    let (status, body) = TestRequest::delete(task_path(1)).send(&app).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Not found"}));
}

#[rstest]
#[case("/todo/api/v1.0/tasks/6")]
#[case("/todo/api/v1.0/tasks/six")]
#[tokio::test]
async fn delete_missing_task_is_not_found(#[case] path: &str) {
    let app = create_seeded_app().await;

    let (status, _) = TestRequest::delete(path).send(&app).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(task_count(&app).await, 2);
}

// =============================================================================
// Routing
// =============================================================================

#[rstest]
#[tokio::test]
async fn unknown_route_under_prefix_is_not_found() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::get("/todo/api/v1.0/projects").send(&app).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Not found"}));
}

#[rstest]
#[tokio::test]
async fn unsupported_method_is_rejected() {
    let app = create_seeded_app().await;

    let (status, body) = TestRequest::post(task_path(1))
        .json(&json!({"title": "Read a book"}))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "Method not allowed"}));
    assert_eq!(task_count(&app).await, 2);
}

#[rstest]
#[tokio::test]
async fn health_is_open() {
    let app = create_empty_app().await;

    let (status, body) = TestRequest::get("/health").anonymous().send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
