pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::assessment::handlers as assessment;
use crate::state::AppState;
use crate::submission::handlers as submission;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.upload_body_limit();

    Router::new()
        .route("/health", get(health::health_handler))
        // Skill assessment wizard
        .route(
            "/api/v1/assessments/options",
            get(assessment::handle_options),
        )
        .route("/api/v1/assessments", post(assessment::handle_start))
        .route(
            "/api/v1/assessments/:id",
            get(assessment::handle_get).delete(assessment::handle_abandon),
        )
        .route(
            "/api/v1/assessments/:id/skills/:skill_id",
            put(assessment::handle_select_level),
        )
        .route(
            "/api/v1/assessments/:id/goals",
            post(assessment::handle_toggle_goal),
        )
        .route(
            "/api/v1/assessments/:id/advance",
            post(assessment::handle_advance),
        )
        .route(
            "/api/v1/assessments/:id/retreat",
            post(assessment::handle_retreat),
        )
        .route(
            "/api/v1/assessments/:id/finish",
            post(assessment::handle_finish),
        )
        // Assignment submission
        .route("/api/v1/assignment", get(submission::handle_assignment))
        .route("/api/v1/submissions", post(submission::handle_start))
        .route(
            "/api/v1/submissions/:id",
            get(submission::handle_get).delete(submission::handle_abandon),
        )
        .route(
            "/api/v1/submissions/:id/files",
            post(submission::handle_upload),
        )
        .route(
            "/api/v1/submissions/:id/files/:index",
            delete(submission::handle_remove_file),
        )
        .route(
            "/api/v1/submissions/:id/notes",
            put(submission::handle_set_notes),
        )
        .route(
            "/api/v1/submissions/:id/submit",
            post(submission::handle_submit),
        )
        .route(
            "/api/v1/submissions/:id/retry",
            post(submission::handle_retry),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::assessment::skills::{default_categories, GOAL_OPTIONS};
    use crate::config::Config;
    use crate::submission::feedback::test_support::FlakyGenerator;
    use crate::submission::feedback::{AnalysisPolicy, FeedbackGenerator, MockFeedbackGenerator};

    const BOUNDARY: &str = "atelier-test-boundary";

    fn test_state() -> AppState {
        let mut state = AppState::from_config(Config::default());
        state.feedback = Arc::new(MockFeedbackGenerator::new(Duration::from_millis(20)));
        state
    }

    /// Single attempt per analysis so failures surface quickly.
    fn state_with(generator: Arc<dyn FeedbackGenerator>) -> AppState {
        let mut state = AppState::from_config(Config::default());
        state.feedback = generator;
        state.analysis_policy = AnalysisPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 0,
            backoff_base: Duration::from_millis(1),
        };
        state
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().uri(uri).method(method);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn upload(app: &Router, id: &str, files: &[(&str, &[u8])]) -> Response {
        let request = Request::builder()
            .uri(format!("/api/v1/submissions/{id}/files"))
            .method(Method::POST)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(files)))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn start_submission(app: &Router) -> String {
        let json = body_json(send(app, Method::POST, "/api/v1/submissions", None).await).await;
        json["id"].as_str().unwrap().to_string()
    }

    async fn wait_for_phase(app: &Router, id: &str, phase: &str) -> Value {
        let mut json = Value::Null;
        for _ in 0..200 {
            json = body_json(
                send(app, Method::GET, &format!("/api/v1/submissions/{id}"), None).await,
            )
            .await;
            if json["phase"] == phase {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("submission never reached {phase}: {json}");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state());
        let response = send(&app, Method::GET, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_assessment_flow_over_http() {
        let app = build_router(test_state());

        let response = send(&app, Method::POST, "/api/v1/assessments", None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        let id = json["id"].as_str().unwrap().to_string();
        assert_eq!(json["step_index"], 0);
        assert_eq!(json["current"]["kind"], "skill_category");

        // Incomplete step: advance is inert.
        let json = body_json(
            send(&app, Method::POST, &format!("/api/v1/assessments/{id}/advance"), None).await,
        )
        .await;
        assert_eq!(json["step_index"], 0);

        for skill in ["javascript", "python", "react", "nodejs"] {
            let response = send(
                &app,
                Method::PUT,
                &format!("/api/v1/assessments/{id}/skills/{skill}"),
                Some(json!({ "level": "advanced" })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let json = body_json(
            send(&app, Method::POST, &format!("/api/v1/assessments/{id}/advance"), None).await,
        )
        .await;
        assert_eq!(json["step_index"], 1);
        assert_eq!(json["progress"]["percent"], 50);

        let response = send(
            &app,
            Method::POST,
            &format!("/api/v1/assessments/{id}/finish"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_skill_and_goal_rejected() {
        let app = build_router(test_state());
        let json = body_json(send(&app, Method::POST, "/api/v1/assessments", None).await).await;
        let id = json["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/v1/assessments/{id}/skills/cobol"),
            Some(json!({ "level": "expert" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::POST,
            &format!("/api/v1/assessments/{id}/goals"),
            Some(json!({ "goal": "Become an astronaut" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_session_is_404() {
        let app = build_router(test_state());
        let response = send(
            &app,
            Method::GET,
            "/api/v1/submissions/00000000-0000-0000-0000-000000000000",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_without_files_is_400() {
        let app = build_router(test_state());
        let json = body_json(send(&app, Method::POST, "/api/v1/submissions", None).await).await;
        let id = json["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            Method::POST,
            &format!("/api/v1/submissions/{id}/submit"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(
            send(&app, Method::GET, &format!("/api/v1/submissions/{id}"), None).await,
        )
        .await;
        assert_eq!(json["phase"], "idle");
    }

    #[tokio::test]
    async fn test_unsupported_upload_rejected() {
        let app = build_router(test_state());
        let json = body_json(send(&app, Method::POST, "/api/v1/submissions", None).await).await;
        let id = json["id"].as_str().unwrap().to_string();

        let response = upload(&app, &id, &[("essay.docx", b"hello".as_slice())]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submission_flow_over_http() {
        let app = build_router(test_state());
        let json = body_json(send(&app, Method::POST, "/api/v1/submissions", None).await).await;
        let id = json["id"].as_str().unwrap().to_string();
        assert_eq!(json["assignment_id"], "typography-hierarchy");

        let response = upload(&app, &id, &[("a.png", [7u8; 1000].as_slice())]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["accepted"][0]["size_bytes"], 1000);
        assert_eq!(json["accepted"][0]["mime"], "image/png");

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/v1/submissions/{id}/notes"),
            Some(json!({ "notes": "Three levels of hierarchy" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            Method::POST,
            &format!("/api/v1/submissions/{id}/submit"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["phase"], "analyzing");

        let response = send(
            &app,
            Method::POST,
            &format!("/api/v1/submissions/{id}/submit"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let mut phase = Value::Null;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let json = body_json(
                send(&app, Method::GET, &format!("/api/v1/submissions/{id}"), None).await,
            )
            .await;
            phase = json["phase"].clone();
            if phase == "completed" {
                assert_eq!(json["feedback"]["overall_score"], 85);
                assert_eq!(json["band"], "excellent");
                break;
            }
        }
        assert_eq!(phase, "completed");
    }

    #[tokio::test]
    async fn test_abandon_submission() {
        let app = build_router(test_state());
        let json = body_json(send(&app, Method::POST, "/api/v1/submissions", None).await).await;
        let id = json["id"].as_str().unwrap().to_string();
        upload(&app, &id, &[("a.pdf", b"%PDF-1.7".as_slice())]).await;
        send(&app, Method::POST, &format!("/api/v1/submissions/{id}/submit"), None).await;

        let response = send(&app, Method::DELETE, &format!("/api/v1/submissions/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, Method::GET, &format!("/api/v1/submissions/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_options_and_assignment() {
        let app = build_router(test_state());

        let response = send(&app, Method::GET, "/api/v1/assessments/options", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["categories"].as_array().unwrap().len(), 3);
        assert_eq!(json["levels"][0], "beginner");
        assert_eq!(json["levels"][3], "expert");
        assert_eq!(json["goals"].as_array().unwrap().len(), GOAL_OPTIONS.len());

        let response = send(&app, Method::GET, "/api/v1/assignment", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], "typography-hierarchy");
        assert_eq!(json["title"], "Typography Hierarchy Design");
    }

    #[tokio::test]
    async fn test_toggle_goal_on_and_off() {
        let app = build_router(test_state());
        let json = body_json(send(&app, Method::POST, "/api/v1/assessments", None).await).await;
        let id = json["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/assessments/{id}/goals");
        let goal = GOAL_OPTIONS[1];

        let json = body_json(send(&app, Method::POST, &uri, Some(json!({ "goal": goal }))).await).await;
        assert_eq!(json["goals"], json!([goal]));

        let json = body_json(send(&app, Method::POST, &uri, Some(json!({ "goal": goal }))).await).await;
        assert_eq!(json["goals"], json!([]));
    }

    #[tokio::test]
    async fn test_finish_returns_profile_and_closes_session() {
        let app = build_router(test_state());
        let json = body_json(send(&app, Method::POST, "/api/v1/assessments", None).await).await;
        let id = json["id"].as_str().unwrap().to_string();

        let categories = default_categories();
        for category in &categories {
            for skill in category.skill_ids() {
                let response = send(
                    &app,
                    Method::PUT,
                    &format!("/api/v1/assessments/{id}/skills/{skill}"),
                    Some(json!({ "level": "intermediate" })),
                )
                .await;
                assert_eq!(response.status(), StatusCode::OK);
            }
            send(&app, Method::POST, &format!("/api/v1/assessments/{id}/advance"), None).await;
        }
        let json = body_json(
            send(
                &app,
                Method::POST,
                &format!("/api/v1/assessments/{id}/goals"),
                Some(json!({ "goal": GOAL_OPTIONS[0] })),
            )
            .await,
        )
        .await;
        assert_eq!(json["is_complete"], true);

        let response = send(&app, Method::POST, &format!("/api/v1/assessments/{id}/finish"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["profile"]["categories"].as_array().unwrap().len(), categories.len());
        assert_eq!(json["profile"]["categories"][0]["overall"], "intermediate");
        assert_eq!(json["profile"]["goals"], json!([GOAL_OPTIONS[0]]));

        let response = send(&app, Method::GET, &format!("/api/v1/assessments/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_remove_file_over_http() {
        let app = build_router(test_state());
        let id = start_submission(&app).await;
        upload(&app, &id, &[("a.png", b"aa".as_slice()), ("b.pdf", b"bbb".as_slice())]).await;

        let response = send(&app, Method::DELETE, &format!("/api/v1/submissions/{id}/files/0"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["attachments"].as_array().unwrap().len(), 1);
        assert_eq!(json["attachments"][0]["name"], "b.pdf");
        assert_eq!(json["total_bytes"], 3);

        // Out of range: unchanged view, still 200.
        let response = send(&app, Method::DELETE, &format!("/api/v1/submissions/{id}/files/5"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let after = body_json(response).await;
        assert_eq!(after["attachments"], json["attachments"]);
        assert_eq!(after["phase"], "idle");
    }

    #[tokio::test]
    async fn test_upload_while_analyzing_is_conflict() {
        let mut state = test_state();
        state.feedback = Arc::new(MockFeedbackGenerator::new(Duration::from_secs(60)));
        let app = build_router(state);
        let id = start_submission(&app).await;
        upload(&app, &id, &[("a.png", b"png".as_slice())]).await;
        let response = send(&app, Method::POST, &format!("/api/v1/submissions/{id}/submit"), None).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = upload(&app, &id, &[("b.png", b"late".as_slice())]).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"]["code"], "CONFLICT");

        let json = body_json(send(&app, Method::GET, &format!("/api/v1/submissions/{id}"), None).await).await;
        assert_eq!(json["phase"], "analyzing");
        assert_eq!(json["attachments"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failed_analysis() {
        let app = build_router(state_with(Arc::new(FlakyGenerator::new(1))));
        let id = start_submission(&app).await;
        upload(&app, &id, &[("a.png", [1u8; 1000].as_slice())]).await;

        // Nothing to retry yet.
        let response = send(&app, Method::POST, &format!("/api/v1/submissions/{id}/retry"), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        send(&app, Method::POST, &format!("/api/v1/submissions/{id}/submit"), None).await;
        let json = wait_for_phase(&app, &id, "failed").await;
        assert_eq!(json["error"]["kind"], "unavailable");
        assert!(json["feedback"].is_null());

        let response = send(&app, Method::POST, &format!("/api/v1/submissions/{id}/retry"), None).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["phase"], "analyzing");

        let json = wait_for_phase(&app, &id, "completed").await;
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["feedback"]["overall_score"], 85);
        assert_eq!(json["band_label"], "Excellent");

        let response = send(&app, Method::POST, &format!("/api/v1/submissions/{id}/retry"), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_router_builds_with_huge_upload_limit() {
        let state = AppState::from_config(Config {
            max_upload_bytes: u64::MAX,
            ..Config::default()
        });
        let _ = build_router(state);
    }
}
