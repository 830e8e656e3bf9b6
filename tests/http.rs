use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use timetable_mcts::server::router;
use tower::ServiceExt;

fn post(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/timetable/solve")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn solves_over_http() {
    let request = post(json!({
        "problem": {
            "days": 2,
            "periodsPerDay": 2,
            "courses": [{"name": "c1", "teacher": "t1", "lectures": 2, "minWorkingDays": 2, "students": 10}],
            "rooms": [{"id": "r1", "capacity": 10}]
        },
        "config": {"iterations": 100, "seed": 1}
    }));

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let output: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(output["hardPenalty"], 0);
    assert_eq!(output["softPenalty"], 0);
    assert_eq!(output["stopReason"], "optimal");
    assert_eq!(output["lectures"].as_array().map(Vec::len), Some(2));
    assert_eq!(output["lectures"][0]["room"], "r1");
}

#[tokio::test]
async fn malformed_problem_is_a_bad_request() {
    let request = post(json!({
        "problem": {
            "days": 1,
            "periodsPerDay": 1,
            "courses": [],
            "rooms": [{"id": "r1", "capacity": 10}, {"id": "r1", "capacity": 20}]
        }
    }));

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(String::from_utf8_lossy(&body), "Room r1 is declared more than once");
}

#[tokio::test]
async fn invalid_config_is_a_bad_request() {
    let request = post(json!({
        "problem": {
            "days": 1,
            "periodsPerDay": 1,
            "courses": [],
            "rooms": []
        },
        "config": {"hillClimbingIdle": 0}
    }));

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
