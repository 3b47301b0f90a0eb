use super::common::*;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::waitlist::router::{self, ScopeQuery};
use crate::waitlist::waitlist_router;

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn facilities_route_lists_branch_options() {
    let (service, _) = build_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .oneshot(empty_request("GET", "/api/v1/facilities"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(
        body,
        json!([{ "name": "X", "branches": ["See all", "A", "B"] }])
    );
}

#[tokio::test]
async fn add_route_creates_records() {
    let (service, _) = build_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/facilities/X/waiting",
            json!({
                "branch": "A",
                "record": { "name": "Avi", "date_added": "2024-01-01" }
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["name"], "Avi");
    assert_eq!(body["facility"], "X");
    assert_eq!(body["branch"], "A");
}

#[tokio::test]
async fn add_route_rejects_blank_names() {
    let (service, _) = build_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/facilities/X/waiting",
            json!({ "branch": "A", "record": { "name": "  " } }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("name"));
}

#[tokio::test]
async fn list_route_honours_branch_scope() {
    let (service, _) = seeded_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(empty_request("GET", "/api/v1/facilities/X/waiting"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().expect("array").len(), 2);

    let response = router
        .oneshot(empty_request("GET", "/api/v1/facilities/X/waiting?branch=B"))
        .await
        .expect("router responds");
    let body = read_json_body(response).await;
    assert_eq!(body[0]["name"], "Ben");
    assert_eq!(body.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn unknown_facility_is_not_found() {
    let (service, _) = build_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .oneshot(empty_request("GET", "/api/v1/facilities/Nowhere/waiting"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn remove_handler_returns_not_found_for_missing_people() {
    let (service, _) = seeded_service();

    let response = router::remove_handler::<crate::waitlist::MemoryStore>(
        State(Arc::new(service)),
        Path(("X".to_string(), "Dana".to_string())),
        Query(ScopeQuery::default()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn promote_route_moves_the_record() {
    let (service, _) = seeded_service();
    let service = Arc::new(service);
    let router = waitlist_router(service.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/facilities/X/promote",
            json!({ "name": "Ben", "source_branch": "A", "target_branch": "B" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["branch"], "B");
    assert_eq!(body["original_branch"], "B");
    assert_eq!(body["date_accepted"], "2024-07-01");

    assert!(service.list(FACILITY, "B").expect("waiting B").is_empty());
}

#[tokio::test]
async fn promote_route_rejects_see_all_target() {
    let (service, _) = seeded_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/facilities/X/promote",
            json!({ "name": "Ben", "target_branch": "see all" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn partial_move_maps_to_conflict() {
    let store = Arc::new(FailingDeleteStore::failing(
        crate::waitlist::ListKind::Accepted,
    ));
    let service = Arc::new(service_with(store));
    service.add(FACILITY, "A", avi()).expect("add avi");
    service
        .promote_to_accepted(FACILITY, "A", "A", "Avi")
        .expect("promote avi");
    let router = waitlist_router(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/facilities/X/demote",
            json!({ "name": "Avi", "target_branch": "B" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn backend_failures_map_to_bad_gateway() {
    let service = Arc::new(service_with(Arc::new(UnavailableStore)));
    let router = waitlist_router(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/facilities/X/waiting",
            json!({ "branch": "A", "record": { "name": "Avi" } }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn statistics_route_reports_totals() {
    let (service, _) = seeded_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .oneshot(empty_request(
            "GET",
            "/api/v1/facilities/X/statistics?branch=see%20all",
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["totals"]["count"], 2);
    assert_eq!(body["totals"]["complete"], 1);
    assert_eq!(body["totals"]["urgent"], 0);
}

#[tokio::test]
async fn edit_and_reconcile_routes_respond() {
    let (service, _) = seeded_service();
    let router = waitlist_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/api/v1/facilities/X/waiting/Avi?branch=A",
            json!({ "urgent": true }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["urgent"], true);

    let response = router
        .oneshot(empty_request("POST", "/api/v1/facilities/X/reconcile"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["duplicates"], json!([]));
}
