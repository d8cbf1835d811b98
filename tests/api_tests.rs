use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use roam_api::api::{create_router, AppState};
use roam_api::config::EngineConfig;

fn create_test_server() -> TestServer {
    let state = AppState::in_memory(EngineConfig::default()).unwrap();
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

async fn create_user(server: &TestServer, body: Value) -> Value {
    let response = server.post("/api/v1/users").json(&body).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}

async fn create_item(server: &TestServer, body: Value) -> Value {
    let response = server.post("/api/v1/items").json(&body).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}

fn place(name: &str, category: &str, lat: f64, lon: f64, popularity: f64) -> Value {
    json!({
        "name": name,
        "kind": "place",
        "category": category,
        "location": { "lat": lat, "lon": lon },
        "popularity": popularity
    })
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_and_get_user() {
    let server = create_test_server();

    let created = create_user(
        &server,
        json!({
            "name": "Ana",
            "preferred_categories": ["museum", "park"],
            "home": { "lat": -12.0464, "lon": -77.0428 }
        }),
    )
    .await;
    assert_eq!(created["name"], "Ana");

    let response = server
        .get(&format!("/api/v1/users/{}", created["id"].as_str().unwrap()))
        .await;
    response.assert_status_ok();
    let fetched: Value = response.json();
    assert_eq!(fetched["preferred_categories"][0], "museum");
}

#[tokio::test]
async fn test_unknown_user_is_404() {
    let server = create_test_server();
    let response = server.get(&format!("/api/v1/users/{}", Uuid::new_v4())).await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_create_and_get_item() {
    let server = create_test_server();

    let created = create_item(&server, place("MALI", "museum", -12.0598, -77.0378, 8.0)).await;
    assert_eq!(created["category"], "museum");

    let response = server
        .get(&format!("/api/v1/items/{}", created["id"].as_str().unwrap()))
        .await;
    response.assert_status_ok();
    let fetched: Value = response.json();
    assert_eq!(fetched["name"], "MALI");
}

#[tokio::test]
async fn test_item_with_bad_coordinates_is_rejected() {
    let server = create_test_server();
    let response = server
        .post("/api/v1/items")
        .json(&place("nowhere", "museum", 123.0, 0.0, 1.0))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_event_window_must_be_ordered() {
    let server = create_test_server();
    let response = server
        .post("/api/v1/items")
        .json(&json!({
            "name": "Jazz night",
            "kind": "event",
            "category": "music",
            "location": { "lat": -12.05, "lon": -77.04 },
            "starts_at": "2026-09-02T20:00:00Z",
            "ends_at": "2026-09-01T23:00:00Z"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_for_seeded_user() {
    let server = create_test_server();

    let user = create_user(
        &server,
        json!({
            "name": "Ana",
            "preferred_categories": ["museum"],
            "home": { "lat": -12.0464, "lon": -77.0428 }
        }),
    )
    .await;

    create_item(&server, place("MALI", "museum", -12.0598, -77.0378, 8.0)).await;
    create_item(&server, place("Parque Kennedy", "park", -12.1211, -77.0297, 6.0)).await;
    create_item(&server, place("Larco", "museum", -12.0718, -77.0705, 9.0)).await;

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);

    // Preference match puts both museums ahead of the park
    assert_eq!(items[0]["category"], "museum");
    assert_eq!(items[1]["category"], "museum");
    let scores: Vec<f64> = items.iter().map(|i| i["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(items[0]["components"]["content"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_category_filter_narrows_results() {
    let server = create_test_server();

    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;
    create_item(&server, place("MALI", "museum", -12.0598, -77.0378, 8.0)).await;
    create_item(&server, place("Parque Kennedy", "park", -12.1211, -77.0297, 6.0)).await;

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .add_query_param("category", "park")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["category"], "park");
}

#[tokio::test]
async fn test_missing_location_yields_empty_with_reason() {
    let server = create_test_server();

    let user = create_user(&server, json!({ "name": "Drifter" })).await;
    create_item(&server, place("MALI", "museum", -12.0598, -77.0378, 8.0)).await;

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["kind"], "missing_location");
    assert!(body["reason"].as_str().unwrap().contains("no location"));
}

#[tokio::test]
async fn test_empty_catalog_yields_empty_with_reason() {
    let server = create_test_server();

    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["kind"], "empty_candidate_set");
}

#[tokio::test]
async fn test_recommendations_for_unknown_user_404() {
    let server = create_test_server();
    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", Uuid::new_v4().to_string())
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_page_size_out_of_bounds_is_400() {
    let server = create_test_server();
    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .add_query_param("page_size", "0")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["kind"], "invalid_page_size");
}

#[tokio::test]
async fn test_lat_without_lon_is_400() {
    let server = create_test_server();
    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .add_query_param("lat", "-12.0")
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_record_interaction_and_exclusion() {
    let server = create_test_server();

    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;
    let visited = create_item(&server, place("MALI", "museum", -12.0598, -77.0378, 8.0)).await;
    create_item(&server, place("Larco", "museum", -12.0718, -77.0705, 9.0)).await;

    let response = server
        .post("/api/v1/interactions")
        .json(&json!({
            "user_id": user["id"],
            "item_id": visited["id"],
            "kind": "visit"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_ne!(items[0]["item_id"], visited["id"]);
}

#[tokio::test]
async fn test_rate_interaction_requires_rating() {
    let server = create_test_server();

    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;
    let item = create_item(&server, place("MALI", "museum", -12.0598, -77.0378, 8.0)).await;

    let response = server
        .post("/api/v1/interactions")
        .json(&json!({
            "user_id": user["id"],
            "item_id": item["id"],
            "kind": "rate"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/interactions")
        .json(&json!({
            "user_id": user["id"],
            "item_id": item["id"],
            "kind": "rate",
            "rating": 4
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn test_interaction_with_unknown_item_is_404() {
    let server = create_test_server();
    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;

    let response = server
        .post("/api/v1/interactions")
        .json(&json!({
            "user_id": user["id"],
            "item_id": Uuid::new_v4(),
            "kind": "like"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pagination_across_pages() {
    let server = create_test_server();

    let user = create_user(
        &server,
        json!({ "name": "Ana", "home": { "lat": -12.0464, "lon": -77.0428 } }),
    )
    .await;
    for i in 0..7 {
        create_item(
            &server,
            place(
                &format!("spot {}", i),
                if i % 2 == 0 { "museum" } else { "park" },
                -12.05 - 0.001 * i as f64,
                -77.04,
                i as f64,
            ),
        )
        .await;
    }

    let page1 = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .add_query_param("page", "1")
        .add_query_param("page_size", "5")
        .await;
    page1.assert_status_ok();
    let body1: Value = page1.json();
    assert_eq!(body1["items"].as_array().unwrap().len(), 5);
    assert_eq!(body1["total"], 7);

    let page2 = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", user["id"].as_str().unwrap())
        .add_query_param("page", "2")
        .add_query_param("page_size", "5")
        .await;
    page2.assert_status_ok();
    let body2: Value = page2.json();
    assert_eq!(body2["items"].as_array().unwrap().len(), 2);

    // No item appears on both pages
    let ids1: Vec<&str> = body1["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["item_id"].as_str().unwrap())
        .collect();
    for item in body2["items"].as_array().unwrap() {
        assert!(!ids1.contains(&item["item_id"].as_str().unwrap()));
    }
}
