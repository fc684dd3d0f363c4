//! Runs the bundled pet-store catalogue against an in-process fake store

use axum::{
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apiverify_common::Configuration;
use apiverify_engine::{
    write_results, RunVerdict, Suite, SuiteReport, SuiteRunner, TracingObserver,
};

const STATUSES: [&str; 3] = ["available", "pending", "sold"];
const KNOWN_TAGS: [&str; 3] = ["tag1", "tag2", "tag3"];

#[derive(Default)]
struct StoreState {
    pets: BTreeMap<i64, Value>,
    orders: BTreeMap<i64, Value>,
    users: BTreeMap<String, Value>,
    /// Make order lookups answer 500
    fail_order_lookup: bool,
}

type Shared = Arc<Mutex<StoreState>>;

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn text_response(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

fn parse_object(body: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// `YYYY-MM-DDTHH:MM:SS` prefix check
fn valid_timestamp(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < 19 {
        return false;
    }
    bytes[..19].iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    })
}

async fn add_pet(State(state): State<Shared>, body: String) -> Response {
    let Some(pet) = parse_object(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid input");
    };
    let valid = pet.get("name").is_some_and(Value::is_string)
        && pet.get("photoUrls").is_some_and(Value::is_array);
    let Some(id) = pet.get("id").and_then(Value::as_i64).filter(|_| valid) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid input");
    };

    let mut state = state.lock();
    if state.pets.contains_key(&id) {
        return text_response(StatusCode::BAD_REQUEST, "Pet already exists");
    }
    let pet = Value::Object(pet);
    state.pets.insert(id, pet.clone());
    json_response(StatusCode::OK, pet)
}

async fn update_pet(State(state): State<Shared>, body: String) -> Response {
    let Some(update) = parse_object(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid ID supplied");
    };
    let Some(id) = update.get("id").and_then(Value::as_i64) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid ID supplied");
    };

    let mut state = state.lock();
    let Some(Value::Object(pet)) = state.pets.get_mut(&id) else {
        return text_response(StatusCode::NOT_FOUND, "Pet not found");
    };
    pet.extend(update);
    json_response(StatusCode::OK, Value::Object(pet.clone()))
}

async fn get_pet(State(state): State<Shared>, UrlPath(pet_id): UrlPath<String>) -> Response {
    let Ok(id) = pet_id.parse::<i64>() else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid ID supplied");
    };
    match state.lock().pets.get(&id) {
        Some(pet) => json_response(StatusCode::OK, pet.clone()),
        None => text_response(StatusCode::NOT_FOUND, "Pet not found"),
    }
}

async fn delete_pet(State(state): State<Shared>, UrlPath(pet_id): UrlPath<String>) -> Response {
    let Ok(id) = pet_id.parse::<i64>() else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid pet value");
    };
    match state.lock().pets.remove(&id) {
        Some(_) => text_response(StatusCode::OK, "Pet deleted"),
        None => text_response(StatusCode::NOT_FOUND, "Pet not found"),
    }
}

async fn find_by_status(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(status) = params.get("status").filter(|s| STATUSES.contains(&s.as_str())) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid status value");
    };
    let pets: Vec<Value> = state
        .lock()
        .pets
        .values()
        .filter(|pet| pet["status"] == status.as_str())
        .cloned()
        .collect();
    json_response(StatusCode::OK, Value::Array(pets))
}

async fn find_by_tags(
    State(state): State<Shared>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let tags: Vec<&str> = params
        .iter()
        .filter(|(name, _)| name == "tags")
        .map(|(_, value)| value.as_str())
        .collect();
    if tags.is_empty() || tags.iter().any(|tag| tag.is_empty()) {
        return text_response(StatusCode::BAD_REQUEST, "Invalid tag value");
    }

    let state = state.lock();
    let has_tag = |pet: &Value, tag: &str| {
        pet["tags"]
            .as_array()
            .is_some_and(|list| list.iter().any(|t| t["name"] == tag))
    };
    let known = tags.iter().any(|tag| {
        KNOWN_TAGS.contains(tag) || state.pets.values().any(|pet| has_tag(pet, tag))
    });
    if !known {
        return text_response(StatusCode::NOT_FOUND, "Tag not found");
    }

    let pets: Vec<Value> = state
        .pets
        .values()
        .filter(|pet| tags.iter().any(|tag| has_tag(pet, tag)))
        .cloned()
        .collect();
    json_response(StatusCode::OK, Value::Array(pets))
}

async fn inventory(State(state): State<Shared>) -> Response {
    let state = state.lock();
    let count = |status: &str| state.orders.values().filter(|o| o["status"] == status).count();
    json_response(
        StatusCode::OK,
        json!({"approved": count("approved"), "placed": count("placed"), "delivered": 50}),
    )
}

async fn place_order(State(state): State<Shared>, body: String) -> Response {
    let Some(order) = parse_object(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid Order");
    };
    let quantity_ok = order.get("quantity").and_then(Value::as_i64).is_some_and(|q| q > 0);
    let ship_date_ok = order
        .get("shipDate")
        .and_then(Value::as_str)
        .map_or(true, valid_timestamp);
    let Some(id) = order.get("id").and_then(Value::as_i64) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid Order");
    };
    if !quantity_ok || !ship_date_ok {
        return text_response(StatusCode::BAD_REQUEST, "Invalid Order");
    }

    let order = Value::Object(order);
    state.lock().orders.insert(id, order.clone());
    json_response(StatusCode::OK, order)
}

async fn get_order(State(state): State<Shared>, UrlPath(order_id): UrlPath<String>) -> Response {
    let state = state.lock();
    if state.fail_order_lookup {
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
    }
    let Ok(id) = order_id.parse::<i64>() else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid ID supplied");
    };
    match state.orders.get(&id) {
        Some(order) => json_response(StatusCode::OK, order.clone()),
        None => text_response(StatusCode::NOT_FOUND, "Order not found"),
    }
}

async fn delete_order(State(state): State<Shared>, UrlPath(order_id): UrlPath<String>) -> Response {
    let Ok(id) = order_id.parse::<i64>() else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid ID supplied");
    };
    match state.lock().orders.remove(&id) {
        Some(_) => text_response(StatusCode::OK, "Order deleted"),
        None => text_response(StatusCode::NOT_FOUND, "Order not found"),
    }
}

fn insert_user(state: &mut StoreState, user: &Value) -> bool {
    match user["username"].as_str() {
        Some(name) if !name.is_empty() => {
            state.users.insert(name.to_string(), user.clone());
            true
        }
        _ => false,
    }
}

async fn create_user(State(state): State<Shared>, body: String) -> Response {
    let Some(user) = parse_object(&body).map(Value::Object) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid input");
    };
    if !insert_user(&mut state.lock(), &user) {
        return text_response(StatusCode::BAD_REQUEST, "Invalid input");
    }
    json_response(StatusCode::OK, user)
}

async fn create_users_with_list(State(state): State<Shared>, body: String) -> Response {
    let Ok(Value::Array(users)) = serde_json::from_str::<Value>(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid input");
    };
    let mut state = state.lock();
    for user in &users {
        if !insert_user(&mut state, user) {
            return text_response(StatusCode::BAD_REQUEST, "Invalid input");
        }
    }
    json_response(StatusCode::OK, Value::Array(users))
}

async fn login(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("username") {
        Some(name) if !name.is_empty() => {
            text_response(StatusCode::OK, "logged in user session: 1234567890")
        }
        _ => text_response(StatusCode::BAD_REQUEST, "Invalid username/password supplied"),
    }
}

async fn logout() -> Response {
    text_response(StatusCode::OK, "User logged out")
}

async fn get_user(State(state): State<Shared>, UrlPath(username): UrlPath<String>) -> Response {
    match state.lock().users.get(&username) {
        Some(user) => json_response(StatusCode::OK, user.clone()),
        None => text_response(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn update_user(
    State(state): State<Shared>,
    UrlPath(username): UrlPath<String>,
    body: String,
) -> Response {
    let Some(update) = parse_object(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "Invalid input");
    };
    let mut state = state.lock();
    match state.users.get_mut(&username) {
        Some(user) => {
            *user = Value::Object(update);
            text_response(StatusCode::OK, "User updated")
        }
        None => text_response(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn delete_user(State(state): State<Shared>, UrlPath(username): UrlPath<String>) -> Response {
    match state.lock().users.remove(&username) {
        Some(_) => text_response(StatusCode::OK, "User deleted"),
        None => text_response(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn spawn_store(state: Shared) -> SocketAddr {
    let api = Router::new()
        .route("/pet", post(add_pet).put(update_pet))
        .route("/pet/findByStatus", get(find_by_status))
        .route("/pet/findByTags", get(find_by_tags))
        .route("/pet/:petId", get(get_pet).delete(delete_pet))
        .route("/store/inventory", get(inventory))
        .route("/store/order", post(place_order))
        .route("/store/order/:orderId", get(get_order).delete(delete_order))
        .route("/user", post(create_user))
        .route("/user/createWithList", post(create_users_with_list))
        .route("/user/login", get(login))
        .route("/user/logout", get(logout))
        .route("/user/:username", get(get_user).put(update_user).delete(delete_user))
        .with_state(state);
    let app = Router::new().nest("/api/v3", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn catalogue_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../suites/petstore")
}

fn runner_for(addr: SocketAddr) -> SuiteRunner<apiverify_engine::Executor> {
    let config = Configuration::builder(format!("http://{addr}/"))
        .base_path("/api/v3")
        .default_header("Content-Type", "application/json")
        .observer(Arc::new(TracingObserver))
        .build()
        .unwrap();
    SuiteRunner::from_config(Arc::new(config)).unwrap()
}

fn describe_failures(report: &SuiteReport) -> String {
    report
        .scenarios
        .iter()
        .filter_map(|s| s.failure_summary().map(|f| format!("{}: {}", s.name, f)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn branch_of<'a>(report: &'a SuiteReport, scenario: &str) -> Option<&'a str> {
    report
        .scenarios
        .iter()
        .find(|s| s.name == scenario)
        .and_then(|s| s.runs.first())
        .and_then(|run| run.branch.as_deref())
}

#[tokio::test]
async fn test_catalogue_passes_against_fake_store() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let addr = spawn_store(Shared::default()).await;
    let suites = Suite::load_all(&catalogue_dir()).unwrap();
    let names: Vec<_> = suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["pet", "store", "user"]);

    let reports = runner_for(addr).run_suites(&suites).await.unwrap();
    for report in &reports {
        assert!(
            report.success(),
            "suite {} failed:\n{}",
            report.name,
            describe_failures(report)
        );
    }

    let pet = &reports[0];
    assert_eq!(pet.total, 14);
    let sweep = pet.scenarios.iter().find(|s| s.name == "find-by-status").unwrap();
    let labels: Vec<_> = sweep.runs.iter().filter_map(|r| r.label.as_deref()).collect();
    assert_eq!(labels, STATUSES);

    let store = &reports[1];
    assert_eq!(branch_of(store, "find-order"), Some("200"));
    assert_eq!(branch_of(store, "find-deleted-order"), Some("404"));

    let user = &reports[2];
    assert_eq!(branch_of(user, "update-user"), Some("200"));
}

#[tokio::test]
async fn test_unhandled_order_status_fails_lookup() {
    let state = Shared::default();
    state.lock().fail_order_lookup = true;
    let addr = spawn_store(state).await;

    let suite = Suite::from_file(&catalogue_dir().join("store.yaml")).unwrap();
    let report = runner_for(addr).run_suite(&suite).await.unwrap();

    assert_eq!(report.failed, 2);
    let lookup = report.scenarios.iter().find(|s| s.name == "find-order").unwrap();
    assert!(matches!(
        lookup.runs[0].verdict,
        RunVerdict::UnhandledStatus { status_code: 500, .. }
    ));
    assert!(report
        .scenarios
        .iter()
        .filter(|s| s.name != "find-order" && s.name != "find-deleted-order")
        .all(|s| s.passed()));
}

#[tokio::test]
async fn test_selected_scenarios_and_results_file() {
    let addr = spawn_store(Shared::default()).await;
    let suites = Suite::load_all(&catalogue_dir()).unwrap();
    let smoke: Vec<Suite> = suites
        .iter()
        .map(|suite| suite.select(Some("smoke"), None))
        .filter(|suite| !suite.scenarios.is_empty())
        .collect();

    let reports = runner_for(addr).run_suites(&smoke).await.unwrap();
    let totals: Vec<_> = reports.iter().map(|r| (r.name.as_str(), r.total, r.passed)).collect();
    assert_eq!(totals, vec![("pet", 2, 2), ("store", 1, 1), ("user", 1, 1)]);

    let dir = tempfile::tempdir().unwrap();
    let path = write_results(dir.path(), &reports).unwrap();
    let written: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written[0]["scenarios"][0]["name"], "add-pet");
    assert_eq!(written[0]["scenarios"][0]["runs"][0]["verdict"], "verified");
    assert_eq!(written[0]["scenarios"][0]["runs"][0]["status_code"], 200);
}
