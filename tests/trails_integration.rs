//! Integration tests for progress gating and category ordering
//!
//! These tests run the service layer against an on-disk database in a
//! temporary directory, and drive the HTTP server over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use learning_trails::services::category_service::{CreateCategoryInput, ReorderInput};
use learning_trails::services::challenge_service::{
    AlternativeInput, CreateChallengeInput, CreateQuestionInput, QuestionResponse, RespondInput,
};
use learning_trails::services::module_service::CreateModuleInput;
use learning_trails::services::trail_service::CreateTrailInput;
use learning_trails::services::user_service::RegisterUserInput;
use learning_trails::{CategoryOrder, Config, HttpServer, LearningDb, Services, TrailError};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Helper to create services over a database in a temporary directory
fn create_services(dir: &TempDir) -> Services {
    let db = Arc::new(LearningDb::open(dir.path()).unwrap());
    let config = Config {
        storage_dir: dir.path().to_path_buf(),
        admin_emails: vec!["admin@example.com".into()],
        ..Config::default()
    };
    Services::new(db, &config)
}

struct Frontend {
    trail_id: String,
    internet: String,
    html: String,
    css: String,
    challenge_id: String,
    question: learning_trails::db::QuestionRow,
    internet_modules: Vec<String>,
}

/// Trail "Frontend": Internet (no challenge), HTML (challenge C1), CSS (no challenge)
fn seed_frontend(services: &Services) -> Frontend {
    let trail = services.trails.create(CreateTrailInput { name: "Frontend".into() }).unwrap();

    let category = |name: &str| {
        services
            .categories
            .create(CreateCategoryInput { name: name.into(), trail_id: trail.id.clone() })
            .unwrap()
            .id
    };
    let internet = category("Internet");
    let html = category("HTML");
    let css = category("CSS");

    let module = |category_id: &str, title: &str| {
        services
            .modules
            .create(CreateModuleInput {
                title: title.into(),
                description: format!("{} basics", title),
                category_id: category_id.into(),
            })
            .unwrap()
            .id
    };
    let internet_modules = vec![module(&internet, "How the web works"), module(&internet, "DNS")];
    let tags = module(&html, "Tags");
    module(&css, "Selectors");

    let challenge_id = services
        .challenges
        .create(CreateChallengeInput { category_id: html.clone() })
        .unwrap()
        .id;
    let question = services
        .challenges
        .create_question(CreateQuestionInput {
            question: "Which tag creates a link?".into(),
            challenge_id: challenge_id.clone(),
            content_module_id: Some(tags),
            alternatives: vec![
                AlternativeInput { text: "<a>".into(), is_correct: true },
                AlternativeInput { text: "<p>".into(), is_correct: false },
            ],
        })
        .unwrap();

    Frontend {
        trail_id: trail.id,
        internet,
        html,
        css,
        challenge_id,
        question,
        internet_modules,
    }
}

fn register(services: &Services, email: &str) -> String {
    services
        .users
        .register(RegisterUserInput {
            full_name: "Test Learner".into(),
            email: email.into(),
            birth_date: "2000-01-01".into(),
        })
        .unwrap()
        .id
}

fn blocked(services: &Services, trail_id: &str, user_id: &str) -> Vec<bool> {
    services
        .trails
        .progress(trail_id, user_id)
        .unwrap()
        .trail
        .categories
        .iter()
        .map(|c| c.blocked)
        .collect()
}

fn answer(question: &learning_trails::db::QuestionRow, correct: bool) -> QuestionResponse {
    let alternative = question.alternatives.iter().find(|a| a.is_correct == correct).unwrap();
    QuestionResponse {
        id: question.id.clone(),
        response: alternative.id.clone(),
    }
}

#[test]
fn test_progress_gating_follows_challenge_completion() {
    let temp = TempDir::new().unwrap();
    let services = create_services(&temp);
    let frontend = seed_frontend(&services);
    let user = register(&services, "learner@example.com");

    for module_id in &frontend.internet_modules {
        services.modules.set_completion(module_id, &user, true).unwrap();
    }

    let progress = services.trails.progress(&frontend.trail_id, &user).unwrap();
    let categories = &progress.trail.categories;
    assert_eq!(categories[0].id, frontend.internet);
    assert!(categories[0].modules.iter().all(|m| m.completed));
    assert_eq!(categories[1].id, frontend.html);
    assert!(!categories[1].challenge.as_ref().unwrap().completed);
    assert_eq!(categories[2].id, frontend.css);
    assert_eq!(blocked(&services, &frontend.trail_id, &user), vec![false, false, true]);

    // A failed attempt suggests the linked module and changes nothing
    let failed = services
        .challenges
        .respond(&frontend.challenge_id, &user, RespondInput { responses: vec![answer(&frontend.question, false)] })
        .unwrap();
    assert!(!failed.success);
    assert_eq!(failed.study_suggestions.unwrap()[0].title, "Tags");
    assert_eq!(blocked(&services, &frontend.trail_id, &user), vec![false, false, true]);

    let passed = services
        .challenges
        .respond(&frontend.challenge_id, &user, RespondInput { responses: vec![answer(&frontend.question, true)] })
        .unwrap();
    assert!(passed.success);
    assert_eq!(passed.percentage, 100.0);
    assert_eq!(blocked(&services, &frontend.trail_id, &user), vec![false, false, false]);
}

#[test]
fn test_progress_of_unknown_trail() {
    let temp = TempDir::new().unwrap();
    let services = create_services(&temp);
    let user = register(&services, "learner@example.com");

    let err = services.trails.progress("missing", &user).unwrap_err();
    assert!(matches!(err, TrailError::NotFound(_)));
}

#[test]
fn test_reorder_round_trip_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let trail_id;
    let expected;
    {
        let services = create_services(&temp);
        let frontend = seed_frontend(&services);
        trail_id = frontend.trail_id.clone();
        expected = vec![frontend.css.clone(), frontend.internet.clone(), frontend.html.clone()];

        services
            .categories
            .reorder(ReorderInput {
                trail_id: trail_id.clone(),
                categories: vec![
                    CategoryOrder::new(frontend.html, 3),
                    CategoryOrder::new(frontend.css, 1),
                    CategoryOrder::new(frontend.internet, 2),
                ],
            })
            .unwrap();
    }

    let services = create_services(&temp);
    let categories = services.categories.list(Some(&trail_id)).unwrap();
    let ids: Vec<String> = categories.iter().map(|d| d.category.id.clone()).collect();
    let orders: Vec<i64> = categories.iter().map(|d| d.category.order_index).collect();
    assert_eq!(ids, expected);
    assert_eq!(orders, vec![1, 2, 3]);
}

#[test]
fn test_rejected_reorders_write_nothing() {
    let temp = TempDir::new().unwrap();
    let services = create_services(&temp);
    let frontend = seed_frontend(&services);
    let other = services.trails.create(CreateTrailInput { name: "Backend".into() }).unwrap();
    let stray = services
        .categories
        .create(CreateCategoryInput { name: "Databases".into(), trail_id: other.id.clone() })
        .unwrap();

    let snapshot = |services: &Services| -> Vec<(String, i64)> {
        services
            .categories
            .list(Some(&frontend.trail_id))
            .unwrap()
            .into_iter()
            .map(|d| (d.category.id, d.category.order_index))
            .collect()
    };
    let before = snapshot(&services);

    // Three categories, two items
    let err = services
        .categories
        .reorder(ReorderInput {
            trail_id: frontend.trail_id.clone(),
            categories: vec![CategoryOrder::new(frontend.css.clone(), 1), CategoryOrder::new(frontend.html.clone(), 2)],
        })
        .unwrap_err();
    assert!(matches!(err, TrailError::InvalidInput(_)));
    assert_eq!(snapshot(&services), before);

    // A category of another trail
    let err = services
        .categories
        .reorder(ReorderInput {
            trail_id: frontend.trail_id.clone(),
            categories: vec![
                CategoryOrder::new(frontend.css.clone(), 1),
                CategoryOrder::new(frontend.html.clone(), 2),
                CategoryOrder::new(stray.id.clone(), 3),
            ],
        })
        .unwrap_err();
    assert!(matches!(err, TrailError::InvalidInput(_)));
    assert_eq!(snapshot(&services), before);

    // Unknown category id
    let err = services
        .categories
        .reorder(ReorderInput {
            trail_id: frontend.trail_id.clone(),
            categories: vec![
                CategoryOrder::new(frontend.css.clone(), 1),
                CategoryOrder::new(frontend.html.clone(), 2),
                CategoryOrder::new("ghost", 3),
            ],
        })
        .unwrap_err();
    assert!(matches!(err, TrailError::NotFound(_)));
    assert_eq!(snapshot(&services), before);
}

#[test]
fn test_deleting_category_renumbers_and_cascades() {
    let temp = TempDir::new().unwrap();
    let services = create_services(&temp);
    let frontend = seed_frontend(&services);

    services.categories.delete(&frontend.html).unwrap();

    let remaining: Vec<(String, i64)> = services
        .categories
        .list(Some(&frontend.trail_id))
        .unwrap()
        .into_iter()
        .map(|d| (d.category.id, d.category.order_index))
        .collect();
    assert_eq!(remaining, vec![(frontend.internet, 1), (frontend.css, 2)]);

    assert!(matches!(
        services.challenges.get(&frontend.challenge_id),
        Err(TrailError::NotFound(_))
    ));

    // With the gating challenge gone nothing is blocked
    let user = register(&services, "learner@example.com");
    assert_eq!(blocked(&services, &frontend.trail_id, &user), vec![false, false]);
}

// ============================================================================
// HTTP
// ============================================================================

/// Start the server on a free local port
async fn start_server(services: Services) -> SocketAddr {
    let addr = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    };
    let server = Arc::new(HttpServer::new(Arc::new(services), addr));
    tokio::spawn(server.run());

    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    addr
}

/// Send one request and return (status, body)
async fn request(addr: SocketAddr, method: &str, path: &str, user: Option<&str>, body: Option<&str>) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = body.unwrap_or("");
    let mut raw = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n",
        method,
        path,
        body.len()
    );
    if let Some(user) = user {
        raw.push_str(&format!("X-User-Id: {}\r\n", user));
    }
    raw.push_str("\r\n");
    raw.push_str(body);

    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    let body = response.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
    (status, body)
}

#[tokio::test]
async fn test_http_progress_and_reorder() {
    let temp = TempDir::new().unwrap();
    let services = create_services(&temp);
    let frontend = seed_frontend(&services);
    let admin = register(&services, "admin@example.com");
    let learner = register(&services, "learner@example.com");
    let addr = start_server(services).await;

    let (status, body) = request(addr, "GET", "/health", None, None).await;
    assert_eq!(status, 200);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["categories"], 3);

    let progress_path = format!("/trails/{}/progress", frontend.trail_id);
    let (status, _) = request(addr, "GET", &progress_path, None, None).await;
    assert_eq!(status, 401);

    let (status, body) = request(addr, "GET", &progress_path, Some(&learner), None).await;
    assert_eq!(status, 200);
    let progress: serde_json::Value = serde_json::from_str(&body).unwrap();
    let categories = progress["trail"]["categories"].as_array().unwrap();
    assert_eq!(categories[0]["order"], 1);
    assert!(categories[0]["challenge"].is_null());
    assert_eq!(categories[1]["challenge"]["completed"], false);
    assert_eq!(categories[2]["blocked"], true);

    let reorder = serde_json::json!({
        "trailId": frontend.trail_id,
        "categories": [
            { "id": frontend.css, "order": 1 },
            { "id": frontend.internet, "order": 2 },
            { "id": frontend.html, "order": 3 },
        ],
    })
    .to_string();

    let (status, _) = request(addr, "POST", "/categories/reorder", Some(&learner), Some(&reorder)).await;
    assert_eq!(status, 403);

    let (status, body) = request(addr, "POST", "/categories/reorder", Some(&admin), Some(&reorder)).await;
    assert_eq!(status, 200);
    let updated: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(updated[0]["id"], frontend.css.as_str());
    assert_eq!(updated[0]["order"], 1);

    let short = serde_json::json!({
        "trailId": frontend.trail_id,
        "categories": [{ "id": frontend.css, "order": 1 }],
    })
    .to_string();
    let (status, _) = request(addr, "POST", "/categories/reorder", Some(&admin), Some(&short)).await;
    assert_eq!(status, 400);

    let (status, _) = request(addr, "POST", "/categories/reorder", Some(&admin), Some("{not json")).await;
    assert_eq!(status, 400);
}
