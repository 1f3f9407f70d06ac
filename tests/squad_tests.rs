mod common;

use axum::http::StatusCode;
use common::{TestApp, delete, get, json};
use serde_json::{Value, json};
use uuid::Uuid;

fn player_body(name: &str, age: u32, jersey: u32) -> Value {
    json!({
        "name": name,
        "position": "Defender",
        "age": age,
        "nationality": "Algeria",
        "jerseyNumber": jersey,
    })
}

async fn create_player(app: &TestApp, cookie: &str, name: &str, age: u32, jersey: u32) -> String {
    let (status, body) = app
        .send(json("POST", "/api/players", Some(cookie), player_body(name, age, jersey)))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_duplicate_jersey_is_rejected_and_original_kept() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let first = create_player(&app, &cookie, "Aissa Mandi", 32, 2).await;

    let (status, body) = app
        .send(json("POST", "/api/players", Some(&cookie), player_body("Someone Else", 19, 2)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Jersey number already taken");

    let (_, body) = app.send(get("/api/players", None)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["id"], first.as_str());
    assert_eq!(body["data"][0]["name"], "Aissa Mandi");

    // Moving another player onto a taken number fails the same way.
    let second = create_player(&app, &cookie, "Ramy Bensebaini", 29, 21).await;
    let (status, _) = app
        .send(json(
            "PUT",
            &format!("/api/players/{second}"),
            Some(&cookie),
            json!({ "jerseyNumber": 2 }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_player_required_fields() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let (status, body) = app
        .send(json("POST", "/api/players", Some(&cookie), json!({ "name": "Solo" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["position", "nationality", "age", "jerseyNumber"]);
}

#[tokio::test]
async fn test_players_filter_by_age() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    create_player(&app, &cookie, "Academy Kid", 15, 40).await;
    create_player(&app, &cookie, "First Teamer", 23, 5).await;
    create_player(&app, &cookie, "Just Sixteen", 16, 31).await;

    let (status, body) = app.send(get("/api/players?age[gte]=16", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["First Teamer", "Just Sixteen"]);

    let (_, body) = app
        .send(get("/api/players?select=name&sort=-age&limit=1", None))
        .await;
    assert_eq!(body["data"][0], json!({ "id": body["data"][0]["id"], "name": "First Teamer" }));
    assert_eq!(body["pagination"]["next"], json!({ "page": 2, "limit": 1 }));
}

#[tokio::test]
async fn test_squad_writes_require_a_session() {
    let app = TestApp::new();
    let (status, _) = app
        .send(json("POST", "/api/players", None, player_body("Anon", 20, 3)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(json("POST", "/api/teams", None, json!({ "name": "U21", "formation": "4-4-2" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_team_rejects_unknown_players() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let known = create_player(&app, &cookie, "Known Player", 24, 6).await;

    let (status, body) = app
        .send(json(
            "POST",
            "/api/teams",
            Some(&cookie),
            json!({ "name": "First XI", "formation": "4-3-3", "players": [known, Uuid::new_v4()] }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "One or more player IDs are invalid");

    let (_, body) = app.send(get("/api/teams", None)).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_team_reads_expand_players() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let keeper = create_player(&app, &cookie, "Keeper One", 28, 1).await;
    let striker = create_player(&app, &cookie, "Striker Nine", 26, 9).await;

    let (status, body) = app
        .send(json(
            "POST",
            "/api/teams",
            Some(&cookie),
            json!({ "name": "First XI", "formation": "4-3-3", "players": [striker, keeper] }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let team_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["players"][0]["name"], "Striker Nine");

    let (_, body) = app.send(get("/api/teams", None)).await;
    assert_eq!(body["data"][0]["players"][1]["jerseyNumber"], 1);

    // A deleted player drops out of the expansion.
    let (status, _) = app
        .send(delete(&format!("/api/players/{striker}"), Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.send(get(&format!("/api/teams/{team_id}"), None)).await;
    let players = body["data"]["players"].as_array().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0]["name"], "Keeper One");
}

#[tokio::test]
async fn test_team_update_without_players_keeps_roster() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let player = create_player(&app, &cookie, "Mid Field", 22, 8).await;
    let (_, body) = app
        .send(json(
            "POST",
            "/api/teams",
            Some(&cookie),
            json!({ "name": "Reserves", "formation": "4-4-2", "players": [player] }),
        ))
        .await;
    let uri = format!("/api/teams/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = app
        .send(json("PUT", &uri, Some(&cookie), json!({ "formation": "3-5-2" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["formation"], "3-5-2");
    assert_eq!(body["data"]["players"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tournaments_reference_teams() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let player = create_player(&app, &cookie, "Cup Player", 25, 10).await;
    let (_, body) = app
        .send(json(
            "POST",
            "/api/teams",
            Some(&cookie),
            json!({ "name": "Cup Squad", "formation": "4-2-3-1", "players": [player] }),
        ))
        .await;
    let team = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(json(
            "POST",
            "/api/tournaments",
            Some(&cookie),
            json!({
                "name": "Summer Cup",
                "startDate": "2026-07-01T00:00:00Z",
                "endDate": "2026-06-01T00:00:00Z",
                "location": "Algiers",
                "teams": [team],
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "endDate");

    let (status, body) = app
        .send(json(
            "POST",
            "/api/tournaments",
            Some(&cookie),
            json!({
                "name": "Summer Cup",
                "startDate": "2026-07-01T00:00:00Z",
                "endDate": "2026-07-10T00:00:00Z",
                "location": "Algiers",
                "teams": [Uuid::new_v4()],
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "One or more team IDs are invalid");

    let (status, body) = app
        .send(json(
            "POST",
            "/api/tournaments",
            Some(&cookie),
            json!({
                "name": "Summer Cup",
                "startDate": "2026-07-01T00:00:00Z",
                "endDate": "2026-07-10T00:00:00Z",
                "location": "Algiers",
                "teams": [team],
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "upcoming");
    assert_eq!(body["data"]["maxTeams"], 16);
    assert_eq!(body["data"]["teams"][0]["players"][0]["name"], "Cup Player");

    let (_, body) = app.send(get("/api/tournaments", None)).await;
    assert_eq!(body["data"][0]["teams"][0]["name"], "Cup Squad");
    assert_eq!(body["data"][0]["teams"][0]["players"][0]["jerseyNumber"], 10);
}

#[tokio::test]
async fn test_malformed_and_unknown_ids_are_not_found() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;

    let cases = [
        ("/api/players/nope".to_string(), "Player not found"),
        (format!("/api/players/{}", Uuid::new_v4()), "Player not found"),
        ("/api/teams/nope".to_string(), "Team not found"),
        ("/api/tournaments/nope".to_string(), "Tournament not found"),
    ];
    for (uri, message) in cases {
        let (status, body) = app.send(get(&uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["message"], message);
    }

    let (status, _) = app
        .send(delete(&format!("/api/teams/{}", Uuid::new_v4()), Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
