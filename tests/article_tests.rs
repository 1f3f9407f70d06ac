mod common;

use axum::http::StatusCode;
use common::{PausingStore, TestApp, delete, get, image_upload, json};
use fennec_backend::{
    mail::MockMailer,
    models::{Article, DEFAULT_ARTICLE_IMAGE, Role},
    repository::{Collection, Repository},
    storage::MockStorageService,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

fn article_body(title: &str) -> Value {
    json!({
        "title": title,
        "category": "Team News",
        "content": "The club has completed the signing of a new striker.",
    })
}

async fn create(app: &TestApp, cookie: &str, body: Value) -> Value {
    let (status, body) = app
        .send(json("POST", "/api/articles", Some(cookie), body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn test_create_article_derives_slug_and_defaults() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;

    let article = create(&app, &cookie, article_body("Team Signs New Forward")).await;

    assert_eq!(article["slug"], "team-signs-new-forward");
    assert_eq!(article["author"], "editor");
    assert_eq!(article["status"], "draft");
    assert_eq!(article["featured"], false);
    assert_eq!(article["featuredImage"], DEFAULT_ARTICLE_IMAGE);
    assert_eq!(article["views"], 0);
}

#[tokio::test]
async fn test_create_article_requires_session_and_fields() {
    let app = TestApp::new();
    let (status, _) = app
        .send(json("POST", "/api/articles", None, article_body("Anything")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, cookie) = app.editor().await;
    let (status, body) = app
        .send(json("POST", "/api/articles", Some(&cookie), json!({ "title": "Only a title" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["content", "category"]);
}

#[tokio::test]
async fn test_duplicate_title_is_rejected() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    create(&app, &cookie, article_body("Derby Day")).await;

    let (status, body) = app
        .send(json("POST", "/api/articles", Some(&cookie), article_body("derby   day")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "An entry with the same title already exists");
}

#[tokio::test]
async fn test_slug_follows_title_changes_only() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let article = create(&app, &cookie, article_body("Team Signs New Forward")).await;
    let uri = format!("/api/articles/{}", article["id"].as_str().unwrap());

    let (status, body) = app
        .send(json("PUT", &uri, Some(&cookie), json!({ "content": "Updated story text." })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "team-signs-new-forward");

    let (_, body) = app
        .send(json("PUT", &uri, Some(&cookie), json!({ "title": "Forward Signs Contract" })))
        .await;
    assert_eq!(body["data"]["slug"], "forward-signs-contract");

    let (status, _) = app
        .send(get("/api/articles/slug/forward-signs-contract", None))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_only_author_or_admin_may_edit() {
    let app = TestApp::new();
    let (_, author_cookie) = app.editor().await;
    let rival = app.seed_user("rival", Role::Editor).await;
    let rival_cookie = app.session_for(&rival).await;
    let (_, admin_cookie) = app.admin().await;

    let article = create(&app, &author_cookie, article_body("Training Report")).await;
    let uri = format!("/api/articles/{}", article["id"].as_str().unwrap());

    let (status, body) = app
        .send(json("PUT", &uri, Some(&rival_cookie), json!({ "featured": true })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "User rival is not authorized to update this article");

    let (status, _) = app.send(delete(&uri, Some(&rival_cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(json("PUT", &uri, Some(&admin_cookie), json!({ "status": "published" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "published");
}

#[tokio::test]
async fn test_reads_count_views() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let article = create(&app, &cookie, article_body("Cup Preview")).await;
    let uri = format!("/api/articles/{}", article["id"].as_str().unwrap());

    app.send(get(&uri, None)).await;
    let (status, body) = app.send(get(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["views"], 2);
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_not_found() {
    let app = TestApp::new();
    for uri in [
        format!("/api/articles/{}", Uuid::new_v4()),
        "/api/articles/not-a-uuid".to_string(),
    ] {
        let (status, body) = app.send(get(&uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Article not found");
    }
}

#[tokio::test]
async fn test_public_collections_only_show_published() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let mut published = article_body("Published Story");
    published["status"] = json!("published");
    published["featured"] = json!(true);
    create(&app, &cookie, published).await;
    create(&app, &cookie, article_body("Draft Story")).await;

    let (_, body) = app.send(get("/api/articles/featured", None)).await;
    assert_eq!(body["count"], 1);

    let (_, body) = app.send(get("/api/articles/category/Team%20News", None)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["title"], "Published Story");

    let (_, body) = app.send(get("/api/articles/search?query=STORY", None)).await;
    assert_eq!(body["count"], 1);

    let (status, body) = app.send(get("/api/articles/search", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a search query");

    // The general list uses the query grammar and sees every status.
    let (_, body) = app.send(get("/api/articles?status=draft", None)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["pagination"], json!({}));
}

#[tokio::test]
async fn test_invalid_list_query_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.send(get("/api/articles?salary[gt]=1", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_delete_with_default_image_leaves_storage_alone() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let article = create(&app, &cookie, article_body("Short Lived")).await;
    let uri = format!("/api/articles/{}", article["id"].as_str().unwrap());

    let (status, body) = app.send(delete(&uri, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Article deleted successfully");
    assert!(app.storage.deleted_keys().is_empty());

    let (status, _) = app.send(get(&uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_succeeds_when_image_removal_fails() {
    let app = TestApp::with_mocks(MockStorageService::new_failing(), MockMailer::new());
    let (_, cookie) = app.editor().await;
    let created = create(&app, &cookie, article_body("With Picture")).await;
    let id = Uuid::parse_str(created["id"].as_str().unwrap()).unwrap();

    let mut article = app.repo().get::<Article>(id).await.unwrap().unwrap();
    article.featured_image = "custom.jpg".to_string();
    app.repo().save(&article).await.unwrap();

    let (status, _) = app
        .send(delete(&format!("/api/articles/{id}"), Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.storage.deleted_keys(), vec!["articles/custom.jpg".to_string()]);
    assert!(app.repo().get::<Article>(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_image_upload_stores_and_records_file() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let created = create(&app, &cookie, article_body("Kit Launch")).await;
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/api/articles/{id}/image");

    let (status, body) = app
        .send(image_upload(&uri, &cookie, "Launch.PNG", "image/png", b"\x89PNG"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let expected = format!("article_{id}.png");
    assert_eq!(body["data"], expected.as_str());
    assert_eq!(app.storage.stored_keys(), vec![format!("articles/{expected}")]);

    let (_, body) = app.send(get(&format!("/api/articles/{id}"), None)).await;
    assert_eq!(body["data"]["featuredImage"], expected.as_str());
}

#[tokio::test]
async fn test_image_upload_rejects_non_images() {
    let app = TestApp::new();
    let (_, cookie) = app.editor().await;
    let created = create(&app, &cookie, article_body("Notes")).await;
    let uri = format!("/api/articles/{}/image", created["id"].as_str().unwrap());

    let (status, body) = app
        .send(image_upload(&uri, &cookie, "notes.txt", "text/plain", b"hello"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please upload an image file");
    assert!(app.storage.stored_keys().is_empty());
}

// --- Concurrent reads and writes ---

#[tokio::test]
async fn test_view_count_keeps_edit_made_during_read() {
    let store = Arc::new(PausingStore::new(Collection::Articles));
    let app = TestApp::with_repo(Repository::new(store.clone()));
    let (_, cookie) = app.editor().await;
    let id = create(&app, &cookie, article_body("Old Title")).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/articles/{id}");

    store.arm();
    let router = app.router();
    let read_uri = uri.clone();
    let reader = tokio::spawn(async move {
        router.oneshot(get(&read_uri, None)).await.unwrap().status()
    });
    store.paused.notified().await;

    let (status, _) = app
        .send(json("PUT", &uri, Some(&cookie), json!({ "title": "New Title" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    store.release.notify_one();
    assert_eq!(reader.await.unwrap(), StatusCode::OK);

    let stored = app
        .repo()
        .get::<Article>(Uuid::parse_str(&id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "New Title");
    assert_eq!(stored.slug, "new-title");
    assert_eq!(stored.views, 1);
}

#[tokio::test]
async fn test_image_upload_for_article_deleted_meanwhile_is_404() {
    let store = Arc::new(PausingStore::new(Collection::Articles));
    let app = TestApp::with_repo(Repository::new(store.clone()));
    let (_, cookie) = app.editor().await;
    let id = create(&app, &cookie, article_body("Short Lived")).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    store.arm();
    let router = app.router();
    let upload = image_upload(
        &format!("/api/articles/{id}/image"),
        &cookie,
        "photo.png",
        "image/png",
        b"\x89PNG",
    );
    let uploader = tokio::spawn(async move { router.oneshot(upload).await.unwrap().status() });
    store.paused.notified().await;

    let (status, _) = app
        .send(delete(&format!("/api/articles/{id}"), Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);

    store.release.notify_one();
    assert_eq!(uploader.await.unwrap(), StatusCode::NOT_FOUND);

    // The file written for the vanished article is removed again.
    let key = format!("articles/article_{id}.png");
    assert_eq!(app.storage.stored_keys(), vec![key.clone()]);
    assert_eq!(app.storage.deleted_keys(), vec![key]);
}
