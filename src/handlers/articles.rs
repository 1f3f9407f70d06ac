use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::Value;

use super::{
    ApiJson, ApiQuery, Envelope, LimitParams, QueryPairs, SearchParams, parse_id,
    uploads::{discard_asset, read_image},
};
use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        ARTICLE_LIST, Article, ArticleStatus, CreateArticleRequest, UpdateArticleRequest, User,
    },
    query::Filter,
    repository::Collection,
};

const NOT_FOUND: &str = "Article not found";
const FEATURED_LIMIT: u64 = 3;

/// Only the author or an admin may change an article.
fn ensure_can_edit(user: &User, article: &Article, action: &str) -> Result<(), AppError> {
    if user.is_admin() || article.author == user.username {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "User {} is not authorized to {action} this article",
            user.username
        )))
    }
}

fn image_key(file_name: &str) -> String {
    format!("articles/{file_name}")
}

fn published() -> Filter {
    Filter::new().eq("status", ArticleStatus::Published.as_str())
}

async fn load(state: &AppState, raw_id: &str) -> Result<Article, AppError> {
    let id = parse_id(raw_id, NOT_FOUND)?;
    state
        .repo
        .get::<Article>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// Bumps `views` in place, leaving every other field as currently stored.
async fn count_view(state: &AppState, article: Article) -> Result<Article, AppError> {
    state
        .repo
        .increment::<Article>(article.id, "views", 1)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// get_articles
///
/// [Public Route] Lists articles through the shared query grammar
/// (`field[op]=value`, `sort`, `select`, `page`, `limit`). Newest first by default.
#[utoipa::path(
    get,
    path = "/api/articles",
    responses(
        (status = 200, description = "Page of articles", body = [Article]),
        (status = 400, description = "Malformed query")
    )
)]
pub async fn get_articles(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = ARTICLE_LIST.translate(&pairs)?;
    let page = state.repo.list(Collection::Articles, &query).await?;
    Ok(Envelope::page(page.data, query.pagination(page.total)))
}

/// get_featured_articles
///
/// [Public Route] Published articles flagged as featured, newest first.
#[utoipa::path(
    get,
    path = "/api/articles/featured",
    params(LimitParams),
    responses((status = 200, description = "Featured articles", body = [Article]))
)]
pub async fn get_featured_articles(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Result<Json<Envelope<Vec<Article>>>, AppError> {
    let filter = published().eq("featured", true);
    let sort = ARTICLE_LIST.sort_keys(ARTICLE_LIST.default_sort)?;
    let articles = state
        .repo
        .find::<Article>(&filter, &sort, Some(params.or(FEATURED_LIMIT)))
        .await?;
    Ok(Envelope::items(articles))
}

/// get_articles_by_category
///
/// [Public Route] Published articles of one category, newest first.
#[utoipa::path(
    get,
    path = "/api/articles/category/{category}",
    params(("category" = String, Path, description = "Category name, e.g. `Team News`")),
    responses((status = 200, description = "Articles in the category", body = [Article]))
)]
pub async fn get_articles_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Envelope<Vec<Article>>>, AppError> {
    let filter = published().eq("category", category);
    let sort = ARTICLE_LIST.sort_keys(ARTICLE_LIST.default_sort)?;
    let articles = state.repo.find::<Article>(&filter, &sort, None).await?;
    Ok(Envelope::items(articles))
}

/// search_articles
///
/// [Public Route] Case-insensitive search over title and content of
/// published articles.
#[utoipa::path(
    get,
    path = "/api/articles/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching articles", body = [Article]),
        (status = 400, description = "Missing query")
    )
)]
pub async fn search_articles(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<Envelope<Vec<Article>>>, AppError> {
    let needle = params.required()?;
    let filter = published().any_contains(&["title", "content"], &needle);
    let sort = ARTICLE_LIST.sort_keys(ARTICLE_LIST.default_sort)?;
    let articles = state.repo.find::<Article>(&filter, &sort, None).await?;
    Ok(Envelope::items(articles))
}

/// get_article
///
/// [Public Route] One article by id. Each read counts as a view.
#[utoipa::path(
    get,
    path = "/api/articles/{id}",
    params(("id" = String, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article", body = Article),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Article>>, AppError> {
    let article = load(&state, &id).await?;
    Ok(Envelope::data(count_view(&state, article).await?))
}

/// get_article_by_slug
///
/// [Public Route] One article by slug. Counts as a view.
#[utoipa::path(
    get,
    path = "/api/articles/slug/{slug}",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Article", body = Article),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_article_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Envelope<Article>>, AppError> {
    let article = state
        .repo
        .find_one::<Article>(&Filter::new().eq("slug", slug))
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    Ok(Envelope::data(count_view(&state, article).await?))
}

/// create_article
///
/// [Authenticated Route] Creates an article authored by the caller. The slug
/// is derived from the title; a slug collision is a 400.
#[utoipa::path(
    post,
    path = "/api/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Created", body = Article),
        (status = 400, description = "Invalid input or duplicate slug"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_article(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Envelope<Article>>), AppError> {
    let article = Article::create(payload, &user.username, Utc::now())?;
    state.repo.insert(&article).await?;
    tracing::info!(article_id = %article.id, author = %article.author, "article created");
    Ok((StatusCode::CREATED, Envelope::data(article)))
}

/// update_article
///
/// [Authenticated Route] Partial update; author or admin only.
#[utoipa::path(
    put,
    path = "/api/articles/{id}",
    params(("id" = String, Path, description = "Article id")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = Article),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_article(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateArticleRequest>,
) -> Result<Json<Envelope<Article>>, AppError> {
    let mut article = load(&state, &id).await?;
    ensure_can_edit(&user, &article, "update")?;
    article.apply(payload, Utc::now())?;
    if !state.repo.save(&article).await? {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok(Envelope::data(article))
}

/// delete_article
///
/// [Authenticated Route] Deletes an article (author or admin), then removes
/// its uploaded image unless it is the shared default.
#[utoipa::path(
    delete,
    path = "/api/articles/{id}",
    params(("id" = String, Path, description = "Article id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_article(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let article = load(&state, &id).await?;
    ensure_can_edit(&user, &article, "delete")?;

    if state.repo.delete::<Article>(article.id).await?.is_none() {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    if article.has_custom_image() {
        discard_asset(&state.storage, &image_key(&article.featured_image)).await;
    }
    tracing::info!(article_id = %article.id, "article deleted");
    Ok(Envelope::message("Article deleted successfully"))
}

/// upload_article_image
///
/// [Authenticated Route] Replaces the featured image with the uploaded
/// `image` part, stored as `articles/article_<id><ext>`.
#[utoipa::path(
    put,
    path = "/api/articles/{id}/image",
    params(("id" = String, Path, description = "Article id")),
    responses(
        (status = 200, description = "Stored file name"),
        (status = 400, description = "Missing, non-image or oversized file"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn upload_article_image(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<String>>, AppError> {
    let mut article = load(&state, &id).await?;
    ensure_can_edit(&user, &article, "update")?;

    let upload = read_image(multipart?, state.config.max_upload_bytes).await?;
    let file_name = format!("article_{}{}", article.id, upload.extension);

    state
        .storage
        .put_object(&image_key(&file_name), upload.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Problem with file upload: {e}")))?;

    if article.has_custom_image() && article.featured_image != file_name {
        discard_asset(&state.storage, &image_key(&article.featured_image)).await;
    }

    article.featured_image = file_name.clone();
    article.updated_at = Utc::now();
    if !state.repo.save(&article).await? {
        discard_asset(&state.storage, &image_key(&file_name)).await;
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok(Envelope::data(file_name))
}
