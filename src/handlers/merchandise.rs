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
    auth::RequireAdmin,
    error::AppError,
    models::{
        CreateMerchandiseRequest, MERCHANDISE_IMAGE_PREFIX, MERCHANDISE_LIST, Merchandise,
        UpdateMerchandiseRequest,
    },
    query::Filter,
    repository::Collection,
};

const NOT_FOUND: &str = "Merchandise not found";
const FEATURED_LIMIT: u64 = 4;

fn image_key(file_name: &str) -> String {
    format!("merchandise/{file_name}")
}

async fn load(state: &AppState, raw_id: &str) -> Result<Merchandise, AppError> {
    let id = parse_id(raw_id, NOT_FOUND)?;
    state
        .repo
        .get::<Merchandise>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

/// get_merchandise
///
/// [Public Route] Lists shop items through the shared query grammar; newest
/// first by default.
#[utoipa::path(
    get,
    path = "/api/merchandise",
    responses(
        (status = 200, description = "Page of merchandise", body = [Merchandise]),
        (status = 400, description = "Malformed query")
    )
)]
pub async fn get_merchandise(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = MERCHANDISE_LIST.translate(&pairs)?;
    let page = state.repo.list(Collection::Merchandise, &query).await?;
    Ok(Envelope::page(page.data, query.pagination(page.total)))
}

/// get_featured_merchandise
///
/// [Public Route] Items flagged as featured, newest first.
#[utoipa::path(
    get,
    path = "/api/merchandise/featured",
    params(LimitParams),
    responses((status = 200, description = "Featured merchandise", body = [Merchandise]))
)]
pub async fn get_featured_merchandise(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Result<Json<Envelope<Vec<Merchandise>>>, AppError> {
    let filter = Filter::new().eq("featured", true);
    let sort = MERCHANDISE_LIST.sort_keys(MERCHANDISE_LIST.default_sort)?;
    let items = state
        .repo
        .find::<Merchandise>(&filter, &sort, Some(params.or(FEATURED_LIMIT)))
        .await?;
    Ok(Envelope::items(items))
}

/// get_merchandise_by_category
///
/// [Public Route] Items of one category, newest first.
#[utoipa::path(
    get,
    path = "/api/merchandise/category/{category}",
    params(("category" = String, Path, description = "Category name, e.g. `Jerseys`")),
    responses((status = 200, description = "Items in the category", body = [Merchandise]))
)]
pub async fn get_merchandise_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Envelope<Vec<Merchandise>>>, AppError> {
    let filter = Filter::new().eq("category", category);
    let sort = MERCHANDISE_LIST.sort_keys(MERCHANDISE_LIST.default_sort)?;
    let items = state.repo.find::<Merchandise>(&filter, &sort, None).await?;
    Ok(Envelope::items(items))
}

/// search_merchandise
///
/// [Public Route] Case-insensitive search over name and description.
#[utoipa::path(
    get,
    path = "/api/merchandise/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching items", body = [Merchandise]),
        (status = 400, description = "Missing query")
    )
)]
pub async fn search_merchandise(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<Envelope<Vec<Merchandise>>>, AppError> {
    let needle = params.required()?;
    let filter = Filter::new().any_contains(&["name", "description"], &needle);
    let sort = MERCHANDISE_LIST.sort_keys(MERCHANDISE_LIST.default_sort)?;
    let items = state.repo.find::<Merchandise>(&filter, &sort, None).await?;
    Ok(Envelope::items(items))
}

/// get_merchandise_item
///
/// [Public Route] One item by id.
#[utoipa::path(
    get,
    path = "/api/merchandise/{id}",
    params(("id" = String, Path, description = "Merchandise id")),
    responses(
        (status = 200, description = "Item", body = Merchandise),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_merchandise_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Merchandise>>, AppError> {
    Ok(Envelope::data(load(&state, &id).await?))
}

/// get_merchandise_by_slug
///
/// [Public Route] One item by slug.
#[utoipa::path(
    get,
    path = "/api/merchandise/slug/{slug}",
    params(("slug" = String, Path, description = "Merchandise slug")),
    responses(
        (status = 200, description = "Item", body = Merchandise),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_merchandise_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Envelope<Merchandise>>, AppError> {
    let item = state
        .repo
        .find_one::<Merchandise>(&Filter::new().eq("slug", slug))
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    Ok(Envelope::data(item))
}

/// create_merchandise
///
/// [Admin Route] Adds a shop item; its slug is derived from the name.
#[utoipa::path(
    post,
    path = "/api/merchandise",
    request_body = CreateMerchandiseRequest,
    responses(
        (status = 201, description = "Created", body = Merchandise),
        (status = 400, description = "Invalid input or duplicate slug"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_merchandise(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateMerchandiseRequest>,
) -> Result<(StatusCode, Json<Envelope<Merchandise>>), AppError> {
    let item = Merchandise::create(payload, Utc::now())?;
    state.repo.insert(&item).await?;
    tracing::info!(merchandise_id = %item.id, "merchandise created");
    Ok((StatusCode::CREATED, Envelope::data(item)))
}

/// update_merchandise
///
/// [Admin Route] Partial update; the slug follows a changed name.
#[utoipa::path(
    put,
    path = "/api/merchandise/{id}",
    params(("id" = String, Path, description = "Merchandise id")),
    request_body = CreateMerchandiseRequest,
    responses(
        (status = 200, description = "Updated", body = Merchandise),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_merchandise(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateMerchandiseRequest>,
) -> Result<Json<Envelope<Merchandise>>, AppError> {
    let mut item = load(&state, &id).await?;
    item.apply(payload, Utc::now())?;
    if !state.repo.save(&item).await? {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok(Envelope::data(item))
}

/// delete_merchandise
///
/// [Admin Route] Deletes the item, then its uploaded image if it has one.
#[utoipa::path(
    delete,
    path = "/api/merchandise/{id}",
    params(("id" = String, Path, description = "Merchandise id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_merchandise(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let id = parse_id(&id, NOT_FOUND)?;
    let item = state
        .repo
        .delete::<Merchandise>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    if let Some(file_name) = item.uploaded_image() {
        discard_asset(&state.storage, &image_key(file_name)).await;
    }
    Ok(Envelope::message("Merchandise deleted successfully"))
}

/// upload_merchandise_image
///
/// [Admin Route] Stores the uploaded `image` part as
/// `merchandise/merchandise_<id><ext>` and points `imageUrl` at it.
#[utoipa::path(
    put,
    path = "/api/merchandise/{id}/image",
    params(("id" = String, Path, description = "Merchandise id")),
    responses(
        (status = 200, description = "Public URL of the stored image"),
        (status = 400, description = "Missing, non-image or oversized file"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn upload_merchandise_image(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<String>>, AppError> {
    let mut item = load(&state, &id).await?;
    let upload = read_image(multipart?, state.config.max_upload_bytes).await?;
    let file_name = format!("merchandise_{}{}", item.id, upload.extension);

    state
        .storage
        .put_object(&image_key(&file_name), upload.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Problem with file upload: {e}")))?;

    if let Some(previous) = item.uploaded_image().filter(|p| *p != file_name) {
        discard_asset(&state.storage, &image_key(previous)).await;
    }

    item.image_url = format!("{MERCHANDISE_IMAGE_PREFIX}{file_name}");
    item.updated_at = Utc::now();
    if !state.repo.save(&item).await? {
        discard_asset(&state.storage, &image_key(&file_name)).await;
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok(Envelope::data(item.image_url))
}
