use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Envelope;
use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        ARTICLE_LIST, Article, ArticleStatus, FIXTURE_LIST, Fixture, FixtureStatus,
        MERCHANDISE_LIST, Merchandise,
    },
    query::{CompareOp, Filter},
    repository::Collection,
};

const RECENT_LIMIT: u64 = 5;

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct CollectionCounts {
    pub articles: u64,
    pub fixtures: u64,
    pub merchandise: u64,
    pub players: u64,
    pub teams: u64,
    pub tournaments: u64,
    pub users: u64,
    pub bookings: u64,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleStatusCounts {
    pub published: u64,
    pub draft: u64,
    pub archived: u64,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticleSummary {
    pub id: Uuid,
    pub title: String,
    pub status: ArticleStatus,
    pub views: u64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MerchandiseSummary {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub stock: u32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// DashboardStats
///
/// Everything the CMS landing page shows in one response.
#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    pub counts: CollectionCounts,
    pub article_status: ArticleStatusCounts,
    pub recent_articles: Vec<ArticleSummary>,
    pub recent_merchandise: Vec<MerchandiseSummary>,
    pub upcoming_fixtures: Vec<Fixture>,
    pub recent_results: Vec<Fixture>,
}

async fn count(state: &AppState, collection: Collection) -> Result<u64, AppError> {
    Ok(state.repo.count(collection, &Filter::new()).await?)
}

async fn count_articles(state: &AppState, status: ArticleStatus) -> Result<u64, AppError> {
    let filter = Filter::new().eq("status", status.as_str());
    Ok(state.repo.count(Collection::Articles, &filter).await?)
}

/// get_dashboard_stats
///
/// [Authenticated Route] Collection counts, the article status breakdown, the
/// newest articles and shop items, upcoming fixtures and the latest results.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_dashboard_stats(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<DashboardStats>>, AppError> {
    let counts = CollectionCounts {
        articles: count(&state, Collection::Articles).await?,
        fixtures: count(&state, Collection::Fixtures).await?,
        merchandise: count(&state, Collection::Merchandise).await?,
        players: count(&state, Collection::Players).await?,
        teams: count(&state, Collection::Teams).await?,
        tournaments: count(&state, Collection::Tournaments).await?,
        users: count(&state, Collection::Users).await?,
        bookings: count(&state, Collection::Bookings).await?,
    };
    let article_status = ArticleStatusCounts {
        published: count_articles(&state, ArticleStatus::Published).await?,
        draft: count_articles(&state, ArticleStatus::Draft).await?,
        archived: count_articles(&state, ArticleStatus::Archived).await?,
    };

    let recent_articles = state
        .repo
        .find::<Article>(&Filter::new(), &ARTICLE_LIST.sort_keys("-createdAt")?, Some(RECENT_LIMIT))
        .await?
        .into_iter()
        .map(|a| ArticleSummary {
            id: a.id,
            title: a.title,
            status: a.status,
            views: a.views,
            created_at: a.created_at,
        })
        .collect();

    let recent_merchandise = state
        .repo
        .find::<Merchandise>(
            &Filter::new(),
            &MERCHANDISE_LIST.sort_keys("-createdAt")?,
            Some(RECENT_LIMIT),
        )
        .await?
        .into_iter()
        .map(|m| MerchandiseSummary {
            id: m.id,
            name: m.name,
            price: m.price,
            stock: m.stock,
            created_at: m.created_at,
        })
        .collect();

    let now = Utc::now();
    let upcoming = Filter::new()
        .eq("status", FixtureStatus::Upcoming.as_str())
        .compare("date", CompareOp::Gte, now);
    let upcoming_fixtures = state
        .repo
        .find::<Fixture>(&upcoming, &FIXTURE_LIST.sort_keys("date")?, Some(RECENT_LIMIT))
        .await?;

    let completed = Filter::new().eq("status", FixtureStatus::Completed.as_str());
    let recent_results = state
        .repo
        .find::<Fixture>(&completed, &FIXTURE_LIST.sort_keys("-date")?, Some(RECENT_LIMIT))
        .await?;

    Ok(Envelope::data(DashboardStats {
        counts,
        article_status,
        recent_articles,
        recent_merchandise,
        upcoming_fixtures,
        recent_results,
    }))
}
