use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Violations, max_length, required, slugify};
use crate::{
    error::AppError,
    query::{FieldKind, ListSpec},
    repository::{Collection, Record},
};

/// Image every new article starts with. Never deleted from storage.
pub const DEFAULT_ARTICLE_IMAGE: &str = "default-article.jpg";

pub const TITLE_MAX: usize = 100;

pub const ARTICLE_LIST: ListSpec = ListSpec {
    default_sort: "-createdAt",
    fields: &[
        ("id", FieldKind::Text),
        ("title", FieldKind::Text),
        ("slug", FieldKind::Text),
        ("category", FieldKind::Text),
        ("content", FieldKind::Text),
        ("author", FieldKind::Text),
        ("status", FieldKind::Text),
        ("featured", FieldKind::Bool),
        ("featuredImage", FieldKind::Text),
        ("views", FieldKind::Number),
        ("createdAt", FieldKind::Date),
        ("updatedAt", FieldKind::Date),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum ArticleCategory {
    #[serde(rename = "Team News")]
    TeamNews,
    #[serde(rename = "Match Reports")]
    MatchReports,
    Interviews,
    Community,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }
}

/// Article
///
/// A news item. `slug` is always `slugify(title)` and only changes when the
/// title does; `author` is the username of whoever created it and decides who
/// may edit it besides admins.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub category: ArticleCategory,
    pub content: String,
    pub author: String,
    pub status: ArticleStatus,
    pub featured: bool,
    // File name under the `articles/` upload prefix.
    pub featured_image: String,
    pub views: u64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Article {
    const COLLECTION: Collection = Collection::Articles;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateArticleRequest {
    pub title: Option<String>,
    pub category: Option<ArticleCategory>,
    pub content: Option<String>,
    pub status: Option<ArticleStatus>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub category: Option<ArticleCategory>,
    pub content: Option<String>,
    pub status: Option<ArticleStatus>,
    pub featured: Option<bool>,
}

fn title_violations(violations: &mut Violations, title: &str) {
    max_length(violations, "title", title, TITLE_MAX);
    if !title.is_empty() && slugify(title).is_empty() {
        violations.add("title", "Title must contain at least one letter or digit");
    }
}

impl Article {
    /// Builds a new article owned by `author`.
    pub fn create(
        req: CreateArticleRequest,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        let title = required(&mut violations, "title", req.title, "Please add a title");
        title_violations(&mut violations, &title);
        let content = required(&mut violations, "content", req.content, "Please add content");
        if req.category.is_none() {
            violations.add("category", "Please select a category");
        }
        violations.into_result()?;

        Ok(Article {
            id: Uuid::new_v4(),
            slug: slugify(&title),
            title,
            category: req.category.unwrap_or(ArticleCategory::TeamNews),
            content,
            author: author.to_string(),
            status: req.status.unwrap_or_default(),
            featured: req.featured.unwrap_or(false),
            featured_image: DEFAULT_ARTICLE_IMAGE.to_string(),
            views: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a partial update. The slug follows the title only when the
    /// title actually changes.
    pub fn apply(&mut self, req: UpdateArticleRequest, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut violations = Violations::new();

        let title = req.title.map(|t| t.trim().to_string());
        if let Some(title) = &title {
            if title.is_empty() {
                violations.add("title", "Please add a title");
            }
            title_violations(&mut violations, title);
        }
        let content = req.content.map(|c| c.trim().to_string());
        if content.as_deref() == Some("") {
            violations.add("content", "Please add content");
        }
        violations.into_result()?;

        if let Some(title) = title {
            if title != self.title {
                self.slug = slugify(&title);
                self.title = title;
            }
        }
        if let Some(content) = content {
            self.content = content;
        }
        if let Some(category) = req.category {
            self.category = category;
        }
        if let Some(status) = req.status {
            self.status = status;
        }
        if let Some(featured) = req.featured {
            self.featured = featured;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn has_custom_image(&self) -> bool {
        !self.featured_image.is_empty() && self.featured_image != DEFAULT_ARTICLE_IMAGE
    }
}
