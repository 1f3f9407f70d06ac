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

pub const NAME_MAX: usize = 50;

/// Prefix under which uploaded merchandise images are served.
pub const MERCHANDISE_IMAGE_PREFIX: &str = "/uploads/merchandise/";

pub const MERCHANDISE_LIST: ListSpec = ListSpec {
    default_sort: "-createdAt",
    fields: &[
        ("id", FieldKind::Text),
        ("name", FieldKind::Text),
        ("slug", FieldKind::Text),
        ("description", FieldKind::Text),
        ("category", FieldKind::Text),
        ("price", FieldKind::Number),
        ("stock", FieldKind::Number),
        ("featured", FieldKind::Bool),
        ("imageUrl", FieldKind::Text),
        ("createdAt", FieldKind::Date),
        ("updatedAt", FieldKind::Date),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum MerchandiseCategory {
    Jerseys,
    Apparel,
    Accessories,
    Souvenirs,
    Equipment,
}

/// Merchandise
///
/// A shop item. Same slug rule as articles, derived from `name`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Merchandise {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: f64,
    pub description: String,
    pub image_url: String,
    pub category: MerchandiseCategory,
    pub stock: u32,
    pub featured: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Merchandise {
    const COLLECTION: Collection = Collection::Merchandise;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateMerchandiseRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<MerchandiseCategory>,
    pub stock: Option<i64>,
    pub featured: Option<bool>,
}

pub type UpdateMerchandiseRequest = CreateMerchandiseRequest;

fn check_price(violations: &mut Violations, price: Option<f64>) {
    if let Some(price) = price {
        if !price.is_finite() || price < 0.0 {
            violations.add("price", "Price must be a positive number");
        }
    }
}

fn check_stock(violations: &mut Violations, stock: Option<i64>) -> Option<u32> {
    let stock = stock?;
    match u32::try_from(stock) {
        Ok(s) => Some(s),
        Err(_) => {
            violations.add("stock", "Stock cannot be negative");
            None
        }
    }
}

fn check_name(violations: &mut Violations, name: &str) {
    max_length(violations, "name", name, NAME_MAX);
    if !name.is_empty() && slugify(name).is_empty() {
        violations.add("name", "Name must contain at least one letter or digit");
    }
}

impl Merchandise {
    pub fn create(req: CreateMerchandiseRequest, now: DateTime<Utc>) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        let name = required(&mut violations, "name", req.name, "Please add a product name");
        check_name(&mut violations, &name);
        if req.price.is_none() {
            violations.add("price", "Please add a price");
        }
        check_price(&mut violations, req.price);
        let description = required(
            &mut violations,
            "description",
            req.description,
            "Please add a description",
        );
        let image_url = required(
            &mut violations,
            "imageUrl",
            req.image_url,
            "Please add an image URL",
        );
        if req.category.is_none() {
            violations.add("category", "Please select a category");
        }
        let stock = check_stock(&mut violations, req.stock);
        violations.into_result()?;

        Ok(Merchandise {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
            price: req.price.unwrap_or_default(),
            description,
            image_url,
            category: req.category.unwrap_or(MerchandiseCategory::Jerseys),
            stock: stock.unwrap_or(0),
            featured: req.featured.unwrap_or(false),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(
        &mut self,
        req: UpdateMerchandiseRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut violations = Violations::new();
        let name = req.name.map(|n| n.trim().to_string());
        if let Some(name) = &name {
            if name.is_empty() {
                violations.add("name", "Please add a product name");
            }
            check_name(&mut violations, name);
        }
        check_price(&mut violations, req.price);
        let stock = check_stock(&mut violations, req.stock);
        let description = req.description.map(|d| d.trim().to_string());
        if description.as_deref() == Some("") {
            violations.add("description", "Please add a description");
        }
        let image_url = req.image_url.map(|u| u.trim().to_string());
        if image_url.as_deref() == Some("") {
            violations.add("imageUrl", "Please add an image URL");
        }
        violations.into_result()?;

        if let Some(name) = name {
            if name != self.name {
                self.slug = slugify(&name);
                self.name = name;
            }
        }
        if let Some(price) = req.price {
            self.price = price;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(image_url) = image_url {
            self.image_url = image_url;
        }
        if let Some(category) = req.category {
            self.category = category;
        }
        if let Some(stock) = stock {
            self.stock = stock;
        }
        if let Some(featured) = req.featured {
            self.featured = featured;
        }
        self.updated_at = now;
        Ok(())
    }

    /// The stored file name when the image is an upload, `None` for external URLs.
    pub fn uploaded_image(&self) -> Option<&str> {
        self.image_url
            .strip_prefix(MERCHANDISE_IMAGE_PREFIX)
            .filter(|name| !name.is_empty())
    }
}
