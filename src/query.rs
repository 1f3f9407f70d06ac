//! List-query translation.
//!
//! Every collection listing accepts the same query-string grammar:
//! `field=value` for equality, `field[op]=value` for `gt|gte|lt|lte|in`,
//! `sort=a,-b`, `select=a,b`, `page=` and `limit=`. A [`ListSpec`] names the
//! fields a collection exposes and their kinds; [`ListSpec::translate`] turns
//! the raw pairs into a store-independent [`ListQuery`].

use std::{cmp::Ordering, collections::HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

const RESERVED: [&str; 4] = ["select", "sort", "page", "limit"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Malformed query parameter `{0}`")]
    MalformedKey(String),

    #[error("Unknown field `{0}`")]
    UnknownField(String),

    #[error("Unsupported operator `{op}` for field `{field}`")]
    UnknownOperator { field: String, op: String },

    #[error("Invalid value `{value}` for field `{field}`")]
    InvalidValue { field: String, value: String },

    #[error("Field `{0}` is filtered more than once")]
    DuplicateFilter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Date,
}

/// A typed filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

impl Scalar {
    pub fn kind(&self) -> FieldKind {
        match self {
            Scalar::Text(_) => FieldKind::Text,
            Scalar::Number(_) => FieldKind::Number,
            Scalar::Bool(_) => FieldKind::Bool,
            Scalar::Date(_) => FieldKind::Date,
        }
    }

    /// Casts a raw query-string value to `kind`. `None` when it does not fit.
    pub fn parse(kind: FieldKind, raw: &str) -> Option<Scalar> {
        match kind {
            FieldKind::Text => Some(Scalar::Text(raw.to_string())),
            FieldKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Scalar::Number),
            FieldKind::Bool => match raw.trim() {
                "true" => Some(Scalar::Bool(true)),
                "false" => Some(Scalar::Bool(false)),
                _ => None,
            },
            FieldKind::Date => parse_date(raw.trim()).map(Scalar::Date),
        }
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Number(f64::from(value))
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Scalar::Date(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Whether `stored.cmp(operand) == ordering` satisfies the operator.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: CompareOp,
        value: Scalar,
    },
    In {
        field: String,
        values: Vec<Scalar>,
    },
    /// Case-insensitive substring match on a text field.
    Contains { field: String, needle: String },
}

/// Conjunction of `all`, further restricted to documents matching at least
/// one of `any` when `any` is non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub all: Vec<Condition>,
    pub any: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, field: &str, value: impl Into<Scalar>) -> Self {
        self.compare(field, CompareOp::Eq, value)
    }

    pub fn compare(mut self, field: &str, op: CompareOp, value: impl Into<Scalar>) -> Self {
        self.all.push(Condition::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn within(mut self, field: &str, values: Vec<Scalar>) -> Self {
        self.all.push(Condition::In {
            field: field.to_string(),
            values,
        });
        self
    }

    /// Adds one `Contains` alternative per field.
    pub fn any_contains(mut self, fields: &[&str], needle: &str) -> Self {
        self.any.extend(fields.iter().map(|f| Condition::Contains {
            field: (*f).to_string(),
            needle: needle.to_string(),
        }));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub kind: FieldKind,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub select: Option<Vec<String>>,
    pub page: u64,
    pub limit: u64,
}

impl ListQuery {
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        let end = self.page.saturating_mul(self.limit);
        Pagination {
            next: (end < total).then(|| PageRef {
                page: self.page + 1,
                limit: self.limit,
            }),
            prev: (self.skip() > 0).then(|| PageRef {
                page: self.page.saturating_sub(1),
                limit: self.limit,
            }),
        }
    }

    /// Applies the `select` projection, keeping `id`.
    pub fn project(&self, doc: Value) -> Value {
        match &self.select {
            Some(fields) => project(&doc, fields),
            None => doc,
        }
    }
}

/// Per-collection list configuration.
#[derive(Debug, Clone, Copy)]
pub struct ListSpec {
    pub default_sort: &'static str,
    pub fields: &'static [(&'static str, FieldKind)],
}

impl ListSpec {
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, kind)| *kind)
    }

    /// translate
    ///
    /// Converts the ordered query pairs of a list request into a [`ListQuery`].
    /// Reserved keys are consumed first; every other key must name a known
    /// field, optionally followed by one `[op]` suffix.
    pub fn translate(&self, pairs: &[(String, String)]) -> Result<ListQuery, QueryError> {
        let mut filter = Filter::new();
        let mut seen: HashSet<(String, &'static str)> = HashSet::new();
        let mut sort = None;
        let mut select = None;
        let mut page = DEFAULT_PAGE;
        let mut limit = DEFAULT_LIMIT;

        for (key, value) in pairs {
            match key.as_str() {
                "sort" => sort = Some(self.sort_keys(value)?),
                "select" => select = Some(self.projection(value)?),
                "page" => page = positive_or(value, DEFAULT_PAGE),
                "limit" => limit = positive_or(value, DEFAULT_LIMIT),
                _ => {
                    let (field, op) = split_key(key)?;
                    if RESERVED.contains(&field) {
                        return Err(QueryError::MalformedKey(key.clone()));
                    }
                    let kind = self
                        .kind_of(field)
                        .ok_or_else(|| QueryError::UnknownField(field.to_string()))?;
                    let (tag, condition) = build_condition(field, kind, op, value)?;
                    if !seen.insert((field.to_string(), tag)) {
                        return Err(QueryError::DuplicateFilter(field.to_string()));
                    }
                    filter.all.push(condition);
                }
            }
        }

        let sort = match sort {
            Some(keys) => keys,
            None => self.sort_keys(self.default_sort)?,
        };

        Ok(ListQuery {
            filter,
            sort,
            select,
            page,
            limit,
        })
    }

    /// Parses `a,-b` into sort keys against this spec's fields.
    pub fn sort_keys(&self, raw: &str) -> Result<Vec<SortKey>, QueryError> {
        let mut keys = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, descending) = match part.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (part, false),
            };
            let kind = self
                .kind_of(name)
                .ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
            keys.push(SortKey {
                field: name.to_string(),
                kind,
                descending,
            });
        }
        Ok(keys)
    }

    fn projection(&self, raw: &str) -> Result<Vec<String>, QueryError> {
        let mut fields = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if self.kind_of(name).is_none() {
                return Err(QueryError::UnknownField(name.to_string()));
            }
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        }
        Ok(fields)
    }
}

fn positive_or(raw: &str, fallback: u64) -> u64 {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(fallback)
}

/// `age` → (`age`, None); `age[gte]` → (`age`, Some(`gte`)).
fn split_key(key: &str) -> Result<(&str, Option<&str>), QueryError> {
    let malformed = || QueryError::MalformedKey(key.to_string());

    let Some((field, rest)) = key.split_once('[') else {
        if key.contains(']') || key.is_empty() {
            return Err(malformed());
        }
        return Ok((key, None));
    };

    let op = rest.strip_suffix(']').ok_or_else(malformed)?;
    if field.is_empty() || field.contains(']') || op.is_empty() || op.contains(['[', ']']) {
        return Err(malformed());
    }
    Ok((field, Some(op)))
}

fn build_condition(
    field: &str,
    kind: FieldKind,
    op: Option<&str>,
    raw: &str,
) -> Result<(&'static str, Condition), QueryError> {
    let cast = |value: &str| {
        Scalar::parse(kind, value).ok_or_else(|| QueryError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
    };

    let compare = match op {
        None => CompareOp::Eq,
        Some("gt") => CompareOp::Gt,
        Some("gte") => CompareOp::Gte,
        Some("lt") => CompareOp::Lt,
        Some("lte") => CompareOp::Lte,
        Some("in") => {
            let values = raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(cast)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok((
                "in",
                Condition::In {
                    field: field.to_string(),
                    values,
                },
            ));
        }
        Some(other) => {
            return Err(QueryError::UnknownOperator {
                field: field.to_string(),
                op: other.to_string(),
            });
        }
    };

    if kind == FieldKind::Bool && compare != CompareOp::Eq {
        return Err(QueryError::UnknownOperator {
            field: field.to_string(),
            op: op.unwrap_or_default().to_string(),
        });
    }

    let tag = match compare {
        CompareOp::Eq => "eq",
        CompareOp::Gt => "gt",
        CompareOp::Gte => "gte",
        CompareOp::Lt => "lt",
        CompareOp::Lte => "lte",
    };

    Ok((
        tag,
        Condition::Compare {
            field: field.to_string(),
            op: compare,
            value: cast(raw)?,
        },
    ))
}

/// Reads a dotted path out of a JSON document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, segment| node.get(segment))
}

fn project(doc: &Value, fields: &[String]) -> Value {
    let mut out = Map::new();
    if let Some(id) = doc.get("id") {
        out.insert("id".to_string(), id.clone());
    }
    for path in fields {
        if let Some(value) = lookup(doc, path) {
            insert_path(&mut out, path, value.clone());
        }
    }
    Value::Object(out)
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_key_accepts_single_operator() {
        assert_eq!(split_key("age[gte]").unwrap(), ("age", Some("gte")));
        assert_eq!(split_key("age").unwrap(), ("age", None));
    }

    #[test]
    fn split_key_rejects_bracket_soup() {
        for key in ["age[gte", "age]", "age[[gte]]", "[gte]", "age[]", "age[gte]x"] {
            assert!(split_key(key).is_err(), "{key} should be rejected");
        }
    }

    #[test]
    fn project_keeps_nested_paths() {
        let doc = serde_json::json!({"id": "x", "homeTeam": {"name": "A", "logo": "l"}, "status": "upcoming"});
        let out = project(&doc, &["homeTeam.name".to_string()]);
        assert_eq!(out, serde_json::json!({"id": "x", "homeTeam": {"name": "A"}}));
    }
}
