use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod collections {
    pub const USERS: &str = "users";
    pub const DOCTOR_PROFILES: &str = "doctor_profiles";
    pub const AVAILABILITY_SLOTS: &str = "availability_slots";
    pub const APPOINTMENTS: &str = "appointments";
}

/// Index hint for a collection. Unique indexes are enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: &'static str,
    pub fields: &'static [&'static str],
    pub unique: bool,
}

pub const COLLECTION_INDEXES: &[IndexSpec] = &[
    IndexSpec { collection: collections::USERS, fields: &["email"], unique: true },
    IndexSpec { collection: collections::USERS, fields: &["id"], unique: true },
    IndexSpec { collection: collections::DOCTOR_PROFILES, fields: &["user_id"], unique: true },
    IndexSpec { collection: collections::DOCTOR_PROFILES, fields: &["id"], unique: true },
    IndexSpec { collection: collections::AVAILABILITY_SLOTS, fields: &["id"], unique: true },
    IndexSpec { collection: collections::AVAILABILITY_SLOTS, fields: &["doctor_id", "date"], unique: false },
    IndexSpec { collection: collections::APPOINTMENTS, fields: &["id"], unique: true },
    IndexSpec { collection: collections::APPOINTMENTS, fields: &["patient_id", "appointment_date"], unique: false },
    IndexSpec { collection: collections::APPOINTMENTS, fields: &["doctor_id", "appointment_date"], unique: false },
    IndexSpec { collection: collections::APPOINTMENTS, fields: &["status"], unique: false },
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated on {collection}.{field}")]
    UniqueViolation { collection: String, field: String },

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_unique_violation_on(&self, collection: &str, field: &str) -> bool {
        matches!(
            self,
            StoreError::UniqueViolation { collection: c, field: f } if c == collection && (f == field || f == "unknown")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    /// Array field contains the value.
    Contains,
    /// Array field shares at least one element with the value array.
    Overlaps,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

/// Conjunction of field conditions. Field names may be dotted paths (`clinic_info.city`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().eq("id", id)
    }

    fn push(mut self, field: &str, op: Op, value: Value) -> Self {
        self.conditions.push(Condition { field: field.to_string(), op, value });
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Eq, value.into())
    }

    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Ne, value.into())
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Gt, value.into())
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Gte, value.into())
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Lt, value.into())
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Lte, value.into())
    }

    pub fn in_list<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field, Op::In, Value::Array(values))
    }

    pub fn contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Contains, value.into())
    }

    pub fn overlaps<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field, Op::Overlaps, Value::Array(values))
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|condition| condition.matches(document))
    }
}

impl Condition {
    fn matches(&self, document: &Value) -> bool {
        let found = lookup(document, &self.field);
        match self.op {
            Op::Eq => values_equal(found, &self.value),
            Op::Ne => !values_equal(found, &self.value),
            Op::Gt => compare(found, &self.value) == Some(Ordering::Greater),
            Op::Gte => matches!(compare(found, &self.value), Some(Ordering::Greater | Ordering::Equal)),
            Op::Lt => compare(found, &self.value) == Some(Ordering::Less),
            Op::Lte => matches!(compare(found, &self.value), Some(Ordering::Less | Ordering::Equal)),
            Op::In => match &self.value {
                Value::Array(options) => options.iter().any(|option| values_equal(found, option)),
                _ => false,
            },
            Op::Contains => match found {
                Some(Value::Array(items)) => items.contains(&self.value),
                _ => false,
            },
            Op::Overlaps => match (found, &self.value) {
                (Some(Value::Array(items)), Value::Array(wanted)) => {
                    items.iter().any(|item| wanted.contains(item))
                }
                _ => false,
            },
        }
    }
}

pub(crate) fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, key| current.get(key))
}

fn values_equal(found: Option<&Value>, expected: &Value) -> bool {
    match found {
        Some(value) => value == expected,
        None => expected.is_null(),
    }
}

/// Ordering between two scalar JSON values of the same type. ISO dates and `HH:MM`
/// times order correctly as strings.
pub(crate) fn compare(found: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (found?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_asc(mut self, field: &str) -> Self {
        self.sort.push((field.to_string(), SortOrder::Asc));
        self
    }

    pub fn sort_desc(mut self, field: &str) -> Self {
        self.sort.push((field.to_string(), SortOrder::Desc));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A document store reachable through find/insert/update/delete by filter.
///
/// `update` is the conditional-update primitive: it returns every document it modified,
/// so an empty result means the filter's precondition did not hold.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, StoreError> {
        let mut found = self.find(collection, filter, &FindOptions::new().limit(1)).await?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError>;

    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StoreError>;

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Value,
    ) -> Result<Vec<Value>, StoreError>;

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError>;

    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

pub fn from_document<T: DeserializeOwned>(document: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(document)?)
}

pub fn from_documents<T: DeserializeOwned>(documents: Vec<Value>) -> Result<Vec<T>, StoreError> {
    documents.into_iter().map(from_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot() -> Value {
        json!({
            "id": "s1",
            "doctor_id": "d1",
            "date": "2025-03-10",
            "start_time": "09:00",
            "status": "available",
            "fee": 40,
            "tags": ["online", "both"],
            "clinic_info": { "city": "Pune" }
        })
    }

    #[test]
    fn test_equality_and_ranges() {
        let doc = slot();
        assert!(Filter::new().eq("doctor_id", "d1").eq("status", "available").matches(&doc));
        assert!(!Filter::new().eq("status", "booked").matches(&doc));
        assert!(Filter::new().gte("date", "2025-03-10").lte("date", "2025-03-31").matches(&doc));
        assert!(!Filter::new().gt("date", "2025-03-10").matches(&doc));
        assert!(Filter::new().lt("start_time", "10:00").matches(&doc));
        assert!(Filter::new().gt("fee", 10).matches(&doc));
        assert!(Filter::new().ne("status", "booked").matches(&doc));
    }

    #[test]
    fn test_array_and_path_conditions() {
        let doc = slot();
        assert!(Filter::new().contains("tags", "online").matches(&doc));
        assert!(!Filter::new().contains("tags", "clinic").matches(&doc));
        assert!(Filter::new().overlaps("tags", ["clinic", "both"]).matches(&doc));
        assert!(Filter::new().in_list("status", ["available", "booked"]).matches(&doc));
        assert!(Filter::new().eq("clinic_info.city", "Pune").matches(&doc));
        assert!(!Filter::new().eq("clinic_info.city", "Delhi").matches(&doc));
    }

    #[test]
    fn test_missing_field_only_equals_null() {
        let doc = slot();
        assert!(Filter::new().eq("cancelled_at", Value::Null).matches(&doc));
        assert!(!Filter::new().gte("missing", "a").matches(&doc));
    }
}
