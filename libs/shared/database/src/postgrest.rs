use async_trait::async_trait;
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::Value;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::store::{DocumentStore, Filter, FindOptions, IndexSpec, Op, SortOrder, StoreError};
use crate::supabase::{SupabaseApiError, SupabaseClient};

/// `DocumentStore` over a Supabase/PostgREST database. Each collection is a table.
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: SupabaseClient::new(config),
        }
    }

    fn table_path(collection: &str, query: &[(String, String)]) -> String {
        if query.is_empty() {
            return format!("/rest/v1/{}", collection);
        }

        let query = query
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("/rest/v1/{}?{}", collection, query)
    }

    fn representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn call(
        &self,
        collection: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Vec<Value>, StoreError> {
        self.client
            .request_with_headers::<Vec<Value>>(method, path, body, Some(Self::representation()))
            .await
            .map_err(|e| map_client_error(collection, e))
    }
}

fn map_client_error(collection: &str, err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<SupabaseApiError>() {
        Some(api) if api.status == 409 => StoreError::UniqueViolation {
            collection: collection.to_string(),
            field: conflicting_field(&api.body).unwrap_or_else(|| "unknown".to_string()),
        },
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Extracts the column from a Postgres duplicate-key detail such as
/// `Key (email)=(a@b.com) already exists.`
fn conflicting_field(body: &str) -> Option<String> {
    let pattern = Regex::new(r"Key \(([^)]+)\)=").ok()?;
    pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|field| field.as_str().replace(", ", ","))
}

fn column(field: &str) -> String {
    match field.split_once('.') {
        Some((head, rest)) => {
            let mut parts: Vec<&str> = rest.split('.').collect();
            let last = parts.pop().unwrap_or(rest);
            let mut column = head.to_string();
            for part in parts {
                column.push_str("->");
                column.push_str(part);
            }
            column.push_str("->>");
            column.push_str(last);
            column
        }
        None => field.to_string(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn quoted_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| format!("\"{}\"", scalar(item).replace('"', "\\\"")))
            .collect(),
        other => vec![scalar(other)],
    }
}

/// Renders filter conditions as PostgREST query parameters.
pub fn render_filter(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|condition| {
            let value = match (condition.op, &condition.value) {
                (Op::Eq, Value::Null) => "is.null".to_string(),
                (Op::Ne, Value::Null) => "not.is.null".to_string(),
                (Op::Eq, v) => format!("eq.{}", scalar(v)),
                (Op::Ne, v) => format!("neq.{}", scalar(v)),
                (Op::Gt, v) => format!("gt.{}", scalar(v)),
                (Op::Gte, v) => format!("gte.{}", scalar(v)),
                (Op::Lt, v) => format!("lt.{}", scalar(v)),
                (Op::Lte, v) => format!("lte.{}", scalar(v)),
                (Op::In, v) => format!("in.({})", quoted_list(v).join(",")),
                (Op::Contains, v) => format!("cs.{{{}}}", quoted_list(&Value::Array(vec![v.clone()])).join(",")),
                (Op::Overlaps, v) => format!("ov.{{{}}}", quoted_list(v).join(",")),
            };
            (column(&condition.field), value)
        })
        .collect()
}

pub fn render_options(options: &FindOptions) -> Vec<(String, String)> {
    let mut query = Vec::new();

    if !options.sort.is_empty() {
        let order = options
            .sort
            .iter()
            .map(|(field, order)| {
                let direction = match order {
                    SortOrder::Asc => "asc",
                    SortOrder::Desc => "desc",
                };
                format!("{}.{}", column(field), direction)
            })
            .collect::<Vec<_>>()
            .join(",");
        query.push(("order".to_string(), order));
    }
    if let Some(skip) = options.skip {
        query.push(("offset".to_string(), skip.to_string()));
    }
    if let Some(limit) = options.limit {
        query.push(("limit".to_string(), limit.to_string()));
    }

    query
}

fn require_filter(filter: &Filter, operation: &str) -> Result<(), StoreError> {
    if filter.is_empty() {
        return Err(StoreError::Backend(format!("Refusing unfiltered {}", operation)));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let mut query = render_filter(filter);
        query.extend(render_options(options));
        let path = Self::table_path(collection, &query);

        self.client
            .request::<Vec<Value>>(Method::GET, &path, None)
            .await
            .map_err(|e| map_client_error(collection, e))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError> {
        let mut query = vec![("select".to_string(), "id".to_string())];
        query.extend(render_filter(filter));
        let path = Self::table_path(collection, &query);

        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| map_client_error(collection, e))?;
        Ok(rows.len())
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StoreError> {
        let path = Self::table_path(collection, &[]);
        let mut rows = self.call(collection, Method::POST, &path, Some(document)).await?;

        if rows.is_empty() {
            return Err(StoreError::Backend(format!("Insert into {} returned no rows", collection)));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Value,
    ) -> Result<Vec<Value>, StoreError> {
        require_filter(filter, "update")?;
        let path = Self::table_path(collection, &render_filter(filter));
        self.call(collection, Method::PATCH, &path, Some(changes)).await
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError> {
        require_filter(filter, "delete")?;
        let path = Self::table_path(collection, &render_filter(filter));
        let rows = self.call(collection, Method::DELETE, &path, None).await?;
        Ok(rows.len())
    }

    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<(), StoreError> {
        // Indexes live in the database migrations; only report what is expected.
        for index in indexes {
            debug!(
                "Expecting {}index on {}({})",
                if index.unique { "unique " } else { "" },
                index.collection,
                index.fields.join(", ")
            );
        }
        info!("PostgREST store at {} expects {} index(es)", self.client.get_base_url(), indexes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_filter_operators() {
        let filter = Filter::new()
            .eq("doctor_id", "d1")
            .gte("date", "2025-03-01")
            .in_list("status", ["pending", "confirmed"])
            .contains("specializations", "Cardiology")
            .overlaps("consultation_types", ["online", "both"])
            .eq("cancelled_at", Value::Null)
            .eq("clinic_info.city", "Pune");

        let rendered = render_filter(&filter);
        assert_eq!(
            rendered,
            vec![
                ("doctor_id".to_string(), "eq.d1".to_string()),
                ("date".to_string(), "gte.2025-03-01".to_string()),
                ("status".to_string(), "in.(\"pending\",\"confirmed\")".to_string()),
                ("specializations".to_string(), "cs.{\"Cardiology\"}".to_string()),
                ("consultation_types".to_string(), "ov.{\"online\",\"both\"}".to_string()),
                ("cancelled_at".to_string(), "is.null".to_string()),
                ("clinic_info->>city".to_string(), "eq.Pune".to_string()),
            ]
        );
    }

    #[test]
    fn test_render_options() {
        let options = FindOptions::new().sort_asc("date").sort_desc("start_time").skip(20).limit(10);
        assert_eq!(
            render_options(&options),
            vec![
                ("order".to_string(), "date.asc,start_time.desc".to_string()),
                ("offset".to_string(), "20".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_conflicting_field_from_postgres_detail() {
        let body = r#"{"code":"23505","details":"Key (email)=(a@b.com) already exists.","message":"duplicate key"}"#;
        assert_eq!(conflicting_field(body), Some("email".to_string()));
        assert_eq!(conflicting_field("nothing here"), None);
    }

    #[test]
    fn test_nested_column_path() {
        assert_eq!(column("clinic_info.city"), "clinic_info->>city");
        assert_eq!(column("a.b.c"), "a->b->>c");
        assert_eq!(column("status"), "status");
    }
}
