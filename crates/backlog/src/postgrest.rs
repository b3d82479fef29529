//! PostgREST client for the backlog table.

use async_trait::async_trait;
use pipeline::{
    BacklogStore, ConfigError, ListQuery, NewWorkItem, Priority, SortField, StoreError,
    StoreVocabulary, WorkItem, WorkItemId, WorkItemPatch, WorkStatus,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// [`BacklogStore`] backed by a PostgREST table.
///
/// Reads accept both label vocabularies; writes use the configured one.
pub struct PostgrestBacklogStore {
    table_url: String,
    api_key: String,
    vocabulary: StoreVocabulary,
    http: reqwest::Client,
}

impl PostgrestBacklogStore {
    /// Creates a store for `table` under the project at `base_url`
    /// (e.g. `https://xyz.supabase.co`).
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        table: &str,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ConfigError::MissingSecret {
                name: "SUPABASE_URL".to_string(),
            });
        }
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingSecret {
                name: "SUPABASE_ANON_KEY".to_string(),
            });
        }
        Ok(Self {
            table_url: format!("{base_url}/rest/v1/{table}"),
            api_key,
            vocabulary: StoreVocabulary::Standard,
            http: reqwest::Client::new(),
        })
    }

    /// Writes labels and columns the way `vocabulary` spells them.
    pub fn with_vocabulary(mut self, vocabulary: StoreVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(method, &self.table_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Vec<Value>, StoreError> {
        let response = builder.send().await.map_err(|e| StoreError::Connectivity {
            message: e.to_string(),
        })?;
        read_rows(response).await
    }
}

async fn read_rows(response: Response) -> Result<Vec<Value>, StoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_failure(status, &body));
    }
    response
        .json::<Vec<Value>>()
        .await
        .map_err(|e| StoreError::Connectivity {
            message: format!("undecodable response body: {e}"),
        })
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps a non-success PostgREST response to a [`StoreError`].
///
/// Conflicts and Postgres integrity violations (SQLSTATE class `23`) are
/// constraint errors; everything else is a connectivity error.
fn classify_failure(status: StatusCode, body: &str) -> StoreError {
    let detail: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = detail
        .message
        .clone()
        .unwrap_or_else(|| body.trim().to_string());
    let integrity = detail.code.as_deref().is_some_and(|c| c.starts_with("23"));
    if status == StatusCode::CONFLICT || integrity {
        StoreError::Constraint { message }
    } else {
        StoreError::Connectivity {
            message: format!("HTTP {}: {message}", status.as_u16()),
        }
    }
}

/// Query-string parameters for a list request.
fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_string())];
    if !query.statuses.is_empty() {
        params.push(("status", status_filter(&query.statuses)));
    }
    let server_order: Vec<String> = query
        .order
        .iter()
        .filter_map(|key| {
            let column = match key.field {
                SortField::CreatedAt => "created_at",
                SortField::UpdatedAt => "updated_at",
                SortField::Priority => return None,
            };
            let dir = if key.descending { "desc" } else { "asc" };
            Some(format!("{column}.{dir}"))
        })
        .collect();
    if !server_order.is_empty() {
        params.push(("order", server_order.join(",")));
    }
    let fully_server_ordered = query.order.iter().all(|k| k.field != SortField::Priority);
    if let (Some(limit), true) = (query.limit, fully_server_ordered) {
        params.push(("limit", limit.to_string()));
    }
    params
}

/// `in.(...)` over every stored label of `statuses`, quoted so labels with
/// spaces survive.
fn status_filter(statuses: &[WorkStatus]) -> String {
    let labels: Vec<String> = statuses
        .iter()
        .flat_map(|s| s.accepted_labels())
        .map(|label| format!("\"{label}\""))
        .collect();
    format!("in.({})", labels.join(","))
}

fn encode(value: &impl Serialize) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::MalformedRow {
        message: format!("could not encode row: {e}"),
    })
}

/// Rewrites a standard-vocabulary body into `vocabulary`.
fn relabel(
    vocabulary: StoreVocabulary,
    mut body: Value,
    status: Option<WorkStatus>,
    priority: Option<Priority>,
) -> Value {
    if vocabulary == StoreVocabulary::Standard {
        return body;
    }
    if let Value::Object(map) = &mut body {
        if let Some(responsible) = map.remove("responsible") {
            map.insert("responsable".to_string(), responsible);
        }
        map.remove("progress");
        if let Some(status) = status {
            map.insert("status".to_string(), Value::from(status.legacy_label()));
        }
        if let Some(priority) = priority {
            map.insert("priority".to_string(), Value::from(priority.legacy_label()));
        }
    }
    body
}

fn insert_body(vocabulary: StoreVocabulary, item: &NewWorkItem) -> Result<Value, StoreError> {
    Ok(relabel(
        vocabulary,
        encode(item)?,
        Some(item.status),
        Some(item.priority),
    ))
}

fn patch_body(vocabulary: StoreVocabulary, patch: &WorkItemPatch) -> Result<Value, StoreError> {
    Ok(relabel(vocabulary, encode(patch)?, patch.status, patch.priority))
}

fn id_filter(id: &WorkItemId) -> (&'static str, String) {
    ("id", format!("eq.{id}"))
}

fn decode(row: Value) -> Result<WorkItem, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::MalformedRow {
        message: e.to_string(),
    })
}

fn single_row(rows: Vec<Value>, id: &WorkItemId) -> Result<WorkItem, StoreError> {
    match rows.into_iter().next() {
        Some(row) => decode(row),
        None => Err(StoreError::NotFound { id: id.clone() }),
    }
}

#[async_trait]
impl BacklogStore for PostgrestBacklogStore {
    #[instrument(skip_all, fields(statuses = ?query.statuses, limit = ?query.limit))]
    async fn list(&self, query: &ListQuery) -> Result<Vec<WorkItem>, StoreError> {
        let rows = self
            .send(self.request(Method::GET).query(&list_params(query)))
            .await?;
        let items: Vec<WorkItem> = rows
            .into_iter()
            .filter_map(|row| {
                decode(row)
                    .inspect_err(|e| warn!(error = %e, "skipping undecodable backlog row"))
                    .ok()
            })
            .collect();
        debug!(rows = items.len(), "backlog rows fetched");
        Ok(query.apply(items))
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn get(&self, id: &WorkItemId) -> Result<WorkItem, StoreError> {
        let rows = self
            .send(
                self.request(Method::GET)
                    .query(&[("select", "*".to_string()), id_filter(id)]),
            )
            .await?;
        single_row(rows, id)
    }

    #[instrument(skip_all, fields(item_id = %item.id))]
    async fn insert(&self, item: NewWorkItem) -> Result<WorkItem, StoreError> {
        let id = item.id.clone();
        let body = insert_body(self.vocabulary, &item)?;
        let rows = self
            .send(
                self.request(Method::POST)
                    .header("Prefer", "return=representation")
                    .json(&body),
            )
            .await?;
        // Some deployments suppress the representation; fall back to the payload.
        match rows.into_iter().next() {
            Some(row) => decode(row),
            None => {
                debug!(item_id = %id, "insert returned no representation");
                Ok(item.into_work_item())
            }
        }
    }

    #[instrument(skip(self, patch), fields(item_id = %id))]
    async fn update(
        &self,
        id: &WorkItemId,
        patch: &WorkItemPatch,
    ) -> Result<WorkItem, StoreError> {
        let body = patch_body(self.vocabulary, patch)?;
        let rows = self
            .send(
                self.request(Method::PATCH)
                    .header("Prefer", "return=representation")
                    .query(&[id_filter(id)])
                    .json(&body),
            )
            .await?;
        single_row(rows, id)
    }
}
