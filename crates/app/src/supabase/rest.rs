//! Row reads and inserts against the data API (`/rest/v1`).

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{SupabaseClient, SupabaseError};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Equality predicate on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqFilter {
    pub column: String,
    pub value: String,
}

/// Ordering on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Order,
}

/// A read scoped by table name, equality filters and ordering.
///
/// ```rust,ignore
/// let query = Select::from("comercios").order("publicidad", Order::Desc);
/// let rows = backend.select(&query).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    table: String,
    filters: Vec<EqFilter>,
    ordering: Vec<OrderBy>,
    single: bool,
}

impl Select {
    /// All columns of all rows of `table`.
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            ordering: Vec::new(),
            single: false,
        }
    }

    /// Keep rows where `column` equals `value`.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(EqFilter {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    /// Sort by `column`. Later calls break ties of earlier ones.
    #[must_use]
    pub fn order(mut self, column: impl Into<String>, direction: Order) -> Self {
        self.ordering.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// Expect exactly one row; zero rows is `SupabaseError::NotFound`.
    #[must_use]
    pub const fn single(mut self) -> Self {
        self.single = true;
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn filters(&self) -> &[EqFilter] {
        &self.filters
    }

    #[must_use]
    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    #[must_use]
    pub const fn is_single(&self) -> bool {
        self.single
    }

    /// Query parameters in PostgREST syntax.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(
            self.filters
                .iter()
                .map(|f| (f.column.clone(), format!("eq.{}", f.value))),
        );
        if !self.ordering.is_empty() {
            let order = self
                .ordering
                .iter()
                .map(|o| format!("{}.{}", o.column, o.direction.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_string(), order));
        }
        pairs
    }
}

impl SupabaseClient {
    /// Read rows matching `query`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error message as `SupabaseError::Api`, or
    /// `SupabaseError::NotFound` when a single-row read matched nothing.
    #[instrument(skip(self), fields(table = %query.table()))]
    pub async fn select(&self, query: &Select) -> Result<Vec<Value>, SupabaseError> {
        let mut url = self.endpoint(&format!("rest/v1/{}", query.table()))?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());

        let mut headers = self.rest_headers().await?;
        if query.is_single() {
            headers.insert(
                ACCEPT,
                HeaderValue::from_static("application/vnd.pgrst.object+json"),
            );
        }

        let response = self
            .inner
            .http
            .get(url)
            .headers(headers)
            .send()
            .await?;

        let body = match Self::read_json::<Value>(response).await {
            Err(SupabaseError::Api {
                code: Some(code), ..
            }) if code == NO_ROWS_CODE => {
                return Err(SupabaseError::NotFound(query.table().to_string()));
            }
            other => other?,
        };

        let rows = match body {
            Value::Array(rows) => rows,
            row @ Value::Object(_) => vec![row],
            other => {
                return Err(SupabaseError::Unexpected(format!(
                    "expected rows, got {other}"
                )));
            }
        };
        debug!(rows = rows.len(), "Rows read");
        Ok(rows)
    }

    /// Insert one row into `table`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error message as `SupabaseError::Api`.
    #[instrument(skip(self, row))]
    pub async fn insert(&self, table: &str, row: Value) -> Result<(), SupabaseError> {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let mut headers = self.rest_headers().await?;
        headers.insert("Prefer", HeaderValue::from_static("return=minimal"));

        let response = self
            .inner
            .http
            .post(url)
            .headers(headers)
            .json(&row)
            .send()
            .await?;
        Self::check_status(response).await?;
        debug!("Row inserted");
        Ok(())
    }

    /// `apikey` plus the caller's bearer: the session token when signed in,
    /// the anon key otherwise.
    async fn rest_headers(&self) -> Result<HeaderMap, SupabaseError> {
        let bearer = match self.get_session().await {
            Ok(Some(session)) => session.access_token,
            Ok(None) | Err(_) => self.inner.config.anon_key().to_string(),
        };
        let mut headers = self.api_key_headers()?;
        headers.insert("Authorization", Self::bearer(&bearer)?);
        Ok(headers)
    }
}

/// PostgREST code for "single row requested, zero returned".
const NO_ROWS_CODE: &str = "PGRST116";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pairs(query: &Select) -> Vec<(String, String)> {
        query.query_pairs()
    }

    #[test]
    fn test_plain_select() {
        assert_eq!(
            pairs(&Select::from("comercios")),
            vec![("select".to_string(), "*".to_string())]
        );
    }

    #[test]
    fn test_filters_and_order() {
        let query = Select::from("comercios")
            .eq("usuario_id", "7b0f0a8e-3a55-4b1c-9f54-0c8d2f1e9a11")
            .order("publicidad", Order::Desc)
            .order("created_at", Order::Asc);
        assert_eq!(
            pairs(&query),
            vec![
                ("select".to_string(), "*".to_string()),
                (
                    "usuario_id".to_string(),
                    "eq.7b0f0a8e-3a55-4b1c-9f54-0c8d2f1e9a11".to_string()
                ),
                (
                    "order".to_string(),
                    "publicidad.desc,created_at.asc".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_single_flag() {
        let query = Select::from("profiles").eq("id", 5).single();
        assert!(query.is_single());
        assert_eq!(query.filters()[0].value, "5");
        assert!(!Select::from("profiles").is_single());
    }

    // =========================================================================
    // Against a local data API
    // =========================================================================

    use std::sync::Arc;
    use std::time::Duration;

    use secrecy::SecretString;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::SupabaseConfig;
    use crate::storage::MemoryStorage;

    fn client_for(server: &MockServer) -> SupabaseClient {
        let config = SupabaseConfig {
            url: Url::parse(&server.uri()).unwrap(),
            anon_key: SecretString::from("anon-key".to_string()),
            auto_refresh_token: false,
            http_timeout: Duration::from_secs(5),
        };
        SupabaseClient::new(&config, Arc::new(MemoryStorage::new())).unwrap()
    }

    #[tokio::test]
    async fn test_select_sends_anon_bearer_and_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/comercios"))
            .and(query_param("select", "*"))
            .and(query_param("order", "publicidad.desc"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "id": 2 }, { "id": 1 }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rows = client_for(&server)
            .select(&Select::from("comercios").order("publicidad", Order::Desc))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 2);
    }

    #[tokio::test]
    async fn test_single_read_without_rows_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.missing"))
            .and(header("accept", "application/vnd.pgrst.object+json"))
            .respond_with(ResponseTemplate::new(406).set_body_json(serde_json::json!({
                "code": "PGRST116",
                "details": "The result contains 0 rows",
                "hint": null,
                "message": "JSON object requested, multiple (or no) rows returned"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .select(&Select::from("profiles").eq("id", "missing").single())
            .await
            .unwrap_err();
        assert!(matches!(err, SupabaseError::NotFound(ref table) if table == "profiles"));
    }

    #[tokio::test]
    async fn test_insert_asks_for_minimal_return() {
        let server = MockServer::start().await;
        let row = serde_json::json!({ "nombre": "Kiosco", "publicidad": 0 });
        Mock::given(method("POST"))
            .and(path("/rest/v1/comercios"))
            .and(header("prefer", "return=minimal"))
            .and(body_json(&row))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).insert("comercios", row).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_insert_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/comercios"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "code": "42501",
                "message": "new row violates row-level security policy"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .insert("comercios", serde_json::json!({ "nombre": "Kiosco" }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("row-level security"));
    }
}
