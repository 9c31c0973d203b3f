//! Neo4j implementation of [`RelationshipStore`] over the HTTP
//! transaction API (`POST /db/{database}/tx/commit`).
//!
//! Issues are `(:Issue {key, summary})` nodes, blocking edges are
//! `[:BLOCKS]`, and field changes hang off issues as
//! `[:HAS_CHANGE]->(:ChangeEvent {field, from_value, to_value, timestamp})`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::error::{GraphError, Result};
use crate::store::RelationshipStore;
use crate::types::{Relation, RelationKind, RelationPattern};

/// Default HTTP port when a bolt URI is configured.
const HTTP_PORT: u16 = 7474;

/// Row cap for unanchored queries.
const DEFAULT_LIMIT: u32 = 100;

/// Connection settings for [`Neo4jStore`].
#[derive(Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Neo4jConfig {
    /// Create a config with the default database and a 10s timeout.
    pub fn new(
        uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            database: "neo4j".to_string(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Neo4j-backed relationship store.
pub struct Neo4jStore {
    http: reqwest::Client,
    endpoint: Url,
    config: Neo4jConfig,
}

impl Neo4jStore {
    /// Create a store from config. Does not contact the server.
    pub fn new(config: Neo4jConfig) -> Result<Self> {
        let endpoint = Self::commit_endpoint(&config.uri, &config.database)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GraphError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    /// Map a configured URI to the transaction commit endpoint.
    ///
    /// `bolt://` and `neo4j://` URIs are rewritten to plain HTTP on the
    /// default HTTP port; `+s` variants become HTTPS.
    fn commit_endpoint(uri: &str, database: &str) -> Result<Url> {
        let mut url = Url::parse(uri)?;
        let scheme = url.scheme().to_string();
        match scheme.as_str() {
            "http" | "https" => {}
            "bolt" | "neo4j" | "bolt+s" | "neo4j+s" | "bolt+ssc" | "neo4j+ssc" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| GraphError::Config(format!("graph uri has no host: {}", uri)))?
                    .to_string();
                let http_scheme = if scheme.contains("+s") { "https" } else { "http" };
                url = Url::parse(&format!("{}://{}:{}/", http_scheme, host, HTTP_PORT))?;
            }
            other => {
                return Err(GraphError::Config(format!(
                    "unsupported graph uri scheme: {}",
                    other
                )));
            }
        }
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }
        Ok(url.join(&format!("db/{}/tx/commit", database))?)
    }

    /// Cypher statement and parameters for a pattern. Every statement
    /// returns four columns: from, to, detail, at.
    fn cypher(pattern: &RelationPattern) -> (&'static str, Value) {
        match pattern {
            RelationPattern::BlockedBy { issue } => (
                "MATCH (b:Issue)-[:BLOCKS]->(i:Issue {key: $key}) \
                 RETURN b.key, i.key, b.summary, null",
                json!({ "key": issue }),
            ),
            RelationPattern::Blocks { issue } => (
                "MATCH (i:Issue {key: $key})-[:BLOCKS]->(d:Issue) \
                 RETURN i.key, d.key, d.summary, null",
                json!({ "key": issue }),
            ),
            RelationPattern::ChangeHistory {
                issue: Some(issue),
                days,
            } => (
                "MATCH (i:Issue {key: $key})-[:HAS_CHANGE]->(c:ChangeEvent) \
                 WHERE c.timestamp >= datetime() - duration({days: $days}) \
                 RETURN i.key, coalesce(c.field, 'field'), \
                 coalesce(toString(c.from_value), '') + ' -> ' + coalesce(toString(c.to_value), ''), \
                 toString(c.timestamp) \
                 ORDER BY c.timestamp DESC LIMIT $limit",
                json!({ "key": issue, "days": days, "limit": DEFAULT_LIMIT }),
            ),
            RelationPattern::ChangeHistory { issue: None, days } => (
                "MATCH (i:Issue)-[:HAS_CHANGE]->(c:ChangeEvent) \
                 WHERE c.timestamp >= datetime() - duration({days: $days}) \
                 RETURN i.key, coalesce(c.field, 'field'), \
                 coalesce(toString(c.from_value), '') + ' -> ' + coalesce(toString(c.to_value), ''), \
                 toString(c.timestamp) \
                 ORDER BY c.timestamp DESC LIMIT $limit",
                json!({ "days": days, "limit": DEFAULT_LIMIT }),
            ),
            RelationPattern::Dependencies => (
                "MATCH (a:Issue)-[:BLOCKS]->(b:Issue) \
                 RETURN a.key, b.key, b.summary, null LIMIT $limit",
                json!({ "limit": DEFAULT_LIMIT }),
            ),
        }
    }

    async fn commit(&self, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });

        let response = self
            .http
            .post(self.endpoint.clone())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(GraphError::Auth(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }

        let text = response.text().await?;
        let parsed: TxResponse = serde_json::from_str(&text)?;
        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(GraphError::Query {
                code: err.code,
                message: err.message,
            });
        }

        Ok(parsed
            .results
            .into_iter()
            .next()
            .map(|r| r.data.into_iter().map(|d| d.row).collect())
            .unwrap_or_default())
    }

    fn row_to_relation(kind: RelationKind, row: Vec<Value>) -> Option<Relation> {
        let text = |v: Option<&Value>| -> Option<String> {
            v.and_then(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
        };

        Some(Relation {
            from: text(row.first())?,
            to: text(row.get(1))?,
            kind,
            detail: text(row.get(2)),
            at: text(row.get(3)),
        })
    }
}

#[async_trait]
impl RelationshipStore for Neo4jStore {
    async fn query(&self, pattern: &RelationPattern) -> Result<Vec<Relation>> {
        let (statement, parameters) = Self::cypher(pattern);
        tracing::debug!(pattern = %pattern, "Querying relationship store");

        let kind = match pattern {
            RelationPattern::ChangeHistory { .. } => RelationKind::Changed,
            _ => RelationKind::Blocks,
        };

        let rows = self.commit(statement, parameters).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| Self::row_to_relation(kind, row))
            .collect())
    }

    async fn is_reachable(&self) -> bool {
        match self.commit("RETURN 1", json!({})).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Relationship store probe failed");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "neo4j"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> Neo4jStore {
        Neo4jStore::new(Neo4jConfig::new(server.uri(), "neo4j", "pw")).unwrap()
    }

    #[test]
    fn test_endpoint_from_bolt_uri() {
        let url = Neo4jStore::commit_endpoint("bolt://graph.local:7687", "neo4j").unwrap();
        assert_eq!(url.as_str(), "http://graph.local:7474/db/neo4j/tx/commit");

        let url = Neo4jStore::commit_endpoint("neo4j+s://abc.databases.neo4j.io", "prod").unwrap();
        assert_eq!(url.as_str(), "https://abc.databases.neo4j.io:7474/db/prod/tx/commit");

        assert!(Neo4jStore::commit_endpoint("ftp://x", "neo4j").is_err());
    }

    #[test]
    fn test_config_debug_masks_password() {
        let config = Neo4jConfig::new("bolt://x", "neo4j", "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_blocked_by_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .and(body_string_contains("[:BLOCKS]->(i:Issue {key: $key})"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "columns": ["b.key", "i.key", "b.summary", "null"],
                    "data": [
                        { "row": ["API-1", "WEB-9", "Auth service rewrite", null] },
                        { "row": ["API-4", "WEB-9", "Rate limiter", null] }
                    ]
                }],
                "errors": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let relations = store_for(&server)
            .query(&RelationPattern::BlockedBy {
                issue: "WEB-9".into(),
            })
            .await
            .unwrap();

        assert_eq!(relations.len(), 2);
        assert_eq!(relations[0].to_string(), "API-1 blocks WEB-9 (Auth service rewrite)");
        assert!(relations[1].at.is_none());
    }

    #[tokio::test]
    async fn test_query_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "errors": [{ "code": "Neo.ClientError.Statement.SyntaxError", "message": "bad" }]
            })))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .query(&RelationPattern::Dependencies)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Query { .. }));
    }

    #[tokio::test]
    async fn test_reachability() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("RETURN 1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "columns": ["1"], "data": [{ "row": [1] }] }],
                "errors": []
            })))
            .mount(&server)
            .await;
        assert!(store_for(&server).is_reachable().await);

        let dead = Neo4jStore::new(
            Neo4jConfig::new("http://127.0.0.1:1", "neo4j", "pw")
                .with_timeout(Duration::from_secs(1)),
        )
        .unwrap();
        assert!(!dead.is_reachable().await);
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .query(&RelationPattern::Dependencies)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Auth(_)));
    }
}
