//! Per-turn tool configuration: the name-keyed argument overrides sent
//! alongside the serialized history so server-side tools resolve the
//! caller's session and database.

use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Name-keyed tool argument overrides for one turn request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolConfig {
    by_name: BTreeMap<String, Value>,
}

impl ToolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tool_name: impl Into<String>, config: Value) {
        self.by_name.insert(tool_name.into(), config);
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>, config: Value) -> Self {
        self.insert(tool_name, config);
        self
    }

    /// The full tool table for a session: sandboxed execution tools get
    /// the session id, SQL tools additionally the database name, and
    /// schema/search tools run with no overrides.
    pub fn for_session(session_id: &str, db_name: &str) -> Self {
        let mut config = Self::new();
        for tool in [
            "python",
            "r",
            "df_query",
            "neo4j_query",
            "openalex_query",
            "arxiv_query",
            "google_search",
        ] {
            config.insert(tool, json!({"session_id": session_id}));
        }
        config.insert("df_list_table", json!({"query": ""}));
        config.insert("df_get_schema", json!({}));
        config.insert("sql_list_table", json!({"db_name": db_name, "query": ""}));
        config.insert("sql_get_schema", json!({"db_name": db_name}));
        config.insert(
            "sql_query",
            json!({"db_name": db_name, "session_id": session_id}),
        );
        for tool in [
            "neo4j_get_schema",
            "search_name",
            "search_literature",
            "search_policy",
        ] {
            config.insert(tool, json!({}));
        }
        config
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.by_name.clone()
    }

    pub fn get(&self, tool_name: &str) -> Option<&Value> {
        self.by_name.get(tool_name)
    }
}
