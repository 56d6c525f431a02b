use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Deserialize, Debug)]
pub struct QueryError {
    pub message: String,
}

/// Envelope returned by the GraphQL endpoint.
#[derive(Deserialize, Debug)]
pub struct QueryResponse {
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub errors: Vec<QueryError>,
}

/// Body of a single view, `{ nodes: [...] }`.
#[derive(Deserialize, Debug)]
pub struct ViewNodes {
    pub nodes: Vec<Value>,
}
