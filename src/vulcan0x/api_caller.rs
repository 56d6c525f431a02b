use std::{collections::HashMap, future::Future, pin::Pin};

use serde_json::Value;

use super::query::ViewQuery;
use super::response;
use crate::http::client::{self, RequestError};

pub type QueryFuture = Pin<Box<dyn Future<Output = Result<Vec<Value>, RequestError>> + Send>>;

/// Anything that can answer a view query with its rows.
pub trait QueryService: Send + Sync {
    /// Starts a query; the returned future owns everything it needs so it
    /// can be moved onto its own task.
    fn query(&self, url: &str, query: ViewQuery) -> QueryFuture;
}

/// Client for the vulcan0x GraphQL data service.
#[derive(Debug, Default, Clone)]
pub struct Vulcan0x;

impl QueryService for Vulcan0x {
    fn query(&self, url: &str, query: ViewQuery) -> QueryFuture {
        let url = url.to_string();
        Box::pin(async move { fetch_view(&url, &query).await })
    }
}

/// Posts a view query and returns the nodes of that view.
pub async fn fetch_view(url: &str, query: &ViewQuery) -> Result<Vec<Value>, RequestError> {
    let document = query.to_graphql();
    log::debug!("vulcan0x query to {}: {}", url, document);

    let body = request_body(&document)?;

    let resp = client::post::<response::QueryResponse>(
        url,
        HashMap::from([("Content-Type", "application/json")]),
        body,
    )
    .await?;

    extract_nodes(resp, &query.view)
}

// GraphQL over HTTP: the document travels as the `query` member of a JSON object.
fn request_body(document: &str) -> Result<Vec<u8>, RequestError> {
    serde_json::to_vec(&serde_json::json!({ "query": document }))
        .map_err(|e| RequestError::JsonError(e.to_string()))
}

// Pulls `data.<view>.nodes` out of the envelope, failing on the first reported error.
fn extract_nodes(resp: response::QueryResponse, view: &str) -> Result<Vec<Value>, RequestError> {
    if let Some(err) = resp.errors.first() {
        return Err(RequestError::QueryError(err.message.clone()));
    }

    let mut data = resp
        .data
        .ok_or_else(|| RequestError::Other("No data".into()))?;
    let view_data = data
        .remove(view)
        .ok_or_else(|| RequestError::Other(format!("Missing view {}", view)))?;

    serde_json::from_value::<response::ViewNodes>(view_data)
        .map(|v| v.nodes)
        .map_err(|e| RequestError::JsonError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> response::QueryResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn body_wraps_document_in_query() {
        let query = ViewQuery {
            view: "tradesAggregated".into(),
            options: serde_json::Map::new(),
            filter: json!({ "market": { "equalTo": "WETHDAI" } }),
            fields: vec!["date".into(), "open".into()],
            order_by: None,
        };

        let body = request_body(&query.to_graphql()).unwrap();
        let sent: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            sent,
            json!({
                "query": "{ tradesAggregated(filter: {market: {equalTo: \"WETHDAI\"}}) { nodes { date open } } }"
            })
        );
        assert_eq!(sent.as_object().unwrap().len(), 1);
    }

    #[test]
    fn extracts_view_nodes() {
        let resp = envelope(json!({
            "data": { "tradesAggregated": { "nodes": [{ "open": "1" }, { "open": "2" }] } }
        }));
        let nodes = extract_nodes(resp, "tradesAggregated").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1]["open"], "2");
    }

    #[test]
    fn first_error_wins() {
        let resp = envelope(json!({
            "data": null,
            "errors": [{ "message": "function does not exist" }, { "message": "other" }]
        }));
        match extract_nodes(resp, "tradesAggregated") {
            Err(RequestError::QueryError(msg)) => assert_eq!(msg, "function does not exist"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_view_is_an_error() {
        let resp = envelope(json!({ "data": { "allTrades": { "nodes": [] } } }));
        assert!(matches!(
            extract_nodes(resp, "tradesAggregated"),
            Err(RequestError::Other(_))
        ));
    }
}
