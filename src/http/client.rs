use reqwest::{self, RequestBuilder};
use serde::de::DeserializeOwned;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

// Shared HTTP client instance.
lazy_static::lazy_static! {
    static ref CLIENT: Arc<reqwest::Client> = Arc::new(reqwest::Client::new());
}

/// Custom error type for HTTP requests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("HTTP error: {0} returned {1}. Response body: {2}")]
    HttpError(reqwest::Url, u16, String),
    #[error("Error deserializing JSON: {0}")]
    JsonError(String),
    #[error("Query error: {0}")]
    QueryError(String),
    #[error("Other error: {0}")]
    Other(String),
}

/// POSTs `body` to the specified url and decodes the JSON response.
pub async fn post<T: DeserializeOwned>(
    path: &str,                   // Absolute url.
    headers: HashMap<&str, &str>, // Optional header parameters.
    body: Vec<u8>,                // Request payload.
) -> Result<T, RequestError> {
    let url = reqwest::Url::parse(path).map_err(|e| RequestError::Other(e.to_string()))?;

    // Construct the request
    let mut req: RequestBuilder = CLIENT.post(url.as_str()).body(body);
    for (k, v) in headers {
        req = req.header(k, v);
    }

    let response = req
        .send()
        .await
        .map_err(|e| RequestError::Other(e.to_string()))?;

    let status = response.status();

    // Handle non-success status codes.
    if !status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Other(e.to_string()))?;
        return Err(RequestError::HttpError(url, status.as_u16(), body));
    }

    // Deserialize the JSON response.
    response
        .json()
        .await
        .map_err(|e| RequestError::JsonError(e.to_string()))
}
