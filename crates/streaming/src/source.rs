use std::future::Future;
use std::pin::Pin;

use foundation::geometry::{Feature, FeatureCollection};
use serde::Deserialize;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response.
    Network(String),
    /// The endpoint answered with a non-2xx status.
    Status(u16),
    /// The body was not a recognizable feed.
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {msg}"),
            FetchError::Status(code) => write!(f, "HTTP error: {code}"),
            FetchError::Decode(msg) => write!(f, "invalid response body: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Anything that can turn a request URL into features.
pub trait FeatureSource: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Vec<Feature>, FetchError>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedBody {
    // `pagination` and `meta` are ignored.
    Envelope { data: Vec<Feature> },
    Collection(FeatureCollection),
}

/// Accepts `{data: Feature[], pagination?, meta?}` or a bare `FeatureCollection`.
pub fn decode_feed(body: &[u8]) -> Result<Vec<Feature>, FetchError> {
    let parsed: FeedBody =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(match parsed {
        FeedBody::Envelope { data } => data,
        FeedBody::Collection(fc) => fc.features,
    })
}

/// REST endpoint source backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpFeatureSource {
    client: reqwest::Client,
}

impl HttpFeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl FeatureSource for HttpFeatureSource {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Vec<Feature>, FetchError>> {
        let url = url.to_string();
        Box::pin(async move {
            let resp = self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(FetchError::Status(resp.status().as_u16()));
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            decode_feed(&bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchError, decode_feed};

    #[test]
    fn decodes_envelope_with_pagination() {
        let body = br#"{
            "data": [
                {"type": "Feature", "id": "r1", "geometry": {"type": "Point", "coordinates": [106.8, -6.2]}, "properties": {"urgency": "critical"}}
            ],
            "pagination": {"page": 1, "total": 1}
        }"#;
        let features = decode_feed(body).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].property_str("urgency"), Some("critical"));
    }

    #[test]
    fn decodes_bare_feature_collection() {
        let body = br#"{"type": "FeatureCollection", "features": []}"#;
        assert!(decode_feed(body).unwrap().is_empty());
    }

    #[test]
    fn rejects_unrecognized_bodies() {
        assert!(matches!(decode_feed(b"{\"items\": []}"), Err(FetchError::Decode(_))));
        assert!(matches!(decode_feed(b"not json"), Err(FetchError::Decode(_))));
    }
}
