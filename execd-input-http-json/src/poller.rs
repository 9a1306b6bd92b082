//! Fetching JSON documents and turning them into points.

use std::collections::BTreeMap;

use anyhow::Context;
use execd_bridge_framework::Point;
use futures_util::Stream;
use serde_json::{Map, Value};

use crate::config::HttpConfig;

/// Build the point for one fetched document.
pub fn build_point(
    measurement: &str,
    tags: &BTreeMap<String, String>,
    document: &Value,
) -> execd_common::Result<Point> {
    Point::new(measurement)
        .tags(tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .json_fields(document)
}

/// Merge the documents returned by several URLs into one.
///
/// A single document is returned as is. Several documents must all be
/// objects; later keys replace earlier ones.
pub fn merge_documents(documents: Vec<Value>) -> anyhow::Result<Value> {
    if documents.len() == 1 {
        return Ok(documents.into_iter().next().unwrap_or(Value::Null));
    }

    let mut merged = Map::new();
    for (i, document) in documents.into_iter().enumerate() {
        match document {
            Value::Object(map) => merged.extend(map),
            other => anyhow::bail!(
                "response {} is not a JSON object and cannot be merged: {}",
                i + 1,
                other
            ),
        }
    }
    Ok(Value::Object(merged))
}

/// GET every configured URL and merge the responses.
pub async fn fetch(client: &reqwest::Client, urls: &[String]) -> anyhow::Result<Value> {
    let mut documents = Vec::with_capacity(urls.len());
    for url in urls {
        let document: Value = client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("GET {}", url))?
            .json()
            .await
            .with_context(|| format!("decoding JSON from {}", url))?;

        tracing::debug!(url = %url, response = %document, "HTTP response");
        documents.push(document);
    }
    merge_documents(documents)
}

/// The input's producer: one request round per advance.
///
/// The HTTP client is built on the first advance. A failed request ends the
/// producer with the error.
pub fn producer(config: HttpConfig) -> impl Stream<Item = anyhow::Result<Point>> {
    async_stream::try_stream! {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("building HTTP client")?;

        loop {
            let document = fetch(&client, &config.urls).await?;
            yield build_point(&config.measurement, &config.tags, &document)?;
        }
    }
}
