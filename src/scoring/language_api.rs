//! Remote scorer for a `documents:analyzeSentiment`-style natural language API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Scorer;

pub struct LanguageApiScorer {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl LanguageApiScorer {
    pub fn new(endpoint: String, api_key: String) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("stream-sentiment/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building language api http client")?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    document: Document<'a>,
    encoding_type: &'static str,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resp {
    document_sentiment: Option<DocumentSentiment>,
}

#[derive(Deserialize)]
struct DocumentSentiment {
    score: f64,
}

fn request_body(text: &str) -> Req<'_> {
    Req {
        document: Document {
            kind: "PLAIN_TEXT",
            content: text,
        },
        encoding_type: "UTF8",
    }
}

fn parse_score(body: &str) -> Result<f64> {
    let resp: Resp = serde_json::from_str(body).context("parse analyzeSentiment response")?;
    let sentiment = resp
        .document_sentiment
        .context("response has no documentSentiment")?;
    super::clamp_score(sentiment.score)
}

#[async_trait::async_trait]
impl Scorer for LanguageApiScorer {
    async fn score(&self, text: &str) -> Result<f64> {
        let mut req = self.http.post(&self.endpoint).json(&request_body(text));
        if !self.api_key.is_empty() {
            req = req.query(&[("key", self.api_key.as_str())]);
        }

        let body = req
            .send()
            .await
            .context("analyzeSentiment request")?
            .error_for_status()
            .context("analyzeSentiment non-2xx")?
            .text()
            .await
            .context("read analyzeSentiment body")?;

        parse_score(&body)
    }

    fn name(&self) -> &'static str {
        "language_api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape_matches_api() {
        let v = serde_json::to_value(request_body("hello")).unwrap();
        assert_eq!(v["document"]["type"], "PLAIN_TEXT");
        assert_eq!(v["document"]["content"], "hello");
        assert_eq!(v["encodingType"], "UTF8");
    }

    #[test]
    fn parses_document_score() {
        let body = r#"{"documentSentiment":{"magnitude":0.8,"score":-0.4},"language":"en","sentences":[]}"#;
        assert_eq!(parse_score(body).unwrap(), -0.4);
    }

    #[test]
    fn missing_sentiment_is_error() {
        assert!(parse_score(r#"{"language":"en"}"#).is_err());
        assert!(parse_score("not json").is_err());
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(parse_score(r#"{"documentSentiment":{"score":1.5}}"#).unwrap(), 1.0);
    }
}
