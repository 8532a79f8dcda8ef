use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AiConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Rewrites a raw biography. May be slow; callers bound it with a timeout.
#[async_trait]
pub trait BioWriter: Send + Sync {
    async fn rewrite(&self, raw_bio: &str, profession: &str) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("build gemini http client")?;
        Ok(Self {
            http,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl BioWriter for GeminiClient {
    async fn rewrite(&self, raw_bio: &str, profession: &str) -> anyhow::Result<String> {
        let prompt = build_prompt(raw_bio, profession);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: &prompt }],
            }],
        };

        let res = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("gemini request")?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            warn!(%status, "gemini returned an error status");
            anyhow::bail!("Gemini request failed with {}: {}", status, truncate(&detail, 200));
        }

        let parsed: GenerateResponse = res.json().await.context("decode gemini response")?;
        let text = extract_text(parsed).context("Gemini returned an empty response.")?;
        debug!(chars = text.len(), "bio rewritten");
        Ok(text)
    }
}

fn build_prompt(raw_bio: &str, profession: &str) -> String {
    format!(
        "Act as a luxury brand strategist and elite portfolio copywriter.\n\
         Rewrite the raw bio of a {profession} into a professional, punchy portfolio summary \
         of 2-3 sentences. Start with impact. Keep a high-end, aspirational tone and write in \
         the third person.\n\n\
         Raw input: \"{raw_bio}\"\n\n\
         Return only the rewritten bio as plain text: no markdown, no quotes, no labels."
    )
}

fn extract_text(res: GenerateResponse) -> Option<String> {
    let joined: String = res
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    let cleaned = strip_fences(&joined);
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Models sometimes wrap plain answers in markdown fences or quotes anyway.
fn strip_fences(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```") {
        t = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        t = t.strip_suffix("```").unwrap_or(t);
        t = t.trim();
    }
    t.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(t)
        .trim()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
