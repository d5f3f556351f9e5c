//! Vision captioning client
//!
//! One `generateContent` call per image returns a short caption plus
//! department and issue tags as JSON. Failures of any kind produce
//! [`CaptionResult::unavailable`].

use crate::types::{CaptionResult, Captioner, CollaboratorError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const CAPTION_PROMPT: &str = r#"Analyze this civic issue image and provide:
1. A brief description (one sentence, 15-20 words)
2. Relevant tags. Include exactly one department tag and specific issue tags.

DEPARTMENT TAGS:
- municipality: garbage, sanitation, cleaning issues
- water_authority: water, drainage, sewage issues
- kseb: electricity, streetlight, power issues
- pwd: roads, potholes, infrastructure issues
- other: anything else

ISSUE TAGS:
- Garbage: garbage, trash, dumping, waste, litter, illegal_dumping, overflowing_bin, plastic_waste, food_waste, street_litter
- Water: water, leak, pipe, sewage, drain, drainage, flooding, waterlogging, drainage_issue
- Electrical: light, pole, wire, electricity, power, streetlight, transformer, cable, broken_streetlight
- Roads: road, pothole, tar, pavement, bridge, highway, footpath, road_damage, broken_infrastructure
- Other: graffiti, abandoned_vehicle, stray_animal, encroachment, noise

Return ONLY a JSON object in this exact format:
{"caption": "description here", "tags": ["department_tag", "issue_tag1", "issue_tag2"]}"#;

const DEFAULT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionPayload {
    caption: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Gemini-backed [`Captioner`]
pub struct GeminiCaptioner {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiCaptioner {
    pub fn new(
        endpoint: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        if api_key.is_none() {
            warn!("No captioner API key configured; captions will be unavailable");
        }

        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    async fn request(
        &self,
        image: &[u8],
        content_type: Option<&str>,
    ) -> Result<CaptionResult, CollaboratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CollaboratorError::NotConfigured("captioner API key".to_string()))?;

        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": content_type.unwrap_or(DEFAULT_MIME_TYPE),
                            "data": BASE64.encode(image),
                        }
                    },
                    { "text": CAPTION_PROMPT }
                ]
            }]
        });

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::InvalidResponse(format!(
                "captioner returned {}",
                status
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();

        parse_caption_text(&text)
    }
}

#[async_trait]
impl Captioner for GeminiCaptioner {
    async fn analyze(&self, image: &[u8], content_type: Option<&str>) -> CaptionResult {
        match self.request(image, content_type).await {
            Ok(result) => {
                debug!(caption = %result.caption, tags = ?result.tags, "Image captioned");
                result
            }
            Err(e) => {
                warn!(error = %e, "Captioning failed; continuing without caption");
                CaptionResult::unavailable()
            }
        }
    }
}

/// Parse model output, tolerating a Markdown code fence around the JSON
pub(crate) fn parse_caption_text(text: &str) -> Result<CaptionResult, CollaboratorError> {
    let payload: CaptionPayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| CollaboratorError::InvalidResponse(format!("caption JSON: {}", e)))?;

    let caption = payload.caption.trim().to_string();
    if caption.is_empty() {
        return Err(CollaboratorError::InvalidResponse(
            "empty caption".to_string(),
        ));
    }

    let tags = payload
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(CaptionResult { caption, tags })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

/// Captioner used in deployments without a vision provider
pub struct DisabledCaptioner;

#[async_trait]
impl Captioner for DisabledCaptioner {
    async fn analyze(&self, _image: &[u8], _content_type: Option<&str>) -> CaptionResult {
        CaptionResult::unavailable()
    }
}
