use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use super::RequestMode;
use crate::config::Credentials;
use crate::core::{GeneratedImage, GenerationRequest, ImageGenError, ImageSize, Moderation, Quality};
use crate::http_client::HTTP_CLIENT;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
const API: &str = "gemini";

/// Aspect ratios the API accepts directly
const VALID_ASPECTS: [(u32, u32); 6] = [(1, 1), (16, 9), (9, 16), (4, 3), (3, 4), (21, 9)];

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Request body for the generateContent endpoint
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

/// Part of content (text or image)
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String, // base64 encoded
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    response_modalities: Vec<String>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

/// Response from the generateContent endpoint
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
    finish_message: Option<String>,
}

/// Error envelope from the API
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Gemini API client
pub struct GeminiBackend {
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            api_key: credentials.api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn warnings(&self, request: &GenerationRequest) -> Vec<String> {
        let mut warnings = Vec::new();
        if request.transparent {
            warnings.push(
                "--transparent is not supported: gemini cannot generate true alpha transparency"
                    .to_string(),
            );
        }
        if request.count > 1 {
            warnings.push(format!(
                "gemini generates one image per request; {} API calls will be made",
                request.count
            ));
        }
        warnings
    }

    /// One image per call, so count is simulated with sequential requests
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedImage>, ImageGenError> {
        let body = build_request(request);
        let mut images = Vec::new();
        for attempt in 1..=request.count {
            if request.count > 1 {
                tracing::info!("generating image {attempt}/{}", request.count);
            }
            let response = self.call(&body).await?;
            images.extend(extract_images(response)?);
        }
        Ok(images)
    }

    async fn call(
        &self,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ImageGenError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, DEFAULT_MODEL, self.api_key
        );
        tracing::debug!(
            "sending generate request to {}/models/{}:generateContent",
            self.base_url,
            DEFAULT_MODEL
        );

        let response = HTTP_CLIENT
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body_text = response.text().await.map_err(transport_error)?;
        tracing::debug!("response status: {status}");

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body_text)
                .map(|e| e.error.message)
                .unwrap_or(body_text);
            return Err(ImageGenError::Api {
                api: API,
                message: format!("{status}: {message}"),
                source: None,
            });
        }

        serde_json::from_str(&body_text).map_err(|err| ImageGenError::InvalidResponse {
            api: API,
            message: err.to_string(),
        })
    }
}

/// Single user content: the prompt text first, then each input image inline,
/// in positional order.
fn build_request(request: &GenerationRequest) -> GenerateContentRequest {
    let mut parts = vec![ContentPart::Text {
        text: request.prompt.clone(),
    }];
    for image in &request.input_images {
        parts.push(ContentPart::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.to_string(),
                data: BASE64.encode(&image.bytes),
            },
        });
    }

    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE".to_string()],
            image_config: ImageConfig {
                aspect_ratio: aspect_ratio_for(&request.size),
                image_size: image_size_for(request.quality).to_string(),
            },
        },
        safety_settings: safety_settings(request.moderation),
    }
}

fn extract_images(
    response: GenerateContentResponse,
) -> Result<Vec<GeneratedImage>, ImageGenError> {
    let mut images = Vec::new();

    for candidate in response.candidates.unwrap_or_default() {
        // Check for refusal/recitation before processing content
        if let Some(reason) = &candidate.finish_reason {
            if reason != "STOP" && reason != "MAX_TOKENS" {
                let message = candidate
                    .finish_message
                    .clone()
                    .unwrap_or_else(|| format!("generation stopped: {reason}"));
                tracing::warn!("generation refused: {reason} - {message}");
                return Err(ImageGenError::GenerationRefused(message));
            }
        }

        if let Some(content) = candidate.content {
            for part in content.parts {
                match part {
                    ContentPart::InlineData { inline_data } => {
                        let bytes = BASE64.decode(inline_data.data.as_bytes()).map_err(|err| {
                            ImageGenError::InvalidResponse {
                                api: API,
                                message: format!("bad base64 image payload: {err}"),
                            }
                        })?;
                        images.push(GeneratedImage {
                            bytes,
                            mime_type: inline_data.mime_type,
                        });
                    }
                    ContentPart::Text { text } => {
                        tracing::debug!("response text: {text}");
                    }
                }
            }
        }
    }

    Ok(images)
}

/// Map a requested size onto an aspect ratio the API accepts: a recognized
/// ratio token passes through, an unrecognized one falls back to 1:1, and a
/// pixel size maps to the closest accepted ratio.
fn aspect_ratio_for(size: &ImageSize) -> String {
    match size {
        ImageSize::AspectRatio {
            horizontal,
            vertical,
        } => {
            if VALID_ASPECTS.contains(&(*horizontal, *vertical)) {
                format!("{horizontal}:{vertical}")
            } else {
                "1:1".to_string()
            }
        }
        ImageSize::Pixels { width, height } => {
            let ratio = f64::from(*width) / f64::from(*height);
            let (h, v) = VALID_ASPECTS
                .iter()
                .copied()
                .min_by(|a, b| {
                    let da = (f64::from(a.0) / f64::from(a.1) - ratio).abs();
                    let db = (f64::from(b.0) / f64::from(b.1) - ratio).abs();
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or((1, 1));
            format!("{h}:{v}")
        }
    }
}

fn image_size_for(quality: Quality) -> &'static str {
    match quality {
        Quality::High => "4K",
        Quality::Medium => "2K",
        Quality::Low => "1K",
    }
}

fn safety_settings(moderation: Moderation) -> Vec<SafetySetting> {
    let threshold = match moderation {
        Moderation::Low => "OFF",
        Moderation::Auto => "BLOCK_ONLY_HIGH",
    };
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: category.to_string(),
            threshold: threshold.to_string(),
        })
        .collect()
}

fn transport_error(err: reqwest::Error) -> ImageGenError {
    ImageGenError::Api {
        api: API,
        message: err.to_string(),
        source: Some(err),
    }
}
