use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::RequestMode;
use crate::config::Credentials;
use crate::core::{GeneratedImage, GenerationRequest, ImageGenError};
use crate::http_client::HTTP_CLIENT;

const BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-image-1.5";
const API: &str = "gpt";

/// Request body for POST /v1/images/generations
#[derive(Debug, Serialize)]
struct GenerationsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: String,
    quality: &'a str,
    background: &'a str,
    moderation: &'a str,
}

/// Response from /v1/images/generations and /v1/images/edits
#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    b64_json: Option<String>,
    url: Option<String>,
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

/// OpenAI Images API client
pub struct OpenAiBackend {
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            api_key: credentials.api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Every CLI option maps onto the Images API
    pub fn warnings(&self, _request: &GenerationRequest) -> Vec<String> {
        Vec::new()
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedImage>, ImageGenError> {
        let mode = RequestMode::of(request);
        let url = format!("{}/{}", self.base_url, endpoint(mode));
        tracing::debug!("POST {url}");

        let response = match mode {
            RequestMode::Generate => {
                let body = generation_body(request);
                HTTP_CLIENT
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(transport_error)?
            }
            RequestMode::Edit => {
                let form = edit_form(request)?;
                HTTP_CLIENT
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(transport_error)?
            }
        };

        self.decode_response(response).await
    }

    async fn decode_response(
        &self,
        response: reqwest::Response,
    ) -> Result<Vec<GeneratedImage>, ImageGenError> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        tracing::debug!("response status: {status}");

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ImageGenError::Api {
                api: API,
                message: format!("{status}: {message}"),
                source: None,
            });
        }

        let parsed: ImagesResponse =
            serde_json::from_str(&body).map_err(|err| ImageGenError::InvalidResponse {
                api: API,
                message: err.to_string(),
            })?;

        let mut images = Vec::with_capacity(parsed.data.len());
        for entry in parsed.data {
            images.push(self.decode_entry(entry).await?);
        }
        Ok(images)
    }

    /// GPT image models return base64; older models may return a URL instead
    async fn decode_entry(&self, entry: ImageEntry) -> Result<GeneratedImage, ImageGenError> {
        if let Some(b64) = entry.b64_json {
            let bytes = BASE64
                .decode(b64)
                .map_err(|err| ImageGenError::InvalidResponse {
                    api: API,
                    message: format!("bad base64 image payload: {err}"),
                })?;
            return Ok(GeneratedImage {
                bytes,
                mime_type: "image/png".to_string(),
            });
        }

        if let Some(url) = entry.url {
            tracing::debug!("downloading image from {url}");
            let response = HTTP_CLIENT.get(&url).send().await.map_err(transport_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ImageGenError::Api {
                    api: API,
                    message: format!("image download failed: {status}"),
                    source: None,
                });
            }
            let bytes = response.bytes().await.map_err(transport_error)?.to_vec();
            return Ok(GeneratedImage {
                bytes,
                mime_type: "image/png".to_string(),
            });
        }

        Err(ImageGenError::InvalidResponse {
            api: API,
            message: "image entry missing both b64_json and url".to_string(),
        })
    }
}

fn endpoint(mode: RequestMode) -> &'static str {
    match mode {
        RequestMode::Generate => "images/generations",
        RequestMode::Edit => "images/edits",
    }
}

fn generation_body(request: &GenerationRequest) -> GenerationsRequest<'_> {
    GenerationsRequest {
        model: DEFAULT_MODEL,
        prompt: &request.prompt,
        n: request.count,
        size: request.size.to_string(),
        quality: request.quality.as_str(),
        background: if request.transparent {
            "transparent"
        } else {
            "opaque"
        },
        moderation: request.moderation.as_str(),
    }
}

/// Multipart body for /v1/images/edits: one image[] part per input, in
/// positional order. Background and moderation are not accepted on edits.
fn edit_form(request: &GenerationRequest) -> Result<Form, ImageGenError> {
    let mut form = Form::new()
        .text("model", DEFAULT_MODEL)
        .text("prompt", request.prompt.clone())
        .text("n", request.count.to_string())
        .text("size", request.size.to_string())
        .text("quality", request.quality.as_str());

    for image in &request.input_images {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name())
            .mime_str(image.mime_type)
            .map_err(transport_error)?;
        form = form.part("image[]", part);
    }
    Ok(form)
}

fn transport_error(err: reqwest::Error) -> ImageGenError {
    ImageGenError::Api {
        api: API,
        message: err.to_string(),
        source: Some(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::request;

    #[test]
    fn endpoint_follows_request_mode() {
        assert_eq!(endpoint(RequestMode::Generate), "images/generations");
        assert_eq!(endpoint(RequestMode::Edit), "images/edits");
    }

    #[test]
    fn generation_body_carries_all_options() {
        let mut req = request(0);
        req.transparent = true;
        req.count = 2;

        let value = serde_json::to_value(generation_body(&req)).unwrap();

        assert_eq!(value["model"], "gpt-image-1.5");
        assert_eq!(value["prompt"], "a red fox");
        assert_eq!(value["n"], 2);
        assert_eq!(value["size"], "1024x1024");
        assert_eq!(value["quality"], "high");
        assert_eq!(value["background"], "transparent");
        assert_eq!(value["moderation"], "low");
    }

    #[test]
    fn opaque_background_without_transparent_flag() {
        let value = serde_json::to_value(generation_body(&request(0))).unwrap();
        assert_eq!(value["background"], "opaque");
    }

    #[test]
    fn edit_form_accepts_multiple_images() {
        let req = request(3);
        // form construction must not fail for valid mime types
        edit_form(&req).unwrap();
    }
}
