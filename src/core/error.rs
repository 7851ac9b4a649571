use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageGenError {
    #[error("a prompt is required: pass -p/--prompt or -f/--prompt-file")]
    MissingPrompt,

    #[error("prompt file not found: {}", .0.display())]
    PromptFileNotFound(PathBuf),

    #[error("failed to read prompt file {}: {source}", .path.display())]
    PromptFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("invalid image format: {} (supported: .png, .jpg, .jpeg, .webp)", .0.display())]
    InvalidImageFormat(PathBuf),

    #[error("failed to read input image {}: {source}", .path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("maximum of {limit} input images allowed for {api}")]
    TooManyImages { api: &'static str, limit: usize },

    #[error("invalid size {0:?}: expected WxH pixels or an aspect ratio like 16:9")]
    InvalidSize(String),

    #[error("count must be at least 1")]
    InvalidCount,

    #[error("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=<your-key>")]
    MissingOpenAiKey,

    #[error("GEMINI_API_KEY or GOOGLE_API_KEY environment variable not set. Set it with: export GEMINI_API_KEY=<your-key>")]
    MissingGeminiKey,

    #[error("{api} API error: {message}")]
    Api {
        api: &'static str,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("invalid {api} API response: {message}")]
    InvalidResponse { api: &'static str, message: String },

    #[error("generation refused: {0}")]
    GenerationRefused(String),

    #[error("no image data returned from the API")]
    EmptyResponse,

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ImageGenError {
    /// Process exit code: 2 for usage/config problems, 3 for remote API
    /// failures, 4 for write failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            ImageGenError::MissingPrompt
            | ImageGenError::PromptFileNotFound(_)
            | ImageGenError::PromptFileUnreadable { .. }
            | ImageGenError::InputNotFound(_)
            | ImageGenError::InvalidImageFormat(_)
            | ImageGenError::InputUnreadable { .. }
            | ImageGenError::TooManyImages { .. }
            | ImageGenError::InvalidSize(_)
            | ImageGenError::InvalidCount
            | ImageGenError::MissingOpenAiKey
            | ImageGenError::MissingGeminiKey => 2,
            ImageGenError::Api { .. }
            | ImageGenError::InvalidResponse { .. }
            | ImageGenError::GenerationRefused(_)
            | ImageGenError::EmptyResponse => 3,
            ImageGenError::Write { .. } => 4,
        }
    }
}
