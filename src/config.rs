use std::env;

use crate::core::{Api, ImageGenError};

/// API credentials resolved from the environment, before any request is made
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    pub fn for_api(api: Api) -> Result<Self, ImageGenError> {
        let api_key = match api {
            Api::Gpt => non_empty_var("OPENAI_API_KEY").ok_or(ImageGenError::MissingOpenAiKey)?,
            // First found wins
            Api::Gemini => non_empty_var("GEMINI_API_KEY")
                .or_else(|| non_empty_var("GOOGLE_API_KEY"))
                .ok_or(ImageGenError::MissingGeminiKey)?,
        };
        Ok(Self { api_key })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
