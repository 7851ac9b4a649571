mod gemini;
mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use crate::config::Credentials;
use crate::core::{Api, GeneratedImage, GenerationRequest, ImageGenError};

/// Which remote operation a request maps to. Order of input images is
/// semantically meaningful, so edit mode passes them through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Generate,
    Edit,
}

impl RequestMode {
    pub fn of(request: &GenerationRequest) -> Self {
        if request.input_images.is_empty() {
            RequestMode::Generate
        } else {
            RequestMode::Edit
        }
    }
}

/// The closed set of supported backends, selected once at startup.
pub enum Backend {
    OpenAi(OpenAiBackend),
    Gemini(GeminiBackend),
}

impl Backend {
    pub fn new(api: Api, credentials: Credentials) -> Self {
        match api {
            Api::Gpt => Backend::OpenAi(OpenAiBackend::new(credentials)),
            Api::Gemini => Backend::Gemini(GeminiBackend::new(credentials)),
        }
    }

    /// Warnings for options the selected backend cannot honor. Unsupported
    /// options are warned about and ignored, never rejected.
    pub fn warnings(&self, request: &GenerationRequest) -> Vec<String> {
        match self {
            Backend::OpenAi(backend) => backend.warnings(request),
            Backend::Gemini(backend) => backend.warnings(request),
        }
    }

    /// Run the request against the remote API and collect the returned
    /// images, in response order.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedImage>, ImageGenError> {
        match self {
            Backend::OpenAi(backend) => backend.generate(request).await,
            Backend::Gemini(backend) => backend.generate(request).await,
        }
    }
}
