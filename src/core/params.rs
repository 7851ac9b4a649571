use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use tokio::fs;

use super::error::ImageGenError;

/// Accepted input image extensions
pub const VALID_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Remote API backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Api {
    Gpt,
    Gemini,
}

impl Api {
    pub fn name(&self) -> &'static str {
        match self {
            Api::Gpt => "gpt",
            Api::Gemini => "gemini",
        }
    }

    /// GPT accepts up to 4 reference images, Gemini up to 14
    pub fn max_input_images(&self) -> usize {
        match self {
            Api::Gpt => 4,
            Api::Gemini => 14,
        }
    }
}

/// Image quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }
}

/// Content moderation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Moderation {
    Auto,
    Low,
}

impl Moderation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Moderation::Auto => "auto",
            Moderation::Low => "low",
        }
    }
}

/// Requested output size: exact pixels ("1024x1024") or an aspect ratio ("16:9")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Pixels { width: u32, height: u32 },
    AspectRatio { horizontal: u32, vertical: u32 },
}

impl FromStr for ImageSize {
    type Err = ImageGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ImageGenError::InvalidSize(s.to_string());

        if let Some((w, h)) = s.split_once(['x', 'X']) {
            let width: u32 = w.trim().parse().map_err(|_| invalid())?;
            let height: u32 = h.trim().parse().map_err(|_| invalid())?;
            if width == 0 || height == 0 {
                return Err(invalid());
            }
            return Ok(ImageSize::Pixels { width, height });
        }

        if let Some((h, v)) = s.split_once(':') {
            let horizontal: u32 = h.trim().parse().map_err(|_| invalid())?;
            let vertical: u32 = v.trim().parse().map_err(|_| invalid())?;
            if horizontal == 0 || vertical == 0 {
                return Err(invalid());
            }
            return Ok(ImageSize::AspectRatio {
                horizontal,
                vertical,
            });
        }

        Err(invalid())
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSize::Pixels { width, height } => write!(f, "{width}x{height}"),
            ImageSize::AspectRatio {
                horizontal,
                vertical,
            } => write!(f, "{horizontal}:{vertical}"),
        }
    }
}

/// An input image loaded into memory
#[derive(Debug, Clone)]
pub struct InputImage {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl InputImage {
    /// Filename to present to the remote API
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string())
    }
}

/// A single image returned by a backend
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Raw options collected from the command line
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub prompt: Option<String>,
    pub prompt_file: Option<PathBuf>,
    pub images: Vec<PathBuf>,
    pub size: String,
    pub quality: Quality,
    pub count: u32,
    pub transparent: bool,
    pub moderation: Moderation,
    pub api: Api,
}

/// Validated, backend-agnostic request. Built once per invocation and
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub input_images: Vec<InputImage>,
    pub size: ImageSize,
    pub quality: Quality,
    pub count: u32,
    pub transparent: bool,
    pub moderation: Moderation,
}

impl GenerationRequest {
    pub async fn from_options(opts: RequestOptions) -> Result<Self, ImageGenError> {
        let prompt = resolve_prompt(opts.prompt, opts.prompt_file).await?;

        if opts.count == 0 {
            return Err(ImageGenError::InvalidCount);
        }

        let size: ImageSize = opts.size.parse()?;

        let limit = opts.api.max_input_images();
        if opts.images.len() > limit {
            return Err(ImageGenError::TooManyImages {
                api: opts.api.name(),
                limit,
            });
        }

        let mut input_images = Vec::with_capacity(opts.images.len());
        for path in opts.images {
            if !path.exists() {
                return Err(ImageGenError::InputNotFound(path));
            }
            if !has_valid_extension(&path) {
                return Err(ImageGenError::InvalidImageFormat(path));
            }
            let bytes = fs::read(&path).await.map_err(|source| {
                ImageGenError::InputUnreadable {
                    path: path.clone(),
                    source,
                }
            })?;
            input_images.push(InputImage {
                mime_type: mime_type_for(&path),
                path,
                bytes,
            });
        }

        Ok(Self {
            prompt,
            input_images,
            size,
            quality: opts.quality,
            count: opts.count,
            transparent: opts.transparent,
            moderation: opts.moderation,
        })
    }

    /// Original paths of the input images, in positional order
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.input_images.iter().map(|i| i.path.clone()).collect()
    }
}

/// Combine `-p` text and prompt-file contents; both present means both are
/// sent, `-p` text first.
async fn resolve_prompt(
    prompt: Option<String>,
    prompt_file: Option<PathBuf>,
) -> Result<String, ImageGenError> {
    let file_text = match prompt_file {
        Some(path) => {
            if !path.exists() {
                return Err(ImageGenError::PromptFileNotFound(path));
            }
            let text = fs::read_to_string(&path).await.map_err(|source| {
                ImageGenError::PromptFileUnreadable { path, source }
            })?;
            Some(text.trim().to_string())
        }
        None => None,
    };

    let combined = match (prompt, file_text) {
        (Some(p), Some(f)) if !p.trim().is_empty() && !f.is_empty() => {
            format!("{}\n\n{}", p.trim(), f)
        }
        (Some(p), Some(f)) => {
            let p = p.trim().to_string();
            if p.is_empty() {
                f
            } else {
                p
            }
        }
        (Some(p), None) => p.trim().to_string(),
        (None, Some(f)) => f,
        (None, None) => String::new(),
    };

    if combined.is_empty() {
        return Err(ImageGenError::MissingPrompt);
    }
    Ok(combined)
}

fn has_valid_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VALID_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
