use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::backend::Backend;
use crate::config::Credentials;
use crate::core::output::{resolve_output_paths, write_images};
use crate::core::{Api, GenerationRequest, ImageGenError, Moderation, Quality, RequestOptions};

#[derive(Parser)]
#[command(
    name = "imagegen",
    version,
    about = "Generate or edit images using OpenAI GPT or Google Gemini APIs",
    after_help = r#"SETUP:
  Set the API key for the backend you use:
    export OPENAI_API_KEY=your-key-here     (gpt, the default)
    export GEMINI_API_KEY=your-key-here     (gemini; GOOGLE_API_KEY also works)

EXAMPLES:
  Generate an image:
    imagegen -p "a lighthouse at dusk"
    imagegen -p "minimalist logo" --size 16:9 -q medium -n 3

  Edit or compose existing images:
    imagegen photo.jpg -p "make it look like a watercolor painting"
    imagegen style.jpg photo.jpg -p "repaint Image 2 in the style of Image 1" --api gemini

  Prompt from a file, explicit output:
    imagegen -f prompt.txt -o out.png"#
)]
pub struct Cli {
    /// Input images (referenced as Image 1, Image 2, etc. in the prompt)
    pub images: Vec<PathBuf>,

    /// Prompt describing the image or edit
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Path to a file containing the prompt
    #[arg(short = 'f', long)]
    pub prompt_file: Option<PathBuf>,

    /// API backend to use
    #[arg(long, value_enum, default_value_t = Api::Gpt)]
    pub api: Api,

    /// Output path (default: last input filename with _n suffix, or generated_n.png)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Image quality
    #[arg(short, long, value_enum, default_value_t = Quality::High)]
    pub quality: Quality,

    /// Output size, WxH pixels or an aspect ratio like 16:9
    #[arg(long, default_value = "1024x1024")]
    pub size: String,

    /// Number of variations to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// Generate with a transparent background (gpt only)
    #[arg(long)]
    pub transparent: bool,

    /// Content moderation level (gpt only)
    #[arg(long, value_enum, default_value_t = Moderation::Low)]
    pub moderation: Moderation,
}

pub async fn run(cli: Cli) -> Result<(), ImageGenError> {
    let api = cli.api;
    let output = cli.output;

    let request = GenerationRequest::from_options(RequestOptions {
        prompt: cli.prompt,
        prompt_file: cli.prompt_file,
        images: cli.images,
        size: cli.size,
        quality: cli.quality,
        count: cli.count,
        transparent: cli.transparent,
        moderation: cli.moderation,
        api,
    })
    .await?;

    // Credentials are checked before any request is built or sent
    let credentials = Credentials::for_api(api)?;
    let backend = Backend::new(api, credentials);

    for warning in backend.warnings(&request) {
        tracing::warn!("{warning}");
    }

    if request.input_images.is_empty() {
        println!("Generating image with {}...", api.name());
    } else {
        println!("Processing image edit with {}...", api.name());
        for (i, image) in request.input_images.iter().enumerate() {
            println!("  Image {}: {}", i + 1, image.path.display());
        }
    }

    let started = Instant::now();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Waiting for {}...", api.name()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = backend.generate(&request).await;

    match &result {
        Ok(images) => pb.finish_with_message(format!(
            "{} Received {} image(s)",
            "✓".green(),
            images.len()
        )),
        Err(_) => pb.finish_with_message(format!("{} Generation failed", "✗".red())),
    }

    let images = result?;
    if images.is_empty() {
        return Err(ImageGenError::EmptyResponse);
    }

    // The plan is sized to what actually came back, not to the requested count
    let plan = resolve_output_paths(output.as_deref(), &request.input_paths(), images.len());
    write_images(&plan, &images).await?;

    println!("Done in {:.1}s.", started.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_documented_surface() {
        let cli = Cli::try_parse_from(["imagegen", "-p", "a fox"]).unwrap();
        assert!(cli.images.is_empty());
        assert_eq!(cli.prompt.as_deref(), Some("a fox"));
        assert_eq!(cli.api, Api::Gpt);
        assert_eq!(cli.quality, Quality::High);
        assert_eq!(cli.size, "1024x1024");
        assert_eq!(cli.count, 1);
        assert!(!cli.transparent);
        assert_eq!(cli.moderation, Moderation::Low);
        assert!(cli.output.is_none());
    }

    #[test]
    fn positional_images_and_flags_parse() {
        let cli = Cli::try_parse_from([
            "imagegen",
            "style.jpg",
            "photo.jpg",
            "-p",
            "blend these",
            "--api",
            "gemini",
            "-q",
            "low",
            "--size",
            "16:9",
            "-n",
            "3",
            "--transparent",
            "--moderation",
            "auto",
            "-o",
            "out.png",
        ])
        .unwrap();
        assert_eq!(
            cli.images,
            vec![PathBuf::from("style.jpg"), PathBuf::from("photo.jpg")]
        );
        assert_eq!(cli.api, Api::Gemini);
        assert_eq!(cli.quality, Quality::Low);
        assert_eq!(cli.size, "16:9");
        assert_eq!(cli.count, 3);
        assert!(cli.transparent);
        assert_eq!(cli.moderation, Moderation::Auto);
        assert_eq!(cli.output, Some(PathBuf::from("out.png")));
    }

    #[test]
    fn prompt_file_flag_parses() {
        let cli = Cli::try_parse_from(["imagegen", "-f", "prompt.txt"]).unwrap();
        assert_eq!(cli.prompt_file, Some(PathBuf::from("prompt.txt")));
        assert!(cli.prompt.is_none());
    }

    #[test]
    fn out_of_set_values_are_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["imagegen", "-p", "x", "--api", "dalle"]).is_err());
        assert!(Cli::try_parse_from(["imagegen", "-p", "x", "-q", "ultra"]).is_err());
        assert!(Cli::try_parse_from(["imagegen", "-p", "x", "--moderation", "none"]).is_err());
    }
}
