pub mod error;
pub mod output;
pub mod params;

pub use error::ImageGenError;
pub use params::{
    Api, GeneratedImage, GenerationRequest, ImageSize, InputImage, Moderation, Quality,
    RequestOptions,
};
