//! Renderer module: trait-based format dispatch.

pub mod json;
pub mod text;

use acr_syntax::{ParsedHeader, Record};
use anyhow::{anyhow, Result};

/// Renders parsed input of type `T` into one output format.
pub trait Renderer<T: ?Sized> {
    fn render(&self, input: &T) -> Result<String>;
}

/// Renderer for `acrparse header`.
pub fn header_renderer(format: &str) -> Result<Box<dyn Renderer<[ParsedHeader]>>> {
    match format {
        "json" => Ok(Box::new(json::JsonRenderer)),
        "summary" => Ok(Box::new(json::SummaryRenderer)),
        "text" => Ok(Box::new(text::TextRenderer)),
        _ => Err(anyhow!("unknown format: {format}. Use json, summary, or text")),
    }
}

/// Renderer for `acrparse ssim`.
pub fn record_renderer(format: &str) -> Result<Box<dyn Renderer<[Record]>>> {
    match format {
        "json" => Ok(Box::new(json::JsonRenderer)),
        "text" => Ok(Box::new(text::TextRenderer)),
        _ => Err(anyhow!("unknown format: {format}. Use json or text")),
    }
}
