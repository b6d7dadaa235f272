//! File naming, image saving, and format conversion.

use std::path::Path;

use crate::error::PipelineError;
use crate::ports::GeneratedImage;

/// Extension used when neither the URL nor the MIME type tells us.
const FALLBACK_EXTENSION: &str = "webp";

/// Generate an output filename for one generated image.
///
/// Sanitizes the first 40 characters of the prompt to kebab-case and appends
/// a random UUID so concurrent jobs never collide.
#[must_use]
pub fn output_filename(prompt: &str, extension: &str) -> String {
    let sanitized = sanitize_for_filename(prompt, 40);
    format!("{sanitized}-{}.{extension}", uuid::Uuid::new_v4())
}

/// Sanitize a string for use in a filename.
///
/// Converts to lowercase, replaces non-alphanumeric chars with hyphens,
/// collapses consecutive hyphens, and trims to max length.
#[must_use]
pub fn sanitize_for_filename(input: &str, max_len: usize) -> String {
    let mut result = String::with_capacity(max_len);
    let mut last_was_hyphen = true; // Prevents leading hyphen

    for ch in input.chars().take(max_len * 2) {
        if result.len() >= max_len {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            result.push('-');
            last_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.is_empty() {
        "image".to_string()
    } else {
        result
    }
}

/// Pick a file extension: target format, then output URL path, then MIME type.
#[must_use]
pub fn image_extension(image: &GeneratedImage, target_format: Option<&str>) -> String {
    if let Some(format) = target_format {
        return format_extension(format).to_string();
    }
    let from_url = image.source_url.as_deref().and_then(|u| url::Url::parse(u).ok()).and_then(|u| {
        Path::new(u.path()).extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase)
    });
    from_url
        .or_else(|| mime_extension(&image.mime_type).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

fn mime_extension(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Get the file extension for an output format.
#[must_use]
pub fn format_extension(format: &str) -> &'static str {
    match format {
        "png" => "png",
        "webp" => "webp",
        // jpeg and any unknown format default to jpg
        _ => "jpg",
    }
}

/// Validate an output format name.
///
/// # Errors
///
/// Returns an error if the format is not recognized.
pub fn validate_format(format: &str) -> Result<(), String> {
    match format {
        "jpeg" | "png" | "webp" => Ok(()),
        _ => Err(format!("Unsupported format '{format}'. Valid: jpeg, png, webp")),
    }
}

/// Save raw image bytes to a file, converting format if one is requested.
///
/// # Errors
///
/// Returns an error if the file cannot be written or format conversion fails.
pub fn save_image(
    data: &[u8],
    source_mime: &str,
    target_format: Option<&str>,
    output_path: &Path,
) -> Result<(), PipelineError> {
    match target_format {
        Some(format) if !mime_matches_format(source_mime, format) => {
            convert_and_save(data, format, output_path)
        }
        _ => std::fs::write(output_path, data).map_err(PipelineError::Io),
    }
}

/// Check if a MIME type matches the requested output format.
fn mime_matches_format(mime: &str, format: &str) -> bool {
    matches!((mime, format), ("image/jpeg", "jpeg") | ("image/png", "png") | ("image/webp", "webp"))
}

/// Convert image bytes to the target format and save.
fn convert_and_save(
    data: &[u8],
    target_format: &str,
    output_path: &Path,
) -> Result<(), PipelineError> {
    let img = image::load_from_memory(data)
        .map_err(|e| PipelineError::ImageConversion(format!("Failed to decode image: {e}")))?;

    let image_format = match target_format {
        "jpeg" => image::ImageFormat::Jpeg,
        "png" => image::ImageFormat::Png,
        "webp" => image::ImageFormat::WebP,
        other => {
            return Err(PipelineError::ImageConversion(format!("Unsupported format: {other}")));
        }
    };

    // JPEG has no alpha channel.
    let img = if image_format == image::ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };

    img.save_with_format(output_path, image_format).map_err(|e| {
        PipelineError::ImageConversion(format!("Failed to save as {target_format}: {e}"))
    })
}
