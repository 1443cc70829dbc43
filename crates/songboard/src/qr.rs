//! QR code for the submission link.

use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

use crate::config::QrConfig;
use crate::error::Result;

/// Path of the submission screen.
pub const REQUEST_PATH: &str = "/request";

/// Absolute URL of the submission screen for the given origin.
#[must_use]
pub fn submission_url(origin: &str) -> String {
    format!("{}{REQUEST_PATH}", origin.trim_end_matches('/'))
}

/// Render `data` as an SVG QR code with high error correction.
///
/// # Errors
///
/// Returns an error if the data is too long to encode.
pub fn render_svg(data: &str, style: &QrConfig) -> Result<String> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(style.size_px, style.size_px)
        .dark_color(svg::Color(&style.dark_color))
        .light_color(svg::Color(&style.light_color))
        .build())
}
