//! Embedded font for chart and artifact text.
//!
//! Plotters' `ab_glyph` text support only knows fonts registered at runtime, so
//! DejaVu Sans is compiled into the binary and registered under `FONT_FAMILY`.

use std::sync::OnceLock;

use plotters::style::{register_font, FontStyle};

use crate::error::PipelineError;

/// Family name every chart and artifact draws its text with.
pub const FONT_FAMILY: &str = "sans-serif";

static DEJAVU_SANS: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

static REGISTERED: OnceLock<bool> = OnceLock::new();

/// Register the embedded font. Later calls reuse the first outcome.
pub fn register_fonts() -> Result<(), PipelineError> {
    let registered = *REGISTERED
        .get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, DEJAVU_SANS).is_ok());
    if registered {
        Ok(())
    } else {
        Err(PipelineError::Render(
            "embedded font is not a valid TrueType font".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use plotters::style::IntoFont;

    use super::*;

    #[test]
    fn registered_font_lays_out_text() {
        register_fonts().unwrap();
        register_fonts().unwrap();
        let font = (FONT_FAMILY, 24).into_font();
        let (short, _) = font.box_size("AKI").unwrap();
        let (long, height) = font.box_size("predicted possibility of AKI").unwrap();
        assert!(short > 0 && height > 0);
        assert!(long > short);
    }
}
