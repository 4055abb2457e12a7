//! On-disk artifacts for a Predict action.
//!
//! Two PNG files are (over)written in the output directory on every action:
//!
//! - `prediction_text.png`: the prediction sentence
//! - `shap_force_plot.png`: the additive force chart of the explanation
//!
//! Drawing goes through Plotters' bitmap backend with the embedded font from
//! `fonts`, so no system font library is needed.

pub mod fonts;
pub mod force;

pub use fonts::{register_fonts, FONT_FAMILY};
pub use force::*;

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::domain::PipelineRun;
use crate::error::PipelineError;
use crate::report::format_prediction_line;
use crate::schema::FeatureSchema;

pub const PREDICTION_TEXT_FILE: &str = "prediction_text.png";
pub const FORCE_PLOT_FILE: &str = "shap_force_plot.png";

/// Rows shown in the force chart before the rest are merged.
pub const FORCE_PLOT_ROWS: usize = 10;

fn render_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Render(e.to_string())
}

/// Write `line` as a single-sentence PNG image sized to the text.
pub fn render_prediction_text(path: &Path, line: &str) -> Result<(), PipelineError> {
    register_fonts()?;
    let font = (FONT_FAMILY, 24).into_font();
    let (text_width, _) = font.box_size(line).map_err(render_err)?;
    let width = (text_width + 60).max(400);

    let root = BitMapBackend::new(path, (width, 80)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    root.draw(&Text::new(line.to_string(), (30, 28), font.color(&BLACK)))
        .map_err(render_err)?;
    root.present().map_err(render_err)?;
    Ok(())
}

/// Write the force chart for `layout` as PNG.
pub fn render_force_plot(path: &Path, layout: &ForceLayout) -> Result<(), PipelineError> {
    register_fonts()?;
    let height = 120 + 40 * layout.rows() as u32;
    let root = BitMapBackend::new(path, (1000, height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    draw_force_chart(&root, layout, &ForceTheme::bitmap()).map_err(render_err)?;
    root.present().map_err(render_err)?;
    Ok(())
}

/// Write both artifacts for `run` into `out_dir` and return the paths written.
///
/// Without an explanation only the text is written, and a force plot left over
/// from an earlier action is removed so it cannot be mistaken for this one.
pub fn write_artifacts(
    out_dir: &Path,
    run: &PipelineRun,
    schema: &FeatureSchema,
) -> Result<Vec<PathBuf>, PipelineError> {
    std::fs::create_dir_all(out_dir).map_err(|e| {
        PipelineError::Render(format!("cannot create '{}': {e}", out_dir.display()))
    })?;

    let mut written = Vec::with_capacity(2);

    let text_path = out_dir.join(PREDICTION_TEXT_FILE);
    render_prediction_text(&text_path, &format_prediction_line(&run.prediction))?;
    written.push(text_path);

    let plot_path = out_dir.join(FORCE_PLOT_FILE);
    match &run.explanation {
        Ok(explanation) => {
            let layout = ForceLayout::new(explanation, schema, FORCE_PLOT_ROWS);
            render_force_plot(&plot_path, &layout)?;
            written.push(plot_path);
        }
        Err(_) => match std::fs::remove_file(&plot_path) {
            Ok(()) => tracing::debug!(path = %plot_path.display(), "removed stale force plot"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(render_err(e)),
        },
    }

    for path in &written {
        tracing::debug!(path = %path.display(), "wrote artifact");
    }
    Ok(written)
}
