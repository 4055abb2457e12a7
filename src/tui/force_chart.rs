//! Plotters-powered force chart widget for Ratatui.
//!
//! The chart itself is drawn by `render::draw_force_chart`, the same routine
//! that writes `shap_force_plot.png`. Here it only gets the terminal theme and
//! a `plotters-ratatui-backend` drawing area.

use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::render::{draw_force_chart, register_fonts, ForceLayout, ForceTheme};

/// Render-only view of a prepared layout.
pub struct ForceChart<'a> {
    pub layout: &'a ForceLayout,
}

impl<'a> Widget for ForceChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to lay out a chart in a tiny area; show a hint instead.
        if area.width < 30 || area.height < 6 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        if let Err(err) = register_fonts() {
            buf.set_string(area.x, area.y, err.to_string(), Style::default().fg(Color::Red));
            return;
        }

        let [x0, x1] = self.layout.x_bounds;
        if !(x0.is_finite() && x1.is_finite()) || x1 <= x0 {
            return;
        }

        let layout = self.layout;
        let widget = widget_fn(move |root| {
            draw_force_chart(&root, layout, &ForceTheme::terminal())?;
            Ok(())
        });

        widget.render(area, buf);
    }
}

/// Rows that fit in a chart of `height` terminal cells.
pub fn rows_for_height(height: u16) -> usize {
    (usize::from(height.saturating_sub(4)) / 2).clamp(1, 10)
}
