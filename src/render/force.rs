//! Additive force chart: data prep and backend-agnostic drawing.
//!
//! The chart reads bottom to top. It starts at the base value and stacks one
//! bar per feature (smallest contribution first, largest last), so the top bar
//! ends exactly at the explained output. Features beyond `max_rows` are merged
//! into a single "other features" bar.
//!
//! `draw_force_chart` is generic over the Plotters backend: the PNG artifact and
//! the terminal widget draw the same chart with a different `ForceTheme`.

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

use crate::explain::ExplanationResult;
use crate::render::fonts::FONT_FAMILY;
use crate::schema::FeatureSchema;

/// One stacked bar in margin space.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceBar {
    pub label: String,
    pub shap: f64,
    /// Where the bar starts (the running total before this feature).
    pub start: f64,
    /// `start + shap`.
    pub end: f64,
}

/// Render-ready description of a force chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceLayout {
    pub base_value: f64,
    pub output_value: f64,
    /// Bottom to top.
    pub bars: Vec<ForceBar>,
    /// Padded x range covering every bar and both markers.
    pub x_bounds: [f64; 2],
}

impl ForceLayout {
    /// Build the layout for one explanation.
    ///
    /// Features with a zero attribution are left out.
    pub fn new(explanation: &ExplanationResult, schema: &FeatureSchema, max_rows: usize) -> Self {
        let max_rows = max_rows.max(1);
        let ranked: Vec<_> = explanation
            .ranked()
            .into_iter()
            .filter(|a| a.shap != 0.0)
            .collect();

        let (shown, rest) = ranked.split_at(ranked.len().min(max_rows));

        // (label, shap) pairs, largest first.
        let mut rows: Vec<(String, f64)> = shown
            .iter()
            .map(|a| {
                let value = match schema.index_of(&a.name).and_then(|i| schema.get(i)) {
                    Some(descriptor) => descriptor.format_value(a.value),
                    None => format!("{}", a.value),
                };
                (format!("{} = {value}", a.name), a.shap)
            })
            .collect();
        if !rest.is_empty() {
            let total: f64 = rest.iter().map(|a| a.shap).sum();
            rows.push((format!("{} other features", rest.len()), total));
        }

        let mut bars = Vec::with_capacity(rows.len());
        let mut acc = explanation.base_value;
        for (label, shap) in rows.into_iter().rev() {
            let start = acc;
            acc += shap;
            bars.push(ForceBar {
                label,
                shap,
                start,
                end: acc,
            });
        }

        let output_value = explanation.output_value();
        let x_bounds = padded_bounds(
            bars.iter()
                .flat_map(|b| [b.start, b.end])
                .chain([explanation.base_value, output_value]),
        );

        Self {
            base_value: explanation.base_value,
            output_value,
            bars,
            x_bounds,
        }
    }

    /// Number of chart rows (at least one, so an empty chart still has a frame).
    pub fn rows(&self) -> usize {
        self.bars.len().max(1)
    }
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !(lo.is_finite() && hi.is_finite()) {
        return [-1.0, 1.0];
    }
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.1 } else { 0.5 };
    [lo - pad, hi + pad]
}

/// Colors, sizes and options for one rendering target.
#[derive(Debug, Clone, Copy)]
pub struct ForceTheme {
    /// Bars that push the output up.
    pub positive: RGBColor,
    /// Bars that push the output down.
    pub negative: RGBColor,
    /// Axes, markers and labels.
    pub ink: RGBColor,
    pub font_size: u32,
    pub margin: u32,
    pub x_label_area: u32,
    /// Extra room to the right of the bars for their labels, as a share of the x span.
    pub label_room: f64,
    pub caption: bool,
}

impl ForceTheme {
    /// Full-size PNG artifact.
    pub fn bitmap() -> Self {
        Self {
            positive: RGBColor(255, 0, 81),
            negative: RGBColor(0, 139, 251),
            ink: BLACK,
            font_size: 14,
            margin: 20,
            x_label_area: 40,
            label_room: 0.6,
            caption: true,
        }
    }

    /// Low-resolution terminal cells: compact labels, high contrast.
    pub fn terminal() -> Self {
        Self {
            positive: RGBColor(255, 0, 0),
            negative: RGBColor(0, 255, 255),
            ink: WHITE,
            font_size: 10,
            margin: 1,
            x_label_area: 3,
            label_room: 0.8,
            caption: false,
        }
    }
}

/// Draw `layout` onto any Plotters drawing area.
pub fn draw_force_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    layout: &ForceLayout,
    theme: &ForceTheme,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let [x0, x1] = layout.x_bounds;
    let x1 = x1 + (x1 - x0) * theme.label_room;
    let rows = layout.rows() as f64;

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(theme.margin)
        .set_label_area_size(LabelAreaPosition::Bottom, theme.x_label_area);
    if theme.caption {
        builder.caption(
            format!(
                "f(x) = {:+.3}   base value = {:+.3}",
                layout.output_value, layout.base_value
            ),
            (FONT_FAMILY, theme.font_size + 4).into_font().color(&theme.ink),
        );
    }
    let mut chart = builder.build_cartesian_2d(x0..x1, 0f64..rows)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .disable_y_axis()
        .x_labels(5)
        .x_desc("model output (margin)")
        .x_label_formatter(&|v| format!("{v:.2}"))
        .label_style((FONT_FAMILY, theme.font_size).into_font().color(&theme.ink))
        .axis_style(&theme.ink)
        .draw()?;

    chart.draw_series(layout.bars.iter().enumerate().map(|(i, bar)| {
        let y = i as f64;
        let color = if bar.shap >= 0.0 {
            theme.positive
        } else {
            theme.negative
        };
        Rectangle::new(
            [
                (bar.start.min(bar.end), y + 0.15),
                (bar.start.max(bar.end), y + 0.85),
            ],
            color.filled(),
        )
    }))?;

    let label_style = (FONT_FAMILY, theme.font_size).into_font().color(&theme.ink);
    let gap = (x1 - x0) * 0.01;
    chart.draw_series(layout.bars.iter().enumerate().map(|(i, bar)| {
        Text::new(
            format!("{} ({:+.3})", bar.label, bar.shap),
            (bar.start.max(bar.end) + gap, i as f64 + 0.75),
            label_style.clone(),
        )
    }))?;

    // Base value and output markers.
    chart.draw_series(LineSeries::new(
        [(layout.base_value, 0.0), (layout.base_value, rows)],
        &theme.ink,
    ))?;
    chart.draw_series(LineSeries::new(
        [(layout.output_value, 0.0), (layout.output_value, rows)],
        &theme.positive,
    ))?;

    Ok(())
}
