//! Ratatui-based terminal UI.
//!
//! The TUI is the AKI form: one row per schema feature (in schema order), a
//! Predict action, and a result panel with the prediction sentence and the
//! force chart of its explanation.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Terminal,
};

use crate::app::pipeline::Pipeline;
use crate::domain::{AppConfig, PipelineRun};
use crate::error::{AppError, EXIT_RUNTIME};
use crate::input::FormState;
use crate::render::ForceLayout;
use crate::report::format_prediction_line;
use crate::schema::FeatureKind;

mod force_chart;

use force_chart::{rows_for_height, ForceChart};

/// Start the TUI.
pub fn run(pipeline: Pipeline, config: AppConfig) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(pipeline, config);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode()
            .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(
                EXIT_RUNTIME,
                format!("Failed to enter alternate screen: {e}"),
            ));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    pipeline: Pipeline,
    config: AppConfig,
    form: FormState,
    selected: usize,
    /// Text typed for the selected numeric field, while editing.
    editing: Option<String>,
    status: String,
    run: Option<PipelineRun>,
}

impl App {
    fn new(pipeline: Pipeline, config: AppConfig) -> Self {
        let form = FormState::new(pipeline.schema());
        Self {
            pipeline,
            config,
            form,
            selected: 0,
            editing: None,
            status: "Adjust the features, then press p to predict.".to_string(),
            run: None,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read()
                .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Event read error: {e}")))?
            {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply one key press. Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.editing.is_some() {
            self.handle_edit(code);
            return false;
        }

        let last = self.pipeline.schema().len().saturating_sub(1);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => self.selected = (self.selected + 1).min(last),
            KeyCode::Left => self.form.step(self.pipeline.schema(), self.selected, -1),
            KeyCode::Right => self.form.step(self.pipeline.schema(), self.selected, 1),
            KeyCode::Enter => self.start_edit(),
            KeyCode::Char('r') => {
                self.form.reset(self.pipeline.schema());
                self.run = None;
                self.status = "Reset every feature to its default.".to_string();
            }
            KeyCode::Char('p') => self.predict(),
            _ => {}
        }
        false
    }

    fn start_edit(&mut self) {
        let Some(descriptor) = self.pipeline.schema().get(self.selected) else {
            return;
        };
        match descriptor.kind {
            FeatureKind::Numerical { .. } => {
                self.editing = Some(format!("{}", self.form.value(self.selected)));
                self.status = format!(
                    "Editing {} ({}). Enter to apply, Esc to cancel.",
                    descriptor.name,
                    descriptor.domain_label()
                );
            }
            FeatureKind::Categorical { .. } => {
                self.status = "Use ←/→ to choose an option.".to_string();
            }
        }
    }

    fn handle_edit(&mut self, code: KeyCode) {
        let Some(buffer) = self.editing.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.editing = None;
                self.status = "Edit canceled.".to_string();
            }
            KeyCode::Enter => {
                let text = buffer.trim().to_string();
                self.editing = None;
                self.apply_edit(&text);
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => {
                if c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E') {
                    buffer.push(c);
                }
            }
            _ => {}
        }
    }

    fn apply_edit(&mut self, text: &str) {
        let value = match text.parse::<f64>() {
            Ok(v) => v,
            Err(e) => {
                self.status = format!("Invalid number '{text}': {e}");
                return;
            }
        };
        let schema = self.pipeline.schema();
        match self.form.set_numeric(schema, self.selected, value) {
            Ok(stored) if stored != value => {
                self.status = format!("Clamped to {stored}.");
            }
            Ok(stored) => {
                self.status = format!("Set to {stored}.");
            }
            Err(err) => {
                self.status = err.to_string();
            }
        }
    }

    /// The Predict action: collect, infer, explain, write artifacts.
    fn predict(&mut self) {
        let vector = self.form.collect();
        let run = match self.pipeline.run(vector) {
            Ok(run) => run,
            Err(err) => {
                tracing::error!(error = %err, "prediction failed");
                self.run = None;
                self.status = format!("Prediction failed: {err}");
                return;
            }
        };

        let mut notes = Vec::new();
        if let Err(err) = &run.explanation {
            notes.push(format!("Explanation unavailable: {err}"));
        }
        if self.config.write_artifacts {
            match crate::render::write_artifacts(&self.config.out_dir, &run, self.pipeline.schema())
            {
                Ok(paths) => notes.push(format!(
                    "Wrote {} artifact(s) to {}",
                    paths.len(),
                    self.config.out_dir.display()
                )),
                Err(err) => {
                    tracing::error!(error = %err, "artifact write failed");
                    notes.push(err.to_string());
                }
            }
        }
        if let Some(path) = &self.config.export_json {
            let written = crate::report::write_prediction_json(
                path,
                &run,
                self.pipeline.schema(),
                &self.config.model_path,
            );
            if let Err(err) = written {
                notes.push(err.to_string());
            }
        }

        self.status = if notes.is_empty() {
            "Predicted.".to_string()
        } else {
            notes.join(" | ")
        };
        self.run = Some(run);
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let model = self.pipeline.model();
        let lines = vec![
            Line::from(vec![
                Span::styled("aki", Style::default().fg(Color::Cyan)),
                Span::raw(": acute kidney injury risk form"),
            ]),
            Line::from(Span::styled(
                format!(
                    "model: {} | {} trees | {} features",
                    self.config.model_path.display(),
                    model.trees.len(),
                    self.pipeline.schema().len(),
                ),
                Style::default().fg(Color::Gray),
            )),
        ];

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(60), Constraint::Min(0)])
            .split(area);

        self.draw_form(frame, chunks[0]);
        self.draw_result(frame, chunks[1]);
    }

    fn draw_form(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let schema = self.pipeline.schema();
        let items: Vec<ListItem> = schema
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let value = match &self.editing {
                    Some(buffer) if i == self.selected => format!("{buffer}▏"),
                    _ => d.format_value(self.form.value(i)),
                };
                ListItem::new(format!("{:<34} {:>12}  [{}]", d.name, value, d.domain_label()))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Features").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_result(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let Some(run) = &self.run else {
            let msg = Paragraph::new("Press p to predict.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().title("Prediction").borders(Borders::ALL));
            frame.render_widget(msg, area);
            return;
        };

        let line = Paragraph::new(format_prediction_line(&run.prediction))
            .style(Style::default().add_modifier(Modifier::BOLD))
            .block(Block::default().title("Prediction").borders(Borders::ALL));
        frame.render_widget(line, chunks[0]);

        let block = Block::default()
            .title("SHAP force plot")
            .borders(Borders::ALL);
        let inner = block.inner(chunks[1]);
        frame.render_widget(block, chunks[1]);
        frame.render_widget(Clear, inner);

        match &run.explanation {
            Ok(explanation) => {
                let rows = rows_for_height(inner.height);
                let layout = ForceLayout::new(explanation, self.pipeline.schema(), rows);
                frame.render_widget(ForceChart { layout: &layout }, inner);
            }
            Err(err) => {
                let msg = Paragraph::new(format!("Explanation unavailable: {err}"))
                    .style(Style::default().fg(Color::Red))
                    .wrap(Wrap { trim: true });
                frame.render_widget(msg, inner);
            }
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ adjust  Enter type value  p predict  r reset  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ensemble::tests::demo_model;
    use crate::render::{FORCE_PLOT_FILE, PREDICTION_TEXT_FILE};
    use crate::schema::FeatureSchema;
    use ratatui::backend::TestBackend;

    fn app(out_dir: &std::path::Path, write_artifacts: bool) -> App {
        let pipeline = Pipeline::new(FeatureSchema::aki().unwrap(), demo_model()).unwrap();
        let config = AppConfig {
            model_path: "assets/aki_xgboost.json".into(),
            schema_path: None,
            out_dir: out_dir.to_path_buf(),
            write_artifacts,
            export_json: None,
        };
        App::new(pipeline, config)
    }

    fn type_value(app: &mut App, text: &str) {
        app.handle_key(KeyCode::Enter);
        while app.editing.as_ref().is_some_and(|b| !b.is_empty()) {
            app.handle_key(KeyCode::Backspace);
        }
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Enter);
    }

    #[test]
    fn predict_at_defaults_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), true);
        assert!(!app.handle_key(KeyCode::Char('p')));

        let run = app.run.as_ref().unwrap();
        assert_eq!(run.prediction.class_id, 0);
        assert!(run.explanation.is_ok());
        assert!(dir.path().join(PREDICTION_TEXT_FILE).exists());
        assert!(dir.path().join(FORCE_PLOT_FILE).exists());
    }

    #[test]
    fn typed_values_are_clamped_to_the_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), false);
        app.handle_key(KeyCode::Down); // CRP
        type_value(&mut app, "9999");
        assert_eq!(app.form.value(1), 690.0);
        assert_eq!(app.status, "Clamped to 690.");

        type_value(&mut app, "-3");
        assert_eq!(app.form.value(1), 0.0);
    }

    #[test]
    fn invalid_typed_text_leaves_value_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), false);
        type_value(&mut app, "1e");
        assert_eq!(app.form.value(0), 5.0);
        assert!(app.status.starts_with("Invalid number"));
    }

    #[test]
    fn categorical_rows_cycle_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), false);
        for _ in 0..13 {
            app.handle_key(KeyCode::Down);
        }
        // Clamped at the last row.
        app.handle_key(KeyCode::Down);
        assert_eq!(app.selected, 13);

        app.handle_key(KeyCode::Left);
        assert_eq!(app.form.value(13), 3.0);
        app.handle_key(KeyCode::Enter);
        assert!(app.editing.is_none());

        app.handle_key(KeyCode::Char('p'));
        assert!(app.run.is_some());
        app.handle_key(KeyCode::Char('r'));
        assert_eq!(app.form.value(13), 1.0);
        assert!(app.run.is_none());
    }

    #[test]
    fn quit_keys_end_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), false);
        assert!(app.handle_key(KeyCode::Char('q')));
        assert!(app.handle_key(KeyCode::Esc));
    }

    #[test]
    fn draws_form_and_result_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), false);
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        app.handle_key(KeyCode::Char('p'));
        terminal.draw(|f| app.draw(f)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(text.contains("predicted possibility of AKI is 71.09%"));
        assert!(text.contains("Disease type"));
    }
}
