//! Terminal output for batch events.

use std::io::{self, Write};

use anyhow::Result;
use batch_core::{BatchEvent, BatchView};
use batch_engine::BatchReport;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputMode {
    Text,
    Json,
}

pub(crate) struct Renderer {
    mode: OutputMode,
    total: usize,
}

impl Renderer {
    pub fn new(mode: OutputMode, total: usize) -> Self {
        Self { mode, total }
    }

    /// Prints one event. Text output is skipped when `changed` is false, JSON
    /// output mirrors every event.
    pub fn event(&self, event: &BatchEvent, view: &BatchView, changed: bool) -> Result<()> {
        let mut out = io::stdout().lock();
        match self.mode {
            OutputMode::Json => writeln!(out, "{}", serde_json::to_string(event)?)?,
            OutputMode::Text if !changed => {}
            OutputMode::Text => {
                if let Some(line) = self.text_line(event, view) {
                    writeln!(out, "{line}")?;
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self, report: &BatchReport) -> Result<()> {
        let mut out = io::stdout().lock();
        match self.mode {
            OutputMode::Json => {
                let summary = json!({
                    "event": "summary",
                    "state": report.final_state,
                    "finished": report.finished(),
                    "failed": report.failed(),
                    "not_started": report.not_started(),
                });
                writeln!(out, "{summary}")?;
            }
            OutputMode::Text => {
                let heading = if report.was_stopped() { "Stopped" } else { "Done" };
                writeln!(
                    out,
                    "{heading}: {} finished, {} error, {} not started",
                    report.finished(),
                    report.failed(),
                    report.not_started()
                )?;
            }
        }
        out.flush()?;
        Ok(())
    }

    fn text_line(&self, event: &BatchEvent, view: &BatchView) -> Option<String> {
        let (id, suffix) = match event {
            BatchEvent::ItemStarted { id, .. } | BatchEvent::ItemFinished { id, .. } => {
                let row = view.row(*id)?;
                (*id, row.status.label().to_string())
            }
            BatchEvent::ItemProgress { id, percent, .. } => (*id, format!("{percent:>3}%")),
            BatchEvent::BatchProgress { percent } => {
                let counts = view.counts();
                return Some(format!(
                    "Overall: {percent}% ({} finished, {} error, {} waiting)",
                    counts.finished, counts.failed, counts.waiting
                ));
            }
        };
        let title = &view.row(id)?.title;
        Some(format!("[{}/{}] {title}: {suffix}", id + 1, self.total))
    }
}
