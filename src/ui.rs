//! Terminal presentation.
//!
//! - `Ui::stage`: spinner (or plain line) around a named step
//! - `StatusLine`: the current prediction text, refreshed as it changes

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::prediction::PredictionReader;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    /// Mode from a `--ui` flag; terminal detection uses stderr.
    pub fn from_args(ui_flag: Option<&str>) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, std::io::stderr().is_terminal())
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    pub fn status_line(&self, reader: PredictionReader) -> StatusLine {
        let spinner = self.use_pretty().then(|| spinner("{spinner} {msg}"));
        StatusLine {
            reader,
            spinner,
            last_version: None,
        }
    }
}

fn spinner(template: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style =
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Shows the latest prediction. Call `refresh` from the interactive loop;
/// it only redraws when a new label has been published.
pub struct StatusLine {
    reader: PredictionReader,
    spinner: Option<ProgressBar>,
    last_version: Option<u64>,
}

impl StatusLine {
    /// Returns true when the display changed.
    pub fn refresh(&mut self) -> bool {
        let (label, version) = self.reader.latest_versioned();
        if self.last_version == Some(version) {
            return false;
        }
        self.last_version = Some(version);
        let text = one_line(&label.display);
        match &self.spinner {
            Some(spinner) => spinner.set_message(text),
            None => eprintln!("prediction: {}", text),
        }
        true
    }

    /// Print a message without tearing the status line.
    pub fn println(&self, message: &str) {
        match &self.spinner {
            Some(spinner) => spinner.println(message),
            None => eprintln!("{message}"),
        }
    }

    pub fn finish(self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}

/// Multi-line displays (top-2) are joined so they fit one terminal line.
fn one_line(display: &str) -> String {
    display.lines().collect::<Vec<_>>().join(" | ")
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
