//! Tracing initialization and event formatting for stdout sinks.

use std::io::IsTerminal;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::event_bus::Event;

const STEP_COLOR: &str = "\x1b[36m"; // cyan
const DIAG_COLOR: &str = "\x1b[35m"; // magenta
const RESET_COLOR: &str = "\x1b[0m";

/// Install the global tracing subscriber: `RUST_LOG`-driven filtering, fmt
/// output, and span traces on errors. Call once at program start; repeated
/// calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(ErrorLayer::default())
        .try_init();
}

/// Color mode for rendered events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Detect TTY capability via `stderr.is_terminal()`.
    #[default]
    Auto,
    Colored,
    Plain,
}

impl FormatterMode {
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Renders bus events to a single output line.
pub trait EventFormatter: Send + Sync {
    fn render(&self, event: &Event) -> String;
}

/// Plain text formatter with optional ANSI colors.
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }
}

impl EventFormatter for PlainFormatter {
    fn render(&self, event: &Event) -> String {
        let line = format!("[{}] {event}", event.scope_label());
        if self.mode.is_colored() {
            let color = match event {
                Event::Step(_) => STEP_COLOR,
                Event::Diagnostic(_) => DIAG_COLOR,
            };
            format!("{color}{line}{RESET_COLOR}")
        } else {
            line
        }
    }
}

/// JSON-lines formatter for machine-readable sinks.
#[derive(Default)]
pub struct JsonFormatter;

impl EventFormatter for JsonFormatter {
    fn render(&self, event: &Event) -> String {
        event
            .to_json_string()
            .unwrap_or_else(|_| format!("{{\"message\":{:?}}}", event.message()))
    }
}
