use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICKS: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

fn style(template: &str) -> ProgressStyle {
    // templates are constants; a parse failure falls back to the plain default
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Single-line status for `lalibela upgrade`.
///
/// Yellow braille spinner while running, then a green `✔` or red `✘`
/// followed by the final message.
pub struct Status {
    pb: ProgressBar,
}

impl Status {
    pub fn start(msg: impl Into<String>) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(style("\x1b[33m{spinner}\x1b[0m {wide_msg}").tick_strings(TICKS));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(msg.into());
        Self { pb }
    }

    pub fn ok(self, msg: impl Into<String>) {
        self.pb.set_style(style("\x1b[32m✔\x1b[0m {wide_msg}"));
        self.pb.finish_with_message(msg.into());
    }

    pub fn fail(self, msg: impl Into<String>) {
        self.pb.set_style(style("\x1b[31m✘\x1b[0m {wide_msg}"));
        self.pb.finish_with_message(msg.into());
    }
}
