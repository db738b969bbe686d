pub mod boot;
pub mod completions;
pub mod cut;
pub mod list;

use indicatif::{ProgressBar, ProgressStyle};
use rapidos_config::Config;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;

/// Where and how to load `rapidos.conf` for commands that need it.
pub struct ConfArgs<'a> {
    pub path: &'a Path,
    pub overlay: &'a BTreeMap<String, String>,
    pub debug: bool,
}

impl ConfArgs<'_> {
    pub fn load(&self) -> Result<Config, String> {
        Config::parse(self.path, self.overlay, self.debug).map_err(|e| format!("config error: {e}"))
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Spinners only make sense on an interactive terminal; with debug output
/// enabled they would interleave with log lines.
pub fn wants_spinner(debug: bool) -> bool {
    !debug && console::user_attended_stderr()
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}
