//! Output formatting for operator-facing commands.
//!
//! Every summary the tool prints goes through this module so deploy,
//! status, backup and restore all read the same way.

use owo_colors::OwoColorize;

/// Status level for a reported line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    /// Hard failure
    Critical,
    /// Tolerated, but worth attention
    Warning,
    Info,
    Success,
}

impl StatusLevel {
    /// Icon for this status level.
    pub fn icon(&self, use_color: bool) -> String {
        if use_color {
            match self {
                StatusLevel::Critical => "✗".red().to_string(),
                StatusLevel::Warning => "⚠".yellow().to_string(),
                StatusLevel::Info => "·".blue().to_string(),
                StatusLevel::Success => "✓".green().to_string(),
            }
        } else {
            match self {
                StatusLevel::Critical => "FAIL".to_string(),
                StatusLevel::Warning => "WARN".to_string(),
                StatusLevel::Info => "INFO".to_string(),
                StatusLevel::Success => "OK".to_string(),
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusLevel::Critical => "CRITICAL",
            StatusLevel::Warning => "WARNING",
            StatusLevel::Info => "INFO",
            StatusLevel::Success => "OK",
        }
    }
}

/// A titled block of status lines.
pub struct Section {
    title: String,
    lines: Vec<(StatusLevel, String)>,
    use_color: bool,
}

impl Section {
    pub fn new(title: impl Into<String>, use_color: bool) -> Self {
        Section {
            title: title.into(),
            lines: Vec::new(),
            use_color,
        }
    }

    pub fn add(&mut self, level: StatusLevel, line: impl Into<String>) {
        self.lines.push((level, line.into()));
    }

    /// Worst level present in the section.
    pub fn worst_level(&self) -> StatusLevel {
        let mut worst = StatusLevel::Success;
        for (level, _) in &self.lines {
            worst = match (worst, *level) {
                (_, StatusLevel::Critical) | (StatusLevel::Critical, _) => StatusLevel::Critical,
                (_, StatusLevel::Warning) | (StatusLevel::Warning, _) => StatusLevel::Warning,
                (current, _) => current,
            };
        }
        worst
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push('\n');
        if self.use_color {
            out.push_str(&self.title.bold().to_string());
        } else {
            out.push_str(&self.title);
        }
        out.push('\n');
        for (level, line) in &self.lines {
            out.push_str(&format!("  {} {}\n", level.icon(self.use_color), line));
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}
