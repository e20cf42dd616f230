// Output formatting and styling

use colored::Colorize;
use stencil_engine::{GenerationReport, RunStatus};

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    /// Format success message
    pub fn success(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✓".green().bold(), msg)
        } else {
            format!("✓ {}", msg)
        }
    }

    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    /// Format a prompt question
    pub fn prompt(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} ", msg.cyan())
        } else {
            format!("{} ", msg)
        }
    }
}

/// Print an error to stderr
pub fn print_error(msg: &str) {
    let style = OutputStyle::default();
    eprintln!("{}", style.error(msg));
}

/// Print the outcome of a generation or update run
pub fn print_report(report: &GenerationReport) {
    let style = OutputStyle::default();

    for path in &report.written {
        println!("{}", style.success(&format!("wrote    {}", path)));
    }
    for path in &report.skipped {
        println!("  kept     {}", path);
    }
    for path in &report.orphaned {
        println!("{}", style.warning(&format!("orphaned {} (no longer templated)", path)));
    }
    for conflict in &report.conflicts {
        println!("{}", style.warning(&format!("conflict {}", conflict.path)));
    }
    for failure in &report.failures {
        println!(
            "{}",
            style.error(&format!("failed   {}: {}", failure.path, failure.message))
        );
    }

    let summary = report.summary();
    match report.status() {
        RunStatus::Clean => println!("{}", style.success(&summary)),
        RunStatus::CompletedWithConflicts => {
            println!("{}", style.warning(&summary));
            println!("resolve the conflicts above, then re-run update");
        }
        RunStatus::Failed => println!("{}", style.error(&summary)),
    }
}
