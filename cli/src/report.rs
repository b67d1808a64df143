use chrono::Local;
use console::style;
use fanout_core::{CopySummary, InvalidInput};
use indicatif::{ProgressBar, ProgressStyle};

/// Terminal presentation of a run: timestamped log lines above a progress
/// bar, then a summary block the operator acknowledges by reading.
pub struct Reporter {
    bar: ProgressBar,
    json: bool,
    #[cfg(test)]
    captured: std::sync::Mutex<Vec<String>>,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        let bar = if json {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}%")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        };
        Self {
            bar,
            json,
            #[cfg(test)]
            captured: Default::default(),
        }
    }

    /// Log lines shown so far, in order.
    #[cfg(test)]
    pub fn captured(&self) -> Vec<String> {
        self.captured.lock().unwrap().clone()
    }

    pub fn log_line(&self, text: &str) {
        #[cfg(test)]
        self.captured.lock().unwrap().push(text.to_string());

        let stamp = Local::now().format("%H:%M:%S");
        if self.json {
            eprintln!("[{stamp}] {text}");
        } else {
            self.bar.println(format!("{} {}", style(format!("[{stamp}]")).dim(), text));
        }
    }

    pub fn progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    pub fn invalid_input(&self, err: &InvalidInput) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", style("cannot start:").red().bold(), err);
    }

    pub fn abandoned(&self) {
        self.bar.finish_and_clear();
        eprintln!("{}", style("copy still in progress, exiting without waiting for it").yellow());
    }

    pub fn summary(&self, summary: &CopySummary) -> anyhow::Result<()> {
        self.bar.finish_and_clear();

        if self.json {
            println!("{}", serde_json::to_string_pretty(summary)?);
            return Ok(());
        }

        let heading = if summary.succeeded_overall {
            style("copy finished").green().bold()
        } else {
            style("copy failed").red().bold()
        };
        println!();
        println!("{heading}");
        for line in summary_lines(summary) {
            println!("  {line}");
        }
        Ok(())
    }
}

fn summary_lines(summary: &CopySummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.total > 0 {
        lines.push(format!("successful: {}", summary.successful));
        lines.push(format!("skipped:    {}", summary.skipped));
        lines.push(format!("failed:     {}", summary.failed));
        lines.push(format!("total:      {}", summary.total));
    }
    if summary.cancelled {
        lines.push(format!("stopped after {} of {}", summary.processed(), summary.total));
    }
    if let Some(reason) = summary.reason() {
        lines.push(format!("reason: {reason}"));
    }
    lines
}
