use crate::models::LeechSummary;
use crate::traits::{ProgressReporter, ProgressUpdate};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Logs every update through `tracing`.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn chapter_started(&self, update: &ProgressUpdate) {
        info!("[LEECH] {}", update);
    }

    fn finished(&self, summary: &LeechSummary) {
        info!("[LEECH] {}", summary);
    }
}

/// Forwards progress text to a channel, for callers that drive a UI.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: UnboundedSender<String>,
}

impl ChannelReporter {
    pub fn new(sender: UnboundedSender<String>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelReporter {
    fn chapter_started(&self, update: &ProgressUpdate) {
        // A dropped receiver only means nobody is watching anymore.
        let _ = self.sender.send(update.to_string());
    }

    fn finished(&self, summary: &LeechSummary) {
        let _ = self.sender.send(summary.to_string());
    }
}

/// Terminal progress bar for the CLI.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl ProgressReporter for BarReporter {
    fn chapter_started(&self, update: &ProgressUpdate) {
        self.bar.set_position(update.index.saturating_sub(1) as u64);
        self.bar.set_message(update.title.clone());
    }

    fn finished(&self, summary: &LeechSummary) {
        // Chapters actually processed; a cancelled run stops short of `total`.
        self.bar
            .set_position((summary.success_count + summary.failed_count()) as u64);
        self.bar.finish_with_message(summary.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_reporter_sends_formatted_text() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = ChannelReporter::new(tx);

        reporter.chapter_started(&ProgressUpdate {
            index: 2,
            total: 3,
            title: "Chapter 2".to_string(),
        });
        reporter.finished(&LeechSummary {
            success_count: 3,
            total: 3,
            errors: Vec::new(),
            cancelled: false,
        });

        assert_eq!(rx.try_recv().unwrap(), "2/3: Chapter 2");
        assert_eq!(rx.try_recv().unwrap(), "Completed: 3 succeeded, 0 failed");
    }

    #[test]
    fn bar_stops_where_a_cancelled_run_stopped() {
        let bar = ProgressBar::hidden();
        bar.set_length(3);
        let reporter = BarReporter { bar };

        reporter.chapter_started(&ProgressUpdate {
            index: 1,
            total: 3,
            title: "Chapter 3".to_string(),
        });
        reporter.finished(&LeechSummary {
            success_count: 1,
            total: 3,
            errors: Vec::new(),
            cancelled: true,
        });

        assert_eq!(reporter.bar.position(), 1);
        assert!(reporter.bar.is_finished());
    }

    #[test]
    fn channel_reporter_tolerates_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelReporter::new(tx).chapter_started(&ProgressUpdate {
            index: 1,
            total: 1,
            title: "Chapter 1".to_string(),
        });
    }
}
