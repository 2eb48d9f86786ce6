use chrono::Local;
use openwindow_core::{AggregateReading, ComfortScore, PipelineError, Presenter};
use parking_lot::Mutex;
use tracing::info;

/// Terminal stand-in for a status bar item: prints a new line on every
/// successful pass and keeps the old one otherwise.
#[derive(Debug, Default)]
pub struct StatusLine {
    current: Mutex<Option<String>>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }
}

pub fn render(score: ComfortScore, reading: &AggregateReading) -> String {
    format!("{}  window score {score}  ({})", reading.label(), reading.condition)
}

impl Presenter for StatusLine {
    fn present(&self, score: ComfortScore, reading: &AggregateReading) {
        let line = render(score, reading);
        println!("[{}] {line}", Local::now().format("%H:%M:%S"));
        *self.current.lock() = Some(line);
    }

    fn report(&self, error: &PipelineError) {
        match self.current() {
            Some(line) => info!(kind = %error.kind(), "keeping status: {line}"),
            None => info!(kind = %error.kind(), "no status to show yet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> AggregateReading {
        AggregateReading {
            average_humidity: 50.0,
            average_temperature: 30.0,
            condition: "晴".into(),
        }
    }

    #[test]
    fn render_includes_label_and_score() {
        let line = render(ComfortScore::new(93), &reading());
        assert_eq!(line, "humidity: 50.0%  window score 93  (晴)");
    }

    #[test]
    fn errors_keep_previous_status() {
        let status = StatusLine::new();
        status.present(ComfortScore::new(93), &reading());
        status.report(&PipelineError::EmptySeries);

        assert_eq!(status.current().as_deref(), Some("humidity: 50.0%  window score 93  (晴)"));
    }

    #[test]
    fn errors_before_first_success_show_nothing() {
        let status = StatusLine::new();
        status.report(&PipelineError::NotFound("offline".into()));
        assert!(status.current().is_none());
    }
}
