use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
}

impl LogLine {
    fn trace(&self) {
        match self.level {
            Level::Info => tracing::info!("{}", self.message),
            Level::Warn => tracing::warn!("{}", self.message),
            Level::Error => tracing::error!("{}", self.message),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Where pipeline progress goes: straight to tracing, or over a channel to
/// whoever is waiting on a background run.
#[derive(Debug, Clone, Default)]
pub enum Reporter {
    #[default]
    Tracing,
    Channel(mpsc::UnboundedSender<LogLine>),
}

impl Reporter {
    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Level::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, message.into());
    }

    fn emit(&self, level: Level, message: String) {
        let line = LogLine { level, message };
        match self {
            Reporter::Tracing => line.trace(),
            Reporter::Channel(tx) => {
                // Receiver gone: nobody is listening, fall back to tracing.
                if let Err(mpsc::error::SendError(line)) = tx.send(line) {
                    line.trace();
                }
            }
        }
    }
}

/// Runs a blocking job on the blocking pool, streaming its log lines back
/// to the caller as they are produced. A failed job's error arrives as the
/// final `Error` line.
///
/// Returns whether the job succeeded.
pub async fn run_in_background<F>(job: F, mut on_line: impl FnMut(LogLine)) -> bool
where
    F: FnOnce(&Reporter) -> anyhow::Result<()> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();

    let handle = tokio::task::spawn_blocking(move || {
        let reporter = Reporter::Channel(tx);
        match job(&reporter) {
            Ok(()) => true,
            Err(e) => {
                reporter.error(format!("{e:#}"));
                false
            }
        }
    });

    // The sender lives inside the job; the loop ends once it is dropped.
    while let Some(line) = rx.recv().await {
        on_line(line);
    }

    match handle.await {
        Ok(ok) => ok,
        Err(e) => {
            on_line(LogLine {
                level: Level::Error,
                message: format!("background job aborted: {e}"),
            });
            false
        }
    }
}

/// Re-emits a line received from a background job through tracing.
pub fn forward(line: LogLine) {
    line.trace();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_arrive_in_order() {
        let mut seen = Vec::new();
        let ok = run_in_background(
            |log| {
                log.info("reading");
                log.warn("skipped one file");
                log.info("done");
                Ok(())
            },
            |line| seen.push(line.to_string()),
        )
        .await;

        assert!(ok);
        assert_eq!(seen, vec!["[INFO] reading", "[WARN] skipped one file", "[INFO] done"]);
    }

    #[tokio::test]
    async fn failure_is_the_last_line() {
        let mut seen = Vec::new();
        let ok = run_in_background(
            |log| {
                log.info("starting");
                anyhow::bail!("input folder missing")
            },
            |line| seen.push(line),
        )
        .await;

        assert!(!ok);
        let last = seen.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.message, "input folder missing");
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn panicking_job_reports_abort() {
        let mut seen = Vec::new();
        let ok = run_in_background(|_| panic!("boom"), |line| seen.push(line)).await;
        assert!(!ok);
        assert!(seen[0].message.starts_with("background job aborted"));
    }

    #[test]
    fn channel_reporter_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        Reporter::Channel(tx).warn("nobody listening");
    }
}
