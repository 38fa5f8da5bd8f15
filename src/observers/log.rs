//! # LogWriter: simple event printer
//!
//! A minimal observer that prints incoming [`PushEvent`]s to stdout.
//! Use it for test or demo.
//!
//! ## Example output
//! ```text
//! [INFO] pushing task=push-3 key=pushing(svc.example, 10.0.0.1:12200)
//! [INFO] push_succeeded task=push-3 span=12ms cleaned=true
//! [WARN] stuck_evicted task=push-9 key=pushing(svc.example, 10.0.0.1:12200)
//! [ERROR] push_timeout task=push-4 err="push invoke timed out after 500ms"
//! ```

use async_trait::async_trait;

use crate::events::{PushEvent, Severity};
use crate::observers::Observer;

/// Event writer observer.
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Observer for LogWriter {
    async fn on_event(&self, e: &PushEvent) {
        let level = match e.kind.severity() {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        };
        let mut line = format!("[{level}] {}", e.kind.as_label());
        if let Some(task) = e.task {
            line.push_str(&format!(" task={task}"));
        }
        if let Some(key) = &e.key {
            line.push_str(&format!(" key={key}"));
        }
        if let Some(reason) = e.reason {
            line.push_str(&format!(" reason={reason}"));
        }
        if let Some(retry) = e.retry {
            line.push_str(&format!(" retry={retry}"));
        }
        if let Some(delay) = e.delay {
            line.push_str(&format!(" delay={delay:?}"));
        }
        if let Some(span) = e.span {
            line.push_str(&format!(" span={span:?}"));
        }
        if let Some(count) = e.count {
            line.push_str(&format!(" count={count}"));
        }
        if let Some(cleaned) = e.cleaned {
            line.push_str(&format!(" cleaned={cleaned}"));
        }
        if let Some(err) = &e.error {
            line.push_str(&format!(" err={err:?}"));
        }
        println!("{line}");
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
