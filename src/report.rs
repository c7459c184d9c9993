//! Error-reporting sink. Reports are deduplicated by a hash of
//! `(kind, module, first stack line)`; identical reports inside the
//! suppression window are dropped. Critical reports always get through.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::error;

const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Transient,
    InvariantViolation,
    Configuration,
    Fatal,
}

impl ReportKind {
    fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Transient => "transient",
            ReportKind::InvariantViolation => "invariant_violation",
            ReportKind::Configuration => "configuration",
            ReportKind::Fatal => "fatal",
        }
    }

    /// Fatal reports bypass suppression unconditionally.
    fn is_critical(&self) -> bool {
        matches!(self, ReportKind::Fatal)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActorIds {
    pub wallet: Option<String>,
    pub token: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: ReportKind,
    pub module: &'static str,
    pub operation: &'static str,
    pub actors: ActorIds,
    pub detail: String,
}

pub struct Reporter {
    window: Duration,
    seen: Mutex<HashMap<[u8; 32], Instant>>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Reporter {
    pub fn new(window: Duration) -> Self {
        Reporter {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Emit a report unless an identical one fired inside the window.
    /// Returns whether the report was emitted.
    pub fn report(&self, report: &ErrorReport) -> bool {
        if !report.kind.is_critical() && self.suppressed(report) {
            return false;
        }

        error!(
            kind = report.kind.as_str(),
            module = report.module,
            operation = report.operation,
            wallet = report.actors.wallet.as_deref().unwrap_or("-"),
            token = report.actors.token.as_deref().unwrap_or("-"),
            signature = report.actors.signature.as_deref().unwrap_or("-"),
            detail = report.detail.as_str(),
            "error report"
        );
        true
    }

    fn suppressed(&self, report: &ErrorReport) -> bool {
        let key = dedup_key(report);
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());

        seen.retain(|_, at| now.duration_since(*at) < self.window);
        if seen.contains_key(&key) {
            return true;
        }
        seen.insert(key, now);
        false
    }
}

fn dedup_key(report: &ErrorReport) -> [u8; 32] {
    let first_line = report.detail.lines().next().unwrap_or("");
    let mut hasher = Sha256::new();
    hasher.update(report.kind.as_str());
    hasher.update(b"\0");
    hasher.update(report.module);
    hasher.update(b"\0");
    hasher.update(first_line);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(detail: &str) -> ErrorReport {
        ErrorReport {
            kind: ReportKind::InvariantViolation,
            module: "store",
            operation: "activate_pending",
            actors: ActorIds::default(),
            detail: detail.to_string(),
        }
    }

    #[test]
    fn identical_reports_coalesce_within_the_window() {
        let reporter = Reporter::new(Duration::from_secs(60));
        assert!(reporter.report(&report("constraint failed\nat store.rs:1")));
        assert!(!reporter.report(&report("constraint failed\nat store.rs:99")));
    }

    #[test]
    fn distinct_first_lines_are_not_coalesced() {
        let reporter = Reporter::new(Duration::from_secs(60));
        assert!(reporter.report(&report("constraint failed")));
        assert!(reporter.report(&report("different failure")));
    }

    #[test]
    fn critical_reports_bypass_suppression() {
        let reporter = Reporter::new(Duration::from_secs(60));
        let mut fatal = report("panic");
        fatal.kind = ReportKind::Fatal;
        assert!(reporter.report(&fatal));
        assert!(reporter.report(&fatal));
    }

    #[test]
    fn window_expiry_allows_a_repeat() {
        let reporter = Reporter::new(Duration::from_millis(0));
        assert!(reporter.report(&report("x")));
        assert!(reporter.report(&report("x")));
    }
}
