use anyhow::{Result, bail};
use tracing::warn;

use crate::config::ReplayStrategy;
use crate::database::DatabaseAdapter;

/// Outcome of replaying one dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub applied: usize,
    pub failed: usize,
}

/// Execute `statements` one after another, in order.
///
/// With [`ReplayStrategy::BestEffort`] a failing statement is logged and
/// skipped. With [`ReplayStrategy::FailFast`] the first failure aborts the
/// replay; statements already applied stay applied.
pub fn replay_dump(
    db: &dyn DatabaseAdapter,
    statements: &[String],
    strategy: ReplayStrategy,
) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();
    for (idx, sql) in statements.iter().enumerate() {
        match db.exec(sql) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                let reason = short_reason(&e.to_string());
                warn!(statement = idx, error = %reason, "failed to execute SQL");
                match strategy {
                    ReplayStrategy::BestEffort => report.failed += 1,
                    ReplayStrategy::FailFast => {
                        bail!("statement {} of {} failed: {}", idx, statements.len(), reason)
                    }
                }
            }
        }
    }
    Ok(report)
}

/// Engine messages look like `near "broken": syntax error`; keep the tail.
fn short_reason(message: &str) -> String {
    let tail = message.rsplit(':').next().unwrap_or_default().trim();
    if tail.is_empty() {
        "Unknown error".to_string()
    } else {
        tail.to_string()
    }
}
