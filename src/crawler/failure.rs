//! Failure accounting against the retry budget

use tracing::{error, warn};

use crate::session::{CompletionStatus, CrawlSession, FailureRecord};

/// Records a navigation failure and charges the retry budget
///
/// The budget is global across the whole session and never resets, so a
/// crawl that keeps failing stops instead of hammering a broken site. When
/// the budget runs out the session is finished as failed; everything found
/// so far stays in the record.
pub fn handle_failure(session: &mut CrawlSession, target: &str, message: &str) {
    warn!("navigation failed for {}: {}", target, message);

    let record = FailureRecord::new(target, message);
    session.last_error = Some(record.clone());
    session.failed_targets.push(record);
    session.counters.retries += 1;

    if session.counters.retries >= session.limits.max_retries {
        error!(
            "retry budget exhausted ({} of {}), failing session {}",
            session.counters.retries, session.limits.max_retries, session.session_id
        );
        session.finish(CompletionStatus::Failed);
    }
}

/// Records a navigation that never delivered a page within its deadline
pub fn handle_timeout(session: &mut CrawlSession, target: &str, waited_ms: u64) {
    handle_failure(
        session,
        target,
        &format!("Navigation timed out after {}ms", waited_ms),
    );
}
