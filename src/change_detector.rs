//! change_detector.rs — decides whether a fresh result is worth an alert.

use crate::notify::NotificationEvent;
use crate::outage::OutageResult;

/// Compare the previous and the fresh result of one identifier.
///
/// Alerts on a changed outage flag or category. Detail-only changes are not
/// alerts; neither is a first result that reports no outage.
pub fn detect_change(prev: Option<&OutageResult>, next: &OutageResult) -> Option<NotificationEvent> {
    let changed = match prev {
        None => next.has_outage,
        Some(p) => p.has_outage != next.has_outage || p.category != next.category,
    };
    if !changed {
        tracing::trace!(target: "notify", identifier = %next.identifier, "no change");
        return None;
    }

    Some(NotificationEvent {
        identifier: next.identifier.clone(),
        has_outage: next.has_outage,
        category: next.category,
        previous: prev.map(|p| p.category),
        details: next.details.clone(),
        ts: next.fetched_at,
    })
}
