//! Temporal clustering of buffered events.
//!
//! The oracle reads prose, not timestamps. Before narration, the buffered
//! history is grouped into human-scale clusters: events landing within
//! [`CLUSTER_GAP_MS`] of their predecessor belong together, and each
//! cluster is labeled with a relative-time phrase derived from its span.
//! Empty input produces an explicit "no events" marker so the prompt
//! never renders an empty section.

use chronicle_types::HistoryEntry;

/// Gap between consecutive timestamps that starts a new cluster.
pub const CLUSTER_GAP_MS: i64 = 50;

/// A group of near-simultaneous events with a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Relative-time phrase derived from the cluster's span.
    pub label: String,
    /// Semicolon-joined member event ids, oldest first.
    pub description: String,
}

/// Cluster an agent's buffered history into human-scale time windows.
///
/// The input is stably sorted by timestamp (ties keep their relative
/// append order), then walked once: a gap greater than
/// [`CLUSTER_GAP_MS`] to the previous timestamp starts a new cluster.
pub fn cluster_events(entries: &[HistoryEntry]) -> Vec<Cluster> {
    if entries.is_empty() {
        return vec![Cluster {
            label: "no events in period".to_owned(),
            description: String::new(),
        }];
    }

    let mut sorted: Vec<&HistoryEntry> = entries.iter().collect();
    // Stable by construction: Vec::sort_by_key keeps tied entries in
    // their original append order.
    sorted.sort_by_key(|e| e.timestamp_ms);

    let mut clusters = Vec::new();
    let mut current: Vec<&HistoryEntry> = Vec::new();

    for entry in sorted {
        let gap_exceeded = current
            .last()
            .is_some_and(|prev| entry.timestamp_ms.saturating_sub(prev.timestamp_ms) > CLUSTER_GAP_MS);
        if gap_exceeded {
            clusters.push(finish_cluster(&current));
            current.clear();
        }
        current.push(entry);
    }
    if !current.is_empty() {
        clusters.push(finish_cluster(&current));
    }

    clusters
}

/// Build the labeled cluster from its members.
fn finish_cluster(members: &[&HistoryEntry]) -> Cluster {
    let first = members.first().map_or(0, |e| e.timestamp_ms);
    let last = members.last().map_or(0, |e| e.timestamp_ms);
    let span_ms = last.saturating_sub(first);

    let ids: Vec<&str> = members.iter().map(|e| e.event_id.as_str()).collect();

    Cluster {
        label: span_label(span_ms),
        description: ids.join("; "),
    }
}

/// Map a cluster span onto a fixed human-scale bucket.
fn span_label(span_ms: i64) -> String {
    if span_ms <= CLUSTER_GAP_MS {
        "almost simultaneous".to_owned()
    } else if span_ms <= 1_000 {
        "within a second".to_owned()
    } else if span_ms <= 10_000 {
        "a few seconds apart".to_owned()
    } else {
        format!("{} seconds later", span_ms.saturating_div(1_000))
    }
}
