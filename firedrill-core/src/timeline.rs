//! Break-first timeline builder.
//!
//! Re-groups failure events by configuration, orders each group by
//! severity rank then time, and extracts one break point per
//! configuration: its chronologically-first HIGH-severity event. The
//! top-level break-point list is ordered by timestamp across
//! configurations, answering "who broke first".

use firedrill_common::{BreakPoint, ConfigId, FailureEvent, Severity, Timeline};
use std::collections::BTreeMap;

/// Build the timeline view of an event list.
pub fn build_timeline(events: &[FailureEvent]) -> Timeline {
    let mut configs: BTreeMap<ConfigId, Vec<FailureEvent>> = BTreeMap::new();
    for event in events {
        configs
            .entry(event.config_id.clone())
            .or_default()
            .push(event.clone());
    }

    for group in configs.values_mut() {
        group.sort_by(|a, b| {
            a.severity
                .rank()
                .cmp(&b.severity.rank())
                .then(a.timestamp_ms.cmp(&b.timestamp_ms))
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
    }

    // First HIGH event in *time* order, which after the sort above is the
    // head of the HIGH prefix — not merely the most severe event overall.
    let mut break_points: Vec<BreakPoint> = configs
        .iter()
        .filter_map(|(config_id, group)| {
            group
                .iter()
                .filter(|e| e.severity == Severity::High)
                .min_by_key(|e| e.timestamp_ms)
                .map(|event| BreakPoint {
                    config_id: config_id.clone(),
                    item_id: event.item_id.clone(),
                    mode: event.mode,
                    severity: event.severity,
                    timestamp_ms: event.timestamp_ms,
                    trigger: event.trigger.clone(),
                })
        })
        .collect();
    break_points.sort_by(|a, b| {
        a.timestamp_ms
            .cmp(&b.timestamp_ms)
            .then_with(|| a.config_id.cmp(&b.config_id))
    });

    Timeline {
        configs,
        break_points,
    }
}
