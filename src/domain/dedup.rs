//! Record deduplication for synced health data.
//!
//! A device re-sends its whole history on every sync; the client should only
//! see each record once unless it explicitly asked for a full re-delivery.

use std::collections::HashSet;

use crate::domain::models::Record;

/// Result of filtering one synced batch against the seen-key set.
#[derive(Debug)]
pub struct FilterOutcome {
    /// Records to push to the client, in batch order.
    pub to_deliver: Vec<Record>,
    /// Input set plus every key that was absent from it.
    pub updated_seen: HashSet<String>,
    /// True iff at least one key was absent from the input set; drives the
    /// persistence write-back.
    pub any_new: bool,
}

/// Filter `batch` into records the client has not seen yet.
///
/// A record is new iff its key is absent from `seen`. New keys are always
/// added to the returned set; `force_all` only widens the delivery set, never
/// the key set. Re-filtering the same batch against the updated set with
/// `force_all = false` yields an empty delivery set.
pub fn filter(batch: &[Record], seen: &HashSet<String>, force_all: bool) -> FilterOutcome {
    let mut updated_seen = seen.clone();
    let mut to_deliver = Vec::new();
    let mut any_new = false;

    for record in batch {
        let is_new = updated_seen.insert(record.log_date.clone());
        if is_new {
            any_new = true;
        }
        if force_all || is_new {
            to_deliver.push(record.clone());
        }
    }

    FilterOutcome {
        to_deliver,
        updated_seen,
        any_new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str) -> Record {
        Record {
            log_date: key.to_string(),
            payload: serde_json::json!({}),
        }
    }

    fn keys(items: &[&str]) -> HashSet<String> {
        items.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn only_unseen_records_are_delivered() {
        let batch = vec![record("2024-01-01"), record("2024-01-02")];
        let outcome = filter(&batch, &keys(&["2024-01-01"]), false);

        assert_eq!(outcome.to_deliver, vec![record("2024-01-02")]);
        assert_eq!(outcome.updated_seen, keys(&["2024-01-01", "2024-01-02"]));
        assert!(outcome.any_new);
    }

    #[test]
    fn refiltering_with_updated_set_is_idempotent() {
        let batch = vec![record("a"), record("b"), record("c")];
        let first = filter(&batch, &HashSet::new(), false);
        assert_eq!(first.to_deliver.len(), 3);

        let second = filter(&batch, &first.updated_seen, false);
        assert!(second.to_deliver.is_empty());
        assert!(!second.any_new);
        assert_eq!(second.updated_seen, first.updated_seen);
    }

    #[test]
    fn force_all_delivers_everything_but_tracks_only_new_keys() {
        let batch = vec![record("a"), record("b")];
        let outcome = filter(&batch, &keys(&["a"]), true);

        assert_eq!(outcome.to_deliver, batch);
        assert_eq!(outcome.updated_seen, keys(&["a", "b"]));
        assert!(outcome.any_new);
    }

    #[test]
    fn fully_seen_batch_reports_nothing_new() {
        let batch = vec![record("a")];
        let outcome = filter(&batch, &keys(&["a"]), false);

        assert!(outcome.to_deliver.is_empty());
        assert!(!outcome.any_new);
    }

    #[test]
    fn duplicate_keys_within_a_batch_deliver_once() {
        let batch = vec![record("a"), record("a")];
        let outcome = filter(&batch, &HashSet::new(), false);

        assert_eq!(outcome.to_deliver.len(), 1);
        assert_eq!(outcome.updated_seen, keys(&["a"]));
    }
}
