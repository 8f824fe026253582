use std::collections::HashSet;

/// Maximum number of results kept per session.
pub const HISTORY_LIMIT: usize = 50;

/// A completed recognition. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub id: u64,
    pub timestamp: String,
    pub text: String,
}

/// Session-local results, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStore {
    entries: Vec<ExtractionResult>,
    next_id: u64,
    limit: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }
}

impl HistoryStore {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            limit,
        }
    }

    /// Records a new result at the front, dropping the oldest past the limit.
    pub fn push(
        &mut self,
        timestamp: impl Into<String>,
        text: impl Into<String>,
    ) -> &ExtractionResult {
        let entry = ExtractionResult {
            id: self.next_id,
            timestamp: timestamp.into(),
            text: text.into(),
        };
        self.next_id += 1;
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);
        &self.entries[0]
    }

    /// Adopts the backend's list, which is already newest first.
    ///
    /// Local results the backend does not list yet stay in front of it, so a
    /// load that lands after a run finished never drops that run. Entries are
    /// matched by text, each backend entry covering at most one local result.
    pub fn replace(&mut self, entries: Vec<ExtractionResult>) {
        let mut unmatched: Vec<&str> = entries.iter().map(|entry| entry.text.as_str()).collect();
        let mut local: Vec<ExtractionResult> = Vec::new();
        for entry in self.entries.drain(..) {
            match unmatched.iter().position(|text| *text == entry.text) {
                Some(index) => {
                    unmatched.swap_remove(index);
                }
                None => local.push(entry),
            }
        }

        let taken: HashSet<u64> = entries.iter().map(|entry| entry.id).collect();
        let mut next_id = entries
            .iter()
            .map(|entry| entry.id + 1)
            .max()
            .unwrap_or(0)
            .max(self.next_id);
        for entry in local.iter_mut().filter(|entry| taken.contains(&entry.id)) {
            entry.id = next_id;
            next_id += 1;
        }

        local.extend(entries);
        local.truncate(self.limit);
        self.entries = local;
        self.next_id = next_id;
    }

    pub fn entries(&self) -> &[ExtractionResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_keep_increasing_after_truncation() {
        let mut store = HistoryStore::with_limit(2);
        store.push("10:00:00", "a");
        store.push("10:00:01", "b");
        store.push("10:00:02", "c");

        let ids: Vec<_> = store.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn replace_continues_numbering_after_backend_ids() {
        let mut store = HistoryStore::default();
        store.replace(vec![ExtractionResult {
            id: 7,
            timestamp: "09:00:00".into(),
            text: "old".into(),
        }]);

        assert_eq!(store.push("09:00:01", "new").id, 8);
    }

    #[test]
    fn replace_keeps_local_results_missing_from_backend() {
        let mut store = HistoryStore::default();
        store.push("10:00:00", "known");
        store.push("10:00:05", "fresh");

        store.replace(vec![ExtractionResult {
            id: 0,
            timestamp: "10:00:00".into(),
            text: "known".into(),
        }]);

        let texts: Vec<_> = store.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["fresh", "known"]);
        let ids: Vec<_> = store.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(store.push("10:00:09", "next").id, 2);
    }

    #[test]
    fn replace_renumbers_local_results_that_clash_with_backend_ids() {
        let mut store = HistoryStore::default();
        store.push("10:00:05", "local");

        store.replace(vec![ExtractionResult {
            id: 0,
            timestamp: "09:00:00".into(),
            text: "remote".into(),
        }]);

        let ids: Vec<_> = store.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(store.entries()[0].text, "local");
    }

    #[test]
    fn duplicate_texts_are_matched_one_to_one() {
        let mut store = HistoryStore::default();
        store.push("10:00:00", "same");
        store.push("10:00:01", "same");

        store.replace(vec![ExtractionResult {
            id: 0,
            timestamp: "10:00:00".into(),
            text: "same".into(),
        }]);

        assert_eq!(store.len(), 2);
    }
}
