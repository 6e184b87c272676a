//! Paged lazy iteration over the capture log.

use super::store::{CaptureStore, StoreError};
use super::types::Capture;
use std::collections::VecDeque;

/// Iterator over every capture in insertion order.
///
/// Rows are fetched in pages keyed by the last seen id, so the log is never
/// materialized at once and the store lock is only held per page. Captures
/// appended while iterating are picked up by later pages.
pub struct CaptureIter<'a> {
    store: &'a CaptureStore,
    page_size: usize,
    last_id: i64,
    buffer: VecDeque<Capture>,
    exhausted: bool,
}

impl<'a> CaptureIter<'a> {
    pub(super) fn new(store: &'a CaptureStore, page_size: usize) -> Self {
        Self {
            store,
            page_size,
            last_id: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<(), StoreError> {
        let page = self.store.page_after(self.last_id, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.last_id = last.id;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for CaptureIter<'_> {
    type Item = Result<Capture, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                // Stop after surfacing the error once
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use crate::capture::{CaptureStore, HeaderFields, NewCapture};

    fn capture(path: &str) -> NewCapture {
        NewCapture {
            method: "GET".to_string(),
            path: path.to_string(),
            status: 200,
            req_headers: HeaderFields::new(),
            req_body: None,
            res_headers: HeaderFields::new(),
            res_body: None,
            latency_ms: 0,
        }
    }

    #[test]
    fn test_empty_store_yields_nothing() {
        let store = CaptureStore::open_in_memory().unwrap();
        assert_eq!(store.list_all().count(), 0);
    }

    #[test]
    fn test_iterates_across_page_boundaries_in_order() {
        let store = CaptureStore::open_in_memory().unwrap().with_page_size(3);
        for i in 0..10 {
            store.append(&capture(&format!("/item/{i}"))).unwrap();
        }

        let paths: Vec<String> = store
            .list_all()
            .map(|c| c.unwrap().exchange.path)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("/item/{i}")).collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_exact_page_multiple() {
        let store = CaptureStore::open_in_memory().unwrap().with_page_size(2);
        for i in 0..4 {
            store.append(&capture(&format!("/p{i}"))).unwrap();
        }
        let ids: Vec<i64> = store.list_all().map(|c| c.unwrap().id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_picks_up_appends_made_mid_iteration() {
        let store = CaptureStore::open_in_memory().unwrap().with_page_size(1);
        store.append(&capture("/first")).unwrap();

        let mut iter = store.list_all();
        assert_eq!(iter.next().unwrap().unwrap().exchange.path, "/first");
        store.append(&capture("/second")).unwrap();
        assert_eq!(iter.next().unwrap().unwrap().exchange.path, "/second");
    }
}
