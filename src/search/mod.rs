//! Search engine (spec §4.6): filtered, paginated search over a single
//! watcher's index.
//!
//! Matching is evaluated by fetching every stored document and applying the
//! same case-insensitive substring/range semantics the spec prescribes in
//! Rust, rather than composing Tantivy's own wildcard query operators — the
//! spec explicitly allows substituting a different matching strategy as
//! long as the case-insensitive substring semantics are preserved (§4.6
//! "Wildcard caveat"). This keeps matching behavior simple to verify at the
//! per-watcher index scale this system targets.

use crate::error::LogwatchError;
use crate::index::{fields_from_schema, open_reader_index, IndexRegistry};
use chrono_tz::Tz;
use tantivy::collector::TopDocs;
use tantivy::query::AllQuery;
use tantivy::schema::Value;
use tantivy::TantivyDocument;

/// Boolean combinator for the free-text clauses (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

/// One page-worth search request against a single watcher's index.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub file_path: Option<String>,
    pub content_q: Option<String>,
    pub timestamp_q: Option<String>,
    pub log_path_q: Option<String>,
    pub operator: Option<Operator>,
    /// Inclusive lower bound on `logLongTimestamp`, epoch ms.
    pub start_date_ms: Option<i64>,
    /// Inclusive upper bound on `logLongTimestamp`, epoch ms.
    pub end_date_ms: Option<i64>,
    pub page: u32,
    pub page_size: u32,
}

/// Which stored field a free-text clause targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Content,
    LogStrTimestamp,
    LogPath,
}

impl SearchRequest {
    fn free_text_queries(&self) -> Vec<(TextField, &str)> {
        [
            (TextField::Content, self.content_q.as_deref()),
            (TextField::LogStrTimestamp, self.timestamp_q.as_deref()),
            (TextField::LogPath, self.log_path_q.as_deref()),
        ]
        .into_iter()
        .filter_map(|(f, q)| q.map(|q| (f, q)))
        .filter(|(_, q)| !q.trim().is_empty())
        .collect()
    }

    fn has_any_clause(&self) -> bool {
        !self.free_text_queries().is_empty()
            || self.file_path.as_deref().is_some_and(|s| !s.trim().is_empty())
            || self.start_date_ms.is_some()
            || self.end_date_ms.is_some()
    }
}

/// A single matched event, in original case (spec §4.6 step 5).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub timestamp: String,
    pub file_path: String,
    pub content: String,
}

/// `search()` (spec §4.6): resolves the watcher's index, applies filters,
/// and returns `(totalHits, page of results)`.
pub fn search(
    index_registry: &IndexRegistry,
    watcher_name: &str,
    req: &SearchRequest,
) -> Result<(usize, Vec<SearchResult>), LogwatchError> {
    let dir = index_registry.dir_for(watcher_name);
    let Some(index) = open_reader_index(&dir)? else {
        return Ok((0, Vec::new()));
    };

    if !req.has_any_clause() {
        return Ok((0, Vec::new()));
    }

    let fields = fields_from_schema(&index.schema());
    let reader = index.reader()?;
    let searcher = reader.searcher();

    let free_text: Vec<(TextField, String)> =
        req.free_text_queries().into_iter().map(|(f, q)| (f, q.to_lowercase())).collect();
    let operator = req.operator.unwrap_or(Operator::And);
    let file_path_filter = req.file_path.as_deref().map(|s| s.to_lowercase());

    let limit = searcher.num_docs().max(1) as usize;
    let top_docs = searcher.search(&AllQuery, &TopDocs::with_limit(limit))?;

    let mut matches = Vec::new();
    for (_score, addr) in top_docs {
        let doc: TantivyDocument = searcher.doc(addr)?;
        let content = text_value(&doc, fields.content);
        let log_str_timestamp = text_value(&doc, fields.log_str_timestamp);
        let log_path = text_value(&doc, fields.log_path);
        let log_long_timestamp = doc
            .get_first(fields.log_long_timestamp)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        if let Some(want) = &file_path_filter {
            if &log_path.to_lowercase() != want {
                continue;
            }
        }
        if let Some(min) = req.start_date_ms {
            if log_long_timestamp < min {
                continue;
            }
        }
        if let Some(max) = req.end_date_ms {
            if log_long_timestamp > max {
                continue;
            }
        }

        if !free_text.is_empty() {
            let content_lower = content.to_lowercase();
            let log_str_timestamp_lower = log_str_timestamp.to_lowercase();
            let log_path_lower = log_path.to_lowercase();
            let mut hits = free_text.iter().map(|(field, needle)| {
                let haystack = match field {
                    TextField::Content => &content_lower,
                    TextField::LogStrTimestamp => &log_str_timestamp_lower,
                    TextField::LogPath => &log_path_lower,
                };
                haystack.contains(needle.as_str())
            });
            let satisfied = match operator {
                Operator::And => hits.all(|b| b),
                Operator::Or => hits.any(|b| b),
            };
            if !satisfied {
                continue;
            }
        }

        matches.push(SearchResult { timestamp: log_str_timestamp, file_path: log_path, content });
    }

    let total_hits = matches.len();
    let page = req.page.max(1) as usize;
    let page_size = req.page_size.max(1) as usize;
    let start = (page - 1) * page_size;
    let page_results = if start >= total_hits { Vec::new() } else { matches[start..total_hits.min(start + page_size)].to_vec() };

    Ok((total_hits, page_results))
}

fn text_value(doc: &TantivyDocument, field: tantivy::schema::Field) -> String {
    doc.get_first(field).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

/// Parses an ISO local datetime (`YYYY-MM-DDTHH:MM:SS`) into epoch
/// milliseconds under `zone`, for `startDate`/`endDate` query parameters
/// (spec §4.6 step 3).
pub fn parse_iso_local_datetime(s: &str, zone: Tz) -> Result<i64, LogwatchError> {
    use chrono::TimeZone;

    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| LogwatchError::Parse(format!("invalid ISO local datetime: {s:?}")))?;

    match zone.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.timestamp_millis()),
        chrono::LocalResult::Ambiguous(dt, _) => Ok(dt.timestamp_millis()),
        chrono::LocalResult::None => Err(LogwatchError::Parse(format!("nonexistent local datetime: {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::WatcherIndex;
    use crate::model::IndexedEvent;

    fn event(md5: &str, content: &str, log_path: &str, ts_ms: i64) -> IndexedEvent {
        IndexedEvent {
            md5_id: md5.into(),
            log_str_timestamp: "2025-07-30 12:00:00.000".into(),
            log_long_timestamp: ts_ms,
            log_path: log_path.into(),
            content: content.into(),
        }
    }

    async fn seeded_registry(dir: &std::path::Path, watcher: &str, events: &[IndexedEvent]) -> IndexRegistry {
        let registry = IndexRegistry::new(dir);
        let idx = registry.acquire(watcher).unwrap();
        for e in events {
            idx.upsert_by_term(e).await.unwrap();
        }
        idx.commit().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn missing_index_returns_zero_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = IndexRegistry::new(dir.path());
        let req = SearchRequest { content_q: Some("x".into()), page: 1, page_size: 10, ..Default::default() };
        let (total, results) = search(&registry, "nope", &req).unwrap();
        assert_eq!(total, 0);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn query_with_no_clauses_returns_zero_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![event("m1", "hello", "/logs/a.log", 100)];
        let registry = seeded_registry(dir.path(), "w1", &events).await;
        let req = SearchRequest { page: 1, page_size: 10, ..Default::default() };
        let (total, results) = search(&registry, "w1", &req).unwrap();
        assert_eq!(total, 0);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn case_insensitive_search_matches_any_casing() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![event("m1", "an ERROR occurred", "/logs/a.log", 100)];
        let registry = seeded_registry(dir.path(), "w1", &events).await;

        for needle in ["error", "ERROR", "Error"] {
            let req = SearchRequest { content_q: Some(needle.into()), page: 1, page_size: 10, ..Default::default() };
            let (total, _) = search(&registry, "w1", &req).unwrap();
            assert!(total >= 1, "expected a match for {needle:?}");
        }
    }

    #[tokio::test]
    async fn operator_semantics_and_vs_or() {
        let dir = tempfile::tempdir().unwrap();
        // D1 matches only the contentQ clause, D2 matches only the logPathQ
        // clause, D3 matches both (spec §8 property 7).
        let events = vec![
            event("d1", "contains alpha only", "/logs/skip.log", 100),
            event("d2", "skip", "/logs/bravo-only.log", 101),
            event("d3", "contains alpha only", "/logs/bravo-only.log", 102),
        ];
        let registry = seeded_registry(dir.path(), "w1", &events).await;

        let and_req = SearchRequest { content_q: Some("alpha".into()), log_path_q: Some("bravo".into()), operator: Some(Operator::And), page: 1, page_size: 10, ..Default::default() };
        let (and_total, and_results) = search(&registry, "w1", &and_req).unwrap();
        assert_eq!(and_total, 1);
        assert_eq!(and_results[0].content, "contains alpha only");
        assert_eq!(and_results[0].file_path, "/logs/bravo-only.log");

        let or_req = SearchRequest { content_q: Some("alpha".into()), log_path_q: Some("bravo".into()), operator: Some(Operator::Or), page: 1, page_size: 10, ..Default::default() };
        let (or_total, _) = search(&registry, "w1", &or_req).unwrap();
        assert_eq!(or_total, 3);
    }

    #[tokio::test]
    async fn pagination_partitions_results_without_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let events: Vec<IndexedEvent> = (0..5).map(|i| event(&format!("m{i}"), "needle here", "/logs/a.log", i)).collect();
        let registry = seeded_registry(dir.path(), "w1", &events).await;

        let mut seen = std::collections::HashSet::new();
        for page in 1..=3u32 {
            let req = SearchRequest { content_q: Some("needle".into()), page, page_size: 2, ..Default::default() };
            let (total, results) = search(&registry, "w1", &req).unwrap();
            assert_eq!(total, 5);
            for r in results {
                assert!(seen.insert(r.timestamp.clone() + &r.content), "duplicate result across pages");
            }
        }
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn exact_file_path_filter_is_a_must_clause() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![
            event("m1", "needle", "/logs/a.log", 1),
            event("m2", "needle", "/logs/b.log", 2),
        ];
        let registry = seeded_registry(dir.path(), "w1", &events).await;
        let req = SearchRequest { file_path: Some("/logs/A.log".into()), page: 1, page_size: 10, ..Default::default() };
        let (total, results) = search(&registry, "w1", &req).unwrap();
        assert_eq!(total, 1);
        assert_eq!(results[0].file_path, "/logs/a.log");
    }
}
