// src/outage/classify.rs
//! Outage page classifier: text-node phrase scan, planned/unplanned markers,
//! and table-row detail extraction over a parsed HTML tree.

use chrono::{DateTime, Utc};
use metrics::histogram;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};

use crate::outage::error::FetchError;
use crate::outage::types::{OutageCategory, OutageResult};

/// Bumped whenever phrase sets or decision rules change, so cached results
/// can be told apart from results of an older heuristic.
pub const POLICY_VERSION: &str = "erm-west/v2";

/// Rows whose joined text is this many characters or fewer are decorative.
pub const MIN_DETAIL_CHARS: usize = 5;

pub const DEFAULT_NO_OUTAGE_PHRASES: &[&str] = &[
    "няма регистрирани",
    "няма планирани",
    "няма непланирани",
    "няма аварии",
    "няма текущи",
];
pub const DEFAULT_PLANNED_MARKER: &str = "Планирани прекъсвания";
pub const DEFAULT_UNPLANNED_MARKER: &str = "Непланирани прекъсвания";

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("table tr").unwrap());

/// What to conclude when the page has neither a "no outage" phrase nor any
/// planned/unplanned marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmarkedDefault {
    /// Report an unplanned outage.
    #[default]
    AssumeOutage,
    AssumeNone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailFilter {
    /// Keep rows longer than `MIN_DETAIL_CHARS` characters.
    #[default]
    MinLength,
    /// Keep rows mentioning the identifier (case-insensitive).
    ContainsIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    NoOutage,
    OutageAsserted(OutageCategory),
}

/// One named, version-pinned classification policy.
///
/// Phrases and markers are stored lowercased with whitespace collapsed, the
/// same normalization applied to page text before matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierPolicy {
    version: String,
    no_outage_phrases: Vec<String>,
    planned_marker: String,
    unplanned_marker: String,
    unmarked_default: UnmarkedDefault,
    detail_filter: DetailFilter,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_NO_OUTAGE_PHRASES.iter().copied(),
            DEFAULT_PLANNED_MARKER,
            DEFAULT_UNPLANNED_MARKER,
        )
    }
}

impl ClassifierPolicy {
    pub fn new<I, S>(no_outage_phrases: I, planned_marker: &str, unplanned_marker: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            version: POLICY_VERSION.to_string(),
            no_outage_phrases: no_outage_phrases
                .into_iter()
                .map(|p| normalize_text_node(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
            planned_marker: normalize_text_node(planned_marker),
            unplanned_marker: normalize_text_node(unplanned_marker),
            unmarked_default: UnmarkedDefault::default(),
            detail_filter: DetailFilter::default(),
        }
    }

    pub fn with_unmarked_default(mut self, d: UnmarkedDefault) -> Self {
        self.unmarked_default = d;
        self
    }

    pub fn with_detail_filter(mut self, f: DetailFilter) -> Self {
        self.detail_filter = f;
        self
    }

    /// Classify one outage page for `identifier`.
    ///
    /// CPU-bound; async callers should run it on a blocking worker.
    pub fn classify(
        &self,
        html: &str,
        identifier: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<OutageResult, FetchError> {
        let t0 = std::time::Instant::now();
        let document = Html::parse_document(html);

        let texts = text_nodes(&document);
        if texts.is_empty() {
            return Err(FetchError::ParseFailure(
                "document has no text content".to_string(),
            ));
        }

        let result = match self.verdict(&texts) {
            Verdict::NoOutage => OutageResult::no_outage(identifier, &self.version, fetched_at),
            Verdict::OutageAsserted(category) => {
                let details = self.detail_lines(&document, identifier);
                OutageResult::outage(identifier, &self.version, fetched_at, category, details)
            }
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("outage_classify_ms").record(ms);
        tracing::debug!(
            target: "outage",
            identifier,
            has_outage = result.has_outage,
            category = ?result.category,
            details = result.details.len(),
            "classified outage page"
        );

        Ok(result)
    }

    fn verdict(&self, texts: &[String]) -> Verdict {
        let no_outage = texts
            .iter()
            .any(|t| self.no_outage_phrases.iter().any(|p| t.contains(p.as_str())));
        if no_outage {
            return Verdict::NoOutage;
        }

        let unplanned = texts
            .iter()
            .any(|t| t.contains(self.unplanned_marker.as_str()));
        // "непланирани" ends with "планирани"; blank out unplanned hits first.
        let planned = texts.iter().any(|t| {
            t.replace(self.unplanned_marker.as_str(), " ")
                .contains(self.planned_marker.as_str())
        });

        match OutageCategory::from_markers(planned, unplanned) {
            Some(category) => Verdict::OutageAsserted(category),
            None => match self.unmarked_default {
                UnmarkedDefault::AssumeOutage => {
                    Verdict::OutageAsserted(OutageCategory::Unplanned)
                }
                UnmarkedDefault::AssumeNone => Verdict::NoOutage,
            },
        }
    }

    fn detail_lines(&self, document: &Html, identifier: &str) -> Vec<String> {
        let needle = identifier.trim().to_lowercase();
        document
            .select(&ROW)
            .map(row_text)
            .filter(|line| match self.detail_filter {
                DetailFilter::MinLength => line.chars().count() > MIN_DETAIL_CHARS,
                DetailFilter::ContainsIdentifier => {
                    !needle.is_empty() && line.to_lowercase().contains(&needle)
                }
            })
            .collect()
    }
}

/// Collapse whitespace runs (including NBSP) to one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WS.replace_all(s, " ").trim().to_string()
}

fn normalize_text_node(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Depth-first walk over every text node outside `<script>`/`<style>`,
/// normalized for matching. Whitespace-only nodes are dropped.
fn text_nodes(document: &Html) -> Vec<String> {
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let in_raw_text = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name()))
                .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
            if in_raw_text {
                return None;
            }
            let norm = normalize_text_node(text);
            (!norm.is_empty()).then_some(norm)
        })
        .collect()
}

/// Joined text of one table row: the row's own `td`/`th` cells, each trimmed,
/// single-space separated. Empty cells still contribute their separator.
fn row_text(row: ElementRef<'_>) -> String {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "300012345";

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>{body}</body></html>")
    }

    fn classify(html: &str) -> OutageResult {
        ClassifierPolicy::default()
            .classify(html, ID, Utc::now())
            .expect("classify ok")
    }

    #[test]
    fn no_outage_phrase_short_circuits_table_scan() {
        let html = page(&format!(
            "<p>Няма регистрирани прекъсвания</p>\
             <table><tr><td>{ID}</td><td>ул. Витоша 12</td></tr></table>"
        ));
        let r = classify(&html);
        assert!(!r.has_outage);
        assert_eq!(r.category, OutageCategory::None);
        assert!(r.details.is_empty());
    }

    #[test]
    fn no_outage_phrase_is_case_insensitive() {
        let r = classify(&page("<div>НЯМА ПЛАНИРАНИ прекъсвания за този адрес</div>"));
        assert_eq!(r.category, OutageCategory::None);
    }

    #[test]
    fn unplanned_marker_alone_is_not_counted_as_planned() {
        let r = classify(&page("<h3>Непланирани прекъсвания</h3>"));
        assert!(r.has_outage);
        assert_eq!(r.category, OutageCategory::Unplanned);
    }

    #[test]
    fn planned_marker_alone_is_planned() {
        let r = classify(&page("<h3>Планирани прекъсвания</h3>"));
        assert_eq!(r.category, OutageCategory::Planned);
    }

    #[test]
    fn both_markers_in_separate_nodes() {
        let r = classify(&page(
            "<h3>Непланирани прекъсвания</h3><h3>Планирани прекъсвания</h3>",
        ));
        assert_eq!(r.category, OutageCategory::Both);
    }

    #[test]
    fn both_markers_in_one_node() {
        let r = classify(&page(
            "<p>Непланирани прекъсвания и Планирани прекъсвания</p>",
        ));
        assert_eq!(r.category, OutageCategory::Both);
    }

    #[test]
    fn marker_split_by_newlines_still_matches() {
        let r = classify(&page("<span>Непланирани\n      прекъсвания</span>"));
        assert_eq!(r.category, OutageCategory::Unplanned);
    }

    #[test]
    fn unmarked_page_defaults_to_unplanned() {
        let r = classify(&page("<p>Резултати от търсенето</p>"));
        assert!(r.has_outage);
        assert_eq!(r.category, OutageCategory::Unplanned);
    }

    #[test]
    fn unmarked_page_with_assume_none_has_no_outage_and_no_details() {
        let policy = ClassifierPolicy::default().with_unmarked_default(UnmarkedDefault::AssumeNone);
        let html = page("<p>Резултати</p><table><tr><td>ул. Витоша 12</td></tr></table>");
        let r = policy.classify(&html, ID, Utc::now()).unwrap();
        assert!(!r.has_outage);
        assert_eq!(r.category, OutageCategory::None);
        assert!(r.details.is_empty());
    }

    #[test]
    fn markers_inside_script_are_ignored() {
        let policy = ClassifierPolicy::default().with_unmarked_default(UnmarkedDefault::AssumeNone);
        let html = page("<script>var t = 'Планирани прекъсвания';</script><p>Резултати</p>");
        let r = policy.classify(&html, ID, Utc::now()).unwrap();
        assert_eq!(r.category, OutageCategory::None);
    }

    #[test]
    fn rows_kept_verbatim_in_document_order_across_tables() {
        let html = page(&format!(
            "<h3>Непланирани прекъсвания</h3>\
             <table><tr><td> {ID} </td><td>Main St, outage 14:00-18:00</td></tr></table>\
             <table><tr><th>Second</th><th>table row</th></tr>\
             <tr><td>{ID}</td><td>Main St, outage 14:00-18:00</td></tr></table>"
        ));
        let r = classify(&html);
        let line = format!("{ID} Main St, outage 14:00-18:00");
        assert_eq!(
            r.details,
            vec![line.clone(), "Second table row".to_string(), line]
        );
    }

    #[test]
    fn length_filter_boundary_is_exclusive() {
        let html = page(
            "<h3>Планирани прекъсвания</h3>\
             <table><tr><td>ab</td><td>cd</td></tr>\
             <tr><td>abc</td><td>de</td></tr>\
             <tr><td></td><td> </td></tr></table>",
        );
        let r = classify(&html);
        // "ab cd" is 5 chars, "abc de" is 6.
        assert_eq!(r.details, vec!["abc de".to_string()]);
    }

    #[test]
    fn empty_middle_cell_keeps_its_separator() {
        let html = page(
            "<h3>Планирани прекъсвания</h3>\
             <table><tr><td>ab</td><td></td><td>cd</td></tr>\
             <tr><td>a</td><td></td><td>b</td></tr></table>",
        );
        let r = classify(&html);
        // "ab  cd" is 6 chars with the doubled space, "a  b" is 4.
        assert_eq!(r.details, vec!["ab  cd".to_string()]);
    }

    #[test]
    fn nested_table_cells_are_not_repeated_in_outer_row() {
        let html = page(
            "<h3>Планирани прекъсвания</h3>\
             <table><tr><td>Outer cell</td><td>\
             <table><tr><td>inner</td><td>row text</td></tr></table>\
             </td></tr></table>",
        );
        let r = classify(&html);
        assert_eq!(r.details.len(), 2);
        assert!(r.details[0].starts_with("Outer cell "));
        assert_eq!(r.details[0].matches("row text").count(), 1);
        assert_eq!(r.details[1], "inner row text");
    }

    #[test]
    fn identifier_filter_keeps_only_matching_rows() {
        let policy =
            ClassifierPolicy::default().with_detail_filter(DetailFilter::ContainsIdentifier);
        let html = page(
            "<h3>Планирани прекъсвания</h3>\
             <table><tr><th>Абонатен номер</th><th>Адрес</th></tr>\
             <tr><td>SOF-77</td><td>ул. Раковски 1</td></tr></table>",
        );
        let r = policy.classify(&html, "sof-77", Utc::now()).unwrap();
        assert_eq!(r.details, vec!["SOF-77 ул. Раковски 1".to_string()]);
    }

    #[test]
    fn outage_without_table_has_empty_details() {
        let r = classify(&page("<h3>Планирани прекъсвания</h3>"));
        assert!(r.has_outage);
        assert!(r.details.is_empty());
    }

    #[test]
    fn empty_document_is_parse_failure() {
        let err = ClassifierPolicy::default()
            .classify("", ID, Utc::now())
            .unwrap_err();
        assert!(matches!(err, FetchError::ParseFailure(_)));
    }

    #[test]
    fn reclassifying_same_html_is_identical() {
        let html = page(&format!(
            "<h3>Непланирани прекъсвания</h3><table><tr><td>{ID}</td><td>ул. Витоша</td></tr></table>"
        ));
        let at = Utc::now();
        let policy = ClassifierPolicy::default();
        let a = policy.classify(&html, ID, at).unwrap();
        let b = policy.classify(&html, ID, at).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_phrases_are_dropped() {
        let policy = ClassifierPolicy::new(["", "  "], "планирани", "непланирани");
        let r = policy
            .classify(&page("<p>Непланирани</p>"), ID, Utc::now())
            .unwrap();
        assert_eq!(r.category, OutageCategory::Unplanned);
    }
}
