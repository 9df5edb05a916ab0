//! Tests for the content query engine.

use super::*;
use crate::index::{ContentIndex, DocumentRecord};

fn doc(path: &str, content: &str) -> DocumentRecord {
    DocumentRecord {
        path: path.to_string(),
        filename: path.rsplit('/').next().unwrap_or(path).to_string(),
        filetype: path.rsplit('.').next().unwrap_or("").to_string(),
        modified: "2024-01-01 09:00:00".to_string(),
        size_bytes: content.len() as u64,
        content: content.to_string(),
    }
}

fn corpus(docs: &[(&str, &str)]) -> ContentIndex {
    let mut idx = ContentIndex::default();
    for (path, content) in docs {
        idx.upsert(doc(path, content));
    }
    idx.refresh_trigrams();
    idx
}

fn paths(hits: &[RawHit]) -> Vec<&str> {
    hits.iter().map(|h| h.path.as_str()).collect()
}

#[test]
fn test_terms_are_or_combined() {
    let idx = corpus(&[
        ("/d/a.txt", "invoice for march"),
        ("/d/b.txt", "receipt for april"),
        ("/d/c.txt", "unrelated notes"),
    ]);
    let hits = ContentQuery::new(["invoice", "receipt"]).search(&idx, 10).unwrap();
    let mut found = paths(&hits);
    found.sort();
    assert_eq!(found, vec!["/d/a.txt", "/d/b.txt"]);
}

#[test]
fn test_rare_term_scores_higher() {
    let idx = corpus(&[
        ("/d/a.txt", "budget budget summary"),
        ("/d/b.txt", "budget forecast"),
        ("/d/c.txt", "budget review"),
    ]);
    let hits = ContentQuery::new(["budget", "forecast"]).search(&idx, 10).unwrap();
    assert_eq!(hits[0].path, "/d/b.txt", "document matching both terms, one rare, ranks first");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_prefix_expansion_unless_whole_word() {
    let idx = corpus(&[("/d/a.txt", "all invoices are paid")]);
    let loose = ContentQuery::new(["invoice"]).search(&idx, 10).unwrap();
    assert_eq!(loose.len(), 1);

    let strict = ContentQuery::new(["invoice"]).whole_word(true).search(&idx, 10).unwrap();
    // "invoice" is within edit distance of "invoices", so the fallback
    // finds it through the exact corrected token
    assert_eq!(strict.len(), 1);

    let idx = corpus(&[("/d/a.txt", "the invoicing department")]);
    let strict = ContentQuery::new(["invoic"]).whole_word(true).search(&idx, 10).unwrap();
    assert!(strict.is_empty(), "no exact token within distance 2");
}

#[test]
fn test_case_sensitive_requires_exact_case() {
    let idx = corpus(&[
        ("/d/a.txt", "Contact ACME for details"),
        ("/d/b.txt", "acme is lowercase here"),
    ]);
    let hits = ContentQuery::new(["ACME"]).case_sensitive(true).search(&idx, 10).unwrap();
    assert_eq!(paths(&hits), vec!["/d/a.txt"]);

    let hits = ContentQuery::new(["ACME"]).search(&idx, 10).unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn test_multi_word_term_is_a_phrase() {
    let idx = corpus(&[
        ("/d/a.txt", "the annual report was filed"),
        ("/d/b.txt", "report on the annual meeting"),
    ]);
    let hits = ContentQuery::new(["annual report"]).search(&idx, 10).unwrap();
    assert_eq!(paths(&hits), vec!["/d/a.txt"]);
}

#[test]
fn test_phrase_tolerates_punctuation_between_words() {
    let idx = corpus(&[("/d/a.txt", "total-due: 120 EUR")]);
    let hits = ContentQuery::new(["total due"]).search(&idx, 10).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_spelling_fallback_returns_near_match() {
    let idx = corpus(&[
        ("/d/a.txt", "invoice number 42"),
        ("/d/b.txt", "meeting agenda"),
    ]);
    let hits = ContentQuery::new(["invocie"]).search(&idx, 10).unwrap();
    assert_eq!(paths(&hits), vec!["/d/a.txt"]);
}

#[test]
fn test_spelling_fallback_per_term() {
    let idx = corpus(&[
        ("/d/a.txt", "invoice number 42"),
        ("/d/b.txt", "receipt attached"),
    ]);
    let hits = ContentQuery::new(["invoce", "reciept"]).search(&idx, 10).unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn test_no_suggestion_yields_empty() {
    let idx = corpus(&[("/d/a.txt", "invoice number 42")]);
    let hits = ContentQuery::new(["zzzzzzzz"]).search(&idx, 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_corrected_phrase_keeps_word_order() {
    let idx = corpus(&[("/d/a.txt", "abc xyz"), ("/d/b.txt", "xyz abc")]);
    let hits = ContentQuery::new(["abd xyq"]).search(&idx, 10).unwrap();
    assert_eq!(paths(&hits), vec!["/d/a.txt"]);

    let hits = ContentQuery::new(["xyq abd"]).search(&idx, 10).unwrap();
    assert_eq!(paths(&hits), vec!["/d/b.txt"]);
}

#[test]
fn test_failed_correction_is_final() {
    let idx = corpus(&[("/d/a.txt", "abc xyz")]);
    let hits = ContentQuery::new(["xyq abd"]).search(&idx, 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_empty_query_yields_nothing() {
    let idx = corpus(&[("/d/a.txt", "text")]);
    assert!(ContentQuery::new(Vec::<String>::new()).search(&idx, 10).unwrap().is_empty());
    assert!(ContentQuery::new(["!"]).search(&idx, 10).unwrap().is_empty());
}

#[test]
fn test_search_filtered_applies_accept_then_limit() {
    let idx = corpus(&[
        ("/d/a.txt", "report report report"),
        ("/d/b.csv", "report"),
        ("/d/c.txt", "report data"),
    ]);
    let only_txt = |d: &DocumentRecord| d.filetype == "txt";
    let hits = ContentQuery::new(["report"]).search_filtered(&idx, 1, &only_txt).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].filetype, "txt");

    let none = |_: &DocumentRecord| false;
    assert!(ContentQuery::new(["report"]).search_filtered(&idx, 10, &none).unwrap().is_empty());
}

#[test]
fn test_deleted_document_not_returned() {
    let mut idx = corpus(&[("/d/a.txt", "unique_marker"), ("/d/b.txt", "other")]);
    idx.remove("/d/a.txt");
    idx.refresh_trigrams();
    assert!(ContentQuery::new(["unique_marker"]).search(&idx, 10).unwrap().is_empty());
}

// ─── Snippets ────────────────────────────────────────────────────────

#[test]
fn test_snippet_surrounds_match_and_is_single_line() {
    let filler = "lorem ipsum ".repeat(30);
    let content = format!("{}\n\nthe invoice\ttotal is due\n{}", filler, filler);
    let idx = corpus(&[("/d/a.txt", &content)]);
    let hits = ContentQuery::new(["invoice"]).search(&idx, 1).unwrap();
    let snippet = &hits[0].snippet;
    assert!(snippet.contains("the invoice total is due"), "got: {}", snippet);
    assert!(!snippet.contains('\n'));
    assert!(!snippet.contains('\t'));
    assert!(snippet.chars().count() < content.chars().count());
}

#[test]
fn test_snippet_keeps_at_most_five_fragments() {
    let block = format!("{} match {}", "x".repeat(100), "y".repeat(100));
    let content = block.repeat(8);
    let re = Regex::new("(?i)match").unwrap();
    let snippet = build_snippet(&content, &[&re]);
    assert_eq!(snippet.matches("match").count(), 5);
    assert_eq!(snippet.matches("...").count(), 4);
}

#[test]
fn test_snippet_handles_multibyte_boundaries() {
    let content = format!("{}résumé {}", "é".repeat(60), "ü".repeat(60));
    let re = Regex::new("(?i)résumé").unwrap();
    let snippet = build_snippet(&content, &[&re]);
    assert!(snippet.contains("résumé"));
}

#[test]
fn test_fallback_snippet_is_prefix_with_ellipsis() {
    let content = "word ".repeat(100);
    let re = Regex::new("absent").unwrap();
    let snippet = build_snippet(&content, &[&re]);
    assert!(snippet.ends_with("..."));
    assert!(snippet.chars().count() <= FALLBACK_SNIPPET_CHARS + 3);
}

// ─── Suggestions ─────────────────────────────────────────────────────

#[test]
fn test_suggest_prefers_smaller_distance() {
    let idx = corpus(&[("/d/a.txt", "contract contracts")]);
    assert_eq!(suggest(&idx, "contrat").as_deref(), Some("contract"));
}

#[test]
fn test_suggest_tie_breaks_by_document_frequency() {
    let idx = corpus(&[
        ("/d/a.txt", "cart"),
        ("/d/b.txt", "card"),
        ("/d/c.txt", "card"),
    ]);
    // "carx" is one edit from both; "card" is in more documents
    assert_eq!(suggest(&idx, "carx").as_deref(), Some("card"));
}

#[test]
fn test_suggest_rejects_distant_tokens() {
    let idx = corpus(&[("/d/a.txt", "spreadsheet")]);
    assert_eq!(suggest(&idx, "sheet"), None);
}
