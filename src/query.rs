//! Content query engine: term matching, TF-IDF scoring, snippet extraction
//! and a single round of spelling fallback.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::SearchError;
use crate::generate_trigrams;
use crate::index::{ContentIndex, DocumentRecord};
use crate::DEFAULT_MIN_TOKEN_LEN;

/// Characters of context kept on each side of a match in a snippet.
const FRAGMENT_CONTEXT: usize = 40;
/// Number of fragments kept per snippet.
const MAX_FRAGMENTS: usize = 5;
/// Length of the plain-prefix snippet used when nothing can be highlighted.
const FALLBACK_SNIPPET_CHARS: usize = 200;
/// Upper bound on matches scanned per document while building a snippet.
const MAX_SNIPPET_MATCHES: usize = 1000;
/// Maximum edit distance accepted for a spelling suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 2;
/// Words up to this length are compared against the whole vocabulary.
const SHORT_WORD_CHARS: usize = 4;

/// A scored content hit: the document's metadata plus score and snippet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawHit {
    pub path: String,
    pub filename: String,
    pub filetype: String,
    pub modified: String,
    pub size_bytes: u64,
    pub score: f64,
    pub snippet: String,
}

/// An OR query over comma-separated terms.
///
/// A term with several words matches only where all words occur in
/// sequence. Without `whole_word`, each word also matches indexed tokens it
/// is a prefix of. With `case_sensitive`, the exact letter case must occur
/// in the stored text.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub terms: Vec<String>,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// One compiled query term.
struct TermMatcher {
    /// Lowercased words looked up in the inverted index.
    words: Vec<String>,
    /// Verifies sequence / case against stored content and locates
    /// snippet regions.
    regex: Regex,
    /// Whether the index lookup alone is not sufficient.
    verify: bool,
    /// Exact token lookup, no prefix expansion.
    exact: bool,
}

impl ContentQuery {
    pub fn new<S: Into<String>>(terms: impl IntoIterator<Item = S>) -> Self {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn whole_word(mut self, yes: bool) -> Self {
        self.whole_word = yes;
        self
    }

    /// Top `limit` hits, best first.
    pub fn search(&self, index: &ContentIndex, limit: usize) -> Result<Vec<RawHit>, SearchError> {
        self.search_filtered(index, limit, &|_| true)
    }

    /// Top `limit` hits accepted by `accept`, best first.
    ///
    /// When the query matches no document at all (before filtering), each
    /// term is replaced by its closest vocabulary spelling and the search
    /// runs once more. The corrected query never falls back again.
    pub fn search_filtered(
        &self,
        index: &ContentIndex,
        limit: usize,
        accept: &dyn Fn(&DocumentRecord) -> bool,
    ) -> Result<Vec<RawHit>, SearchError> {
        let matchers = self.compile()?;
        let ranked = rank(index, &matchers);
        if !ranked.is_empty() {
            return Ok(assemble(index, &matchers, &ranked, limit, accept));
        }

        let Some(corrected) = self.corrected(index) else {
            return Ok(Vec::new());
        };
        debug!(original = ?self.terms, suggested = ?corrected.terms, "No hits, retrying with spelling suggestions");
        let matchers = corrected.compile()?;
        let ranked = rank(index, &matchers);
        Ok(assemble(index, &matchers, &ranked, limit, accept))
    }

    fn compile(&self) -> Result<Vec<TermMatcher>, SearchError> {
        let mut matchers = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let original = term_words(term);
            if original.is_empty() {
                continue;
            }
            let body = original
                .iter()
                .map(|w| {
                    let tail = if self.whole_word { r"\b" } else { r"\w*" };
                    format!(r"\b{}{}", regex::escape(w), tail)
                })
                .collect::<Vec<_>>()
                .join(r"\W+");
            let pattern = if self.case_sensitive { body } else { format!("(?i){}", body) };
            let regex = Regex::new(&pattern).map_err(|e| SearchError::InvalidRegex {
                pattern: pattern.clone(),
                source: e,
            })?;
            matchers.push(TermMatcher {
                words: original.iter().map(|w| w.to_lowercase()).collect(),
                regex,
                verify: self.case_sensitive || original.len() > 1,
                exact: self.whole_word,
            });
        }
        Ok(matchers)
    }

    /// Replace every term by its best spelling suggestion. `None` when no
    /// term can be corrected into something different.
    fn corrected(&self, index: &ContentIndex) -> Option<ContentQuery> {
        let mut changed = false;
        let mut terms = Vec::new();
        for term in &self.terms {
            let words = term_words(term);
            if words.is_empty() {
                continue;
            }
            let mut fixed = Vec::with_capacity(words.len());
            for word in &words {
                let lower = word.to_lowercase();
                match suggest(index, &lower) {
                    Some(s) => {
                        changed |= s != lower;
                        fixed.push(s);
                    }
                    None => {
                        fixed.clear();
                        break;
                    }
                }
            }
            if !fixed.is_empty() {
                terms.push(fixed.join(" "));
            }
        }
        // Suggestions come from the lowercased vocabulary.
        (changed && !terms.is_empty()).then(|| ContentQuery {
            terms,
            case_sensitive: false,
            whole_word: self.whole_word,
        })
    }
}

/// Split a term into words the same way the tokenizer does, keeping case.
fn term_words(term: &str) -> Vec<String> {
    term.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|s| s.len() >= DEFAULT_MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Indexed tokens a query word matches: itself, plus every token it is a
/// prefix of unless `whole_word`.
fn expand<'a>(index: &'a ContentIndex, word: &str, whole_word: bool) -> Vec<&'a str> {
    if whole_word {
        return index
            .index
            .get_key_value(word)
            .map(|(k, _)| vec![k.as_str()])
            .unwrap_or_default();
    }
    index
        .index
        .range::<str, _>((std::ops::Bound::Included(word), std::ops::Bound::Unbounded))
        .map(|(k, _)| k.as_str())
        .take_while(|k| k.starts_with(word))
        .collect()
}

/// Documents matching any term, scored by summed TF-IDF, best first.
fn rank(index: &ContentIndex, matchers: &[TermMatcher]) -> Vec<(u32, f64)> {
    let total_docs = index.len().max(1) as f64;
    let mut scores: HashMap<u32, f64> = HashMap::new();

    for matcher in matchers {
        // doc_id → (words matched, score)
        let mut per_doc: HashMap<u32, (usize, f64)> = HashMap::new();
        for word in &matcher.words {
            let mut word_scores: HashMap<u32, f64> = HashMap::new();
            for token in expand(index, word, matcher.exact) {
                let Some(postings) = index.index.get(token) else { continue };
                let idf = (1.0 + total_docs / postings.len() as f64).ln();
                for posting in postings {
                    let doc_total = index
                        .doc_token_counts
                        .get(posting.doc_id as usize)
                        .copied()
                        .unwrap_or(1)
                        .max(1) as f64;
                    *word_scores.entry(posting.doc_id).or_insert(0.0) += posting.tf as f64 / doc_total * idf;
                }
            }
            for (doc_id, s) in word_scores {
                let entry = per_doc.entry(doc_id).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += s;
            }
        }

        let needed = matcher.words.len();
        for (doc_id, (matched, score)) in per_doc {
            if matched < needed {
                continue;
            }
            if matcher.verify {
                let Some(doc) = index.document(doc_id) else { continue };
                if !matcher.regex.is_match(&doc.content) {
                    continue;
                }
            }
            *scores.entry(doc_id).or_insert(0.0) += score;
        }
    }

    let mut ranked: Vec<(u32, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let pa = index.document(a.0).map(|d| d.path.as_str());
                let pb = index.document(b.0).map(|d| d.path.as_str());
                pa.cmp(&pb)
            })
    });
    ranked
}

fn assemble(
    index: &ContentIndex,
    matchers: &[TermMatcher],
    ranked: &[(u32, f64)],
    limit: usize,
    accept: &dyn Fn(&DocumentRecord) -> bool,
) -> Vec<RawHit> {
    let regexes: Vec<&Regex> = matchers.iter().map(|m| &m.regex).collect();
    ranked
        .iter()
        .filter_map(|&(doc_id, score)| index.document(doc_id).map(|d| (d, score)))
        .filter(|(doc, _)| accept(doc))
        .take(limit)
        .map(|(doc, score)| RawHit {
            path: doc.path.clone(),
            filename: doc.filename.clone(),
            filetype: doc.filetype.clone(),
            modified: doc.modified.clone(),
            size_bytes: doc.size_bytes,
            score,
            snippet: build_snippet(&doc.content, &regexes),
        })
        .collect()
}

// ─── Snippets ────────────────────────────────────────────────────────

/// Highlight-style excerpt of `content` around matches of `regexes`:
/// up to the five densest fragments in document order, joined with `...`
/// and collapsed to a single line. Falls back to the first 200 characters.
pub fn build_snippet(content: &str, regexes: &[&Regex]) -> String {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for re in regexes {
        spans.extend(
            re.find_iter(content)
                .take(MAX_SNIPPET_MATCHES)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end())),
        );
    }
    if spans.is_empty() {
        return fallback_snippet(content);
    }
    spans.sort_unstable();

    // (start, end, match count); overlapping windows merge
    let mut fragments: Vec<(usize, usize, usize)> = Vec::new();
    for (start, end) in spans {
        let lo = back_chars(content, start, FRAGMENT_CONTEXT);
        let hi = forward_chars(content, end, FRAGMENT_CONTEXT);
        match fragments.last_mut() {
            Some(last) if lo <= last.1 => {
                last.1 = last.1.max(hi);
                last.2 += 1;
            }
            _ => fragments.push((lo, hi, 1)),
        }
    }

    let mut best: Vec<(usize, usize, usize)> = fragments;
    best.sort_by_key(|&(start, _, count)| (Reverse(count), start));
    best.truncate(MAX_FRAGMENTS);
    best.sort_by_key(|&(start, _, _)| start);

    let joined = best
        .iter()
        .map(|&(s, e, _)| collapse_whitespace(&content[s..e]))
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join("...");
    if joined.is_empty() {
        fallback_snippet(content)
    } else {
        joined
    }
}

fn fallback_snippet(content: &str) -> String {
    let prefix: String = content.chars().take(FALLBACK_SNIPPET_CHARS).collect();
    format!("{}...", collapse_whitespace(&prefix))
}

/// Byte offset `n` characters before `pos` (clamped to 0).
fn back_chars(s: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    s[..pos].char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i)
}

/// Byte offset `n` characters after `pos` (clamped to the end).
fn forward_chars(s: &str, pos: usize, n: usize) -> usize {
    s[pos..].char_indices().nth(n).map_or(s.len(), |(i, _)| pos + i)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ─── Spelling suggestions ────────────────────────────────────────────

/// Closest vocabulary token to `word` within edit distance 2. Ties go to
/// the token found in more documents, then to the lexically smaller one.
pub fn suggest(index: &ContentIndex, word: &str) -> Option<String> {
    let vocab = &index.trigram.tokens;
    let word_len = word.chars().count();

    // Short words share too few trigrams with their misspellings
    let candidates: BTreeSet<u32> = if word_len <= SHORT_WORD_CHARS {
        (0..vocab.len() as u32).collect()
    } else {
        generate_trigrams(word)
            .iter()
            .filter_map(|t| index.trigram.trigram_map.get(t))
            .flatten()
            .copied()
            .collect()
    };

    candidates
        .into_iter()
        .filter_map(|i| vocab.get(i as usize))
        .filter(|t| t.chars().count().abs_diff(word_len) <= MAX_SUGGESTION_DISTANCE)
        .map(|t| (strsim::levenshtein(word, t), t))
        .filter(|(d, _)| *d <= MAX_SUGGESTION_DISTANCE)
        .min_by(|(da, ta), (db, tb)| {
            da.cmp(db)
                .then_with(|| index.doc_freq(tb).cmp(&index.doc_freq(ta)))
                .then_with(|| ta.cmp(tb))
        })
        .map(|(_, t)| t.clone())
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
