//! Unified post-query filter applied to both filename and content hits:
//! date range, size range, extension set and result cap.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::cache::MTIME_FORMAT;
use crate::error::SearchError;
use crate::everything::RawItem;
use crate::file_extension;
use crate::index::DocumentRecord;
use crate::types::QueryDescriptor;

/// 100ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: i128 = 116_444_736_000_000_000;
const FILETIME_TICKS_PER_SEC: i128 = 10_000_000;

/// Parse a modification timestamp in any of the shapes the backends emit,
/// tried in order: Windows FILETIME integer, ISO-8601,
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, Unix epoch seconds (float).
/// Epoch-based values are converted to local time.
pub fn parse_modified(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        let ticks: i128 = s.parse().ok()?;
        let since_epoch = ticks - FILETIME_UNIX_EPOCH;
        let secs = i64::try_from(since_epoch.div_euclid(FILETIME_TICKS_PER_SEC)).ok()?;
        let nanos = (since_epoch.rem_euclid(FILETIME_TICKS_PER_SEC) * 100) as u32;
        return local_from_epoch(secs, nanos);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", MTIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN));
    }
    let epoch: f64 = s.parse().ok()?;
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9) as u32;
    local_from_epoch(secs as i64, nanos)
}

fn local_from_epoch(secs: i64, nanos: u32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.with_timezone(&Local).naive_local())
}

/// Render a parsed timestamp the way results report it.
pub fn format_modified(dt: &NaiveDateTime) -> String {
    dt.format(MTIME_FORMAT).to_string()
}

/// Resolved inclusive date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl DateBounds {
    pub fn is_active(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn contains(&self, t: &NaiveDateTime) -> bool {
        self.from.is_none_or(|f| *t >= f) && self.to.is_none_or(|to| *t <= to)
    }
}

fn parse_bound(raw: &str, field: &str) -> Result<NaiveDateTime, SearchError> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", MTIME_FORMAT] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    Err(SearchError::validation(format!("Invalid {}: expected YYYY-MM-DD", field)))
}

/// Resolve `date_from`/`date_to` against `now`.
///
/// `date_to` on today's date becomes `now`; any other day becomes 23:59:59
/// of that day. Neither bound may lie in the future and `from` may not be
/// after `to`.
pub fn resolve_date_bounds(
    date_from: Option<&str>,
    date_to: Option<&str>,
    now: NaiveDateTime,
) -> Result<DateBounds, SearchError> {
    let from = match date_from.filter(|s| !s.trim().is_empty()) {
        Some(raw) => {
            let from = parse_bound(raw, "date_from")?;
            if from > now {
                return Err(SearchError::validation("date_from cannot exceed today's date"));
            }
            Some(from)
        }
        None => None,
    };

    let to = match date_to.filter(|s| !s.trim().is_empty()) {
        Some(raw) => {
            let day = parse_bound(raw, "date_to")?.date();
            let to = if day == now.date() {
                now
            } else {
                day.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
            };
            if to > now {
                return Err(SearchError::validation("date_to cannot exceed today's date"));
            }
            Some(to)
        }
        None => None,
    };

    if let (Some(f), Some(t)) = (from, to)
        && f > t
    {
        return Err(SearchError::validation("date_from cannot be greater than date_to"));
    }
    Ok(DateBounds { from, to })
}

/// Uniform view of a hit for filtering.
pub trait FilterCandidate {
    /// Raw modification timestamp, if known.
    fn modified_raw(&self) -> Option<&str>;
    fn size_bytes(&self) -> Option<u64>;
    /// Lowercased extension without the dot.
    fn extension(&self) -> Option<String>;
}

impl FilterCandidate for RawItem {
    fn modified_raw(&self) -> Option<&str> {
        self.modified.as_deref()
    }

    fn size_bytes(&self) -> Option<u64> {
        self.size
    }

    fn extension(&self) -> Option<String> {
        file_extension(std::path::Path::new(&self.name))
    }
}

impl FilterCandidate for DocumentRecord {
    fn modified_raw(&self) -> Option<&str> {
        Some(&self.modified)
    }

    fn size_bytes(&self) -> Option<u64> {
        Some(self.size_bytes)
    }

    fn extension(&self) -> Option<String> {
        Some(self.filetype.clone())
    }
}

/// Date/size/extension/result-count constraints resolved once per query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFilter {
    pub dates: DateBounds,
    /// Inclusive byte bounds.
    pub size_from: Option<u64>,
    pub size_to: Option<u64>,
    /// `None` means every extension is accepted.
    pub file_types: Option<Vec<String>>,
    pub max_results: usize,
}

fn kb_to_bytes(kb: Option<f64>, field: &str) -> Result<Option<u64>, SearchError> {
    match kb {
        None => Ok(None),
        Some(v) if !v.is_finite() || v < 0.0 => {
            Err(SearchError::validation(format!("{} must be a non-negative number of KB", field)))
        }
        Some(v) => Ok(Some((v * 1024.0) as u64)),
    }
}

impl ResultFilter {
    /// Validate and resolve the constraints of `query` at time `now`.
    pub fn from_query(query: &QueryDescriptor, now: NaiveDateTime) -> Result<Self, SearchError> {
        let dates = resolve_date_bounds(query.date_from.as_deref(), query.date_to.as_deref(), now)?;
        let size_from = kb_to_bytes(query.size_from, "size_from")?;
        let size_to = kb_to_bytes(query.size_to, "size_to")?;
        if let (Some(f), Some(t)) = (size_from, size_to)
            && f > t
        {
            return Err(SearchError::validation("size_from cannot be greater than size_to"));
        }
        Ok(Self {
            dates,
            size_from,
            size_to,
            file_types: query.restricted_types(),
            max_results: query.max_results.max(1),
        })
    }

    /// Filter that accepts everything, capped at `max_results`.
    pub fn unrestricted(max_results: usize) -> Self {
        Self {
            dates: DateBounds::default(),
            size_from: None,
            size_to: None,
            file_types: None,
            max_results,
        }
    }

    pub fn accepts<C: FilterCandidate + ?Sized>(&self, hit: &C) -> bool {
        if self.size_from.is_some() || self.size_to.is_some() {
            let Some(size) = hit.size_bytes() else { return false };
            if self.size_from.is_some_and(|f| size < f) || self.size_to.is_some_and(|t| size > t) {
                return false;
            }
        }

        if self.dates.is_active() {
            let Some(modified) = hit.modified_raw().and_then(parse_modified) else {
                return false;
            };
            if !self.dates.contains(&modified) {
                return false;
            }
        }

        if let Some(types) = &self.file_types {
            match hit.extension() {
                Some(ext) if types.contains(&ext) => {}
                _ => return false,
            }
        }
        true
    }

    /// Accepted hits in input order, stopping once `max_results` are
    /// collected.
    pub fn apply<C: FilterCandidate>(&self, hits: impl IntoIterator<Item = C>) -> Vec<C> {
        hits.into_iter()
            .filter(|h| self.accepts(h))
            .take(self.max_results)
            .collect()
    }
}
