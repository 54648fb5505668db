//! Request parameters → store filter, sort and window.
//!
//! Parameters arrive as optional strings from the transport layer and are
//! parsed leniently: anything that does not yield a usable integer falls
//! back to a default instead of failing the request.

use chrono::{DateTime, Duration, Utc};

use crate::models::fields;

/// Store-side predicate over raw document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Case-insensitive substring match on a string field.
    Contains { field: String, needle: String },
    /// Logical OR.
    Any(Vec<Filter>),
    /// `field` holds a date string (`YYYY-MM-DD...`) naming an instant at
    /// or after `cutoff`. Any other value, including non-string dates,
    /// does not match.
    Since {
        field: String,
        cutoff: DateTime<Utc>,
    },
}

impl Filter {
    fn contains(field: &str, needle: &str) -> Self {
        Filter::Contains {
            field: field.to_string(),
            needle: needle.to_string(),
        }
    }

    fn contains_any(sources: &[&str], needle: &str) -> Self {
        Filter::Any(sources.iter().map(|f| Filter::contains(f, needle)).collect())
    }
}

/// Sort and window for a `find`. Sorting is always descending.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    pub sort_field: String,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Raw paging parameters, as they come off the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl PageRequest {
    pub fn new(page: Option<&str>, limit: Option<&str>, search: Option<&str>) -> Self {
        Self {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
            search: search.map(str::to_string),
        }
    }

    /// Builds a request from decoded query pairs. The first occurrence of a
    /// key wins; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut req = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut req.page,
                "limit" => &mut req.limit,
                "search" => &mut req.search,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        req
    }
}

/// A fully resolved query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub options: FindOptions,
    /// Page as parsed. May be zero or negative; `options.skip` is clamped.
    pub page: i64,
    pub limit: i64,
}

impl ListQuery {
    /// Main listing. `search` matches the subject sources OR the content
    /// sources.
    pub fn worksheets(req: &PageRequest, default_limit: i64) -> Self {
        let filter = match req.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => Filter::Any(vec![
                Filter::contains_any(&fields::SUBJECT_SOURCES, term),
                Filter::contains_any(&fields::CONTENT_SOURCES, term),
            ]),
            _ => Filter::All,
        };
        Self::paged(filter, req, default_limit)
    }

    /// Listing scoped to a subject taken from the path.
    pub fn by_subject(subject: &str, req: &PageRequest, default_limit: i64) -> Self {
        let filter = Filter::contains_any(&fields::SUBJECT_SOURCES, subject);
        Self::paged(filter, req, default_limit)
    }

    /// Documents whose raw `createdAt` falls within the last `days` days.
    /// The limit is fixed to `cap` whatever the caller asked for.
    pub fn recent(days: Option<&str>, default_days: i64, cap: i64, now: DateTime<Utc>) -> Self {
        let days = parse_int(days).unwrap_or(default_days);
        let cutoff = Duration::try_days(days)
            .and_then(|d| now.checked_sub_signed(d))
            .or_else(|| Duration::try_days(default_days).and_then(|d| now.checked_sub_signed(d)))
            .unwrap_or(now);

        Self {
            filter: Filter::Since {
                field: fields::CREATED_AT.to_string(),
                cutoff,
            },
            options: FindOptions {
                sort_field: fields::CREATED_AT.to_string(),
                skip: 0,
                limit: Some(cap.max(1) as u64),
            },
            page: 1,
            limit: cap,
        }
    }

    fn paged(filter: Filter, req: &PageRequest, default_limit: i64) -> Self {
        let page = parse_int(req.page.as_deref()).unwrap_or(1);
        let limit = parse_int(req.limit.as_deref())
            .filter(|l| *l >= 1)
            .unwrap_or(default_limit);

        Self {
            filter,
            options: FindOptions {
                sort_field: fields::CREATED_AT.to_string(),
                skip: skip_for(page, limit),
                limit: Some(limit as u64),
            },
            page,
            limit,
        }
    }
}

/// `(page - 1) * limit`, clamped at zero.
pub fn skip_for(page: i64, limit: i64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit).max(0) as u64
}

/// Reads a leading integer the way a lenient form parser would: optional
/// whitespace and sign, then digits; trailing garbage is ignored. Returns
/// `None` when no digits lead the input.
pub fn parse_int(raw: Option<&str>) -> Option<i64> {
    let s = raw?.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| n * sign)
}
