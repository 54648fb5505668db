//! Consumer side of the worksheet API.
//!
//! [`WorksheetClient`] fetches pages from `GET /worksheets` and normalizes
//! every element locally, so the client tolerates any document shape the
//! server hands back. [`ListView`] holds the list state machine and
//! [`DetailView`] renders one selected record.
//!
//! ```text
//!            refresh            response (latest token)
//!   ┌─────────┐ ───▶ ┌─────────┐ ──────────────▶ ┌────────┐
//!   │ Loaded  │      │ Loading │                 │ Loaded │
//!   │ / Error │ ◀─── └─────────┘ ──────────────▶ │ Error  │
//!   └─────────┘                  failure         └────────┘
//! ```

use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{PaginationEnvelope, WorksheetRecord};
use crate::normalize::normalize_value;
use crate::render::render_to_terminal;

/// Thin async HTTP client for the listing endpoint.
#[derive(Debug, Clone)]
pub struct WorksheetClient {
    http: reqwest::Client,
    base_url: String,
}

impl WorksheetClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches one page. Non-2xx statuses and undecodable bodies are errors;
    /// individual items are never rejected.
    pub async fn fetch_page(&self, query: &PageQuery) -> Result<PaginationEnvelope<WorksheetRecord>> {
        let url = format!("{}/worksheets", self.base_url);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("search", search.to_string()));
        }

        tracing::debug!(url = %url, ?params, "fetching worksheets");
        let envelope: PaginationEnvelope<Value> = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?
            .json()
            .await
            .context("response is not a worksheet page")?;

        Ok(envelope.map(|item| {
            let mut record = normalize_value(&item);
            // The server substitutes a timestamp for undated documents and says so.
            if item.get("dateDefaulted").and_then(Value::as_bool) == Some(true) {
                record.created_at_defaulted = true;
            }
            record
        }))
    }
}

/// Parameters for one list fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

/// Identifies one fetch. Only the most recently issued token may update the
/// view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Loaded(PaginationEnvelope<WorksheetRecord>),
    /// Carries a message for display next to a retry action.
    Error(String),
}

/// List screen state machine: `Loading → {Loaded, Error}`, and back to
/// `Loading` on refresh.
#[derive(Debug)]
pub struct ListView {
    state: ListState,
    issued: u64,
}

impl Default for ListView {
    fn default() -> Self {
        Self::new()
    }
}

impl ListView {
    pub fn new() -> Self {
        Self {
            state: ListState::Loading,
            issued: 0,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ListState::Loading)
    }

    /// Enters `Loading` and issues a token that supersedes every earlier one.
    /// Previously shown items are discarded, never displayed as current.
    pub fn begin_refresh(&mut self) -> RequestToken {
        self.issued += 1;
        self.state = ListState::Loading;
        RequestToken(self.issued)
    }

    /// Applies a fetch result. Returns `false` and leaves the state alone
    /// when `token` is not the latest.
    pub fn complete(
        &mut self,
        token: RequestToken,
        result: Result<PaginationEnvelope<WorksheetRecord>>,
    ) -> bool {
        if token.0 != self.issued {
            tracing::debug!(stale = token.0, latest = self.issued, "dropping stale response");
            return false;
        }
        self.state = match result {
            Ok(page) => ListState::Loaded(page),
            Err(e) => ListState::Error(format!("{:#}", e)),
        };
        true
    }

    /// Runs one full fetch cycle.
    pub async fn refresh(&mut self, client: &WorksheetClient, query: &PageQuery) -> &ListState {
        let token = self.begin_refresh();
        let result = client.fetch_page(query).await;
        self.complete(token, result);
        &self.state
    }

    /// Item at `index` when loaded.
    pub fn select(&self, index: usize) -> Option<&WorksheetRecord> {
        match &self.state {
            ListState::Loaded(page) => page.items.get(index),
            _ => None,
        }
    }

    /// Text for the current state.
    pub fn render(&self) -> String {
        match &self.state {
            ListState::Loading => "Loading worksheets...\n".to_string(),
            ListState::Error(msg) => format!(
                "Could not load worksheets: {}\nRun the command again to retry.\n",
                msg
            ),
            ListState::Loaded(page) if page.items.is_empty() => "No worksheets found.\n".to_string(),
            ListState::Loaded(page) => {
                let mut out = String::new();
                for (i, record) in page.items.iter().enumerate() {
                    out.push_str(&format!(
                        "{:>3}. {}  ({})\n",
                        i + 1,
                        single_line(&record.subject),
                        record.created_at.format("%Y-%m-%d %H:%M")
                    ));
                }
                out.push_str(&format!(
                    "page {} of {} ({} worksheets)\n",
                    page.current_page, page.total_pages, page.total_items
                ));
                out
            }
        }
    }
}

/// Stateless render of one record.
pub struct DetailView<'a> {
    record: &'a WorksheetRecord,
}

impl<'a> DetailView<'a> {
    pub fn new(record: &'a WorksheetRecord) -> Self {
        Self { record }
    }

    pub fn render(&self) -> String {
        let r = self.record;
        let mut out = String::new();
        out.push_str(&single_line(&r.subject));
        out.push('\n');

        let date = if r.created_at_defaulted {
            "date unknown".to_string()
        } else {
            r.created_at.format("%Y-%m-%d %H:%M UTC").to_string()
        };
        match &r.user_email {
            Some(email) => out.push_str(&format!("{} · {}\n", date, single_line(email))),
            None => out.push_str(&format!("{}\n", date)),
        }
        out.push('\n');
        out.push_str(&render_to_terminal(&r.content));
        out
    }
}

/// Collapses whitespace and drops control characters from short fields.
fn single_line(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}
