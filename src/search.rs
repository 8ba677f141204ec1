use std::collections::HashSet;
use std::fmt;

use crate::error::RemoteError;
use crate::remote::{RawCase, RemoteClient, SearchRequest, SHORT_CASE_COLUMNS};
use crate::ui;

/// The few fields needed to list a case.
#[derive(Debug, Clone)]
pub struct ShortCase {
    pub id: u64,
    pub status: String,
    pub title: String,
    pub project: String,
    pub priority: String,
    pub priority_rank: u32,
}

impl PartialEq for ShortCase {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ShortCase {}

impl From<RawCase> for ShortCase {
    fn from(raw: RawCase) -> Self {
        Self {
            id: raw.id,
            status: raw.status,
            title: raw.title,
            project: raw.project,
            priority: raw.priority,
            priority_rank: raw.priority_rank,
        }
    }
}

impl ShortCase {
    fn sort_key(&self) -> (u32, &str, u64) {
        (self.priority_rank, self.project.as_str(), self.id)
    }
}

impl fmt::Display for ShortCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            ui::case_id_padded(self.id, 8),
            ui::status(&ui::ltrunc(&self.status, 20)),
            ui::priority(&ui::ltrunc(&self.priority, 18)),
            ui::title(&self.title)
        )
    }
}

/// A search result: unique cases, most urgent first, grouped by project.
#[derive(Debug, Clone, Default)]
pub struct CaseSearch {
    pub cases: Vec<ShortCase>,
}

impl CaseSearch {
    /// Deduplicates by id, keeping the first occurrence, then sorts by
    /// priority rank, project and id.
    pub fn from_cases(cases: impl IntoIterator<Item = ShortCase>) -> Self {
        let mut seen = HashSet::new();
        let mut cases: Vec<_> = cases.into_iter().filter(|c| seen.insert(c.id)).collect();
        cases.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self { cases }
    }

    pub fn search(remote: &mut dyn RemoteClient, query: &str) -> Result<Self, RemoteError> {
        tracing::debug!(query, "searching");
        let found = remote.search(&SearchRequest::new(query, SHORT_CASE_COLUMNS))?;
        Ok(Self::from_cases(found.into_iter().map(ShortCase::from)))
    }

    /// The current filter's cases, at most `max` of them.
    pub fn top(remote: &mut dyn RemoteClient, max: u32) -> Result<Self, RemoteError> {
        tracing::debug!(max, "listing top cases");
        let request = SearchRequest::new("", SHORT_CASE_COLUMNS).with_max(max);
        let found = remote.search(&request)?;
        Ok(Self::from_cases(found.into_iter().map(ShortCase::from)))
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.cases.iter().map(|c| c.id)
    }
}

impl fmt::Display for CaseSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for case in &self.cases {
            writeln!(f, "{case}")?;
        }
        write!(f, "{} case(s) found.", self.cases.len())
    }
}

/// Joins search arguments into a query. A `key=value` token becomes
/// `key:value`.
pub fn build_query(args: &[String]) -> String {
    args.iter()
        .map(|token| match (token.find('='), token.find(':')) {
            (Some(eq), colon) if eq > 0 && colon.map_or(true, |c| c > eq) => {
                format!("{}:{}", &token[..eq], &token[eq + 1..])
            }
            _ => token.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
