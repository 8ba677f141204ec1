//! The tracker interface the rest of the client talks to.
//!
//! Payload structs mirror the FogBugz JSON field names. Most fields are
//! optional on the wire, so they default to empty rather than failing the
//! whole response.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

use crate::error::RemoteError;

/// Columns requested when fetching a full case.
pub const CASE_COLUMNS: &[&str] = &[
    "sTitle",
    "sStatus",
    "sPersonAssignedTo",
    "ixPersonOpenedBy",
    "ixPriority",
    "sPriority",
    "sProject",
    "sArea",
    "sFixFor",
    "sCategory",
    "ixBugParent",
    "ixBugChildren",
    "ixBugOriginal",
    "ixBugDuplicates",
    "ixRelatedBugs",
    "ixBugEventLatest",
    "tags",
    "operations",
    "events",
];

/// Columns requested for search listings.
pub const SHORT_CASE_COLUMNS: &[&str] = &[
    "ixBug",
    "sTitle",
    "sStatus",
    "sProject",
    "sPriority",
    "ixPriority",
];

/// A mutating call on an existing case. The API command and the operation
/// the case must advertise share the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseAction {
    Resolve,
    Reopen,
    Reactivate,
    Close,
    Assign,
    Edit,
}

impl CaseAction {
    pub fn name(self) -> &'static str {
        match self {
            CaseAction::Resolve => "resolve",
            CaseAction::Reopen => "reopen",
            CaseAction::Reactivate => "reactivate",
            CaseAction::Close => "close",
            CaseAction::Assign => "assign",
            CaseAction::Edit => "edit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub cols: &'static [&'static str],
    pub max: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, cols: &'static [&'static str]) -> Self {
        Self {
            query: query.into(),
            cols,
            max: None,
        }
    }

    pub fn with_max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonKey {
    Id(u64),
    Email(String),
}

/// A file sent along with an edit or a new case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Parameters for `edit`, `resolve`, `new` and friends.
///
/// The API treats an explicit empty value differently from a missing one,
/// so [`EditParams::set`] drops blank values instead of storing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditParams {
    fields: BTreeMap<String, String>,
    uploads: Vec<Upload>,
}

impl EditParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if value.trim().is_empty() {
            self.fields.remove(key);
        } else {
            self.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn attach(&mut self, uploads: Vec<Upload>) -> &mut Self {
        self.uploads.extend(uploads);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCase {
    #[serde(rename = "ixBug")]
    pub id: u64,
    #[serde(rename = "sTitle", default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(rename = "sStatus", default, deserialize_with = "null_default")]
    pub status: String,
    #[serde(rename = "sPriority", default, deserialize_with = "null_default")]
    pub priority: String,
    #[serde(rename = "ixPriority", default, deserialize_with = "null_default")]
    pub priority_rank: u32,
    #[serde(rename = "sProject", default, deserialize_with = "null_default")]
    pub project: String,
    #[serde(rename = "sArea", default, deserialize_with = "null_default")]
    pub area: String,
    #[serde(rename = "sFixFor", default, deserialize_with = "null_default")]
    pub milestone: String,
    #[serde(rename = "sCategory", default, deserialize_with = "null_default")]
    pub category: String,
    #[serde(rename = "sPersonAssignedTo", default, deserialize_with = "null_default")]
    pub assigned_to: String,
    #[serde(rename = "ixPersonOpenedBy", default, deserialize_with = "null_default")]
    pub opened_by: u64,
    #[serde(rename = "ixBugParent", default, deserialize_with = "null_default")]
    pub parent: u64,
    #[serde(rename = "ixBugChildren", default, deserialize_with = "id_list")]
    pub children: Vec<u64>,
    #[serde(rename = "ixBugOriginal", default, deserialize_with = "null_default")]
    pub duplicate_of: u64,
    #[serde(rename = "ixBugDuplicates", default, deserialize_with = "id_list")]
    pub duplicates: Vec<u64>,
    #[serde(rename = "ixRelatedBugs", default, deserialize_with = "id_list")]
    pub related: Vec<u64>,
    #[serde(rename = "ixBugEventLatest", default, deserialize_with = "null_default")]
    pub latest_event: u64,
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub operations: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "ixBugEvent")]
    pub id: u64,
    #[serde(rename = "dt", default, deserialize_with = "null_default")]
    pub timestamp: String,
    #[serde(rename = "sPerson", default, deserialize_with = "null_default")]
    pub person: String,
    #[serde(rename = "evtDescription", default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(rename = "s", default, deserialize_with = "null_default")]
    pub text: String,
    #[serde(rename = "sHtml", default, deserialize_with = "null_default")]
    pub html: String,
    #[serde(rename = "fHtml", default, deserialize_with = "null_default")]
    pub is_html: bool,
    #[serde(rename = "sChanges", default, deserialize_with = "null_default")]
    pub changes: String,
    #[serde(rename = "rgAttachments", default, deserialize_with = "null_default")]
    pub attachments: Vec<RawAttachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAttachment {
    #[serde(rename = "sFileName", default, deserialize_with = "null_default")]
    pub file_name: String,
    #[serde(rename = "sURL", default, deserialize_with = "null_default")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPerson {
    #[serde(rename = "ixPerson")]
    pub id: u64,
    #[serde(rename = "sFullName", default, deserialize_with = "null_default")]
    pub full_name: String,
    #[serde(rename = "sEmail", default, deserialize_with = "null_default")]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProject {
    #[serde(rename = "ixProject")]
    pub id: u64,
    #[serde(rename = "sProject", default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "sPersonOwner", default, deserialize_with = "null_default")]
    pub owner: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArea {
    #[serde(rename = "ixArea")]
    pub id: u64,
    #[serde(rename = "sArea", default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "sProject", default, deserialize_with = "null_default")]
    pub project: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMilestone {
    #[serde(rename = "ixFixFor")]
    pub id: u64,
    #[serde(rename = "sFixFor", default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "sProject", default, deserialize_with = "null_default")]
    pub project: String,
    #[serde(rename = "dt", default, deserialize_with = "null_default")]
    pub due: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatus {
    #[serde(rename = "ixStatus")]
    pub id: u64,
    #[serde(rename = "sStatus", default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "ixCategory", default, deserialize_with = "null_default")]
    pub category: u64,
    #[serde(rename = "fResolved", default, deserialize_with = "null_default")]
    pub resolved: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCheckin {
    #[serde(rename = "sRepo", alias = "repo", default, deserialize_with = "null_default")]
    pub repo: String,
    #[serde(rename = "sRevision", alias = "rev", default, deserialize_with = "null_default")]
    pub revision: String,
    #[serde(rename = "sAuthor", alias = "author", default, deserialize_with = "null_default")]
    pub author: String,
    #[serde(
        rename = "sDescription",
        alias = "description",
        default,
        deserialize_with = "null_default"
    )]
    pub description: String,
    #[serde(rename = "sUrl", alias = "url", default, deserialize_with = "null_default")]
    pub url: String,
}

/// Everything the client needs from the tracker.
pub trait RemoteClient {
    fn login(&mut self) -> Result<(), RemoteError>;
    fn logout(&mut self) -> Result<(), RemoteError>;
    /// Login name (an e-mail address for FogBugz).
    fn current_user(&self) -> &str;
    fn current_token(&self) -> Option<&str>;
    fn full_url(&self, path: &str) -> String;

    fn full_url_with_token(&self, path: &str) -> String {
        let url = self.full_url(path);
        match self.current_token() {
            Some(token) => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{url}{sep}token={token}")
            }
            None => url,
        }
    }

    fn search(&mut self, request: &SearchRequest) -> Result<Vec<RawCase>, RemoteError>;
    fn edit_case(&mut self, action: CaseAction, params: &EditParams) -> Result<(), RemoteError>;
    /// Creates a case and returns its id.
    fn new_case(&mut self, params: &EditParams) -> Result<u64, RemoteError>;
    fn view_person(&mut self, key: &PersonKey) -> Result<RawPerson, RemoteError>;
    fn list_people(&mut self) -> Result<Vec<RawPerson>, RemoteError>;
    fn list_projects(&mut self) -> Result<Vec<RawProject>, RemoteError>;
    fn list_areas(&mut self, project: Option<&str>) -> Result<Vec<RawArea>, RemoteError>;
    fn list_milestones(&mut self, project: Option<&str>) -> Result<Vec<RawMilestone>, RemoteError>;
    fn list_statuses(&mut self) -> Result<Vec<RawStatus>, RemoteError>;
    /// Ids of the cases the user starred.
    fn favorites(&mut self) -> Result<Vec<u64>, RemoteError>;
    fn favorite(&mut self, case: u64, category: &str) -> Result<(), RemoteError>;
    fn unfavorite(&mut self, case: u64, category: &str) -> Result<(), RemoteError>;
    fn notify(&mut self, case: u64, latest_event: u64, person: u64) -> Result<(), RemoteError>;
    /// Replaces the text of an existing event.
    fn amend(&mut self, case: u64, event: u64, text: &str) -> Result<(), RemoteError>;
    fn checkins(&mut self, case: u64) -> Result<Vec<RawCheckin>, RemoteError>;
}

/// Joins `path` onto `base`, tolerating slashes on either side.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv<T> {
    List(Vec<T>),
    Csv(String),
}

/// Accepts `[1, 2]`, `"1,2"` or `null`.
fn id_list<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ListOrCsv<u64>>::deserialize(deserializer)? {
        Some(ListOrCsv::List(ids)) => ids,
        Some(ListOrCsv::Csv(csv)) => csv
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
        None => Vec::new(),
    })
}

/// Accepts `["a", "b"]`, `"a,b"` or `null`.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ListOrCsv<String>>::deserialize(deserializer)? {
        Some(ListOrCsv::List(items)) => items,
        Some(ListOrCsv::Csv(csv)) => csv
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect(),
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_tolerates_slashes() {
        let expected = "http://fogbugz.com/a/b/c";
        for base in ["http://fogbugz.com", "http://fogbugz.com/"] {
            assert_eq!(join_url(base, "a/b/c"), expected);
            assert_eq!(join_url(base, "/a/b/c"), expected);
        }
    }

    #[test]
    fn test_edit_params_drop_blank_values() {
        let mut params = EditParams::new();
        params.set("sEvent", "").set("sTitle", "Fix it").set("sTags", "   ");
        assert_eq!(params.get("sEvent"), None);
        assert_eq!(params.get("sTags"), None);
        assert_eq!(params.get("sTitle"), Some("Fix it"));

        params.set("sTitle", "");
        assert!(params.fields().is_empty());
    }

    #[test]
    fn test_raw_case_accepts_csv_and_null_fields() {
        let json = r#"{
            "ixBug": 42,
            "sTitle": "Crash on save",
            "sFixFor": null,
            "ixBugChildren": "7, 8,",
            "ixRelatedBugs": [3],
            "tags": "ui,crash",
            "operations": ["edit", "resolve"],
            "events": null
        }"#;
        let case: RawCase = serde_json::from_str(json).unwrap();
        assert_eq!(case.id, 42);
        assert_eq!(case.milestone, "");
        assert_eq!(case.children, vec![7, 8]);
        assert_eq!(case.related, vec![3]);
        assert_eq!(case.tags, vec!["ui", "crash"]);
        assert_eq!(case.operations, vec!["edit", "resolve"]);
        assert!(case.events.is_empty());
    }
}
