//! Cases and their events.
//!
//! A [`Case`] is never edited locally. Every mutation is sent to the tracker
//! and the case is then fetched again, so what is shown always reflects the
//! server's view (new status, new event, new set of operations).

use chrono::{DateTime, Local, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::error::{CliError, RemoteError};
use crate::links::{self, Link, LinkKind, UrlMatch};
use crate::person::Person;
use crate::remote::{
    CaseAction, EditParams, RawAttachment, RawCase, RawEvent, RemoteClient, SearchRequest,
    CASE_COLUMNS,
};
use crate::search::ShortCase;
use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub file_name: String,
    /// Path relative to the tracker root.
    pub url: String,
}

impl Attachment {
    fn from_raw(raw: RawAttachment) -> Self {
        let url = links::unescape_html(&raw.url);
        Self {
            id: attachment_id(&url),
            file_name: links::unescape_html(&raw.file_name),
            url,
        }
    }
}

/// The `ixAttachment` query parameter, or a hash of the URL for attachments
/// that only exist as external links.
fn attachment_id(url: &str) -> u64 {
    let native = url
        .split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("ixAttachment="))
        .and_then(|v| v.parse().ok());
    native.unwrap_or_else(|| {
        let digest = Sha256::digest(url.as_bytes());
        u64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    })
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: u64,
    pub timestamp: Option<DateTime<Utc>>,
    raw_timestamp: String,
    pub author: String,
    pub description: String,
    pub changes: Vec<String>,
    /// Comment as typed, without link markers.
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Links in this event, numbered within the owning case.
    pub links: Vec<Link>,
    urls: Vec<(UrlMatch, usize)>,
    anchors: Vec<(String, usize)>,
}

impl Event {
    /// Builds an event, numbering its links from `next_link`.
    fn from_raw(raw: RawEvent, next_link: &mut usize) -> Self {
        let mut found = Vec::new();
        let mut urls = Vec::new();
        let mut anchors = Vec::new();
        let mut push = |url: String, kind: LinkKind, found: &mut Vec<Link>| {
            *next_link += 1;
            found.push(Link {
                index: *next_link,
                url,
                kind,
            });
            *next_link
        };

        for m in links::find_urls(&raw.text) {
            let index = push(m.url.clone(), LinkKind::Url, &mut found);
            urls.push((m, index));
        }
        if raw.is_html || !raw.html.is_empty() {
            for src in links::find_images(&raw.html) {
                push(src, LinkKind::Image, &mut found);
            }
            for (href, text) in links::find_anchors(&raw.html) {
                let index = push(href, LinkKind::Anchor { text: text.clone() }, &mut found);
                anchors.push((text, index));
            }
        }

        Self {
            id: raw.id,
            timestamp: DateTime::parse_from_rfc3339(&raw.timestamp)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            raw_timestamp: raw.timestamp,
            author: raw.person,
            description: raw.description,
            changes: raw
                .changes
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            text: raw.text,
            attachments: raw.attachments.into_iter().map(Attachment::from_raw).collect(),
            links: found,
            urls,
            anchors,
        }
    }

    /// The comment with each link replaced by its short form.
    pub fn linkified(&self, marker: impl Fn(usize) -> String) -> String {
        links::rewrite(&self.text, &self.urls, &self.anchors, marker)
    }

    pub fn when(&self) -> String {
        match self.timestamp {
            Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            None => self.raw_timestamp.clone(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{} {} - {}\n{}",
            ui::event_id(self.id),
            self.when(),
            self.author,
            ui::white(&self.description)
        );
        for change in &self.changes {
            out.push('\n');
            out.push_str(&ui::darkgray(change));
        }
        let comment = self.linkified(ui::link_id);
        if !comment.trim().is_empty() {
            out.push('\n');
            out.push_str(comment.trim_end());
        }
        for link in self.links.iter().filter(|l| l.kind == LinkKind::Image) {
            out.push_str(&format!("\n{} {}", ui::link_id(link.index), link.url));
        }
        for attachment in &self.attachments {
            out.push_str(&format!(
                "\n{} {}",
                ui::attachment_id(attachment.id),
                attachment.file_name
            ));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct Case {
    pub id: u64,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub priority_rank: u32,
    pub project: String,
    pub area: String,
    pub milestone: String,
    pub category: String,
    pub assigned_to: String,
    pub opened_by: u64,
    pub tags: Vec<String>,
    pub parent: Option<u64>,
    pub children: Vec<u64>,
    pub duplicate_of: Option<u64>,
    pub duplicates: Vec<u64>,
    pub related: Vec<u64>,
    pub operations: BTreeSet<String>,
    pub latest_event: u64,
    pub events: Vec<Event>,
    pub permalink: String,
}

impl Case {
    /// Fetches case `id` with its full event history.
    pub fn fetch(remote: &mut dyn RemoteClient, id: u64) -> Result<Self, RemoteError> {
        tracing::debug!(id, "fetching case");
        let request = SearchRequest::new(id.to_string(), CASE_COLUMNS);
        let mut found = remote.search(&request)?;
        match found.len() {
            0 => Err(RemoteError::NotFound(id)),
            1 => {
                let raw = found.remove(0);
                let permalink = remote.full_url(&format!("f/cases/{}", raw.id));
                Ok(Self::from_raw(raw, permalink))
            }
            count => Err(RemoteError::Inconsistent { id, count }),
        }
    }

    pub fn from_raw(raw: RawCase, permalink: String) -> Self {
        let mut next_link = 0;
        let events = raw
            .events
            .into_iter()
            .map(|e| Event::from_raw(e, &mut next_link))
            .collect();
        Self {
            id: raw.id,
            title: raw.title,
            status: raw.status,
            priority: raw.priority,
            priority_rank: raw.priority_rank,
            project: raw.project,
            area: raw.area,
            milestone: raw.milestone,
            category: raw.category,
            assigned_to: raw.assigned_to,
            opened_by: raw.opened_by,
            tags: raw.tags,
            parent: (raw.parent != 0).then_some(raw.parent),
            children: raw.children,
            duplicate_of: (raw.duplicate_of != 0).then_some(raw.duplicate_of),
            duplicates: raw.duplicates,
            related: raw.related,
            operations: raw.operations.into_iter().collect(),
            latest_event: raw.latest_event,
            events,
            permalink,
        }
    }

    /// Creates a case and returns it freshly fetched.
    pub fn create(remote: &mut dyn RemoteClient, params: &EditParams) -> Result<Self, RemoteError> {
        let id = remote.new_case(params)?;
        tracing::debug!(id, "created case");
        Self::fetch(remote, id)
    }

    pub fn reload(&mut self, remote: &mut dyn RemoteClient) -> Result<(), RemoteError> {
        *self = Self::fetch(remote, self.id)?;
        Ok(())
    }

    pub fn short(&self) -> ShortCase {
        ShortCase {
            id: self.id,
            status: self.status.clone(),
            title: self.title.clone(),
            project: self.project.clone(),
            priority: self.priority.clone(),
            priority_rank: self.priority_rank,
        }
    }

    pub fn ensure_permitted(&self, operation: &str) -> Result<(), CliError> {
        if self.operations.contains(operation) {
            return Ok(());
        }
        let allowed: Vec<_> = self.operations.iter().map(String::as_str).collect();
        Err(CliError::Precondition(format!(
            "Cannot {} case {}. Allowed operations: {}",
            operation,
            self.id,
            if allowed.is_empty() {
                "none".to_string()
            } else {
                allowed.join(", ")
            }
        )))
    }

    /// Runs `action` on the tracker as `actor`, then reloads.
    pub fn perform(
        &mut self,
        remote: &mut dyn RemoteClient,
        actor: &Person,
        action: CaseAction,
        params: EditParams,
    ) -> Result<(), CliError> {
        self.ensure_permitted(action.name())?;
        let params = params
            .with("ixBug", self.id.to_string())
            .with("ixPersonEditedBy", actor.id.to_string());
        tracing::debug!(id = self.id, action = action.name(), "updating case");
        remote.edit_case(action, &params)?;
        self.reload(remote)?;
        Ok(())
    }

    pub fn assign(
        &mut self,
        remote: &mut dyn RemoteClient,
        actor: &Person,
        assignee: &str,
        params: EditParams,
    ) -> Result<(), CliError> {
        let params = params.with("sPersonAssignedTo", assignee);
        if params.get("sPersonAssignedTo").is_none() {
            return Err(CliError::Precondition("Assign to whom?".into()));
        }
        self.perform(remote, actor, CaseAction::Assign, params)
    }

    /// Replaces the text of one of this case's events. Needs the `edit`
    /// operation; conflicting edits are rejected by the server.
    pub fn amend(
        &mut self,
        remote: &mut dyn RemoteClient,
        event: u64,
        text: &str,
    ) -> Result<(), CliError> {
        self.ensure_permitted(CaseAction::Edit.name())?;
        if self.event(event).is_none() {
            return Err(CliError::Precondition(format!(
                "Event {event} does not belong to case {}",
                self.id
            )));
        }
        tracing::debug!(id = self.id, event, "amending event");
        remote.amend(self.id, event, text)?;
        self.reload(remote)?;
        Ok(())
    }

    pub fn event(&self, id: u64) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.events.iter().flat_map(|e| e.attachments.iter())
    }

    pub fn attachment(&self, id: u64) -> Option<&Attachment> {
        self.attachments().find(|a| a.id == id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.events.iter().flat_map(|e| e.links.iter())
    }

    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links().find(|l| l.index == index)
    }

    pub fn render(&self, opened_by: &str) -> String {
        let hl1 = ui::hl1();
        let mut out = format!(
            "{hl1}\n{} {}\n{} - {} - Opened by {} - Assigned to {}\n",
            ui::case_id(self.id),
            ui::title(&self.title),
            ui::status(&self.status),
            ui::priority(&self.priority),
            ui::brown(opened_by),
            ui::red(&self.assigned_to),
        );
        let place: Vec<_> = [&self.project, &self.area, &self.milestone]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect();
        if !place.is_empty() {
            out.push_str(&place.join(" / "));
            out.push('\n');
        }

        let mut refs = Vec::new();
        if let Some(parent) = self.parent {
            refs.push(format!("Parent {}", ui::case_id(parent)));
        }
        if !self.children.is_empty() {
            refs.push(format!("Children {}", id_list(&self.children)));
        }
        if let Some(original) = self.duplicate_of {
            refs.push(format!("Duplicate of {}", ui::case_id(original)));
        }
        if !self.duplicates.is_empty() {
            refs.push(format!("Duplicates {}", id_list(&self.duplicates)));
        }
        if !self.related.is_empty() {
            refs.push(format!("See also {}", id_list(&self.related)));
        }
        if !refs.is_empty() {
            out.push_str(&refs.join(" "));
            out.push('\n');
        }
        if !self.tags.is_empty() {
            let tags: Vec<_> = self.tags.iter().map(|t| ui::tag(t)).collect();
            out.push_str(&tags.join(" "));
            out.push('\n');
        }
        out.push_str(&ui::white(&self.permalink));
        out.push('\n');
        out.push_str(&hl1);
        for event in &self.events {
            out.push('\n');
            out.push_str(&ui::hl2());
            out.push('\n');
            out.push_str(&event.render());
        }
        out
    }
}

fn id_list(ids: &[u64]) -> String {
    ids.iter().map(|id| ui::case_id(*id)).collect::<Vec<_>>().join(" ")
}
