//! Reference data listed by the `projects`, `areas`, `milestones`,
//! `statuses` and `checkins` commands.

use std::fmt;

use crate::remote::{RawArea, RawCheckin, RawMilestone, RawProject, RawStatus};
use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub owner: String,
}

impl From<RawProject> for Project {
    fn from(raw: RawProject) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            owner: raw.owner,
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", ui::darkgray(format!("{:>5}", self.id)), ui::blue(&self.name))?;
        if !self.owner.is_empty() {
            write!(f, " ({})", self.owner)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    pub id: u64,
    pub name: String,
    pub project: String,
}

impl From<RawArea> for Area {
    fn from(raw: RawArea) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            project: raw.project,
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} / {}",
            ui::darkgray(format!("{:>5}", self.id)),
            self.project,
            ui::blue(&self.name)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub id: u64,
    pub name: String,
    /// Empty for milestones shared by every project.
    pub project: String,
    pub due: String,
}

impl From<RawMilestone> for Milestone {
    fn from(raw: RawMilestone) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            project: raw.project,
            due: raw.due,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let project = if self.project.is_empty() {
            "(all projects)"
        } else {
            self.project.as_str()
        };
        write!(
            f,
            "{} {} / {}",
            ui::darkgray(format!("{:>5}", self.id)),
            project,
            ui::blue(&self.name)
        )?;
        if !self.due.is_empty() {
            write!(f, " due {}", self.due)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: u64,
    pub name: String,
    pub category: u64,
    pub resolved: bool,
}

impl From<RawStatus> for Status {
    fn from(raw: RawStatus) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            category: raw.category,
            resolved: raw.resolved,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            ui::darkgray(format!("{:>5}", self.id)),
            ui::status(&self.name)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkin {
    pub repo: String,
    pub revision: String,
    pub author: String,
    pub description: String,
    pub url: String,
}

impl From<RawCheckin> for Checkin {
    fn from(raw: RawCheckin) -> Self {
        Self {
            repo: raw.repo,
            revision: raw.revision,
            author: raw.author,
            description: raw.description,
            url: raw.url,
        }
    }
}

impl fmt::Display for Checkin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let revision: String = self.revision.chars().take(12).collect();
        write!(
            f,
            "{} {} - {}\n    {}",
            ui::yellow(revision),
            self.repo,
            ui::brown(&self.author),
            self.description.lines().next().unwrap_or_default()
        )?;
        if !self.url.is_empty() {
            write!(f, "\n    {}", ui::white(&self.url))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkin_from_kiln_payload() {
        ui::set_color(false);
        let raw: RawCheckin = serde_json::from_str(
            r#"{"repo": "core", "rev": "0123456789abcdef", "author": "ann", "description": "Fix crash\n\nLong text"}"#,
        )
        .unwrap();
        let checkin = Checkin::from(raw);
        assert_eq!(checkin.revision, "0123456789abcdef");
        assert_eq!(checkin.to_string(), "0123456789ab core - ann\n    Fix crash");
    }

    #[test]
    fn test_shared_milestone_display() {
        ui::set_color(false);
        let milestone = Milestone {
            id: 3,
            name: "Undecided".into(),
            project: String::new(),
            due: String::new(),
        };
        assert_eq!(milestone.to_string(), "    3 (all projects) / Undecided");
    }
}
