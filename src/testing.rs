//! In-memory tracker and editor for tests.

use anyhow::Result;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::editor::{Draft, DraftEditor};
use crate::error::RemoteError;
use crate::remote::{
    CaseAction, EditParams, PersonKey, RawArea, RawCase, RawCheckin, RawEvent, RawMilestone,
    RawPerson, RawProject, RawStatus, RemoteClient, SearchRequest,
};

pub fn person(id: u64, full_name: &str, email: &str) -> RawPerson {
    RawPerson {
        id,
        full_name: full_name.into(),
        email: email.into(),
    }
}

pub fn raw_case(id: u64, title: &str, operations: &[&str]) -> RawCase {
    RawCase {
        id,
        title: title.into(),
        status: "Active".into(),
        priority: "Need to fix".into(),
        priority_rank: 3,
        project: "Inbox".into(),
        operations: operations.iter().map(|s| s.to_string()).collect(),
        ..RawCase::default()
    }
}

pub fn event(id: u64, text: &str) -> RawEvent {
    RawEvent {
        id,
        timestamp: "2024-03-01T10:00:00Z".into(),
        person: "Dev Eloper".into(),
        description: "Edited by Dev Eloper".into(),
        text: text.into(),
        ..RawEvent::default()
    }
}

type EditHook = Box<dyn FnMut(&mut RawCase)>;

#[derive(Default)]
struct State {
    cases: Vec<RawCase>,
    people: Vec<RawPerson>,
    projects: Vec<RawProject>,
    areas: Vec<RawArea>,
    statuses: Vec<RawStatus>,
    checkins: HashMap<u64, Vec<RawCheckin>>,
    notifications: Vec<(u64, u64, u64)>,
    favorites: Vec<u64>,
    calls: Vec<String>,
    edits: Vec<(CaseAction, EditParams)>,
    searches: Vec<SearchRequest>,
    hooks: HashMap<u64, EditHook>,
    failures: VecDeque<RemoteError>,
    next_id: u64,
}

/// A tracker held in memory. Clones share state, so a test can keep a
/// handle after moving one into a session.
#[derive(Clone)]
pub struct FakeRemote {
    user: String,
    state: Rc<RefCell<State>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            user: "dev@example.com".into(),
            state: Rc::new(RefCell::new(State {
                next_id: 100,
                ..State::default()
            })),
        }
    }

    pub fn add_case(&mut self, case: RawCase) {
        self.state.borrow_mut().cases.push(case);
    }

    pub fn add_person(&mut self, person: RawPerson) {
        self.state.borrow_mut().people.push(person);
    }

    pub fn add_project(&mut self, project: RawProject) {
        self.state.borrow_mut().projects.push(project);
    }

    pub fn add_area(&mut self, area: RawArea) {
        self.state.borrow_mut().areas.push(area);
    }

    pub fn add_status(&mut self, status: RawStatus) {
        self.state.borrow_mut().statuses.push(status);
    }

    pub fn add_checkin(&mut self, case: u64, checkin: RawCheckin) {
        self.state
            .borrow_mut()
            .checkins
            .entry(case)
            .or_default()
            .push(checkin);
    }

    /// Runs `hook` on case `id` whenever it is edited.
    pub fn on_edit(&mut self, id: u64, hook: impl FnMut(&mut RawCase) + 'static) {
        self.state.borrow_mut().hooks.insert(id, Box::new(hook));
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&mut self, error: RemoteError) {
        self.state.borrow_mut().failures.push_back(error);
    }

    /// Names of the calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| *c == name).count()
    }

    pub fn edits(&self) -> Vec<(CaseAction, EditParams)> {
        self.state.borrow().edits.clone()
    }

    pub fn last_search(&self) -> Option<SearchRequest> {
        self.state.borrow().searches.last().cloned()
    }

    pub fn favorite_ids(&self) -> Vec<u64> {
        self.state.borrow().favorites.clone()
    }

    /// `(case, latest event, person)` for every `notify` call.
    pub fn notifications(&self) -> Vec<(u64, u64, u64)> {
        self.state.borrow().notifications.clone()
    }

    fn record(&self, name: &str) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(name.to_string());
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl RemoteClient for FakeRemote {
    fn login(&mut self) -> Result<(), RemoteError> {
        self.record("logon")
    }

    fn logout(&mut self) -> Result<(), RemoteError> {
        self.record("logoff")
    }

    fn current_user(&self) -> &str {
        &self.user
    }

    fn current_token(&self) -> Option<&str> {
        Some("t0k3n")
    }

    fn full_url(&self, path: &str) -> String {
        crate::remote::join_url("https://tracker.test/", path)
    }

    fn search(&mut self, request: &SearchRequest) -> Result<Vec<RawCase>, RemoteError> {
        self.record("search")?;
        let mut state = self.state.borrow_mut();
        state.searches.push(request.clone());
        let ids: Option<Vec<u64>> = request
            .query
            .split(',')
            .map(|part| part.trim().parse().ok())
            .collect();
        let mut found: Vec<RawCase> = match ids {
            Some(ids) => ids
                .iter()
                .flat_map(|id| state.cases.iter().filter(move |c| c.id == *id))
                .cloned()
                .collect(),
            None => state.cases.clone(),
        };
        if let Some(max) = request.max {
            found.truncate(max as usize);
        }
        Ok(found)
    }

    fn edit_case(&mut self, action: CaseAction, params: &EditParams) -> Result<(), RemoteError> {
        self.record(action.name())?;
        let mut state = self.state.borrow_mut();
        state.edits.push((action, params.clone()));
        let id: u64 = params
            .get("ixBug")
            .and_then(|id| id.parse().ok())
            .unwrap_or_default();
        let State { cases, hooks, .. } = &mut *state;
        let case = cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RemoteError::NotFound(id))?;
        if let Some(title) = params.get("sTitle") {
            case.title = title.to_string();
        }
        if let Some(hook) = hooks.get_mut(&id) {
            hook(case);
        }
        Ok(())
    }

    fn new_case(&mut self, params: &EditParams) -> Result<u64, RemoteError> {
        self.record("new")?;
        let mut state = self.state.borrow_mut();
        state.edits.push((CaseAction::Edit, params.clone()));
        state.next_id += 1;
        let id = state.next_id;
        let mut case = raw_case(id, params.get("sTitle").unwrap_or_default(), &["edit", "resolve", "assign"]);
        if let Some(project) = params.get("sProject") {
            case.project = project.to_string();
        }
        state.cases.push(case);
        Ok(id)
    }

    fn view_person(&mut self, key: &PersonKey) -> Result<RawPerson, RemoteError> {
        self.record("viewPerson")?;
        let state = self.state.borrow();
        state
            .people
            .iter()
            .find(|p| match key {
                PersonKey::Id(id) => p.id == *id,
                PersonKey::Email(email) => p.email.eq_ignore_ascii_case(email),
            })
            .cloned()
            .ok_or_else(|| RemoteError::Api {
                code: 17,
                message: "Person not found".into(),
            })
    }

    fn list_people(&mut self) -> Result<Vec<RawPerson>, RemoteError> {
        self.record("listPeople")?;
        Ok(self.state.borrow().people.clone())
    }

    fn list_projects(&mut self) -> Result<Vec<RawProject>, RemoteError> {
        self.record("listProjects")?;
        Ok(self.state.borrow().projects.clone())
    }

    fn list_areas(&mut self, project: Option<&str>) -> Result<Vec<RawArea>, RemoteError> {
        self.record("listAreas")?;
        let state = self.state.borrow();
        Ok(state
            .areas
            .iter()
            .filter(|a| project.map_or(true, |p| a.project.eq_ignore_ascii_case(p)))
            .cloned()
            .collect())
    }

    fn list_milestones(&mut self, _project: Option<&str>) -> Result<Vec<RawMilestone>, RemoteError> {
        self.record("listFixFors")?;
        Ok(Vec::new())
    }

    fn list_statuses(&mut self) -> Result<Vec<RawStatus>, RemoteError> {
        self.record("listStatuses")?;
        Ok(self.state.borrow().statuses.clone())
    }

    fn favorites(&mut self) -> Result<Vec<u64>, RemoteError> {
        self.record("favorites")?;
        Ok(self.state.borrow().favorites.clone())
    }

    fn favorite(&mut self, case: u64, _category: &str) -> Result<(), RemoteError> {
        self.record("favorite")?;
        let mut state = self.state.borrow_mut();
        if !state.favorites.contains(&case) {
            state.favorites.push(case);
        }
        Ok(())
    }

    fn unfavorite(&mut self, case: u64, _category: &str) -> Result<(), RemoteError> {
        self.record("unfavorite")?;
        self.state.borrow_mut().favorites.retain(|id| *id != case);
        Ok(())
    }

    fn notify(&mut self, case: u64, latest_event: u64, person: u64) -> Result<(), RemoteError> {
        self.record("notify")?;
        self.state
            .borrow_mut()
            .notifications
            .push((case, latest_event, person));
        Ok(())
    }

    fn amend(&mut self, case: u64, event: u64, text: &str) -> Result<(), RemoteError> {
        self.record("amend")?;
        let mut state = self.state.borrow_mut();
        let found = state
            .cases
            .iter_mut()
            .filter(|c| c.id == case)
            .flat_map(|c| c.events.iter_mut())
            .find(|e| e.id == event)
            .ok_or(RemoteError::NotFound(case))?;
        found.text = text.to_string();
        Ok(())
    }

    fn checkins(&mut self, case: u64) -> Result<Vec<RawCheckin>, RemoteError> {
        self.record("checkins")?;
        Ok(self
            .state
            .borrow()
            .checkins
            .get(&case)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct Script {
    drafts: VecDeque<Option<String>>,
    headers: Vec<String>,
    cleared: usize,
}

/// Hands out prepared drafts instead of running an editor. `None` in the
/// script declines a `maybe_write` question.
#[derive(Clone, Default)]
pub struct ScriptedDrafts {
    script: Rc<RefCell<Script>>,
}

impl ScriptedDrafts {
    pub fn new<'a>(drafts: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let script = Script {
            drafts: drafts.into_iter().map(|d| d.map(String::from)).collect(),
            ..Script::default()
        };
        Self {
            script: Rc::new(RefCell::new(script)),
        }
    }

    /// Headers the editor was opened with.
    pub fn headers(&self) -> Vec<String> {
        self.script.borrow().headers.clone()
    }

    pub fn cleared(&self) -> usize {
        self.script.borrow().cleared
    }
}

impl DraftEditor for ScriptedDrafts {
    fn write(&mut self, header: &str) -> Result<Draft> {
        let mut script = self.script.borrow_mut();
        script.headers.push(header.to_string());
        let text = script.drafts.pop_front().flatten().unwrap_or_default();
        Ok(Draft::parse(&text))
    }

    fn maybe_write(&mut self, _question: &str, header: &str) -> Result<Option<Draft>> {
        let next = self.script.borrow_mut().drafts.pop_front();
        match next {
            Some(Some(text)) => {
                self.script.borrow_mut().headers.push(header.to_string());
                Ok(Some(Draft::parse(&text)))
            }
            _ => Ok(None),
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.script.borrow_mut().cleared += 1;
        Ok(())
    }
}
