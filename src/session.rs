//! State carried from one command to the next.

use crate::case::Case;
use crate::editor::DraftEditor;
use crate::error::{CliError, RemoteError};
use crate::history::History;
use crate::person::{Person, PersonCache};
use crate::remote::RemoteClient;
use crate::search::CaseSearch;

pub struct Session {
    pub remote: Box<dyn RemoteClient>,
    pub people: PersonCache,
    pub drafts: Box<dyn DraftEditor>,
    pub current_case: Option<Case>,
    pub current_user: Option<Person>,
    pub last_search: Option<CaseSearch>,
    pub history: History,
    pub browser: Option<String>,
    /// How many cases `top` lists without an argument.
    pub top: u32,
    /// Set by `quit`; the REPL stops before the next prompt.
    pub quit_requested: bool,
}

impl Session {
    pub fn new(remote: Box<dyn RemoteClient>, drafts: Box<dyn DraftEditor>) -> Self {
        Self {
            remote,
            people: PersonCache::new(),
            drafts,
            current_case: None,
            current_user: None,
            last_search: None,
            history: History::new(),
            browser: None,
            top: 10,
            quit_requested: false,
        }
    }

    pub fn with_browser(mut self, browser: Option<String>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    /// Logs in and looks up who we are.
    pub fn login(&mut self) -> Result<&Person, RemoteError> {
        self.remote.login()?;
        let email = self.remote.current_user().to_string();
        let me = self.people.get_by_email(self.remote.as_mut(), &email)?;
        tracing::info!(user = %me, "logged in");
        Ok(self.current_user.insert(me))
    }

    pub fn logoff(&mut self) -> Result<(), RemoteError> {
        self.current_user = None;
        self.remote.logout()
    }

    #[cfg(test)]
    pub fn is_logged_in(&self) -> bool {
        self.current_user.is_some()
    }

    /// Makes `case` current and records the visit.
    pub fn set_current_case(&mut self, case: Case) {
        self.history.push(case.short());
        self.current_case = Some(case);
    }

    /// Fetches case `id` and makes it current.
    pub fn open_case(&mut self, id: u64) -> Result<&Case, RemoteError> {
        let case = Case::fetch(self.remote.as_mut(), id)?;
        self.history.push(case.short());
        Ok(self.current_case.insert(case))
    }

    pub fn require_case(&self) -> Result<&Case, CliError> {
        self.current_case.as_ref().ok_or_else(no_case)
    }

    pub fn require_user(&self) -> Result<&Person, CliError> {
        self.current_user
            .as_ref()
            .ok_or_else(|| CliError::Precondition("Not logged in. Use `login` first.".into()))
    }

    /// Borrows what a mutation needs: the current case, the tracker and the
    /// acting user.
    pub fn edit_parts(&mut self) -> Result<(&mut Case, &mut dyn RemoteClient, Person), CliError> {
        let actor = self.require_user()?.clone();
        let case = self.current_case.as_mut().ok_or_else(no_case)?;
        Ok((case, self.remote.as_mut(), actor))
    }

    /// Refreshes the history entry of the current case after it changed.
    pub fn touch_current(&mut self) {
        if let Some(case) = &self.current_case {
            self.history.push(case.short());
        }
    }
}

fn no_case() -> CliError {
    CliError::Precondition("No current case. Use `show ID` first.".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{person, raw_case, FakeRemote, ScriptedDrafts};

    fn session() -> (Session, FakeRemote) {
        let mut remote = FakeRemote::new();
        remote.add_person(person(9, "Dev Eloper", "dev@example.com"));
        remote.add_case(raw_case(1, "One", &["edit"]));
        remote.add_case(raw_case(2, "Two", &["edit"]));
        let session = Session::new(Box::new(remote.clone()), Box::new(ScriptedDrafts::default()));
        (session, remote)
    }

    #[test]
    fn test_login_resolves_current_user() {
        let (mut session, _remote) = session();
        assert!(matches!(session.require_user(), Err(CliError::Precondition(_))));
        assert_eq!(session.login().unwrap().id, 9);
        assert!(session.is_logged_in());
        session.logoff().unwrap();
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_open_case_records_history() {
        let (mut session, _remote) = session();
        session.open_case(1).unwrap();
        session.open_case(2).unwrap();
        session.open_case(1).unwrap();
        let ids: Vec<_> = session.history.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(session.require_case().unwrap().id, 1);
    }

    #[test]
    fn test_edit_parts_needs_case_and_user() {
        let (mut session, _remote) = session();
        session.login().unwrap();
        assert!(matches!(session.edit_parts(), Err(CliError::Precondition(_))));
        session.open_case(2).unwrap();
        let (case, _, actor) = session.edit_parts().unwrap();
        assert_eq!((case.id, actor.id), (2, 9));
    }
}
