use std::collections::HashMap;
use std::fmt;

use crate::error::RemoteError;
use crate::remote::{PersonKey, RawPerson, RemoteClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: u64,
    pub full_name: String,
    pub email: String,
}

impl From<RawPerson> for Person {
    fn from(raw: RawPerson) -> Self {
        Self {
            id: raw.id,
            full_name: raw.full_name,
            email: raw.email,
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.full_name, self.email)
    }
}

/// People seen during the session, keyed by id.
///
/// People rarely change, so entries are never refreshed once fetched.
#[derive(Debug, Default)]
pub struct PersonCache {
    people: HashMap<u64, Person>,
    listed: bool,
}

impl PersonCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `person` unless one with the same id is already cached, and
    /// returns the cached entry.
    pub fn insert(&mut self, person: Person) -> &Person {
        self.people.entry(person.id).or_insert(person)
    }

    pub fn get_by_id(&mut self, remote: &mut dyn RemoteClient, id: u64) -> Result<Person, RemoteError> {
        if let Some(person) = self.people.get(&id) {
            return Ok(person.clone());
        }
        tracing::debug!(id, "fetching person");
        let raw = remote.view_person(&PersonKey::Id(id))?;
        Ok(self.insert(raw.into()).clone())
    }

    pub fn get_by_email(
        &mut self,
        remote: &mut dyn RemoteClient,
        email: &str,
    ) -> Result<Person, RemoteError> {
        if let Some(person) = self.find(|p| p.email.eq_ignore_ascii_case(email)) {
            return Ok(person.clone());
        }
        tracing::debug!(email, "fetching person");
        let raw = remote.view_person(&PersonKey::Email(email.to_string()))?;
        Ok(self.insert(raw.into()).clone())
    }

    /// Resolves an id, an e-mail address or a full name.
    ///
    /// Names are matched case-insensitively against the cache, which is
    /// filled from the people list the first time a name misses.
    pub fn best_guess(
        &mut self,
        remote: &mut dyn RemoteClient,
        what: &str,
    ) -> Result<Option<Person>, RemoteError> {
        let what = what.trim();
        if let Ok(id) = what.parse::<u64>() {
            return self.get_by_id(remote, id).map(Some);
        }
        if what.contains('@') {
            return self.get_by_email(remote, what).map(Some);
        }
        let by_name = |p: &Person| p.full_name.eq_ignore_ascii_case(what);
        if self.find(by_name).is_none() && !self.listed {
            self.load_all(remote)?;
        }
        Ok(self.find(by_name).cloned())
    }

    /// Fetches the full people list into the cache.
    pub fn load_all(&mut self, remote: &mut dyn RemoteClient) -> Result<Vec<Person>, RemoteError> {
        let people = remote.list_people()?;
        self.listed = true;
        Ok(people
            .into_iter()
            .map(|raw| self.insert(raw.into()).clone())
            .collect())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.people.len()
    }

    fn find(&self, pred: impl Fn(&Person) -> bool) -> Option<&Person> {
        self.people.values().find(|p| pred(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{person, FakeRemote};

    #[test]
    fn test_display() {
        let p: Person = person(246, "José Arcadio Buendía", "jose@soledad.com").into();
        assert_eq!(p.to_string(), "José Arcadio Buendía <jose@soledad.com>");
    }

    #[test]
    fn test_cached_person_is_not_fetched_again() {
        let mut remote = FakeRemote::new();
        remote.add_person(person(7, "Ann Lee", "ann@example.com"));
        let mut cache = PersonCache::new();

        let by_id = cache.get_by_id(&mut remote, 7).unwrap();
        let by_email = cache.get_by_email(&mut remote, "ann@example.com").unwrap();
        let again = cache.get_by_id(&mut remote, 7).unwrap();

        assert_eq!(by_id, by_email);
        assert_eq!(by_id, again);
        assert_eq!(remote.calls_named("viewPerson"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_keeps_existing_entry() {
        let mut cache = PersonCache::new();
        cache.insert(person(1, "First", "a@x.com").into());
        let kept = cache.insert(person(1, "Second", "b@x.com").into()).clone();
        assert_eq!(kept.full_name, "First");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_best_guess_by_name_lists_people_once() {
        let mut remote = FakeRemote::new();
        remote.add_person(person(1, "Ann Lee", "ann@example.com"));
        remote.add_person(person(2, "Bo Chen", "bo@example.com"));
        let mut cache = PersonCache::new();

        let bo = cache.best_guess(&mut remote, "bo chen").unwrap().unwrap();
        assert_eq!(bo.id, 2);
        assert!(cache.best_guess(&mut remote, "Nobody").unwrap().is_none());
        assert_eq!(remote.calls_named("listPeople"), 1);

        let ann = cache.best_guess(&mut remote, "1").unwrap().unwrap();
        assert_eq!(ann.email, "ann@example.com");
        assert_eq!(remote.calls_named("viewPerson"), 0);
    }
}
