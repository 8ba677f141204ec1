//! FogBugz over HTTP.
//!
//! Most calls go through the JSON API (`/f/api/0/jsonapi`). Amending
//! events, notifications and favorites only exist as REST endpoints, and
//! checkins live on the companion Kiln host.
//!
//! Requests run on a current-thread tokio runtime and race against Ctrl-C,
//! so an interrupt abandons the request instead of killing the process.

use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::remote::{
    join_url, CaseAction, EditParams, PersonKey, RawArea, RawCase, RawCheckin, RawMilestone,
    RawPerson, RawProject, RawStatus, RemoteClient, SearchRequest,
};
use crate::ui;

/// API error code for a missing or expired token.
const NOT_LOGGED_ON: i64 = 3;

/// Who to log in as.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub url: String,
    pub user: String,
    pub secret: Secret,
}

#[derive(Debug, Clone)]
pub enum Secret {
    Password(String),
    Token(String),
}

impl Credentials {
    /// Takes what the config and environment provide and asks for the rest.
    pub fn from_config_or_ask(config: &RemoteConfig) -> Result<Self> {
        let url = match &config.url {
            Some(url) => url.clone(),
            None => ask_for("FBURL", "FogBugz URL: ")?,
        };
        let user = match &config.user {
            Some(user) => user.clone(),
            None => ask_for("FBUSER", "Username: ")?,
        };
        let known = known_secret(
            config.token.as_deref(),
            || password_from_keyring(&url, &user),
            || std::env::var("FBPASS").ok(),
        );
        let secret = match known {
            Some(secret) => secret,
            None => {
                println!("You can skip this question by setting $FBPASS");
                Secret::Password(ui::ask_password("Password: ")?)
            }
        };
        Ok(Self { url, user, secret })
    }
}

/// A configured token, else a password from the keyring, else `$FBPASS`.
fn known_secret(
    token: Option<&str>,
    keyring: impl FnOnce() -> Option<String>,
    env: impl FnOnce() -> Option<String>,
) -> Option<Secret> {
    if let Some(token) = token {
        return Some(Secret::Token(token.to_string()));
    }
    keyring().or_else(env).map(Secret::Password)
}

/// Password stored in the system keyring under service `url`, account
/// `user`. A missing entry or an unavailable backend yields `None`.
fn password_from_keyring(url: &str, user: &str) -> Option<String> {
    let lookup = keyring::Entry::new(url, user).and_then(|entry| entry.get_password());
    match lookup {
        Ok(password) => Some(password),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            tracing::debug!(error = %e, "keyring unavailable");
            None
        }
    }
}

fn ask_for(var: &str, question: &str) -> Result<String> {
    println!("You can skip this question by setting ${var}");
    let answer = ui::ask(question)?;
    if answer.trim().is_empty() {
        bail!("{} is required", var);
    }
    Ok(answer.trim().to_string())
}

pub struct FogBugz {
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    url: String,
    user: String,
    password: Option<String>,
    token: Option<String>,
}

impl FogBugz {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        let (password, token) = match credentials.secret {
            Secret::Password(p) => (Some(p), None),
            Secret::Token(t) => (None, Some(t)),
        };
        Ok(Self {
            http,
            runtime,
            url: credentials.url,
            user: credentials.user,
            password,
            token,
        })
    }

    fn uses_token(&self) -> bool {
        self.password.is_none()
    }

    /// Runs `fut` to completion unless Ctrl-C comes first.
    fn block<T>(&self, fut: impl Future<Output = Result<T, RemoteError>>) -> Result<T, RemoteError> {
        self.runtime.block_on(async {
            tokio::select! {
                result = fut => result,
                _ = tokio::signal::ctrl_c() => Err(RemoteError::Interrupted),
            }
        })
    }

    /// Runs `f`, logging in again and retrying once if the token expired.
    fn retrying<T>(
        &mut self,
        f: impl Fn(&Self) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        match f(self) {
            Err(RemoteError::AuthExpired) => {
                tracing::warn!("session expired, logging in again");
                self.login()?;
                f(self)
            }
            other => other,
        }
    }

    fn api_url(&self) -> String {
        join_url(&self.url, "f/api/0/jsonapi")
    }

    fn call_once(&self, cmd: &str, params: &Map<String, Value>, edit: Option<&EditParams>) -> Result<Value, RemoteError> {
        tracing::debug!(cmd, "api call");
        let mut body = params.clone();
        body.insert("cmd".into(), json!(cmd));
        if let Some(token) = &self.token {
            body.insert("token".into(), json!(token));
        }
        let request = self.http.post(self.api_url());
        let request = match edit.filter(|e| !e.uploads().is_empty()) {
            Some(edit) => request.multipart(multipart(&body, edit)),
            None => request.json(&Value::Object(body)),
        };
        self.block(async move { decode(request.send().await?).await })
    }

    fn call(&mut self, cmd: &str, params: Map<String, Value>) -> Result<Value, RemoteError> {
        self.retrying(|this| this.call_once(cmd, &params, None))
    }

    fn rest(&mut self, method: Method, path: &str, body: Option<Value>) -> Result<Value, RemoteError> {
        self.rest_at(method, self.full_url(path), body)
    }

    fn rest_at(&mut self, method: Method, url: String, body: Option<Value>) -> Result<Value, RemoteError> {
        self.retrying(|this| {
            tracing::debug!(%method, url = %url, "rest call");
            let mut request = this.http.request(method.clone(), &url);
            if let Some(token) = &this.token {
                request = request.query(&[("token", token)]);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }
            this.block(async move { decode(request.send().await?).await })
        })
    }

    fn kiln_url(&self, path: &str) -> String {
        join_url(&self.url.replace(".fogbugz.", ".kilnhg."), path)
    }
}

fn multipart(body: &Map<String, Value>, edit: &EditParams) -> Form {
    let mut form = Form::new();
    for (key, value) in body {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        form = form.text(key.clone(), text);
    }
    form = form.text("nFileCount", edit.uploads().len().to_string());
    for (i, upload) in edit.uploads().iter().enumerate() {
        let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        form = form.part(format!("File{}", i + 1), part);
    }
    form
}

/// Unwraps `{"data": ..., "errors": [...]}`.
async fn decode(response: reqwest::Response) -> Result<Value, RemoteError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(RemoteError::AuthExpired);
    }
    let text = response.text().await?;
    let payload: Value = match serde_json::from_str(&text) {
        Ok(payload) => payload,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(RemoteError::Api {
                code: i64::from(status.as_u16()),
                message: text.chars().take(200).collect(),
            })
        }
    };
    if let Some(error) = payload
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        let code = match error.get("code") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => i64::from(status.as_u16()),
        };
        if code == NOT_LOGGED_ON {
            return Err(RemoteError::AuthExpired);
        }
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(RemoteError::Api { code, message });
    }
    Ok(payload.get("data").cloned().unwrap_or(payload))
}

/// Deserializes `data[key]`, treating a missing key as empty.
fn field<T: DeserializeOwned + Default>(data: &Value, key: &str) -> Result<T, RemoteError> {
    match data.get(key) {
        Some(Value::Null) | None => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Favorites are typed by the kind of item rather than the case category.
fn favorite_type(category: &str) -> &str {
    match category {
        "Task" | "Inquiry" | "Feature" | "" => "Bug",
        other => other,
    }
}

impl RemoteClient for FogBugz {
    fn login(&mut self) -> Result<(), RemoteError> {
        let Some(password) = self.password.clone() else {
            tracing::debug!("not logging in: using token");
            return Ok(());
        };
        tracing::debug!(user = %self.user, "logging in");
        self.token = None;
        let data = self.call_once(
            "logon",
            &params(&[("email", json!(self.user)), ("password", json!(password))]),
            None,
        )?;
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .ok_or(RemoteError::AuthExpired)?;
        self.token = Some(token.to_string());
        Ok(())
    }

    fn logout(&mut self) -> Result<(), RemoteError> {
        if self.uses_token() || self.token.is_none() {
            tracing::debug!("not logging out: using token");
            return Ok(());
        }
        tracing::debug!("logging out");
        let result = self.call_once("logoff", &Map::new(), None).map(drop);
        self.token = None;
        result
    }

    fn current_user(&self) -> &str {
        &self.user
    }

    fn current_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn full_url(&self, path: &str) -> String {
        join_url(&self.url, path)
    }

    fn search(&mut self, request: &SearchRequest) -> Result<Vec<RawCase>, RemoteError> {
        let mut p = params(&[("q", json!(request.query)), ("cols", json!(request.cols))]);
        if let Some(max) = request.max {
            p.insert("max".into(), json!(max));
        }
        let data = self.call("search", p)?;
        field(&data, "cases")
    }

    fn edit_case(&mut self, action: CaseAction, edit: &EditParams) -> Result<(), RemoteError> {
        let p: Map<String, Value> = edit
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        self.retrying(|this| this.call_once(action.name(), &p, Some(edit)))
            .map(drop)
    }

    fn new_case(&mut self, edit: &EditParams) -> Result<u64, RemoteError> {
        let p: Map<String, Value> = edit
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        let data = self.retrying(|this| this.call_once("new", &p, Some(edit)))?;
        data.pointer("/case/ixBug")
            .and_then(Value::as_u64)
            .ok_or_else(|| RemoteError::Api {
                code: 0,
                message: "new case id missing from response".into(),
            })
    }

    fn view_person(&mut self, key: &PersonKey) -> Result<RawPerson, RemoteError> {
        let p = match key {
            PersonKey::Id(id) => params(&[("ixPerson", json!(id))]),
            PersonKey::Email(email) => params(&[("sEmail", json!(email))]),
        };
        let data = self.call("viewPerson", p)?;
        Ok(serde_json::from_value(data.get("person").cloned().unwrap_or_default())?)
    }

    fn list_people(&mut self) -> Result<Vec<RawPerson>, RemoteError> {
        let data = self.call("listPeople", Map::new())?;
        field(&data, "people")
    }

    fn list_projects(&mut self) -> Result<Vec<RawProject>, RemoteError> {
        let data = self.call("listProjects", Map::new())?;
        field(&data, "projects")
    }

    fn list_areas(&mut self, project: Option<&str>) -> Result<Vec<RawArea>, RemoteError> {
        let data = self.call("listAreas", Map::new())?;
        let areas: Vec<RawArea> = field(&data, "areas")?;
        Ok(match project {
            Some(project) => areas
                .into_iter()
                .filter(|a| a.project.eq_ignore_ascii_case(project))
                .collect(),
            None => areas,
        })
    }

    fn list_milestones(&mut self, project: Option<&str>) -> Result<Vec<RawMilestone>, RemoteError> {
        let data = self.call("listFixFors", Map::new())?;
        let milestones: Vec<RawMilestone> = field(&data, "fixfors")?;
        Ok(match project {
            Some(project) => milestones
                .into_iter()
                .filter(|m| m.project.is_empty() || m.project.eq_ignore_ascii_case(project))
                .collect(),
            None => milestones,
        })
    }

    fn list_statuses(&mut self) -> Result<Vec<RawStatus>, RemoteError> {
        let data = self.call("listStatuses", Map::new())?;
        field(&data, "statuses")
    }

    fn favorites(&mut self) -> Result<Vec<u64>, RemoteError> {
        let url = format!("{}?json=%7B%7D", self.full_url("f/api/0/favorites/"));
        let data = self.rest_at(Method::GET, url, None)?;
        let items = data
            .as_array()
            .or_else(|| data.get("favorites").and_then(Value::as_array))
            .cloned()
            .unwrap_or_default();
        Ok(items
            .iter()
            .filter_map(|item| {
                item.get("ixItem")
                    .or_else(|| item.get("ixBug"))
                    .and_then(Value::as_u64)
            })
            .collect())
    }

    fn favorite(&mut self, case: u64, category: &str) -> Result<(), RemoteError> {
        let body = json!({"ixItem": case, "sType": favorite_type(category)});
        self.rest(Method::POST, "f/api/0/favorites/", Some(body))
            .map(drop)
    }

    fn unfavorite(&mut self, case: u64, category: &str) -> Result<(), RemoteError> {
        let body = json!({"ixItem": case, "sType": favorite_type(category)});
        self.rest(Method::DELETE, "f/api/0/favorites/", Some(body))
            .map(drop)
    }

    fn notify(&mut self, case: u64, latest_event: u64, person: u64) -> Result<(), RemoteError> {
        let body = json!({
            "sCommand": "edit",
            "sFormat": "plain",
            "ixBug": case,
            "rgixNotify": [person],
            "ixBugEventLatest": latest_event,
        });
        self.rest(Method::POST, &format!("f/api/0/cases/{case}"), Some(body))
            .map(drop)
    }

    fn amend(&mut self, case: u64, event: u64, text: &str) -> Result<(), RemoteError> {
        // The server rejects the edit unless it names the latest event of the
        // case and the latest edit of this event.
        let data = self.rest(Method::GET, &format!("f/api/0/cases/{case}"), None)?;
        let latest_event = data
            .get("ixBugEventLatest")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        let current_edit = data
            .get("eventEdits")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|e| e.get("ixBugEvent").and_then(Value::as_u64) == Some(event))
            .filter_map(|e| e.get("ixEdit").and_then(Value::as_i64))
            .max()
            .unwrap_or(-1);

        let event_path = format!("f/api/0/caseevents/{event}");
        self.rest(Method::GET, &event_path, None)?;
        let body = json!({
            "sCommand": "editEvent",
            "sFormat": "plain",
            "ixBug": case,
            "ixBugEvent": event,
            "ixBugEventLatest": latest_event,
            "ixEditCurrent": current_edit,
            "sEvent": text,
            "rgAttachments": [],
            "rgixAttachmentsToDelete": [],
            "rgsAttachmentsAdded": [],
        });
        self.rest(Method::POST, &event_path, Some(body)).map(drop)
    }

    fn checkins(&mut self, case: u64) -> Result<Vec<RawCheckin>, RemoteError> {
        let url = self.kiln_url(&format!("fogbugz/casecheckins/{case}"));
        let data = self.rest_at(Method::GET, url, None)?;
        Ok(serde_json::from_value(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn client(url: &str, secret: Secret) -> FogBugz {
        let credentials = Credentials {
            url: url.into(),
            user: "ann@example.com".into(),
            secret,
        };
        FogBugz::new(credentials, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_full_url_with_token() {
        let fb = client("https://acme.fogbugz.com/", Secret::Token("abc".into()));
        assert_eq!(fb.full_url("/f/cases/1"), "https://acme.fogbugz.com/f/cases/1");
        assert_eq!(
            fb.full_url_with_token("default.asp?ixAttachment=3"),
            "https://acme.fogbugz.com/default.asp?ixAttachment=3&token=abc"
        );
        assert_eq!(fb.api_url(), "https://acme.fogbugz.com/f/api/0/jsonapi");
    }

    #[test]
    fn test_kiln_url() {
        let fb = client("https://acme.fogbugz.com", Secret::Token("abc".into()));
        assert_eq!(
            fb.kiln_url("fogbugz/casecheckins/7"),
            "https://acme.kilnhg.com/fogbugz/casecheckins/7"
        );
    }

    #[test]
    fn test_token_login_makes_no_request() {
        let mut fb = client("http://127.0.0.1:9", Secret::Token("abc".into()));
        fb.login().unwrap();
        fb.logout().unwrap();
        assert_eq!(fb.current_token(), Some("abc"));
    }

    #[test]
    fn test_secret_precedence() {
        let none = || None;
        let keyring = || Some("from-keyring".to_string());
        let env = || Some("from-env".to_string());
        assert!(matches!(
            known_secret(Some("tok"), keyring, env),
            Some(Secret::Token(t)) if t == "tok"
        ));
        assert!(matches!(
            known_secret(None, keyring, env),
            Some(Secret::Password(p)) if p == "from-keyring"
        ));
        assert!(matches!(
            known_secret(None, none, env),
            Some(Secret::Password(p)) if p == "from-env"
        ));
        assert!(known_secret(None, none, none).is_none());
    }

    #[test]
    fn test_expired_token_is_retried_once() {
        let mut fb = client("http://127.0.0.1:9", Secret::Token("abc".into()));
        let calls = Cell::new(0);
        let result = fb.retrying(|_| {
            calls.set(calls.get() + 1);
            match calls.get() {
                1 => Err(RemoteError::AuthExpired),
                n => Ok(n),
            }
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_second_expiry_is_returned() {
        let mut fb = client("http://127.0.0.1:9", Secret::Token("abc".into()));
        let calls = Cell::new(0);
        let result: Result<(), _> = fb.retrying(|_| {
            calls.set(calls.get() + 1);
            Err(RemoteError::AuthExpired)
        });
        assert!(matches!(result, Err(RemoteError::AuthExpired)));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_favorite_type() {
        assert_eq!(favorite_type("Feature"), "Bug");
        assert_eq!(favorite_type("Wiki"), "Wiki");
    }

    #[test]
    fn test_field_defaults_when_missing() {
        let data = json!({"people": null});
        let people: Vec<RawPerson> = field(&data, "people").unwrap();
        assert!(people.is_empty());
        let areas: Vec<RawArea> = field(&data, "areas").unwrap();
        assert!(areas.is_empty());
    }
}
