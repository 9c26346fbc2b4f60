//! Client for the notes REST API.
//!
//! Every mutation is its own request. Nothing is batched or retried; a
//! failure is reported once and the caller decides whether to try again.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::io::adapter::{PersistenceAdapter, PersistenceError};
use crate::io::session::{SessionError, SessionProvider, User};
use crate::model::collection::{Collection, Scope};
use crate::model::config::{IdConfig, RemoteConfig};
use crate::model::item::{Item, ItemDraft, ItemId, ItemKind, ItemPatch, normalize_tag};
use crate::ops::store::{self, Applied, Mutation};

/// Overrides `[remote] session_cookie`
pub const SESSION_ENV: &str = "NOTEKEEP_SESSION";

/// HTTP client for one notes server.
pub struct RemoteApi {
    client: Client,
    api_url: Url,
    cookie: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Item as the server sends it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    is_pinned: bool,
    #[serde(default)]
    is_archived: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(default)]
    due_date: Option<String>,
}

/// Single-item responses come bare or wrapped as `{"note": ...}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemEnvelope {
    Wrapped { note: WireItem },
    Bare(WireItem),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Wrapped { notes: Vec<WireItem> },
    Bare(Vec<WireItem>),
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    user: Option<User>,
}

/// Body of `POST /notes`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewItem<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    content: &'a str,
    tag: String,
    is_pinned: bool,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
}

impl WireItem {
    fn into_item(self) -> Item {
        let priority = self.priority.as_ref().and_then(|p| match p {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        // Accept both plain dates and full timestamps
        let due = self
            .due_date
            .as_deref()
            .and_then(|d| d.get(..10))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let is_todo = self.kind.as_deref() == Some("todo") || priority.is_some() || due.is_some();
        let draft = ItemDraft {
            title: self.title,
            body: self.content,
            tag: self.tag,
            pinned: self.is_pinned,
            kind: if is_todo {
                ItemKind::todo(priority, due)
            } else {
                ItemKind::Note
            },
        };
        let mut item = Item::from_draft(
            ItemId::new(self.id),
            draft,
            self.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        );
        item.archived = self.is_archived;
        item
    }
}

fn patch_body(patch: &ItemPatch) -> Value {
    let mut body = Map::new();
    if let Some(title) = &patch.title {
        body.insert("title".into(), title.clone().map_or(Value::Null, Value::String));
    }
    if let Some(content) = &patch.body {
        body.insert("content".into(), Value::String(content.clone()));
    }
    if let Some(tag) = &patch.tag {
        body.insert("tag".into(), Value::String(normalize_tag(Some(tag))));
    }
    if let Some(priority) = patch.priority {
        body.insert("priority".into(), priority.map_or(Value::Null, Value::from));
    }
    if let Some(due) = patch.due {
        body.insert(
            "dueDate".into(),
            due.map_or(Value::Null, |d| Value::String(d.to_string())),
        );
    }
    Value::Object(body)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl RemoteApi {
    /// Build a client from config. `NOTEKEEP_SESSION`, when set, replaces
    /// the configured cookie.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, PersistenceError> {
        let cookie = std::env::var(SESSION_ENV)
            .ok()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| config.session_cookie.clone());
        RemoteApi::new(
            &config.base_url,
            cookie,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// * `base_url` - server origin, e.g. `http://localhost:3001`; `/api` is appended.
    pub fn new(
        base_url: &str,
        cookie: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(PersistenceError::Transient(
                "no [remote] base_url configured".into(),
            ));
        }
        let api_url = Url::parse(&format!("{}/api", base)).map_err(|e| {
            PersistenceError::Transient(format!("invalid [remote] base_url {}: {}", base, e))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistenceError::Transient(e.to_string()))?;
        Ok(RemoteApi {
            client,
            api_url,
            cookie,
        })
    }

    pub fn fetch_active(&self) -> Result<Vec<Item>, PersistenceError> {
        self.fetch_list(self.endpoint(&["notes"])?)
    }

    pub fn fetch_archived(&self) -> Result<Vec<Item>, PersistenceError> {
        self.fetch_list(self.endpoint(&["notes", "archived"])?)
    }

    pub fn create(&self, draft: &ItemDraft) -> Result<Item, PersistenceError> {
        let (priority, due) = match draft.kind {
            ItemKind::Todo { priority, due } => (priority, due),
            ItemKind::Note => (None, None),
        };
        let body = NewItem {
            title: draft.title.as_deref().filter(|t| !t.trim().is_empty()),
            content: &draft.body,
            tag: normalize_tag(draft.tag.as_deref()),
            is_pinned: draft.pinned,
            kind: if draft.kind.is_todo() { "todo" } else { "note" },
            priority,
            due_date: due,
        };
        let text = self.send(self.client.post(self.endpoint(&["notes"])?).json(&body))?;
        parse_item(&text)?
            .ok_or_else(|| PersistenceError::Corrupt("server returned no item for create".into()))
    }

    pub fn update(&self, id: &ItemId, patch: &ItemPatch) -> Result<Option<Item>, PersistenceError> {
        let url = self.endpoint(&["notes", id.as_str()])?;
        parse_item(&self.send(self.client.patch(url).json(&patch_body(patch)))?)
    }

    pub fn delete(&self, id: &ItemId) -> Result<(), PersistenceError> {
        self.send(self.client.delete(self.endpoint(&["notes", id.as_str()])?))?;
        Ok(())
    }

    /// `PATCH /notes/{id}/{action}` for pin, archive and restore
    pub fn flag(&self, id: &ItemId, action: &str) -> Result<Option<Item>, PersistenceError> {
        let url = self.endpoint(&["notes", id.as_str(), action])?;
        parse_item(&self.send(self.client.patch(url))?)
    }

    // ---- private helpers ----

    /// `api_url` plus path segments, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PersistenceError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                PersistenceError::Transient(format!("{} cannot take a path", self.api_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn fetch_list(&self, url: Url) -> Result<Vec<Item>, PersistenceError> {
        let text = self.send(self.client.get(url))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list: ListEnvelope =
            serde_json::from_str(&text).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        let wire = match list {
            ListEnvelope::Wrapped { notes } => notes,
            ListEnvelope::Bare(notes) => notes,
        };
        Ok(wire.into_iter().map(WireItem::into_item).collect())
    }

    /// Attach the session, send, and map the outcome. Returns the body text
    /// of a successful response.
    fn send(&self, request: RequestBuilder) -> Result<String, PersistenceError> {
        let request = match &self.cookie {
            Some(cookie) => request.header(reqwest::header::COOKIE, cookie),
            None => request,
        };
        let response = request.send().map_err(map_reqwest)?;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), url = %response.url(), "remote response");
        match status.as_u16() {
            401 | 403 => return Err(PersistenceError::Unauthorized),
            _ if !status.is_success() => {
                return Err(PersistenceError::Rejected {
                    status: status.as_u16(),
                });
            }
            _ => {}
        }
        response.text().map_err(map_reqwest)
    }
}

fn map_reqwest(err: reqwest::Error) -> PersistenceError {
    if err.is_decode() {
        PersistenceError::Corrupt(err.to_string())
    } else {
        PersistenceError::Transient(err.to_string())
    }
}

/// `Ok(None)` for an empty body
fn parse_item(text: &str) -> Result<Option<Item>, PersistenceError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let envelope: ItemEnvelope =
        serde_json::from_str(text).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
    let wire = match envelope {
        ItemEnvelope::Wrapped { note } => note,
        ItemEnvelope::Bare(note) => note,
    };
    Ok(Some(wire.into_item()))
}

impl PersistenceAdapter for RemoteApi {
    fn load(&mut self, scope: &Scope) -> Result<Collection, PersistenceError> {
        let mut items = self.fetch_active()?;
        items.extend(self.fetch_archived()?);
        tracing::debug!(scope = %scope, count = items.len(), "remote load");

        // Records that break the store invariants are left out, first copy wins
        let mut collection = Collection::new(scope.clone());
        for item in items {
            let id = item.id.clone();
            if let Err(e) = store::add(&mut collection, item) {
                tracing::warn!(id = %id, error = %e, "skipping server record");
            }
        }
        collection.mark_clean();
        Ok(collection)
    }

    /// Every mutation was already sent individually
    fn save(&mut self, _collection: &Collection) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn apply(
        &mut self,
        mutation: &Mutation,
        current: &Collection,
    ) -> Result<Applied, PersistenceError> {
        tracing::debug!(op = mutation.label(), "remote apply");
        let confirmed = match mutation {
            Mutation::Create(draft) => return Ok(Applied::Item(self.create(draft)?)),
            Mutation::Delete(id) => {
                self.delete(id)?;
                return Ok(Applied::Removed(id.clone()));
            }
            Mutation::Update(id, patch) => self.update(id, patch)?,
            Mutation::TogglePin(id) => self.flag(id, "pin")?,
            Mutation::Archive(id) => self.flag(id, "archive")?,
            Mutation::Restore(id) => self.flag(id, "restore")?,
        };
        match confirmed {
            Some(item) => Ok(Applied::Item(item)),
            // Accepted without echoing the item: derive it from our copy
            None => {
                let mut copy = current.clone();
                Ok(store::apply_mutation(
                    &mut copy,
                    mutation,
                    &IdConfig::default(),
                    Utc::now(),
                )?)
            }
        }
    }
}

impl SessionProvider for RemoteApi {
    fn current_user(&self) -> Result<User, SessionError> {
        let text = match self.send(self.client.get(self.endpoint(&["auth", "me"])?)) {
            Ok(text) => text,
            Err(PersistenceError::Unauthorized) => {
                return Err(SessionError::Unauthenticated("session expired or missing".into()));
            }
            Err(e) => return Err(e.into()),
        };
        let me: MeResponse = serde_json::from_str(&text)
            .map_err(|e| SessionError::Backend(PersistenceError::Corrupt(e.to_string())))?;
        me.user
            .ok_or_else(|| SessionError::Unauthenticated("server reports no user".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::Lifecycle;
    use pretty_assertions::assert_eq;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serve canned `(status, body)` responses, one per connection. Each
    /// received request (request line, cookie header, body) is sent back.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut cookie = String::new();
                let mut length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    let (name, value) = line.split_once(": ").unwrap_or((line, ""));
                    match name.to_ascii_lowercase().as_str() {
                        "content-length" => length = value.parse().unwrap(),
                        "cookie" => cookie = value.to_string(),
                        _ => {}
                    }
                }
                let mut payload = vec![0; length];
                reader.read_exact(&mut payload).unwrap();
                tx.send(format!(
                    "{}|{}|{}",
                    request_line.trim_end(),
                    cookie,
                    String::from_utf8_lossy(&payload)
                ))
                .unwrap();

                let mut stream = stream;
                write!(
                    stream,
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
            }
        });
        (addr, rx)
    }

    fn api(addr: &str) -> RemoteApi {
        RemoteApi::new(addr, Some("sid=abc".into()), Duration::from_secs(5)).unwrap()
    }

    const NOTE: &str = r#"{"_id":"65f0a1","title":"Groceries","content":"Buy milk","tag":"","isPinned":true,"isArchived":false,"createdAt":"2025-03-01T09:00:00Z"}"#;

    #[test]
    fn load_merges_active_and_archived() {
        let (addr, rx) = serve(vec![
            (200, r#"[{"_id":"a","content":"one","createdAt":"2025-03-01T09:00:00Z"}]"#),
            (200, r#"{"notes":[{"_id":"b","content":"two","isArchived":true}]}"#),
        ]);
        let mut api = api(&addr);
        let collection = api.load(&Scope::Owner("ana".into())).unwrap();
        assert_eq!(collection.len(), 2);
        assert!(!collection.dirty);

        let b = &collection.items[&ItemId::from("b")];
        assert_eq!(b.lifecycle(), Lifecycle::Archived);
        assert_eq!(b.created_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(b.tag, "general");

        assert_eq!(rx.recv().unwrap(), "GET /api/notes HTTP/1.1|sid=abc|");
        assert_eq!(rx.recv().unwrap(), "GET /api/notes/archived HTTP/1.1|sid=abc|");
    }

    #[test]
    fn load_skips_blank_and_duplicate_records() {
        let (addr, _rx) = serve(vec![
            (200, r#"[{"_id":"a","content":""},{"_id":"b","content":"x"}]"#),
            (200, r#"[{"_id":"b","content":"archived copy","isArchived":true}]"#),
        ]);
        let mut api = api(&addr);
        let collection = api.load(&Scope::Owner("ana".into())).unwrap();

        assert_eq!(collection.len(), 1);
        assert!(!collection.contains(&ItemId::from("a")));
        let b = &collection.items[&ItemId::from("b")];
        assert_eq!(b.body, "x");
        assert_eq!(b.lifecycle(), Lifecycle::Active);
        assert!(!collection.dirty);
    }

    #[test]
    fn create_posts_camel_case_body() {
        let (addr, rx) = serve(vec![(201, NOTE)]);
        let mut api = api(&addr);
        let current = Collection::new(Scope::Owner("ana".into()));
        let draft = ItemDraft::note("Buy milk").with_title("Groceries");
        let Applied::Item(item) = api.apply(&Mutation::Create(draft), &current).unwrap() else {
            panic!("expected an item");
        };
        assert_eq!(item.id.as_str(), "65f0a1");
        assert!(item.pinned);

        let request = rx.recv().unwrap();
        assert!(request.starts_with("POST /api/notes HTTP/1.1|sid=abc|"));
        let body: Value = serde_json::from_str(request.rsplit('|').next().unwrap()).unwrap();
        assert_eq!(body["content"], "Buy milk");
        assert_eq!(body["tag"], "general");
        assert_eq!(body["isPinned"], false);
        assert_eq!(body["kind"], "note");
    }

    #[test]
    fn wrapped_todo_response_is_decoded() {
        let (addr, _rx) = serve(vec![(
            200,
            r#"{"note":{"_id":"t1","content":"file taxes","priority":"2","dueDate":"2025-04-15T00:00:00.000Z"}}"#,
        )]);
        let mut api = api(&addr);
        let current = Collection::new(Scope::Owner("ana".into()));
        let Applied::Item(item) = api
            .apply(&Mutation::Archive(ItemId::from("t1")), &current)
            .unwrap()
        else {
            panic!("expected an item");
        };
        assert_eq!(item.priority(), Some(2));
        assert_eq!(item.due(), NaiveDate::from_ymd_opt(2025, 4, 15));
    }

    #[test]
    fn empty_body_applies_locally() {
        let (addr, rx) = serve(vec![(204, "")]);
        let mut api = api(&addr);
        let item = Item::from_draft(ItemId::from("a"), ItemDraft::note("x"), Utc::now());
        let mut current = Collection::new(Scope::Owner("ana".into()));
        store::add(&mut current, item).unwrap();
        let Applied::Item(item) = api
            .apply(&Mutation::TogglePin(ItemId::from("a")), &current)
            .unwrap()
        else {
            panic!("expected an item");
        };
        assert!(item.pinned);
        // the caller's collection is not touched
        assert!(!current.items[0].pinned);
        assert!(rx.recv().unwrap().starts_with("PATCH /api/notes/a/pin "));
    }

    #[test]
    fn patch_sends_only_changed_fields() {
        let (addr, rx) = serve(vec![(200, "")]);
        let api = api(&addr);
        let patch = ItemPatch {
            title: Some(None),
            tag: Some("#work".into()),
            ..Default::default()
        };
        api.update(&ItemId::from("a"), &patch).unwrap();
        let request = rx.recv().unwrap();
        let body: Value = serde_json::from_str(request.rsplit('|').next().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"title": null, "tag": "#work"}));
    }

    #[test]
    fn status_mapping() {
        let (addr, _rx) = serve(vec![(401, ""), (500, "{}"), (200, "not json")]);
        let mut api = api(&addr);
        let current = Collection::new(Scope::Owner("ana".into()));
        let pin = Mutation::TogglePin(ItemId::from("a"));
        assert!(matches!(
            api.apply(&pin, &current),
            Err(PersistenceError::Unauthorized)
        ));
        assert!(matches!(
            api.apply(&pin, &current),
            Err(PersistenceError::Rejected { status: 500 })
        ));
        assert!(matches!(
            api.apply(&pin, &current),
            Err(PersistenceError::Corrupt(_))
        ));
    }

    #[test]
    fn refused_connection_is_transient() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let api = api(&format!("http://127.0.0.1:{}", port));
        let err = api.fetch_active().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn current_user_from_auth_me() {
        let (addr, rx) = serve(vec![
            (200, r#"{"user":{"name":"Ana","email":"ana@example.com"}}"#),
            (401, ""),
        ]);
        let api = api(&addr);
        let user = api.current_user().unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(rx.recv().unwrap().starts_with("GET /api/auth/me "));
        assert!(matches!(
            api.current_user(),
            Err(SessionError::Unauthenticated(_))
        ));
    }

    #[test]
    fn blank_base_url_is_rejected() {
        assert!(RemoteApi::new("  ", None, Duration::from_secs(1)).is_err());
        assert!(RemoteApi::new("not a url", None, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn ids_are_escaped_in_paths() {
        let (addr, rx) = serve(vec![(200, ""), (200, ""), (200, "")]);
        let api = api(&addr);
        let id = ItemId::from("a/b?c#d");

        api.delete(&id).unwrap();
        assert!(rx.recv().unwrap().starts_with("DELETE /api/notes/a%2Fb%3Fc%23d HTTP/1.1|"));

        let patch = ItemPatch {
            body: Some("x".into()),
            ..Default::default()
        };
        api.update(&id, &patch).unwrap();
        assert!(rx.recv().unwrap().starts_with("PATCH /api/notes/a%2Fb%3Fc%23d HTTP/1.1|"));

        api.flag(&id, "pin").unwrap();
        assert!(rx.recv().unwrap().starts_with("PATCH /api/notes/a%2Fb%3Fc%23d/pin HTTP/1.1|"));
    }
}
