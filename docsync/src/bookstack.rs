#![doc = "BookStack REST client: implements the core `RemoteApi` contract over HTTP."]
//
//! # BookStack client
//!
//! [`BookStackClient`] is the production implementation of
//! [`docsync_core::contract::RemoteApi`]. It speaks the BookStack REST API
//! with token authentication (`Authorization: Token <id>:<secret>`).
//!
//! ## Lookups
//! - shelves and books: `GET /api/{shelves|books}?filter[slug]=<slug>`
//!   (book slugs are global in BookStack, so the shelf id is not used)
//! - chapters: the `contents` of `GET /api/books/{id}`
//! - pages: the `pages` of `GET /api/chapters/{id}`
//!
//! ## Mutations
//! - create: `POST /api/{shelves|books|chapters|pages}`
//! - page update: `PUT /api/pages/{id}`
//! - shelf membership: read the shelf's books, `PUT` the extended list.
//!
//! Every request shares a single bounded timeout configured on the client.

use async_trait::async_trait;
use docsync_core::contract::{
    EntityKind, NewEntity, PageUpdate, RemoteApi, RemoteEntity, RemoteError, Tag,
};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub const TOKEN_ID_ENV: &str = "BOOKSTACK_TOKEN_ID";
pub const TOKEN_SECRET_ENV: &str = "BOOKSTACK_TOKEN_SECRET";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Statuses meaning the server does not support an optional operation.
const UNSUPPORTED: [StatusCode; 3] = [
    StatusCode::NOT_FOUND,
    StatusCode::METHOD_NOT_ALLOWED,
    StatusCode::NOT_IMPLEMENTED,
];

pub struct BookStackClient {
    base_url: String,
    authorization: String,
    http: reqwest::Client,
}

impl BookStackClient {
    pub fn new(
        base_url: &str,
        token_id: &str,
        token_secret: &str,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        tracing::info!(
            base_url,
            timeout_secs = timeout.as_secs(),
            "Initialized BookStack client"
        );
        Ok(BookStackClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("Token {token_id}:{token_secret}"),
            http,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint)
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, RemoteError> {
        let url = self.url(endpoint);
        tracing::debug!(%method, url = %url, "BookStack request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| {
            tracing::error!(error = %e, url = %url, "BookStack request failed");
            RemoteError::Transport(e.to_string())
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if !status.is_success() {
            tracing::error!(status = %status, url = %url, body = %text, "BookStack API error");
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value, RemoteError> {
        self.request(Method::GET, endpoint, query, None).await
    }
}

/// Collection endpoint for an entity kind.
pub fn endpoint(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Shelf => "shelves",
        EntityKind::Book => "books",
        EntityKind::Chapter => "chapters",
        EntityKind::Page => "pages",
    }
}

fn parent_key(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Shelf | EntityKind::Book => None,
        EntityKind::Chapter => Some("book_id"),
        EntityKind::Page => Some("chapter_id"),
    }
}

fn tags_json(tags: &[Tag]) -> Value {
    Value::Array(
        tags.iter()
            .map(|t| json!({ "name": t.name, "value": t.value }))
            .collect(),
    )
}

/// JSON body for creating an entity of `kind`.
pub fn create_payload(kind: EntityKind, req: &NewEntity) -> Result<Value, RemoteError> {
    let mut body = json!({
        "name": req.name,
        "description": req.description.clone().unwrap_or_default(),
    });
    if let Some(key) = parent_key(kind) {
        let parent = req
            .parent_id
            .ok_or_else(|| RemoteError::InvalidRequest(format!("{kind} requires {key}")))?;
        body[key] = json!(parent);
    }
    if kind == EntityKind::Page {
        let page = req
            .page
            .as_ref()
            .ok_or_else(|| RemoteError::InvalidRequest("page requires content".to_string()))?;
        body["markdown"] = json!(page.markdown);
        body["tags"] = tags_json(&page.tags);
        if let Some(map) = body.as_object_mut() {
            map.remove("description");
        }
    }
    Ok(body)
}

pub fn update_payload(req: &PageUpdate) -> Value {
    json!({
        "name": req.name,
        "markdown": req.markdown,
        "tags": tags_json(&req.tags),
    })
}

/// Reads an entity from a BookStack JSON object.
pub fn parse_entity(kind: EntityKind, value: &Value) -> Result<RemoteEntity, RemoteError> {
    let id = value
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| RemoteError::Decode(format!("{kind} without numeric id: {value}")))?;
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Ok(RemoteEntity {
        id,
        name: text("name"),
        slug: text("slug"),
        parent_id: parent_key(kind).and_then(|key| value.get(key).and_then(Value::as_u64)),
    })
}

/// Finds the item with `slug` in `items`, optionally requiring a `type`.
pub fn find_by_slug(
    kind: EntityKind,
    items: Option<&Value>,
    slug: &str,
    item_type: Option<&str>,
) -> Result<Option<RemoteEntity>, RemoteError> {
    let Some(items) = items.and_then(Value::as_array) else {
        return Ok(None);
    };
    items
        .iter()
        .filter(|item| {
            item_type.map_or(true, |t| item.get("type").and_then(Value::as_str) == Some(t))
        })
        .find(|item| item.get("slug").and_then(Value::as_str) == Some(slug))
        .map(|item| parse_entity(kind, item))
        .transpose()
}

/// Ids of the books currently on a shelf, from `GET /api/shelves/{id}`.
pub fn shelf_book_ids(shelf: &Value) -> Vec<u64> {
    shelf
        .get("books")
        .and_then(Value::as_array)
        .map(|books| {
            books
                .iter()
                .filter_map(|b| b.get("id").and_then(Value::as_u64))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl RemoteApi for BookStackClient {
    async fn find(
        &self,
        kind: EntityKind,
        slug: &str,
        parent_id: Option<u64>,
    ) -> Result<Option<RemoteEntity>, RemoteError> {
        match (kind, parent_id) {
            (EntityKind::Shelf | EntityKind::Book, _) => {
                let list = self
                    .get(endpoint(kind), &[("filter[slug]", slug)])
                    .await?;
                find_by_slug(kind, list.get("data"), slug, None)
            }
            (EntityKind::Chapter, Some(book_id)) => {
                let book = self.get(&format!("books/{book_id}"), &[]).await?;
                find_by_slug(kind, book.get("contents"), slug, Some("chapter")).map(|found| {
                    found.map(|mut e| {
                        e.parent_id = e.parent_id.or(Some(book_id));
                        e
                    })
                })
            }
            (EntityKind::Page, Some(chapter_id)) => {
                let chapter = self.get(&format!("chapters/{chapter_id}"), &[]).await?;
                find_by_slug(kind, chapter.get("pages"), slug, None)
            }
            (_, None) => Err(RemoteError::InvalidRequest(format!(
                "looking up a {kind} requires a parent id"
            ))),
        }
    }

    async fn create(&self, kind: EntityKind, req: NewEntity) -> Result<RemoteEntity, RemoteError> {
        let body = create_payload(kind, &req)?;
        tracing::info!(kind = %kind, name = %req.name, "Creating BookStack entity");
        let created = self
            .request(Method::POST, endpoint(kind), &[], Some(&body))
            .await?;
        parse_entity(kind, &created)
    }

    async fn update_page(&self, id: u64, req: PageUpdate) -> Result<RemoteEntity, RemoteError> {
        let body = update_payload(&req);
        tracing::info!(page_id = id, name = %req.name, "Updating BookStack page");
        let updated = self
            .request(Method::PUT, &format!("pages/{id}"), &[], Some(&body))
            .await?;
        parse_entity(EntityKind::Page, &updated)
    }

    async fn link_to_parent(&self, book_id: u64, shelf_id: u64) -> Result<(), RemoteError> {
        let endpoint = format!("shelves/{shelf_id}");
        let result: Result<(), RemoteError> = async {
            let shelf = self.get(&endpoint, &[]).await?;
            let mut books = shelf_book_ids(&shelf);
            if books.contains(&book_id) {
                return Ok(());
            }
            books.push(book_id);
            self.request(Method::PUT, &endpoint, &[], Some(&json!({ "books": books })))
                .await
                .map(|_| ())
        }
        .await;

        match result {
            Err(RemoteError::Status { status, .. })
                if UNSUPPORTED.iter().any(|s| s.as_u16() == status) =>
            {
                tracing::warn!(
                    book_id,
                    shelf_id,
                    status,
                    "Shelf membership update not supported, skipping"
                );
                Ok(())
            }
            other => other,
        }
    }
}
