#![allow(unused)]

//! # contract: interface to the remote content-management system
//!
//! This module defines the [`RemoteApi`] trait and the plain data types that
//! travel across it. The sync orchestrator only ever talks to the CMS through
//! this trait, so production clients (see the `docsync` crate's BookStack
//! client), in-memory fakes and `mockall` mocks are interchangeable.
//!
//! ## Identity
//! - Entities are looked up by **slug** within their immediate parent. Slugs
//!   are the durable key across systems; ids are assigned by the remote side.
//!
//! ## Errors
//! - All methods return [`RemoteError`], which is kept distinct from local
//!   validation or parsing problems.
//! - [`RemoteApi::link_to_parent`] must treat an "unsupported operation"
//!   response as success; only transport/auth failures are errors.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks (`MockRemoteApi`) for unit/integration tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use mockall::{automock, predicate::*};

/// The four levels of the documentation hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Shelf,
    Book,
    Chapter,
    Page,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Shelf => "shelf",
            EntityKind::Book => "book",
            EntityKind::Chapter => "chapter",
            EntityKind::Page => "page",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity as the remote side knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<u64>,
}

/// A `{name, value}` tag attached to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Page payload sent on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBody {
    pub markdown: String,
    pub tags: Vec<Tag>,
}

/// The data needed to create an entity of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntity {
    pub name: String,
    pub description: Option<String>,
    /// Shelf id for books, book id for chapters, chapter id for pages.
    pub parent_id: Option<u64>,
    /// Only set for pages.
    pub page: Option<PageBody>,
}

/// Replacement content for an existing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpdate {
    pub name: String,
    pub markdown: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a response (connect, timeout, TLS...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-2xx status.
    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The request could not be built, e.g. a chapter without a book id.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Trait for resolving and mutating entities in the remote CMS.
///
/// The trait is `Send` + `Sync` and intended for async/await usage; calls are
/// issued strictly one after another by the orchestrator.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Look up an entity of `kind` by slug under `parent_id`
    /// (`None` for shelves).
    async fn find(
        &self,
        kind: EntityKind,
        slug: &str,
        parent_id: Option<u64>,
    ) -> Result<Option<RemoteEntity>, RemoteError>;

    /// Create a new entity and return it with its remote-assigned id.
    async fn create(&self, kind: EntityKind, req: NewEntity) -> Result<RemoteEntity, RemoteError>;

    /// Replace the name, content and tags of an existing page.
    async fn update_page(&self, id: u64, req: PageUpdate) -> Result<RemoteEntity, RemoteError>;

    /// Attach a book to a shelf. Best-effort: an unsupported operation is `Ok`.
    async fn link_to_parent(&self, book_id: u64, shelf_id: u64) -> Result<(), RemoteError>;
}
