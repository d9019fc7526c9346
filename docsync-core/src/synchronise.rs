//! High-level pipeline: mirrors the structure schema into the remote CMS.
//!
//! This module provides the top-level orchestration logic for "synchronising"
//! a documentation tree. It walks the schema depth-first, strictly in order:
//!   - resolves each shelf, book and chapter **by slug under its immediate
//!     parent**, creating it when the lookup finds nothing
//!   - attaches newly created books to their shelf (best-effort)
//!   - reads each declared page, then updates the remote page when one with
//!     the same slug exists in the chapter, or creates it otherwise
//!   - aggregates counts and errors into a [`SyncStats`]
//!
//! # Error Handling
//! Nothing here aborts the run. A failure resolving a shelf/book/chapter
//! abandons that node's subtree (children need the parent's id) and is
//! recorded; siblings continue. Page-level problems (missing file, unusable
//! frontmatter, remote failure) skip only that page.
//!
//! # Dry Run
//! Read-only lookups still happen so that create-vs-update decisions are
//! identical to a real run; mutations are replaced by "would create/update"
//! log lines and counted the same way. Children of a parent that would be
//! created are known to be new, so they are counted without a lookup.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Supporting types: [`SyncOptions`], [`SyncStats`], [`SyncIssue`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::contract::{EntityKind, NewEntity, PageBody, PageUpdate, RemoteApi, Tag};
use crate::frontmatter::Document;
use crate::revision::UNKNOWN_REVISION;
use crate::schema::{page_path, Book, Chapter, Shelf, StructureSchema};

/// Tag carrying the time of the sync attempt.
pub const SYNC_TIMESTAMP_TAG: &str = "git-sync";
/// Tag carrying the source revision being synced.
pub const SYNC_REVISION_TAG: &str = "git-commit";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Short source revision; see [`crate::revision::source_revision`].
    pub revision: String,
    pub synced_at: DateTime<Utc>,
}

impl SyncOptions {
    pub fn new(dry_run: bool, revision: impl Into<String>) -> Self {
        SyncOptions {
            dry_run,
            revision: revision.into(),
            synced_at: Utc::now(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions::new(false, UNKNOWN_REVISION)
    }
}

/// One recorded failure, located by schema path (`shelf/book/chapter[/page]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncIssue {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub shelves_created: usize,
    pub books_created: usize,
    pub chapters_created: usize,
    pub pages_created: usize,
    pub pages_updated: usize,
    pub errors: Vec<SyncIssue>,
}

impl SyncStats {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn created(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Shelf => self.shelves_created,
            EntityKind::Book => self.books_created,
            EntityKind::Chapter => self.chapters_created,
            EntityKind::Page => self.pages_created,
        }
    }

    fn bump_created(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Shelf => self.shelves_created += 1,
            EntityKind::Book => self.books_created += 1,
            EntityKind::Chapter => self.chapters_created += 1,
            EntityKind::Page => self.pages_created += 1,
        }
    }

    pub fn log_summary(&self) {
        info!(
            shelves_created = self.shelves_created,
            books_created = self.books_created,
            chapters_created = self.chapters_created,
            pages_created = self.pages_created,
            pages_updated = self.pages_updated,
            errors = self.error_count(),
            "[SYNC] Sync statistics"
        );
    }
}

/// Where a child will live remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParentRef {
    Existing(u64),
    /// Would be created by this (dry) run; it has no id yet.
    Planned,
}

struct Resolution {
    target: ParentRef,
    created: bool,
}

/// Entrypoint: synchronise every declared node and page.
pub async fn synchronise<A>(
    schema: &StructureSchema,
    docs_root: &Path,
    api: &A,
    options: &SyncOptions,
) -> SyncStats
where
    A: RemoteApi + ?Sized,
{
    info!(
        docs_root = %docs_root.display(),
        dry_run = options.dry_run,
        revision = %options.revision,
        "[SYNC] Starting documentation sync"
    );

    let mut run = Synchroniser {
        docs_root,
        api,
        options,
        stats: SyncStats::default(),
    };

    for entry in schema.entries() {
        match &entry.shelf {
            Some(shelf) => run.sync_shelf(shelf).await,
            None => run.record("", "Invalid shelf definition"),
        }
    }

    run.stats.log_summary();
    run.stats
}

struct Synchroniser<'a, A: ?Sized> {
    docs_root: &'a Path,
    api: &'a A,
    options: &'a SyncOptions,
    stats: SyncStats,
}

impl<'a, A> Synchroniser<'a, A>
where
    A: RemoteApi + ?Sized,
{
    fn record(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let issue = SyncIssue {
            path: path.into(),
            message: message.into(),
        };
        error!(path = %issue.path, message = %issue.message, "[SYNC][ERROR]");
        self.stats.errors.push(issue);
    }

    async fn sync_shelf(&mut self, shelf: &Shelf) {
        if shelf.name.trim().is_empty() || shelf.slug.trim().is_empty() {
            self.record(&shelf.slug, "Shelf definition is missing its name or slug");
            return;
        }
        info!(shelf = %shelf.name, slug = %shelf.slug, "[SYNC] Syncing shelf");

        let Some(resolved) = self
            .resolve(
                EntityKind::Shelf,
                &shelf.slug,
                &shelf.name,
                shelf.description.as_deref(),
                None,
                &shelf.slug,
            )
            .await
        else {
            return;
        };

        for entry in shelf.entries() {
            match &entry.book {
                Some(book) => self.sync_book(book, shelf, resolved.target).await,
                None => self.record(&shelf.slug, "Invalid book definition"),
            }
        }
    }

    async fn sync_book(&mut self, book: &Book, shelf: &Shelf, shelf_ref: ParentRef) {
        let path = format!("{}/{}", shelf.slug, book.slug);
        if book.name.trim().is_empty() || book.slug.trim().is_empty() {
            self.record(path, "Book definition is missing its name or slug");
            return;
        }
        info!(book = %book.name, slug = %book.slug, "[SYNC] Syncing book");

        let Some(resolved) = self
            .resolve(
                EntityKind::Book,
                &book.slug,
                &book.name,
                book.description.as_deref(),
                Some(shelf_ref),
                &path,
            )
            .await
        else {
            return;
        };

        if let (true, ParentRef::Existing(book_id), ParentRef::Existing(shelf_id)) =
            (resolved.created, resolved.target, shelf_ref)
        {
            if let Err(e) = self.api.link_to_parent(book_id, shelf_id).await {
                // The book exists, so its chapters can still be synced.
                self.record(&path, format!("Failed to attach book to shelf: {e}"));
            }
        }

        for entry in book.entries() {
            match &entry.chapter {
                Some(chapter) => {
                    self.sync_chapter(chapter, shelf, book, resolved.target)
                        .await
                }
                None => self.record(&path, "Invalid chapter definition"),
            }
        }
    }

    async fn sync_chapter(&mut self, chapter: &Chapter, shelf: &Shelf, book: &Book, book_ref: ParentRef) {
        let path = format!("{}/{}/{}", shelf.slug, book.slug, chapter.slug);
        if chapter.name.trim().is_empty() || chapter.slug.trim().is_empty() {
            self.record(path, "Chapter definition is missing its name or slug");
            return;
        }
        info!(chapter = %chapter.name, slug = %chapter.slug, "[SYNC] Syncing chapter");

        let Some(resolved) = self
            .resolve(
                EntityKind::Chapter,
                &chapter.slug,
                &chapter.name,
                chapter.description.as_deref(),
                Some(book_ref),
                &path,
            )
            .await
        else {
            return;
        };

        for page in chapter.pages() {
            self.sync_page(page, shelf, book, chapter, resolved.target)
                .await;
        }
    }

    /// Finds `slug` under `parent`, creating it when absent.
    /// Returns `None` when the subtree must be abandoned.
    async fn resolve(
        &mut self,
        kind: EntityKind,
        slug: &str,
        name: &str,
        description: Option<&str>,
        parent: Option<ParentRef>,
        path: &str,
    ) -> Option<Resolution> {
        let parent_id = match parent {
            Some(ParentRef::Planned) => {
                info!(kind = %kind, name, "[SYNC][DRY RUN] Would create (parent is new)");
                self.stats.bump_created(kind);
                return Some(Resolution {
                    target: ParentRef::Planned,
                    created: true,
                });
            }
            Some(ParentRef::Existing(id)) => Some(id),
            None => None,
        };

        match self.api.find(kind, slug, parent_id).await {
            Ok(Some(existing)) => {
                info!(kind = %kind, name, id = existing.id, "[SYNC] Found existing entity");
                return Some(Resolution {
                    target: ParentRef::Existing(existing.id),
                    created: false,
                });
            }
            Ok(None) => {}
            Err(e) => {
                self.record(path, format!("Failed to look up {kind} '{slug}': {e}"));
                return None;
            }
        }

        if self.options.dry_run {
            info!(kind = %kind, name, "[SYNC][DRY RUN] Would create");
            self.stats.bump_created(kind);
            return Some(Resolution {
                target: ParentRef::Planned,
                created: true,
            });
        }

        let req = NewEntity {
            name: name.to_string(),
            description: description.map(str::to_string),
            parent_id,
            page: None,
        };
        match self.api.create(kind, req).await {
            Ok(created) => {
                info!(kind = %kind, name, id = created.id, "[SYNC] Created entity");
                self.stats.bump_created(kind);
                Some(Resolution {
                    target: ParentRef::Existing(created.id),
                    created: true,
                })
            }
            Err(e) => {
                self.record(path, format!("Failed to create {kind} '{name}': {e}"));
                None
            }
        }
    }

    async fn sync_page(
        &mut self,
        page_slug: &str,
        shelf: &Shelf,
        book: &Book,
        chapter: &Chapter,
        chapter_ref: ParentRef,
    ) {
        let path = format!("{}/{}/{}/{}", shelf.slug, book.slug, chapter.slug, page_slug);
        let file = self
            .docs_root
            .join(page_path(&shelf.slug, &book.slug, &chapter.slug, page_slug));

        if !file.is_file() {
            warn!(file = %file.display(), "[SYNC] Page file not found");
            self.record(path, format!("Page file not found: {}", file.display()));
            return;
        }
        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) => {
                self.record(path, format!("Failed to read {}: {e}", file.display()));
                return;
            }
        };

        let document = Document::parse(&text);
        let Some(meta) = document.metadata() else {
            let reason = document.frontmatter.problem().unwrap_or_default();
            self.record(path, format!("No usable frontmatter in {}: {reason}", file.display()));
            return;
        };

        let name = meta.title().unwrap_or_else(|| page_slug.to_string());
        let tags = self.page_tags(meta.tags());
        info!(page = %name, slug = page_slug, "[SYNC] Syncing page");

        let chapter_id = match chapter_ref {
            ParentRef::Planned => {
                info!(page = %name, "[SYNC][DRY RUN] Would create page (chapter is new)");
                self.stats.pages_created += 1;
                return;
            }
            ParentRef::Existing(id) => id,
        };

        let existing = match self.api.find(EntityKind::Page, page_slug, Some(chapter_id)).await {
            Ok(existing) => existing,
            Err(e) => {
                self.record(path, format!("Failed to look up page '{page_slug}': {e}"));
                return;
            }
        };

        match (existing, self.options.dry_run) {
            (Some(_), true) => {
                info!(page = %name, "[SYNC][DRY RUN] Would update page");
                self.stats.pages_updated += 1;
            }
            (None, true) => {
                info!(page = %name, "[SYNC][DRY RUN] Would create page");
                self.stats.pages_created += 1;
            }
            (Some(remote), false) => {
                let req = PageUpdate {
                    name: name.clone(),
                    markdown: document.body.clone(),
                    tags,
                };
                match self.api.update_page(remote.id, req).await {
                    Ok(_) => {
                        info!(page = %name, id = remote.id, "[SYNC] Updated page");
                        self.stats.pages_updated += 1;
                    }
                    Err(e) => self.record(path, format!("Failed to update page '{name}': {e}")),
                }
            }
            (None, false) => {
                let req = NewEntity {
                    name: name.clone(),
                    description: None,
                    parent_id: Some(chapter_id),
                    page: Some(PageBody {
                        markdown: document.body.clone(),
                        tags,
                    }),
                };
                match self.api.create(EntityKind::Page, req).await {
                    Ok(created) => {
                        info!(page = %name, id = created.id, "[SYNC] Created page");
                        self.stats.pages_created += 1;
                    }
                    Err(e) => self.record(path, format!("Failed to create page '{name}': {e}")),
                }
            }
        }
    }

    /// Declared tags plus the two provenance tags.
    fn page_tags(&self, declared: Vec<String>) -> Vec<Tag> {
        let mut tags: Vec<Tag> = declared.into_iter().map(|t| Tag::new(t, "")).collect();
        tags.push(Tag::new(
            SYNC_TIMESTAMP_TAG,
            self.options
                .synced_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
        tags.push(Tag::new(SYNC_REVISION_TAG, self.options.revision.clone()));
        tags
    }
}
