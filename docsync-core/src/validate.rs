//! Structure validator: cross-checks the schema against the on-disk document tree.
//!
//! Every check runs independently and all of them always run; findings are
//! accumulated as [`ValidationIssue`]s, never raised. A run passes iff no
//! issue has [`Severity::Error`]. Warnings (missing directories or pages,
//! orphaned files) describe state that a later sync may still fix.
//!
//! # Checks
//! - schema well-formedness (required fields, non-empty page lists)
//! - filesystem presence of declared shelves/books/chapters/pages
//! - page naming convention (`00-kebab-case`) for files at depth >= 4
//! - frontmatter completeness of every markdown file
//! - slug uniqueness within each scope
//! - orphaned markdown files not declared in the schema

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::frontmatter::{Document, FieldProblem, Frontmatter};
use crate::schema::{page_path, Book, Chapter, Shelf, StructureSchema};

/// Rule codes attached to issues.
pub mod rule {
    pub const STRUCTURE_DEFINITION: &str = "structure_definition";
    pub const MISSING_FIELD: &str = "missing_field";
    pub const REQUIRED_PAGES: &str = "required_pages";
    pub const MISSING_DIRECTORY: &str = "missing_directory";
    pub const MISSING_PAGE: &str = "missing_page";
    pub const NAMING_CONVENTION: &str = "naming_convention";
    pub const FRONTMATTER_REQUIRED: &str = "frontmatter_required";
    pub const FRONTMATTER_PARSE: &str = "frontmatter_parse";
    pub const FRONTMATTER_FIELD: &str = "frontmatter_field";
    pub const FRONTMATTER_FORMAT: &str = "frontmatter_format";
    pub const FILE_READ: &str = "file_read";
    pub const UNIQUE_SLUGS: &str = "unique_slugs";
    pub const ORPHANED_FILE: &str = "orphaned_file";
}

/// Directory names whose contents are never reported as orphans.
pub const EXCLUDED_DIRS: [&str; 2] = ["drafts", "archive"];

/// Minimum number of path components (shelf/book/chapter/page.md) for the
/// naming convention to apply.
const PAGE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub rule: String,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn errors_for(&self, rule: &str) -> impl Iterator<Item = &ValidationIssue> {
        let rule = rule.to_string();
        self.errors.iter().filter(move |e| e.rule == rule)
    }

    pub fn warnings_for(&self, rule: &str) -> impl Iterator<Item = &ValidationIssue> {
        let rule = rule.to_string();
        self.warnings.iter().filter(move |w| w.rule == rule)
    }
}

fn page_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{2}-[a-z]+(-[a-z]+)*$").expect("valid page name regex"))
}

/// Runs every check against `docs_root` and returns the accumulated outcome.
pub fn validate(schema: &StructureSchema, docs_root: &Path) -> ValidationOutcome {
    info!(docs_root = %docs_root.display(), version = %schema.version_label(), "[VALIDATE] Starting structure validation");

    let mut validator = Validator {
        schema,
        docs_root,
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    let markdown = validator.markdown_files();

    validator.check_structure_definition();
    validator.check_filesystem();
    validator.check_naming(&markdown);
    validator.check_frontmatter(&markdown);
    validator.check_unique_slugs();
    validator.check_orphans(&markdown);

    let outcome = ValidationOutcome {
        passed: validator.errors.is_empty(),
        errors: validator.errors,
        warnings: validator.warnings,
    };
    info!(
        errors = outcome.errors.len(),
        warnings = outcome.warnings.len(),
        passed = outcome.passed,
        "[VALIDATE] Validation finished"
    );
    outcome
}

struct Validator<'a> {
    schema: &'a StructureSchema,
    docs_root: &'a Path,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl<'a> Validator<'a> {
    fn error(&mut self, rule: &str, path: impl Into<String>, message: impl Into<String>) {
        let issue = ValidationIssue {
            severity: Severity::Error,
            rule: rule.to_string(),
            path: path.into(),
            message: message.into(),
        };
        debug!(rule = %issue.rule, path = %issue.path, message = %issue.message, "[VALIDATE] error");
        self.errors.push(issue);
    }

    fn warning(&mut self, rule: &str, path: impl Into<String>, message: impl Into<String>) {
        let issue = ValidationIssue {
            severity: Severity::Warning,
            rule: rule.to_string(),
            path: path.into(),
            message: message.into(),
        };
        debug!(rule = %issue.rule, path = %issue.path, message = %issue.message, "[VALIDATE] warning");
        self.warnings.push(issue);
    }

    fn display(&self, relative: &Path) -> String {
        self.docs_root.join(relative).display().to_string()
    }

    /// All `*.md` files under the docs root, sorted by name at each level.
    fn markdown_files(&mut self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if !self.docs_root.is_dir() {
            self.warning(
                rule::MISSING_DIRECTORY,
                self.docs_root.display().to_string(),
                "Docs root not found",
            );
            return files;
        }
        for entry in WalkDir::new(self.docs_root).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file()
                        && path.extension().and_then(|e| e.to_str()) == Some("md")
                    {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| self.docs_root.display().to_string());
                    warn!(error = %e, path = %path, "[VALIDATE] Failed to walk docs tree");
                    self.error(rule::FILE_READ, path, format!("Failed to read directory: {e}"));
                }
            }
        }
        files
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.docs_root).unwrap_or(path)
    }

    fn check_structure_definition(&mut self) {
        info!("[VALIDATE] Validating structure definition");
        let schema = self.schema;
        if schema.structure.is_none() {
            self.error(rule::STRUCTURE_DEFINITION, "", "Missing structure definition");
            return;
        }
        for entry in schema.entries() {
            match &entry.shelf {
                Some(shelf) => self.check_shelf(shelf),
                None => self.error(rule::STRUCTURE_DEFINITION, "", "Invalid shelf definition"),
            }
        }
    }

    fn check_shelf(&mut self, shelf: &Shelf) {
        let path = or_unknown(&shelf.name).to_string();
        missing_text(&shelf.name, "name")
            .into_iter()
            .chain(missing_text(&shelf.slug, "slug"))
            .chain(shelf.books.is_none().then_some("books"))
            .for_each(|field| {
                self.error(
                    rule::MISSING_FIELD,
                    path.clone(),
                    format!("Shelf missing required field: {field}"),
                )
            });

        for entry in shelf.entries() {
            match &entry.book {
                Some(book) => self.check_book(book, &shelf.slug),
                None => self.error(rule::STRUCTURE_DEFINITION, path.clone(), "Invalid book definition"),
            }
        }
    }

    fn check_book(&mut self, book: &Book, shelf_slug: &str) {
        let path = format!("{shelf_slug}/{}", or_unknown(&book.name));
        missing_text(&book.name, "name")
            .into_iter()
            .chain(missing_text(&book.slug, "slug"))
            .chain(book.chapters.is_none().then_some("chapters"))
            .for_each(|field| {
                self.error(
                    rule::MISSING_FIELD,
                    path.clone(),
                    format!("Book missing required field: {field}"),
                )
            });

        for entry in book.entries() {
            match &entry.chapter {
                Some(chapter) => self.check_chapter(chapter, shelf_slug, &book.slug),
                None => self.error(rule::STRUCTURE_DEFINITION, path.clone(), "Invalid chapter definition"),
            }
        }
    }

    fn check_chapter(&mut self, chapter: &Chapter, shelf_slug: &str, book_slug: &str) {
        let path = format!("{shelf_slug}/{book_slug}/{}", or_unknown(&chapter.name));
        missing_text(&chapter.name, "name")
            .into_iter()
            .chain(missing_text(&chapter.slug, "slug"))
            .chain(chapter.pages.is_none().then_some("pages"))
            .for_each(|field| {
                self.error(
                    rule::MISSING_FIELD,
                    path.clone(),
                    format!("Chapter missing required field: {field}"),
                )
            });

        if matches!(&chapter.pages, Some(pages) if pages.is_empty()) {
            self.error(rule::REQUIRED_PAGES, path, "Chapter must have at least one page");
        }
    }

    /// Directories may be created lazily by a sync, so absence is a warning
    /// and descent stops at the first missing level.
    fn check_filesystem(&mut self) {
        info!("[VALIDATE] Validating filesystem structure");
        let schema = self.schema;
        for shelf in schema.shelves().filter(|s| !s.slug.is_empty()) {
            let shelf_dir = self.docs_root.join(&shelf.slug);
            if !shelf_dir.is_dir() {
                self.warning(
                    rule::MISSING_DIRECTORY,
                    shelf_dir.display().to_string(),
                    format!("Shelf directory not found: {}", shelf.name),
                );
                continue;
            }
            for book in shelf.books().filter(|b| !b.slug.is_empty()) {
                let book_dir = shelf_dir.join(&book.slug);
                if !book_dir.is_dir() {
                    self.warning(
                        rule::MISSING_DIRECTORY,
                        book_dir.display().to_string(),
                        format!("Book directory not found: {}", book.name),
                    );
                    continue;
                }
                for chapter in book.chapters().filter(|c| !c.slug.is_empty()) {
                    let chapter_dir = book_dir.join(&chapter.slug);
                    if !chapter_dir.is_dir() {
                        self.warning(
                            rule::MISSING_DIRECTORY,
                            chapter_dir.display().to_string(),
                            format!("Chapter directory not found: {}", chapter.name),
                        );
                        continue;
                    }
                    for page in chapter.pages() {
                        let page_file = chapter_dir.join(format!("{page}.md"));
                        if !page_file.is_file() {
                            self.warning(
                                rule::MISSING_PAGE,
                                page_file.display().to_string(),
                                format!("Page file not found: {page}"),
                            );
                        }
                    }
                }
            }
        }
    }

    fn check_naming(&mut self, markdown: &[PathBuf]) {
        info!("[VALIDATE] Validating naming conventions");
        for file in markdown {
            if self.relative(file).components().count() < PAGE_DEPTH {
                continue;
            }
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !page_name_pattern().is_match(&stem) {
                self.error(
                    rule::NAMING_CONVENTION,
                    file.display().to_string(),
                    format!("Page name '{stem}' doesn't match pattern '00-kebab-case'"),
                );
            }
        }
    }

    fn check_frontmatter(&mut self, markdown: &[PathBuf]) {
        info!("[VALIDATE] Validating frontmatter");
        for file in markdown {
            let path = file.display().to_string();
            let text = match fs::read_to_string(file) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = ?e, path = %path, "[VALIDATE] Failed to read markdown file");
                    self.error(rule::FILE_READ, path, format!("Failed to read file: {e}"));
                    continue;
                }
            };

            let document = Document::parse(&text);
            let meta = match &document.frontmatter {
                Frontmatter::Present(meta) => meta,
                Frontmatter::Malformed { .. } => {
                    let message = document.frontmatter.problem().unwrap_or_default();
                    self.error(rule::FRONTMATTER_PARSE, path, message);
                    continue;
                }
                other => {
                    let message = other.problem().unwrap_or_default();
                    self.error(rule::FRONTMATTER_REQUIRED, path, message);
                    continue;
                }
            };

            for problem in meta.problems() {
                match problem {
                    FieldProblem::Missing(field) => self.error(
                        rule::FRONTMATTER_FIELD,
                        path.clone(),
                        format!("Missing required frontmatter field: {field}"),
                    ),
                    FieldProblem::BadDate(raw) => self.error(
                        rule::FRONTMATTER_FORMAT,
                        path.clone(),
                        format!("Invalid date format for last_updated '{raw}' (use YYYY-MM-DD)"),
                    ),
                }
            }
        }
    }

    fn check_unique_slugs(&mut self) {
        info!("[VALIDATE] Validating unique slugs");
        let schema = self.schema;
        let mut shelf_slugs = HashSet::new();
        for shelf in schema.shelves().filter(|s| !s.slug.is_empty()) {
            if !shelf_slugs.insert(shelf.slug.as_str()) {
                self.error(
                    rule::UNIQUE_SLUGS,
                    shelf.slug.clone(),
                    format!("Duplicate shelf slug: {}", shelf.slug),
                );
            }

            let mut book_slugs = HashSet::new();
            for book in shelf.books().filter(|b| !b.slug.is_empty()) {
                if !book_slugs.insert(book.slug.as_str()) {
                    self.error(
                        rule::UNIQUE_SLUGS,
                        format!("{}/{}", shelf.slug, book.slug),
                        format!("Duplicate book slug within shelf: {}", book.slug),
                    );
                }

                let mut chapter_slugs = HashSet::new();
                for chapter in book.chapters().filter(|c| !c.slug.is_empty()) {
                    if !chapter_slugs.insert(chapter.slug.as_str()) {
                        self.error(
                            rule::UNIQUE_SLUGS,
                            format!("{}/{}/{}", shelf.slug, book.slug, chapter.slug),
                            format!("Duplicate chapter slug within book: {}", chapter.slug),
                        );
                    }
                }
            }
        }
    }

    fn check_orphans(&mut self, markdown: &[PathBuf]) {
        info!("[VALIDATE] Checking for orphaned files");
        let expected: HashSet<PathBuf> = self
            .schema
            .pages()
            .map(|(shelf, book, chapter, page)| page_path(&shelf.slug, &book.slug, &chapter.slug, page))
            .collect();

        for file in markdown {
            let relative = self.relative(file);
            if is_excluded(relative) || expected.contains(relative) {
                continue;
            }
            let path = self.display(relative);
            self.warning(rule::ORPHANED_FILE, path, "File not defined in structure");
        }
    }
}

/// True when any component is dot-prefixed or an excluded directory name.
pub fn is_excluded(relative: &Path) -> bool {
    relative.components().any(|component| {
        let part = component.as_os_str().to_string_lossy();
        part.starts_with('.') || EXCLUDED_DIRS.contains(&&*part)
    })
}

fn missing_text(value: &str, field: &'static str) -> Option<&'static str> {
    value.trim().is_empty().then_some(field)
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "unknown"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_pattern_accepts_numbered_kebab_case() {
        let re = page_name_pattern();
        assert!(re.is_match("01-getting-started"));
        assert!(re.is_match("99-x"));
        assert!(!re.is_match("1-getting-started"));
        assert!(!re.is_match("01_getting_started"));
        assert!(!re.is_match("01-Getting-Started"));
        assert!(!re.is_match("01-"));
        assert!(!re.is_match("getting-started"));
    }

    #[test]
    fn exclusion_covers_dot_drafts_and_archive() {
        assert!(is_excluded(Path::new("ops/runbooks/backup/drafts/x.md")));
        assert!(is_excluded(Path::new("archive/x.md")));
        assert!(is_excluded(Path::new(".github/x.md")));
        assert!(!is_excluded(Path::new("ops/runbooks/backup/x.md")));
    }

    #[test]
    fn missing_structure_key_is_reported_once() {
        let schema = StructureSchema::from_yaml("version: 1\n").unwrap();
        let dir = std::env::temp_dir();
        let outcome = validate(&schema, &dir.join("docsync-no-such-root"));
        assert_eq!(outcome.errors_for(rule::STRUCTURE_DEFINITION).count(), 1);
        assert!(!outcome.passed);
    }
}
