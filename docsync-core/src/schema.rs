//! Structure schema: the declarative shelf → book → chapter → page hierarchy.
//!
//! The schema is loaded once per run from YAML and is read-only afterwards.
//! Loading is strict about YAML syntax (a broken file is fatal, see
//! [`SchemaError`]) but lenient about missing fields: those surface as
//! validation errors (see [`crate::validate`]) or as per-node sync errors,
//! so one malformed shelf never hides problems in its siblings.
//!
//! The on-disk shape mirrors the CMS hierarchy:
//!
//! ```yaml
//! version: 1
//! structure:
//!   - shelf:
//!       name: Operations
//!       slug: ops
//!       books:
//!         - book:
//!             name: Runbooks
//!             slug: runbooks
//!             chapters:
//!               - chapter:
//!                   name: Backup
//!                   slug: backup
//!                   pages: [01-strategy, 02-procedures]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Fatal schema loading failures. No partial result is produced for these.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read structure file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse structure file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// The whole structure definition as declared in YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructureSchema {
    #[serde(default)]
    pub version: Option<serde_yaml::Value>,
    #[serde(default)]
    pub structure: Option<Vec<ShelfEntry>>,
}

/// A list item under `structure:`. Items without a `shelf:` key are kept so
/// the validator can report them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShelfEntry {
    #[serde(default)]
    pub shelf: Option<Shelf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookEntry {
    #[serde(default)]
    pub book: Option<Book>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterEntry {
    #[serde(default)]
    pub chapter: Option<Chapter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Shelf {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub books: Option<Vec<BookEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub chapters: Option<Vec<ChapterEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pages: Option<Vec<String>>,
}

impl StructureSchema {
    /// Parses a schema from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as unit, not as a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Reads and parses the structure file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        info!(structure_file = %path.display(), "Loading structure definition");

        let text = fs::read_to_string(path).map_err(|source| {
            error!(error = ?source, structure_file = %path.display(), "Failed to read structure file");
            SchemaError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let schema = Self::from_yaml(&text).map_err(|source| {
            error!(error = %source, structure_file = %path.display(), "Failed to parse structure file");
            SchemaError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        info!(
            structure_file = %path.display(),
            shelves = schema.shelves().count(),
            version = %schema.version_label(),
            "Loaded structure definition"
        );
        Ok(schema)
    }

    /// The declared `version`, rendered for reports; `"unknown"` when absent.
    pub fn version_label(&self) -> String {
        match &self.version {
            None | Some(serde_yaml::Value::Null) => "unknown".to_string(),
            Some(serde_yaml::Value::String(s)) => s.clone(),
            Some(serde_yaml::Value::Number(n)) => n.to_string(),
            Some(serde_yaml::Value::Bool(b)) => b.to_string(),
            Some(other) => serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    pub fn entries(&self) -> &[ShelfEntry] {
        self.structure.as_deref().unwrap_or_default()
    }

    /// Well-formed shelf entries, in declaration order.
    pub fn shelves(&self) -> impl Iterator<Item = &Shelf> {
        self.entries().iter().filter_map(|entry| entry.shelf.as_ref())
    }

    /// Every declared page as `(shelf, book, chapter, page_slug)`.
    pub fn pages(&self) -> impl Iterator<Item = (&Shelf, &Book, &Chapter, &str)> {
        self.shelves().flat_map(|shelf| {
            shelf.books().flat_map(move |book| {
                book.chapters().flat_map(move |chapter| {
                    chapter
                        .pages()
                        .iter()
                        .map(move |page| (shelf, book, chapter, page.as_str()))
                })
            })
        })
    }
}

impl Shelf {
    pub fn entries(&self) -> &[BookEntry] {
        self.books.as_deref().unwrap_or_default()
    }

    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.entries().iter().filter_map(|entry| entry.book.as_ref())
    }
}

impl Book {
    pub fn entries(&self) -> &[ChapterEntry] {
        self.chapters.as_deref().unwrap_or_default()
    }

    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.entries()
            .iter()
            .filter_map(|entry| entry.chapter.as_ref())
    }
}

impl Chapter {
    pub fn pages(&self) -> &[String] {
        self.pages.as_deref().unwrap_or_default()
    }
}

/// Relative location of a page document: `<shelf>/<book>/<chapter>/<page>.md`.
pub fn page_path(shelf_slug: &str, book_slug: &str, chapter_slug: &str, page_slug: &str) -> PathBuf {
    Path::new(shelf_slug)
        .join(book_slug)
        .join(chapter_slug)
        .join(format!("{page_slug}.md"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "2.1"
structure:
  - shelf:
      name: Operations
      slug: ops
      description: Day to day operations
      books:
        - book:
            name: Runbooks
            slug: runbooks
            chapters:
              - chapter:
                  name: Backup
                  slug: backup
                  pages:
                    - 01-strategy
                    - 02-procedures
  - shelf:
      name: Engineering
      slug: engineering
      books: []
"#;

    #[test]
    fn parses_nested_hierarchy() {
        let schema = StructureSchema::from_yaml(SAMPLE).unwrap();
        assert_eq!(schema.version_label(), "2.1");
        let shelves: Vec<_> = schema.shelves().collect();
        assert_eq!(shelves.len(), 2);
        assert_eq!(shelves[0].slug, "ops");
        assert_eq!(
            shelves[0].description.as_deref(),
            Some("Day to day operations")
        );

        let pages: Vec<_> = schema
            .pages()
            .map(|(s, b, c, p)| format!("{}/{}/{}/{}", s.slug, b.slug, c.slug, p))
            .collect();
        assert_eq!(
            pages,
            vec!["ops/runbooks/backup/01-strategy", "ops/runbooks/backup/02-procedures"]
        );
    }

    #[test]
    fn missing_fields_load_as_defaults() {
        let schema = StructureSchema::from_yaml(
            "structure:\n  - shelf:\n      name: Loose\n  - not_a_shelf: true\n",
        )
        .unwrap();
        assert_eq!(schema.entries().len(), 2);
        assert!(schema.entries()[1].shelf.is_none());
        let shelf = schema.shelves().next().unwrap();
        assert!(shelf.slug.is_empty());
        assert!(shelf.books.is_none());
        assert_eq!(schema.version_label(), "unknown");
    }

    #[test]
    fn numeric_version_is_rendered() {
        let schema = StructureSchema::from_yaml("version: 3\nstructure: []\n").unwrap();
        assert_eq!(schema.version_label(), "3");
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(StructureSchema::from_yaml("structure: [:::").is_err());
    }

    #[test]
    fn load_reports_missing_file_distinctly() {
        let err = StructureSchema::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, SchemaError::Read { .. }));
    }

    #[test]
    fn page_path_joins_slugs() {
        assert_eq!(
            page_path("ops", "runbooks", "backup", "01-strategy"),
            Path::new("ops/runbooks/backup/01-strategy.md")
        );
    }
}
