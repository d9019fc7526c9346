//! Legacy document migration into the structured tree.
//!
//! Files under a legacy docs directory are routed to a destination page by a
//! [`RoutingTable`]: an ordered list of `(matcher, action)` rules where the
//! first match wins. Successfully migrated files are recorded in an
//! append-only log; a [`ProcessedSet`] loaded from that log is handed to the
//! [`Migrator`] so re-runs pick up where the last one stopped.
//!
//! Log lines look like:
//!
//! ```text
//! [2024-05-01 10:00:00] [deployment/nginx.md] → [platform/installation/deployment/04-nginx-setup.md] [SUCCESS]
//! ```

use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::frontmatter::{split_block, Document};

const BUILTIN_ROUTES: &str = include_str!("default_routes.yaml");

/// Marker text of a generated, not yet written, page.
const STUB_MARKER: &str = "[Content to be added]";
const DRAFT_STATUS: &str = "status: \"draft\"";

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("failed to parse routing rules: {0}")]
    Rules(#[from] serde_yaml::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> MigrateError + '_ {
    move |source| MigrateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Condition of a routing rule. Keywords are compared in lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// The relative path contains any of the keywords.
    PathAny(Vec<String>),
    /// The relative path contains all of the keywords.
    PathAll(Vec<String>),
    /// The file content contains all of the keywords.
    ContentAll(Vec<String>),
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Destination relative to the target docs root.
    Route(String),
    /// Deliberately not migrated.
    Skip,
    /// Commit to this branch and evaluate a nested table.
    Rules(Vec<RouteRule>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub when: Matcher,
    pub then: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Enum values are written as single-key maps (`{ route: x }`), also in nested tables.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub rules: Vec<RouteRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Route(String),
    Skip,
    NoMatch,
}

impl Matcher {
    fn matches(&self, path: &str, content: &str) -> bool {
        let contains = |haystack: &str, kw: &String| haystack.contains(&kw.to_lowercase());
        match self {
            Matcher::PathAny(kws) => kws.iter().any(|kw| contains(path, kw)),
            Matcher::PathAll(kws) => !kws.is_empty() && kws.iter().all(|kw| contains(path, kw)),
            Matcher::ContentAll(kws) => {
                !kws.is_empty() && kws.iter().all(|kw| contains(content, kw))
            }
            Matcher::Always => true,
        }
    }
}

impl RoutingTable {
    pub fn from_yaml(text: &str) -> Result<Self, MigrateError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The table shipped with the crate, reproducing the legacy priority order.
    pub fn builtin() -> Result<Self, MigrateError> {
        Self::from_yaml(BUILTIN_ROUTES)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MigrateError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(io_error(path))?;
        Self::from_yaml(&text)
    }

    /// Routes a file given its path relative to the legacy root and its content.
    pub fn decide(&self, relative_path: &str, content: &str) -> Decision {
        let path = relative_path.replace('\\', "/").to_lowercase();
        let content = content.to_lowercase();
        decide_in(&self.rules, &path, &content)
    }
}

fn decide_in(rules: &[RouteRule], path: &str, content: &str) -> Decision {
    let Some(rule) = rules.iter().find(|r| r.when.matches(path, content)) else {
        return Decision::NoMatch;
    };
    match &rule.then {
        Action::Route(dest) => Decision::Route(dest.clone()),
        Action::Skip => Decision::Skip,
        Action::Rules(nested) => decide_in(nested, path, content),
    }
}

/// Relative paths already migrated, as recorded in the migration log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedSet {
    paths: HashSet<String>,
}

fn bracket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]*)\]").expect("valid log bracket regex"))
}

impl ProcessedSet {
    /// Loads `SUCCESS` entries from the log. A missing log is an empty set.
    pub fn load<P: AsRef<Path>>(log: P) -> Result<Self, MigrateError> {
        let log = log.as_ref();
        if !log.exists() {
            debug!(log = %log.display(), "[MIGRATE] No migration log yet");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(log).map_err(io_error(log))?;
        let set = Self::parse(&text);
        info!(log = %log.display(), processed = set.len(), "[MIGRATE] Loaded processed set");
        Ok(set)
    }

    pub fn parse(text: &str) -> Self {
        let paths = text
            .lines()
            .filter_map(|line| {
                let groups: Vec<&str> = bracket_pattern()
                    .captures_iter(line)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .collect();
                match groups.as_slice() {
                    [_, path, _, "SUCCESS"] => Some(path.to_string()),
                    _ => None,
                }
            })
            .collect();
        ProcessedSet { paths }
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.paths.contains(relative_path)
    }

    pub fn insert(&mut self, relative_path: impl Into<String>) -> bool {
        self.paths.insert(relative_path.into())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPaths {
    /// Legacy documentation root.
    pub source_dir: PathBuf,
    /// Structured documentation root that destinations are relative to.
    pub target_dir: PathBuf,
    /// Where migrated source files are moved; skipped when walking.
    pub moved_dir: PathBuf,
    pub log: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub decision: Decision,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    pub migrated: usize,
    pub skipped: usize,
    /// `(relative path, message)` for each failed file.
    pub errors: Vec<(String, String)>,
    pub outcomes: Vec<FileOutcome>,
    /// Candidates left untouched because of the limit.
    pub remaining: usize,
}

pub struct Migrator {
    paths: MigrationPaths,
    routes: RoutingTable,
    processed: ProcessedSet,
}

impl Migrator {
    pub fn new(paths: MigrationPaths, routes: RoutingTable, processed: ProcessedSet) -> Self {
        Migrator {
            paths,
            routes,
            processed,
        }
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Legacy markdown files not yet processed, as paths relative to the source dir.
    pub fn candidates(&self) -> Vec<String> {
        WalkDir::new(&self.paths.source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != self.paths.moved_dir)
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "[MIGRATE] Failed to walk legacy docs");
                    None
                }
            })
            .filter(|e| {
                e.file_type().is_file() && e.path().extension().and_then(|x| x.to_str()) == Some("md")
            })
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.paths.source_dir)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .filter(|rel| !self.processed.contains(rel))
            .collect()
    }

    /// Migrates up to `limit` files. A dry run only routes, it writes nothing.
    pub fn run(&mut self, limit: Option<usize>, dry_run: bool) -> MigrationStats {
        let candidates = self.candidates();
        info!(count = candidates.len(), dry_run, "[MIGRATE] Found files to process");

        let mut stats = MigrationStats::default();
        for (done, relative) in candidates.iter().enumerate() {
            if limit.is_some_and(|limit| done >= limit) {
                info!(limit = ?limit, "[MIGRATE] Reached file limit");
                stats.remaining = candidates.len() - done;
                break;
            }
            match self.process_file(relative, dry_run) {
                Ok(decision) => {
                    match decision {
                        Decision::Route(_) => stats.migrated += 1,
                        Decision::Skip | Decision::NoMatch => stats.skipped += 1,
                    }
                    stats.outcomes.push(FileOutcome {
                        path: relative.clone(),
                        decision,
                    });
                }
                Err(e) => {
                    error!(file = %relative, error = %e, "[MIGRATE] Failed to migrate file");
                    if !dry_run {
                        self.append_log(relative, "ERROR", &e.to_string());
                    }
                    stats.errors.push((relative.clone(), e.to_string()));
                }
            }
        }

        info!(
            migrated = stats.migrated,
            skipped = stats.skipped,
            errors = stats.errors.len(),
            total_processed = self.processed.len(),
            remaining = stats.remaining,
            "[MIGRATE] Migration finished"
        );
        stats
    }

    fn process_file(&mut self, relative: &str, dry_run: bool) -> Result<Decision, MigrateError> {
        let source = self.paths.source_dir.join(relative);
        let content = fs::read_to_string(&source).map_err(io_error(&source))?;
        let decision = self.routes.decide(relative, &content);

        let dest = match &decision {
            Decision::Route(dest) => dest.clone(),
            Decision::Skip | Decision::NoMatch => {
                info!(file = %relative, decision = ?decision, "[MIGRATE] No destination, skipping");
                if !dry_run {
                    let reason = match decision {
                        Decision::Skip => "SKIP_RULE",
                        _ => "NO_DESTINATION",
                    };
                    self.append_log(relative, "SKIPPED", reason);
                }
                return Ok(decision);
            }
        };

        info!(file = %relative, destination = %dest, dry_run, "[MIGRATE] Routing file");
        if dry_run {
            return Ok(decision);
        }

        let dest_file = self.paths.target_dir.join(&dest);
        let existing = match fs::read_to_string(&dest_file) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_error(&dest_file)(e)),
        };
        let merged = merge_content(&content, existing.as_deref());

        if let Some(parent) = dest_file.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::write(&dest_file, merged).map_err(io_error(&dest_file))?;
        debug!(destination = %dest_file.display(), "[MIGRATE] Content written");

        let moved = self.paths.moved_dir.join(relative);
        if let Some(parent) = moved.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        move_file(&source, &moved)?;
        debug!(moved = %moved.display(), "[MIGRATE] Source moved");

        self.processed.insert(relative);
        self.append_log(relative, &dest, "SUCCESS");
        Ok(decision)
    }

    fn append_log(&self, relative: &str, destination: &str, status: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{timestamp}] [{relative}] → [{destination}] [{status}]\n");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.paths.log)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!(error = ?e, log = %self.paths.log.display(), "[MIGRATE] Failed to append to migration log");
        }
    }
}

/// Combines migrated `source` text with the current destination content.
///
/// - no destination: the source is used as is
/// - a draft stub: the stub's frontmatter is kept (marked published, authored
///   by the migration) and the source body replaces the placeholder
/// - anything else: the source body is appended as a new section
pub fn merge_content(source: &str, existing: Option<&str>) -> String {
    let Some(existing) = existing else {
        return source.to_string();
    };
    let source_body = Document::parse(source).body;

    if existing.contains(DRAFT_STATUS) && existing.contains(STUB_MARKER) {
        return match split_block(existing) {
            Some((raw, _)) => {
                let frontmatter: String = raw
                    .lines()
                    .map(|line| {
                        if line.starts_with("status:") {
                            "status: \"published\"\n".to_string()
                        } else if line.starts_with("author:") {
                            "author: \"migration\"\n".to_string()
                        } else {
                            format!("{line}\n")
                        }
                    })
                    .collect();
                format!("---\n{frontmatter}---\n{source_body}")
            }
            None => source.to_string(),
        };
    }

    format!("{existing}\n\n---\n\n## Additional Content (Migrated)\n\n{source_body}")
}

fn move_file(from: &Path, to: &Path) -> Result<(), MigrateError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device moves cannot rename.
    fs::copy(from, to).map_err(io_error(to))?;
    fs::remove_file(from).map_err(io_error(from))?;
    Ok(())
}
