use docsync_core::report::ValidationReport;
use docsync_core::schema::StructureSchema;
use docsync_core::validate::{rule, validate, Severity};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const STRUCTURE: &str = r#"
version: "1.0"
structure:
  - shelf:
      name: Operations
      slug: ops
      books:
        - book:
            name: Runbooks
            slug: runbooks
            chapters:
              - chapter:
                  name: Backup
                  slug: backup
                  pages: [01-strategy, 02-procedures]
"#;

fn page(title: &str) -> String {
    format!(
        "---\ntitle: \"{title}\"\norder: 1\ncategory: \"ops\"\ntags: [\"backup\"]\nlast_updated: \"2024-05-01\"\nauthor: \"docs\"\n---\n\n# {title}\n"
    )
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn complete_tree_passes_without_warnings() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();
    write(dir.path(), "ops/runbooks/backup/01-strategy.md", &page("Strategy"));
    write(dir.path(), "ops/runbooks/backup/02-procedures.md", &page("Procedures"));

    let outcome = validate(&schema, dir.path());

    assert!(outcome.passed, "unexpected errors: {:?}", outcome.errors);
    assert!(outcome.warnings.is_empty(), "unexpected warnings: {:?}", outcome.warnings);
}

#[test]
fn missing_page_is_a_warning_not_an_error() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();
    write(dir.path(), "ops/runbooks/backup/01-strategy.md", &page("Strategy"));

    let outcome = validate(&schema, dir.path());

    assert!(outcome.passed);
    let missing: Vec<_> = outcome.warnings_for(rule::MISSING_PAGE).collect();
    assert_eq!(missing.len(), 1);
    assert!(missing[0].path.ends_with("02-procedures.md"));
    assert_eq!(missing[0].severity, Severity::Warning);
}

#[test]
fn missing_shelf_directory_stops_descent() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();

    let outcome = validate(&schema, dir.path());

    assert_eq!(outcome.warnings_for(rule::MISSING_DIRECTORY).count(), 1);
    assert_eq!(outcome.warnings_for(rule::MISSING_PAGE).count(), 0);
}

#[test]
fn missing_docs_root_is_a_warning_not_a_read_error() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();
    let docs_root = dir.path().join("docs");

    let outcome = validate(&schema, &docs_root);

    assert!(outcome.passed, "unexpected errors: {:?}", outcome.errors);
    assert_eq!(outcome.errors_for(rule::FILE_READ).count(), 0);
    assert!(outcome
        .warnings_for(rule::MISSING_DIRECTORY)
        .any(|w| w.path == docs_root.display().to_string()));
}

#[test]
fn orphan_detection_skips_excluded_directories() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();
    write(dir.path(), "ops/runbooks/backup/01-strategy.md", &page("Strategy"));
    write(dir.path(), "ops/runbooks/backup/02-procedures.md", &page("Procedures"));
    write(dir.path(), "ops/runbooks/backup/03-undeclared.md", &page("Undeclared"));
    write(dir.path(), "ops/runbooks/backup/drafts/03-undeclared.md", &page("Draft"));
    write(dir.path(), "archive/01-old.md", &page("Old"));

    let outcome = validate(&schema, dir.path());

    let orphans: Vec<_> = outcome.warnings_for(rule::ORPHANED_FILE).collect();
    assert_eq!(orphans.len(), 1, "orphans: {orphans:?}");
    assert!(orphans[0].path.ends_with("backup/03-undeclared.md"));
    assert!(!orphans[0].path.contains("drafts"));
}

#[test]
fn naming_and_frontmatter_errors_are_reported_per_file() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();
    write(dir.path(), "ops/runbooks/backup/01-strategy.md", "# No frontmatter\n");
    write(
        dir.path(),
        "ops/runbooks/backup/02-procedures.md",
        "---\ntitle: \"Procedures\"\norder: 2\ncategory: \"ops\"\ntags: []\nlast_updated: \"May 2024\"\n---\nbody\n",
    );
    write(dir.path(), "ops/runbooks/backup/drafts/Bad_Name.md", &page("Bad"));

    let outcome = validate(&schema, dir.path());

    assert!(!outcome.passed);
    assert_eq!(outcome.errors_for(rule::FRONTMATTER_REQUIRED).count(), 1);
    let fields: Vec<_> = outcome.errors_for(rule::FRONTMATTER_FIELD).collect();
    assert_eq!(fields.len(), 1);
    assert!(fields[0].message.contains("author"));
    assert_eq!(outcome.errors_for(rule::FRONTMATTER_FORMAT).count(), 1);
    let naming: Vec<_> = outcome.errors_for(rule::NAMING_CONVENTION).collect();
    assert_eq!(naming.len(), 1);
    assert!(naming[0].message.contains("Bad_Name"));
}

#[test]
fn malformed_frontmatter_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();
    write(
        dir.path(),
        "ops/runbooks/backup/01-strategy.md",
        "---\ntitle: [unclosed\n---\nbody\n",
    );

    let outcome = validate(&schema, dir.path());

    let parse: Vec<_> = outcome.errors_for(rule::FRONTMATTER_PARSE).collect();
    assert_eq!(parse.len(), 1);
    assert!(parse[0].message.starts_with("Failed to parse frontmatter"));
}

#[test]
fn duplicate_slugs_are_scoped() {
    let schema = StructureSchema::from_yaml(
        r#"
structure:
  - shelf:
      name: A
      slug: same
      books:
        - book:
            name: B1
            slug: book
            chapters:
              - chapter: { name: C, slug: chap, pages: [01-one] }
              - chapter: { name: C2, slug: chap, pages: [01-one] }
        - book:
            name: B2
            slug: book
            chapters:
              - chapter: { name: C, slug: chap, pages: [01-one] }
  - shelf:
      name: A2
      slug: same
      books:
        - book:
            name: B
            slug: book
            chapters:
              - chapter: { name: C, slug: chap, pages: [01-one] }
"#,
    )
    .unwrap();
    let dir = tempdir().unwrap();

    let outcome = validate(&schema, dir.path());

    let paths: Vec<_> = outcome
        .errors_for(rule::UNIQUE_SLUGS)
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(paths, vec!["same/book/chap", "same/book", "same"]);
}

#[test]
fn schema_problems_are_errors() {
    let schema = StructureSchema::from_yaml(
        r#"
structure:
  - shelf:
      name: Ops
      slug: ops
      books:
        - book:
            name: Runbooks
            chapters:
              - chapter: { name: Empty, slug: empty, pages: [] }
"#,
    )
    .unwrap();
    let dir = tempdir().unwrap();

    let outcome = validate(&schema, dir.path());

    let missing: Vec<_> = outcome.errors_for(rule::MISSING_FIELD).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].message, "Book missing required field: slug");
    assert_eq!(outcome.errors_for(rule::REQUIRED_PAGES).count(), 1);
}

#[test]
fn missing_structure_key_fails() {
    let schema = StructureSchema::from_yaml("version: 2\n").unwrap();
    let dir = tempdir().unwrap();

    let outcome = validate(&schema, dir.path());

    assert!(!outcome.passed);
    assert_eq!(outcome.errors_for(rule::STRUCTURE_DEFINITION).count(), 1);
}

#[test]
fn report_is_written_as_json() {
    let dir = tempdir().unwrap();
    let schema = StructureSchema::from_yaml(STRUCTURE).unwrap();
    write(dir.path(), "ops/runbooks/backup/01-strategy.md", &page("Strategy"));
    let outcome = validate(&schema, dir.path());

    let report = ValidationReport::new(
        &outcome,
        Path::new("structure.yaml"),
        dir.path(),
        schema.version_label(),
    );
    let report_path = dir.path().join("out/report.json");
    fs::create_dir_all(report_path.parent().unwrap()).unwrap();
    report.write(&report_path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["version"], "1.0");
    assert_eq!(json["summary"]["passed"], true);
    assert_eq!(json["summary"]["warnings"], 1);
    assert_eq!(json["warnings"][0]["rule"], "missing_page");
    assert_eq!(json["warnings"][0]["severity"], "warning");
}
