//! End-to-end generation and update scenarios
//!
//! Exercises the full pipeline: pack loading, answer resolution, conditional
//! inclusion, rendering, first-generation policy, and three-way update
//! reconciliation against a real target directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use stencil_engine::{
    content_hash, EngineError, Generator, GeneratorConfig, PackLoader, ProjectManifest, RunStatus,
};
use tempfile::TempDir;

fn write_pack(dir: &Path, manifest: &str, tree: &[(&str, &str)]) {
    fs::write(dir.join("stencil.yaml"), manifest).unwrap();
    for (path, body) in tree {
        let full = dir.join("tree").join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, body).unwrap();
    }
}

fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

const GATED_PACK: &str = r#"
name: gated
revision: 1
variables:
  - name: include_x
    kind: bool
    default: "true"
files:
  - source: a.txt
    when: include_x
"#;

#[tokio::test]
async fn test_condition_gates_file_out_and_back_in() {
    let pack_dir = TempDir::new().unwrap();
    write_pack(pack_dir.path(), GATED_PACK, &[("a.txt", "gated content\n")]);
    let pack = PackLoader::load(pack_dir.path()).unwrap();

    // include_x=false: the output tree lacks a.txt.
    let off_target = TempDir::new().unwrap();
    let generator = Generator::new(pack.clone());
    let report = generator
        .generate(&answers(&[("include_x", "false")]), off_target.path())
        .await
        .unwrap();
    assert_eq!(report.status(), RunStatus::Clean);
    assert!(!off_target.path().join("a.txt").exists());

    // include_x=true in a fresh target: a.txt is present with its content.
    let on_target = TempDir::new().unwrap();
    generator
        .generate(&answers(&[("include_x", "true")]), on_target.path())
        .await
        .unwrap();
    assert_eq!(
        fs::read_to_string(on_target.path().join("a.txt")).unwrap(),
        "gated content\n"
    );

    // Flipping the answer on update brings the file back too.
    let report = generator
        .update(&answers(&[("include_x", "true")]), off_target.path())
        .await
        .unwrap();
    assert_eq!(report.status(), RunStatus::Clean);
    assert_eq!(
        fs::read_to_string(off_target.path().join("a.txt")).unwrap(),
        "gated content\n"
    );
}

fn service_pack(revision: u64) -> String {
    format!(
        r#"
name: service
revision: {revision}
variables:
  - name: project_name
files:
  - source: b.cfg
    category: always
  - source: c.cfg
    category: once
"#
    )
}

async fn generate_service(
    revision: u64,
    b_body: &str,
    c_body: &str,
    target: &Path,
) -> Generator {
    let pack_dir = TempDir::new().unwrap();
    write_pack(
        pack_dir.path(),
        &service_pack(revision),
        &[("b.cfg", b_body), ("c.cfg", c_body)],
    );
    let pack = PackLoader::load(pack_dir.path()).unwrap();
    let generator = Generator::new(pack);
    if !ProjectManifest::exists_in(target) {
        generator
            .generate(&answers(&[("project_name", "demo")]), target)
            .await
            .unwrap();
    }
    generator
}

#[tokio::test]
async fn test_always_update_discards_user_edit() {
    let target = TempDir::new().unwrap();
    generate_service(1, "b v1\n", "c v1\n", target.path()).await;

    // User edits b.cfg, then the template's content changes.
    fs::write(target.path().join("b.cfg"), "user edit\n").unwrap();
    let next = generate_service(2, "b v2\n", "c v1\n", target.path()).await;

    let report = next.update(&answers(&[]), target.path()).await.unwrap();
    assert_eq!(report.status(), RunStatus::Clean);
    assert_eq!(
        fs::read_to_string(target.path().join("b.cfg")).unwrap(),
        "b v2\n"
    );
}

#[tokio::test]
async fn test_protected_untouched_file_is_refreshed() {
    let target = TempDir::new().unwrap();
    generate_service(1, "b v1\n", "c v1\n", target.path()).await;

    let next = generate_service(2, "b v1\n", "c v2\n", target.path()).await;
    let report = next.update(&answers(&[]), target.path()).await.unwrap();

    assert_eq!(report.status(), RunStatus::Clean);
    assert_eq!(
        fs::read_to_string(target.path().join("c.cfg")).unwrap(),
        "c v2\n"
    );
}

#[tokio::test]
async fn test_protected_edited_file_conflicts_and_is_left_alone() {
    let target = TempDir::new().unwrap();
    generate_service(1, "b v1\n", "c v1\n", target.path()).await;

    fs::write(target.path().join("c.cfg"), "user version\n").unwrap();
    let next = generate_service(2, "b v1\n", "c v2\n", target.path()).await;
    let report = next.update(&answers(&[]), target.path()).await.unwrap();

    assert_eq!(report.status(), RunStatus::CompletedWithConflicts);
    // D is untouched, N is materialized as a side file.
    assert_eq!(
        fs::read_to_string(target.path().join("c.cfg")).unwrap(),
        "user version\n"
    );
    assert_eq!(
        fs::read_to_string(target.path().join("c.cfg.new")).unwrap(),
        "c v2\n"
    );

    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!(conflict.path, "c.cfg");
    assert_eq!(conflict.ancestor, content_hash(b"c v1\n"));
    assert_eq!(conflict.incoming, content_hash(b"c v2\n"));
    assert_eq!(conflict.local.as_deref(), Some(content_hash(b"user version\n").as_str()));
}

#[tokio::test]
async fn test_conflict_markers_mode_embeds_both_versions() {
    let target = TempDir::new().unwrap();
    generate_service(1, "b v1\n", "c v1\n", target.path()).await;

    fs::write(target.path().join("c.cfg"), "user version\n").unwrap();

    let pack_dir = TempDir::new().unwrap();
    write_pack(
        pack_dir.path(),
        &service_pack(2),
        &[("b.cfg", "b v1\n"), ("c.cfg", "c v2\n")],
    );
    let pack = PackLoader::load(pack_dir.path()).unwrap();
    let generator = Generator::with_config(
        pack,
        GeneratorConfig {
            conflict_style: stencil_engine::ConflictStyle::Markers,
            ..Default::default()
        },
    );

    let report = generator.update(&answers(&[]), target.path()).await.unwrap();
    assert_eq!(report.status(), RunStatus::CompletedWithConflicts);

    let merged = fs::read_to_string(target.path().join("c.cfg")).unwrap();
    assert!(merged.contains("<<<<<<< local"));
    assert!(merged.contains("user version"));
    assert!(merged.contains("c v2"));
    assert!(merged.contains(">>>>>>> template"));
}

#[tokio::test]
async fn test_conflict_never_blocks_the_rest_of_the_set() {
    let target = TempDir::new().unwrap();
    generate_service(1, "b v1\n", "c v1\n", target.path()).await;

    // Conflict on c.cfg, a clean change on b.cfg: both must be processed.
    fs::write(target.path().join("c.cfg"), "user version\n").unwrap();
    let next = generate_service(2, "b v2\n", "c v2\n", target.path()).await;
    let report = next.update(&answers(&[]), target.path()).await.unwrap();

    assert_eq!(report.status(), RunStatus::CompletedWithConflicts);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(
        fs::read_to_string(target.path().join("b.cfg")).unwrap(),
        "b v2\n"
    );
}

#[tokio::test]
async fn test_update_prompts_only_reuse_recorded_answers() {
    let pack_dir = TempDir::new().unwrap();
    write_pack(
        pack_dir.path(),
        r#"
name: named
revision: 1
variables:
  - name: project_name
files:
  - source: README.md
"#,
        &[("README.md", "# {{project_name}}\n")],
    );
    let pack = PackLoader::load(pack_dir.path()).unwrap();
    let generator = Generator::new(pack);

    let target = TempDir::new().unwrap();
    generator
        .generate(&answers(&[("project_name", "demo")]), target.path())
        .await
        .unwrap();

    // No overrides supplied: the recorded answer carries the update.
    let report = generator.update(&answers(&[]), target.path()).await.unwrap();
    assert_eq!(report.status(), RunStatus::Clean);
    assert_eq!(
        fs::read_to_string(target.path().join("README.md")).unwrap(),
        "# demo\n"
    );
}

#[tokio::test]
async fn test_validation_failure_leaves_target_untouched() {
    let pack_dir = TempDir::new().unwrap();
    write_pack(
        pack_dir.path(),
        r#"
name: strict
revision: 1
variables:
  - name: project_name
    pattern: "^[a-z][a-z0-9_]*$"
  - name: use_ci
    kind: bool
files:
  - source: README.md
"#,
        &[("README.md", "# {{project_name}}\n")],
    );
    let pack = PackLoader::load(pack_dir.path()).unwrap();
    let generator = Generator::new(pack);

    let target = TempDir::new().unwrap();
    let err = generator
        .generate(
            &answers(&[("project_name", "Bad Name"), ("use_ci", "maybe")]),
            target.path(),
        )
        .await
        .unwrap_err();

    // Both violations are reported in one pass, and nothing was written.
    match err {
        EngineError::Validation(violations) => assert_eq!(violations.len(), 2),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(fs::read_dir(target.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_shipped_rust_cli_pack_generates() {
    let pack_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates/rust-cli");
    let pack = PackLoader::load(&pack_dir).unwrap();
    let generator = Generator::new(pack);

    let target = TempDir::new().unwrap();
    let report = generator
        .generate(
            &answers(&[("project_name", "My Tool"), ("include_ci", "false")]),
            target.path(),
        )
        .await
        .unwrap();

    assert_eq!(report.status(), RunStatus::Clean);
    let cargo = fs::read_to_string(target.path().join("Cargo.toml")).unwrap();
    assert!(cargo.contains("name = \"my_tool\""));
    assert!(!cargo.contains("authors"));
    assert!(target.path().join("src/main.rs").exists());
    assert!(target.path().join("README.md").exists());
    assert!(!target.path().join(".github/workflows/ci.yml").exists());
}

#[tokio::test]
async fn test_derived_variables_flow_into_paths_and_content() {
    let pack_dir = TempDir::new().unwrap();
    write_pack(
        pack_dir.path(),
        r#"
name: derived
revision: 1
variables:
  - name: project_name
  - name: crate_name
    derived: "{{project_name:snake}}"
files:
  - path: "src/{{crate_name}}.rs"
    content: "//! {{crate_name}} built from {{project_name}}\n"
"#,
        &[],
    );
    let pack = PackLoader::load(pack_dir.path()).unwrap();
    let generator = Generator::new(pack);

    let target = TempDir::new().unwrap();
    generator
        .generate(&answers(&[("project_name", "My Demo")]), target.path())
        .await
        .unwrap();

    let body = fs::read_to_string(target.path().join("src/my_demo.rs")).unwrap();
    assert_eq!(body, "//! my_demo built from My Demo\n");
}
