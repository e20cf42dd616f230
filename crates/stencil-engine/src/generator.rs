//! Generation orchestrator
//!
//! Sequences resolution, inclusion, rendering, classification, and
//! reconciliation, and is the only component that touches the target
//! directory. Rendering is all-or-nothing: every included rule is rendered
//! into memory and validated before the first byte is written, so a
//! mid-render failure leaves the target untouched. Filesystem write failures
//! during the commit phase are collected per path and never abort the
//! remaining independent writes. The manifest write that finalizes a run is
//! a single serialized step performed after all per-file decisions are known.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::{
    condition::Expr,
    error::EngineError,
    manifest::{content_hash, FileRecord, ProjectManifest},
    models::{AnswerSet, FileRule, RenderedFile, TemplatePack},
    policy::{self, Disposition},
    reconcile::{self, ConflictRecord, ConflictStyle, UpdateAction},
    report::{GenerationReport, WriteFailure},
    resolver::AnswerResolver,
    template::{render_path, render_str},
};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// How conflicts are materialized during updates
    pub conflict_style: ConflictStyle,
    /// Preview without touching the filesystem
    pub dry_run: bool,
    /// Upper bound on concurrently rendering rules
    pub render_concurrency: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            conflict_style: ConflictStyle::default(),
            dry_run: false,
            render_concurrency: 8,
        }
    }
}

/// Renders a template pack into a project directory and keeps it in sync
pub struct Generator {
    pack: TemplatePack,
    config: GeneratorConfig,
}

impl Generator {
    /// Create a generator with default configuration
    pub fn new(pack: TemplatePack) -> Self {
        Self {
            pack,
            config: GeneratorConfig::default(),
        }
    }

    /// Create a generator with custom configuration
    pub fn with_config(pack: TemplatePack, config: GeneratorConfig) -> Self {
        Self { pack, config }
    }

    /// The pack this generator renders
    pub fn pack(&self) -> &TemplatePack {
        &self.pack
    }

    /// Generate a fresh project into `target`
    ///
    /// `raw` holds the user's raw answers; resolution (validation, defaults,
    /// derived variables) happens here so every stage downstream sees the
    /// same immutable answer set. Refuses to run on a directory that already
    /// carries a manifest; that is what [`Generator::update`] is for.
    pub async fn generate(
        &self,
        raw: &BTreeMap<String, String>,
        target: &Path,
    ) -> Result<GenerationReport, EngineError> {
        if ProjectManifest::exists_in(target) {
            return Err(EngineError::Manifest(format!(
                "{} was already generated from a template; run update instead",
                target.display()
            )));
        }

        let answers = AnswerResolver::new(&self.pack).resolve(raw)?;
        let rendered = self.render_all(&answers).await?;
        info!(
            template = %self.pack.name,
            files = rendered.len(),
            target = %target.display(),
            "generating project"
        );

        let mut report = GenerationReport {
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        let mut manifest = ProjectManifest::new(&self.pack.name, self.pack.revision, raw.clone());

        for file in &rendered {
            let path_str = path_key(&file.path);
            let dest = target.join(&file.path);
            let hash = content_hash(file.content.as_bytes());

            match policy::first_generation(file.category, dest.exists()) {
                Disposition::Write => {
                    if self.write_file(&dest, &file.content, &path_str, &mut report) {
                        manifest.record(&path_str, hash, file.category);
                    }
                }
                Disposition::SkipExisting => {
                    // The baseline is what the template would have written,
                    // not the pre-existing content: a later update must not
                    // fast-forward over a file the user already owned.
                    debug!(path = %path_str, "protected file exists, leaving as-is");
                    report.skipped.push(path_str.clone());
                    manifest.record(&path_str, hash, file.category);
                }
            }
        }

        if !self.config.dry_run {
            manifest.save(target)?;
        }
        info!(status = ?report.status(), "{}", report.summary());
        Ok(report)
    }

    /// Re-sync a previously generated project against the current pack
    ///
    /// Recorded answers are the baseline; `overrides` supplies values for
    /// variables that are new or deliberately changed. Per file, the recorded
    /// hash (O), the fresh render (N), and the on-disk content (D) feed the
    /// three-way decision; conflicts are materialized but never block the
    /// rest of the file set.
    pub async fn update(
        &self,
        overrides: &BTreeMap<String, String>,
        target: &Path,
    ) -> Result<GenerationReport, EngineError> {
        let mut manifest = ProjectManifest::load(target)?;

        // Recorded answers for variables the template no longer declares (or
        // now derives) would fail validation; they are dropped, not replayed.
        let mut raw: BTreeMap<String, String> = manifest
            .answers
            .iter()
            .filter(|(name, _)| {
                self.pack
                    .variable(name)
                    .map(|def| def.derived.is_none())
                    .unwrap_or(false)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        raw.extend(overrides.clone());

        let answers = AnswerResolver::new(&self.pack).resolve(&raw)?;
        let rendered = self.render_all(&answers).await?;
        info!(
            template = %self.pack.name,
            from_revision = manifest.revision,
            to_revision = self.pack.revision,
            files = rendered.len(),
            "updating project"
        );

        let mut report = GenerationReport {
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        let mut new_files: BTreeMap<String, FileRecord> = BTreeMap::new();

        for file in &rendered {
            let path_str = path_key(&file.path);
            let dest = target.join(&file.path);
            let incoming_hash = content_hash(file.content.as_bytes());

            let local_hash = match fs::read(&dest) {
                Ok(bytes) => Some(content_hash(&bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => {
                    report.failures.push(WriteFailure {
                        path: path_str.clone(),
                        message: format!("cannot read existing file: {}", e),
                    });
                    if let Some(record) = manifest.files.get(&path_str) {
                        new_files.insert(path_str.clone(), record.clone());
                    }
                    continue;
                }
            };

            let recorded = manifest.files.get(&path_str);
            let action = reconcile::plan_update(
                file.category,
                recorded,
                &incoming_hash,
                local_hash.as_deref(),
            );
            debug!(path = %path_str, ?action, "reconciled");

            match action {
                UpdateAction::WriteIncoming => {
                    if self.write_file(&dest, &file.content, &path_str, &mut report) {
                        new_files.insert(
                            path_str.clone(),
                            FileRecord {
                                hash: incoming_hash,
                                category: file.category,
                            },
                        );
                    } else if let Some(record) = recorded {
                        new_files.insert(path_str.clone(), record.clone());
                    }
                }
                UpdateAction::Noop | UpdateAction::RecordOnly => {
                    report.skipped.push(path_str.clone());
                    new_files.insert(
                        path_str.clone(),
                        FileRecord {
                            hash: incoming_hash,
                            category: file.category,
                        },
                    );
                }
                UpdateAction::LeaveLocal | UpdateAction::SkipAbsent => {
                    report.skipped.push(path_str.clone());
                    if let Some(record) = recorded {
                        new_files.insert(path_str.clone(), record.clone());
                    }
                }
                UpdateAction::RaiseConflict => {
                    let ancestor = recorded.map(|r| r.hash.clone()).unwrap_or_default();
                    if !self.config.dry_run {
                        if let Err(e) = reconcile::materialize_conflict(
                            &dest,
                            &file.content,
                            self.config.conflict_style,
                        ) {
                            report.failures.push(WriteFailure {
                                path: path_str.clone(),
                                message: format!("cannot materialize conflict: {}", e),
                            });
                        }
                    }
                    warn!(path = %path_str, "three-way conflict, manual resolution needed");
                    report.conflicts.push(ConflictRecord {
                        path: path_str.clone(),
                        ancestor,
                        incoming: incoming_hash,
                        local: local_hash,
                    });
                    if let Some(record) = recorded {
                        new_files.insert(path_str.clone(), record.clone());
                    }
                }
            }
        }

        for stale in manifest.files.keys() {
            if !new_files.contains_key(stale) {
                debug!(path = %stale, "no longer produced by the template");
                report.orphaned.push(stale.clone());
            }
        }

        manifest.files = new_files;
        manifest.refresh(self.pack.revision, raw);
        if !self.config.dry_run {
            manifest.save(target)?;
        }
        info!(status = ?report.status(), "{}", report.summary());
        Ok(report)
    }

    /// Render every included rule into memory
    ///
    /// Runs on a bounded pool; each task reads only the shared immutable
    /// answer set. Results are ordered by output path afterwards, so parallel
    /// scheduling never changes the outcome. Any render error aborts the
    /// whole set before a single write happens.
    async fn render_all(&self, answers: &AnswerSet) -> Result<Vec<RenderedFile>, EngineError> {
        let mut included = Vec::new();
        for rule in &self.pack.files {
            if !rule.category.is_rendered() {
                continue;
            }
            if let Some(when) = &rule.when {
                if !Expr::parse(when)?.eval(answers) {
                    continue;
                }
            }
            included.push(rule.clone());
        }

        let answers = Arc::new(answers.clone());
        let mut rendered: Vec<RenderedFile> = stream::iter(included.into_iter().map(|rule| {
            let answers = Arc::clone(&answers);
            async move { render_rule(&rule, &answers) }
        }))
        .buffer_unordered(self.config.render_concurrency.max(1))
        .try_collect()
        .await?;
        rendered.sort_by(|a, b| a.path.cmp(&b.path));

        // Path uniqueness is what makes unordered commits safe.
        let mut seen: BTreeMap<&PathBuf, &str> = BTreeMap::new();
        for file in &rendered {
            if let Some(first) = seen.insert(&file.path, file.rule_path.as_str()) {
                return Err(EngineError::PathCollision {
                    path: path_key(&file.path),
                    first: first.to_string(),
                    second: file.rule_path.clone(),
                });
            }
        }

        Ok(rendered)
    }

    /// Write one file, recording success or failure in the report
    ///
    /// Returns true when the content is on disk (or would be, in a dry run).
    fn write_file(
        &self,
        dest: &Path,
        content: &str,
        path_str: &str,
        report: &mut GenerationReport,
    ) -> bool {
        if self.config.dry_run {
            report.written.push(path_str.to_string());
            return true;
        }
        match write_content(dest, content) {
            Ok(()) => {
                report.written.push(path_str.to_string());
                true
            }
            Err(e) => {
                warn!(path = %path_str, error = %e, "write failed");
                report.failures.push(WriteFailure {
                    path: path_str.to_string(),
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

/// Render one rule's path and content against the answer set
fn render_rule(rule: &FileRule, answers: &AnswerSet) -> Result<RenderedFile, EngineError> {
    let path = render_path(&rule.path, answers, &rule.path)?;
    let content = render_str(&rule.content, answers, &rule.path)?;
    Ok(RenderedFile {
        path,
        content,
        category: rule.category,
        rule_path: rule.path.clone(),
    })
}

fn write_content(dest: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, content)
}

fn path_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::VariableDef;
    use crate::policy::FileCategory;

    fn rule(path: &str, content: &str, category: FileCategory) -> FileRule {
        FileRule {
            path: path.to_string(),
            content: content.to_string(),
            when: None,
            category,
        }
    }

    fn var(name: &str) -> VariableDef {
        VariableDef {
            name: name.to_string(),
            kind: Default::default(),
            default: None,
            choices: Vec::new(),
            pattern: None,
            derived: None,
            prompt: None,
        }
    }

    fn pack(files: Vec<FileRule>, variables: Vec<VariableDef>) -> TemplatePack {
        TemplatePack {
            name: "test".to_string(),
            revision: 1,
            variables,
            files,
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_generate_writes_files_and_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Generator::new(pack(
            vec![rule(
                "{{name}}/README.md",
                "# {{name}}\n",
                FileCategory::AlwaysUpdate,
            )],
            vec![var("name")],
        ));

        let report = generator
            .generate(&raw(&[("name", "demo")]), temp_dir.path())
            .await
            .unwrap();

        assert_eq!(report.written, vec!["demo/README.md"]);
        let written = fs::read_to_string(temp_dir.path().join("demo/README.md")).unwrap();
        assert_eq!(written, "# demo\n");

        let manifest = ProjectManifest::load(temp_dir.path()).unwrap();
        assert_eq!(
            manifest.hash_of("demo/README.md"),
            Some(content_hash(b"# demo\n").as_str())
        );
    }

    #[tokio::test]
    async fn test_generate_refuses_already_generated_target() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Generator::new(pack(
            vec![rule("a.txt", "x", FileCategory::AlwaysUpdate)],
            vec![],
        ));

        generator.generate(&raw(&[]), temp_dir.path()).await.unwrap();
        let err = generator
            .generate(&raw(&[]), temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Manifest(_)));
    }

    #[tokio::test]
    async fn test_never_files_are_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Generator::new(pack(
            vec![
                rule("kept.txt", "x", FileCategory::AlwaysUpdate),
                rule("authoring-notes.md", "internal", FileCategory::Never),
            ],
            vec![],
        ));

        let report = generator.generate(&raw(&[]), temp_dir.path()).await.unwrap();
        assert_eq!(report.written, vec!["kept.txt"]);
        assert!(!temp_dir.path().join("authoring-notes.md").exists());
    }

    #[tokio::test]
    async fn test_path_collision_aborts_before_writing() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Generator::new(pack(
            vec![
                rule("{{a}}.txt", "one", FileCategory::AlwaysUpdate),
                rule("x.txt", "two", FileCategory::AlwaysUpdate),
            ],
            vec![var("a")],
        ));

        let err = generator
            .generate(&raw(&[("a", "x")]), temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PathCollision { .. }));
        assert!(!temp_dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_variable_aborts_whole_render_set() {
        let temp_dir = TempDir::new().unwrap();
        // Constructed directly, bypassing the loader's load-time checks, to
        // exercise the render-time guard.
        let generator = Generator::new(pack(
            vec![
                rule("ok.txt", "fine", FileCategory::AlwaysUpdate),
                rule("broken.txt", "{{ghost}}", FileCategory::AlwaysUpdate),
            ],
            vec![],
        ));

        let err = generator.generate(&raw(&[]), temp_dir.path()).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingVariable { .. }));
        assert!(!temp_dir.path().join("ok.txt").exists());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Generator::with_config(
            pack(vec![rule("a.txt", "x", FileCategory::AlwaysUpdate)], vec![]),
            GeneratorConfig {
                dry_run: true,
                ..Default::default()
            },
        );

        let report = generator.generate(&raw(&[]), temp_dir.path()).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.written, vec!["a.txt"]);
        assert!(!temp_dir.path().join("a.txt").exists());
        assert!(!ProjectManifest::exists_in(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_protected_file_present_at_generation_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("c.cfg"), "user owned").unwrap();
        let generator = Generator::new(pack(
            vec![rule("c.cfg", "template version", FileCategory::ProtectedOnce)],
            vec![],
        ));

        let report = generator.generate(&raw(&[]), temp_dir.path()).await.unwrap();
        assert_eq!(report.skipped, vec!["c.cfg"]);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("c.cfg")).unwrap(),
            "user owned"
        );
        // The baseline records the render, not the user's content.
        let manifest = ProjectManifest::load(temp_dir.path()).unwrap();
        assert_eq!(
            manifest.hash_of("c.cfg"),
            Some(content_hash(b"template version").as_str())
        );
    }

    #[tokio::test]
    async fn test_update_reports_orphaned_paths() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Generator::new(pack(
            vec![
                rule("keep.txt", "x", FileCategory::AlwaysUpdate),
                rule("drop.txt", "y", FileCategory::AlwaysUpdate),
            ],
            vec![],
        ));
        generator.generate(&raw(&[]), temp_dir.path()).await.unwrap();

        let trimmed = Generator::new(pack(
            vec![rule("keep.txt", "x", FileCategory::AlwaysUpdate)],
            vec![],
        ));
        let report = trimmed.update(&raw(&[]), temp_dir.path()).await.unwrap();

        assert_eq!(report.orphaned, vec!["drop.txt"]);
        // Left on disk, dropped from the manifest.
        assert!(temp_dir.path().join("drop.txt").exists());
        let manifest = ProjectManifest::load(temp_dir.path()).unwrap();
        assert!(manifest.hash_of("drop.txt").is_none());
    }

    #[tokio::test]
    async fn test_update_drops_recorded_answers_for_removed_variables() {
        let temp_dir = TempDir::new().unwrap();
        let generator = Generator::new(pack(
            vec![rule("a.txt", "{{name}}", FileCategory::AlwaysUpdate)],
            vec![var("name")],
        ));
        generator
            .generate(&raw(&[("name", "demo")]), temp_dir.path())
            .await
            .unwrap();

        // The new revision drops `name` entirely.
        let next = Generator::new(pack(
            vec![rule("a.txt", "static", FileCategory::AlwaysUpdate)],
            vec![],
        ));
        let report = next.update(&raw(&[]), temp_dir.path()).await.unwrap();
        assert_eq!(report.written, vec!["a.txt"]);
    }
}
