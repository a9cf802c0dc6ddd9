//! Output assembler.
//!
//! Renders a [`Proposal`] and writes one set of files per run:
//!
//! ```text
//! <output_dir>/
//! ├── <stem>_proposal.md
//! ├── <stem>_resources.md
//! ├── <stem>_data.json
//! └── <stem>_run.json
//! ```
//!
//! `<stem>` is `<slug>_<YYYYmmdd_HHMMSS>`, suffixed `_2`, `_3`, … when a
//! previous run already claimed it. Existing files are never overwritten.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use proposalgen_markdown::{render_proposal, render_resource_listing};
use proposalgen_shared::{Proposal, ProposalGenError, Result, RunId, StageWarning};

use crate::resources::CollectStats;

/// Give up on finding a free stem after this many suffixes.
const MAX_STEM_ATTEMPTS: u32 = 1_000;

const PROPOSAL_SUFFIX: &str = "_proposal.md";
const RESOURCES_SUFFIX: &str = "_resources.md";
const DATA_SUFFIX: &str = "_data.json";
const MANIFEST_SUFFIX: &str = "_run.json";

/// Metadata for a single written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Run details that are not part of the proposal itself.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub collect: CollectStats,
}

/// Contents of `<stem>_run.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: RunId,
    pub tool_version: String,
    pub subject: String,
    pub industry: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub research_verified: bool,
    pub use_case_count: usize,
    pub resource_count: usize,
    pub collect: CollectStats,
    pub warnings: Vec<StageWarning>,
    pub files: Vec<ArtifactMeta>,
}

/// Where a run's files ended up.
#[derive(Debug, Clone)]
pub struct RunFiles {
    pub stem: String,
    pub proposal_path: PathBuf,
    pub resources_path: PathBuf,
    pub data_path: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: RunManifest,
}

/// Render and write every output file for `proposal` under `output_dir`.
///
/// Any I/O failure is returned as [`ProposalGenError::Io`].
#[instrument(skip_all, fields(output_dir = %output_dir.display(), subject = %proposal.subject.name()))]
pub fn write_run(output_dir: &Path, proposal: &Proposal, meta: &RunMeta) -> Result<RunFiles> {
    std::fs::create_dir_all(output_dir).map_err(|e| ProposalGenError::io(output_dir, e))?;

    let base = format!(
        "{}_{}",
        proposal.subject.slug(),
        proposal.generated_at.format("%Y%m%d_%H%M%S")
    );
    let stem = claim_stem(output_dir, &base)?;

    let mut created = vec![output_dir.join(format!("{stem}{PROPOSAL_SUFFIX}"))];
    match write_outputs(output_dir, stem, proposal, meta, &mut created) {
        Ok(files) => Ok(files),
        Err(e) => {
            for path in &created {
                let _ = std::fs::remove_file(path);
            }
            warn!(error = %e, removed = created.len(), "run output incomplete, removed partial files");
            Err(e)
        }
    }
}

/// Write every file under a claimed `stem`, recording each one created.
fn write_outputs(
    output_dir: &Path,
    stem: String,
    proposal: &Proposal,
    meta: &RunMeta,
    created: &mut Vec<PathBuf>,
) -> Result<RunFiles> {
    let path_for = |suffix: &str| output_dir.join(format!("{stem}{suffix}"));

    let proposal_md = render_proposal(proposal);
    let resources_md = render_resource_listing(proposal);
    let data_json = to_json(proposal)?;

    let mut files = vec![write_file(&path_for(PROPOSAL_SUFFIX), &proposal_md, true)?];
    for (suffix, content) in [(RESOURCES_SUFFIX, &resources_md), (DATA_SUFFIX, &data_json)] {
        let path = path_for(suffix);
        files.push(write_file(&path, content, false)?);
        created.push(path);
    }

    let manifest = RunManifest {
        schema_version: proposal.schema_version,
        run_id: proposal.run_id.clone(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        subject: proposal.subject.name().to_string(),
        industry: proposal.research.industry.clone(),
        model: meta.model.clone(),
        started_at: meta.started_at,
        completed_at: Utc::now(),
        research_verified: proposal.research.is_verified(),
        use_case_count: proposal.use_cases.len(),
        resource_count: proposal.resources.len(),
        collect: meta.collect,
        warnings: proposal.warnings.clone(),
        files,
    };
    let manifest_path = path_for(MANIFEST_SUFFIX);
    write_file(&manifest_path, &to_json(&manifest)?, false)?;

    info!(%stem, files = manifest.files.len() + 1, "run output written");

    Ok(RunFiles {
        proposal_path: path_for(PROPOSAL_SUFFIX),
        resources_path: path_for(RESOURCES_SUFFIX),
        data_path: path_for(DATA_SUFFIX),
        manifest_path,
        stem,
        manifest,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reserve a stem by creating its proposal file with create-new semantics.
fn claim_stem(dir: &Path, base: &str) -> Result<String> {
    for attempt in 1..=MAX_STEM_ATTEMPTS {
        let stem = if attempt == 1 {
            base.to_string()
        } else {
            format!("{base}_{attempt}")
        };

        let taken = [RESOURCES_SUFFIX, DATA_SUFFIX, MANIFEST_SUFFIX]
            .iter()
            .any(|suffix| dir.join(format!("{stem}{suffix}")).exists());
        if taken {
            continue;
        }

        let claim = dir.join(format!("{stem}{PROPOSAL_SUFFIX}"));
        match OpenOptions::new().write(true).create_new(true).open(&claim) {
            Ok(_) => {
                debug!(%stem, "claimed output stem");
                return Ok(stem);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ProposalGenError::io(&claim, e)),
        }
    }
    Err(ProposalGenError::io(
        dir.join(base),
        std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free output name after {MAX_STEM_ATTEMPTS} attempts"),
        ),
    ))
}

/// Write `content` to a temp file, then rename it onto `target`.
///
/// `claimed` marks a target this run created empty in [`claim_stem`]; any
/// other existing target is an error.
fn write_file(target: &Path, content: &str, claimed: bool) -> Result<ArtifactMeta> {
    let filename = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !claimed && target.exists() {
        return Err(ProposalGenError::io(
            target,
            std::io::Error::new(ErrorKind::AlreadyExists, "refusing to overwrite"),
        ));
    }

    let temp = target.with_file_name(format!(".{filename}.tmp"));
    let written = std::fs::write(&temp, content)
        .map_err(|e| ProposalGenError::io(&temp, e))
        .and_then(|()| std::fs::rename(&temp, target).map_err(|e| ProposalGenError::io(target, e)));
    if written.is_err() && temp.is_file() {
        let _ = std::fs::remove_file(&temp);
    }
    written?;

    let sha256 = format!("{:x}", Sha256::digest(content.as_bytes()));
    debug!(file = %filename, size = content.len(), "wrote output file");

    Ok(ArtifactMeta {
        filename,
        sha256,
        size_bytes: content.len(),
    })
}

fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| ProposalGenError::validation(format!("JSON serialization failed: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proposalgen_shared::{ResourceCollection, Subject, UseCase};

    use super::*;
    use crate::proposal::build_proposal;
    use crate::test_support::research_summary;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pg-assembler-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_proposal() -> Proposal {
        let subject = Subject::new("Acme Corp", Some("Retail".into())).unwrap();
        build_proposal(
            RunId::new(),
            &subject,
            research_summary("Retail"),
            vec![UseCase::new("Demand Forecasting", "Predict demand.", "Less waste.")],
            ResourceCollection {
                resources: Vec::new(),
                by_use_case: vec![Vec::new()],
            },
            Vec::new(),
        )
    }

    fn make_meta() -> RunMeta {
        RunMeta {
            model: "test-model".into(),
            started_at: Utc::now(),
            collect: CollectStats::default(),
        }
    }

    #[test]
    fn writes_all_files_with_checksums() {
        let tmp = temp_dir();
        let proposal = make_proposal();

        let files = write_run(&tmp, &proposal, &make_meta()).unwrap();

        assert!(files.stem.starts_with("acme_corp_"));
        for path in [&files.proposal_path, &files.resources_path, &files.data_path, &files.manifest_path] {
            assert!(path.exists(), "missing {}", path.display());
        }
        let md = std::fs::read_to_string(&files.proposal_path).unwrap();
        assert!(md.contains("Acme Corp"));

        assert_eq!(files.manifest.files.len(), 3);
        assert_eq!(files.manifest.files[0].filename, format!("{}_proposal.md", files.stem));
        assert_eq!(files.manifest.files[0].sha256.len(), 64);
        assert_eq!(files.manifest.files[0].size_bytes, md.len());

        let data: Proposal =
            serde_json::from_str(&std::fs::read_to_string(&files.data_path).unwrap()).unwrap();
        assert_eq!(data.use_cases.len(), 1);

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files.manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["subject"], "Acme Corp");
        assert_eq!(manifest["model"], "test-model");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn same_second_runs_get_distinct_files() {
        let tmp = temp_dir();
        let proposal = make_proposal();

        let first = write_run(&tmp, &proposal, &make_meta()).unwrap();
        let second = write_run(&tmp, &proposal, &make_meta()).unwrap();

        assert_ne!(first.proposal_path, second.proposal_path);
        assert_eq!(second.stem, format!("{}_2", first.stem));
        assert!(first.proposal_path.exists());
        assert_eq!(std::fs::read_dir(&tmp).unwrap().count(), 8);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = temp_dir();
        write_run(&tmp, &make_proposal(), &make_meta()).unwrap();

        for entry in std::fs::read_dir(&tmp).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn long_company_name_still_writes() {
        let tmp = temp_dir();
        let mut proposal = make_proposal();
        proposal.subject = Subject::new("Acme ".repeat(60), Some("Retail".into())).unwrap();

        let files = write_run(&tmp, &proposal, &make_meta()).unwrap();

        assert!(files.proposal_path.exists());
        assert!(files.stem.starts_with("acme_acme_"));
        assert!(files.stem.len() < 100);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn failed_write_removes_partial_output() {
        let tmp = temp_dir();
        let proposal = make_proposal();
        let stem = format!("acme_corp_{}", proposal.generated_at.format("%Y%m%d_%H%M%S"));
        // A directory where the data file's temp file should go makes that write fail.
        let blocker = tmp.join(format!(".{stem}_data.json.tmp"));
        std::fs::create_dir(&blocker).unwrap();

        let err = write_run(&tmp, &proposal, &make_meta()).unwrap_err();
        assert!(matches!(err, ProposalGenError::Io { .. }));

        let left: Vec<String> = std::fs::read_dir(&tmp)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, [format!(".{stem}_data.json.tmp")]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unwritable_output_dir_is_fatal_io_error() {
        let tmp = temp_dir();
        let blocker = tmp.join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let err = write_run(&blocker, &make_proposal(), &make_meta()).unwrap_err();
        assert!(matches!(err, ProposalGenError::Io { .. }));
        assert!(err.is_fatal());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
