//! End-to-end proposal pipeline: research → use cases → resources → proposal files.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument};

use proposalgen_catalogs::{CatalogRegistry, CollectOptions};
use proposalgen_search::{SerperSearch, WebSearch};
use proposalgen_shared::{Proposal, Result, RunConfig, RunId, Stage, StageWarning, Subject};

use crate::assembler::{RunFiles, RunMeta, write_run};
use crate::llm::{GeminiClient, TextGenerator};
use crate::proposal::build_proposal;
use crate::research::{ResearchOptions, research};
use crate::resources::{CollectStats, collect_resources};
use crate::use_cases::generate_use_cases;

/// The external collaborators a run talks to.
pub struct Services {
    pub search: Box<dyn WebSearch>,
    pub llm: Box<dyn TextGenerator>,
    pub catalogs: CatalogRegistry,
}

impl Services {
    /// Serper, Gemini, and the public catalogs, configured from `config`.
    pub fn live(config: &RunConfig) -> Result<Self> {
        Ok(Self {
            search: Box::new(SerperSearch::new(&config.search)?),
            llm: Box::new(GeminiClient::new(&config.gemini)?),
            catalogs: CatalogRegistry::live(&config.catalogs)?,
        })
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: RunId,
    pub proposal: Proposal,
    pub files: RunFiles,
    pub collect: CollectStats,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn warnings(&self) -> &[StageWarning] {
        &self.proposal.warnings
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage starts.
    fn stage_started(&self, stage: Stage);
    /// Called when a stage finishes, with the warnings it produced.
    fn stage_finished(&self, stage: Stage, warnings: &[StageWarning]);
    /// Called when the run completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _warnings: &[StageWarning]) {}
    fn done(&self, _result: &RunResult) {}
}

/// Run all four stages for `subject` and write the output files.
///
/// Stage failures degrade into warnings; only fatal errors (rejected
/// credentials, unwritable output) are returned.
#[instrument(skip_all, fields(subject = %subject.name(), industry = subject.industry().unwrap_or("-")))]
pub async fn run(
    config: &RunConfig,
    subject: &Subject,
    services: &Services,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();
    let mut warnings: Vec<StageWarning> = Vec::new();

    info!(%run_id, model = services.llm.model(), "starting proposal run");

    // --- Stage 1: Research ---
    progress.stage_started(Stage::Research);
    let staged = research(
        subject,
        services.search.as_ref(),
        services.llm.as_ref(),
        ResearchOptions::from(&config.search),
    )
    .await?;
    progress.stage_finished(Stage::Research, &staged.warnings);
    warnings.extend(staged.warnings);
    let summary = staged.artifact;

    // --- Stage 2: Use cases ---
    progress.stage_started(Stage::UseCases);
    let staged = generate_use_cases(subject, &summary, services.llm.as_ref(), config.use_case_count).await?;
    progress.stage_finished(Stage::UseCases, &staged.warnings);
    warnings.extend(staged.warnings);
    let use_cases = staged.artifact;

    // --- Stage 3: Resources ---
    progress.stage_started(Stage::Resources);
    let (staged, collect) = collect_resources(
        &services.catalogs,
        &use_cases,
        CollectOptions::from(&config.catalogs),
    )
    .await;
    progress.stage_finished(Stage::Resources, &staged.warnings);
    warnings.extend(staged.warnings);
    let collection = staged.artifact;

    // --- Stage 4: Proposal ---
    progress.stage_started(Stage::Proposal);
    let proposal = build_proposal(run_id.clone(), subject, summary, use_cases, collection, warnings);
    let meta = RunMeta {
        model: services.llm.model().to_string(),
        started_at,
        collect,
    };
    let files = write_run(&config.output_dir, &proposal, &meta)?;
    progress.stage_finished(Stage::Proposal, &[]);

    let result = RunResult {
        run_id,
        proposal,
        files,
        collect,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        run_id = %result.run_id,
        use_cases = result.proposal.use_cases.len(),
        resources = result.proposal.resources.len(),
        warnings = result.warnings().len(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        path = %result.files.proposal_path.display(),
        "proposal run complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use proposalgen_shared::{AppConfig, ProposalGenError, ResourceSource, WarningKind};

    use super::*;
    use crate::test_support::{FakeCatalog, FakeSearch, ScriptedGenerator};

    const USE_CASES_JSON: &str = r#"[
      {"title": "Demand Forecasting", "description": "Predict weekly demand per store.", "rationale": "Fewer stockouts.", "priority": 5},
      {"title": "Fraud Detection", "description": "Flag suspicious refunds.", "rationale": "Lower losses.", "priority": 4},
      {"title": "Support Chatbot", "description": "Answer shopper questions.", "rationale": "Cheaper support.", "priority": 3}
    ]"#;

    const FORECAST_URL: &str = "https://www.kaggle.com/datasets/acme/store-sales";
    const FRAUD_URL: &str = "https://github.com/acme/fraud-detector";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pg-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(output_dir: PathBuf) -> RunConfig {
        let mut app = AppConfig::default();
        app.defaults.use_case_count = 3;
        app.catalogs.keywords_per_use_case = 1;
        let mut config = RunConfig::resolve_with(&app, |key| match key {
            "GEMINI_API_KEY" | "SERPER_API_KEY" => Some("test-key".into()),
            _ => None,
        })
        .unwrap();
        config.output_dir = output_dir;
        config
    }

    fn services(search: FakeSearch, llm: ScriptedGenerator, catalogs: Vec<FakeCatalog>) -> Services {
        Services {
            search: Box::new(search),
            llm: Box::new(llm),
            catalogs: CatalogRegistry::from_catalogs(
                catalogs
                    .into_iter()
                    .map(|c| Box::new(c) as Box<dyn proposalgen_catalogs::Catalog>)
                    .collect(),
            ),
        }
    }

    fn acme_search() -> FakeSearch {
        FakeSearch::with_hits(&[
            ("Acme Corp | About", "https://acme.test/about", "Acme Corp runs 240 grocery stores."),
            ("Acme annual report", "https://acme.test/report", "Online sales grew 12%."),
        ])
    }

    fn acme_llm() -> ScriptedGenerator {
        ScriptedGenerator::sequence(&[
            "## Overview\nAcme Corp is a grocery retailer with 240 stores.",
            "Retailers are adopting demand forecasting and conversational support.",
            USE_CASES_JSON,
        ])
    }

    /// Records every progress event.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage_started(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {stage}"));
        }
        fn stage_finished(&self, stage: Stage, _warnings: &[StageWarning]) {
            self.events.lock().unwrap().push(format!("finish {stage}"));
        }
        fn done(&self, _result: &RunResult) {
            self.events.lock().unwrap().push("done".into());
        }
    }

    #[tokio::test]
    async fn acme_retail_end_to_end() {
        let tmp = temp_dir();
        let subject = Subject::new("Acme Corp", Some("Retail".into())).unwrap();
        let services = services(
            acme_search(),
            acme_llm(),
            vec![
                FakeCatalog::keyed(ResourceSource::GitHub, &[("fraud detection", FRAUD_URL)]),
                FakeCatalog::keyed(ResourceSource::Kaggle, &[("demand forecasting", FORECAST_URL)]),
            ],
        );
        let progress = RecordingProgress::default();

        let result = run(&config(tmp.clone()), &subject, &services, &progress).await.unwrap();

        let proposal = &result.proposal;
        assert!(proposal.research.is_verified());
        assert_eq!(proposal.use_cases.len(), 3);
        assert_eq!(proposal.resources.len(), 2);
        assert_eq!(proposal.use_cases[0].resources[0].url, FORECAST_URL);
        assert_eq!(proposal.use_cases[1].resources[0].url, FRAUD_URL);
        assert!(proposal.use_cases[2].resources.is_empty());
        assert_eq!(proposal.use_cases[0].resources.len(), 1);
        assert_eq!(proposal.use_cases[1].resources.len(), 1);

        let md = std::fs::read_to_string(&result.files.proposal_path).unwrap();
        assert!(md.lines().next().unwrap().contains("Acme Corp"));
        let sections: Vec<&str> = md.split("\n### ").skip(1).collect();
        let use_case_sections: Vec<&&str> = sections
            .iter()
            .filter(|s| s.starts_with(|c: char| c.is_ascii_digit()))
            .collect();
        assert_eq!(use_case_sections.len(), 3);
        assert!(use_case_sections[0].contains(FORECAST_URL));
        assert!(!use_case_sections[0].contains(FRAUD_URL));
        assert!(use_case_sections[1].contains(FRAUD_URL));
        assert!(!use_case_sections[1].contains(FORECAST_URL));
        assert!(!use_case_sections[2].contains(FRAUD_URL));
        assert!(!use_case_sections[2].contains(FORECAST_URL));

        assert!(result.files.resources_path.exists());
        assert_eq!(result.files.manifest.use_case_count, 3);
        assert_eq!(
            *progress.events.lock().unwrap(),
            [
                "start research",
                "finish research",
                "start use cases",
                "finish use cases",
                "start resources",
                "finish resources",
                "start proposal",
                "finish proposal",
                "done",
            ]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn zero_search_results_still_completes_unverified() {
        let tmp = temp_dir();
        let subject = Subject::new("Obscure Startup", None).unwrap();
        let services = services(
            FakeSearch::empty(),
            acme_llm(),
            vec![FakeCatalog::returning(ResourceSource::HuggingFace, &["https://huggingface.co/x/y"])],
        );

        let result = run(&config(tmp.clone()), &subject, &services, &SilentProgress).await.unwrap();

        assert!(!result.proposal.research.is_verified());
        assert!(!result.proposal.research.overview.is_empty());
        assert!(!result.proposal.use_cases.is_empty());
        assert!(result.warnings().iter().any(|w| w.kind == WarningKind::Fallback));
        let md = std::fs::read_to_string(&result.files.proposal_path).unwrap();
        assert!(md.contains("unverified"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn failing_github_does_not_stop_the_run() {
        let tmp = temp_dir();
        let subject = Subject::new("Acme Corp", Some("Retail".into())).unwrap();
        let services = services(
            acme_search(),
            acme_llm(),
            vec![
                FakeCatalog::failing(ResourceSource::GitHub),
                FakeCatalog::returning(ResourceSource::HuggingFace, &["https://huggingface.co/acme/model"]),
                FakeCatalog::returning(ResourceSource::Kaggle, &["https://www.kaggle.com/datasets/acme/data"]),
            ],
        );

        let result = run(&config(tmp.clone()), &subject, &services, &SilentProgress).await.unwrap();

        let sources: Vec<ResourceSource> = result.proposal.resources.iter().map(|r| r.source).collect();
        assert_eq!(sources, [ResourceSource::HuggingFace, ResourceSource::Kaggle]);
        assert_eq!(result.collect.failures, 3);
        assert!(
            result
                .warnings()
                .iter()
                .any(|w| w.stage == Stage::Resources && w.message.contains("GitHub"))
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn rejected_model_key_aborts_without_output() {
        let tmp = temp_dir();
        let subject = Subject::new("Acme Corp", None).unwrap();
        let services = services(
            acme_search(),
            ScriptedGenerator::rejecting_credentials(),
            vec![FakeCatalog::returning(ResourceSource::GitHub, &["https://github.com/a/b"])],
        );

        let err = run(&config(tmp.clone()), &subject, &services, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, ProposalGenError::Credentials { .. }));
        assert_eq!(std::fs::read_dir(&tmp).unwrap().count(), 0);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
