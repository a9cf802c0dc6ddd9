//! Proposal construction: joins the stage artifacts into one [`Proposal`].

use chrono::Utc;

use proposalgen_shared::{
    CURRENT_SCHEMA_VERSION, Proposal, ProposedUseCase, ResearchSummary, ResourceCollection, RunId,
    StageWarning, Subject, UseCase,
};

/// Build the terminal artifact. Use cases keep their ranking order and each
/// carries only the resources its own queries found, in discovery order.
pub fn build_proposal(
    run_id: RunId,
    subject: &Subject,
    research: ResearchSummary,
    use_cases: Vec<UseCase>,
    collection: ResourceCollection,
    warnings: Vec<StageWarning>,
) -> Proposal {
    let use_cases = use_cases
        .into_iter()
        .enumerate()
        .map(|(i, use_case)| ProposedUseCase {
            resources: collection.for_use_case(i).cloned().collect(),
            use_case,
        })
        .collect();

    Proposal {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id,
        generated_at: Utc::now(),
        subject: subject.clone(),
        research,
        use_cases,
        resources: collection.resources,
        warnings,
    }
}
