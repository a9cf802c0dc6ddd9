//! CLI argument parsing, interactive prompting, tracing setup, and progress display.

use std::io::{BufRead, Write};

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use proposalgen_core::pipeline::{ProgressReporter, RunResult, Services};
use proposalgen_shared::{RunConfig, Stage, StageWarning, Subject, load_config};
use tracing::info;

/// Set to `json` for JSON log lines.
const LOG_FORMAT_ENV: &str = "PROPOSALGEN_LOG_FORMAT";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// proposalgen: research a company and propose AI/ML use cases for it.
#[derive(Parser, Debug)]
#[command(
    name = "proposalgen",
    version,
    about = "Research a company and write an AI use case proposal with supporting resources.",
    long_about = "Research a company and write an AI use case proposal with supporting resources.\n\n\
                  Run without arguments to be prompted for the company and industry. Requires \
                  GEMINI_API_KEY and SERPER_API_KEY (a .env file in the working directory is read)."
)]
pub(crate) struct Cli {
    /// Company to research. Prompted for when omitted.
    pub company_name: Option<String>,

    /// Industry hint, e.g. "Retail". Inferred from research when omitted.
    pub industry: Option<String>,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing from `RUST_LOG` and `PROPOSALGEN_LOG_FORMAT`.
pub(crate) fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("proposalgen=info"));

    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Resolve configuration, build the subject, and run the pipeline.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    // Credentials are checked before anything else happens.
    let config = RunConfig::resolve(&load_config()?)?;

    let (company, industry) = match cli.company_name {
        Some(company) => (company, cli.industry),
        None => {
            let stdin = std::io::stdin();
            prompt_subject(&mut stdin.lock(), &mut std::io::stdout())?
        }
    };
    let subject = Subject::new(company, industry)?;

    info!(
        company = subject.name(),
        industry = subject.industry().unwrap_or("auto"),
        output_dir = %config.output_dir.display(),
        "generating proposal"
    );

    let services = Services::live(&config)?;
    let reporter = CliProgress::new();
    let result = proposalgen_core::pipeline::run(&config, &subject, &services, &reporter).await?;

    print_summary(&result);
    Ok(())
}

/// Ask for the company (required) and industry (optional).
fn prompt_subject(input: &mut impl BufRead, output: &mut impl Write) -> Result<(String, Option<String>)> {
    let company = loop {
        write!(output, "Company name: ")?;
        output.flush()?;
        let line = read_line(input)?.ok_or_else(|| eyre!("no company name given"))?;
        if !line.is_empty() {
            break line;
        }
        writeln!(output, "A company name is required.")?;
    };

    write!(output, "Industry (optional, press Enter to infer): ")?;
    output.flush()?;
    let industry = read_line(input)?.filter(|l| !l.is_empty());

    Ok((company, industry))
}

/// One trimmed line, or `None` at end of input.
fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn print_summary(result: &RunResult) {
    let proposal = &result.proposal;
    println!();
    println!("  Proposal generated for {}", proposal.subject.name());
    println!("  Industry:   {}", proposal.research.industry);
    println!(
        "  Research:   {}",
        if proposal.research.is_verified() {
            "verified (web search)"
        } else {
            "unverified (model knowledge)"
        }
    );
    println!("  Use cases:  {}", proposal.use_cases.len());
    println!("  Resources:  {}", proposal.resources.len());
    println!("  Warnings:   {}", result.warnings().len());
    println!("  Proposal:   {}", result.files.proposal_path.display());
    println!("  Resources:  {}", result.files.resources_path.display());
    println!("  Data:       {}", result.files.data_path.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner showing the current stage; warnings are printed above it.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        let msg = match stage {
            Stage::Research => "Researching company and industry",
            Stage::UseCases => "Generating use cases",
            Stage::Resources => "Collecting datasets, models, and repositories",
            Stage::Proposal => "Writing proposal",
        };
        self.spinner.set_message(msg);
    }

    fn stage_finished(&self, _stage: Stage, warnings: &[StageWarning]) {
        for warning in warnings {
            self.spinner.println(format!("  ! {warning}"));
        }
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    /// Clears the spinner when a run ends in an error before the report prints.
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
