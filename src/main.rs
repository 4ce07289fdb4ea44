use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use pr_changelog::{changelog, config, pr, report};

/// PR Changelog: CLI tool that turns a release's pull request records into a
/// categorized changelog document, driven by configurable rules and templates.
#[derive(Parser, Debug)]
#[command(name = "pr-changelog", version, about)]
struct Cli {
    /// JSON document with release metadata and pull request records
    ///
    /// Not required when --mock is used.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Configuration file (.toml or .json). Defaults to ./.pr-changelog.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Unified diff between the two tags; replaces the diff statistics of the input
    #[arg(long)]
    diff: Option<PathBuf>,

    /// Write the changelog document to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the structured result (sections and counts) as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Use built-in mock pull requests for demo purposes
    #[arg(long)]
    r#mock: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut input = if cli.r#mock {
        info!("using mock pull request data for demo");
        pr::parse_input(include_str!("../tests/fixtures/sample_input.json"))?
    } else {
        let input_path = cli.input.as_deref().ok_or(
            "An input file is required unless --mock is used. Usage: pr-changelog --input <FILE> or pr-changelog --mock",
        )?;
        let _main_span = info_span!("pr_changelog", input = %input_path.display()).entered();

        info!("loading pull request records");
        pr::load_input(input_path)?
    };
    debug!(owner = %input.release.owner, repo = %input.release.repo, records = input.pull_requests.len(), "loaded input");

    if let Some(diff_path) = &cli.diff {
        info!(path = %diff_path.display(), "summarizing release diff");
        let raw = std::fs::read_to_string(diff_path)?;
        let summary = pr::diff::summarize_diff(&raw)?;
        input.release.diff = pr::DiffSummary {
            commits: input.release.diff.commits,
            ..summary
        };
    }

    info!("loading configuration");
    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    info!("building changelog");
    let pipeline = changelog::Pipeline::new(&config)?;
    let result = pipeline.run(input.pull_requests, &input.release);

    report::output(&result, cli.output.as_deref())?;
    if let Some(json_path) = &cli.json {
        report::write_json(&result, json_path)?;
    }
    report::print_summary(&result, &input.release);
    info!(
        categorized = result.counts.categorized,
        uncategorized = result.counts.uncategorized,
        "done"
    );

    Ok(())
}
