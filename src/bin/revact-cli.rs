//! Revact CLI - drive review workflows against the in-memory backend
//!
//! Seeds a sample pull request, then runs, steps through, or summarizes the
//! review workflows with the caching interpreter.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use revact::review::workflow::{approve_group, create_group, review_summary};
use revact::review::{
    ApprovalState, Hunk, HunkId, MemoryBackend, PullRequest, PullRequestId, RequestContext,
    review_cache,
};
use revact::{CacheSettings, CachingInterpreter, Evaluate, LeafRef, Stepper};

#[derive(Parser)]
#[command(name = "revact")]
#[command(about = "Composable review actions over an in-memory backend", long_about = None)]
struct Cli {
    /// JSON file with cache settings
    #[arg(long)]
    cache_config: Option<PathBuf>,

    /// Reviewer login used for approvals
    #[arg(long, default_value = "octocat")]
    reviewer: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group the sample diff, approve every group, and print the status after each step
    Demo,

    /// Print each layer of leaf actions while approving a group
    Steps {
        /// Record "changes requested" instead of an approval
        #[arg(long)]
        request_changes: bool,
    },

    /// Print the review summary as JSON
    Summary {
        /// Approve the first group before summarizing
        #[arg(long)]
        approve_first: bool,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.cache_config {
        Some(path) => CacheSettings::load(path)?,
        None => CacheSettings::default(),
    };
    let cache = review_cache().settings(&settings).build();

    let backend = MemoryBackend::new();
    let pull_request = seed(&backend);
    let request = RequestContext::new().with_header("X-Reviewer", cli.reviewer.clone());
    let interpreter = CachingInterpreter::new(backend.interpreter(&request), cache);

    match cli.command {
        Commands::Demo => {
            let core = interpreter.evaluate(&create_group(
                pull_request.clone(),
                "core",
                vec![HunkId::new("src/lib.rs", 0), HunkId::new("src/lib.rs", 1)],
            ))?;
            let docs = interpreter.evaluate(&create_group(
                pull_request.clone(),
                "docs",
                vec![HunkId::new("README.md", 0)],
            ))?;
            println!("Created groups '{}' and '{}' on {}", core.name, docs.name, pull_request);

            for group in [&core, &docs] {
                let status = interpreter.evaluate(&approve_group(
                    pull_request.clone(),
                    group.id,
                    cli.reviewer.clone(),
                    ApprovalState::Approved,
                ))?;
                println!(
                    "Approved '{}': {:?} ({})",
                    group.name, status.state, status.description
                );
            }

            let stats = interpreter.cache().stats();
            println!(
                "Cache: {} hits, {} misses, {} entries",
                stats.hits,
                stats.misses,
                interpreter.cache().len()
            );
        }

        Commands::Steps { request_changes } => {
            let group = interpreter.evaluate(&create_group(
                pull_request.clone(),
                "core",
                vec![HunkId::new("src/lib.rs", 0), HunkId::new("src/lib.rs", 1)],
            ))?;
            let state = if request_changes {
                ApprovalState::ChangesRequested
            } else {
                ApprovalState::Approved
            };
            let action = approve_group(pull_request, group.id, cli.reviewer.clone(), state);

            let mut stepper = Stepper::new(&interpreter, &action);
            print_layer(0, &stepper.peek());
            while !stepper.is_done() {
                let frontier = stepper.next()?;
                print_layer(stepper.steps(), &frontier);
            }
            let status = stepper.run_remaining_steps()?;
            println!("Final status: {:?} ({})", status.state, status.description);
        }

        Commands::Summary { approve_first } => {
            if approve_first {
                let group = interpreter.evaluate(&create_group(
                    pull_request.clone(),
                    "core",
                    vec![HunkId::new("src/lib.rs", 0)],
                ))?;
                interpreter.evaluate(&approve_group(
                    pull_request.clone(),
                    group.id,
                    cli.reviewer.clone(),
                    ApprovalState::Approved,
                ))?;
            }

            let response = interpreter.evaluate_to_response(&review_summary(pull_request))?;
            let body = serde_json::to_string_pretty(&response.body)
                .context("Failed to render summary")?;
            println!("{}", body);
        }
    }

    Ok(())
}

fn print_layer(step: usize, leaves: &[LeafRef]) {
    if leaves.is_empty() {
        println!("Step {}: reduced to a value", step);
        return;
    }
    println!("Step {}: {} pending", step, leaves.len());
    for leaf in leaves {
        println!("  {:?}", leaf);
    }
}

/// Register a sample pull request with three hunks.
fn seed(backend: &MemoryBackend) -> PullRequestId {
    let id = PullRequestId::new("octo", "widgets", 42);
    let hunk = |file: &str, index: usize, body: &str| Hunk {
        id: HunkId::new(file, index),
        file: file.to_string(),
        header: format!("@@ -{0},1 +{0},2 @@", index * 10 + 1),
        body: body.to_string(),
    };

    backend.add_pull_request(
        PullRequest {
            id: id.clone(),
            title: "Add widget registry".to_string(),
            author: "hubot".to_string(),
            head_sha: "4f2a9c1".to_string(),
        },
        vec![
            hunk("src/lib.rs", 0, "+pub mod registry;\n"),
            hunk("src/lib.rs", 1, "-fn old() {}\n+fn new() {}\n"),
            hunk("README.md", 0, "+## Registry\n"),
        ],
    );
    id
}
