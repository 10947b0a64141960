//! Shipwright - deploy pipeline CLI for containerized agent services
//!
//! ## Commands
//!
//! - `plan`: report the skip/run decision for an agent without side effects
//! - `apply`: run the full pipeline (fingerprint, upload, build, deploy)
//!
//! Exit code is 0 on success; on failure the terminal error names the
//! failing pipeline stage plus the backend's raw detail.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;

use shipwright_core::{
    init_tracing, AgentSpec, HttpRuntimeBackend, KnowledgeParams, Pipeline, ProcessBuildExecutor,
    TriggerDecision,
};
use shipwright_state::{FsObjectStore, FsTriggerStateStore};

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Content-hash-driven build & deploy pipeline for agent services", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON (log lines and command output)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the skip/run decision for an agent, with no side effects
    Plan {
        #[command(flatten)]
        agent: AgentArgs,

        /// Directory holding per-agent trigger state records
        #[arg(long, default_value = ".shipwright/state")]
        state_dir: PathBuf,
    },

    /// Run the full pipeline: fingerprint, upload, build if changed, deploy
    Apply {
        #[command(flatten)]
        agent: AgentArgs,

        /// Directory holding per-agent trigger state records
        #[arg(long, default_value = ".shipwright/state")]
        state_dir: PathBuf,

        /// Directory backing the artifact object store
        #[arg(long, default_value = ".shipwright/artifacts")]
        store_dir: PathBuf,

        /// Base URL of the runtime control API
        #[arg(long)]
        runtime_endpoint: String,

        /// Build executor command; the build request is exported as
        /// SHIPWRIGHT_* environment variables
        #[arg(long, num_args = 1.., required = true, allow_hyphen_values = true)]
        build_command: Vec<String>,
    },
}

#[derive(Args)]
struct AgentArgs {
    /// Agent name (part of every artifact and state key)
    #[arg(long)]
    agent: String,

    /// Root of the agent's source tree
    #[arg(long)]
    source: PathBuf,

    /// External build project identifier
    #[arg(long)]
    project: String,

    /// Image repository the build publishes to
    #[arg(long)]
    repository: String,

    /// Image tag the build publishes
    #[arg(long, default_value = "latest")]
    tag: String,

    /// Registry base URL
    #[arg(long)]
    registry: String,

    /// Region the build runs in
    #[arg(long, default_value = "us-west-2")]
    region: String,

    /// Execution role passed to the runtime backend
    #[arg(long)]
    role_arn: String,

    /// Hard timeout for the external build (0 disables the bound)
    #[arg(long, default_value = "1800")]
    timeout_secs: u64,

    /// Optional knowledge base identifier forwarded to the deployment
    #[arg(long, requires = "similarity_threshold")]
    knowledge_base: Option<String>,

    /// Retrieval similarity threshold; only valid with --knowledge-base
    #[arg(long, requires = "knowledge_base")]
    similarity_threshold: Option<f64>,
}

impl AgentArgs {
    fn to_spec(&self) -> AgentSpec {
        let knowledge = match (&self.knowledge_base, self.similarity_threshold) {
            (Some(id), Some(threshold)) => Some(KnowledgeParams {
                knowledge_base_id: id.clone(),
                similarity_threshold: threshold,
            }),
            _ => None,
        };

        AgentSpec {
            agent_name: self.agent.clone(),
            source_dir: self.source.clone(),
            build_project: self.project.clone(),
            image_repository: self.repository.clone(),
            image_tag: self.tag.clone(),
            registry_url: self.registry.clone(),
            region: self.region.clone(),
            role_arn: self.role_arn.clone(),
            build_timeout_secs: self.timeout_secs,
            knowledge,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Plan { agent, state_dir } => cmd_plan(&agent.to_spec(), &state_dir, cli.json).await,
        Commands::Apply {
            agent,
            state_dir,
            store_dir,
            runtime_endpoint,
            build_command,
        } => {
            cmd_apply(
                &agent.to_spec(),
                &state_dir,
                &store_dir,
                &runtime_endpoint,
                build_command,
            )
            .await
        }
    }
}

async fn cmd_plan(spec: &AgentSpec, state_dir: &PathBuf, json: bool) -> Result<()> {
    let states =
        FsTriggerStateStore::open(state_dir).context("Failed to open trigger state store")?;

    let report = shipwright_core::plan(&states, spec)
        .await
        .map_err(|e| anyhow::anyhow!("stage '{}' failed: {e}", e.stage().name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Agent:       {}", report.agent_name);
    println!("Fingerprint: {}", report.fingerprint);
    println!("Artifact:    {}", report.artifact_key);
    match report.decision {
        TriggerDecision::Skip => println!("Decision:    skip (inputs unchanged)"),
        TriggerDecision::Run => match &report.last_state {
            Some(last) => println!(
                "Decision:    run (last built fingerprint {})",
                last.source_fingerprint.short()
            ),
            None => println!("Decision:    run (no prior build recorded)"),
        },
    }
    Ok(())
}

async fn cmd_apply(
    spec: &AgentSpec,
    state_dir: &PathBuf,
    store_dir: &PathBuf,
    runtime_endpoint: &str,
    build_command: Vec<String>,
) -> Result<()> {
    let objects = FsObjectStore::open(store_dir).context("Failed to open artifact store")?;
    let states =
        FsTriggerStateStore::open(state_dir).context("Failed to open trigger state store")?;

    let pipeline = Pipeline::new(
        Arc::new(objects),
        Arc::new(states),
        Arc::new(ProcessBuildExecutor::new(build_command)),
        Arc::new(HttpRuntimeBackend::new(runtime_endpoint)),
    );

    let report = pipeline
        .apply(spec)
        .await
        .map_err(|e| anyhow::anyhow!("stage '{}' failed: {e}", e.stage().name()))?;

    println!("Agent:       {}", report.agent_name);
    println!("Fingerprint: {}", report.fingerprint);
    println!("Artifact:    {}", report.artifact.key);
    println!(
        "Build:       {}",
        if report.build_skipped() {
            "skipped (inputs unchanged)"
        } else {
            "executed"
        }
    );
    println!("Deployment:  {}", report.deployment.deployment_id);
    println!("Endpoint:    {}", report.deployment.endpoint_id);
    println!("Duration:    {} ms", report.duration_ms);
    Ok(())
}
