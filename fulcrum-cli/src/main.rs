// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fulcrum CLI
//!
//! Inspect recorded runs, replay them from any stage with edited
//! artifacts, and manage the prompt library from a terminal.

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fulcrum_client::{ClientConfig, FulcrumClient, RetryPolicy};
use fulcrum_core::render::format_confidence;
use fulcrum_core::{
    ChatSession, DispatchOutcome, FieldKind, JsonEdit, MetricsRange,
    ReplayCursor, ReplayStudio, RunDetail, RunListItem, RunResult, RunStatus, RunsQuery, Stage,
    StageField, STAGES,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "fulcrum")]
#[command(about = "Fulcrum - staged replay for recorded LLM runs", long_about = None)]
struct Cli {
    /// Fulcrum API base URL
    #[arg(long, env = "FULCRUM_API_URL")]
    api_url: Option<String>,

    /// API key sent as X-API-Key
    #[arg(long, env = "FULCRUM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Fail on the first error instead of retrying reads
    #[arg(long)]
    no_retry: bool,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stage artifacts of a recorded run
    Stages {
        run_id: String,

        /// Mark stages upstream of this replay point as locked
        #[arg(long, default_value = "0")]
        from: u8,
    },

    /// Replay a run from a stage with overrides
    Replay {
        run_id: String,

        /// Stage index (0-5) to replay from
        #[arg(long, default_value = "0")]
        from: u8,

        /// Model override (defaults to the source run's model)
        #[arg(long)]
        model: Option<String>,

        /// Temperature override, clamped to 0.0-2.0
        #[arg(long)]
        temperature: Option<f64>,

        /// Override a field: FIELD=VALUE, or FIELD=@PATH to read a file
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        overrides: Vec<String>,

        /// Re-run retrieval (only when replaying from stage 0 or 1)
        #[arg(long)]
        recompute_retrieval: bool,

        /// Re-run KPI aggregation (only when replaying from stage 0-2)
        #[arg(long)]
        recompute_kpi: bool,

        /// Print the request instead of sending it
        #[arg(long)]
        dry_run: bool,

        /// Save the resolved prompt packet to the library under this slug
        #[arg(long, requires = "prompt_name")]
        save_prompt: Option<String>,

        /// Display name for --save-prompt
        #[arg(long)]
        prompt_name: Option<String>,
    },

    /// Run a single prompt outside any recorded run
    Playground {
        /// Prompt text, or "-" to read stdin
        prompt: String,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,
    },

    /// Prompt library
    Prompts {
        #[command(subcommand)]
        command: PromptCommands,
    },

    /// Recorded runs
    Runs {
        #[command(subcommand)]
        command: RunCommands,
    },

    /// Compare 2-4 runs side by side
    Compare {
        #[arg(required = true)]
        run_ids: Vec<String>,
    },

    /// Dashboard KPIs
    Metrics {
        /// 24h, 7d, 30d or 90d
        #[arg(long, default_value = "7d")]
        range: String,
    },

    /// List guardrail policies
    Guardrails,

    /// Interactive chat; "/new" starts over, "/exit" quits
    Chat {
        #[arg(long)]
        model: Option<String>,

        /// Disable retrieval-augmented answers
        #[arg(long)]
        no_retrieval: bool,

        /// Resume an existing server session
        #[arg(long)]
        session: Option<String>,
    },
}

#[derive(Subcommand)]
enum RunCommands {
    /// List recorded runs
    List {
        /// Free-text search
        #[arg(long)]
        q: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// success, failed, running or pending
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        min_confidence: Option<f64>,
    },

    /// Show params, metrics, tags and artifacts of one run
    Show { run_id: String },
}

#[derive(Subcommand)]
enum PromptCommands {
    /// List prompts
    List,

    /// Show a prompt and its versions
    Show { slug: String },

    /// Create a new prompt
    Save {
        #[arg(long)]
        name: String,

        #[arg(long)]
        slug: String,

        /// Template file
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        author: Option<String>,
    },

    /// Add a version to an existing prompt
    Version {
        slug: String,

        /// Template file
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        author: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.json);

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    if let Some(key) = cli.api_key {
        config.api_key = Some(key);
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if cli.no_retry {
        config = config.with_retry(RetryPolicy::none());
    }
    let client = Arc::new(FulcrumClient::new(config).context("Failed to create API client")?);

    match cli.command {
        Commands::Stages { run_id, from } => {
            let studio = ReplayStudio::replay(client, run_id.as_str());
            studio.load().await.context("Failed to load run")?;
            studio.set_replay_from(parse_cursor(from)?);

            if cli.json {
                print_json(&studio.snapshot())?;
            } else {
                print_stages(&studio);
            }
        }

        Commands::Replay {
            run_id,
            from,
            model,
            temperature,
            overrides,
            recompute_retrieval,
            recompute_kpi,
            dry_run,
            save_prompt,
            prompt_name,
        } => {
            let studio = ReplayStudio::replay(client, run_id.as_str());
            studio.load().await.context("Failed to load run")?;

            studio.set_replay_from(parse_cursor(from)?);
            if let Some(model) = model {
                studio.set_model(model);
            }
            if let Some(t) = temperature {
                studio.set_temperature(t);
            }
            studio.set_recompute_retrieval(recompute_retrieval);
            studio.set_recompute_kpi(recompute_kpi);

            for arg in &overrides {
                let (field, value) = parse_override(arg)?;
                apply_override(&studio, field, &value)?;
            }

            if let (Some(slug), Some(name)) = (save_prompt, prompt_name) {
                studio.select_stage(Stage::PromptAssembly);
                let prompt = studio
                    .save_prompt(&name, &slug, None)
                    .await
                    .context("Failed to save prompt")?;
                println!("✓ Saved prompt '{}' ({})", prompt.name, prompt.id);
            }

            if dry_run {
                print_json(&studio.staged_request())?;
                return Ok(());
            }

            match studio.run().await? {
                DispatchOutcome::Completed(result) => print_result(&result, cli.json)?,
                DispatchOutcome::Busy => bail!("A replay is already in flight"),
            }
        }

        Commands::Playground {
            prompt,
            model,
            temperature,
        } => {
            let prompt = if prompt == "-" {
                read_stdin().await?
            } else {
                prompt
            };

            let studio = ReplayStudio::playground(client);
            studio.set_prompt(prompt);
            if let Some(model) = model {
                studio.set_model(model);
            }
            if let Some(t) = temperature {
                studio.set_temperature(t);
            }

            match studio.run().await? {
                DispatchOutcome::Completed(result) => print_result(&result, cli.json)?,
                DispatchOutcome::Busy => bail!("A run is already in flight"),
            }
        }

        Commands::Prompts { command } => handle_prompt_command(command, client, cli.json).await?,

        Commands::Runs { command } => handle_run_command(command, &client, cli.json).await?,

        Commands::Compare { run_ids } => {
            let compared = client.compare_runs(&run_ids).await?;
            if cli.json {
                print_json(&compared)?;
            } else {
                for (i, run) in compared.runs.iter().enumerate() {
                    if i > 0 {
                        println!();
                    }
                    print_run_detail(run);
                }
            }
        }

        Commands::Metrics { range } => {
            let range = MetricsRange::parse(&range).with_context(|| {
                format!("Unknown range '{}', expected 24h, 7d, 30d or 90d", range)
            })?;
            let summary = client.metrics_summary(range).await?;
            if cli.json {
                print_json(&summary)?;
            } else {
                let kpis = &summary.kpis;
                println!("Last {} ({} runs)", summary.range, kpis.run_count);
                println!(
                    "  Latency p50/p95: {:.0} / {:.0} ms",
                    kpis.p50_latency_ms, kpis.p95_latency_ms
                );
                println!("  Total cost: ${:.4}", kpis.total_cost_usd);
                println!("  Avg confidence: {}", format_confidence(kpis.avg_confidence));
                println!("  Parse success: {:.1}%", kpis.parse_success_rate * 100.0);
                if !summary.models.is_empty() {
                    println!("  Models: {}", summary.models.join(", "));
                }
            }
        }

        Commands::Guardrails => {
            let policies = client.guardrail_policies().await?;
            if cli.json {
                print_json(&policies)?;
            } else {
                println!("{} policies:", policies.len());
                for policy in &policies {
                    println!(
                        "  {} - {} [{}] {} - {} violations in 24h",
                        policy.id,
                        policy.name,
                        policy.kind,
                        policy.status.as_str(),
                        policy.violations_24h
                    );
                }
            }
        }

        Commands::Chat {
            model,
            no_retrieval,
            session,
        } => {
            run_chat(client, model, !no_retrieval, session).await?;
        }
    }

    Ok(())
}

async fn handle_run_command(command: RunCommands, client: &FulcrumClient, json: bool) -> Result<()> {
    match command {
        RunCommands::List {
            q,
            model,
            status,
            min_confidence,
        } => {
            let query = RunsQuery {
                q,
                model,
                status: status.as_deref().map(parse_status).transpose()?,
                min_confidence,
            };
            let response = client.list_runs(&query).await?;
            if json {
                return print_json(&response);
            }
            println!(
                "Found {} runs:",
                response.total.unwrap_or(response.runs.len() as u64)
            );
            for run in &response.runs {
                println!(
                    "  {} - {} - {} - confidence {}",
                    run.run_id,
                    run.status.as_str(),
                    run.model,
                    confidence_text(run)
                );
            }
        }

        RunCommands::Show { run_id } => {
            let detail = client
                .get_run(&run_id)
                .await
                .with_context(|| format!("Failed to fetch run {}", run_id))?;
            if json {
                return print_json(&detail);
            }
            print_run_detail(&detail);
        }
    }
    Ok(())
}

async fn handle_prompt_command(
    command: PromptCommands,
    client: Arc<FulcrumClient>,
    json: bool,
) -> Result<()> {
    match command {
        PromptCommands::List => {
            let prompts = client.list_prompts().await?;
            if json {
                return print_json(&prompts);
            }
            println!("{} prompts:", prompts.len());
            for prompt in &prompts {
                let version = prompt
                    .latest_version
                    .as_ref()
                    .map(|v| v.version.as_str())
                    .unwrap_or("-");
                println!(
                    "  {} - {} [{}] {} by {}",
                    prompt.id,
                    prompt.name,
                    prompt.status.as_str(),
                    version,
                    prompt.author
                );
            }
        }

        PromptCommands::Show { slug } => {
            let prompt = client.get_prompt(&slug).await?;
            if json {
                return print_json(&prompt);
            }
            println!("{} ({})", prompt.name, prompt.id);
            println!("  Status: {}", prompt.status.as_str());
            println!("  Updated: {} by {}", prompt.updated_at, prompt.author);
            if let Some(latest) = &prompt.latest_version {
                println!();
                println!("Latest ({}):", latest.version);
                println!("{}", latest.template);
            }
            for version in &prompt.versions {
                println!(
                    "  {} - {} by {}",
                    version.version,
                    version.created_at,
                    version.author.as_deref().unwrap_or("unknown")
                );
            }
        }

        PromptCommands::Save {
            name,
            slug,
            file,
            author,
        } => {
            let studio = ReplayStudio::playground(client);
            studio.set_prompt(read_template(&file)?);
            let prompt = studio
                .save_prompt(&name, &slug, author.as_deref())
                .await?;
            info!(slug = %prompt.id, "Prompt created");
            println!("✓ Saved prompt '{}' ({})", prompt.name, prompt.id);
        }

        PromptCommands::Version { slug, file, author } => {
            let studio = ReplayStudio::playground(client);
            studio.set_prompt(read_template(&file)?);
            let prompt = studio
                .save_prompt_version(&slug, author.as_deref())
                .await?;
            let version = prompt
                .latest_version
                .as_ref()
                .map(|v| v.version.clone())
                .unwrap_or_default();
            println!("✓ Added version {} to '{}'", version, prompt.id);
        }
    }
    Ok(())
}

async fn run_chat(
    client: Arc<FulcrumClient>,
    model: Option<String>,
    retrieval_enabled: bool,
    session: Option<String>,
) -> Result<()> {
    let chat = match session {
        Some(id) => ChatSession::resume(client, id),
        None => ChatSession::new(client),
    };
    if let Some(model) = model {
        chat.set_model(model);
    }
    chat.set_retrieval_enabled(retrieval_enabled);
    if let Some(greeting) = chat.transcript().first() {
        println!("{}", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/exit" | "/quit" => break,
            "/new" => {
                chat.new_chat();
                println!("Started a new chat.");
            }
            input => {
                if let Some(reply) = chat.send(input).await {
                    println!("{}", reply.content);
                }
            }
        }
    }
    Ok(())
}

fn parse_cursor(index: u8) -> Result<ReplayCursor> {
    ReplayCursor::new(index)
        .with_context(|| format!("Replay stage must be 0-{}, got {}", STAGES.len() - 1, index))
}

fn parse_status(s: &str) -> Result<RunStatus> {
    Ok(match s.to_ascii_lowercase().as_str() {
        "success" => RunStatus::Success,
        "failed" => RunStatus::Failed,
        "running" => RunStatus::Running,
        "pending" => RunStatus::Pending,
        other => bail!("Unknown run status: {}", other),
    })
}

/// Split `FIELD=VALUE`; a value starting with `@` names a file to read.
fn parse_override(arg: &str) -> Result<(StageField, String)> {
    let (name, value) = arg
        .split_once('=')
        .with_context(|| format!("Expected FIELD=VALUE, got '{}'", arg))?;
    let field = StageField::parse(name.trim())
        .with_context(|| format!("Unknown stage field: {}", name.trim()))?;

    let value = match value.strip_prefix('@') {
        Some(path) => read_template(Path::new(path))?,
        None => value.to_string(),
    };
    Ok((field, value))
}

fn apply_override<B: fulcrum_core::ReplayBackend>(
    studio: &ReplayStudio<B>,
    field: StageField,
    value: &str,
) -> Result<()> {
    match field.kind() {
        FieldKind::Text => studio.set_override(field, value)?,
        FieldKind::List | FieldKind::Object => {
            if studio.edit_json(field, value)? == JsonEdit::Rejected {
                bail!("Override for {} is not valid JSON of the right shape", field);
            }
        }
    }
    Ok(())
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

async fn read_stdin() -> Result<String> {
    use tokio::io::AsyncReadExt;
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .context("Failed to read stdin")?;
    Ok(buf)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_result(result: &RunResult, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    print!("{}", result);
    Ok(())
}

fn confidence_text(run: &RunListItem) -> String {
    match (run.confidence, run.label()) {
        (Some(score), Some(label)) => format!("{} ({})", format_confidence(score), label),
        _ => "-".to_string(),
    }
}

fn print_run_detail(detail: &RunDetail) {
    let run = &detail.summary;
    println!("Run {} [{}] on {}", run.run_id, run.status.as_str(), run.model);
    println!("  Confidence: {}", confidence_text(run));
    if let Some(explanation) = &detail.confidence_explanation {
        println!("  {}", explanation);
    }
    for (name, value) in &detail.params {
        println!("  param {} = {}", name, value);
    }
    for (name, value) in &detail.metrics {
        println!("  metric {} = {}", name, value);
    }
    for (name, value) in &detail.tags {
        println!("  tag {} = {}", name, value);
    }
    for artifact in &detail.artifacts {
        println!("  artifact {} ({}) {}", artifact.name, artifact.kind, artifact.path);
    }
    if let Some(input) = &detail.input_preview {
        println!("Input:");
        println!("{}", input);
    }
    if let Some(output) = &detail.output_preview {
        println!("Output:");
        println!("{}", output);
    }
}

fn print_stages<B: fulcrum_core::ReplayBackend>(studio: &ReplayStudio<B>) {
    if let Some(snapshot) = studio.snapshot() {
        println!("Run {} ({} @ {})", snapshot.run_id, studio.model(), studio.temperature());
        if let (Some(score), Some(label)) = (snapshot.confidence, snapshot.label()) {
            println!("Confidence: {} ({})", format_confidence(score), label);
        }
    }

    for stage in STAGES {
        println!();
        println!("== {}", stage);
        for &field in stage.fields() {
            let access = studio.field_access(field);
            let marker = if access.is_locked() { " (locked)" } else { "" };
            let value = access.into_value();
            if value.is_empty() {
                continue;
            }
            println!("-- {}{}", field, marker);
            println!("{}", value.to_editor_text());
        }
    }
}
