//! testwright: plain-English test descriptions in, Playwright scripts out.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tw_cli::{
    GenerateOptions, GenerateOutcome, Generated, Pipeline, PipelineError, Settings,
};
use tw_core::chat::ChatSession;
use tw_core::parse::Questionnaire;
use tw_core::provider::{GenerationOverrides, ProviderKind};
use tw_core::suite::TestSuite;
use tw_llm::catalog::{all_models, known_models, ModelInfo};
use tw_llm::{AdapterRouter, LlmError};
use tw_runner::{run_commands, LogEngine, RunOptions, StepStatus};
use tw_store::Store;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "testwright")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plain-English test descriptions in, Playwright scripts out", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/testwright/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a plain-English description into commands and a script
    Generate(GenerateArgs),
    /// Replay a stored suite step by step
    Run(RunArgs),
    /// List, show or export stored suites
    Suites(SuitesArgs),
    /// Probe every configured provider
    Health,
    /// Recorded spend, grouped by provider and model
    Costs,
    /// Models this build knows, with their context limits
    Models(ModelsArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// What the test should do, in plain English
    input: String,
    /// Save the result as a new suite version under this name
    #[arg(long)]
    name: Option<String>,
    /// Continue an existing session instead of starting a fresh one
    #[arg(long, value_name = "UUID")]
    session: Option<String>,
    /// Sampling temperature for this request
    #[arg(long)]
    temperature: Option<f32>,
    /// Completion token cap for this request
    #[arg(long)]
    max_tokens: Option<u32>,
}

#[derive(Args)]
struct RunArgs {
    /// Suite name; the latest version runs unless --version is given
    #[arg(required_unless_present = "id")]
    name: Option<String>,
    /// Replay a specific version instead of the latest
    #[arg(long)]
    version: Option<u32>,
    /// Look the suite up by id instead of name
    #[arg(long, conflicts_with = "name", value_name = "UUID")]
    id: Option<String>,
    /// Log each step instead of driving a browser
    #[arg(long)]
    dry_run: bool,
    /// Per-step timeout in seconds
    #[arg(long, default_value_t = 30)]
    step_timeout: u64,
}

#[derive(Args)]
struct SuitesArgs {
    #[command(subcommand)]
    command: SuitesCommand,
}

#[derive(Subcommand)]
enum SuitesCommand {
    /// Every stored suite, newest version first within a name
    List,
    /// Metadata, commands and script for one suite
    Show {
        name: String,
        #[arg(long)]
        version: Option<u32>,
    },
    /// Write a suite's script to a file
    Export {
        name: String,
        #[arg(long)]
        version: Option<u32>,
        /// Output path (default: <name>.spec.ts)
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ModelsArgs {
    /// Limit the listing to one provider
    #[arg(long)]
    provider: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate(args) => generate(settings, args).await,
        Commands::Run(args) => run(settings, args).await,
        Commands::Suites(args) => suites(settings, args),
        Commands::Health => health(settings).await,
        Commands::Costs => costs(settings),
        Commands::Models(args) => models(args),
    }
}

async fn generate(settings: Settings, args: GenerateArgs) -> Result<()> {
    let pipeline = Pipeline::new(settings).map_err(render_pipeline_error)?;
    let session = match &args.session {
        Some(raw) => {
            let id = Uuid::parse_str(raw)
                .with_context(|| format!("invalid session id '{raw}'"))?;
            ChatSession {
                id,
                ..ChatSession::new()
            }
        }
        None => ChatSession::new(),
    };

    let overrides = (args.temperature.is_some() || args.max_tokens.is_some()).then(|| {
        GenerationOverrides {
            temperature: args.temperature,
            max_tokens: args.max_tokens,
        }
    });
    let options = GenerateOptions {
        suite_name: args.name.clone(),
        overrides,
    };

    let outcome = pipeline.generate(&session, &args.input, &options).await;
    let totals = pipeline.ledger().totals();
    tracing::debug!(
        requests = totals.requests,
        prompt_tokens = totals.prompt_tokens,
        completion_tokens = totals.completion_tokens,
        cost_usd = totals.cost_usd,
        "in-process spend after this call"
    );
    match outcome {
        Ok(GenerateOutcome::Generated(done)) => print_generated(&done, &session),
        Ok(GenerateOutcome::NeedsClarification(questionnaire)) => {
            print_questionnaire(&questionnaire);
            println!("session: {} (pass --session to answer in context)", session.id);
        }
        Ok(GenerateOutcome::Empty) => {
            println!(
                "The model returned no commands and no questions. Try rephrasing with concrete steps."
            );
        }
        Err(error) => return Err(render_pipeline_error(error)),
    }
    Ok(())
}

fn print_generated(done: &Generated, session: &ChatSession) {
    println!("{}", done.script);
    println!(
        "{} commands, confidence {:.2}, via {}/{}",
        done.commands.len(),
        done.confidence,
        done.provider,
        done.model
    );
    if let Some(usage) = &done.usage {
        let cost = done.cost.map(|c| format!(", ${c:.4}")).unwrap_or_default();
        println!(
            "tokens: {} prompt + {} completion{}{}",
            usage.prompt_tokens,
            usage.completion_tokens,
            if usage.estimated { " (estimated)" } else { "" },
            cost
        );
    }
    if let Some(suite) = &done.suite {
        println!("saved '{}' version {} ({})", suite.name, suite.version, suite.id);
    }
    println!("session: {} (pass --session to refine)", session.id);
}

fn print_questionnaire(questionnaire: &Questionnaire) {
    println!("Needs clarification: {}", questionnaire.message);
    for (number, question) in questionnaire.questions.iter().enumerate() {
        println!("  {}. {}", number + 1, question.text);
        if let Some(options) = &question.options {
            for option in options {
                println!("     - {option}");
            }
        }
    }
    println!("Run generate again with the answers folded into the description.");
}

/// The four failure classes read differently on purpose: a user answering a
/// questionnaire, fixing credentials, retrying a flaky backend and reporting
/// a bad model reply are four different next actions.
fn render_pipeline_error(error: PipelineError) -> anyhow::Error {
    match error {
        PipelineError::Llm(LlmError::Unavailable { provider, message }) => {
            anyhow::anyhow!("provider '{provider}' unavailable: {message}")
        }
        PipelineError::Llm(LlmError::ResponseParse { message, raw }) => {
            anyhow::anyhow!("could not parse the model reply: {message}\n--- raw reply ---\n{raw}")
        }
        PipelineError::Llm(LlmError::Configuration(message)) => {
            anyhow::anyhow!("configuration error: {message}")
        }
        PipelineError::Compile(error) => {
            anyhow::anyhow!("generated commands failed validation: {error}")
        }
        PipelineError::Store(error) => anyhow::anyhow!("storage error: {error}"),
    }
}

async fn run(settings: Settings, args: RunArgs) -> Result<()> {
    let store = open_store(&settings)?;
    let suite = match &args.id {
        Some(raw) => {
            let id = Uuid::parse_str(raw)
                .with_context(|| format!("invalid suite id '{raw}'"))?;
            store
                .get_suite(id)?
                .with_context(|| format!("no suite with id {id}"))?
        }
        None => {
            // clap guarantees name is present when id is absent
            let name = args.name.as_deref().unwrap_or_default();
            suite_by_name(&store, name, args.version)?
        }
    };

    if !args.dry_run {
        anyhow::bail!(
            "no browser engine is wired into this build; pass --dry-run to replay through the logging engine"
        );
    }

    println!(
        "replaying '{}' version {} ({} commands)",
        suite.name,
        suite.version,
        suite.commands.len()
    );
    let engine = LogEngine::new();
    let options = RunOptions {
        step_timeout: Duration::from_secs(args.step_timeout),
    };
    let report = run_commands(&engine, &suite.commands, &options).await;

    for step in &report.steps {
        let status = match step.status {
            StepStatus::Passed => "pass",
            StepStatus::Failed => "FAIL",
            StepStatus::Skipped => "skip",
        };
        let detail = step
            .description
            .as_deref()
            .or(step.error.as_deref())
            .unwrap_or_default();
        println!("  {:>3}  {:<4}  {:<10}  {}", step.index + 1, status, step.kind, detail);
        if step.status == StepStatus::Failed {
            if let Some(error) = &step.error {
                println!("       {error}");
            }
        }
    }
    println!(
        "{} passed, {} failed, {} skipped of {}",
        report.passed, report.failed, report.skipped, report.total
    );
    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn suites(settings: Settings, args: SuitesArgs) -> Result<()> {
    let store = open_store(&settings)?;
    match args.command {
        SuitesCommand::List => {
            let all = store.list_suites()?;
            if all.is_empty() {
                println!("no suites stored yet");
                return Ok(());
            }
            println!("{:<28} {:>7}  {:<20}  {}", "NAME", "VERSION", "CREATED", "MODEL");
            for suite in all {
                println!(
                    "{:<28} {:>7}  {:<20}  {}/{}",
                    suite.name,
                    suite.version,
                    suite.created_at.format("%Y-%m-%d %H:%M:%S"),
                    suite.llm_provider,
                    suite.llm_model
                );
            }
        }
        SuitesCommand::Show { name, version } => {
            let suite = suite_by_name(&store, &name, version)?;
            println!("name:      {}", suite.name);
            println!("version:   {}", suite.version);
            println!("id:        {}", suite.id);
            println!("created:   {}", suite.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("model:     {}/{}", suite.llm_provider, suite.llm_model);
            println!("input:     {}", suite.nlp_input);
            println!("commands:");
            for (number, command) in suite.commands.iter().enumerate() {
                let mut parts = vec![command.kind.to_string()];
                if let Some(selector) = &command.selector {
                    parts.push(selector.clone());
                }
                if let Some(value) = &command.value {
                    parts.push(value.clone());
                }
                println!("  {}. {}", number + 1, parts.join(" "));
            }
            println!();
            println!("{}", suite.generated_code);
        }
        SuitesCommand::Export { name, version, out } => {
            let suite = suite_by_name(&store, &name, version)?;
            let path = out.unwrap_or_else(|| {
                PathBuf::from(format!("{}.spec.ts", suite.name.replace(' ', "-")))
            });
            std::fs::write(&path, &suite.generated_code)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!(
                "wrote '{}' version {} to {}",
                suite.name,
                suite.version,
                path.display()
            );
        }
    }
    Ok(())
}

async fn health(settings: Settings) -> Result<()> {
    let router = AdapterRouter::from_settings(&settings.router, None)
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    println!("{:<10} {:<28} {}", "PROVIDER", "MODEL", "STATUS");
    for (position, adapter) in router.adapters().enumerate() {
        let status = if adapter.health_check().await {
            "ok"
        } else {
            "unreachable"
        };
        let marker = if position == 0 { " (primary)" } else { "" };
        println!(
            "{:<10} {:<28} {}{}",
            adapter.kind().to_string(),
            adapter.model(),
            status,
            marker
        );
    }
    Ok(())
}

fn costs(settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let summary = store.cost_summary()?;
    if summary.is_empty() {
        println!("no recorded calls yet");
        return Ok(());
    }
    println!(
        "{:<10} {:<28} {:>8} {:>12} {:>12} {:>10}",
        "PROVIDER", "MODEL", "CALLS", "PROMPT", "COMPLETION", "COST"
    );
    let mut total = 0.0;
    for row in &summary {
        total += row.cost_usd;
        println!(
            "{:<10} {:<28} {:>8} {:>12} {:>12} {:>10}",
            row.provider,
            row.model,
            row.requests,
            row.prompt_tokens,
            row.completion_tokens,
            format!("${:.4}", row.cost_usd)
        );
    }
    println!("total: ${total:.4}");
    Ok(())
}

fn models(args: ModelsArgs) -> Result<()> {
    let listing: Vec<&ModelInfo> = match &args.provider {
        Some(raw) => {
            let kind: ProviderKind = raw
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            known_models(kind).iter().collect()
        }
        None => all_models().collect(),
    };
    println!("{:<10} {:<28} {:>10}  {}", "PROVIDER", "MODEL", "CONTEXT", "NAME");
    for model in listing {
        println!(
            "{:<10} {:<28} {:>10}  {}",
            model.provider.to_string(),
            model.id,
            model.context_tokens,
            model.name
        );
    }
    Ok(())
}

fn open_store(settings: &Settings) -> Result<Store> {
    let path = settings.resolve_database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    Ok(Store::open(&path)?)
}

fn suite_by_name(store: &Store, name: &str, version: Option<u32>) -> Result<TestSuite> {
    let found = match version {
        Some(wanted) => store
            .list_suites()?
            .into_iter()
            .find(|s| s.name == name && s.version == wanted),
        None => store.latest_suite(name)?,
    };
    found.with_context(|| match version {
        Some(wanted) => format!("no suite named '{name}' with version {wanted}"),
        None => format!("no suite named '{name}'"),
    })
}
