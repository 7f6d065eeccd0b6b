use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hookflow_core::config::AppConfig;
use hookflow_core::types::{TriggerInput, Workflow};
use hookflow_engine::{find_start_node, Collaborators, Executor, WorkflowRunner};
use hookflow_services::{CloudinaryUploader, ReqwestTransport};
use hookflow_store::MemoryStore;

const DEFAULT_LOG_FILTER: &str = "hookflow=info,warn";

#[derive(Parser)]
#[command(name = "hookflow", version, about = "Run exported webhook workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "hookflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file once
    Run {
        /// Exported workflow JSON
        workflow: PathBuf,
        #[command(flatten)]
        trigger: TriggerArgs,
        /// Print the full run (context and trace) instead of the response
        #[arg(long)]
        trace: bool,
    },
    /// Dispatch a payload to the stored workflow listening on a webhook path or id
    Webhook {
        /// Webhook path or webhook id
        id: String,
        #[command(flatten)]
        trigger: TriggerArgs,
    },
    /// Check a workflow file without running it
    Validate {
        workflow: PathBuf,
    },
    /// List stored workflows
    List,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct TriggerArgs {
    /// JSON body file (`-` reads stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Request header, `name=value` (repeatable)
    #[arg(long = "header", value_parser = parse_pair)]
    headers: Vec<(String, String)>,
    /// Query parameter, `name=value` (repeatable)
    #[arg(long = "query", value_parser = parse_pair)]
    query: Vec<(String, String)>,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "hookflow", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", json!({ "ok": false, "error": format!("{:#}", e) }));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_default(&cli.config)?;
    config.apply_env_fallbacks();
    init_tracing(&config);

    match cli.command {
        Commands::Run {
            workflow,
            trigger,
            trace,
        } => {
            let wf = read_workflow(&workflow).await?;
            for warning in wf.validate()? {
                warn!(workflow = %workflow.display(), "{}", warning);
            }
            let input = trigger.into_input().await?;
            let executor = Executor::new(collaborators(&config)?, config.engine.clone());
            let result = executor.execute(&wf, input).await?;
            if trace {
                print_json(&serde_json::to_value(&result)?)?;
            } else {
                print_json(&result.final_payload())?;
            }
        }
        Commands::Webhook { id, trigger } => {
            let input = trigger.into_input().await?;
            let runner = workflow_runner(&cli.config, &config).await?;
            let reply = runner.handle_webhook(&id, input).await?;
            info!(webhook = %id, responded = reply.responded, "Webhook handled");
            print_json(&reply.body)?;
        }
        Commands::Validate { workflow } => {
            let wf = read_workflow(&workflow).await?;
            let warnings = wf.validate()?;
            let start = find_start_node(&wf)?;
            print_json(&json!({
                "ok": true,
                "nodes": wf.nodes.len(),
                "start": start.name,
                "warnings": warnings,
            }))?;
        }
        Commands::List => {
            let runner = workflow_runner(&cli.config, &config).await?;
            let listed: Vec<Value> = runner
                .list()
                .await?
                .iter()
                .map(|wf| {
                    json!({
                        "id": wf.id,
                        "name": wf.name,
                        "nodes": wf.nodes.len(),
                    })
                })
                .collect();
            print_json(&Value::Array(listed))?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => {}
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let fallback = config.log_filter().unwrap_or(DEFAULT_LOG_FILTER);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn collaborators(config: &AppConfig) -> anyhow::Result<Collaborators> {
    Ok(Collaborators {
        http: Arc::new(ReqwestTransport::new()?),
        upload: Arc::new(CloudinaryUploader::new(config.upload.clone())),
        chat: hookflow_llm::create_client(&config.llm),
    })
}

async fn workflow_runner(config_path: &Path, config: &AppConfig) -> anyhow::Result<WorkflowRunner> {
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dir = config.workflows_dir(base);
    let store = MemoryStore::from_dir(&dir, &config.store.key_prefix)
        .await
        .with_context(|| format!("loading workflows from {}", dir.display()))?;

    let executor = Executor::new(collaborators(config)?, config.engine.clone());
    Ok(WorkflowRunner::new(Arc::new(store), executor).with_prefix(config.store.key_prefix.clone()))
}

async fn read_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(Workflow::from_json_str(&text)?)
}

impl TriggerArgs {
    async fn into_input(self) -> anyhow::Result<TriggerInput> {
        let body = match &self.input {
            None => Value::Null,
            Some(path) if path.as_os_str() == "-" => {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                parse_body(&text)?
            }
            Some(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                parse_body(&text)?
            }
        };
        Ok(TriggerInput {
            body,
            headers: self.headers.into_iter().collect::<HashMap<_, _>>(),
            query: self.query.into_iter().collect::<HashMap<_, _>>(),
        })
    }
}

fn parse_body(text: &str) -> anyhow::Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).context("input is not valid JSON")
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
