//! `vesper` - command-line harness for the hybrid router.
//!
//! Exit codes: 0 success, 1 policy denied, 2 offline with no local
//! route, 3 system busy, 4 upstream error after retries, 5 invalid
//! input.

#![deny(unsafe_code)]
#![deny(clippy::all)]

mod echo_runtime;

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::debug;

use vesper_audit::{AuditLog, FileAuditStorage};
use vesper_config::RouterConfig;
use vesper_core::{ChannelId, CloudProviderKind, ExecutionHint, Prompt, RouterError};
use vesper_creds::{CredentialStore, FileCredentialStore, MemoryCredentialStore, Secret};
use vesper_crypto::MemoryKeystore;
use vesper_exec::{HybridRouter, RouterPorts};
use vesper_llm::{ReqwestTransport, StreamEvent};
use vesper_probe::{MonitorConfig, StaticSensors, SystemSensors};

use echo_runtime::EchoRuntime;

#[derive(Parser)]
#[command(name = "vesper", about = "Hybrid inference router", version)]
struct Cli {
    /// Configuration file path.
    #[arg(long, env = "VESPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a prompt through the router.
    Run {
        /// The prompt text.
        prompt: String,
        /// Require local execution.
        #[arg(long, conflicts_with = "cloud")]
        local: bool,
        /// Require cloud execution.
        #[arg(long)]
        cloud: bool,
        /// Allow non-sovereign public cloud providers.
        #[arg(long)]
        allow_public_cloud: bool,
        /// Output token budget.
        #[arg(long)]
        token_budget: Option<u32>,
        /// Submission channel name.
        #[arg(long, default_value = "interactive")]
        channel: String,
        /// Engage lockdown before executing.
        #[arg(long)]
        lockdown: bool,
        /// Stream chunks as they arrive instead of waiting.
        #[arg(long)]
        stream: bool,
    },

    /// Verify the audit chain on disk.
    AuditVerify {
        /// Audit directory.
        #[arg(long)]
        dir: PathBuf,
    },

    /// Manage provider credentials.
    Creds {
        #[command(subcommand)]
        action: CredsAction,
    },
}

#[derive(Subcommand)]
enum CredsAction {
    /// Store a credential (secret read from stdin).
    Set {
        /// Provider id (anthropic, openai, google).
        provider: String,
    },
    /// Delete a credential.
    Rm {
        /// Provider id.
        provider: String,
    },
    /// List providers with stored credentials.
    Ls,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RouterConfig> {
    match path {
        Some(path) => Ok(vesper_config::load(path)?),
        None => {
            let default_path = vesper_config::config_dir().map(|dir| dir.join("vesper.toml"));
            match default_path {
                Some(path) => Ok(vesper_config::load(path)?),
                None => Ok(RouterConfig::default()),
            }
        },
    }
}

fn open_credentials(config: &RouterConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match &config.credentials_file {
        Some(path) => Ok(Arc::new(FileCredentialStore::open(path)?)),
        None => {
            let default_path = vesper_config::config_dir().map(|dir| dir.join("credentials.toml"));
            match default_path {
                Some(path) => Ok(Arc::new(FileCredentialStore::open(path)?)),
                None => Ok(Arc::new(MemoryCredentialStore::new())),
            }
        },
    }
}

fn parse_provider(id: &str) -> anyhow::Result<CloudProviderKind> {
    CloudProviderKind::from_id(id)
        .ok_or_else(|| anyhow::anyhow!("unknown provider {id}; expected anthropic|openai|google"))
}

async fn cmd_run(
    config: RouterConfig,
    prompt_text: String,
    hint: ExecutionHint,
    channel: String,
    lockdown: bool,
    stream: bool,
) -> anyhow::Result<i32> {
    let credentials = open_credentials(&config)?;
    let router = HybridRouter::start(
        RouterPorts {
            runtime: Arc::new(EchoRuntime::new()),
            transport: Arc::new(ReqwestTransport::new().map_err(|e| anyhow::anyhow!("{e}"))?),
            credentials,
            keystore: Arc::new(MemoryKeystore::default()),
            sensors: Arc::new(StaticSensors::healthy()) as Arc<dyn SystemSensors>,
            monitors: MonitorConfig::default(),
        },
        config,
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    if lockdown {
        router.engage_lockdown();
    }

    let channel = ChannelId::new(channel);
    let prompt = Prompt::with_hint(prompt_text, hint);

    if stream {
        let (_cancel, mut events) = router.execute_streaming(&channel, prompt);
        let mut failure: Option<RouterError> = None;
        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::Text(chunk)) => {
                    print!("{chunk}");
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                },
                Ok(StreamEvent::Finish { reason }) => {
                    debug!(reason, "stream finished");
                },
                Ok(_) => {},
                Err(err) => failure = Some(err),
            }
        }
        println!();
        match failure {
            None => Ok(0),
            Some(err) => {
                eprintln!("{}", err.user_message());
                Ok(err.exit_code())
            },
        }
    } else {
        match router.execute(&channel, prompt).await {
            Ok(result) => {
                println!("{}", result.output);
                debug!(
                    location = %result.location,
                    tokens = result.tokens_used.total(),
                    redacted = result.redaction_applied,
                    "execution completed"
                );
                Ok(0)
            },
            Err(err) => {
                eprintln!("{}", err.user_message());
                Ok(err.exit_code())
            },
        }
    }
}

fn cmd_audit_verify(dir: &Path) -> anyhow::Result<i32> {
    let storage = FileAuditStorage::open(dir)?;
    match AuditLog::open(Box::new(storage)) {
        Ok(log) => {
            let report = log.verify_chain()?;
            println!(
                "chain: {} entries, {}",
                report.length,
                if report.valid { "valid" } else { "BROKEN" }
            );
            for issue in &report.issues {
                eprintln!("  seq {}: {}", issue.seq, issue.detail);
            }
            Ok(if report.valid { 0 } else { 4 })
        },
        Err(err) => {
            eprintln!("audit chain refused: {err}");
            Ok(4)
        },
    }
}

fn cmd_creds(config: &RouterConfig, action: &CredsAction) -> anyhow::Result<i32> {
    let store = open_credentials(config)?;
    match action {
        CredsAction::Set { provider } => {
            let provider = parse_provider(provider)?;
            let mut secret = String::new();
            std::io::stdin().read_to_string(&mut secret)?;
            let secret = secret.trim();
            if secret.is_empty() {
                anyhow::bail!("empty secret on stdin");
            }
            store.put(provider, Secret::new(secret))?;
            println!("stored credential for {provider}");
            Ok(0)
        },
        CredsAction::Rm { provider } => {
            let provider = parse_provider(provider)?;
            store.delete(provider)?;
            println!("deleted credential for {provider}");
            Ok(0)
        },
        CredsAction::Ls => {
            for provider in CloudProviderKind::ALL {
                if store.has(provider).unwrap_or(false) {
                    println!("{provider}");
                }
            }
            Ok(0)
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = run(cli).await;
    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(4)),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(4)
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Run {
            prompt,
            local,
            cloud,
            allow_public_cloud,
            token_budget,
            channel,
            lockdown,
            stream,
        } => {
            let hint = ExecutionHint {
                allow_public_cloud,
                force_local: local,
                force_cloud: cloud,
                token_budget,
            };
            cmd_run(config, prompt, hint, channel, lockdown, stream).await
        },
        Command::AuditVerify { dir } => cmd_audit_verify(&dir),
        Command::Creds { action } => cmd_creds(&config, &action),
    }
}
