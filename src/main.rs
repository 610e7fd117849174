use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use veris::cli::output::Output;
use veris::cli::{init, Cli, Commands, SessionCommands};
use veris::db::{JsonFileSessionStore, SessionStore};
use veris::research::ResearchOrchestrator;
use veris::utils::config::{LoggingConfig, VerisConfig};
use veris::AppError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Init {
            path,
            force,
            provider,
        } => match init::run(init::InitConfig { path, force, provider }, &output) {
            init::InitResult::Success | init::InitResult::AlreadyExists => Ok(()),
            init::InitResult::Error(e) => bail!(e),
        },
        command => {
            let config = VerisConfig::load_or_default(&cli.config)
                .with_context(|| format!("loading {}", cli.config.display()))?;
            init_logging(&config.logging, cli.verbose)?;
            run_command(Arc::new(config), &cli.config, &output, command).await
        }
    }
}

async fn run_command(
    config: Arc<VerisConfig>,
    config_path: &Path,
    output: &Output,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Init { .. } => Ok(()),
        Commands::Research {
            query,
            no_web,
            no_rag,
            docs,
            json,
        } => research(config, output, query, !no_web, !no_rag, docs, json).await,
        Commands::Sessions(command) => sessions(&config, output, command).await,
        Commands::Config { validate } => show_config(&config, config_path, output, validate),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_logging(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

async fn research(
    config: Arc<VerisConfig>,
    output: &Output,
    query: String,
    use_web: bool,
    use_rag: bool,
    docs: Vec<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    config.validate_env()?;
    let orchestrator = ResearchOrchestrator::from_config(config).await?;

    if !docs.is_empty() {
        let mut documents = Vec::with_capacity(docs.len());
        for path in &docs {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            documents.push((path.display().to_string(), text));
        }
        let summary = orchestrator.load_named_documents(&documents).await?;
        if !json {
            output.info(&format!(
                "Indexed {} documents ({} chunks, {} failed)",
                summary.documents, summary.chunks, summary.failed
            ));
        }
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match orchestrator
        .run_with_cancellation(&query, use_web, use_rag, cancel)
        .await
    {
        Ok(run) if json => {
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(())
        }
        Ok(run) => {
            output.run(&run);
            Ok(())
        }
        Err(failure) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                output.failure(&failure);
            }
            Err(failure.into())
        }
    }
}

async fn sessions(config: &VerisConfig, output: &Output, command: SessionCommands) -> anyhow::Result<()> {
    let store = JsonFileSessionStore::new(&config.sessions.path);

    match command {
        SessionCommands::List { limit } => {
            output.header("Recent sessions");
            output.sessions(&store.list_recent(limit).await?);
        }
        SessionCommands::Show { id, json } => match store.load(&id).await {
            Ok(run) if json => println!("{}", serde_json::to_string_pretty(&run)?),
            Ok(run) => output.run(&run),
            Err(AppError::NotFound(_)) => bail!("no session with id {}", id),
            Err(e) => return Err(e.into()),
        },
        SessionCommands::Delete { id } => {
            if store.delete(&id).await? {
                output.success(&format!("Deleted session {}", id));
            } else {
                output.warning(&format!("No session with id {}", id));
            }
        }
    }
    Ok(())
}

fn show_config(config: &VerisConfig, path: &Path, output: &Output, validate: bool) -> anyhow::Result<()> {
    if validate {
        config.validate()?;
        match config.validate_env() {
            Ok(()) => output.success(&format!("{} is valid", path.display())),
            Err(e) => output.warning(&e.to_string()),
        }
        return Ok(());
    }

    output.kv("file", &path.display().to_string());
    println!("\n{}", toml::to_string_pretty(config)?);
    Ok(())
}
