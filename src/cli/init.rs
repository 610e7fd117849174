//! `veris init`: scaffold a configuration file and environment template.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

pub enum InitResult {
    Success,
    /// veris.toml exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

pub struct InitConfig {
    pub path: PathBuf,
    pub force: bool,
    /// `ollama` or `openai`
    pub provider: String,
}

pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Veris");

    let base = &config.path;
    let config_path = base.join("veris.toml");
    if config_path.exists() && !config.force {
        output.warning("veris.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let sessions_dir = base.join("data").join("sessions");
    if sessions_dir.exists() {
        output.skipped("data/sessions", "already exists");
    } else if let Err(e) = fs::create_dir_all(&sessions_dir) {
        output.error(&format!("Failed to create data/sessions: {}", e));
        return InitResult::Error(e.to_string());
    } else {
        output.created("directory", "data/sessions");
    }

    let files = [
        ("veris.toml", generate_veris_toml(&config.provider)),
        (".env.example", generate_env_example()),
    ];
    for (name, content) in &files {
        if let Err(e) = write_file(&base.join(name), content, config.force) {
            output.error(&format!("Failed to create {}: {}", name, e));
            return InitResult::Error(e.to_string());
        }
        output.created("file", name);
    }

    output.success("Veris initialized");
    output.header("Next Steps");
    output.info("Copy the environment template and fill in any keys:");
    output.command("cp .env.example .env");
    if config.provider == "openai" {
        output.info("Set OPENAI_API_KEY in .env");
    } else {
        output.info("Start Ollama and pull the configured model:");
        output.command("ollama pull llama3.2");
    }
    output.info("Ask a question:");
    output.command("veris research \"How does caffeine affect sleep?\"");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_veris_toml(provider: &str) -> String {
    let llm = if provider == "openai" {
        r#"[llm]
provider = "openai"
model = "gpt-4o-mini"
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY""#
    } else {
        r#"[llm]
provider = "ollama"
model = "llama3.2"
base_url = "http://localhost:11434""#
    };

    format!(
        r#"# Veris configuration. Every section and field is optional.

{llm}

[search]
# duckduckgo (no key), tavily (TAVILY_API_KEY) or none
provider = "duckduckgo"
api_key_env = "TAVILY_API_KEY"

[search.max_results]
simple = 3
moderate = 5
complex = 8

[rag]
# hash (deterministic, offline) or fastembed (needs the local-embeddings feature)
embedder = "hash"
chunk_size = 200
chunk_overlap = 40
embedding_dimensions = 256
min_similarity = 0.05

[rag.top_k]
simple = 3
moderate = 5
complex = 8

[pipeline]
claim_similarity_threshold = 0.6
max_sections = 6
persist_sessions = true

[retry]
call_timeout_secs = 30
max_retries = 2
base_delay_ms = 1000
backoff_multiplier = 2.0

[sessions]
path = "./data/sessions"

[logging]
level = "info"
json = false
"#
    )
}

fn generate_env_example() -> String {
    r#"# Veris environment variables. Copy to .env and fill in what you use.

# Log filter, overrides [logging].level
# RUST_LOG=info,veris=debug

# OpenAI or compatible completion API
# OPENAI_API_KEY=sk-...

# Tavily web search
# TAVILY_API_KEY=tvly-...
"#
    .to_string()
}
