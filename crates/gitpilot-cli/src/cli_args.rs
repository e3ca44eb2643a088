use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub(crate) const DEFAULT_SYSTEM_PROMPT: &str = "You are gitpilot, an assistant that manages GitHub repositories and reads web pages for the user. \
Use the provided tools to read, create, update, rename and delete repository files, manage README files and GitHub Actions workflows, \
and fetch web content. Report tool failures plainly instead of guessing.";

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliLlmService {
    #[value(name = "AzureOpenAI")]
    AzureOpenAi,
    #[value(name = "OpenAI")]
    OpenAi,
}

#[derive(Debug, Parser)]
#[command(
    name = "gitpilot",
    about = "HTTP chat backend that lets a hosted model manage GitHub repositories and fetch web content",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long = "bind",
        env = "GITPILOT_BIND",
        default_value = "0.0.0.0:8000",
        help = "Socket address the HTTP server listens on (host:port)"
    )]
    pub(crate) bind: String,

    #[arg(
        long = "llm-service",
        env = "GLOBAL_LLM_SERVICE",
        value_enum,
        ignore_case = true,
        default_value = "AzureOpenAI",
        help = "Hosted chat service to call"
    )]
    pub(crate) llm_service: CliLlmService,

    #[arg(
        long = "azure-openai-endpoint",
        env = "AZURE_OPENAI_ENDPOINT",
        help = "Azure OpenAI resource endpoint, e.g. https://example.openai.azure.com"
    )]
    pub(crate) azure_openai_endpoint: Option<String>,

    #[arg(
        long = "azure-openai-deployment",
        env = "AZURE_OPENAI_CHAT_DEPLOYMENT_NAME",
        help = "Azure OpenAI chat deployment name"
    )]
    pub(crate) azure_openai_deployment: Option<String>,

    #[arg(
        long = "azure-openai-api-version",
        env = "AZURE_OPENAI_API_VERSION",
        default_value = "2024-10-21"
    )]
    pub(crate) azure_openai_api_version: String,

    #[arg(
        long = "api-key",
        env = "AZURE_OPENAI_API_KEY",
        hide_env_values = true,
        help = "Model service API key; read from --api-key-file when unset"
    )]
    pub(crate) api_key: Option<String>,

    #[arg(
        long = "api-key-file",
        env = "AZURE_OPENAI_API_KEY_FILE",
        default_value = "/run/secrets/AZURE_OPENAI_API_KEY"
    )]
    pub(crate) api_key_file: PathBuf,

    #[arg(
        long = "openai-api-base",
        env = "OPENAI_API_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub(crate) openai_api_base: String,

    #[arg(
        long = "model",
        env = "GITPILOT_MODEL",
        default_value = "gpt-4o-mini",
        help = "Model id for --llm-service OpenAI; Azure uses the deployment name"
    )]
    pub(crate) model: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN_GEN_AI",
        hide_env_values = true,
        help = "GitHub token; read from --github-token-file when unset"
    )]
    pub(crate) github_token: Option<String>,

    #[arg(
        long = "github-token-file",
        env = "GITHUB_TOKEN_GEN_AI_FILE",
        default_value = "/run/secrets/GITHUB_TOKEN_GEN_AI"
    )]
    pub(crate) github_token_file: PathBuf,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_BASE",
        default_value = "https://api.github.com"
    )]
    pub(crate) github_api_base: String,

    #[arg(long = "static-dir", env = "GITPILOT_STATIC_DIR", default_value = "static")]
    pub(crate) static_dir: PathBuf,

    #[arg(
        long = "system-prompt",
        env = "GITPILOT_SYSTEM_PROMPT",
        default_value = DEFAULT_SYSTEM_PROMPT,
        hide_default_value = true
    )]
    pub(crate) system_prompt: String,

    #[arg(
        long = "max-turns",
        env = "GITPILOT_MAX_TURNS",
        default_value_t = 8,
        value_parser = parse_positive_usize,
        help = "Model round-trips allowed per chat request"
    )]
    pub(crate) max_turns: usize,

    #[arg(
        long = "turn-timeout-ms",
        env = "GITPILOT_TURN_TIMEOUT_MS",
        default_value_t = 0,
        help = "Timeout for one chat request in milliseconds; 0 disables it"
    )]
    pub(crate) turn_timeout_ms: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "GITPILOT_REQUEST_TIMEOUT_MS",
        default_value_t = 120_000,
        value_parser = parse_positive_u64
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "github-timeout-ms",
        env = "GITPILOT_GITHUB_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64
    )]
    pub(crate) github_timeout_ms: u64,

    #[arg(
        long = "fetch-timeout-ms",
        env = "GITPILOT_FETCH_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64
    )]
    pub(crate) fetch_timeout_ms: u64,

    #[arg(
        long = "max-input-chars",
        env = "GITPILOT_MAX_INPUT_CHARS",
        default_value_t = 32_000,
        value_parser = parse_positive_usize,
        help = "Maximum prompt size accepted by /demoprompt"
    )]
    pub(crate) max_input_chars: usize,
}
