//! Turns parsed flags into live clients and the gateway configuration.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gitpilot_ai::{
    azure_deployment_api_base, LlmClient, OpenAiAuthScheme, OpenAiClient, OpenAiConfig,
};
use gitpilot_fetch::{ContentFetcher, FetchConfig};
use gitpilot_gateway::{ChatToolRegistrarFn, GatewayServerConfig};
use gitpilot_github::{GithubClient, GithubClientConfig};
use gitpilot_tools::{gitpilot_tool_names, register_gitpilot_tools, GitpilotToolkit};
use thiserror::Error;

use crate::cli_args::{Cli, CliLlmService};

const MODEL_MAX_RETRIES: usize = 2;

#[derive(Debug, Error)]
pub(crate) enum ConfigurationError {
    #[error("{name} is not set and secret file {path} could not be read: {reason}")]
    MissingSecret {
        name: &'static str,
        path: String,
        reason: String,
    },
    #[error("{name} is set but empty (secret file {path})")]
    EmptySecret { name: &'static str, path: String },
    #[error("{0} is required when GLOBAL_LLM_SERVICE is AzureOpenAI")]
    MissingAzureSetting(&'static str),
}

/// Flag or env value when present, otherwise the trimmed contents of the mounted secret file.
pub(crate) fn resolve_secret(
    name: &'static str,
    value: Option<&str>,
    secret_file: &Path,
) -> Result<String, ConfigurationError> {
    if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(value.to_string());
    }
    let contents =
        std::fs::read_to_string(secret_file).map_err(|error| ConfigurationError::MissingSecret {
            name,
            path: secret_file.display().to_string(),
            reason: error.to_string(),
        })?;
    let secret = contents.trim();
    if secret.is_empty() {
        return Err(ConfigurationError::EmptySecret {
            name,
            path: secret_file.display().to_string(),
        });
    }
    Ok(secret.to_string())
}

fn required_setting(
    value: Option<&str>,
    name: &'static str,
) -> Result<String, ConfigurationError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ConfigurationError::MissingAzureSetting(name))
}

/// Model client settings and the model id sent with each request.
pub(crate) fn model_client_config(
    cli: &Cli,
    api_key: String,
) -> Result<(OpenAiConfig, String), ConfigurationError> {
    match cli.llm_service {
        CliLlmService::AzureOpenAi => {
            let endpoint = required_setting(
                cli.azure_openai_endpoint.as_deref(),
                "AZURE_OPENAI_ENDPOINT",
            )?;
            let deployment = required_setting(
                cli.azure_openai_deployment.as_deref(),
                "AZURE_OPENAI_CHAT_DEPLOYMENT_NAME",
            )?;
            let config = OpenAiConfig {
                api_base: azure_deployment_api_base(&endpoint, &deployment),
                api_key,
                request_timeout_ms: cli.request_timeout_ms,
                max_retries: MODEL_MAX_RETRIES,
                auth_scheme: OpenAiAuthScheme::ApiKeyHeader,
                api_version: Some(cli.azure_openai_api_version.clone()),
            };
            Ok((config, deployment))
        }
        CliLlmService::OpenAi => {
            let config = OpenAiConfig {
                api_base: cli.openai_api_base.clone(),
                api_key,
                request_timeout_ms: cli.request_timeout_ms,
                max_retries: MODEL_MAX_RETRIES,
                auth_scheme: OpenAiAuthScheme::Bearer,
                api_version: None,
            };
            Ok((config, cli.model.clone()))
        }
    }
}

fn build_toolkit(cli: &Cli, github_token: String) -> Result<GitpilotToolkit> {
    let github = GithubClient::new(GithubClientConfig {
        api_base: cli.github_api_base.clone(),
        token: github_token,
        request_timeout_ms: cli.github_timeout_ms,
        ..GithubClientConfig::default()
    })
    .context("failed to build GitHub client")?;
    let fetcher = ContentFetcher::new(FetchConfig {
        timeout_ms: cli.fetch_timeout_ms,
        ..FetchConfig::default()
    })
    .context("failed to build content fetcher")?;
    Ok(GitpilotToolkit::new(github, fetcher))
}

/// Resolves secrets and builds every client; any configuration problem aborts here.
pub(crate) fn build_gateway_config(cli: &Cli) -> Result<GatewayServerConfig> {
    let api_key = resolve_secret("AZURE_OPENAI_API_KEY", cli.api_key.as_deref(), &cli.api_key_file)?;
    let github_token = resolve_secret(
        "GITHUB_TOKEN_GEN_AI",
        cli.github_token.as_deref(),
        &cli.github_token_file,
    )?;

    let (model_config, model) = model_client_config(cli, api_key)?;
    let client: Arc<dyn LlmClient> =
        Arc::new(OpenAiClient::new(model_config).context("failed to build model client")?);
    let toolkit = build_toolkit(cli, github_token)?;

    tracing::info!(
        service = ?cli.llm_service,
        model = %model,
        tools = gitpilot_tool_names().len(),
        "gitpilot configured"
    );

    Ok(GatewayServerConfig {
        client,
        model,
        system_prompt: cli.system_prompt.clone(),
        max_turns: cli.max_turns,
        tool_registrar: Arc::new(ChatToolRegistrarFn::new(move |agent| {
            register_gitpilot_tools(agent, &toolkit);
        })),
        turn_timeout_ms: cli.turn_timeout_ms,
        bind: cli.bind.clone(),
        static_dir: cli.static_dir.clone(),
        max_input_chars: cli.max_input_chars,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;
    use gitpilot_agent_core::{Agent, AgentConfig};
    use gitpilot_ai::OpenAiAuthScheme;
    use gitpilot_gateway::ChatToolRegistrar;
    use gitpilot_tools::gitpilot_tool_names;

    use super::{build_gateway_config, model_client_config, resolve_secret, ConfigurationError};
    use crate::cli_args::Cli;

    #[test]
    fn unit_explicit_secret_wins_over_file() {
        let secret =
            resolve_secret("TOKEN", Some("  from-env \n"), Path::new("/definitely/missing"))
                .expect("secret");
        assert_eq!(secret, "from-env");
    }

    #[test]
    fn functional_secret_file_is_read_and_trimmed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("TOKEN");
        std::fs::write(&path, "file-secret\n").expect("write secret");

        assert_eq!(
            resolve_secret("TOKEN", None, &path).expect("secret"),
            "file-secret"
        );
        assert_eq!(
            resolve_secret("TOKEN", Some("   "), &path).expect("secret"),
            "file-secret"
        );
    }

    #[test]
    fn regression_missing_or_blank_secret_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = resolve_secret("TOKEN", None, &dir.path().join("absent"));
        assert!(matches!(
            missing,
            Err(ConfigurationError::MissingSecret { name: "TOKEN", .. })
        ));

        let blank_path = dir.path().join("blank");
        std::fs::write(&blank_path, " \n").expect("write blank");
        assert!(matches!(
            resolve_secret("TOKEN", None, &blank_path),
            Err(ConfigurationError::EmptySecret { .. })
        ));
    }

    #[test]
    fn functional_azure_mode_targets_the_deployment_with_api_key_header() {
        let cli = Cli::try_parse_from([
            "gitpilot",
            "--llm-service",
            "AzureOpenAI",
            "--azure-openai-endpoint",
            "https://example.openai.azure.com/",
            "--azure-openai-deployment",
            "chat-prod",
            "--azure-openai-api-version",
            "2024-10-21",
        ])
        .expect("parse");

        let (config, model) = model_client_config(&cli, "key".to_string()).expect("config");
        assert_eq!(model, "chat-prod");
        assert_eq!(config.auth_scheme, OpenAiAuthScheme::ApiKeyHeader);
        assert_eq!(config.api_version.as_deref(), Some("2024-10-21"));
        assert!(config
            .api_base
            .ends_with("/openai/deployments/chat-prod"));
    }

    #[test]
    fn regression_azure_mode_requires_endpoint_and_deployment() {
        let cli = Cli::try_parse_from([
            "gitpilot",
            "--llm-service",
            "AzureOpenAI",
            "--azure-openai-endpoint",
            "https://example.openai.azure.com",
            "--azure-openai-deployment",
            "  ",
        ])
        .expect("parse");
        assert!(matches!(
            model_client_config(&cli, "key".to_string()),
            Err(ConfigurationError::MissingAzureSetting(
                "AZURE_OPENAI_CHAT_DEPLOYMENT_NAME"
            ))
        ));
    }

    #[test]
    fn integration_openai_mode_builds_gateway_config_with_all_tools() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = Cli::try_parse_from([
            "gitpilot",
            "--llm-service",
            "OpenAI",
            "--model",
            "gpt-test",
            "--api-key",
            "sk-test",
            "--github-token",
            "ghp-test",
            "--static-dir",
            dir.path().to_str().expect("utf8 path"),
            "--bind",
            "127.0.0.1:0",
        ])
        .expect("parse");

        let config = build_gateway_config(&cli).expect("gateway config");
        assert_eq!(config.model, "gpt-test");
        assert_eq!(config.bind, "127.0.0.1:0");
        assert_eq!(config.static_dir, dir.path());

        let mut agent = Agent::new(config.client.clone(), AgentConfig::default());
        config.tool_registrar.register(&mut agent);
        assert_eq!(
            agent.registered_tool_names().len(),
            gitpilot_tool_names().len()
        );
    }
}
