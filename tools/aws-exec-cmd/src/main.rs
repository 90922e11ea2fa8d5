/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use anyhow::{Context, Result};
use aws_exec_auth_providers::broker::{BrokerConfig, CredentialBroker, MfaSource};
use aws_exec_auth_providers::identity_pool::IdentityPoolProvider;
use aws_exec_auth_providers::role_chain::RoleChainProvider;
use aws_exec_auth_providers::Provider;
use aws_exec_credential_types::Credentials;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use terminal::{InteractionGate, TerminalPrompt};
use tracing_subscriber::EnvFilter;

mod exec;
mod terminal;

#[derive(Debug, Parser)]
#[clap(
    name = "aws-exec-cmd",
    version,
    about = "Run a command with temporary AWS credentials"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Acquire credentials by assuming a chain of roles
    Role(RoleArgs),
    /// Acquire credentials from a Cognito identity pool
    Idp(IdpArgs),
}

/// Cache and MFA settings shared by all sub-commands
#[derive(Debug, Args)]
struct BrokerArgs {
    /// Directory of cached credentials [default: ~/.cage-aws-cache]
    #[clap(long, env = "AWS_EXEC_CMD_CACHE_DIR", parse(from_os_str))]
    cache_dir: Option<PathBuf>,

    /// Ignore cached credentials. Fresh credentials are still cached.
    #[clap(long, env = "AWS_EXEC_CMD_CACHE_SKIP")]
    cache_skip: bool,

    /// MFA device serial number or virtual device ARN
    #[clap(long, env = "AWS_EXEC_CMD_MFA_SERIAL")]
    mfa_serial: Option<String>,

    /// Where to read the MFA code: `prompt`, or the name of an environment variable
    #[clap(long, env = "AWS_EXEC_CMD_MFA_SOURCE", default_value = "prompt")]
    mfa_source: MfaSource,

    /// Session lifetime in seconds
    #[clap(
        long,
        env = "AWS_EXEC_CMD_SESSION_TTL",
        default_value = "900",
        parse(try_from_str = parse_session_ttl)
    )]
    session_ttl: u64,
}

impl BrokerArgs {
    fn into_config(self, role_chain: String) -> BrokerConfig {
        BrokerConfig {
            cache_dir: self.cache_dir,
            cache_skip: self.cache_skip,
            mfa_serial: self.mfa_serial,
            mfa_source: self.mfa_source,
            role_chain,
            session_ttl: Duration::from_secs(self.session_ttl),
        }
    }
}

/// STS takes the session duration as a 32-bit signed integer
fn parse_session_ttl(value: &str) -> Result<u64, String> {
    let secs: u64 = value.parse().map_err(|err| format!("{}", err))?;
    if secs > i32::MAX as u64 {
        return Err(format!("must be at most {} seconds", i32::MAX));
    }
    Ok(secs)
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// Run the command in a pseudo-terminal
    #[clap(long, env = "AWS_EXEC_CMD_PTY")]
    pty: bool,

    /// Seconds to wait for a command not run with --pty to finish, 0 to wait forever
    #[clap(long, env = "AWS_EXEC_CMD_TIMEOUT", default_value = "0")]
    timeout: u64,

    /// Command to run, after `--`
    #[clap(last = true, required = true)]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct RoleArgs {
    #[clap(flatten)]
    broker: BrokerArgs,

    /// Comma separated role ARNs. The first link may instead be `instance` or `env-triple`.
    #[clap(long, env = "AWS_EXEC_CMD_CHAIN")]
    chain: String,

    /// Seconds allowed for assuming every role in the chain, 0 for no limit
    #[clap(long, env = "AWS_EXEC_CMD_CHAIN_TIMEOUT", default_value = "0")]
    chain_timeout: u64,

    #[clap(flatten)]
    exec: ExecArgs,
}

#[derive(Debug, Args)]
struct IdpArgs {
    #[clap(flatten)]
    broker: BrokerArgs,

    /// Identity pool ID
    #[clap(long, env = "AWS_EXEC_CMD_POOL_ID")]
    pool_id: String,

    /// Login provider name, e.g. accounts.google.com
    #[clap(long, env = "AWS_EXEC_CMD_NAME")]
    name: String,

    /// Provider ID token, e.g. a Google id_token
    #[clap(long, env = "AWS_EXEC_CMD_TOKEN")]
    token: Option<String>,

    /// Provider refresh token, exchanged for an ID token
    #[clap(long, env = "AWS_EXEC_CMD_REFRESH")]
    refresh: Option<String>,

    /// OAuth client ID (required by --refresh)
    #[clap(long, env = "AWS_EXEC_CMD_CLIENT_ID")]
    client_id: Option<String>,

    /// OAuth client secret (required by --refresh)
    #[clap(long, env = "AWS_EXEC_CMD_CLIENT_SECRET")]
    client_secret: Option<String>,

    #[clap(flatten)]
    exec: ExecArgs,
}

impl IdpArgs {
    /// Identity pool credentials are cached per pool and login provider
    fn cache_chain(&self) -> String {
        format!("{},{}", self.pool_id, self.name)
    }

    fn provider(&self) -> Result<IdentityPoolProvider> {
        let mut builder = IdentityPoolProvider::builder();
        builder
            .set_pool_id(Some(self.pool_id.clone()))
            .set_provider_name(Some(self.name.clone()))
            .set_token(self.token.clone())
            .set_refresh_token(self.refresh.clone())
            .set_client_id(self.client_id.clone())
            .set_client_secret(self.client_secret.clone());
        builder.build().context("invalid identity pool settings")
    }
}

impl ExecArgs {
    async fn run(&self, credentials: &Credentials) -> Result<i32> {
        if self.pty {
            if self.timeout > 0 {
                tracing::warn!(timeout = self.timeout, "--timeout does not apply with --pty");
            }
            return exec::run_in_pty(&self.command, credentials).await;
        }
        exec::run_with_credentials(&self.command, credentials, non_zero_secs(self.timeout)).await
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

async fn acquire_and_exec(config: BrokerConfig, provider: Provider, exec: ExecArgs) -> Result<i32> {
    let role_chain = config.role_chain.clone();
    let broker = CredentialBroker::builder().config(config).build();
    let prompt = TerminalPrompt::new(InteractionGate::default());
    let credentials = broker
        .acquire(&provider, &prompt)
        .await
        .with_context(|| {
            format!(
                "failed to acquire credentials from {} [{}]",
                provider.name(),
                role_chain
            )
        })?;
    exec.run(&credentials).await
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Role(args) => {
            let mut provider = RoleChainProvider::builder();
            if let Some(timeout) = non_zero_secs(args.chain_timeout) {
                provider = provider.timeout(timeout);
            }
            acquire_and_exec(
                args.broker.into_config(args.chain),
                provider.build().into(),
                args.exec,
            )
            .await
        }
        Command::Idp(args) => {
            let provider = args.provider()?;
            let cache_chain = args.cache_chain();
            acquire_and_exec(args.broker.into_config(cache_chain), provider.into(), args.exec)
                .await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {:?}", err);
            std::process::exit(1);
        }
    }
}
