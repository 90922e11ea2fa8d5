/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Role Chain Resolution
//!
//! A role chain is an ordered list of links. Each link after the first is a role ARN; the first link
//! may also be an alias (`instance`, `env-triple`) naming the provider that seeds the chain.
//! Resolution assumes each role in turn, using the credentials from the previous step to assume the
//! next one, and returns the credentials of the last role.
//!
//! Resolution has two phases:
//! - [`repr`] validates the whole chain and determines where the first credentials come from. No
//!   network calls happen here, so an invalid chain never reaches STS.
//! - [`exec`] walks the validated chain, one [`AssumeRole`](crate::assume_role::AssumeRole) call per
//!   role ARN.
//!
//! MFA is only attached to the first role assumption.

use crate::assume_role::{AssumeRole, Mfa, StsAssumeRole};
use crate::environment::region_from_env;
use crate::named::NamedProviderFactory;
use aws_exec_credential_types::provider::{
    self, BoxError, BoxFuture, CredentialsError, ProvideCredentials, ProviderInput,
};
use aws_exec_credential_types::Credentials;
use aws_types::os_shim_internal::Env;
use std::borrow::Cow;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mod exec;
mod repr;

/// Describes the chain to walk and the credentials that start it, if any
#[derive(Clone, Debug, Default)]
pub struct RoleChainInput {
    /// Credentials used to assume the first link, e.g. a long-lived key pair
    ///
    /// When set, the first link must be a role ARN.
    pub static_credentials: Option<Credentials>,
    /// Session name passed to `AssumeRole`. A random name is generated per call when unset.
    pub session_name: Option<String>,
    /// Region of the STS endpoint, e.g. `us-west-2`
    pub region: Option<String>,
    /// Aliases and role ARNs, e.g. `["instance", "arn:aws:iam::123456789012:role/backup"]`
    pub chain: Vec<String>,
    pub mfa: Option<Mfa>,
    /// Session lifetime (STS minimum: 900 seconds, not checked here)
    pub duration: Option<Duration>,
    /// Abort the walk once this instant passes
    pub deadline: Option<Instant>,
}

impl Display for RoleChainInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (serial_len, code_len) = match &self.mfa {
            Some(mfa) => (mfa.serial.len(), mfa.code.len()),
            None => (0, 0),
        };
        write!(
            f,
            "session [{}] region [{}] mfa serial [{} chars] mfa code [{} chars] ttl [{} sec] chain [{}]",
            self.session_name.as_deref().unwrap_or_default(),
            self.region.as_deref().unwrap_or_default(),
            serial_len,
            code_len,
            self.duration.map(|d| d.as_secs()).unwrap_or_default(),
            self.chain.join(",")
        )
    }
}

/// Steps completed while walking a chain, in order
///
/// Attached to resolution errors to show how far the walk got.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionLog(Vec<String>);

impl ResolutionLog {
    fn push(&mut self, step: impl Into<String>) {
        self.0.push(step.into())
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ResolutionLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("no roles resolved")
        } else {
            f.write_str(&self.0.join(","))
        }
    }
}

/// Credentials at the end of the chain, plus the steps that produced them
#[derive(Debug)]
pub struct ResolvedChain {
    pub credentials: Credentials,
    pub log: ResolutionLog,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RoleChainError {
    #[error("no links in role chain")]
    EmptyChain,

    #[error("role chain first-link alias [{0}] is not recognized")]
    UnrecognizedAlias(String),

    #[error("non-ARN role [{link}] is only allowed as the first chain link, chain [{chain}]")]
    InvalidChainLink { link: String, chain: String },

    #[error("first chain link [{link}] must be a role ARN when static credentials are provided")]
    StaticCredentialsRequireArn { link: String },

    #[error("failed to seed role chain from [{alias}] ({input}) log [{log}]")]
    Seed {
        alias: String,
        input: String,
        log: ResolutionLog,
        #[source]
        source: BoxError,
    },

    #[error("failed to assume role [{link}] ({input}) log [{log}]")]
    Elevation {
        link: String,
        input: String,
        log: ResolutionLog,
        #[source]
        source: BoxError,
    },

    #[error("deadline passed before assuming role [{link}] ({input}) log [{log}]")]
    DeadlineExceeded {
        link: String,
        input: String,
        log: ResolutionLog,
    },
}

impl RoleChainError {
    /// The chain was rejected before any credentials were requested
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            RoleChainError::EmptyChain
                | RoleChainError::UnrecognizedAlias(_)
                | RoleChainError::InvalidChainLink { .. }
                | RoleChainError::StaticCredentialsRequireArn { .. }
        )
    }

    /// Steps completed before the failure. Empty for validation errors.
    pub fn log(&self) -> Option<&ResolutionLog> {
        match self {
            RoleChainError::Seed { log, .. }
            | RoleChainError::Elevation { log, .. }
            | RoleChainError::DeadlineExceeded { log, .. } => Some(log),
            _ => None,
        }
    }
}

/// Walks role chains using an [`AssumeRole`] implementation and a set of named seed providers
pub struct RoleChainResolver {
    assume_role: Arc<dyn AssumeRole>,
    seeds: NamedProviderFactory,
}

impl RoleChainResolver {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Resolve `input.chain` into the credentials of its last role
    pub async fn resolve(&self, input: RoleChainInput) -> Result<ResolvedChain, RoleChainError> {
        let links = repr::trimmed_links(&input.chain);
        let chain = repr::resolve_chain(&links, input.static_credentials.is_some(), &self.seeds)?;
        exec::walk(chain, &input, self.assume_role.as_ref(), &self.seeds).await
    }
}

#[derive(Default)]
pub struct Builder {
    assume_role: Option<Arc<dyn AssumeRole>>,
    seeds: crate::named::Builder,
}

impl Builder {
    /// Override the implementation used for each role assumption
    ///
    /// Defaults to STS `AssumeRole`.
    pub fn assume_role(mut self, assume_role: impl AssumeRole + 'static) -> Self {
        self.assume_role = Some(Arc::new(assume_role));
        self
    }

    /// Register a seed provider for a first-link alias, replacing a built-in one of the same name
    pub fn seed(
        mut self,
        alias: impl Into<Cow<'static, str>>,
        provider: impl aws_credential_types::provider::ProvideCredentials + 'static,
    ) -> Self {
        self.seeds = self.seeds.provider(alias, provider);
        self
    }

    #[doc(hidden)]
    /// Override the environment read by the `env-triple` seed
    ///
    /// This method exists primarily for testing credential providers
    pub fn env(mut self, env: Env) -> Self {
        self.seeds = self.seeds.env(env);
        self
    }

    pub fn build(self) -> RoleChainResolver {
        RoleChainResolver {
            assume_role: self
                .assume_role
                .unwrap_or_else(|| Arc::new(StsAssumeRole::new())),
            seeds: self.seeds.build(),
        }
    }
}

/// Credentials provider backed by a comma separated role chain
///
/// The chain, MFA device, and session lifetime come from the [`ProviderInput`].
pub struct RoleChainProvider {
    resolver: RoleChainResolver,
    env: Env,
    region: Option<String>,
    session_name: Option<String>,
    static_credentials: Option<Credentials>,
    timeout: Option<Duration>,
}

impl RoleChainProvider {
    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::default()
    }

    async fn credentials(&self, input: &ProviderInput) -> provider::Result {
        let chain = parse_role_chain(&input.role_chain);
        if chain.is_empty() {
            return Err(CredentialsError::invalid_configuration(
                "role chain required",
            ));
        }
        let mfa = match (&input.mfa_serial, &input.mfa_code) {
            (Some(serial), Some(code)) => Some(Mfa {
                serial: serial.clone(),
                code: code.clone(),
            }),
            _ => None,
        };
        let resolve_input = RoleChainInput {
            static_credentials: self.static_credentials.clone(),
            session_name: self.session_name.clone(),
            region: self.region.clone().or_else(|| region_from_env(&self.env)),
            chain,
            mfa,
            duration: Some(input.session_ttl),
            deadline: self.timeout.map(|timeout| Instant::now() + timeout),
        };
        let resolved = self
            .resolver
            .resolve(resolve_input)
            .await
            .map_err(|err| CredentialsError::provider_error("RoleChain", err))?;
        tracing::debug!(log = %resolved.log, "resolved role chain");
        Ok(resolved.credentials)
    }
}

impl ProvideCredentials for RoleChainProvider {
    fn provide_credentials<'a>(&'a self, input: &'a ProviderInput) -> BoxFuture<'a, provider::Result>
    where
        Self: 'a,
    {
        Box::pin(self.credentials(input))
    }
}

/// Split a comma separated chain, trimming each link and dropping blank ones
pub fn parse_role_chain(role_chain: &str) -> Vec<String> {
    role_chain
        .split(',')
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
pub struct ProviderBuilder {
    resolver: Builder,
    env: Option<Env>,
    region: Option<String>,
    session_name: Option<String>,
    static_credentials: Option<Credentials>,
    timeout: Option<Duration>,
}

impl ProviderBuilder {
    pub fn resolver(mut self, resolver: Builder) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set the STS region. When unset, `AWS_REGION` or `AWS_DEFAULT_REGION` is used.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    /// Assume the first role with these credentials instead of a seed alias
    pub fn static_credentials(mut self, credentials: Credentials) -> Self {
        self.static_credentials = Some(credentials);
        self
    }

    /// Bound the whole walk, measured from the start of each resolution
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[doc(hidden)]
    /// Override the environment used for this provider
    ///
    /// This method exists primarily for testing credential providers
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    pub fn build(self) -> RoleChainProvider {
        let env = self.env.unwrap_or_else(Env::real);
        RoleChainProvider {
            resolver: self.resolver.env(env.clone()).build(),
            env,
            region: self.region,
            session_name: self.session_name,
            static_credentials: self.static_credentials,
            timeout: self.timeout,
        }
    }
}
