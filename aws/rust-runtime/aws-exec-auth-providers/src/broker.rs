/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential broker
//!
//! Decides between cached and fresh credentials:
//!
//! 1. Read the MFA code, when an MFA device is configured
//! 2. Unless `cache_skip` is set, return live cached credentials for (MFA serial, role chain)
//! 3. Otherwise ask the provider, then cache the result until shortly before the session ends
//!
//! `cache_skip` only skips the read. Fresh credentials are always written back.

use crate::cache::{CacheError, CacheKey, CachedCredentials, CredentialCache};
use aws_exec_credential_types::provider::{BoxFuture, CredentialsError, ProvideCredentials, ProviderInput};
use aws_exec_credential_types::Credentials;
use aws_smithy_async::time::{SharedTimeSource, SystemTimeSource};
use aws_types::os_shim_internal::Env;
use std::convert::Infallible;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(900);

/// Cache directory under `$HOME` when none is configured
pub const DEFAULT_CACHE_DIR_NAME: &str = ".cage-aws-cache";

pub const MFA_SOURCE_PROMPT: &str = "prompt";

/// Cached credentials expire this much earlier than the session, so a command is unlikely to
/// receive credentials that expire before it uses them
const CACHE_EARLY_EXPIRY: Duration = Duration::from_secs(10);

/// Where the MFA code comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MfaSource {
    /// Ask on the terminal without echoing
    Prompt,
    /// Read the named environment variable
    EnvironmentVariable(String),
}

impl Default for MfaSource {
    fn default() -> Self {
        MfaSource::Prompt
    }
}

impl FromStr for MfaSource {
    type Err = Infallible;

    /// `prompt` selects the terminal prompt; any other value names an environment variable
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            MFA_SOURCE_PROMPT | "" => MfaSource::Prompt,
            name => MfaSource::EnvironmentVariable(name.to_string()),
        })
    }
}

/// Reads a secret from the user without echoing it
pub trait PromptMfa: Send + Sync {
    fn prompt_hidden<'a>(&'a self, message: &'a str) -> BoxFuture<'a, io::Result<Zeroizing<String>>>
    where
        Self: 'a;
}

/// Settings for one credentials acquisition
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Defaults to `$HOME/.cage-aws-cache`
    pub cache_dir: Option<PathBuf>,
    /// Skip reading from the cache (credentials are still written after success)
    pub cache_skip: bool,
    /// MFA device serial number or virtual device ARN
    pub mfa_serial: Option<String>,
    pub mfa_source: MfaSource,
    /// Comma separated role chain. Part of the cache key for every provider.
    pub role_chain: String,
    pub session_ttl: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            cache_dir: None,
            cache_skip: false,
            mfa_serial: None,
            mfa_source: MfaSource::default(),
            role_chain: String::new(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BrokerError {
    #[error("failed to detect home dir for use as the default cache dir: HOME is not set")]
    HomeDir,

    #[error("MFA serial [{serial}] is configured but no MFA code was provided by {source_name}")]
    MissingMfaCode { serial: String, source_name: String },

    #[error("failed to read MFA token from prompt")]
    Prompt(#[source] io::Error),

    #[error("failed to read cache key [{key}]")]
    CacheRead {
        key: String,
        #[source]
        source: CacheError,
    },

    #[error("failed to write cache key [{key}]")]
    CacheWrite {
        key: String,
        #[source]
        source: CacheError,
    },

    #[error("failed to get credentials from provider")]
    Provider(#[source] CredentialsError),

    #[error("session TTL of {}s puts the cache expiry out of range", ttl.as_secs())]
    SessionTtlOutOfRange { ttl: Duration },
}

impl BrokerError {
    /// The input was rejected before any provider or cache work happened
    pub fn is_validation_error(&self) -> bool {
        matches!(self, BrokerError::MissingMfaCode { .. })
    }
}

pub struct CredentialBroker {
    config: BrokerConfig,
    env: Env,
    time_source: SharedTimeSource,
}

impl CredentialBroker {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Return credentials from the cache, or from `provider` on a miss
    pub async fn acquire(
        &self,
        provider: &dyn ProvideCredentials,
        prompt: &dyn PromptMfa,
    ) -> Result<Credentials, BrokerError> {
        let cache = CredentialCache::new(self.cache_dir()?).with_time_source(self.time_source.clone());

        let mfa_serial = self
            .config
            .mfa_serial
            .clone()
            .filter(|serial| !serial.is_empty());
        let mfa_code = match &mfa_serial {
            Some(serial) => Some(self.mfa_code(serial, prompt).await?),
            None => None,
        };

        let key = CacheKey::new(
            mfa_serial.as_deref().unwrap_or_default(),
            self.config.role_chain.as_str(),
        );

        if self.config.cache_skip {
            tracing::debug!(key = %key, "skipping cache read");
        } else if let Some(cached) =
            cache
                .read(&key)
                .await
                .map_err(|source| BrokerError::CacheRead {
                    key: key.to_string(),
                    source,
                })?
        {
            tracing::info!(key = %key, "using cached credentials");
            return Ok(cached.credentials);
        }

        let input = ProviderInput {
            mfa_serial,
            mfa_code,
            role_chain: self.config.role_chain.clone(),
            session_ttl: self.config.session_ttl,
        };
        let credentials = provider
            .provide_credentials(&input)
            .await
            .map_err(BrokerError::Provider)?;

        let expires = self
            .time_source
            .now()
            .checked_add(self.config.session_ttl.saturating_sub(CACHE_EARLY_EXPIRY))
            .ok_or(BrokerError::SessionTtlOutOfRange {
                ttl: self.config.session_ttl,
            })?;
        cache
            .write(
                &key,
                &CachedCredentials {
                    credentials: credentials.clone(),
                    expires,
                },
            )
            .await
            .map_err(|source| BrokerError::CacheWrite {
                key: key.to_string(),
                source,
            })?;
        tracing::info!(key = %key, provider = credentials.provider_name(), "cached fresh credentials");
        Ok(credentials)
    }

    fn cache_dir(&self) -> Result<PathBuf, BrokerError> {
        if let Some(dir) = &self.config.cache_dir {
            return Ok(dir.clone());
        }
        match self.env.get("HOME") {
            Ok(home) if !home.is_empty() => Ok(PathBuf::from(home).join(DEFAULT_CACHE_DIR_NAME)),
            _ => Err(BrokerError::HomeDir),
        }
    }

    async fn mfa_code(
        &self,
        serial: &str,
        prompt: &dyn PromptMfa,
    ) -> Result<Zeroizing<String>, BrokerError> {
        let (code, source_name) = match &self.config.mfa_source {
            MfaSource::Prompt => (
                prompt
                    .prompt_hidden("MFA token:")
                    .await
                    .map_err(BrokerError::Prompt)?,
                "the prompt".to_string(),
            ),
            MfaSource::EnvironmentVariable(name) => (
                Zeroizing::new(self.env.get(name).unwrap_or_default()),
                format!("environment variable {}", name),
            ),
        };
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(BrokerError::MissingMfaCode {
                serial: serial.to_string(),
                source_name,
            });
        }
        Ok(Zeroizing::new(trimmed.to_string()))
    }
}

#[derive(Default)]
pub struct Builder {
    config: BrokerConfig,
    env: Option<Env>,
    time_source: Option<SharedTimeSource>,
}

impl Builder {
    pub fn config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    #[doc(hidden)]
    /// Override the environment used for `HOME` and environment variable MFA sources
    ///
    /// This method exists primarily for testing
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    #[doc(hidden)]
    /// Override the clock used for cache expiry
    ///
    /// This method exists primarily for testing
    pub fn time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = Some(time_source);
        self
    }

    pub fn build(self) -> CredentialBroker {
        CredentialBroker {
            config: self.config,
            env: self.env.unwrap_or_else(Env::real),
            time_source: self
                .time_source
                .unwrap_or_else(|| SharedTimeSource::new(SystemTimeSource::new())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mfa_source_parsing() {
        assert_eq!("prompt".parse::<MfaSource>(), Ok(MfaSource::Prompt));
        assert_eq!(
            "MY_MFA_CODE".parse::<MfaSource>(),
            Ok(MfaSource::EnvironmentVariable("MY_MFA_CODE".into()))
        );
    }

    #[test]
    fn default_cache_dir_is_under_home() {
        let broker = CredentialBroker::builder()
            .env(Env::from_slice(&[("HOME", "/Users/me")]))
            .build();
        assert_eq!(
            broker.cache_dir().expect("home is set"),
            PathBuf::from("/Users/me/.cage-aws-cache")
        );

        let broker = CredentialBroker::builder().env(Env::from_slice(&[])).build();
        assert!(matches!(broker.cache_dir(), Err(BrokerError::HomeDir)));

        let broker = CredentialBroker::builder()
            .env(Env::from_slice(&[]))
            .config(BrokerConfig {
                cache_dir: Some(PathBuf::from("/tmp/creds")),
                ..Default::default()
            })
            .build();
        assert_eq!(broker.cache_dir().expect("explicit"), PathBuf::from("/tmp/creds"));
    }
}
