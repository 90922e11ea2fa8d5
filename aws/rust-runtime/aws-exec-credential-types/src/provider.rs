/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The credentials provider capability
//!
//! A provider turns a [`ProviderInput`] into [`Credentials`]. The role chain resolver and
//! identity pool federated login both implement [`ProvideCredentials`].

use crate::Credentials;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for credential providers.
pub type Result = std::result::Result<Credentials, CredentialsError>;

/// Everything the broker collected before asking a provider for credentials
#[derive(Clone, Default)]
pub struct ProviderInput {
    /// MFA device serial number or virtual device ARN
    pub mfa_serial: Option<String>,
    /// Code read from the MFA device. Only set when `mfa_serial` is.
    pub mfa_code: Option<Zeroizing<String>>,
    /// Comma separated role chain, e.g. `instance,arn:aws:iam::123456789012:role/backup`
    ///
    /// Providers that do not walk a role chain ignore it.
    pub role_chain: String,
    /// Requested lifetime of the session
    pub session_ttl: Duration,
}

impl Debug for ProviderInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderInput")
            .field("mfa_serial", &self.mfa_serial)
            .field("mfa_code", &self.mfa_code.as_ref().map(|_| "** redacted **"))
            .field("role_chain", &self.role_chain)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

/// Asynchronous credentials provider
pub trait ProvideCredentials: Send + Sync {
    fn provide_credentials<'a>(&'a self, input: &'a ProviderInput) -> BoxFuture<'a, Result>
    where
        Self: 'a;
}

impl<T> ProvideCredentials for Arc<T>
where
    T: ProvideCredentials + ?Sized,
{
    fn provide_credentials<'a>(&'a self, input: &'a ProviderInput) -> BoxFuture<'a, Result>
    where
        Self: 'a,
    {
        self.as_ref().provide_credentials(input)
    }
}

impl<T> ProvideCredentials for Box<T>
where
    T: ProvideCredentials + ?Sized,
{
    fn provide_credentials<'a>(&'a self, input: &'a ProviderInput) -> BoxFuture<'a, Result>
    where
        Self: 'a,
    {
        self.as_ref().provide_credentials(input)
    }
}

/// Error returned by a [`ProvideCredentials`] implementation
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialsError {
    /// The provider was given input it cannot work with, e.g. an empty role chain
    #[error("invalid credentials provider configuration: {0}")]
    InvalidConfiguration(Cow<'static, str>),

    /// The provider was configured correctly but failed to load credentials
    #[error("credentials provider `{provider}` failed")]
    ProviderError {
        provider: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("unexpected error while loading credentials")]
    Unhandled(#[source] BoxError),
}

impl CredentialsError {
    pub fn provider_error(provider: &'static str, source: impl Into<BoxError>) -> Self {
        CredentialsError::ProviderError {
            provider,
            source: source.into(),
        }
    }

    pub fn invalid_configuration(message: impl Into<Cow<'static, str>>) -> Self {
        CredentialsError::InvalidConfiguration(message.into())
    }
}
