/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::identity_pool::IdentityPoolProvider;
use crate::role_chain::RoleChainProvider;
use aws_exec_credential_types::provider::{self, BoxFuture, ProvideCredentials, ProviderInput};

/// The credential sources `aws-exec-cmd` can broker
///
/// ## Example:
/// Walk a role chain seeded by the instance metadata service:
/// ```rust,no_run
/// use aws_exec_auth_providers::provider::Provider;
/// use aws_exec_auth_providers::role_chain::RoleChainProvider;
///
/// let provider = Provider::from(RoleChainProvider::builder().region("us-west-2").build());
/// assert_eq!(provider.name(), "RoleChain");
/// ```
pub enum Provider {
    /// Assume each role of a chain in turn
    RoleChain(RoleChainProvider),
    /// Log in to a Cognito identity pool
    IdentityPool(IdentityPoolProvider),
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::RoleChain(_) => "RoleChain",
            Provider::IdentityPool(_) => "IdentityPool",
        }
    }
}

impl From<RoleChainProvider> for Provider {
    fn from(provider: RoleChainProvider) -> Self {
        Provider::RoleChain(provider)
    }
}

impl From<IdentityPoolProvider> for Provider {
    fn from(provider: IdentityPoolProvider) -> Self {
        Provider::IdentityPool(provider)
    }
}

impl ProvideCredentials for Provider {
    fn provide_credentials<'a>(&'a self, input: &'a ProviderInput) -> BoxFuture<'a, provider::Result>
    where
        Self: 'a,
    {
        tracing::debug!(provider = self.name(), input = ?input, "loading credentials");
        match self {
            Provider::RoleChain(provider) => provider.provide_credentials(input),
            Provider::IdentityPool(provider) => provider.provide_credentials(input),
        }
    }
}
