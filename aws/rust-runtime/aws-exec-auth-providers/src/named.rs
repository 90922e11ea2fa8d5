/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Named Seed Provider Factory
//!
//! A role chain may start with an alias like `instance` instead of a role ARN. The alias names the
//! provider whose credentials are used to assume the first role.

use crate::environment::EnvironmentVariableCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use aws_types::os_shim_internal::Env;
use std::borrow::Cow;
use std::collections::HashMap;

/// Seed the chain with the EC2 instance profile credentials from the instance metadata service
pub const INSTANCE_ALIAS: &str = "instance";

/// Seed the chain with `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, and `AWS_SESSION_TOKEN`
pub const ENV_TRIPLE_ALIAS: &str = "env-triple";

pub struct NamedProviderFactory {
    inner: HashMap<Cow<'static, str>, Box<dyn ProvideCredentials>>,
}

impl NamedProviderFactory {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn provider(&self, name: &str) -> Option<&dyn ProvideCredentials> {
        self.inner.get(name).map(|item| item.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }
}

#[derive(Default)]
pub struct Builder {
    env: Option<Env>,
    extras: HashMap<Cow<'static, str>, Box<dyn ProvideCredentials>>,
}

impl Builder {
    /// Build the factory
    ///
    /// `instance` and `env-triple` are registered unless a provider with the same name was added.
    pub fn build(self) -> NamedProviderFactory {
        let env = self.env.unwrap_or_else(Env::real);
        let mut inner = self.extras;
        inner
            .entry(Cow::Borrowed(ENV_TRIPLE_ALIAS))
            .or_insert_with(|| {
                Box::new(EnvironmentVariableCredentialsProvider::new_with_env(env))
            });
        inner
            .entry(Cow::Borrowed(INSTANCE_ALIAS))
            .or_insert_with(|| Box::new(ImdsCredentialsProvider::builder().build()));
        NamedProviderFactory { inner }
    }

    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    pub fn provider(
        mut self,
        name: impl Into<Cow<'static, str>>,
        provider: impl ProvideCredentials + 'static,
    ) -> Self {
        self.extras.insert(name.into(), Box::new(provider));
        self
    }
}
