/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credentials from the process environment
//!
//! Seeds a role chain that starts with the `env-triple` alias. The variable names are the ones the
//! AWS CLI and SDKs read, and the ones set on the executed command.

use aws_credential_types::provider::{error::CredentialsError, future, ProvideCredentials};
use aws_types::os_shim_internal::Env;

pub const ENV_VAR_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_VAR_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_VAR_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

// Older names still honored by the SDKs
const ENV_VAR_ACCESS_KEY_ID_ALT: &str = "AWS_ACCESS_KEY";
const ENV_VAR_SECRET_ACCESS_KEY_ALT: &str = "AWS_SECRET_KEY";

pub const ENV_VAR_REGION: &str = "AWS_REGION";
pub const ENV_VAR_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, and `AWS_SESSION_TOKEN`
#[derive(Debug, Default)]
pub struct EnvironmentVariableCredentialsProvider {
    env: Env,
}

impl EnvironmentVariableCredentialsProvider {
    pub fn new() -> Self {
        Self::new_with_env(Env::real())
    }

    pub fn new_with_env(env: Env) -> Self {
        EnvironmentVariableCredentialsProvider { env }
    }

    fn credentials(&self) -> aws_credential_types::provider::Result {
        let access_key = non_empty(&self.env, ENV_VAR_ACCESS_KEY_ID)
            .or_else(|| non_empty(&self.env, ENV_VAR_ACCESS_KEY_ID_ALT))
            .ok_or_else(|| {
                CredentialsError::not_loaded(format!("{} is not set", ENV_VAR_ACCESS_KEY_ID))
            })?;
        let secret_key = non_empty(&self.env, ENV_VAR_SECRET_ACCESS_KEY)
            .or_else(|| non_empty(&self.env, ENV_VAR_SECRET_ACCESS_KEY_ALT))
            .ok_or_else(|| {
                CredentialsError::not_loaded(format!("{} is not set", ENV_VAR_SECRET_ACCESS_KEY))
            })?;
        let session_token = non_empty(&self.env, ENV_VAR_SESSION_TOKEN);
        Ok(aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            session_token,
            None,
            "Environment",
        ))
    }
}

impl ProvideCredentials for EnvironmentVariableCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.credentials())
    }
}

fn non_empty(env: &Env, key: &str) -> Option<String> {
    env.get(key).ok().filter(|value| !value.trim().is_empty())
}

/// Region from `AWS_REGION`, falling back to `AWS_DEFAULT_REGION`
pub fn region_from_env(env: &Env) -> Option<String> {
    non_empty(env, ENV_VAR_REGION).or_else(|| non_empty(env, ENV_VAR_DEFAULT_REGION))
}
