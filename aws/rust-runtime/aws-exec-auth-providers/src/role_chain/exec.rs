/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Walk a validated role chain
//!
//! Each role is assumed with the credentials produced by the previous step. Any failure aborts the
//! whole walk: partial results are never returned.

use super::repr::{BaseCredentials, RoleChain};
use super::{ResolutionLog, ResolvedChain, RoleChainError, RoleChainInput};
use crate::assume_role::{AssumeRole, AssumeRoleRequest};
use crate::named::NamedProviderFactory;
use crate::session_name::default_session_name;
use aws_exec_credential_types::provider::BoxError;
use aws_exec_credential_types::Credentials;
use tokio::time::Instant;

pub(super) async fn walk(
    chain: RoleChain<'_>,
    input: &RoleChainInput,
    assume_role: &dyn AssumeRole,
    seeds: &NamedProviderFactory,
) -> Result<ResolvedChain, RoleChainError> {
    let mut log = ResolutionLog::default();

    let mut basis = match chain.base {
        BaseCredentials::Static => input.static_credentials.clone(),
        BaseCredentials::Anonymous => None,
        BaseCredentials::Named(alias) => {
            let provider = seeds
                .provider(alias)
                .ok_or_else(|| RoleChainError::UnrecognizedAlias(alias.to_string()))?;
            let seed = provider
                .provide_credentials()
                .await
                .map_err(|err| RoleChainError::Seed {
                    alias: alias.to_string(),
                    input: input.to_string(),
                    log: log.clone(),
                    source: err.into(),
                })?;
            tracing::debug!(alias, "seeded role chain");
            log.push(format!("seeded chain with {} creds", alias));
            Some(from_seed(seed))
        }
    };

    // MFA belongs to the first trust boundary only
    let mut mfa = input.mfa.clone();

    for link in chain.roles {
        let elevation_error = |log: &ResolutionLog, source: BoxError| RoleChainError::Elevation {
            link: link.to_string(),
            input: input.to_string(),
            log: log.clone(),
            source,
        };
        let deadline_error = |log: &ResolutionLog| RoleChainError::DeadlineExceeded {
            link: link.to_string(),
            input: input.to_string(),
            log: log.clone(),
        };

        if matches!(input.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(deadline_error(&log));
        }

        let session_name = match &input.session_name {
            Some(session_name) => session_name.clone(),
            None => default_session_name().map_err(|_| {
                elevation_error(
                    &log,
                    "failed to generate a random AssumeRole session name".into(),
                )
            })?,
        };

        let prior_credentials = basis.is_some();
        tracing::debug!(link, prior_credentials, mfa = mfa.is_some(), "assuming role");
        let request = AssumeRoleRequest {
            basis: basis.take(),
            role_arn: link.to_string(),
            session_name,
            region: input.region.clone(),
            mfa: mfa.take(),
            duration: input.duration,
        };

        let call = assume_role.assume_role(request);
        let result = match input.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .map_err(|_elapsed| deadline_error(&log))?,
            None => call.await,
        };
        let credentials = result.map_err(|err| elevation_error(&log, err))?;

        log.push(format!(
            "assumed role from link [{}] with prior creds [{}]",
            link, prior_credentials
        ));
        basis = Some(credentials);
    }

    match basis {
        Some(credentials) => Ok(ResolvedChain { credentials, log }),
        None => Err(RoleChainError::EmptyChain),
    }
}

fn from_seed(seed: aws_credential_types::Credentials) -> Credentials {
    Credentials::new(
        seed.access_key_id(),
        seed.secret_access_key(),
        seed.session_token().map(str::to_string),
        seed.expiry(),
        "Seed",
    )
}
