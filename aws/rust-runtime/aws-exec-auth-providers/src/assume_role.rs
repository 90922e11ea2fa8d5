/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! One role assumption
//!
//! [`AssumeRole`] is a single, stateless call to the trust service: assume `role_arn` using the
//! basis credentials (or none). [`StsAssumeRole`] implements it with STS `AssumeRole`.

use aws_exec_credential_types::provider::{BoxError, BoxFuture};
use aws_exec_credential_types::Credentials;
use aws_sdk_sts::config::retry::RetryConfig;
use aws_sdk_sts::config::{BehaviorVersion, Region};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

/// An MFA device serial number and a code read from it
#[derive(Clone)]
pub struct Mfa {
    pub serial: String,
    pub code: Zeroizing<String>,
}

impl Debug for Mfa {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mfa")
            .field("serial", &self.serial)
            .field("code", &"** redacted **")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct AssumeRoleRequest {
    /// Credentials used to sign the call. `None` sends the call without credentials.
    pub basis: Option<Credentials>,
    pub role_arn: String,
    pub session_name: String,
    pub region: Option<String>,
    pub mfa: Option<Mfa>,
    /// Requested session length. STS rejects anything under 900 seconds.
    pub duration: Option<Duration>,
}

pub trait AssumeRole: Send + Sync {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest,
    ) -> BoxFuture<'a, Result<Credentials, BoxError>>
    where
        Self: 'a;
}

/// STS `AssumeRole`, one attempt per call
#[derive(Debug, Default)]
pub struct StsAssumeRole {
    _private: (),
}

impl StsAssumeRole {
    pub fn new() -> Self {
        Self::default()
    }

    async fn assume(&self, request: AssumeRoleRequest) -> Result<Credentials, BoxError> {
        let mut conf = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled())
            .region(request.region.map(Region::new));
        if let Some(basis) = &request.basis {
            conf = conf.credentials_provider(aws_sdk_sts::config::Credentials::new(
                basis.access_key_id(),
                basis.secret_access_key(),
                basis.session_token().map(str::to_string),
                basis.expiry(),
                "RoleChainBasis",
            ));
        }
        let client = aws_sdk_sts::Client::from_conf(conf.build());

        let mut operation = client
            .assume_role()
            .role_arn(request.role_arn)
            .role_session_name(request.session_name);
        if let Some(mfa) = request.mfa {
            operation = operation
                .serial_number(mfa.serial)
                .token_code(mfa.code.as_str());
        }
        if let Some(seconds) = duration_seconds(request.duration) {
            operation = operation.duration_seconds(seconds);
        }
        let response = operation.send().await?;
        let credentials = response
            .credentials()
            .ok_or("AssumeRole response did not contain credentials")?;
        let expiry = u64::try_from(credentials.expiration().secs())
            .ok()
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
        Ok(into_credentials(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token(),
            expiry,
        ))
    }
}

/// `DurationSeconds` to send, if any. A zero duration leaves the STS default in place.
fn duration_seconds(duration: Option<Duration>) -> Option<i32> {
    duration
        .filter(|duration| !duration.is_zero())
        .map(|duration| i32::try_from(duration.as_secs()).unwrap_or(i32::MAX))
}

fn into_credentials(
    access_key_id: &str,
    secret_access_key: &str,
    session_token: &str,
    expiry: Option<SystemTime>,
) -> Credentials {
    Credentials::new(
        access_key_id,
        secret_access_key,
        Some(session_token.to_string()),
        expiry,
        "AssumeRole",
    )
}

impl AssumeRole for StsAssumeRole {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest,
    ) -> BoxFuture<'a, Result<Credentials, BoxError>>
    where
        Self: 'a,
    {
        Box::pin(self.assume(request))
    }
}
