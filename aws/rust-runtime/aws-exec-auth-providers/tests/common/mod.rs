/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

#![allow(dead_code)]

use aws_credential_types::provider::{error::CredentialsError as SeedError, future};
use aws_exec_auth_providers::assume_role::{AssumeRole, AssumeRoleRequest};
use aws_exec_credential_types::provider::{BoxError, BoxFuture};
use aws_exec_credential_types::Credentials;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BACKUP_ROLE: &str = "arn:aws:iam::123456789012:role/backup";
pub const AUDIT_ROLE: &str = "arn:aws:iam::123456789012:role/audit";
pub const ADMIN_ROLE: &str = "arn:aws:iam::210987654321:role/admin";

/// Seed provider that counts its calls
#[derive(Clone, Debug, Default)]
pub struct RecordingSeed {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingSeed {
    pub fn failing() -> Self {
        RecordingSeed {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl aws_credential_types::provider::ProvideCredentials for RecordingSeed {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return future::ProvideCredentials::ready(Err(SeedError::not_loaded(
                "no instance metadata service",
            )));
        }
        future::ProvideCredentials::ready(Ok(aws_credential_types::Credentials::new(
            "AKIDSEED",
            "seed-secret",
            Some("seed-token".to_string()),
            None,
            "test",
        )))
    }
}

/// Trust elevator that records every request and answers with credentials named after the role
#[derive(Clone, Default)]
pub struct RecordingElevator {
    requests: Arc<Mutex<Vec<AssumeRoleRequest>>>,
    fail_on: Option<&'static str>,
    delay: Option<Duration>,
}

impl RecordingElevator {
    pub fn failing_on(role_arn: &'static str) -> Self {
        RecordingElevator {
            fail_on: Some(role_arn),
            ..Default::default()
        }
    }

    /// Each call takes `delay` to complete
    pub fn slow(delay: Duration) -> Self {
        RecordingElevator {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<AssumeRoleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub fn role_credentials(role_arn: &str) -> Credentials {
    let name = role_arn.rsplit('/').next().unwrap_or(role_arn);
    Credentials::new(
        format!("ASIA{}", name.to_uppercase()),
        format!("{}-secret", name),
        Some(format!("{}-token", name)),
        None,
        "AssumeRole",
    )
}

impl AssumeRole for RecordingElevator {
    fn assume_role<'a>(
        &'a self,
        request: AssumeRoleRequest,
    ) -> BoxFuture<'a, Result<Credentials, BoxError>>
    where
        Self: 'a,
    {
        self.requests.lock().unwrap().push(request.clone());
        let fail = self.fail_on == Some(request.role_arn.as_str());
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if fail {
                let error: BoxError =
                    format!("AccessDenied: not authorized to assume {}", request.role_arn).into();
                return Err(error);
            }
            Ok::<_, BoxError>(role_credentials(&request.role_arn))
        })
    }
}
