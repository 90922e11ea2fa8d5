/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Terminal interaction
//!
//! Reads from the terminal block, so they run on the blocking pool. Only one interaction may read
//! stdin at a time: every prompt holds the [`InteractionGate`] until it returns.

use aws_exec_auth_providers::PromptMfa;
use aws_exec_credential_types::provider::BoxFuture;
use dialoguer::Password;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

/// Serializes terminal interactions within the process
#[derive(Clone, Debug, Default)]
pub struct InteractionGate(Arc<Mutex<()>>);

impl InteractionGate {
    /// Run `interact` on the blocking pool while holding the gate
    pub async fn run_blocking<T, F>(&self, interact: F) -> io::Result<T>
    where
        F: FnOnce() -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _interaction = self.0.lock().await;
        tokio::task::spawn_blocking(interact)
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
    }
}

/// MFA prompt that reads the code without echoing it
#[derive(Clone, Debug, Default)]
pub struct TerminalPrompt {
    gate: InteractionGate,
}

impl TerminalPrompt {
    pub fn new(gate: InteractionGate) -> Self {
        TerminalPrompt { gate }
    }
}

impl PromptMfa for TerminalPrompt {
    fn prompt_hidden<'a>(&'a self, message: &'a str) -> BoxFuture<'a, io::Result<Zeroizing<String>>>
    where
        Self: 'a,
    {
        let message = message.to_string();
        Box::pin(async move {
            let answer = self
                .gate
                .run_blocking(move || {
                    Password::new()
                        .with_prompt(message)
                        .allow_empty_password(true)
                        .interact()
                })
                .await?;
            Ok(Zeroizing::new(answer))
        })
    }
}
