/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

/// Temporary or static AWS credentials
///
/// The secret access key and session token are zeroed on drop and never printed by `Debug`.
/// Equality only considers the triple itself, not the expiry or the name of the provider that
/// loaded it.
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: Zeroizing<String>,
    session_token: Option<Zeroizing<String>>,
    expiry: Option<SystemTime>,
    provider_name: &'static str,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut creds = f.debug_struct("Credentials");
        creds
            .field("provider_name", &self.provider_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            );
        if let Some(expiry) = self.expiry {
            match expiry.duration_since(UNIX_EPOCH) {
                Ok(since_epoch) => creds.field("expires_after", &since_epoch.as_secs()),
                Err(_) => creds.field("expires_after", &expiry),
            };
        }
        creds.finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.access_key_id == other.access_key_id
            && self.secret_access_key == other.secret_access_key
            && self.session_token == other.session_token
    }
}

impl Eq for Credentials {}

impl Credentials {
    /// Build credentials from their parts
    ///
    /// An empty session token is treated as no session token.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        expiry: Option<SystemTime>,
        provider_name: &'static str,
    ) -> Self {
        Credentials {
            access_key_id: access_key_id.into(),
            secret_access_key: Zeroizing::new(secret_access_key.into()),
            session_token: session_token
                .filter(|token| !token.is_empty())
                .map(Zeroizing::new),
            expiry,
            provider_name,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref().map(String::as_str)
    }

    /// When the credentials stop being valid, if the source reported it
    pub fn expiry(&self) -> Option<SystemTime> {
        self.expiry
    }

    /// Name of the provider that loaded these credentials, e.g. `RoleChain` or `Cache`
    pub fn provider_name(&self) -> &'static str {
        self.provider_name
    }
}
