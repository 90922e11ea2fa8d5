/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! On-disk credentials cache
//!
//! One JSON file per [`CacheKey`], named by the hex SHA-256 of the key, directly under the cache
//! directory. Files are readable by the owner only. Expired files are left in place until the
//! next successful write for the same key replaces them.

use crate::session_name::random_hex;
use aws_exec_credential_types::Credentials;
use aws_smithy_async::time::{SharedTimeSource, SystemTimeSource};
use ring::digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use zeroize::Zeroize;

/// Identifies cached credentials
///
/// Any characters are allowed. The file name is a hash of both fields, so the key only needs to
/// be unique, not filename-safe.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    mfa_serial: String,
    role: String,
}

impl CacheKey {
    /// `role` is any identifier the caller can rely on being unique, e.g. the comma separated role chain
    pub fn new(mfa_serial: impl Into<String>, role: impl Into<String>) -> Self {
        CacheKey {
            mfa_serial: mfa_serial.into(),
            role: role.into(),
        }
    }

    /// Hex encoded SHA-256 of the MFA serial followed by the role
    pub fn file_name(&self) -> String {
        let mut context = digest::Context::new(&digest::SHA256);
        context.update(self.mfa_serial.as_bytes());
        context.update(self.role.as_bytes());
        hex::encode(context.finish())
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Credentials plus the time after which they must not be handed out
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedCredentials {
    pub credentials: Credentials,
    pub expires: SystemTime,
}

/// Serialized form. Field names match files written by earlier releases.
#[derive(Serialize, Deserialize)]
struct CacheRecord {
    #[serde(rename = "AccessKeyID")]
    access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: String,
    #[serde(rename = "SessionToken", default)]
    session_token: String,
    /// Unix seconds
    #[serde(rename = "Expires")]
    expires: i64,
}

impl Drop for CacheRecord {
    fn drop(&mut self) {
        self.secret_access_key.zeroize();
        self.session_token.zeroize();
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("failed to create cache dir [{}]", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read cache file [{}]", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write cache file [{}]", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache file [{}] is malformed", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize cached credentials")]
    Serialize(#[source] serde_json::Error),
}

/// File-per-key credentials store
///
/// No locking: when two processes write the same key, the last rename wins. Writes go through a
/// temporary file in the same directory, so a reader never sees a partially written file.
#[derive(Clone, Debug)]
pub struct CredentialCache {
    dir: PathBuf,
    time_source: SharedTimeSource,
}

impl CredentialCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CredentialCache {
            dir: dir.into(),
            time_source: SharedTimeSource::new(SystemTimeSource::new()),
        }
    }

    #[doc(hidden)]
    /// Override the clock used to decide whether an entry has expired
    ///
    /// This method exists primarily for testing
    pub fn with_time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read live credentials for `key`
    ///
    /// A missing file and an expired entry are both a miss (`Ok(None)`). Only I/O failures other
    /// than "not found" and malformed content are errors.
    pub async fn read(&self, key: &CacheKey) -> Result<Option<CachedCredentials>, CacheError> {
        let path = self.path(key);
        let mut contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(key = %key, "cache miss");
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        let parsed = serde_json::from_slice::<CacheRecord>(&contents);
        contents.zeroize();
        let record = parsed.map_err(|source| CacheError::Malformed {
            path: path.clone(),
            source,
        })?;

        let now = unix_seconds(self.time_source.now());
        if record.access_key_id.is_empty() || record.expires <= now {
            tracing::debug!(key = %key, expires = record.expires, "cached credentials expired");
            return Ok(None);
        }

        let expires = UNIX_EPOCH + Duration::from_secs(record.expires.unsigned_abs());
        Ok(Some(CachedCredentials {
            credentials: Credentials::new(
                record.access_key_id.clone(),
                record.secret_access_key.clone(),
                Some(record.session_token.clone()),
                Some(expires),
                "Cache",
            ),
            expires,
        }))
    }

    /// Store `value` under `key`, replacing any previous entry
    ///
    /// Creates the cache directory, and its parents, when missing.
    pub async fn write(&self, key: &CacheKey, value: &CachedCredentials) -> Result<(), CacheError> {
        create_private_dir(&self.dir)
            .await
            .map_err(|source| CacheError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let record = CacheRecord {
            access_key_id: value.credentials.access_key_id().to_string(),
            secret_access_key: value.credentials.secret_access_key().to_string(),
            session_token: value
                .credentials
                .session_token()
                .unwrap_or_default()
                .to_string(),
            expires: unix_seconds(value.expires),
        };
        let mut contents = serde_json::to_vec(&record).map_err(CacheError::Serialize)?;

        let path = self.path(key);
        let written = write_replace(&path, &contents).await;
        contents.zeroize();
        written.map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(key = %key, path = %path.display(), "cached credentials");
        Ok(())
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => i64::try_from(since_epoch.as_secs()).unwrap_or(i64::MAX),
        Err(before_epoch) => -i64::try_from(before_epoch.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

async fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await
}

async fn write_replace(path: &Path, contents: &[u8]) -> io::Result<()> {
    let suffix = random_hex(4).map_err(|_| {
        io::Error::new(io::ErrorKind::Other, "failed to generate temporary file name")
    })?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".{}.tmp", suffix));
    let tmp_path = PathBuf::from(tmp_name);

    let result = write_new_private(&tmp_path, contents).await;
    let result = match result {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(err) => Err(err),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_new_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
