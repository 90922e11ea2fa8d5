/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use ring::rand::{SecureRandom, SystemRandom};

/// Prefix of generated `AssumeRole` session names
pub const SESSION_NAME_PREFIX: &str = "aws-exec-cmd-";

/// Random bytes in the suffix of a generated session name, encoded as twice as many hex characters
const SUFFIX_BYTES: usize = 2;

/// Generate a session name for `AssumeRole`
///
/// STS requires a session name. When none is configured, use a fixed prefix followed by four hex
/// characters from the system CSPRNG so concurrent invocations rarely collide.
pub fn default_session_name() -> Result<String, ring::error::Unspecified> {
    Ok(format!("{}{}", SESSION_NAME_PREFIX, random_hex(SUFFIX_BYTES)?))
}

/// `len` random bytes, hex encoded
pub(crate) fn random_hex(len: usize) -> Result<String, ring::error::Unspecified> {
    let mut buf = vec![0u8; len];
    SystemRandom::new().fill(&mut buf)?;
    Ok(hex::encode(buf))
}
