/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential providers and caching for `aws-exec-cmd`
//!
//! - [`role_chain`]: assume a chain of roles, seeded by instance metadata, the environment, or
//!   static credentials
//! - [`identity_pool`]: log in to a Cognito identity pool with a provider ID token
//! - [`broker`]: serve credentials from the on-disk [`cache`] and fall back to a provider

pub mod arn;
pub mod assume_role;
pub mod broker;
pub mod cache;
pub mod environment;
pub mod identity_pool;
pub mod named;
pub mod oauth;
pub mod provider;
pub mod role_chain;
pub mod session_name;

pub use broker::{BrokerConfig, BrokerError, CredentialBroker, MfaSource, PromptMfa};
pub use provider::Provider;
