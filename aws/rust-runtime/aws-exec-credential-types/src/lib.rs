/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credentials for `aws-exec-cmd`
//!
//! This crate holds the types shared by every credentials provider:
//!
//! - [`Credentials`]: the access key / secret key / session token triple handed to the executed command
//! - [`ProvideCredentials`](provider::ProvideCredentials): the capability implemented by the role
//!   chain resolver and by federated login. The credential broker is written once against it.
//!
//! ## Implementing a provider
//! Define an inherent `async fn` and box it from the trait implementation:
//! ```rust
//! use aws_exec_credential_types::provider::{self, BoxFuture, ProvideCredentials, ProviderInput};
//! use aws_exec_credential_types::Credentials;
//!
//! struct FixedProvider;
//!
//! impl FixedProvider {
//!     async fn load(&self, _input: &ProviderInput) -> provider::Result {
//!         Ok(Credentials::new("AKID", "SECRET", None, None, "Fixed"))
//!     }
//! }
//!
//! impl ProvideCredentials for FixedProvider {
//!     fn provide_credentials<'a>(&'a self, input: &'a ProviderInput) -> BoxFuture<'a, provider::Result>
//!     where
//!         Self: 'a,
//!     {
//!         Box::pin(self.load(input))
//!     }
//! }
//! ```

pub mod credentials;
pub mod provider;

pub use credentials::Credentials;
pub use provider::{CredentialsError, ProvideCredentials, ProviderInput};
