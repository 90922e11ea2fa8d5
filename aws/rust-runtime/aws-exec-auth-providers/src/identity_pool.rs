/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Identity Pool Credential Provider
//!
//! Logs in to a Cognito identity pool with an ID token from an external identity provider:
//! `GetId` finds (or creates) the identity for the token, then `GetCredentialsForIdentity` returns
//! its temporary credentials.
//!
//! The ID token is either provided directly or obtained by exchanging a Google refresh token.

use crate::environment::region_from_env;
use crate::oauth::{ExchangeRefreshToken, RefreshTokenExchange, RefreshTokenRequest};
use aws_exec_credential_types::provider::{
    self, BoxError, BoxFuture, CredentialsError, ProvideCredentials, ProviderInput,
};
use aws_exec_credential_types::Credentials;
use aws_sdk_cognitoidentity::config::retry::RetryConfig;
use aws_sdk_cognitoidentity::config::{BehaviorVersion, Region};
use aws_types::os_shim_internal::Env;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use zeroize::Zeroizing;

/// Provider name Cognito uses for Google ID tokens
pub const GOOGLE_PROVIDER_NAME: &str = "accounts.google.com";

const PROVIDER_NAME: &str = "IdentityPool";

/// Where the provider ID token comes from
#[derive(Clone)]
pub enum IdTokenSource {
    Token(Zeroizing<String>),
    Refresh {
        refresh_token: Zeroizing<String>,
        client_id: String,
        client_secret: Zeroizing<String>,
    },
}

impl Debug for IdTokenSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IdTokenSource::Token(_) => f.write_str("Token(** redacted **)"),
            IdTokenSource::Refresh { client_id, .. } => f
                .debug_struct("Refresh")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Invalid identity pool settings
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("an identity pool ID is required")]
    MissingPoolId,
    #[error("a provider name is required, e.g. {}", GOOGLE_PROVIDER_NAME)]
    MissingProviderName,
    #[error("must input --token or --refresh")]
    MissingToken,
    #[error("only input --token or --refresh")]
    ConflictingTokens,
    #[error("--refresh is not supported for provider {0}")]
    RefreshUnsupported(String),
    #[error("--refresh requires --client-id")]
    MissingClientId,
    #[error("--refresh requires --client-secret")]
    MissingClientSecret,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IdentityPoolError {
    #[error("failed to refresh the ID token for provider [{provider_name}]")]
    Refresh {
        provider_name: String,
        #[source]
        source: crate::oauth::RefreshError,
    },

    #[error("failed to get credentials from pool [{pool_id}] using provider [{provider_name}] with [{token_len}] length token")]
    Login {
        pool_id: String,
        provider_name: String,
        token_len: usize,
        #[source]
        source: BoxError,
    },
}

/// A `GetId` + `GetCredentialsForIdentity` login
#[derive(Debug)]
pub struct IdentityLoginRequest<'a> {
    pub pool_id: &'a str,
    pub provider_name: &'a str,
    pub id_token: &'a str,
    pub region: Option<String>,
}

pub trait IdentityLogin: Send + Sync {
    fn login<'a>(
        &'a self,
        request: IdentityLoginRequest<'a>,
    ) -> BoxFuture<'a, Result<Credentials, BoxError>>
    where
        Self: 'a;
}

/// Cognito identity login, one attempt per call
#[derive(Debug, Default)]
pub struct CognitoIdentityLogin {
    _private: (),
}

impl CognitoIdentityLogin {
    pub fn new() -> Self {
        Self::default()
    }

    async fn single_login(&self, request: IdentityLoginRequest<'_>) -> Result<Credentials, BoxError> {
        let conf = aws_sdk_cognitoidentity::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled())
            .region(request.region.map(Region::new))
            .build();
        let client = aws_sdk_cognitoidentity::Client::from_conf(conf);

        let identity = client
            .get_id()
            .identity_pool_id(request.pool_id)
            .logins(request.provider_name, request.id_token)
            .send()
            .await?;
        let identity_id = identity
            .identity_id()
            .ok_or("GetId response did not contain an identity ID")?;
        tracing::debug!(identity_id, "found pool identity");

        let response = client
            .get_credentials_for_identity()
            .identity_id(identity_id)
            .logins(request.provider_name, request.id_token)
            .send()
            .await?;
        let credentials = response
            .credentials()
            .ok_or("GetCredentialsForIdentity response did not contain credentials")?;
        into_credentials(credentials)
    }
}

fn into_credentials(
    credentials: &aws_sdk_cognitoidentity::types::Credentials,
) -> Result<Credentials, BoxError> {
    let access_key_id = credentials
        .access_key_id()
        .filter(|value| !value.is_empty())
        .ok_or("GetCredentialsForIdentity response did not contain an access key ID")?;
    let secret_key = credentials
        .secret_key()
        .filter(|value| !value.is_empty())
        .ok_or("GetCredentialsForIdentity response did not contain a secret key")?;
    let session_token = credentials
        .session_token()
        .filter(|value| !value.is_empty())
        .ok_or("GetCredentialsForIdentity response did not contain a session token")?;
    let expiry = credentials
        .expiration()
        .and_then(|expiration| u64::try_from(expiration.secs()).ok())
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
    Ok(Credentials::new(
        access_key_id,
        secret_key,
        Some(session_token.to_string()),
        expiry,
        PROVIDER_NAME,
    ))
}

impl IdentityLogin for CognitoIdentityLogin {
    fn login<'a>(
        &'a self,
        request: IdentityLoginRequest<'a>,
    ) -> BoxFuture<'a, Result<Credentials, BoxError>>
    where
        Self: 'a,
    {
        Box::pin(self.single_login(request))
    }
}

/// Credentials provider backed by a Cognito identity pool
///
/// MFA settings and the role chain in the [`ProviderInput`] do not apply to identity pools and are
/// ignored.
pub struct IdentityPoolProvider {
    pool_id: String,
    provider_name: String,
    source: IdTokenSource,
    region: Option<String>,
    login: Arc<dyn IdentityLogin>,
    refresh: Arc<dyn ExchangeRefreshToken>,
}

impl IdentityPoolProvider {
    pub fn builder() -> Builder {
        Builder::default()
    }

    async fn id_token(&self) -> Result<Zeroizing<String>, IdentityPoolError> {
        match &self.source {
            IdTokenSource::Token(token) => Ok(token.clone()),
            IdTokenSource::Refresh {
                refresh_token,
                client_id,
                client_secret,
            } => {
                let request = RefreshTokenRequest {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                };
                self.refresh
                    .id_token(&request)
                    .await
                    .map_err(|source| IdentityPoolError::Refresh {
                        provider_name: self.provider_name.clone(),
                        source,
                    })
            }
        }
    }

    async fn credentials(&self, input: &ProviderInput) -> provider::Result {
        if input.mfa_serial.is_some() {
            tracing::warn!("MFA serial is ignored by identity pool logins");
        }
        let id_token = self
            .id_token()
            .await
            .map_err(|err| CredentialsError::provider_error(PROVIDER_NAME, err))?;
        self.login
            .login(IdentityLoginRequest {
                pool_id: &self.pool_id,
                provider_name: &self.provider_name,
                id_token: &id_token,
                region: self.region.clone(),
            })
            .await
            .map_err(|source| {
                CredentialsError::provider_error(
                    PROVIDER_NAME,
                    IdentityPoolError::Login {
                        pool_id: self.pool_id.clone(),
                        provider_name: self.provider_name.clone(),
                        token_len: id_token.len(),
                        source,
                    },
                )
            })
    }
}

impl ProvideCredentials for IdentityPoolProvider {
    fn provide_credentials<'a>(&'a self, input: &'a ProviderInput) -> BoxFuture<'a, provider::Result>
    where
        Self: 'a,
    {
        Box::pin(self.credentials(input))
    }
}

#[derive(Default)]
pub struct Builder {
    pool_id: Option<String>,
    provider_name: Option<String>,
    token: Option<Zeroizing<String>>,
    refresh_token: Option<Zeroizing<String>>,
    client_id: Option<String>,
    client_secret: Option<Zeroizing<String>>,
    region: Option<String>,
    env: Option<Env>,
    login: Option<Arc<dyn IdentityLogin>>,
    refresh: Option<Arc<dyn ExchangeRefreshToken>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

impl Builder {
    pub fn pool_id(mut self, pool_id: impl Into<String>) -> Self {
        self.pool_id = Some(pool_id.into());
        self
    }

    pub fn set_pool_id(&mut self, pool_id: Option<String>) -> &mut Self {
        self.pool_id = pool_id;
        self
    }

    /// Login provider name, e.g. `accounts.google.com`
    pub fn provider_name(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    pub fn set_provider_name(&mut self, provider_name: Option<String>) -> &mut Self {
        self.provider_name = provider_name;
        self
    }

    /// ID token issued by the login provider
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Zeroizing::new(token.into()));
        self
    }

    pub fn set_token(&mut self, token: Option<String>) -> &mut Self {
        self.token = non_empty(token).map(Zeroizing::new);
        self
    }

    /// Refresh token exchanged for an ID token on every login
    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Zeroizing::new(refresh_token.into()));
        self
    }

    pub fn set_refresh_token(&mut self, refresh_token: Option<String>) -> &mut Self {
        self.refresh_token = non_empty(refresh_token).map(Zeroizing::new);
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn set_client_id(&mut self, client_id: Option<String>) -> &mut Self {
        self.client_id = client_id;
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(Zeroizing::new(client_secret.into()));
        self
    }

    pub fn set_client_secret(&mut self, client_secret: Option<String>) -> &mut Self {
        self.client_secret = non_empty(client_secret).map(Zeroizing::new);
        self
    }

    /// Set the Cognito region. When unset, `AWS_REGION` or `AWS_DEFAULT_REGION` is used.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[doc(hidden)]
    /// Override the environment used for region lookup
    ///
    /// This method exists primarily for testing credential providers
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    #[doc(hidden)]
    /// Override the identity login call
    ///
    /// This method exists primarily for testing credential providers
    pub fn login(mut self, login: impl IdentityLogin + 'static) -> Self {
        self.login = Some(Arc::new(login));
        self
    }

    /// Override the refresh token exchange, e.g. to use a different token endpoint
    pub fn refresh(mut self, refresh: impl ExchangeRefreshToken + 'static) -> Self {
        self.refresh = Some(Arc::new(refresh));
        self
    }

    /// Validate the settings and build the provider
    ///
    /// Exactly one of the ID token and refresh token must be set. Refresh tokens are only
    /// supported for Google and require the OAuth client ID and secret.
    pub fn build(self) -> Result<IdentityPoolProvider, ConfigError> {
        let pool_id = non_empty(self.pool_id).ok_or(ConfigError::MissingPoolId)?;
        let provider_name = non_empty(self.provider_name).ok_or(ConfigError::MissingProviderName)?;
        let source = match (self.token, self.refresh_token) {
            (None, None) => return Err(ConfigError::MissingToken),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingTokens),
            (Some(token), None) => IdTokenSource::Token(token),
            (None, Some(refresh_token)) => {
                if provider_name != GOOGLE_PROVIDER_NAME {
                    return Err(ConfigError::RefreshUnsupported(provider_name));
                }
                IdTokenSource::Refresh {
                    refresh_token,
                    client_id: non_empty(self.client_id).ok_or(ConfigError::MissingClientId)?,
                    client_secret: self
                        .client_secret
                        .ok_or(ConfigError::MissingClientSecret)?,
                }
            }
        };
        let env = self.env.unwrap_or_else(Env::real);
        Ok(IdentityPoolProvider {
            pool_id,
            provider_name,
            source,
            region: self.region.or_else(|| region_from_env(&env)),
            login: self
                .login
                .unwrap_or_else(|| Arc::new(CognitoIdentityLogin::new())),
            refresh: self
                .refresh
                .unwrap_or_else(|| Arc::new(RefreshTokenExchange::builder().build())),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::oauth::RefreshError;
    use std::sync::Mutex;
    use aws_sdk_cognitoidentity::primitives::DateTime;
    use aws_sdk_cognitoidentity::types::Credentials as PoolCredentials;

    #[test]
    fn pool_credentials_convert() {
        let creds = into_credentials(
            &PoolCredentials::builder()
                .access_key_id("ASIAPOOL")
                .secret_key("pool-secret")
                .session_token("pool-token")
                .expiration(DateTime::from_secs(1_600_000_900))
                .build(),
        )
        .expect("complete credentials");
        assert_eq!(creds.access_key_id(), "ASIAPOOL");
        assert_eq!(creds.secret_access_key(), "pool-secret");
        assert_eq!(creds.session_token(), Some("pool-token"));
        assert_eq!(
            creds.expiry(),
            Some(UNIX_EPOCH + Duration::from_secs(1_600_000_900))
        );
        assert_eq!(creds.provider_name(), PROVIDER_NAME);
    }

    #[test]
    fn incomplete_pool_credentials_are_rejected() {
        let missing_secret = PoolCredentials::builder()
            .access_key_id("ASIAPOOL")
            .session_token("pool-token")
            .build();
        let err = into_credentials(&missing_secret).expect_err("no secret key");
        assert!(err.to_string().contains("secret key"), "{}", err);

        let empty_key = PoolCredentials::builder()
            .access_key_id("")
            .secret_key("pool-secret")
            .session_token("pool-token")
            .build();
        let err = into_credentials(&empty_key).expect_err("empty access key");
        assert!(err.to_string().contains("access key ID"), "{}", err);
    }

    #[derive(Default)]
    struct RecordingLogin {
        requests: Mutex<Vec<(String, String, String, Option<String>)>>,
    }

    impl IdentityLogin for Arc<RecordingLogin> {
        fn login<'a>(
            &'a self,
            request: IdentityLoginRequest<'a>,
        ) -> BoxFuture<'a, Result<Credentials, BoxError>>
        where
            Self: 'a,
        {
            self.requests.lock().unwrap().push((
                request.pool_id.to_string(),
                request.provider_name.to_string(),
                request.id_token.to_string(),
                request.region,
            ));
            Box::pin(async {
                Ok(Credentials::new(
                    "ASIAPOOL",
                    "pool-secret",
                    Some("pool-token".to_string()),
                    None,
                    PROVIDER_NAME,
                ))
            })
        }
    }

    struct FixedRefresh(Result<&'static str, ()>);

    impl ExchangeRefreshToken for FixedRefresh {
        fn id_token<'a>(
            &'a self,
            request: &'a RefreshTokenRequest,
        ) -> BoxFuture<'a, Result<Zeroizing<String>, RefreshError>>
        where
            Self: 'a,
        {
            assert_eq!(request.client_id, "client");
            let result = match self.0 {
                Ok(token) => Ok(Zeroizing::new(token.to_string())),
                Err(()) => Err(RefreshError::MissingIdToken),
            };
            Box::pin(async move { result })
        }
    }

    fn input() -> ProviderInput {
        ProviderInput {
            role_chain: "ignored".to_string(),
            session_ttl: Duration::from_secs(900),
            ..Default::default()
        }
    }

    fn google() -> Builder {
        IdentityPoolProvider::builder()
            .pool_id("us-west-2:pool")
            .provider_name(GOOGLE_PROVIDER_NAME)
            .env(Env::from_slice(&[("AWS_REGION", "us-west-2")]))
    }

    #[test]
    fn validation() {
        let err = |builder: Builder| builder.build().err().expect("invalid settings");
        assert_eq!(err(google()), ConfigError::MissingToken);
        assert_eq!(
            err(google().token("id").refresh_token("refresh")),
            ConfigError::ConflictingTokens
        );
        assert_eq!(
            err(google().refresh_token("refresh").client_secret("shh")),
            ConfigError::MissingClientId
        );
        assert_eq!(
            err(google().refresh_token("refresh").client_id("client")),
            ConfigError::MissingClientSecret
        );
        assert_eq!(
            err(google()
                .provider_name("graph.facebook.com")
                .refresh_token("refresh")),
            ConfigError::RefreshUnsupported("graph.facebook.com".to_string())
        );
        assert_eq!(
            err(IdentityPoolProvider::builder().token("id")),
            ConfigError::MissingPoolId
        );
        assert!(google().token("id").build().is_ok());
    }

    #[test]
    fn empty_flags_count_as_unset() {
        let mut builder = google();
        builder
            .set_token(Some("id".to_string()))
            .set_refresh_token(Some(String::new()));
        assert!(builder.build().is_ok());
    }

    #[tokio::test]
    async fn logs_in_with_given_token() {
        let login = Arc::new(RecordingLogin::default());
        let provider = google()
            .token("id-token")
            .login(login.clone())
            .build()
            .expect("valid settings");
        let creds = provider
            .provide_credentials(&input())
            .await
            .expect("login succeeds");
        assert_eq!(creds.access_key_id(), "ASIAPOOL");
        assert_eq!(
            login.requests.lock().unwrap().as_slice(),
            &[(
                "us-west-2:pool".to_string(),
                GOOGLE_PROVIDER_NAME.to_string(),
                "id-token".to_string(),
                Some("us-west-2".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn logs_in_with_refreshed_token() {
        let login = Arc::new(RecordingLogin::default());
        let provider = google()
            .refresh_token("refresh")
            .client_id("client")
            .client_secret("shh")
            .refresh(FixedRefresh(Ok("fresh-id-token")))
            .login(login.clone())
            .build()
            .expect("valid settings");
        provider
            .provide_credentials(&input())
            .await
            .expect("login succeeds");
        assert_eq!(login.requests.lock().unwrap()[0].2, "fresh-id-token");
    }

    #[tokio::test]
    async fn refresh_failure_skips_login() {
        let login = Arc::new(RecordingLogin::default());
        let provider = google()
            .refresh_token("refresh")
            .client_id("client")
            .client_secret("shh")
            .refresh(FixedRefresh(Err(())))
            .login(login.clone())
            .build()
            .expect("valid settings");
        let err = provider
            .provide_credentials(&input())
            .await
            .expect_err("refresh fails");
        assert!(matches!(
            err,
            CredentialsError::ProviderError {
                provider: PROVIDER_NAME,
                ..
            }
        ));
        assert!(login.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn debug_redacts_tokens() {
        let debug = format!("{:?}", IdTokenSource::Token(Zeroizing::new("id-token".into())));
        assert!(!debug.contains("id-token"));
    }
}
