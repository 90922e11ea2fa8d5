/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! OAuth refresh token exchange
//!
//! Trades a long-lived Google refresh token for a fresh ID token that an identity pool accepts.
//! See <https://developers.google.com/identity/protocols/OAuth2WebServer#offline>.

use aws_exec_credential_types::provider::{BoxError, BoxFuture};
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use serde::Deserialize;
use std::fmt;
use std::fmt::{Debug, Formatter};
use zeroize::{Zeroize, Zeroizing};

pub const GOOGLE_REFRESH_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Token endpoint response to a `refresh_token` grant
#[derive(Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub token_type: String,
}

impl Debug for RefreshResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("access_token", &"** redacted **")
            .field("expires_in", &self.expires_in)
            .field("id_token", &"** redacted **")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl Drop for RefreshResponse {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.id_token.zeroize();
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RefreshError {
    #[error("failed to build refresh request")]
    Request(#[source] BoxError),

    #[error("refresh request failed")]
    Transport(#[source] hyper::Error),

    #[error("refresh request returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("refresh response was not valid JSON")]
    Malformed(#[source] serde_json::Error),

    #[error("refresh response did not contain an id_token")]
    MissingIdToken,
}

/// Client credentials and refresh token for one exchange
pub struct RefreshTokenRequest {
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    pub refresh_token: Zeroizing<String>,
}

impl Debug for RefreshTokenRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenRequest")
            .field("client_id", &self.client_id)
            .field("client_secret", &"** redacted **")
            .field("refresh_token", &"** redacted **")
            .finish()
    }
}

/// Exchange a refresh token for an ID token
pub trait ExchangeRefreshToken: Send + Sync {
    fn id_token<'a>(
        &'a self,
        request: &'a RefreshTokenRequest,
    ) -> BoxFuture<'a, Result<Zeroizing<String>, RefreshError>>
    where
        Self: 'a;
}

/// Refresh token exchange over HTTPS with hyper
pub struct RefreshTokenExchange {
    client: Client<HttpsConnector<HttpConnector>>,
    endpoint: Uri,
}

impl RefreshTokenExchange {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub async fn refresh(
        &self,
        request: &RefreshTokenRequest,
    ) -> Result<RefreshResponse, RefreshError> {
        let form = serde_urlencoded::to_string([
            ("client_id", request.client_id.as_str()),
            ("client_secret", request.client_secret.as_str()),
            ("refresh_token", request.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .map_err(|err| RefreshError::Request(err.into()))?;
        let http_request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(
                hyper::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(Body::from(form))
            .map_err(|err| RefreshError::Request(err.into()))?;

        tracing::debug!(endpoint = %self.endpoint, "requesting ID token refresh");
        let response = self
            .client
            .request(http_request)
            .await
            .map_err(RefreshError::Transport)?;
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(RefreshError::Transport)?;
        if !status.is_success() {
            return Err(RefreshError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(RefreshError::Malformed)
    }
}

impl ExchangeRefreshToken for RefreshTokenExchange {
    fn id_token<'a>(
        &'a self,
        request: &'a RefreshTokenRequest,
    ) -> BoxFuture<'a, Result<Zeroizing<String>, RefreshError>>
    where
        Self: 'a,
    {
        Box::pin(async move {
            let response = self.refresh(request).await?;
            if response.id_token.is_empty() {
                return Err(RefreshError::MissingIdToken);
            }
            Ok(Zeroizing::new(response.id_token.clone()))
        })
    }
}

#[derive(Default)]
pub struct Builder {
    endpoint: Option<Uri>,
}

impl Builder {
    /// Override the token endpoint
    pub fn endpoint(mut self, endpoint: Uri) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn set_endpoint(&mut self, endpoint: Option<Uri>) -> &mut Self {
        self.endpoint = endpoint;
        self
    }

    pub fn build(self) -> RefreshTokenExchange {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        RefreshTokenExchange {
            client: Client::builder().build(connector),
            endpoint: self
                .endpoint
                .unwrap_or_else(|| Uri::from_static(GOOGLE_REFRESH_TOKEN_URL)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Response, Server};
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::net::SocketAddr;

    async fn token_endpoint(request: Request<Body>) -> Result<Response<Body>, Infallible> {
        let body = hyper::body::to_bytes(request.into_body())
            .await
            .expect("request body");
        let form: HashMap<String, String> =
            serde_urlencoded::from_bytes(&body).expect("form encoded");
        let accepted = form.get("grant_type").map(String::as_str) == Some("refresh_token")
            && form.get("client_id").map(String::as_str) == Some("client")
            && form.get("client_secret").map(String::as_str) == Some("shh")
            && form.get("refresh_token").map(String::as_str) == Some("refresh-me");
        let response = if accepted {
            Response::new(Body::from(
                r#"{"access_token":"at","expires_in":3599,"id_token":"header.payload.sig","scope":"openid","token_type":"Bearer"}"#,
            ))
        } else {
            Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::from(r#"{"error":"invalid_grant"}"#))
                .expect("valid response")
        };
        Ok(response)
    }

    fn serve() -> SocketAddr {
        let make_service =
            make_service_fn(|_| async { Ok::<_, Infallible>(service_fn(token_endpoint)) });
        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_service);
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    fn exchange(addr: SocketAddr) -> RefreshTokenExchange {
        RefreshTokenExchange::builder()
            .endpoint(
                format!("http://{}/token", addr)
                    .parse()
                    .expect("valid uri"),
            )
            .build()
    }

    fn request(refresh_token: &str) -> RefreshTokenRequest {
        RefreshTokenRequest {
            client_id: "client".to_string(),
            client_secret: Zeroizing::new("shh".to_string()),
            refresh_token: Zeroizing::new(refresh_token.to_string()),
        }
    }

    #[tokio::test]
    async fn exchange_returns_id_token() {
        let exchange = exchange(serve());
        let id_token = exchange
            .id_token(&request("refresh-me"))
            .await
            .expect("refresh accepted");
        assert_eq!(id_token.as_str(), "header.payload.sig");
    }

    #[tokio::test]
    async fn rejected_refresh_reports_status() {
        let exchange = exchange(serve());
        let err = exchange
            .refresh(&request("stale"))
            .await
            .expect_err("refresh rejected");
        match err {
            RefreshError::Status { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn refresh_response_fields_default_when_absent() {
        let response: RefreshResponse =
            serde_json::from_str(r#"{"id_token":"header.payload.sig","expires_in":3599}"#)
                .expect("valid json");
        assert_eq!(response.id_token, "header.payload.sig");
        assert_eq!(response.expires_in, 3599);
        assert_eq!(response.access_token, "");
        assert_eq!(response.scope, "");
        assert_eq!(response.token_type, "");

        let response: RefreshResponse = serde_json::from_str(
            r#"{"access_token":"at","expires_in":3599,"id_token":"id","scope":"openid","token_type":"Bearer"}"#,
        )
        .expect("valid json");
        assert_eq!(response.access_token, "at");
        assert_eq!(response.scope, "openid");
        assert_eq!(response.token_type, "Bearer");

        let empty: RefreshResponse = serde_json::from_str("{}").expect("valid json");
        assert!(empty.id_token.is_empty());
        assert_eq!(empty.expires_in, 0);
    }

    #[test]
    fn debug_redacts_tokens() {
        let response: RefreshResponse =
            serde_json::from_str(r#"{"id_token":"secret-id","access_token":"secret-at"}"#)
                .expect("valid json");
        let debug = format!("{:?}", response);
        assert!(!debug.contains("secret-id"));
        assert!(!debug.contains("secret-at"));
        assert!(!format!("{:?}", request("refresh-me")).contains("refresh-me"));
    }
}
