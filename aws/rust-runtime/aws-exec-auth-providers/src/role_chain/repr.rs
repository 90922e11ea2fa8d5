/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Flattened representation of a role chain
//!
//! Validation happens entirely here, before the first credentials are requested.

use super::RoleChainError;
use crate::arn::is_arn;
use crate::named::NamedProviderFactory;

/// Where the credentials used to assume the first role come from
#[derive(Debug, PartialEq, Eq)]
pub(super) enum BaseCredentials<'a> {
    /// Static credentials passed in with the input
    Static,
    /// No credentials: the first role is assumed with an unsigned request
    Anonymous,
    /// Credentials from the seed provider registered under this alias
    Named(&'a str),
}

#[derive(Debug)]
pub(super) struct RoleChain<'a> {
    pub(super) base: BaseCredentials<'a>,
    /// Role ARNs, assumed in order
    pub(super) roles: Vec<&'a str>,
}

/// Trim every link and drop blank ones, e.g. from a trailing `,` in the flag value
pub(super) fn trimmed_links(chain: &[String]) -> Vec<&str> {
    chain
        .iter()
        .map(|link| link.trim())
        .filter(|link| !link.is_empty())
        .collect()
}

pub(super) fn resolve_chain<'a>(
    links: &[&'a str],
    has_static_credentials: bool,
    seeds: &NamedProviderFactory,
) -> Result<RoleChain<'a>, RoleChainError> {
    let first = *links.first().ok_or(RoleChainError::EmptyChain)?;
    let (base, roles) = if has_static_credentials {
        if !is_arn(first) {
            return Err(RoleChainError::StaticCredentialsRequireArn {
                link: first.to_string(),
            });
        }
        (BaseCredentials::Static, links)
    } else if is_arn(first) {
        (BaseCredentials::Anonymous, links)
    } else if seeds.contains(first) {
        (BaseCredentials::Named(first), &links[1..])
    } else {
        return Err(RoleChainError::UnrecognizedAlias(first.to_string()));
    };

    if let Some(link) = roles.iter().find(|link| !is_arn(link)) {
        return Err(RoleChainError::InvalidChainLink {
            link: link.to_string(),
            chain: links.join(","),
        });
    }

    Ok(RoleChain {
        base,
        roles: roles.to_vec(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::named::{ENV_TRIPLE_ALIAS, INSTANCE_ALIAS};
    use aws_credential_types::Credentials;
    use aws_types::os_shim_internal::Env;

    const ROLE_A: &str = "arn:aws:iam::123456789012:role/a";
    const ROLE_B: &str = "arn:aws:iam::123456789012:role/b";

    fn seeds() -> NamedProviderFactory {
        NamedProviderFactory::builder()
            .env(Env::from_slice(&[]))
            .provider(INSTANCE_ALIAS, Credentials::new("a", "b", None, None, "test"))
            .build()
    }

    #[test]
    fn alias_then_roles() {
        let links = [INSTANCE_ALIAS, ROLE_A, ROLE_B];
        let chain = resolve_chain(&links, false, &seeds()).expect("valid chain");
        assert_eq!(chain.base, BaseCredentials::Named(INSTANCE_ALIAS));
        assert_eq!(chain.roles, vec![ROLE_A, ROLE_B]);
    }

    #[test]
    fn alias_alone() {
        let links = [ENV_TRIPLE_ALIAS];
        let chain = resolve_chain(&links, false, &seeds()).expect("valid chain");
        assert_eq!(chain.base, BaseCredentials::Named(ENV_TRIPLE_ALIAS));
        assert!(chain.roles.is_empty());
    }

    #[test]
    fn arn_first_is_anonymous() {
        let links = [ROLE_A, ROLE_B];
        let chain = resolve_chain(&links, false, &seeds()).expect("valid chain");
        assert_eq!(chain.base, BaseCredentials::Anonymous);
        assert_eq!(chain.roles, vec![ROLE_A, ROLE_B]);
    }

    #[test]
    fn static_credentials_assume_first_link() {
        let links = [ROLE_A];
        let chain = resolve_chain(&links, true, &seeds()).expect("valid chain");
        assert_eq!(chain.base, BaseCredentials::Static);
        assert_eq!(chain.roles, vec![ROLE_A]);

        let links = [INSTANCE_ALIAS, ROLE_A];
        let err = resolve_chain(&links, true, &seeds()).expect_err("alias with static creds");
        assert!(matches!(
            err,
            RoleChainError::StaticCredentialsRequireArn { .. }
        ));
    }

    #[test]
    fn alias_not_first() {
        let links = [INSTANCE_ALIAS, ROLE_A, ENV_TRIPLE_ALIAS];
        let err = resolve_chain(&links, false, &seeds()).expect_err("alias in second position");
        match err {
            RoleChainError::InvalidChainLink { link, chain } => {
                assert_eq!(link, ENV_TRIPLE_ALIAS);
                assert_eq!(chain, format!("instance,{},env-triple", ROLE_A));
            }
            other => panic!("incorrect error variant: {:?}", other),
        }
    }

    #[test]
    fn unknown_alias() {
        let links = ["profile", ROLE_A];
        let err = resolve_chain(&links, false, &seeds()).expect_err("unknown alias");
        assert_eq!(err.to_string(), "role chain first-link alias [profile] is not recognized");
    }

    #[test]
    fn empty_chain() {
        let chain = vec![" ".to_string(), String::new()];
        let links = trimmed_links(&chain);
        assert!(links.is_empty());
        let err = resolve_chain(&links, false, &seeds()).expect_err("empty chain");
        assert!(matches!(err, RoleChainError::EmptyChain));
    }
}
