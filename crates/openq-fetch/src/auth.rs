//! Applying [`AuthConfig`] to outgoing requests.

use openq_core::{AuthConfig, AuthLocation};

/// Apply authentication to a reqwest RequestBuilder.
pub(crate) fn apply_to_request(
    auth: &AuthConfig,
    builder: reqwest::RequestBuilder,
) -> reqwest::RequestBuilder {
    match auth {
        AuthConfig::None => builder,
        AuthConfig::ApiKey {
            location,
            name,
            key,
        } => match location {
            AuthLocation::Header => builder.header(name, key),
            AuthLocation::Query => builder.query(&[(name, key)]),
        },
        AuthConfig::Bearer { token } => builder.bearer_auth(token),
        AuthConfig::Basic { username, password } => builder.basic_auth(username, Some(password)),
    }
}
