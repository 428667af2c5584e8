//! Resource request helpers for reqwest-based API clients.
//!
//! In proxy mode requests go to `{proxy}/{audience_path}/{path}` without credentials; in direct
//! mode they go to `{domain}{audience_path}/{path}` with `Authorization: Bearer <token>`.

// crates.io
use reqwest::RequestBuilder;
// self
use crate::{
	_prelude::*,
	auth::{self, AuthMode},
	error::ConfigError,
	manager::{TokenManager, TokenRequest},
};

impl TokenManager {
	/// Resolves the URL of `path` under `audience_path` for the installed context.
	pub fn resource_url(&self, audience_path: &str, path: &str) -> Result<Url> {
		let context = self.context().ok_or(Error::AuthNotInitialized)?;
		let audience_path = auth::normalize_audience_path(audience_path)?;
		let relative = format!("{audience_path}/{}", path.trim_start_matches('/'));

		match context.mode() {
			AuthMode::Proxy(proxy) => {
				let mut base = proxy.clone();

				if !base.path().ends_with('/') {
					let base_path = format!("{}/", base.path());

					base.set_path(&base_path);
				}

				base.join(&relative).map_err(|source| {
					Error::from(ConfigError::InvalidProxyUrl { url: proxy.to_string(), source })
				})
			},
			AuthMode::Direct => {
				let domain = context.resolve_domain().ok_or(Error::DomainNotConfigured)?;

				auth::domain_url(&domain)?
					.join(&relative)
					.map_err(|source| Error::from(ConfigError::InvalidDomain { domain, source }))
			},
		}
	}

	/// Attaches a bearer token for `request` to `builder`.
	///
	/// In proxy mode the builder is returned untouched.
	pub async fn authorize(
		&self,
		builder: RequestBuilder,
		request: TokenRequest,
	) -> Result<RequestBuilder> {
		match self.get_token(request).await? {
			Some(token) => Ok(builder.bearer_auth(token.expose())),
			None => Ok(builder),
		}
	}
}
