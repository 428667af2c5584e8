//! Provider backed by a token the host already holds (direct domain/token configuration).

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	provider::{
		AuthorizationRequired, IdentityProvider, InteractiveTokenRequest, ProviderConfiguration,
		ProviderError, ProviderFuture, SilentTokenRequest,
	},
};

/// Serves a host-supplied token for every audience and scope.
///
/// Silent retrieval fails with `login_required` while no token is set, which lets the manager
/// escalate; interactive retrieval is unsupported.
#[derive(Default)]
pub struct FixedTokenProvider {
	domain: Option<String>,
	token: RwLock<Option<AccessToken>>,
}
impl FixedTokenProvider {
	/// Creates a provider for `domain` serving `token`.
	pub fn new(domain: impl Into<String>, token: AccessToken) -> Self {
		Self { domain: Some(domain.into()), token: RwLock::new(Some(token)) }
	}

	/// Replaces the served token (e.g., after the host rotated it).
	pub fn set_token(&self, token: Option<AccessToken>) {
		*self.token.write() = token;
	}
}
impl IdentityProvider for FixedTokenProvider {
	fn fetch_token_silently(
		&self,
		_request: SilentTokenRequest,
	) -> ProviderFuture<'_, AccessToken> {
		let token = self.token.read().clone();

		Box::pin(async move {
			token.ok_or(ProviderError::AuthorizationRequired {
				kind: AuthorizationRequired::LoginRequired,
				description: Some("No token has been supplied by the host.".into()),
			})
		})
	}

	fn fetch_token_interactive(
		&self,
		_request: InteractiveTokenRequest,
	) -> ProviderFuture<'_, Option<AccessToken>> {
		Box::pin(async { Err(ProviderError::InteractionUnavailable) })
	}

	fn configuration(&self) -> Option<ProviderConfiguration> {
		Some(ProviderConfiguration { domain: self.domain.clone() })
	}
}
impl Debug for FixedTokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FixedTokenProvider")
			.field("domain", &self.domain)
			.field("token_set", &self.token.read().is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn request() -> SilentTokenRequest {
		SilentTokenRequest {
			audience: "https://tenant.example.com/mfa/".into(),
			scope: "read:me".into(),
			cache_bypass: false,
		}
	}

	#[tokio::test]
	async fn serves_the_host_token_until_cleared() {
		let provider =
			FixedTokenProvider::new("tenant.example.com", AccessToken::new("host-token"));
		let token =
			provider.fetch_token_silently(request()).await.expect("Host token should be served.");

		assert_eq!(token.expose(), "host-token");
		assert_eq!(
			provider.configuration().and_then(|config| config.domain).as_deref(),
			Some("tenant.example.com")
		);

		provider.set_token(None);

		let err = provider.fetch_token_silently(request()).await.expect_err("No token is set.");

		assert_eq!(err.authorization_required(), Some(AuthorizationRequired::LoginRequired));
		assert!(!format!("{provider:?}").contains("host-token"));
	}
}
