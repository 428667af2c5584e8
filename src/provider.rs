//! Identity-provider capability consumed by the token manager.
//!
//! [`IdentityProvider`] exposes silent retrieval, interactive retrieval, and a configuration
//! lookup. Failures come back as [`ProviderError`], whose
//! [`AuthorizationRequired`](ProviderError::AuthorizationRequired) variant carries the closed set
//! of codes that justify an interactive escalation; everything else is terminal for the request.

pub mod fixed;

pub use fixed::FixedTokenProvider;

// self
use crate::{_prelude::*, auth::AccessToken, error::SharedError};

/// Boxed future returned by [`IdentityProvider`] operations.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ProviderError>> + 'a + Send>>;

/// Capability object that retrieves tokens from an identity provider.
///
/// Implementations must be `Send + Sync` so one provider can back every request issued through a
/// shared manager. Timeouts, if any, belong to the implementation.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Retrieves a token without user interaction.
	fn fetch_token_silently(&self, request: SilentTokenRequest) -> ProviderFuture<'_, AccessToken>;

	/// Retrieves a token through a flow that may prompt the user.
	///
	/// `Ok(None)` means the flow finished without producing a token.
	fn fetch_token_interactive(
		&self,
		request: InteractiveTokenRequest,
	) -> ProviderFuture<'_, Option<AccessToken>>;

	/// Provider-side configuration used as a fallback domain source.
	fn configuration(&self) -> Option<ProviderConfiguration> {
		None
	}
}

/// Parameters for [`IdentityProvider::fetch_token_silently`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilentTokenRequest {
	/// Audience URL the token is scoped to.
	pub audience: String,
	/// Space-delimited scopes.
	pub scope: String,
	/// Skip any provider-level token cache.
	pub cache_bypass: bool,
}

/// Parameters for [`IdentityProvider::fetch_token_interactive`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveTokenRequest {
	/// Audience URL the token is scoped to.
	pub audience: String,
	/// Space-delimited scopes.
	pub scope: String,
	/// Prompt the interactive flow should show.
	pub prompt: Prompt,
}

/// Provider configuration visible to the token manager.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
	/// Identity-provider domain, when the provider knows it.
	pub domain: Option<String>,
}

/// Prompt requested from an interactive flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
	/// Force the user to authenticate again.
	Login,
	/// Ask the user to grant the requested scopes.
	Consent,
}
impl Prompt {
	/// Returns the OAuth `prompt` parameter value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Prompt::Login => "login",
			Prompt::Consent => "consent",
		}
	}
}
impl Display for Prompt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Authorization failures that an interactive flow can resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationRequired {
	/// `consent_required`: the user has not granted the requested scopes.
	ConsentRequired,
	/// `login_required`: the session is gone and the user must sign in again.
	LoginRequired,
	/// `mfa_required`: the audience demands a second factor.
	MfaRequired,
}
impl AuthorizationRequired {
	/// Classifies an OAuth `error` code, returning `None` for codes outside the recoverable set.
	pub fn from_code(code: &str) -> Option<Self> {
		match code {
			"consent_required" => Some(Self::ConsentRequired),
			"login_required" => Some(Self::LoginRequired),
			"mfa_required" => Some(Self::MfaRequired),
			_ => None,
		}
	}

	/// Returns the OAuth `error` code.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ConsentRequired => "consent_required",
			Self::LoginRequired => "login_required",
			Self::MfaRequired => "mfa_required",
		}
	}

	/// Prompt the interactive escalation should request.
	pub const fn prompt(self) -> Prompt {
		match self {
			Self::LoginRequired => Prompt::Login,
			Self::ConsentRequired | Self::MfaRequired => Prompt::Consent,
		}
	}
}
impl Display for AuthorizationRequired {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failures surfaced by an [`IdentityProvider`].
#[derive(Clone, Debug, ThisError)]
pub enum ProviderError {
	/// The provider needs user interaction before it can issue the token.
	#[error("Identity provider requires user interaction: {kind}.")]
	AuthorizationRequired {
		/// Recoverable authorization failure.
		kind: AuthorizationRequired,
		/// Provider-supplied `error_description`.
		description: Option<String>,
	},
	/// The provider rejected the request with an OAuth error outside the recoverable set.
	#[error("Identity provider returned OAuth error `{code}`.")]
	OAuth {
		/// OAuth `error` code.
		code: String,
		/// Provider-supplied `error_description`.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Network failure (DNS, TCP, TLS, IO) while calling the provider.
	#[error("Network error occurred while calling the identity provider.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// The provider answered with a body that could not be parsed.
	#[error("Identity provider returned a malformed response.")]
	MalformedResponse {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured parsing failure.
		#[source]
		source: SharedError,
	},
	/// The provider answered in an unexpected way.
	#[error("Identity provider returned an unexpected response: {message}.")]
	Unexpected {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Silent retrieval needs a refresh token, but none is available.
	#[error("No refresh token is available for silent retrieval.")]
	MissingRefreshToken,
	/// The provider cannot run interactive flows.
	#[error("Identity provider does not support interactive retrieval.")]
	InteractionUnavailable,
}
impl ProviderError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { source: Arc::new(src) }
	}

	/// Classifies an OAuth error response.
	pub fn from_oauth(code: &str, description: Option<String>, status: Option<u16>) -> Self {
		match AuthorizationRequired::from_code(code) {
			Some(kind) => Self::AuthorizationRequired { kind, description },
			None => Self::OAuth { code: code.to_owned(), description, status },
		}
	}

	/// Returns the recoverable authorization failure, if this is one.
	pub fn authorization_required(&self) -> Option<AuthorizationRequired> {
		match self {
			Self::AuthorizationRequired { kind, .. } => Some(*kind),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recoverable_codes_map_to_prompts() {
		let cases = [
			("login_required", Prompt::Login),
			("consent_required", Prompt::Consent),
			("mfa_required", Prompt::Consent),
		];

		for (code, prompt) in cases {
			let kind = AuthorizationRequired::from_code(code)
				.expect("Recoverable codes should classify.");

			assert_eq!(kind.as_str(), code);
			assert_eq!(kind.prompt(), prompt);
		}

		assert_eq!(AuthorizationRequired::from_code("access_denied"), None);
		assert_eq!(AuthorizationRequired::from_code("LOGIN_REQUIRED"), None);
	}

	#[test]
	fn oauth_errors_classify_on_construction() {
		let recoverable = ProviderError::from_oauth("mfa_required", None, Some(403));

		assert_eq!(recoverable.authorization_required(), Some(AuthorizationRequired::MfaRequired));

		let terminal =
			ProviderError::from_oauth("invalid_grant", Some("expired".into()), Some(400));

		assert!(matches!(
			terminal,
			ProviderError::OAuth { ref code, .. } if code == "invalid_grant"
		));
		assert_eq!(terminal.authorization_required(), None);
	}

	#[test]
	fn prompt_serializes_as_oauth_value() {
		let payload = serde_json::to_string(&Prompt::Consent).expect("Prompt should serialize.");

		assert_eq!(payload, "\"consent\"");
		assert_eq!(Prompt::Login.to_string(), "login");
	}
}
