//! Crate-level error types shared by the token manager, auth context, and provider backends.
//!
//! Every error is `Clone`: a single in-flight retrieval hands the same outcome to all callers
//! joined to it, failures included.

// self
use crate::{_prelude::*, provider::ProviderError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// No auth context has been installed on the manager.
	#[error("Auth context is not initialized.")]
	AuthNotInitialized,
	/// Direct mode requires an identity provider, but none was supplied.
	#[error("Identity provider context interface is not initialized.")]
	ContextInterfaceNotInitialized,
	/// Neither the auth context nor the provider configuration supplies a domain.
	#[error("Identity provider domain is not configured.")]
	DomainNotConfigured,
	/// Interactive retrieval completed without producing a token.
	#[error("Interactive token retrieval completed without a token.")]
	InteractiveTokenMissing,
	/// Silent or interactive retrieval failed.
	#[error("Token retrieval failed.")]
	TokenFetchFailed {
		/// Failure reported by the identity provider.
		#[source]
		source: ProviderError,
	},
}
impl From<ProviderError> for Error {
	fn from(source: ProviderError) -> Self {
		Self::TokenFetchFailed { source }
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Domain cannot be turned into an absolute base URL.
	#[error("Domain `{domain}` is not a valid base URL.")]
	InvalidDomain {
		/// Domain as supplied by the caller.
		domain: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Proxy URL cannot be parsed.
	#[error("Auth proxy URL `{url}` is invalid.")]
	InvalidProxyUrl {
		/// Proxy URL as supplied by the caller.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Proxy URL uses a scheme other than `http`/`https`.
	#[error("Auth proxy URL must use http or https: {url}.")]
	UnsupportedProxyScheme {
		/// Offending proxy URL.
		url: String,
	},
	/// Audience path is empty or contains characters that break the audience URL.
	#[error("Audience path `{path}` is invalid.")]
	InvalidAudiencePath {
		/// Offending audience path.
		path: String,
	},
	/// JSON configuration could not be parsed.
	#[error("Auth configuration is invalid at `{path}`.")]
	InvalidConfig {
		/// JSON path of the failing field.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// A required builder field was never set.
	#[error("Missing required field `{field}`.")]
	MissingField {
		/// Builder field name.
		field: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::InvalidConfig { path, source: Arc::new(e.into_inner()) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn provider_errors_surface_as_fetch_failures_with_source() {
		let provider_error = ProviderError::OAuth {
			code: "access_denied".into(),
			description: Some("user blocked".into()),
			status: Some(403),
		};
		let error: Error = provider_error.clone().into();

		assert!(matches!(error, Error::TokenFetchFailed { .. }));

		let source = StdError::source(&error)
			.expect("Fetch failures should expose the provider error as their source.");

		assert_eq!(source.to_string(), provider_error.to_string());
	}

	#[test]
	fn config_errors_keep_the_json_path() {
		let mut de = serde_json::Deserializer::from_str("{\"domain\": 42}");
		let err = serde_path_to_error::deserialize::<_, HashMap<String, String>>(&mut de)
			.expect_err("A numeric domain should not deserialize into a string map.");
		let config_error = ConfigError::from(err);

		assert!(matches!(
			config_error,
			ConfigError::InvalidConfig { ref path, .. } if path == "domain"
		));
	}
}
