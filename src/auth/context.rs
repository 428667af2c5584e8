//! Auth context installed by the host application, plus its serde-backed configuration.
//!
//! A context runs in one of two modes. With an auth proxy URL the host's proxy attaches
//! credentials server-side and no token is ever requested; without one the context talks to an
//! [`IdentityProvider`] for the configured domain.

// self
use crate::{_prelude::*, auth::audience, error::ConfigError, provider::IdentityProvider};

/// Operating mode derived from an [`AuthContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode<'a> {
	/// Requests go through the proxy at the contained URL; tokens are never fetched.
	Proxy(&'a Url),
	/// Tokens are fetched from the identity provider.
	Direct,
}
impl AuthMode<'_> {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthMode::Proxy(_) => "proxy",
			AuthMode::Direct => "direct",
		}
	}
}

/// Authentication configuration for one session.
#[derive(Clone)]
pub struct AuthContext {
	/// Identity-provider domain (host or absolute URL).
	pub domain: Option<String>,
	/// Proxy base URL; presence switches the context into proxy mode.
	pub auth_proxy_url: Option<Url>,
	/// Identity provider used for silent and interactive retrieval in direct mode.
	pub provider: Option<Arc<dyn IdentityProvider>>,
}
impl AuthContext {
	/// Returns a builder for validated contexts.
	pub fn builder() -> AuthContextBuilder {
		AuthContextBuilder::default()
	}

	/// Builds a context from deserialized configuration and an optional provider.
	pub fn from_config(
		config: AuthConfig,
		provider: Option<Arc<dyn IdentityProvider>>,
	) -> Result<Self, ConfigError> {
		let mut builder = Self::builder();

		if let Some(domain) = config.domain {
			builder = builder.domain(domain);
		}
		if let Some(proxy) = config.auth_proxy_url {
			builder = builder.auth_proxy_url(proxy);
		}
		if let Some(provider) = provider {
			builder = builder.provider(provider);
		}

		builder.build()
	}

	/// Returns the active mode.
	pub fn mode(&self) -> AuthMode<'_> {
		match &self.auth_proxy_url {
			Some(url) => AuthMode::Proxy(url),
			None => AuthMode::Direct,
		}
	}

	/// Returns `true` when an auth proxy URL is configured.
	pub fn is_proxy_mode(&self) -> bool {
		self.auth_proxy_url.is_some()
	}

	/// Resolves the domain, preferring the context value over the provider's configuration.
	///
	/// Blank values count as missing.
	pub fn resolve_domain(&self) -> Option<String> {
		let explicit = self.domain.as_deref().map(str::trim).filter(|domain| !domain.is_empty());

		if let Some(domain) = explicit {
			return Some(domain.to_owned());
		}

		self.provider
			.as_ref()
			.and_then(|provider| provider.configuration())
			.and_then(|config| config.domain)
			.map(|domain| domain.trim().to_owned())
			.filter(|domain| !domain.is_empty())
	}
}
impl Debug for AuthContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthContext")
			.field("domain", &self.domain)
			.field("auth_proxy_url", &self.auth_proxy_url.as_ref().map(Url::as_str))
			.field("provider_set", &self.provider.is_some())
			.finish()
	}
}

/// Builder for [`AuthContext`] values.
#[derive(Default)]
pub struct AuthContextBuilder {
	/// Identity-provider domain.
	pub domain: Option<String>,
	/// Raw proxy URL, validated on [`build`](Self::build).
	pub auth_proxy_url: Option<String>,
	/// Identity provider for direct mode.
	pub provider: Option<Arc<dyn IdentityProvider>>,
}
impl AuthContextBuilder {
	/// Sets the identity-provider domain.
	pub fn domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	/// Switches the context into proxy mode.
	pub fn auth_proxy_url(mut self, url: impl Into<String>) -> Self {
		self.auth_proxy_url = Some(url.into());

		self
	}

	/// Sets the identity provider used in direct mode.
	pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
		self.provider = Some(provider);

		self
	}

	/// Consumes the builder and validates the resulting context.
	///
	/// A missing domain or provider is not an error here; token requests report it instead,
	/// since the provider may supply the domain later through its configuration.
	pub fn build(self) -> Result<AuthContext, ConfigError> {
		let domain = self.domain.filter(|domain| !domain.trim().is_empty());

		if let Some(domain) = domain.as_deref() {
			audience::domain_url(domain)?;
		}

		let auth_proxy_url = self.auth_proxy_url.as_deref().map(parse_proxy_url).transpose()?;

		Ok(AuthContext { domain, auth_proxy_url, provider: self.provider })
	}
}
impl Debug for AuthContextBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthContextBuilder")
			.field("domain", &self.domain)
			.field("auth_proxy_url", &self.auth_proxy_url)
			.field("provider_set", &self.provider.is_some())
			.finish()
	}
}

/// Serializable subset of [`AuthContext`] loaded from host configuration.
///
/// Keys are accepted in camelCase (`authProxyUrl`) or snake_case (`auth_proxy_url`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
	/// Identity-provider domain.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	/// Auth proxy base URL.
	#[serde(default, alias = "auth_proxy_url", skip_serializing_if = "Option::is_none")]
	pub auth_proxy_url: Option<String>,
}
impl AuthConfig {
	/// Parses configuration from JSON, reporting the path of the first invalid field.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);

		Ok(serde_path_to_error::deserialize(&mut de)?)
	}
}
impl FromStr for AuthConfig {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_json(s)
	}
}

fn parse_proxy_url(raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw.trim())
		.map_err(|source| ConfigError::InvalidProxyUrl { url: raw.to_owned(), source })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigError::UnsupportedProxyScheme { url: url.to_string() }),
	}
}
