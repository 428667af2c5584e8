//! OAuth 2.0 refresh-token backend for [`IdentityProvider`].
//!
//! [`OAuthProvider`] retrieves tokens silently through the `refresh_token` grant against
//! `{domain}oauth/token`, passing the audience as an extra parameter. Issued tokens are cached per
//! audience/scope until shortly before they expire; a request with `cache_bypass` skips the cache
//! and replaces the entry. Exchanges run one at a time, so a rotated refresh token replaces the
//! stored one before the next exchange reads it. Interactive retrieval is delegated to a
//! host-supplied [`InteractiveAuthorizer`].

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{self, AccessToken},
	error::ConfigError,
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		IdentityProvider, InteractiveTokenRequest, ProviderConfiguration, ProviderError,
		ProviderFuture, SilentTokenRequest,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type CacheKey = (String, String);

const TOKEN_PATH: &str = "oauth/token";
const AUDIENCE_PARAM: &str = "audience";
const DEFAULT_LEEWAY: Duration = Duration::seconds(60);

/// Host hook that runs an interactive flow (popup, redirect, device prompt).
pub trait InteractiveAuthorizer
where
	Self: Send + Sync,
{
	/// Runs the flow for `request`; `Ok(None)` means it finished without a token.
	fn authorize(
		&self,
		request: InteractiveTokenRequest,
	) -> ProviderFuture<'_, Option<AccessToken>>;
}

#[derive(Clone)]
struct CachedToken {
	token: AccessToken,
	expires_at: OffsetDateTime,
}

/// Refresh-token backed identity provider.
pub struct OAuthProvider {
	domain: Url,
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
	refresh_token: RwLock<Option<String>>,
	// Serializes exchanges; each one presents, and may rotate, the stored refresh token.
	rotation: AsyncMutex<()>,
	cache: Mutex<HashMap<CacheKey, CachedToken>>,
	leeway: Duration,
	authorizer: Option<Arc<dyn InteractiveAuthorizer>>,
}
impl OAuthProvider {
	/// Returns a builder for [`OAuthProvider`].
	pub fn builder() -> OAuthProviderBuilder {
		OAuthProviderBuilder::default()
	}

	/// Normalized provider domain.
	pub fn domain(&self) -> &Url {
		&self.domain
	}

	/// Replaces the stored refresh token (e.g., after an interactive sign-in).
	pub fn set_refresh_token(&self, refresh_token: Option<String>) {
		*self.refresh_token.write() = refresh_token;
	}

	/// Returns `true` while a refresh token is stored.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.read().is_some()
	}

	/// Drops every cached access token.
	pub fn clear_cache(&self) {
		self.cache.lock().clear();
	}

	fn cached(&self, key: &CacheKey) -> Option<AccessToken> {
		let cache = self.cache.lock();
		let entry = cache.get(key)?;

		(OffsetDateTime::now_utc() + self.leeway < entry.expires_at).then(|| entry.token.clone())
	}

	fn store(&self, key: CacheKey, token: AccessToken, expires_in: Option<std::time::Duration>) {
		let expires_at = expires_in
			.and_then(|value| Duration::try_from(value).ok())
			.and_then(|value| OffsetDateTime::now_utc().checked_add(value));
		let mut cache = self.cache.lock();

		match expires_at {
			Some(expires_at) => {
				cache.insert(key, CachedToken { token, expires_at });
			},
			// Without a lifetime the token cannot be reused safely.
			None => {
				cache.remove(&key);
			},
		}
	}

	async fn refresh(&self, request: SilentTokenRequest) -> Result<AccessToken, ProviderError> {
		let key = (request.audience, request.scope);
		let cached = if request.cache_bypass { None } else { self.cached(&key) };

		if let Some(token) = cached {
			return Ok(token);
		}

		let _rotation = self.rotation.lock().await;
		// An exchange that held the lock meanwhile may have filled this entry.
		let cached = if request.cache_bypass { None } else { self.cached(&key) };

		if let Some(token) = cached {
			return Ok(token);
		}

		let refresh_token =
			self.refresh_token.read().clone().ok_or(ProviderError::MissingRefreshToken)?;
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.instrumented(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token);
		let mut exchange = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.add_extra_param(AUDIENCE_PARAM, key.0.clone());

		for scope in key.1.split_whitespace() {
			exchange = exchange.add_scope(Scope::new(scope.to_owned()));
		}

		let response = exchange
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(meta.take(), err))?;
		let token = AccessToken::new(response.access_token().secret().to_owned());

		if let Some(rotated) = response.refresh_token() {
			self.set_refresh_token(Some(rotated.secret().to_owned()));
		}

		self.store(key, token.clone(), response.expires_in());

		Ok(token)
	}
}
impl IdentityProvider for OAuthProvider {
	fn fetch_token_silently(&self, request: SilentTokenRequest) -> ProviderFuture<'_, AccessToken> {
		Box::pin(self.refresh(request))
	}

	fn fetch_token_interactive(
		&self,
		request: InteractiveTokenRequest,
	) -> ProviderFuture<'_, Option<AccessToken>> {
		match &self.authorizer {
			Some(authorizer) => authorizer.authorize(request),
			None => Box::pin(async { Err(ProviderError::InteractionUnavailable) }),
		}
	}

	fn configuration(&self) -> Option<ProviderConfiguration> {
		Some(ProviderConfiguration { domain: Some(self.domain.to_string()) })
	}
}
impl Debug for OAuthProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthProvider")
			.field("domain", &self.domain.as_str())
			.field("refresh_token_set", &self.has_refresh_token())
			.field("cached_tokens", &self.cache.lock().len())
			.field("leeway", &self.leeway)
			.field("authorizer_set", &self.authorizer.is_some())
			.finish()
	}
}

/// Builder for [`OAuthProvider`].
#[derive(Default)]
pub struct OAuthProviderBuilder {
	domain: Option<String>,
	client_id: Option<String>,
	client_secret: Option<String>,
	refresh_token: Option<String>,
	leeway: Option<Duration>,
	http_client: Option<ReqwestClient>,
	authorizer: Option<Arc<dyn InteractiveAuthorizer>>,
}
impl OAuthProviderBuilder {
	/// Sets the provider domain (host or absolute URL).
	pub fn domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets a client secret, sent in the request body.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Seeds the refresh token used for silent retrieval.
	pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(refresh_token.into());

		self
	}

	/// Treats cached tokens as expired this long before their actual expiry.
	pub fn cache_leeway(mut self, leeway: Duration) -> Self {
		self.leeway = Some(leeway);

		self
	}

	/// Uses a pre-configured reqwest client (timeouts, proxies, TLS roots).
	pub fn http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Installs the hook used for interactive retrieval.
	pub fn authorizer(mut self, authorizer: Arc<dyn InteractiveAuthorizer>) -> Self {
		self.authorizer = Some(authorizer);

		self
	}

	/// Validates the configuration and builds the provider.
	pub fn build(self) -> Result<OAuthProvider, ConfigError> {
		let domain = self.domain.ok_or(ConfigError::MissingField { field: "domain" })?;
		let client_id = self.client_id.ok_or(ConfigError::MissingField { field: "client_id" })?;
		let domain_url = auth::domain_url(&domain)?;
		let token_url = domain_url
			.join(TOKEN_PATH)
			.map_err(|source| ConfigError::InvalidDomain { domain: domain.clone(), source })?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(client_id)).set_token_uri(TokenUrl::from_url(token_url));

		if let Some(secret) = self.client_secret {
			oauth_client = oauth_client
				.set_client_secret(ClientSecret::new(secret))
				.set_auth_type(AuthType::RequestBody);
		}

		let http_client = match self.http_client {
			Some(client) => ReqwestHttpClient::with_client(client),
			None => ReqwestHttpClient::without_redirects()?,
		};

		Ok(OAuthProvider {
			domain: domain_url,
			oauth_client,
			http_client,
			refresh_token: RwLock::new(self.refresh_token),
			rotation: AsyncMutex::new(()),
			cache: Mutex::new(HashMap::new()),
			leeway: self.leeway.unwrap_or(DEFAULT_LEEWAY),
			authorizer: self.authorizer,
		})
	}
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> ProviderError {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => ProviderError::from_oauth(
			response.error().as_ref(),
			response.error_description().cloned(),
			status,
		),
		RequestTokenError::Request(error) => map_transport_error(error, status),
		RequestTokenError::Parse(error, _body) =>
			ProviderError::MalformedResponse { status, source: Arc::new(error) },
		RequestTokenError::Other(message) => ProviderError::Unexpected { message, status },
	}
}

fn map_transport_error(err: HttpClientError<ReqwestError>, status: Option<u16>) -> ProviderError {
	match err {
		HttpClientError::Reqwest(inner) => ProviderError::transport(*inner),
		HttpClientError::Http(inner) => ProviderError::transport(inner),
		HttpClientError::Io(inner) => ProviderError::transport(inner),
		HttpClientError::Other(message) => ProviderError::Unexpected { message, status },
		_ => ProviderError::Unexpected {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		},
	}
}
