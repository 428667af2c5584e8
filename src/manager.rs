//! Token acquisition with per-context deduplication and silent-to-interactive escalation.
//!
//! [`TokenManager::get_token`] validates the installed [`AuthContext`], short-circuits in proxy
//! mode, builds the audience for the requested path, and hands the retrieval to the context's
//! [`RequestDeduplicator`] so identical concurrent requests share one provider call. A silent
//! failure carrying a recoverable authorization code escalates once to interactive retrieval;
//! every other failure is returned as [`Error::TokenFetchFailed`].
//!
//! Requests with `ignore_cache` unlink the in-flight entry before registering their own. A
//! caller without `ignore_cache` that lands between the unlink and the new registration may start
//! a separate retrieval; deduplication here is an optimization, not a guarantee on that path.

mod metrics;

pub use metrics::TokenMetrics;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{self, AccessToken, AuthContext},
	dedup::RequestDeduplicator,
	obs::{self, FetchKind, FetchOutcome, TokenSpan},
	provider::{IdentityProvider, InteractiveTokenRequest, ProviderError, SilentTokenRequest},
};

type FetchResult = Result<AccessToken>;

/// Parameters of a single token request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenRequest {
	/// Space-delimited scopes.
	pub scope: String,
	/// Logical audience identifier appended to the domain (e.g., `mfa`, `my-org`).
	pub audience_path: String,
	/// Start a fresh retrieval and ask the provider to skip its own cache.
	pub ignore_cache: bool,
}
impl TokenRequest {
	/// Creates a request for the provided scope and audience path.
	pub fn new(scope: impl Into<String>, audience_path: impl Into<String>) -> Self {
		Self { scope: scope.into(), audience_path: audience_path.into(), ignore_cache: false }
	}

	/// Forces a fresh retrieval.
	pub fn force_refresh(mut self) -> Self {
		self.ignore_cache = true;

		self
	}

	/// Overrides the cache-bypass flag.
	pub fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
		self.ignore_cache = ignore_cache;

		self
	}
}

struct Session {
	context: Arc<AuthContext>,
	pending: RequestDeduplicator<FetchResult>,
}

/// Entry point for scoped access tokens.
///
/// Each installed context gets its own request registry, so managers serving different
/// contexts (or a context replaced via [`initialize`](Self::initialize)) never share in-flight
/// retrievals.
#[derive(Default)]
pub struct TokenManager {
	session: RwLock<Option<Arc<Session>>>,
	metrics: Arc<TokenMetrics>,
}
impl TokenManager {
	/// Creates a manager without an auth context; requests fail until one is installed.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a manager with `context` installed.
	pub fn with_context(context: AuthContext) -> Self {
		let manager = Self::new();

		manager.initialize(context);

		manager
	}

	/// Installs `context` with a fresh request registry, replacing any previous one.
	///
	/// Retrievals already in flight under the previous context still resolve for their callers.
	pub fn initialize(&self, context: AuthContext) {
		let session =
			Session { context: Arc::new(context), pending: RequestDeduplicator::default() };

		*self.session.write() = Some(Arc::new(session));
	}

	/// Uninstalls the current context.
	pub fn reset(&self) {
		*self.session.write() = None;
	}

	/// Returns the installed context, if any.
	pub fn context(&self) -> Option<Arc<AuthContext>> {
		self.session.read().as_ref().map(|session| session.context.clone())
	}

	/// Returns `true` when the installed context runs in proxy mode.
	pub fn is_proxy_mode(&self) -> bool {
		self.session.read().as_ref().is_some_and(|session| session.context.is_proxy_mode())
	}

	/// Number of retrievals currently in flight for the installed context.
	pub fn pending_requests(&self) -> usize {
		self.session.read().as_ref().map_or(0, |session| session.pending.len())
	}

	/// Counters for requests handled by this manager.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.metrics
	}

	/// Shorthand for [`get_token`](Self::get_token) without cache bypass.
	pub async fn token(
		&self,
		scope: impl Into<String>,
		audience_path: impl Into<String>,
	) -> Result<Option<AccessToken>> {
		self.get_token(TokenRequest::new(scope, audience_path)).await
	}

	/// Acquires a token for `request`.
	///
	/// Returns `Ok(None)` in proxy mode, where the proxy attaches credentials itself.
	///
	/// Fails with [`Error::Config`] when the audience path is malformed (empty after trimming
	/// slashes, or containing whitespace, `?` or `#`) or the domain is not a valid URL.
	pub async fn get_token(&self, request: TokenRequest) -> Result<Option<AccessToken>> {
		let session = self.session.read().clone();
		let mode =
			session.as_ref().map_or("uninitialized", |session| session.context.mode().as_str());
		let span = TokenSpan::new("get_token", mode);

		span.instrument(self.acquire(session, request)).await
	}

	async fn acquire(
		&self,
		session: Option<Arc<Session>>,
		request: TokenRequest,
	) -> Result<Option<AccessToken>> {
		self.metrics.record_request();

		let session = session.ok_or(Error::AuthNotInitialized)?;
		let context = &session.context;

		if context.is_proxy_mode() {
			return Ok(None);
		}

		let provider = context.provider.clone().ok_or(Error::ContextInterfaceNotInitialized)?;
		let domain = context.resolve_domain().ok_or(Error::DomainNotConfigured)?;
		let audience = auth::audience(&domain, &request.audience_path)?;
		let key = auth::request_key(&request.scope, &audience);

		if request.ignore_cache {
			session.pending.invalidate(&key);
		}

		let led = AtomicBool::new(false);
		let led_flag = &led;
		let metrics = self.metrics.clone();
		let TokenRequest { scope, ignore_cache, .. } = request;
		let outcome = session
			.pending
			.get_or_create(&key, move || {
				led_flag.store(true, Ordering::Relaxed);

				fetch_token(provider, metrics, audience, scope, ignore_cache)
			})
			.await;

		if !led.load(Ordering::Relaxed) {
			self.metrics.record_joined();
		}

		outcome.map(Some)
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("context", &self.context())
			.field("pending_requests", &self.pending_requests())
			.finish()
	}
}

async fn fetch_token(
	provider: Arc<dyn IdentityProvider>,
	metrics: Arc<TokenMetrics>,
	audience: String,
	scope: String,
	cache_bypass: bool,
) -> FetchResult {
	metrics.record_silent_fetch();
	obs::record_fetch_outcome(FetchKind::Silent, FetchOutcome::Attempt);

	let silent = provider
		.fetch_token_silently(SilentTokenRequest {
			audience: audience.clone(),
			scope: scope.clone(),
			cache_bypass,
		})
		.await;
	let kind = match silent {
		Ok(token) => {
			obs::record_fetch_outcome(FetchKind::Silent, FetchOutcome::Success);

			return Ok(token);
		},
		Err(ProviderError::AuthorizationRequired { kind, .. }) => {
			obs::record_fetch_outcome(FetchKind::Silent, FetchOutcome::Failure);

			kind
		},
		Err(err) => {
			obs::record_fetch_outcome(FetchKind::Silent, FetchOutcome::Failure);
			metrics.record_failure();

			return Err(err.into());
		},
	};
	let prompt = kind.prompt();

	obs::record_escalation(kind.as_str(), prompt.as_str());
	metrics.record_interactive_fetch();
	obs::record_fetch_outcome(FetchKind::Interactive, FetchOutcome::Attempt);

	let interactive = provider
		.fetch_token_interactive(InteractiveTokenRequest { audience, scope, prompt })
		.await;

	match interactive {
		Ok(Some(token)) => {
			obs::record_fetch_outcome(FetchKind::Interactive, FetchOutcome::Success);

			Ok(token)
		},
		Ok(None) => {
			obs::record_fetch_outcome(FetchKind::Interactive, FetchOutcome::Failure);
			metrics.record_failure();

			Err(Error::InteractiveTokenMissing)
		},
		Err(err) => {
			obs::record_fetch_outcome(FetchKind::Interactive, FetchOutcome::Failure);
			metrics.record_failure();

			Err(err.into())
		},
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::ConfigError,
		provider::{AuthorizationRequired, Prompt},
	};

	const LATENCY: StdDuration = StdDuration::from_millis(30);

	fn scripted(latency: Option<StdDuration>) -> Arc<ScriptedProvider> {
		let provider = ScriptedProvider::always("tok");

		Arc::new(match latency {
			Some(latency) => provider.with_latency(latency),
			None => provider,
		})
	}

	#[tokio::test]
	async fn silent_retrieval_targets_the_domain_audience() {
		let provider = scripted(None);
		let manager = direct_manager(provider.clone());

		provider.push_silent(Ok(AccessToken::new("abc123")));

		let token = manager
			.token("read:me", "mfa")
			.await
			.expect("Silent retrieval should succeed.")
			.expect("Direct mode should return a token.");

		assert_eq!(token.expose(), "abc123");
		assert_eq!(
			provider.silent_calls(),
			vec![SilentTokenRequest {
				audience: "https://tenant.example.com/mfa/".into(),
				scope: "read:me".into(),
				cache_bypass: false,
			}]
		);
		assert!(provider.interactive_calls().is_empty());
		assert_eq!(manager.pending_requests(), 0);
	}

	#[tokio::test]
	async fn concurrent_identical_requests_share_one_retrieval() {
		let provider = scripted(Some(LATENCY));
		let manager = direct_manager(provider.clone());
		let (a, b) = tokio::join!(manager.token("read:me", "mfa"), manager.token("read:me", "mfa"));
		let a = a.expect("First caller should succeed.").expect("Token expected.");
		let b = b.expect("Second caller should succeed.").expect("Token expected.");

		assert_eq!(provider.silent_count(), 1);
		assert_eq!(a, b);
		assert_eq!(manager.metrics().joined(), 1);
		assert_eq!(manager.metrics().requests(), 2);
	}

	#[tokio::test]
	async fn distinct_scope_or_audience_fetch_independently() {
		let provider = scripted(Some(LATENCY));
		let manager = direct_manager(provider.clone());
		let (a, b, c) = tokio::join!(
			manager.token("read:me", "mfa"),
			manager.token("read:org", "mfa"),
			manager.token("read:me", "my-org"),
		);

		for outcome in [a, b, c] {
			outcome.expect("Independent requests should succeed.").expect("Token expected.");
		}

		assert_eq!(provider.silent_count(), 3);
		assert_eq!(manager.metrics().joined(), 0);
	}

	#[tokio::test]
	async fn cache_bypass_starts_a_fresh_retrieval() {
		let provider = scripted(Some(LATENCY));
		let manager = direct_manager(provider.clone());
		let bypassing = async {
			tokio::time::sleep(StdDuration::from_millis(5)).await;

			manager.get_token(TokenRequest::new("read:me", "mfa").force_refresh()).await
		};
		let (shared, fresh) = tokio::join!(manager.token("read:me", "mfa"), bypassing);
		let shared = shared.expect("Initial request should succeed.").expect("Token expected.");
		let fresh = fresh.expect("Bypassing request should succeed.").expect("Token expected.");

		assert_eq!(provider.silent_count(), 2);
		assert_ne!(shared, fresh);
		assert!(provider.silent_calls()[1].cache_bypass);

		let after = manager
			.get_token(TokenRequest::new("read:me", "mfa").with_ignore_cache(true))
			.await
			.expect("Sequential bypass should succeed.");

		assert!(after.is_some());
		assert_eq!(provider.silent_count(), 3);
	}

	#[tokio::test]
	async fn settled_requests_never_leave_stale_entries() {
		let provider = scripted(None);
		let manager = direct_manager(provider.clone());

		provider.push_silent(Err(ProviderError::from_oauth("access_denied", None, Some(403))));

		let err = manager.token("read:me", "mfa").await.expect_err("First call should fail.");

		assert!(matches!(err, Error::TokenFetchFailed { .. }));
		assert_eq!(manager.pending_requests(), 0);

		let first = manager.token("read:me", "mfa").await.expect("Retry should succeed.");
		let second = manager.token("read:me", "mfa").await.expect("Next call should succeed.");

		assert_ne!(first, second, "Each settled call must trigger a new retrieval.");
		assert_eq!(provider.silent_count(), 3);
		assert_eq!(manager.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn abandoned_requests_do_not_block_later_calls() {
		let provider = scripted(Some(StdDuration::from_millis(50)));
		let manager = direct_manager(provider.clone());
		let abandoned =
			tokio::time::timeout(StdDuration::from_millis(10), manager.token("read:me", "mfa"))
				.await;

		assert!(abandoned.is_err(), "The call should outlive the timeout.");
		assert_eq!(manager.pending_requests(), 0);

		let token = manager
			.token("read:me", "mfa")
			.await
			.expect("A later call should start a fresh retrieval.")
			.expect("Direct mode should return a token.");

		assert_eq!(token.expose(), "tok-2");
		assert_eq!(provider.silent_count(), 2);
		assert_eq!(manager.pending_requests(), 0);
	}

	#[tokio::test]
	async fn proxy_mode_short_circuits_without_provider_calls() {
		let provider = scripted(None);
		let dyn_provider: Arc<dyn IdentityProvider> = provider.clone();
		let context = AuthContext::builder()
			.auth_proxy_url("https://proxy.example.com")
			.provider(dyn_provider)
			.build()
			.expect("Proxy context should build.");
		let manager = TokenManager::with_context(context);
		let token = manager
			.get_token(TokenRequest::new("read:org", "my-org").force_refresh())
			.await
			.expect("Proxy mode should not fail.");

		assert!(token.is_none());
		assert!(manager.is_proxy_mode());
		assert_eq!(provider.silent_count(), 0);
		assert_eq!(provider.configuration_calls(), 0);
		assert!(provider.interactive_calls().is_empty());
	}

	#[tokio::test]
	async fn recoverable_codes_escalate_with_the_matching_prompt() {
		let cases = [
			(AuthorizationRequired::ConsentRequired, Prompt::Consent),
			(AuthorizationRequired::LoginRequired, Prompt::Login),
			(AuthorizationRequired::MfaRequired, Prompt::Consent),
		];

		for (kind, prompt) in cases {
			let provider = scripted(None);
			let manager = direct_manager(provider.clone());

			provider.push_silent(Err(ProviderError::from_oauth(kind.as_str(), None, Some(403))));
			provider.push_interactive(Ok(Some(AccessToken::new("popup-token"))));

			let token = manager
				.token("read:me", "mfa")
				.await
				.expect("Interactive escalation should succeed.")
				.expect("Token expected.");
			let calls = provider.interactive_calls();

			assert_eq!(token.expose(), "popup-token");
			assert_eq!(calls.len(), 1);
			assert_eq!(calls[0].prompt, prompt);
			assert_eq!(calls[0].audience, "https://tenant.example.com/mfa/");
			assert_eq!(manager.metrics().interactive_fetches(), 1);
		}
	}

	#[tokio::test]
	async fn other_codes_fail_without_escalation() {
		let provider = scripted(None);
		let manager = direct_manager(provider.clone());

		provider.push_silent(Err(ProviderError::from_oauth("invalid_grant", None, Some(400))));

		let err = manager.token("read:me", "mfa").await.expect_err("Terminal codes must fail.");

		assert!(matches!(
			err,
			Error::TokenFetchFailed { source: ProviderError::OAuth { ref code, .. } }
				if code == "invalid_grant"
		));
		assert!(provider.interactive_calls().is_empty());
	}

	#[tokio::test]
	async fn interactive_failures_are_reported() {
		let provider = scripted(None);
		let manager = direct_manager(provider.clone());

		provider.push_silent(Err(ProviderError::from_oauth("login_required", None, None)));
		provider.push_interactive(Ok(None));

		let err = manager.token("read:me", "mfa").await.expect_err("Missing token must fail.");

		assert!(matches!(err, Error::InteractiveTokenMissing));

		provider.push_silent(Err(ProviderError::from_oauth("consent_required", None, None)));
		provider.push_interactive(Err(ProviderError::InteractionUnavailable));

		let err = manager.token("read:me", "mfa").await.expect_err("Popup failure must fail.");

		assert!(matches!(
			err,
			Error::TokenFetchFailed { source: ProviderError::InteractionUnavailable }
		));
		assert_eq!(provider.interactive_calls().len(), 2);
		assert_eq!(manager.metrics().failures(), 2);
	}

	#[tokio::test]
	async fn preconditions_are_checked_in_order() {
		let manager = TokenManager::new();

		assert!(matches!(manager.token("read:me", "mfa").await, Err(Error::AuthNotInitialized)));

		manager.initialize(
			AuthContext::builder()
				.domain("tenant.example.com")
				.build()
				.expect("Context without provider should build."),
		);

		assert!(matches!(
			manager.token("read:me", "mfa").await,
			Err(Error::ContextInterfaceNotInitialized)
		));

		manager.initialize(
			AuthContext::builder()
				.provider(Arc::new(ScriptedProvider::always("tok")))
				.build()
				.expect("Context without domain should build."),
		);

		assert!(matches!(manager.token("read:me", "mfa").await, Err(Error::DomainNotConfigured)));

		manager.reset();

		assert!(matches!(manager.token("read:me", "mfa").await, Err(Error::AuthNotInitialized)));
	}

	#[tokio::test]
	async fn provider_configuration_supplies_the_domain() {
		let provider =
			Arc::new(ScriptedProvider::always("tok").with_domain("https://fallback.example.com"));
		let dyn_provider: Arc<dyn IdentityProvider> = provider.clone();
		let manager = TokenManager::with_context(
			AuthContext::builder().provider(dyn_provider).build().expect("Context should build."),
		);

		manager.token("read:me", "mfa").await.expect("Fallback domain should be used.");

		assert_eq!(provider.silent_calls()[0].audience, "https://fallback.example.com/mfa/");
	}

	#[tokio::test]
	async fn invalid_audience_paths_are_config_errors() {
		let provider = scripted(None);
		let manager = direct_manager(provider.clone());
		let err = manager.token("read:me", "my org").await.expect_err("Whitespace must fail.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidAudiencePath { .. })));
		assert_eq!(provider.silent_count(), 0);
	}

	#[tokio::test]
	async fn reinitializing_isolates_in_flight_requests() {
		let provider = scripted(Some(LATENCY));
		let manager = direct_manager(provider.clone());
		let reinit = async {
			tokio::time::sleep(StdDuration::from_millis(5)).await;

			let dyn_provider: Arc<dyn IdentityProvider> = provider.clone();

			manager.initialize(
				AuthContext::builder()
					.domain(TEST_DOMAIN)
					.provider(dyn_provider)
					.build()
					.expect("Replacement context should build."),
			);

			manager.token("read:me", "mfa").await
		};
		let (old, new) = tokio::join!(manager.token("read:me", "mfa"), reinit);

		assert_ne!(
			old.expect("Old context request should succeed."),
			new.expect("New context request should succeed.")
		);
		assert_eq!(provider.silent_count(), 2);
	}
}
