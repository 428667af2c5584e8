//! Scoped access-token acquisition for identity-provider backed APIs: one in-flight request per
//! scope/audience pair, silent retrieval first, a single interactive escalation when the provider
//! demands consent, login, or MFA.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
#[cfg(feature = "reqwest")] pub mod client;
pub mod dedup;
pub mod error;
#[cfg(feature = "reqwest")] pub mod http;
pub mod manager;
#[cfg(feature = "reqwest")] pub mod oauth;
pub mod obs;
pub mod provider;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures shared by unit and integration tests.
	//!
	//! Integration tests reach this module through the `test` feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration as StdDuration,
	};
	// self
	use crate::{
		auth::{AccessToken, AuthContext},
		manager::TokenManager,
		provider::{
			IdentityProvider, InteractiveTokenRequest, ProviderConfiguration, ProviderError,
			ProviderFuture, SilentTokenRequest,
		},
	};

	/// Domain used by test fixtures.
	pub const TEST_DOMAIN: &str = "tenant.example.com";

	/// Scripted [`IdentityProvider`] that replays queued outcomes and records every call.
	///
	/// Silent calls pop from the silent queue and fall back to `default_silent` once it is
	/// drained. Each call can be delayed so concurrent callers overlap in tests.
	#[derive(Default)]
	pub struct ScriptedProvider {
		/// Domain reported through [`IdentityProvider::configuration`].
		pub domain: Option<String>,
		/// Artificial latency applied to every retrieval.
		pub latency: Option<StdDuration>,
		silent: Mutex<VecDeque<Result<AccessToken, ProviderError>>>,
		interactive: Mutex<VecDeque<Result<Option<AccessToken>, ProviderError>>>,
		default_silent: Option<String>,
		silent_calls: Mutex<Vec<SilentTokenRequest>>,
		interactive_calls: Mutex<Vec<InteractiveTokenRequest>>,
		silent_count: AtomicUsize,
		configuration_calls: AtomicUsize,
	}
	impl ScriptedProvider {
		/// Creates a provider that answers every silent call with `token`.
		pub fn always(token: impl Into<String>) -> Self {
			Self { default_silent: Some(token.into()), ..Default::default() }
		}

		/// Applies the same latency to every retrieval.
		pub fn with_latency(mut self, latency: StdDuration) -> Self {
			self.latency = Some(latency);

			self
		}

		/// Reports `domain` via [`IdentityProvider::configuration`].
		pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
			self.domain = Some(domain.into());

			self
		}

		/// Queues a silent outcome.
		pub fn push_silent(&self, outcome: Result<AccessToken, ProviderError>) {
			self.silent.lock().push_back(outcome);
		}

		/// Queues an interactive outcome.
		pub fn push_interactive(&self, outcome: Result<Option<AccessToken>, ProviderError>) {
			self.interactive.lock().push_back(outcome);
		}

		/// Number of silent retrievals started so far.
		pub fn silent_count(&self) -> usize {
			self.silent_count.load(Ordering::SeqCst)
		}

		/// Number of configuration lookups so far.
		pub fn configuration_calls(&self) -> usize {
			self.configuration_calls.load(Ordering::SeqCst)
		}

		/// Snapshot of every silent request received.
		pub fn silent_calls(&self) -> Vec<SilentTokenRequest> {
			self.silent_calls.lock().clone()
		}

		/// Snapshot of every interactive request received.
		pub fn interactive_calls(&self) -> Vec<InteractiveTokenRequest> {
			self.interactive_calls.lock().clone()
		}

		async fn pause(&self) {
			if let Some(latency) = self.latency {
				tokio::time::sleep(latency).await;
			}
		}
	}
	impl IdentityProvider for ScriptedProvider {
		fn fetch_token_silently(
			&self,
			request: SilentTokenRequest,
		) -> ProviderFuture<'_, AccessToken> {
			Box::pin(async move {
				let call = self.silent_count.fetch_add(1, Ordering::SeqCst) + 1;

				self.silent_calls.lock().push(request);
				self.pause().await;

				let scripted = self.silent.lock().pop_front();

				match scripted {
					Some(outcome) => outcome,
					None => match &self.default_silent {
						Some(token) => Ok(AccessToken::new(format!("{token}-{call}"))),
						None => Err(ProviderError::Unexpected {
							message: "No silent outcome scripted.".into(),
							status: None,
						}),
					},
				}
			})
		}

		fn fetch_token_interactive(
			&self,
			request: InteractiveTokenRequest,
		) -> ProviderFuture<'_, Option<AccessToken>> {
			Box::pin(async move {
				self.interactive_calls.lock().push(request);
				self.pause().await;

				let scripted = self.interactive.lock().pop_front();

				scripted.unwrap_or(Ok(None))
			})
		}

		fn configuration(&self) -> Option<ProviderConfiguration> {
			self.configuration_calls.fetch_add(1, Ordering::SeqCst);

			Some(ProviderConfiguration { domain: self.domain.clone() })
		}
	}

	/// Builds a direct-mode manager around `provider` for [`TEST_DOMAIN`].
	pub fn direct_manager(provider: Arc<ScriptedProvider>) -> TokenManager {
		let provider: Arc<dyn IdentityProvider> = provider;
		let context = AuthContext::builder()
			.domain(TEST_DOMAIN)
			.provider(provider)
			.build()
			.expect("Direct-mode test context should build.");

		TokenManager::with_context(context)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::{Mutex as AsyncMutex, OnceCell as AsyncOnceCell};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	#[cfg(feature = "reqwest")] pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
