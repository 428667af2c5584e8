//! Audience construction from a provider domain and a logical audience path.
//!
//! A domain such as `tenant.example.com` normalizes to `https://tenant.example.com/`; the audience
//! for path `mfa` is then `https://tenant.example.com/mfa/`. Request keys combine the scope and
//! audience so the deduplicator can tell logical requests apart.

// self
use crate::{_prelude::*, error::ConfigError};

const DEFAULT_SCHEME: &str = "https://";
const KEY_DELIMITER: char = ':';

/// Normalizes a bare host or URL into an absolute base URL ending with `/`.
pub fn domain_url(domain: &str) -> Result<Url, ConfigError> {
	let trimmed = domain.trim();
	let candidate = if trimmed.contains("://") {
		trimmed.to_owned()
	} else {
		format!("{DEFAULT_SCHEME}{trimmed}")
	};
	let mut url = Url::parse(&candidate)
		.map_err(|source| ConfigError::InvalidDomain { domain: domain.to_owned(), source })?;

	if url.cannot_be_a_base() {
		return Err(ConfigError::InvalidDomain {
			domain: domain.to_owned(),
			source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
		});
	}

	url.set_query(None);
	url.set_fragment(None);

	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

/// Builds `{domain_url}{audience_path}/`.
///
/// An empty domain yields an empty audience; callers validate the domain before reaching here.
pub fn audience(domain: &str, audience_path: &str) -> Result<String, ConfigError> {
	if domain.trim().is_empty() {
		return Ok(String::new());
	}

	let base = domain_url(domain)?;
	let path = normalize_audience_path(audience_path)?;

	Ok(format!("{base}{path}/"))
}

/// Trims surrounding slashes and rejects paths that would corrupt the audience URL.
pub fn normalize_audience_path(audience_path: &str) -> Result<&str, ConfigError> {
	let path = audience_path.trim_matches('/');

	if path.is_empty() || path.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
		return Err(ConfigError::InvalidAudiencePath { path: audience_path.to_owned() });
	}

	Ok(path)
}

/// Deduplication key for a scope/audience pair.
pub fn request_key(scope: &str, audience: &str) -> String {
	let mut key = String::with_capacity(scope.len() + audience.len() + 1);

	key.push_str(scope);
	key.push(KEY_DELIMITER);
	key.push_str(audience);

	key
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bare_hosts_gain_scheme_and_trailing_slash() {
		let url = domain_url("tenant.example.com").expect("Bare host should normalize.");

		assert_eq!(url.as_str(), "https://tenant.example.com/");

		let url = domain_url("https://tenant.example.com/").expect("Full URL should normalize.");

		assert_eq!(url.as_str(), "https://tenant.example.com/");

		let url = domain_url("http://127.0.0.1:8080/tenant")
			.expect("Explicit scheme and path should be preserved.");

		assert_eq!(url.as_str(), "http://127.0.0.1:8080/tenant/");
	}

	#[test]
	fn audience_joins_domain_and_path() {
		assert_eq!(
			audience("tenant.example.com", "mfa").expect("Audience should build."),
			"https://tenant.example.com/mfa/"
		);
		assert_eq!(
			audience("https://tenant.example.com", "/my-org/").expect("Audience should build."),
			"https://tenant.example.com/my-org/"
		);
		assert_eq!(audience("", "mfa").expect("Empty domain is tolerated."), "");
	}

	#[test]
	fn invalid_inputs_are_rejected() {
		assert!(matches!(domain_url("https://"), Err(ConfigError::InvalidDomain { .. })));
		assert!(matches!(
			audience("tenant.example.com", "my org"),
			Err(ConfigError::InvalidAudiencePath { .. })
		));
		assert!(matches!(
			audience("tenant.example.com", "/"),
			Err(ConfigError::InvalidAudiencePath { .. })
		));
	}

	#[test]
	fn request_keys_separate_scope_and_audience() {
		assert_eq!(
			request_key("read:me", "https://tenant.example.com/mfa/"),
			"read:me:https://tenant.example.com/mfa/"
		);
		assert_ne!(request_key("read:me", "a"), request_key("read:me a", ""));
	}
}
