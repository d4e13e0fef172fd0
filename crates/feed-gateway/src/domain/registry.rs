//! API key registry: the immutable key → domain binding.
//!
//! Built once at startup from the `FEED_API_KEYS` string
//! (`key1:example.com,key2:localhost:3000`) and shared read-only for the
//! process lifetime.

use super::config::ConfigError;
use axum::http::Uri;
use std::collections::HashMap;

/// Mapping from API key to its registered domain (`host[:port]`, lowercase).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeyRegistry {
    entries: HashMap<String, String>,
}

impl ApiKeyRegistry {
    /// Parse a comma-separated list of `key:domain` pairs.
    ///
    /// The first `:` separates key from domain, so domains may carry a port.
    /// A key bound to two different domains is rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut entries = HashMap::new();

        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, domain) = pair
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidApiKeys(format!("missing domain in '{}'", redact(pair))))?;
            let key = key.trim();
            let domain = domain.trim().to_ascii_lowercase();

            if key.is_empty() {
                return Err(ConfigError::InvalidApiKeys("empty API key".into()));
            }
            if domain.is_empty() || domain.contains('/') {
                return Err(ConfigError::InvalidApiKeys(format!(
                    "invalid domain for key '{}'",
                    redact(key)
                )));
            }

            if let Some(existing) = entries.get(key) {
                if existing != &domain {
                    return Err(ConfigError::InvalidApiKeys(format!(
                        "key '{}' bound to both '{}' and '{}'",
                        redact(key),
                        existing,
                        domain
                    )));
                }
                continue;
            }
            entries.insert(key.to_string(), domain);
        }

        Ok(Self { entries })
    }

    /// Build a registry from already-parsed pairs.
    pub fn from_pairs<I, K, D>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: AsRef<str>,
    {
        let raw = pairs
            .into_iter()
            .map(|(k, d)| format!("{}:{}", k.as_ref(), d.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&raw)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up the domain registered to `key`.
    ///
    /// Every entry is compared in constant time and the scan never exits
    /// early, so response timing does not reveal key prefixes.
    pub fn domain_for(&self, key: &str) -> Option<&str> {
        let mut found = None;
        for (candidate, domain) in &self.entries {
            if constant_time_compare(candidate, key) {
                found = Some(domain.as_str());
            }
        }
        found
    }

    /// Origins a browser may present for the registered domains.
    ///
    /// Loopback/local domains get both `http://` and `https://`; everything
    /// else is `https://` only. Sorted and de-duplicated.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self
            .entries
            .values()
            .flat_map(|domain| {
                let mut out = vec![format!("https://{}", domain)];
                if is_local_domain(domain) {
                    out.push(format!("http://{}", domain));
                }
                out
            })
            .collect();
        origins.sort();
        origins.dedup();
        origins
    }
}

/// Reduce an `Origin` header value to its bare lowercase `host[:port]`.
///
/// Returns `None` for values that carry no authority (e.g. `null`).
pub fn origin_host(origin: &str) -> Option<String> {
    let uri: Uri = origin.trim().parse().ok()?;
    uri.scheme()?;
    let authority = uri.authority()?;
    let host = authority.host();
    if host.is_empty() {
        return None;
    }
    let bare = match authority.port_u16() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Some(bare.to_ascii_lowercase())
}

/// Whether a `host[:port]` names a loopback or local-development host.
pub fn is_local_domain(domain: &str) -> bool {
    let host = strip_port(domain);
    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1" | "0.0.0.0")
        || host.ends_with(".localhost")
}

fn strip_port(domain: &str) -> &str {
    if domain.starts_with('[') {
        // [v6]:port
        return match domain.find(']') {
            Some(end) => &domain[..=end],
            None => domain,
        };
    }
    match domain.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => domain,
    }
}

/// Show only the first characters of a secret in error messages.
fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}…", prefix)
}

/// Constant-time string comparison to prevent timing attacks
///
/// SECURITY: This function takes the same amount of time regardless of how
/// many characters match, preventing timing side-channel attacks.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    // Pad both to the longer length; different pad bytes force a mismatch
    // when the lengths differ.
    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
