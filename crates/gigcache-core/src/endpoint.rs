//! Shows endpoint resolution.
//!
//! Decides which URL the discovery fetch goes to, given the configured API
//! base, any runtime overrides, and the origin the caller runs under. The
//! result also says whether the call leaves that origin, which decides
//! whether a bearer token is attached.

use reqwest::Url;

/// Remote endpoint used when nothing better is configured.
pub const DEFAULT_SHOWS_ENDPOINT: &str = "https://live-events-6f3e5.web.app/api/shows";

/// Hosts that serve serverless functions; these are always remote and take
/// the `/showsProxy` function path.
pub const SERVERLESS_HOST_PATTERNS: [&str; 1] = ["cloudfunctions.net"];

const SHOWS_PATH: &str = "/api/shows";
const PROXY_PATH: &str = "/showsProxy";

/// Signals that can redirect the fetch at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointOverrides {
    /// Use this endpoint verbatim.
    pub shows_endpoint: Option<String>,
    /// Set when the API base was explicitly chosen rather than inherited.
    pub api_base_url: Option<String>,
    /// Replaces `DEFAULT_SHOWS_ENDPOINT` as the remote fallback.
    pub default_endpoint: Option<String>,
}

impl EndpointOverrides {
    fn shows_endpoint(&self) -> Option<&str> {
        non_blank(self.shows_endpoint.as_deref())
    }

    fn has_api_base_override(&self) -> bool {
        non_blank(self.api_base_url.as_deref()).is_some()
    }

    fn default_endpoint(&self) -> &str {
        non_blank(self.default_endpoint.as_deref()).unwrap_or(DEFAULT_SHOWS_ENDPOINT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub endpoint: String,
    pub is_remote: bool,
}

/// The origin the caller runs under, e.g. `http://localhost:3003`.
struct CallerOrigin {
    url: Url,
    has_explicit_port: bool,
}

impl CallerOrigin {
    fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = non_blank(raw)?.trim_end_matches('/');
        let url = Url::parse(raw).ok()?;
        if !url.origin().is_tuple() {
            return None;
        }
        // `Url::port` is None for the scheme's default port.
        let has_explicit_port = url.port().is_some();
        Some(Self { url, has_explicit_port })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn strip_trailing_slash(value: &str) -> &str {
    value.strip_suffix('/').unwrap_or(value)
}

fn is_absolute_http(endpoint: &str) -> bool {
    let lower = endpoint.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn matches_serverless_host(endpoint: &str) -> bool {
    let lower = endpoint.to_ascii_lowercase();
    SERVERLESS_HOST_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// `{base}/api/shows`, without doubling an existing `/api` suffix.
fn shows_endpoint_from_base(base: &str) -> String {
    let base = strip_trailing_slash(base.trim());
    let split = base.len().saturating_sub(4);
    let without_api = match (base.get(..split), base.get(split..)) {
        (Some(head), Some(tail)) if tail.eq_ignore_ascii_case("/api") => head,
        _ => base,
    };
    format!("{}{}", without_api, SHOWS_PATH)
}

/// Whether `endpoint` leaves the caller's origin. Unresolvable absolute URLs
/// count as remote; relative paths stay on the caller's origin.
fn is_remote_endpoint(endpoint: &str, origin: Option<&CallerOrigin>) -> bool {
    if endpoint.is_empty() {
        return false;
    }
    if matches_serverless_host(endpoint) {
        return true;
    }
    let absolute = is_absolute_http(endpoint);
    if let (true, Some(origin)) = (absolute, origin) {
        return match origin.url.join(endpoint) {
            Ok(resolved) => resolved.origin() != origin.url.origin(),
            Err(_) => true,
        };
    }
    absolute
}

/// Pick the shows endpoint. First matching rule wins:
///
/// 1. an explicit endpoint override, verbatim
/// 2. a base on the caller's own origin with an explicit port is a local dev
///    server, unless the API base was explicitly overridden: `{base}/api/shows`
/// 3. a blank base, or the caller's own origin without an explicit override:
///    the remote default
/// 4. a base already ending in `/api/shows` or `/showsProxy`: as-is
/// 5. a base ending in `/api`: append `/shows`
/// 6. a serverless function host: append `/showsProxy`
/// 7. anything else: append `/api/shows`
///
/// Pure and total: malformed input degrades to the remote branches.
pub fn resolve(
    base_url: &str,
    overrides: &EndpointOverrides,
    current_origin: Option<&str>,
) -> ResolvedEndpoint {
    let origin = CallerOrigin::parse(current_origin);
    let remote = |endpoint: String| {
        let is_remote = is_remote_endpoint(&endpoint, origin.as_ref());
        ResolvedEndpoint { endpoint, is_remote }
    };

    if let Some(endpoint) = overrides.shows_endpoint() {
        return remote(strip_trailing_slash(endpoint).to_string());
    }

    let base = strip_trailing_slash(base_url.trim());
    let base_origin = if base.is_empty() {
        None
    } else {
        match origin.as_ref() {
            Some(origin) => origin.url.join(base).ok(),
            None => Url::parse(base).ok(),
        }
        .map(|url| url.origin())
    };
    let matches_caller_origin = match (&base_origin, origin.as_ref()) {
        (Some(base_origin), Some(origin)) => *base_origin == origin.url.origin(),
        _ => false,
    };
    let has_api_base_override = overrides.has_api_base_override();

    if matches_caller_origin
        && origin.as_ref().is_some_and(|o| o.has_explicit_port)
        && !has_api_base_override
    {
        return remote(shows_endpoint_from_base(base));
    }

    if base.is_empty() || (matches_caller_origin && !has_api_base_override) {
        return ResolvedEndpoint {
            endpoint: overrides.default_endpoint().to_string(),
            is_remote: true,
        };
    }

    if base.ends_with(SHOWS_PATH) || base.ends_with(PROXY_PATH) {
        return remote(base.to_string());
    }

    if base.ends_with("/api") {
        return remote(format!("{}/shows", base));
    }

    if matches_serverless_host(base) {
        return ResolvedEndpoint {
            endpoint: format!("{}{}", base, PROXY_PATH),
            is_remote: true,
        };
    }

    remote(shows_endpoint_from_base(base))
}

/// Make a same-origin relative endpoint absolute against the caller's origin
/// so it can be requested. Absolute or unresolvable endpoints pass through.
pub fn absolute_endpoint(endpoint: &str, current_origin: Option<&str>) -> String {
    if Url::parse(endpoint).is_ok() {
        return endpoint.to_string();
    }
    CallerOrigin::parse(current_origin)
        .and_then(|origin| origin.url.join(endpoint).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| endpoint.to_string())
}

/// Append query pairs, joining with `&` when the endpoint already has a query.
pub fn append_query(endpoint: &str, pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return endpoint.to_string();
    }
    let mut serializer = Url::parse("http://query.invalid/").ok();
    let query = match serializer.as_mut() {
        Some(url) => {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
            url.query().unwrap_or_default().to_string()
        }
        None => String::new(),
    };
    let joiner = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}{}", endpoint, joiner, query)
}
