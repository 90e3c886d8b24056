use axum::http::HeaderMap;

/// Header set by the CDN with the IP-derived country
const CDN_COUNTRY_HEADER: &str = "cf-ipcountry";
/// Explicit override, mostly for tests and staging
const COUNTRY_OVERRIDE_HEADER: &str = "x-country-code";

/// Best-effort country extraction from request headers. Returns None when
/// neither header is present or the CDN reported an unknown origin.
pub fn country_from_headers(headers: &HeaderMap) -> Option<String> {
    for name in [COUNTRY_OVERRIDE_HEADER, CDN_COUNTRY_HEADER] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            let value = value.trim();
            // Cloudflare uses XX/T1 for unknown origins
            if !value.is_empty() && value != "XX" && value != "T1" {
                return Some(value.to_string());
            }
        }
    }
    None
}
