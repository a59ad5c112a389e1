use crate::{TargetError, TargetResult};
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Unsubstituted template placeholders, in both literal and percent-encoded
/// form. Targets carrying any of these are rejected outright: they come from
/// client-side templates that were never rendered and can never be fetched.
const TEMPLATE_MARKERS: &[&str] = &["{{", "}}", "${", "%7b%7b", "%7d%7d", "%24%7b"];

/// Checks whether a raw target string still contains an unsubstituted
/// template placeholder
///
/// # Arguments
///
/// * `raw` - The candidate target (or title) to inspect
///
/// # Returns
///
/// `true` if any known template marker is present, case-insensitively
pub fn has_template_marker(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    TEMPLATE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Normalizes a target according to Satchel's normalization rules
///
/// # Normalization Steps
///
/// 1. Reject targets containing unsubstituted template markers
/// 2. Parse the URL; reject if malformed
/// 3. Reject schemes other than http/https
/// 4. Lowercase the host and remove a www. prefix
/// 5. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse duplicate slashes
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 6. Remove fragment (everything after #)
/// 7. Remove tracking query parameters
/// 8. Sort remaining query parameters alphabetically
/// 9. Remove empty query string (trailing ?)
///
/// # Arguments
///
/// * `raw` - The target string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized target
/// * `Err(TargetError)` - Failed to parse or normalize the target
///
/// # Examples
///
/// ```
/// use satchel::target::normalize_target;
///
/// let url = normalize_target("https://WWW.Example.COM/courses/101/files/").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/courses/101/files");
/// ```
pub fn normalize_target(raw: &str) -> TargetResult<Url> {
    // Step 1: Template placeholders are never resolvable
    if has_template_marker(raw) {
        return Err(TargetError::TemplateMarker(raw.to_string()));
    }

    // Step 2: Parse the URL
    let mut url = Url::parse(raw).map_err(|e| TargetError::Parse(e.to_string()))?;

    // Step 3: Validate scheme. Both http and https are accepted; the target
    // application decides, and test servers speak plain http.
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(TargetError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // Step 4: Lowercase the host and remove www. prefix
    if let Some(host) = url.host_str() {
        let mut normalized_host = host.to_lowercase();

        if normalized_host.starts_with("www.") {
            normalized_host = normalized_host[4..].to_string();
        }

        url.set_host(Some(&normalized_host))
            .map_err(|e| TargetError::Parse(format!("Failed to set host: {}", e)))?;
    } else {
        return Err(TargetError::MissingHost);
    }

    // Step 5: Normalize path
    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    // Step 6: Remove fragment
    url.set_fragment(None);

    // Steps 7 & 8: Filter and sort query parameters
    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        // Step 9: Set query or remove if empty
        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = filtered_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in segments {
        match segment {
            // Skip empty segments (from multiple slashes) and current directory markers
            "" | "." => continue,
            // Parent directory - pop the last segment if possible
            ".." => {
                if !normalized_segments.is_empty() {
                    normalized_segments.pop();
                }
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    let result = format!("/{}", normalized_segments.join("/"));

    // Remove trailing slash unless it's the root
    if result.len() > 1 && result.ends_with('/') {
        result[..result.len() - 1].to_string()
    } else {
        result
    }
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    if TRACKING_PARAMS.contains(&key) {
        return true;
    }

    // Catch any utm_* parameter
    if key.starts_with("utm_") {
        return true;
    }

    false
}
