use crate::target::normalize::{has_template_marker, normalize_target};
use crate::{TargetError, TargetResult};
use url::Url;

/// The boundary of one crawl: a root container identified by `root_id`,
/// rooted at a base URL.
///
/// Pages are only queued when they live on the same host under the base
/// path. Auxiliary fetches (indirection resolution) are allowed anywhere on
/// the same host, because file stores frequently sit outside the container
/// path (e.g. `/files/42` next to `/courses/101`).
#[derive(Debug, Clone)]
pub struct CrawlScope {
    base: Url,
    root_id: String,
}

impl CrawlScope {
    /// Creates a scope from a base URL and root container id
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root container URL, e.g. `https://lms.example.edu/courses/101`
    /// * `root_id` - Opaque identifier recorded with the session
    pub fn new(base_url: &str, root_id: &str) -> TargetResult<Self> {
        let base = normalize_target(base_url)?;
        Ok(Self {
            base,
            root_id: root_id.to_string(),
        })
    }

    /// The root container id this scope belongs to
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// The normalized base URL of the root container
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Checks whether a target lives on the same host (and port) as the base
    pub fn same_host(&self, url: &Url) -> bool {
        match (self.base.host_str(), url.host_str()) {
            (Some(a), Some(b)) => {
                strip_www(a).eq_ignore_ascii_case(strip_www(b))
                    && self.base.port_or_known_default() == url.port_or_known_default()
            }
            _ => false,
        }
    }

    /// Checks whether a target belongs to the root container: same host and
    /// path at or below the base path
    pub fn in_scope(&self, url: &Url) -> bool {
        if !self.same_host(url) {
            return false;
        }

        let base_path = self.base.path();
        if base_path == "/" {
            return true;
        }

        url.path() == base_path || url.path().starts_with(&format!("{}/", base_path))
    }

    /// Resolves a configured entry-point path against the base URL
    ///
    /// Relative paths (`"files"`) are appended below the base; absolute paths
    /// (`"/courses/101/files"`) are taken from the host root.
    pub fn entry_target(&self, path: &str) -> TargetResult<Url> {
        if has_template_marker(path) {
            return Err(TargetError::TemplateMarker(path.to_string()));
        }

        let base = self.slash_terminated_base();
        let joined = base
            .join(path.trim_start_matches("./"))
            .map_err(|e| TargetError::Parse(e.to_string()))?;
        normalize_target(joined.as_str())
    }

    // Url::join treats the last path segment of a slash-less base as a file
    // and replaces it; a trailing slash keeps it as a directory.
    fn slash_terminated_base(&self) -> Url {
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
