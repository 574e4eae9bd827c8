//! Playability gate and embedded player document.
//!
//! The navigation filter here is a best-effort ad heuristic over URL
//! substrings. It is not a security boundary.

use std::sync::Arc;

use crate::config::PlayerConfig;

/// True when `url` is present and not blank.
pub fn has_playable_source(url: Option<&str>) -> bool {
    url.is_some_and(|u| !u.trim().is_empty())
}

/// Outcome of checking a navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationVerdict {
    Allowed,
    /// Matched an advertising keyword.
    Blocked(String),
    /// Matched neither table.
    Rejected,
}

impl NavigationVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Decides whether the embedded player may navigate to a URL.
pub trait NavigationFilter: Send + Sync + std::fmt::Debug {
    fn classify(&self, url: &str) -> NavigationVerdict;

    fn is_allowed(&self, url: &str) -> bool {
        self.classify(url).is_allowed()
    }
}

/// Permits every navigation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl NavigationFilter for AllowAll {
    fn classify(&self, _url: &str) -> NavigationVerdict {
        NavigationVerdict::Allowed
    }
}

/// Case-insensitive substring allowlist/denylist.
///
/// The allowlist wins over the denylist; anything matching neither is rejected.
#[derive(Debug, Clone, Default)]
pub struct DenylistFilter {
    allowlist: Vec<String>,
    denylist: Vec<String>,
}

impl DenylistFilter {
    pub fn new<A, D>(allowlist: A, denylist: D) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            allowlist: allowlist
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
            denylist: denylist
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(&config.allowed_navigation, &config.blocked_keywords)
    }
}

impl NavigationFilter for DenylistFilter {
    fn classify(&self, url: &str) -> NavigationVerdict {
        let lower = url.to_lowercase();
        if self.allowlist.iter().any(|domain| lower.contains(domain.as_str())) {
            return NavigationVerdict::Allowed;
        }
        if let Some(keyword) = self.denylist.iter().find(|k| lower.contains(k.as_str())) {
            tracing::debug!(url, keyword = %keyword, "Ad navigation blocked");
            return NavigationVerdict::Blocked(keyword.clone());
        }
        tracing::debug!(url, "External navigation rejected");
        NavigationVerdict::Rejected
    }
}

const SANDBOX: &str = "allow-same-origin allow-scripts allow-forms allow-presentation \
                       allow-popups allow-popups-to-escape-sandbox allow-modals \
                       allow-top-navigation allow-top-navigation-by-user-activation";

const ALLOW: &str = "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; \
                     picture-in-picture; fullscreen";

/// A ready-to-load player page for one video URL.
#[derive(Debug, Clone)]
pub struct PlayerEmbed {
    url: String,
    trusted: bool,
    filter: Arc<dyn NavigationFilter>,
}

impl PlayerEmbed {
    /// Build the embed, or `None` when there is nothing playable.
    ///
    /// Videos on a trusted CDN are embedded without a sandbox and with
    /// navigation left open; everything else is sandboxed and filtered.
    pub fn build(url: Option<&str>, config: &PlayerConfig) -> Option<Self> {
        if !has_playable_source(url) {
            return None;
        }
        let url = url?.trim().to_string();
        let trusted = is_trusted_cdn(&url, &config.trusted_cdns);
        let filter: Arc<dyn NavigationFilter> = if trusted {
            Arc::new(AllowAll)
        } else {
            Arc::new(DenylistFilter::from_config(config))
        };
        Some(Self {
            url,
            trusted,
            filter,
        })
    }

    /// Replace the navigation filter.
    pub fn with_filter(mut self, filter: Arc<dyn NavigationFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn is_sandboxed(&self) -> bool {
        !self.trusted
    }

    /// Host of the video URL, if it parses.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Check a navigation request coming from inside the player.
    pub fn should_load(&self, url: &str) -> bool {
        self.filter.is_allowed(url)
    }

    /// Full-screen HTML page wrapping the video in an iframe.
    pub fn html(&self) -> String {
        let sandbox = if self.is_sandboxed() {
            format!(" sandbox=\"{SANDBOX}\"")
        } else {
            String::new()
        };
        format!(
            r#"<!DOCTYPE html>
<html>
  <head>
    <meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no">
    <style>
      * {{ margin: 0; padding: 0; box-sizing: border-box; }}
      body {{ background-color: #000; overflow: hidden; }}
      iframe {{ position: absolute; top: 0; left: 0; width: 100%; height: 100%; border: none; }}
    </style>
  </head>
  <body>
    <iframe src="{src}" allowfullscreen{sandbox} allow="{ALLOW}" referrerpolicy="no-referrer-when-downgrade" loading="eager"></iframe>
  </body>
</html>
"#,
            src = escape_attr(&self.url),
        )
    }
}

fn is_trusted_cdn(url: &str, trusted: &[String]) -> bool {
    let lower = url.to_lowercase();
    trusted
        .iter()
        .any(|domain| lower.contains(&domain.to_lowercase()))
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}
