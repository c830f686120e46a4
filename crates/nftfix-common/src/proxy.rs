//! Gateway URL rewriting
//!
//! Some public IPFS gateways are too slow to audit thousands of records
//! against. Subdomain-style gateway URLs are mapped onto a faster mirror that
//! serves the same content id.
//!
//! ```
//! use nftfix_common::proxy::ProxyRewriter;
//!
//! let proxy = ProxyRewriter::default();
//! assert_eq!(
//!     proxy.rewrite("https://bafkrei.ipfs.dweb.link?ext=jpg"),
//!     "https://assets.holaplex.tools/ipfs/bafkrei"
//! );
//! ```

use serde::{Deserialize, Serialize};

/// Hostname fragment identifying the slow gateway
pub const DEFAULT_GATEWAY_FRAGMENT: &str = "ipfs.dweb.link";

/// Mirror host serving `/ipfs/<cid>`
pub const DEFAULT_MIRROR_HOST: &str = "assets.holaplex.tools";

/// Maps gateway URLs onto a mirror host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRewriter {
    gateway_fragment: String,
    mirror_host: String,
}

impl Default for ProxyRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_FRAGMENT, DEFAULT_MIRROR_HOST)
    }
}

impl ProxyRewriter {
    pub fn new(gateway_fragment: impl Into<String>, mirror_host: impl Into<String>) -> Self {
        Self {
            gateway_fragment: gateway_fragment.into(),
            mirror_host: mirror_host.into(),
        }
    }

    /// Use the default gateway with a different mirror host
    pub fn with_mirror_host(mirror_host: impl Into<String>) -> Self {
        Self::new(DEFAULT_GATEWAY_FRAGMENT, mirror_host)
    }

    pub fn mirror_host(&self) -> &str {
        &self.mirror_host
    }

    /// Rewrite `uri` to the mirror when it points at the gateway.
    ///
    /// The content id is the first dot-separated label of the host, e.g.
    /// `https://<cid>.ipfs.dweb.link?ext=jpg`. Anything that does not match is
    /// returned unchanged.
    pub fn rewrite(&self, uri: &str) -> String {
        if self.gateway_fragment.is_empty() || !uri.contains(&self.gateway_fragment) {
            return uri.to_string();
        }

        let without_scheme = uri
            .strip_prefix("http://")
            .or_else(|| uri.strip_prefix("https://"))
            .unwrap_or(uri);
        let cid = without_scheme.split('.').next().unwrap_or(without_scheme);

        format!("https://{}/ipfs/{}", self.mirror_host, cid)
    }
}
