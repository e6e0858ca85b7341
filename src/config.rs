//! Configuration handed to the store by its caller.

use std::path::PathBuf;

/// Registry and transport settings for the surrounding image tooling.
///
/// The store accepts this at construction time and forwards it when an
/// artifact is pushed to or pulled from a registry. The local store
/// core itself never reads it: every operation here works on the local
/// disk only.
#[derive(Clone, Debug, Default)]
pub struct SystemContext {
    /// Directory with client certificates for registry TLS.
    pub docker_certs_dir: Option<PathBuf>,

    /// Skip TLS verification when talking to registries.
    pub insecure_skip_tls_verify: Option<bool>,

    /// Path to the registry authentication file.
    pub auth_file_path: Option<PathBuf>,

    /// HTTP proxy for registry requests.
    pub proxy_url: Option<String>,
}
