//! Client-side TLS for the IRC socket.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{Error, Result};

/// Build a rustls client config trusting the platform root store.
///
/// The crypto provider is chosen explicitly so the config never depends on a
/// process-level default being installed.
pub fn client_config() -> Result<Arc<rustls::ClientConfig>> {
    let mut root_store = rustls::RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!(error = %e, "failed to load some native certificates");
    }
    let (added, ignored) = root_store.add_parsable_certificates(native.certs);
    debug!(added, ignored, "loaded native root certificates");
    require_roots(added)?;

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(Arc::new(config))
}

/// A handshake against an empty root store can only fail, so refuse early.
fn require_roots(added: usize) -> Result<()> {
    if added == 0 {
        return Err(Error::NoRootCertificates);
    }
    Ok(())
}
