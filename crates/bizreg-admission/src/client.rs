//! Client identifier derivation.
//!
//! A client is identified by the host part of its remote address; the port
//! is stripped so every connection from one host shares a bucket.

use crate::error::AdmissionError;

/// Host portion of `remote_addr` (`"10.0.0.5:51234"` → `"10.0.0.5"`,
/// `"[::1]:8080"` → `"::1"`).
///
/// A missing port or empty host is a server-side fault, not a rate decision.
pub fn client_id_from_remote_addr(remote_addr: &str) -> Result<String, AdmissionError> {
    let unresolvable = || AdmissionError::UnresolvableClient(remote_addr.to_string());

    let host = if let Some(bracketed) = remote_addr.strip_prefix('[') {
        let (host, rest) = bracketed.split_once(']').ok_or_else(unresolvable)?;
        rest.strip_prefix(':').ok_or_else(unresolvable)?;
        host
    } else {
        let (host, _port) = remote_addr.rsplit_once(':').ok_or_else(unresolvable)?;
        // An unbracketed IPv6 literal is ambiguous.
        if host.contains(':') {
            return Err(unresolvable());
        }
        host
    };

    if host.is_empty() {
        return Err(unresolvable());
    }
    Ok(host.to_string())
}
