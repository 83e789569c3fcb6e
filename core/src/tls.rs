//! Process-wide acknowledgement of disabled certificate verification.
//!
//! Building a client with `verify_ssl = false` records the acknowledgement
//! once for the whole process and logs a single warning. Transports check
//! the flag so they only warn per request when nobody acknowledged it.
//! The flag is never cleared.

use std::sync::OnceLock;

use tracing::warn;

static INSECURE_TLS_ACKNOWLEDGED: OnceLock<()> = OnceLock::new();

/// Record that certificate verification is intentionally disabled.
///
/// Returns `true` for the call that set the flag.
pub fn acknowledge_insecure_tls() -> bool {
    let mut first = false;
    INSECURE_TLS_ACKNOWLEDGED.get_or_init(|| {
        warn!("TLS certificate verification is disabled; insecure-connection warnings are suppressed");
        first = true;
    });
    first
}

pub fn insecure_tls_acknowledged() -> bool {
    INSECURE_TLS_ACKNOWLEDGED.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acknowledgement_is_sticky() {
        acknowledge_insecure_tls();
        assert!(insecure_tls_acknowledged());
        assert!(!acknowledge_insecure_tls());
        assert!(insecure_tls_acknowledged());
    }
}
