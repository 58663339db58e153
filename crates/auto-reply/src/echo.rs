//! Echo suppression: fingerprints of recently sent messages.
//!
//! Channels that sync a device's own outbound messages play them back as
//! inbound events. The sending path primes this guard with a fingerprint of
//! what was sent; when the echoed copy arrives, the fingerprint matches and
//! the event is dropped before any reply work starts.

use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::Mutex,
    time::{Duration, Instant},
};

use {
    sha2::{Digest, Sha256},
    tracing::debug,
};

use crate::dispatch::{RememberSent, SentRecorder};

/// How long a primed fingerprint stays eligible for echo matching.
const ECHO_TTL: Duration = Duration::from_secs(120);

fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Fingerprint over (session key, effective body).
///
/// The *effective* body is hashed, so identical raw text folded under a
/// different group-history context produces a different fingerprint.
pub fn combined_echo_key(session_key: &str, combined_body: &str) -> String {
    hex_digest(&[b"combined:", session_key.as_bytes(), b"\n", combined_body.as_bytes()])
}

/// Fingerprint over sent text alone, for channels that echo raw text
/// without any session scoping.
pub fn text_echo_key(text: &str) -> String {
    hex_digest(&[b"text:", text.as_bytes()])
}

/// Store of fingerprints for messages this process recently sent.
#[derive(Debug, Default)]
pub struct EchoGuard {
    entries: Mutex<HashMap<String, Instant>>,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prime one fingerprint.
    pub fn remember(&self, key: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, at| now.duration_since(*at) < ECHO_TTL);
        entries.insert(key, now);
    }

    /// Returns true and removes the entry when `key` matches a recently
    /// sent message. Consuming is deliberate: one echo eats one entry, so
    /// a later, legitimately distinct event that happens to collide is not
    /// suppressed too.
    pub fn check_and_consume(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.remove(key) {
            Some(at) => at.elapsed() < ECHO_TTL,
            None => false,
        }
    }

    /// Number of live fingerprints (expired entries excluded).
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .filter(|at| at.elapsed() < ECHO_TTL)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SentRecorder for EchoGuard {
    fn remember_sent_text(&self, text: Option<&str>, opts: &RememberSent<'_>) {
        if let (Some(body), Some(session_key)) = (opts.combined_body, opts.session_key) {
            self.remember(combined_echo_key(session_key, body));
        }
        if let Some(text) = text
            && !text.is_empty()
        {
            self.remember(text_echo_key(text));
        }
        if opts.log_verbose
            && let Some(text) = text
        {
            debug!(chars = text.len(), "remembered sent text for echo suppression");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_removes_exactly_one_entry() {
        let guard = EchoGuard::new();
        let key = combined_echo_key("agent:main:whatsapp:123", "hello");
        guard.remember(key.clone());

        assert!(guard.check_and_consume(&key));
        // Second check must not match: the entry was consumed.
        assert!(!guard.check_and_consume(&key));
    }

    #[test]
    fn missing_key_is_not_an_echo() {
        let guard = EchoGuard::new();
        assert!(!guard.check_and_consume(&combined_echo_key("s", "b")));
    }

    #[test]
    fn echo_key_differs_across_history_context() {
        // Same raw text folded under different group history must fingerprint
        // differently; the key is derived from the *effective* body.
        let a = combined_echo_key("session", "[ctx A]\\nhello");
        let b = combined_echo_key("session", "[ctx B]\\nhello");
        assert_ne!(a, b);
    }

    #[test]
    fn echo_key_differs_across_sessions() {
        assert_ne!(
            combined_echo_key("session-1", "hello"),
            combined_echo_key("session-2", "hello")
        );
    }

    #[test]
    fn recorder_primes_combined_and_text_keys() {
        let guard = EchoGuard::new();
        guard.remember_sent_text(
            Some("the reply"),
            &RememberSent {
                combined_body: Some("combined body"),
                session_key: Some("sess"),
                log_verbose: false,
            },
        );
        assert!(guard.check_and_consume(&combined_echo_key("sess", "combined body")));
        assert!(guard.check_and_consume(&text_echo_key("the reply")));
    }

    #[test]
    fn recorder_with_bare_text_skips_combined_key() {
        let guard = EchoGuard::new();
        guard.remember_sent_text(Some("tool note"), &RememberSent::default());
        assert_eq!(guard.len(), 1);
        assert!(guard.check_and_consume(&text_echo_key("tool note")));
    }
}
