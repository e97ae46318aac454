//! Conversation keys and sender identity resolution.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{IdentityRecord, Transport};

/// Suffix marking an anonymized identifier that has to be looked up.
pub const ANONYMIZED_SUFFIX: &str = "@lid";

/// Opaque key partitioning message ordering, usually the sender id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the identifier is in the unstable, anonymized form.
pub fn is_anonymized(identifier: &str) -> bool {
    identifier.ends_with(ANONYMIZED_SUFFIX)
}

/// Strip the transport annotation (`@s.whatsapp.net`, `@lid`, ...) leaving
/// the bare routing key.
pub fn normalize(identifier: &str) -> &str {
    match identifier.find('@') {
        Some(idx) => &identifier[..idx],
        None => identifier,
    }
}

/// Resolves raw sender identifiers into bare routing keys.
#[derive(Clone, Debug)]
pub struct IdentityResolver {
    lookup_timeout: Duration,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl IdentityResolver {
    pub fn new(lookup_timeout: Duration) -> Self {
        Self { lookup_timeout }
    }

    /// Resolve `raw` to a normalized identifier.
    ///
    /// Never fails: on lookup error, timeout, an empty result or an ambiguous
    /// one (several distinct canonical ids) the raw identifier is used
    /// instead. At most one lookup is issued.
    pub async fn resolve(&self, raw: &str, transport: &Arc<dyn Transport>) -> String {
        if !is_anonymized(raw) {
            return normalize(raw).to_string();
        }

        let resolved = match tokio::time::timeout(
            self.lookup_timeout,
            transport.lookup_identity(raw),
        )
        .await
        {
            Ok(Ok(records)) => match single_canonical(records) {
                Ok(canonical) => Some(canonical),
                Err(found) => {
                    tracing::warn!(
                        identifier = raw,
                        candidates = found,
                        "Could not resolve identifier, using it as is"
                    );
                    None
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(identifier = raw, error = %e, "Identity lookup failed, using raw identifier");
                None
            }
            Err(_) => {
                tracing::warn!(
                    identifier = raw,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Identity lookup timed out, using raw identifier"
                );
                None
            }
        };

        match resolved {
            Some(canonical) => {
                tracing::debug!(identifier = raw, canonical = %canonical, "Resolved identifier");
                normalize(&canonical).to_string()
            }
            None => normalize(raw).to_string(),
        }
    }
}

/// The one canonical id the records agree on, or the number of distinct
/// candidates when there is not exactly one.
fn single_canonical(records: Vec<IdentityRecord>) -> std::result::Result<String, usize> {
    let mut candidates: Vec<String> = Vec::new();
    for canonical in records.into_iter().filter_map(|r| r.canonical) {
        let canonical = canonical.trim().to_string();
        if !canonical.is_empty() && !candidates.contains(&canonical) {
            candidates.push(canonical);
        }
    }
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        n => Err(n),
    }
}
