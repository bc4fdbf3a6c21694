//! Common adapter contract and subscription handle

use std::fmt;

use serde::Serialize;

use crate::provider::ProviderToken;

/// Which external source an adapter wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    Media,
    Notification,
    Weather,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Media => "media",
            SourceKind::Notification => "notification",
            SourceKind::Weather => "weather",
        };
        f.write_str(name)
    }
}

/// Lifecycle contract shared by all source adapters
///
/// Both operations are idempotent and never propagate failures: an adapter
/// whose provider is absent or rejects registration logs it and stays
/// inactive until the next `activate()`.
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Establish at most one live subscription
    fn activate(&self);

    /// Tear down the subscription if present
    fn deactivate(&self);

    fn is_active(&self) -> bool;
}

/// A live provider registration
///
/// Dropping the handle releases the registration, so an adapter holding
/// `Option<Subscription>` can never leak or double-register.
pub struct Subscription {
    token: ProviderToken,
    release: Option<Box<dyn FnOnce(ProviderToken) + Send>>,
}

impl Subscription {
    pub fn new(token: ProviderToken, release: impl FnOnce(ProviderToken) + Send + 'static) -> Self {
        Self {
            token,
            release: Some(Box::new(release)),
        }
    }

    pub fn token(&self) -> ProviderToken {
        self.token
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::trace!("Releasing provider registration {:?}", self.token);
            release(self.token);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("token", &self.token).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_drop_releases_once() {
        let released = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&released);

        let subscription = Subscription::new(ProviderToken(7), move |token| {
            counter.fetch_add(token.0, Ordering::SeqCst);
        });
        assert_eq!(subscription.token(), ProviderToken(7));
        drop(subscription);

        assert_eq!(released.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Media.to_string(), "media");
        assert_eq!(SourceKind::Weather.to_string(), "weather");
    }
}
