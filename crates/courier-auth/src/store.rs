//! Token store contract.
//!
//! The auth middleware depends only on this contract, never on a concrete
//! storage medium. Cookie- or disk-backed stores live outside the core; the
//! in-memory store below covers processes and tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::SystemTime;

/// Metadata stored next to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMeta {
    /// When the token expires, if known.
    pub expires_at: Option<SystemTime>,
}

/// A token together with its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRecord {
    /// The stored token, if any.
    pub token: Option<String>,
    /// The stored metadata, if any.
    pub meta: Option<TokenMeta>,
}

/// Storage contract for bearer-style credentials.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the stored token.
    async fn token(&self) -> Option<String>;

    /// Stores a token with optional metadata.
    async fn set_token(&self, token: String, meta: Option<TokenMeta>);

    /// Clears the stored token and metadata.
    async fn clear(&self);

    /// Returns the stored metadata. Stores that do not track metadata keep
    /// the default.
    async fn meta(&self) -> Option<TokenMeta> {
        None
    }

    /// Returns the combined token + metadata record.
    async fn record(&self) -> Option<TokenRecord> {
        let token = self.token().await;
        let meta = self.meta().await;
        if token.is_none() && meta.is_none() {
            None
        } else {
            Some(TokenRecord { token, meta })
        }
    }

    /// Replaces the combined record.
    async fn set_record(&self, record: TokenRecord) {
        match record.token {
            Some(token) => self.set_token(token, record.meta).await,
            None => self.clear().await,
        }
    }
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: RwLock<TokenRecord>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn token(&self) -> Option<String> {
        self.record.read().token.clone()
    }

    async fn set_token(&self, token: String, meta: Option<TokenMeta>) {
        let mut record = self.record.write();
        record.token = Some(token);
        record.meta = meta;
    }

    async fn clear(&self) {
        *self.record.write() = TokenRecord::default();
    }

    async fn meta(&self) -> Option<TokenMeta> {
        self.record.read().meta.clone()
    }

    async fn record(&self) -> Option<TokenRecord> {
        let record = self.record.read().clone();
        if record.token.is_none() && record.meta.is_none() {
            None
        } else {
            Some(record)
        }
    }

    async fn set_record(&self, record: TokenRecord) {
        *self.record.write() = record;
    }
}
