use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::TokenProvider;
use crate::storage::{load_json, save_json, KeyValueStore};

/// Stored session token.
pub const SESSION_KEY: &str = "auth.session";

/// Identity tokens issued to the web app are valid for one hour.
const TOKEN_LIFETIME_MINUTES: i64 = 60;

/// A token this close to expiry is no longer attached to requests.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: impl Into<String>, username: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            issued_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::minutes(TOKEN_LIFETIME_MINUTES)
    }

    pub fn minutes_left(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_minutes().max(0)
    }

    fn attachable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at() - Duration::minutes(EXPIRY_MARGIN_MINUTES)
    }
}

/// A short-lived token kept in the local store next to the cached data.
/// An expired stored token loads as no session.
#[derive(Debug, Clone, Default)]
pub struct Session(Option<SessionData>);

impl Session {
    pub fn load(store: &dyn KeyValueStore, now: DateTime<Utc>) -> Result<Self> {
        let Some(value) = load_json(store, SESSION_KEY)? else {
            return Ok(Self::default());
        };
        let data: SessionData = serde_json::from_value(value).context("Failed to parse stored session")?;
        Ok(Self((now < data.expires_at()).then_some(data)))
    }

    /// Persist `data`, replacing any earlier session.
    pub fn start(store: &dyn KeyValueStore, data: SessionData) -> Result<Self> {
        save_json(store, SESSION_KEY, &data)?;
        Ok(Self(Some(data)))
    }

    pub fn end(store: &dyn KeyValueStore) -> Result<()> {
        store.remove(SESSION_KEY)
    }

    pub fn data(&self) -> Option<&SessionData> {
        self.0.as_ref()
    }

    pub fn token_at(&self, now: DateTime<Utc>) -> Option<&str> {
        self.0
            .as_ref()
            .filter(|d| d.attachable_at(now))
            .map(|d| d.token.as_str())
    }
}

impl TokenProvider for Session {
    fn bearer_token(&self) -> BoxFuture<'_, Result<Option<String>>> {
        let token = self.token_at(Utc::now()).map(str::to_string);
        Box::pin(async move { Ok(token) })
    }
}
