//! Run lease on the store key.
//!
//! Two overlapping runs would each publish their own staged copy and the
//! later upload would silently drop the other run's merges. The lease is a
//! lock object next to the store, created with a create-only write so only
//! one run can hold it. A lock whose `expires_at` has passed belongs to a run
//! that died without releasing it and may be taken over.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RunContext;
use crate::storage::ObjectStore;

/// Body of the lock object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub run_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub struct LeaseManager {
    objects: Arc<dyn ObjectStore>,
    key: String,
    ttl: Duration,
}

impl LeaseManager {
    pub fn new(objects: Arc<dyn ObjectStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            objects,
            key: key.into(),
            ttl,
        }
    }

    /// Take the lease for `ctx`, stamped with the current wall-clock time.
    pub async fn acquire(&self, ctx: &RunContext) -> Result<Lease> {
        self.acquire_at(ctx, Utc::now()).await
    }

    /// Take the lease as of `now`, replacing a stale lock at most once.
    ///
    /// The stale lock is only replaced while it is still the exact version
    /// that was judged stale, so two runs racing for the same stale lock
    /// cannot both win.
    pub async fn acquire_at(&self, ctx: &RunContext, now: DateTime<Utc>) -> Result<Lease> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|_| AppError::config(format!("lease ttl {:?} is out of range", self.ttl)))?;
        let lease = Lease {
            run_id: ctx.run_id.clone(),
            acquired_at: now,
            expires_at: now + ttl,
        };
        let body = serde_json::to_vec(&lease)?;

        if self.objects.upload_if_absent(&self.key, body.clone()).await? {
            return Ok(self.acquired(lease));
        }

        let current = match self.objects.download_versioned(&self.key).await {
            Ok(current) => current,
            // Released between the two calls.
            Err(e) if e.is_not_found() => {
                return if self.objects.upload_if_absent(&self.key, body).await? {
                    Ok(self.acquired(lease))
                } else {
                    Err(self.lost_race())
                };
            }
            Err(e) => return Err(e),
        };

        let holder = self.parse(&current.bytes);
        if !holder.is_expired(now) {
            return Err(AppError::lease(format!(
                "{} is held by run {} until {}",
                self.objects.location(&self.key),
                holder.run_id,
                holder.expires_at
            )));
        }

        log::warn!(
            "Taking over stale lease of run {} (expired {})",
            holder.run_id,
            holder.expires_at
        );
        if self
            .objects
            .replace_if_matches(&self.key, &current.version, body)
            .await?
        {
            Ok(self.acquired(lease))
        } else {
            Err(self.lost_race())
        }
    }

    /// Drop the lock if it still belongs to `lease`.
    pub async fn release(&self, lease: &Lease) -> Result<()> {
        match self.holder().await? {
            Some(holder) if holder.run_id == lease.run_id => {
                self.objects.delete(&self.key).await?;
                log::info!("Released lease {}", self.key);
            }
            Some(holder) => {
                log::warn!(
                    "Lease {} now belongs to run {}, leaving it in place",
                    self.key,
                    holder.run_id
                );
            }
            None => log::warn!("Lease {} vanished before release", self.key),
        }
        Ok(())
    }

    fn acquired(&self, lease: Lease) -> Lease {
        log::info!("Acquired lease {} until {}", self.key, lease.expires_at);
        lease
    }

    fn lost_race(&self) -> AppError {
        AppError::lease(format!(
            "{} was taken by another run during takeover",
            self.objects.location(&self.key)
        ))
    }

    /// Current lock holder, if any.
    async fn holder(&self) -> Result<Option<Lease>> {
        match self.objects.download(&self.key).await {
            Ok(bytes) => Ok(Some(self.parse(&bytes))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decode a lock body.
    ///
    /// A lock body that cannot be parsed can never expire on its own, so it
    /// is reported as an already expired lease.
    fn parse(&self, bytes: &[u8]) -> Lease {
        serde_json::from_slice(bytes).unwrap_or_else(|e| {
            log::warn!("Unreadable lease {}: {}", self.key, e);
            Lease {
                run_id: String::from("<unreadable>"),
                acquired_at: DateTime::UNIX_EPOCH,
                expires_at: DateTime::UNIX_EPOCH,
            }
        })
    }
}
