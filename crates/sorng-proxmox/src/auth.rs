//! Ticket-based session lifecycle.
//!
//! Login flow:
//! 1. `POST /api2/json/access/ticket` with `username=user@realm`, `password`
//! 2. Receive `data.ticket`, `data.CSRFPreventionToken`, `data.cap`
//! 3. Present the ticket as `PVEAuthCookie` and the CSRF token as a header
//!
//! A ticket is usable while `now - issued_at < lifetime - margin`. Once the
//! remaining validity drops to the margin it is stale and renewed before the
//! next call. Renewal is single-flight: callers that observed the same stale
//! ticket wait for one login exchange and all receive its outcome.

use crate::error::{ProxmoxError, ProxmoxResult};
use crate::transport::{AuthCookie, HttpRequest, HttpTransport, AUTH_COOKIE};
use crate::types::ProxmoxConfig;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use reqwest::Method;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Path of the login endpoint, relative to `/api2/json/`.
pub const AUTH_PATH: &str = "access/ticket";

/// Credentials issued by a successful login exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTicket {
    pub ticket: String,
    pub csrf_token: String,
    /// Capability map, kept as returned.
    pub capabilities: serde_json::Value,
    pub issued_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct LoginEnvelope {
    data: Option<LoginData>,
}

#[derive(Deserialize)]
struct LoginData {
    ticket: Option<String>,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_token: Option<String>,
    #[serde(default)]
    cap: serde_json::Value,
}

#[derive(Default)]
struct RenewalRecord {
    generation: u64,
    last_error: Option<ProxmoxError>,
}

/// Owns credentials, the current ticket, and renewal policy.
pub struct SessionManager {
    config: ProxmoxConfig,
    auth_url: String,
    transport: Arc<dyn HttpTransport>,
    ticket: RwLock<Option<AuthTicket>>,
    renewal: Mutex<RenewalRecord>,
    generation: AtomicU64,
}

impl SessionManager {
    /// Build a manager; no login happens until the first `ensure_valid`.
    pub fn new(
        config: ProxmoxConfig,
        auth_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config,
            auth_url: auth_url.into(),
            transport,
            ticket: RwLock::new(None),
            renewal: Mutex::new(RenewalRecord::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ProxmoxConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn lifetime(&self) -> Duration {
        Duration::minutes(self.config.ticket_lifetime_mins as i64)
    }

    pub fn renewal_margin(&self) -> Duration {
        Duration::minutes(self.config.renewal_margin_mins as i64)
    }

    /// Replace the held ticket, e.g. with one persisted from an earlier run.
    pub async fn install_ticket(&self, ticket: AuthTicket) {
        *self.ticket.write().await = Some(ticket);
    }

    /// Currently held ticket, usable or not.
    pub async fn current_ticket(&self) -> Option<AuthTicket> {
        self.ticket.read().await.clone()
    }

    pub async fn clear(&self) {
        *self.ticket.write().await = None;
    }

    /// Whether `ticket` may still be presented at `now`.
    pub fn is_usable(&self, ticket: &AuthTicket, now: DateTime<Utc>) -> bool {
        now - ticket.issued_at < self.lifetime() - self.renewal_margin()
    }

    /// Cookie carrying `ticket`, expiring with its nominal lifetime.
    pub fn auth_cookie(&self, ticket: &AuthTicket) -> AuthCookie {
        AuthCookie {
            name: AUTH_COOKIE.to_string(),
            value: ticket.ticket.clone(),
            expires: ticket.issued_at + self.lifetime(),
        }
    }

    async fn usable_ticket(&self) -> Option<AuthTicket> {
        let guard = self.ticket.read().await;
        guard
            .as_ref()
            .filter(|t| self.is_usable(t, Utc::now()))
            .cloned()
    }

    /// Return a ticket usable for the next call, logging in first when the
    /// held one is missing or stale.
    pub async fn ensure_valid(&self) -> ProxmoxResult<AuthTicket> {
        let observed = self.generation.load(Ordering::Acquire);
        if let Some(ticket) = self.usable_ticket().await {
            return Ok(ticket);
        }

        let mut record = self.renewal.lock().await;

        if record.generation != observed {
            // Another caller renewed while we waited for the lock.
            if let Some(err) = &record.last_error {
                return Err(err.clone());
            }
            if let Some(ticket) = self.usable_ticket().await {
                return Ok(ticket);
            }
        }

        if let Some(held) = self.current_ticket().await {
            let remaining = held.issued_at + self.lifetime() - Utc::now();
            debug!(
                "Proxmox ticket for {} is stale ({}s left), renewing",
                self.config.login_name(),
                remaining.num_seconds()
            );
        }

        let outcome = self.login().await;
        match &outcome {
            Ok(ticket) => {
                *self.ticket.write().await = Some(ticket.clone());
                record.last_error = None;
            }
            Err(e) => {
                warn!("Proxmox login for {} failed: {e}", self.config.login_name());
                record.last_error = Some(e.clone());
            }
        }
        record.generation += 1;
        self.generation.store(record.generation, Ordering::Release);
        outcome
    }

    /// One login exchange. Does not touch the held ticket.
    async fn login(&self) -> ProxmoxResult<AuthTicket> {
        info!(
            "Proxmox login as {} on {}:{}",
            self.config.login_name(),
            self.config.host,
            self.config.port
        );

        let mut request = HttpRequest::new(Method::POST, &self.auth_url);
        request.form = vec![
            ("username".to_string(), self.config.login_name()),
            ("password".to_string(), self.config.password.clone()),
        ];

        let resp = self
            .transport
            .send(request)
            .await
            .map_err(|e| ProxmoxError::auth(format!("Login request failed: {}", e.message)))?;

        if !resp.is_ok() {
            return Err(ProxmoxError::auth(format!(
                "Login rejected with HTTP {}: {}",
                resp.status,
                resp.body_snippet()
            )));
        }

        let envelope: LoginEnvelope = serde_json::from_slice(&resp.body)
            .map_err(|e| ProxmoxError::auth(format!("Malformed login response: {e}")))?;
        let data = envelope
            .data
            .ok_or_else(|| ProxmoxError::auth("Login response has no data"))?;
        let ticket = data
            .ticket
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProxmoxError::auth("Login response has no ticket"))?;
        let csrf_token = data
            .csrf_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProxmoxError::auth("Login response has no CSRFPreventionToken"))?;

        info!("Proxmox login as {} succeeded", self.config.login_name());

        Ok(AuthTicket {
            ticket,
            csrf_token,
            capabilities: data.cap,
            issued_at: Utc::now(),
        })
    }
}
