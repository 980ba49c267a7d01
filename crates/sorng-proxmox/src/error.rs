//! Error types for the Proxmox client crate.

use std::fmt;

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxmoxErrorKind {
    /// Login exchange failed or returned an unusable payload
    Auth,
    /// Network / connection failure
    Transport,
    /// Non-200 response, raised by the layer that inspects the status
    HttpStatus(u16),
    /// Envelope or payload JSON does not match the expected shape
    Decode,
    /// Value rejected before any call was made
    Validation { field: String, reason: String },
    /// Lookup-by-identifier scan found no match
    NotFound,
    /// Entity carries no ownership chain able to issue the call
    Unattached,
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone)]
pub struct ProxmoxError {
    pub kind: ProxmoxErrorKind,
    pub message: String,
}

impl ProxmoxError {
    pub fn new(kind: ProxmoxErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(ProxmoxErrorKind::Auth, msg)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(ProxmoxErrorKind::Transport, msg)
    }

    pub fn http_status(code: u16, msg: impl Into<String>) -> Self {
        Self::new(ProxmoxErrorKind::HttpStatus(code), msg)
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ProxmoxErrorKind::Decode, msg)
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        let reason = reason.into();
        let message = format!("{field}: {reason}");
        Self::new(ProxmoxErrorKind::Validation { field, reason }, message)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ProxmoxErrorKind::NotFound, msg)
    }

    pub fn unattached(msg: impl Into<String>) -> Self {
        Self::new(ProxmoxErrorKind::Unattached, msg)
    }

    /// The offending field name for validation errors.
    pub fn validation_field(&self) -> Option<&str> {
        match &self.kind {
            ProxmoxErrorKind::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// The HTTP status for status errors.
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            ProxmoxErrorKind::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for ProxmoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ProxmoxError {}

impl From<ProxmoxError> for String {
    fn from(e: ProxmoxError) -> String {
        e.to_string()
    }
}

impl From<reqwest::Error> for ProxmoxError {
    fn from(e: reqwest::Error) -> Self {
        Self::transport(format!("HTTP error: {e}"))
    }
}

impl From<serde_json::Error> for ProxmoxError {
    fn from(e: serde_json::Error) -> Self {
        Self::decode(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type ProxmoxResult<T> = Result<T, ProxmoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_carries_field_and_reason() {
        let e = ProxmoxError::validation("cores", "must be between 1 and 128");
        assert_eq!(e.validation_field(), Some("cores"));
        assert_eq!(e.message, "cores: must be between 1 and 128");
        assert!(e.to_string().contains("Validation"));
    }

    #[test]
    fn status_code_only_for_http_errors() {
        assert_eq!(ProxmoxError::http_status(500, "boom").status_code(), Some(500));
        assert_eq!(ProxmoxError::auth("nope").status_code(), None);
    }

    #[test]
    fn reqwest_errors_map_to_transport() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let e: ProxmoxError = err.into();
        assert_eq!(e.kind, ProxmoxErrorKind::Transport);
        assert!(e.message.starts_with("HTTP error: "));
    }

    #[test]
    fn json_errors_map_to_decode() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let e: ProxmoxError = err.into();
        assert_eq!(e.kind, ProxmoxErrorKind::Decode);
    }
}
