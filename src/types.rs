//! Domain types for Terminal Services session management.
//!
//! Rust-native, serde-friendly representations of the native WTS
//! enumerations, plus the crate-wide error type.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// All possible errors produced by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for String {
    fn from(e: SessionError) -> Self {
        e.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionErrorKind {
    /// A caller-supplied argument was rejected; carries the parameter name.
    InvalidArgument(String),
    /// The directory denied access (insufficient privileges).
    AccessDenied,
    /// Any other native failure; carries the raw Win32 error code.
    HostError(u32),
    /// The session object has already been disposed.
    Disposed,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Reject a caller-supplied argument, naming the offending parameter.
    ///
    /// Also used when the directory reports "no such session": an unknown
    /// session id surfaces as an invalid `session_id` argument, so callers
    /// catch a single kind for both a malformed and an unknown id.
    pub fn invalid_argument(param: &str, message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::InvalidArgument(param.to_string()), message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::AccessDenied, message)
    }

    pub fn host(code: u32, message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::HostError(code), message)
    }

    pub fn disposed() -> Self {
        Self::new(SessionErrorKind::Disposed, "session has been disposed")
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// WTS_CONNECTSTATE_CLASS – the 10 possible session states.
///
/// Variant order matches the native enumeration exactly; the raw state
/// dword maps by ordinal through [`SessionState::from_u32`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// User is logged on and actively connected.
    Active,
    /// Session is connected to the client.
    Connected,
    /// Session is in the process of connecting to the client.
    ConnectQuery,
    /// Session is shadowing another session.
    Shadow,
    /// Session is active but the client is disconnected.
    Disconnected,
    /// WinStation is waiting for a client to connect.
    Idle,
    /// WinStation is listening for a connection.
    Listen,
    /// WinStation is being reset.
    Reset,
    /// WinStation is down due to an error.
    Down,
    /// WinStation is initializing.
    Init,
    /// Unknown state not mapped from the API.
    Unknown,
}

impl SessionState {
    /// Map the raw WTS_CONNECTSTATE_CLASS value by ordinal.
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Connected,
            2 => Self::ConnectQuery,
            3 => Self::Shadow,
            4 => Self::Disconnected,
            5 => Self::Idle,
            6 => Self::Listen,
            7 => Self::Reset,
            8 => Self::Down,
            9 => Self::Init,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Connected => write!(f, "Connected"),
            Self::ConnectQuery => write!(f, "ConnectQuery"),
            Self::Shadow => write!(f, "Shadow"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Idle => write!(f, "Idle"),
            Self::Listen => write!(f, "Listen"),
            Self::Reset => write!(f, "Reset"),
            Self::Down => write!(f, "Down"),
            Self::Init => write!(f, "Init"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Unknown
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Address family
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Address family of the client connection (from the raw family dword).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressFamily {
    /// AF_INET (2).
    Ipv4,
    /// AF_INET6 (23).
    Ipv6,
    /// Any other family; carries the raw value.
    Other(u32),
}

impl AddressFamily {
    pub fn from_u32(v: u32) -> Self {
        match v {
            2 => Self::Ipv4,
            23 => Self::Ipv6,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "AF_INET"),
            Self::Ipv6 => write!(f, "AF_INET6"),
            Self::Other(v) => write!(f, "AF({})", v),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Encryption level
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// RDP encryption level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncryptionLevel {
    /// No encryption.
    None,
    /// 56-bit encryption.
    Low,
    /// Client compatible.
    ClientCompatible,
    /// 128-bit encryption.
    High,
    /// FIPS 140-1 compliant.
    FipsCompliant,
    /// Unknown level.
    Unknown,
}

impl EncryptionLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::None,
            1 => Self::Low,
            2 => Self::ClientCompatible,
            3 => Self::High,
            4 => Self::FipsCompliant,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Low => write!(f, "Low (56-bit)"),
            Self::ClientCompatible => write!(f, "Client Compatible"),
            Self::High => write!(f, "High (128-bit)"),
            Self::FipsCompliant => write!(f, "FIPS Compliant"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
