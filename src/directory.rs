//! The Session Directory boundary.
//!
//! Everything above this module works against the [`SessionDirectory`]
//! trait; the native `wtsapi32` marshaling lives behind it (see
//! [`crate::wts`] on Windows). Raw records mirror the fixed layout of the
//! native `WTSINFOW` / `WTSCLIENTW` blocks: wide-string fields stay as
//! NUL-terminated UTF-16 buffers and are decoded on demand by the owning
//! session or client view.

use chrono::{DateTime, Utc};
use std::fmt;

/// Special session id meaning the calling session.
pub const CURRENT_SESSION: u32 = 0xFFFF_FFFF;

/// Opaque directory handle value. Zero is the local-server sentinel and is
/// never released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle(pub isize);

impl RawHandle {
    /// The local RD Session Host server; no open/close required.
    pub const LOCAL: RawHandle = RawHandle(0);

    pub fn is_local(self) -> bool {
        self == Self::LOCAL
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Directory errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Failure reported by the directory itself, before translation into the
/// crate's [`SessionError`](crate::types::SessionError) taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryError {
    /// No session (or host) with the requested identity.
    NotFound,
    /// The directory denied access.
    AccessDenied,
    /// Any other native error; carries the Win32 code.
    Other(u32),
}

impl DirectoryError {
    /// The native code to report for this failure.
    pub fn code(self) -> u32 {
        match self {
            // ERROR_FILE_NOT_FOUND / ERROR_ACCESS_DENIED
            Self::NotFound => 2,
            Self::AccessDenied => 5,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::AccessDenied => write!(f, "access denied"),
            Self::Other(code) => write!(f, "Win32 error {}", code),
        }
    }
}

impl std::error::Error for DirectoryError {}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// WINSTATIONNAME_LENGTH + NUL.
pub const WINSTATION_NAME_LEN: usize = 33;
/// DOMAIN_LENGTH + NUL.
pub const DOMAIN_LEN: usize = 18;
/// USERNAME_LENGTH + NUL.
pub const USER_NAME_LEN: usize = 21;
/// MAX_PATH + NUL.
pub const CLIENT_DIRECTORY_LEN: usize = 261;
/// CLIENTADDRESS_LENGTH + NUL, in 16-bit words.
pub const CLIENT_ADDRESS_WORDS: usize = 31;

/// Raw per-session record (the `WTSINFOW` block).
///
/// Timestamps are Windows FILETIME values (100 ns ticks since 1601-01-01);
/// zero means "not set" for everything except `current_time`.
#[derive(Debug, Clone, Copy)]
pub struct SessionRecord {
    pub state: u32,
    pub session_id: u32,
    pub win_station_name: [u16; WINSTATION_NAME_LEN],
    pub domain: [u16; DOMAIN_LEN],
    pub user_name: [u16; USER_NAME_LEN],
    pub connect_time: i64,
    pub disconnect_time: i64,
    pub last_input_time: i64,
    pub logon_time: i64,
    pub current_time: i64,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            state: u32::MAX,
            session_id: 0,
            win_station_name: [0; WINSTATION_NAME_LEN],
            domain: [0; DOMAIN_LEN],
            user_name: [0; USER_NAME_LEN],
            connect_time: 0,
            disconnect_time: 0,
            last_input_time: 0,
            logon_time: 0,
            current_time: 0,
        }
    }
}

/// Raw per-client record (the `WTSCLIENTW` block).
///
/// `address` holds the native 16-bit words verbatim; interpretation depends
/// on `address_family` (see [`crate::client::ClientInfo::address`]).
#[derive(Debug, Clone, Copy)]
pub struct ClientRecord {
    pub client_name: [u16; USER_NAME_LEN],
    pub domain: [u16; DOMAIN_LEN],
    pub user_name: [u16; USER_NAME_LEN],
    pub client_directory: [u16; CLIENT_DIRECTORY_LEN],
    pub build_number: u32,
    pub encryption_level: u8,
    pub address_family: u32,
    pub address: [u16; CLIENT_ADDRESS_WORDS],
    pub horizontal_resolution: u16,
    pub vertical_resolution: u16,
    pub color_depth: u16,
}

impl Default for ClientRecord {
    fn default() -> Self {
        Self {
            client_name: [0; USER_NAME_LEN],
            domain: [0; DOMAIN_LEN],
            user_name: [0; USER_NAME_LEN],
            client_directory: [0; CLIENT_DIRECTORY_LEN],
            build_number: 0,
            encryption_level: 0,
            address_family: 0,
            address: [0; CLIENT_ADDRESS_WORDS],
            horizontal_resolution: 0,
            vertical_resolution: 0,
            color_depth: 0,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  The directory trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The native service tracking all sessions on a host.
///
/// All calls are synchronous and blocking; they either complete or fail,
/// with no cancellation or timeout semantics.
pub trait SessionDirectory: Send + Sync {
    /// Name of the host this process runs on, used to recognize requests
    /// that can be served by the local sentinel handle.
    fn local_host_name(&self) -> String;

    /// Open a handle to the named host. Never called for the local host.
    fn open_host(&self, host_name: &str) -> DirectoryResult<RawHandle>;

    /// Close a previously opened handle. Idempotent; a no-op for
    /// [`RawHandle::LOCAL`].
    fn close_host(&self, handle: RawHandle);

    /// All session ids currently known on the host.
    fn enumerate_sessions(&self, handle: RawHandle) -> DirectoryResult<Vec<u32>>;

    /// Fetch the session record for one session. [`CURRENT_SESSION`]
    /// resolves to the session hosting the calling process.
    fn session_record(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<SessionRecord>;

    /// Fetch the client record for one session.
    fn client_record(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<ClientRecord>;

    /// Disconnect the session; the user stays logged on.
    fn disconnect(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<()>;

    /// Log the session off, terminating the user's processes.
    fn logoff(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<()>;

    /// Transfer a disconnected session to another session.
    fn connect(&self, logon_id: u32, target_logon_id: u32, password: &str) -> DirectoryResult<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Decoding helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a NUL-terminated UTF-16 buffer. Returns `None` when the decoded
/// length is zero.
pub(crate) fn decode_wide(buf: &[u16]) -> Option<String> {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    if len == 0 {
        return None;
    }
    Some(String::from_utf16_lossy(&buf[..len]))
}

/// Seconds between 1601-01-01 and 1970-01-01, in 100 ns units.
const FILETIME_UNIX_DIFF: i64 = 116_444_736_000_000_000;

/// Convert a FILETIME to `DateTime<Utc>`, treating zero (or negative) as
/// "not set".
pub(crate) fn filetime_opt(ft: i64) -> Option<DateTime<Utc>> {
    if ft <= 0 {
        return None;
    }
    Some(filetime(ft))
}

/// Convert a FILETIME to `DateTime<Utc>` unconditionally.
pub(crate) fn filetime(ft: i64) -> DateTime<Utc> {
    let unix_100ns = ft - FILETIME_UNIX_DIFF;
    let secs = unix_100ns.div_euclid(10_000_000);
    let nanos = (unix_100ns.rem_euclid(10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Test fixtures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━


// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
