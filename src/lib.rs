//! # wtsession – Windows Terminal Services session management
//!
//! An object-oriented layer over the native WTS API (`wtsapi32.dll`).
//! Provides:
//!
//! - **Session access** – the calling process's session, lookup by id on
//!   the local or a remote RD Session Host, full enumeration
//! - **Session metadata** – user/domain/WinStation names, connection
//!   state, connect/disconnect/logon/last-input timestamps, idle time,
//!   all fetched lazily and cached until an explicit refresh
//! - **Client metadata** – name, address, display resolution, build
//!   number and encryption level of the connected RDP client
//! - **Control** – disconnect and logoff
//!
//! The session layer works against the [`SessionDirectory`] trait; the
//! native backend ([`wts::WtsDirectory`]) is only compiled on Windows, so
//! the core compiles and tests everywhere.
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn demo() -> Result<(), wtsession::SessionError> {
//! use std::sync::Arc;
//! use wtsession::{wts::WtsDirectory, Session};
//!
//! let directory = Arc::new(WtsDirectory::new());
//! let mut session = Session::current(directory)?;
//! println!("session {} for {:?}", session.session_id(), session.user_name()?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod directory;
pub mod server;
pub mod session;
pub mod types;

#[cfg(windows)]
pub mod wts;

pub use client::ClientInfo;
pub use directory::{RawHandle, SessionDirectory, CURRENT_SESSION};
pub use server::ServerHandle;
pub use session::Session;
pub use types::{
    AddressFamily, EncryptionLevel, SessionError, SessionErrorKind, SessionResult, SessionState,
};
