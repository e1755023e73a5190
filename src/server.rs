//! Server handle ownership — the connection to a host's Session Directory.

use crate::directory::{DirectoryError, RawHandle, SessionDirectory};
use crate::types::{SessionError, SessionResult};
use log::debug;
use std::sync::Arc;

/// An ownable connection to a host's Session Directory.
///
/// The local host is represented by a zero-cost sentinel that owns nothing
/// and is never released; any other host owns a native handle that is
/// released exactly once, either explicitly via [`release`](Self::release)
/// or when the value is dropped. A released handle is never reused.
pub struct ServerHandle {
    directory: Arc<dyn SessionDirectory>,
    host_name: String,
    state: HandleState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Local,
    Open(RawHandle),
    Released,
}

impl ServerHandle {
    /// The local-host sentinel.
    pub fn local(directory: Arc<dyn SessionDirectory>) -> Self {
        let host_name = directory.local_host_name();
        Self { directory, host_name, state: HandleState::Local }
    }

    /// Open a handle to `host_name`.
    ///
    /// Returns the local sentinel when `host_name` is empty or matches the
    /// local host's name case-insensitively; otherwise asks the directory
    /// for a native handle.
    pub fn open(directory: Arc<dyn SessionDirectory>, host_name: &str) -> SessionResult<Self> {
        let local_name = directory.local_host_name();
        if host_name.is_empty() || host_name.eq_ignore_ascii_case(&local_name) {
            return Ok(Self { directory, host_name: local_name, state: HandleState::Local });
        }
        match directory.open_host(host_name) {
            Ok(raw) => {
                debug!("opened server handle for '{}'", host_name);
                Ok(Self {
                    directory,
                    host_name: host_name.to_string(),
                    state: HandleState::Open(raw),
                })
            }
            Err(DirectoryError::AccessDenied) => Err(SessionError::access_denied(format!(
                "access denied opening server '{}'",
                host_name
            ))),
            Err(e) => Err(SessionError::host(
                e.code(),
                format!("failed to open server '{}': {}", host_name, e),
            )),
        }
    }

    /// The host this handle is (or was) connected to.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn is_local(&self) -> bool {
        self.state == HandleState::Local
    }

    /// The raw handle value to pass into directory calls.
    ///
    /// Callers must not use a handle after [`release`](Self::release); the
    /// owning session's disposed flag guards every such path.
    pub fn raw(&self) -> RawHandle {
        match self.state {
            HandleState::Open(raw) => raw,
            HandleState::Local | HandleState::Released => RawHandle::LOCAL,
        }
    }

    /// Release the underlying native handle. Idempotent; a no-op for the
    /// local sentinel.
    pub fn release(&mut self) {
        if let HandleState::Open(raw) = self.state {
            self.directory.close_host(raw);
            debug!("released server handle for '{}'", self.host_name);
        }
        if self.state != HandleState::Local {
            self.state = HandleState::Released;
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("host_name", &self.host_name)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{ClientRecord, DirectoryResult, SessionRecord};
    use crate::types::SessionErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal directory stub: counts opens/closes, optionally denies.
    #[derive(Default)]
    struct StubDirectory {
        opens: AtomicUsize,
        closes: AtomicUsize,
        deny: bool,
    }

    impl SessionDirectory for StubDirectory {
        fn local_host_name(&self) -> String {
            "WORKSTATION-7".to_string()
        }

        fn open_host(&self, _host_name: &str) -> DirectoryResult<RawHandle> {
            if self.deny {
                return Err(DirectoryError::AccessDenied);
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(RawHandle(0xBEEF))
        }

        fn close_host(&self, handle: RawHandle) {
            assert!(!handle.is_local(), "sentinel must never be closed");
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn enumerate_sessions(&self, _handle: RawHandle) -> DirectoryResult<Vec<u32>> {
            Ok(Vec::new())
        }

        fn session_record(&self, _handle: RawHandle, _id: u32) -> DirectoryResult<SessionRecord> {
            Err(DirectoryError::NotFound)
        }

        fn client_record(&self, _handle: RawHandle, _id: u32) -> DirectoryResult<ClientRecord> {
            Err(DirectoryError::NotFound)
        }

        fn disconnect(&self, _handle: RawHandle, _id: u32) -> DirectoryResult<()> {
            Ok(())
        }

        fn logoff(&self, _handle: RawHandle, _id: u32) -> DirectoryResult<()> {
            Ok(())
        }

        fn connect(&self, _logon: u32, _target: u32, _password: &str) -> DirectoryResult<()> {
            Ok(())
        }
    }

    #[test]
    fn empty_host_name_is_local_sentinel() {
        let dir = Arc::new(StubDirectory::default());
        let handle = ServerHandle::open(dir.clone(), "").unwrap();
        assert!(handle.is_local());
        assert!(handle.raw().is_local());
        assert_eq!(dir.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn local_host_name_matches_case_insensitively() {
        let dir = Arc::new(StubDirectory::default());
        let handle = ServerHandle::open(dir.clone(), "workstation-7").unwrap();
        assert!(handle.is_local());
        assert_eq!(dir.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remote_host_opens_native_handle() {
        let dir = Arc::new(StubDirectory::default());
        let handle = ServerHandle::open(dir.clone(), "RDSH-01").unwrap();
        assert!(!handle.is_local());
        assert_eq!(handle.raw(), RawHandle(0xBEEF));
        assert_eq!(handle.host_name(), "RDSH-01");
        assert_eq!(dir.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn denied_open_is_access_denied() {
        let dir = Arc::new(StubDirectory { deny: true, ..Default::default() });
        let err = ServerHandle::open(dir, "RDSH-01").unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::AccessDenied);
    }

    #[test]
    fn release_is_idempotent() {
        let dir = Arc::new(StubDirectory::default());
        let mut handle = ServerHandle::open(dir.clone(), "RDSH-01").unwrap();
        handle.release();
        handle.release();
        handle.release();
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_exactly_once() {
        let dir = Arc::new(StubDirectory::default());
        {
            let _handle = ServerHandle::open(dir.clone(), "RDSH-01").unwrap();
        }
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_release_then_drop_does_not_double_close() {
        let dir = Arc::new(StubDirectory::default());
        {
            let mut handle = ServerHandle::open(dir.clone(), "RDSH-01").unwrap();
            handle.release();
        }
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sentinel_release_is_noop() {
        let dir = Arc::new(StubDirectory::default());
        let mut handle = ServerHandle::local(dir.clone());
        handle.release();
        drop(handle);
        assert_eq!(dir.closes.load(Ordering::SeqCst), 0);
    }
}
