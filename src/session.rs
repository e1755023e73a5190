//! The session entity — lazily-fetched, bulk-invalidatable metadata for one
//! Terminal Services session.

use crate::client::ClientInfo;
use crate::directory::{
    decode_wide, filetime, filetime_opt, ClientRecord, DirectoryError, RawHandle, SessionDirectory,
    SessionRecord, CURRENT_SESSION,
};
use crate::server::ServerHandle;
use crate::types::{SessionError, SessionResult, SessionState};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::sync::Arc;

/// A lazily-computed field: untouched since the last cache reset, or
/// resolved to a value.
#[derive(Debug, Clone)]
enum Cached<T> {
    Unresolved,
    Resolved(T),
}

impl<T> Cached<T> {
    fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::Unresolved
    }
}

/// Every lazily-populated piece of session state, reset as one unit by
/// [`Session::refresh`] — there is no partial invalidation.
#[derive(Debug, Default)]
struct SessionCache {
    record: Option<SessionRecord>,
    client_record: Option<ClientRecord>,
    domain_name: Cached<Option<String>>,
    session_name: Cached<Option<String>>,
    user_name: Cached<Option<String>>,
    idle_time: Cached<Duration>,
}

/// A logical desktop login context on a host.
///
/// Constructed through [`current`](Session::current),
/// [`by_id`](Session::by_id), [`on_server`](Session::on_server) or
/// [`enumerate`](Session::enumerate); there is no public constructor.
/// Property accessors fetch from the Session Directory on first use and
/// cache until [`refresh`](Session::refresh); [`dispose`](Session::dispose)
/// releases the server handle and renders every data accessor unusable.
///
/// All accessors take `&mut self` because they populate caches; a session
/// is meant for a single owner and performs no internal locking.
pub struct Session {
    session_id: u32,
    server_name: String,
    directory: Arc<dyn SessionDirectory>,
    handle: Option<ServerHandle>,
    cache: SessionCache,
    disposed: bool,
}

impl Session {
    // ─── Factories ───────────────────────────────────────────────

    /// The session hosting the calling process.
    pub fn current(directory: Arc<dyn SessionDirectory>) -> SessionResult<Session> {
        let record = directory
            .session_record(RawHandle::LOCAL, CURRENT_SESSION)
            .map_err(|e| host_error(e, "failed to query the current session"))?;
        let server_name = directory.local_host_name();
        let handle = ServerHandle::local(directory.clone());
        Ok(Self::assemble(directory, record.session_id, server_name, Some(handle), record))
    }

    /// A session on the local host, looked up by id.
    pub fn by_id(directory: Arc<dyn SessionDirectory>, session_id: i32) -> SessionResult<Session> {
        let id = validate_session_id(session_id)?;
        let record = directory
            .session_record(RawHandle::LOCAL, id)
            .map_err(|e| record_error(e, id))?;
        let server_name = directory.local_host_name();
        let handle = ServerHandle::local(directory.clone());
        Ok(Self::assemble(directory, id, server_name, Some(handle), record))
    }

    /// A session on a named host, looked up by id.
    ///
    /// Opens a server handle first; if the record fetch then fails, the
    /// handle is released before the error propagates.
    pub fn on_server(
        directory: Arc<dyn SessionDirectory>,
        session_id: i32,
        server_name: &str,
    ) -> SessionResult<Session> {
        let id = validate_session_id(session_id)?;
        validate_server_name(server_name)?;
        let handle = ServerHandle::open(directory.clone(), server_name)?;
        // An error below drops `handle`, which closes the native handle.
        let record = directory
            .session_record(handle.raw(), id)
            .map_err(|e| record_error(e, id))?;
        let server_name = handle.host_name().to_string();
        Ok(Self::assemble(directory, id, server_name, Some(handle), record))
    }

    /// All sessions on the local host.
    pub fn enumerate_local(directory: Arc<dyn SessionDirectory>) -> SessionResult<Vec<Session>> {
        Self::enumerate_on(directory, "")
    }

    /// All sessions on a named host.
    ///
    /// Each returned session is detached: the enumeration's own handle is
    /// closed once the listing completes, and a session re-opens a handle
    /// of its own the first time it needs one.
    pub fn enumerate(
        directory: Arc<dyn SessionDirectory>,
        server_name: &str,
    ) -> SessionResult<Vec<Session>> {
        validate_server_name(server_name)?;
        Self::enumerate_on(directory, server_name)
    }

    fn enumerate_on(
        directory: Arc<dyn SessionDirectory>,
        server_name: &str,
    ) -> SessionResult<Vec<Session>> {
        let handle = ServerHandle::open(directory.clone(), server_name)?;
        let ids = directory.enumerate_sessions(handle.raw()).map_err(|e| {
            host_error(e, &format!("failed to enumerate sessions on '{}'", handle.host_name()))
        })?;
        debug!("enumerated {} sessions on '{}'", ids.len(), handle.host_name());

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            let record = directory
                .session_record(handle.raw(), id)
                .map_err(|e| record_error(e, id))?;
            sessions.push(Self::detached(
                directory.clone(),
                id,
                handle.host_name().to_string(),
                record,
            ));
        }
        Ok(sessions)
        // `handle` drops here: the listing's handle never outlives it.
    }

    fn assemble(
        directory: Arc<dyn SessionDirectory>,
        session_id: u32,
        server_name: String,
        handle: Option<ServerHandle>,
        record: SessionRecord,
    ) -> Session {
        Session {
            session_id,
            server_name,
            directory,
            handle,
            cache: SessionCache { record: Some(record), ..Default::default() },
            disposed: false,
        }
    }

    fn detached(
        directory: Arc<dyn SessionDirectory>,
        session_id: u32,
        server_name: String,
        record: SessionRecord,
    ) -> Session {
        Self::assemble(directory, session_id, server_name, None, record)
    }

    // ─── Identity (readable even after disposal) ─────────────────

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ─── Internal plumbing ───────────────────────────────────────

    fn ensure_live(&self) -> SessionResult<()> {
        if self.disposed {
            return Err(SessionError::disposed());
        }
        Ok(())
    }

    /// Open the server handle on first need; memoized for the session's
    /// lifetime. Survives [`refresh`](Self::refresh), cleared only by
    /// disposal.
    fn ensure_handle(&mut self) -> SessionResult<RawHandle> {
        match &self.handle {
            Some(handle) => Ok(handle.raw()),
            None => {
                let handle = ServerHandle::open(self.directory.clone(), &self.server_name)?;
                let raw = handle.raw();
                self.handle = Some(handle);
                Ok(raw)
            }
        }
    }

    fn record(&mut self) -> SessionResult<SessionRecord> {
        self.ensure_live()?;
        match self.cache.record {
            Some(record) => Ok(record),
            None => {
                let raw = self.ensure_handle()?;
                let record = self
                    .directory
                    .session_record(raw, self.session_id)
                    .map_err(|e| record_error(e, self.session_id))?;
                self.cache.record = Some(record);
                Ok(record)
            }
        }
    }

    // ─── Properties ──────────────────────────────────────────────

    /// Client metadata for this session. The wrapper is rebuilt per call;
    /// the underlying record is queried once per cache epoch.
    pub fn client(&mut self) -> SessionResult<ClientInfo> {
        self.ensure_live()?;
        let record = match self.cache.client_record {
            Some(record) => record,
            None => {
                let raw = self.ensure_handle()?;
                let record = self
                    .directory
                    .client_record(raw, self.session_id)
                    .map_err(|e| record_error(e, self.session_id))?;
                self.cache.client_record = Some(record);
                record
            }
        };
        Ok(ClientInfo::new(record))
    }

    pub fn connect_time(&mut self) -> SessionResult<Option<DateTime<Utc>>> {
        Ok(filetime_opt(self.record()?.connect_time))
    }

    pub fn disconnect_time(&mut self) -> SessionResult<Option<DateTime<Utc>>> {
        Ok(filetime_opt(self.record()?.disconnect_time))
    }

    pub fn last_input_time(&mut self) -> SessionResult<Option<DateTime<Utc>>> {
        Ok(filetime_opt(self.record()?.last_input_time))
    }

    pub fn logon_time(&mut self) -> SessionResult<Option<DateTime<Utc>>> {
        Ok(filetime_opt(self.record()?.logon_time))
    }

    /// The host's clock at the moment the record was fetched. Unlike the
    /// other timestamps this is never zero-sentineled.
    pub fn current_time(&mut self) -> SessionResult<DateTime<Utc>> {
        Ok(filetime(self.record()?.current_time))
    }

    pub fn session_state(&mut self) -> SessionResult<SessionState> {
        Ok(SessionState::from_u32(self.record()?.state))
    }

    pub fn domain_name(&mut self) -> SessionResult<Option<String>> {
        self.ensure_live()?;
        if let Cached::Resolved(v) = &self.cache.domain_name {
            return Ok(v.clone());
        }
        let record = self.record()?;
        let v = decode_wide(&record.domain);
        self.cache.domain_name = Cached::Resolved(v.clone());
        Ok(v)
    }

    /// The WinStation name (e.g. `Console`, `RDP-Tcp#0`).
    pub fn session_name(&mut self) -> SessionResult<Option<String>> {
        self.ensure_live()?;
        if let Cached::Resolved(v) = &self.cache.session_name {
            return Ok(v.clone());
        }
        let record = self.record()?;
        let v = decode_wide(&record.win_station_name);
        self.cache.session_name = Cached::Resolved(v.clone());
        Ok(v)
    }

    pub fn user_name(&mut self) -> SessionResult<Option<String>> {
        self.ensure_live()?;
        if let Cached::Resolved(v) = &self.cache.user_name {
            return Ok(v.clone());
        }
        let record = self.record()?;
        let v = decode_wide(&record.user_name);
        self.cache.user_name = Cached::Resolved(v.clone());
        Ok(v)
    }

    /// Time since the last user input: current − last-input when a
    /// last-input timestamp exists, zero otherwise. Memoized independently
    /// of the string fields.
    pub fn idle_time(&mut self) -> SessionResult<Duration> {
        self.ensure_live()?;
        if let Cached::Resolved(d) = &self.cache.idle_time {
            return Ok(*d);
        }
        let record = self.record()?;
        let d = if record.last_input_time > 0 {
            // FILETIME ticks are 100 ns.
            Duration::microseconds((record.current_time - record.last_input_time) / 10)
        } else {
            Duration::zero()
        };
        self.cache.idle_time = Cached::Resolved(d);
        Ok(d)
    }

    // ─── Mutating operations ─────────────────────────────────────

    /// Disconnect the session; the user stays logged on and the session
    /// moves to Disconnected.
    pub fn disconnect(&mut self) -> SessionResult<()> {
        self.ensure_live()?;
        let raw = self.ensure_handle()?;
        info!("disconnecting session {} on '{}'", self.session_id, self.server_name);
        self.directory
            .disconnect(raw, self.session_id)
            .map_err(|e| record_error(e, self.session_id))
    }

    /// Log the session off, terminating the user's processes.
    pub fn logoff(&mut self) -> SessionResult<()> {
        self.ensure_live()?;
        let raw = self.ensure_handle()?;
        info!("logging off session {} on '{}'", self.session_id, self.server_name);
        self.directory
            .logoff(raw, self.session_id)
            .map_err(|e| record_error(e, self.session_id))
    }

    /// Discard every cached record and computed field so the next property
    /// access re-queries the directory. The server handle is kept open —
    /// only disposal releases it. Idempotent; a no-op right after
    /// construction.
    pub fn refresh(&mut self) -> SessionResult<()> {
        self.ensure_live()?;
        self.cache = SessionCache::default();
        Ok(())
    }

    /// Release the server handle (at most once) and clear all caches.
    /// Idempotent. Afterwards every data accessor and mutating operation
    /// fails with a disposed-state error; [`session_id`](Self::session_id)
    /// and [`server_name`](Self::server_name) stay readable.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
        self.cache = SessionCache::default();
        self.disposed = true;
        debug!("disposed session {} on '{}'", self.session_id, self.server_name);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("server_name", &self.server_name)
            .field("disposed", &self.disposed)
            .finish()
    }
}

// ─── Validation & error translation ──────────────────────────────

fn validate_session_id(session_id: i32) -> SessionResult<u32> {
    if session_id < 0 {
        return Err(SessionError::invalid_argument(
            "session_id",
            format!("session id must not be negative, got {}", session_id),
        ));
    }
    Ok(session_id as u32)
}

fn validate_server_name(server_name: &str) -> SessionResult<()> {
    if server_name.is_empty() {
        return Err(SessionError::invalid_argument(
            "server_name",
            "server name must not be empty",
        ));
    }
    Ok(())
}

/// Translate a per-session directory failure. Not-found deliberately maps
/// to an invalid `session_id` argument — callers catch one kind for both a
/// malformed and an unknown id.
fn record_error(err: DirectoryError, session_id: u32) -> SessionError {
    match err {
        DirectoryError::NotFound => SessionError::invalid_argument(
            "session_id",
            format!("no session {} on the server", session_id),
        ),
        DirectoryError::AccessDenied => {
            SessionError::access_denied(format!("access denied for session {}", session_id))
        }
        DirectoryError::Other(code) => {
            SessionError::host(code, format!("operation on session {} failed", session_id))
        }
    }
}

/// Translate a host-level directory failure.
fn host_error(err: DirectoryError, context: &str) -> SessionError {
    match err {
        DirectoryError::AccessDenied => SessionError::access_denied(context.to_string()),
        e => SessionError::host(e.code(), format!("{}: {}", context, e)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::fixtures::{client_record, session_record, T0, TEN_MINUTES};
    use crate::directory::DirectoryResult;
    use crate::types::SessionErrorKind;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const LOCAL_NAME: &str = "WORKSTATION-7";
    const REMOTE_RAW: RawHandle = RawHandle(0xABCD);

    #[derive(Default)]
    struct MockDirectory {
        current: u32,
        records: HashMap<u32, SessionRecord>,
        clients: HashMap<u32, ClientRecord>,
        opens: AtomicUsize,
        closes: AtomicUsize,
        record_queries: AtomicUsize,
        client_queries: AtomicUsize,
        disconnected: Mutex<Vec<u32>>,
        logged_off: Mutex<Vec<u32>>,
        deny_open: bool,
        fail_records: bool,
    }

    impl MockDirectory {
        fn with_sessions() -> Self {
            let mut records = HashMap::new();
            records.insert(0, session_record(0, 4, "Services", "", ""));
            records.insert(1, session_record(1, 0, "Console", "CORP", "alice"));
            records.insert(2, session_record(2, 0, "RDP-Tcp#0", "CORP", "bob"));
            let mut clients = HashMap::new();
            clients.insert(2, client_record("DESKTOP-ABC", "CORP", "bob"));
            Self { current: 1, records, clients, ..Default::default() }
        }
    }

    impl SessionDirectory for MockDirectory {
        fn local_host_name(&self) -> String {
            LOCAL_NAME.to_string()
        }

        fn open_host(&self, _host_name: &str) -> DirectoryResult<RawHandle> {
            if self.deny_open {
                return Err(DirectoryError::AccessDenied);
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(REMOTE_RAW)
        }

        fn close_host(&self, handle: RawHandle) {
            assert!(!handle.is_local());
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn enumerate_sessions(&self, _handle: RawHandle) -> DirectoryResult<Vec<u32>> {
            let mut ids: Vec<u32> = self.records.keys().copied().collect();
            ids.sort_unstable();
            Ok(ids)
        }

        fn session_record(&self, _handle: RawHandle, session_id: u32) -> DirectoryResult<SessionRecord> {
            self.record_queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_records {
                return Err(DirectoryError::Other(31));
            }
            let id = if session_id == CURRENT_SESSION { self.current } else { session_id };
            self.records.get(&id).copied().ok_or(DirectoryError::NotFound)
        }

        fn client_record(&self, _handle: RawHandle, session_id: u32) -> DirectoryResult<ClientRecord> {
            self.client_queries.fetch_add(1, Ordering::SeqCst);
            self.clients.get(&session_id).copied().ok_or(DirectoryError::NotFound)
        }

        fn disconnect(&self, _handle: RawHandle, session_id: u32) -> DirectoryResult<()> {
            self.disconnected.lock().unwrap().push(session_id);
            Ok(())
        }

        fn logoff(&self, _handle: RawHandle, session_id: u32) -> DirectoryResult<()> {
            self.logged_off.lock().unwrap().push(session_id);
            Ok(())
        }

        fn connect(&self, _logon: u32, _target: u32, _password: &str) -> DirectoryResult<()> {
            Ok(())
        }
    }

    fn mock() -> Arc<MockDirectory> {
        Arc::new(MockDirectory::with_sessions())
    }

    // ─── Argument validation ─────────────────────────────────────

    #[test]
    fn negative_session_id_is_invalid_argument() {
        let dir = mock();
        for id in [-1, -42, i32::MIN] {
            let err = Session::by_id(dir.clone(), id).unwrap_err();
            assert_eq!(err.kind, SessionErrorKind::InvalidArgument("session_id".to_string()));
            let err = Session::on_server(dir.clone(), id, "RDSH-01").unwrap_err();
            assert_eq!(err.kind, SessionErrorKind::InvalidArgument("session_id".to_string()));
        }
        assert_eq!(dir.record_queries.load(Ordering::SeqCst), 0, "rejected before any call");
    }

    #[test]
    fn empty_server_name_is_invalid_argument() {
        let dir = mock();
        let err = Session::on_server(dir.clone(), 1, "").unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::InvalidArgument("server_name".to_string()));
        let err = Session::enumerate(dir.clone(), "").unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::InvalidArgument("server_name".to_string()));
        assert_eq!(dir.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_session_id_maps_to_invalid_argument() {
        let dir = mock();
        let err = Session::by_id(dir, 99).unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::InvalidArgument("session_id".to_string()));
        assert!(err.message.contains("99"));
    }

    #[test]
    fn denied_host_open_is_access_denied() {
        let dir = Arc::new(MockDirectory { deny_open: true, ..MockDirectory::with_sessions() });
        let err = Session::on_server(dir, 1, "RDSH-01").unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::AccessDenied);
    }

    // ─── Failure-path cleanup ────────────────────────────────────

    #[test]
    fn handle_released_when_record_fetch_fails() {
        let dir = Arc::new(MockDirectory { fail_records: true, ..MockDirectory::with_sessions() });
        let err = Session::on_server(dir.clone(), 1, "RDSH-01").unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::HostError(31));
        assert_eq!(dir.opens.load(Ordering::SeqCst), 1);
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1, "no handle leak on the failure path");
    }

    // ─── Factories & identity ────────────────────────────────────

    #[test]
    fn current_resolves_real_session_id() {
        let dir = mock();
        let mut session = Session::current(dir).unwrap();
        assert_eq!(session.session_id(), 1);
        assert_eq!(session.server_name(), LOCAL_NAME);
        assert_eq!(session.user_name().unwrap().as_deref(), Some("alice"));
    }

    #[test]
    fn current_and_by_id_report_identical_identity() {
        let dir = mock();
        let mut current = Session::current(dir.clone()).unwrap();
        let mut by_id = Session::by_id(dir, current.session_id() as i32).unwrap();

        assert_eq!(current.session_id(), by_id.session_id());
        assert_eq!(current.server_name(), by_id.server_name());
        assert_eq!(current.domain_name().unwrap(), by_id.domain_name().unwrap());
        assert_eq!(current.user_name().unwrap(), by_id.user_name().unwrap());
    }

    #[test]
    fn by_id_uses_local_sentinel_without_opening() {
        let dir = mock();
        let mut session = Session::by_id(dir.clone(), 2).unwrap();
        session.disconnect().unwrap();
        assert_eq!(dir.opens.load(Ordering::SeqCst), 0);
        assert_eq!(*dir.disconnected.lock().unwrap(), vec![2]);
    }

    #[test]
    fn on_server_matching_local_name_uses_sentinel() {
        let dir = mock();
        let session = Session::on_server(dir.clone(), 1, "workstation-7").unwrap();
        assert_eq!(session.server_name(), LOCAL_NAME);
        assert_eq!(dir.opens.load(Ordering::SeqCst), 0);
    }

    // ─── Enumeration ─────────────────────────────────────────────

    #[test]
    fn enumeration_returns_detached_prefetched_sessions() {
        let dir = mock();
        let sessions = Session::enumerate(dir.clone(), "RDSH-01").unwrap();
        assert_eq!(sessions.len(), 3);
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1, "listing handle closed after enumeration");
        for session in &sessions {
            assert!(session.handle.is_none(), "enumerated sessions retain no handle");
            assert!(session.cache.record.is_some(), "records fetched during enumeration");
        }

        // Pre-fetched records mean property reads issue no further queries.
        let queries = dir.record_queries.load(Ordering::SeqCst);
        let mut sessions = sessions;
        for session in &mut sessions {
            session.session_state().unwrap();
        }
        assert_eq!(dir.record_queries.load(Ordering::SeqCst), queries);
    }

    #[test]
    fn enumeration_contains_current_session() {
        let dir = mock();
        let mut current = Session::current(dir.clone()).unwrap();
        let name = current.session_name().unwrap();

        let mut sessions = Session::enumerate_local(dir).unwrap();
        let matched = sessions
            .iter_mut()
            .find_map(|s| (s.session_name().unwrap() == name).then_some(s))
            .expect("current session must appear in the local enumeration");
        assert_eq!(matched.session_id(), current.session_id());
        assert_eq!(matched.server_name(), current.server_name());
        assert_eq!(matched.domain_name().unwrap(), current.domain_name().unwrap());
        assert_eq!(matched.user_name().unwrap(), current.user_name().unwrap());
    }

    #[test]
    fn detached_session_reopens_handle_on_first_need() {
        let dir = mock();
        let mut sessions = Session::enumerate(dir.clone(), "RDSH-01").unwrap();
        assert_eq!(dir.opens.load(Ordering::SeqCst), 1);

        let session = sessions.iter_mut().find(|s| s.session_id() == 2).unwrap();
        session.logoff().unwrap();
        assert_eq!(dir.opens.load(Ordering::SeqCst), 2, "detached session opened its own handle");
        assert_eq!(*dir.logged_off.lock().unwrap(), vec![2]);
    }

    // ─── Properties & caching ────────────────────────────────────

    #[test]
    fn properties_share_one_record_fetch() {
        let dir = mock();
        let mut session = Session::by_id(dir.clone(), 1).unwrap();
        let baseline = dir.record_queries.load(Ordering::SeqCst);

        session.domain_name().unwrap();
        session.user_name().unwrap();
        session.session_name().unwrap();
        session.session_state().unwrap();
        session.idle_time().unwrap();
        session.connect_time().unwrap();

        assert_eq!(dir.record_queries.load(Ordering::SeqCst), baseline, "record cached from construction");
    }

    #[test]
    fn timestamps_decode_with_zero_sentinel() {
        let dir = mock();
        let mut session = Session::by_id(dir, 1).unwrap();
        assert!(session.connect_time().unwrap().is_some());
        assert_eq!(session.disconnect_time().unwrap(), None, "zero FILETIME reads as absent");
        assert!(session.last_input_time().unwrap().is_some());
        assert!(session.logon_time().unwrap().is_some());
        assert_eq!(session.current_time().unwrap().timestamp(), filetime(T0 + 2 * TEN_MINUTES).timestamp());
    }

    #[test]
    fn idle_time_is_current_minus_last_input() {
        let dir = mock();
        let mut session = Session::by_id(dir, 1).unwrap();
        assert_eq!(session.idle_time().unwrap(), Duration::minutes(10));
    }

    #[test]
    fn idle_time_zero_without_last_input() {
        let mut record = session_record(5, 0, "Console", "CORP", "carol");
        record.last_input_time = 0;
        let mut directory = MockDirectory::with_sessions();
        directory.records.insert(5, record);
        let dir = Arc::new(directory);

        let mut session = Session::by_id(dir, 5).unwrap();
        assert_eq!(session.idle_time().unwrap(), Duration::zero());
    }

    #[test]
    fn empty_strings_decode_as_none() {
        let dir = mock();
        let mut session = Session::by_id(dir, 0).unwrap();
        assert_eq!(session.domain_name().unwrap(), None);
        assert_eq!(session.user_name().unwrap(), None);
        assert_eq!(session.session_name().unwrap().as_deref(), Some("Services"));
    }

    #[test]
    fn session_state_maps_from_record() {
        let dir = mock();
        assert_eq!(Session::by_id(dir.clone(), 1).unwrap().session_state().unwrap(), SessionState::Active);
        assert_eq!(Session::by_id(dir, 0).unwrap().session_state().unwrap(), SessionState::Disconnected);
    }

    #[test]
    fn client_requeries_only_after_cache_clear() {
        let dir = mock();
        let mut session = Session::by_id(dir.clone(), 2).unwrap();

        let first = session.client().unwrap();
        assert_eq!(first.client_name(), Some("DESKTOP-ABC"));
        let second = session.client().unwrap();
        assert_eq!(second.user_name(), Some("bob"));
        assert_eq!(dir.client_queries.load(Ordering::SeqCst), 1, "fresh wrapper, single query");

        session.refresh().unwrap();
        session.client().unwrap();
        assert_eq!(dir.client_queries.load(Ordering::SeqCst), 2, "refresh clears the client record");
    }

    // ─── Refresh ─────────────────────────────────────────────────

    #[test]
    fn refresh_resets_every_cache_field() {
        let dir = mock();
        let mut session = Session::by_id(dir.clone(), 2).unwrap();
        session.domain_name().unwrap();
        session.user_name().unwrap();
        session.session_name().unwrap();
        session.idle_time().unwrap();
        session.client().unwrap();
        assert!(session.cache.domain_name.is_resolved());
        assert!(session.cache.idle_time.is_resolved());
        assert!(session.cache.client_record.is_some());

        session.refresh().unwrap();

        assert!(session.cache.record.is_none());
        assert!(session.cache.client_record.is_none());
        assert!(!session.cache.domain_name.is_resolved());
        assert!(!session.cache.session_name.is_resolved());
        assert!(!session.cache.user_name.is_resolved());
        assert!(!session.cache.idle_time.is_resolved());
    }

    #[test]
    fn refresh_keeps_handle_and_forces_requery() {
        let dir = mock();
        let mut session = Session::on_server(dir.clone(), 2, "RDSH-01").unwrap();
        assert_eq!(dir.opens.load(Ordering::SeqCst), 1);

        session.refresh().unwrap();
        assert!(session.handle.is_some(), "handle survives refresh");
        assert_eq!(dir.closes.load(Ordering::SeqCst), 0);

        let before = dir.record_queries.load(Ordering::SeqCst);
        session.user_name().unwrap();
        assert_eq!(dir.record_queries.load(Ordering::SeqCst), before + 1, "next access re-queries");
        assert_eq!(dir.opens.load(Ordering::SeqCst), 1, "no second open after refresh");
    }

    #[test]
    fn refresh_immediately_after_construction_is_noop() {
        let dir = mock();
        let mut session = Session::by_id(dir, 1).unwrap();
        session.refresh().unwrap();
        session.refresh().unwrap();
        assert_eq!(session.user_name().unwrap().as_deref(), Some("alice"));
    }

    // ─── Disposal ────────────────────────────────────────────────

    #[test]
    fn disposed_session_fails_every_data_operation() {
        let dir = mock();
        let mut session = Session::on_server(dir, 2, "RDSH-01").unwrap();
        session.dispose();

        assert_eq!(session.client().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.connect_time().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.disconnect_time().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.last_input_time().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.logon_time().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.current_time().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.session_state().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.domain_name().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.session_name().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.user_name().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.idle_time().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.disconnect().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.logoff().unwrap_err().kind, SessionErrorKind::Disposed);
        assert_eq!(session.refresh().unwrap_err().kind, SessionErrorKind::Disposed);
    }

    #[test]
    fn identity_survives_disposal() {
        let dir = mock();
        let mut session = Session::on_server(dir, 2, "RDSH-01").unwrap();
        session.dispose();
        assert!(session.is_disposed());
        assert_eq!(session.session_id(), 2);
        assert_eq!(session.server_name(), "RDSH-01");
    }

    #[test]
    fn dispose_is_idempotent() {
        let dir = mock();
        let mut session = Session::on_server(dir.clone(), 2, "RDSH-01").unwrap();
        session.dispose();
        session.dispose();
        session.dispose();
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1, "handle released at most once");
    }

    #[test]
    fn dispose_clears_caches_observably() {
        let dir = mock();
        let mut session = Session::by_id(dir, 2).unwrap();
        session.user_name().unwrap();
        session.client().unwrap();
        session.dispose();

        assert!(session.cache.record.is_none());
        assert!(session.cache.client_record.is_none());
        assert!(!session.cache.user_name.is_resolved());
        assert!(session.handle.is_none());
    }

    #[test]
    fn drop_releases_handle() {
        let dir = mock();
        {
            let _session = Session::on_server(dir.clone(), 2, "RDSH-01").unwrap();
        }
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_then_drop_does_not_double_release() {
        let dir = mock();
        {
            let mut session = Session::on_server(dir.clone(), 2, "RDSH-01").unwrap();
            session.dispose();
        }
        assert_eq!(dir.closes.load(Ordering::SeqCst), 1);
    }
}
