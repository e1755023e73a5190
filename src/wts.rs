//! Windows backend: [`SessionDirectory`] over the `wtsapi32` API.
//!
//! Only compiled on Windows. Every `unsafe` block is documented with the
//! invariant it relies on; buffers returned by the API are freed via
//! `WTSFreeMemory` before the wrapping function returns, so nothing above
//! this module handles raw Win32 pointers.

use crate::directory::{
    ClientRecord, DirectoryError, DirectoryResult, RawHandle, SessionDirectory, SessionRecord,
};
use log::debug;

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::RemoteDesktop::{
    WTSCloseServer, WTSConnectSessionW, WTSDisconnectSession, WTSEnumerateSessionsW,
    WTSFreeMemory, WTSLogoffSession, WTSOpenServerW, WTSQuerySessionInformationW, WTSCLIENTW,
    WTSINFOW, WTS_INFO_CLASS, WTS_SESSION_INFOW,
};
use windows::Win32::System::SystemInformation::GetComputerNameW;

// WTS_INFO_CLASS values for the two structured queries.
const WTS_SESSION_INFO: WTS_INFO_CLASS = WTS_INFO_CLASS(24);
const WTS_CLIENT_INFO: WTS_INFO_CLASS = WTS_INFO_CLASS(23);

const ERROR_INVALID_DATA: u32 = 13;

/// The live `wtsapi32` directory. Stateless; handles are owned by the
/// sessions and server handles above.
#[derive(Debug, Default, Clone, Copy)]
pub struct WtsDirectory;

impl WtsDirectory {
    pub fn new() -> Self {
        Self
    }
}

/// Encode a Rust string as a NUL-terminated wide string.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0u16)).collect()
}

fn as_handle(raw: RawHandle) -> HANDLE {
    // RawHandle::LOCAL (zero) becomes the null WTS_CURRENT_SERVER handle.
    HANDLE(raw.0 as *mut core::ffi::c_void)
}

fn map_error(e: windows::core::Error) -> DirectoryError {
    // HRESULT_FROM_WIN32 keeps the original code in the low 16 bits.
    match (e.code().0 as u32) & 0xFFFF {
        2 => DirectoryError::NotFound,
        5 => DirectoryError::AccessDenied,
        code => DirectoryError::Other(code),
    }
}

/// Query one structured info class, returning the raw buffer and its byte
/// count. The caller frees the buffer with `WTSFreeMemory`.
fn query_raw(
    server: HANDLE,
    session_id: u32,
    info_class: WTS_INFO_CLASS,
) -> DirectoryResult<(*mut u8, u32)> {
    let mut buf = PWSTR::null();
    let mut bytes: u32 = 0;
    // SAFETY: out pointers are valid for the duration of the call.
    unsafe { WTSQuerySessionInformationW(server, session_id, info_class, &mut buf, &mut bytes) }
        .map_err(map_error)?;
    if buf.is_null() {
        return Err(DirectoryError::Other(ERROR_INVALID_DATA));
    }
    Ok((buf.as_ptr() as *mut u8, bytes))
}

impl SessionDirectory for WtsDirectory {
    fn local_host_name(&self) -> String {
        let mut buf = [0u16; 256];
        let mut size = buf.len() as u32;
        // SAFETY: buf is writable for `size` words; GetComputerNameW updates
        // size to the written length on success.
        match unsafe { GetComputerNameW(PWSTR(buf.as_mut_ptr()), &mut size) } {
            Ok(()) => String::from_utf16_lossy(&buf[..size as usize]),
            Err(_) => String::new(),
        }
    }

    fn open_host(&self, host_name: &str) -> DirectoryResult<RawHandle> {
        let wide = to_wide(host_name);
        // SAFETY: wide is NUL-terminated and outlives the call.
        let handle = unsafe { WTSOpenServerW(PCWSTR(wide.as_ptr())) };
        if handle.is_invalid() || handle.0.is_null() {
            return Err(map_error(windows::core::Error::from_win32()));
        }
        debug!("opened native server handle for '{}'", host_name);
        Ok(RawHandle(handle.0 as isize))
    }

    fn close_host(&self, handle: RawHandle) {
        if handle.is_local() {
            return;
        }
        // SAFETY: only called with a handle returned by open_host.
        unsafe { WTSCloseServer(as_handle(handle)) };
        debug!("closed native server handle");
    }

    fn enumerate_sessions(&self, handle: RawHandle) -> DirectoryResult<Vec<u32>> {
        let server = as_handle(handle);
        let mut info_ptr: *mut WTS_SESSION_INFOW = std::ptr::null_mut();
        let mut count: u32 = 0;

        // SAFETY: WTSEnumerateSessionsW fills info_ptr/count; the buffer is
        // freed below with WTSFreeMemory.
        unsafe { WTSEnumerateSessionsW(server, 0, 1, &mut info_ptr, &mut count) }
            .map_err(map_error)?;

        let mut ids = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            // SAFETY: info_ptr points to `count` contiguous entries.
            let raw = unsafe { &*info_ptr.add(i) };
            ids.push(raw.SessionId);
        }

        // SAFETY: freeing the buffer allocated by WTSEnumerateSessionsW.
        unsafe { WTSFreeMemory(info_ptr as *mut _) };
        Ok(ids)
    }

    fn session_record(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<SessionRecord> {
        let server = as_handle(handle);
        let (buf, bytes) = query_raw(server, session_id, WTS_SESSION_INFO)?;
        if (bytes as usize) < std::mem::size_of::<WTSINFOW>() {
            // SAFETY: freeing the buffer allocated by the query.
            unsafe { WTSFreeMemory(buf as *mut _) };
            return Err(DirectoryError::Other(ERROR_INVALID_DATA));
        }

        // SAFETY: bytes covers a full WTSINFOW; the buffer carries no
        // alignment guarantee, so read unaligned.
        let info = unsafe { std::ptr::read_unaligned(buf as *const WTSINFOW) };
        // SAFETY: freeing the buffer allocated by the query.
        unsafe { WTSFreeMemory(buf as *mut _) };

        Ok(SessionRecord {
            state: info.State.0 as u32,
            session_id: info.SessionId,
            win_station_name: info.WinStationName,
            domain: info.Domain,
            user_name: info.UserName,
            connect_time: info.ConnectTime,
            disconnect_time: info.DisconnectTime,
            last_input_time: info.LastInputTime,
            logon_time: info.LogonTime,
            current_time: info.CurrentTime,
        })
    }

    fn client_record(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<ClientRecord> {
        let server = as_handle(handle);
        let (buf, bytes) = query_raw(server, session_id, WTS_CLIENT_INFO)?;
        if (bytes as usize) < std::mem::size_of::<WTSCLIENTW>() {
            // SAFETY: freeing the buffer allocated by the query.
            unsafe { WTSFreeMemory(buf as *mut _) };
            return Err(DirectoryError::Other(ERROR_INVALID_DATA));
        }

        // SAFETY: bytes covers a full WTSCLIENTW; read unaligned as above.
        let info = unsafe { std::ptr::read_unaligned(buf as *const WTSCLIENTW) };
        // SAFETY: freeing the buffer allocated by the query.
        unsafe { WTSFreeMemory(buf as *mut _) };

        Ok(ClientRecord {
            client_name: info.ClientName,
            domain: info.Domain,
            user_name: info.UserName,
            client_directory: info.ClientDirectory,
            build_number: info.ClientBuildNumber,
            encryption_level: info.EncryptionLevel,
            address_family: info.ClientAddressFamily,
            address: info.ClientAddress,
            horizontal_resolution: info.HRes,
            vertical_resolution: info.VRes,
            color_depth: info.ColorDepth,
        })
    }

    fn disconnect(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<()> {
        // SAFETY: plain FFI call; bWait=true makes it synchronous.
        unsafe { WTSDisconnectSession(as_handle(handle), session_id, true) }.map_err(map_error)?;
        debug!("disconnected session {}", session_id);
        Ok(())
    }

    fn logoff(&self, handle: RawHandle, session_id: u32) -> DirectoryResult<()> {
        // SAFETY: plain FFI call; bWait=true makes it synchronous.
        unsafe { WTSLogoffSession(as_handle(handle), session_id, true) }.map_err(map_error)?;
        debug!("logged off session {}", session_id);
        Ok(())
    }

    fn connect(&self, logon_id: u32, target_logon_id: u32, password: &str) -> DirectoryResult<()> {
        let wide_pass = to_wide(password);
        // SAFETY: wide_pass is NUL-terminated and outlives the call; only
        // meaningful on the local server.
        unsafe { WTSConnectSessionW(logon_id, target_logon_id, PCWSTR(wide_pass.as_ptr()), true) }
            .map_err(map_error)?;
        debug!("connected session {} to target {}", logon_id, target_logon_id);
        Ok(())
    }
}
