//! Read-only view over a session's raw client record.

use crate::directory::{decode_wide, ClientRecord};
use crate::types::{AddressFamily, EncryptionLevel};
use std::cell::OnceCell;
use std::fmt;

/// Client metadata for one session, captured as a snapshot of the raw
/// client record at construction.
///
/// Fixed-width fields (resolution, color depth, encryption level, build
/// number, address family) are read straight from the record; the
/// variable-length fields are decoded on first access and memoized
/// independently. The value is immutable — a session hands out a fresh
/// `ClientInfo` per access and re-queries the directory only when its own
/// cache was cleared.
///
/// Not `Sync`; intended for the same exclusive-owner use as the session
/// that produced it.
pub struct ClientInfo {
    record: ClientRecord,
    address: OnceCell<Vec<u8>>,
    client_directory: OnceCell<Option<String>>,
    client_name: OnceCell<Option<String>>,
    domain_name: OnceCell<Option<String>>,
    user_name: OnceCell<Option<String>>,
}

impl ClientInfo {
    pub(crate) fn new(record: ClientRecord) -> Self {
        Self {
            record,
            address: OnceCell::new(),
            client_directory: OnceCell::new(),
            client_name: OnceCell::new(),
            domain_name: OnceCell::new(),
            user_name: OnceCell::new(),
        }
    }

    // ─── Fixed fields ────────────────────────────────────────────

    pub fn encryption_level(&self) -> EncryptionLevel {
        EncryptionLevel::from_u8(self.record.encryption_level)
    }

    pub fn address_family(&self) -> AddressFamily {
        AddressFamily::from_u32(self.record.address_family)
    }

    pub fn build_number(&self) -> u32 {
        self.record.build_number
    }

    pub fn horizontal_resolution(&self) -> u16 {
        self.record.horizontal_resolution
    }

    pub fn vertical_resolution(&self) -> u16 {
        self.record.vertical_resolution
    }

    pub fn color_depth(&self) -> u16 {
        self.record.color_depth
    }

    // ─── Lazily decoded fields ───────────────────────────────────

    /// The client's network address as raw bytes: 4 bytes for IPv4, 16 for
    /// IPv6 (each native 16-bit word re-encoded big-endian), empty for any
    /// other family.
    pub fn address(&self) -> &[u8] {
        self.address.get_or_init(|| decode_address(&self.record))
    }

    /// Path of the client module on the connecting machine.
    pub fn client_directory(&self) -> Option<&str> {
        self.client_directory
            .get_or_init(|| decode_wide(&self.record.client_directory))
            .as_deref()
    }

    /// NetBIOS name of the connecting machine.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name
            .get_or_init(|| decode_wide(&self.record.client_name))
            .as_deref()
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.domain_name
            .get_or_init(|| decode_wide(&self.record.domain))
            .as_deref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name
            .get_or_init(|| decode_wide(&self.record.user_name))
            .as_deref()
    }
}

fn decode_address(record: &ClientRecord) -> Vec<u8> {
    match AddressFamily::from_u32(record.address_family) {
        // IPv4: the first four words each carry one byte, verbatim.
        AddressFamily::Ipv4 => record.address[..4].iter().map(|&w| w as u8).collect(),
        // IPv6: eight words, each re-encoded as two big-endian bytes.
        AddressFamily::Ipv6 => record.address[..8]
            .iter()
            .flat_map(|&w| w.to_be_bytes())
            .collect(),
        AddressFamily::Other(_) => Vec::new(),
    }
}

impl fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.client_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "ClientInfo"),
        }
    }
}

impl fmt::Debug for ClientInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientInfo")
            .field("client_name", &self.client_name())
            .field("address_family", &self.address_family())
            .field("build_number", &self.build_number())
            .finish()
    }
}
