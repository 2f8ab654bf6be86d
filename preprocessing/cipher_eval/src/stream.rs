use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Display-filter / field prefix used by tshark (`tcp.stream`, `udp.stream`).
    pub fn field_prefix(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStatus {
    Encrypted,
    UnencryptedUnrelated,
}

impl EncryptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EncryptionStatus::Encrypted => "encrypted",
            EncryptionStatus::UnencryptedUnrelated => "unencrypted_unrelated",
        }
    }
}

/// One tshark stream after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub stream_id: u64,
    pub protocol: Protocol,
    pub encryption_status: EncryptionStatus,
    pub cipher: String,
}

impl StreamRecord {
    pub fn encrypted(protocol: Protocol, stream_id: u64, cipher: String) -> Self {
        Self {
            stream_id,
            protocol,
            encryption_status: EncryptionStatus::Encrypted,
            cipher,
        }
    }

    /// Unencrypted streams carry their status as cipher name, so they land in
    /// the `unencrypted_unrelated` bucket of the file report.
    pub fn unencrypted(protocol: Protocol, stream_id: u64) -> Self {
        let status = EncryptionStatus::UnencryptedUnrelated;
        Self {
            stream_id,
            protocol,
            encryption_status: status,
            cipher: status.as_str().to_string(),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption_status == EncryptionStatus::Encrypted
    }
}
