//! Per-file aggregates and the JSON report they are persisted in.

use crate::error::{Error, Result};
use crate::stream::{EncryptionStatus, Protocol, StreamRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub tcp_streams: u64,
    pub udp_streams: u64,
    pub total_streams: u64,
}

impl Counters {
    fn bump(&mut self, proto: Protocol) {
        match proto {
            Protocol::Tcp => self.tcp_streams += 1,
            Protocol::Udp => self.udp_streams += 1,
        }
        self.total_streams += 1;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamTotals {
    pub all_tcp_streams: u64,
    pub all_udp_streams: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamDetail {
    pub encryption_status: EncryptionStatus,
    pub cipher: String,
}

/// Per-stream view of one protocol, only written with `--detailed`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolDetail {
    pub number_of_streams: u64,
    pub streams: BTreeMap<String, StreamDetail>,
}

/// Fixed top-level keys of a serialized [`FileReport`]; a cipher bucket may
/// not use any of them.
pub const RESERVED_KEYS: [&str; 8] = [
    "file_name",
    "dataset",
    "label",
    "streams",
    "unencrypted_unrelated",
    "encrypted",
    "tcp_stats",
    "udp_stats",
];

/// Summary of one capture file.
///
/// Encrypted streams are bucketed by cipher name as extra top-level keys;
/// unencrypted streams are counted in `unencrypted_unrelated`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file_name: String,
    pub dataset: String,
    pub label: String,
    pub streams: StreamTotals,
    pub unencrypted_unrelated: Counters,
    pub encrypted: Counters,
    #[serde(flatten)]
    pub ciphers: BTreeMap<String, Counters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_stats: Option<ProtocolDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_stats: Option<ProtocolDetail>,
}

impl FileReport {
    pub fn new(file_name: impl Into<String>, dataset: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            dataset: dataset.into(),
            label: label.into(),
            streams: StreamTotals::default(),
            unencrypted_unrelated: Counters::default(),
            encrypted: Counters::default(),
            ciphers: BTreeMap::new(),
            tcp_stats: None,
            udp_stats: None,
        }
    }

    /// Start keeping per-stream details for every record folded from now on.
    pub fn with_details(mut self) -> Self {
        self.tcp_stats = Some(ProtocolDetail::default());
        self.udp_stats = Some(ProtocolDetail::default());
        self
    }

    /// Fold one classified stream into the counters.
    pub fn record(&mut self, stream: &StreamRecord) {
        match stream.protocol {
            Protocol::Tcp => self.streams.all_tcp_streams += 1,
            Protocol::Udp => self.streams.all_udp_streams += 1,
        }

        if stream.is_encrypted() {
            self.encrypted.bump(stream.protocol);
            self.ciphers
                .entry(stream.cipher.clone())
                .or_default()
                .bump(stream.protocol);
        } else {
            self.unencrypted_unrelated.bump(stream.protocol);
        }

        let detail = match stream.protocol {
            Protocol::Tcp => self.tcp_stats.as_mut(),
            Protocol::Udp => self.udp_stats.as_mut(),
        };
        if let Some(detail) = detail {
            detail.number_of_streams += 1;
            detail.streams.insert(
                stream.stream_id.to_string(),
                StreamDetail {
                    encryption_status: stream.encryption_status,
                    cipher: stream.cipher.clone(),
                },
            );
        }
    }

    pub fn total_streams(&self) -> u64 {
        self.streams.all_tcp_streams + self.streams.all_udp_streams
    }

    /// Streams counted across all cipher buckets, `unencrypted_unrelated` included.
    pub fn bucketed_streams(&self) -> u64 {
        self.ciphers
            .values()
            .chain(std::iter::once(&self.unencrypted_unrelated))
            .map(|c| c.tcp_streams + c.udp_streams)
            .sum()
    }
}

/// All file reports of one label, in processing order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct DatasetReport {
    entries: Vec<FileReport>,
}

impl DatasetReport {
    /// Read a saved report; a missing file is an empty report.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Report {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pretty-print with four-space indentation, replacing `path` only once
    /// the new content is fully written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
            let mut writer = BufWriter::new(file);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
            self.serialize(&mut ser).map_err(|source| Error::Report {
                path: path.to_path_buf(),
                source,
            })?;
            writer.flush().map_err(|e| Error::io(&tmp, e))?;
        }
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.iter().any(|r| r.file_name == file_name)
    }

    pub fn push(&mut self, report: FileReport) {
        self.entries.push(report);
    }

    pub fn entries(&self) -> &[FileReport] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
