//! Per-capture stream discovery and classification on top of tshark queries.
//!
//! Query failures are logged and degrade to a neutral answer: no streams,
//! not encrypted, or an unknown cipher.

use crate::cipher_table::{CipherTable, UNKNOWN};
use crate::stream::{Protocol, StreamRecord};
use crate::tshark::CaptureQuery;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::path::Path;

/// Display filter marking a packet as carrying encrypted payload.
const ENCRYPTION_FILTER: &str = "tls";

/// Handshake type of the ServerHello, which carries the negotiated suite.
const SERVER_HELLO: u8 = 2;

pub struct Inspector<'a, Q: CaptureQuery> {
    query: &'a Q,
    ciphers: &'a CipherTable,
}

impl<'a, Q: CaptureQuery> Inspector<'a, Q> {
    pub fn new(query: &'a Q, ciphers: &'a CipherTable) -> Self {
        Self { query, ciphers }
    }

    /// Classify every TCP stream, then every UDP stream, of `pcap`.
    pub fn inspect(&self, pcap: &Path) -> Vec<StreamRecord> {
        [Protocol::Tcp, Protocol::Udp]
            .into_iter()
            .flat_map(|proto| {
                self.stream_ids(pcap, proto)
                    .into_iter()
                    .map(move |id| self.classify(pcap, proto, id))
            })
            .collect()
    }

    pub fn classify(&self, pcap: &Path, proto: Protocol, stream_id: u64) -> StreamRecord {
        if self.is_encrypted(pcap, proto, stream_id) {
            let cipher = self.handshake_cipher(pcap, proto, stream_id);
            debug!("{} stream {} in {:?}: {}", proto, stream_id, pcap, cipher);
            StreamRecord::encrypted(proto, stream_id, cipher)
        } else {
            StreamRecord::unencrypted(proto, stream_id)
        }
    }

    /// Distinct stream ids of `proto`, ascending.
    pub fn stream_ids(&self, pcap: &Path, proto: Protocol) -> Vec<u64> {
        let args = stream_list_args(pcap, proto);
        match self.query.query(&args) {
            Ok(out) => parse_stream_ids(&out),
            Err(e) => {
                warn!("Listing {} streams of {:?} failed: {}", proto, pcap, e);
                Vec::new()
            }
        }
    }

    /// True iff at least one packet of the stream matches the encryption filter.
    pub fn is_encrypted(&self, pcap: &Path, proto: Protocol, stream_id: u64) -> bool {
        let args = encryption_args(pcap, proto, stream_id);
        match self.query.query(&args) {
            Ok(out) => out.lines().any(|line| !line.trim().is_empty()),
            Err(e) => {
                warn!("Encryption check of {} stream {} in {:?} failed: {}", proto, stream_id, pcap, e);
                false
            }
        }
    }

    /// Cipher suite from the first ServerHello of the stream, decoded by name.
    pub fn handshake_cipher(&self, pcap: &Path, proto: Protocol, stream_id: u64) -> String {
        let args = cipher_args(pcap, proto, stream_id);
        let out = match self.query.query(&args) {
            Ok(out) => out,
            Err(e) => {
                warn!("Cipher lookup of {} stream {} in {:?} failed: {}", proto, stream_id, pcap, e);
                return UNKNOWN.to_string();
            }
        };

        // No ServerHello means the handshake was not captured
        match out.lines().map(str::trim).find(|line| !line.is_empty()) {
            Some(first) => self.ciphers.decode_field(first),
            None => UNKNOWN.to_string(),
        }
    }
}

/// Keep digit-only lines; tshark prints an empty field for packets outside the protocol.
pub fn parse_stream_ids(output: &str) -> Vec<u64> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|line| line.parse().ok())
        .collect::<BTreeSet<u64>>()
        .into_iter()
        .collect()
}

fn base_args(pcap: &Path, filter: String, field: &str) -> Vec<String> {
    vec![
        "-r".to_string(),
        pcap.to_string_lossy().into_owned(),
        "-Y".to_string(),
        filter,
        "-T".to_string(),
        "fields".to_string(),
        "-e".to_string(),
        field.to_string(),
    ]
}

pub fn stream_list_args(pcap: &Path, proto: Protocol) -> Vec<String> {
    let p = proto.field_prefix();
    base_args(pcap, p.to_string(), &format!("{p}.stream"))
}

pub fn encryption_args(pcap: &Path, proto: Protocol, stream_id: u64) -> Vec<String> {
    let p = proto.field_prefix();
    base_args(
        pcap,
        format!("{p}.stream eq {stream_id} and {ENCRYPTION_FILTER}"),
        "frame.number",
    )
}

pub fn cipher_args(pcap: &Path, proto: Protocol, stream_id: u64) -> Vec<String> {
    let p = proto.field_prefix();
    base_args(
        pcap,
        format!("{p}.stream eq {stream_id} and tls.handshake.type == {SERVER_HELLO}"),
        "tls.handshake.ciphersuite",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher_table::NOT_FOUND;
    use crate::error::{Error, Result};
    use crate::stream::EncryptionStatus;
    use std::collections::HashMap;

    /// Answers by display filter; `None` simulates a failed tshark run and
    /// unknown filters produce empty output.
    struct Scripted {
        answers: HashMap<String, Option<String>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                answers: HashMap::new(),
            }
        }

        fn on(mut self, filter: &str, out: &str) -> Self {
            self.answers.insert(filter.to_string(), Some(out.to_string()));
            self
        }

        fn fail(mut self, filter: &str) -> Self {
            self.answers.insert(filter.to_string(), None);
            self
        }
    }

    impl CaptureQuery for Scripted {
        fn query(&self, args: &[String]) -> Result<String> {
            match self.answers.get(&args[3]) {
                Some(Some(out)) => Ok(out.clone()),
                Some(None) => Err(Error::Tshark {
                    program: "tshark".into(),
                    status: "exit status: 2".into(),
                    stderr: "boom".into(),
                }),
                None => Ok(String::new()),
            }
        }
    }

    fn table() -> CipherTable {
        CipherTable::from_reader("49199,TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256\n".as_bytes()).unwrap()
    }

    #[test]
    fn stream_ids_are_distinct_numeric_and_sorted() {
        let out = "10\n2\n\n2\n1\nabc\n 3 \n";
        assert_eq!(parse_stream_ids(out), vec![1, 2, 3, 10]);
    }

    #[test]
    fn builds_tshark_arguments() {
        let args = cipher_args(Path::new("/d/a.pcap"), Protocol::Udp, 7);
        assert_eq!(
            args,
            [
                "-r",
                "/d/a.pcap",
                "-Y",
                "udp.stream eq 7 and tls.handshake.type == 2",
                "-T",
                "fields",
                "-e",
                "tls.handshake.ciphersuite"
            ]
        );
        assert_eq!(
            encryption_args(Path::new("a.pcap"), Protocol::Tcp, 0)[3],
            "tcp.stream eq 0 and tls"
        );
    }

    #[test]
    fn classifies_streams_of_both_protocols() {
        let q = Scripted::new()
            .on("tcp", "0\n1\n1\n2\n")
            .on("udp", "0\n")
            .on("tcp.stream eq 0 and tls", "4\n5\n")
            .on("tcp.stream eq 0 and tls.handshake.type == 2", "0xc02f\n0x1301\n")
            .on("tcp.stream eq 1 and tls", "9\n")
            .on("tcp.stream eq 1 and tls.handshake.type == 2", "0x0a0a\n");
        let ciphers = table();
        let inspector = Inspector::new(&q, &ciphers);

        let records = inspector.inspect(Path::new("x.pcap"));
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.protocol, r.stream_id, r.encryption_status, r.cipher.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Protocol::Tcp, 0, EncryptionStatus::Encrypted, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"),
                (Protocol::Tcp, 1, EncryptionStatus::Encrypted, NOT_FOUND),
                (Protocol::Tcp, 2, EncryptionStatus::UnencryptedUnrelated, "unencrypted_unrelated"),
                (Protocol::Udp, 0, EncryptionStatus::UnencryptedUnrelated, "unencrypted_unrelated"),
            ]
        );
    }

    #[test]
    fn encrypted_stream_without_server_hello_is_unknown() {
        let q = Scripted::new().on("tcp.stream eq 3 and tls", "12\n");
        let ciphers = table();
        let record = Inspector::new(&q, &ciphers).classify(Path::new("x.pcap"), Protocol::Tcp, 3);
        assert!(record.is_encrypted());
        assert_eq!(record.cipher, UNKNOWN);
    }

    #[test]
    fn query_failures_degrade_to_sentinels() {
        let q = Scripted::new()
            .fail("udp")
            .on("tcp", "0\n1\n")
            .fail("tcp.stream eq 0 and tls")
            .on("tcp.stream eq 1 and tls", "3\n")
            .fail("tcp.stream eq 1 and tls.handshake.type == 2");
        let ciphers = table();
        let inspector = Inspector::new(&q, &ciphers);
        let path = Path::new("x.pcap");

        assert!(inspector.stream_ids(path, Protocol::Udp).is_empty());
        assert!(!inspector.is_encrypted(path, Protocol::Tcp, 0));
        assert_eq!(inspector.handshake_cipher(path, Protocol::Tcp, 1), UNKNOWN);
    }
}
