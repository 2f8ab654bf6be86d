//! Numeric TLS cipher-suite id → IANA name lookup.
//!
//! The table is read once from a headerless CSV (`<decimal id>,<name>`) and is
//! read-only afterwards. A copy of the IANA registry is compiled into the
//! binary and used unless another CSV is given on the command line.

use crate::error::{Error, Result};
use crate::report::RESERVED_KEYS;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Cipher name reported for an id the table does not know.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Cipher name reported when no handshake value could be read.
pub const UNKNOWN: &str = "unknown";

const BUNDLED_CSV: &str = include_str!("../cipher-id.csv");

#[derive(Debug, Clone, Default)]
pub struct CipherTable {
    names: HashMap<u16, String>,
}

impl CipherTable {
    /// The IANA table shipped with the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_CSV.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let table = Self::from_reader(file)?;
        debug!("Loaded {} cipher suites from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut names = HashMap::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result?;
            let (Some(id), Some(name)) = (record.get(0), record.get(1)) else {
                if !record.iter().all(str::is_empty) {
                    warn!("Cipher table row {} has fewer than two columns, skipping", line + 1);
                }
                continue;
            };
            if RESERVED_KEYS.contains(&name) {
                warn!("Cipher table row {} uses reserved report key {:?}, skipping", line + 1, name);
                continue;
            }
            match id.parse::<u16>() {
                Ok(id) if !name.is_empty() => {
                    names.insert(id, name.to_string());
                }
                _ => warn!("Cipher table row {} is not `<id>,<name>`: {:?}", line + 1, record),
            }
        }

        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, id: u16) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Name for `id`, or [`NOT_FOUND`].
    pub fn decode(&self, id: u16) -> &str {
        match self.get(id) {
            Some(name) => name,
            None => {
                warn!("{} not found in cipher id table", id);
                NOT_FOUND
            }
        }
    }

    /// Decode a raw `tls.handshake.ciphersuite` field as printed by tshark.
    /// Anything that does not parse yields [`UNKNOWN`].
    pub fn decode_field(&self, raw: &str) -> String {
        match parse_suite_id(raw) {
            Some(id) => self.decode(id).to_string(),
            None => {
                debug!("Unparseable cipher suite value {:?}", raw);
                UNKNOWN.to_string()
            }
        }
    }
}

/// Parse a hex suite id (`0xc02f`, `c02f`). When tshark prints several
/// occurrences in one field (`0xc02f,0x1301`) the first one wins.
pub fn parse_suite_id(raw: &str) -> Option<u16> {
    let first = raw.split(',').next()?.trim();
    let digits = first
        .strip_prefix("0x")
        .or_else(|| first.strip_prefix("0X"))
        .unwrap_or(first);
    if digits.is_empty() {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CipherTable {
        let csv = "49195,TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256\n\
                   4865,TLS_AES_128_GCM_SHA256\n\
                   \n\
                   not-a-number,BROKEN\n\
                   47\n";
        CipherTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn loads_valid_rows_only() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(4865), Some("TLS_AES_128_GCM_SHA256"));
    }

    #[test]
    fn rejects_names_that_clash_with_report_fields() {
        let csv = "1,encrypted\n2,streams\n3,label\n4865,TLS_AES_128_GCM_SHA256\n";
        let table = CipherTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.decode(1), NOT_FOUND);
        assert_eq!(table.decode(2), NOT_FOUND);
    }

    #[test]
    fn decode_returns_exact_name_or_sentinel() {
        let table = sample();
        assert_eq!(table.decode(49195), "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256");
        assert_eq!(table.decode(0x0a0a), NOT_FOUND);
    }

    #[test]
    fn decode_field_handles_tshark_hex() {
        let table = sample();
        assert_eq!(table.decode_field("0xc02b"), "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256");
        assert_eq!(table.decode_field(" 0x1301,0xc02b "), "TLS_AES_128_GCM_SHA256");
        assert_eq!(table.decode_field("1301"), "TLS_AES_128_GCM_SHA256");
        assert_eq!(table.decode_field("0xffff"), NOT_FOUND);
        assert_eq!(table.decode_field(""), UNKNOWN);
        assert_eq!(table.decode_field("[Epan WARNING] something"), UNKNOWN);
        assert_eq!(table.decode_field("0x1ffff"), UNKNOWN);
    }

    #[test]
    fn bundled_table_has_common_suites() {
        let table = CipherTable::bundled().unwrap();
        assert_eq!(table.decode(0xc02f), "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256");
        assert_eq!(table.decode(0x1302), "TLS_AES_256_GCM_SHA384");
    }
}
