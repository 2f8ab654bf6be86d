//! Encrypted-stream and cipher-suite statistics for PCAP datasets.
//!
//! Every packet-level fact comes from `tshark`; this crate only walks the
//! dataset, classifies the streams tshark reports and folds them into
//! per-file JSON reports that later runs resume from.

pub mod cipher_table;
pub mod config;
pub mod driver;
pub mod error;
pub mod inspector;
pub mod report;
pub mod stream;
pub mod tshark;

pub use cipher_table::CipherTable;
pub use config::Settings;
pub use driver::{Driver, RunSummary};
pub use error::{Error, Result};
pub use inspector::Inspector;
pub use report::{DatasetReport, FileReport};
pub use tshark::{CaptureQuery, Tshark};

/// Analyze the dataset described by `settings` with the real tshark binary.
pub fn run(settings: &Settings) -> Result<RunSummary> {
    let ciphers = settings.load_cipher_table()?;
    let tshark = Tshark::new(&settings.tshark);
    let inspector = Inspector::new(&tshark, &ciphers);

    Driver::new(inspector, &settings.dataset_root, &settings.output_dir)
        .detailed(settings.detailed)
        .progress(settings.progress)
        .run()
}
