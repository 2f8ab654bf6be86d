use crate::cipher_table::CipherTable;
use crate::error::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherSource {
    Bundled,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub dataset_root: PathBuf,
    pub output_dir: PathBuf,
    pub tshark: PathBuf,
    pub cipher_table: CipherSource,
    pub detailed: bool,
    pub progress: bool,
    pub log_level: LevelFilter,
}

impl Settings {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let quiet = matches.get_flag("quiet");
        let log_level = if quiet {
            LevelFilter::Error
        } else {
            match matches.get_count("verbose") {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        };

        Self {
            dataset_root: matches
                .get_one::<PathBuf>("dataset_folder")
                .cloned()
                .unwrap_or_default(),
            output_dir: matches
                .get_one::<PathBuf>("output_dir")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(".")),
            tshark: matches
                .get_one::<PathBuf>("tshark")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("tshark")),
            cipher_table: match matches.get_one::<PathBuf>("cipher_table") {
                Some(path) => CipherSource::File(path.clone()),
                None => CipherSource::Bundled,
            },
            detailed: matches.get_flag("detailed"),
            progress: !quiet,
            log_level,
        }
    }

    pub fn load_cipher_table(&self) -> Result<CipherTable> {
        match &self.cipher_table {
            CipherSource::Bundled => CipherTable::bundled(),
            CipherSource::File(path) => CipherTable::from_path(path),
        }
    }
}

pub fn cli() -> Command {
    Command::new("cipher_eval")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Process PCAP files in folders and calculate cipher representation")
        .arg(
            Arg::new("dataset_folder")
                .value_name("DATASET_FOLDER")
                .help("Path to the dataset containing PCAPs")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Where to write <label>-analysis_results.json reports")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("."),
        )
        .arg(
            Arg::new("cipher_table")
                .short('c')
                .long("cipher-table")
                .value_name("CSV")
                .help("Cipher id table as `<decimal id>,<name>` rows (default: bundled IANA table)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("tshark")
                .long("tshark")
                .value_name("PATH")
                .help("tshark executable")
                .env("CIPHER_EVAL_TSHARK")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("tshark"),
        )
        .arg(
            Arg::new("detailed")
                .long("detailed")
                .help("Include per-stream results in each file report")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("More log output (-v debug, -vv trace)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only log errors and hide progress bars")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
}
