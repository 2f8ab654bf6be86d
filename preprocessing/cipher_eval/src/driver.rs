//! Walks a dataset tree and keeps one resumable report per folder label.

use crate::error::{Error, Result};
use crate::inspector::Inspector;
use crate::report::{DatasetReport, FileReport};
use crate::tshark::CaptureQuery;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const REPORT_SUFFIX: &str = "-analysis_results.json";

/// What one folder contributed to its report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub label: String,
    pub report_path: PathBuf,
    pub analyzed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub folders: Vec<FolderSummary>,
}

impl RunSummary {
    pub fn analyzed(&self) -> usize {
        self.folders.iter().map(|f| f.analyzed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.folders.iter().map(|f| f.skipped).sum()
    }
}

pub struct Driver<'a, Q: CaptureQuery> {
    inspector: Inspector<'a, Q>,
    root: PathBuf,
    dataset: String,
    output_dir: PathBuf,
    detailed: bool,
    progress: bool,
}

impl<'a, Q: CaptureQuery> Driver<'a, Q> {
    pub fn new(inspector: Inspector<'a, Q>, root: &Path, output_dir: &Path) -> Self {
        Self {
            inspector,
            root: root.to_path_buf(),
            dataset: dataset_name(root),
            output_dir: output_dir.to_path_buf(),
            detailed: false,
            progress: true,
        }
    }

    /// Keep per-stream records in every new file report.
    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Process every folder under the root that directly contains files.
    pub fn run(&self) -> Result<RunSummary> {
        fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let mut summary = RunSummary::default();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let files = list_files(entry.path())?;
            if files.is_empty() {
                continue;
            }
            summary.folders.push(self.process_folder(entry.path(), &files)?);
        }
        Ok(summary)
    }

    /// Analyze the captures among `files` not yet present in the folder's
    /// report, then write the merged report back.
    pub fn process_folder(&self, folder: &Path, files: &[PathBuf]) -> Result<FolderSummary> {
        let label = folder_label(&self.root, folder);
        let report_path = report_path(&self.output_dir, &label);

        let mut report = DatasetReport::load(&report_path)?;
        if !report.is_empty() {
            debug!("{} files already in {:?}", report.len(), report_path);
        }

        let pb = self.progress_bar(files.len() as u64, &label);
        let mut summary = FolderSummary {
            label: label.clone(),
            report_path: report_path.clone(),
            ..Default::default()
        };

        for path in files {
            if is_capture(path) {
                let file_name = path.to_string_lossy().into_owned();
                if report.contains(&file_name) {
                    pb.suspend(|| info!("File {} already processed. Skipping...", file_name));
                    summary.skipped += 1;
                } else {
                    report.push(self.process_file(path, &label));
                    summary.analyzed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.save(&report_path)?;
        info!(
            "Analysis completed for folder: {}. Results saved in {}",
            folder.display(),
            report_path.display()
        );
        Ok(summary)
    }

    pub fn process_file(&self, pcap: &Path, label: &str) -> FileReport {
        let mut report = FileReport::new(pcap.to_string_lossy(), self.dataset.as_str(), label);
        if self.detailed {
            report = report.with_details();
        }
        for stream in self.inspector.inspect(pcap) {
            report.record(&stream);
        }
        debug!(
            "{}: {} streams, {} encrypted",
            pcap.display(),
            report.total_streams(),
            report.encrypted.total_streams
        );
        report
    }

    fn progress_bar(&self, len: u64, label: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::with_template(
                "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        pb.set_message(format!("Analyzing Files - {}", label));
        pb
    }
}

/// Regular files directly inside `folder`, sorted by name.
fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder).map_err(|e| Error::io(folder, e))? {
        let path = entry.map_err(|e| Error::io(folder, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_capture(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    ext == "pcap" || ext == "pcapng"
}

/// Last component of the dataset root, resolving `.`-style roots.
pub fn dataset_name(root: &Path) -> String {
    if let Some(name) = root.file_name() {
        return name.to_string_lossy().into_owned();
    }
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "dataset".to_string())
}

/// Relative folder path joined with `-`. The root itself gets the empty
/// label, which no subfolder can produce.
pub fn folder_label(root: &Path, folder: &Path) -> String {
    let rel = folder.strip_prefix(root).unwrap_or(folder);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("-")
}

pub fn report_path(output_dir: &Path, label: &str) -> PathBuf {
    output_dir.join(format!("{}{}", label, REPORT_SUFFIX))
}
