use crate::config::OutputConfig;
use crate::error::OutputError;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;

const HEADER: [&str; 7] = [
    "index",
    "username",
    "profile_link",
    "followers",
    "following",
    "ratio_followers_over_following",
    "error",
];

/// One processed username, written as a single CSV record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRow {
    pub index: usize,
    pub username: String,
    pub profile_link: String,
    pub followers: Option<u64>,
    pub following: Option<u64>,
    #[serde(rename = "ratio_followers_over_following")]
    pub ratio: Option<f64>,
    /// Populated only when processing this username raised an error.
    pub error: Option<String>,
}

impl ProfileRow {
    /// The ratio is defined if and only if both counts are present and
    /// following is greater than zero. Otherwise it is absent, not zero.
    pub fn ratio_of(followers: Option<u64>, following: Option<u64>) -> Option<f64> {
        match (followers, following) {
            (Some(followers), Some(following)) if following > 0 => {
                Some(followers as f64 / following as f64)
            }
            _ => None,
        }
    }

    /// A row belongs in the negative-ratio output if and only if both counts
    /// are present, following > 0 and followers < following.
    pub fn is_negative_ratio(&self) -> bool {
        matches!(
            (self.followers, self.following),
            (Some(followers), Some(following)) if following > 0 && followers < following
        )
    }
}

/// An append-only CSV file that writes its header only when the file did not
/// already exist, and flushes after every record.
struct RowWriter {
    writer: csv::Writer<File>,
}

impl RowWriter {
    fn open(path: &Path) -> Result<Self, OutputError> {
        let write_header = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(Self { writer })
    }

    fn append(&mut self, row: &ProfileRow) -> Result<(), OutputError> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// The two output files: every processed row, and the negative-ratio subset.
pub struct CsvSink {
    all: RowWriter,
    negative: RowWriter,
}

impl CsvSink {
    pub fn open(config: &OutputConfig) -> Result<Self, OutputError> {
        Ok(Self {
            all: RowWriter::open(Path::new(config.all_path()))?,
            negative: RowWriter::open(Path::new(config.negative_path()))?,
        })
    }

    /// Append the row to the full output and, when it qualifies, to the
    /// negative-ratio output. Both writes are flushed before returning so a
    /// later crash cannot leave a partial row behind.
    pub fn append(&mut self, row: &ProfileRow) -> Result<(), OutputError> {
        self.all.append(row)?;
        if row.is_negative_ratio() {
            self.negative.append(row)?;
        }
        Ok(())
    }
}
