use crate::error::ExportError;
use crate::rating::RatingRecord;
use crate::state::RunInfo;
use crate::trial::Trial;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_DELIMITER: char = ',';

/// Shared column set of the combined export, in header order.
pub const FIELDS: [&str; 25] = [
    "record_type",
    "subj_id",
    "sessionLabel",
    "sessionLabelUser",
    "round",
    "trial_in_round",
    "difficulty_round",
    "difficulty",
    "pCorrect",
    "state",
    "groupId",
    "groupLabel",
    "liking_group",
    "liking",
    "image",
    "assignedSide",
    "action",
    "responseSide",
    "responseSource",
    "isCorrectChoice",
    "reward",
    "feedbackPositive",
    "rtMs",
    "rating",
    "timestamp",
];

/// Identity columns shared by every row of one export.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabels {
    pub subj_id: String,
    pub session_label: String,
    pub session_label_user: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportRow {
    /// An answered trial.
    Behavior { labels: RowLabels, trial: Trial },
    Rating {
        labels: RowLabels,
        record: RatingRecord,
    },
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

impl ExportRow {
    pub fn record_type(&self) -> &'static str {
        match self {
            ExportRow::Behavior { .. } => "behavior",
            ExportRow::Rating { .. } => "rating",
        }
    }

    /// Projects the row onto [`FIELDS`]; columns a record type lacks are empty.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![String::new(); FIELDS.len()];
        let mut set = |field: &str, value: String| {
            if let Some(i) = FIELDS.iter().position(|f| *f == field) {
                cells[i] = value;
            }
        };
        set("record_type", self.record_type().to_string());
        match self {
            ExportRow::Behavior { labels, trial } => {
                set("subj_id", labels.subj_id.clone());
                set("sessionLabel", labels.session_label.clone());
                set("sessionLabelUser", labels.session_label_user.clone());
                set("round", trial.round.to_string());
                set("trial_in_round", trial.trial_index.to_string());
                set("difficulty_round", trial.difficulty_round.to_string());
                set("difficulty", trial.difficulty.clone());
                set("pCorrect", trial.p_correct.to_string());
                set("groupId", trial.group_id.clone());
                set("groupLabel", trial.group_label.clone());
                set("liking_group", trial.liking.to_string());
                set("image", trial.stimulus.to_string());
                if let Some(r) = &trial.response {
                    set("state", r.state_id.to_string());
                    set("liking", r.liking_bin.as_cell().to_string());
                    set("assignedSide", r.assigned_side.to_string());
                    set("action", r.action.to_string());
                    set("responseSide", r.response_side.to_string());
                    set("responseSource", r.response_source.to_string());
                    set("isCorrectChoice", flag(r.is_correct_choice));
                    set("reward", r.reward.to_string());
                    set("feedbackPositive", flag(r.feedback_positive));
                    set("rtMs", r.rt_ms.to_string());
                    set("timestamp", r.timestamp_ms.to_string());
                }
            }
            ExportRow::Rating { labels, record } => {
                set("subj_id", labels.subj_id.clone());
                set("sessionLabel", labels.session_label.clone());
                set("sessionLabelUser", labels.session_label_user.clone());
                set("groupId", record.group_id.clone());
                set("groupLabel", record.group_label.clone());
                set("liking_group", record.liking.to_string());
                set("image", record.stimulus.to_string());
                set("rating", record.rating.to_string());
                set("timestamp", record.timestamp_ms.to_string());
            }
        }
        cells
    }
}

/// Behavior rows for every answered trial, then one row per rating.
///
/// Behavior rows carry their own round tag as the internal session label;
/// rating rows carry the label of the round loaded at export time.
pub fn assemble<'a, I>(trials: I, ratings: &[RatingRecord], run_info: &RunInfo) -> Vec<ExportRow>
where
    I: IntoIterator<Item = &'a Trial>,
{
    let labels = |session_label: String| RowLabels {
        subj_id: run_info.participant_id.clone(),
        session_label,
        session_label_user: run_info.session_label_user.clone(),
    };

    let behavior = trials
        .into_iter()
        .filter(|t| t.is_answered())
        .map(|t| ExportRow::Behavior {
            labels: labels(format!("round-{}", t.round)),
            trial: t.clone(),
        });
    let rating = ratings.iter().map(|r| ExportRow::Rating {
        labels: labels(run_info.session_label.clone()),
        record: r.clone(),
    });
    behavior.chain(rating).collect()
}

/// Quotes a cell containing the delimiter, a quote or a line break.
pub fn escape_cell(value: &str, delimiter: char) -> String {
    if value.contains([delimiter, '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes a header line and one line per row, joined by `\n`.
pub fn write_table<I>(header: &[&str], rows: I, delimiter: char) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let sep = delimiter.to_string();
    let mut lines = vec![
        header
            .iter()
            .map(|h| escape_cell(h, delimiter))
            .collect::<Vec<_>>()
            .join(&sep),
    ];
    for row in rows {
        lines.push(
            row.iter()
                .map(|c| escape_cell(c, delimiter))
                .collect::<Vec<_>>()
                .join(&sep),
        );
    }
    lines.join("\n")
}

pub fn to_delimited(rows: &[ExportRow], delimiter: char) -> String {
    write_table(&FIELDS, rows.iter().map(ExportRow::cells), delimiter)
}

/// Splits delimited text into records, undoing [`escape_cell`].
pub fn parse_delimited(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut dirty = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                dirty = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                dirty = false;
            }
            c if c == delimiter => {
                record.push(std::mem::take(&mut field));
                dirty = true;
            }
            c => {
                field.push(c);
                dirty = true;
            }
        }
    }
    if dirty || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Parses delimited text into header-keyed maps, one per data row.
pub fn parse_table(text: &str, delimiter: char) -> Vec<HashMap<String, String>> {
    let mut records = parse_delimited(text, delimiter).into_iter();
    let Some(header) = records.next() else {
        return Vec::new();
    };
    records
        .map(|row| {
            header
                .iter()
                .cloned()
                .zip(row.into_iter().chain(std::iter::repeat(String::new())))
                .collect()
        })
        .collect()
}

pub fn export_filename(participant_id: &str) -> String {
    format!("subj-{participant_id}-all.csv")
}

/// Destination for an export artifact.
pub trait ExportSink {
    fn emit(&mut self, filename: &str, bytes: &[u8]) -> Result<(), ExportError>;
}

/// Writes artifacts into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    fn emit(&mut self, filename: &str, bytes: &[u8]) -> Result<(), ExportError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ExportError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "export written");
        Ok(())
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: Vec<(String, Vec<u8>)>,
}

impl ExportSink for MemorySink {
    fn emit(&mut self, filename: &str, bytes: &[u8]) -> Result<(), ExportError> {
        self.files.push((filename.to_string(), bytes.to_vec()));
        Ok(())
    }
}
