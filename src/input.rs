use crate::config::InputConfig;
use crate::error::InputError;
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Load the username roster from the configured spreadsheet or CSV file.
///
/// Values are trimmed, a single leading `@` is stripped, empties are dropped
/// and duplicates are collapsed keeping first-seen order. Window selection
/// (start offset, max count) is left to [`select_window`].
pub fn load_usernames(config: &InputConfig) -> Result<Vec<String>, InputError> {
    let path = Path::new(config.path());
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let raw = match extension.as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => {
            read_workbook(path, config.sheet())?
        }
        Some("csv") => read_csv(path)?,
        other => {
            return Err(InputError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            ))
        }
    };

    let usernames = normalize(raw);
    debug!("Loaded {} unique usernames from {}", usernames.len(), path.display());
    Ok(usernames)
}

/// Apply the start offset and optional max count to the roster.
pub fn select_window(usernames: Vec<String>, start: usize, max: Option<usize>) -> Vec<String> {
    usernames
        .into_iter()
        .skip(start)
        .take(max.unwrap_or(usize::MAX))
        .collect()
}

fn read_workbook(path: &Path, sheet: &str) -> Result<Vec<String>, InputError> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(InputError::SheetNotFound(sheet.to_string()));
    }
    let range = workbook.worksheet_range(sheet)?;

    let mut rows = range.rows();
    let header = rows.next().ok_or(InputError::MissingUsernameColumn)?;
    let column = header
        .iter()
        .position(|cell| cell.to_string().trim().eq_ignore_ascii_case("username"))
        .ok_or(InputError::MissingUsernameColumn)?;

    Ok(rows
        .filter_map(|row| row.get(column).map(cell_to_string))
        .collect())
}

fn read_csv(path: &Path) -> Result<Vec<String>, InputError> {
    let mut reader = csv::Reader::from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case("username"))
        .ok_or(InputError::MissingUsernameColumn)?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(column) {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        // Whole-number cells come back as floats; keep them integral.
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn normalize(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut usernames = Vec::new();
    for value in raw {
        let trimmed = value.trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_string()) {
            usernames.push(name.to_string());
        }
    }
    usernames
}
