use crate::error::ConfigError;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref ENDPOINT_REGEX: Regex = Regex::new(r"^([A-Za-z]*)([0-9]*)$").unwrap();
}

/// An A1-notation range such as `Sheet1!A2:Q`, `A:O` or `'Team Log'`.
///
/// Columns are stored 1-based like spreadsheet column numbers, rows 1-based
/// like spreadsheet row numbers. `None` means "unbounded" on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: Option<String>,
    pub start_col: Option<usize>,
    pub start_row: Option<usize>,
    pub end_col: Option<usize>,
    pub end_row: Option<usize>,
}

impl A1Range {
    /// Parse a range the way the Sheets API accepts it.
    ///
    /// A token without `!` and without `:` names a whole sheet.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ConfigError::InvalidRange(input.to_string()));
        }

        let (sheet, cells) = match input.rfind('!') {
            Some(idx) => (Some(unquote_sheet(&input[..idx])), &input[idx + 1..]),
            None if !input.contains(':') => (Some(unquote_sheet(input)), ""),
            None => (None, input),
        };

        if let Some(name) = &sheet {
            if name.is_empty() {
                return Err(ConfigError::InvalidRange(input.to_string()));
            }
        }

        let mut range = A1Range {
            sheet,
            start_col: None,
            start_row: None,
            end_col: None,
            end_row: None,
        };

        if cells.is_empty() {
            return Ok(range);
        }

        let (first, second) = match cells.split_once(':') {
            Some((a, b)) => (a, Some(b)),
            None => (cells, None),
        };

        let (c1, r1) = parse_endpoint(first).ok_or_else(|| ConfigError::InvalidRange(input.to_string()))?;
        range.start_col = c1;
        range.start_row = r1;

        match second {
            Some(end) => {
                let (c2, r2) =
                    parse_endpoint(end).ok_or_else(|| ConfigError::InvalidRange(input.to_string()))?;
                range.end_col = c2;
                range.end_row = r2;
            }
            None => {
                range.end_col = c1;
                range.end_row = r1;
            }
        }

        if let (Some(a), Some(b)) = (range.start_col, range.end_col) {
            if a > b {
                return Err(ConfigError::InvalidRange(input.to_string()));
            }
        }
        if let (Some(a), Some(b)) = (range.start_row, range.end_row) {
            if a > b {
                return Err(ConfigError::InvalidRange(input.to_string()));
            }
        }

        Ok(range)
    }

    /// First row number covered by the range.
    pub fn first_row(&self) -> usize {
        self.start_row.unwrap_or(1)
    }

    /// The single row holding this range's headers.
    ///
    /// `A:Q` becomes `A1:Q1`, `Sheet1!B3:F` becomes `Sheet1!B3:F3` and a
    /// bare sheet name becomes `Sheet1!1:1`.
    pub fn header_row(&self) -> A1Range {
        let row = self.first_row();
        A1Range {
            sheet: self.sheet.clone(),
            start_col: self.start_col,
            start_row: Some(row),
            end_col: self.end_col,
            end_row: Some(row),
        }
    }

    /// Zero-based column offset of the first column in the range.
    pub fn column_offset(&self) -> usize {
        self.start_col.map(|c| c - 1).unwrap_or(0)
    }

    /// Number of columns covered, if bounded.
    pub fn width(&self) -> Option<usize> {
        match (self.start_col, self.end_col) {
            (Some(a), Some(b)) => Some(b - a + 1),
            (None, Some(b)) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = match (self.start_col, self.start_row, self.end_col, self.end_row) {
            (None, None, None, None) => String::new(),
            (c1, r1, c2, r2) => format!("{}:{}", endpoint(c1, r1), endpoint(c2, r2)),
        };

        match (&self.sheet, cells.is_empty()) {
            (Some(sheet), true) => write!(f, "{}", quote_sheet(sheet)),
            (Some(sheet), false) => write!(f, "{}!{}", quote_sheet(sheet), cells),
            (None, _) => f.write_str(&cells),
        }
    }
}

fn endpoint(col: Option<usize>, row: Option<usize>) -> String {
    let mut out = col.map(col_to_letter).unwrap_or_default();
    if let Some(row) = row {
        out.push_str(&row.to_string());
    }
    out
}

fn parse_endpoint(text: &str) -> Option<(Option<usize>, Option<usize>)> {
    let caps = ENDPOINT_REGEX.captures(text.trim())?;
    let letters = caps.get(1).map_or("", |m| m.as_str());
    let digits = caps.get(2).map_or("", |m| m.as_str());
    if letters.is_empty() && digits.is_empty() {
        return None;
    }

    let col = if letters.is_empty() {
        None
    } else {
        Some(letter_to_col(letters)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<usize>() {
            Ok(0) | Err(_) => return None,
            Ok(n) => Some(n),
        }
    };
    Some((col, row))
}

fn unquote_sheet(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        raw[1..raw.len() - 1].replace("''", "'")
    } else {
        raw.to_string()
    }
}

fn quote_sheet(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Convert a 1-based column number to letters (1 = A, 27 = AA).
pub fn col_to_letter(col: usize) -> String {
    let mut col = col;
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.push(((col % 26) as u8 + b'A') as char);
        col /= 26;
    }
    result.chars().rev().collect()
}

/// Convert column letters to a 1-based column number (A = 1, AA = 27).
///
/// Returns `None` for an empty string, a non-letter, or a column number that
/// does not fit in `usize`.
pub fn letter_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}
