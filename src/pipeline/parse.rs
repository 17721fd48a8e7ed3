//! Reading the model's free-text answer as a pipe-delimited table.
//!
//! The model is asked for a table but nothing enforces one, so every shape
//! assumption is checked here and turned into a [`ParseError`] when it fails.
//!
//! ## Rules (applied in order)
//!
//! 1. Normalise line endings and strip an outer Markdown code fence
//! 2. Skip blank lines; an all-blank answer is [`ParseError::Empty`]
//! 3. No `|` anywhere is [`ParseError::NotTabular`]
//! 4. First line is the header: split on `|`, trim, name empty fields
//!    `Unnamed: <position>`, de-duplicate repeated names as `name.1`, `name.2`
//! 5. Every other line is a data row; too many fields is
//!    [`ParseError::RaggedRow`], too few are padded with empty cells
//! 6. Drop columns whose name matches `^Unnamed`
//! 7. Drop the first data row (the `---|---` separator the model puts under
//!    the header)
//! 8. Drop rows whose remaining cells are all empty (`|  |  |`); a spreadsheet
//!    cannot hold a row with no values, so keeping them would make the table
//!    and its exported workbook disagree
//!
//! Leading and trailing pipes (`| a | b |`) produce empty first and last
//! fields, which is exactly what rules 4 and 6 clean up.

use crate::error::ParseError;
use crate::table::ParsedTable;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

static RE_UNNAMED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Unnamed").unwrap());

/// Parse the model's answer into a [`ParsedTable`].
pub fn parse_response(raw: &str) -> Result<ParsedTable, ParseError> {
    let text = strip_code_fence(&normalise_line_endings(raw));

    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i + 1, l))
        .collect();

    if lines.is_empty() {
        return Err(ParseError::Empty);
    }
    if !lines.iter().any(|(_, l)| l.contains('|')) {
        return Err(ParseError::NotTabular);
    }

    let (_, header_line) = lines[0];
    let header = name_columns(split_fields(header_line));
    let width = header.len();

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(lines.len() - 1);
    for &(line_no, line) in &lines[1..] {
        let mut fields = split_fields(line);
        if fields.len() > width {
            return Err(ParseError::RaggedRow {
                line: line_no,
                expected: width,
                found: fields.len(),
            });
        }
        fields.resize(width, String::new());
        rows.push(fields);
    }

    let keep: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, name)| !RE_UNNAMED.is_match(name))
        .map(|(i, _)| i)
        .collect();

    if rows.is_empty() {
        return Err(ParseError::NoDataRows);
    }

    let first = rows.remove(0);
    if !is_separator_row(&first) {
        warn!(
            "First data row does not look like a separator and is dropped anyway: {:?}",
            first
        );
    }

    if keep.is_empty() {
        return Err(ParseError::NoColumns);
    }

    let names: Vec<String> = keep.iter().map(|&i| header[i].clone()).collect();
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| keep.iter().map(|&i| row[i].clone()).collect::<Vec<String>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    debug!(
        "Parsed table: {} columns ({} dropped), {} rows",
        names.len(),
        width - names.len(),
        rows.len()
    );
    Ok(ParsedTable::from_rows(names, rows))
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_code_fence(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn split_fields(line: &str) -> Vec<String> {
    line.split('|').map(|f| f.trim().to_string()).collect()
}

/// Give empty header fields a placeholder name and de-duplicate the rest.
fn name_columns(fields: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(fields.len());

    for (i, field) in fields.into_iter().enumerate() {
        let base = if field.is_empty() {
            format!("Unnamed: {i}")
        } else {
            field
        };
        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

/// A row made only of dashes, colons, `=`, `+` and empty cells.
fn is_separator_row(fields: &[String]) -> bool {
    fields.iter().any(|f| f.contains('-') || f.contains('='))
        && fields
            .iter()
            .all(|f| f.chars().all(|c| matches!(c, '-' | ':' | '=' | '+' | ' ')))
}
