use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::collections::HashMap;
use std::io::Cursor;

use crate::error::AppError;
use crate::question::Question;

/// Canonical question fields the importer can map spreadsheet columns onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Title,
    Description,
    Difficulty,
    Category,
    Tags,
    Example,
    Constraints,
}

/// Map a lower-cased, trimmed header cell to its canonical field.
///
/// The synonym table is a design contract: spreadsheets from different
/// authors label the same columns differently, and these are the accepted
/// spellings. Headers with no match are ignored rather than rejected.
fn canonical_field(header: &str) -> Option<Field> {
    match header {
        "title" | "question" | "problem" | "name" => Some(Field::Title),
        "description" | "desc" | "details" | "problem statement" => Some(Field::Description),
        "difficulty" | "level" => Some(Field::Difficulty),
        "category" | "topic" => Some(Field::Category),
        "tags" | "tag" => Some(Field::Tags),
        "example" | "examples" => Some(Field::Example),
        "constraints" | "constraint" => Some(Field::Constraints),
        _ => None,
    }
}

/// Parse an uploaded spreadsheet into question records.
///
/// The filename is used only to select a parser by extension: `.csv` is
/// decoded as UTF-8 text, `.xlsx`/`.xls` as a workbook (first sheet only,
/// raw cell values, no formula evaluation). The first row is treated as
/// headers and mapped through the synonym table; each following row becomes
/// a question if it has a non-empty title and description after trimming.
/// Accepted rows get a fresh placeholder id so the save step knows to
/// allocate a storage id.
///
/// # Arguments
/// * `bytes` - Raw file contents as uploaded
/// * `filename` - Original filename, for extension detection only
///
/// # Returns
/// * `Result<Vec<Question>, AppError>` - Valid questions in row order
///
/// # Errors
/// * `UnsupportedFormat` for unrecognized extensions or undecodable bytes
/// * `NoValidQuestions` when fewer than 2 rows exist or no row passes the
///   title/description gate
///
/// # Examples
/// ```
/// use codestreak::importer::parse_upload;
///
/// let csv = b"Question,Problem Statement,Level\nTwo Sum,Given an array...,Easy\n";
/// let questions = parse_upload(csv, "questions.csv").unwrap();
/// assert_eq!(questions[0].title, "Two Sum");
/// ```
pub fn parse_upload(bytes: &[u8], filename: &str) -> Result<Vec<Question>, AppError> {
    let name = filename.to_lowercase();

    let rows = if name.ends_with(".csv") {
        csv_rows(bytes)
    } else if name.ends_with(".xlsx") || name.ends_with(".xls") {
        workbook_rows(bytes)?
    } else {
        return Err(AppError::UnsupportedFormat(format!(
            "{filename}: please upload CSV or XLSX files"
        )));
    };

    let questions = questions_from_rows(&rows);
    if questions.is_empty() {
        return Err(AppError::NoValidQuestions);
    }
    Ok(questions)
}

/// Convert a grid of cells (header row first) into question records.
fn questions_from_rows(rows: &[Vec<String>]) -> Vec<Question> {
    if rows.len() < 2 {
        return Vec::new();
    }

    // Later duplicate headers win, matching a plain map assignment.
    let mut columns: HashMap<Field, usize> = HashMap::new();
    for (index, header) in rows[0].iter().enumerate() {
        if let Some(field) = canonical_field(header.to_lowercase().trim()) {
            columns.insert(field, index);
        }
    }

    let mut questions = Vec::new();

    for row in &rows[1..] {
        if row.is_empty() {
            continue;
        }

        let cell = |field: Field| -> Option<String> {
            columns
                .get(&field)
                .map(|&index| row.get(index).map(|v| v.trim().to_string()).unwrap_or_default())
        };

        let title = cell(Field::Title).unwrap_or_default();
        let description = cell(Field::Description).unwrap_or_default();

        // The sole validity gate: both title and description must survive
        // trimming.
        if title.is_empty() || description.is_empty() {
            continue;
        }

        let mut question = Question::new(title, description);
        question.id = Question::new_import_id();
        question.difficulty = cell(Field::Difficulty).filter(|v| !v.is_empty());
        question.category = cell(Field::Category).filter(|v| !v.is_empty());
        question.example = cell(Field::Example).filter(|v| !v.is_empty());
        question.constraints = cell(Field::Constraints).filter(|v| !v.is_empty());
        question.tags = cell(Field::Tags).map(|raw| split_tags(&raw));

        questions.push(question);
    }

    questions
}

/// Split a tags cell on commas, trimming each piece. An empty cell yields an
/// empty list, not a one-element list containing an empty string.
fn split_tags(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|tag| tag.trim().to_string()).collect()
}

/// Decode CSV bytes into a grid of string cells. Blank lines are skipped so
/// a trailing newline does not produce a phantom row.
fn csv_rows(bytes: &[u8]) -> Vec<Vec<String>> {
    let text = String::from_utf8_lossy(bytes);

    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(split_csv_line)
        .collect()
}

/// Parse one CSV line into fields, honoring standard quoting: a quoted field
/// may contain commas, and a doubled quote inside a quoted field is a
/// literal quote.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    fields.push(current);
    fields
}

/// Decode workbook bytes (XLSX or XLS) into a grid of string cells from the
/// first sheet. Raw cell values only; formulas are read as their cached
/// results by the decoder.
fn workbook_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::UnsupportedFormat(format!("could not read workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(AppError::NoValidQuestions)?
        .map_err(|e| AppError::UnsupportedFormat(format!("could not read worksheet: {e}")))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Whole floats render without the trailing ".0" a spreadsheet
        // would not show either.
        Data::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::NEW_QUESTION_PREFIX;

    #[test]
    fn header_synonyms_map_to_canonical_fields() {
        let csv = b"Question,Problem Statement,Level\nTwo Sum,Given an array...,Easy\n";
        let questions = parse_upload(csv, "upload.csv").unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].title, "Two Sum");
        assert_eq!(questions[0].description, "Given an array...");
        assert_eq!(questions[0].difficulty.as_deref(), Some("Easy"));
    }

    #[test]
    fn unknown_headers_are_ignored() {
        let csv = b"Title,Description,Reviewer Notes\nA,B,ignore me\n";
        let questions = parse_upload(csv, "upload.csv").unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].title, "A");
    }

    #[test]
    fn rows_without_title_or_description_are_dropped() {
        let csv = b"Title,Description\n,Has description but no title\nHas title,\nBoth,Present\n";
        let questions = parse_upload(csv, "upload.csv").unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].title, "Both");
    }

    #[test]
    fn header_only_file_has_no_valid_questions() {
        let err = parse_upload(b"Title,Description\n", "upload.csv").unwrap_err();
        assert!(matches!(err, AppError::NoValidQuestions));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = parse_upload(b"anything", "upload.pdf").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[test]
    fn garbage_workbook_bytes_are_rejected() {
        let err = parse_upload(b"not a zip archive", "upload.xlsx").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[test]
    fn tags_split_on_commas_and_trim() {
        let csv = b"Title,Description,Tags\nTwo Sum,Desc,\"Array, Hash Table\"\nOther,Desc,\n";
        let questions = parse_upload(csv, "upload.csv").unwrap();

        assert_eq!(
            questions[0].tags,
            Some(vec!["Array".to_string(), "Hash Table".to_string()])
        );
        // Empty cell in a present column: empty list, not [""].
        assert_eq!(questions[1].tags, Some(Vec::new()));
    }

    #[test]
    fn absent_columns_leave_fields_unset() {
        let csv = b"Title,Description\nA,B\n";
        let questions = parse_upload(csv, "upload.csv").unwrap();

        assert!(questions[0].difficulty.is_none());
        assert!(questions[0].category.is_none());
        assert!(questions[0].tags.is_none());
    }

    #[test]
    fn imported_questions_get_unique_placeholder_ids() {
        let csv = b"Title,Description\nA,B\nC,D\n";
        let questions = parse_upload(csv, "upload.csv").unwrap();

        assert!(questions[0].id.starts_with(NEW_QUESTION_PREFIX));
        assert!(questions[1].id.starts_with(NEW_QUESTION_PREFIX));
        assert_ne!(questions[0].id, questions[1].id);
        assert!(questions.iter().all(|q| q.is_unsaved()));
    }

    #[test]
    fn quoted_fields_keep_commas_and_escaped_quotes() {
        let line = r#"plain,"with, comma","she said ""hi""""#;
        assert_eq!(
            split_csv_line(line),
            vec!["plain", "with, comma", r#"she said "hi""#]
        );
    }

    #[test]
    fn later_duplicate_headers_win() {
        let csv = b"Title,Name,Description\nFirst,Second,Desc\n";
        let questions = parse_upload(csv, "upload.csv").unwrap();
        // Both columns map to title; the later one takes the slot.
        assert_eq!(questions[0].title, "Second");
    }
}
