use crate::domains::variable::types::VariableType;
use crate::validation::{validate_file_extension, validate_file_size};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Upload size bound for CSV files (2 MB)
pub const MAX_CSV_BYTES: usize = 2 * 1024 * 1024;

/// Header columns every import file must carry. Extra columns are ignored.
pub const REQUIRED_COLUMNS: &[&str] = &["name", "label", "type", "values"];

const ALLOWED_EXTENSIONS: &[&str] = &["csv", "txt"];
const ALLOWED_MIME_TYPES: &[&str] = &["text/csv", "text/plain", "application/csv"];

/// The accepted field separators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsvSeparator {
    Comma,
    Semicolon,
    Pipe,
}

impl CsvSeparator {
    pub fn as_char(&self) -> char {
        match self {
            CsvSeparator::Comma => ',',
            CsvSeparator::Semicolon => ';',
            CsvSeparator::Pipe => '|',
        }
    }

    pub fn as_byte(&self) -> u8 {
        self.as_char() as u8
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            ',' => Some(CsvSeparator::Comma),
            ';' => Some(CsvSeparator::Semicolon),
            '|' => Some(CsvSeparator::Pipe),
            _ => None,
        }
    }
}

impl Default for CsvSeparator {
    fn default() -> Self {
        CsvSeparator::Comma
    }
}

/// An uploaded file, as handed over by the presentation boundary
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// One validated preview row, in file order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRecord {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    pub values: String,
}

/// Per-row validation failures. Row numbers are the 1-indexed position in the
/// file after empty lines are dropped, so the first data row is row 2.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CsvRowError {
    #[error("Row {row}: wrong number of columns")]
    ColumnCountMismatch { row: usize },

    #[error("Row {row}: required fields are empty")]
    RequiredFieldEmpty { row: usize },

    #[error("Row {row}: invalid variable type ({value})")]
    InvalidType { row: usize, value: String },
}

fn format_row_errors(errors: &[CsvRowError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

/// Import failures. Any of these rejects the whole file; nothing is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CsvImportError {
    #[error("The CSV file is empty")]
    EmptyFile,

    #[error("The following required columns are missing: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Errors in the CSV file: {}", format_row_errors(.0))]
    InvalidRows(Vec<CsvRowError>),

    #[error("No valid rows were found in the CSV file")]
    EmptyResult,

    #[error("The file exceeds the maximum size of {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("The file is not valid UTF-8 text")]
    InvalidEncoding,

    #[error("Row {row}: malformed CSV ({message})")]
    Malformed { row: usize, message: String },
}

/// Summary of a commit run: creations plus per-row notices (duplicates
/// skipped, individual store failures). Notices never abort the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvImportSummary {
    pub created: usize,
    pub notices: Vec<String>,
}

/// Validate the upload boundary (size, file type, encoding) and return the
/// decoded text content.
pub fn check_upload(upload: &CsvUpload) -> Result<String, CsvImportError> {
    if !validate_file_size(upload.data.len(), MAX_CSV_BYTES) {
        return Err(CsvImportError::FileTooLarge {
            size: upload.data.len(),
            max: MAX_CSV_BYTES,
        });
    }

    let extension_ok = validate_file_extension(&upload.filename, ALLOWED_EXTENSIONS);
    let mime_ok = upload
        .content_type
        .as_deref()
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .map(|m| ALLOWED_MIME_TYPES.contains(&m.essence_str()))
        .unwrap_or(false);

    if !extension_ok && !mime_ok {
        return Err(CsvImportError::UnsupportedFileType(upload.filename.clone()));
    }

    String::from_utf8(upload.data.clone()).map_err(|_| CsvImportError::InvalidEncoding)
}

/// Parse and validate file content into a preview of variable rows.
///
/// This is the strict half of the pipeline: one bad row rejects the whole
/// file. Committing the preview afterwards is lenient per row (see the
/// variable service), which deliberately does not mirror this gate.
pub fn parse_preview(
    content: &str,
    separator: CsvSeparator,
) -> Result<Vec<CsvRecord>, CsvImportError> {
    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return Err(CsvImportError::EmptyFile);
    }

    let headers = split_fields(lines[0], separator, 1)?;

    let positions: Vec<Option<usize>> = REQUIRED_COLUMNS
        .iter()
        .map(|column| headers.iter().position(|h| h == column))
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .zip(&positions)
        .filter(|(_, pos)| pos.is_none())
        .map(|(column, _)| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CsvImportError::MissingColumns(missing));
    }

    let (name_idx, label_idx, type_idx, values_idx) =
        match (positions[0], positions[1], positions[2], positions[3]) {
            (Some(n), Some(l), Some(t), Some(v)) => (n, l, t, v),
            _ => return Err(CsvImportError::MissingColumns(missing)),
        };

    let mut preview = Vec::new();
    let mut errors = Vec::new();

    for (index, line) in lines.iter().enumerate().skip(1) {
        let row = index + 1;
        let fields = split_fields(line, separator, row)?;

        if fields.len() != headers.len() {
            errors.push(CsvRowError::ColumnCountMismatch { row });
            continue;
        }

        let name = fields[name_idx].clone();
        let label = fields[label_idx].clone();
        let type_raw = fields[type_idx].clone();
        let values = fields.get(values_idx).cloned().unwrap_or_default();

        if name.is_empty() || label.is_empty() || type_raw.is_empty() {
            errors.push(CsvRowError::RequiredFieldEmpty { row });
            continue;
        }

        let variable_type = match VariableType::from_str(&type_raw) {
            Some(t) => t,
            None => {
                errors.push(CsvRowError::InvalidType { row, value: type_raw });
                continue;
            }
        };

        preview.push(CsvRecord {
            name,
            label,
            variable_type,
            values,
        });
    }

    if !errors.is_empty() {
        return Err(CsvImportError::InvalidRows(errors));
    }

    if preview.is_empty() {
        return Err(CsvImportError::EmptyResult);
    }

    Ok(preview)
}

/// Split one line into trimmed fields, honoring quoting
fn split_fields(
    line: &str,
    separator: CsvSeparator,
    row: usize,
) -> Result<Vec<String>, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator.as_byte())
        .has_headers(false)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => Ok(record.iter().map(|field| field.trim().to_string()).collect()),
        Some(Err(e)) => Err(CsvImportError::Malformed { row, message: e.to_string() }),
        None => Ok(vec![String::new()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_rejected() {
        assert_eq!(parse_preview("", CsvSeparator::Comma), Err(CsvImportError::EmptyFile));
        assert_eq!(parse_preview("\n\n  \n", CsvSeparator::Comma), Err(CsvImportError::EmptyFile));
    }

    #[test]
    fn test_missing_columns_are_listed_exactly() {
        let result = parse_preview("name,label\nage,Age", CsvSeparator::Comma);
        assert_eq!(
            result,
            Err(CsvImportError::MissingColumns(vec![
                "type".to_string(),
                "values".to_string(),
            ]))
        );

        let result = parse_preview("label,type,values\nAge,integer,", CsvSeparator::Comma);
        assert_eq!(
            result,
            Err(CsvImportError::MissingColumns(vec!["name".to_string()]))
        );
    }

    #[test]
    fn test_headers_are_trimmed_and_extra_columns_ignored() {
        let content = " name , label , type , values , comment\nage,Age,integer,,ignored";
        let preview = parse_preview(content, CsvSeparator::Comma).unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].name, "age");
        assert_eq!(preview[0].values, "");
    }

    #[test]
    fn test_plain_and_quoted_rows_preview_in_order() {
        let content = "name,label,type,values\nage,Age,integer,\nsex,Sex,radio,\"1,Male|2,Female\"";
        let preview = parse_preview(content, CsvSeparator::Comma).unwrap();

        assert_eq!(preview.len(), 2);
        assert_eq!(
            preview[0],
            CsvRecord {
                name: "age".to_string(),
                label: "Age".to_string(),
                variable_type: VariableType::Integer,
                values: "".to_string(),
            }
        );
        assert_eq!(
            preview[1],
            CsvRecord {
                name: "sex".to_string(),
                label: "Sex".to_string(),
                variable_type: VariableType::Radio,
                values: "1,Male|2,Female".to_string(),
            }
        );
    }

    #[test]
    fn test_semicolon_and_pipe_separators() {
        let content = "name;label;type;values\nsex;Sex;radio;1, Male | 2, Female";
        let preview = parse_preview(content, CsvSeparator::Semicolon).unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].values, "1, Male | 2, Female");

        let content = "name|label|type|values\nage|Age|integer|";
        let preview = parse_preview(content, CsvSeparator::Pipe).unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].variable_type, VariableType::Integer);
    }

    #[test]
    fn test_invalid_type_rejects_the_whole_batch() {
        // The first row is valid but must not survive: one bad row rejects all
        let content = "name,label,type,values\nage,Age,integer,\nsex,Sex,boolean,";
        let result = parse_preview(content, CsvSeparator::Comma);
        assert_eq!(
            result,
            Err(CsvImportError::InvalidRows(vec![CsvRowError::InvalidType {
                row: 3,
                value: "boolean".to_string(),
            }]))
        );

        let message = result.unwrap_err().to_string();
        assert!(message.contains("Row 3"));
        assert!(message.contains("boolean"));
    }

    #[test]
    fn test_column_count_mismatch_and_required_fields() {
        let content = "name,label,type,values\nage,Age,integer\n,Sex,radio,";
        let result = parse_preview(content, CsvSeparator::Comma);
        assert_eq!(
            result,
            Err(CsvImportError::InvalidRows(vec![
                CsvRowError::ColumnCountMismatch { row: 2 },
                CsvRowError::RequiredFieldEmpty { row: 3 },
            ]))
        );
    }

    #[test]
    fn test_row_numbers_skip_dropped_empty_lines() {
        // The blank line between header and data is dropped before numbering
        let content = "name,label,type,values\n\nage,Age,number,\n";
        let result = parse_preview(content, CsvSeparator::Comma);
        assert_eq!(
            result,
            Err(CsvImportError::InvalidRows(vec![CsvRowError::InvalidType {
                row: 2,
                value: "number".to_string(),
            }]))
        );
    }

    #[test]
    fn test_header_only_file_yields_empty_result() {
        let result = parse_preview("name,label,type,values\n", CsvSeparator::Comma);
        assert_eq!(result, Err(CsvImportError::EmptyResult));
    }

    #[test]
    fn test_values_are_trimmed() {
        let content = "name,label,type,values\n age , Age , integer , ";
        let preview = parse_preview(content, CsvSeparator::Comma).unwrap();
        assert_eq!(preview[0].name, "age");
        assert_eq!(preview[0].label, "Age");
        assert_eq!(preview[0].values, "");
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = "name,label,type,values\r\nage,Age,integer,\r\n";
        let preview = parse_preview(content, CsvSeparator::Comma).unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].name, "age");
    }

    #[test]
    fn test_check_upload_size_bound() {
        let upload = CsvUpload {
            filename: "variables.csv".to_string(),
            content_type: Some("text/csv".to_string()),
            data: vec![b'a'; MAX_CSV_BYTES + 1],
        };
        assert!(matches!(
            check_upload(&upload),
            Err(CsvImportError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_check_upload_file_type() {
        let upload = CsvUpload {
            filename: "variables.xlsx".to_string(),
            content_type: Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string()),
            data: b"name,label,type,values".to_vec(),
        };
        assert!(matches!(
            check_upload(&upload),
            Err(CsvImportError::UnsupportedFileType(_))
        ));

        // Extension alone is enough
        let upload = CsvUpload {
            filename: "variables.txt".to_string(),
            content_type: None,
            data: b"name,label,type,values".to_vec(),
        };
        assert!(check_upload(&upload).is_ok());

        // A csv content type with parameters is enough, whatever the name
        let upload = CsvUpload {
            filename: "upload.tmp".to_string(),
            content_type: Some("text/csv; charset=utf-8".to_string()),
            data: b"name,label,type,values".to_vec(),
        };
        assert!(check_upload(&upload).is_ok());
    }

    #[test]
    fn test_check_upload_rejects_non_utf8() {
        let upload = CsvUpload {
            filename: "variables.csv".to_string(),
            content_type: Some("text/csv".to_string()),
            data: vec![0xff, 0xfe, 0x00],
        };
        assert_eq!(check_upload(&upload), Err(CsvImportError::InvalidEncoding));
    }

    #[test]
    fn test_separator_round_trip() {
        for sep in [CsvSeparator::Comma, CsvSeparator::Semicolon, CsvSeparator::Pipe] {
            assert_eq!(CsvSeparator::from_char(sep.as_char()), Some(sep));
        }
        assert_eq!(CsvSeparator::from_char('\t'), None);
    }
}
