use super::{
    columns::{from_cells, to_cells, ColumnKind, COLUMNS},
    row::SimulationRow,
};
use crate::{inputs::Material, runner::build::input_for_row};
use itertools::Itertools;
use rusqlite::types::Value;
use std::{
    borrow::Cow,
    collections::BTreeMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("Failed to access csv file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Csv file is empty")]
    Empty,
    #[error("Csv header does not match the study columns, missing: {missing:?}, unknown: {unknown:?}")]
    Header {
        missing: Vec<String>,
        unknown: Vec<String>,
    },
    #[error("Unterminated quoted field in csv record {0}")]
    Unterminated(usize),
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => value.to_string(),
        Value::Text(value) => value.clone(),
        Value::Blob(_) => String::new(),
    }
}

/// Flatten `rows` into a csv file with one header line of display names
pub fn write_csv(path: &Path, rows: &[SimulationRow], base: &Path) -> Result<(), CsvError> {
    let mut writer = BufWriter::new(File::create(path)?);

    writeln!(
        writer,
        "{}",
        COLUMNS.iter().map(|column| escape(column.display)).join(",")
    )?;

    for row in rows {
        writeln!(
            writer,
            "{}",
            to_cells(row, base)
                .iter()
                .map(|cell| escape(&cell_text(cell)).into_owned())
                .join(",")
        )?;
    }

    writer.flush()?;
    debug!(path = ?path, rows = rows.len(), "Exported study");

    Ok(())
}

/// Split csv content into records, quoted fields may hold separators and line breaks
fn parse_records(content: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => quoted = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if quoted {
        return Err(CsvError::Unterminated(records.len() + 1));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    // blank lines carry no record
    records.retain(|record| !(record.len() == 1 && record[0].is_empty()));

    Ok(records)
}

fn parse_cell(text: &str, kind: ColumnKind) -> Result<Value, String> {
    if text.is_empty() {
        return Ok(Value::Null);
    }

    match kind {
        ColumnKind::Text => Ok(Value::Text(text.to_owned())),
        ColumnKind::Integer => text
            .parse::<i64>()
            .or_else(|_| match text.parse::<f64>() {
                Ok(value) if value.fract() == 0.0 => Ok(value as i64),
                _ => Err(()),
            })
            .map(Value::Integer)
            .map_err(|_| format!("{text} is not an integer")),
        ColumnKind::Real => text
            .parse::<f64>()
            .map(|value| {
                if value.is_nan() {
                    Value::Null
                } else {
                    Value::Real(value)
                }
            })
            .map_err(|_| format!("{text} is not a number")),
    }
}

/// Rows read from a csv file together with the reasons rejected lines were dropped
#[derive(Debug, Default)]
pub struct CsvImport {
    pub rows: Vec<SimulationRow>,
    pub errors: Vec<String>,
}

/// Read a csv file written by `write_csv` and validate every line.
///
/// Lines that fail to parse or whose parameters do not form a valid simulation input are
/// reported in `errors`, ids are kept as they are.
pub fn read_csv(path: &Path, base: &Path) -> Result<CsvImport, CsvError> {
    let content = fs::read_to_string(path)?;
    let mut records = parse_records(&content)?.into_iter();
    let header = records.next().ok_or(CsvError::Empty)?;

    let displays: BTreeMap<&str, usize> = COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| (column.display, index))
        .collect();
    let missing: Vec<String> = COLUMNS
        .iter()
        .filter(|column| !header.iter().any(|name| name == column.display))
        .map(|column| column.display.to_owned())
        .collect();
    let unknown: Vec<String> = header
        .iter()
        .filter(|name| !displays.contains_key(name.as_str()))
        .cloned()
        .collect();

    if !missing.is_empty() || !unknown.is_empty() || header.len() != COLUMNS.len() {
        return Err(CsvError::Header { missing, unknown });
    }

    // position in the file -> position in `COLUMNS`
    let order: Vec<usize> = header
        .iter()
        .map(|name| displays[name.as_str()])
        .collect();

    let mut import = CsvImport::default();

    for (line, record) in records.enumerate().map(|(index, record)| (index + 2, record)) {
        if record.len() != COLUMNS.len() {
            import.errors.push(format!(
                "Line {line}: expected {} values, found {}",
                COLUMNS.len(),
                record.len()
            ));
            continue;
        }

        let mut cells = vec![Value::Null; COLUMNS.len()];
        let mut parse_error = None;

        for (text, &index) in record.iter().zip(order.iter()) {
            match parse_cell(text, COLUMNS[index].kind) {
                Ok(value) => cells[index] = value,
                Err(error) => {
                    parse_error = Some(format!("Line {line}, {}: {error}", COLUMNS[index].display));
                    break;
                }
            }
        }

        if let Some(error) = parse_error {
            import.errors.push(error);
            continue;
        }

        let row = match from_cells(&cells, base) {
            Ok(row) => row,
            Err(error) => {
                import.errors.push(format!("Line {line}: {error}"));
                continue;
            }
        };

        if let Err(error) = input_for_row(&row, Material::named(&row.material)) {
            import.errors.push(format!("Line {line}: {error}"));
            continue;
        }

        import.rows.push(row);
    }

    for error in import.errors.iter() {
        warn!("Rejected csv line: {error}");
    }

    Ok(import)
}
