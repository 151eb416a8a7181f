//! In-process JSON to XLSX conversion, used when no engine is reachable.

use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde_json::{Map, Value};
use sheetgate_core::AppError;

const SHEET_NAME: &str = "Sheet1";

/// Parse `json` and write a single-sheet workbook to `output`.
///
/// Layouts:
/// - array of objects: header row from the first object's keys, one row per object
/// - array of arrays: one row per inner array
/// - array of scalars: one value per row
/// - single object: header row plus one data row
/// - empty array: a single `No data` cell; any other value: `Invalid data`
pub fn convert_json_to_xlsx(json: &[u8], output: &Path) -> Result<(), AppError> {
    let data: Value = serde_json::from_slice(json).map_err(|e| {
        AppError::InvalidInput(format!(
            "Conversion failed: {}. Try saving as CSV or contact support.",
            e
        ))
    })?;

    write_workbook(&data, output).map_err(|e| match e {
        XlsxError::RowColumnLimitError => AppError::InvalidInput(
            "Conversion failed: data exceeds worksheet limits. Try saving as CSV or contact support."
                .to_string(),
        ),
        other => AppError::Internal(format!("Failed to write workbook: {}", other)),
    })
}

fn write_workbook(data: &Value, output: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    match data {
        Value::Array(rows) if rows.is_empty() => {
            worksheet.write_string(0, 0, "No data")?;
        }
        Value::Array(rows) => match &rows[0] {
            Value::Object(first) => {
                let headers: Vec<&str> = first.keys().map(String::as_str).collect();
                write_header(worksheet, &headers)?;
                for (index, row) in rows.iter().enumerate() {
                    let row_num = (index + 1) as u32;
                    match row {
                        Value::Object(map) => write_object_row(worksheet, row_num, &headers, map)?,
                        other => write_cell(worksheet, row_num, 0, other)?,
                    }
                }
            }
            Value::Array(_) => {
                for (index, row) in rows.iter().enumerate() {
                    let row_num = index as u32;
                    match row {
                        Value::Array(cells) => {
                            for (col, cell) in cells.iter().enumerate() {
                                write_cell(worksheet, row_num, column(col)?, cell)?;
                            }
                        }
                        other => write_cell(worksheet, row_num, 0, other)?,
                    }
                }
            }
            _ => {
                for (index, value) in rows.iter().enumerate() {
                    write_cell(worksheet, index as u32, 0, value)?;
                }
            }
        },
        Value::Object(map) => {
            let headers: Vec<&str> = map.keys().map(String::as_str).collect();
            write_header(worksheet, &headers)?;
            write_object_row(worksheet, 1, &headers, map)?;
        }
        _ => {
            worksheet.write_string(0, 0, "Invalid data")?;
        }
    }

    workbook.save(output)?;
    Ok(())
}

fn column(index: usize) -> Result<u16, XlsxError> {
    u16::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn write_header(worksheet: &mut Worksheet, headers: &[&str]) -> Result<(), XlsxError> {
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, column(col)?, *header)?;
    }
    Ok(())
}

fn write_object_row(
    worksheet: &mut Worksheet,
    row: u32,
    headers: &[&str],
    map: &Map<String, Value>,
) -> Result<(), XlsxError> {
    for (col, header) in headers.iter().enumerate() {
        if let Some(value) = map.get(*header) {
            write_cell(worksheet, row, column(col)?, value)?;
        }
    }
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                worksheet.write_number(row, col, f)?;
            }
            None => {
                worksheet.write_string(row, col, n.to_string())?;
            }
        },
        Value::String(s) => {
            // Never let user text become a formula.
            worksheet.write_string(row, col, s.trim_start_matches('='))?;
        }
        nested => {
            worksheet.write_string(row, col, nested.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn convert(json: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        convert_json_to_xlsx(json.as_bytes(), &path).unwrap();
        (dir, path)
    }

    fn read_entry(path: &Path, name: &str) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        contents
    }

    fn position(haystack: &str, needle: &str) -> usize {
        haystack
            .find(needle)
            .unwrap_or_else(|| panic!("{} not found", needle))
    }

    #[test]
    fn test_array_of_objects_keeps_key_and_row_order() {
        let (_dir, path) = convert(r#"[{"name":"John","age":30},{"name":"Jane","age":25}]"#);

        let strings = read_entry(&path, "xl/sharedStrings.xml");
        assert!(position(&strings, ">name<") < position(&strings, ">age<"));
        assert!(position(&strings, ">age<") < position(&strings, ">John<"));
        assert!(position(&strings, ">John<") < position(&strings, ">Jane<"));

        let sheet = read_entry(&path, "xl/worksheets/sheet1.xml");
        assert!(position(&sheet, "<v>30</v>") < position(&sheet, "<v>25</v>"));
        assert!(sheet.contains(r#"r="A3""#));
        assert!(!sheet.contains(r#"r="A4""#));
    }

    #[test]
    fn test_sheet_is_named_sheet1() {
        let (_dir, path) = convert(r#"{"a":1}"#);
        let workbook = read_entry(&path, "xl/workbook.xml");
        assert!(workbook.contains(r#"name="Sheet1""#));
    }

    #[test]
    fn test_array_of_arrays() {
        let (_dir, path) = convert(r#"[["a","b"],[1,2],[true,null]]"#);
        let sheet = read_entry(&path, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"r="B2""#));
        assert!(sheet.contains(r#"r="A3""#));
        assert!(sheet.contains(r#"t="b""#));
    }

    #[test]
    fn test_empty_array_and_scalar() {
        let (_dir, path) = convert("[]");
        assert!(read_entry(&path, "xl/sharedStrings.xml").contains("No data"));

        let (_dir, path) = convert("42");
        assert!(read_entry(&path, "xl/sharedStrings.xml").contains("Invalid data"));
    }

    #[test]
    fn test_formulas_are_neutralised() {
        let (_dir, path) = convert(r#"[{"cell":"=SUM(A1:A2)"}]"#);
        let sheet = read_entry(&path, "xl/worksheets/sheet1.xml");
        assert!(!sheet.contains("<f>"));
        assert!(read_entry(&path, "xl/sharedStrings.xml").contains(">SUM(A1:A2)<"));
    }

    #[test]
    fn test_nested_values_written_as_json_text() {
        let (_dir, path) = convert(r#"[{"tags":["x","y"]}]"#);
        let strings = read_entry(&path, "xl/sharedStrings.xml");
        assert!(
            strings.contains(r#">["x","y"]<"#) || strings.contains(">[&quot;x&quot;,&quot;y&quot;]<")
        );
    }

    #[test]
    fn test_invalid_json_is_client_error() {
        let dir = tempfile::tempdir().unwrap();
        match convert_json_to_xlsx(b"{not json", &dir.path().join("x.xlsx")) {
            Err(AppError::InvalidInput(msg)) => {
                assert!(msg.starts_with("Conversion failed"));
                assert!(msg.contains("Try saving as CSV"));
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }
}
