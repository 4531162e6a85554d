#[cfg(feature = "web")]
use crate::error::ExportError;
use crate::table::{Cell, Table};

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_line<'a, I>(out: &mut String, cells: I)
where
    I: IntoIterator<Item = &'a str>,
{
    let line: Vec<String> = cells.into_iter().map(escape_csv).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

/// Export a table as CSV: the schema as the first line, then every row.
///
/// Null cells are written as empty fields.
///
/// # Examples
/// ```
/// use sheetdesk::table::Table;
/// use sheetdesk::downloader::to_csv;
///
/// let table = Table::from_values(vec![
///     vec!["Name".to_string(), "Topic".to_string()],
///     vec!["Sam".to_string()],
/// ]);
/// assert_eq!(to_csv(&table), "Name,Topic\nSam,\n");
/// ```
pub fn to_csv(table: &Table) -> String {
    let mut csv_content = String::new();
    if table.schema().is_empty() {
        return csv_content;
    }

    push_line(&mut csv_content, table.schema().headers().iter().map(String::as_str));
    for row in table.rows() {
        push_line(&mut csv_content, row.iter().map(|c: &Cell| c.as_deref().unwrap_or("")));
    }
    csv_content
}

/// Export a table as an XLSX workbook with one worksheet.
#[cfg(feature = "web")]
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, ExportError> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let build = |e: rust_xlsxwriter::XlsxError| ExportError::Build(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    let bold = Format::new().set_bold();

    for (c, header) in table.schema().headers().iter().enumerate() {
        worksheet
            .write_string_with_format(0, c as u16, header, &bold)
            .map_err(build)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Some(value) = cell {
                worksheet
                    .write_string((r + 1) as u32, c as u16, value)
                    .map_err(build)?;
            }
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(build)
}
