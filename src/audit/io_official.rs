// Primitives for reading the official results, one row per ward.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::audit::io_common::file_extension;
use crate::audit::*;

const PRECINCT_COLUMN: &str = "Precinct";

/// Reads a vote count. An empty cell counts as 0.
fn parse_count(content: &str, lineno: usize, column: &str) -> AuditResult<u64> {
    let s = content.trim();
    if s.is_empty() {
        return Ok(0);
    }
    if let Ok(x) = s.parse::<u64>() {
        return Ok(x);
    }
    // Spreadsheets often write integers as "12.0".
    match s.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        _ => InvalidCountSnafu {
            lineno,
            column,
            content: s,
        }
        .fail(),
    }
}

fn precinct_index(header: &[String], path: &str) -> AuditResult<usize> {
    header
        .iter()
        .position(|h| h.trim() == PRECINCT_COLUMN)
        .context(MissingColumnSnafu {
            column: PRECINCT_COLUMN,
            path,
        })
}

/// Builds the tally of one row. `cells` holds the raw content of each column.
fn read_row(
    header: &[String],
    precinct_idx: usize,
    cells: &[String],
    lineno: usize,
) -> AuditResult<OfficialTally> {
    let empty = String::new();
    let precinct = cells.get(precinct_idx).unwrap_or(&empty).trim();
    let mut tally = OfficialTally::new(precinct);
    for (idx, column) in header.iter().enumerate() {
        if idx == precinct_idx {
            continue;
        }
        let cell = cells.get(idx).unwrap_or(&empty);
        tally.add(column.clone(), parse_count(cell, lineno, column)?);
    }
    Ok(tally)
}

fn read_official_csv(path: &str) -> BAuditResult<Vec<OfficialTally>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    let header: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { lineno: 1usize })?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();
    debug!("read_official_csv: header: {:?}", header);
    let precinct_idx = precinct_index(&header, path)?;

    let mut res: Vec<OfficialTally> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let cells: Vec<String> = line.iter().map(|s| s.to_string()).collect();
        res.push(read_row(&header, precinct_idx, &cells, lineno)?);
    }
    Ok(res)
}

fn cell_content(cell: &DataType) -> String {
    match cell {
        DataType::Empty => "".to_string(),
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) => f.to_string(),
        x => format!("{:?}", x),
    }
}

fn read_official_excel(path: &str) -> BAuditResult<Vec<OfficialTally>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;

    let mut rows = wrange.rows();
    let header: Vec<String> = rows
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(|c| cell_content(c).trim().to_string())
        .collect();
    debug!("read_official_excel: header: {:?}", header);
    let precinct_idx = precinct_index(&header, path)?;

    let mut res: Vec<OfficialTally> = Vec::new();
    for (idx, row) in rows.enumerate() {
        let cells: Vec<String> = row.iter().map(cell_content).collect();
        res.push(read_row(&header, precinct_idx, &cells, idx + 2)?);
    }
    Ok(res)
}

/// Reads the official results from a CSV or an Excel file.
///
/// The `Precinct` column holds the official name of each row, every other
/// column is a candidate. The rows are indexed by precinct name.
pub fn read_official_results(path: &str) -> BAuditResult<PrecinctTable<String>> {
    info!("read_official_results: reading {}", path);
    let rows = match file_extension(path).as_deref() {
        Some("csv") => read_official_csv(path)?,
        Some("xlsx") => read_official_excel(path)?,
        _ => {
            return Err(Box::new(AuditError::UnknownOfficialFormat {
                path: path.to_string(),
            }))
        }
    };
    let table = PrecinctTable::from_tallies(rows).context(ReconcileSnafu {})?;
    info!("read_official_results: {} precincts", table.len());
    Ok(table)
}
