use crate::aggregate::GroupSummary;
use crate::columns::ColumnId;
use crate::stats::FileSummary;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Row-oriented output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Txt,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Txt, ExportFormat::Json];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Count(u64),
}

impl Cell {
    /// Numbers use 6-decimal fixed notation
    pub fn render(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(value) => format!("{value:.6}"),
            Cell::Count(count) => count.to_string(),
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, Cell::Text(_))
    }
}

/// Tabular shape shared by every formatter
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

fn column_headers<'a>(leading: &[&'a str], trailing: &[&'a str]) -> Vec<String> {
    leading
        .iter()
        .copied()
        .chain(ColumnId::ALL.iter().map(|c| c.label()))
        .chain(trailing.iter().copied())
        .map(str::to_owned)
        .collect()
}

pub fn file_table(files: &[FileSummary]) -> Table {
    let headers = column_headers(&["File", "Group"], &["WindSpeed", "Rows"]);
    let rows = files
        .iter()
        .map(|file| {
            let mut row = vec![
                Cell::Text(file.file_name.clone()),
                Cell::Text(file.group_key.clone()),
            ];
            row.extend(ColumnId::ALL.iter().map(|&c| Cell::Number(file.mean(c))));
            row.push(Cell::Number(file.derived_wind_speed));
            row.push(Cell::Count(file.row_count));
            row
        })
        .collect();
    Table { headers, rows }
}

pub fn group_table(groups: &[GroupSummary]) -> Table {
    let headers = column_headers(&["Group", "WindSpeed", "Files"], &[]);
    let rows = groups
        .iter()
        .map(|group| {
            let mut row = vec![
                Cell::Text(group.group_key.clone()),
                Cell::Number(group.wind_speed),
                Cell::Count(u64::from(group.member_count)),
            ];
            row.extend(ColumnId::ALL.iter().map(|&c| Cell::Number(group.mean(c))));
            row
        })
        .collect();
    Table { headers, rows }
}

pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&table.headers)?;
    for row in &table.rows {
        csv_writer.write_record(row.iter().map(Cell::render))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Space-padded columns with a `=` rule under the header
pub fn write_fixed_width<W: Write>(table: &Table, mut writer: W) -> Result<(), ExportError> {
    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(Cell::render).collect())
        .collect();

    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &rendered {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_line = table
        .headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{h:<w$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    writeln!(writer, "{}", "=".repeat(rule_width))?;

    for (cells, row) in rendered.iter().zip(&table.rows) {
        let line = cells
            .iter()
            .zip(row)
            .zip(&widths)
            .map(|((text, cell), &w)| {
                if cell.is_numeric() {
                    format!("{text:>w$}")
                } else {
                    format!("{text:<w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(value: &T, mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

const FILE_SUMMARIES_STEM: &str = "file_summaries";
const POWER_CURVE_STEM: &str = "power_curve";

/// Every file name [`export_tables`] can produce, across all formats
pub fn export_file_names() -> Vec<String> {
    ExportFormat::ALL
        .iter()
        .flat_map(|format| {
            [FILE_SUMMARIES_STEM, POWER_CURVE_STEM]
                .map(|stem| format!("{stem}.{}", format.extension()))
        })
        .collect()
}

/// Write both tables in every requested format into `dir`
///
/// Produces `file_summaries.<ext>` and `power_curve.<ext>`. Returns the paths written.
pub fn export_tables(
    dir: &Path,
    files: &[FileSummary],
    groups: &[GroupSummary],
    formats: &[ExportFormat],
) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for &format in formats {
        let files_path = dir.join(format!("{FILE_SUMMARIES_STEM}.{}", format.extension()));
        let groups_path = dir.join(format!("{POWER_CURVE_STEM}.{}", format.extension()));

        let files_out = BufWriter::new(File::create(&files_path)?);
        let groups_out = BufWriter::new(File::create(&groups_path)?);
        match format {
            ExportFormat::Csv => {
                write_csv(&file_table(files), files_out)?;
                write_csv(&group_table(groups), groups_out)?;
            }
            ExportFormat::Txt => {
                write_fixed_width(&file_table(files), files_out)?;
                write_fixed_width(&group_table(groups), groups_out)?;
            }
            ExportFormat::Json => {
                write_json(files, files_out)?;
                write_json(groups, groups_out)?;
            }
        }

        info!("Wrote {} and {}", files_path.display(), groups_path.display());
        written.push(files_path);
        written.push(groups_path);
    }

    Ok(written)
}
