use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};
use tracing::info;

use crate::config::OutputSettings;
use crate::errors::Result;
use crate::parse::{file_timestamp, sanitize_filename};
use crate::types::{ExtractionResult, FollowerRecord};

const HEADER_BG: Color = Color::RGB(0x366092);
const SUMMARY_BG: Color = Color::RGB(0x70AD47);
const MAX_SHEET_NAME: usize = 31;
const MAX_COLUMN_WIDTH: f64 = 50.0;

/// Columns written first, in this order; any remaining fields follow.
const PREFERRED_COLUMNS: [&str; 8] = [
    "username",
    "full_name",
    "bio",
    "posts_count",
    "follower_count",
    "following_count",
    "extraction_timestamp",
    "source_account",
];

const EXTRA_COLUMNS: [&str; 4] = ["phone_numbers", "is_verified", "is_private", "external_url"];

pub struct Exporter {
    output_dir: PathBuf,
    settings: OutputSettings,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>, settings: OutputSettings) -> Self {
        Self {
            output_dir: output_dir.into(),
            settings,
        }
    }

    /// Writes one workbook: a data sheet per account with records, plus a
    /// summary sheet covering every account (including empty ones).
    pub fn export_to_excel(&self, results: &ExtractionResult, filename: Option<&str>) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let name = match filename {
            Some(name) => name.to_string(),
            None => format!("instagram_followers_{}.xlsx", file_timestamp(chrono::Local::now())),
        };
        let path = self.output_dir.join(sanitize_filename(&name));

        let mut workbook = Workbook::new();
        let header_format = header_format(HEADER_BG);

        for (account, records) in nonempty(results) {
            let sheet = workbook.add_worksheet();
            sheet.set_name(sheet_name(&self.settings.sheet_prefix, account))?;
            write_data_sheet(sheet, records, &header_format)?;
        }

        self.write_summary_sheet(&mut workbook, results)?;

        if self.settings.include_metadata {
            self.write_metadata_sheet(&mut workbook, results)?;
        }

        workbook.save(&path)?;
        info!("Workbook written to {}", path.display());
        Ok(path)
    }

    /// Writes one UTF-8 BOM prefixed CSV per non-empty account. Returns the
    /// written paths.
    pub fn export_to_csv(&self, results: &ExtractionResult) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;
        let timestamp = file_timestamp(chrono::Local::now());
        let mut paths = Vec::new();

        for (account, records) in nonempty(results) {
            let name = sanitize_filename(&format!("seguidores_{}_{}.csv", account, timestamp));
            let path = self.output_dir.join(name);
            write_csv(&path, records)?;
            info!("CSV written to {}", path.display());
            paths.push(path);
        }

        Ok(paths)
    }

    fn write_summary_sheet(&self, workbook: &mut Workbook, results: &ExtractionResult) -> Result<()> {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Resumen")?;
        let header = header_format(SUMMARY_BG);

        let headers = [
            "Cuenta",
            "Total_Seguidores_Extraídos",
            "Con_Teléfono",
            "Verificados",
            "Privados",
            "Porcentaje_Teléfono",
        ];
        for (col, title) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        for (row, summary) in summary_rows(results).into_iter().enumerate() {
            let row = row as u32 + 1;
            sheet.write_string(row, 0, summary.account)?;
            sheet.write_number(row, 1, summary.total as f64)?;
            sheet.write_number(row, 2, summary.with_phone as f64)?;
            sheet.write_number(row, 3, summary.verified as f64)?;
            sheet.write_number(row, 4, summary.private as f64)?;
            sheet.write_string(row, 5, summary.percentage)?;
        }

        sheet.set_column_width(0, 24)?;
        sheet.set_column_width(1, 26)?;
        sheet.set_column_width(5, 20)?;
        Ok(())
    }

    fn write_metadata_sheet(&self, workbook: &mut Workbook, results: &ExtractionResult) -> Result<()> {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Metadatos")?;
        let header = header_format(HEADER_BG);
        sheet.write_string_with_format(0, 0, "Campo", &header)?;
        sheet.write_string_with_format(0, 1, "Valor", &header)?;

        for (row, (campo, valor)) in self.metadata_rows(results).into_iter().enumerate() {
            let row = row as u32 + 1;
            sheet.write_string(row, 0, campo)?;
            sheet.write_string(row, 1, valor)?;
        }
        sheet.set_column_width(0, 28)?;
        sheet.set_column_width(1, 50)?;
        Ok(())
    }

    fn metadata_rows(&self, results: &ExtractionResult) -> Vec<(&'static str, String)> {
        let total_records: usize = results.iter().map(|(_, r)| r.len()).sum();
        vec![
            (
                "Fecha_Extracción",
                chrono::Local::now().format(&self.settings.datetime_format).to_string(),
            ),
            ("Total_Cuentas_Procesadas", results.len().to_string()),
            ("Total_Seguidores_Extraídos", total_records.to_string()),
            ("Formato_Fecha", self.settings.date_format.clone()),
            ("Versión_Extractor", env!("CARGO_PKG_VERSION").to_string()),
            ("Cumplimiento_GDPR", "Solo datos públicos".to_string()),
            (
                "Campos_Obligatorios",
                "username, full_name, is_private, extraction_timestamp, source_account".to_string(),
            ),
        ]
    }
}

fn header_format(background: Color) -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(background)
        .set_align(FormatAlign::Center)
}

/// Excel limits sheet names to 31 chars and forbids `\ / * [ ] : ?`.
fn sheet_name(prefix: &str, account: &str) -> String {
    let raw = format!("{prefix}{account}");
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '[' | ']' | ':' | '?' => '_',
            other => other,
        })
        .collect();
    if cleaned.chars().count() > MAX_SHEET_NAME {
        let truncated: String = cleaned.chars().take(MAX_SHEET_NAME - 3).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}

/// Accounts that get a data sheet / CSV file; zero-record accounts appear
/// only in the summary.
fn nonempty(results: &ExtractionResult) -> impl Iterator<Item = &(String, Vec<FollowerRecord>)> {
    results.iter().filter(|(_, records)| !records.is_empty())
}

#[derive(Debug, PartialEq)]
struct SummaryRow {
    account: String,
    total: usize,
    with_phone: usize,
    verified: usize,
    private: usize,
    percentage: String,
}

/// One summary row per account, empty accounts included.
fn summary_rows(results: &ExtractionResult) -> Vec<SummaryRow> {
    results
        .iter()
        .map(|(account, records)| {
            let with_phone = records.iter().filter(|r| !r.phone_numbers.is_empty()).count();
            SummaryRow {
                account: format!("@{account}"),
                total: records.len(),
                with_phone,
                verified: records.iter().filter(|r| r.is_verified).count(),
                private: records.iter().filter(|r| r.is_private).count(),
                percentage: phone_percentage(with_phone, records.len()),
            }
        })
        .collect()
}

fn phone_percentage(with_phone: usize, total: usize) -> String {
    if total == 0 {
        "0%".to_string()
    } else {
        format!("{:.1}%", with_phone as f64 * 100.0 / total as f64)
    }
}

fn column_order() -> Vec<&'static str> {
    PREFERRED_COLUMNS.iter().chain(EXTRA_COLUMNS.iter()).copied().collect()
}

fn field_value(record: &FollowerRecord, column: &str) -> String {
    match column {
        "username" => record.username.clone(),
        "full_name" => record.full_name.clone(),
        "bio" => record.bio.clone(),
        "posts_count" => record.posts_count.to_string(),
        "follower_count" => record.follower_count.to_string(),
        "following_count" => record.following_count.to_string(),
        "extraction_timestamp" => record.extraction_timestamp.clone(),
        "source_account" => record.source_account.clone(),
        "phone_numbers" => record.phone_numbers.join("; "),
        "is_verified" => record.is_verified.to_string(),
        "is_private" => record.is_private.to_string(),
        "external_url" => record.external_url.clone(),
        _ => String::new(),
    }
}

/// Counter columns carry real numerics in the workbook; everything else is
/// written as text.
fn numeric_value(record: &FollowerRecord, column: &str) -> Option<f64> {
    match column {
        "posts_count" => Some(record.posts_count as f64),
        "follower_count" => Some(record.follower_count as f64),
        "following_count" => Some(record.following_count as f64),
        _ => None,
    }
}

fn write_data_sheet(sheet: &mut Worksheet, records: &[FollowerRecord], header: &Format) -> Result<()> {
    let columns = column_order();

    for (col, title) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, header)?;
    }

    let mut widths: Vec<f64> = columns.iter().map(|c| c.len() as f64).collect();
    for (row, record) in records.iter().enumerate() {
        for (col, column) in columns.iter().enumerate() {
            let value = field_value(record, column);
            if value.len() as f64 > widths[col] {
                widths[col] = value.len() as f64;
            }
            match numeric_value(record, column) {
                Some(number) => {
                    sheet.write_number(row as u32 + 1, col as u16, number)?;
                }
                None => {
                    sheet.write_string(row as u32 + 1, col as u16, value)?;
                }
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        sheet.set_column_width(col as u16, (width + 2.0).min(MAX_COLUMN_WIDTH))?;
    }
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofilter(0, 0, records.len() as u32, columns.len() as u16 - 1)?;
    Ok(())
}

fn write_csv(path: &Path, records: &[FollowerRecord]) -> Result<()> {
    let mut file = File::create(path)?;
    // Excel needs the BOM to open UTF-8 CSVs with accents intact.
    file.write_all(b"\xEF\xBB\xBF")?;

    let columns = column_order();
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<String> = columns.iter().map(|c| field_value(record, c)).collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record(username: &str, with_phone: bool) -> FollowerRecord {
        let mut record = FollowerRecord::template(username, "@demo");
        record.follower_count = 150;
        record.following_count = 80;
        record.posts_count = 12;
        if with_phone {
            record.phone_numbers.push("+34600112233".to_string());
        }
        record
    }

    fn settings() -> OutputSettings {
        OutputSettings {
            sheet_prefix: "Seguidores_".to_string(),
            include_metadata: true,
            date_format: "%Y-%m-%d".to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }

    #[test]
    fn sheet_name_sanitizes_and_truncates() {
        assert_eq!(sheet_name("Seguidores_", "demo"), "Seguidores_demo");
        assert_eq!(sheet_name("Seguidores_", "a/b:c"), "Seguidores_a_b_c");
        let long = sheet_name("Seguidores_", "a".repeat(40).as_str());
        assert_eq!(long.chars().count(), 31);
        assert!(long.ends_with("..."));
    }

    #[test]
    fn excel_export_writes_workbook() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path(), settings());
        let results: ExtractionResult = vec![
            ("demo".to_string(), vec![sample_record("alice", true), sample_record("bob", false)]),
            ("empty".to_string(), Vec::new()),
        ];

        let path = exporter.export_to_excel(&results, None).unwrap();
        assert!(path.exists());
        assert!(path.extension().is_some_and(|e| e == "xlsx"));
    }

    #[test]
    fn excel_export_honors_filename() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path(), settings());
        let results: ExtractionResult = vec![("demo".to_string(), vec![sample_record("alice", false)])];

        let path = exporter.export_to_excel(&results, Some("salida.xlsx")).unwrap();
        assert_eq!(path.file_name().unwrap(), "salida.xlsx");
    }

    #[test]
    fn csv_export_one_file_per_nonempty_account() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path(), settings());
        let results: ExtractionResult = vec![
            ("demo".to_string(), vec![sample_record("alice", true)]),
            ("empty".to_string(), Vec::new()),
        ];

        let paths = exporter.export_to_csv(&results).unwrap();
        assert_eq!(paths.len(), 1);

        let raw = std::fs::read(&paths[0]).unwrap();
        assert!(raw.starts_with(b"\xEF\xBB\xBF"));
        let text = String::from_utf8(raw[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("username,full_name,bio"));
        let data = lines.next().unwrap();
        assert!(data.starts_with("alice,"));
        assert!(data.contains("+34600112233"));
    }

    #[test]
    fn phone_percentage_formatting() {
        assert_eq!(phone_percentage(1, 3), "33.3%");
        assert_eq!(phone_percentage(2, 2), "100.0%");
        assert_eq!(phone_percentage(0, 5), "0.0%");
        assert_eq!(phone_percentage(0, 0), "0%");
    }

    #[test]
    fn summary_covers_all_accounts_data_sheets_only_nonempty() {
        let results: ExtractionResult = vec![
            ("demo".to_string(), vec![sample_record("alice", true), sample_record("bob", false)]),
            ("empty".to_string(), Vec::new()),
            ("other".to_string(), vec![sample_record("carol", false)]),
        ];

        assert_eq!(nonempty(&results).count(), 2);

        let rows = summary_rows(&results);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].account, "@demo");
        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[0].with_phone, 1);
        assert_eq!(rows[0].percentage, "50.0%");
        assert_eq!(rows[1].total, 0);
        assert_eq!(rows[1].percentage, "0%");
    }

    #[test]
    fn counter_columns_are_numeric() {
        let record = sample_record("alice", false);
        assert_eq!(numeric_value(&record, "posts_count"), Some(12.0));
        assert_eq!(numeric_value(&record, "follower_count"), Some(150.0));
        assert_eq!(numeric_value(&record, "following_count"), Some(80.0));
        assert_eq!(numeric_value(&record, "username"), None);
        assert_eq!(numeric_value(&record, "phone_numbers"), None);
    }

    #[test]
    fn metadata_rows_complete() {
        let exporter = Exporter::new("unused", settings());
        let results: ExtractionResult = vec![("demo".to_string(), vec![sample_record("alice", false)])];

        let rows = exporter.metadata_rows(&results);
        assert_eq!(rows.len(), 7);
        let campos: Vec<&str> = rows.iter().map(|(campo, _)| *campo).collect();
        assert!(campos.contains(&"Versión_Extractor"));
        assert!(campos.contains(&"Campos_Obligatorios"));
        assert_eq!(rows[1], ("Total_Cuentas_Procesadas", "1".to_string()));
        assert_eq!(rows[2], ("Total_Seguidores_Extraídos", "1".to_string()));
    }

    #[test]
    fn column_order_is_stable() {
        let columns = column_order();
        assert_eq!(columns[0], "username");
        assert_eq!(columns[7], "source_account");
        assert_eq!(columns.len(), 12);
    }
}
