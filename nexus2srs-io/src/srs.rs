//! Classic SRS `.dat` output.
//!
//! Layout:
//!
//! ```text
//! <header lines>
//! <MetaDataAtStart>
//! name=value
//! </MetaDataAtStart>
//!  &END
//! <column names>
//! <one row per scan point>
//! ```

use crate::Result;
use chrono::NaiveDateTime;
use nexus2srs_core::{Column, Header, ScalarValue, ScanRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const METADATA_START: &str = "<MetaDataAtStart>";
const METADATA_END: &str = "</MetaDataAtStart>";
const HEADER_END: &str = " &END";

/// Text layout of the scan table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SrsFormat {
    /// Minimum width of every table cell, values right-aligned (default: 10).
    pub column_width: usize,
    /// Digits after the decimal point for numeric cells (default: 6).
    pub precision: usize,
}

impl Default for SrsFormat {
    fn default() -> Self {
        Self {
            column_width: 10,
            precision: 6,
        }
    }
}

impl SrsFormat {
    /// Set the numeric precision.
    #[must_use]
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Set the minimum cell width.
    #[must_use]
    pub fn with_column_width(mut self, width: usize) -> Self {
        self.column_width = width;
        self
    }

    fn cell(&self, text: &str) -> String {
        format!("{text:>width$}", width = self.column_width)
    }

    fn number(&self, value: f64) -> String {
        if value.is_finite() {
            format!("{value:.prec$}", prec = self.precision)
        } else {
            ScalarValue::Float(value).to_string()
        }
    }
}

/// Header lines: the stored scan header, or a classic `&SRS` block.
#[must_use]
pub fn header_block(header: &Header) -> String {
    if let Some(text) = &header.scan_header {
        return text.trim_end().to_string();
    }
    let (date, time) = header
        .date
        .as_ref()
        .map_or_else(|| (String::from("0"), String::from("0")), srs_date_time);
    format!(
        " &SRS\n SRSRUN={},SRSDAT={date},SRSTIM={time},\n SRSSTN='BASE',SRSPRJ='GDA_BASE',SRSEXP='Emulator',\n SRSTLE='{}',\n SRSCN1='{blank}',SRSCN2='{blank}',SRSCN3='{blank}',",
        header.scan_number.unwrap_or(0),
        " ".repeat(60),
        blank = " ".repeat(8),
    )
}

fn srs_date_time(date: &NaiveDateTime) -> (String, String) {
    (
        date.format("%Y%m%d").to_string(),
        date.format("%H%M%S").to_string(),
    )
}

/// Metadata value as written after `name=`; text is quoted and kept on one line.
fn metadata_value(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Text(text) => {
            let line = text.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n");
            format!("'{line}'")
        }
        other => other.to_string(),
    }
}

/// Render a complete `.dat` file.
#[must_use]
pub fn render_srs(record: &ScanRecord, format: &SrsFormat) -> String {
    let mut out = header_block(&record.header);
    out.push('\n');
    out.push_str(METADATA_START);
    out.push('\n');
    for (name, value) in record.metadata.iter() {
        out.push_str(&format!("{name}={}\n", metadata_value(value)));
    }
    out.push_str(METADATA_END);
    out.push('\n');
    out.push_str(HEADER_END);
    out.push('\n');

    let names: Vec<String> = record.scan_data.names().map(|n| format.cell(n)).collect();
    out.push_str(&names.join("\t"));
    out.push('\n');

    let columns: Vec<&Column> = record.scan_data.iter().map(|(_, c)| c).collect();
    for point in 0..record.scan_data.points() {
        let row: Vec<String> = columns
            .iter()
            .map(|column| match column {
                Column::Numeric(values) => format.cell(&format.number(values[point])),
                Column::Text(values) => format.cell(&values[point]),
            })
            .collect();
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}

/// Write a record to `path`, replacing any existing file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_srs<P: AsRef<Path>>(path: P, record: &ScanRecord, format: &SrsFormat) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(render_srs(record, format).as_bytes())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nexus2srs_core::memory::MemoryFile;
    use nexus2srs_core::{extract_header, Metadata, ScanData, SourceInfo};

    fn record() -> ScanRecord {
        let mut scan_data = ScanData::new();
        scan_data
            .insert("eta", Column::Numeric(vec![1.0, 1.5]))
            .unwrap();
        scan_data
            .insert("mode", Column::Text(vec!["a".into(), "b".into()]))
            .unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("cmd", "scan eta 1 1.5 0.5");
        metadata.insert("count", 3_i64);
        ScanRecord {
            scan_data,
            metadata,
            header: Header {
                scan_number: Some(1_040_323),
                date: NaiveDate::from_ymd_opt(2024, 3, 5).and_then(|d| d.and_hms_opt(14, 2, 11)),
                ..Header::default()
            },
            ..ScanRecord::default()
        }
    }

    #[test]
    fn test_render_layout() {
        let text = render_srs(&record(), &SrsFormat::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], " &SRS");
        assert_eq!(lines[1], " SRSRUN=1040323,SRSDAT=20240305,SRSTIM=140211,");
        assert_eq!(lines[4], " SRSCN1='        ',SRSCN2='        ',SRSCN3='        ',");
        assert_eq!(lines[5], "<MetaDataAtStart>");
        assert_eq!(lines[6], "cmd='scan eta 1 1.5 0.5'");
        assert_eq!(lines[7], "count=3");
        assert_eq!(lines[8], "</MetaDataAtStart>");
        assert_eq!(lines[9], " &END");
        assert_eq!(lines[10], "       eta\t      mode");
        assert_eq!(lines[11], "  1.000000\t         a");
        assert_eq!(lines[12], "  1.500000\t         b");
        assert_eq!(lines.len(), 13);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_stored_header_is_used() {
        let mut record = record();
        record.header.scan_header = Some(" &SRS\n SRSRUN=7\n".into());
        let text = render_srs(&record, &SrsFormat::default().with_precision(2));
        assert!(text.starts_with(" &SRS\n SRSRUN=7\n<MetaDataAtStart>\n"));
        assert!(text.contains("      1.50\t"));
    }

    #[test]
    fn test_multiline_text_stays_on_one_line() {
        let mut record = record();
        record.metadata = Metadata::new();
        record.metadata.insert("cmd", "scan eta 1 2 1\nscan chi 1 2 1\r\n");
        let text = render_srs(&record, &SrsFormat::default());
        assert!(text.contains(
            "<MetaDataAtStart>\ncmd='scan eta 1 2 1\\nscan chi 1 2 1\\n'\n</MetaDataAtStart>\n"
        ));
    }

    #[test]
    fn test_header_block_uses_header_stored_in_file() {
        let file = MemoryFile::new()
            .text("/entry1/scan_header", &[" &SRS", " SRSRUN=815893,", " &END", ""])
            .floats("/entry1/measurement/eta", &[1.0, 2.0]);
        let header = extract_header(&file.index(), &file, &SourceInfo::default());
        assert_eq!(header_block(&header), " &SRS\n SRSRUN=815893,\n &END");
    }

    #[test]
    fn test_metadata_only_table() {
        let record = ScanRecord::default();
        let text = render_srs(&record, &SrsFormat::default());
        assert!(text.ends_with(" &END\n\n"));
        assert!(text.contains("SRSRUN=0,SRSDAT=0,SRSTIM=0,"));
    }

    #[test]
    fn test_write_srs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("1040323.dat");
        write_srs(&path, &record(), &SrsFormat::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("count=3\n"));
    }
}
