//! Benchmark Configuration Loading
//!
//! Reads GEMM configurations from a CSV file or an inline `;`-separated
//! string. Both sources carry a header line that is skipped; fields are
//! mapped positionally onto [`CONFIG_HEADERS`].

use crate::gemm::{parse_flag, GemmOpts, CONFIG_HEADERS};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}, column '{column}': {message}")]
    InvalidField {
        line: u64,
        column: &'static str,
        message: String,
    },
}

/// Load configurations from a CSV file whose first line is a header.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<Vec<GemmOpts>, ConfigError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(file)
}

/// Load configurations from inline rows separated by `;`.
///
/// No header is expected: every row is data.
pub fn load_config_str(rows: &str) -> Result<Vec<GemmOpts>, ConfigError> {
    let mut text = CONFIG_HEADERS.join(",");
    for row in rows.split(';') {
        text.push('\n');
        text.push_str(row);
    }
    parse_config(text.as_bytes())
}

/// Parse configuration CSV, skipping the first record.
pub fn parse_config<R: Read>(reader: R) -> Result<Vec<GemmOpts>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut configs = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if index == 0 {
            continue;
        }
        if record.iter().all(str::is_empty) {
            continue;
        }

        let line = record.position().map(|p| p.line()).unwrap_or(index as u64 + 1);
        configs.push(parse_record(&record, line)?);
    }

    Ok(configs)
}

fn parse_record(record: &csv::StringRecord, line: u64) -> Result<GemmOpts, ConfigError> {
    if record.len() != CONFIG_HEADERS.len() {
        return Err(ConfigError::FieldCount {
            line,
            expected: CONFIG_HEADERS.len(),
            found: record.len(),
        });
    }

    let field = |i: usize| &record[i];
    let invalid = |i: usize, message: String| ConfigError::InvalidField {
        line,
        column: CONFIG_HEADERS[i],
        message,
    };
    let uint = |i: usize| -> Result<u64, ConfigError> {
        field(i)
            .parse::<u64>()
            .map_err(|e| invalid(i, format!("'{}': {}", field(i), e)))
    };
    let float = |i: usize| -> Result<f64, ConfigError> {
        field(i)
            .parse::<f64>()
            .map_err(|e| invalid(i, format!("'{}': {}", field(i), e)))
    };

    Ok(GemmOpts {
        data_type: field(0).parse().map_err(|e| invalid(0, e))?,
        order: field(1).parse().map_err(|e| invalid(1, e))?,
        trans_a: parse_flag(field(2)).map_err(|e| invalid(2, e))?,
        trans_b: parse_flag(field(3)).map_err(|e| invalid(3, e))?,
        m: uint(4)?,
        n: uint(5)?,
        k: uint(6)?,
        alpha: float(7)?,
        beta: float(8)?,
        lda: uint(9)?,
        ldb: uint(10)?,
        ldc: uint(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemm::DataType;
    use std::io::Write;

    const FILE: &str = "\
type,order,transA,transB,m,n,k,alpha,beta,lda,ldb,ldc
s,c,0,0,1024,1024,1024,1.0,0.0,1024,1024,1024
h,c,1,0,512,256,128,1.0,1.0,128,128,512
";

    #[test]
    fn skips_header_line() {
        let configs = parse_config(FILE.as_bytes()).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].m, 1024);
        assert_eq!(configs[1].data_type, DataType::Half);
        assert!(configs[1].trans_a);
        assert!(!configs[1].trans_b);
        assert_eq!(configs[1].beta, 1.0);
    }

    #[test]
    fn header_text_is_not_interpreted() {
        let text = "anything,goes,here,a,b,c,d,e,f,g,h,i\ns,c,0,1,8,8,8,1,0,8,8,8\n";
        let configs = parse_config(text.as_bytes()).unwrap();
        assert_eq!(configs.len(), 1);
        assert!(configs[0].trans_b);
    }

    #[test]
    fn inline_rows_are_all_data() {
        let configs =
            load_config_str("s,c,0,0,64,64,64,1.0,0.0,64,64,64;d,r,1,1,32,16,8,2.0,0.5,8,16,32")
                .unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].data_type, DataType::Double);
        assert_eq!(configs[1].alpha, 2.0);
        assert_eq!(configs[1].ldc, 32);
    }

    #[test]
    fn blank_rows_are_ignored() {
        let configs = load_config_str("s,c,0,0,64,64,64,1.0,0.0,64,64,64;;").unwrap();
        assert_eq!(configs.len(), 1);
    }

    #[test]
    fn reports_line_of_bad_field() {
        let text = format!("{}s,c,0,0,64,x,64,1.0,0.0,64,64,64\n", FILE);
        let err = parse_config(text.as_bytes()).unwrap_err();
        match err {
            ConfigError::InvalidField { line, column, .. } => {
                assert_eq!(line, 4);
                assert_eq!(column, "n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_short_rows() {
        let err = load_config_str("s,c,0,0,64").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FieldCount {
                expected: 12,
                found: 5,
                ..
            }
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FILE.as_bytes()).unwrap();
        let configs = load_config_file(file.path()).unwrap();
        assert_eq!(configs.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config_file("/nonexistent/gemm.csv").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
