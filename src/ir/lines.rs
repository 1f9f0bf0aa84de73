//! Shared helpers for the line-oriented label formats.

use std::path::Path;

use csv::StringRecord;

use crate::error::RslabelError;

/// Iterates the records of a comma-separated label file, yielding each with
/// its 1-based line number. Blank lines are skipped and fields are trimmed.
pub(crate) fn comma_records<'a>(
    content: &'a str,
    path: &'a Path,
) -> impl Iterator<Item = Result<(usize, StringRecord), RslabelError>> + 'a {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
        .into_records()
        .map(move |result| match result {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|pos| pos.line() as usize)
                    .unwrap_or_default();
                Ok((line, record))
            }
            Err(source) => Err(RslabelError::MalformedLine {
                path: path.to_path_buf(),
                line: source
                    .position()
                    .map(|pos| pos.line() as usize)
                    .unwrap_or_default(),
                message: source.to_string(),
            }),
        })
}

pub(crate) fn parse_f64_field(
    raw: &str,
    field_name: &str,
    path: &Path,
    line: usize,
) -> Result<f64, RslabelError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| RslabelError::MalformedLine {
            path: path.to_path_buf(),
            line,
            message: format!("invalid {field_name} '{raw}'; expected a finite number"),
        })
}

pub(crate) fn parse_i64_field(
    raw: &str,
    field_name: &str,
    path: &Path,
    line: usize,
) -> Result<i64, RslabelError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| RslabelError::MalformedLine {
            path: path.to_path_buf(),
            line,
            message: format!("invalid {field_name} '{raw}'; expected an integer"),
        })
}

pub(crate) fn expect_fields(
    count: usize,
    expected: usize,
    layout: &str,
    path: &Path,
    line: usize,
) -> Result<(), RslabelError> {
    if count < expected {
        return Err(RslabelError::MalformedLine {
            path: path.to_path_buf(),
            line,
            message: format!("expected {expected} fields ({layout}), found {count}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_records_skip_blank_lines_and_trim() {
        let content = "1, 2 ,3\n\n4,5\n";
        let rows: Vec<_> = comma_records(content, Path::new("a.txt"))
            .collect::<Result<_, _>>()
            .expect("parse rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 1);
        assert_eq!(&rows[0].1[1], "2");
        assert_eq!(rows[1].0, 3);
        assert_eq!(rows[1].1.len(), 2);
    }

    #[test]
    fn numeric_fields_report_line() {
        let err = parse_f64_field("abc", "x", Path::new("a.txt"), 7).unwrap_err();
        match err {
            RslabelError::MalformedLine { line, .. } => assert_eq!(line, 7),
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_f64_field("NaN", "x", Path::new("a.txt"), 1).is_err());
        assert_eq!(parse_i64_field(" 42 ", "code", Path::new("a.txt"), 1).unwrap(), 42);
    }
}
