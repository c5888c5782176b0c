// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-of-run CSV report generation.
//!
//! The report has one header row with the collected-test field names
//! (`node_id, doc_string, requirements, status`) and one row per surviving
//! test; requirement tags are joined into a single `;`-delimited field.
//! Fields are quoted RFC-4180 style when they contain a delimiter, quote, or
//! line break.

use crate::errors::ReportError;
use camino::Utf8Path;
use reqtrace_metadata::CollectedTestsSummary;
use std::{
    borrow::Cow,
    fs::File,
    io::{LineWriter, Write},
};
use tracing::warn;

static CSV_HEADER: &str = "node_id,doc_string,requirements,status";

/// Counts of what the report writer did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReportStats {
    /// Data rows written.
    pub written: usize,

    /// Rows omitted because the test never executed.
    pub omitted: usize,
}

/// Writes the CSV report for a collected-test snapshot to `path`, creating
/// intermediate directories as needed.
///
/// With `omit_unexecuted_tests`, entries whose status is still unset are
/// dropped from the report (each omission is logged). If every entry is
/// dropped, the file still gets its header row. A completely empty snapshot
/// is an explicit [`ReportError::NothingToReport`] failure instead: there are
/// no field names to derive a header from.
pub fn write_csv_report(
    summary: &CollectedTestsSummary,
    path: &Utf8Path,
    omit_unexecuted_tests: bool,
) -> Result<ReportStats, ReportError> {
    if summary.is_empty() {
        return Err(ReportError::NothingToReport {
            path: path.to_owned(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| ReportError::DirCreate {
            path: parent.to_owned(),
            error,
        })?;
    }

    let file = File::create(path).map_err(|error| ReportError::Write {
        path: path.to_owned(),
        error,
    })?;
    let mut writer = LineWriter::new(file);
    let write_error = |error| ReportError::Write {
        path: path.to_owned(),
        error,
    };

    writeln!(writer, "{CSV_HEADER}").map_err(write_error)?;

    let mut stats = ReportStats::default();
    for test in summary.tests.values() {
        if omit_unexecuted_tests && !test.status.is_executed() {
            warn!(
                node_id = %test.node_id,
                "omitting test from report; no status attached (test skipped?)"
            );
            stats.omitted += 1;
            continue;
        }

        writeln!(
            writer,
            "{},{},{},{}",
            csv_field(&test.node_id),
            csv_field(&test.doc_string),
            csv_field(&test.requirements.join(";")),
            csv_field(test.status.as_str()),
        )
        .map_err(write_error)?;
        stats.written += 1;
    }

    writer.flush().map_err(write_error)?;
    Ok(stats)
}

/// Quotes a CSV field if it contains a delimiter, quote, or line break.
fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains(['"', ',', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqtrace_metadata::{CollectedTestMetadata, TestStatus};

    fn summary_of(entries: &[(&str, TestStatus)]) -> CollectedTestsSummary {
        let mut summary = CollectedTestsSummary::new();
        for (node_id, status) in entries {
            summary.tests.insert(
                (*node_id).to_owned(),
                CollectedTestMetadata {
                    node_id: (*node_id).to_owned(),
                    doc_string: "Verifies behavior.".to_owned(),
                    requirements: vec!["REQ-001-001".to_owned(), "REQ-001-002".to_owned()],
                    status: *status,
                },
            );
        }
        summary
    }

    #[test]
    fn empty_snapshot_fails_loudly() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let path = temp_dir.path().join("report.csv");

        let error = write_csv_report(&CollectedTestsSummary::new(), &path, false).unwrap_err();
        assert!(matches!(error, ReportError::NothingToReport { .. }), "{error}");
        assert!(!path.exists(), "no file should be created");
    }

    #[test]
    fn writes_header_and_rows() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let path = temp_dir.path().join("reports").join("out.csv");

        let summary = summary_of(&[
            ("tests/a.rs::one", TestStatus::Pass),
            ("tests/b.rs::two", TestStatus::Fail),
        ]);
        let stats = write_csv_report(&summary, &path, false).expect("report should be written");
        assert_eq!(stats, ReportStats { written: 2, omitted: 0 });

        let contents = std::fs::read_to_string(&path).expect("report should be readable");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "tests/a.rs::one,Verifies behavior.,REQ-001-001;REQ-001-002,PASS"
        );
        assert_eq!(
            lines[2],
            "tests/b.rs::two,Verifies behavior.,REQ-001-001;REQ-001-002,FAIL"
        );
    }

    #[test]
    fn omits_unexecuted_tests_when_asked() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let path = temp_dir.path().join("report.csv");

        let summary = summary_of(&[
            ("tests/a.rs::skipped", TestStatus::NotRun),
            ("tests/b.rs::ran", TestStatus::Pass),
        ]);
        let stats = write_csv_report(&summary, &path, true).expect("report should be written");
        assert_eq!(stats, ReportStats { written: 1, omitted: 1 });

        let contents = std::fs::read_to_string(&path).expect("report should be readable");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2, "header plus the one executed test");
        assert!(lines[1].starts_with("tests/b.rs::ran,"));
    }

    #[test]
    fn all_rows_omitted_still_yields_header() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let path = temp_dir.path().join("report.csv");

        let summary = summary_of(&[("tests/a.rs::skipped", TestStatus::NotRun)]);
        let stats = write_csv_report(&summary, &path, true).expect("report should be written");
        assert_eq!(stats, ReportStats { written: 0, omitted: 1 });

        let contents = std::fs::read_to_string(&path).expect("report should be readable");
        assert_eq!(contents.trim_end(), CSV_HEADER);
    }

    #[test]
    fn fields_are_quoted_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("with, comma"), "\"with, comma\"");
        assert_eq!(csv_field("with \"quote\""), "\"with \"\"quote\"\"\"");
        assert_eq!(csv_field("multi\nline"), "\"multi\nline\"");
    }

    #[test]
    fn doc_strings_with_commas_round_trip_quoted() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let path = temp_dir.path().join("report.csv");

        let mut summary = CollectedTestsSummary::new();
        summary.tests.insert(
            "tests/a.rs::tricky".to_owned(),
            CollectedTestMetadata {
                node_id: "tests/a.rs::tricky".to_owned(),
                doc_string: "Checks login, logout, and refresh.".to_owned(),
                requirements: vec![],
                status: TestStatus::Pass,
            },
        );

        write_csv_report(&summary, &path, false).expect("report should be written");
        let contents = std::fs::read_to_string(&path).expect("report should be readable");
        assert!(
            contents.contains("\"Checks login, logout, and refresh.\""),
            "{contents}"
        );
    }
}
