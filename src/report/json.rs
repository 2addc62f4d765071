//! JSON report

use super::{CaptureReport, Summary};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct JsonReport<'a> {
    generated: String,
    summary: Summary,
    results: &'a [CaptureReport],
}

pub fn write<W: Write>(writer: &mut W, results: &[CaptureReport]) -> io::Result<()> {
    let report = JsonReport {
        generated: chrono::Local::now().to_rfc3339(),
        summary: Summary::from_results(results),
        results,
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)
}
