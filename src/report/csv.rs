//! CSV report, one row per capture file

use super::CaptureReport;
use std::io::{self, Write};

const HEADER: &str = "verdict,score,keystrokes,total_time_ms,content_length,reasons,error,file_name,file_path";

pub fn write<W: Write>(writer: &mut W, results: &[CaptureReport]) -> io::Result<()> {
    writeln!(writer, "{}", HEADER)?;

    for r in results {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{}",
            r.verdict,
            r.score_percent(),
            r.keystroke_count,
            r.total_time_ms,
            r.content_length,
            escape(&r.reasons.join("; ")),
            escape(r.error.as_deref().unwrap_or("")),
            escape(&r.file_name),
            escape(&r.file_path),
        )?;
    }

    Ok(())
}

/// Quote a field when it contains a separator, quote or newline
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
