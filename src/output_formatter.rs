use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Defines the possible output formats for search and replace reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A simple, human-readable text format.
    Text,
    /// JSON format, suitable for machine processing.
    Json,
    /// Comma-Separated Values format.
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Text,
        }
    }
}

/// One search match in one file.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub file: PathBuf,
    pub line: usize,
    pub start: usize,
    pub end: usize,
    /// The matched text, lossily decoded for display.
    pub text: String,
}

/// One planned or applied edit in one file.
#[derive(Debug, Clone, Serialize)]
pub struct Edit {
    pub file: PathBuf,
    /// Index of the rule that produced the edit. Offsets refer to the text as
    /// left by the rules before it.
    pub rule: usize,
    pub start: usize,
    pub end: usize,
    /// The replacement text, lossily decoded for display.
    pub replacement: String,
}

/// Writes hits and edits in the selected format.
pub struct OutputFormatter {
    format: OutputFormat,
    tool_name: String,
    tool_version: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            tool_name: "rerep".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Writes search hits to `writer`.
    pub fn write_hits<W: Write>(&self, writer: &mut W, hits: &[Hit]) -> Result<()> {
        let output = match self.format {
            OutputFormat::Text => hits
                .iter()
                .map(|h| format!("{}:{}: {}\n", h.file.display(), h.line, h.text))
                .collect(),
            OutputFormat::Json => self.format_json("hits", hits)?,
            OutputFormat::Csv => {
                let rows = hits.iter().map(|h| {
                    [
                        h.file.display().to_string(),
                        h.line.to_string(),
                        h.start.to_string(),
                        h.end.to_string(),
                        h.text.clone(),
                    ]
                });
                format_csv(["File", "Line", "Start", "End", "Text"], rows)?
            }
        };
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Writes edits to `writer`.
    pub fn write_edits<W: Write>(&self, writer: &mut W, edits: &[Edit]) -> Result<()> {
        let output = match self.format {
            OutputFormat::Text => edits
                .iter()
                .map(|e| {
                    format!(
                        "{}:{}..{}: {:?} (rule {})\n",
                        e.file.display(),
                        e.start,
                        e.end,
                        e.replacement,
                        e.rule
                    )
                })
                .collect(),
            OutputFormat::Json => self.format_json("edits", edits)?,
            OutputFormat::Csv => {
                let rows = edits.iter().map(|e| {
                    [
                        e.file.display().to_string(),
                        e.rule.to_string(),
                        e.start.to_string(),
                        e.end.to_string(),
                        e.replacement.clone(),
                    ]
                });
                format_csv(["File", "Rule", "Start", "End", "Replacement"], rows)?
            }
        };
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    fn format_json<T: Serialize>(&self, kind: &str, items: &[T]) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput<'a, T> {
            tool: ToolInfo<'a>,
            generated_at: DateTime<Utc>,
            kind: &'a str,
            total: usize,
            items: &'a [T],
        }

        #[derive(Serialize)]
        struct ToolInfo<'a> {
            name: &'a str,
            version: &'a str,
        }

        let output = JsonOutput {
            tool: ToolInfo {
                name: &self.tool_name,
                version: &self.tool_version,
            },
            generated_at: Utc::now(),
            kind,
            total: items.len(),
            items,
        };

        Ok(serde_json::to_string_pretty(&output)?)
    }
}

fn format_csv<const N: usize>(
    header: [&str; N],
    rows: impl Iterator<Item = [String; N]>,
) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    let data = wtr.into_inner().map_err(|e| format!("CSV writer error: {}", e))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits() -> Vec<Hit> {
        vec![Hit {
            file: PathBuf::from("a.txt"),
            line: 3,
            start: 10,
            end: 13,
            text: "foo".to_string(),
        }]
    }

    #[test]
    fn test_text_hits() {
        let mut out = Vec::new();
        OutputFormatter::new(OutputFormat::Text).write_hits(&mut out, &hits()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a.txt:3: foo\n");
    }

    #[test]
    fn test_json_edits() {
        let edits = vec![Edit {
            file: PathBuf::from("a.txt"),
            rule: 0,
            start: 0,
            end: 1,
            replacement: "b".to_string(),
        }];
        let mut out = Vec::new();
        OutputFormatter::new(OutputFormat::Json).write_edits(&mut out, &edits).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["tool"]["name"], "rerep");
        assert_eq!(value["kind"], "edits");
        assert_eq!(value["total"], 1);
        assert_eq!(value["items"][0]["replacement"], "b");
    }

    #[test]
    fn test_csv_hits() {
        let mut out = Vec::new();
        OutputFormatter::new(OutputFormat::from("CSV")).write_hits(&mut out, &hits()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("File,Line,Start,End,Text"));
        assert_eq!(lines.next(), Some("a.txt,3,10,13,foo"));
    }
}
