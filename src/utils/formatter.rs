use crate::generator::http::HttpGenerator;
use crate::parser::{ParseResult, ParseWarning};
use crate::Result;
use colored::*;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Http,
}

pub struct ResultFormatter {
    format: OutputFormat,
    color: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: true,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn format(&self, result: &ParseResult) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_table(result)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
            OutputFormat::Http => Ok(HttpGenerator::generate(&result.requests)),
        }
    }

    fn format_table(&self, result: &ParseResult) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["#", "Name", "Method", "URL", "Headers", "Body"]);

        for (i, request) in result.requests.iter().enumerate() {
            let body = if request.is_multipart() {
                format!("{} parts", request.multipart_parts.len())
            } else if request.raw_body.is_empty() {
                "-".to_string()
            } else {
                format!("{} bytes", request.raw_body.len())
            };
            table.add_row(vec![
                (i + 1).to_string(),
                request.effective_name().unwrap_or("-").to_string(),
                request.method.clone(),
                request.url.clone(),
                request.headers.len().to_string(),
                body,
            ]);
        }

        let mut output = vec![table.to_string()];
        if !result.warnings.is_empty() {
            output.push(String::new());
            output.push(self.format_warnings(&result.warnings));
        }
        output.join("\n")
    }

    pub fn format_warnings(&self, warnings: &[ParseWarning]) -> String {
        warnings
            .iter()
            .map(|w| {
                let label = if self.color {
                    "warning".yellow().bold().to_string()
                } else {
                    "warning".to_string()
                };
                format!("{label}: {w}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
