//! CLI Output Formatting.
//!
//! Text output is styled with `console`; JSON output is one document per
//! message so it can be piped into other tools.

use console::{style, Color};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Compact JSON
    Json,
    /// Pretty JSON
    JsonPretty,
}

impl OutputFormat {
    /// Whether output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::JsonPretty)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for CLI
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    /// Output format
    format: OutputFormat,
    /// Color enabled
    color: bool,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Text)
    }
}

impl OutputFormatter {
    /// Create new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: true,
        }
    }

    /// Enable or disable color
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        self.status_line("success", "✓", message, Color::Green);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        if self.format.is_json() {
            eprintln!("{}", self.to_json(&serde_json::json!({ "status": "error", "message": message })));
        } else if self.color {
            eprintln!("{} {}", style("✗").red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        self.status_line("warning", "⚠", message, Color::Yellow);
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        self.status_line("info", "ℹ", message, Color::Blue);
    }

    /// Print structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        if self.format.is_json() {
            println!("{}", self.to_json(data));
        } else if let Ok(json) = serde_json::to_value(data) {
            for line in self.render_text(&json, 0) {
                println!("{}", line);
            }
        }
    }

    /// Print table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.format.is_json() {
            let data: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    headers
                        .iter()
                        .zip(row.iter())
                        .map(|(h, v)| (h.to_string(), serde_json::Value::String(v.clone())))
                        .collect()
                })
                .collect();
            println!("{}", self.to_json(&data));
        } else {
            for line in self.render_table(headers, rows) {
                println!("{}", line);
            }
        }
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        if self.format.is_json() {
            return;
        }
        println!();
        if self.color {
            println!("{}", style(format!("=== {} ===", title)).cyan().bold());
        } else {
            println!("=== {} ===", title);
        }
    }

    fn status_line(&self, status: &str, icon: &str, message: &str, color: Color) {
        if self.format.is_json() {
            println!("{}", self.to_json(&serde_json::json!({ "status": status, "message": message })));
        } else if self.color {
            println!("{} {}", style(icon).fg(color), message);
        } else {
            println!("{}: {}", status.to_uppercase(), message);
        }
    }

    fn key(&self, key: &str) -> String {
        if self.color {
            style(key).bold().to_string()
        } else {
            key.to_string()
        }
    }

    fn to_json<T: Serialize + ?Sized>(&self, data: &T) -> String {
        let result = if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };
        result.unwrap_or_else(|e| format!("{{\"status\":\"error\",\"message\":\"{}\"}}", e))
    }

    /// Render a JSON value as indented `key: value` lines
    pub fn render_text(&self, json: &serde_json::Value, indent: usize) -> Vec<String> {
        let prefix = "  ".repeat(indent);
        let mut lines = Vec::new();

        match json {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                            lines.push(format!("{}{}:", prefix, self.key(key)));
                            lines.extend(self.render_text(value, indent + 1));
                        }
                        _ => lines.push(format!("{}{}: {}", prefix, self.key(key), format_value(value))),
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    lines.push(format!("{}[{}]:", prefix, i));
                    lines.extend(self.render_text(item, indent + 1));
                }
            }
            _ => lines.push(format!("{}{}", prefix, format_value(json))),
        }

        lines
    }

    /// Render rows as an aligned text table
    pub fn render_table(&self, headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
        if headers.is_empty() {
            return Vec::new();
        }

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header = pad_row(headers, &widths);
        let mut lines = vec![
            if self.color { style(header).bold().to_string() } else { header },
            widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"),
        ];
        for row in rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            lines.push(pad_row(&cells, &widths));
        }
        lines
    }
}

fn pad_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Format a JSON value for text output
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".into(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}
