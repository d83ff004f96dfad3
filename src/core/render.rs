//! Renderer module
//!
//! Renders ResultSet to different output formats: jsonl, json, md

use crate::core::model::{Kind, ResultItem, ResultSet};
use std::io::Write;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            pretty: false,
        }
    }

    /// Create a new render config with pretty option
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Renderer for result sets
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            config: RenderConfig::new(format),
        }
    }

    /// Create a new renderer with render config
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a result set to a string
    pub fn render(&self, result_set: &ResultSet) -> String {
        match self.config.format {
            OutputFormat::Jsonl => self.render_jsonl(result_set),
            OutputFormat::Json => self.render_json(result_set),
            OutputFormat::Markdown => self.render_markdown(result_set),
        }
    }

    /// Render to a writer
    pub fn render_to<W: Write>(
        &self,
        result_set: &ResultSet,
        mut writer: W,
    ) -> std::io::Result<()> {
        let output = self.render(result_set);
        writer.write_all(output.as_bytes())
    }

    /// Print to stdout, skipping empty output
    pub fn print(&self, result_set: &ResultSet) {
        let output = self.render(result_set);
        if !output.is_empty() {
            println!("{}", output);
        }
    }

    /// Render as JSON Lines (one JSON object per line)
    fn render_jsonl(&self, result_set: &ResultSet) -> String {
        result_set
            .items
            .iter()
            .filter_map(|item| {
                if self.config.pretty {
                    serde_json::to_string_pretty(item).ok()
                } else {
                    serde_json::to_string(item).ok()
                }
            })
            .collect::<Vec<_>>()
            .join(if self.config.pretty { "\n\n" } else { "\n" })
    }

    /// Render as a single JSON array
    fn render_json(&self, result_set: &ResultSet) -> String {
        if self.config.pretty {
            serde_json::to_string_pretty(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        } else {
            serde_json::to_string(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        }
    }

    /// Render as Markdown
    fn render_markdown(&self, result_set: &ResultSet) -> String {
        let mut output = String::new();

        let section = |kind: Kind| -> Vec<&ResultItem> {
            result_set.items.iter().filter(|i| i.kind == kind).collect()
        };

        let errors = section(Kind::Error);
        if !errors.is_empty() {
            output.push_str("## Errors\n\n");
            for item in errors {
                for error in &item.errors {
                    output.push_str(&format!("- **{}**: {}\n", error.code, error.message));
                }
            }
            output.push('\n');
        }

        for (kind, title) in [
            (Kind::File, "Files"),
            (Kind::Dir, "Directories"),
            (Kind::Resolution, "Resolutions"),
            (Kind::Entry, "Cache Entries"),
            (Kind::Compile, "Compiled"),
        ] {
            let items = section(kind);
            if items.is_empty() {
                continue;
            }
            output.push_str(&format!("## {}\n\n", title));
            for item in items {
                self.render_item_md(&mut output, item);
            }
            output.push('\n');
        }

        output
    }

    fn render_item_md(&self, output: &mut String, item: &ResultItem) {
        output.push_str("- ");
        if let Some(name) = &item.name {
            output.push_str(&format!("`{}` ", name));
        }
        if let Some(status) = &item.status {
            output.push_str(&format!("**{}** ", status));
        }
        if let Some(path) = &item.path {
            output.push_str(&format!("`{}`", path));
        }
        if let Some(size) = item.meta.size {
            output.push_str(&format!(" ({} bytes)", size));
        }
        output.push('\n');

        for error in &item.errors {
            output.push_str(&format!("  - {}: {}\n", error.code, error.message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ItemError, ResultItem};

    #[test]
    fn test_render_jsonl() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::file("lib/a.rb"));
        result_set.push(ResultItem::file("lib/b.rb"));

        let renderer = Renderer::new(OutputFormat::Jsonl);
        let output = renderer.render(&result_set);

        assert!(output.contains("lib/a.rb"));
        assert!(output.contains("lib/b.rb"));
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn test_render_json() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::file("lib/a.rb"));

        let renderer = Renderer::new(OutputFormat::Json);
        let output = renderer.render(&result_set);

        assert!(output.starts_with('['));
        assert!(output.ends_with(']'));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!(
            "MARKDOWN".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        let result = "raw".parse::<OutputFormat>();
        assert!(result.unwrap_err().contains("Unknown format"));
    }

    #[test]
    fn test_render_config_default() {
        let config = RenderConfig::default();
        assert_eq!(config.format, OutputFormat::Jsonl);
        assert!(!config.pretty);
    }

    #[test]
    fn test_render_json_pretty() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::file("lib/a.rb"));

        let renderer = Renderer::with_config(RenderConfig::with_pretty(OutputFormat::Json, true));
        let output = renderer.render(&result_set);
        assert!(output.contains("  "));
    }

    #[test]
    fn test_render_markdown_empty() {
        let renderer = Renderer::new(OutputFormat::Markdown);
        assert!(renderer.render(&ResultSet::new()).is_empty());
    }

    #[test]
    fn test_render_markdown_sections() {
        let mut result_set = ResultSet::new();
        let mut item = ResultItem::file("lib/a.rb");
        item.meta.size = Some(1024);
        result_set.push(item);
        result_set.push(ResultItem::dir("lib/sub"));
        result_set.push(ResultItem::resolution("a", "found").with_path("/x/lib/a.rb"));

        let renderer = Renderer::new(OutputFormat::Markdown);
        let output = renderer.render(&result_set);

        assert!(output.contains("## Files"));
        assert!(output.contains("`lib/a.rb` (1024 bytes)"));
        assert!(output.contains("## Directories"));
        assert!(output.contains("## Resolutions"));
        assert!(output.contains("**found**"));
    }

    #[test]
    fn test_render_markdown_errors() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::error(ItemError::new("NOT_FOUND", "missing")));

        let output = Renderer::new(OutputFormat::Markdown).render(&result_set);
        assert!(output.contains("## Errors"));
        assert!(output.contains("NOT_FOUND"));
    }

    #[test]
    fn test_render_to_writer() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::file("a.rb"));

        let mut buffer = Vec::new();
        Renderer::new(OutputFormat::Json)
            .render_to(&result_set, &mut buffer)
            .unwrap();
        assert!(String::from_utf8(buffer).unwrap().contains("a.rb"));
    }
}
