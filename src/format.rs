//! Prompt formatting for assembled file context

use serde::{Deserialize, Serialize};

use crate::budget::{SkippedFile, TokenBudget};

/// One accepted file, with its body as it will be sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSection {
    pub path: String,
    pub content: String,
    pub tokens: usize,
}

/// Build-once value handed to an LLM client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledContext {
    pub project_context: Option<String>,
    pub file_sections: Vec<FileSection>,
    pub task_prompt: String,
    pub budget: TokenBudget,
    pub skipped: Vec<SkippedFile>,
}

impl AssembledContext {
    /// Render with the default formatter
    pub fn render(&self) -> String {
        ContextFormatter.format(
            self.project_context.as_deref(),
            &self.file_sections,
            &self.task_prompt,
        )
    }
}

/// Concatenates project context, files and the task prompt.
///
/// Blocks appear in a fixed order with the task last. Empty blocks are
/// omitted. Content is not escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFormatter;

impl ContextFormatter {
    pub fn format(
        &self,
        project_context: Option<&str>,
        file_sections: &[FileSection],
        task_prompt: &str,
    ) -> String {
        let mut blocks = Vec::new();

        if let Some(context) = project_context.filter(|c| !c.trim().is_empty()) {
            blocks.push(format!("## Project Context\n\n{}", context.trim_end()));
        }

        if !file_sections.is_empty() {
            let mut files = String::from("## Files");
            for section in file_sections {
                files.push_str(&format!(
                    "\n\n### File: {}\n```\n{}\n```",
                    section.path,
                    section.content.trim_end_matches('\n')
                ));
            }
            blocks.push(files);
        }

        if !task_prompt.trim().is_empty() {
            blocks.push(format!("## Task\n\n{}", task_prompt.trim_end()));
        }

        blocks.join("\n\n")
    }
}

/// Prefix every line with its right-aligned 1-based number
pub fn number_lines(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = text.lines().collect();
    let width = lines.len().to_string().len();
    let mut numbered = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {}", i + 1, line, width = width))
        .collect::<Vec<_>>()
        .join("\n");

    if text.ends_with('\n') {
        numbered.push('\n');
    }
    numbered
}
