use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DatapipeError;

/// Minimal nbformat v4 document: ordered code cells with captured outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    pub metadata: serde_json::Value,
    pub nbformat: u32,
    pub nbformat_minor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: String,
    pub execution_count: Option<u32>,
    pub metadata: serde_json::Value,
    pub outputs: Vec<CellOutput>,
    pub source: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum CellOutput {
    Stream {
        name: String,
        text: Vec<String>,
    },
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

impl Notebook {
    pub fn from_sources(sources: Vec<String>) -> Self {
        let cells = sources
            .into_iter()
            .map(|source| Cell {
                cell_type: "code".to_string(),
                execution_count: None,
                metadata: serde_json::json!({}),
                outputs: Vec::new(),
                source: split_lines(&source),
            })
            .collect();
        Self {
            cells,
            metadata: serde_json::json!({
                "kernelspec": {
                    "display_name": "Python 3",
                    "language": "python",
                    "name": "python3"
                },
                "language_info": { "name": "python" }
            }),
            nbformat: 4,
            nbformat_minor: 5,
        }
    }

    /// Concatenated source of each cell, in file order.
    pub fn cell_sources(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|cell| cell.source.concat())
            .collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, DatapipeError> {
        serde_json::to_vec_pretty(self).map_err(|err| DatapipeError::Filesystem(err.to_string()))
    }
}

/// Segments a percent-format script (`# %%` markers) into cell sources.
/// Content before the first marker is a cell of its own; blank cells are
/// dropped. A script with no non-blank content has nothing to translate.
pub fn parse_script(content: &str) -> Result<Vec<String>, DatapipeError> {
    let marker = Regex::new(r"^#\s*%%").expect("valid cell marker pattern");

    let mut cells = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if marker.is_match(line) {
            push_cell(&mut cells, &mut current);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_cell(&mut cells, &mut current);

    if cells.is_empty() {
        return Err(DatapipeError::Conversion(
            "script has no translatable content".to_string(),
        ));
    }
    Ok(cells)
}

fn push_cell(cells: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        cells.push(format!("{trimmed}\n"));
    }
    current.clear();
}

fn split_lines(source: &str) -> Vec<String> {
    // ipynb convention: each source line carries its own trailing newline.
    source
        .split_inclusive('\n')
        .map(|line| line.to_string())
        .collect()
}

/// Renders an executed notebook as one self-contained HTML document.
pub fn render_html(notebook: &Notebook, title: &str) -> String {
    let mut body = String::new();
    for cell in &notebook.cells {
        body.push_str("<div class=\"cell\">\n");
        body.push_str("<pre class=\"source\">");
        body.push_str(&escape_html(&cell.source.concat()));
        body.push_str("</pre>\n");
        for output in &cell.outputs {
            match output {
                CellOutput::Stream { name, text } => {
                    body.push_str(&format!("<pre class=\"output {name}\">"));
                    body.push_str(&escape_html(&text.concat()));
                    body.push_str("</pre>\n");
                }
                CellOutput::Error {
                    ename,
                    evalue,
                    traceback,
                } => {
                    body.push_str("<pre class=\"error\">");
                    body.push_str(&escape_html(&format!("{ename}: {evalue}\n")));
                    body.push_str(&escape_html(&traceback.concat()));
                    body.push_str("</pre>\n");
                }
            }
        }
        body.push_str("</div>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; max-width: 60em; margin: 2em auto; }}\n\
         pre {{ padding: 0.6em; overflow-x: auto; }}\n\
         .source {{ background: #f4f4f4; border-left: 3px solid #888; }}\n\
         .output {{ background: #fbfbfb; }}\n\
         .error {{ background: #fff0f0; border-left: 3px solid #c00; }}\n\
         </style>\n</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape_html(title),
        body = body,
    )
}

/// Renders an executed notebook as a Markdown document, one fenced source
/// block per cell followed by fenced blocks for its captured outputs.
pub fn render_markdown(notebook: &Notebook, title: &str) -> String {
    let mut doc = format!("# {title}\n\n");
    for cell in &notebook.cells {
        doc.push_str("```python\n");
        push_block(&mut doc, &cell.source.concat());
        for output in &cell.outputs {
            match output {
                CellOutput::Stream { text, .. } => {
                    doc.push_str("```\n");
                    push_block(&mut doc, &text.concat());
                }
                CellOutput::Error {
                    ename,
                    evalue,
                    traceback,
                } => {
                    doc.push_str("```\n");
                    doc.push_str(&format!("{ename}: {evalue}\n"));
                    push_block(&mut doc, &traceback.concat());
                }
            }
        }
    }
    doc
}

fn push_block(doc: &mut String, content: &str) {
    doc.push_str(content);
    if !content.ends_with('\n') && !content.is_empty() {
        doc.push('\n');
    }
    doc.push_str("```\n\n");
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
