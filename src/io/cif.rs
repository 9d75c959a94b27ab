//! Minimal CIF reader shared by the coordinate and chemical-component readers.
//!
//! The reader understands data blocks, `loop_` tables, single-valued items, quoted
//! values, and semicolon-delimited text fields. Single-valued items of one category are
//! gathered into a one-row table so callers query looped and unlooped data the same way.

use crate::io::error::Error;
use std::collections::HashMap;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    line: usize,
    quoted: bool,
}

/// A table of one CIF category.
#[derive(Debug, Clone, Default)]
pub struct CifLoop {
    category: String,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    values: Vec<String>,
}

impl CifLoop {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Default::default()
        }
    }

    fn push_column(&mut self, column: &str) {
        self.column_index
            .insert(column.to_string(), self.columns.len());
        self.columns.push(column.to_string());
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    pub fn row_count(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.values.len() / self.columns.len()
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = CifRow<'_>> {
        self.values
            .chunks(self.columns.len().max(1))
            .map(move |values| CifRow {
                table: self,
                values,
            })
    }
}

/// One row of a [`CifLoop`].
#[derive(Debug, Clone, Copy)]
pub struct CifRow<'a> {
    table: &'a CifLoop,
    values: &'a [String],
}

impl<'a> CifRow<'a> {
    /// Raw value of a column, including the `?` and `.` placeholders.
    pub fn raw(&self, column: &str) -> Option<&'a str> {
        self.table
            .column_index
            .get(column)
            .and_then(|i| self.values.get(*i))
            .map(String::as_str)
    }

    /// Value of a column; unknown (`?`) and inapplicable (`.`) values read as `None`.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.raw(column).filter(|v| *v != "?" && *v != ".")
    }

    /// First present value among several candidate columns.
    pub fn first_of(&self, columns: &[&str]) -> Option<&'a str> {
        columns.iter().find_map(|c| self.get(c))
    }

    pub fn parse_i32(&self, column: &str) -> Option<i32> {
        self.get(column).and_then(|v| v.parse().ok())
    }

    pub fn parse_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(|v| v.parse().ok())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataBlock {
    pub name: String,
    tables: Vec<CifLoop>,
}

impl DataBlock {
    /// Looks up a category by name, with or without the leading underscore.
    pub fn category(&self, name: &str) -> Option<&CifLoop> {
        let name = name.trim_start_matches('_');
        self.tables.iter().find(|t| t.category == name)
    }

    pub fn categories(&self) -> impl Iterator<Item = &CifLoop> {
        self.tables.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CifDocument {
    pub blocks: Vec<DataBlock>,
}

enum ParserState {
    Base,
    InLoopHeader,
    InLoopBody,
    AwaitingValue(String),
}

/// Parses a complete CIF document.
///
/// # Arguments
///
/// * `reader` - Buffered source of CIF text.
/// * `format` - Format label used in error messages (`"mmCIF"`, `"CCD"`).
///
/// # Errors
///
/// Returns [`Error::Parse`] for unterminated quotes or text fields, values outside any
/// data block, and loops whose value count is not a multiple of their column count.
pub fn parse<R: BufRead>(reader: R, format: &'static str) -> Result<CifDocument, Error> {
    let tokens = tokenize(reader, format)?;

    let mut document = CifDocument::default();
    let mut block: Option<DataBlock> = None;
    let mut singles: Vec<(String, String)> = Vec::new();
    let mut current_loop: Option<CifLoop> = None;
    let mut state = ParserState::Base;

    for token in tokens {
        if !token.quoted {
            if let Some(name) = token.text.strip_prefix("data_") {
                close_loop(&mut current_loop, &mut block, format, token.line)?;
                if let Some(done) = block.take() {
                    document.blocks.push(finish_block(done, &mut singles));
                }
                block = Some(DataBlock {
                    name: name.to_string(),
                    tables: Vec::new(),
                });
                state = ParserState::Base;
                continue;
            }
            if token.text == "loop_" {
                close_loop(&mut current_loop, &mut block, format, token.line)?;
                current_loop = None;
                state = ParserState::InLoopHeader;
                continue;
            }
            if token.text == "global_" || token.text.starts_with("save_") {
                continue;
            }
        }

        let is_tag = !token.quoted && token.text.starts_with('_');
        if block.is_none() {
            return Err(Error::parse(
                format,
                None,
                token.line,
                format!("'{}' appears before any data block", token.text),
            ));
        }

        state = match state {
            ParserState::InLoopHeader if is_tag => {
                let (category, column) = split_tag(&token.text);
                let table = current_loop.get_or_insert_with(|| CifLoop::new(category));
                table.push_column(column);
                ParserState::InLoopHeader
            }
            ParserState::InLoopHeader | ParserState::InLoopBody if !is_tag => {
                match current_loop.as_mut() {
                    Some(table) => table.values.push(token.text),
                    None => {
                        return Err(Error::parse(
                            format,
                            None,
                            token.line,
                            "loop_ without column tags",
                        ));
                    }
                }
                ParserState::InLoopBody
            }
            ParserState::AwaitingValue(tag) if !is_tag => {
                singles.push((tag, token.text));
                ParserState::Base
            }
            ParserState::AwaitingValue(tag) => {
                return Err(Error::parse(
                    format,
                    None,
                    token.line,
                    format!("item '{}' has no value", tag),
                ));
            }
            _ if is_tag => {
                close_loop(&mut current_loop, &mut block, format, token.line)?;
                ParserState::AwaitingValue(token.text)
            }
            _ => {
                return Err(Error::parse(
                    format,
                    None,
                    token.line,
                    format!("unexpected value '{}'", token.text),
                ));
            }
        };
    }

    if let ParserState::AwaitingValue(tag) = state {
        return Err(Error::parse(
            format,
            None,
            0,
            format!("item '{}' has no value at end of input", tag),
        ));
    }
    close_loop(&mut current_loop, &mut block, format, 0)?;
    if let Some(done) = block.take() {
        document.blocks.push(finish_block(done, &mut singles));
    }

    Ok(document)
}

fn split_tag(tag: &str) -> (&str, &str) {
    let tag = tag.trim_start_matches('_');
    tag.split_once('.').unwrap_or((tag, ""))
}

fn close_loop(
    current_loop: &mut Option<CifLoop>,
    block: &mut Option<DataBlock>,
    format: &'static str,
    line: usize,
) -> Result<(), Error> {
    if let Some(table) = current_loop.take() {
        if table.values.len() % table.columns.len().max(1) != 0 {
            return Err(Error::parse(
                format,
                None,
                line,
                format!(
                    "loop of '{}' holds {} values for {} columns",
                    table.category,
                    table.values.len(),
                    table.columns.len()
                ),
            ));
        }
        if let Some(block) = block.as_mut() {
            block.tables.push(table);
        }
    }
    Ok(())
}

fn finish_block(mut block: DataBlock, singles: &mut Vec<(String, String)>) -> DataBlock {
    let mut grouped: Vec<CifLoop> = Vec::new();
    for (tag, value) in singles.drain(..) {
        let (category, column) = split_tag(&tag);
        let position = match grouped.iter().position(|t| t.category == category) {
            Some(i) => i,
            None => {
                grouped.push(CifLoop::new(category));
                grouped.len() - 1
            }
        };
        let table = &mut grouped[position];
        if !table.has_column(column) {
            table.push_column(column);
            table.values.push(value);
        }
    }
    block.tables.extend(grouped);
    block
}

fn tokenize<R: BufRead>(reader: R, format: &'static str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut text_field: Option<(String, usize)> = None;
    let mut line_num = 0;

    for line in reader.lines() {
        line_num += 1;
        let line = line.map_err(|e| Error::from_io(e, None))?;

        if let Some((mut text, start)) = text_field.take() {
            if line.starts_with(';') {
                tokens.push(Token {
                    text: text.trim_end_matches('\n').to_string(),
                    line: start,
                    quoted: true,
                });
                tokenize_line(&line[1..], line_num, format, &mut tokens)?;
            } else {
                text.push_str(&line);
                text.push('\n');
                text_field = Some((text, start));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix(';') {
            let mut text = rest.to_string();
            if !text.is_empty() {
                text.push('\n');
            }
            text_field = Some((text, line_num));
            continue;
        }

        tokenize_line(&line, line_num, format, &mut tokens)?;
    }

    if let Some((_, start)) = text_field {
        return Err(Error::parse(format, None, start, "unterminated text field"));
    }
    Ok(tokens)
}

fn tokenize_line(
    line: &str,
    line_num: usize,
    format: &'static str,
    tokens: &mut Vec<Token>,
) -> Result<(), Error> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }

        if c == '\'' || c == '"' {
            // A quote only closes when followed by whitespace or the end of the line.
            let mut j = i + 1;
            loop {
                if j >= chars.len() {
                    return Err(Error::parse(format, None, line_num, "unterminated quoted value"));
                }
                if chars[j] == c && (j + 1 == chars.len() || chars[j + 1].is_whitespace()) {
                    break;
                }
                j += 1;
            }
            tokens.push(Token {
                text: chars[i + 1..j].iter().collect(),
                line: line_num,
                quoted: true,
            });
            i = j + 1;
            continue;
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        tokens.push(Token {
            text: chars[start..i].iter().collect(),
            line: line_num,
            quoted: false,
        });
    }
    Ok(())
}
