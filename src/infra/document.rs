//! Parsed view of the infrastructure file.
//!
//! The document is split into the text before the `services:` key, the
//! services section itself (an ordered list of named blocks), and the text
//! after it. Every line is kept verbatim so an unmodified document renders
//! back byte-for-byte.

/// Top-level key holding the service list.
const SERVICES_KEY: &str = "services:";

/// Indentation used when the document has no services yet.
const DEFAULT_ITEM_INDENT: usize = 2;

/// One entry of the services list, including its leading comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBlock {
    name: Option<String>,
    lines: Vec<String>,
}

impl ServiceBlock {
    /// Returns the service name, if the block declares one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the raw text of the block.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ServicesSection {
    lead: Vec<String>,
    blocks: Vec<ServiceBlock>,
    tail: Vec<String>,
    item_indent: Option<usize>,
}

/// Infrastructure document as an ordered list of named service blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfraDocument {
    head: Vec<String>,
    section: Option<ServicesSection>,
    rest: Vec<String>,
}

impl InfraDocument {
    /// Parses document text. Parsing never fails; unrecognized content is
    /// carried through untouched.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();

        let Some(header) = lines.iter().position(|l| is_services_header(l)) else {
            return Self {
                head: lines,
                section: None,
                rest: Vec::new(),
            };
        };

        let mut section = ServicesSection::default();
        let mut pending: Vec<String> = Vec::new();
        let mut current: Option<ServiceBlock> = None;
        let mut end = lines.len();

        for (idx, line) in lines.iter().enumerate().skip(header + 1) {
            if is_top_level_key(line) {
                end = idx;
                break;
            }
            if is_blank_or_comment(line) {
                pending.push(line.clone());
                continue;
            }

            let indent = indentation(line);
            if is_list_item(line) && section.item_indent.is_none_or(|i| i == indent) {
                section.item_indent = Some(indent);
                if let Some(block) = current.take() {
                    section.blocks.push(block);
                }
                let mut block_lines = std::mem::take(&mut pending);
                block_lines.push(line.clone());
                current = Some(ServiceBlock {
                    name: None,
                    lines: block_lines,
                });
                continue;
            }

            let target = match current.as_mut() {
                Some(block) => &mut block.lines,
                None => &mut section.lead,
            };
            target.append(&mut pending);
            target.push(line.clone());
        }

        if let Some(block) = current {
            section.blocks.push(block);
        }
        section.tail = pending;

        let item_indent = section.item_indent.unwrap_or(DEFAULT_ITEM_INDENT);
        for block in &mut section.blocks {
            block.name = extract_name(&block.lines, item_indent);
        }

        Self {
            head: lines[..=header].to_vec(),
            section: Some(section),
            rest: lines[end..].to_vec(),
        }
    }

    /// Renders the document back to text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.head.concat();
        if let Some(section) = &self.section {
            out.push_str(&section.lead.concat());
            for block in &section.blocks {
                out.push_str(&block.text());
            }
            out.push_str(&section.tail.concat());
        }
        out.push_str(&self.rest.concat());
        out
    }

    /// Returns true if the document has a `services` section.
    #[must_use]
    pub const fn has_services_section(&self) -> bool {
        self.section.is_some()
    }

    /// Indentation of list items in the services section.
    #[must_use]
    pub fn item_indent(&self) -> usize {
        self.section
            .as_ref()
            .and_then(|s| s.item_indent)
            .unwrap_or(DEFAULT_ITEM_INDENT)
    }

    /// Returns the names of all services, in document order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.section
            .iter()
            .flat_map(|s| s.blocks.iter())
            .filter_map(ServiceBlock::name)
            .collect()
    }

    /// Returns true if a service with exactly this name exists.
    #[must_use]
    pub fn contains_service(&self, name: &str) -> bool {
        self.service_names().contains(&name)
    }

    /// Appends a block at the end of the services section, creating the
    /// section if the document has none.
    ///
    /// A block that already carries the same name is replaced in place, and
    /// the old block is returned.
    pub fn insert_service(&mut self, name: &str, lines: Vec<String>) -> Option<ServiceBlock> {
        if let Some(section) = self.section.as_mut()
            && let Some(existing) = section.blocks.iter_mut().find(|b| b.name() == Some(name))
        {
            let previous = std::mem::replace(&mut existing.lines, lines);
            return Some(ServiceBlock {
                name: Some(name.to_string()),
                lines: previous,
            });
        }

        if self.section.is_none() {
            ensure_trailing_newline(&mut self.head);
            self.head.push(format!("{SERVICES_KEY}\n"));
            self.section = Some(ServicesSection {
                item_indent: Some(DEFAULT_ITEM_INDENT),
                ..ServicesSection::default()
            });
        }

        let section = self.section.get_or_insert_with(ServicesSection::default);
        if section.item_indent.is_none() {
            section.item_indent = Some(DEFAULT_ITEM_INDENT);
        }

        let previous = match section.blocks.last_mut() {
            Some(block) => &mut block.lines,
            None if !section.lead.is_empty() => &mut section.lead,
            None => &mut self.head,
        };
        if section.tail.is_empty() && self.rest.is_empty() {
            ensure_trailing_newline(previous);
        }

        section.blocks.push(ServiceBlock {
            name: Some(name.to_string()),
            lines,
        });
        None
    }

    /// Removes the named service block, matching the name exactly.
    pub fn remove_service(&mut self, name: &str) -> Option<ServiceBlock> {
        let section = self.section.as_mut()?;
        let idx = section.blocks.iter().position(|b| b.name() == Some(name))?;
        Some(section.blocks.remove(idx))
    }
}

fn ensure_trailing_newline(lines: &mut [String]) {
    if let Some(last) = lines.last_mut()
        && !last.ends_with('\n')
    {
        last.push('\n');
    }
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == "-" || trimmed.starts_with("- ")
}

fn is_services_header(line: &str) -> bool {
    indentation(line) == 0 && line.trim_end() == SERVICES_KEY
}

fn is_top_level_key(line: &str) -> bool {
    !is_blank_or_comment(line) && indentation(line) == 0 && !line.starts_with('-')
}

/// Finds the `name:` key belonging to the list item itself, ignoring keys of
/// nested mappings.
fn extract_name(lines: &[String], item_indent: usize) -> Option<String> {
    let mut body = lines.iter().skip_while(|l| is_blank_or_comment(l));
    let first = body.next()?;

    let item = first.trim_start().trim_start_matches('-').trim_start();
    if let Some(value) = item.strip_prefix("name:") {
        return Some(unquote(value));
    }

    body.filter(|l| !is_blank_or_comment(l) && indentation(l) == item_indent + 2)
        .find_map(|l| l.trim().strip_prefix("name:").map(unquote))
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let value = value
        .split_once(" #")
        .map_or(value, |(v, _)| v.trim_end());
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
        .to_string()
}
