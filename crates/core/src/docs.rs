//! XML documentation files.
//!
//! A [`DocumentationIndex`] is built once per assembly and then only read.
//! Keys are the `<member name="...">` strings exactly as the compiler wrote
//! them; callers look them up with a formatted
//! [`CanonicalMemberId`](crate::CanonicalMemberId).

use crate::error::DocError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Documentation attached to one member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentationEntry {
    pub summary: Option<String>,
    pub params: BTreeMap<String, String>,
    pub returns: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentationIndex {
    entries: HashMap<String, DocumentationEntry>,
}

impl DocumentationIndex {
    pub fn load(path: &Path) -> Result<Self, DocError> {
        let xml = std::fs::read_to_string(path).map_err(|source| DocError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&xml)
    }

    /// The documentation file conventionally shipped next to a binary.
    pub fn path_for_binary(binary: &Path) -> PathBuf {
        binary.with_extension("xml")
    }

    /// Load the documentation next to `binary`. A missing file gives an
    /// empty index (debug log); an unreadable or malformed one also gives an
    /// empty index, with a warning.
    pub fn for_binary(binary: &Path) -> Self {
        let path = Self::path_for_binary(binary);
        if !path.is_file() {
            tracing::debug!(binary = %binary.display(), "no documentation file");
            return Self::default();
        }
        match Self::load(&path) {
            Ok(index) => {
                tracing::debug!(path = %path.display(), entries = index.len(), "loaded documentation");
                index
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable documentation");
                Self::default()
            }
        }
    }

    pub fn parse(xml: &str) -> Result<Self, DocError> {
        let mut reader = Reader::from_str(xml);
        let mut entries = HashMap::new();
        let mut member: Option<MemberState> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                DocError::Xml(format!("at byte {}: {}", reader.error_position(), e))
            })?;
            match event {
                Event::Start(e) => {
                    if let Some(state) = member.as_mut() {
                        state.open(&e)?;
                    } else if e.name().as_ref() == b"member" {
                        member = Some(MemberState::new(attr(&e, "name")?.unwrap_or_default()));
                    }
                }
                Event::Empty(e) => {
                    if let Some(state) = member.as_mut() {
                        state.inline(&e)?;
                    }
                }
                Event::Text(t) => {
                    if let Some(state) = member.as_mut() {
                        let text = t.unescape().map_err(|e| DocError::Xml(e.to_string()))?;
                        state.text(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(state) = member.as_mut() {
                        state.text(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(e) => {
                    let closes_member = e.name().as_ref() == b"member"
                        && matches!(&member, Some(state) if state.depth == 0);
                    if closes_member {
                        if let Some(done) = member.take() {
                            // Later duplicates replace earlier ones.
                            entries.insert(done.name, done.entry);
                        }
                    } else if let Some(state) = member.as_mut() {
                        state.close(e.name().as_ref());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(DocumentationIndex { entries })
    }

    pub fn entry(&self, id: &str) -> Option<&DocumentationEntry> {
        self.entries.get(id)
    }

    pub fn summary(&self, id: &str) -> Option<&str> {
        self.entry(id)?.summary.as_deref()
    }

    pub fn params(&self, id: &str) -> Option<&BTreeMap<String, String>> {
        self.entry(id).map(|e| &e.params).filter(|p| !p.is_empty())
    }

    pub fn returns(&self, id: &str) -> Option<&str> {
        self.entry(id)?.returns.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Section {
    Summary,
    Param(String),
    Returns,
    Other,
}

/// Accumulates one `<member>` element.
struct MemberState {
    name: String,
    entry: DocumentationEntry,
    /// Element depth below `<member>`.
    depth: usize,
    section: Option<Section>,
    buffer: String,
}

impl MemberState {
    fn new(name: String) -> Self {
        MemberState {
            name,
            entry: DocumentationEntry::default(),
            depth: 0,
            section: None,
            buffer: String::new(),
        }
    }

    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), DocError> {
        self.depth += 1;
        if self.depth == 1 {
            self.buffer.clear();
            self.section = Some(match e.name().as_ref() {
                b"summary" => Section::Summary,
                b"returns" => Section::Returns,
                b"param" => Section::Param(attr(e, "name")?.unwrap_or_default()),
                _ => Section::Other,
            });
        } else if e.name().as_ref() == b"para" {
            self.buffer.push('\n');
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth > 0 {
            if name == b"para" {
                self.buffer.push('\n');
            }
            return;
        }
        let text = normalize(&self.buffer);
        match self.section.take() {
            Some(Section::Summary) => {
                self.entry.summary = Some(text).filter(|t| !t.is_empty());
            }
            Some(Section::Returns) => {
                self.entry.returns = Some(text).filter(|t| !t.is_empty());
            }
            Some(Section::Param(param)) if !param.is_empty() => {
                self.entry.params.insert(param, text);
            }
            _ => {}
        }
        self.buffer.clear();
    }

    fn inline(&mut self, e: &BytesStart<'_>) -> Result<(), DocError> {
        if self.depth == 0 {
            return Ok(());
        }
        let word = match e.name().as_ref() {
            b"see" | b"seealso" => match attr(e, "cref")? {
                Some(cref) => Some(strip_cref_prefix(&cref).to_string()),
                None => attr(e, "langword")?,
            },
            b"paramref" | b"typeparamref" => attr(e, "name")?,
            b"para" | b"br" => {
                self.buffer.push('\n');
                None
            }
            _ => None,
        };
        if let Some(word) = word {
            self.buffer.push_str(&word);
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if self.depth > 0 {
            self.buffer.push_str(text);
        }
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, DocError> {
    let attribute = e
        .try_get_attribute(key)
        .map_err(|err| DocError::Xml(err.to_string()))?;
    match attribute {
        Some(a) => {
            let value = a
                .unescape_value()
                .map_err(|err| DocError::Xml(err.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

/// `T:System.String` becomes `System.String`.
fn strip_cref_prefix(cref: &str) -> &str {
    match cref.as_bytes() {
        [kind, b':', ..] if kind.is_ascii_alphabetic() => &cref[2..],
        _ => cref,
    }
}

/// Trim each line, drop blank lines, join with single spaces.
fn normalize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
