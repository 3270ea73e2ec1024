//! Splitting the context into named sections and merging it back.
//!
//! Header lines (`World Lore:`, `Story Summary:`, `Memories:`,
//! `Recent Story:`) start a section. An inline `[Author's note: …]` becomes
//! its own section, and the trailing `> ` lines of the story become the
//! `User Input` section. Merging writes sections back in canonical order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::directives::AUTHORS_NOTE_PREFIX;
use crate::text::collapse_blank_lines;

const USER_PREFIX: &str = "> ";

/// A named region of the context, in canonical merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionKind {
    /// Text before the first header.
    Preamble,
    WorldLore,
    StorySummary,
    Memories,
    RecentStory,
    AuthorsNote,
    UserInput,
}

impl SectionKind {
    pub const HEADED: [SectionKind; 4] = [
        SectionKind::WorldLore,
        SectionKind::StorySummary,
        SectionKind::Memories,
        SectionKind::RecentStory,
    ];

    /// Header line that opens this section, if it has one.
    pub fn header(&self) -> Option<&'static str> {
        match self {
            SectionKind::WorldLore => Some("World Lore:"),
            SectionKind::StorySummary => Some("Story Summary:"),
            SectionKind::Memories => Some("Memories:"),
            SectionKind::RecentStory => Some("Recent Story:"),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Preamble => "Preamble",
            SectionKind::WorldLore => "World Lore",
            SectionKind::StorySummary => "Story Summary",
            SectionKind::Memories => "Memories",
            SectionKind::RecentStory => "Recent Story",
            SectionKind::AuthorsNote => "Author's note",
            SectionKind::UserInput => "User Input",
        }
    }

    fn from_header(line: &str) -> Option<Self> {
        let line = line.trim();
        SectionKind::HEADED
            .into_iter()
            .find(|kind| kind.header().is_some_and(|h| h.eq_ignore_ascii_case(line)))
    }
}

impl FromStr for SectionKind {
    type Err = String;

    /// Accepts display names case-insensitively; brackets and a trailing
    /// colon are ignored, so `[Author's note]` and `World Lore:` both work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim_end_matches(':')
            .trim();
        [
            SectionKind::Preamble,
            SectionKind::WorldLore,
            SectionKind::StorySummary,
            SectionKind::Memories,
            SectionKind::RecentStory,
            SectionKind::AuthorsNote,
            SectionKind::UserInput,
        ]
        .into_iter()
        .find(|kind| kind.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Section map of one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    parts: BTreeMap<SectionKind, String>,
}

impl Sections {
    /// Split context text into sections.
    pub fn split(text: &str) -> Self {
        let mut lines: BTreeMap<SectionKind, Vec<String>> = BTreeMap::new();
        let mut note: Vec<String> = Vec::new();
        let mut has_note = false;
        let mut note_depth = 0usize;
        let mut current = SectionKind::Preamble;
        lines.insert(SectionKind::Preamble, Vec::new());

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);

            if note_depth > 0 {
                match close_bracket(line, &mut note_depth) {
                    Some(end) => {
                        note.push(line[..end].to_string());
                        push_nonblank(&mut lines, current, &line[end + 1..]);
                    }
                    None => note.push(line.to_string()),
                }
                continue;
            }

            if let Some(kind) = SectionKind::from_header(line) {
                current = kind;
                lines.entry(kind).or_default();
                continue;
            }

            if let Some(start) = line.find(AUTHORS_NOTE_PREFIX) {
                has_note = true;
                push_nonblank(&mut lines, current, line[..start].trim_end());
                let after = &line[start + AUTHORS_NOTE_PREFIX.len()..];
                note_depth = 1;
                match close_bracket(after, &mut note_depth) {
                    Some(end) => {
                        note.push(after[..end].to_string());
                        push_nonblank(&mut lines, current, &after[end + 1..]);
                    }
                    None => note.push(after.to_string()),
                }
                continue;
            }

            lines.entry(current).or_default().push(line.to_string());
        }

        let story = if lines.contains_key(&SectionKind::RecentStory) {
            SectionKind::RecentStory
        } else {
            SectionKind::Preamble
        };
        let user_input = lines
            .get_mut(&story)
            .map(peel_user_input)
            .unwrap_or_default();

        let mut parts: BTreeMap<SectionKind, String> = lines
            .into_iter()
            .map(|(kind, body)| (kind, body.join("\n").trim_end().to_string()))
            .collect();
        if has_note {
            parts.insert(SectionKind::AuthorsNote, note.join("\n").trim().to_string());
        }
        if !user_input.is_empty() {
            parts.insert(SectionKind::UserInput, user_input.join("\n"));
        }

        Self { parts }
    }

    pub fn get(&self, kind: SectionKind) -> Option<&str> {
        self.parts.get(&kind).map(String::as_str)
    }

    /// Replace the body of a section that is present. Returns false otherwise.
    pub fn set(&mut self, kind: SectionKind, body: impl Into<String>) -> bool {
        match self.parts.get_mut(&kind) {
            Some(part) => {
                *part = body.into();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, kind: SectionKind) -> bool {
        self.parts.contains_key(&kind)
    }

    /// Present sections in canonical order.
    pub fn kinds(&self) -> impl Iterator<Item = SectionKind> + '_ {
        self.parts.keys().copied()
    }

    /// Reassemble the context in canonical order.
    pub fn merge(&self) -> String {
        let mut blocks: Vec<String> = Vec::new();
        for (kind, body) in &self.parts {
            match kind {
                SectionKind::Preamble => {
                    if !body.trim().is_empty() {
                        blocks.push(body.trim_end().to_string());
                    }
                }
                SectionKind::AuthorsNote => {
                    blocks.push(format!("{} {}]", AUTHORS_NOTE_PREFIX, body.trim()));
                }
                SectionKind::UserInput => {
                    let prefixed: Vec<String> = body
                        .lines()
                        .map(|line| format!("{}{}", USER_PREFIX, line))
                        .collect();
                    blocks.push(prefixed.join("\n"));
                }
                headed => {
                    let header = headed.header().unwrap_or_default();
                    if body.trim().is_empty() {
                        blocks.push(header.to_string());
                    } else {
                        blocks.push(format!("{}\n{}", header, body.trim_end()));
                    }
                }
            }
        }
        collapse_blank_lines(&blocks.join("\n")).trim_end().to_string()
    }
}

/// Scan for the `]` that brings `depth` to zero.
fn close_bracket(text: &str, depth: &mut usize) -> Option<usize> {
    for (i, c) in text.char_indices() {
        match c {
            '[' => *depth += 1,
            ']' => {
                *depth -= 1;
                if *depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn push_nonblank(lines: &mut BTreeMap<SectionKind, Vec<String>>, kind: SectionKind, text: &str) {
    if !text.trim().is_empty() {
        lines.entry(kind).or_default().push(text.trim().to_string());
    }
}

/// Remove the trailing `> ` lines of a section, returning them without the prefix.
fn peel_user_input(lines: &mut Vec<String>) -> Vec<String> {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let start = lines
        .iter()
        .rposition(|l| !l.starts_with(USER_PREFIX))
        .map_or(0, |i| i + 1);
    lines
        .split_off(start)
        .into_iter()
        .map(|l| l[USER_PREFIX.len()..].to_string())
        .collect()
}

/// Put the body of every complete `[Author's note: …]` on its own lines.
///
/// Brackets nested inside the note are balanced before the closing one.
pub fn normalize_authors_note(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(AUTHORS_NOTE_PREFIX) {
        let Some(close) = crate::text::matching_close(rest, start) else {
            break;
        };
        let body = rest[start + AUTHORS_NOTE_PREFIX.len()..close].trim();
        out.push_str(&rest[..start]);
        out.push_str(AUTHORS_NOTE_PREFIX);
        out.push('\n');
        out.push_str(body);
        out.push_str("\n]");
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}
