//! Position maps and their Source Map v3 encoding.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const VLQ_SHIFT: u32 = 5;
const VLQ_MASK: i64 = (1 << VLQ_SHIFT) - 1;
const VLQ_CONTINUATION: i64 = 1 << VLQ_SHIFT;

/// 0-based line and UTF-16 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct LineColumn {
    pub line: u32,
    pub column: u32,
}

impl LineColumn {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Move past `text`.
    pub fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf16() as u32;
            }
        }
    }
}

/// A generated position and the original position it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated: LineColumn,
    pub original: LineColumn,
}

/// Mappings from rewritten output back to the original source, ordered by
/// generated position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    mappings: Vec<Mapping>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, generated: LineColumn, original: LineColumn) {
        if self
            .mappings
            .last()
            .is_some_and(|last| last.generated == generated)
        {
            return;
        }
        self.mappings.push(Mapping {
            generated,
            original,
        });
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Original position for a generated one, using the closest preceding
    /// mapping on the same line.
    pub fn original_position(&self, generated: LineColumn) -> Option<LineColumn> {
        let index = self
            .mappings
            .partition_point(|mapping| mapping.generated <= generated);
        let mapping = self.mappings.get(index.checked_sub(1)?)?;
        if mapping.generated.line != generated.line {
            return None;
        }
        let offset = generated.column - mapping.generated.column;
        Some(LineColumn::new(
            mapping.original.line,
            mapping.original.column + offset,
        ))
    }

    /// Base64 VLQ `mappings` field for a single-source map.
    pub fn encode_mappings(&self) -> String {
        let mut out = String::new();
        let mut line = 0;
        let mut previous_column = 0i64;
        let mut previous_original = LineColumn::default();
        let mut first_in_line = true;

        for mapping in &self.mappings {
            while line < mapping.generated.line {
                out.push(';');
                line += 1;
                previous_column = 0;
                first_in_line = true;
            }
            if !first_in_line {
                out.push(',');
            }
            first_in_line = false;

            let column = i64::from(mapping.generated.column);
            encode_vlq(&mut out, column - previous_column);
            encode_vlq(&mut out, 0);
            encode_vlq(
                &mut out,
                i64::from(mapping.original.line) - i64::from(previous_original.line),
            );
            encode_vlq(
                &mut out,
                i64::from(mapping.original.column) - i64::from(previous_original.column),
            );
            previous_column = column;
            previous_original = mapping.original;
        }
        out
    }
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & VLQ_MASK;
        vlq >>= VLQ_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Source Map revision 3 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(default)]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn from_position_map(
        map: &PositionMap,
        source_name: &str,
        source_content: Option<&str>,
    ) -> Self {
        Self {
            version: 3,
            file: Some(source_name.to_owned()),
            sources: vec![source_name.to_owned()],
            sources_content: vec![source_content.map(str::to_owned)],
            names: Vec::new(),
            mappings: map.encode_mappings(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize source map")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlq_matches_reference_values() {
        let encode = |value| {
            let mut out = String::new();
            encode_vlq(&mut out, value);
            out
        };
        assert_eq!(encode(0), "A");
        assert_eq!(encode(1), "C");
        assert_eq!(encode(-1), "D");
        assert_eq!(encode(15), "e");
        assert_eq!(encode(16), "gB");
        assert_eq!(encode(-17), "jB");
    }

    #[test]
    fn encodes_lines_and_segments() {
        let mut map = PositionMap::new();
        map.push(LineColumn::new(0, 0), LineColumn::new(0, 0));
        map.push(LineColumn::new(0, 10), LineColumn::new(0, 5));
        map.push(LineColumn::new(2, 0), LineColumn::new(2, 0));
        assert_eq!(map.encode_mappings(), "AAAA,UAAK;;AAEL");
    }

    #[test]
    fn resolves_original_positions() {
        let mut map = PositionMap::new();
        map.push(LineColumn::new(0, 0), LineColumn::new(0, 0));
        map.push(LineColumn::new(0, 8), LineColumn::new(0, 3));
        assert_eq!(
            map.original_position(LineColumn::new(0, 2)),
            Some(LineColumn::new(0, 2))
        );
        assert_eq!(
            map.original_position(LineColumn::new(0, 9)),
            Some(LineColumn::new(0, 4))
        );
        assert_eq!(map.original_position(LineColumn::new(1, 0)), None);
    }

    #[test]
    fn serializes_v3_document() -> Result<()> {
        let mut map = PositionMap::new();
        map.push(LineColumn::new(0, 0), LineColumn::new(0, 0));
        let json = SourceMap::from_position_map(&map, "a.tsx", Some("<p/>")).to_json()?;
        let value: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(value["version"], 3);
        assert_eq!(value["sources"][0], "a.tsx");
        assert_eq!(value["sourcesContent"][0], "<p/>");
        assert_eq!(value["mappings"], "AAAA");
        Ok(())
    }
}
