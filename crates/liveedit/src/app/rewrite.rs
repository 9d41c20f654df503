//! Span-based source rewriting.
//!
//! Mutations of a parsed tree are recorded as byte-span edits against the
//! text it was parsed from. Finishing the rewrite copies every byte outside
//! an edit verbatim, so untouched formatting is reproduced exactly.

use std::ops::Range;

use crate::infra::sourcemap::{LineColumn, PositionMap};

#[derive(Debug, Clone)]
struct Edit {
    range: Range<usize>,
    text: String,
}

/// Output of [`Rewriter::finish`].
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub code: String,
    pub map: PositionMap,
}

/// Collects non-overlapping edits against one source text.
#[derive(Debug)]
pub struct Rewriter<'s> {
    source: &'s str,
    edits: Vec<Edit>,
}

impl<'s> Rewriter<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        self.replace(offset..offset, text);
    }

    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.edits.push(Edit {
            range,
            text: text.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all edits in source order.
    ///
    /// Edits at the same offset keep the order they were recorded in.
    pub fn finish(mut self) -> Rewritten {
        self.edits.sort_by_key(|edit| edit.range.start);

        let added: usize = self.edits.iter().map(|edit| edit.text.len()).sum();
        let mut code = String::with_capacity(self.source.len() + added);
        let mut map = PositionMap::new();
        let mut generated = LineColumn::default();
        let mut original = LineColumn::default();
        let mut cursor = 0;

        for edit in &self.edits {
            debug_assert!(edit.range.start >= cursor, "overlapping edits");
            let start = edit.range.start.clamp(cursor, self.source.len());
            let end = edit.range.end.clamp(start, self.source.len());

            copy_unchanged(
                &self.source[cursor..start],
                &mut code,
                &mut map,
                &mut generated,
                &mut original,
            );

            let anchor = original;
            for piece in edit.text.split_inclusive('\n') {
                map.push(generated, anchor);
                generated.advance(piece);
            }
            code.push_str(&edit.text);
            original.advance(&self.source[start..end]);
            cursor = end;
        }

        copy_unchanged(
            &self.source[cursor..],
            &mut code,
            &mut map,
            &mut generated,
            &mut original,
        );

        Rewritten { code, map }
    }
}

fn copy_unchanged(
    chunk: &str,
    code: &mut String,
    map: &mut PositionMap,
    generated: &mut LineColumn,
    original: &mut LineColumn,
) {
    for piece in chunk.split_inclusive('\n') {
        map.push(*generated, *original);
        generated.advance(piece);
        original.advance(piece);
    }
    code.push_str(chunk);
}
