use serde::{Deserialize, Serialize};

use super::mapping::StepMap;
use crate::error::ToolError;

/// Half-open `[from, to)` range in document-position coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn caret(pos: usize) -> Self {
        Self { from: pos, to: pos }
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub strike: bool,
    #[serde(default)]
    pub link: Option<String>,
}

/// A text leaf: a run of characters sharing the same marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextRun {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(text: &str, marks: Marks) -> Self {
        Self {
            text: text.to_string(),
            marks,
        }
    }

    /// Length in Unicode scalar values.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
    BulletItem,
    OrderedItem,
    Quote,
    CodeBlock { language: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub runs: Vec<TextRun>,
}

impl Block {
    pub fn new(kind: BlockKind, runs: Vec<TextRun>) -> Self {
        let mut block = Self { kind, runs };
        block.normalize();
        block
    }

    pub fn paragraph(text: &str) -> Self {
        Self::new(BlockKind::Paragraph, vec![TextRun::plain(text)])
    }

    pub fn heading(level: u8, text: &str) -> Self {
        Self::new(BlockKind::Heading { level }, vec![TextRun::plain(text)])
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn text_len(&self) -> usize {
        self.runs.iter().map(TextRun::len).sum()
    }

    /// Opening token + text + closing token.
    pub fn size(&self) -> usize {
        self.text_len() + 2
    }

    /// Marks a character typed at `offset` would inherit.
    pub fn marks_at(&self, offset: usize) -> Marks {
        let mut consumed = 0;
        for run in &self.runs {
            let len = run.len();
            if offset > consumed && offset <= consumed + len {
                return run.marks.clone();
            }
            consumed += len;
        }
        self.runs.first().map(|r| r.marks.clone()).unwrap_or_default()
    }

    pub(crate) fn replace_range(&mut self, from: usize, to: usize, insert: Vec<TextRun>) {
        let (head, rest) = split_runs(&self.runs, from);
        let (_, tail) = split_runs(&rest, to.saturating_sub(from));
        let mut runs = head;
        runs.extend(insert);
        runs.extend(tail);
        self.runs = runs;
        self.normalize();
    }

    fn normalize(&mut self) {
        let mut merged: Vec<TextRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.marks == run.marks => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

/// Split runs at a character offset into (before, after).
fn split_runs(runs: &[TextRun], at: usize) -> (Vec<TextRun>, Vec<TextRun>) {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let mut consumed = 0;

    for run in runs {
        let len = run.len();
        if consumed + len <= at {
            head.push(run.clone());
        } else if consumed >= at {
            tail.push(run.clone());
        } else {
            let byte = run
                .text
                .char_indices()
                .nth(at - consumed)
                .map(|(i, _)| i)
                .unwrap_or(run.text.len());
            head.push(TextRun::with_marks(&run.text[..byte], run.marks.clone()));
            tail.push(TextRun::with_marks(&run.text[byte..], run.marks.clone()));
        }
        consumed += len;
    }

    (head, tail)
}

/// Native rich content ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Inline content spliced into the block at the insertion point.
    Inline(Vec<TextRun>),
    /// Whole blocks; the block at the insertion point is split around them.
    Blocks(Vec<Block>),
}

impl Fragment {
    pub fn text(text: &str) -> Self {
        Fragment::Inline(vec![TextRun::plain(text)])
    }
}

/// A text-bearing leaf and the document position of its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf<'a> {
    pub pos: usize,
    pub text: &'a str,
}

/// Where a document position falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedPos {
    /// Inside the text of `block`, `offset` characters from its start.
    Inline { block: usize, offset: usize },
    /// On the boundary before block `index` (`index == block count` is the document end).
    Between(usize),
}

/// The document system of record: a flat list of blocks.
///
/// Position 0 sits before the first block. Each block occupies an opening token,
/// one position per character, and a closing token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDocument")]
pub struct Document {
    blocks: Vec<Block>,
}

/// Serialized form; goes through `Document::from_blocks` so it is never blockless.
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    blocks: Vec<Block>,
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        Document::from_blocks(
            raw.blocks
                .into_iter()
                .map(|block| Block::new(block.kind, block.runs))
                .collect(),
        )
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::new(BlockKind::Paragraph, Vec::new())],
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::new();
        }
        Self { blocks }
    }

    /// One paragraph per line.
    pub fn from_text(text: &str) -> Self {
        Self::from_blocks(text.lines().map(Block::paragraph).collect())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn size(&self) -> usize {
        self.blocks.iter().map(Block::size).sum()
    }

    /// Concatenated text of every leaf, without block separators.
    pub fn text_content(&self) -> String {
        self.blocks.iter().map(Block::text).collect()
    }

    pub fn leaves(&self) -> Vec<Leaf<'_>> {
        let mut leaves = Vec::new();
        let mut start = 0;
        for block in &self.blocks {
            let mut pos = start + 1;
            for run in &block.runs {
                leaves.push(Leaf {
                    pos,
                    text: run.text.as_str(),
                });
                pos += run.len();
            }
            start += block.size();
        }
        leaves
    }

    pub fn resolve(&self, pos: usize) -> Option<ResolvedPos> {
        let mut start = 0;
        for (index, block) in self.blocks.iter().enumerate() {
            if pos == start {
                return Some(ResolvedPos::Between(index));
            }
            if pos > start && pos <= start + 1 + block.text_len() {
                return Some(ResolvedPos::Inline {
                    block: index,
                    offset: pos - start - 1,
                });
            }
            start += block.size();
        }
        (pos == start).then_some(ResolvedPos::Between(self.blocks.len()))
    }

    /// Text between two positions, with blocks separated by a newline.
    pub fn text_between(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        let mut start = 0;
        let mut wrote_block = false;
        for block in &self.blocks {
            let text_start = start + 1;
            let text_end = text_start + block.text_len();
            let lo = from.max(text_start);
            let hi = to.min(text_end);
            if lo < hi || (lo == hi && from <= text_start && to >= text_end && from < to) {
                if wrote_block {
                    out.push('\n');
                }
                out.extend(block.text().chars().skip(lo - text_start).take(hi - lo));
                wrote_block = true;
            }
            start += block.size();
        }
        out
    }

    fn clamp_start(&self, pos: ResolvedPos) -> (usize, usize) {
        match pos {
            ResolvedPos::Inline { block, offset } => (block, offset),
            ResolvedPos::Between(index) if index < self.blocks.len() => (index, 0),
            ResolvedPos::Between(_) => {
                let last = self.blocks.len() - 1;
                (last, self.blocks[last].text_len())
            }
        }
    }

    fn clamp_end(&self, pos: ResolvedPos) -> (usize, usize) {
        match pos {
            ResolvedPos::Inline { block, offset } => (block, offset),
            ResolvedPos::Between(0) => (0, 0),
            ResolvedPos::Between(index) => (index - 1, self.blocks[index - 1].text_len()),
        }
    }

    /// Replace `[from, to)` with plain text inheriting the marks at `from`.
    pub(crate) fn replace_text(
        &mut self,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<StepMap, ToolError> {
        let size = self.size();
        let out_of_bounds = ToolError::OutOfBounds { from, to, size };
        if to < from || to > size {
            return Err(out_of_bounds);
        }
        let start = self.resolve(from).ok_or(out_of_bounds.clone())?;
        let end = self.resolve(to).ok_or(out_of_bounds)?;

        let (first, first_offset) = self.clamp_start(start);
        let (mut last, mut last_offset) = self.clamp_end(end);
        if (last, last_offset) < (first, first_offset) {
            last = first;
            last_offset = first_offset;
        }

        let marks = self.blocks[first].marks_at(first_offset);
        let mut insert = vec![TextRun::with_marks(text, marks)];

        if first == last {
            self.blocks[first].replace_range(first_offset, last_offset, insert);
        } else {
            let (_, tail) = split_runs(&self.blocks[last].runs, last_offset);
            insert.extend(tail);
            let first_len = self.blocks[first].text_len();
            self.blocks[first].replace_range(first_offset, first_len, insert);
            self.blocks.drain(first + 1..=last);
        }

        let grown = (to - from + self.size()) as isize - size as isize;
        Ok(StepMap::new(from, to - from, grown.max(0) as usize))
    }

    /// Insert rich content at `pos`.
    pub(crate) fn insert_fragment(
        &mut self,
        pos: usize,
        fragment: Fragment,
    ) -> Result<StepMap, ToolError> {
        let size = self.size();
        let resolved = self
            .resolve(pos)
            .ok_or(ToolError::InvalidPosition { position: pos, size })?;

        match (resolved, fragment) {
            (ResolvedPos::Inline { block, offset }, Fragment::Inline(runs)) => {
                self.blocks[block].replace_range(offset, offset, runs);
            }
            (ResolvedPos::Inline { block, offset }, Fragment::Blocks(blocks)) => {
                let original = self.blocks[block].clone();
                let (head, tail) = split_runs(&original.runs, offset);
                let mut replacement = Vec::with_capacity(blocks.len() + 2);
                let head = Block::new(original.kind.clone(), head);
                if head.text_len() > 0 {
                    replacement.push(head);
                }
                replacement.extend(blocks);
                let tail = Block::new(original.kind, tail);
                if tail.text_len() > 0 {
                    replacement.push(tail);
                }
                if replacement.is_empty() {
                    replacement.push(Block::new(BlockKind::Paragraph, Vec::new()));
                }
                self.blocks.splice(block..=block, replacement);
            }
            (ResolvedPos::Between(index), Fragment::Inline(runs)) => {
                self.blocks
                    .insert(index, Block::new(BlockKind::Paragraph, runs));
            }
            (ResolvedPos::Between(index), Fragment::Blocks(blocks)) => {
                self.blocks.splice(index..index, blocks);
            }
        }

        let grown = self.size() as isize - size as isize;
        Ok(StepMap::new(pos, 0, grown.max(0) as usize))
    }
}
