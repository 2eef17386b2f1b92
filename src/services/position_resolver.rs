//! Maps a plain target string onto an exact span of the document.
//!
//! Matching runs three strategies in order and the first hit wins:
//!
//! 1. case-insensitive substring search,
//! 2. the same after stripping markdown backslash-escapes and collapsing whitespace,
//!    with every block boundary counted as whitespace,
//! 3. the same after canonical decomposition (NFD) and case folding.
//!
//! Every normalized string keeps the plain-text offset each of its characters came
//! from, so a hit in normalized text converts back to exact plain-text offsets. Those
//! offsets are then turned into document positions by walking the text leaves.

use std::ops::Range;

use unicode_normalization::UnicodeNormalization;

use crate::error::ResolveError;
use crate::models::{Block, Document, Span};

const ESCAPABLE: [char; 8] = ['.', '*', '_', '#', '[', ']', '(', ')'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    EscapeNormalized,
    UnicodeNormalized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub span: Span,
    pub strategy: MatchStrategy,
    /// Matched range in plain-text character offsets.
    pub offsets: Range<usize>,
}

/// Text plus, for every character, the index of the source character it came from.
#[derive(Debug, Clone, Default)]
struct Normalized {
    chars: Vec<char>,
    origins: Vec<usize>,
}

impl Normalized {
    fn identity(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let origins = (0..chars.len()).collect();
        Self { chars, origins }
    }

    /// Concatenate block texts. A separator takes the origin of the character after it.
    fn join<S: AsRef<str>>(blocks: &[S], separator: Option<char>) -> Self {
        let mut out = Self::default();
        let mut offset = 0;
        for (index, block) in blocks.iter().enumerate() {
            if let (Some(separator), true) = (separator, index > 0) {
                out.push(separator, offset);
            }
            for c in block.as_ref().chars() {
                out.push(c, offset);
                offset += 1;
            }
        }
        out
    }

    fn push(&mut self, c: char, origin: usize) {
        self.chars.push(c);
        self.origins.push(origin);
    }

    fn map_chars<I>(&self, f: impl Fn(char) -> I) -> Self
    where
        I: Iterator<Item = char>,
    {
        let mut out = Self::default();
        for (&c, &origin) in self.chars.iter().zip(&self.origins) {
            for mapped in f(c) {
                out.push(mapped, origin);
            }
        }
        out
    }

    fn fold_case(&self) -> Self {
        self.map_chars(char::to_lowercase)
    }

    fn decompose(&self) -> Self {
        self.map_chars(|c| std::iter::once(c).nfd())
    }

    /// Drop backslashes before escapable punctuation and collapse whitespace runs.
    fn strip_escapes(&self) -> Self {
        let mut out = Self::default();
        let mut in_whitespace = false;
        let mut i = 0;
        while i < self.chars.len() {
            let c = self.chars[i];
            let origin = self.origins[i];
            if c == '\\' {
                if let Some(&next) = self.chars.get(i + 1) {
                    if ESCAPABLE.contains(&next) {
                        out.push(next, self.origins[i + 1]);
                        in_whitespace = false;
                        i += 2;
                        continue;
                    }
                }
            }
            if c.is_whitespace() {
                if !in_whitespace {
                    out.push(' ', origin);
                }
                in_whitespace = true;
            } else {
                out.push(c, origin);
                in_whitespace = false;
            }
            i += 1;
        }
        out
    }

    fn find(&self, needle: &Normalized) -> Option<Range<usize>> {
        let n = needle.chars.len();
        if n == 0 || n > self.chars.len() {
            return None;
        }
        let start = self
            .chars
            .windows(n)
            .position(|window| window == needle.chars.as_slice())?;
        Some(self.origins[start]..self.origins[start + n - 1] + 1)
    }
}

/// Locate `target` in plain text. Returns the character-offset range and the strategy used.
pub fn find_text(plain: &str, target: &str) -> Option<(Range<usize>, MatchStrategy)> {
    find_in_blocks(&[plain], target)
}

/// Locate `target` across block texts. Offsets index their concatenation, but the
/// normalized strategies treat each block boundary as whitespace, so a target copied
/// from newline-separated text still matches.
pub fn find_in_blocks<S: AsRef<str>>(
    blocks: &[S],
    target: &str,
) -> Option<(Range<usize>, MatchStrategy)> {
    if target.trim().is_empty() {
        return None;
    }

    let haystack = Normalized::join(blocks, None);
    let needle = Normalized::identity(target);
    if let Some(range) = haystack.fold_case().find(&needle.fold_case()) {
        return Some((range, MatchStrategy::Exact));
    }

    let haystack = Normalized::join(blocks, Some('\n')).strip_escapes();
    let needle = Normalized::identity(target.trim()).strip_escapes();
    if let Some(range) = haystack.fold_case().find(&needle.fold_case()) {
        return Some((range, MatchStrategy::EscapeNormalized));
    }

    let haystack = haystack.decompose().fold_case();
    let needle = needle.decompose().fold_case();
    haystack
        .find(&needle)
        .map(|range| (range, MatchStrategy::UnicodeNormalized))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Convert a plain-text offset to a document position by walking the text leaves.
fn offset_to_position(doc: &Document, offset: usize, edge: Edge) -> Option<usize> {
    let mut consumed = 0;
    for leaf in doc.leaves() {
        let len = leaf.text.chars().count();
        let hit = match edge {
            Edge::Start => offset >= consumed && offset < consumed + len,
            Edge::End => offset > consumed && offset <= consumed + len,
        };
        if hit {
            return Some(leaf.pos + offset - consumed);
        }
        consumed += len;
    }
    None
}

/// Resolve `target` to a span in `doc`. Never panics; a miss is `ResolveError::NotFound`.
pub fn resolve(doc: &Document, target: &str) -> Result<Resolved, ResolveError> {
    let not_found = || ResolveError::NotFound(target.to_string());
    let blocks: Vec<String> = doc.blocks().iter().map(Block::text).collect();
    let (offsets, strategy) = find_in_blocks(&blocks, target).ok_or_else(not_found)?;

    let from = offset_to_position(doc, offsets.start, Edge::Start).ok_or_else(not_found)?;
    let to = offset_to_position(doc, offsets.end, Edge::End).ok_or_else(not_found)?;
    log::debug!(
        "Resolved {:?} to {}..{} via {:?}",
        target,
        from,
        to,
        strategy
    );

    Ok(Resolved {
        span: Span::new(from, to),
        strategy,
        offsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockKind, Marks, TextRun};
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_match_is_case_insensitive() {
        let doc = Document::from_text("The Quick brown fox");
        let resolved = resolve(&doc, "quick BROWN").unwrap();
        assert_eq!(resolved.strategy, MatchStrategy::Exact);
        assert_eq!(doc.text_between(resolved.span.from, resolved.span.to), "Quick brown");
    }

    #[test]
    fn literal_substrings_cover_their_own_text() {
        let doc = Document::from_text("Alpha beta\nGamma delta epsilon\nZeta");
        let plain = doc.text_content();
        for target in ["Alpha", "beta", "Gamma delta", "epsilon", "Zeta", "a d"] {
            let resolved = resolve(&doc, target).unwrap();
            assert_eq!(resolved.strategy, MatchStrategy::Exact);
            let covered: String = plain
                .chars()
                .skip(resolved.offsets.start)
                .take(resolved.offsets.len())
                .collect();
            assert_eq!(covered, target);
            assert_eq!(doc.text_between(resolved.span.from, resolved.span.to), target);
        }
    }

    #[test]
    fn escaped_markdown_needs_escape_strategy() {
        let plain = "## 1\\. First step";
        let (_, strategy) = find_text(plain, "1. First step").unwrap();
        assert_eq!(strategy, MatchStrategy::EscapeNormalized);

        let doc = Document::from_text(plain);
        let resolved = resolve(&doc, "1. First step").unwrap();
        assert_eq!(
            doc.text_between(resolved.span.from, resolved.span.to),
            "1\\. First step"
        );
    }

    #[test]
    fn whitespace_runs_collapse() {
        let (range, strategy) = find_text("one   two\tthree", "two three").unwrap();
        assert_eq!(strategy, MatchStrategy::EscapeNormalized);
        assert_eq!(range, 6..15);
    }

    #[test]
    fn accents_match_when_typed_the_same() {
        let (_, strategy) = find_text("Caf\u{e9} culture", "caf\u{e9} culture").unwrap();
        assert_eq!(strategy, MatchStrategy::Exact);
    }

    #[test]
    fn decomposed_accents_need_unicode_strategy() {
        let (range, strategy) = find_text("Caf\u{e9} culture", "cafe\u{301} CULTURE").unwrap();
        assert_eq!(strategy, MatchStrategy::UnicodeNormalized);
        assert_eq!(range, 0..12);
    }

    #[test]
    fn missing_accent_is_a_deterministic_miss() {
        assert_eq!(find_text("Caf\u{e9} culture", "cafe culture"), None);
        let doc = Document::from_text("Caf\u{e9} culture");
        assert_eq!(
            resolve(&doc, "cafe culture"),
            Err(ResolveError::NotFound("cafe culture".to_string()))
        );
    }

    #[test]
    fn blank_targets_never_match() {
        assert_eq!(find_text("anything", ""), None);
        assert_eq!(find_text("anything", "   "), None);
    }

    #[test]
    fn offsets_walk_into_later_blocks_and_runs() {
        let doc = Document::from_blocks(vec![
            Block::heading(1, "Intro"),
            Block::new(
                BlockKind::Paragraph,
                vec![
                    TextRun::plain("Some "),
                    TextRun::with_marks(
                        "bold",
                        Marks {
                            bold: true,
                            ..Marks::default()
                        },
                    ),
                    TextRun::plain(" words"),
                ],
            ),
        ]);
        // "Intro" occupies 1..6, the paragraph text starts at 8.
        let resolved = resolve(&doc, "bold words").unwrap();
        assert_eq!(resolved.span, Span::new(13, 23));
        assert_eq!(doc.text_between(13, 23), "bold words");
    }

    #[test]
    fn match_spanning_blocks_maps_both_edges() {
        let doc = Document::from_text("end.\nStart");
        let resolved = resolve(&doc, "end.Start").unwrap();
        assert_eq!(resolved.span, Span::new(1, 12));
    }

    #[test]
    fn newline_between_blocks_matches_the_boundary() {
        let doc = Document::from_text("First para ends here.\nSecond para starts here.");
        let resolved = resolve(&doc, "ends here.\nSecond para").unwrap();
        assert_eq!(resolved.strategy, MatchStrategy::EscapeNormalized);
        assert_eq!(resolved.span, Span::new(12, 35));
        assert_eq!(
            doc.text_between(resolved.span.from, resolved.span.to),
            "ends here.\nSecond para"
        );

        let spaced = resolve(&doc, "ends here. Second").unwrap();
        assert_eq!(spaced.span, Span::new(12, 30));
    }

    #[test]
    fn empty_blocks_collapse_into_one_boundary() {
        let blocks = ["Alpha", "", "Beta"];
        let (range, strategy) = find_in_blocks(&blocks[..], "alpha\n\nbeta").unwrap();
        assert_eq!(strategy, MatchStrategy::EscapeNormalized);
        assert_eq!(range, 0..9);
    }
}
