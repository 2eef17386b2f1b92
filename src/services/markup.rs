use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::error::MarkupError;
use crate::models::{Block, BlockKind, Document, Fragment, Marks, TextRun};

/// Convert markdown markup into native rich content.
///
/// A single plain paragraph becomes inline content so it can be spliced into
/// the surrounding block; anything else becomes a list of blocks. Raw HTML is
/// rejected.
pub fn markdown_to_fragment(markdown: &str) -> Result<Fragment, MarkupError> {
    let mut blocks = markdown_to_blocks(markdown)?;
    if blocks.is_empty() {
        return Err(MarkupError::Empty);
    }
    if blocks.len() == 1 && blocks[0].kind == BlockKind::Paragraph {
        let mut runs = blocks.remove(0).runs;
        // Paragraph parsing trims edge spaces that matter when splicing inline.
        let is_space = |c: char| c == ' ' || c == '\t';
        let leading: String = markdown.chars().take_while(|&c| is_space(c)).collect();
        let trailing: String = markdown.chars().rev().take_while(|&c| is_space(c)).collect();
        if let Some(first) = runs.first_mut() {
            first.text.insert_str(0, &leading);
        }
        if let Some(last) = runs.last_mut() {
            last.text.push_str(&trailing);
        }
        return Ok(Fragment::Inline(runs));
    }
    Ok(Fragment::Blocks(blocks))
}

/// Build a whole document from markdown, falling back to one paragraph per line.
pub fn parse_document(markdown: &str) -> Document {
    match markdown_to_blocks(markdown) {
        Ok(blocks) => Document::from_blocks(blocks),
        Err(e) => {
            log::debug!("Markdown import fell back to plain text: {}", e);
            Document::from_text(markdown)
        }
    }
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    current: Option<(BlockKind, Vec<TextRun>)>,
    lists: Vec<bool>,
    quote_depth: usize,
    marks: Marks,
    in_code_block: bool,
}

impl BlockBuilder {
    fn context_kind(&self) -> BlockKind {
        match self.lists.last() {
            Some(true) => BlockKind::OrderedItem,
            Some(false) => BlockKind::BulletItem,
            None if self.quote_depth > 0 => BlockKind::Quote,
            None => BlockKind::Paragraph,
        }
    }

    fn open(&mut self, kind: BlockKind) {
        self.flush();
        self.current = Some((kind, Vec::new()));
    }

    fn flush(&mut self) {
        if let Some((kind, mut runs)) = self.current.take() {
            if let BlockKind::CodeBlock { .. } = kind {
                if let Some(last) = runs.last_mut() {
                    while last.text.ends_with('\n') {
                        last.text.pop();
                    }
                }
            }
            let block = Block::new(kind, runs);
            if block.text_len() > 0 {
                self.blocks.push(block);
            }
        }
    }

    fn push_text(&mut self, text: &str, marks: Marks) {
        if self.current.is_none() {
            let kind = self.context_kind();
            self.current = Some((kind, Vec::new()));
        }
        if let Some((_, runs)) = self.current.as_mut() {
            runs.push(TextRun::with_marks(text, marks));
        }
    }
}

fn markdown_to_blocks(markdown: &str) -> Result<Vec<Block>, MarkupError> {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut builder = BlockBuilder::default();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                builder.open(BlockKind::Heading { level: level as u8 });
            }
            Event::End(TagEnd::Heading(_)) => builder.flush(),
            Event::Start(Tag::Paragraph) => {
                let keep_item = matches!(
                    &builder.current,
                    Some((_, runs)) if runs.is_empty()
                );
                if !keep_item {
                    let kind = builder.context_kind();
                    builder.open(kind);
                }
            }
            Event::End(TagEnd::Paragraph) => builder.flush(),
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                builder.open(BlockKind::CodeBlock { language });
                builder.in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                builder.in_code_block = false;
                builder.flush();
            }
            Event::Start(Tag::List(start)) => {
                builder.flush();
                builder.lists.push(start.is_some());
            }
            Event::End(TagEnd::List(_)) => {
                builder.flush();
                builder.lists.pop();
            }
            Event::Start(Tag::Item) => {
                let kind = builder.context_kind();
                builder.open(kind);
            }
            Event::End(TagEnd::Item) => builder.flush(),
            Event::Start(Tag::BlockQuote(_)) => {
                builder.flush();
                builder.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                builder.flush();
                builder.quote_depth = builder.quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::Strong) => builder.marks.bold = true,
            Event::End(TagEnd::Strong) => builder.marks.bold = false,
            Event::Start(Tag::Emphasis) => builder.marks.italic = true,
            Event::End(TagEnd::Emphasis) => builder.marks.italic = false,
            Event::Start(Tag::Strikethrough) => builder.marks.strike = true,
            Event::End(TagEnd::Strikethrough) => builder.marks.strike = false,
            Event::Start(Tag::Link { dest_url, .. }) => {
                builder.marks.link = Some(dest_url.to_string());
            }
            Event::End(TagEnd::Link) => builder.marks.link = None,
            Event::Code(text) => {
                let marks = Marks {
                    code: true,
                    ..builder.marks.clone()
                };
                builder.push_text(&text, marks);
            }
            Event::Text(text) => {
                let marks = if builder.in_code_block {
                    Marks::default()
                } else {
                    builder.marks.clone()
                };
                builder.push_text(&text, marks);
            }
            Event::SoftBreak => {
                let marks = builder.marks.clone();
                builder.push_text(" ", marks);
            }
            Event::HardBreak => {
                let marks = builder.marks.clone();
                builder.push_text("\n", marks);
            }
            Event::Html(_) | Event::InlineHtml(_) => {
                return Err(MarkupError::Unsupported("raw HTML".to_string()));
            }
            _ => {}
        }
    }

    builder.flush();
    Ok(builder.blocks)
}
