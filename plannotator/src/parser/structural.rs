use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::block::{Block, BlockKind};
use crate::parser::lines::LineIndex;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse plan markdown into its ordered block sequence.
pub fn parse_blocks(source: &str) -> Vec<Block> {
    let options =
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
    let parser = CmarkParser::new_ext(source, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = ParseState::new(source);
    state.process_events(&events);
    state.blocks
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    lines: LineIndex,
    /// Open list items, innermost last.
    items: Vec<ItemBuilder>,
    blocks: Vec<Block>,
}

/// A list item whose block has not been emitted yet.
/// Items are flushed as soon as a nested block starts so that
/// a parent always precedes its children in document order.
struct ItemBuilder {
    start: usize,
    inline: Option<Range<usize>>,
    checked: Option<bool>,
    flushed: bool,
}

impl ItemBuilder {
    fn new(start: usize) -> Self {
        ItemBuilder {
            start,
            inline: None,
            checked: None,
            flushed: false,
        }
    }

    fn extend(&mut self, range: Option<Range<usize>>) {
        self.inline = merge_spans(self.inline.take(), range);
    }
}

/// Inline content collected from a paragraph or heading.
struct InlineRun {
    span: Option<Range<usize>>,
    checked: Option<bool>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str) -> Self {
        ParseState {
            source,
            lines: LineIndex::new(source),
            items: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn process_events(&mut self, events: &[(Event<'_>, Range<usize>)]) {
        let mut i = 0;

        while i < events.len() {
            let (ref ev, ref range) = events[i];

            match ev {
                Event::Start(Tag::Heading { level, .. }) => {
                    self.flush_item();
                    let span = range.clone();
                    i += 1;
                    let run = collect_inline_run(events, &mut i, |e| {
                        matches!(e, TagEnd::Heading(_))
                    });
                    let content = self.inline_text(run.span);
                    let idx = self.push_block(BlockKind::Heading, content, span);
                    self.blocks[idx].level = Some(heading_level_to_u8(level));
                }

                // Loose list items wrap their text in paragraphs
                Event::Start(Tag::Paragraph) => {
                    let span = range.clone();
                    i += 1;
                    let run = collect_inline_run(events, &mut i, |e| {
                        matches!(e, TagEnd::Paragraph)
                    });
                    match self.items.last_mut() {
                        Some(item) if !item.flushed => {
                            item.extend(run.span);
                            if run.checked.is_some() {
                                item.checked = run.checked;
                            }
                        }
                        _ => {
                            let content = self.inline_text(run.span);
                            self.push_block(BlockKind::Paragraph, content, span);
                        }
                    }
                }

                Event::Start(Tag::Item) => {
                    self.items.push(ItemBuilder::new(range.start));
                    i += 1;
                }

                Event::End(TagEnd::Item) => {
                    if let Some(item) = self.items.pop() {
                        if !item.flushed {
                            self.emit_item(item.start, item.inline, item.checked);
                        }
                    }
                    i += 1;
                }

                Event::TaskListMarker(checked) => {
                    if let Some(item) = self.items.last_mut() {
                        item.checked = Some(*checked);
                    }
                    i += 1;
                }

                // A nested list closes the parent item's own text
                Event::Start(Tag::List(_)) => {
                    self.flush_item();
                    i += 1;
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    self.flush_item();
                    let language = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().map(str::to_string)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    let span = range.clone();
                    i += 1;
                    let text = collect_text_until(events, &mut i, |e| {
                        matches!(e, TagEnd::CodeBlock)
                    });
                    let content = text.strip_suffix('\n').unwrap_or(&text).to_string();
                    let idx = self.push_block(BlockKind::Code, content, span);
                    self.blocks[idx].language = language;
                }

                Event::Start(Tag::BlockQuote(_)) => {
                    self.flush_item();
                    let span = range.clone();
                    skip_container(events, &mut i);
                    let content = strip_quote_markers(&self.source[span.clone()]);
                    self.push_block(BlockKind::Blockquote, content, span);
                }

                Event::Rule => {
                    self.flush_item();
                    self.push_block(BlockKind::Hr, String::new(), range.clone());
                    i += 1;
                }

                // Tight list items carry inline events directly
                ev if is_inline(ev) => {
                    if let Some(item) = self.items.last_mut() {
                        if !item.flushed {
                            item.extend(Some(range.clone()));
                        }
                    }
                    i += 1;
                }

                // Tables, HTML blocks, footnotes: keep the raw source as a paragraph
                Event::Start(_) => {
                    self.flush_item();
                    let span = range.clone();
                    skip_container(events, &mut i);
                    let content = self.source[span.clone()].trim().to_string();
                    self.push_block(BlockKind::Paragraph, content, span);
                }

                _ => {
                    i += 1;
                }
            }
        }
    }

    fn push_block(&mut self, kind: BlockKind, content: String, span: Range<usize>) -> usize {
        let order = self.blocks.len();
        self.blocks.push(Block {
            id: Block::id_for(order),
            kind,
            content,
            level: None,
            language: None,
            checked: None,
            order,
            start_line: self.lines.line_of(span.start),
            span,
        });
        order
    }

    /// Emit the innermost open item, if it has not been emitted yet.
    fn flush_item(&mut self) {
        let pending = match self.items.last_mut() {
            Some(item) if !item.flushed => {
                item.flushed = true;
                (item.start, item.inline.clone(), item.checked)
            }
            _ => return,
        };
        self.emit_item(pending.0, pending.1, pending.2);
    }

    fn emit_item(&mut self, start: usize, inline: Option<Range<usize>>, checked: Option<bool>) {
        let end = inline.as_ref().map_or(start, |r| r.end);
        let content = self.inline_text(inline);
        let idx = self.push_block(BlockKind::ListItem, content, start..end);
        self.blocks[idx].checked = checked;
    }

    fn inline_text(&self, span: Option<Range<usize>>) -> String {
        span.map(|r| clean_lines(&self.source[r]))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn is_inline(ev: &Event<'_>) -> bool {
    matches!(
        ev,
        Event::Text(_)
            | Event::Code(_)
            | Event::InlineHtml(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::FootnoteReference(_)
            | Event::Start(
                Tag::Emphasis
                    | Tag::Strong
                    | Tag::Strikethrough
                    | Tag::Link { .. }
                    | Tag::Image { .. }
            )
    )
}

fn merge_spans(a: Option<Range<usize>>, b: Option<Range<usize>>) -> Option<Range<usize>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.start.min(b.start)..a.end.max(b.end)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Collect the source extent of inline content until a matching End tag.
fn collect_inline_run(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> InlineRun {
    let mut run = InlineRun {
        span: None,
        checked: None,
    };
    while *i < events.len() {
        let (ref ev, ref range) = events[*i];
        *i += 1;
        match ev {
            Event::End(tag_end) if is_end(tag_end) => break,
            Event::TaskListMarker(checked) => run.checked = Some(*checked),
            _ => run.span = merge_spans(run.span.take(), Some(range.clone())),
        }
    }
    run
}

/// Collect all text content until a matching End tag.
fn collect_text_until(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

/// Advance past a container, starting at its Start event.
fn skip_container(events: &[(Event<'_>, Range<usize>)], i: &mut usize) {
    let mut depth = 0usize;
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        *i += 1;
        match ev {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
}

/// Trim every line and drop blank edges.
fn clean_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Remove `>` markers (at any nesting depth) from each line of a blockquote.
fn strip_quote_markers(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let mut rest = line.trim_start();
            while let Some(inner) = rest.strip_prefix('>') {
                rest = inner.trim_start();
            }
            rest.trim_end()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
