use std::borrow::Cow;
use std::collections::BTreeMap;

use pulldown_cmark::{Event, Options, Parser as CmarkParser, Tag};

use crate::block::{Block, BlockKind};
use crate::document::{Element, Node, RenderedDocument};

/// Render parsed blocks into the DOM-like tree used for highlighting.
pub fn render(blocks: &[Block]) -> RenderedDocument {
    let mut root = Element::new("article");
    let mut bound = BTreeMap::new();

    for block in blocks {
        let mut element = Element::new(block_tag(block));
        element.block_id = Some(block.id.clone());
        match block.kind {
            BlockKind::Code => {
                element.bind_id = Some(block.id.clone());
                if !block.content.is_empty() {
                    element.children.push(Node::Text(block.content.clone()));
                }
                bound.insert(block.id.clone(), block.content.clone());
            }
            BlockKind::Hr => {}
            _ => element.children = render_inline(&block.content),
        }
        root.children.push(Node::Element(element));
    }

    RenderedDocument::new(root, bound)
}

fn block_tag(block: &Block) -> String {
    match block.kind {
        BlockKind::Heading => format!("h{}", block.level.unwrap_or(1).clamp(1, 6)),
        BlockKind::Paragraph => "p".to_string(),
        BlockKind::ListItem => "li".to_string(),
        BlockKind::Blockquote => "blockquote".to_string(),
        BlockKind::Code => "pre".to_string(),
        BlockKind::Hr => "hr".to_string(),
    }
}

fn inline_tag(tag: &Tag<'_>) -> Option<&'static str> {
    match tag {
        Tag::Emphasis => Some("em"),
        Tag::Strong => Some("strong"),
        Tag::Strikethrough => Some("del"),
        Tag::Link { .. } => Some("a"),
        Tag::Image { .. } => Some("img"),
        _ => None,
    }
}

/// Render a block's inline markdown into child nodes.
/// Block-level structure inside the content is flattened; adjacent text is
/// merged. HTML tags are dropped and only the text between them is kept.
fn render_inline(content: &str) -> Vec<Node> {
    let mut stack: Vec<Element> = vec![Element::new("span")];
    // Whether each open Start pushed an element
    let mut opened: Vec<bool> = Vec::new();
    let mut image_depth = 0usize;

    let source = inline_source(content);
    for event in CmarkParser::new_ext(&source, Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(tag) => match inline_tag(&tag) {
                Some(name) => {
                    if name == "img" {
                        image_depth += 1;
                    }
                    stack.push(Element::new(name));
                    opened.push(true);
                }
                None => {
                    // Separate flattened block-level content
                    if let Some(top) = stack.last_mut() {
                        if !top.text_content().is_empty() {
                            push_text(top, "\n");
                        }
                    }
                    opened.push(false);
                }
            },
            Event::End(_) => {
                if opened.pop() == Some(true) && stack.len() > 1 {
                    if let Some(element) = stack.pop() {
                        if element.tag == "img" {
                            image_depth = image_depth.saturating_sub(1);
                        }
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(Node::Element(element));
                        }
                    }
                }
            }
            Event::Text(text) => {
                if image_depth == 0 {
                    if let Some(top) = stack.last_mut() {
                        push_text(top, &text);
                    }
                }
            }
            Event::InlineHtml(html) | Event::Html(html) => {
                let text = strip_tags(&html);
                if image_depth == 0 && !text.is_empty() {
                    if let Some(top) = stack.last_mut() {
                        push_text(top, &text);
                    }
                }
            }
            Event::Code(code) => {
                let mut element = Element::new("code");
                element.children.push(Node::Text(code.to_string()));
                if let Some(top) = stack.last_mut() {
                    top.children.push(Node::Element(element));
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(top) = stack.last_mut() {
                    push_text(top, "\n");
                }
            }
            _ => {}
        }
    }

    while stack.len() > 1 {
        if let Some(element) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::Element(element));
            }
        }
    }

    let mut children = stack.pop().map(|e| e.children).unwrap_or_default();
    // HTML block lines keep their newline
    if let Some(Node::Text(last)) = children.last_mut() {
        let trimmed = last.trim_end_matches('\n').len();
        last.truncate(trimmed);
        if last.is_empty() {
            children.pop();
        }
    }
    children
}

/// Block content is inline markdown, but a standalone parse would read a
/// leading `1.`, `-`, `#`, `>` or fence as block syntax and drop it.
/// Escape the marker so it stays text.
fn inline_source(content: &str) -> Cow<'_, str> {
    let opens_block = CmarkParser::new_ext(content, Options::ENABLE_STRIKETHROUGH)
        .next()
        .is_some_and(|event| {
            matches!(
                event,
                Event::Start(
                    Tag::Heading { .. } | Tag::BlockQuote(_) | Tag::List(_) | Tag::CodeBlock(_)
                ) | Event::Rule
            )
        });
    if !opens_block {
        return Cow::Borrowed(content);
    }

    let start = content.len() - content.trim_start().len();
    let digits = content[start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    let at = start + digits;
    match content[at..].chars().next() {
        Some(c) if c.is_ascii_punctuation() => {
            Cow::Owned(format!("{}\\{}", &content[..at], &content[at..]))
        }
        _ => Cow::Borrowed(content),
    }
}

/// Text outside `<...>` tags.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn push_text(element: &mut Element, text: &str) {
    if let Some(Node::Text(last)) = element.children.last_mut() {
        last.push_str(text);
    } else {
        element.children.push(Node::Text(text.to_string()));
    }
}
