//! Untrusted rich text → structured blocks → terminal text.
//!
//! Worksheet content is arbitrary markup produced by an external generator.
//! It is parsed with `scraper` and reduced to a small block model; nothing
//! from the input survives except text. Active and embedded elements
//! (scripts, frames, forms, media) are dropped with their contents, links
//! keep only their label, images only their alt text, and control
//! characters are stripped so the output cannot drive the terminal.
//!
//! The style mapping is fixed:
//!
//! | Markup | Terminal |
//! |--------|----------|
//! | `h1` | text underlined with `=` |
//! | `h2` | text underlined with `-` |
//! | `h3`–`h6` | `###` … prefix |
//! | `p`, `div`, … | paragraph |
//! | `ul` / `ol` | `- item` / `1. item` |
//! | `blockquote` | `> ` prefix |
//! | `pre` | four-space indent |
//! | `hr` | `---` |
//! | `strong`, `b` | `**text**` |
//! | `em`, `i` | `_text_` |
//! | `code` | `` `text` `` |

use scraper::{ElementRef, Html, Node};

/// Elements removed together with everything inside them.
const DROPPED: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "applet", "noscript",
    "template", "svg", "math", "canvas", "audio", "video", "source", "track", "form", "input",
    "button", "select", "textarea", "option", "head", "title", "meta", "link", "base",
];

/// Nesting depth past which structure is ignored and only text is kept.
const MAX_DEPTH: usize = 256;

/// Elements that start and end a paragraph.
const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "aside", "nav", "body",
    "html", "table", "thead", "tbody", "tr", "dl", "dt", "dd", "figure", "figcaption",
    "details", "summary", "li", "address", "center",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub strong: bool,
    pub emphasis: bool,
    pub code: bool,
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    List { ordered: bool, items: Vec<Vec<Span>> },
    Quote(Vec<Span>),
    Preformatted(String),
    Rule,
}

/// Parsed, sanitized content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    pub blocks: Vec<Block>,
}

impl RichText {
    /// Concatenated text of every block, without styling.
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Heading { spans, .. } | Block::Paragraph(spans) | Block::Quote(spans) => {
                    out.push(join_spans(spans))
                }
                Block::List { items, .. } => out.extend(items.iter().map(|i| join_spans(i))),
                Block::Preformatted(text) => out.push(text.clone()),
                Block::Rule => {}
            }
        }
        out.join("\n")
    }
}

fn join_spans(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

/// Parses `markup` into blocks.
pub fn parse_rich_text(markup: &str) -> RichText {
    let html = Html::parse_fragment(markup);
    let mut builder = Builder::default();
    builder.walk(html.root_element(), SpanStyle::default(), 0);
    builder.flush();
    RichText {
        blocks: builder.blocks,
    }
}

/// Parses and renders `markup` for a terminal.
pub fn render_to_terminal(markup: &str) -> String {
    to_terminal(&parse_rich_text(markup))
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    inline: Vec<Span>,
}

impl Builder {
    fn walk(&mut self, el: ElementRef<'_>, style: SpanStyle, depth: usize) {
        if depth >= MAX_DEPTH {
            self.flatten(el, style);
            return;
        }
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text, style),
                Node::Element(elem) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el, elem.name(), style, depth + 1);
                    }
                }
                _ => {}
            }
        }
    }

    /// Appends the text below `el` without recursing, still skipping
    /// dropped elements.
    fn flatten(&mut self, el: ElementRef<'_>, style: SpanStyle) {
        let mut stack: Vec<_> = el.children().rev().collect();
        while let Some(node) = stack.pop() {
            match node.value() {
                Node::Text(text) => self.push_text(text, style),
                Node::Element(elem) if DROPPED.contains(&elem.name()) => {}
                Node::Element(_) => stack.extend(node.children().rev()),
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>, name: &str, style: SpanStyle, depth: usize) {
        match name {
            n if DROPPED.contains(&n) => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                let level = name.as_bytes()[1] - b'0';
                let spans = inline_spans(el, style, depth);
                if !spans.is_empty() {
                    self.blocks.push(Block::Heading { level, spans });
                }
            }
            "ul" | "ol" => {
                self.flush();
                let items: Vec<Vec<Span>> = el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| c.value().name() == "li")
                    .map(|li| inline_spans(li, style, depth + 1))
                    .filter(|spans| !spans.is_empty())
                    .collect();
                if !items.is_empty() {
                    self.blocks.push(Block::List {
                        ordered: name == "ol",
                        items,
                    });
                }
            }
            "blockquote" => {
                self.flush();
                let spans = inline_spans(el, style, depth);
                if !spans.is_empty() {
                    self.blocks.push(Block::Quote(spans));
                }
            }
            "pre" => {
                self.flush();
                let raw: String = el.text().collect();
                let text: String = raw
                    .chars()
                    .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
                    .collect();
                let text = text.trim_matches('\n');
                if !text.trim().is_empty() {
                    self.blocks.push(Block::Preformatted(text.to_string()));
                }
            }
            "hr" => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            "br" => self.push_break(),
            "strong" | "b" => self.walk(
                el,
                SpanStyle {
                    strong: true,
                    ..style
                },
                depth,
            ),
            "em" | "i" | "cite" => self.walk(
                el,
                SpanStyle {
                    emphasis: true,
                    ..style
                },
                depth,
            ),
            "code" | "kbd" | "samp" | "tt" => {
                self.walk(el, SpanStyle { code: true, ..style }, depth)
            }
            "img" => {
                if let Some(alt) = el.value().attr("alt").filter(|a| !a.trim().is_empty()) {
                    self.push_text(&format!("[image: {}]", alt), style);
                }
            }
            "td" | "th" => {
                self.walk(el, style, depth);
                self.push_text(" ", style);
            }
            n if BLOCKS.contains(&n) => {
                self.flush();
                self.walk(el, style, depth);
                self.flush();
            }
            // a, span, u, small, sup, unknown tags: text only
            _ => self.walk(el, style, depth),
        }
    }

    /// Appends text with whitespace collapsed and control characters removed.
    fn push_text(&mut self, raw: &str, style: SpanStyle) {
        let mut text = String::with_capacity(raw.len());
        let mut in_space = false;
        for c in raw.chars() {
            if c.is_whitespace() {
                if !in_space {
                    text.push(' ');
                }
                in_space = true;
            } else if !c.is_control() {
                text.push(c);
                in_space = false;
            }
        }

        let at_line_start = self
            .inline
            .last()
            .map(|s| s.text.ends_with(' ') || s.text.ends_with('\n'))
            .unwrap_or(true);
        let text = if at_line_start {
            text.trim_start()
        } else {
            text.as_str()
        };
        if text.is_empty() {
            return;
        }

        match self.inline.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.inline.push(Span {
                text: text.to_string(),
                style,
            }),
        }
    }

    fn push_break(&mut self) {
        if let Some(last) = self.inline.last_mut() {
            let trimmed = last.text.trim_end_matches(' ').len();
            last.text.truncate(trimmed);
            last.text.push('\n');
        }
    }

    /// Closes the current paragraph, if it has any visible text.
    fn flush(&mut self) {
        let spans = tidy(std::mem::take(&mut self.inline));
        if !spans.is_empty() {
            self.blocks.push(Block::Paragraph(spans));
        }
    }
}

/// Flattens an element's content into one line of spans.
fn inline_spans(el: ElementRef<'_>, style: SpanStyle, depth: usize) -> Vec<Span> {
    let mut inner = Builder::default();
    inner.walk(el, style, depth);
    inner.flush();

    let mut spans: Vec<Span> = Vec::new();
    for block in inner.blocks {
        let part = match block {
            Block::Heading { spans, .. } | Block::Paragraph(spans) | Block::Quote(spans) => spans,
            Block::List { items, .. } => items.into_iter().flatten().collect(),
            Block::Preformatted(text) => vec![Span {
                text,
                style: SpanStyle { code: true, ..style },
            }],
            Block::Rule => continue,
        };
        if !spans.is_empty() {
            spans.push(Span {
                text: " ".to_string(),
                style,
            });
        }
        spans.extend(part);
    }
    tidy(spans)
}

/// Trims the ends, drops empty spans and merges neighbours of equal style.
fn tidy(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.style == span.style => last.text.push_str(&span.text),
            _ => out.push(span),
        }
    }
    if let Some(first) = out.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = out.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    out.retain(|s| !s.text.is_empty());
    out
}

fn styled(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        let mut text = span.text.clone();
        if span.style.code {
            text = format!("`{}`", text);
        }
        if span.style.emphasis {
            text = format!("_{}_", text);
        }
        if span.style.strong {
            text = format!("**{}**", text);
        }
        out.push_str(&text);
    }
    out
}

fn prefix_lines(text: &str, first: &str, rest: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}{}", if i == 0 { first } else { rest }, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders blocks with the fixed terminal style mapping.
pub fn to_terminal(doc: &RichText) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(doc.blocks.len());
    for block in &doc.blocks {
        let rendered = match block {
            Block::Heading { level, spans } => {
                let text = styled(spans);
                let width = text.chars().count();
                match level {
                    1 => format!("{}\n{}", text, "=".repeat(width)),
                    2 => format!("{}\n{}", text, "-".repeat(width)),
                    n => format!("{} {}", "#".repeat(usize::from(*n)), text),
                }
            }
            Block::Paragraph(spans) => styled(spans),
            Block::List { ordered, items } => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let marker = if *ordered {
                        format!("{}. ", i + 1)
                    } else {
                        "- ".to_string()
                    };
                    let pad = " ".repeat(marker.len());
                    prefix_lines(&styled(item), &marker, &pad)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Quote(spans) => prefix_lines(&styled(spans), "> ", "> "),
            Block::Preformatted(text) => prefix_lines(text, "    ", "    "),
            Block::Rule => "---".to_string(),
        };
        parts.push(rendered);
    }

    let mut out = parts.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
