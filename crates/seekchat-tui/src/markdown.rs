//! Markdown to styled terminal lines.
//!
//! Fenced blocks tagged with a language get a numbered header and can be
//! copied; every other piece of code (inline spans, untagged or indented
//! blocks) is only restyled.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;

pub const COPY_HINT: &str = "Ctrl+Y or /copy to copy";
pub const COPIED_LABEL: &str = "✓ copied";

const INLINE_CODE: Style = Style::new().fg(Color::Yellow);
const CODE_TEXT: Style = Style::new().fg(Color::LightGreen);
const CODE_HEADER: Style = Style::new().fg(Color::Black).bg(Color::Cyan);

/// A copyable fenced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Default)]
pub struct Rendered {
    pub lines: Vec<Line<'static>>,
    pub code_blocks: Vec<CodeBlock>,
}

/// Numbering and copy state for the code blocks of one render pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockContext {
    /// Number of copyable blocks rendered before this text.
    pub offset: usize,
    /// Zero-based global index of the block currently showing "copied".
    pub copied: Option<usize>,
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"^\w+").ok()).as_ref()
}

/// The language tag of a fence info string, if it starts with one.
pub fn fence_language(info: &str) -> Option<String> {
    fence_regex()?
        .find(info.trim())
        .map(|m| m.as_str().to_string())
}

/// Only the copyable blocks of `text`, without styling.
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    render(text, BlockContext::default()).code_blocks
}

pub fn render(text: &str, ctx: BlockContext) -> Rendered {
    let mut writer = Writer::new(ctx);
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES;
    for event in Parser::new_ext(text, options) {
        writer.event(event);
    }
    writer.finish()
}

struct PendingCode {
    language: Option<String>,
    text: String,
}

struct Writer {
    ctx: BlockContext,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    code: Option<PendingCode>,
    blocks: Vec<CodeBlock>,
}

impl Writer {
    fn new(ctx: BlockContext) -> Self {
        Self {
            ctx,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            code: None,
            blocks: Vec::new(),
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.styles.push(style);
    }

    fn text(&mut self, text: &str, style: Style) {
        // Text events never span lines except inside html blocks.
        let mut parts = text.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                self.spans.push(Span::styled(part.to_string(), style));
            }
            if parts.peek().is_some() {
                self.flush();
            }
        }
    }

    fn push_line(&mut self, mut spans: Vec<Span<'static>>) {
        if self.quote_depth > 0 {
            spans.insert(
                0,
                Span::styled("│ ".repeat(self.quote_depth), Style::new().fg(Color::DarkGray)),
            );
        }
        self.lines.push(Line::from(spans));
    }

    fn flush(&mut self) {
        if !self.spans.is_empty() {
            let spans = std::mem::take(&mut self.spans);
            self.push_line(spans);
        }
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code.as_mut() {
                Some(code) => code.text.push_str(&text),
                None => {
                    let style = self.style();
                    self.text(&text, style);
                }
            },
            Event::Code(code) => self.spans.push(Span::styled(code.to_string(), INLINE_CODE)),
            Event::Html(html) | Event::InlineHtml(html) => {
                let style = self.style();
                self.text(&html, style);
            }
            Event::SoftBreak => self.spans.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines
                    .push(Line::styled("─".repeat(24), Style::new().fg(Color::DarkGray)));
                self.blank();
            }
            Event::TaskListMarker(done) => {
                self.spans
                    .push(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            Event::FootnoteReference(name) => self.spans.push(Span::raw(format!("[{}]", name))),
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                let color = if level == HeadingLevel::H1 { Color::Cyan } else { Color::LightCyan };
                self.push_style(Style::new().fg(color).add_modifier(Modifier::BOLD));
            }
            Tag::Emphasis => self.push_style(Style::new().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::new().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(Style::new().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => {
                self.push_style(Style::new().fg(Color::Blue).add_modifier(Modifier::UNDERLINED))
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
                self.push_style(Style::new().fg(Color::Gray).add_modifier(Modifier::ITALIC));
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.spans.push(Span::styled(
                    format!("{}{}", indent, marker),
                    Style::new().fg(Color::DarkGray),
                ));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(PendingCode {
                    language,
                    text: String::new(),
                });
            }
            Tag::TableCell => self.spans.push(Span::styled("│ ", Style::new().fg(Color::DarkGray))),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.blank(),
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.blank();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.styles.pop();
            }
            TagEnd::BlockQuote => {
                self.flush();
                self.styles.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item | TagEnd::TableRow | TagEnd::TableHead => self.flush(),
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    self.code_block(code);
                }
                self.blank();
            }
            _ => {}
        }
    }

    fn code_block(&mut self, code: PendingCode) {
        let text = code.text.strip_suffix('\n').unwrap_or(&code.text).to_string();
        let Some(language) = code.language else {
            for line in text.lines() {
                self.push_line(vec![Span::raw("  "), Span::styled(line.to_string(), INLINE_CODE)]);
            }
            return;
        };

        let index = self.ctx.offset + self.blocks.len();
        let hint = if self.ctx.copied == Some(index) {
            Span::styled(format!(" {}", COPIED_LABEL), Style::new().fg(Color::Green))
        } else {
            Span::styled(format!(" {} {}", COPY_HINT, index + 1), Style::new().fg(Color::DarkGray))
        };
        self.push_line(vec![
            Span::styled(format!(" {} ", language), CODE_HEADER),
            Span::styled(format!(" #{}", index + 1), Style::new().fg(Color::Cyan)),
            hint,
        ]);
        for line in text.lines() {
            self.push_line(vec![
                Span::styled("▏ ", Style::new().fg(Color::DarkGray)),
                Span::styled(line.to_string(), CODE_TEXT),
            ]);
        }
        self.blocks.push(CodeBlock { language, code: text });
    }

    fn finish(mut self) -> Rendered {
        if let Some(code) = self.code.take() {
            self.code_block(code);
        }
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        Rendered {
            lines: self.lines,
            code_blocks: self.blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("rust"), Some("rust".into()));
        assert_eq!(fence_language("python title=x.py"), Some("python".into()));
        assert_eq!(fence_language(""), None);
        assert_eq!(fence_language("{.class}"), None);
    }

    #[test]
    fn test_tagged_fence_takes_code_block_path() {
        let rendered = render("```python\nprint(1)\n```", BlockContext::default());
        assert_eq!(
            rendered.code_blocks,
            vec![CodeBlock {
                language: "python".into(),
                code: "print(1)".into(),
            }]
        );
        let header = plain(&rendered.lines[0]);
        assert!(header.contains("python"));
        assert!(header.contains("#1"));
        assert!(header.contains(COPY_HINT));
    }

    #[test]
    fn test_untagged_fence_is_inline_style() {
        let rendered = render("```\nplain text\n```", BlockContext::default());
        assert!(rendered.code_blocks.is_empty());
        let line = &rendered.lines[0];
        assert_eq!(plain(line).trim(), "plain text");
        assert_eq!(line.spans[1].style, INLINE_CODE);
    }

    #[test]
    fn test_inline_code_has_no_copy_affordance() {
        let rendered = render("call `foo()` now", BlockContext::default());
        assert!(rendered.code_blocks.is_empty());
        assert_eq!(plain(&rendered.lines[0]), "call foo() now");
    }

    #[test]
    fn test_code_keeps_exact_text() {
        let source = "```rust\nfn main() {\n    println!(\"hi\");\n}\n```";
        let blocks = code_blocks(source);
        assert_eq!(blocks[0].code, "fn main() {\n    println!(\"hi\");\n}");
    }

    #[test]
    fn test_copied_block_shows_indicator() {
        let source = "```sh\nls\n```\n\n```sh\npwd\n```";
        let rendered = render(
            source,
            BlockContext {
                offset: 3,
                copied: Some(4),
            },
        );
        let headers: Vec<String> = rendered
            .lines
            .iter()
            .map(plain)
            .filter(|l| l.contains(" sh "))
            .collect();
        assert_eq!(headers.len(), 2);
        assert!(headers[0].contains("#4") && !headers[0].contains(COPIED_LABEL));
        assert!(headers[1].contains("#5") && headers[1].contains(COPIED_LABEL));
    }

    #[test]
    fn test_malformed_markdown_degrades_to_text() {
        let rendered = render("**unclosed and `tick", BlockContext::default());
        assert_eq!(plain(&rendered.lines[0]), "**unclosed and `tick");
    }

    #[test]
    fn test_lists_are_marked() {
        let rendered = render("- one\n- two\n\n1. first\n2. second", BlockContext::default());
        let text: Vec<String> = rendered.lines.iter().map(plain).collect();
        assert!(text.contains(&"• one".to_string()));
        assert!(text.contains(&"2. second".to_string()));
    }
}
