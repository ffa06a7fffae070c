//! Markdown to ratatui text conversion.
//!
//! Assistant replies use a small markdown subset: headings, emphasis, lists,
//! quotes, inline code and the occasional fenced block.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Convert markdown text to styled ratatui Lines.
///
/// Code block lines longer than `available_width` are cut with an ellipsis
/// instead of wrapping, so the gutter stays aligned.
pub fn render_markdown(text: &str, available_width: usize) -> Vec<Line<'static>> {
    MarkdownRenderer::new(available_width).render(text)
}

struct MarkdownRenderer {
    lines: Vec<Line<'static>>,
    current_spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    /// Prefix repeated on every line of a block quote.
    quote_depth: usize,
    code_block: Option<String>,
    /// One entry per open list: the next number, or `None` for bullets.
    lists: Vec<Option<u64>>,
    available_width: usize,
}

impl MarkdownRenderer {
    fn new(available_width: usize) -> Self {
        Self {
            lines: Vec::new(),
            current_spans: Vec::new(),
            style_stack: vec![Style::default()],
            quote_depth: 0,
            code_block: None,
            lists: Vec::new(),
            available_width,
        }
    }

    fn current_style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        let next = self.current_style().patch(style);
        self.style_stack.push(next);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn start_line(&mut self) {
        if self.current_spans.is_empty() && self.quote_depth > 0 {
            self.current_spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::Blue),
            ));
        }
    }

    fn flush_line(&mut self) {
        if !self.current_spans.is_empty() {
            let spans = std::mem::take(&mut self.current_spans);
            self.lines.push(Line::from(spans));
        }
    }

    fn add_blank_line(&mut self) {
        self.flush_line();
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::from(""));
        }
    }

    fn add_text(&mut self, text: &str) {
        if let Some(code) = self.code_block.as_mut() {
            code.push_str(text);
            return;
        }

        let style = self.current_style();
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush_line();
            }
            if !part.is_empty() {
                self.start_line();
                self.current_spans.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn render_code_block(&mut self, code: &str) {
        self.flush_line();

        let gutter = Style::default().fg(Color::DarkGray);
        let code_style = Style::default().fg(Color::Yellow);
        let max_width = self.available_width.saturating_sub(3);

        for line in code.lines() {
            let shown = if line.chars().count() > max_width {
                let cut: String = line.chars().take(max_width.saturating_sub(1)).collect();
                format!("{cut}…")
            } else {
                line.to_string()
            };
            self.lines.push(Line::from(vec![
                Span::styled("▎ ", gutter),
                Span::styled(shown, code_style),
            ]));
        }
        self.lines.push(Line::from(""));
    }

    fn render(mut self, text: &str) -> Vec<Line<'static>> {
        let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH);

        for event in parser {
            match event {
                Event::Start(tag) => self.handle_start_tag(tag),
                Event::End(tag) => self.handle_end_tag(tag),
                Event::Text(text) => self.add_text(&text),
                Event::Code(code) => {
                    self.start_line();
                    self.current_spans.push(Span::styled(
                        code.to_string(),
                        Style::default().fg(Color::Yellow).bg(Color::Rgb(40, 40, 40)),
                    ));
                }
                // Chat replies use single newlines as line breaks.
                Event::SoftBreak | Event::HardBreak => self.flush_line(),
                Event::Rule => {
                    self.flush_line();
                    self.lines.push(Line::from(Span::styled(
                        "─".repeat(self.available_width.min(60)),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                _ => {}
            }
        }

        self.flush_line();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }

    fn handle_start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.add_blank_line();
                let prefix = match level {
                    HeadingLevel::H1 => "# ",
                    HeadingLevel::H2 => "## ",
                    _ => "### ",
                };
                self.start_line();
                self.current_spans
                    .push(Span::styled(prefix, Style::default().fg(Color::Magenta)));
                self.push_style(
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                );
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
                self.push_style(Style::default().fg(Color::Blue));
            }
            Tag::CodeBlock(_) => {
                self.code_block = Some(String::new());
            }
            Tag::List(first) => {
                self.flush_line();
                self.lists.push(first);
            }
            Tag::Item => {
                self.flush_line();
                self.start_line();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let bullet = format!("{indent}{n}. ");
                        *n += 1;
                        bullet
                    }
                    _ => format!("{indent}• "),
                };
                self.current_spans
                    .push(Span::styled(bullet, Style::default().fg(Color::Cyan)));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT));
            }
            Tag::Link { .. } => self.push_style(
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::UNDERLINED),
            ),
            _ => {}
        }
    }

    fn handle_end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.pop_style();
                self.add_blank_line();
            }
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.add_blank_line();
                } else {
                    self.flush_line();
                }
            }
            TagEnd::BlockQuote(_) => {
                self.pop_style();
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code_block.take() {
                    self.render_code_block(&code);
                }
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.add_blank_line();
                } else {
                    self.flush_line();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn plain_lines(md: &str) -> Vec<String> {
        render_markdown(md, 80).iter().map(plain).collect()
    }

    #[test]
    fn strong_and_emphasis_are_styled() {
        let lines = render_markdown("**AI news** is *hot*", 80);
        assert_eq!(lines.len(), 1);

        let bold = lines[0].spans.iter().find(|s| s.content == "AI news").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let italic = lines[0].spans.iter().find(|s| s.content == "hot").unwrap();
        assert!(italic.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn lists_get_bullets_and_numbers() {
        assert_eq!(plain_lines("- one\n- two"), vec!["• one", "• two"]);
        assert_eq!(plain_lines("3. three\n4. four"), vec!["3. three", "4. four"]);
    }

    #[test]
    fn single_newlines_break_lines() {
        assert_eq!(
            plain_lines("📊 **Summary**: calm\nsecond line"),
            vec!["📊 Summary: calm", "second line"]
        );
    }

    #[test]
    fn paragraphs_are_separated_by_one_blank_line() {
        assert_eq!(plain_lines("first\n\nsecond"), vec!["first", "", "second"]);
    }

    #[test]
    fn headings_and_quotes_have_prefixes() {
        assert_eq!(plain_lines("## Results"), vec!["## Results"]);
        assert_eq!(plain_lines("> quoted"), vec!["│ quoted"]);
    }

    #[test]
    fn code_blocks_are_cut_to_width() {
        let lines = render_markdown("```\nshort\nthis line is far too long\n```", 12);
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, vec!["▎ short", "▎ this lin…"]);
    }

    #[test]
    fn task_result_notice_renders() {
        let md = "🎯 **AI news** completed!\n\n📋 **Key Points**:\n- launch\n- funding\n\n🔢 **Data Count**: 3 items analyzed";
        assert_eq!(
            plain_lines(md),
            vec![
                "🎯 AI news completed!",
                "",
                "📋 Key Points:",
                "",
                "• launch",
                "• funding",
                "",
                "🔢 Data Count: 3 items analyzed",
            ]
        );
    }
}
