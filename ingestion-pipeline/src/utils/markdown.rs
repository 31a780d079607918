use pulldown_cmark::{Event, Options, Parser, TagEnd};

/// Renders Markdown to plain text. Markup is dropped; every block element
/// (paragraph, heading, list item, code block, table row) ends with a single
/// newline so sentence splitting still sees block boundaries.
pub fn markdown_to_plain_text(source: &str) -> String {
    let mut out = String::with_capacity(source.len());

    for event in Parser::new_ext(source, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => push_newline(&mut out),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_)
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => push_newline(&mut out),
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }

    out.trim().to_string()
}

fn push_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_keeps_block_breaks() {
        let source = "# 标题\n\n这是**第一段**。\n\n- 项目一\n- 项目二\n\n`code` and [link](https://example.com)";

        let text = markdown_to_plain_text(source);

        assert_eq!(text, "标题\n这是第一段。\n项目一\n项目二\ncode and link");
    }

    #[test]
    fn code_blocks_keep_their_content() {
        let source = "```rust\nfn main() {}\n```\n";

        assert_eq!(markdown_to_plain_text(source), "fn main() {}");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(markdown_to_plain_text(""), "");
    }
}
