// file: src/corpus/markdown.rs
// description: reduces markdown corpus files to plain text with pulldown-cmark
// reference: https://docs.rs/pulldown-cmark

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

/// Plain text of a markdown document: block elements end with a blank line,
/// soft and hard breaks become newlines, code block bodies are kept verbatim.
pub fn to_plain_text(content: &str) -> String {
    let mut text = String::with_capacity(content.len());

    for event in Parser::new(content) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::Start(Tag::Item) => text.push_str("- "),
            Event::End(TagEnd::Item) => text.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::List(_))
            | Event::End(TagEnd::BlockQuote(_)) => {
                trim_trailing_newlines(&mut text);
                text.push_str("\n\n");
            }
            _ => {}
        }
    }

    text.trim_end().to_string()
}

fn trim_trailing_newlines(text: &mut String) {
    while text.ends_with('\n') {
        text.pop();
    }
}
