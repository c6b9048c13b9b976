//! Splits message content into prose and fenced code blocks.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code {
        /// Tag after the opening fence, if any (```rust -> "rust").
        language: Option<String>,
        code: String,
        /// False while the closing fence has not arrived yet.
        complete: bool,
    },
}

const FENCE: &str = "```";

pub fn segments(content: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut text = String::new();
    let mut code: Option<(Option<String>, String)> = None;

    for line in content.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        match code.as_mut() {
            None => {
                if let Some(tag) = bare.trim_start().strip_prefix(FENCE) {
                    push_text(&mut out, &mut text);
                    let tag = tag.trim();
                    let language = (!tag.is_empty()).then(|| tag.to_string());
                    code = Some((language, String::new()));
                } else {
                    text.push_str(line);
                }
            }
            Some((_, body)) => {
                if bare.trim() == FENCE {
                    if let Some((language, body)) = code.take() {
                        out.push(Segment::Code { language, code: body, complete: true });
                    }
                } else {
                    body.push_str(line);
                }
            }
        }
    }

    match code {
        Some((language, body)) => out.push(Segment::Code { language, code: body, complete: false }),
        None => push_text(&mut out, &mut text),
    }
    out
}

fn push_text(out: &mut Vec<Segment>, text: &mut String) {
    if !text.trim().is_empty() {
        out.push(Segment::Text(std::mem::take(text)));
    } else {
        text.clear();
    }
}

/// Plain-terminal rendering: code blocks are framed and labelled.
pub fn to_terminal(content: &str) -> String {
    let mut rendered = String::new();
    for segment in segments(content) {
        match segment {
            Segment::Text(text) => rendered.push_str(&text),
            Segment::Code { language, code, complete } => {
                let label = language.as_deref().unwrap_or("text");
                rendered.push_str(&format!("--- {} ---\n", label));
                rendered.push_str(&code);
                if !code.ends_with('\n') {
                    rendered.push('\n');
                }
                rendered.push_str(if complete { "---\n" } else { "--- (streaming)\n" });
            }
        }
    }
    rendered
}
