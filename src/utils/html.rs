// src/utils/html.rs

use std::collections::HashSet;

/// Entities the HTML serializer emits inside text nodes.
const TEXT_ENTITIES: [(&str, &str); 5] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&nbsp;", "\u{a0}"),
];

/// Turns a comment body into trimmed plain text.
///
/// Every tag is stripped with `ammonia`; `<script>` and `<style>` lose their
/// contents as well, so a body made only of markup may come back empty.
/// Text is kept as typed: `&` and `<` are not escaped, and running the result
/// through again returns it unchanged.
pub fn sanitize_content(input: &str) -> String {
    let cleaned = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(input.trim())
        .to_string();
    unescape_text(&cleaned).trim().to_string()
}

fn unescape_text(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match TEXT_ENTITIES.iter().find(|(entity, _)| rest.starts_with(*entity)) {
            Some((entity, text)) => {
                out.push_str(text);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
