/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Body rendering: markdown in, allow-listed HTML out.
//!
//! The pipeline is markdown conversion, allow-list sanitization, then
//! auto-linking of bare URLs and email addresses in the remaining text.
//! Posts get block-level markup; comments are restricted to inline emphasis.
//! Output is a pure function of the input string.

use ammonia::Builder;
use linkify::{LinkFinder, LinkKind};
use pulldown_cmark::{html, Options, Parser};

/// Markup allowed in post bodies.
const POST_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "pre", "strong",
    "ul", "h1", "h2", "h3", "p",
];

/// Markup allowed in comment bodies. Narrower on purpose: comments carry
/// inline emphasis only, no headings or block structure.
const COMMENT_TAGS: &[&str] = &["a", "abbr", "acronym", "b", "code", "em", "i", "strong"];

pub fn render_post(raw: &str) -> String {
    render_with_tags(raw, POST_TAGS)
}

pub fn render_comment(raw: &str) -> String {
    render_with_tags(raw, COMMENT_TAGS)
}

fn render_with_tags(raw: &str, tags: &[&str]) -> String {
    let parser = Parser::new_ext(raw, Options::empty());
    let mut markup = String::with_capacity(raw.len() * 2);
    html::push_html(&mut markup, parser);

    let mut builder = Builder::default();
    builder
        .tags(tags.iter().copied().collect())
        .url_schemes(["http", "https", "mailto"].into_iter().collect())
        .link_rel(Some("nofollow"));
    let clean = builder.clean(&markup).to_string();

    autolink(&clean)
}

/// Wraps bare URLs and email addresses found in text nodes with anchors.
/// Text already inside an `<a>` element is left alone.
fn autolink(html: &str) -> String {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url, LinkKind::Email]);

    let mut out = String::with_capacity(html.len());
    let mut anchor_depth = 0usize;
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        let (text, tail) = rest.split_at(lt);
        link_text(&mut out, text, anchor_depth == 0, &finder);

        let Some(gt) = tail.find('>') else {
            // Unterminated tag cannot come out of the sanitizer; keep it verbatim.
            out.push_str(tail);
            return out;
        };
        let tag = &tail[..=gt];
        let lower = tag.to_ascii_lowercase();
        if lower.starts_with("<a ") || lower.starts_with("<a>") {
            anchor_depth += 1;
        } else if lower.starts_with("</a") {
            anchor_depth = anchor_depth.saturating_sub(1);
        }
        out.push_str(tag);
        rest = &tail[gt + 1..];
    }
    link_text(&mut out, rest, anchor_depth == 0, &finder);
    out
}

fn link_text(out: &mut String, text: &str, allow: bool, finder: &LinkFinder) {
    if text.is_empty() {
        return;
    }
    if !allow {
        out.push_str(text);
        return;
    }
    for span in finder.spans(text) {
        let s = span.as_str();
        match span.kind() {
            Some(&LinkKind::Url) => {
                out.push_str(&format!("<a href=\"{s}\" rel=\"nofollow\">{s}</a>"));
            }
            Some(&LinkKind::Email) => {
                out.push_str(&format!("<a href=\"mailto:{s}\" rel=\"nofollow\">{s}</a>"));
            }
            _ => out.push_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_stripped_and_url_linked() {
        let rendered = render_comment("<script>x</script>hello http://example.com");
        assert!(!rendered.contains("<script"));
        assert!(rendered.contains("hello"));
        assert!(rendered.contains("<a href=\"http://example.com\""));
    }

    #[test]
    fn rendering_is_deterministic() {
        let raw = "# Title\n\nsome *emphasis* and http://example.com\n";
        assert_eq!(render_post(raw), render_post(raw));
    }

    #[test]
    fn post_keeps_headings_comment_strips_them() {
        let raw = "# Title";
        assert!(render_post(raw).contains("<h1>"));
        let comment = render_comment(raw);
        assert!(!comment.contains("<h1>"));
        assert!(comment.contains("Title"));
    }

    #[test]
    fn markdown_emphasis_survives_both_surfaces() {
        assert!(render_post("*hi*").contains("<em>hi</em>"));
        assert!(render_comment("*hi*").contains("<em>hi</em>"));
    }

    #[test]
    fn email_addresses_get_mailto_links() {
        let rendered = render_comment("write to alice@example.com please");
        assert!(rendered.contains("<a href=\"mailto:alice@example.com\""));
    }

    #[test]
    fn existing_markdown_links_are_not_double_linked() {
        let rendered = render_post("[site](http://example.com)");
        assert_eq!(rendered.matches("<a ").count(), 1);
    }

    #[test]
    fn disallowed_blocks_never_survive_in_comments() {
        let rendered = render_comment("> quoted\n\n1. item");
        assert!(!rendered.contains("<blockquote"));
        assert!(!rendered.contains("<ol"));
        assert!(rendered.contains("quoted"));
        assert!(rendered.contains("item"));
    }
}
