//! Per-dictionary CSS isolation.
//!
//! Dictionary stylesheets are written for a page the dictionary owns; served
//! side by side they bleed into each other. Every selector is therefore
//! prefixed with the article container's id (`#<dictionary_id>`), while the
//! at-rules that must stay global are copied through. A marker comment at
//! the top of a processed file makes the rewrite idempotent.

use std::path::Path;

use crate::error::Result;

pub const ISOLATED_MARKER: &str = "/* Isolated */\n";

/// Isolate a stylesheet on disk in place. A second invocation is a no-op.
pub fn isolate_css_file(path: &Path, id: &str) -> Result<()> {
    let css = std::fs::read_to_string(path)?;
    if css.starts_with(ISOLATED_MARKER) {
        return Ok(());
    }
    let isolated = format!("{ISOLATED_MARKER}{}", isolate_css(&css, id));
    std::fs::write(path, isolated)?;
    Ok(())
}

/// Rewrite every selector of `css` so it only applies beneath `id`
/// (e.g. `#d-oxford`). `html`/`body` selectors become `<selector> <id>`;
/// `@import`/`@font-face`/`@namespace`/`@charset` rules pass through,
/// `@media` bodies are rewritten recursively, `@page` rules are discarded.
pub fn isolate_css(css: &str, id: &str) -> String {
    let stripped = strip_comments(css);
    let mut out = String::with_capacity(stripped.len() + 64);
    rewrite_rules(&stripped, id, &mut out);
    out
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn rewrite_rules(css: &str, id: &str, out: &mut String) {
    let mut pos = 0;
    while pos < css.len() {
        let rest = &css[pos..];
        let c = rest.chars().next().unwrap();

        if c.is_whitespace() || c == ';' {
            out.push(c);
            pos += c.len_utf8();
            continue;
        }

        if c == '@' {
            pos += consume_at_rule(rest, id, out);
            continue;
        }

        // A selector group runs up to the opening brace.
        let Some(brace) = rest.find('{') else {
            out.push_str(rest);
            return;
        };
        let selectors = &rest[..brace];
        let mut first = true;
        for selector in selectors.split(',') {
            let trimmed = selector.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !first {
                out.push_str(", ");
            }
            first = false;
            if trimmed.eq_ignore_ascii_case("html") || trimmed.eq_ignore_ascii_case("body") {
                out.push_str(trimmed);
                out.push(' ');
                out.push_str(id);
            } else {
                out.push_str(id);
                out.push(' ');
                out.push_str(trimmed);
            }
        }
        out.push(' ');

        match balanced_block(rest, brace) {
            Some(close) => {
                out.push_str(&rest[brace..=close]);
                pos += close + 1;
            }
            None => {
                out.push_str(&rest[brace..]);
                return;
            }
        }
    }
}

/// Handle one at-rule starting at the beginning of `rest`; returns the
/// number of bytes consumed.
fn consume_at_rule(rest: &str, id: &str, out: &mut String) -> usize {
    let lower = rest[..rest.len().min(12)].to_ascii_lowercase();

    if lower.starts_with("@import")
        || lower.starts_with("@charset")
        || lower.starts_with("@namespace")
    {
        let end = rest.find(';').map(|i| i + 1).unwrap_or(rest.len());
        out.push_str(&rest[..end]);
        return end;
    }

    if lower.starts_with("@media") {
        let Some(brace) = rest.find('{') else {
            out.push_str(rest);
            return rest.len();
        };
        let Some(close) = balanced_block(rest, brace) else {
            out.push_str(rest);
            return rest.len();
        };
        out.push_str(&rest[..=brace]);
        rewrite_rules(&rest[brace + 1..close], id, out);
        out.push('}');
        return close + 1;
    }

    if lower.starts_with("@page") {
        return match rest.find('{').and_then(|brace| balanced_block(rest, brace)) {
            Some(close) => close + 1,
            None => rest.len(),
        };
    }

    // @font-face and anything unrecognised: copy the whole rule as is.
    match rest.find('{').and_then(|brace| balanced_block(rest, brace)) {
        Some(close) => {
            out.push_str(&rest[..=close]);
            close + 1
        }
        None => {
            out.push_str(rest);
            rest.len()
        }
    }
}

/// Index of the `}` closing the brace at `open`, honouring nesting.
fn balanced_block(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_prefixed() {
        let css = ".entry { color: red; }\nspan.pos, div.sense { margin: 0; }";
        let out = isolate_css(css, "#d-test");
        assert!(out.contains("#d-test .entry {"));
        assert!(out.contains("#d-test span.pos, #d-test div.sense"));
    }

    #[test]
    fn html_and_body_become_ancestors() {
        let out = isolate_css("body { font-size: 14px; }", "#d-test");
        assert!(out.contains("body #d-test {"));
    }

    #[test]
    fn at_rules_pass_through_and_page_is_dropped() {
        let css = "@import url(x.css);\n@font-face { font-family: A; src: url(a.woff); }\n\
                   @page { margin: 1cm; }\n.x { top: 0; }";
        let out = isolate_css(css, "#d");
        assert!(out.contains("@import url(x.css);"));
        assert!(out.contains("@font-face { font-family: A; src: url(a.woff); }"));
        assert!(!out.contains("@page"));
        assert!(out.contains("#d .x"));
    }

    #[test]
    fn media_bodies_are_rewritten() {
        let out = isolate_css("@media (max-width: 40em) { .x { color: red; } }", "#d");
        assert!(out.contains("@media (max-width: 40em) {"));
        assert!(out.contains("#d .x {"));
    }

    #[test]
    fn file_rewrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.css");
        std::fs::write(&path, ".a { color: red; }").unwrap();
        isolate_css_file(&path, "#d").unwrap();
        let once = std::fs::read_to_string(&path).unwrap();
        isolate_css_file(&path, "#d").unwrap();
        let twice = std::fs::read_to_string(&path).unwrap();
        assert_eq!(once, twice);
        assert!(once.starts_with(ISOLATED_MARKER));
    }

    #[test]
    fn comments_are_removed() {
        let out = isolate_css("/* note */ .a { /* inner */ color: red; }", "#d");
        assert!(!out.contains("note"));
        assert!(out.contains("#d .a"));
    }
}
