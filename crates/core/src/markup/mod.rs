//! Markup post-processing: format-native article markup is rewritten into a
//! common HTML dialect whose media, link, and style references point at the
//! engine's own HTTP surface.

pub mod css;
pub mod dsl;
pub mod html;
pub mod stardict;
pub mod xdxf;

/// Separator placed between articles of one response.
pub const ARTICLE_SEPARATOR: &str = "\n<hr />\n";

/// File-type classes used when lifting bare media references into elements.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "bmp", "tif", "tiff", "ico", "webp", "avif", "apng",
    "jfif", "pjpeg", "pjp",
];
pub const SOUND_EXTENSIONS: &[&str] = &["mp3", "ogg", "wav", "wave"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogv"];

pub(crate) fn extension_of(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or("")
}

pub(crate) fn has_extension(name: &str, class: &[&str]) -> bool {
    let ext = extension_of(name);
    class.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

/// Drop the C0/C1 control characters that binary-era articles tend to carry
/// (tab, CR, and LF survive).
pub(crate) fn strip_non_printing(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(u32::from(*c), 0x00..=0x08 | 0x0b | 0x0c | 0x0e..=0x1f | 0x7f..=0x9f)
        })
        .collect()
}

/// Wider variant used for StarDict payloads, where embedded newlines are
/// already markup (`<br>`) by the time this runs.
pub(crate) fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(u32::from(*c), 0x00..=0x1f | 0x7f..=0x9f))
        .collect()
}

/// Remove every `<...>` run, keeping only text content.
pub(crate) fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Resolve the handful of entities that survive into DSL article text.
pub(crate) fn unescape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &rest[amp + 1..];
            continue;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse().ok()
                    }
                })
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=semi]),
        }
        rest = &rest[amp + semi + 1..];
    }
    out.push_str(rest);
    out
}

/// Strip media elements and unwrap links, leaving flashcard-friendly HTML.
pub fn strip_media(html: &str) -> String {
    let mut out = remove_elements(html, "img", false);
    out = remove_elements(&out, "source", false);
    out = remove_elements(&out, "audio", true);
    out = remove_elements(&out, "video", true);
    unwrap_anchors(&out)
}

/// Remove `<tag ...>` occurrences; with `paired` the closing tag and the
/// content between are removed too.
fn remove_elements(html: &str, tag: &str, paired: bool) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(rel) = html[pos..].find(&open) {
        let start = pos + rel;
        let after = &html[start + open.len()..];
        if !after.starts_with([' ', '>', '/', '\t', '\n']) {
            // A longer tag name that merely shares the prefix.
            out.push_str(&html[pos..start + open.len()]);
            pos = start + open.len();
            continue;
        }
        out.push_str(&html[pos..start]);
        let end = if paired {
            html[start..].find(&close).map(|r| start + r + close.len())
        } else {
            html[start..].find('>').map(|r| start + r + 1)
        };
        match end {
            Some(end) => pos = end,
            None => {
                pos = html.len();
            }
        }
    }
    out.push_str(&html[pos..]);
    out
}

/// Replace `<a ...>inner</a>` with the inner text.
fn unwrap_anchors(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(rel) = html[pos..].find("<a") {
        let start = pos + rel;
        let after = &html[start + 2..];
        if !after.starts_with([' ', '>', '\t', '\n']) {
            out.push_str(&html[pos..start + 2]);
            pos = start + 2;
            continue;
        }
        let Some(tag_end) = html[start..].find('>').map(|r| start + r) else {
            break;
        };
        let Some(close) = html[tag_end..].find("</a>").map(|r| tag_end + r) else {
            break;
        };
        out.push_str(&html[pos..start]);
        out.push_str(&strip_tags(&html[tag_end + 1..close]));
        pos = close + 4;
    }
    out.push_str(&html[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_printing_bytes_are_dropped() {
        assert_eq!(strip_non_printing("a\u{0}b\u{8}c\nd\te"), "abc\nd\te");
        assert_eq!(strip_control("a\nb\tc"), "abc");
    }

    #[test]
    fn tags_are_stripped_text_kept() {
        assert_eq!(strip_tags("<span class=\"orth\">badly</span>"), "badly");
    }

    #[test]
    fn entity_unescape_handles_numeric_forms() {
        assert_eq!(unescape_html("&amp;&lt;&#65;&#x42;"), "&<AB");
        assert_eq!(unescape_html("no entities"), "no entities");
        assert_eq!(unescape_html("&unknown;"), "&unknown;");
    }

    #[test]
    fn strip_media_removes_players_and_unwraps_links() {
        let html = concat!(
            "<p>word</p>",
            "<img src=\"/api/cache/d/a.png\"/>",
            "<audio controls autoplay src=\"x.mp3\">x</audio>",
            "<a href=\"/api/query/g/cat\">cat</a>",
        );
        assert_eq!(strip_media(html), "<p>word</p>cat");
    }

    #[test]
    fn prefixed_tag_names_survive() {
        let html = "<video controls src=\"v\">v</video><videoish>x</videoish>";
        assert_eq!(strip_media(html), "<videoish>x</videoish>");
    }
}
