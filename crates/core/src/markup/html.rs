//! Cleaner for MDX article bodies.
//!
//! MDX articles are an HTML subset threaded with proprietary conventions:
//! `entry://` cross references, `sound://` audio links, `file://` image
//! paths, relative stylesheet references that live next to the source file,
//! an optional "compact HTML" encoding backed by a style table in the
//! dictionary header, and the `@@@LINK=word` redirect pseudo-body.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;

use super::{strip_non_printing, strip_tags};
use crate::markup::css::isolate_css_file;

pub struct MdxHtmlCleaner {
    source_dir: PathBuf,
    resources_dir: PathBuf,
    css_id: String,
    href_root: String,
    lookup_root: String,
    compact_rules: Option<HashMap<String, (String, String)>>,
    compact_marker: Regex,
}

impl MdxHtmlCleaner {
    /// `styles` is the dictionary header's `StyleSheet` attribute: groups of
    /// three lines (marker index, opening fragment, closing fragment).
    pub fn new(
        source_path: &Path,
        dictionary_id: &str,
        resources_dir: &Path,
        styles: &str,
    ) -> MdxHtmlCleaner {
        let compact_rules = if styles.trim().is_empty() {
            None
        } else {
            let mut rules = HashMap::new();
            let lines: Vec<&str> = styles.lines().collect();
            for triple in lines.chunks(3) {
                if let [index, open, close] = triple {
                    rules.insert(index.to_string(), (open.to_string(), close.to_string()));
                }
            }
            Some(rules)
        };

        MdxHtmlCleaner {
            source_dir: source_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            resources_dir: resources_dir.to_path_buf(),
            css_id: format!("#{dictionary_id}"),
            href_root: format!("/api/cache/{dictionary_id}/"),
            lookup_root: format!("/api/lookup/{dictionary_id}/"),
            compact_rules,
            compact_marker: Regex::new(r"`(\d+)`").unwrap(),
        }
    }

    pub fn clean(&self, article: &str) -> String {
        let html = strip_non_printing(article);
        let html = self.expand_compact_html(&html);
        let html = self.fix_file_path(&html, ".css");
        let html = self.fix_file_path(&html, ".js");
        let html = html.replace("entry://#", "#");
        let html = self.fix_entry_cross_ref(html);
        let html = self.fix_sound_links(html);
        self.fix_img_src(html)
    }

    /// Compact HTML stores markup as backtick-quoted indices into the header
    /// style table; each marker closes the previous rule and opens its own.
    fn expand_compact_html(&self, html: &str) -> String {
        let Some(rules) = &self.compact_rules else {
            return html.to_string();
        };
        let mut out = String::with_capacity(html.len() * 2);
        let mut pos = 0;
        let mut last_close = "";
        for m in self.compact_marker.captures_iter(html) {
            let whole = m.get(0).unwrap();
            let Some((open, close)) = rules.get(&m[1]) else {
                continue;
            };
            out.push_str(&html[pos..whole.start()]);
            out.push_str(last_close);
            out.push_str(open);
            last_close = close;
            pos = whole.end();
        }
        if pos == 0 {
            return html.to_string();
        }
        out.push_str(&html[pos..]);
        out.push_str(last_close);
        out
    }

    /// Rewrite relative `.css`/`.js` references, copying the asset from the
    /// source directory into the cache directory when missing or stale.
    fn fix_file_path(&self, html: &str, extension: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut pos = 0;
        while let Some(rel) = html[pos..].find(extension) {
            let ext_end = pos + rel + extension.len();
            let name_start = html[pos..pos + rel]
                .rfind('"')
                .map(|i| pos + i + 1)
                .unwrap_or(pos);
            let filename = &html[name_start..ext_end];
            out.push_str(&html[pos..name_start]);
            if self.ensure_resource(filename) {
                out.push_str(&self.href_root);
            }
            out.push_str(filename);
            pos = ext_end;
        }
        out.push_str(&html[pos..]);
        out
    }

    /// Copy `filename` beside the source dictionary into the cache directory
    /// (refreshing on mtime change). Returns whether the reference should be
    /// rewritten to the cache URL.
    fn ensure_resource(&self, filename: &str) -> bool {
        if filename.contains("://") || filename.contains("..") || filename.starts_with('/') {
            return false;
        }
        let cached = self.resources_dir.join(filename);
        let source = self.source_dir.join(filename);
        if !source.is_file() {
            return cached.is_file();
        }
        let stale = match (modified(&source), modified(&cached)) {
            (Some(src), Some(dst)) => src > dst,
            (_, None) => true,
            _ => false,
        };
        if stale {
            if let Some(parent) = cached.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::copy(&source, &cached) {
                warn!(file = filename, error = %e, "failed to copy dictionary asset");
                return cached.is_file();
            }
            if filename.ends_with(".css") {
                if let Err(e) = isolate_css_file(&cached, &self.css_id) {
                    warn!(file = filename, error = %e, "failed to isolate stylesheet");
                }
            }
        }
        true
    }

    /// `@@@LINK=word` bodies become a cross-reference link; everywhere else
    /// `entry://word` becomes a lookup URL and anchors are flattened to text.
    fn fix_entry_cross_ref(&self, html: String) -> String {
        if let Some(target) = html.strip_prefix("@@@LINK=") {
            let target = target.trim_end();
            return format!("<a href=\"{}{target}\">{target}</a>", self.lookup_root);
        }
        let html = html.replace("entry://", &self.lookup_root);
        flatten_anchor_children(&html)
    }

    /// Replace `<a href="sound://…">…</a>` with an `<audio>` element; the
    /// first audio reference on the page keeps `autoplay`.
    fn fix_sound_links(&self, html: String) -> String {
        let mut html = html;
        let mut autoplay = "autoplay";
        while let Some(link_start) = html.find("sound://") {
            let Some(link_end) = html[link_start..].find('"').map(|r| link_start + r) else {
                break;
            };
            let url = html[link_start..link_end].replacen("sound://", &self.href_root, 1);
            let Some(inner_start) = html[link_end..].find('>').map(|r| link_end + r + 1) else {
                break;
            };
            let Some(inner_end) = html[inner_start..].find("</a>").map(|r| inner_start + r)
            else {
                break;
            };
            let inner = html[inner_start..inner_end].to_string();
            let outer_start = html[..link_start].rfind("<a").unwrap_or(0);
            let outer_end = inner_end + "</a>".len();
            let replacement = if autoplay.is_empty() {
                format!("<audio controls  src=\"{url}\">{inner}</audio>")
            } else {
                format!("<audio controls {autoplay} src=\"{url}\">{inner}</audio>")
            };
            html.replace_range(outer_start..outer_end, &replacement);
            autoplay = "";
        }
        html
    }

    /// Point `<img src>` at the cache directory, dropping `file://` prefixes.
    fn fix_img_src(&self, html: String) -> String {
        let mut out = String::with_capacity(html.len());
        let mut pos = 0;
        while let Some(rel) = html[pos..].find("<img") {
            let tag_start = pos + rel;
            let Some(tag_end) = html[tag_start..].find('>').map(|r| tag_start + r) else {
                break;
            };
            let tag = &html[tag_start..tag_end];
            match tag.find(" src=\"") {
                Some(src_rel) => {
                    let value_start = tag_start + src_rel + " src=\"".len();
                    let Some(value_end) =
                        html[value_start..tag_end].find('"').map(|r| value_start + r)
                    else {
                        out.push_str(&html[pos..tag_end]);
                        pos = tag_end;
                        continue;
                    };
                    let value = html[value_start..value_end].replace("file://", "");
                    out.push_str(&html[pos..value_start]);
                    out.push_str(&self.href_root);
                    out.push_str(&value);
                    pos = value_end;
                }
                None => {
                    out.push_str(&html[pos..tag_end]);
                    pos = tag_end;
                }
            }
        }
        out.push_str(&html[pos..]);
        out
    }
}

fn modified(path: &Path) -> Option<std::time::SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Some dictionaries wrap anchor text in decorative elements
/// (`<a ...><span class="orth">badly</span></a>`); downstream styling wants
/// the anchor's own text, so inner markup is flattened away.
fn flatten_anchor_children(html: &str) -> String {
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
        let inner = &html[tag_end + 1..close];
        out.push_str(&html[pos..=tag_end]);
        if inner.contains('<') {
            out.push_str(&strip_tags(inner));
        } else {
            out.push_str(inner);
        }
        out.push_str("</a>");
        pos = close + "</a>".len();
    }
    out.push_str(&html[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner(dir: &Path) -> MdxHtmlCleaner {
        MdxHtmlCleaner::new(&dir.join("dict.mdx"), "d-test", &dir.join("cache"), "")
    }

    #[test]
    fn entry_links_become_lookup_urls() {
        let dir = tempfile::tempdir().unwrap();
        let c = cleaner(dir.path());
        let out = c.clean("<a href=\"entry://badly\">badly</a>");
        assert_eq!(out, "<a href=\"/api/lookup/d-test/badly\">badly</a>");
    }

    #[test]
    fn fragment_links_stay_local() {
        let dir = tempfile::tempdir().unwrap();
        let c = cleaner(dir.path());
        let out = c.clean("<a href=\"entry://#frag_nav2\">x</a>");
        assert_eq!(out, "<a href=\"#frag_nav2\">x</a>");
    }

    #[test]
    fn link_bodies_become_cross_references() {
        let dir = tempfile::tempdir().unwrap();
        let c = cleaner(dir.path());
        let out = c.clean("@@@LINK=colour\r\n\u{0}");
        assert_eq!(out, "<a href=\"/api/lookup/d-test/colour\">colour</a>");
    }

    #[test]
    fn nested_anchor_children_are_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let c = cleaner(dir.path());
        let out =
            c.clean("<a href=\"entry://badly\"><span class=\"orth\">badly</span></a>");
        assert_eq!(out, "<a href=\"/api/lookup/d-test/badly\">badly</a>");
    }

    #[test]
    fn only_first_sound_link_autoplays() {
        let dir = tempfile::tempdir().unwrap();
        let c = cleaner(dir.path());
        let html = "<a href=\"sound://a/1.mp3\">s1</a><a href=\"sound://a/2.mp3\">s2</a>";
        let out = c.clean(html);
        assert_eq!(out.matches("autoplay").count(), 1);
        assert!(out.contains("<audio controls autoplay src=\"/api/cache/d-test/a/1.mp3\">"));
        assert!(out.contains("src=\"/api/cache/d-test/a/2.mp3\""));
    }

    #[test]
    fn img_sources_point_at_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let c = cleaner(dir.path());
        let out = c.clean("<img width=\"16\" src=\"file:///img/star.png\">");
        assert!(out.contains("src=\"/api/cache/d-test//img/star.png\""));
    }

    #[test]
    fn stylesheets_are_copied_isolated_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.css"), ".x { color: red; }").unwrap();
        let c = cleaner(dir.path());
        let out = c.clean("<link rel=\"stylesheet\" href=\"style.css\">");
        assert!(out.contains("href=\"/api/cache/d-test/style.css\""));
        let cached = std::fs::read_to_string(dir.path().join("cache/style.css")).unwrap();
        assert!(cached.contains("#d-test .x"));
    }

    #[test]
    fn compact_html_markers_expand_via_style_table() {
        let dir = tempfile::tempdir().unwrap();
        let styles = "1\n<b>\n</b>\n2\n<i>\n</i>";
        let c = MdxHtmlCleaner::new(&dir.path().join("d.mdx"), "d-test", dir.path(), styles);
        let out = c.clean("`1`bold`2`italic");
        assert_eq!(out, "<b>bold</b><i>italic</i>");
    }

    #[test]
    fn missing_assets_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let c = cleaner(dir.path());
        let out = c.clean("<link href=\"absent.css\">");
        assert!(out.contains("href=\"absent.css\""));
    }
}
