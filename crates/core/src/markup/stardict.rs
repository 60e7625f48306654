//! Cleaner for StarDict HTML payloads.
//!
//! StarDict articles are closer to real HTML but carry their own quirks:
//! `bword://` cross references, mixed-case tag names, single-quoted
//! attributes, image paths relative to a `res/` directory shipped beside the
//! dictionary, and an optional outer `<div class="article">` wrapper.

use std::path::Path;

use regex::Regex;
use tracing::warn;

use super::strip_control;

pub struct StarDictHtmlCleaner {
    href_root: String,
    lookup_root: String,
    single_quotes: Regex,
    bword_ref: Regex,
}

impl StarDictHtmlCleaner {
    /// `source_dir`/`source_stem` locate the dictionary's resource directory
    /// (`res/` or `<stem>*/`), which is symlinked into the cache so that
    /// `/api/cache/<id>/…` serves it without copying.
    pub fn new(
        dictionary_id: &str,
        source_dir: &Path,
        source_stem: &str,
        resources_dir: &Path,
    ) -> StarDictHtmlCleaner {
        link_resource_dir(source_dir, source_stem, resources_dir);
        StarDictHtmlCleaner {
            href_root: format!("/api/cache/{dictionary_id}/"),
            lookup_root: format!("/api/lookup/{dictionary_id}/"),
            single_quotes: Regex::new(r#"='([^']*)'([ >])"#).unwrap(),
            bword_ref: Regex::new(r#"href="bword://([^"]+)""#).unwrap(),
        }
    }

    pub fn clean(&self, article: &str, headword: &str) -> String {
        let html = strip_control(article);
        let html = lower_html_tags(&html);
        let html = self.single_quotes.replace_all(&html, "=\"$1\"$2").into_owned();
        let html = self
            .bword_ref
            .replace_all(&html, format!("href=\"{}$1\"", self.lookup_root))
            .into_owned();
        let html = self.fix_lemma_href(html);
        let html = self.fix_src_path(html, "<img");
        let html = self.fix_src_path(html, "<source");
        let html = remove_outer_article_div(html);
        let html = self.fix_img_link(html);
        format!("<h3 class=\"headword\">{headword}</h3>{html}")
    }

    /// `<span class="lemma"><a href="ἀγαθός">…</a></span>` links point
    /// straight at another headword; route them through the lookup API.
    fn fix_lemma_href(&self, mut html: String) -> String {
        let mut search_from = 0;
        while let Some(rel) = html[search_from..].find("<span class=\"lemma\">") {
            let span_start = search_from + rel;
            let Some(span_end) =
                html[span_start..].find("</span>").map(|r| span_start + r)
            else {
                break;
            };
            search_from = span_end;
            let Some(href_rel) = html[span_start..span_end].find(" href=\"") else {
                continue;
            };
            let value_start = span_start + href_rel + " href=\"".len();
            html.insert_str(value_start, &self.lookup_root);
            search_from += self.lookup_root.len();
        }
        html
    }

    /// Prefix `src` attributes of the given tag with the cache root.
    fn fix_src_path(&self, html: String, tag: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut pos = 0;
        while let Some(rel) = html[pos..].find(tag) {
            let tag_start = pos + rel;
            let Some(tag_end) = html[tag_start..].find('>').map(|r| tag_start + r) else {
                break;
            };
            match html[tag_start..tag_end].find(" src=\"") {
                Some(src_rel) => {
                    let value_start = tag_start + src_rel + " src=\"".len();
                    out.push_str(&html[pos..value_start]);
                    out.push_str(&self.href_root);
                    pos = value_start;
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

    /// Bare `<a href="picture.png">` links download images; serve them from
    /// the cache directory too.
    fn fix_img_link(&self, html: String) -> String {
        let mut out = String::with_capacity(html.len());
        let mut pos = 0;
        while let Some(rel) = html[pos..].find("<a href=\"") {
            let value_start = pos + rel + "<a href=\"".len();
            let Some(value_end) = html[value_start..].find('"').map(|r| value_start + r)
            else {
                break;
            };
            let href = &html[value_start..value_end];
            out.push_str(&html[pos..value_start]);
            if super::has_extension(href, super::IMAGE_EXTENSIONS) && !href.contains("://") {
                out.push_str(&self.href_root);
            }
            out.push_str(href);
            pos = value_end;
        }
        out.push_str(&html[pos..]);
        out
    }
}

/// A handful of dictionaries emit upper-case tags; normalise the ones that
/// appear in the wild.
fn lower_html_tags(html: &str) -> String {
    html.replace("<IMG", "<img")
        .replace("</IMG", "</img")
        .replace(" SRC=", " src=")
        .replace("<A HREF=", "<a href=")
        .replace("<A href=", "<a href=")
        .replace("</A>", "</a>")
}

fn remove_outer_article_div(html: String) -> String {
    const OPEN: &str = "<div class=\"article\">";
    const CLOSE: &str = "</div>";
    if html.starts_with(OPEN) && html.ends_with(CLOSE) {
        html[OPEN.len()..html.len() - CLOSE.len()].to_string()
    } else {
        html
    }
}

/// Symlink the dictionary's resource directory into the cache. StarDict
/// keeps media beside the dictionary, so linking beats copying.
fn link_resource_dir(source_dir: &Path, source_stem: &str, resources_dir: &Path) {
    if resources_dir.is_symlink() {
        return;
    }
    if resources_dir.is_dir() {
        // Replace a stale extracted copy with a link.
        if std::fs::remove_dir_all(resources_dir).is_err() {
            return;
        }
    }

    let candidate = source_dir.join("res");
    let target = if candidate.is_dir() {
        Some(candidate)
    } else {
        std::fs::read_dir(source_dir)
            .ok()
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .find(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(source_stem))
            })
    };

    if let Some(target) = target {
        #[cfg(unix)]
        if let Err(e) = std::os::unix::fs::symlink(&target, resources_dir) {
            warn!(target = %target.display(), error = %e, "failed to link resource directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner(dir: &Path) -> StarDictHtmlCleaner {
        StarDictHtmlCleaner::new("d-el", dir, "lexicon", &dir.join("cache"))
    }

    #[test]
    fn bword_refs_become_lookup_urls() {
        let dir = tempfile::tempdir().unwrap();
        let out = cleaner(dir.path()).clean("<a href=\"bword://Bogen\">Bogen</a>", "Bogen");
        assert!(out.starts_with("<h3 class=\"headword\">Bogen</h3>"));
        assert!(out.contains("href=\"/api/lookup/d-el/Bogen\""));
    }

    #[test]
    fn mixed_case_tags_and_single_quotes_are_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let out = cleaner(dir.path()).clean("<IMG SRC='pic.png' >", "w");
        assert!(out.contains("<img src=\"/api/cache/d-el/pic.png\""));
    }

    #[test]
    fn outer_article_div_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let out = cleaner(dir.path()).clean("<div class=\"article\"><p>x</p></div>", "w");
        assert_eq!(out, "<h3 class=\"headword\">w</h3><p>x</p>");
    }

    #[test]
    fn lemma_hrefs_are_routed_through_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let html = "<span class=\"lemma\"><a href=\"ἀγαθός\">ἀγαθός</a></span>";
        let out = cleaner(dir.path()).clean(html, "w");
        assert!(out.contains("href=\"/api/lookup/d-el/ἀγαθός\""));
    }

    #[test]
    fn image_links_are_cached_urls() {
        let dir = tempfile::tempdir().unwrap();
        let out = cleaner(dir.path()).clean("<a href=\"map.png\">map</a>", "w");
        assert!(out.contains("href=\"/api/cache/d-el/map.png\""));
        let out = cleaner(dir.path()).clean("<a href=\"https://x/map.png\">m</a>", "w");
        assert!(out.contains("href=\"https://x/map.png\""));
    }

    #[test]
    fn res_directory_is_symlinked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("res")).unwrap();
        std::fs::write(dir.path().join("res/a.png"), b"png").unwrap();
        let _ = cleaner(dir.path());
        #[cfg(unix)]
        assert!(dir.path().join("cache/a.png").is_file());
    }
}
