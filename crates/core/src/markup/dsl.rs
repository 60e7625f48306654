//! Lingvo DSL markup → HTML.
//!
//! DSL articles are tag soup in square brackets (`[b]`, `[m2]`, `[s]…[/s]`)
//! with backslash escapes. The converter strips the tags that carry no
//! presentation (`[trn]`, `[lang]`, `[com]`), escapes HTML metacharacters,
//! translates the formatting tags, resolves `[s]` media references against
//! the dictionary's companion resources, and rewrites `[ref]`/`<<…>>` cross
//! references into lookup links.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use regex::{Captures, Regex};
use tracing::warn;

use super::{
    escape_html, has_extension, unescape_html, IMAGE_EXTENSIONS, SOUND_EXTENSIONS,
    VIDEO_EXTENSIONS,
};

pub struct DslConverter {
    resources_dir: PathBuf,
    href_root: String,
    lookup_root: String,
    /// Companion `<name>.files.zip`, extracted lazily as references appear.
    resources_zip: Option<PathBuf>,
    extracted: Mutex<HashSet<String>>,

    re_brackets: Regex,
    re_lang_open: Regex,
    re_m_open: Regex,
    re_c_color: Regex,
    re_m_block: Regex,
    re_line_end: Regex,
    re_ref: Regex,
    re_escaped_ref: Regex,
    re_remnant_m: Regex,
    re_hr_plain: Regex,
    re_hr_indent: Regex,
}

impl DslConverter {
    /// `source_path` is the `.dsl`/`.dsl.dz` file; its sibling `.files.zip`
    /// archive or `.files` directory provides the article media. A directory
    /// is symlinked into the cache, an archive is remembered for lazy
    /// extraction.
    pub fn new(source_path: &Path, dictionary_id: &str, resources_dir: &Path) -> DslConverter {
        let resources_zip = locate_resources(source_path, resources_dir);
        DslConverter {
            resources_dir: resources_dir.to_path_buf(),
            href_root: format!("/api/cache/{dictionary_id}/"),
            lookup_root: format!("/api/lookup/{dictionary_id}/"),
            resources_zip,
            extracted: Mutex::new(HashSet::new()),
            re_brackets: Regex::new(r"\{\{[^}]*\}\}").unwrap(),
            re_lang_open: Regex::new(r"\[lang[^\]]*\]").unwrap(),
            re_m_open: Regex::new(r"\[m\d\]").unwrap(),
            re_c_color: Regex::new(r"\[c (\w+)\]").unwrap(),
            re_m_block: Regex::new(r"\[m(\d)\](.*?)\[/m\]").unwrap(),
            re_line_end: Regex::new(r"(?m)\\$").unwrap(),
            re_ref: Regex::new(r"<<(.*?)>>").unwrap(),
            re_escaped_ref: Regex::new(r"&lt;&lt;([^&]+)&gt;&gt;").unwrap(),
            re_remnant_m: Regex::new(r"\[(?:/m|m[^\]]*)\]").unwrap(),
            re_hr_plain: Regex::new(r"\[m1\]-{2,}\[/m\]").unwrap(),
            re_hr_indent: Regex::new(r"\[m(\d)\]-{2,}\[/m\]").unwrap(),
        }
    }

    pub fn convert(&self, text: &str, headword: &str) -> String {
        // Close the `[m…]` blocks that dictionaries habitually leave open at
        // line ends; the block regex below assumes balance.
        let mut balanced = String::with_capacity(text.len());
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                balanced.push('\n');
            }
            balanced.push_str(line);
            if line.trim_start().starts_with("[m") && !line.ends_with("[/m]") {
                balanced.push_str("[/m]");
            }
        }

        let html = self.convert_tags(&balanced);
        let html = self.finish_html(html);
        format!("<h3 class=\"headword\">{}</h3>{html}", escape_html(headword))
    }

    fn convert_tags(&self, text: &str) -> String {
        let text = self.re_brackets.replace_all(text, "").into_owned();

        let text = text
            .replace("[trn]", "")
            .replace("[/trn]", "")
            .replace("[trs]", "")
            .replace("[/trs]", "")
            .replace("[!trn]", "")
            .replace("[/!trn]", "")
            .replace("[!trs]", "")
            .replace("[/!trs]", "");

        let text = replace_unescaped(&text, &self.re_lang_open, "").replace("[/lang]", "");
        let text = text.replace("[com]", "").replace("[/com]", "");

        let text = escape_html(&unescape_html(&text));

        let text = text
            .replace("[t]", "<font face=\"Helvetica\" class=\"dsl_t\">")
            .replace("[/t]", "</font>");

        let text = self.re_line_end.replace_all(&text, "<br/>").into_owned();

        // Paragraphs: normalise [m] to [m1]; wrap bare articles so the block
        // rule below applies uniformly.
        let mut text = text.replace("[m]", "[m1]");
        if !has_unescaped(&text, &self.re_m_open) {
            text = format!("[m1]{text}[/m]");
        }

        // `[mN]-----[/m]` draws a rule.
        let text = self.re_hr_plain.replace_all(&text, "<hr/>").into_owned();
        let text = self
            .re_hr_indent
            .replace_all(&text, "<hr style=\"margin-left:${1}em\"/>")
            .into_owned();

        let text = self
            .re_m_block
            .replace_all(&text, "<div style=\"margin-left:${1}em\">${2}</div>")
            .into_owned();

        let text = text
            .replace("[']", "<u>")
            .replace("[/']", "</u>")
            .replace("[b]", "<b>")
            .replace("[/b]", "</b>")
            .replace("[i]", "<i>")
            .replace("[/i]", "</i>")
            .replace("[u]", "<u>")
            .replace("[/u]", "</u>")
            .replace("[sup]", "<sup>")
            .replace("[/sup]", "</sup>")
            .replace("[sub]", "<sub>")
            .replace("[/sub]", "</sub>");

        let text = text.replace("[c]", "<font color=\"green\">");
        let text = self.re_c_color.replace_all(&text, "<font color=\"${1}\">").into_owned();
        let text = text.replace("[/c]", "</font>");

        let text = text
            .replace("[ex]", "<span class=\"ex\"><font color=\"steelblue\">")
            .replace("[/ex]", "</font></span>")
            .replace("[*]", "<span class=\"sec\">")
            .replace("[/*]", "</span>")
            .replace("[p]", "<i class=\"p\"><font color=\"green\">")
            .replace("[/p]", "</font></i>");

        // Cross references: [ref]/[url] share the << >> notation.
        let text = text
            .replace("[ref]", "<<")
            .replace("[/ref]", ">>")
            .replace("[url]", "<<")
            .replace("[/url]", ">>");
        let text = self
            .re_ref
            .replace_all(&text, |caps: &Captures<'_>| self.lookup_link(&caps[1]))
            .into_owned();

        let text = text.replace("\\[", "[").replace("\\]", "]");

        text.replace('\n', "<br/>")
    }

    fn finish_html(&self, html: String) -> String {
        let html = html.replace("\\ ", "");
        let html = self.re_remnant_m.replace_all(&html, "").into_owned();
        let html = self
            .re_escaped_ref
            .replace_all(&html, |caps: &Captures<'_>| self.lookup_link(&caps[1]))
            .into_owned();
        self.correct_media_references(html)
    }

    fn lookup_link(&self, word: &str) -> String {
        let word = unescape_html(word);
        format!("<a href=\"{}{word}\">{}</a>", self.lookup_root, escape_html(&word))
    }

    /// `[s]name.ext[/s]` becomes the element its extension calls for; the
    /// first audio reference of an article keeps `autoplay`. Referenced files
    /// missing from the cache are pulled out of the companion archive.
    fn correct_media_references(&self, html: String) -> String {
        let mut html = html;
        let mut missing: Vec<String> = Vec::new();
        let mut autoplay = "autoplay";
        let mut search_from = 0;
        loop {
            let Some(rel) = html[search_from..].find("[s]") else {
                break;
            };
            let begin = search_from + rel;
            let Some(end) = html[begin..].find("[/s]").map(|r| begin + r) else {
                break;
            };
            let name = html[begin + 3..end].to_string();

            if !self.resources_dir.join(&name).is_file() {
                missing.push(name.clone());
            }

            let media_ref = format!("{}{name}", self.href_root);
            let element = if has_extension(&name, IMAGE_EXTENSIONS) {
                format!("<img src=\"{media_ref}\" />")
            } else if has_extension(&name, SOUND_EXTENSIONS) {
                let e = format!("<audio controls {autoplay} src=\"{media_ref}\">{name}</audio>");
                autoplay = "";
                e
            } else if has_extension(&name, VIDEO_EXTENSIONS) {
                format!("<video controls src=\"{media_ref}\">video</video>")
            } else {
                format!("<a href=\"{media_ref}\">{name}</a>")
            };
            html.replace_range(begin..end + 4, &element);
            search_from = begin + element.len();
        }

        if !missing.is_empty() {
            self.extract_files(&missing);
        }
        html
    }

    fn extract_files(&self, names: &[String]) {
        let Some(zip_path) = &self.resources_zip else {
            return;
        };
        let mut extracted = self.extracted.lock().unwrap();
        let pending: Vec<&String> =
            names.iter().filter(|n| !extracted.contains(n.as_str())).collect();
        if pending.is_empty() {
            return;
        }

        let archive = std::fs::File::open(zip_path)
            .map_err(|e| e.to_string())
            .and_then(|f| zip::ZipArchive::new(f).map_err(|e| e.to_string()));
        let mut archive = match archive {
            Ok(archive) => archive,
            Err(e) => {
                warn!(archive = %zip_path.display(), error = e, "cannot open resource archive");
                return;
            }
        };

        for name in pending {
            extracted.insert(name.clone());
            let mut entry = match archive.by_name(name) {
                Ok(entry) => entry,
                Err(_) => {
                    warn!(resource = name.as_str(), "missing from the resource archive");
                    continue;
                }
            };
            let target = self.resources_dir.join(name);
            if let Some(parent) = target.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let result = std::fs::File::create(&target)
                .and_then(|mut f| std::io::copy(&mut entry, &mut f));
            if let Err(e) = result {
                warn!(resource = name.as_str(), error = %e, "failed to extract resource");
            }
        }
    }
}

/// Find the sibling resource container: a `.files` directory is symlinked
/// into the cache, a `.files.zip` archive is returned for lazy extraction.
fn locate_resources(source_path: &Path, resources_dir: &Path) -> Option<PathBuf> {
    let name = source_path.file_name()?.to_str()?;
    let base = name
        .strip_suffix(".dsl.dz")
        .or_else(|| name.strip_suffix(".dsl"))
        .unwrap_or(name);
    let dir = source_path.parent()?;

    let files_dir = dir.join(format!("{base}.files"));
    if files_dir.is_dir() {
        #[cfg(unix)]
        if !resources_dir.exists() && !resources_dir.is_symlink() {
            if let Err(e) = std::os::unix::fs::symlink(&files_dir, resources_dir) {
                warn!(target = %files_dir.display(), error = %e, "failed to link resources");
            }
        }
        return None;
    }

    let zip_path = dir.join(format!("{base}.files.zip"));
    zip_path.is_file().then_some(zip_path)
}

/// Apply a removal regex, skipping matches preceded by a backslash (the
/// regex crate has no lookbehind).
fn replace_unescaped(text: &str, re: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for m in re.find_iter(text) {
        if m.start() > 0 && text.as_bytes()[m.start() - 1] == b'\\' {
            continue;
        }
        out.push_str(&text[pos..m.start()]);
        out.push_str(replacement);
        pos = m.end();
    }
    out.push_str(&text[pos..]);
    out
}

fn has_unescaped(text: &str, re: &Regex) -> bool {
    re.find_iter(text)
        .any(|m| m.start() == 0 || text.as_bytes()[m.start() - 1] != b'\\')
}
