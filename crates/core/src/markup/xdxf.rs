//! XDXF fragments → HTML.
//!
//! Only the tag subset that occurs in StarDict payloads is handled. The
//! output is deliberately `bword://`-flavoured HTML: it is always fed to the
//! StarDict HTML cleaner afterwards, which rewrites the references and
//! prepends the headword.

use regex::Regex;

use super::{has_extension, IMAGE_EXTENSIONS, SOUND_EXTENSIONS};

pub struct XdxfCleaner {
    rref: Regex,
    kref: Regex,
    color: Regex,
    drop: Regex,
}

impl Default for XdxfCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl XdxfCleaner {
    pub fn new() -> XdxfCleaner {
        XdxfCleaner {
            rref: Regex::new(r"(?s)<\s*rref[^>]*>(.*?)<\s*/\s*rref\s*>").unwrap(),
            kref: Regex::new(r"(?s)<kref[^>]*>(.*?)</kref>").unwrap(),
            color: Regex::new(r#"<c c="([^"]+)">"#).unwrap(),
            drop: Regex::new(r"</?(?:ar|dtrn|nu|sr|mrkd)[^>]*>").unwrap(),
        }
    }

    /// Convert to HTML that still needs the StarDict HTML cleaner pass.
    pub fn clean(&self, xdxf: &str) -> String {
        // Lift resource references first: their bodies are file names, not
        // markup, and must not be touched by the tag mapping below.
        let mut resources: Vec<String> = Vec::new();
        let html = self
            .rref
            .replace_all(xdxf, |caps: &regex::Captures<'_>| {
                resources.push(caps[1].to_string());
                "\u{f8ff}rref\u{f8ff}".to_string()
            })
            .into_owned();

        let html = self.kref.replace_all(&html, "<a href=\"bword://$1\">$1</a>").into_owned();
        let html = self.color.replace_all(&html, "<font color=\"$1\">").into_owned();
        let html = self.drop.replace_all(&html, "").into_owned();

        let html = html
            .replace("<k>", "<b class=\"k\">")
            .replace("</k>", "</b>")
            .replace("<c>", "<font color=\"green\">")
            .replace("</c>", "</font>")
            .replace("<abr>", "<i class=\"abbr\">")
            .replace("</abr>", "</i>")
            .replace("<abbr>", "<i class=\"abbr\">")
            .replace("</abbr>", "</i>")
            .replace("<ex>", "<span class=\"ex\"><font color=\"steelblue\">")
            .replace("</ex>", "</font></span>")
            .replace("<co>", "<span class=\"co\">(")
            .replace("</co>", ")</span>")
            .replace("<tr>", "<span class=\"tr\">[")
            .replace("</tr>", "]</span>")
            .replace("<gr>", "<i class=\"gr\"><font color=\"green\">")
            .replace("</gr>", "</font></i>")
            .replace("<def>", "<div class=\"def\">")
            .replace("</def>", "</div>");

        // Re-insert the lifted resources as concrete media elements.
        let mut out = html;
        for name in resources {
            let element = if has_extension(&name, IMAGE_EXTENSIONS) {
                format!("<img src=\"{name}\" />")
            } else if has_extension(&name, SOUND_EXTENSIONS) {
                format!("<audio controls autoplay src=\"{name}\">audio</audio>")
            } else {
                format!("<a href=\"{name}\">download media</a>")
            };
            out = out.replacen("\u{f8ff}rref\u{f8ff}", &element, 1);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn krefs_become_bword_links() {
        let out = XdxfCleaner::new().clean("<ar><k>cat</k> see <kref>feline</kref></ar>");
        assert!(out.contains("<b class=\"k\">cat</b>"));
        assert!(out.contains("<a href=\"bword://feline\">feline</a>"));
        assert!(!out.contains("<ar>"));
    }

    #[test]
    fn rrefs_are_lifted_by_media_kind() {
        let c = XdxfCleaner::new();
        assert!(c.clean("<rref>pic.png</rref>").contains("<img src=\"pic.png\" />"));
        assert!(c
            .clean("<rref>word.wav</rref>")
            .contains("<audio controls autoplay src=\"word.wav\">"));
        assert!(c
            .clean("<rref>table.pdf</rref>")
            .contains("<a href=\"table.pdf\">download media</a>"));
    }

    #[test]
    fn colors_and_examples_map_to_fonts() {
        let out = XdxfCleaner::new().clean("<c c=\"red\">x</c><ex>y</ex>");
        assert!(out.contains("<font color=\"red\">x</font>"));
        assert!(out.contains("<span class=\"ex\"><font color=\"steelblue\">y</font></span>"));
    }
}
