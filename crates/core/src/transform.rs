//! Per-dictionary article patches.
//!
//! A few published dictionaries ship markup that renders poorly no matter
//! how faithful the cleaner is; this registry applies small HTML patches
//! keyed by dictionary id, after the regular pipeline has run.

use std::collections::HashMap;

use regex::Regex;

pub type ArticleTransform = fn(&str) -> String;

/// The built-in registry. Keys are catalog ids.
pub fn builtin_transforms() -> HashMap<String, ArticleTransform> {
    let mut transforms: HashMap<String, ArticleTransform> = HashMap::new();
    transforms.insert("d-por-eng_michmoddic_an_1_1".into(), transform_michaelis);
    transforms.insert("d-eng-por_michmoddic_an_1_1".into(), transform_michaelis);
    transforms
}

/// The Michaelis dictionaries run every numbered sense together on one line;
/// break before each sense number and each part-of-speech label.
fn transform_michaelis(html: &str) -> String {
    let re_number = Regex::new(r"<b>\s*(\d+)(.*?)</b>").unwrap();
    let html = re_number.replace_all(html, "<br><b>$1$2</b>").into_owned();
    html.replace(
        "<i> <i><font color=\"green\">",
        "<br><i><font color=\"green\">",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn michaelis_breaks_before_senses() {
        let out = transform_michaelis("<b>1 sm</b> word <b> 2</b> other");
        assert_eq!(out, "<br><b>1 sm</b> word <br><b>2</b> other");
    }
}
