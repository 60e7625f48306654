//! Chinese script detection and traditional↔simplified conversion.
//!
//! Conversion is driven by optional on-disk tables (`chinese/s2t.tsv` and
//! `chinese/t2s.tsv` under the app resources root, one `source<TAB>target`
//! mapping per line, phrases allowed). Absent tables degrade to identity, so
//! the feature is fully optional. Matching is greedy longest-first, bounded
//! by the longest source phrase in the table.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

/// True when the text contains CJK ideographs.
pub fn is_chinese(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(
            u32::from(c),
            0x4e00..=0x9fff        // URO
            | 0x3400..=0x4dbf      // extension A
            | 0xf900..=0xfaff     // compatibility ideographs
            | 0x20000..=0x2ebef   // extensions B..F
            | 0x30000..=0x3134a   // extension G
        )
    })
}

struct ConversionTable {
    mappings: HashMap<String, String>,
    max_len: usize,
}

impl ConversionTable {
    fn load(path: &Path) -> Option<ConversionTable> {
        let content = std::fs::read_to_string(path).ok()?;
        let mut mappings = HashMap::new();
        let mut max_len = 0;
        for line in content.lines() {
            let Some((source, target)) = line.split_once('\t') else {
                continue;
            };
            // Multi-target rows keep only the first candidate.
            let target = target.split_whitespace().next().unwrap_or(target);
            max_len = max_len.max(source.chars().count());
            mappings.insert(source.to_string(), target.to_string());
        }
        if mappings.is_empty() {
            return None;
        }
        info!(path = %path.display(), phrases = mappings.len(), "loaded Chinese conversion table");
        Some(ConversionTable { mappings, max_len })
    }

    fn convert(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        while pos < chars.len() {
            let mut matched = 0;
            let upper = self.max_len.min(chars.len() - pos);
            for len in (1..=upper).rev() {
                let candidate: String = chars[pos..pos + len].iter().collect();
                if let Some(target) = self.mappings.get(&candidate) {
                    out.push_str(target);
                    matched = len;
                    break;
                }
            }
            if matched == 0 {
                out.push(chars[pos]);
                matched = 1;
            }
            pos += matched;
        }
        out
    }
}

/// Optional traditional↔simplified conversion tables.
#[derive(Default)]
pub struct ChineseConversion {
    to_traditional: Option<ConversionTable>,
    to_simplified: Option<ConversionTable>,
}

/// User preference for article-body script conversion. Serialised with the
/// locale spellings users put in `preferences.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChinesePreference {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "cn")]
    Simplified,
    #[serde(rename = "tw")]
    Traditional,
}

impl ChineseConversion {
    /// Load the tables from `<resources_root>/chinese/` when present.
    pub fn load(resources_root: &Path) -> ChineseConversion {
        let dir = resources_root.join("chinese");
        ChineseConversion {
            to_traditional: ConversionTable::load(&dir.join("s2t.tsv")),
            to_simplified: ConversionTable::load(&dir.join("t2s.tsv")),
        }
    }

    pub fn traditional(&self, text: &str) -> String {
        match &self.to_traditional {
            Some(table) => table.convert(text),
            None => text.to_string(),
        }
    }

    pub fn simplified(&self, text: &str) -> String {
        match &self.to_simplified {
            Some(table) => table.convert(text),
            None => text.to_string(),
        }
    }

    /// Two-way conversion of a query key; identity (one variant) without
    /// tables.
    pub fn transliterate(&self, text: &str) -> Vec<String> {
        if self.to_traditional.is_none() && self.to_simplified.is_none() {
            return vec![text.to_string()];
        }
        vec![self.traditional(text), self.simplified(text)]
    }

    pub fn convert_preferred(&self, text: &str, preference: ChinesePreference) -> String {
        match preference {
            ChinesePreference::None => text.to_string(),
            ChinesePreference::Simplified => self.simplified(text),
            ChinesePreference::Traditional => self.traditional(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_cjk() {
        assert!(is_chinese("词典"));
        assert!(is_chinese("mixed 词 text"));
        assert!(!is_chinese("dictionary"));
    }

    #[test]
    fn absent_tables_are_identity() {
        let conv = ChineseConversion::default();
        assert_eq!(conv.transliterate("词典"), vec!["词典".to_string()]);
        assert_eq!(conv.traditional("词典"), "词典");
    }

    #[test]
    fn longest_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        let chinese_dir = dir.path().join("chinese");
        std::fs::create_dir_all(&chinese_dir).unwrap();
        let mut f = std::fs::File::create(chinese_dir.join("s2t.tsv")).unwrap();
        writeln!(f, "图\t圖").unwrap();
        writeln!(f, "图书馆\t圖書館").unwrap();
        drop(f);

        let conv = ChineseConversion::load(dir.path());
        assert_eq!(conv.traditional("图书馆"), "圖書館");
        assert_eq!(conv.traditional("图x"), "圖x");
        // t2s table is absent: simplification is identity.
        assert_eq!(conv.simplified("圖"), "圖");
    }
}
