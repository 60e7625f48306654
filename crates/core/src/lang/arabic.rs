//! One-way transliteration from the Buckwalter ASCII scheme into Arabic
//! script (https://en.wikipedia.org/wiki/Buckwalter_transliteration).

const ASCII: &str = "'|>&<}AbptvjHxd*rzs$SDTZEg_fqklmnhwYyFNKaui~o`{";
const ARABIC: &str = "\u{621}\u{622}\u{623}\u{624}\u{625}\u{626}\u{627}\u{628}\u{629}\u{62a}\
\u{62b}\u{62c}\u{62d}\u{62e}\u{62f}\u{630}\u{631}\u{632}\u{633}\u{634}\u{635}\u{636}\u{637}\
\u{638}\u{639}\u{63a}\u{640}\u{641}\u{642}\u{643}\u{644}\u{645}\u{646}\u{647}\u{648}\u{649}\
\u{64a}\u{64b}\u{64c}\u{64d}\u{64e}\u{64f}\u{650}\u{651}\u{652}\u{670}\u{671}";

fn to_arabic(c: char) -> Option<char> {
    ASCII.chars().position(|a| a == c).map(|i| ARABIC.chars().nth(i).unwrap())
}

/// True when every character belongs to the Buckwalter ASCII table.
pub fn is_arabic_transliterated(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| ASCII.contains(c))
}

pub fn transliterate(text: &str) -> Vec<String> {
    vec![text.chars().map(|c| to_arabic(c).unwrap_or(c)).collect()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckwalter_detection() {
        assert!(is_arabic_transliterated("yuwladu"));
        assert!(!is_arabic_transliterated("été"));
        assert!(!is_arabic_transliterated(""));
    }

    #[test]
    fn kitab_transliterates() {
        // ktAb → كتاب
        assert_eq!(transliterate("ktAb")[0], "\u{643}\u{62a}\u{627}\u{628}");
    }
}
