//! Arabic shaping for a left-to-right drawing surface.
//!
//! PDF content streams place glyphs left to right and we embed fonts without a
//! shaping engine, so Arabic text is converted to its contextual presentation
//! forms (Unicode Arabic Presentation Forms-A/B) and then reordered into visual
//! order with UAX#9.

use unicode_bidi::BidiInfo;

const ARABIC_BLOCK: std::ops::RangeInclusive<char> = '\u{0600}'..='\u{06FF}';

/// True when any code point falls in the Arabic block (U+0600..=U+06FF).
pub fn is_right_to_left(text: &str) -> bool {
    text.chars().any(|c| ARABIC_BLOCK.contains(&c))
}

/// Replace Arabic letters with contextual presentation forms, in logical
/// order. Harakat are dropped and lam-alef pairs fuse into ligatures.
pub fn reshape(text: &str) -> String {
    ar_reshaper::reshape_line(text)
}

/// Reorder a single line from logical to visual order.
fn reorder_line(line: &str) -> String {
    let info = BidiInfo::new(line, None);
    if info.paragraphs.is_empty() {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    for para in &info.paragraphs {
        out.push_str(&info.reorder_line(para, para.range.clone()));
    }
    out
}

/// Reshape and reorder `text` for drawing on a left-to-right surface.
/// Text without Arabic is returned unchanged. Newlines are kept in place.
pub fn shape(text: &str) -> String {
    if !is_right_to_left(text) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for chunk in text.split_inclusive('\n') {
        let (line, newline) = match chunk.strip_suffix('\n') {
            Some(line) => (line, true),
            None => (chunk, false),
        };
        if !line.is_empty() {
            out.push_str(&reorder_line(&reshape(line)));
        }
        if newline {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(!is_right_to_left(""));
        assert!(!is_right_to_left("Hemoglobin 13.5 g/dL"));
        assert!(is_right_to_left("طبيعي"));
        assert!(is_right_to_left("Score: ممتاز"));
        // Arabic presentation forms live outside the Arabic block
        assert!(!is_right_to_left("\u{FEFB}"));
    }

    #[test]
    fn latin_is_unchanged() {
        assert_eq!(shape("All good. 90/100"), "All good. 90/100");
        assert_eq!(shape(""), "");
    }

    #[test]
    fn contextual_forms() {
        // beh + alef: initial beh, final alef
        assert_eq!(reshape("\u{0628}\u{0627}"), "\u{FE91}\u{FE8E}");
        // three behs: initial, medial, final
        assert_eq!(
            reshape("\u{0628}\u{0628}\u{0628}"),
            "\u{FE91}\u{FE92}\u{FE90}"
        );
        // dal does not join forward, so the following beh is isolated
        assert_eq!(reshape("\u{062F}\u{0628}"), "\u{FEA9}\u{FE8F}");
        assert_eq!(reshape("\u{0621}"), "\u{FE80}");
    }

    #[test]
    fn extended_letters_join() {
        // heh goal twice: initial then final
        assert_eq!(reshape("\u{06C1}\u{06C1}"), "\u{FBA8}\u{FBA7}");
        // tteh before alef takes its initial form
        assert!(reshape("\u{0679}\u{0627}").starts_with('\u{FB68}'));
    }

    #[test]
    fn zero_width_joiner_keeps_letter_connected() {
        assert!(reshape("\u{0628}\u{200D}").starts_with('\u{FE91}'));
    }

    #[test]
    fn lam_alef_ligature_forms() {
        assert_eq!(reshape("\u{0644}\u{0627}"), "\u{FEFB}");
        // after a joining letter the ligature takes its final form
        assert_eq!(reshape("\u{0628}\u{0644}\u{0627}"), "\u{FE91}\u{FEFC}");
    }

    #[test]
    fn harakat_are_dropped() {
        assert_eq!(reshape("\u{0628}\u{064E}"), "\u{FE8F}");
    }

    #[test]
    fn word_boundaries_break_joining() {
        assert_eq!(reshape("\u{0628} \u{0628}"), "\u{FE8F} \u{FE8F}");
    }

    #[test]
    fn shaped_arabic_is_reversed_for_display() {
        // beh alef -> initial beh + final alef, displayed right to left
        assert_eq!(shape("\u{0628}\u{0627}"), "\u{FE8E}\u{FE91}");
    }

    #[test]
    fn mixed_line_keeps_latin_runs_readable() {
        let shaped = shape("Score 90 \u{0628}\u{0627}");
        assert!(shaped.contains("Score 90"));
        assert!(shaped.contains("\u{FE8E}\u{FE91}"));
    }

    #[test]
    fn newlines_are_preserved() {
        let shaped = shape("\u{0628}\u{0627}\n\u{0628}\u{0627}");
        assert_eq!(shaped, "\u{FE8E}\u{FE91}\n\u{FE8E}\u{FE91}");
    }
}
