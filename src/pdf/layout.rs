use crate::fonts::{FontStyle, Fonts};
use crate::shaping::shape;

/// Bullet glyph prefixed to list items.
pub(crate) const BULLET: char = '\u{2022}';

/// Assumed characters per line for the free-text height heuristic.
pub const CHARS_PER_LINE: f32 = 80.0;

/// Width of a string as it will be drawn.
pub trait TextMeasure {
    fn text_width(&self, text: &str, style: FontStyle, font_size: f32) -> f32;
}

impl TextMeasure for Fonts {
    fn text_width(&self, text: &str, style: FontStyle, font_size: f32) -> f32 {
        Fonts::text_width(self, text, style, font_size)
    }
}

/// How the writer sizes blocks before drawing them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeightModel {
    /// Width- and character-count heuristics; conservative for short fields.
    #[default]
    Estimated,
    /// Exact line count from the same wrapper used for drawing.
    Wrapped,
}

/// A laid-out line in display order.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub width: f32,
}

/// Estimated height of a measured single-style field inside a card:
/// `width / card_width * lh + lh`.
pub(super) fn estimate_field_height(text_width: f32, card_width: f32, line_height: f32) -> f32 {
    text_width / card_width * line_height + line_height
}

/// Estimated height of free text from its character count.
pub(super) fn estimate_text_height(text: &str, line_height: f32) -> f32 {
    text.chars().count() as f32 / CHARS_PER_LINE * line_height + line_height
}

fn finish_line(words: &mut Vec<&str>, width: f32) -> TextLine {
    let line = TextLine {
        text: words.join(" "),
        width,
    };
    words.clear();
    line
}

/// Greedy word wrap for left-to-right text. Explicit newlines start a new line;
/// always returns at least one (possibly empty) line.
pub fn wrap_ltr(
    measure: &dyn TextMeasure,
    text: &str,
    style: FontStyle,
    font_size: f32,
    max_width: f32,
) -> Vec<TextLine> {
    let space_w = measure.text_width(" ", style, font_size);
    let mut lines = Vec::new();

    for logical in text.lines() {
        let mut words: Vec<&str> = Vec::new();
        let mut current_x = 0.0f32;

        for word in logical.split_whitespace() {
            let ww = measure.text_width(word, style, font_size);
            let proposed_x = if words.is_empty() {
                current_x
            } else {
                current_x + space_w
            };
            if !words.is_empty() && proposed_x + ww > max_width {
                lines.push(finish_line(&mut words, current_x));
                current_x = ww;
            } else {
                current_x = proposed_x + ww;
            }
            words.push(word);
        }

        if !words.is_empty() {
            lines.push(finish_line(&mut words, current_x));
        }
    }

    if lines.is_empty() {
        lines.push(TextLine {
            text: String::new(),
            width: 0.0,
        });
    }
    lines
}

/// Attach the bullet on the reading side (right) of a shaped line.
fn with_rtl_bullet(display: String) -> String {
    format!("{display} {BULLET}")
}

fn display_line(words: &[&str], bullet: bool) -> String {
    let display = shape(&words.join(" "));
    if bullet {
        with_rtl_bullet(display)
    } else {
        display
    }
}

/// Wrap one logical line of right-to-left text. The whole shaped line is
/// measured first; only when it overflows are words accumulated greedily, the
/// candidate being reshaped as a whole each time since joining is contextual.
fn wrap_rtl_line(
    measure: &dyn TextMeasure,
    text: &str,
    style: FontStyle,
    font_size: f32,
    max_width: f32,
    bullet: bool,
    lines: &mut Vec<TextLine>,
) {
    let words: Vec<&str> = text.split_whitespace().collect();
    let whole = display_line(&words, bullet);
    let whole_w = measure.text_width(&whole, style, font_size);
    if whole_w <= max_width {
        lines.push(TextLine {
            text: whole,
            width: whole_w,
        });
        return;
    }

    let mut line_words: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in words {
        current.push(word);
        let candidate = display_line(&current, bullet && line_words.is_empty());
        if measure.text_width(&candidate, style, font_size) > max_width && current.len() > 1 {
            current.pop();
            line_words.push(std::mem::take(&mut current));
            current.push(word);
        }
    }
    if !current.is_empty() {
        line_words.push(current);
    }

    for (i, words) in line_words.iter().enumerate() {
        let text = display_line(words, bullet && i == 0);
        let width = measure.text_width(&text, style, font_size);
        lines.push(TextLine { text, width });
    }
}

/// Wrap right-to-left text into display-order lines. With `bullet`, the bullet
/// is attached to the first line only and counts toward its width.
pub fn wrap_rtl(
    measure: &dyn TextMeasure,
    text: &str,
    style: FontStyle,
    font_size: f32,
    max_width: f32,
    bullet: bool,
) -> Vec<TextLine> {
    let mut lines = Vec::new();
    for logical in text.trim().lines().filter(|l| !l.trim().is_empty()) {
        let first = bullet && lines.is_empty();
        wrap_rtl_line(measure, logical, style, font_size, max_width, first, &mut lines);
    }
    if lines.is_empty() {
        let text = if bullet { BULLET.to_string() } else { String::new() };
        let width = measure.text_width(&text, style, font_size);
        lines.push(TextLine { text, width });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every char is 10 units wide.
    struct Fixed;

    impl TextMeasure for Fixed {
        fn text_width(&self, text: &str, _style: FontStyle, _font_size: f32) -> f32 {
            text.chars().count() as f32 * 10.0
        }
    }

    fn words_of(lines: &[TextLine]) -> Vec<String> {
        lines
            .iter()
            .flat_map(|l| l.text.split_whitespace().map(str::to_string))
            .collect()
    }

    #[test]
    fn ltr_wraps_greedily_and_keeps_words() {
        let text = "aaa bbb ccc ddd eee";
        let lines = wrap_ltr(&Fixed, text, FontStyle::Regular, 12.0, 75.0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "aaa bbb");
        assert!(lines.iter().all(|l| l.width <= 75.0));
        assert_eq!(words_of(&lines), ["aaa", "bbb", "ccc", "ddd", "eee"]);
    }

    #[test]
    fn ltr_lone_wide_word_is_unsplit() {
        let lines = wrap_ltr(&Fixed, "a verylongword b", FontStyle::Regular, 12.0, 50.0);
        assert_eq!(
            lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>(),
            ["a", "verylongword", "b"]
        );
    }

    #[test]
    fn ltr_empty_text_yields_one_line() {
        let lines = wrap_ltr(&Fixed, "", FontStyle::Regular, 12.0, 50.0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.is_empty());
    }

    #[test]
    fn ltr_respects_newlines() {
        let lines = wrap_ltr(&Fixed, "one\ntwo", FontStyle::Regular, 12.0, 500.0);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn rtl_short_line_is_single() {
        let lines = wrap_rtl(&Fixed, "كل أكثر", FontStyle::Regular, 12.0, 500.0, false);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, shape("كل أكثر"));
    }

    #[test]
    fn rtl_wrap_fits_width_and_preserves_order() {
        let text = "حافظ على النظام الغذائي الصحي والنشاط البدني اليومي";
        let max = 120.0;
        let lines = wrap_rtl(&Fixed, text, FontStyle::Regular, 12.0, max, false);
        assert!(lines.len() > 1);
        for line in &lines {
            let lone_word = !line.text.contains(' ');
            assert!(line.width <= max || lone_word, "{:?}", line);
        }
        // Each display line is the shaped form of a run of consecutive words
        let original: Vec<&str> = text.split_whitespace().collect();
        let mut i = 0;
        for line in &lines {
            let mut matched = false;
            for j in (i + 1)..=original.len() {
                if shape(&original[i..j].join(" ")) == line.text {
                    i = j;
                    matched = true;
                    break;
                }
            }
            assert!(matched, "line {:?} is not a contiguous word run", line.text);
        }
        assert_eq!(i, original.len());
    }

    #[test]
    fn rtl_lines_are_filled_maximally() {
        let text = "كل أكثر من الخضار والفواكه كل يوم";
        let max = 100.0;
        let words: Vec<&str> = text.split_whitespace().collect();
        let lines = wrap_rtl(&Fixed, text, FontStyle::Regular, 12.0, max, false);
        let mut consumed = 0;
        for line in &lines[..lines.len() - 1] {
            let n = line.text.split_whitespace().count();
            consumed += n;
            // adding the next word would overflow
            let longer = shape(&words[consumed - n..=consumed].join(" "));
            assert!(Fixed.text_width(&longer, FontStyle::Regular, 12.0) > max);
        }
    }

    #[test]
    fn rtl_bullet_only_on_first_line() {
        let text = "حافظ على النظام الغذائي الصحي والنشاط البدني";
        let lines = wrap_rtl(&Fixed, text, FontStyle::Regular, 12.0, 120.0, true);
        assert!(lines.len() > 1);
        assert!(lines[0].text.ends_with(BULLET));
        assert!(lines[0].width <= 120.0);
        assert!(lines[1..].iter().all(|l| !l.text.contains(BULLET)));
    }

    #[test]
    fn shaped_width_grows_with_candidate() {
        let words = ["النظام", "الغذائي", "الصحي"];
        let mut prev = 0.0;
        for n in 1..=words.len() {
            let w = Fixed.text_width(&shape(&words[..n].join(" ")), FontStyle::Regular, 12.0);
            assert!(w >= prev);
            prev = w;
        }
    }

    #[test]
    fn estimates_are_at_least_one_line() {
        assert_eq!(estimate_field_height(0.0, 100.0, 7.0), 7.0);
        assert_eq!(estimate_text_height("", 7.0), 7.0);
        assert!(estimate_text_height(&"x".repeat(160), 7.0) >= 21.0);
    }
}
