use crate::fonts::FontStyle;
use crate::shaping::is_right_to_left;

use super::layout::{HeightModel, TextLine, estimate_field_height, estimate_text_height, wrap_ltr, wrap_rtl};
use super::{Align, BODY_FONT_SIZE, DocumentWriter, TEXT_COLOR, mm};

pub const CARD_FILL: [u8; 3] = [245, 245, 245];
pub const CARD_BORDER: [u8; 3] = [210, 210, 210];

const INDICATOR_LINE_H: f32 = 8.0; // mm
const FIELD_LINE_H: f32 = 7.0; // mm
const PADDING: f32 = 2.0; // mm
const MIN_CARD_HEIGHT: f32 = 40.0; // mm

/// One card field, already wrapped for the card's inner width.
struct Field {
    lines: Vec<TextLine>,
    style: FontStyle,
    align: Align,
    line_height: f32,
    estimate: f32,
}

impl Field {
    fn height(&self, model: HeightModel) -> f32 {
        match model {
            HeightModel::Estimated => self.estimate,
            HeightModel::Wrapped => self.lines.len() as f32 * self.line_height,
        }
    }
}

impl DocumentWriter<'_> {
    fn card_field(&self, text: &str, style: FontStyle, line_height: f32) -> Field {
        let card_width = self.geometry.content_width();
        let inner = card_width - 2.0 * mm(PADDING);
        let width = self.measure(text, style, BODY_FONT_SIZE);
        Field {
            lines: wrap_ltr(self.measure, text, style, BODY_FONT_SIZE, inner),
            style,
            align: Align::Left,
            line_height,
            estimate: estimate_field_height(width, card_width, line_height),
        }
    }

    fn comment_field(&self, comment: &str) -> Field {
        let inner = self.geometry.content_width() - 2.0 * mm(PADDING);
        let line_height = mm(FIELD_LINE_H);
        let (lines, align) = if is_right_to_left(comment) {
            (
                wrap_rtl(self.measure, comment, FontStyle::Regular, BODY_FONT_SIZE, inner, false),
                Align::Right,
            )
        } else {
            (
                wrap_ltr(self.measure, comment.trim(), FontStyle::Regular, BODY_FONT_SIZE, inner),
                Align::Left,
            )
        };
        Field {
            lines,
            style: FontStyle::Regular,
            align,
            line_height,
            estimate: estimate_text_height(comment, line_height),
        }
    }

    /// A filled, bordered box holding one test's four fields. The box is sized
    /// before drawing and never split across pages.
    pub fn draw_test_card(&mut self, indicator: &str, result: &str, normal_range: &str, comment: &str) {
        let fields = [
            self.card_field(&format!("Indicator: {indicator}"), FontStyle::Bold, mm(INDICATOR_LINE_H)),
            self.card_field(&format!("Result: {result}"), FontStyle::Regular, mm(FIELD_LINE_H)),
            self.card_field(&format!("Normal Range: {normal_range}"), FontStyle::Regular, mm(FIELD_LINE_H)),
            self.comment_field(comment),
        ];

        let model = self.height_model();
        let total_height: f32 =
            fields.iter().map(|f| f.height(model)).sum::<f32>() + 3.0 * mm(PADDING);

        self.check_space(mm(MIN_CARD_HEIGHT).max(total_height));
        if self.cursor_y + total_height > self.geometry.break_threshold {
            log::warn!(
                "Card for '{indicator}' is taller than a page ({:.0}pt); drawing past the break line",
                total_height
            );
        }

        let left = self.geometry.margin_left;
        let card_width = self.geometry.content_width();
        let y_start = self.cursor_y;
        self.rect(left, y_start, card_width, total_height, CARD_FILL, CARD_BORDER, mm(0.2));

        let inner_left = left + mm(PADDING);
        let inner_right = left + card_width - mm(PADDING);
        self.cursor_y = y_start + mm(PADDING);
        for field in &fields {
            for line in &field.lines {
                self.text_line(
                    line,
                    field.style,
                    BODY_FONT_SIZE,
                    TEXT_COLOR,
                    inner_left,
                    inner_right,
                    field.align,
                    field.line_height,
                );
            }
        }

        self.cursor_y = y_start + total_height;
        self.gap(mm(PADDING));
    }
}

#[cfg(test)]
mod tests {
    use crate::fonts::{FontStyle, Fonts};
    use crate::pdf::{DocumentWriter, FixedWidth, HeightModel, TextMeasure, mm};
    use crate::shaping::shape;

    #[test]
    fn card_advances_past_box_and_gap() {
        let fonts = Fonts::builtin();
        let mut w = DocumentWriter::new(&fonts);
        let start = w.cursor_y();
        w.draw_test_card("Hemoglobin", "13.5", "13-17", "Normal");
        assert!(w.cursor_y() > start + mm(30.0));
        assert_eq!(w.page_count(), 1);
    }

    #[test]
    fn card_near_bottom_moves_to_next_page() {
        let fonts = Fonts::builtin();
        let mut w = DocumentWriter::new(&fonts);
        w.cursor_y = mm(230.0);
        w.draw_test_card("Hemoglobin", "13.5", "13-17", "طبيعي");
        assert_eq!(w.page_count(), 2);
        assert!(w.cursor_y() <= w.page_height_limit());
    }

    #[test]
    fn wrapped_model_fits_long_comment() {
        let fonts = Fonts::builtin();
        let comment = "Slightly above the reference interval; repeat the test in three months. ".repeat(6);
        for model in [HeightModel::Estimated, HeightModel::Wrapped] {
            let mut w = DocumentWriter::new(&fonts);
            w.set_height_model(model);
            let start = w.cursor_y();
            w.draw_test_card("LDL", "160 mg/dL", "< 130", &comment);
            let lines = crate::pdf::wrap_ltr(
                &fonts,
                comment.trim(),
                crate::fonts::FontStyle::Regular,
                12.0,
                w.geometry().content_width() - 2.0 * mm(2.0),
            );
            // Box must at least hold padding, three single-line fields and the comment
            let min_needed = mm(2.0) * 3.0 + mm(8.0) + 2.0 * mm(7.0) + lines.len() as f32 * mm(7.0);
            assert!(w.cursor_y() - start >= min_needed, "{model:?}");
        }
    }

    #[test]
    fn empty_fields_still_draw_a_card() {
        let fonts = Fonts::builtin();
        let mut w = DocumentWriter::new(&fonts);
        w.draw_test_card("", "", "", "");
        assert!(w.cursor_y() > mm(10.0));
    }

    #[test]
    fn arabic_comment_is_shaped_against_inner_right_edge() {
        let fonts = Fonts::builtin();
        let measure = FixedWidth(5.0);
        let mut w = DocumentWriter::new(&fonts);
        w.set_measure(&measure);
        w.draw_test_card("Hemoglobin", "13.5", "13-17", "طبيعي");

        let g = *w.geometry();
        let inner_left = g.margin_left + mm(2.0);
        let inner_right = g.margin_left + g.content_width() - mm(2.0);
        let comment = shape("طبيعي");
        let width = measure.text_width(&comment, FontStyle::Regular, 12.0);
        assert_eq!(
            w.drawn_text(),
            [
                ("Indicator: Hemoglobin".to_string(), inner_left),
                ("Result: 13.5".to_string(), inner_left),
                ("Normal Range: 13-17".to_string(), inner_left),
                (comment, inner_right - width),
            ]
        );
    }

    #[test]
    fn latin_comment_stays_left_aligned() {
        let fonts = Fonts::builtin();
        let measure = FixedWidth(5.0);
        let mut w = DocumentWriter::new(&fonts);
        w.set_measure(&measure);
        w.draw_test_card("LDL", "160", "< 130", " Slightly high ");

        let inner_left = w.geometry().margin_left + mm(2.0);
        let drawn = w.drawn_text();
        assert_eq!(drawn.len(), 4);
        assert_eq!(drawn[3], ("Slightly high".to_string(), inner_left));
    }
}
