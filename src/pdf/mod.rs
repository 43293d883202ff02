mod card;
mod layout;

use std::collections::HashSet;
use std::path::Path;

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::error::Error;
use crate::fonts::{FontStyle, Fonts, register_font};
use crate::shaping::is_right_to_left;

pub use layout::{HeightModel, TextLine, TextMeasure, wrap_ltr, wrap_rtl};
use layout::BULLET;

/// Millimetres to PDF points.
pub fn mm(v: f32) -> f32 {
    v * 72.0 / 25.4
}

pub const BODY_FONT_SIZE: f32 = 12.0;
pub const HEADING_FONT_SIZE: f32 = 14.0;
pub const LIST_TITLE_FONT_SIZE: f32 = 13.0;
pub const HEADING_COLOR: [u8; 3] = [195, 60, 84];
const TEXT_COLOR: [u8; 3] = [0, 0, 0];

/// Page size, margins and the page-break threshold, all in points measured
/// from the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    /// No block may start below this line without a page break first.
    pub break_threshold: f32,
}

impl PageGeometry {
    pub fn a4() -> Self {
        Self {
            width: 595.28,
            height: 841.89,
            margin_left: mm(10.0),
            margin_right: mm(10.0),
            margin_top: mm(10.0),
            break_threshold: mm(260.0),
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Align {
    Left,
    Right,
}

#[derive(Clone, Debug)]
enum DrawOp {
    Text {
        style: FontStyle,
        size: f32,
        color: [u8; 3],
        x: f32,
        baseline: f32,
        text: String,
    },
    Rect {
        x: f32,
        top: f32,
        width: f32,
        height: f32,
        fill: [u8; 3],
        stroke: [u8; 3],
        line_width: f32,
    },
}

fn rgb(c: [u8; 3]) -> (f32, f32, f32) {
    (c[0] as f32 / 255.0, c[1] as f32 / 255.0, c[2] as f32 / 255.0)
}

/// Stateful page/cursor model. Blocks are laid out top-down; `check_space`
/// runs before each one and starts a new page when the block would cross the
/// break threshold. Pages are recorded as display lists and written on
/// [`DocumentWriter::finish`], once the used characters are known for font
/// subsetting.
pub struct DocumentWriter<'a> {
    fonts: &'a Fonts,
    measure: &'a dyn TextMeasure,
    geometry: PageGeometry,
    height_model: HeightModel,
    pages: Vec<Vec<DrawOp>>,
    cursor_y: f32,
}

impl<'a> DocumentWriter<'a> {
    pub fn new(fonts: &'a Fonts) -> Self {
        Self::with_geometry(fonts, PageGeometry::a4())
    }

    pub fn with_geometry(fonts: &'a Fonts, geometry: PageGeometry) -> Self {
        Self {
            fonts,
            measure: fonts,
            geometry,
            height_model: HeightModel::default(),
            pages: vec![Vec::new()],
            cursor_y: geometry.margin_top,
        }
    }

    pub fn set_height_model(&mut self, model: HeightModel) {
        self.height_model = model;
    }

    /// Replace the width metrics used for wrapping and box sizing.
    pub fn set_measure(&mut self, measure: &'a dyn TextMeasure) {
        self.measure = measure;
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor_y(&self) -> f32 {
        self.cursor_y
    }

    pub fn page_height_limit(&self) -> f32 {
        self.geometry.break_threshold
    }

    /// Zero-based index of the page being drawn on.
    pub fn current_page(&self) -> usize {
        self.pages.len() - 1
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn add_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor_y = self.geometry.margin_top;
        log::debug!("page break -> page {}", self.pages.len());
    }

    /// Start a new page if `needed` points would cross the break threshold.
    /// Returns whether a page was added.
    pub fn check_space(&mut self, needed: f32) -> bool {
        if self.cursor_y + needed > self.geometry.break_threshold {
            self.add_page();
            true
        } else {
            false
        }
    }

    /// Vertical whitespace; clamped to the threshold since a gap never needs
    /// a page of its own.
    fn gap(&mut self, h: f32) {
        self.cursor_y = (self.cursor_y + h).min(self.geometry.break_threshold);
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.push(op);
        }
    }

    pub(crate) fn measure(&self, text: &str, style: FontStyle, size: f32) -> f32 {
        self.measure.text_width(text, style, size)
    }

    pub(crate) fn height_model(&self) -> HeightModel {
        self.height_model
    }

    /// Draw one line of text in a `line_height` tall slot starting at the
    /// cursor, vertically centred like a table cell.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn text_line(
        &mut self,
        line: &TextLine,
        style: FontStyle,
        size: f32,
        color: [u8; 3],
        left: f32,
        right: f32,
        align: Align,
        line_height: f32,
    ) {
        let x = match align {
            Align::Left => left,
            Align::Right => (right - line.width).max(left),
        };
        let baseline = self.cursor_y + line_height / 2.0 + 0.3 * size;
        if !line.text.is_empty() {
            self.push(DrawOp::Text {
                style,
                size,
                color,
                x,
                baseline,
                text: line.text.clone(),
            });
        }
        self.cursor_y += line_height;
    }

    /// Lines of a flowing block: each line breaks the page itself when it
    /// would cross the threshold, so under-estimated blocks continue on the
    /// next page.
    fn flow_lines(
        &mut self,
        lines: &[TextLine],
        style: FontStyle,
        size: f32,
        align: Align,
        line_height: f32,
    ) {
        let left = self.geometry.margin_left;
        let right = self.geometry.width - self.geometry.margin_right;
        for line in lines {
            self.check_space(line_height);
            self.text_line(line, style, size, TEXT_COLOR, left, right, align, line_height);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn rect(
        &mut self,
        x: f32,
        top: f32,
        width: f32,
        height: f32,
        fill: [u8; 3],
        stroke: [u8; 3],
        line_width: f32,
    ) {
        self.push(DrawOp::Rect {
            x,
            top,
            width,
            height,
            fill,
            stroke,
            line_width,
        });
    }

    pub(crate) fn wrap(
        &self,
        text: &str,
        style: FontStyle,
        size: f32,
        max_width: f32,
    ) -> (Vec<TextLine>, Align) {
        if is_right_to_left(text) {
            (wrap_rtl(self.measure, text, style, size, max_width, false), Align::Right)
        } else {
            (wrap_ltr(self.measure, text.trim(), style, size, max_width), Align::Left)
        }
    }

    /// "N. Title" in the heading colour, with 6 mm of space around it.
    pub fn draw_section_heading(&mut self, title: &str) {
        self.gap(mm(6.0));
        self.check_space(mm(20.0));
        let line = TextLine {
            text: title.to_string(),
            width: self.measure(title, FontStyle::Bold, HEADING_FONT_SIZE),
        };
        let left = self.geometry.margin_left;
        let right = self.geometry.width - self.geometry.margin_right;
        self.text_line(
            &line,
            FontStyle::Bold,
            HEADING_FONT_SIZE,
            HEADING_COLOR,
            left,
            right,
            Align::Left,
            mm(10.0),
        );
        self.gap(mm(6.0));
    }

    fn list_item_lines(&self, item: &str) -> (Vec<TextLine>, Align) {
        let width = self.geometry.content_width();
        if is_right_to_left(item) {
            let trimmed = item.trim_matches([' ', '.', '\u{060C}', ':']);
            (
                wrap_rtl(self.measure, trimmed, FontStyle::Regular, BODY_FONT_SIZE, width, true),
                Align::Right,
            )
        } else {
            let text = format!("{BULLET} {}", item.trim());
            (
                wrap_ltr(self.measure, &text, FontStyle::Regular, BODY_FONT_SIZE, width),
                Align::Left,
            )
        }
    }

    /// Bold title followed by one bullet per item. The page-break decision is
    /// made once for the whole list.
    pub fn draw_bulleted_list(&mut self, title: &str, items: &[String]) {
        let line_h = mm(8.0);
        let laid_out: Vec<(Vec<TextLine>, Align)> =
            items.iter().map(|item| self.list_item_lines(item)).collect();

        let needed = match self.height_model {
            HeightModel::Estimated => mm(10.0) + items.len() as f32 * line_h + mm(4.0),
            HeightModel::Wrapped => {
                let n: usize = laid_out.iter().map(|(lines, _)| lines.len()).sum();
                mm(10.0) + n as f32 * line_h + mm(2.0)
            }
        };
        self.check_space(needed);

        let title_line = TextLine {
            text: title.to_string(),
            width: self.measure(title, FontStyle::Bold, LIST_TITLE_FONT_SIZE),
        };
        let left = self.geometry.margin_left;
        let right = self.geometry.width - self.geometry.margin_right;
        self.text_line(
            &title_line,
            FontStyle::Bold,
            LIST_TITLE_FONT_SIZE,
            TEXT_COLOR,
            left,
            right,
            Align::Left,
            mm(10.0),
        );

        for (lines, align) in &laid_out {
            self.flow_lines(lines, FontStyle::Regular, BODY_FONT_SIZE, *align, line_h);
        }
        self.gap(mm(2.0));
    }

    /// Free text; Arabic is right-aligned and wrapped right to left.
    pub fn draw_paragraph(&mut self, text: &str) {
        self.check_space(mm(10.0));
        let (lines, align) = self.wrap(
            text,
            FontStyle::Regular,
            BODY_FONT_SIZE,
            self.geometry.content_width(),
        );
        self.flow_lines(&lines, FontStyle::Regular, BODY_FONT_SIZE, align, mm(8.0));
    }

    fn used_chars(&self, style: FontStyle) -> HashSet<char> {
        self.pages
            .iter()
            .flatten()
            .filter_map(|op| match op {
                DrawOp::Text { style: s, text, .. } if *s == style => Some(text.chars()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Write the document and return the PDF bytes.
    pub fn finish(self) -> Result<Vec<u8>, Error> {
        let t0 = std::time::Instant::now();
        let mut pdf = Pdf::new();
        let mut next_id = 1i32;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };

        let catalog_id = alloc();
        let pages_id = alloc();

        let regular_chars = self.used_chars(FontStyle::Regular);
        let bold_chars = self.used_chars(FontStyle::Bold);
        let regular = register_font(&mut pdf, &self.fonts.regular, "F1".to_string(), &mut alloc, &regular_chars);
        let bold = register_font(&mut pdf, &self.fonts.bold, "F2".to_string(), &mut alloc, &bold_chars);

        let t_fonts = t0.elapsed();

        let n = self.pages.len();
        let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
        let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
        let page_h = self.geometry.height;

        for (i, ops) in self.pages.iter().enumerate() {
            let mut content = Content::new();
            for op in ops {
                match op {
                    DrawOp::Rect {
                        x,
                        top,
                        width,
                        height,
                        fill,
                        stroke,
                        line_width,
                    } => {
                        let (fr, fg, fb) = rgb(*fill);
                        let (sr, sg, sb) = rgb(*stroke);
                        content.save_state();
                        content.set_fill_rgb(fr, fg, fb);
                        content.set_stroke_rgb(sr, sg, sb);
                        content.set_line_width(*line_width);
                        content.rect(*x, page_h - top - height, *width, *height);
                        content.fill_nonzero_and_stroke();
                        content.restore_state();
                    }
                    DrawOp::Text {
                        style,
                        size,
                        color,
                        x,
                        baseline,
                        text,
                    } => {
                        let font = match style {
                            FontStyle::Regular => &regular,
                            FontStyle::Bold => &bold,
                        };
                        let (r, g, b) = rgb(*color);
                        content.save_state();
                        content.set_fill_rgb(r, g, b);
                        content.begin_text();
                        content.set_font(Name(font.pdf_name.as_bytes()), *size);
                        content.next_line(*x, page_h - baseline);
                        content.show(Str(&font.encode(text)));
                        content.end_text();
                        content.restore_state();
                    }
                }
            }
            let raw = content.finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
        }

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().copied())
            .count(n as i32);

        for i in 0..n {
            let mut page = pdf.page(page_ids[i]);
            page.media_box(Rect::new(0.0, 0.0, self.geometry.width, page_h))
                .parent(pages_id)
                .contents(content_ids[i]);
            let mut resources = page.resources();
            let mut fonts = resources.fonts();
            for font in [&regular, &bold] {
                fonts.pair(Name(font.pdf_name.as_bytes()), font.font_ref);
            }
        }

        let bytes = pdf.finish();
        log::info!(
            "PDF write: {} pages, font_embed={:.1}ms, assembly={:.1}ms, {} bytes",
            n,
            t_fonts.as_secs_f64() * 1000.0,
            (t0.elapsed() - t_fonts).as_secs_f64() * 1000.0,
            bytes.len(),
        );
        Ok(bytes)
    }

    /// Write the document to `path`.
    pub fn save(self, path: &Path) -> Result<(), Error> {
        let bytes = self.finish()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) struct FixedWidth(pub f32);

#[cfg(test)]
impl TextMeasure for FixedWidth {
    fn text_width(&self, text: &str, _style: FontStyle, _font_size: f32) -> f32 {
        text.chars().count() as f32 * self.0
    }
}

#[cfg(test)]
impl DocumentWriter<'_> {
    /// (text, x) of every text op drawn so far, in order.
    pub(crate) fn drawn_text(&self) -> Vec<(String, f32)> {
        self.pages
            .iter()
            .flatten()
            .filter_map(|op| match op {
                DrawOp::Text { text, x, .. } => Some((text.clone(), *x)),
                DrawOp::Rect { .. } => None,
            })
            .collect()
    }
}
