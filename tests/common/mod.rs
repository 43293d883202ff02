#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Mutex;

use healthreport_pdf::{Error, PageImage, PageRasterizer, ReportAnalyzer};

/// A complete five-section response with Arabic comments and advice.
pub const SAMPLE_RESPONSE: &str = "Indicator: Hemoglobin\nYour Result: 13.5\nNormal Range: 13-17\nComment: طبيعي\n**2. Recommendations**\n To Improve\n* كل أكثر\n To Maintain\n* حافظ على النظام\n**3. Summary**\nAll good.\n**4. Final Score**\nYour Health Score: 90\nMetric: ممتاز\n**5. Medical Disclaimer**\n\"تنويه طبي\"";

/// The same response with the disclaimer header missing.
pub fn response_without_disclaimer() -> String {
    SAMPLE_RESPONSE.replace("**5. Medical Disclaimer**", "")
}

/// A longer response of the shape the model usually returns.
pub fn long_response(records: usize) -> String {
    let mut text = String::from("**1. Analysis of Your Results**\n\n");
    for i in 0..records {
        text.push_str(&format!(
            "**Indicator:** Test {i}\n**Your Result:** {}.{} mg/dL\n**Normal Range:** 10-20\n**Comment:** مستوى التحليل عندك في المعدل الطبيعي والصحي وده مؤشر كويس جدا على صحتك العامة\n\n",
            10 + i,
            i % 10
        ));
    }
    text.push_str("**2. Recommendations**\n**To Improve:**\n");
    for _ in 0..8 {
        text.push_str("* اشرب مية كتير طول اليوم وقلل السكريات والنشويات في الأكل.\n");
    }
    text.push_str("**To Maintain:**\n* Keep exercising three times a week.\n* كمل على الأكل الصحي\n");
    text.push_str("**3. Summary**\nOverall, this report shows that most values are within range.\n");
    text.push_str("**4. Final Score**\nYour Health Score: 85/100\nMetric: نتيجة كويسة جدا\n");
    text.push_str("**5. Medical Disclaimer**\n\"المعلومات دي للتوعية بس ومش بديل عن استشارة الدكتور\"\n");
    text
}

/// Number of page objects in a PDF written by this crate.
pub fn pdf_page_count(bytes: &[u8]) -> usize {
    let needle = b"/Type /Page";
    bytes
        .windows(needle.len() + 1)
        .filter(|w| &w[..needle.len()] == needle && w[needle.len()] != b's')
        .count()
}

pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Returns canned text and records what it was asked.
pub struct StaticAnalyzer {
    pub reply: String,
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl StaticAnalyzer {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ReportAnalyzer for StaticAnalyzer {
    fn analyze(&self, prompt: &str, page: &PageImage) -> Result<String, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), page.data.len()));
        Ok(self.reply.clone())
    }
}

pub struct FailingAnalyzer;

impl ReportAnalyzer for FailingAnalyzer {
    fn analyze(&self, _prompt: &str, _page: &PageImage) -> Result<String, Error> {
        Err(Error::Analysis("Gemini API error 503: overloaded".into()))
    }
}

/// Pretends every PDF has `pages` pages.
pub struct StaticRasterizer {
    pub pages: usize,
}

impl PageRasterizer for StaticRasterizer {
    fn rasterize(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageImage>, Error> {
        Ok((0..self.pages).map(|_| PageImage::png(tiny_png())).collect())
    }
}
