//! Upload intake: decide what a file is and turn it into page images for the
//! model.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, ImageReader};

use crate::error::Error;

/// Render resolution for PDF pages.
pub const RENDER_DPI: u32 = 200;

/// Longest rendered side in pixels; larger pages are scaled down.
pub const MAX_DIMENSION_PX: u32 = 4096;

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Pdf,
}

/// One page ready to be sent to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageImage {
    pub mime: &'static str,
    pub data: Vec<u8>,
}

impl PageImage {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime: "image/png",
            data,
        }
    }
}

/// Classify an upload by its extension (case-insensitive).
pub fn classify_upload(filename: &str) -> Result<UploadKind, Error> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" => Ok(UploadKind::Image),
        "pdf" => Ok(UploadKind::Pdf),
        _ => Err(Error::UnsupportedFormat(filename.to_string())),
    }
}

/// Check that `bytes` really are a PNG or JPEG and return it as a page.
pub fn sniff_image(bytes: &[u8]) -> Result<PageImage, Error> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::InvalidImage(e.to_string()))?;
    let mime = match reader.format() {
        Some(ImageFormat::Png) => "image/png",
        Some(ImageFormat::Jpeg) => "image/jpeg",
        Some(other) => {
            return Err(Error::InvalidImage(format!("{other:?} is not PNG or JPEG")));
        }
        None => return Err(Error::InvalidImage("unrecognised image data".into())),
    };
    let (w, h) = reader
        .into_dimensions()
        .map_err(|e| Error::InvalidImage(e.to_string()))?;
    log::debug!("Image upload: {mime} {w}x{h}, {} bytes", bytes.len());
    Ok(PageImage {
        mime,
        data: bytes.to_vec(),
    })
}

/// Turns a PDF into one image per page.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, Error>;
}

/// Classify, validate and rasterize an upload into model-ready pages.
pub fn load_pages(
    filename: &str,
    bytes: &[u8],
    rasterizer: &dyn PageRasterizer,
) -> Result<Vec<PageImage>, Error> {
    let t0 = std::time::Instant::now();
    let pages = match classify_upload(filename)? {
        UploadKind::Image => vec![sniff_image(bytes)?],
        UploadKind::Pdf => {
            let pages = rasterizer.rasterize(bytes)?;
            if pages.is_empty() {
                return Err(Error::Rasterize {
                    page: 0,
                    reason: "document has no pages".into(),
                });
            }
            pages
        }
    };
    log::info!(
        "Intake: {filename} -> {} page(s) in {:.1}ms",
        pages.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(pages)
}

/// Pixel size for a page rendered at `dpi`, keeping the aspect ratio and
/// capping the longer side at [`MAX_DIMENSION_PX`].
pub fn render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

/// Used when the crate is built without a PDF renderer.
pub struct UnavailableRasterizer;

impl PageRasterizer for UnavailableRasterizer {
    fn rasterize(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageImage>, Error> {
        Err(Error::Rasterize {
            page: 0,
            reason: "built without PDF rendering support".into(),
        })
    }
}

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

/// The rasterizer this build supports. When PDFium can't be loaded, image
/// uploads still work and PDF uploads fail with a rasterize error.
pub fn default_rasterizer() -> Box<dyn PageRasterizer> {
    #[cfg(feature = "pdfium")]
    {
        match PdfiumRasterizer::new() {
            Ok(rasterizer) => return Box::new(rasterizer),
            Err(e) => log::warn!("PDF uploads are disabled: {e}"),
        }
    }
    #[cfg(not(feature = "pdfium"))]
    log::warn!("PDF uploads are disabled: built without the `pdfium` feature");
    Box::new(UnavailableRasterizer)
}

#[cfg(feature = "pdfium")]
mod pdfium {
    use std::io::Cursor;

    use pdfium_render::prelude::*;

    use super::{PageImage, PageRasterizer, RENDER_DPI, render_dimensions};
    use crate::error::Error;

    /// Renders pages with the PDFium library. A fresh `Pdfium` handle is bound
    /// per call since the upstream type is `!Send`.
    pub struct PdfiumRasterizer;

    fn load_pdfium() -> Result<Pdfium, Error> {
        if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
            let bindings = Pdfium::bind_to_library(&path).map_err(|e| Error::Rasterize {
                page: 0,
                reason: format!("failed to load PDFium from {path}: {e}"),
            })?;
            return Ok(Pdfium::new(bindings));
        }
        let bindings = Pdfium::bind_to_system_library().map_err(|e| Error::Rasterize {
            page: 0,
            reason: format!("PDFium library not found; set PDFIUM_DYNAMIC_LIB_PATH: {e}"),
        })?;
        Ok(Pdfium::new(bindings))
    }

    impl PdfiumRasterizer {
        /// Fails when the PDFium library cannot be loaded.
        pub fn new() -> Result<Self, Error> {
            load_pdfium()?;
            Ok(Self)
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn rasterize(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, Error> {
            let pdfium = load_pdfium()?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf_bytes, None)
                .map_err(|e| Error::Rasterize {
                    page: 0,
                    reason: format!("failed to load PDF: {e}"),
                })?;

            let mut out = Vec::new();
            for (index, page) in document.pages().iter().enumerate() {
                let page_err = |reason: String| Error::Rasterize {
                    page: index + 1,
                    reason,
                };
                let (target_w, target_h) =
                    render_dimensions(page.width().value, page.height().value, RENDER_DPI);
                let config = PdfRenderConfig::new()
                    .set_target_width(target_w as i32)
                    .set_maximum_height(target_h as i32);
                let bitmap = page
                    .render_with_config(&config)
                    .map_err(|e| page_err(format!("rendering failed: {e}")))?;

                let rgba = image::RgbaImage::from_raw(
                    bitmap.width() as u32,
                    bitmap.height() as u32,
                    bitmap.as_rgba_bytes(),
                )
                .ok_or_else(|| page_err("bitmap size mismatch".into()))?;
                let mut png = Cursor::new(Vec::new());
                image::DynamicImage::ImageRgba8(rgba)
                    .write_to(&mut png, image::ImageFormat::Png)
                    .map_err(|e| page_err(format!("PNG encoding failed: {e}")))?;

                log::debug!(
                    "Rendered page {} at {target_w}x{target_h} ({} bytes)",
                    index + 1,
                    png.get_ref().len()
                );
                out.push(PageImage::png(png.into_inner()));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert_eq!(classify_upload("scan.PNG").unwrap(), UploadKind::Image);
        assert_eq!(classify_upload("scan.jpeg").unwrap(), UploadKind::Image);
        assert_eq!(classify_upload("lab.Pdf").unwrap(), UploadKind::Pdf);
        assert!(matches!(
            classify_upload("notes.docx"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(classify_upload("README"), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn dimensions_follow_dpi() {
        // A4 at 200 DPI
        assert_eq!(render_dimensions(595.0, 842.0, 200), (1652, 2338));
    }

    #[test]
    fn dimensions_are_capped() {
        let (w, h) = render_dimensions(5000.0, 2500.0, 200);
        assert!(w <= MAX_DIMENSION_PX && w >= MAX_DIMENSION_PX - 1);
        assert!(h.abs_diff(MAX_DIMENSION_PX / 2) <= 1);
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(matches!(
            sniff_image(b"definitely not an image"),
            Err(Error::InvalidImage(_))
        ));
    }
}
