mod error;
mod fonts;
mod model;
mod pdf;

pub mod artifact;
pub mod gemini;
pub mod intake;
pub mod report;
pub mod response;
pub mod shaping;
#[cfg(feature = "server")]
pub mod server;

pub use artifact::ArtifactStore;
pub use error::Error;
pub use fonts::{FontConfig, FontStyle, Fonts};
pub use gemini::{ANALYSIS_PROMPT, AnalyzerConfig, GeminiClient, ReportAnalyzer};
pub use intake::{PageImage, PageRasterizer};
pub use model::{Extracted, RecommendationList, Report, SectionKind, Sections, TestRecord};
pub use pdf::{
    DocumentWriter, HeightModel, PageGeometry, TextLine, TextMeasure, mm, wrap_ltr, wrap_rtl,
};

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

/// Parse a model response and lay it out as a PDF.
pub fn render_response_to_bytes(text: &str, fonts: &Fonts) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();

    let report = response::parse_report(text);
    let t_parse = t0.elapsed();

    let mut writer = DocumentWriter::new(fonts);
    report::render_report(&report, &mut writer);
    let pages = writer.page_count();
    let t_layout = t0.elapsed();

    let bytes = writer.finish()?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, layout={:.1}ms, render={:.1}ms, total={:.1}ms ({} pages, {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_layout - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_layout).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        pages,
        bytes.len(),
    );

    Ok(bytes)
}

/// Render a model response to `output`, with fonts resolved from the environment.
pub fn render_response_to_pdf(text: &str, output: &Path) -> Result<(), Error> {
    let fonts = Fonts::load(&FontConfig::from_env())?;
    let bytes = render_response_to_bytes(text, &fonts)?;
    std::fs::write(output, &bytes)?;
    log::info!("Wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

/// Result of one analyzed upload.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisOutcome {
    pub report_id: String,
    pub response_text: String,
    pub pdf_path: PathBuf,
}

/// Full pipeline for one upload: validate and rasterize, ask the model about
/// each page, render the joined response and persist it under a fresh id.
pub fn analyze_upload(
    filename: &str,
    bytes: &[u8],
    analyzer: &dyn ReportAnalyzer,
    rasterizer: &dyn PageRasterizer,
    fonts: &Fonts,
    store: &ArtifactStore,
) -> Result<AnalysisOutcome, Error> {
    let t0 = Instant::now();

    let pages = intake::load_pages(filename, bytes, rasterizer)?;
    let t_intake = t0.elapsed();

    let response_text = gemini::analyze_pages(analyzer, &pages)?;
    let t_analysis = t0.elapsed();

    let pdf = render_response_to_bytes(&response_text, fonts)?;
    let (report_id, pdf_path) = store.allocate();
    std::fs::write(&pdf_path, &pdf)?;
    let t_total = t0.elapsed();

    log::info!(
        "Analyze {filename}: intake={:.1}ms, analysis={:.1}ms, render+write={:.1}ms -> {}",
        t_intake.as_secs_f64() * 1000.0,
        (t_analysis - t_intake).as_secs_f64() * 1000.0,
        (t_total - t_analysis).as_secs_f64() * 1000.0,
        pdf_path.display(),
    );

    Ok(AnalysisOutcome {
        report_id,
        response_text,
        pdf_path,
    })
}
