use crate::model::{Extracted, Report, SectionKind};
use crate::pdf::DocumentWriter;

pub const IMPROVE_TITLE: &str = "To Improve:";
pub const MAINTAIN_TITLE: &str = "To Maintain:";

fn skip(kind: SectionKind) {
    log::warn!("Skipping section '{}': not found in response", kind.heading());
}

/// Draw every present section of `report` in order. Absent sections are left
/// out entirely, heading included.
pub fn render_report(report: &Report, writer: &mut DocumentWriter<'_>) {
    match &report.tests {
        Extracted::Present(tests) => {
            writer.draw_section_heading(&SectionKind::Results.heading());
            for t in tests {
                writer.draw_test_card(&t.indicator, &t.result, &t.normal_range, &t.comment);
            }
        }
        Extracted::Absent => skip(SectionKind::Results),
    }

    match &report.recommendations {
        Extracted::Present(recs) => {
            writer.draw_section_heading(&SectionKind::Recommendations.heading());
            writer.draw_bulleted_list(IMPROVE_TITLE, &recs.to_improve);
            writer.draw_bulleted_list(MAINTAIN_TITLE, &recs.to_maintain);
        }
        Extracted::Absent => skip(SectionKind::Recommendations),
    }

    match &report.summary {
        Extracted::Present(summary) => {
            writer.draw_section_heading(&SectionKind::Summary.heading());
            writer.draw_paragraph(summary);
        }
        Extracted::Absent => skip(SectionKind::Summary),
    }

    match &report.score {
        Extracted::Present(lines) => {
            writer.draw_section_heading(&SectionKind::FinalScore.heading());
            for line in lines {
                writer.draw_paragraph(line);
            }
        }
        Extracted::Absent => skip(SectionKind::FinalScore),
    }

    match &report.disclaimer {
        Extracted::Present(disclaimer) => {
            writer.draw_section_heading(&SectionKind::Disclaimer.heading());
            writer.draw_paragraph(disclaimer);
        }
        Extracted::Absent => skip(SectionKind::Disclaimer),
    }
}
