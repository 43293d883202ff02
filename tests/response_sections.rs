mod common;

use healthreport_pdf::response::{
    parse_disclaimer, parse_recommendations, parse_report, parse_score_lines, parse_test_records,
    split_sections,
};
use healthreport_pdf::{Extracted, SectionKind, TestRecord};

#[test]
fn sample_response_extracts_every_section() {
    let report = parse_report(common::SAMPLE_RESPONSE);

    assert_eq!(
        report.tests,
        Extracted::Present(vec![TestRecord {
            indicator: "Hemoglobin".into(),
            result: "13.5".into(),
            normal_range: "13-17".into(),
            comment: "طبيعي".into(),
        }])
    );
    let recs = report.recommendations.clone().present().unwrap();
    assert_eq!(recs.to_improve, ["كل أكثر"]);
    assert_eq!(recs.to_maintain, ["حافظ على النظام"]);
    assert_eq!(report.summary, Extracted::Present("All good.".to_string()));
    assert_eq!(
        report.score,
        Extracted::Present(vec!["Your Health Score: 90".to_string(), "ممتاز".to_string()])
    );
    assert_eq!(report.disclaimer, Extracted::Present("تنويه طبي".to_string()));
    assert!(report.missing_sections().is_empty());
}

#[test]
fn sections_are_contiguous_and_reconstruct_the_text() {
    let text = common::SAMPLE_RESPONSE;
    let sections = split_sections(text);

    let mut rebuilt = String::new();
    for kind in SectionKind::ALL {
        if kind != SectionKind::Results {
            rebuilt.push_str(&kind.marker());
        }
        rebuilt.push_str(sections.get(kind).present().unwrap());
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn missing_marker_only_loses_that_section() {
    let text = common::response_without_disclaimer();
    let report = parse_report(&text);

    assert_eq!(report.disclaimer, Extracted::Absent);
    assert_eq!(report.missing_sections(), [SectionKind::Disclaimer]);
    assert!(report.tests.is_present());
    assert!(report.recommendations.is_present());
    assert_eq!(report.summary, Extracted::Present("All good.".to_string()));
    // The score block absorbs the orphaned disclaimer text
    let score = report.score.present().unwrap();
    assert_eq!(score.len(), 3);
}

#[test]
fn missing_middle_marker_keeps_later_sections() {
    let text = common::SAMPLE_RESPONSE.replace("**3. Summary**", "");
    let report = parse_report(&text);
    assert_eq!(report.summary, Extracted::Absent);
    assert!(report.score.is_present());
    assert!(report.disclaimer.is_present());
    // Recommendations run on into what was the summary, without extra bullets
    let recs = report.recommendations.present().unwrap();
    assert_eq!(recs.to_maintain, ["حافظ على النظام"]);
}

#[test]
fn empty_response_has_nothing() {
    let report = parse_report("");
    assert_eq!(report.missing_sections().len(), 5);
}

#[test]
fn headers_tolerate_markup_variants() {
    let text = "preamble\n## 2. Recommendations\n* a\n3. summary:\nFine.\n__4. Final  Score__\n90\n**5. Medical Disclaimer**\nNote";
    let sections = split_sections(text);
    assert_eq!(sections.results, Extracted::Present("preamble\n"));
    assert_eq!(sections.summary.present().map(str::trim), Some("Fine."));
    assert_eq!(sections.final_score.present().map(str::trim), Some("90"));
    assert_eq!(sections.disclaimer.present().map(str::trim), Some("Note"));
}

#[test]
fn results_header_is_preamble() {
    let text = "**1. Analysis of Your Results**\nIndicator: Iron\nYour Result: 80\n**2. Recommendations**\n";
    let records = parse_test_records(split_sections(text).results.present().unwrap());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].indicator, "Iron");
    assert_eq!(records[0].result, "80");
    assert_eq!(records[0].normal_range, "");
    assert_eq!(records[0].comment, "");
}

#[test]
fn repeated_headers_keep_first_occurrence() {
    let text = "Indicator: A\n**3. Summary**\nPage one.\n**3. Summary**\nPage two.\n**4. Final Score**\n1";
    let sections = split_sections(text);
    assert_eq!(sections.summary.present().map(str::trim), Some("Page one."));
    assert_eq!(sections.final_score.present().map(str::trim), Some("1"));
}

#[test]
fn inline_marker_is_found_mid_line() {
    let text = "Indicator: A\nYour Result: 1 **2. Recommendations** To Improve\n* x";
    let sections = split_sections(text);
    let recs = parse_recommendations(sections.recommendations.present().unwrap());
    assert_eq!(recs.to_improve, ["x"]);
}

#[test]
fn records_take_first_field_and_first_colon() {
    let chunk = "pre\nIndicator: Glucose\nYour Result: 5.4 mmol/L\nNormal Range: 3.9-5.6: fasting\nYour Result: 9\nComment: **جيد**";
    let records = parse_test_records(chunk);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result, "5.4 mmol/L");
    assert_eq!(records[0].normal_range, "3.9-5.6: fasting");
    assert_eq!(records[0].comment, "جيد");
}

#[test]
fn records_follow_indicator_order() {
    let section = "Indicator: A\nYour Result: 1\nIndicator: B\nYour Result: 2\nIndicator: C";
    let names: Vec<String> = parse_test_records(section)
        .into_iter()
        .map(|r| r.indicator)
        .collect();
    assert_eq!(names, ["A", "B", "C"]);
}

#[test]
fn recommendation_bullets_and_markers() {
    let section = "* dropped before any marker\n**To Improve:** walk daily\n- less sugar\n• more water\nplain line ignored\n**To Maintain:**\n* sleep well\n*\n";
    let recs = parse_recommendations(section);
    assert_eq!(recs.to_improve, ["walk daily", "less sugar", "more water"]);
    assert_eq!(recs.to_maintain, ["sleep well"]);
}

#[test]
fn score_lines_drop_metric_label_and_blanks() {
    let lines = parse_score_lines("\nYour Health Score: 72\n\n**Metric:** متوسط\n");
    assert_eq!(lines, ["Your Health Score: 72", "متوسط"]);
}

#[test]
fn disclaimer_strips_straight_and_curly_quotes() {
    assert_eq!(parse_disclaimer("\n\"تنويه طبي\"\n"), "تنويه طبي");
    assert_eq!(parse_disclaimer("\u{201C}Consult a doctor.\u{201D}"), "Consult a doctor.");
}

#[test]
fn long_response_parses_all_records() {
    let report = parse_report(&common::long_response(12));
    let tests = report.tests.present().unwrap();
    assert_eq!(tests.len(), 12);
    assert_eq!(tests[3].indicator, "Test 3");
    assert_eq!(tests[3].result, "13.3 mg/dL");
    let recs = report.recommendations.present().unwrap();
    assert_eq!(recs.to_improve.len(), 8);
    assert_eq!(recs.to_maintain.len(), 2);
}
