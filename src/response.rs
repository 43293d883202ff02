//! Section splitting for free-form model responses.
//!
//! The model is asked for five sections introduced by bolded, numbered
//! headers, but nothing guarantees it complies exactly. Headers are found by a
//! line scanner that normalizes markdown emphasis and punctuation, and the
//! canonical `**N. Title**` markers are also recognised mid-line. Every section
//! is extracted independently so a missing header only loses that section.

use crate::model::{
    Extracted, RecommendationList, Report, SectionKind, Sections, TestRecord,
};

pub const INDICATOR_MARKER: &str = "Indicator:";
pub const RESULT_LABEL: &str = "Your Result:";
pub const RANGE_LABEL: &str = "Normal Range:";
pub const COMMENT_LABEL: &str = "Comment:";
pub const IMPROVE_MARKER: &str = "To Improve";
pub const MAINTAIN_MARKER: &str = "To Maintain";
const METRIC_LABEL: &str = "Metric:";

const BULLET_GLYPHS: [char; 3] = ['*', '-', '•'];

#[derive(Clone, Copy, Debug)]
struct Header {
    kind: SectionKind,
    start: usize, // byte offset of the marker
    end: usize,   // byte offset just past the marker
}

fn is_emphasis(c: char) -> bool {
    matches!(c, '*' | '_' | '#')
}

/// Match a whole line against "N. Title" once markup and a trailing colon are
/// stripped. Case and internal whitespace are ignored.
fn line_header_kind(line: &str) -> Option<SectionKind> {
    let core = line
        .trim_start_matches(|c: char| c.is_whitespace() || is_emphasis(c))
        .trim_end_matches(|c: char| c.is_whitespace() || is_emphasis(c) || c == ':');
    let (num, title) = core.split_once('.')?;
    let kind = SectionKind::from_number(num.trim().parse().ok()?)?;
    let title: Vec<String> = title.split_whitespace().map(str::to_lowercase).collect();
    let expected: Vec<String> = kind
        .title()
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    (title == expected).then_some(kind)
}

fn find_headers(text: &str) -> Vec<Header> {
    let mut headers = Vec::new();
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if let Some(kind) = line_header_kind(content) {
            let start = offset + (content.len() - content.trim_start().len());
            headers.push(Header {
                kind,
                start,
                end: start + content.trim().len(),
            });
        } else {
            // Canonical markers embedded in a longer line
            let mut inline: Vec<Header> = SectionKind::ALL
                .into_iter()
                .flat_map(|kind| {
                    let marker = kind.marker();
                    content
                        .match_indices(marker.as_str())
                        .map(|(pos, m)| Header {
                            kind,
                            start: offset + pos,
                            end: offset + pos + m.len(),
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
            inline.sort_by_key(|h| h.start);
            headers.extend(inline);
        }
        offset += line.len();
    }

    log::debug!(
        "response headers: {:?}",
        headers.iter().map(|h| h.kind.number()).collect::<Vec<_>>()
    );
    headers
}

/// Slice a response into its five sections.
///
/// The results section always starts at offset 0; each other section runs
/// from the end of its header to the start of the next header found. When a
/// header repeats, the first occurrence wins and the repeat only terminates the
/// body before it.
pub fn split_sections(text: &str) -> Sections<'_> {
    let headers = find_headers(text);
    let mut bodies: [Extracted<&str>; 5] = std::array::from_fn(|_| Extracted::Absent);
    let mut seen = [false; 5];

    for (i, header) in headers.iter().enumerate() {
        let idx = header.kind.index();
        if seen[idx] {
            continue;
        }
        seen[idx] = true;
        if header.kind == SectionKind::Results {
            continue;
        }
        let body_end = headers.get(i + 1).map_or(text.len(), |next| next.start);
        bodies[idx] = Extracted::Present(&text[header.end..body_end]);
    }

    if !text.is_empty() {
        let results_end = headers
            .iter()
            .find(|h| h.kind != SectionKind::Results)
            .map_or(text.len(), |h| h.start);
        bodies[SectionKind::Results.index()] = Extracted::Present(&text[..results_end]);
    }

    let [results, recommendations, summary, final_score, disclaimer] = bodies;
    Sections {
        results,
        recommendations,
        summary,
        final_score,
        disclaimer,
    }
}

/// Trim whitespace and drop markdown bold markers the model tends to sprinkle
/// around labels and values.
pub(crate) fn clean_value(s: &str) -> String {
    s.replace("**", "")
        .trim()
        .trim_matches(|c: char| c == '*' || c.is_whitespace())
        .to_string()
}

fn field_value(lines: &[&str], label: &str) -> String {
    lines
        .iter()
        .find(|l| l.contains(label))
        .and_then(|l| l.split_once(':'))
        .map(|(_, value)| clean_value(value))
        .unwrap_or_default()
}

fn parse_record(chunk: &str) -> TestRecord {
    let mut lines = chunk.trim().lines();
    let indicator = lines.next().map(clean_value).unwrap_or_default();
    let rest: Vec<&str> = lines.collect();
    TestRecord {
        indicator,
        result: field_value(&rest, RESULT_LABEL),
        normal_range: field_value(&rest, RANGE_LABEL),
        comment: field_value(&rest, COMMENT_LABEL),
    }
}

/// One record per `Indicator:` marker, in order; text before the first marker
/// is preamble.
pub fn parse_test_records(section: &str) -> Vec<TestRecord> {
    section
        .split(INDICATOR_MARKER)
        .skip(1)
        .map(parse_record)
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum Bucket {
    Improve,
    Maintain,
}

fn strip_bullet(line: &str) -> Option<&str> {
    line.strip_prefix(BULLET_GLYPHS)
}

pub fn parse_recommendations(section: &str) -> RecommendationList {
    let mut list = RecommendationList::default();
    let mut active: Option<Bucket> = None;

    let push = |list: &mut RecommendationList, bucket: Bucket, item: String| {
        if item.is_empty() {
            return;
        }
        match bucket {
            Bucket::Improve => list.to_improve.push(item),
            Bucket::Maintain => list.to_maintain.push(item),
        }
    };

    for raw in section.lines() {
        let line = raw.trim();
        let marker = if line.contains(IMPROVE_MARKER) {
            Some(Bucket::Improve)
        } else if line.contains(MAINTAIN_MARKER) {
            Some(Bucket::Maintain)
        } else {
            None
        };

        if let Some(bucket) = marker {
            active = Some(bucket);
            // "To Improve: advice" on the marker line itself
            if let Some((_, rest)) = line.split_once(':') {
                push(&mut list, bucket, clean_value(rest));
            }
        } else if let Some(item) = strip_bullet(line)
            && let Some(bucket) = active
        {
            push(&mut list, bucket, clean_value(item));
        }
    }
    list
}

/// Each non-empty line of the score block, with the "Metric:" label removed.
pub fn parse_score_lines(section: &str) -> Vec<String> {
    section
        .lines()
        .map(|line| clean_value(&line.replace(METRIC_LABEL, "")))
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn parse_summary(section: &str) -> String {
    clean_value(section)
}

pub fn parse_disclaimer(section: &str) -> String {
    clean_value(section)
        .trim_matches(['"', '\u{201C}', '\u{201D}'])
        .trim()
        .to_string()
}

pub fn parse_report(text: &str) -> Report {
    let sections = split_sections(text);
    let report = Report {
        tests: sections.results.map(parse_test_records),
        recommendations: sections.recommendations.map(parse_recommendations),
        summary: sections.summary.map(parse_summary),
        score: sections.final_score.map(parse_score_lines),
        disclaimer: sections.disclaimer.map(parse_disclaimer),
    };
    for kind in report.missing_sections() {
        log::debug!("Section '{}' not found in model response", kind.heading());
    }
    report
}
