use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::intake::PageImage;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Instruction sent with every page. Asks for the five numbered sections the
/// response parser looks for.
pub const ANALYSIS_PROMPT: &str = r#"You are a highly precise data analyst specializing in interpreting complex reports for a general audience. Your task is to analyze the provided text from a clinical or body composition report.
Part 1: Internal Analysis (Your Thought Process)
Before generating any output, you must perform the following steps internally:
Analyze Layout: First, understand the report's structure. If there are tables, you must read them horizontally, one full row at a time. Connect the test name on the left with its corresponding 'Result' and 'Normal Range' in the same row. This is the most important step to avoid errors.
Verify Data: Carefully double-check every number you extract for accuracy. Be meticulous with decimal points.
Filter Information: Strictly ignore all personal patient information (like name, age, gender) and administrative details (like dates, report ID). Focus only on the test results.
Part 2: Final Output Generation (The Required Structure)
After completing your internal analysis, your entire output must follow this exact five-part structure and use these precise headings. All output should be in English, except for the 'Comment' under 'Analysis of Your Results,' which must be in Egyptian Arabic.
1. Analysis of Your Results
(For each test indicator found in the report, provide a comment. Follow this format for every single one.)
Indicator: [Name of the Test]
Your Result: [Value from the report]
Normal Range: [Range from the report]
Comment: [Provide the explanation in Egyptian Arabic. For example: ".مستوى الهيموجلوبين عندك اللي بيساعد على نقل الأكسجين في الدم في المعدل الطبيعي والصحي" only arabic should be in this]
2. Recommendations
(Based on all the results, provide a bulleted list of actionable recommendations in in Egyptian arabic.)
To Improve: [Simple, practical advice for any abnormal results.]
To Maintain: [Encouraging tips to keep the good results.]
3. Summary
(Provide a brief, easy-to-understand paragraph in English that summarizes the overall findings.)
"Overall, this report shows that..."
4. Final Score
(Provide the score found on the report or calculate one. Explain its meaning in Egyptian arabic.)
Your Health Score: [Score]
Metric:[Explanation of the score's meaning in Egyptian arabic.]
5. Medical Disclaimer
(Conclude with this exact, mandatory statement in in Egyptian arabic.)
"#;

/// Produces the free-form analysis text for one page.
pub trait ReportAnalyzer: Send + Sync {
    fn analyze(&self, prompt: &str, page: &PageImage) -> Result<String, Error>;
}

/// One call per page, each response followed by a newline.
pub fn analyze_pages(analyzer: &dyn ReportAnalyzer, pages: &[PageImage]) -> Result<String, Error> {
    let t0 = std::time::Instant::now();
    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        let page_text = analyzer.analyze(ANALYSIS_PROMPT, page)?;
        log::debug!("Page {}: {} chars of analysis", i + 1, page_text.len());
        text.push_str(&page_text);
        text.push('\n');
    }
    log::info!(
        "Analysis: {} page(s), {} chars in {:.1}ms",
        pages.len(),
        text.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(text)
}

#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl AnalyzerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Reads `GEMINI_API_KEY` (required), `GEMINI_MODEL`, `GEMINI_ENDPOINT`
    /// and `GEMINI_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(endpoint) = std::env::var("GEMINI_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(secs) = std::env::var("GEMINI_TIMEOUT_SECS") {
            config.timeout_secs = secs
                .parse()
                .map_err(|_| Error::Config(format!("GEMINI_TIMEOUT_SECS is not a number: {secs}")))?;
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    config: AnalyzerConfig,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    pub fn new(config: AnalyzerConfig) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

fn response_text(body: GenerateResponse) -> Result<String, Error> {
    let text: String = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(Error::Analysis("no text in model response".into()));
    }
    Ok(text)
}

impl ReportAnalyzer for GeminiClient {
    fn analyze(&self, prompt: &str, page: &PageImage) -> Result<String, Error> {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [
                    RequestPart::Text { text: prompt },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: page.mime,
                            data: BASE64.encode(&page.data),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Analysis(format!(
                        "request timed out after {}s",
                        self.config.timeout_secs
                    ))
                } else {
                    Error::Analysis(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Analysis(format!("Gemini API error {status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| Error::Analysis(format!("failed to parse Gemini response: {e}")))?;
        response_text(parsed)
    }
}
