use serde::Serialize;

/// One of the five sections the analysis prompt asks the model to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    Results,
    Recommendations,
    Summary,
    FinalScore,
    Disclaimer,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::Results,
        SectionKind::Recommendations,
        SectionKind::Summary,
        SectionKind::FinalScore,
        SectionKind::Disclaimer,
    ];

    pub fn number(self) -> u8 {
        match self {
            SectionKind::Results => 1,
            SectionKind::Recommendations => 2,
            SectionKind::Summary => 3,
            SectionKind::FinalScore => 4,
            SectionKind::Disclaimer => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionKind::Results => "Analysis of Your Results",
            SectionKind::Recommendations => "Recommendations",
            SectionKind::Summary => "Summary",
            SectionKind::FinalScore => "Final Score",
            SectionKind::Disclaimer => "Medical Disclaimer",
        }
    }

    /// Heading as drawn in the output document, e.g. "3. Summary".
    pub fn heading(self) -> String {
        format!("{}. {}", self.number(), self.title())
    }

    /// The bolded marker the prompt asks the model to emit, e.g. "**3. Summary**".
    pub fn marker(self) -> String {
        format!("**{}**", self.heading())
    }

    pub(crate) fn from_number(n: u8) -> Option<SectionKind> {
        Self::ALL.into_iter().find(|k| k.number() == n)
    }

    pub(crate) fn index(self) -> usize {
        self.number() as usize - 1
    }
}

/// Result of extracting one section: either found with content, or missing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Extracted<T> {
    Present(T),
    Absent,
}

impl<T> Extracted<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Extracted::Present(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extracted<U> {
        match self {
            Extracted::Present(v) => Extracted::Present(f(v)),
            Extracted::Absent => Extracted::Absent,
        }
    }

    pub fn present(self) -> Option<T> {
        match self {
            Extracted::Present(v) => Some(v),
            Extracted::Absent => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TestRecord {
    pub indicator: String,
    pub result: String,
    pub normal_range: String,
    pub comment: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecommendationList {
    pub to_improve: Vec<String>,
    pub to_maintain: Vec<String>,
}

/// Raw section bodies sliced out of a model response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sections<'a> {
    pub results: Extracted<&'a str>,
    pub recommendations: Extracted<&'a str>,
    pub summary: Extracted<&'a str>,
    pub final_score: Extracted<&'a str>,
    pub disclaimer: Extracted<&'a str>,
}

impl<'a> Sections<'a> {
    pub fn get(&self, kind: SectionKind) -> Extracted<&'a str> {
        match kind {
            SectionKind::Results => self.results.clone(),
            SectionKind::Recommendations => self.recommendations.clone(),
            SectionKind::Summary => self.summary.clone(),
            SectionKind::FinalScore => self.final_score.clone(),
            SectionKind::Disclaimer => self.disclaimer.clone(),
        }
    }
}

/// Fully parsed model response, one entry per section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub tests: Extracted<Vec<TestRecord>>,
    pub recommendations: Extracted<RecommendationList>,
    pub summary: Extracted<String>,
    pub score: Extracted<Vec<String>>,
    pub disclaimer: Extracted<String>,
}

impl Report {
    pub fn missing_sections(&self) -> Vec<SectionKind> {
        let present = [
            self.tests.is_present(),
            self.recommendations.is_present(),
            self.summary.is_present(),
            self.score.is_present(),
            self.disclaimer.is_present(),
        ];
        SectionKind::ALL
            .into_iter()
            .zip(present)
            .filter(|&(_, p)| !p)
            .map(|(k, _)| k)
            .collect()
    }
}
