use serde::{Deserialize, Serialize};

/// A validated upload, as returned by the file intake collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size_bytes: u64,
    pub mime: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size_bytes: u64, mime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            mime: mime.into(),
        }
    }
}

/// Fixed breakdown of the four design sub-scores, each 0 – 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub composition: u8,
    pub color_theory: u8,
    pub typography: u8,
    pub technique: u8,
}

impl CategoryScores {
    pub fn all(&self) -> [u8; 4] {
        [
            self.composition,
            self.color_theory,
            self.typography,
            self.technique,
        ]
    }
}

/// Structured analysis result shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub overall_score: u8, // 0 – 100
    pub category_scores: CategoryScores,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub suggestions: Vec<String>,
    pub instructor_note: String,
}

impl FeedbackResult {
    /// True when every score lies within 0 – 100.
    pub fn scores_in_range(&self) -> bool {
        self.overall_score <= 100 && self.category_scores.all().iter().all(|s| *s <= 100)
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.overall_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    NeedsImprovement,
}

impl ScoreBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 80 => ScoreBand::Excellent,
            s if s >= 60 => ScoreBand::Good,
            _ => ScoreBand::NeedsImprovement,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent",
            ScoreBand::Good => "Good",
            ScoreBand::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Design,
    Video,
    Text,
    Code,
}

/// The brief a learner is submitting against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: AssignmentKind,
    pub due_date: chrono::NaiveDate,
    pub max_points: u32,
    pub requirements: Vec<String>,
    /// Upper-case extensions, e.g. "PDF".
    pub submission_formats: Vec<String>,
}

pub fn sample_assignment() -> Assignment {
    Assignment {
        id: "typography-hierarchy".to_string(),
        title: "Typography Hierarchy Design".to_string(),
        description: "Create a poster design demonstrating advanced typography hierarchy \
                      principles. Your design should effectively guide the viewer's eye \
                      through the information using typographic contrast, scale, and spacing."
            .to_string(),
        kind: AssignmentKind::Design,
        due_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 15).unwrap_or_default(),
        max_points: 100,
        requirements: [
            "Use at least 3 levels of hierarchy",
            "Demonstrate contrast through size, weight, and color",
            "Include both primary and secondary information",
            "Apply grid system principles",
            "Export in high resolution (300 DPI)",
        ]
        .iter()
        .map(|r| r.to_string())
        .collect(),
        submission_formats: ["PDF", "PNG", "JPG"]
            .iter()
            .map(|f| f.to_string())
            .collect(),
    }
}
