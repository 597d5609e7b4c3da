use serde::{Deserialize, Serialize};

/// Self-reported proficiency, ordered from least to most experienced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    pub const ALL: [SkillLevel; 4] = [
        SkillLevel::Beginner,
        SkillLevel::Intermediate,
        SkillLevel::Advanced,
        SkillLevel::Expert,
    ];

    /// 1-based rank, used when averaging a category.
    pub fn rank(self) -> u8 {
        match self {
            SkillLevel::Beginner => 1,
            SkillLevel::Intermediate => 2,
            SkillLevel::Advanced => 3,
            SkillLevel::Expert => 4,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(SkillLevel::Beginner),
            2 => Some(SkillLevel::Intermediate),
            3 => Some(SkillLevel::Advanced),
            4 => Some(SkillLevel::Expert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub id: String,
    pub name: String,
}

/// A group of skills rated together on one wizard page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillCategory {
    pub id: String,
    pub name: String,
    pub skills: Vec<Skill>,
}

impl SkillCategory {
    pub fn new(id: &str, name: &str, skills: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            skills: skills
                .iter()
                .map(|(id, name)| Skill {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    pub fn skill_ids(&self) -> impl Iterator<Item = &str> {
        self.skills.iter().map(|s| s.id.as_str())
    }
}

pub const GOAL_OPTIONS: &[&str] = &[
    "Get a promotion",
    "Switch careers",
    "Build a side project",
    "Learn for personal growth",
    "Prepare for certification",
    "Start freelancing",
];

pub fn default_categories() -> Vec<SkillCategory> {
    vec![
        SkillCategory::new(
            "programming",
            "Programming",
            &[
                ("javascript", "JavaScript"),
                ("python", "Python"),
                ("react", "React"),
                ("nodejs", "Node.js"),
            ],
        ),
        SkillCategory::new(
            "design",
            "Design",
            &[
                ("figma", "Figma"),
                ("photoshop", "Photoshop"),
                ("ui-ux", "UI/UX Design"),
            ],
        ),
        SkillCategory::new(
            "business",
            "Business",
            &[
                ("marketing", "Digital Marketing"),
                ("analytics", "Data Analytics"),
                ("project-management", "Project Management"),
            ],
        ),
    ]
}

/// Looks up which category a skill id belongs to.
pub fn find_skill<'a>(categories: &'a [SkillCategory], skill_id: &str) -> Option<&'a SkillCategory> {
    categories
        .iter()
        .find(|c| c.skills.iter().any(|s| s.id == skill_id))
}

pub fn is_known_goal(goal: &str) -> bool {
    GOAL_OPTIONS.contains(&goal)
}
