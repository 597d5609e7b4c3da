//! Step wizard for the skill assessment.
//!
//! One step per skill category followed by a final goals step. Forward
//! navigation is gated by the current step's completion predicate; backward
//! navigation is always allowed down to the first step.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::assessment::skills::{Skill, SkillCategory, SkillLevel, GOAL_OPTIONS};
use crate::steps::{FnGate, LinearSteps, StepGate};

#[derive(Debug, Error, PartialEq)]
pub enum AssessmentError {
    #[error("Assessment incomplete: step {step} ({label}) is not finished")]
    Incomplete { step: usize, label: String },
}

/// Mutable selections for one wizard run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WizardState {
    pub step_index: usize,
    pub selections: HashMap<String, SkillLevel>,
    pub goals: BTreeSet<String>,
}

/// Gate for a skill-category page: every skill in the category must be rated.
struct CategoryGate {
    category_id: String,
    skill_ids: Vec<String>,
}

impl StepGate<WizardState> for CategoryGate {
    fn label(&self) -> &str {
        &self.category_id
    }

    fn is_satisfied(&self, state: &WizardState) -> bool {
        self.skill_ids
            .iter()
            .all(|id| state.selections.contains_key(id))
    }
}

fn has_goal(state: &WizardState) -> bool {
    !state.goals.is_empty()
}

/// What the current page asks the learner for.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    SkillCategory {
        category_id: String,
        name: String,
        skills: Vec<Skill>,
    },
    Goals {
        options: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardProgress {
    /// 1-based step number, as shown to the learner.
    pub step: usize,
    pub total_steps: usize,
    pub percent: u8,
}

/// Serializable snapshot of the wizard for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub step_index: usize,
    pub progress: WizardProgress,
    pub current: StepKind,
    pub selections: HashMap<String, SkillLevel>,
    pub goals: Vec<String>,
    pub can_advance: bool,
    pub can_retreat: bool,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryRating {
    pub category_id: String,
    pub name: String,
    pub ratings: Vec<(String, SkillLevel)>,
    /// Mean rank of the category's ratings, rounded to the nearest level.
    pub overall: SkillLevel,
}

/// Final result of a completed assessment.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AssessmentProfile {
    pub categories: Vec<CategoryRating>,
    pub goals: Vec<String>,
}

pub struct StepWizardController {
    categories: Vec<SkillCategory>,
    steps: LinearSteps<WizardState>,
    state: WizardState,
}

impl StepWizardController {
    pub fn new(categories: Vec<SkillCategory>) -> Self {
        let steps = categories
            .iter()
            .fold(LinearSteps::new(), |steps, category| {
                steps.then(CategoryGate {
                    category_id: category.id.clone(),
                    skill_ids: category.skill_ids().map(String::from).collect(),
                })
            })
            .then(FnGate::new("goals", has_goal));

        Self {
            categories,
            steps,
            state: WizardState::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn categories(&self) -> &[SkillCategory] {
        &self.categories
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn step_index(&self) -> usize {
        self.state.step_index
    }

    fn last_step(&self) -> usize {
        if self.steps.is_empty() {
            0
        } else {
            self.total_steps() - 1
        }
    }

    fn is_skill_step(&self, step: usize) -> bool {
        step < self.categories.len()
    }

    pub fn select_level(&mut self, skill_id: &str, level: SkillLevel) {
        self.state.selections.insert(skill_id.to_string(), level);
    }

    /// Adds the goal if absent, removes it if present. Returns the new membership.
    pub fn toggle_goal(&mut self, goal: &str) -> bool {
        if self.state.goals.remove(goal) {
            false
        } else {
            self.state.goals.insert(goal.to_string());
            true
        }
    }

    pub fn can_advance(&self) -> bool {
        let step = self.state.step_index;
        if step >= self.last_step() {
            return false;
        }
        !self.is_skill_step(step) || self.steps.is_satisfied(step, &self.state)
    }

    /// Moves forward one step. A no-op on the last step or while the current
    /// category has unrated skills. Returns whether the step changed.
    pub fn advance(&mut self) -> bool {
        if !self.can_advance() {
            debug!(
                step = self.state.step_index,
                gate = self.steps.label(self.state.step_index).unwrap_or("none"),
                "Advance ignored: current step is incomplete or final"
            );
            return false;
        }
        self.state.step_index += 1;
        true
    }

    /// Moves back one step, floored at the first step.
    pub fn retreat(&mut self) -> bool {
        if self.state.step_index == 0 {
            return false;
        }
        self.state.step_index -= 1;
        true
    }

    pub fn is_complete(&self) -> bool {
        let last = self.last_step();
        self.state.step_index == last && self.steps.is_satisfied(last, &self.state)
    }

    pub fn progress(&self) -> WizardProgress {
        let step = self.state.step_index + 1;
        let total_steps = self.total_steps();
        let percent = ((step as f64 / total_steps as f64) * 100.0).round() as u8;
        WizardProgress {
            step,
            total_steps,
            percent,
        }
    }

    pub fn current_step(&self) -> StepKind {
        match self.categories.get(self.state.step_index) {
            Some(category) => StepKind::SkillCategory {
                category_id: category.id.clone(),
                name: category.name.clone(),
                skills: category.skills.clone(),
            },
            None => StepKind::Goals {
                options: GOAL_OPTIONS.iter().map(|g| g.to_string()).collect(),
            },
        }
    }

    pub fn view(&self) -> WizardView {
        WizardView {
            step_index: self.step_index(),
            progress: self.progress(),
            current: self.current_step(),
            selections: self.state.selections.clone(),
            goals: self.state.goals.iter().cloned().collect(),
            can_advance: self.can_advance(),
            can_retreat: self.step_index() > 0,
            is_complete: self.is_complete(),
        }
    }

    /// Builds the learner's profile once the wizard is complete.
    pub fn finish(&self) -> Result<AssessmentProfile, AssessmentError> {
        if !self.is_complete() {
            let step = self
                .steps
                .first_unsatisfied(&self.state)
                .unwrap_or(self.state.step_index);
            return Err(AssessmentError::Incomplete {
                step,
                label: self.steps.label(step).unwrap_or("final").to_string(),
            });
        }

        let categories = self
            .categories
            .iter()
            .map(|category| {
                let ratings: Vec<(String, SkillLevel)> = category
                    .skill_ids()
                    .filter_map(|id| {
                        self.state
                            .selections
                            .get(id)
                            .map(|level| (id.to_string(), *level))
                    })
                    .collect();
                CategoryRating {
                    category_id: category.id.clone(),
                    name: category.name.clone(),
                    overall: average_level(ratings.iter().map(|(_, l)| *l)),
                    ratings,
                }
            })
            .collect();

        Ok(AssessmentProfile {
            categories,
            goals: self.state.goals.iter().cloned().collect(),
        })
    }
}

fn average_level(levels: impl Iterator<Item = SkillLevel>) -> SkillLevel {
    let (sum, count) = levels.fold((0u32, 0u32), |(sum, count), l| {
        (sum + l.rank() as u32, count + 1)
    });
    if count == 0 {
        return SkillLevel::Beginner;
    }
    let mean = (sum as f64 / count as f64).round() as u8;
    SkillLevel::from_rank(mean).unwrap_or(SkillLevel::Beginner)
}
