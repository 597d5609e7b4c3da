// Skill assessment: a linear wizard over skill categories and learning goals.
// State lives in memory for the duration of one flow.

pub mod handlers;
pub mod skills;
pub mod wizard;
