/// Aggregated view of workout progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub exercise_index: usize,
    pub set_index: usize,
    pub total_exercises: usize,
    pub sets_recorded: usize,
    pub total_sets: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    /// Sets still to be recorded.
    #[must_use]
    pub fn remaining_sets(&self) -> usize {
        self.total_sets.saturating_sub(self.sets_recorded)
    }
}
