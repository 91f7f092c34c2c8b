//! Round-robin selection of stock activity paragraphs.
//!
//! `ParagraphPool` is immutable text; `RotationState` holds the
//! per-(activity, patient) cursors and is threaded through by value, so a
//! draw never mutates anything it does not return.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphPool {
    pools: HashMap<String, Vec<String>>,
    default: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ParagraphPool {
    pub fn new(default: Vec<String>) -> Self {
        Self { pools: HashMap::new(), default }
    }

    pub fn with_pool(mut self, code: &str, items: Vec<String>) -> Self {
        self.pools.insert(code.to_string(), items);
        self
    }

    /// Stock paragraphs for the built-in activity catalog.
    pub fn builtin() -> Self {
        Self::new(owned(&[
            "The patient attended the group session and engaged with the facilitator's prompts.",
            "The patient participated in the structured group activity alongside peers.",
            "The patient was present for the session and contributed to the group discussion.",
            "The patient joined the therapeutic activity and followed the session plan.",
        ]))
        .with_pool(
            "CBT",
            owned(&[
                "The group reviewed the link between thoughts, feelings and behaviours using a recent situation.",
                "Members practised identifying cognitive distortions and generating balanced alternative thoughts.",
                "The session introduced thought records and walked through one example as a group.",
                "Participants examined evidence for and against a distressing belief.",
            ]),
        )
        .with_pool(
            "DBT",
            owned(&[
                "The group practised distress tolerance skills, including TIPP and self-soothing.",
                "Members worked on emotion regulation by naming emotions and their action urges.",
                "The session covered interpersonal effectiveness using the DEAR MAN framework.",
                "Participants rehearsed radical acceptance with a guided reflection.",
            ]),
        )
        .with_pool(
            "PSY-ED",
            owned(&[
                "The facilitator presented information on early warning signs of relapse.",
                "The group discussed medication adherence and common side effects.",
                "Members learned about the stress-vulnerability model of symptoms.",
            ]),
        )
        .with_pool(
            "MIND",
            owned(&[
                "The group completed a guided body-scan exercise followed by reflection.",
                "Members practised paced breathing and five-senses grounding.",
                "The session used mindful observation to build present-moment awareness.",
            ]),
        )
    }

    /// Paragraphs for `code`, or the default pool when none is registered.
    pub fn pool_for(&self, code: &str) -> &[String] {
        match self.pools.get(code) {
            Some(items) if !items.is_empty() => items,
            _ => &self.default,
        }
    }
}

/// Cursor map keyed by (activity code, patient).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationState {
    cursors: HashMap<(String, Uuid), u32>,
}

/// One drawn paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub paragraph: String,
    pub pool_index: usize,
}

impl RotationState {
    pub fn from_cursors(cursors: HashMap<(String, Uuid), u32>) -> Self {
        Self { cursors }
    }

    pub fn into_cursors(self) -> HashMap<(String, Uuid), u32> {
        self.cursors
    }

    pub fn cursor(&self, code: &str, patient_id: Uuid) -> u32 {
        self.cursors
            .get(&(code.to_string(), patient_id))
            .copied()
            .unwrap_or(0)
    }

    /// Draws the next paragraph for (`code`, `patient_id`).
    ///
    /// `offset` shifts the starting point by a fraction of the pool so that
    /// notes with different offsets start from different paragraphs. Texts in
    /// `exclude` are skipped while another candidate exists.
    pub fn draw(
        mut self,
        pool: &ParagraphPool,
        code: &str,
        patient_id: Uuid,
        offset: u32,
        exclude: &[String],
    ) -> (Option<Draw>, Self) {
        let items = pool.pool_for(code);
        if items.is_empty() {
            return (None, self);
        }
        let n = items.len();
        let cursor = self.cursor(code, patient_id) as usize;
        let shift = offset as usize * (n / 2).max(1);

        let step = (0..n)
            .find(|k| !exclude.contains(&items[(cursor + shift + k) % n]))
            .unwrap_or(0);
        let pool_index = (cursor + shift + step) % n;

        let next = ((cursor + step + 1) % n) as u32;
        self.cursors.insert((code.to_string(), patient_id), next);

        let draw = Draw { paragraph: items[pool_index].clone(), pool_index };
        (Some(draw), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ParagraphPool {
        ParagraphPool::new(owned(&["d0", "d1"])).with_pool("CBT", owned(&["c0", "c1", "c2", "c3"]))
    }

    fn draw_text(state: RotationState, code: &str, patient: Uuid, offset: u32, exclude: &[String]) -> (String, RotationState) {
        let (draw, state) = state.draw(&pool(), code, patient, offset, exclude);
        (draw.unwrap().paragraph, state)
    }

    #[test]
    fn consecutive_draws_never_repeat_immediately() {
        let patient = Uuid::new_v4();
        let mut state = RotationState::default();
        let mut previous = String::new();
        for _ in 0..10 {
            let (text, next) = draw_text(state, "CBT", patient, 0, &[]);
            assert_ne!(text, previous);
            previous = text;
            state = next;
        }
    }

    #[test]
    fn round_robin_covers_the_pool() {
        let patient = Uuid::new_v4();
        let mut state = RotationState::default();
        let mut seen = Vec::new();
        for _ in 0..4 {
            let (text, next) = draw_text(state, "CBT", patient, 0, &[]);
            seen.push(text);
            state = next;
        }
        assert_eq!(seen, vec!["c0", "c1", "c2", "c3"]);
        assert_eq!(state.cursor("CBT", patient), 0);
    }

    #[test]
    fn unknown_code_uses_default_pool() {
        let (text, _) = draw_text(RotationState::default(), "ART", Uuid::new_v4(), 0, &[]);
        assert_eq!(text, "d0");
    }

    #[test]
    fn cursors_are_per_patient() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (_, state) = draw_text(RotationState::default(), "CBT", a, 0, &[]);
        let (text_b, state) = draw_text(state, "CBT", b, 0, &[]);
        assert_eq!(text_b, "c0");
        assert_eq!(state.cursor("CBT", a), 1);
    }

    #[test]
    fn offsets_start_from_disjoint_paragraphs() {
        let patient = Uuid::new_v4();
        let (first, _) = draw_text(RotationState::default(), "CBT", patient, 0, &[]);
        let (second, _) = draw_text(RotationState::default(), "CBT", patient, 1, &[]);
        assert_eq!(first, "c0");
        assert_eq!(second, "c2");
    }

    #[test]
    fn excluded_texts_are_skipped() {
        let patient = Uuid::new_v4();
        let exclude = vec!["c0".to_string(), "c1".to_string()];
        let (text, state) = draw_text(RotationState::default(), "CBT", patient, 0, &exclude);
        assert_eq!(text, "c2");
        assert_eq!(state.cursor("CBT", patient), 3);
    }

    #[test]
    fn state_passed_by_value_leaves_original_untouched() {
        let patient = Uuid::new_v4();
        let original = RotationState::default();
        let (_, advanced) = draw_text(original.clone(), "CBT", patient, 0, &[]);
        assert_eq!(original.cursor("CBT", patient), 0);
        assert_eq!(advanced.cursor("CBT", patient), 1);
    }
}
