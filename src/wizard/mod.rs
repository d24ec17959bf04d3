//! Per-session wizard state: what the user has produced at each of the five
//! stages. Controllers hold a [`Session`] and mutate it only when async work
//! has completed; nothing here awaits.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::errors::BlueprintError;
use crate::wire::{CodeBundle, DesignConcept};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Idea = 1,
    Sketch = 2,
    Concepts = 3,
    Select = 4,
    Build = 5,
}

impl Step {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Self {
        match self {
            Step::Idea => Step::Sketch,
            Step::Sketch => Step::Concepts,
            Step::Concepts => Step::Select,
            Step::Select | Step::Build => Step::Build,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Step::Idea | Step::Sketch => Step::Idea,
            Step::Concepts => Step::Sketch,
            Step::Select => Step::Concepts,
            Step::Build => Step::Select,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub project_intent: String,
    pub sketch_image: Option<String>,
    pub layout_metadata: Option<Value>,
    pub is_generating_concepts: bool,
    pub concepts: Vec<DesignConcept>,
    pub selected_concept: Option<DesignConcept>,
    pub is_building: bool,
    pub generated_code: CodeBundle,
    pub current_step: Step,
    /// Bumped by every reset; work started under an older epoch is discarded.
    #[serde(skip)]
    epoch: u64,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            project_intent: String::new(),
            sketch_image: None,
            layout_metadata: None,
            is_generating_concepts: false,
            concepts: Vec::new(),
            selected_concept: None,
            is_building: false,
            generated_code: CodeBundle::default(),
            current_step: Step::Idea,
            epoch: 0,
        }
    }
}

impl WizardState {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn set_project_intent(&mut self, intent: impl Into<String>) {
        self.project_intent = intent.into();
    }

    pub fn set_sketch_data(&mut self, image: impl Into<String>, metadata: Value) {
        self.sketch_image = Some(image.into());
        self.layout_metadata = Some(metadata);
    }

    pub fn set_is_generating_concepts(&mut self, loading: bool) {
        self.is_generating_concepts = loading;
    }

    /// Replaces the list. A selection that is not in the new list is dropped.
    pub fn set_concepts(&mut self, concepts: Vec<DesignConcept>) {
        self.concepts = concepts;
        if let Some(sel) = &self.selected_concept {
            if !self.concepts.iter().any(|c| c.id == sel.id) {
                self.selected_concept = None;
            }
        }
    }

    /// Only a concept from the current list can be selected.
    pub fn set_selected_concept(&mut self, concept: DesignConcept) -> Result<(), BlueprintError> {
        if self.concepts.is_empty() {
            return Err(BlueprintError::Wizard("no concepts to select from".into()));
        }
        if !self.concepts.iter().any(|c| c.id == concept.id) {
            return Err(BlueprintError::Wizard(format!("concept {} is not among the current concepts", concept.id)));
        }
        self.selected_concept = Some(concept);
        Ok(())
    }

    pub fn select_by_id(&mut self, id: &str) -> Result<DesignConcept, BlueprintError> {
        let concept = self
            .concepts
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| BlueprintError::Wizard(format!("unknown concept id {id}")))?;
        self.set_selected_concept(concept.clone())?;
        Ok(concept)
    }

    pub fn set_is_building(&mut self, loading: bool) {
        self.is_building = loading;
    }

    /// Code follows a selection and is written once.
    pub fn set_generated_code(&mut self, code: CodeBundle) -> Result<(), BlueprintError> {
        if self.selected_concept.is_none() {
            return Err(BlueprintError::Wizard("generated code requires a selected concept".into()));
        }
        if !self.generated_code.is_empty() {
            return Err(BlueprintError::Wizard("generated code is already set".into()));
        }
        self.generated_code = code;
        Ok(())
    }

    pub fn set_current_step(&mut self, step: Step) {
        self.current_step = step;
    }

    pub fn next_step(&mut self) {
        self.current_step = self.current_step.next();
    }

    pub fn prev_step(&mut self) {
        self.current_step = self.current_step.prev();
    }

    /// Back to the initial values, loading flags included.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self { epoch, ..Self::default() };
    }
}

/// Shared handle to one session's state. Locks are short and never held
/// across an await.
#[derive(Debug, Clone, Default)]
pub struct Session(Arc<Mutex<WizardState>>);

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WizardState {
        self.0.lock().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut WizardState) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Apply `f` only if no reset happened since `epoch` was read.
    pub fn if_current<R>(&self, epoch: u64, f: impl FnOnce(&mut WizardState) -> R) -> Option<R> {
        let mut guard = self.0.lock();
        if guard.epoch != epoch {
            return None;
        }
        Some(f(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize_concept;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn concept(id: &str) -> DesignConcept {
        sanitize_concept(&json!({ "id": id, "name": id }))
    }

    #[test]
    fn reset_restores_initial_values() {
        let mut s = WizardState::default();
        s.set_project_intent("coffee shop site");
        s.set_sketch_data("data:image/png;base64,AA", json!({ "mode": "paint" }));
        s.set_is_generating_concepts(true);
        s.set_concepts(vec![concept("a"), concept("b")]);
        s.select_by_id("b").unwrap();
        s.set_is_building(true);
        s.set_generated_code([("/App.js".to_string(), "x".to_string())].into_iter().collect()).unwrap();
        s.set_current_step(Step::Build);

        s.reset();

        let mut expected = WizardState::default();
        expected.epoch = 1;
        assert_eq!(s, expected);
    }

    #[test]
    fn selection_requires_concepts() {
        let mut s = WizardState::default();
        assert!(s.set_selected_concept(concept("a")).is_err());
        s.set_concepts(vec![concept("a")]);
        assert!(s.set_selected_concept(concept("zzz")).is_err());
        assert!(s.set_selected_concept(concept("a")).is_ok());
        assert_eq!(s.selected_concept.as_ref().unwrap().id, "a");
    }

    #[test]
    fn new_list_drops_a_stale_selection() {
        let mut s = WizardState::default();
        s.set_concepts(vec![concept("a"), concept("b")]);
        s.select_by_id("a").unwrap();

        s.set_concepts(vec![concept("a"), concept("c")]);
        assert_eq!(s.selected_concept.as_ref().unwrap().id, "a");

        s.set_concepts(vec![concept("c"), concept("d")]);
        assert!(s.selected_concept.is_none());
    }

    #[test]
    fn code_requires_selection_and_is_set_once() {
        let mut s = WizardState::default();
        let bundle: CodeBundle = [("/App.js".to_string(), "x".to_string())].into_iter().collect();
        assert!(s.set_generated_code(bundle.clone()).is_err());

        s.set_concepts(vec![concept("a")]);
        s.select_by_id("a").unwrap();
        s.set_generated_code(bundle.clone()).unwrap();
        assert!(s.set_generated_code(bundle).is_err());
    }

    #[test]
    fn steps_saturate() {
        let mut s = WizardState::default();
        s.prev_step();
        assert_eq!(s.current_step, Step::Idea);
        for _ in 0..10 {
            s.next_step();
        }
        assert_eq!(s.current_step, Step::Build);
        assert_eq!(s.current_step.number(), 5);
        s.prev_step();
        assert_eq!(s.current_step, Step::Select);
    }

    #[test]
    fn stale_epoch_writes_are_dropped() {
        let session = Session::new();
        let epoch = session.snapshot().epoch();
        session.with(|s| s.reset());
        assert!(session.if_current(epoch, |s| s.set_project_intent("late")).is_none());
        assert_eq!(session.snapshot().project_intent, "");
        let epoch = session.snapshot().epoch();
        assert!(session.if_current(epoch, |s| s.set_project_intent("on time")).is_some());
        assert_eq!(session.snapshot().project_intent, "on time");
    }

    #[test]
    fn state_serializes_camel_case() {
        let v = serde_json::to_value(WizardState::default()).unwrap();
        assert_eq!(v["currentStep"], "idea");
        assert_eq!(v["generatedCode"], json!({}));
        assert!(v.get("epoch").is_none());
    }
}
