//! Page controllers: one function per user action on each wizard page. Each
//! reads and writes the session it is handed and reports where the user
//! should go next.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::errors::BlueprintError;
use crate::pipeline::Pipeline;
use crate::wire::{CodeBundle, DesignConcept};
use crate::wizard::{Session, Step, WizardState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Idea,
    Design,
    Select,
    Build,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Idea => "/",
            Route::Design => "/design",
            Route::Select => "/select",
            Route::Build => "/build",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Go(Route),
}

impl Navigation {
    pub fn redirect(self) -> Option<&'static str> {
        match self {
            Navigation::Stay => None,
            Navigation::Go(r) => Some(r.path()),
        }
    }
}

pub const FALLBACK_APP: &str = r#"import React from 'react'; export default function App() { return <div className="p-10 text-center font-bold text-red-500">Error generating code. Please try again.</div> }"#;

pub fn fallback_bundle() -> CodeBundle {
    [("/App.js".to_string(), FALLBACK_APP.to_string())].into_iter().collect()
}

/// Undoes a loading flag if the controller future is dropped while it awaits
/// the model. Disarmed once the result has been written back.
struct LoadingGuard<'a> {
    session: &'a Session,
    epoch: u64,
    clear: Option<fn(&mut WizardState)>,
}

impl<'a> LoadingGuard<'a> {
    fn new(session: &'a Session, epoch: u64, clear: fn(&mut WizardState)) -> Self {
        Self { session, epoch, clear: Some(clear) }
    }

    fn disarm(mut self) {
        self.clear = None;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if let Some(clear) = self.clear.take() {
            if self.session.if_current(self.epoch, clear).is_some() {
                tracing::debug!("request dropped mid-call; loading flag cleared");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Idea
// ---------------------------------------------------------------------------

pub fn submit_intent(session: &Session, intent: &str) -> Navigation {
    session.with(|s| {
        s.set_project_intent(intent);
        if intent.trim().is_empty() {
            Navigation::Stay
        } else {
            s.set_current_step(Step::Sketch);
            Navigation::Go(Route::Design)
        }
    })
}

// ---------------------------------------------------------------------------
// Design
// ---------------------------------------------------------------------------

/// Store the sketch, run the concepts call and move on to selection. The
/// generating flag is cleared whatever happens, cancellation included.
pub async fn generate_concepts(session: &Session, pipeline: &Pipeline, sketch_data: &str) -> Result<Navigation> {
    let started = session.with(|s| {
        if s.is_generating_concepts {
            return Err(BlueprintError::Wizard("concepts are already being generated".into()));
        }
        if !s.generated_code.is_empty() {
            return Err(BlueprintError::Wizard("code was already generated; restart to make new concepts".into()));
        }
        s.set_is_generating_concepts(true);
        let metadata = json!({ "intent": s.project_intent, "mode": "paint" });
        s.set_sketch_data(sketch_data, metadata.clone());
        s.set_current_step(Step::Concepts);
        Ok((s.project_intent.clone(), metadata, s.epoch()))
    });
    let (intent, metadata, epoch) = started?;
    let guard = LoadingGuard::new(session, epoch, |s| {
        s.set_is_generating_concepts(false);
        s.set_current_step(Step::Sketch);
    });

    let result = pipeline.concepts(&intent, sketch_data, &metadata).await;
    guard.disarm();

    let applied = session.if_current(epoch, |s| {
        s.set_is_generating_concepts(false);
        match result {
            Ok(concepts) => {
                s.set_concepts(concepts);
                s.set_current_step(Step::Select);
                Ok(Navigation::Go(Route::Select))
            }
            Err(e) => {
                s.set_current_step(Step::Sketch);
                Err(e)
            }
        }
    });
    match applied {
        Some(Ok(nav)) => Ok(nav),
        Some(Err(e)) => {
            tracing::error!("failed to generate concepts: {e:#}");
            Err(e)
        }
        None => {
            tracing::debug!("session was reset while concepts were generating; result dropped");
            Ok(Navigation::Stay)
        }
    }
}

// ---------------------------------------------------------------------------
// Select
// ---------------------------------------------------------------------------

/// Nothing to choose from and nothing on the way: back to the canvas.
pub fn select_guard(session: &Session) -> Navigation {
    session.with(|s| {
        if s.concepts.is_empty() && !s.is_generating_concepts {
            Navigation::Go(Route::Design)
        } else {
            Navigation::Stay
        }
    })
}

pub fn select_concept(session: &Session, id: &str) -> Result<DesignConcept> {
    Ok(session.with(|s| s.select_by_id(id))?)
}

pub fn confirm_selection(session: &Session) -> Navigation {
    session.with(|s| {
        if s.selected_concept.is_some() {
            s.set_current_step(Step::Build);
            Navigation::Go(Route::Build)
        } else {
            Navigation::Stay
        }
    })
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BuildOutcome {
    /// Missing selection/intent, already built, or a build in flight.
    Skipped { reason: &'static str },
    Built { files: usize },
    /// The code call failed; the error app was stored instead.
    Fallback { error: String },
    /// The session was reset mid-flight; nothing was written.
    Discarded,
}

pub async fn build(session: &Session, pipeline: &Pipeline) -> Result<BuildOutcome> {
    let started = session.with(|s| {
        let Some(concept) = s.selected_concept.clone() else {
            return Err("no concept selected");
        };
        if s.project_intent.trim().is_empty() {
            return Err("no project intent");
        }
        if !s.generated_code.is_empty() {
            return Err("already built");
        }
        if s.is_building {
            return Err("build in progress");
        }
        s.set_is_building(true);
        Ok((s.project_intent.clone(), concept, s.epoch()))
    });
    let (intent, concept, epoch) = match started {
        Ok(v) => v,
        Err(reason) => return Ok(BuildOutcome::Skipped { reason }),
    };
    let guard = LoadingGuard::new(session, epoch, |s| s.set_is_building(false));

    let result = match serde_json::to_value(&concept) {
        Ok(v) => pipeline.generate_code(&intent, &v).await,
        Err(e) => Err(e.into()),
    };
    guard.disarm();
    let (bundle, outcome) = match result {
        Ok(b) => {
            let files = b.len();
            (b, BuildOutcome::Built { files })
        }
        Err(e) => {
            tracing::error!("code generation failed: {e:#}");
            (fallback_bundle(), BuildOutcome::Fallback { error: format!("{e:#}") })
        }
    };

    match session.if_current(epoch, |s| {
        s.set_is_building(false);
        s.set_generated_code(bundle)
    }) {
        Some(r) => {
            r?;
            Ok(outcome)
        }
        None => {
            tracing::debug!("session was reset during build; bundle dropped");
            Ok(BuildOutcome::Discarded)
        }
    }
}

/// Start over from the idea page.
pub fn restart(session: &Session) -> Navigation {
    session.with(|s| s.reset());
    Navigation::Go(Route::Idea)
}
