//! Five-stage progress stepper for a case and its visit.
//!
//! Pure derivation: the same inputs always give the same stages, and stage
//! order never changes. Each stage has its own completion predicate; stages
//! are not forced to complete in order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{CaseSnapshot, CaseStatus, VisitCompletionRecord, VisitSnapshot, VisitStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CaseCreated,
    Assigned,
    InProcess,
    Finished,
    CaseClosed,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::CaseCreated,
        Stage::Assigned,
        Stage::InProcess,
        Stage::Finished,
        Stage::CaseClosed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::CaseCreated => "Caso Creado",
            Self::Assigned => "Asignada",
            Self::InProcess => "En Proceso",
            Self::Finished => "Finalizada",
            Self::CaseClosed => "Caso Cerrado",
        }
    }
}

/// Related records, any of which may not have loaded yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageInputs<'a> {
    pub case: Option<&'a CaseSnapshot>,
    pub visit: Option<&'a VisitSnapshot>,
    pub completion: Option<&'a VisitCompletionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageView {
    pub stage: Stage,
    pub complete: bool,
    /// Shown instead of "Pendiente" when the stage is complete.
    pub timestamp: Option<DateTime<Utc>>,
    /// Line to the next stage. Lit when the next stage is complete.
    pub connector_lit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageProgress {
    pub stages: Vec<StageView>,
}

impl StageProgress {
    pub fn get(&self, stage: Stage) -> &StageView {
        // `derive_stages` always emits every stage in `Stage::ALL` order.
        &self.stages[stage as usize]
    }

    pub fn completed(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().filter(|v| v.complete).map(|v| v.stage)
    }
}

fn predicate(stage: Stage, inputs: &StageInputs<'_>) -> (bool, Option<DateTime<Utc>>) {
    match stage {
        Stage::CaseCreated => (inputs.case.is_some(), inputs.case.and_then(|c| c.created_at)),
        Stage::Assigned => {
            let at = inputs.visit.and_then(|v| v.scheduled_at);
            (at.is_some(), at)
        }
        Stage::InProcess => match inputs.visit {
            Some(v) => (v.has_been_touched_since_creation(), v.updated_at),
            None => (false, None),
        },
        Stage::Finished => {
            let finished = inputs.visit.is_some_and(|v| v.status == VisitStatus::Finished);
            match inputs.completion {
                Some(c) if finished => (true, c.created_at),
                _ => (false, None),
            }
        }
        Stage::CaseClosed => match inputs.case {
            Some(c) if c.status == CaseStatus::Closed => (true, c.updated_at),
            _ => (false, None),
        },
    }
}

pub fn derive_stages(inputs: StageInputs<'_>) -> StageProgress {
    let flags: Vec<(bool, Option<DateTime<Utc>>)> =
        Stage::ALL.iter().map(|&stage| predicate(stage, &inputs)).collect();

    let stages = Stage::ALL
        .iter()
        .enumerate()
        .map(|(i, &stage)| {
            let (complete, timestamp) = flags[i];
            StageView {
                stage,
                complete,
                timestamp: if complete { timestamp } else { None },
                connector_lit: flags.get(i + 1).is_some_and(|(next, _)| *next),
            }
        })
        .collect();

    StageProgress { stages }
}
