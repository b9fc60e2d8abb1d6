//! What to do when a package already exists in the catalog

use crate::{PackageError, Result};
use std::fmt;
use std::io;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// Keep the existing package
    Skip,
    /// Stop the whole run
    Abort,
    /// Delete the existing package and create the new one
    Update,
}

impl FromStr for ConflictAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "skip" => Ok(ConflictAction::Skip),
            "a" | "abort" => Ok(ConflictAction::Abort),
            "u" | "update" => Ok(ConflictAction::Update),
            other => Err(format!(
                "invalid exists action '{}' (expected s, u or a)",
                other
            )),
        }
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictAction::Skip => write!(f, "skip"),
            ConflictAction::Abort => write!(f, "abort"),
            ConflictAction::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionScope {
    ThisConflict,
    /// Reuse the action for every later conflict of the run
    AllRemaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictDecision {
    pub action: ConflictAction,
    pub scope: DecisionScope,
}

impl ConflictDecision {
    pub fn once(action: ConflictAction) -> Self {
        Self {
            action,
            scope: DecisionScope::ThisConflict,
        }
    }

    pub fn always(action: ConflictAction) -> Self {
        Self {
            action,
            scope: DecisionScope::AllRemaining,
        }
    }
}

/// A create request rejected because the package exists
#[derive(Debug, Clone, Copy)]
pub struct Conflict<'a> {
    pub full_name: &'a str,
    pub version: &'a str,
    /// Pulled in through `Require` rather than named by the caller
    pub is_dependency: bool,
    pub reason: &'a str,
}

/// Decides how conflicts are handled during one import run
pub trait ConflictPolicy {
    fn decide(&mut self, conflict: &Conflict<'_>) -> Result<ConflictDecision>;

    /// Forget run-scoped state; called when a run starts
    fn reset(&mut self) {}
}

/// Non-interactive policy with fixed actions
#[derive(Debug, Clone, Copy)]
pub struct PresetPolicy {
    pub root: ConflictAction,
    pub dependency: ConflictAction,
}

impl PresetPolicy {
    pub fn new(action: ConflictAction) -> Self {
        Self {
            root: action,
            dependency: action,
        }
    }

    pub fn with_dependency_action(mut self, action: ConflictAction) -> Self {
        self.dependency = action;
        self
    }
}

impl ConflictPolicy for PresetPolicy {
    fn decide(&mut self, conflict: &Conflict<'_>) -> Result<ConflictDecision> {
        let action = if conflict.is_dependency {
            self.dependency
        } else {
            self.root
        };
        debug!(package = conflict.full_name, %action, "preset conflict action");
        Ok(ConflictDecision::always(action))
    }
}

/// Asks a person what to do
pub trait Prompter {
    /// Show `message` and return the raw answer
    fn choose(&mut self, message: &str) -> io::Result<String>;
}

/// Prompts per conflict.
///
/// A lowercase answer (`s`, `u`, `a`) applies to the current conflict, an
/// uppercase one (`S`, `U`, `A`) to every remaining conflict of the run.
/// Dependency conflicts use the preset dependency action when one is set.
pub struct InteractivePolicy<P> {
    prompter: P,
    dependency_preset: Option<ConflictAction>,
    remembered: Option<ConflictAction>,
}

impl<P: Prompter> InteractivePolicy<P> {
    pub fn new(prompter: P) -> Self {
        Self {
            prompter,
            dependency_preset: None,
            remembered: None,
        }
    }

    pub fn with_dependency_action(mut self, action: Option<ConflictAction>) -> Self {
        self.dependency_preset = action;
        self
    }

    fn prompt(&mut self, conflict: &Conflict<'_>) -> Result<ConflictDecision> {
        let message = format!(
            "Package {} ({}) already exists: {}. \
             Skip, Update or Abort? (s/u/a; uppercase applies to all)",
            conflict.full_name, conflict.version, conflict.reason
        );

        loop {
            let answer = self.prompter.choose(&message).map_err(|e| match e.kind() {
                io::ErrorKind::Interrupted => {
                    PackageError::Interrupted(conflict.full_name.to_string())
                }
                _ => PackageError::IoError(e),
            })?;
            let answer = answer.trim();
            match parse_answer(answer) {
                Some(decision) => return Ok(decision),
                None => debug!(answer, "unrecognised conflict answer"),
            }
        }
    }
}

fn parse_answer(answer: &str) -> Option<ConflictDecision> {
    let mut chars = answer.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        let action = answer.parse().ok()?;
        return Some(ConflictDecision::once(action));
    }
    let action = first.to_string().parse().ok()?;
    Some(if first.is_ascii_uppercase() {
        ConflictDecision::always(action)
    } else {
        ConflictDecision::once(action)
    })
}

impl<P: Prompter> ConflictPolicy for InteractivePolicy<P> {
    fn decide(&mut self, conflict: &Conflict<'_>) -> Result<ConflictDecision> {
        if conflict.is_dependency {
            if let Some(action) = self.dependency_preset {
                return Ok(ConflictDecision::always(action));
            }
        }
        if let Some(action) = self.remembered {
            return Ok(ConflictDecision::always(action));
        }

        let decision = self.prompt(conflict)?;
        if decision.scope == DecisionScope::AllRemaining {
            self.remembered = Some(decision.action);
        }
        Ok(decision)
    }

    fn reset(&mut self) {
        self.remembered = None;
    }
}

/// Pick the policy for a run.
///
/// With an exists action nothing is ever prompted; without one, root
/// conflicts go to the prompter.
pub fn select_policy<P: Prompter + 'static>(
    exists_action: Option<ConflictAction>,
    dep_exists_action: Option<ConflictAction>,
    prompter: P,
) -> Box<dyn ConflictPolicy> {
    match exists_action {
        Some(action) => Box::new(
            PresetPolicy::new(action).with_dependency_action(dep_exists_action.unwrap_or(action)),
        ),
        None => Box::new(InteractivePolicy::new(prompter).with_dependency_action(dep_exists_action)),
    }
}

/// Turn an abort decision into the run-terminating error
pub(crate) fn aborted(conflict: &Conflict<'_>) -> PackageError {
    PackageError::Aborted(conflict.full_name.to_string())
}
