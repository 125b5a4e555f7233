//! Registration point for submission plugins: ref operation validators that
//! can veto a project's transaction, and commit message modifiers that amend
//! synthesized commit messages. Hooks run synchronously in registration
//! order; the first error short-circuits.

use thiserror::Error;
use tracing::info;

use crate::providers::{ObjectsProvider, RefUpdateCommand};
use crate::types::{BranchKey, ObjectId};

/// Error raised by a registered hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("ref update rejected: {0}")]
    Rejected(String),
    #[error("commit message modifier failed: {0}")]
    MessageModifier(String),
}

/// What a validator sees: the full command map for one project plus a read
/// handle on the would-be post-state objects.
pub struct RefUpdateContext<'a> {
    pub project: &'a str,
    pub commands: &'a [RefUpdateCommand],
    pub objects: &'a dyn ObjectsProvider,
}

/// Pre-ref-update listener; an error vetoes the project's transaction
pub trait RefOperationValidator: Send + Sync {
    fn validate(&self, ctx: &RefUpdateContext<'_>) -> Result<(), HookError>;
}

/// Hook that may append lines to a synthesized commit message
pub trait CommitMessageModifier: Send + Sync {
    fn modify(
        &self,
        message: String,
        source: &ObjectId,
        tip: Option<&ObjectId>,
        dest: &BranchKey,
    ) -> Result<String, HookError>;
}

/// Registry that holds all registered submission hooks
#[derive(Default)]
pub struct SubmitHooks {
    validators: Vec<Box<dyn RefOperationValidator>>,
    message_modifiers: Vec<Box<dyn CommitMessageModifier>>,
}

impl SubmitHooks {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ref operation validator
    pub fn register_validator<V: RefOperationValidator + 'static>(&mut self, validator: V) {
        info!("Registering ref operation validator");
        self.validators.push(Box::new(validator));
    }

    /// Register a commit message modifier
    pub fn register_message_modifier<M: CommitMessageModifier + 'static>(&mut self, modifier: M) {
        info!("Registering commit message modifier");
        self.message_modifiers.push(Box::new(modifier));
    }

    /// Invoke every validator with the project's command map
    pub fn validate_ref_operations(&self, ctx: &RefUpdateContext<'_>) -> Result<(), HookError> {
        for validator in &self.validators {
            validator.validate(ctx)?;
        }
        Ok(())
    }

    /// Run a synthesized commit message through every modifier. A modifier
    /// returning an empty message aborts the submission.
    pub fn amend_commit_message(
        &self,
        message: String,
        source: &ObjectId,
        tip: Option<&ObjectId>,
        dest: &BranchKey,
    ) -> Result<String, HookError> {
        let mut message = message;
        for modifier in &self.message_modifiers {
            message = modifier.modify(message, source, tip, dest)?;
            if message.trim().is_empty() {
                return Err(HookError::MessageModifier(
                    "modifier returned an empty commit message".to_string(),
                ));
            }
        }
        Ok(message)
    }
}
