use tracing::{debug, warn};

use crate::hooks::{HookError, RefUpdateContext, SubmitHooks};
use crate::providers::{ObjectsProvider, RefUpdateCommand};

/// Invoke every registered ref operation validator with one project's full
/// command map plus a read handle on the would-be post-state. The first
/// error vetoes that project's transaction; transactions already committed
/// for other projects in the same submission are unaffected.
pub fn validate_project(
    hooks: &SubmitHooks,
    project: &str,
    commands: &[RefUpdateCommand],
    objects: &dyn ObjectsProvider,
) -> Result<(), HookError> {
    debug!(
        "Validating {} ref command(s) for project {}",
        commands.len(),
        project
    );
    let ctx = RefUpdateContext {
        project,
        commands,
        objects,
    };
    if let Err(e) = hooks.validate_ref_operations(&ctx) {
        warn!("Ref operation validator vetoed project {}: {}", project, e);
        return Err(e);
    }
    Ok(())
}
