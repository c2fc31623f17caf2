use crate::model::{ControllerKind, OwnerOutcome, PodRecord};

use itertools::Itertools;
use tracing::warn;

/// Determine the controlling owner of a pod from its recorded owner references.
///
/// Only references flagged as controller count. A pod with more than one such
/// reference is reported as having no controller rather than picking one.
pub fn resolve_owner(pod: &PodRecord) -> OwnerOutcome {
    let controllers = pod
        .owner_references
        .iter()
        .filter(|owner| owner.is_controller)
        .collect::<Vec<_>>();

    let controller = match controllers.as_slice() {
        [] => return OwnerOutcome::NoController,
        [controller] => *controller,
        _ => {
            warn!(
                "Pod {} has {} controller references ({}), ignoring all of them",
                pod,
                controllers.len(),
                controllers
                    .iter()
                    .map(|owner| format!("{}/{}", owner.kind, owner.name))
                    .join(", "),
            );
            return OwnerOutcome::NoController;
        }
    };

    match ControllerKind::from_kind(&controller.kind) {
        Some(kind) => OwnerOutcome::Supported {
            kind,
            name: controller.name.clone(),
            namespace: pod.namespace.clone(),
        },
        None => OwnerOutcome::UnsupportedKind {
            kind: controller.kind.clone(),
        },
    }
}
