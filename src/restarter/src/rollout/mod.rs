mod apps;
mod core;

pub use self::apps::{next_restart_marker, stamp_restart_marker, Restartable};
pub use self::core::*;

/// Annotation `kubectl rollout restart` sets on the pod template
pub const RESTART_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

const FIELD_MANAGER: &str = "restarter";
