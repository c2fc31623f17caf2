use controller_core::ObjectKey;

use k8s_openapi::{
    api::apps::v1::{Deployment, StatefulSet},
    api::core::v1::Pod,
    Resource,
};
use kube::ResourceExt;
use serde::Serialize;
use std::fmt;

/// A controller reference as recorded on a pod
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
    pub is_controller: bool,
}

/// Read-only snapshot of the pod fields the restarter looks at
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub namespace: String,
    pub name: String,
    pub owner_references: Vec<OwnerRef>,
}

#[cfg(test)]
impl PodRecord {
    pub fn new(namespace: &str, name: &str, owner_references: Vec<OwnerRef>) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            owner_references,
        }
    }
}

impl From<&Pod> for PodRecord {
    fn from(pod: &Pod) -> Self {
        let owner_references = pod
            .owner_references()
            .iter()
            .map(|owner| OwnerRef {
                kind: owner.kind.clone(),
                name: owner.name.clone(),
                is_controller: owner.controller.unwrap_or(false),
            })
            .collect();
        Self {
            namespace: pod.namespace().unwrap_or_default(),
            name: pod.name_any(),
            owner_references,
        }
    }
}

impl fmt::Display for PodRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Controller kinds that can be rollout-restarted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Deployment,
    StatefulSet,
}

impl ControllerKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        if kind == Deployment::KIND {
            Some(ControllerKind::Deployment)
        } else if kind == StatefulSet::KIND {
            Some(ControllerKind::StatefulSet)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::Deployment => Deployment::KIND,
            ControllerKind::StatefulSet => StatefulSet::KIND,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a pod's controlling owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnerOutcome {
    Supported {
        kind: ControllerKind,
        name: String,
        namespace: String,
    },
    UnsupportedKind {
        kind: String,
    },
    NoController,
}

pub const NO_CONTROLLER_REASON: &str = "no controlling owner";
pub const ALREADY_RESTARTED_REASON: &str = "controller already restarted in this pass";

/// One matched pod and what happened to it
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PodReport {
    pub namespace: String,
    pub pod: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub reason: String,
}

impl PodReport {
    fn new(pod: &PodRecord, owner: Option<&ObjectKey>, reason: String) -> Self {
        Self {
            namespace: pod.namespace.clone(),
            pod: pod.name.clone(),
            owner: owner.map(ToString::to_string),
            reason,
        }
    }
}

/// Outcome of a single restart pass
///
/// Every matched pod lands in exactly one of `restarted`, `skipped` or `errored`.
/// Pods that did not match the name filter are not reported at all.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub restarted: Vec<PodReport>,
    pub skipped: Vec<PodReport>,
    pub errored: Vec<PodReport>,
    pub dry_run: bool,
    /// Set when the pass stopped before the pod listing was exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<String>,
}

impl RunSummary {
    pub fn record_restarted(&mut self, pod: &PodRecord, owner: &ObjectKey, marker: &str) {
        self.restarted
            .push(PodReport::new(pod, Some(owner), format!("restartedAt {marker}")));
    }

    pub fn record_skipped(&mut self, pod: &PodRecord, owner: Option<&ObjectKey>, reason: impl Into<String>) {
        self.skipped.push(PodReport::new(pod, owner, reason.into()));
    }

    pub fn record_errored(&mut self, pod: &PodRecord, owner: &ObjectKey, reason: impl Into<String>) {
        self.errored.push(PodReport::new(pod, Some(owner), reason.into()));
    }

    pub fn matched(&self) -> usize {
        self.restarted.len() + self.skipped.len() + self.errored.len()
    }

    #[cfg(test)]
    pub fn contains_pod(&self, namespace: &str, pod: &str) -> bool {
        self.restarted
            .iter()
            .chain(&self.skipped)
            .chain(&self.errored)
            .any(|report| report.namespace == namespace && report.pod == pod)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "matched: {}, restarted: {}, skipped: {}, errored: {}{}",
            self.matched(),
            self.restarted.len(),
            self.skipped.len(),
            self.errored.len(),
            if self.dry_run { " (dry run)" } else { "" },
        )?;
        for (label, reports) in [
            ("restarted", &self.restarted),
            ("skipped", &self.skipped),
            ("errored", &self.errored),
        ] {
            for report in reports {
                write!(f, "  {label:<9} {}/{}", report.namespace, report.pod)?;
                if let Some(owner) = &report.owner {
                    write!(f, " -> {owner}")?;
                }
                writeln!(f, ": {}", report.reason)?;
            }
        }
        if let Some(reason) = &self.truncated {
            writeln!(f, "pass stopped early: {reason}")?;
        }
        Ok(())
    }
}
