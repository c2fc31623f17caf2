use super::RESTART_ANNOTATION;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use k8s_openapi::{
    api::apps::v1::{Deployment, StatefulSet},
    api::core::v1::PodTemplateSpec,
    NamespaceResourceScope,
};
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// A namespaced controller whose pods are rolled by changing its pod template
pub trait Restartable:
    Resource<DynamicType = (), Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned + Serialize
{
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec>;
}

impl Restartable for Deployment {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }
}

impl Restartable for StatefulSet {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|spec| &mut spec.template)
    }
}

/// Marker value for a restart requested at `now`.
///
/// RFC 3339 in UTC at second precision, as `kubectl rollout restart` writes it.
/// The marker is the wall-clock second of `now`, unless `previous` already names
/// that second; then it moves one second ahead so the template still changes.
pub fn next_restart_marker(previous: Option<&str>, now: DateTime<Utc>) -> String {
    let now = now.trunc_subsecs(0);
    let previous = previous
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc).trunc_subsecs(0));

    let marker = match previous {
        Some(previous) if previous == now => now + Duration::seconds(1),
        _ => now,
    };
    marker.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Sets the restart marker on the pod template, leaving every other annotation as is.
///
/// Returns the marker written, or `None` when the object carries no pod template.
pub fn stamp_restart_marker<R: Restartable>(resource: &mut R, now: DateTime<Utc>) -> Option<String> {
    let template = resource.pod_template_mut()?;
    let annotations = template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(BTreeMap::new);

    let marker = next_restart_marker(annotations.get(RESTART_ANNOTATION).map(String::as_str), now);
    annotations.insert(RESTART_ANNOTATION.to_string(), marker.clone());
    Some(marker)
}
