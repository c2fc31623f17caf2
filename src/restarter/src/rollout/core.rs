use super::{apps::stamp_restart_marker, Restartable, FIELD_MANAGER};
use crate::config::RestarterConfig;
use crate::model::ControllerKind;

use controller_core::{Error, ObjectKey, Operation, Result};

use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::{
    api::{Api, PostParams, ResourceExt},
    client::Client,
};
use tracing::{debug, info, warn};

/// Triggers a rolling restart of a controller by updating its pod template
pub struct RolloutTrigger {
    client: Client,
    post_params: PostParams,
    conflict_retries: u32,
}

impl RolloutTrigger {
    pub fn new(client: Client, config: &RestarterConfig) -> Self {
        Self {
            client,
            post_params: PostParams {
                dry_run: config.dry_run,
                field_manager: Some(FIELD_MANAGER.to_string()),
            },
            conflict_retries: config.conflict_retries,
        }
    }

    /// Restart the pods of `kind` `namespace/name`, returning the marker written.
    ///
    /// Each successful call requests one more rollout.
    pub async fn trigger_restart(&self, kind: ControllerKind, namespace: &str, name: &str) -> Result<String> {
        match kind {
            ControllerKind::Deployment => self.restart::<Deployment>(namespace, name).await,
            ControllerKind::StatefulSet => self.restart::<StatefulSet>(namespace, name).await,
        }
    }

    async fn restart<R: Restartable>(&self, namespace: &str, name: &str) -> Result<String> {
        let api: Api<R> = Api::namespaced(self.client.clone(), namespace);
        let key = ObjectKey::new(R::kind(&()), namespace, name);

        let mut attempt = 0;
        loop {
            match self.restart_once(&api, &key).await {
                Err(err) if err.is_conflict() && attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        "{} changed while restarting, retrying ({}/{})",
                        key, attempt, self.conflict_retries,
                    );
                }
                result => return result,
            }
        }
    }

    async fn restart_once<R: Restartable>(&self, api: &Api<R>, key: &ObjectKey) -> Result<String> {
        let mut resource = api
            .get(&key.name)
            .await
            .map_err(|e| Error::from_kube(Operation::Get, key.clone(), e))?;

        let marker =
            stamp_restart_marker(&mut resource, Utc::now()).ok_or_else(|| Error::MissingTemplate(key.clone()))?;
        debug!(
            "Replacing {} at resourceVersion {} with {}",
            key,
            resource.resource_version().unwrap_or_default(),
            marker,
        );

        api.replace(&key.name, &self.post_params, &resource)
            .await
            .map_err(|e| Error::from_kube(Operation::Update, key.clone(), e))?;
        info!(
            "Triggered rollout restart of {}{}",
            key,
            if self.post_params.dry_run { " (dry run)" } else { "" },
        );
        Ok(marker)
    }
}
