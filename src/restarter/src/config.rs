use crate::directory::DEFAULT_PAGE_SIZE;
use crate::filter::NameFilter;

use controller_core::{Error, Result};

use kube::{
    client::Client,
    config::{Config, KubeConfigOptions, Kubeconfig},
};
use std::path::Path;

/// Settings for a single restart pass
#[derive(Clone, Debug)]
pub struct RestarterConfig {
    pub name_filter: NameFilter,
    pub page_size: u32,
    /// Send updates with `dryRun=All`
    pub dry_run: bool,
    /// Re-read and retry this many times when an update hits a conflict
    pub conflict_retries: u32,
    /// Restart every controller at most once per pass
    pub once_per_controller: bool,
}

impl Default for RestarterConfig {
    fn default() -> Self {
        Self {
            name_filter: NameFilter::default(),
            page_size: DEFAULT_PAGE_SIZE,
            dry_run: false,
            conflict_retries: 0,
            once_per_controller: false,
        }
    }
}

/// Build a client from an explicit kubeconfig file, or infer one
/// (`KUBECONFIG`, `~/.kube/config`, in-cluster service account).
///
/// A kubeconfig path that does not exist is an error, never a fallback to inference.
pub async fn kube_client(kubeconfig: Option<&Path>, context: Option<String>) -> Result<Client> {
    let config = client_config(kubeconfig, context).await?;
    Client::try_from(config).map_err(Error::KubeError)
}

async fn client_config(kubeconfig: Option<&Path>, context: Option<String>) -> Result<Config> {
    let options = KubeConfigOptions {
        context,
        ..Default::default()
    };

    match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(Error::KubeconfigError)?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(Error::KubeconfigError)
        }
        None if options.context.is_some() => Config::from_kubeconfig(&options)
            .await
            .map_err(Error::KubeconfigError),
        None => Config::infer().await.map_err(Error::InferConfigError),
    }
}
