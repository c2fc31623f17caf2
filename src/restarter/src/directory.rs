use crate::model::PodRecord;

use controller_core::{Error, Operation, Result};

use futures::{stream, Stream};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, ListParams},
    client::Client,
};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Read-only view over the pods of the whole cluster
pub struct WorkloadDirectory {
    pods: Api<Pod>,
    page_size: u32,
}

impl WorkloadDirectory {
    pub fn new(client: Client, page_size: u32) -> Self {
        Self {
            pods: Api::all(client),
            page_size,
        }
    }

    /// Lists pods across all namespaces one page at a time.
    ///
    /// Pages are fetched lazily as the stream is polled.
    pub fn pages(&self) -> impl Stream<Item = Result<Vec<PodRecord>>> + '_ {
        // `None` once the last page has been handed out
        let first_page: Option<Option<String>> = Some(None);
        stream::try_unfold(first_page, move |state| async move {
            match state {
                Some(continue_token) => self
                    .list_page(continue_token)
                    .await
                    .map(|(records, next)| Some((records, next.map(Some)))),
                None => Ok(None),
            }
        })
    }

    async fn list_page(&self, continue_token: Option<String>) -> Result<(Vec<PodRecord>, Option<String>)> {
        let mut params = ListParams::default().limit(self.page_size);
        if let Some(token) = continue_token.as_deref() {
            params = params.continue_token(token);
        }

        let list = self
            .pods
            .list(&params)
            .await
            .map_err(|e| Error::remote(Operation::List, e))?;
        let next = list.metadata.continue_.filter(|token| !token.is_empty());
        debug!(
            "Listed {} pods, more pages: {}",
            list.items.len(),
            next.is_some(),
        );

        let records = list.items.iter().map(PodRecord::from).collect();
        Ok((records, next))
    }
}
