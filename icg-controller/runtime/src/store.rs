use crate::core::{ConfigStore, MeshResource, StoreError};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use tracing::{instrument, trace};

const FIELD_MANAGER: &str = "icg-controller";

/// A [`ConfigStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: kube::Client,
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api<K: MeshResource>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl ConfigStore for KubeStore {
    #[instrument(skip(self), fields(kind = %K::KIND))]
    async fn list<K: MeshResource>(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(store_error)?;
        trace!(items = list.items.len());
        Ok(list.items)
    }

    #[instrument(skip(self), fields(kind = %K::KIND))]
    async fn get<K: MeshResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(store_error)
    }

    #[instrument(skip(self, resource), fields(kind = %K::KIND))]
    async fn create<K: MeshResource>(&self, resource: &K) -> Result<K, StoreError> {
        let namespace = resource.meta().namespace.as_deref().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<K>(namespace)
            .create(&params, resource)
            .await
            .map_err(store_error)
    }

    #[instrument(skip(self), fields(kind = %K::KIND))]
    async fn delete<K: MeshResource>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let deleted = self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(store_error)?;
        // The API returns the object, rather than a status, while finalizers
        // hold it.
        if deleted.is_left() {
            return Err(StoreError::DeletionPending);
        }
        Ok(())
    }
}

fn store_error(error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(rsp) if rsp.code == 404 => StoreError::NotFound,
        kube::Error::Api(rsp) if rsp.code == 409 => StoreError::AlreadyExists,
        kube::Error::Api(rsp) => StoreError::Rejected {
            code: rsp.code,
            message: rsp.message,
        },
        error => StoreError::Client(error),
    }
}
