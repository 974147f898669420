//! Kubernetes-backed implementation of [`ClusterApi`]

use async_trait::async_trait;
use kube::{api::Api, Client};
use pgrestore_models::{Backup, Cluster};

use crate::backup::ClusterApi;
use crate::error::{RestoreError, Result};

/// Get a Kubernetes client
pub async fn get_k8s_client() -> Result<Client> {
    Ok(Client::try_default().await?)
}

/// Reads Backup and Cluster resources through the API server
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the in-cluster or kubeconfig environment
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(get_k8s_client().await?))
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_backup(&self, namespace: &str, name: &str) -> Result<Backup> {
        let backups: Api<Backup> = Api::namespaced(self.client.clone(), namespace);

        match backups.get(name).await {
            Ok(backup) => Ok(backup),
            Err(kube::Error::Api(response)) if response.code == 404 => Err(RestoreError::BackupNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster> {
        let clusters: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(clusters.get(name).await?)
    }
}
