//! AWS EKS SDK client wrapper.

use std::future::Future;

use anyhow::Result;
use aws_sdk_eks::Client;
use aws_sdk_eks::types::Cluster;
use tracing::debug;

use crate::error::EkcfgError;
use crate::kubeconfig::ClusterDescriptor;

/// Source of cluster descriptors.
///
/// Returns `Ok(None)` when the cluster does not exist.
pub trait ClusterDescriber {
    fn describe_cluster(
        &self,
        cluster_name: &str,
    ) -> impl Future<Output = Result<Option<ClusterDescriptor>>> + Send;
}

/// EKS client wrapper for cluster lookups.
#[derive(Clone)]
pub struct EksClient {
    client: Client,
    region: String,
}

impl EksClient {
    /// Create a new EKS client with the given AWS configuration.
    pub async fn new(profile: Option<&str>, region: Option<&str>) -> Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(profile) = profile {
            debug!("Using AWS profile: {}", profile);
            config_loader = config_loader.profile_name(profile);
        }

        if let Some(region) = region {
            debug!("Using AWS region: {}", region);
            config_loader = config_loader.region(aws_config::Region::new(region.to_string()));
        }

        let config = config_loader.load().await;
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            client: Client::new(&config),
            region,
        })
    }
}

impl ClusterDescriber for EksClient {
    async fn describe_cluster(&self, cluster_name: &str) -> Result<Option<ClusterDescriptor>> {
        debug!(cluster = %cluster_name, region = %self.region, "Describing cluster");

        let response = match self.client.describe_cluster().name(cluster_name).send().await {
            Ok(response) => response,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                debug!(cluster = %cluster_name, "Cluster does not exist");
                return Ok(None);
            }
            Err(e) => return Err(EkcfgError::aws(module_path!(), e).into()),
        };

        Ok(response.cluster().map(to_descriptor))
    }
}

/// Map an SDK cluster into a descriptor, keeping absent fields absent.
fn to_descriptor(cluster: &Cluster) -> ClusterDescriptor {
    ClusterDescriptor {
        name: cluster.name().map(str::to_string),
        endpoint: cluster.endpoint().map(str::to_string),
        certificate_authority_data: cluster
            .certificate_authority()
            .and_then(|ca| ca.data())
            .map(str::to_string),
        arn: cluster.arn().map(str::to_string),
    }
}
