//! CloudFormation custom resource handler for kubeconfig generation.
//!
//! Create and Update events describe the cluster and return the rendered
//! kubeconfig as resource data. Delete events are acknowledged without side
//! effects since nothing external is created.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::eks::ClusterDescriber;
use crate::error::EkcfgError;
use crate::kubeconfig::{self, KubeConfigDocument};

/// Prefix of the physical resource id returned for every cluster.
pub const PHYSICAL_ID_PREFIX: &str = "kubeconfig-";

/// Where the document is written when running inside Lambda.
pub const LAMBDA_KUBECONFIG_PATH: &str = "/tmp/kubeconfig";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_arn: Option<String>,
}

/// Custom resource lifecycle event as delivered by CloudFormation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: RequestType,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, rename = "ResponseURL", skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
}

impl CustomResourceEvent {
    /// Parse an event from its JSON representation.
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| EkcfgError::InvalidEvent(e.to_string()).into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(rename = "KubeConfigContent")]
    pub kube_config_content: String,
}

/// Result handed back to the custom resource provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub physical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// Write the rendered document here after a successful synthesis.
    pub output_path: Option<PathBuf>,
}

impl HandlerOptions {
    /// Resolve the output path, defaulting to `/tmp/kubeconfig` inside Lambda.
    pub fn resolve(output_path: Option<PathBuf>, lambda_function: Option<&str>) -> Self {
        let output_path = output_path.or_else(|| {
            lambda_function
                .filter(|name| !name.is_empty())
                .map(|_| PathBuf::from(LAMBDA_KUBECONFIG_PATH))
        });
        Self { output_path }
    }
}

/// Physical resource id for the kubeconfig of a cluster.
pub fn physical_resource_id(cluster_name: &str) -> String {
    format!("{PHYSICAL_ID_PREFIX}{cluster_name}")
}

/// Process a single lifecycle event.
pub async fn handle_event<D: ClusterDescriber>(
    describer: &D,
    event: &CustomResourceEvent,
    options: &HandlerOptions,
) -> Result<CustomResourceResponse> {
    info!(
        request_type = ?event.request_type,
        logical_resource_id = event.logical_resource_id.as_deref().unwrap_or(""),
        request_id = event.request_id.as_deref().unwrap_or(""),
        "Received custom resource event"
    );

    let result = process(describer, event, options).await;
    if let Err(e) = &result {
        error!(request_type = ?event.request_type, error = %e, "Custom resource event failed");
    }
    result
}

async fn process<D: ClusterDescriber>(
    describer: &D,
    event: &CustomResourceEvent,
    options: &HandlerOptions,
) -> Result<CustomResourceResponse> {
    let cluster_name = event
        .resource_properties
        .cluster_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| EkcfgError::MissingProperty("ClusterName".to_string()))?;

    if event.request_type == RequestType::Delete {
        let physical_id = event
            .physical_resource_id
            .clone()
            .unwrap_or_else(|| physical_resource_id(cluster_name));
        info!(physical_resource_id = %physical_id, "Delete acknowledged, nothing to clean up");
        return Ok(CustomResourceResponse {
            physical_resource_id: physical_id,
            data: None,
        });
    }

    let mut descriptor = describer
        .describe_cluster(cluster_name)
        .await?
        .ok_or_else(|| EkcfgError::ClusterNotFound(cluster_name.to_string()))?;

    if descriptor.arn.is_none() {
        descriptor.arn = event.resource_properties.cluster_arn.clone();
    }

    let document = kubeconfig::synthesize(&descriptor)?;
    info!(
        cluster = %cluster_name,
        region = kubeconfig::region_from_arn(descriptor.arn.as_deref()),
        bytes = document.len(),
        "Kubeconfig generated"
    );

    if let Some(path) = &options.output_path {
        persist(&document, path)?;
    }

    Ok(CustomResourceResponse {
        physical_resource_id: physical_resource_id(cluster_name),
        data: Some(ResponseData {
            kube_config_content: document.into_string(),
        }),
    })
}

/// Write the document to disk, creating parent directories as needed.
pub fn persist(document: &KubeConfigDocument, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            warn!(path = %parent.display(), "Creating missing kubeconfig directory");
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    std::fs::write(path, document)
        .with_context(|| format!("Failed to write kubeconfig to {}", path.display()))?;
    info!(path = %path.display(), "Kubeconfig written");
    Ok(())
}
