//! EKS cluster blueprint.
//!
//! Resolves a short YAML declaration of an EKS deployment into the complete set
//! of values that get declared: IAM roles, cluster security group, control
//! plane, managed node group, kubeconfig custom resource and stack outputs.
//! Nothing here talks to AWS.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EkcfgError;

pub const DEFAULT_NODE_DISK_SIZE: u32 = 20;
pub const DEFAULT_NODE_DESIRED_SIZE: u32 = 2;
pub const DEFAULT_NODE_MIN_SIZE: u32 = 1;
pub const DEFAULT_NODE_MAX_SIZE: u32 = 3;
pub const DEFAULT_NODE_INSTANCE_TYPE: &str = "t3.medium";
pub const DEFAULT_KUBERNETES_VERSION: &str = "1.21";
pub const DEFAULT_AMI_TYPE: &str = "AL2_x86_64";
pub const MANAGED_BY: &str = "ekcfg";

/// Oldest Kubernetes minor version with a published kubectl layer.
const MIN_KUBECTL_LAYER_MINOR: u32 = 20;

/// AWS managed policy ARNs attached to the EKS roles.
pub mod policy {
    pub const CLUSTER_POLICY: &str = "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy";
    pub const WORKER_NODE_POLICY: &str = "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy";
    pub const CNI_POLICY: &str = "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy";
    pub const ECR_READ_ONLY: &str = "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointAccess {
    Public,
    Private,
    #[default]
    PublicAndPrivate,
}

/// User-supplied blueprint declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlueprintSpec {
    pub cluster_name: String,
    pub env_name: String,
    pub vpc_id: String,
    pub cluster_subnet_ids: Vec<String>,
    pub nodegroup_subnet_ids: Vec<String>,
    #[serde(default)]
    pub nodegroup_desired_size: Option<u32>,
    #[serde(default)]
    pub nodegroup_min_size: Option<u32>,
    #[serde(default)]
    pub nodegroup_max_size: Option<u32>,
    #[serde(default)]
    pub nodegroup_disk_size: Option<u32>,
    #[serde(default)]
    pub nodegroup_instance_types: Option<Vec<String>>,
    #[serde(default)]
    pub kubernetes_version: Option<String>,
    #[serde(default)]
    pub endpoint_access: EndpointAccess,
    #[serde(default)]
    pub kubectl_layer: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl BlueprintSpec {
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input)
            .map_err(|e| EkcfgError::InvalidBlueprint(e.to_string()).into())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blueprint {}", path.display()))?;
        Self::from_yaml(&content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSpec {
    pub assumed_by: String,
    pub managed_policy_arns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroupSpec {
    pub vpc_id: String,
    pub description: String,
    pub allow_all_outbound: bool,
    pub egress_rules: Vec<EgressRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EgressRule {
    pub peer: String,
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlPlaneSpec {
    pub name: String,
    pub version: String,
    pub endpoint_access: EndpointAccess,
    pub subnet_ids: Vec<String>,
    pub default_capacity: u32,
    pub kubectl_layer: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScalingConfig {
    pub desired_size: u32,
    pub min_size: u32,
    pub max_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeGroupSpec {
    pub name: String,
    pub subnet_ids: Vec<String>,
    pub scaling: ScalingConfig,
    pub disk_size: u32,
    pub instance_types: Vec<String>,
    pub ami_type: String,
    pub max_unavailable: u32,
    pub labels: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KubeConfigResourceSpec {
    pub properties: BTreeMap<String, String>,
    pub allowed_actions: Vec<String>,
    /// Resources the handler may describe; scoped to the one cluster.
    pub allowed_resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackOutput {
    pub key: String,
    pub description: String,
    pub export_name: String,
}

/// Fully resolved deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterBlueprint {
    pub env_name: String,
    pub cluster_role: RoleSpec,
    pub node_role: RoleSpec,
    pub security_group: SecurityGroupSpec,
    pub cluster: ControlPlaneSpec,
    pub node_group: NodeGroupSpec,
    pub kubeconfig: KubeConfigResourceSpec,
    pub outputs: Vec<StackOutput>,
}

impl ClusterBlueprint {
    /// Apply defaults and validate a declaration.
    pub fn resolve(spec: &BlueprintSpec) -> Result<Self> {
        let cluster_name = require("cluster_name", &spec.cluster_name)?;
        let env_name = require("env_name", &spec.env_name)?;
        let vpc_id = require("vpc_id", &spec.vpc_id)?;
        require_list("cluster_subnet_ids", &spec.cluster_subnet_ids)?;
        require_list("nodegroup_subnet_ids", &spec.nodegroup_subnet_ids)?;

        let scaling = ScalingConfig {
            desired_size: spec.nodegroup_desired_size.unwrap_or(DEFAULT_NODE_DESIRED_SIZE),
            min_size: spec.nodegroup_min_size.unwrap_or(DEFAULT_NODE_MIN_SIZE),
            max_size: spec.nodegroup_max_size.unwrap_or(DEFAULT_NODE_MAX_SIZE),
        };
        validate_scaling(&scaling)?;

        let disk_size = spec.nodegroup_disk_size.unwrap_or(DEFAULT_NODE_DISK_SIZE);
        if disk_size == 0 {
            return Err(invalid("nodegroup_disk_size must be at least 1 GiB"));
        }

        let instance_types = spec
            .nodegroup_instance_types
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_NODE_INSTANCE_TYPE.to_string()]);
        require_list("nodegroup_instance_types", &instance_types)?;

        let version = spec
            .kubernetes_version
            .clone()
            .unwrap_or_else(|| DEFAULT_KUBERNETES_VERSION.to_string());
        let kubectl_layer = resolve_kubectl_layer(&version, spec.kubectl_layer.as_deref())?;
        debug!(cluster = %cluster_name, %version, %kubectl_layer, "Resolved kubectl layer");

        let mut cluster_tags = BTreeMap::from([
            ("Environment".to_string(), env_name.to_string()),
            ("Name".to_string(), cluster_name.to_string()),
            ("ManagedBy".to_string(), MANAGED_BY.to_string()),
        ]);
        cluster_tags.extend(spec.tags.clone());

        let nodegroup_name = format!("{cluster_name}-nodegroup");
        let cluster_arn =
            format!("arn:aws:eks:${{AWS::Region}}:${{AWS::AccountId}}:cluster/{cluster_name}");

        Ok(Self {
            env_name: env_name.to_string(),
            cluster_role: RoleSpec {
                assumed_by: "eks.amazonaws.com".to_string(),
                managed_policy_arns: vec![policy::CLUSTER_POLICY.to_string()],
            },
            node_role: RoleSpec {
                assumed_by: "ec2.amazonaws.com".to_string(),
                managed_policy_arns: vec![
                    policy::WORKER_NODE_POLICY.to_string(),
                    policy::CNI_POLICY.to_string(),
                    policy::ECR_READ_ONLY.to_string(),
                ],
            },
            security_group: SecurityGroupSpec {
                vpc_id: vpc_id.to_string(),
                description: format!(
                    "EKS cluster communication with worker nodes for {cluster_name}"
                ),
                allow_all_outbound: true,
                egress_rules: vec![EgressRule {
                    peer: "0.0.0.0/0".to_string(),
                    protocol: "tcp".to_string(),
                    from_port: 0,
                    to_port: 65535,
                    description: "Allow all outbound traffic".to_string(),
                }],
            },
            cluster: ControlPlaneSpec {
                name: cluster_name.to_string(),
                version,
                endpoint_access: spec.endpoint_access,
                subnet_ids: spec.cluster_subnet_ids.clone(),
                default_capacity: 0,
                kubectl_layer,
                tags: cluster_tags,
            },
            node_group: NodeGroupSpec {
                name: nodegroup_name.clone(),
                subnet_ids: spec.nodegroup_subnet_ids.clone(),
                scaling,
                disk_size,
                instance_types,
                ami_type: DEFAULT_AMI_TYPE.to_string(),
                max_unavailable: 1,
                labels: BTreeMap::from([
                    ("nodegroup-type".to_string(), "managed".to_string()),
                    ("environment".to_string(), env_name.to_string()),
                ]),
                tags: BTreeMap::from([
                    ("Environment".to_string(), env_name.to_string()),
                    ("Name".to_string(), nodegroup_name),
                    (format!("kubernetes.io/cluster/{cluster_name}"), "owned".to_string()),
                ]),
            },
            kubeconfig: KubeConfigResourceSpec {
                properties: BTreeMap::from([
                    ("ClusterName".to_string(), cluster_name.to_string()),
                    ("ClusterArn".to_string(), cluster_arn.clone()),
                ]),
                allowed_actions: vec!["eks:DescribeCluster".to_string()],
                allowed_resources: vec![cluster_arn],
            },
            outputs: stack_outputs(cluster_name),
        })
    }
}

fn stack_outputs(cluster_name: &str) -> Vec<StackOutput> {
    [
        ("ClusterName", "The name of the EKS cluster", "name"),
        ("ClusterEndpoint", "The endpoint for the EKS cluster API server", "endpoint"),
        (
            "ClusterSecurityGroupId",
            "The security group ID attached to the EKS cluster",
            "security-group",
        ),
        ("NodeGroupName", "The name of the EKS node group", "nodegroup-name"),
    ]
    .into_iter()
    .map(|(key, description, suffix)| StackOutput {
        key: key.to_string(),
        description: description.to_string(),
        export_name: format!("{cluster_name}-{suffix}"),
    })
    .collect()
}

/// Parse a Kubernetes version string into major and minor components.
pub fn parse_k8s_version(version: &str) -> Result<(u32, u32)> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 2 {
        return Err(EkcfgError::InvalidVersion(version.to_string()).into());
    }

    let major: u32 = parts[0]
        .parse()
        .map_err(|_| EkcfgError::InvalidVersion(version.to_string()))?;
    let minor: u32 = parts[1]
        .parse()
        .map_err(|_| EkcfgError::InvalidVersion(version.to_string()))?;

    Ok((major, minor))
}

/// Pick the kubectl layer: explicit value, else derived from the minor version.
fn resolve_kubectl_layer(version: &str, explicit: Option<&str>) -> Result<String> {
    let (major, minor) = parse_k8s_version(version)?;

    if let Some(layer) = explicit {
        let layer = layer.trim();
        if layer.is_empty() {
            return Err(invalid("kubectl_layer must not be empty when set"));
        }
        return Ok(layer.to_string());
    }

    if major != 1 || minor < MIN_KUBECTL_LAYER_MINOR {
        return Err(EkcfgError::UnsupportedKubectlLayer(version.to_string()).into());
    }

    Ok(format!("kubectl-v{minor}"))
}

fn validate_scaling(scaling: &ScalingConfig) -> Result<()> {
    if scaling.max_size == 0 {
        return Err(invalid("nodegroup_max_size must be at least 1"));
    }
    if scaling.min_size > scaling.desired_size {
        return Err(invalid(format!(
            "nodegroup_min_size ({}) exceeds nodegroup_desired_size ({})",
            scaling.min_size, scaling.desired_size
        )));
    }
    if scaling.desired_size > scaling.max_size {
        return Err(invalid(format!(
            "nodegroup_desired_size ({}) exceeds nodegroup_max_size ({})",
            scaling.desired_size, scaling.max_size
        )));
    }
    Ok(())
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    Ok(value)
}

fn require_list(field: &str, values: &[String]) -> Result<()> {
    if values.is_empty() || values.iter().any(|v| v.trim().is_empty()) {
        return Err(invalid(format!("{field} must contain at least one non-empty entry")));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    EkcfgError::InvalidBlueprint(message.into()).into()
}
