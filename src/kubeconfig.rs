//! Kubeconfig synthesis for EKS clusters.
//!
//! Renders a client configuration with a single cluster, context and user.
//! The user authenticates through the `aws eks get-token` exec plugin, so the
//! document never embeds a credential.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EkcfgError;

/// Region used when the cluster ARN is missing or malformed.
pub const DEFAULT_REGION: &str = "us-east-1";

/// API version of the exec credential plugin.
pub const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1alpha1";

/// Name of the kubeconfig user entry.
pub const USER_NAME: &str = "aws";

/// Identity and connection attributes of an EKS cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescriptor {
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub certificate_authority_data: Option<String>,
    pub arn: Option<String>,
}

impl ClusterDescriptor {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        certificate_authority_data: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            endpoint: Some(endpoint.into()),
            certificate_authority_data: Some(certificate_authority_data.into()),
            arn: None,
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    /// Names of required fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("endpoint", &self.endpoint),
            ("certificate-authority-data", &self.certificate_authority_data),
        ]
        .into_iter()
        .filter(|(_, value)| non_empty(value.as_deref()).is_none())
        .map(|(field, _)| field)
        .collect()
    }
}

/// Rendered kubeconfig text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfigDocument(String);

impl KubeConfigDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for KubeConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<[u8]> for KubeConfigDocument {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Extract the region (4th colon-delimited field) from an ARN.
///
/// Falls back to [`DEFAULT_REGION`] when the ARN is absent, has fewer than
/// four fields, or carries an empty region.
pub fn region_from_arn(arn: Option<&str>) -> &str {
    arn.and_then(|arn| arn.split(':').nth(3))
        .filter(|region| !region.is_empty())
        .unwrap_or(DEFAULT_REGION)
}

/// Render a kubeconfig for the given cluster.
///
/// Fails with [`EkcfgError::IncompleteClusterInfo`] naming every missing
/// required field; nothing is rendered in that case.
pub fn synthesize(descriptor: &ClusterDescriptor) -> Result<KubeConfigDocument, EkcfgError> {
    let (Some(name), Some(endpoint), Some(ca_data)) = (
        non_empty(descriptor.name.as_deref()),
        non_empty(descriptor.endpoint.as_deref()),
        non_empty(descriptor.certificate_authority_data.as_deref()),
    ) else {
        return Err(EkcfgError::IncompleteClusterInfo {
            missing: descriptor.missing_fields(),
        });
    };

    let region = region_from_arn(descriptor.arn.as_deref());

    Ok(KubeConfigDocument(format!(
        "apiVersion: v1
kind: Config
clusters:
- cluster:
    server: {endpoint}
    certificate-authority-data: {ca_data}
  name: {name}
contexts:
- context:
    cluster: {name}
    user: {USER_NAME}
  name: {name}
current-context: {name}
preferences: {{}}
users:
- name: {USER_NAME}
  user:
    exec:
      apiVersion: {EXEC_API_VERSION}
      command: aws
      args:
        - --region
        - {region}
        - eks
        - get-token
        - --cluster-name
        - {name}
"
    )))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> ClusterDescriptor {
        ClusterDescriptor::new("demo", "https://demo.eks.amazonaws.com", "BASE64DATA")
            .with_arn("arn:aws:eks:eu-west-1:123456789012:cluster/demo")
    }

    #[test]
    fn test_region_from_well_formed_arn() {
        assert_eq!(
            region_from_arn(Some("arn:aws:eks:ap-northeast-2:123456789012:cluster/x")),
            "ap-northeast-2"
        );
    }

    #[test]
    fn test_region_fallback() {
        assert_eq!(region_from_arn(None), DEFAULT_REGION);
        assert_eq!(region_from_arn(Some("not-an-arn")), DEFAULT_REGION);
        assert_eq!(region_from_arn(Some("arn:aws:eks")), DEFAULT_REGION);
        assert_eq!(region_from_arn(Some("arn:aws:eks::123:cluster/x")), DEFAULT_REGION);
        assert_eq!(region_from_arn(Some("")), DEFAULT_REGION);
    }

    #[test]
    fn test_region_with_exactly_four_fields() {
        assert_eq!(region_from_arn(Some("arn:aws:eks:us-west-2")), "us-west-2");
    }

    #[test]
    fn test_synthesize_demo_cluster() {
        let doc = synthesize(&demo()).unwrap();
        let text = doc.as_str();

        assert!(text.contains("    server: https://demo.eks.amazonaws.com\n"));
        assert!(text.contains("    certificate-authority-data: BASE64DATA\n"));
        assert!(text.contains("  name: demo\ncontexts:"));
        assert!(text.contains("    user: aws\n  name: demo\n"));
        assert!(text.contains("current-context: demo\n"));
        assert!(text.ends_with(
            "        - --region\n        - eu-west-1\n        - eks\n        - get-token\n        - --cluster-name\n        - demo\n"
        ));
    }

    #[test]
    fn test_synthesize_exact_layout() {
        let doc = synthesize(&demo()).unwrap();
        let expected = "\
apiVersion: v1
kind: Config
clusters:
- cluster:
    server: https://demo.eks.amazonaws.com
    certificate-authority-data: BASE64DATA
  name: demo
contexts:
- context:
    cluster: demo
    user: aws
  name: demo
current-context: demo
preferences: {}
users:
- name: aws
  user:
    exec:
      apiVersion: client.authentication.k8s.io/v1alpha1
      command: aws
      args:
        - --region
        - eu-west-1
        - eks
        - get-token
        - --cluster-name
        - demo
";
        assert_eq!(doc.as_str(), expected);
    }

    #[test]
    fn test_synthesize_without_arn_uses_fallback_region() {
        let mut descriptor = demo();
        descriptor.arn = None;
        let doc = synthesize(&descriptor).unwrap();
        assert!(doc.as_str().contains("        - us-east-1\n"));
        assert!(!doc.as_str().contains("eu-west-1"));
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let first = synthesize(&demo()).unwrap();
        let second = synthesize(&demo()).unwrap();
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_synthesize_empty_endpoint_fails() {
        let mut descriptor = demo();
        descriptor.endpoint = Some(String::new());
        let err = synthesize(&descriptor).unwrap_err();
        assert!(matches!(
            err,
            EkcfgError::IncompleteClusterInfo { ref missing } if missing == &vec!["endpoint"]
        ));
    }

    #[test]
    fn test_synthesize_reports_every_missing_field() {
        let descriptor = ClusterDescriptor {
            arn: Some("arn:aws:eks:eu-west-1:123456789012:cluster/demo".to_string()),
            ..Default::default()
        };
        match synthesize(&descriptor) {
            Err(EkcfgError::IncompleteClusterInfo { missing }) => {
                assert_eq!(missing, vec!["name", "endpoint", "certificate-authority-data"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_whitespace_values_render_verbatim() {
        let descriptor = ClusterDescriptor::new("demo", "https://demo.eks.amazonaws.com", " ")
            .with_arn("arn:aws:eks:eu-west-1:123456789012:cluster/demo");
        let doc = synthesize(&descriptor).unwrap();
        assert!(doc.as_str().contains("    certificate-authority-data:  \n"));

        let mut descriptor = demo();
        descriptor.name = Some(" ".to_string());
        let doc = synthesize(&descriptor).unwrap();
        assert!(doc.as_str().contains("current-context:  \n"));
        assert!(descriptor.missing_fields().is_empty());
    }

    #[test]
    fn test_each_required_field_is_enforced() {
        for field in ["name", "endpoint", "certificate-authority-data"] {
            let mut descriptor = demo();
            match field {
                "name" => descriptor.name = None,
                "endpoint" => descriptor.endpoint = None,
                _ => descriptor.certificate_authority_data = None,
            }
            match synthesize(&descriptor) {
                Err(EkcfgError::IncompleteClusterInfo { missing }) => {
                    assert_eq!(missing, vec![field]);
                }
                other => panic!("{field}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_document_parses_as_yaml() {
        let doc = synthesize(&demo()).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(doc.as_str()).unwrap();

        assert_eq!(value["kind"].as_str(), Some("Config"));
        assert_eq!(value["current-context"].as_str(), Some("demo"));
        assert_eq!(
            value["clusters"][0]["cluster"]["server"].as_str(),
            Some("https://demo.eks.amazonaws.com")
        );
        assert_eq!(value["contexts"][0]["context"]["user"].as_str(), Some("aws"));

        let args: Vec<&str> = value["users"][0]["user"]["exec"]["args"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(
            args,
            vec!["--region", "eu-west-1", "eks", "get-token", "--cluster-name", "demo"]
        );
    }

    #[test]
    fn test_descriptor_deserializes_camel_case() {
        let descriptor: ClusterDescriptor = serde_json::from_str(
            r#"{"name":"demo","endpoint":"https://e","certificateAuthorityData":"CA"}"#,
        )
        .unwrap();
        assert_eq!(descriptor, ClusterDescriptor::new("demo", "https://e", "CA"));
    }
}
