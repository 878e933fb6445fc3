//! Custom error types for ekcfg.

use thiserror::Error;

/// Errors that can occur while generating a kubeconfig or resolving a blueprint.
#[derive(Error, Debug)]
pub enum EkcfgError {
    #[error("Incomplete cluster information: missing {}", .missing.join(", "))]
    IncompleteClusterInfo { missing: Vec<&'static str> },

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("{0} property is required")]
    MissingProperty(String),

    #[error("Invalid custom resource event: {0}")]
    InvalidEvent(String),

    #[error("[{0}] {1}")]
    AwsSdk(String, String),

    #[error("[{0}] AWS credentials error: {1}")]
    AwsCredentials(String, String),

    #[error("[{0}] AWS region not configured: {1}")]
    AwsRegion(String, String),

    #[error("Invalid blueprint: {0}")]
    InvalidBlueprint(String),

    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    #[error("No kubectl layer available for Kubernetes {0}")]
    UnsupportedKubectlLayer(String),
}

impl EkcfgError {
    /// Classify an AWS SDK error from the `DescribeCluster` call.
    pub fn aws<E: std::fmt::Debug + std::fmt::Display>(component: &str, err: E) -> Self {
        let err_debug = format!("{err:?}");
        let details = Self::extract_error_details(&err_debug, &err.to_string());
        let haystack = format!("{err} {err_debug}").to_lowercase();
        let component = component.to_string();

        match AwsErrorKind::detect(&haystack) {
            AwsErrorKind::Credentials => Self::AwsCredentials(component, details),
            AwsErrorKind::Region => Self::AwsRegion(component, details),
            AwsErrorKind::Other => Self::AwsSdk(component, details),
        }
    }

    /// Pull the service message out of the SDK's debug or display output.
    fn extract_error_details(debug_str: &str, display_str: &str) -> String {
        const MARKER: &str = "message: Some(\"";

        let message = debug_str
            .split_once(MARKER)
            .or_else(|| display_str.split_once(MARKER))
            .and_then(|(_, rest)| rest.split_once('"'))
            .map(|(message, _)| message.to_string());

        match message {
            Some(message) => message,
            None if !display_str.to_lowercase().contains("service error") => {
                display_str.to_string()
            }
            None => "AWS API request failed".to_string(),
        }
    }
}

enum AwsErrorKind {
    Credentials,
    Region,
    Other,
}

impl AwsErrorKind {
    // Error codes eks:DescribeCluster surfaces for identity and signing failures.
    const CREDENTIAL_HINTS: &'static [&'static str] = &[
        "no credentials",
        "expiredtoken",
        "unrecognizedclient",
        "invalidclienttokenid",
        "signaturedoesnotmatch",
        "accessdenied",
    ];

    const REGION_HINTS: &'static [&'static str] = &["no region", "missing region"];

    fn detect(haystack: &str) -> Self {
        let hit = |hints: &[&str]| hints.iter().any(|h| haystack.contains(h));
        if hit(Self::CREDENTIAL_HINTS) {
            Self::Credentials
        } else if hit(Self::REGION_HINTS) {
            Self::Region
        } else {
            Self::Other
        }
    }
}
