//! ekcfg - EKS kubeconfig generator.
//!
//! - Kubeconfig synthesis from cluster descriptors
//! - CloudFormation custom resource handling
//! - EKS cluster blueprint resolution

pub mod blueprint;
pub mod config;
pub mod eks;
pub mod error;
pub mod handler;
pub mod kubeconfig;
pub mod logging;

pub use error::EkcfgError;
pub use kubeconfig::{ClusterDescriptor, KubeConfigDocument, synthesize};
