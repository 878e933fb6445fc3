//! EKS API access.

pub mod client;

pub use client::{ClusterDescriber, EksClient};
