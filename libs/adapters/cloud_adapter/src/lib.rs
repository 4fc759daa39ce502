//! Abstraction over the IaaS provider (§2's Cloud Adapter).

pub mod adapter;
pub mod aws;
pub mod error;
pub mod models;

pub use adapter::CloudAdapter;
pub use aws::AwsCloudAdapter;
pub use error::{CloudAdapterError, CloudAdapterResult};
pub use models::{AutoScalingGroupCount, CloudSnapshot, CloudVolume, SnapshotState};
