//! AWS-backed `CloudAdapter`, using EC2 for volumes/snapshots and
//! Auto Scaling for node-group instance counts.

use async_trait::async_trait;
use aws_sdk_autoscaling::Client as AsgClient;
use aws_sdk_ec2::Client as Ec2Client;

use crate::adapter::CloudAdapter;
use crate::error::{CloudAdapterError, CloudAdapterResult};
use crate::models::{AutoScalingGroupCount, CloudSnapshot, CloudVolume, SnapshotState};

pub struct AwsCloudAdapter {
    ec2: Ec2Client,
    autoscaling: AsgClient,
}

impl AwsCloudAdapter {
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            ec2: Ec2Client::new(&config),
            autoscaling: AsgClient::new(&config),
        }
    }

    pub fn new(ec2: Ec2Client, autoscaling: AsgClient) -> Self {
        Self { ec2, autoscaling }
    }
}

#[async_trait]
impl CloudAdapter for AwsCloudAdapter {
    async fn list_tagged_volumes(&self, tag_key: &str, tag_value: &str) -> CloudAdapterResult<Vec<CloudVolume>> {
        let resp = self
            .ec2
            .describe_volumes()
            .filters(
                aws_sdk_ec2::types::Filter::builder()
                    .name(format!("tag:{tag_key}"))
                    .values(tag_value)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| CloudAdapterError::Ec2(e.to_string()))?;

        Ok(resp
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| {
                let tags = v
                    .tags
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|t| Some((t.key?, t.value?)))
                    .collect();
                let attached = v
                    .attachments
                    .as_ref()
                    .map(|a| !a.is_empty())
                    .unwrap_or(false);
                CloudVolume {
                    cloud_volume_id: v.volume_id.unwrap_or_default(),
                    size_gib: v.size.unwrap_or(0),
                    attached,
                    snapshot_count: 0,
                    pending_snapshot_count: 0,
                    last_snapshot_at: None,
                    tags,
                }
            })
            .collect())
    }

    async fn describe_snapshots(&self, volume_id: &str) -> CloudAdapterResult<Vec<CloudSnapshot>> {
        let resp = self
            .ec2
            .describe_snapshots()
            .filters(
                aws_sdk_ec2::types::Filter::builder()
                    .name("volume-id")
                    .values(volume_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| CloudAdapterError::Ec2(e.to_string()))?;

        Ok(resp
            .snapshots
            .unwrap_or_default()
            .into_iter()
            .map(|s| CloudSnapshot {
                snapshot_id: s.snapshot_id.unwrap_or_default(),
                volume_id: volume_id.to_string(),
                state: match s.state {
                    Some(aws_sdk_ec2::types::SnapshotState::Pending) => SnapshotState::Pending,
                    Some(aws_sdk_ec2::types::SnapshotState::Completed) => SnapshotState::Completed,
                    Some(aws_sdk_ec2::types::SnapshotState::Error) => SnapshotState::Error,
                    _ => SnapshotState::Pending,
                },
                started_at: s
                    .start_time
                    .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0))
                    .unwrap_or_else(chrono::Utc::now),
            })
            .collect())
    }

    async fn create_snapshot(&self, volume_id: &str) -> CloudAdapterResult<CloudSnapshot> {
        let resp = self
            .ec2
            .create_snapshot()
            .volume_id(volume_id)
            .send()
            .await
            .map_err(|e| CloudAdapterError::Ec2(e.to_string()))?;

        Ok(CloudSnapshot {
            snapshot_id: resp.snapshot_id.unwrap_or_default(),
            volume_id: volume_id.to_string(),
            state: SnapshotState::Pending,
            started_at: chrono::Utc::now(),
        })
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> CloudAdapterResult<()> {
        self.ec2
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(|e| CloudAdapterError::Ec2(e.to_string()))?;
        Ok(())
    }

    async fn delete_volume(&self, volume_id: &str) -> CloudAdapterResult<()> {
        self.ec2
            .delete_volume()
            .volume_id(volume_id)
            .send()
            .await
            .map_err(|e| CloudAdapterError::Ec2(e.to_string()))?;
        Ok(())
    }

    async fn describe_asg_instance_counts(&self, name_pattern: &str) -> CloudAdapterResult<Vec<AutoScalingGroupCount>> {
        let resp = self
            .autoscaling
            .describe_auto_scaling_groups()
            .send()
            .await
            .map_err(|e| CloudAdapterError::AutoScaling(e.to_string()))?;

        let prefix = asg_name_prefix(name_pattern);
        Ok(resp
            .auto_scaling_groups
            .into_iter()
            .filter(|g| matches_asg_name(&g.auto_scaling_group_name, prefix))
            .map(|g| {
                let in_service = g
                    .instances
                    .iter()
                    .filter(|i| matches!(i.lifecycle_state, aws_sdk_autoscaling::types::LifecycleState::InService))
                    .count() as i32;
                AutoScalingGroupCount {
                    name: g.auto_scaling_group_name,
                    in_service_instances: in_service,
                }
            })
            .collect())
    }
}

/// Strips a trailing glob `*`, the only wildcard node-group name patterns use.
fn asg_name_prefix(name_pattern: &str) -> &str {
    name_pattern.trim_end_matches('*')
}

fn matches_asg_name(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_glob_star() {
        assert_eq!(asg_name_prefix("prod-gpu-nodes-a100*"), "prod-gpu-nodes-a100");
        assert_eq!(asg_name_prefix("prod-gpu-nodes-a100"), "prod-gpu-nodes-a100");
    }

    #[test]
    fn matches_names_sharing_the_prefix() {
        let prefix = asg_name_prefix("prod-gpu-nodes-a100*");
        assert!(matches_asg_name("prod-gpu-nodes-a100-us-east-1a", prefix));
        assert!(!matches_asg_name("prod-gpu-nodes-h100-us-east-1a", prefix));
        assert!(!matches_asg_name("staging-gpu-nodes-a100", prefix));
    }
}
