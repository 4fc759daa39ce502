use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
#[sea_orm(table_name = "gpu_types")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tag: String,
    pub instance_family: String,
    pub max_gpus_per_node: i32,
    pub cpu_per_instance: i32,
    pub memory_mb_per_instance: i32,
    pub max_multinode_nodes: i32,
    pub total_cluster_gpus: i32,
    pub available_gpus: i32,
    pub max_reservable: i32,
    pub full_nodes_available: i32,
    pub running_instances: i32,
    pub last_availability_update: Option<DateTimeWithTimeZone>,
    pub last_availability_updated_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::GpuType {
    fn from(m: Model) -> Self {
        Self {
            tag: m.tag,
            instance_family: m.instance_family,
            max_gpus_per_node: m.max_gpus_per_node,
            cpu_per_instance: m.cpu_per_instance,
            memory_mb_per_instance: m.memory_mb_per_instance,
            max_multinode_nodes: m.max_multinode_nodes,
            total_cluster_gpus: m.total_cluster_gpus,
            available_gpus: m.available_gpus,
            max_reservable: m.max_reservable,
            full_nodes_available: m.full_nodes_available,
            running_instances: m.running_instances,
            last_availability_update: m.last_availability_update.map(Into::into),
            last_availability_updated_by: m.last_availability_updated_by,
        }
    }
}
