use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r#"
            INSERT INTO gpu_types (tag, instance_family, max_gpus_per_node, cpu_per_instance, memory_mb_per_instance, max_multinode_nodes)
            VALUES
                ('h100', 'p5', 8, 96, 1152000, 4),
                ('a100', 'p4d', 8, 96, 1152000, 4),
                ('t4', 'g4dn', 1, 4, 16000, 1),
                ('cpu-x86', 'm5', 0, 8, 32000, 1),
                ('cpu-arm', 'm7g', 0, 8, 32000, 1)
            ON CONFLICT (tag) DO NOTHING
            "#,
        )
        .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DELETE FROM gpu_types WHERE tag IN ('h100','a100','t4','cpu-x86','cpu-arm')",
        )
        .await?;
        Ok(())
    }
}
