//! Demo topology
//!
//! Builds an account, a capacity pool, an NFSv3 and an NFSv4.1 volume, takes a
//! snapshot of the NFSv3 volume, restores it into a new volume and resizes the
//! NFSv4.1 volume. With cleanup enabled everything is deleted again in reverse
//! dependency order, waiting for each deletion to be visible before the next.

use crate::error::Result;
use crate::netapp::gateway::{NetAppGateway, VolumeRequest};
use crate::netapp::models::{
    bytes_to_tib, gib_to_bytes, tib_to_bytes, ProtocolType, Tags, VolumePatchProperties,
};
use std::time::Duration;

/// Names and sizes of the demo resources
#[derive(Debug, Clone)]
pub struct DemoSettings {
    pub location: String,
    pub resource_group: String,
    pub subnet_id: String,
    pub account: String,
    pub pool: String,
    pub pool_size_tib: u32,
    pub service_level: String,
    pub nfsv3_volume: String,
    pub nfsv41_volume: String,
    pub volume_size_gib: u32,
    /// New quota of the NFSv4.1 volume
    pub resized_volume_size_gib: u32,
    pub snapshot: String,
    pub restored_volume: String,
    pub poll_interval: Duration,
    pub poll_retries: u32,
    pub cleanup: bool,
}

pub fn format_header(header: &str) -> String {
    format!("{}\n{}", header, "-".repeat(header.chars().count()))
}

/// Print a step title underlined with dashes
pub fn print_header(header: &str) {
    println!("{}", format_header(header));
}

fn demo_tags() -> Tags {
    Tags::from([
        ("Owner".to_string(), "anf-provision".to_string()),
        ("CreatedOn".to_string(), chrono::Utc::now().to_rfc3339()),
    ])
}

/// Runs the whole demo sequence, stopping at the first failure
pub async fn run(gateway: &NetAppGateway, settings: &DemoSettings) -> Result<()> {
    let s = settings;
    let interval = s.poll_interval;
    let retries = s.poll_retries;

    print_header(&format!("Creating Azure NetApp Files account {}", s.account));
    let account = gateway
        .create_account(&s.location, &s.resource_group, &s.account, None, Some(demo_tags()))
        .await?;
    gateway.wait_for_resource(account.id(), interval, retries, false).await?;
    tracing::info!("Account created: {}", account.id());

    print_header(&format!(
        "Creating {} TiB {} capacity pool {}",
        s.pool_size_tib, s.service_level, s.pool
    ));
    let pool = gateway
        .create_capacity_pool(
            &s.location,
            &s.resource_group,
            &s.account,
            &s.pool,
            &s.service_level,
            tib_to_bytes(s.pool_size_tib),
            Some(demo_tags()),
        )
        .await?;
    gateway.wait_for_resource(pool.id(), interval, retries, false).await?;
    tracing::info!(
        "Capacity pool created: {} ({} TiB)",
        pool.id(),
        bytes_to_tib(pool.properties.size.unwrap_or_default())
    );

    let volume_request = |name: &str, protocol: ProtocolType| VolumeRequest {
        location: s.location.clone(),
        resource_group: s.resource_group.clone(),
        account: s.account.clone(),
        pool: s.pool.clone(),
        name: name.to_string(),
        service_level: s.service_level.clone(),
        subnet_id: s.subnet_id.clone(),
        protocol_types: vec![protocol.as_str().to_string()],
        usage_threshold: gib_to_bytes(s.volume_size_gib),
        unix_read_only: false,
        unix_read_write: true,
        tags: Some(demo_tags()),
        ..Default::default()
    };

    let mut volume_ids = Vec::new();
    for (name, protocol) in [
        (&s.nfsv3_volume, ProtocolType::Nfsv3),
        (&s.nfsv41_volume, ProtocolType::Nfsv41),
    ] {
        print_header(&format!("Creating {} volume {}", protocol, name));
        let volume = gateway.create_volume(&volume_request(name, protocol)).await?;
        gateway.wait_for_resource(volume.id(), interval, retries, false).await?;
        tracing::info!("Volume created: {}", volume.id());
        volume_ids.push(volume.id().to_string());
    }

    print_header(&format!("Creating snapshot {} of volume {}", s.snapshot, s.nfsv3_volume));
    let snapshot = gateway
        .create_snapshot(
            &s.location,
            &s.resource_group,
            &s.account,
            &s.pool,
            &s.nfsv3_volume,
            &s.snapshot,
            Some(demo_tags()),
        )
        .await?;
    gateway.wait_for_resource(snapshot.id(), interval, retries, false).await?;
    tracing::info!("Snapshot created: {}", snapshot.id());

    print_header(&format!(
        "Creating volume {} from snapshot {}",
        s.restored_volume, s.snapshot
    ));
    let restore = VolumeRequest {
        snapshot_id: snapshot
            .properties
            .snapshot_id
            .clone()
            .or_else(|| snapshot.id.clone()),
        ..volume_request(&s.restored_volume, ProtocolType::Nfsv3)
    };
    let restored = gateway.create_volume(&restore).await?;
    gateway.wait_for_resource(restored.id(), interval, retries, false).await?;
    tracing::info!("Volume restored from snapshot: {}", restored.id());

    print_header(&format!(
        "Resizing volume {} to {} GiB",
        s.nfsv41_volume, s.resized_volume_size_gib
    ));
    let resized = gateway
        .update_volume(
            &s.location,
            &s.resource_group,
            &s.account,
            &s.pool,
            &s.nfsv41_volume,
            VolumePatchProperties {
                usage_threshold: Some(gib_to_bytes(s.resized_volume_size_gib)),
                ..Default::default()
            },
            None,
        )
        .await?;
    tracing::info!(
        "Volume {} quota is now {} bytes",
        resized.id(),
        resized.properties.usage_threshold
    );

    if !s.cleanup {
        println!("Cleanup skipped, resources were left in place");
        return Ok(());
    }

    print_header("Cleaning up");

    gateway
        .delete_volume(&s.resource_group, &s.account, &s.pool, &s.restored_volume)
        .await?;
    gateway.wait_for_no_resource(restored.id(), interval, retries, false).await?;
    tracing::info!("Volume deleted: {}", restored.id());

    gateway
        .delete_snapshot(&s.resource_group, &s.account, &s.pool, &s.nfsv3_volume, &s.snapshot)
        .await?;
    gateway.wait_for_no_resource(snapshot.id(), interval, retries, false).await?;
    tracing::info!("Snapshot deleted: {}", snapshot.id());

    for (name, id) in [&s.nfsv3_volume, &s.nfsv41_volume].into_iter().zip(&volume_ids) {
        gateway
            .delete_volume(&s.resource_group, &s.account, &s.pool, name)
            .await?;
        gateway.wait_for_no_resource(id, interval, retries, false).await?;
        tracing::info!("Volume deleted: {}", id);
    }

    gateway
        .delete_capacity_pool(&s.resource_group, &s.account, &s.pool)
        .await?;
    gateway.wait_for_no_resource(pool.id(), interval, retries, false).await?;
    tracing::info!("Capacity pool deleted: {}", pool.id());

    gateway.delete_account(&s.resource_group, &s.account).await?;
    gateway.wait_for_no_resource(account.id(), interval, retries, false).await?;
    tracing::info!("Account deleted: {}", account.id());

    Ok(())
}
