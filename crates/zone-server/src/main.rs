use clap::Parser;
use glam::Vec3;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use zone_core::{CreatureData, EntityId, Rect};
use zone_persist::{
    BuildingRow, FixtureBackend, LookupTable, ObjectRow, PersistHandle, QueryBackend, RegionRow,
    RegionTable,
};
use zone_proto::NullSink;
use zone_world::{NullCombat, NullHooks, WorldConfig, Zone, ZoneState};

#[derive(Parser)]
#[command(name = "zone-server", about = "Standalone zone simulation server")]
struct Args {
    /// Path to a JSON world config (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Zone id override
    #[arg(short, long)]
    zone_id: Option<u32>,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = 20)]
    tick_rate: u32,

    /// Stop after this many ticks (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    max_ticks: u64,

    /// Demo NPCs to spawn once the zone is running
    #[arg(long, default_value_t = 8)]
    npc_count: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!(file = %path.display(), "loading world config");
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<WorldConfig>(&raw)?
        }
        None => WorldConfig::default(),
    };
    if let Some(zone_id) = args.zone_id {
        config.zone_id = zone_id;
    }

    let backend: Arc<dyn QueryBackend> = Arc::new(demo_backend(config.zone_id));
    let persist = PersistHandle::spawned(backend);
    let mut zone = Zone::new(
        config,
        persist,
        Rc::new(NullSink),
        Rc::new(NullHooks),
        Rc::new(NullCombat),
    );

    let tick_ms = tick_interval_ms(args.tick_rate);
    info!(
        zone_id = zone.config.zone_id,
        tick_ms, "starting zone server"
    );
    zone.bootstrap();

    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;
    let mut npcs_spawned = false;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        }

        let start = Instant::now();
        zone.tick(tick_ms);
        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(tick_ms) {
            warn!(?elapsed, budget_ms = tick_ms, "tick exceeded budget");
        }

        if !npcs_spawned && zone.state() == ZoneState::Running {
            spawn_demo_npcs(&mut zone, args.npc_count);
            npcs_spawned = true;
        }

        ticks += 1;
        if args.max_ticks > 0 && ticks >= args.max_ticks {
            info!(ticks, "tick limit reached");
            break;
        }
    }

    zone.shutdown();
    Ok(())
}

/// Milliseconds per tick for a requested rate. Clamped so the interval
/// period is never zero, whatever the CLI asked for.
fn tick_interval_ms(tick_rate: u32) -> u64 {
    u64::from(1000 / tick_rate.clamp(1, 1000))
}

/// A small self-contained world so the server runs without a database: one
/// town building with two cells, a cloning facility, a handful of statics,
/// and a spawn region.
fn demo_backend(zone_id: u32) -> FixtureBackend {
    let mut backend = FixtureBackend::new();
    backend.buildings.push(BuildingRow {
        id: EntityId(1000),
        position: Vec3::new(120.0, 0.0, 80.0),
        footprint: Rect::new(100.0, 60.0, 40.0, 40.0),
        cloning_facility: false,
        spawn_points: Vec::new(),
        cells: vec![EntityId(1001), EntityId(1002)],
    });
    backend.buildings.push(BuildingRow {
        id: EntityId(1100),
        position: Vec3::new(-200.0, 0.0, -150.0),
        footprint: Rect::new(-220.0, -170.0, 40.0, 40.0),
        cloning_facility: true,
        spawn_points: vec![Vec3::new(-200.0, 0.0, -150.0)],
        cells: vec![EntityId(1101)],
    });
    for i in 0..6u64 {
        backend.loose_objects.push(ObjectRow {
            id: EntityId(2000 + i),
            data: zone_core::EntityData::Static,
            position: Vec3::new(i as f32 * 30.0, 0.0, -40.0),
            heading: 0.0,
        });
    }
    backend.regions.insert(
        RegionTable::Spawn,
        vec![RegionRow {
            id: EntityId(3000),
            footprint: Rect::new(-500.0, -500.0, 1000.0, 1000.0),
            active: true,
        }],
    );
    backend.lookups.insert(
        LookupTable::Moods,
        vec!["calm".into(), "aggressive".into()],
    );
    backend
        .lookups
        .insert(LookupTable::WorldScripts, vec!["town_greeter".into()]);
    info!(zone_id, objects = backend.object_count(), "demo world ready");
    backend
}

fn spawn_demo_npcs(zone: &mut Zone, count: u32) {
    let mut spawned = 0;
    for i in 0..count {
        let angle = f32::from(i as u16) * 0.7;
        let home = Vec3::new(angle.cos() * 250.0, 0.0, angle.sin() * 250.0);
        if zone.spawn_npc(CreatureData::new(home), home).is_some() {
            spawned += 1;
        }
    }
    info!(spawned, "demo NPCs spawned");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval_never_zero() {
        assert_eq!(tick_interval_ms(0), 1000);
        assert_eq!(tick_interval_ms(20), 50);
        assert_eq!(tick_interval_ms(1000), 1);
        assert_eq!(tick_interval_ms(5000), 1);
    }
}
