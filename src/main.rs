//! Ship Sandbox entry point
//!
//! Headless driver: loads materials, builds a demo ship, sets off a couple of
//! bombs and runs the fixed-step loop, logging what happens.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::rc::Rc;
    use std::sync::Arc;

    use glam::Vec2;
    use ship_sandbox::render::CapturingRenderContext;
    use ship_sandbox::sim::{BombToggle, MaterialGrid, World};
    use ship_sandbox::{EventLog, GameEvent, GameParameters, Material, MaterialDatabase, Result};

    const MATERIALS_PATH: &str = "data/materials.json";
    const PARAMETERS_PATH: &str = "data/game_parameters.json";

    /// Simulated frame length (60 fps)
    const FRAME_DT: f32 = 1.0 / 60.0;
    const RUN_SECONDS: f32 = 20.0;
    const RC_DETONATION_SECONDS: f32 = 5.0;
    const DEFAULT_SEED: u64 = 42;

    /// H: iron hull, W: wood, G: glass, L: lamp, E: generator, C: cable
    const DEMO_SHIP: &[&str] = &[
        "       WWW            ",
        "       WLW            ",
        "    GWWWCWWWWWG       ",
        "    WE CCCC  LW       ",
        "HHHHHHHHHHHHHHHHHHHHHH",
        " HWWWWWWWWWWWWWWWWWWH ",
        "  HHWWWWWWWWWWWWWWHH  ",
        "    HHHHHHHHHHHHHH    ",
    ];

    fn legend(materials: &MaterialDatabase, c: char) -> Option<Arc<Material>> {
        let name = match c {
            'H' => "Iron Hull",
            'W' => "Wood",
            'G' => "Glass",
            'L' => "Lamp",
            'E' => "Generator",
            'C' => "Cable",
            _ => return None,
        };
        materials.get(name).cloned()
    }

    pub fn run() -> Result<()> {
        let seed = std::env::args()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEED);

        let materials = MaterialDatabase::load(MATERIALS_PATH)?;
        let parameters = GameParameters::load(PARAMETERS_PATH).unwrap_or_else(|e| {
            log::warn!("Using default game parameters ({e})");
            GameParameters::default()
        });

        let events = Rc::new(EventLog::new());
        let mut world = World::new(parameters, events.clone(), seed);

        let grid = MaterialGrid::from_rows(DEMO_SHIP, |c| legend(&materials, c));
        let ship_id = world.add_ship(&grid);

        // A timer bomb on the deck, an RC bomb in the hold
        let timer_bomb_position = Vec2::new(-3.0, 3.5);
        let toggle = world.toggle_timer_bomb_at(timer_bomb_position);
        log_bomb_toggle(timer_bomb_position, toggle);
        let rc_bomb_position = Vec2::new(3.0, 1.5);
        let toggle = world.toggle_rc_bomb_at(rc_bomb_position);
        log_bomb_toggle(rc_bomb_position, toggle);

        let mut is_rc_detonated = false;
        let mut next_report_seconds = 1.0;
        let mut steps = 0;

        while world.now().as_secs_f32() < RUN_SECONDS {
            steps += world.advance(FRAME_DT);

            let now_seconds = world.now().as_secs_f32();
            if !is_rc_detonated && now_seconds >= RC_DETONATION_SECONDS {
                log::info!("Detonating RC bombs");
                world.detonate_rc_bombs();
                is_rc_detonated = true;
            }

            if now_seconds >= next_report_seconds {
                report(&world, ship_id, &events.drain());
                next_report_seconds += 1.0;
            }
        }

        let mut render = CapturingRenderContext::new();
        world.upload(&mut render);
        log::info!(
            "Finished after {steps} steps: {} points, {} spring endpoints, {} triangle vertices uploaded",
            render.point_count,
            render.spring_indices.len(),
            render.triangle_indices.len()
        );

        Ok(())
    }

    fn log_bomb_toggle(position: Vec2, toggle: BombToggle) {
        match toggle {
            BombToggle::Placed(id) => log::info!("Bomb {id} placed at {position}"),
            other => log::warn!("No bomb placed at {position}: {other:?}"),
        }
    }

    fn report(world: &World, ship_id: u32, events: &[GameEvent]) {
        let Some(ship) = world.ship(ship_id) else {
            return;
        };

        let live_points = ship
            .points()
            .iter()
            .filter(|&p| !ship.points().is_deleted(p))
            .count();
        let count = |predicate: fn(&GameEvent) -> bool| events.iter().filter(|e| predicate(e)).count();

        log::info!(
            "t={:5.2}s points={live_points} components={} water={:.2} bombs={} | breaks={} destroys={} explosions={}",
            world.now().as_secs_f32(),
            ship.connected_component_count(),
            ship.total_water(),
            ship.bombs().len(),
            count(|e| matches!(e, GameEvent::Break { .. })),
            count(|e| matches!(e, GameEvent::Destroy { .. })),
            count(|e| matches!(e, GameEvent::BombExplosion { .. })),
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Ship Sandbox (headless) starting...");

    if let Err(e) = headless::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation is driven by the host on wasm; nothing to run here
}
