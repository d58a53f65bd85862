use std::path::PathBuf;

use escape_room_core::{
    MapConfig,
    agent::{PlanningAgent, run_episode},
};

fn map_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../maps")
        .join(name)
}

#[test]
fn stock_map_file_matches_builtin_room() {
    let loaded = MapConfig::load(map_path("escape_room1.toml")).unwrap();
    let builtin = MapConfig::escape_room1();
    assert_eq!(loaded.landmarks(), builtin.landmarks());
    assert_eq!(loaded.initial_pose, builtin.initial_pose);
    assert_eq!(loaded.build().unwrap().world(), builtin.build().unwrap().world());
}

#[yare::parameterized(
    escape_room1 = { "escape_room1.toml" },
    two_rooms    = { "two_rooms.toml" },
)]
fn planning_agent_solves_shipped_map(name: &str) {
    let config = MapConfig::load(map_path(name)).unwrap();
    let mut pipeline = config.build_pipeline().unwrap();
    let mut agent = PlanningAgent::new();
    let summary = run_episode(&mut pipeline, &mut agent, 1_000).unwrap();
    assert!(summary.terminated, "{name}: {summary:?}");
    assert!(summary.has_key);
    assert!(!summary.truncated);
    assert!(summary.total_reward > 0.0);
}
