use escape_room_core::{
    Command, EpisodeController, EscapeRoomError, GridWorld, Landmarks, MapConfig, Pose, Position,
    World, episode::EXIT_REWARD,
};
use proptest::prelude::*;

fn room() -> EpisodeController<GridWorld> {
    MapConfig::escape_room1().build().expect("built-in room is valid")
}

fn run<W: World>(env: &mut EpisodeController<W>, commands: &[Command]) {
    for &command in commands {
        env.step(command).expect("episode still running");
    }
}

const TO_KEY: [Command; 3] = [Command::Left, Command::Up, Command::Up];
const KEY_TO_DOOR_FRONT: [Command; 6] = [
    Command::Down,
    Command::Down,
    Command::Right,
    Command::Right,
    Command::Right,
    Command::Right,
];

#[test]
fn door_blocks_until_key_then_exit_ends_episode() {
    let mut env = room();
    env.reset();

    // Straight for the door: (2,3) -> (5,3), then frozen.
    run(&mut env, &[Command::Right; 3]);
    assert_eq!(env.pose(), Pose::new(5, 3));
    for _ in 0..3 {
        let step = env.step(Command::Right).unwrap();
        assert_eq!(step.observation.pose, Pose::new(5, 3));
        assert!(step.info.blocked_by_door);
        assert!(!step.info.has_key);
        assert!(!step.terminated);
    }

    // Back to the key at (1,1).
    run(
        &mut env,
        &[
            Command::Left,
            Command::Left,
            Command::Left,
            Command::Left,
            Command::Up,
            Command::Up,
        ],
    );
    assert_eq!(env.pose(), Pose::new(1, 1));
    assert!(env.has_key());

    run(&mut env, &KEY_TO_DOOR_FRONT);
    let through = env.step(Command::Right).unwrap();
    assert_eq!(through.observation.cell, Some(Position::new(6, 3)));
    assert!(through.info.has_key);

    run(&mut env, &[Command::Right, Command::Right]);
    let exit = env.step(Command::Right).unwrap();
    assert_eq!(exit.observation.cell, Some(Position::new(9, 3)));
    assert_eq!(exit.reward, EXIT_REWARD);
    assert!(exit.terminated);

    assert!(matches!(
        env.step(Command::Nop),
        Err(EscapeRoomError::EpisodeAlreadyTerminated)
    ));
}

#[test]
fn reset_relocks_the_door() {
    let mut env = room();
    run(&mut env, &TO_KEY);
    assert!(env.has_key());

    let obs = env.reset();
    assert_eq!(obs.pose, Pose::new(2, 3));
    assert!(!env.has_key());

    run(&mut env, &[Command::Right; 3]);
    let step = env.step(Command::Right).unwrap();
    assert!(step.info.blocked_by_door);
    assert_eq!(step.observation.pose, Pose::new(5, 3));
}

#[test]
fn reset_twice_is_idempotent() {
    let mut env = room();
    run(&mut env, &TO_KEY);
    let first = env.reset();
    let first_key = env.has_key();
    let second = env.reset();
    assert_eq!(first, second);
    assert!(!first_key);
    assert!(!env.has_key());
    assert_eq!(env.steps(), 0);
}

#[test]
fn walls_are_silent_no_ops() {
    let mut env = room();
    run(&mut env, &[Command::Down, Command::Down]);
    let step = env.step(Command::Down).unwrap();
    assert_eq!(step.observation.pose, Pose::new(2, 5));
    assert!(!step.info.blocked_by_door);
}

#[test]
fn controllers_do_not_share_key_state() {
    let mut a = room();
    let mut b = room();
    run(&mut a, &TO_KEY);
    assert!(a.has_key());
    assert!(!b.has_key());
    run(&mut b, &[Command::Right; 4]);
    assert_eq!(b.pose(), Pose::new(5, 3));
}

/// A grid world that charges a flat cost for every step.
struct CostlyWorld {
    grid: GridWorld,
    cost: f64,
}

impl World for CostlyWorld {
    fn is_traversable(&self, pose: Pose) -> bool {
        self.grid.is_traversable(pose)
    }

    fn discretize(&self, pose: Pose) -> Option<Position> {
        self.grid.discretize(pose)
    }

    fn contains(&self, cell: Position) -> bool {
        self.grid.contains(cell)
    }

    fn step_reward(&self, _pose: Pose) -> f64 {
        -self.cost
    }
}

#[test]
fn world_step_reward_is_added_to_the_exit_reward() {
    let world = CostlyWorld {
        grid: GridWorld::from_layout("|######|\n|#    #|\n|######|").unwrap(),
        cost: 0.25,
    };
    let landmarks = Landmarks {
        key: Position::new(2, 1),
        door: Position::new(3, 1),
        exit: Position::new(4, 1),
    };
    let mut env = EpisodeController::new(world, landmarks, Pose::new(1, 1)).unwrap();
    env.reset();

    let idle = env.step(Command::Nop).unwrap();
    assert_eq!(idle.reward, -0.25);
    assert!(!idle.terminated);

    run(&mut env, &[Command::Right, Command::Right]);
    assert!(env.has_key());
    let exit = env.step(Command::Right).unwrap();
    assert!(exit.terminated);
    assert_eq!(exit.reward, EXIT_REWARD - 0.25);
    assert_eq!(exit.reward, 0.75);
}

fn any_command() -> impl Strategy<Value = Command> {
    (0..Command::ALL.len()).prop_map(|i| Command::try_from(i).unwrap())
}

proptest! {
    #[test]
    fn key_flag_never_reverts(commands in prop::collection::vec(any_command(), 0..200)) {
        let mut env = room();
        let mut seen_key = false;
        for command in commands {
            let Ok(step) = env.step(command) else { break };
            if seen_key {
                prop_assert!(step.info.has_key);
            }
            seen_key = step.info.has_key;
        }
    }

    #[test]
    fn locked_door_never_moves_the_agent(commands in prop::collection::vec(any_command(), 0..200)) {
        let mut env = room();
        let door = env.landmarks().door;
        for command in commands {
            let before = env.pose();
            let had_key = env.has_key();
            let candidate = command.apply(before, env.world());
            let Ok(step) = env.step(command) else { break };
            if !had_key && env.world().discretize(candidate) == Some(door) {
                prop_assert_eq!(step.observation.pose, before);
                prop_assert!(!step.info.has_key);
                prop_assert!(step.info.blocked_by_door);
            }
            if had_key && env.world().discretize(candidate) == Some(door) {
                prop_assert_eq!(step.observation.cell, Some(door));
            }
        }
    }

    #[test]
    fn only_the_exit_terminates(commands in prop::collection::vec(any_command(), 0..200)) {
        let mut env = room();
        let exit = env.landmarks().exit;
        for command in commands {
            let step = env.step(command).unwrap();
            let at_exit = step.observation.cell == Some(exit);
            prop_assert_eq!(step.terminated, at_exit);
            if step.terminated {
                prop_assert!(step.reward >= EXIT_REWARD);
                break;
            }
            prop_assert_eq!(step.reward, 0.0);
        }
    }
}
