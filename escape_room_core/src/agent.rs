use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, VecDeque},
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::{
    Command, EscapeRoomError, Pose,
    episode::{EpisodeController, Landmarks, Observation},
    pipeline::Pipeline,
    world::World,
};

/// What an agent gets to see before choosing a command.
pub struct AgentView<'a> {
    pub observation: Observation,
    /// Key possession as last reported in the step info.
    pub has_key: bool,
    pub landmarks: &'a Landmarks,
    pub world: &'a dyn World,
}

impl<'a> AgentView<'a> {
    pub fn of<W: World>(controller: &'a EpisodeController<W>) -> Self {
        AgentView {
            observation: controller.observation(),
            has_key: controller.has_key(),
            landmarks: controller.landmarks(),
            world: controller.world(),
        }
    }
}

/// Something that picks commands for the escape room.
pub trait Agent {
    /// Chooses the next command. `&mut self` lets agents keep plans between steps.
    fn act(&mut self, view: &AgentView) -> Command;

    /// Called when a new episode starts.
    fn reset(&mut self) {}
}

/// Picks uniformly among the four movement commands.
#[derive(Debug)]
pub struct RandomWalker {
    rng: StdRng,
}

impl RandomWalker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomWalker {
    fn act(&mut self, _view: &AgentView) -> Command {
        Command::MOVES[self.rng.random_range(0..Command::MOVES.len())]
    }
}

/// Walks to the key while the door is locked, then to the exit, following
/// shortest paths found with A*.
#[derive(Debug, Default)]
pub struct PlanningAgent {
    current_plan: VecDeque<Pose>,
    planned_with_key: bool,
}

impl PlanningAgent {
    pub fn new() -> Self {
        Self::default()
    }

    fn step_to_command(src: Pose, dst: Pose) -> Option<Command> {
        Command::MOVES
            .into_iter()
            .find(|command| src.offset(command.delta()) == dst)
    }

    /// Cells reachable in one move. The door counts as a wall until the key
    /// has been collected.
    fn neighbors(pose: Pose, view: &AgentView) -> impl Iterator<Item = Pose> {
        let door = view.landmarks.door;
        let has_key = view.has_key;
        Command::MOVES
            .into_iter()
            .map(move |command| command.apply(pose, view.world))
            .filter(move |next| *next != pose)
            .filter(move |next| has_key || view.world.discretize(*next) != Some(door))
    }

    fn a_star_path(start: Pose, goal: Pose, view: &AgentView) -> Option<Vec<Pose>> {
        #[derive(Clone, Eq, PartialEq)]
        struct PrioritizedItem {
            priority: usize,
            pose: Pose,
        }

        impl Ord for PrioritizedItem {
            fn cmp(&self, other: &Self) -> Ordering {
                // Reversed so the max-heap pops the cheapest item.
                other.priority.cmp(&self.priority)
            }
        }

        impl PartialOrd for PrioritizedItem {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut frontier = BinaryHeap::new();
        let mut came_from: HashMap<Pose, Pose> = HashMap::new();
        let mut cost_so_far: HashMap<Pose, usize> = HashMap::new();

        frontier.push(PrioritizedItem {
            priority: 0,
            pose: start,
        });
        cost_so_far.insert(start, 0);

        while let Some(PrioritizedItem { pose: current, .. }) = frontier.pop() {
            if current == goal {
                let mut path = vec![current];
                let mut node = current;
                while node != start {
                    node = *came_from.get(&node)?;
                    path.push(node);
                }
                path.reverse();
                return Some(path);
            }

            let current_cost = cost_so_far[&current];
            for neighbor in Self::neighbors(current, view) {
                let new_cost = current_cost + 1;
                if cost_so_far
                    .get(&neighbor)
                    .is_none_or(|&known| new_cost < known)
                {
                    cost_so_far.insert(neighbor, new_cost);
                    came_from.insert(neighbor, current);
                    frontier.push(PrioritizedItem {
                        priority: new_cost + neighbor.manhattan(goal),
                        pose: neighbor,
                    });
                }
            }
        }

        None
    }

    fn replan(&mut self, view: &AgentView) {
        let start = view.observation.pose;
        let target = if view.has_key {
            view.landmarks.exit
        } else {
            view.landmarks.key
        };
        self.current_plan.clear();
        self.planned_with_key = view.has_key;
        match Self::a_star_path(start, Pose::from(target), view) {
            Some(path) => self.current_plan.extend(path.into_iter().skip(1)),
            None => debug!(?target, "no path to target"),
        }
    }
}

impl Agent for PlanningAgent {
    fn act(&mut self, view: &AgentView) -> Command {
        let current = view.observation.pose;
        if self.planned_with_key != view.has_key || self.current_plan.is_empty() {
            self.replan(view);
        }

        match self.current_plan.pop_front() {
            Some(next) => Self::step_to_command(current, next).unwrap_or_else(|| {
                // Off plan, e.g. after an external reset. Try again next turn.
                self.current_plan.clear();
                Command::Nop
            }),
            None => Command::Nop,
        }
    }

    fn reset(&mut self) {
        self.current_plan.clear();
        self.planned_with_key = false;
    }
}

/// Totals for one episode driven by an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub total_reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub has_key: bool,
}

/// Resets `pipeline` and lets `agent` play until the episode ends or
/// `max_steps` commands have been issued.
pub fn run_episode<W: World>(
    pipeline: &mut Pipeline<W>,
    agent: &mut dyn Agent,
    max_steps: usize,
) -> Result<EpisodeSummary, EscapeRoomError> {
    pipeline.reset();
    agent.reset();

    let mut summary = EpisodeSummary {
        steps: 0,
        total_reward: 0.0,
        terminated: false,
        truncated: false,
        has_key: false,
    };
    while summary.steps < max_steps {
        let command = agent.act(&AgentView::of(pipeline.controller()));
        let step = pipeline.step(command)?;
        summary.steps += 1;
        summary.total_reward += step.reward;
        summary.has_key = step.info.has_key;
        summary.terminated = step.terminated;
        summary.truncated = step.truncated;
        if step.done() {
            break;
        }
    }
    Ok(summary)
}
