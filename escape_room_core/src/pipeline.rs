//! An explicit, ordered chain of post-processing stages around an
//! [`EpisodeController`].
//!
//! Each stage sees the step produced by the controller after all earlier
//! stages have run, so the order in which stages are added is the order in
//! which their effects compose.

use tracing::debug;

use crate::{
    Command, EscapeRoomError,
    episode::{EpisodeController, Observation, Step},
    world::World,
};

/// One named transformation applied to every step of an episode.
///
/// Stages must be `Send` so a whole [`Pipeline`] can be moved to a worker
/// thread.
pub trait Stage: Send {
    fn name(&self) -> &str;

    /// Called on every episode reset.
    fn reset(&mut self) {}

    /// Checked before the controller is stepped. Returning an error aborts the
    /// step before anything is mutated.
    fn admit(&self) -> Result<(), EscapeRoomError> {
        Ok(())
    }

    fn process(&mut self, step: Step) -> Step;
}

/// Charges a constant cost for every step that does not end the episode.
#[derive(Debug, Clone)]
pub struct StepPenalty {
    cost: f64,
}

impl StepPenalty {
    pub fn new(cost: f64) -> Self {
        StepPenalty { cost }
    }
}

impl Stage for StepPenalty {
    fn name(&self) -> &str {
        "step_penalty"
    }

    fn process(&mut self, mut step: Step) -> Step {
        if !step.terminated {
            step.reward -= self.cost;
        }
        step
    }
}

/// Multiplies every reward by a constant factor.
#[derive(Debug, Clone)]
pub struct RewardScale {
    factor: f64,
}

impl RewardScale {
    pub fn new(factor: f64) -> Self {
        RewardScale { factor }
    }
}

impl Stage for RewardScale {
    fn name(&self) -> &str {
        "reward_scale"
    }

    fn process(&mut self, mut step: Step) -> Step {
        step.reward *= self.factor;
        step
    }
}

/// Truncates an episode once it has run for `max_steps` steps.
#[derive(Debug, Clone)]
pub struct TimeLimit {
    max_steps: usize,
    elapsed: usize,
    truncated: bool,
}

impl TimeLimit {
    pub fn new(max_steps: usize) -> Self {
        TimeLimit {
            max_steps,
            elapsed: 0,
            truncated: false,
        }
    }

    /// Steps counted since the last reset.
    pub fn elapsed(&self) -> usize {
        self.elapsed
    }
}

impl Stage for TimeLimit {
    fn name(&self) -> &str {
        "time_limit"
    }

    fn reset(&mut self) {
        self.elapsed = 0;
        self.truncated = false;
    }

    fn admit(&self) -> Result<(), EscapeRoomError> {
        if self.truncated {
            Err(EscapeRoomError::EpisodeTruncated {
                steps: self.elapsed,
            })
        } else {
            Ok(())
        }
    }

    fn process(&mut self, mut step: Step) -> Step {
        self.elapsed += 1;
        if self.elapsed >= self.max_steps && !step.terminated {
            debug!(steps = self.elapsed, "episode truncated");
            self.truncated = true;
            step.truncated = true;
        }
        step
    }
}

/// An [`EpisodeController`] followed by an ordered list of [`Stage`]s.
pub struct Pipeline<W> {
    controller: EpisodeController<W>,
    stages: Vec<Box<dyn Stage + Send>>,
}

impl<W: World> Pipeline<W> {
    pub fn new(controller: EpisodeController<W>) -> Self {
        Pipeline {
            controller,
            stages: Vec::new(),
        }
    }

    /// Appends a stage; it runs after every stage added before it.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.push_stage(Box::new(stage));
        self
    }

    pub fn push_stage(&mut self, stage: Box<dyn Stage + Send>) {
        self.stages.push(stage);
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// The first stage called `name`, if any.
    pub fn stage(&self, name: &str) -> Option<&(dyn Stage + Send)> {
        self.stages
            .iter()
            .map(|stage| stage.as_ref())
            .find(|stage| stage.name() == name)
    }

    pub fn controller(&self) -> &EpisodeController<W> {
        &self.controller
    }

    pub fn reset(&mut self) -> Observation {
        for stage in &mut self.stages {
            stage.reset();
        }
        self.controller.reset()
    }

    pub fn step(&mut self, command: Command) -> Result<Step, EscapeRoomError> {
        for stage in &self.stages {
            stage.admit()?;
        }
        let step = self.controller.step(command)?;
        Ok(self
            .stages
            .iter_mut()
            .fold(step, |step, stage| stage.process(step)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Pose, Position, episode::Landmarks, world::GridWorld};

    fn open_room() -> EpisodeController<GridWorld> {
        let world = GridWorld::from_layout("|#####|\n|#k  #|\n|# ..#|\n|#####|").unwrap();
        let landmarks = Landmarks {
            key: Position::new(1, 1),
            door: Position::new(2, 2),
            exit: Position::new(3, 2),
        };
        EpisodeController::new(world, landmarks, Pose::new(2, 1)).unwrap()
    }

    #[test]
    fn stages_run_in_insertion_order() {
        let mut pipeline = Pipeline::new(open_room())
            .with_stage(StepPenalty::new(0.1))
            .with_stage(RewardScale::new(10.0));
        assert_eq!(pipeline.stage_names(), ["step_penalty", "reward_scale"]);

        let step = pipeline.step(Command::Nop).unwrap();
        assert!((step.reward - -1.0).abs() < 1e-9);

        let mut reversed = Pipeline::new(open_room())
            .with_stage(RewardScale::new(10.0))
            .with_stage(StepPenalty::new(0.1));
        let step = reversed.step(Command::Nop).unwrap();
        assert!((step.reward - -0.1).abs() < 1e-9);
    }

    #[test]
    fn penalty_skips_the_terminal_step() {
        let mut pipeline = Pipeline::new(open_room()).with_stage(StepPenalty::new(0.5));
        pipeline.step(Command::Right).unwrap();
        let step = pipeline.step(Command::Down).unwrap();
        assert!(step.terminated);
        assert_eq!(step.reward, 1.0);
    }

    #[test]
    fn time_limit_truncates_and_blocks_until_reset() {
        let mut pipeline = Pipeline::new(open_room()).with_stage(TimeLimit::new(2));
        assert!(!pipeline.step(Command::Nop).unwrap().truncated);
        let last = pipeline.step(Command::Nop).unwrap();
        assert!(last.truncated);
        assert!(last.done());

        let steps_before = pipeline.controller().steps();
        assert!(matches!(
            pipeline.step(Command::Nop),
            Err(EscapeRoomError::EpisodeTruncated { steps: 2 })
        ));
        assert_eq!(pipeline.controller().steps(), steps_before);

        pipeline.reset();
        assert!(!pipeline.step(Command::Nop).unwrap().truncated);
    }

    #[test]
    fn stages_can_be_looked_up_by_name() {
        let pipeline = Pipeline::new(open_room())
            .with_stage(StepPenalty::new(0.1))
            .with_stage(TimeLimit::new(3));
        assert_eq!(
            pipeline.stage("time_limit").map(|stage| stage.name()),
            Some("time_limit")
        );
        assert_eq!(
            pipeline.stage("step_penalty").map(|stage| stage.name()),
            Some("step_penalty")
        );
        assert!(pipeline.stage("reward_scale").is_none());
    }

    #[test]
    fn time_limit_counts_steps_until_reset() {
        let mut limit = TimeLimit::new(10);
        let mut controller = open_room();
        for _ in 0..3 {
            let step = controller.step(Command::Nop).unwrap();
            limit.process(step);
        }
        assert_eq!(limit.elapsed(), 3);
        limit.reset();
        assert_eq!(limit.elapsed(), 0);
    }

    #[test]
    fn pipeline_can_move_to_another_thread() {
        fn assert_send<T: Send>() {}
        assert_send::<Pipeline<GridWorld>>();

        let mut pipeline = Pipeline::new(open_room()).with_stage(TimeLimit::new(5));
        let step = std::thread::spawn(move || pipeline.step(Command::Right))
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(step.observation.pose, Pose::new(3, 1));
    }

    #[test]
    fn reaching_the_exit_on_the_last_step_is_not_truncation() {
        let mut pipeline = Pipeline::new(open_room()).with_stage(TimeLimit::new(2));
        pipeline.step(Command::Right).unwrap();
        let step = pipeline.step(Command::Down).unwrap();
        assert!(step.terminated);
        assert!(!step.truncated);
    }
}
