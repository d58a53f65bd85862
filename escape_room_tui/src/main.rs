use anyhow::{Context, Result};
use clap::Parser;
use escape_room_core::{
    Command, GridWorld, MapConfig, Pipeline, Pose, Step,
    agent::{Agent, AgentView, PlanningAgent},
    world::CellType,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Interactive test loop for the escape room", long_about = None)]
struct Args {
    /// Map config (TOML) to load. Uses the built-in room when omitted.
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// File that receives trace output.
    #[arg(long, value_name = "LOG_FILE", default_value = "escape_room.log")]
    log: PathBuf,

    /// Start with the planning agent driving.
    #[arg(short, long)]
    auto: bool,

    /// Milliseconds between autoplay steps.
    #[arg(long, default_value_t = 150)]
    tick_ms: u64,
}

struct App {
    pipeline: Pipeline<GridWorld>,
    agent: PlanningAgent,
    /// Last transition, `None` right after a reset.
    last_step: Option<Step>,
    last_error: Option<String>,
    episodes_completed: usize,
    autoplay: bool,
    should_quit: bool,
}

impl App {
    fn new(config: &MapConfig, autoplay: bool) -> Result<Self> {
        let mut pipeline = config.build_pipeline().context("Failed to build escape room")?;
        pipeline.reset();
        Ok(App {
            pipeline,
            agent: PlanningAgent::new(),
            last_step: None,
            last_error: None,
            episodes_completed: 0,
            autoplay,
            should_quit: false,
        })
    }

    fn reset(&mut self) {
        self.pipeline.reset();
        self.agent.reset();
        self.last_step = None;
        self.last_error = None;
    }

    /// Issues one command. A finished episode is reset first, so the next key
    /// press always does something.
    fn command(&mut self, command: Command) {
        if self.last_step.as_ref().is_some_and(Step::done) {
            self.reset();
        }
        match self.pipeline.step(command) {
            Ok(step) => {
                if step.done() {
                    self.episodes_completed += 1;
                    info!(
                        episode = self.episodes_completed,
                        steps = step.info.steps,
                        terminated = step.terminated,
                        "episode finished"
                    );
                }
                self.last_error = None;
                self.last_step = Some(step);
            }
            Err(err) => {
                warn!(%err, "step rejected");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Advances autoplay by one agent decision.
    fn tick(&mut self) {
        if !self.autoplay {
            return;
        }
        if self.last_step.as_ref().is_some_and(Step::done) {
            self.reset();
            return;
        }
        let command = self.agent.act(&AgentView::of(self.pipeline.controller()));
        self.command(command);
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = setup_logging(&args.log)?;

    let config = match &args.map {
        Some(path) => MapConfig::load(path)
            .with_context(|| format!("Failed to load map config {}", path.display()))?,
        None => MapConfig::escape_room1(),
    };
    let mut app = App::new(&config, args.auto)?;
    info!(map = ?args.map, "starting escape room");

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
    restore_terminal(&mut terminal)?;
    result
}

/// Sends tracing output to a file; stdout belongs to the terminal UI.
fn setup_logging(log_path: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let file_name = log_path
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", log_path.display()))?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn key_to_command(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Left | KeyCode::Char('h') => Some(Command::Left),
        KeyCode::Up | KeyCode::Char('k') => Some(Command::Up),
        KeyCode::Right | KeyCode::Char('l') => Some(Command::Right),
        KeyCode::Down | KeyCode::Char('j') => Some(Command::Down),
        KeyCode::Char(' ') => Some(Command::Beep),
        KeyCode::Char('.') => Some(Command::Nop),
        KeyCode::Char(digit @ '0'..='9') => digit
            .to_digit(10)
            .and_then(|index| Command::try_from(index as usize).ok()),
        _ => None,
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                        KeyCode::Char('r') => app.reset(),
                        KeyCode::Char('a') => app.autoplay = !app.autoplay,
                        code => {
                            if let Some(command) = key_to_command(code) {
                                app.command(command);
                            }
                        }
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(9),     // map
            Constraint::Length(8),  // step data
            Constraint::Length(2),  // help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], app);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new(
        "arrows/hjkl move  space beep  . nop  0-5 command index  r reset  a autoplay  q quit",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Observation, reward, done flags and info of the last step.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let controller = app.pipeline.controller();
    let observation = controller.observation();
    let mut lines = vec![Line::from(format!(
        "Observation: pose ({}, {})   Episodes completed: {}   Autoplay: {}",
        observation.pose.x,
        observation.pose.y,
        app.episodes_completed,
        if app.autoplay { "on" } else { "off" }
    ))];

    match &app.last_step {
        Some(step) => {
            lines.push(Line::from(format!("     Reward: {}", step.reward)));
            lines.push(Line::from(format!(
                "       Done: terminated={} truncated={}",
                step.terminated, step.truncated
            )));
            lines.push(Line::from(format!(
                "       Info: has_key={} blocked_by_door={} steps={} beeped_on={}",
                step.info.has_key,
                step.info.blocked_by_door,
                step.info.steps,
                step.info
                    .beeped_on
                    .map_or_else(|| "-".to_string(), |c| c.to_string())
            )));
            if step.done() {
                lines.push(Line::styled(
                    "Episode over. Any command starts a new one.",
                    Style::default().fg(Color::Green).bold(),
                ));
            }
        }
        None => lines.push(Line::from("     Reward: -   (episode reset)")),
    }
    if let Some(err) = &app.last_error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }

    let status = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Step"));
    frame.render_widget(status, area);
}

fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let controller = app.pipeline.controller();
    let world = controller.world();
    let landmarks = controller.landmarks();
    let agent = controller.pose();
    let has_key = controller.has_key();

    let mut lines: Vec<Line> = Vec::with_capacity(world.height());
    let mut spans: Vec<Span> = Vec::with_capacity(world.width());
    for (cell, terrain) in world.terrain().enumerate() {
        let span = if Pose::from(cell) == agent {
            Span::styled("@", Style::default().fg(Color::Red).bold())
        } else if cell == landmarks.door {
            if has_key {
                Span::styled("+", Style::default().fg(Color::Green))
            } else {
                Span::styled("|", Style::default().fg(Color::Red))
            }
        } else if cell == landmarks.exit {
            Span::styled("E", Style::default().fg(Color::Green).bold())
        } else if cell == landmarks.key && !has_key {
            Span::styled("k", Style::default().fg(Color::Yellow).bold())
        } else {
            match terrain {
                CellType::Floor => Span::raw(" "),
                CellType::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
                CellType::Colored(color) => {
                    Span::styled(color.to_string(), Style::default().fg(Color::Cyan))
                }
            }
        };
        spans.push(span);
        if cell.x + 1 == world.width() {
            lines.push(Line::from(std::mem::take(&mut spans)));
        }
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Escape Room").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}
