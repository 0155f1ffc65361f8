//! VERSUS TETRS terminal client
//!
//! Negotiates a match through the relay, then plays it at 60 ticks per second.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{
        self, Event, KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
        supports_keyboard_enhancement,
    },
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout, stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use versus_tetrs::board::{Board, BoardEvent};
use versus_tetrs::input::{KeyAction, KeyBindings, KeyTracker};
use versus_tetrs::matchmaking::{Negotiation, Pairing, QuickPlay, Waiting};
use versus_tetrs::ruleset::RulesetKind;
use versus_tetrs::session::{
    MatchLink, MatchResult, NetSender, Referee, Session, lock, spawn_receiver,
};
use versus_tetrs::settings::Settings;
use versus_tetrs::ui::{self, MatchStatus};

/// Target frame rate, also the simulation tick rate
const TARGET_FPS: u64 = 60;
const FRAME_DURATION: Duration = Duration::from_micros(1_000_000 / TARGET_FPS);

type Term = Terminal<CrosstermBackend<Stdout>>;

#[derive(Debug, Parser)]
#[command(name = "versus-tetrs", version, about = "Two-player Tetris over a relay server")]
struct Cli {
    /// Relay address, overrides the settings file
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play the next stranger in a queue
    Quick {
        #[arg(long, value_enum, default_value_t = QueueArg::Modern)]
        ruleset: QueueArg,
    },
    /// Open a room and wait for a friend
    Host,
    /// Join a friend's room
    Join { room: i32 },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QueueArg {
    Nes,
    Modern,
}

impl From<QueueArg> for QuickPlay {
    fn from(arg: QueueArg) -> Self {
        match arg {
            QueueArg::Nes => QuickPlay::Nes,
            QueueArg::Modern => QuickPlay::Modern,
        }
    }
}

/// How a finished match ended for us
#[derive(Debug)]
struct Outcome {
    result: Option<MatchResult>,
    lines: usize,
    level: u32,
}

/// Get the temp directory for logs, creating it if needed
fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("versus-tetrs");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id: u32 = rand::random();
    let log_dir = temp_dir();
    let log_file = format!("{session_id:08x}.log");

    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("versus_tetrs=debug".parse()?),
        )
        .with_ansi(false)
        .init();

    tracing::info!(
        "versus-tetrs starting, session={session_id:08x}, log={}",
        log_dir.join(&log_file).display()
    );

    let settings = Settings::load();
    let server = cli
        .server
        .clone()
        .unwrap_or_else(|| settings.network.server.clone());

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }

    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let result = run(&mut terminal, &cli.command, &server, &settings);

    if enhanced {
        let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
    }
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;

    match &result {
        Ok(Some(outcome)) => {
            let verdict = match outcome.result {
                Some(MatchResult::Won) => "You won!",
                Some(MatchResult::Lost) => "You topped out.",
                Some(MatchResult::Draw) => "Both topped out.",
                None => "Match abandoned.",
            };
            println!("\n{verdict}");
            println!("Level: {} | Lines: {}", outcome.level, outcome.lines);
        }
        Ok(None) => println!("\nNo match played."),
        Err(e) => tracing::error!("client failed: {e:#}"),
    }
    result.map(|_| ())
}

fn run(
    terminal: &mut Term,
    command: &Command,
    server: &str,
    settings: &Settings,
) -> Result<Option<Outcome>> {
    ui_message(terminal, &format!("Connecting to {server}..."), None)?;
    let negotiation =
        Negotiation::connect(server).with_context(|| format!("connecting to relay {server}"))?;

    let (pairing, ruleset) = match *command {
        Command::Quick { ruleset } => {
            let queue = QuickPlay::from(ruleset);
            let waiting = negotiation.quick_play(queue)?;
            match wait_for_partner(terminal, waiting)? {
                Some(pairing) => (pairing, queue.ruleset()),
                None => return Ok(None),
            }
        }
        Command::Host => {
            let waiting = negotiation.host()?;
            match wait_for_partner(terminal, waiting)? {
                Some(pairing) => (pairing, settings.gameplay.ruleset),
                None => return Ok(None),
            }
        }
        Command::Join { room } => {
            ui_message(terminal, &format!("Joining room {room}..."), None)?;
            (
                negotiation
                    .join(room)
                    .with_context(|| format!("joining room {room}"))?,
                settings.gameplay.ruleset,
            )
        }
    };

    tracing::info!(seed = pairing.seed, %ruleset, "match starting");
    play(terminal, pairing, ruleset, settings).map(Some)
}

fn ui_message(terminal: &mut Term, message: &str, room: Option<i32>) -> io::Result<()> {
    terminal.draw(|frame| ui::render_waiting(frame, message, room))?;
    Ok(())
}

/// Block until any key is pressed
fn wait_for_key() -> io::Result<()> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(());
            }
        }
    }
}

/// Whether a quit key is waiting in the terminal's event queue
fn quit_requested() -> io::Result<bool> {
    while event::poll(Duration::ZERO)? {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ctrl_c =
                key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
            if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn wait_for_partner(terminal: &mut Term, mut waiting: Waiting) -> Result<Option<Pairing>> {
    let room = waiting.room();
    loop {
        ui_message(terminal, "Waiting for opponent...", room)?;
        if let Some(seed) = waiting.poll(FRAME_DURATION)? {
            return Ok(Some(waiting.into_pairing(seed)));
        }
        if quit_requested()? {
            tracing::info!("stopped waiting for a partner");
            return Ok(None);
        }
    }
}

fn play(
    terminal: &mut Term,
    pairing: Pairing,
    ruleset: RulesetKind,
    settings: &Settings,
) -> Result<Outcome> {
    let handling = settings.gameplay.handling();
    let rules = ruleset.ruleset();

    let session = Arc::new(Session::new(&pairing.stream)?);
    let sender = Arc::new(NetSender::connect(&pairing.stream, Arc::clone(&session))?);
    let mut local = Board::local(rules, pairing.seed, handling);
    let puppet = Arc::new(Mutex::new(Board::puppet(
        rules,
        pairing.seed,
        handling.start_level,
    )));

    let link = MatchLink::new(
        Arc::clone(&puppet),
        local.garbage_queue(),
        Arc::clone(&sender),
        Arc::clone(&session),
    );
    let receiver = spawn_receiver(pairing.stream.try_clone()?, link)?;

    let mut tracker = KeyTracker::new(KeyBindings::default());
    let mut referee = Referee::default();
    let mut next_tick = Instant::now() + FRAME_DURATION;

    'game: loop {
        let status = MatchStatus {
            link: session.status(),
            room: pairing.room,
            result: referee.result(),
        };
        terminal.draw(|frame| {
            let puppet = lock(&puppet);
            ui::render_match(frame, &local, &puppet, status);
        })?;
        if referee.is_over() {
            break;
        }

        while event::poll(next_tick.saturating_duration_since(Instant::now()))? {
            if let Event::Key(key) = event::read()? {
                if tracker.handle(key, &mut local) == Some(KeyAction::Quit) {
                    break 'game;
                }
            }
        }
        tracker.expire(Instant::now(), &mut local);

        for event in local.update() {
            sender.send_event(&event);
            if event == BoardEvent::ToppedOut {
                session.finish();
            }
        }
        let puppet_alive = {
            let mut puppet = lock(&puppet);
            puppet.update();
            puppet.is_alive()
        };
        referee.observe(local.is_alive(), !puppet_alive || session.is_peer_finished());

        next_tick += FRAME_DURATION;
        let now = Instant::now();
        if next_tick < now {
            // Fell behind, don't try to catch up with a burst of ticks
            next_tick = now;
        }
    }

    if referee.is_over() {
        wait_for_key()?;
    }
    session.close();
    if receiver.join().is_err() {
        tracing::warn!("receiver thread panicked");
    }

    let result = referee.result();
    tracing::info!(?result, lines = local.lines(), "match over");
    Ok(Outcome {
        result,
        lines: local.lines(),
        level: local.level(),
    })
}
