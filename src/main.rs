//! Cue Timer command-line front end
//!
//! Listens on the selected microphone, reports cue timings on stdout and
//! takes single-line commands on stdin.

mod cli;

use clap::Parser;
use cli::Args;
use cue_timer_lib::audio::{list_sources, BeepPlayer, SquareBeep};
use cue_timer_lib::cue::{get_timing_option, get_timing_options, CueEvent, CueMode};
use cue_timer_lib::{AppState, CaptureLog, DetectorConfig, DetectorError, FrameReport};
use parking_lot::Mutex;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const CLICK_HZ: f32 = 210.0;
const TARGET_HZ: f32 = 420.0;

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run(Args::parse()).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), DetectorError> {
    if args.list_sources {
        for source in list_sources()? {
            let marker = if source.is_default { " (default)" } else { "" };
            println!("{}\t{}{}", source.id, source.name, marker);
        }
        return Ok(());
    }

    if args.list_timings {
        for option in get_timing_options() {
            println!("{}\t{:?}\t{}s", option.name, option.event, option.timing_seconds);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(timing) = args.timing.clone() {
        config.selected_timing = Some(timing);
    }

    let mut state = AppState::new(&config)?;
    state.audio_source_id = args.source.clone();

    let capture_log = args
        .capture
        .as_ref()
        .map(|_| Arc::new(Mutex::new(CaptureLog::new())));
    if let Some(capture_log) = &capture_log {
        state.detector.set_sink(capture_log.clone());
    }

    let beeper = match BeepPlayer::new() {
        Ok(player) => Some(player),
        Err(e) => {
            log::warn!("Beeps disabled: {}", e);
            None
        }
    };

    state.start()?;
    println!(
        "Listening for '{}'. Enter = manual cue, t <name> = timing, s = start/stop, q = quit",
        state.detector.session().option().name
    );

    let mut commands = spawn_stdin_reader();
    let mut interval = tokio::time::interval(Duration::from_millis(16));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Received Ctrl-C");
                break;
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    log::info!("stdin closed");
                    break;
                };
                if !handle_command(&mut state, command.trim(), beeper.as_ref())? {
                    break;
                }
            }
            _ = interval.tick() => {
                if let Some(report) = state.tick() {
                    print_report(&report, args.metronome, beeper.as_ref());
                }
            }
        }
    }

    state.stop();

    if let (Some(path), Some(capture_log)) = (&args.capture, &capture_log) {
        let capture_log = capture_log.lock();
        std::fs::write(path, capture_log.to_json()?)?;
        log::info!(
            "Wrote {} frames to {}",
            capture_log.frames().len(),
            path.display()
        );
    }

    Ok(())
}

/// Forward stdin lines to the frame loop
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Returns `false` when the user asked to quit
fn handle_command(
    state: &mut AppState,
    command: &str,
    beeper: Option<&BeepPlayer>,
) -> Result<bool, DetectorError> {
    match command {
        "" => {
            if let Some(beeper) = beeper {
                beeper.play(&SquareBeep::new(CLICK_HZ));
            }
            for event in state.manual_cue() {
                print_event(&event);
            }
        }
        "q" | "quit" => return Ok(false),
        "s" | "stop" | "start" => {
            if state.is_running() {
                state.stop();
                println!("Stopped");
            } else {
                state.start()?;
                println!("Listening");
            }
        }
        _ => match command.strip_prefix("t ") {
            Some(name) => match get_timing_option(name.trim()) {
                Some(option) => state.detector.select_option(option),
                None => println!("Unknown timing '{}'", name.trim()),
            },
            None => println!("Unknown command '{}'", command),
        },
    }
    Ok(true)
}

fn print_report(report: &FrameReport, metronome: bool, beeper: Option<&BeepPlayer>) {
    for event in &report.events {
        if let (CueEvent::LeadUpBeat { beats_remaining }, true, Some(beeper)) =
            (event, metronome, beeper)
        {
            let frequency = if *beats_remaining == 0 { TARGET_HZ } else { CLICK_HZ };
            beeper.play(&SquareBeep::new(frequency));
        }
        print_event(event);
    }
}

fn print_event(event: &CueEvent) {
    match event {
        CueEvent::FirstToneHeard { mode, duration, .. } => {
            println!("[{}] cue heard, target in {:.2}s", mode_label(*mode), duration)
        }
        CueEvent::SecondToneHeard { mode, display, .. } => {
            println!("[{}] {}", mode_label(*mode), display)
        }
        CueEvent::TimedOut { mode } => println!("[{}] no response", mode_label(*mode)),
        CueEvent::ModeChanged { mode } => println!("next: {}", mode_label(*mode)),
        CueEvent::Reset => println!("reset to event timing"),
        CueEvent::LeadUpBeat { beats_remaining } => log::debug!("beat {}", beats_remaining),
        CueEvent::CueComplete { .. } => {}
    }
}

fn mode_label(mode: CueMode) -> &'static str {
    match mode {
        CueMode::Event => "event",
        CueMode::Item => "item",
    }
}
