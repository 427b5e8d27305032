use std::{
    env, io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use netmon::{
    source::ProcNetDev,
    stats::{merge_snapshots, InterfaceStats, StatsEngine},
    ui::{self, MetricView},
};

const TICK: Duration = Duration::from_secs(1);

/// Everything the sampler thread and the event loop share. One mutex guards
/// the engine and the published snapshots together, so a reset can never
/// interleave with a tick in flight.
struct Monitor {
    engine: StatsEngine<ProcNetDev>,
    snapshots: Vec<InterfaceStats>,
}

fn main() -> Result<()> {
    env_logger::init();

    let interfaces: Vec<String> = env::args().skip(1).collect();
    if interfaces.is_empty() {
        let name = env::args().next().unwrap_or_else(|| "netmon".to_string());
        eprintln!("Usage: {name} [interface names]...");
        std::process::exit(2);
    }

    let mut engine = StatsEngine::new(ProcNetDev::new());
    // Anchor baselines before the first tick so the first drawn deltas are
    // zeros rather than the absolute totals.
    let snapshots = engine.sample_all(&interfaces);
    let monitor = Arc::new(Mutex::new(Monitor { engine, snapshots }));

    let running = Arc::new(AtomicBool::new(true));
    let sampler = spawn_sampler(Arc::clone(&monitor), Arc::clone(&running), interfaces);

    enable_raw_mode()?;
    let result = run_tui(&monitor);

    // Teardown runs on success and error alike, so a failure inside the TUI
    // never strands the terminal in raw mode or the alternate screen.
    running.store(false, Ordering::Relaxed);
    let _ = sampler.join();
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    result
}

fn run_tui(monitor: &Arc<Mutex<Monitor>>) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    run_event_loop(&mut terminal, monitor)
}

/// Background tick loop: the single writer of tracker and series state.
fn spawn_sampler(
    monitor: Arc<Mutex<Monitor>>,
    running: Arc<AtomicBool>,
    interfaces: Vec<String>,
) -> thread::JoinHandle<()> {
    // Sleeping the tick in short slices keeps shutdown prompt; the quit path
    // joins this thread before restoring the terminal.
    const SLICE: Duration = Duration::from_millis(50);
    thread::spawn(move || loop {
        let mut slept = Duration::ZERO;
        while slept < TICK {
            if !running.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep(SLICE);
            slept += SLICE;
        }
        let mut mon = monitor.lock().unwrap();
        let fresh = mon.engine.sample_all(&interfaces);
        // An interface that failed to read this tick keeps its previously
        // published snapshot, so its table and graph stay on screen.
        let merged = merge_snapshots(&interfaces, &mon.snapshots, fresh);
        mon.snapshots = merged;
    })
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    monitor: &Arc<Mutex<Monitor>>,
) -> Result<()> {
    let mut view = MetricView::Packets;
    loop {
        let snapshots: Vec<InterfaceStats> = monitor.lock().unwrap().snapshots.clone();
        terminal.draw(|f| ui::draw(f, &snapshots, view))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Char('Q') => break,
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    log::info!("clearing baselines and history");
                    monitor.lock().unwrap().engine.reset();
                }
                KeyCode::Char('p') | KeyCode::Char('P') => view = MetricView::Packets,
                KeyCode::Char('b') | KeyCode::Char('B') => view = MetricView::Bytes,
                KeyCode::Char('e') | KeyCode::Char('E') => view = MetricView::Errors,
                KeyCode::Char('d') | KeyCode::Char('D') => view = MetricView::Dropped,
                _ => {}
            }
        }
    }
    Ok(())
}
