mod app;
mod ui;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::{App, InputMode};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use poi_map::boundary::{BoundaryStatus, FileBoundaryFetcher};
use poi_map::config::Config;
use poi_map::coordinator::FilterCoordinator;
use poi_map::data;
use poi_map::locate::{FixedLocation, LocationProvider, NoLocation};
use poi_map::logging::setup_logging;
use poi_map::map::MapSurface;
use poi_map::points::PointStore;
use poi_map::surface::RecordingSurface;
use ratatui::DefaultTerminal;
use tracing::{info, warn};

/// Longest a headless query waits for its boundary file
const QUERY_BOUNDARY_WAIT: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    let config = Config::parse();
    let _log_guard = setup_logging(&config.log_dir, config.query.is_some())?;

    let store = Arc::new(data::load_dataset(config.dataset.as_deref()).context("loading dataset")?);
    info!(points = store.len(), "starting");

    if let Some(ref query) = config.query {
        return run_query(&config, store, query);
    }

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &config, store);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Apply a search without a terminal and print what it produced
fn run_query(config: &Config, store: Arc<PointStore>, query: &str) -> Result<()> {
    let mut coordinator = FilterCoordinator::new(
        store,
        RecordingSurface::unrecorded(),
        FileBoundaryFetcher::new(&config.boundaries),
    );
    if let Some(ref city) = config.city {
        coordinator.select_city(Some(city.as_str()));
    }
    coordinator.set_search(query);

    let deadline = Instant::now() + QUERY_BOUNDARY_WAIT;
    while coordinator.boundary().status == BoundaryStatus::Loading && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
        coordinator.tick(Instant::now());
    }

    println!("filter: {}", coordinator.filter());
    for point in coordinator.active_points() {
        println!("  {:<16} {:<18} {}", point.city, point.region, point.category);
    }
    let boundary = coordinator.boundary();
    match boundary.error {
        Some(ref err) => println!("boundary: {:?} ({err})", boundary.status),
        None => println!("boundary: {:?}", boundary.status),
    }
    println!("camera: {:?}", *coordinator.feed().camera().borrow());
    Ok(())
}

fn run(terminal: &mut DefaultTerminal, config: &Config, store: Arc<PointStore>) -> Result<()> {
    let mut surface = MapSurface::new();
    if let Some(ref path) = config.basemap {
        match data::load_basemap(&mut surface, path) {
            Ok(lines) => info!(lines, path = %path.display(), "basemap loaded"),
            Err(err) => warn!(error = %err, "basemap unavailable"),
        }
    }
    if !surface.has_basemap() {
        data::generate_simple_outline(&mut surface);
    }

    let locator: Box<dyn LocationProvider> = match config.locate_at {
        Some(position) => Box::new(FixedLocation::new(position)),
        None => Box::new(NoLocation),
    };

    let mut coordinator =
        FilterCoordinator::new(store, surface, FileBoundaryFetcher::new(&config.boundaries));
    if let Some(ref city) = config.city {
        coordinator.select_city(Some(city.as_str()));
    }

    let size = terminal.size()?;
    let mut app = App::new(coordinator, locator, size.width, size.height);

    // Main loop
    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match app.mode {
                    InputMode::Search => handle_search_key(&mut app, key),
                    InputMode::Normal => handle_key(&mut app, key),
                },
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width, height),
                _ => {}
            }
        }

        app.tick(Instant::now());

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_search(),
        KeyCode::Esc => app.end_search(),
        KeyCode::Backspace => app.search_pop(Instant::now()),
        KeyCode::Char(c) => app.search_push(c, Instant::now()),
        _ => {}
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        // Filters
        KeyCode::Char('/') => app.begin_search(),
        KeyCode::Char('[') => app.cycle_city(false),
        KeyCode::Char(']') => app.cycle_city(true),
        KeyCode::Char(c @ '1'..='9') => app.toggle_category(c as usize - '1' as usize),
        KeyCode::Char('x') => app.clear(),
        KeyCode::Char('g') => app.locate(),

        // List
        KeyCode::Up => app.move_cursor(false),
        KeyCode::Down => app.move_cursor(true),
        KeyCode::Enter => app.activate_cursor(),

        // Pan with hjkl or left/right arrows
        KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
        KeyCode::Char('k') => app.pan(0, -6),
        KeyCode::Char('j') => app.pan(0, 6),

        // Zoom
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

        // Layer toggles
        KeyCode::Char('L') => app.coordinator.surface_mut().toggle_labels(),
        KeyCode::Char('b') | KeyCode::Char('B') => app.coordinator.surface_mut().toggle_basemap(),
        KeyCode::Char('o') => app.coordinator.surface_mut().toggle_boundary(),

        _ => {}
    }
}

/// Handle mouse events for hover, selection, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Moved => app.mouse_moved(mouse.column, mouse.row),
        MouseEventKind::ScrollUp => app.zoom_at(mouse.column, mouse.row, true),
        MouseEventKind::ScrollDown => app.zoom_at(mouse.column, mouse.row, false),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => app.mouse_down(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.mouse_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.mouse_up(mouse.column, mouse.row),
        _ => {}
    }
}
