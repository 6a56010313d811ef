//! Route planner TUI - interactive planning session in the terminal
//!
//! Displays:
//! - Origin and destination inputs (Tab cycles focus, Enter analyzes)
//! - Route alternatives with duration, cost and traffic (Up/Down or 1-3 to select)
//! - Error indicator, only while the session is in error
//! - World map canvas with endpoint markers and route polylines, fit to the routes

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::Mutex;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Context, Line as CanvasLine, Map, MapResolution, Points},
        Block, Borders, List, ListItem, Paragraph, Wrap,
    },
    Frame, Terminal,
};
use route_planner::domain::{Coordinate, Endpoint, RouteCatalog};
use route_planner::infra::{logging, Config, Metrics};
use route_planner::io::{CachingGeocoder, Geocoder, MapScene, MapSurface, NominatimGeocoder};
use route_planner::services::{
    FitCommand, Planner, PlannerCommand, PlanningSession, SessionStatus,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Margin around fitted routes, as a fraction of the span
const FIT_MARGIN_FRACTION: f64 = 0.15;
/// Smallest margin so a single point still gets a visible neighbourhood
const FIT_MIN_MARGIN_DEG: f64 = 0.5;
/// Samples per degree along dashed polylines
const DASH_SAMPLES_PER_DEG: f64 = 12.0;

/// Route planner TUI
#[derive(Parser, Debug)]
#[command(name = "route-planner-tui", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Log file (the terminal is owned by the UI)
    #[arg(long, default_value = "route-planner-tui.log")]
    log_file: String,
}

/// Latest scene and fit handed over by the planner
#[derive(Debug, Default, Clone)]
struct MapView {
    scene: Option<MapScene>,
    fit: Option<FitCommand>,
}

/// Map surface backed by shared state the draw loop reads
struct TuiSurface(Arc<Mutex<MapView>>);

impl MapSurface for TuiSurface {
    fn render(&mut self, scene: &MapScene) {
        let mut view = self.0.lock();
        // a scene without routes means the previous fit no longer applies
        if scene.polylines.is_empty() {
            view.fit = None;
        }
        view.scene = Some(scene.clone());
    }

    fn fit_viewport(&mut self, cmd: &FitCommand) {
        self.0.lock().fit = Some(*cmd);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Origin,
    Destination,
    Routes,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Origin => Focus::Destination,
            Focus::Destination => Focus::Routes,
            Focus::Routes => Focus::Origin,
        }
    }

    fn endpoint(self) -> Option<Endpoint> {
        match self {
            Focus::Origin => Some(Endpoint::Origin),
            Focus::Destination => Some(Endpoint::Destination),
            Focus::Routes => None,
        }
    }
}

struct App {
    focus: Focus,
    origin: String,
    destination: String,
    catalog: RouteCatalog,
    initial_center: Coordinate,
    initial_zoom: u8,
    snapshot_rx: watch::Receiver<PlanningSession>,
    map: Arc<Mutex<MapView>>,
    cmd_tx: mpsc::Sender<PlannerCommand>,
}

impl App {
    fn send(&self, cmd: PlannerCommand) {
        if let Err(e) = self.cmd_tx.try_send(cmd) {
            warn!(error = %e, "planner_command_dropped");
        }
    }

    fn input_mut(&mut self, endpoint: Endpoint) -> &mut String {
        match endpoint {
            Endpoint::Origin => &mut self.origin,
            Endpoint::Destination => &mut self.destination,
        }
    }

    fn edit(&mut self, endpoint: Endpoint, key: KeyCode) {
        let input = self.input_mut(endpoint);
        match key {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            _ => return,
        }
        let text = input.clone();
        self.send(PlannerCommand::SetQuery(endpoint, text));
    }

    fn step_selection(&self, forward: bool) {
        let session = self.snapshot_rx.borrow();
        let count = session.geometries.len();
        let Some(current) = session.selected_route else { return };
        if count == 0 {
            return;
        }
        let next = if forward { (current + 1) % count } else { (current + count - 1) % count };
        drop(session);
        self.send(PlannerCommand::SelectRoute(next));
    }

    /// Returns false when the UI should exit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return false,
                KeyCode::Char('r') => {
                    self.origin.clear();
                    self.destination.clear();
                    self.focus = Focus::Origin;
                    self.send(PlannerCommand::Reset);
                }
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Enter => self.send(PlannerCommand::Analyze),
            KeyCode::Up => self.step_selection(false),
            KeyCode::Down => self.step_selection(true),
            code => match self.focus.endpoint() {
                Some(endpoint) => self.edit(endpoint, code),
                None => match code {
                    KeyCode::Char('q') => return false,
                    KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                        let index = c as usize - '1' as usize;
                        self.send(PlannerCommand::SelectRoute(index));
                    }
                    _ => {}
                },
            },
        }
        true
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init_file(&args.log_file)?;

    let config = Config::load(args.config.as_deref());
    config.validate()?;
    info!(
        config_file = %config.config_file(),
        geocoder = %config.geocoder_base_url(),
        "tui_starting"
    );

    let nominatim = NominatimGeocoder::new(&config)?;
    let geocoder: Arc<dyn Geocoder> = if config.geocoder_cache_enabled() {
        Arc::new(CachingGeocoder::new(nominatim))
    } else {
        Arc::new(nominatim)
    };

    let map = Arc::new(Mutex::new(MapView::default()));
    let metrics = Arc::new(Metrics::new());
    let mut planner =
        Planner::new(&config, geocoder, TuiSurface(map.clone()), metrics.clone())?;

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut app = App {
        focus: Focus::Origin,
        origin: String::new(),
        destination: String::new(),
        catalog: planner.catalog().clone(),
        initial_center: config.initial_center(),
        initial_zoom: config.initial_zoom(),
        snapshot_rx: planner.subscribe(),
        map,
        cmd_tx,
    };

    let planner_handle = tokio::spawn(async move {
        planner.run(cmd_rx, shutdown_rx).await;
    });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(&mut terminal, &mut app);

    let _ = shutdown_tx.send(true);
    let _ = planner_handle.await;
    metrics.report().log();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick_rate = Duration::from_millis(100);

    loop {
        let session = app.snapshot_rx.borrow().clone();
        let view = app.map.lock().clone();
        terminal.draw(|f| draw_ui(f, app, &session, &view))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !app.handle_key(key) {
                    return Ok(());
                }
            }
        }
    }
}

fn draw_ui(f: &mut Frame, app: &App, session: &PlanningSession, view: &MapView) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    draw_header(f, main_chunks[0], session);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(main_chunks[1]);

    let error_height = if session.status == SessionStatus::Error { 5 } else { 0 };
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(error_height),
        ])
        .split(body[0]);

    draw_input(f, left[0], "Origin", &app.origin, app.focus == Focus::Origin);
    draw_input(f, left[1], "Destination", &app.destination, app.focus == Focus::Destination);
    draw_routes(f, left[2], app, session);
    if session.status == SessionStatus::Error {
        draw_error(f, left[3], session);
    }

    draw_map(f, body[1], app, view);

    let help = Paragraph::new(Line::from(vec![Span::styled(
        " Tab focus | Enter analyze | Up/Down select | 1-3 select (routes) | Ctrl-R reset | q/Esc quit",
        Style::default().fg(Color::DarkGray),
    )]));
    f.render_widget(help, main_chunks[2]);
}

fn draw_header(f: &mut Frame, area: Rect, session: &PlanningSession) {
    let (status_text, status_color) = match session.status {
        SessionStatus::Idle => ("IDLE", Color::DarkGray),
        SessionStatus::Resolving => ("RESOLVING", Color::Yellow),
        SessionStatus::Ready => ("READY", Color::Green),
        SessionStatus::Error => ("ERROR", Color::Red),
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Route Planner ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(format!(" | Analysis #{}", session.generation)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn draw_input(f: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    let cursor = if focused { "_" } else { "" };
    let input = Paragraph::new(Line::from(vec![Span::raw(value.to_string()), Span::raw(cursor)]))
        .block(
            Block::default()
                .title(format!(" {} ", title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
    f.render_widget(input, area);
}

fn draw_routes(f: &mut Frame, area: Rect, app: &App, session: &PlanningSession) {
    let border = if app.focus == Focus::Routes { Color::Cyan } else { Color::Blue };
    let block = Block::default()
        .title(" Routes ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    if session.status != SessionStatus::Ready {
        let hint = match session.status {
            SessionStatus::Resolving => "Finding places...",
            _ => "Enter two places and press Enter",
        };
        let p = Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray)))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = app
        .catalog
        .iter()
        .take(session.geometries.len())
        .map(|(index, d)| {
            let selected = session.selected_route == Some(index);
            let pointer = if selected { "▶" } else { " " };
            let label_style = if selected {
                Style::default().fg(hex_color(d.tier.color())).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(hex_color(d.tier.color()))
            };
            let traffic_color = match d.traffic.as_str() {
                "High" => Color::Red,
                "Mod" => Color::Yellow,
                _ => Color::Green,
            };

            ListItem::new(Line::from(vec![
                Span::raw(format!("{} {} ", pointer, index + 1)),
                Span::styled(format!("{:<10}", d.label), label_style),
                Span::raw(format!("{:>8} ", d.duration_label())),
                Span::raw(format!("{:>6} ", app.catalog.cost_label(d))),
                Span::styled(d.traffic.as_str(), Style::default().fg(traffic_color)),
            ]))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn draw_error(f: &mut Frame, area: Rect, session: &PlanningSession) {
    let message = session.error_message.clone().unwrap_or_default();
    let p = Paragraph::new(Span::styled(message, Style::default().fg(Color::Red)))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" Error ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(p, area);
}

/// Canvas bounds as ([lon_min, lon_max], [lat_min, lat_max])
fn map_bounds(app: &App, view: &MapView) -> ([f64; 2], [f64; 2]) {
    if let Some(fit) = view.fit {
        let region = fit.region.expanded(FIT_MARGIN_FRACTION, FIT_MIN_MARGIN_DEG);
        return (
            [region.south_west.lon(), region.north_east.lon()],
            [region.south_west.lat(), region.north_east.lat()],
        );
    }

    let lon_span = 360.0 / f64::from(1u32 << app.initial_zoom.min(18));
    let lat_span = lon_span / 2.0;
    let c = app.initial_center;
    (
        [(c.lon() - lon_span / 2.0).max(-180.0), (c.lon() + lon_span / 2.0).min(180.0)],
        [(c.lat() - lat_span / 2.0).max(-90.0), (c.lat() + lat_span / 2.0).min(90.0)],
    )
}

fn draw_map(f: &mut Frame, area: Rect, app: &App, view: &MapView) {
    let (x_bounds, y_bounds) = map_bounds(app, view);
    let attribution = view.scene.as_ref().map(|s| s.attribution.clone()).unwrap_or_default();

    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(" Map ")
                .title_bottom(Line::from(attribution).right_aligned())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .marker(symbols::Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            ctx.draw(&Map { color: Color::DarkGray, resolution: MapResolution::High });
            ctx.layer();

            let Some(scene) = view.scene.as_ref() else { return };

            // selected route last so it sits on top
            for polyline in scene.polylines.iter().filter(|p| !p.selected) {
                draw_polyline(ctx, &polyline.points, hex_color(polyline.style.color), true);
            }
            for polyline in scene.polylines.iter().filter(|p| p.selected) {
                draw_polyline(ctx, &polyline.points, hex_color(polyline.style.color), false);
            }

            ctx.layer();
            for marker in &scene.markers {
                let label = marker.label.clone().unwrap_or_default();
                ctx.print(
                    marker.position.lon(),
                    marker.position.lat(),
                    Line::from(vec![
                        Span::styled("●", Style::default().fg(Color::White)),
                        Span::raw(format!(" {}", label)),
                    ]),
                );
            }
        });

    f.render_widget(canvas, area);
}

fn draw_polyline(ctx: &mut Context, points: &[Coordinate], color: Color, dashed: bool) {
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if !dashed {
            ctx.draw(&CanvasLine::new(a.lon(), a.lat(), b.lon(), b.lat(), color));
            continue;
        }

        let length = (b.lon() - a.lon()).hypot(b.lat() - a.lat());
        let samples = ((length * DASH_SAMPLES_PER_DEG).ceil() as usize).max(2);
        let coords: Vec<(f64, f64)> = (0..=samples)
            .filter(|i| i % 2 == 0)
            .map(|i| {
                let t = i as f64 / samples as f64;
                (a.lon() + (b.lon() - a.lon()) * t, a.lat() + (b.lat() - a.lat()) * t)
            })
            .collect();
        ctx.draw(&Points { coords: &coords, color });
    }
}

/// "#10b981" -> Rgb; anything unparseable draws white
fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return Color::White;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::White,
    }
}
