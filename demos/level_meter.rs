//! Live level meter for a running CamillaDSP engine
//!
//! ```text
//! cargo run --example level_meter -- 127.0.0.1 1234
//! ```
//!
//! Keys: `+`/`-` change the volume, `m` toggles mute, `q` or `Esc` quits.

use camilladsp_client::{CamillaClient, Decibels, ProcessingState};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::process::ExitCode;
use std::time::Duration;

/// Lowest level the meters show
const FLOOR_DB: Decibels = -60.0;

#[derive(Parser)]
struct Args {
    /// Host running CamillaDSP
    host: String,
    /// Websocket port CamillaDSP was started with (-p)
    port: u16,
}

struct App {
    client: CamillaClient,
    state: Option<ProcessingState>,
    volume: Decibels,
    mute: bool,
    capture: Vec<Decibels>,
    playback: Vec<Decibels>,
    status_message: String,
}

impl App {
    fn new(client: CamillaClient) -> Self {
        let status_message = match client.version() {
            Some(version) => format!("Connected to CamillaDSP {}", version),
            None => "Connected".to_string(),
        };
        Self {
            client,
            state: None,
            volume: 0.0,
            mute: false,
            capture: Vec::new(),
            playback: Vec::new(),
            status_message,
        }
    }

    async fn refresh(&mut self) -> camilladsp_client::Result<()> {
        self.state = Some(self.client.get_state().await?);
        self.volume = self.client.get_volume().await?;
        self.mute = self.client.get_mute().await?;
        self.capture = self.client.get_capture_signal_rms().await?;
        self.playback = self.client.get_playback_signal_rms().await?;
        Ok(())
    }

    async fn adjust_volume(&mut self, delta: Decibels) -> camilladsp_client::Result<()> {
        let volume = (self.volume + delta).min(0.0);
        self.client.set_volume(volume).await?;
        self.status_message = format!("Volume set to {:.1} dB", volume);
        Ok(())
    }

    async fn toggle_mute(&mut self) -> camilladsp_client::Result<()> {
        self.client.set_mute(!self.mute).await?;
        self.status_message = if self.mute { "Unmuted" } else { "Muted" }.to_string();
        Ok(())
    }
}

fn ui(f: &mut Frame, app: &App) {
    let meters = app.capture.len() + app.playback.len();
    let mut constraints = vec![Constraint::Length(3)];
    constraints.extend(std::iter::repeat(Constraint::Length(3)).take(meters));
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(3));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(f.size());

    render_header(f, app, chunks[0]);

    let labelled = app
        .capture
        .iter()
        .enumerate()
        .map(|(i, level)| (format!("Capture {}", i + 1), *level, Color::Green))
        .chain(
            app.playback
                .iter()
                .enumerate()
                .map(|(i, level)| (format!("Playback {}", i + 1), *level, Color::Cyan)),
        );
    for ((title, level, color), area) in labelled.zip(chunks[1..].iter()) {
        render_meter(f, &title, level, color, *area);
    }

    render_status(f, app, chunks[chunks.len() - 1]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let state = app
        .state
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mute = if app.mute { "  [MUTED]" } else { "" };
    let text = format!("State: {}  Volume: {:.1} dB{}", state, app.volume, mute);

    let block = Block::default()
        .title("CamillaDSP")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn render_meter(f: &mut Frame, title: &str, level: Decibels, color: Color, area: Rect) {
    let ratio = ((level - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0) as f64;
    let gauge = Gauge::default()
        .block(Block::default().title(title.to_string()).borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(format!("{:.1} dB", level));

    f.render_widget(gauge, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title("Status (+/- volume, m mute, q quit)")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    f.render_widget(Paragraph::new(app.status_message.clone()).block(block), area);
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut client = CamillaClient::new();
    if let Err(e) = client.connect(&args.host, args.port).await {
        eprintln!("Error: {}", e);
        println!("Usage: start CamillaDSP with the websocket server enabled:");
        println!("\t> camilladsp -p1234 yourconfig.yml");
        println!("Then start the meter");
        println!("\t> level_meter 127.0.0.1 1234");
        return ExitCode::FAILURE;
    }

    match run(App::new(client)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(mut app: App) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    app.client.disconnect().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.refresh().await?;

        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            app.adjust_volume(1.0).await?;
                        }
                        KeyCode::Char('-') | KeyCode::Char('_') => {
                            app.adjust_volume(-1.0).await?;
                        }
                        KeyCode::Char('m') => {
                            app.toggle_mute().await?;
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
