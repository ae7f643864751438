use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use flightdeck::{
    apply_args, run_headless, start_page, App, AppConfig, AppEvent, Args, CacheManager, Catalog,
    ConfigManager, Dashboard, Theme, APP_NAME,
};
use ratatui::DefaultTerminal;
use std::fs::OpenOptions;
use std::sync::mpsc::channel;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(mut terminal: DefaultTerminal, dashboard: Dashboard, args: &Args, config: &AppConfig) -> Result<()> {
    let theme = Theme::from_config(&config.theme)?;
    let poll_interval = Duration::from_millis(config.display.event_poll_interval_ms);
    let (tx, rx) = channel::<AppEvent>();
    let mut app = App::new(tx.clone(), dashboard, start_page(args), config, theme);
    if args.debug {
        app.enable_debug();
    }
    render(&mut terminal, &mut app)?;

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Crash(msg) => {
                        return Err(eyre!(msg));
                    }
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
    Ok(())
}

/// Log to a file in the cache directory; the terminal belongs to the UI.
fn init_tracing(level: &str) -> Result<()> {
    let cache = CacheManager::new(APP_NAME)?;
    cache.ensure_cache_dir()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(cache.log_path())?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{APP_NAME}={level}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| eyre!("Could not initialize logging: {e}"))
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        match manager.write_default_config(args.force) {
            Ok(path) => {
                println!("Wrote default configuration to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error generating config: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();
    color_eyre::install()?;

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let mut config = AppConfig::load(APP_NAME)?;
    apply_args(&mut config, &args);
    config.validate()?;

    if let Err(e) = init_tracing(&config.debug.log_level) {
        eprintln!("Warning: {e}");
    }

    let catalog = Catalog::load(&config.data)?;
    let mut dashboard = Dashboard::new(catalog, &config.data, config.charts.clone());

    if args.is_headless() {
        return run_headless(&args, &mut dashboard, &config);
    }

    dashboard.apply_filter_args(start_page(&args), &args.filters)?;

    let terminal = ratatui::init();
    let result = run(terminal, dashboard, &args, &config);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
