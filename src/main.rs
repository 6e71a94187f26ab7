#![forbid(unsafe_code)]

mod canvas;
mod config;
mod constants;
mod font;
mod geometry;
mod image;
mod layout;
mod panel;
mod render;
mod theme;
mod widget;
mod window;
mod x11_utils;

#[cfg(test)]
mod test_support;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::{settings, ConfigSource, Settings};
use constants::timing::TICK_INTERVAL;
use image::PngLoader;
use panel::{Panel, PanelEnv, PanelError};
use widget::WidgetRegistry;
use window::WindowSystem;
use x11_utils::X11Connection;

/// A lightweight themable desktop panel
#[derive(Debug, Parser)]
#[command(name = "edgepanel", version, about)]
struct Args {
    /// Settings file (defaults to $XDG_CONFIG_HOME/edgepanel/edgepanelrc)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Theme name, overriding the settings file
    #[arg(long)]
    theme: Option<String>,

    /// Load the theme from this directory instead of searching for it
    #[arg(long, value_name = "DIR")]
    theme_dir: Option<PathBuf>,

    /// Monitor to place the panel on, overriding the settings file
    #[arg(long)]
    monitor: Option<usize>,

    /// Print installed themes and exit
    #[arg(long)]
    list_themes: bool,

    /// trace, debug, info, warn or error (defaults to $LOG_LEVEL, then info)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn settings_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Settings::default_path)
    }

    /// Settings file plus command line overrides.
    fn load_settings(&self) -> Result<Settings> {
        let path = self.settings_path();
        let mut settings = Settings::load(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(theme) = &self.theme {
            settings.theme = theme.clone();
        }
        if let Some(monitor) = self.monitor {
            settings.monitor = monitor;
        }
        Ok(settings)
    }

    fn load_theme(&self, settings: &Settings) -> Result<ConfigSource> {
        let path = settings::find_theme_file(self.theme_dir.as_deref(), &settings.theme)
            .ok_or_else(|| anyhow!("Theme '{}' not found", settings.theme))?;
        info!(theme = %settings.theme, path = %path.display(), "Loading theme");
        ConfigSource::load(&path)
            .with_context(|| format!("Failed to load theme from {}", path.display()))
    }
}

fn log_level(flag: Option<&str>) -> TraceLevel {
    let level = flag
        .map(str::to_string)
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase();
    match level.as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

struct Signals {
    reload: Arc<AtomicBool>,
    quit: Arc<AtomicBool>,
}

impl Signals {
    fn new() -> Self {
        Self {
            reload: Arc::new(AtomicBool::new(false)),
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    fn register() -> Result<Self> {
        let signals = Self::new();
        signal_hook::flag::register(SIGUSR1, Arc::clone(&signals.reload))
            .context("Failed to install SIGUSR1 handler")?;
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&signals.quit))
                .context("Failed to install termination handler")?;
        }
        Ok(signals)
    }
}

/// Re-read settings and theme from disk and apply them.
fn reload<W: WindowSystem>(
    args: &Args,
    panel: &mut Panel<W>,
    current_theme: &mut ConfigSource,
) -> Result<()> {
    let settings = args.load_settings()?;
    let source = args.load_theme(&settings)?;
    apply_reload(panel, current_theme, source, settings)
}

/// An unchanged theme with the same alternatives preference only
/// reconfigures the widgets (moving the panel if `monitor` changed); anything
/// else runs the full retheme.
fn apply_reload<W: WindowSystem>(
    panel: &mut Panel<W>,
    current_theme: &mut ConfigSource,
    source: ConfigSource,
    settings: Settings,
) -> Result<()> {
    let same_theme = source.path() == current_theme.path() && source.text() == current_theme.text();
    let same_widgets = settings.preferred_alternatives == panel.settings().preferred_alternatives;
    if same_theme && same_widgets {
        info!("Theme unchanged, reconfiguring widgets");
        return panel.reconfigure_widgets(settings);
    }

    let tree = source.parse().context("Failed to parse theme")?;
    let monitor = settings.monitor;
    panel.reconfigure(&tree, settings, monitor)?;
    *current_theme = source;
    Ok(())
}

/// Layout and widget-count violations can't be run with; everything else a
/// reload hits leaves the panel usable.
fn is_fatal(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<PanelError>(),
        Some(PanelError::Layout(_) | PanelError::TooManyWidgets { .. })
    )
}

fn run(args: &Args) -> Result<()> {
    let settings = args.load_settings()?;
    let mut theme_source = args.load_theme(&settings)?;
    let signals = Signals::register()?;

    let ws = X11Connection::connect()?;
    let registry = WidgetRegistry::builtin();
    info!(widgets = ?registry.names().collect::<Vec<_>>(), "Registered widget capabilities");
    let env = PanelEnv {
        registry,
        images: Box::new(PngLoader),
    };
    let monitor = settings.monitor;
    let mut panel = {
        let tree = theme_source.parse().context("Failed to parse theme")?;
        Panel::init(ws, env, &tree, settings, monitor)?
    };
    info!(widgets = panel.widgets().len(), "Panel running");

    serve(&mut panel, &signals, |panel| reload(args, panel, &mut theme_source))?;

    info!("Shutting down");
    panel.free()?;
    Ok(())
}

/// Event loop until a quit signal: drain everything the connection already
/// holds, tick on schedule, and only then block until the next deadline.
fn serve<W: WindowSystem>(
    panel: &mut Panel<W>,
    signals: &Signals,
    mut reload: impl FnMut(&mut Panel<W>) -> Result<()>,
) -> Result<()> {
    let mut next_tick = Instant::now() + TICK_INTERVAL;
    while !signals.quit.load(Ordering::Relaxed) {
        if signals.reload.swap(false, Ordering::Relaxed) {
            info!("Reload requested");
            if let Err(e) = reload(panel) {
                if is_fatal(&e) {
                    return Err(e);
                }
                warn!(error = ?e, "Reload failed, keeping the previous configuration");
            }
        }

        panel.process_events()?;
        let now = Instant::now();
        if now >= next_tick {
            panel.tick()?;
            next_tick = now + TICK_INTERVAL;
            continue;
        }
        panel.ws_mut().wait_readable(next_tick - now)?;
    }
    Ok(())
}

fn print_themes() {
    let themes = settings::list_themes();
    if themes.is_empty() {
        println!("No themes installed");
    }
    for theme in themes {
        println!("{theme}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(args.log_level.as_deref()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.list_themes {
        print_themes();
        return Ok(());
    }

    if let Err(e) = run(&args) {
        error!(error = ?e, "edgepanel stopped");
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Monitor, Screen};
    use crate::layout::LayoutError;
    use crate::test_support::{
        count, take_journal, test_registry, FakeImageLoader, FakeWindowSystem, Lifecycle,
    };
    use crate::widget::Widget;
    use crate::window::{PanelEvent, PointerEvent};
    use std::path::Path;

    fn theme(widgets: &str) -> ConfigSource {
        ConfigSource::from_text(
            format!("panel {{ background = bg.png\n separator = sep.png }}\n{widgets}"),
            "/themes/test",
        )
    }

    fn panel(source: &ConfigSource, ws: FakeWindowSystem) -> Panel<FakeWindowSystem> {
        let env = PanelEnv {
            registry: test_registry(),
            images: Box::new(FakeImageLoader),
        };
        let tree = source.parse().unwrap();
        Panel::init(ws, env, &tree, Settings::default(), 0).unwrap()
    }

    fn names(panel: &Panel<FakeWindowSystem>) -> Vec<&'static str> {
        panel.widgets().iter().map(Widget::name).collect()
    }

    #[test]
    fn test_log_level_flag_wins() {
        assert_eq!(log_level(Some("debug")), TraceLevel::DEBUG);
        assert_eq!(log_level(Some("WARN")), TraceLevel::WARN);
        assert_eq!(log_level(Some("chatty")), TraceLevel::INFO);
    }

    #[test]
    fn test_only_layout_errors_are_fatal_on_reload() {
        assert!(is_fatal(&PanelError::Layout(LayoutError::NoFillWidget).into()));
        assert!(is_fatal(&PanelError::TooManyWidgets { limit: 20 }.into()));
        assert!(!is_fatal(&anyhow!("theme file vanished")));
        let theme = crate::theme::ThemeError::MissingPanelSection;
        assert!(!is_fatal(&PanelError::Theme(theme).into()));
    }

    #[test]
    fn test_cli_overrides_settings() {
        let args = Args::parse_from([
            "edgepanel",
            "--config",
            "/nonexistent/edgepanelrc",
            "--theme",
            "slim",
            "--monitor",
            "1",
        ]);
        let settings = args.load_settings().unwrap();
        assert_eq!(settings.theme, "slim");
        assert_eq!(settings.monitor, 1);
        assert_eq!(args.settings_path(), Path::new("/nonexistent/edgepanelrc"));
    }

    #[test]
    fn test_explicit_theme_dir_missing_file_is_an_error() {
        let args = Args::parse_from(["edgepanel", "--theme-dir", "/nonexistent/theme"]);
        let settings = Settings::default();
        assert!(args.load_theme(&settings).is_err());
    }

    #[test]
    fn test_reload_with_same_theme_only_reconfigures_widgets() {
        let mut current = theme("box\nfill");
        let mut panel = panel(&current, FakeWindowSystem::single());
        take_journal();

        apply_reload(&mut panel, &mut current, theme("box\nfill"), Settings::default()).unwrap();

        let journal = take_journal();
        assert_eq!(count(&journal, |e| matches!(e, Lifecycle::Reconfigured(_))), 2);
        assert_eq!(count(&journal, |e| matches!(e, Lifecycle::Rethemed(_))), 0);
    }

    #[test]
    fn test_reload_with_new_alternatives_preference_reinstantiates() {
        let mut current = theme("box { alternative = g }\nstatic { alternative = g }\nfill");
        let mut panel = panel(&current, FakeWindowSystem::single());
        assert_eq!(names(&panel), vec!["box", "fill"]);

        let mut settings = Settings::default();
        settings.preferred_alternatives = vec!["static".to_string()];
        let same = current.clone();
        apply_reload(&mut panel, &mut current, same, settings).unwrap();

        assert_eq!(names(&panel), vec!["static", "fill"]);
        assert_eq!(panel.settings().preferred_alternatives, vec!["static"]);
    }

    #[test]
    fn test_reload_with_new_monitor_moves_panel() {
        let screen = Screen::new(
            2000,
            800,
            vec![Monitor::new(0, 0, 1000, 800), Monitor::new(1000, 0, 1000, 800)],
        );
        let mut current = theme("box\nfill");
        let mut panel = panel(&current, FakeWindowSystem::new(screen));
        assert_eq!(panel.placement().x, 0);

        let mut settings = Settings::default();
        settings.monitor = 1;
        let same = current.clone();
        apply_reload(&mut panel, &mut current, same, settings).unwrap();

        assert_eq!(panel.placement().monitor, 1);
        assert_eq!(panel.placement().x, 1000);
        assert_eq!(panel.ws().updated.last().map(|p| p.x), Some(1000));
    }

    #[test]
    fn test_loop_drains_queued_events_before_blocking() {
        let mut panel = panel(&theme("fill"), FakeWindowSystem::single());
        let signals = Signals::new();
        panel.ws_mut().quit_on_wait = Some(Arc::clone(&signals.quit));
        let window = panel.window();
        for _ in 0..2 {
            panel.ws_mut().events.push_back(PanelEvent::Pointer {
                window,
                event: PointerEvent::Release { button: 3, x: 1, y: 1 },
            });
        }

        serve(&mut panel, &signals, |_| Ok(())).unwrap();

        assert_eq!(panel.ws().waits, vec![0]);
        assert_eq!(panel.ws().showing_desktop, vec![true, false]);
    }

    #[test]
    fn test_loop_survives_recoverable_reload_errors() {
        let mut panel = panel(&theme("fill"), FakeWindowSystem::single());
        let signals = Signals::new();
        panel.ws_mut().quit_on_wait = Some(Arc::clone(&signals.quit));
        signals.reload.store(true, Ordering::Relaxed);

        let mut reloads = 0;
        serve(&mut panel, &signals, |_| {
            reloads += 1;
            Err(anyhow!("theme file vanished"))
        })
        .unwrap();
        assert_eq!(reloads, 1);

        signals.quit.store(false, Ordering::Relaxed);
        signals.reload.store(true, Ordering::Relaxed);
        let fatal = serve(&mut panel, &signals, |_| {
            Err(PanelError::Layout(LayoutError::NoFillWidget).into())
        });
        assert!(fatal.is_err());
    }
}
