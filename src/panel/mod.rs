//! The panel: one docked window, its theme and its widgets
//!
//! A panel is built by [`Panel::init`], rebuilt in place by
//! [`Panel::reconfigure`] when the theme changes, and torn down by
//! [`Panel::free`]. Event dispatch and the clock tick live in `dispatch`.

mod dispatch;
mod stash;

pub use stash::WidgetStash;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Alternatives, ConfigTree, Settings};
use crate::constants::panel::MAX_WIDGETS;
use crate::geometry::{place_panel, Placement};
use crate::image::ImageLoader;
use crate::layout::{layout, LayoutError, LayoutSlot, SizeType};
use crate::render::{select_render_strategy, RenderStrategy, Surface};
use crate::theme::{PanelTheme, ThemeError};
use crate::widget::{Widget, WidgetContext, WidgetRegistry};
use crate::window::{WindowId, WindowSystem};

/// Configuration problems the panel cannot run with.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("too many widgets, a panel holds at most {limit}")]
    TooManyWidgets { limit: usize },

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Process-wide collaborators the panel builds widgets with.
pub struct PanelEnv {
    pub registry: WidgetRegistry,
    pub images: Box<dyn ImageLoader>,
}

pub struct Panel<W: WindowSystem> {
    ws: W,
    env: PanelEnv,
    theme: PanelTheme,
    widgets: Vec<Widget>,
    surface: Surface,
    render: Box<dyn RenderStrategy>,
    settings: Settings,
    /// Monitor asked for; the placement records the one actually used
    monitor: usize,
    showing_desktop: bool,
    needs_expose: bool,
}

impl<W: WindowSystem> Panel<W> {
    /// Create the panel window on `monitor`, instantiate the theme's widgets
    /// and paint everything once.
    pub fn init(
        mut ws: W,
        env: PanelEnv,
        tree: &ConfigTree<'_>,
        settings: Settings,
        monitor: usize,
    ) -> Result<Self> {
        let theme = PanelTheme::load(tree, env.images.as_ref()).map_err(PanelError::from)?;
        let placement = place_panel(ws.screen(), monitor, &theme.geometry());
        let window = ws
            .create_panel_window(&placement)
            .context("Failed to create panel window")?;
        info!(
            window,
            x = placement.x,
            y = placement.y,
            width = placement.width,
            height = placement.height,
            monitor = placement.monitor,
            "Created panel window"
        );

        let render = select_render_strategy(theme.transparent);
        let mut panel = Self {
            ws,
            env,
            theme,
            widgets: Vec::new(),
            surface: Surface::new(window, placement),
            render,
            settings,
            monitor,
            showing_desktop: false,
            needs_expose: true,
        };

        if let Err(e) = panel.finish_init(tree) {
            warn!(error = %e, "Panel initialization failed, tearing down");
            if let Err(free_err) = panel.free() {
                warn!(error = %free_err, "Failed to release panel window");
            }
            return Err(e);
        }
        Ok(panel)
    }

    fn finish_init(&mut self, tree: &ConfigTree<'_>) -> Result<()> {
        self.start_render()?;
        let mut stash = WidgetStash::new();
        self.rebuild_widgets(tree, &mut stash)?;
        self.ws.map_window(self.surface.window)?;
        self.expose_panel()
    }

    fn start_render(&mut self) -> Result<()> {
        self.render.create_draw_context(&mut self.surface);
        self.render
            .create_private(&mut self.ws, &self.surface)
            .with_context(|| format!("Failed to start '{}' rendering", self.render.name()))?;
        debug!(strategy = self.render.name(), "Render strategy ready");
        Ok(())
    }

    /// Apply a new theme tree and settings.
    ///
    /// The theme, the window geometry and the render state are all prepared
    /// before any widget is touched, so a failure there leaves the running
    /// panel as it was. Afterwards every current widget is stashed; entries of
    /// the new theme reclaim stashed widgets of the same capability through
    /// retheme, and whatever is left in the stash is destroyed before the
    /// layout is redone.
    pub fn reconfigure(&mut self, tree: &ConfigTree<'_>, settings: Settings, monitor: usize) -> Result<()> {
        let theme = PanelTheme::load(tree, self.env.images.as_ref()).map_err(PanelError::from)?;
        let placement = place_panel(self.ws.screen(), monitor, &theme.geometry());

        let mut surface = Surface::new(self.surface.window, placement);
        let mut render = select_render_strategy(theme.transparent);
        render.create_draw_context(&mut surface);
        render
            .create_private(&mut self.ws, &surface)
            .with_context(|| format!("Failed to start '{}' rendering", render.name()))?;
        if let Err(e) = self.ws.update_panel_window(surface.window, &placement) {
            render.free_private();
            return Err(e).context("Failed to update panel window");
        }

        self.render.free_private();
        self.render = render;
        self.surface = surface;
        self.theme = theme;
        self.settings = settings;
        self.monitor = monitor;

        let mut stash = WidgetStash::evict(std::mem::take(&mut self.widgets));
        self.rebuild_widgets(tree, &mut stash)?;

        let destroyed = stash.destroy_remaining();
        info!(
            widgets = self.widgets.len(),
            destroyed,
            strategy = self.render.name(),
            "Panel reconfigured"
        );
        self.needs_expose = true;
        self.expose_panel()
    }

    /// Apply new settings to the existing widgets without touching the theme.
    ///
    /// A changed `monitor` moves the panel. The widget set itself stays, so a
    /// changed alternatives preference needs [`Panel::reconfigure`].
    pub fn reconfigure_widgets(&mut self, settings: Settings) -> Result<()> {
        self.monitor = settings.monitor;
        self.settings = settings;
        for widget in &mut self.widgets {
            widget.reconfigure(&self.settings);
        }
        self.update_geometry()?;
        self.recalculate_widgets_sizes()?;
        self.needs_expose = true;
        self.expose_panel()
    }

    /// Destroy every widget, the render state and the window.
    pub fn free(mut self) -> Result<W> {
        self.widgets.clear();
        self.render.free_private();
        self.ws
            .destroy_window(self.surface.window)
            .context("Failed to destroy panel window")?;
        self.ws.flush()?;
        info!("Panel destroyed");
        Ok(self.ws)
    }

    fn rebuild_widgets(&mut self, tree: &ConfigTree<'_>, stash: &mut WidgetStash) -> Result<()> {
        let ctx = WidgetContext {
            theme: tree,
            images: self.env.images.as_ref(),
            settings: &self.settings,
            panel_height: self.surface.placement.height,
        };
        self.widgets = instantiate_widgets(&self.env.registry, &ctx, stash)?;
        self.recalculate_widgets_sizes()
    }

    /// Re-run slot layout over the current widgets.
    pub fn recalculate_widgets_sizes(&mut self) -> Result<()> {
        layout(
            &mut self.widgets,
            self.surface.placement.width,
            self.theme.separator_width(),
        )
        .map_err(PanelError::from)?;
        for widget in &self.widgets {
            debug!(widget = widget.name(), x = widget.x, width = widget.width, "Placed widget");
        }
        Ok(())
    }

    /// Move the window after the screen or the requested monitor changed.
    fn update_geometry(&mut self) -> Result<()> {
        let placement = place_panel(self.ws.screen(), self.monitor, &self.theme.geometry());
        if placement == self.surface.placement {
            return Ok(());
        }
        self.surface.placement = placement;
        self.ws.update_panel_window(self.surface.window, &placement)?;
        self.render.create_draw_context(&mut self.surface);
        self.render.panel_resize(&mut self.ws, &self.surface)?;
        self.recalculate_widgets_sizes()?;
        info!(
            x = placement.x,
            y = placement.y,
            width = placement.width,
            monitor = placement.monitor,
            "Panel geometry updated"
        );
        self.needs_expose = true;
        Ok(())
    }

    /// Repaint what is dirty: the whole panel when flagged, otherwise each
    /// flagged widget on its own.
    pub fn expose_panel(&mut self) -> Result<()> {
        if self.needs_expose {
            self.needs_expose = false;
            return self.expose_whole_panel();
        }

        let mut painted = false;
        for i in 0..self.widgets.len() {
            if !self.widgets[i].needs_expose {
                continue;
            }
            self.widgets[i].needs_expose = false;
            if self.widgets[i].width == 0 {
                continue;
            }
            self.paint_widget(i);
            let (x, width) = (self.widgets[i].x, self.widgets[i].width);
            self.render
                .blit(&mut self.ws, &self.surface, x, 0, width, self.surface.placement.height)?;
            painted = true;
        }
        if painted {
            self.ws.flush()?;
        }
        Ok(())
    }

    fn expose_whole_panel(&mut self) -> Result<()> {
        let width = self.surface.placement.width;
        self.surface.canvas.pattern_image(&self.theme.background, 0, width);

        let fill_index = self
            .widgets
            .iter()
            .position(|w| w.size_type() == SizeType::Fill);
        for i in 0..self.widgets.len() {
            self.widgets[i].needs_expose = false;
            if self.widgets[i].width == 0 {
                continue;
            }
            self.paint_widget(i);
            self.paint_separator(i, fill_index);
        }

        self.render.expose(&mut self.ws, &self.surface)?;
        for widget in &mut self.widgets {
            widget.panel_exposed();
        }
        self.ws.flush()
    }

    fn paint_widget(&mut self, index: usize) {
        let widget = &mut self.widgets[index];
        let canvas = &mut self.surface.canvas;
        canvas.pattern_image(&self.theme.background, widget.x, widget.width);
        let mut dc = canvas.slot(widget.x, widget.width, widget.paint_replace);
        widget.draw(&mut dc);
    }

    /// Separators sit in the gap layout left on the side facing the fill
    /// widget.
    fn paint_separator(&mut self, index: usize, fill_index: Option<usize>) {
        let Some(separator) = &self.theme.separator else {
            return;
        };
        let widget = &self.widgets[index];
        if widget.size_type() == SizeType::Fill || !widget.takes_separator() {
            return;
        }
        let x = match fill_index {
            Some(fill) if index > fill => widget.x - separator.width(),
            _ => widget.x + widget.width,
        };
        self.surface.canvas.blit_image(separator, x, 0);
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn placement(&self) -> &Placement {
        &self.surface.placement
    }

    pub fn window(&self) -> WindowId {
        self.surface.window
    }

    pub fn render_name(&self) -> &'static str {
        self.render.name()
    }

    pub fn showing_desktop(&self) -> bool {
        self.showing_desktop
    }

    pub fn ws(&self) -> &W {
        &self.ws
    }

    pub fn ws_mut(&mut self) -> &mut W {
        &mut self.ws
    }
}

/// Walk the theme's top-level entries and turn every one naming a known
/// capability into a widget, reclaiming stashed widgets where the capability
/// can be rethemed.
///
/// Entries whose capability fails to create (or re-create) are skipped.
pub fn instantiate_widgets(
    registry: &WidgetRegistry,
    ctx: &WidgetContext<'_, '_>,
    stash: &mut WidgetStash,
) -> Result<Vec<Widget>, PanelError> {
    let alternatives = Alternatives::resolve(ctx.theme, &ctx.settings.preferred_alternatives, |name| {
        registry.lookup(name).is_some()
    });
    let mut widgets = Vec::new();

    for (index, entry) in ctx.theme.entries().iter().enumerate() {
        let Some(interface) = registry.lookup(entry.name) else {
            if entry.name != "panel" {
                debug!(entry = entry.name, "No widget capability for entry, skipping");
            }
            continue;
        };
        if !alternatives.allows(index, entry) {
            debug!(widget = entry.name, "Skipped by alternatives");
            continue;
        }
        if widgets.len() >= MAX_WIDGETS {
            return Err(PanelError::TooManyWidgets { limit: MAX_WIDGETS });
        }

        if interface.supports_retheme() {
            if let Some(mut widget) = stash.take(entry.name) {
                match widget.retheme(entry, ctx) {
                    Ok(()) => {
                        widgets.push(widget);
                        continue;
                    }
                    Err(e) => {
                        warn!(widget = entry.name, error = %e, "Retheme failed, recreating widget");
                        drop(widget);
                    }
                }
            }
        }

        match Widget::create(interface, entry, ctx) {
            Ok(widget) => widgets.push(widget),
            Err(e) => warn!(widget = entry.name, error = %e, "Failed to create widget, skipping"),
        }
    }
    Ok(widgets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::geometry::{Monitor, Screen};
    use crate::test_support::{
        count, take_journal, test_registry, FakeImageLoader, FakeWindowSystem, Lifecycle,
    };
    use std::collections::HashSet;

    const PANEL: &str = "panel {\n background = bg.png\n separator = sep.png\n}\n";

    fn source(widgets: &str) -> ConfigSource {
        ConfigSource::from_text(format!("{PANEL}{widgets}"), "/themes/test")
    }

    fn env() -> PanelEnv {
        PanelEnv {
            registry: test_registry(),
            images: Box::new(FakeImageLoader),
        }
    }

    fn try_panel(widgets: &str, settings: Settings) -> Result<Panel<FakeWindowSystem>> {
        let source = source(widgets);
        let tree = source.parse()?;
        Panel::init(FakeWindowSystem::single(), env(), &tree, settings, 0)
    }

    fn panel(widgets: &str) -> Panel<FakeWindowSystem> {
        try_panel(widgets, Settings::default()).unwrap()
    }

    fn reconfigure(panel: &mut Panel<FakeWindowSystem>, widgets: &str) -> Result<()> {
        let source = source(widgets);
        let tree = source.parse()?;
        panel.reconfigure(&tree, Settings::default(), 0)
    }

    fn ids(journal: &[Lifecycle], f: impl Fn(&Lifecycle) -> Option<u32>) -> Vec<u32> {
        journal.iter().filter_map(f).collect()
    }

    fn created(journal: &[Lifecycle]) -> Vec<u32> {
        ids(journal, |e| match e {
            Lifecycle::Created(id) => Some(*id),
            _ => None,
        })
    }

    fn destroyed(journal: &[Lifecycle]) -> Vec<u32> {
        ids(journal, |e| match e {
            Lifecycle::Destroyed(id) => Some(*id),
            _ => None,
        })
    }

    fn rethemed(journal: &[Lifecycle]) -> Vec<u32> {
        ids(journal, |e| match e {
            Lifecycle::Rethemed(id) => Some(*id),
            _ => None,
        })
    }

    #[test]
    fn test_init_places_lays_out_and_paints() {
        let panel = panel("box { width = 30 }\nfill\nbox { width = 40 }");
        let ws = panel.ws();
        assert_eq!(ws.created.len(), 1);
        assert_eq!(ws.mapped, vec![panel.window()]);
        assert_eq!(panel.placement().width, 1000);
        assert_eq!(panel.placement().height, FakeImageLoader::HEIGHT);
        assert_eq!(panel.render_name(), "normal");

        let slots: Vec<(i32, i32)> = panel.widgets().iter().map(|w| (w.x, w.width)).collect();
        assert_eq!(slots, vec![(0, 30), (32, 926), (960, 40)]);

        let put = ws.puts.last().unwrap();
        assert_eq!((put.x, put.y, put.width, put.height), (0, 0, 1000, FakeImageLoader::HEIGHT));
        assert!(ws.flushes > 0);
    }

    #[test]
    fn test_whole_panel_paint_draws_separators_toward_fill() {
        let panel = panel("box { width = 10\n color = ff0000 }\nfill\nbox { width = 10\n color = 0000ff }");
        let pixels = &panel.ws().puts.last().unwrap().pixels;
        assert_eq!(pixels[0], 0xFFFF0000);
        assert_eq!(pixels[10], FakeImageLoader::SEPARATOR);
        assert_eq!(pixels[11], FakeImageLoader::SEPARATOR);
        assert_eq!(pixels[12], FakeImageLoader::BACKGROUND);
        assert_eq!(pixels[987], FakeImageLoader::BACKGROUND);
        assert_eq!(pixels[988], FakeImageLoader::SEPARATOR);
        assert_eq!(pixels[990], 0xFF0000FF);
    }

    #[test]
    fn test_unknown_entries_and_failed_creates_are_skipped() {
        let panel = panel("clock\nbox { fail_create = yes }\nfill\nstatic");
        let names: Vec<&str> = panel.widgets().iter().map(Widget::name).collect();
        assert_eq!(names, vec!["fill", "static"]);
    }

    #[test]
    fn test_alternatives_pick_preferred_entry() {
        let mut settings = Settings::default();
        settings.preferred_alternatives = vec!["static".to_string()];
        let preferred = try_panel(
            "box { alternative = right }\nstatic { alternative = right }\nfill",
            settings,
        )
        .unwrap();
        let names: Vec<&str> = preferred.widgets().iter().map(Widget::name).collect();
        assert_eq!(names, vec!["static", "fill"]);

        let fallback = panel("box { alternative = right }\nstatic { alternative = right }\nfill");
        let names: Vec<&str> = fallback.widgets().iter().map(Widget::name).collect();
        assert_eq!(names, vec!["box", "fill"]);
    }

    #[test]
    fn test_too_many_widgets_is_an_error() {
        let widgets = format!("fill\n{}", "box { width = 1 }\n".repeat(MAX_WIDGETS));
        let err = try_panel(&widgets, Settings::default()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PanelError>(),
            Some(PanelError::TooManyWidgets { limit: MAX_WIDGETS })
        ));
    }

    #[test]
    fn test_fill_count_is_enforced() {
        for widgets in ["box", "fill\nfill"] {
            let err = try_panel(widgets, Settings::default()).err().unwrap();
            assert!(matches!(
                err.downcast_ref::<PanelError>(),
                Some(PanelError::Layout(_))
            ));
        }
    }

    #[test]
    fn test_missing_background_fails_before_window() {
        let source = ConfigSource::from_text("panel { separator = sep.png }\nfill", "/themes/test");
        let tree = source.parse().unwrap();
        let err = Panel::init(FakeWindowSystem::single(), env(), &tree, Settings::default(), 0)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<PanelError>(),
            Some(PanelError::Theme(ThemeError::MissingImage { key: "background" }))
        ));
    }

    #[test]
    fn test_unchanged_retheme_keeps_private_state() {
        let theme = "box { width = 30 }\nfill\nbox { width = 40 }";
        let mut panel = panel(theme);
        let before: Vec<*const ()> = panel.widgets().iter().map(Widget::private_ptr).collect();
        take_journal();

        reconfigure(&mut panel, theme).unwrap();

        let after: Vec<*const ()> = panel.widgets().iter().map(Widget::private_ptr).collect();
        assert_eq!(before, after);
        let journal = take_journal();
        assert_eq!(count(&journal, |e| matches!(e, Lifecycle::Created(_))), 0);
        assert_eq!(count(&journal, |e| matches!(e, Lifecycle::Destroyed(_))), 0);
        assert_eq!(rethemed(&journal).len(), 3);
    }

    #[test]
    fn test_retheme_transaction_accounts_for_every_widget() {
        take_journal();
        let mut panel = panel("box { width = 10 }\nstatic\nfill\nbox { width = 20 }");
        let old: HashSet<u32> = created(&take_journal()).into_iter().collect();
        assert_eq!(old.len(), 4);

        reconfigure(&mut panel, "fill\nbox { fail_retheme = yes }\nstatic").unwrap();
        let journal = take_journal();

        let kept: HashSet<u32> = rethemed(&journal).into_iter().collect();
        let gone = destroyed(&journal);
        let gone_set: HashSet<u32> = gone.iter().copied().collect();
        assert_eq!(gone.len(), gone_set.len(), "a widget was destroyed twice");
        assert!(kept.is_disjoint(&gone_set));
        assert_eq!(&kept | &gone_set, old);
        // only the fill widget survives; the failed box and the static one are replaced
        assert_eq!(kept.len(), 1);
        assert_eq!(created(&journal).len(), 2);

        let names: Vec<&str> = panel.widgets().iter().map(Widget::name).collect();
        assert_eq!(names, vec!["fill", "box", "static"]);
    }

    #[test]
    fn test_broken_theme_leaves_panel_running() {
        let mut panel = panel("box\nfill");
        take_journal();
        let source = ConfigSource::from_text("panel { background = missing.png }\nfill", "/themes/test");
        let tree = source.parse().unwrap();
        assert!(panel.reconfigure(&tree, Settings::default(), 0).is_err());
        assert_eq!(panel.widgets().len(), 2);
        assert!(take_journal().is_empty());
    }

    #[test]
    fn test_failed_window_update_leaves_panel_running() {
        let mut panel = panel("box\nfill");
        take_journal();
        panel.ws_mut().fail_updates = true;
        let source = ConfigSource::from_text(
            "panel { background = bg.png\n transparent = yes\n height = 30 }\nfill",
            "/themes/test",
        );
        let tree = source.parse().unwrap();

        let err = panel.reconfigure(&tree, Settings::default(), 0).err().unwrap();

        assert!(format!("{err:#}").contains("Failed to update panel window"));
        assert!(err.downcast_ref::<PanelError>().is_none());
        let names: Vec<&str> = panel.widgets().iter().map(Widget::name).collect();
        assert_eq!(names, vec!["box", "fill"]);
        assert_eq!(panel.render_name(), "normal");
        assert_eq!(panel.placement().height, FakeImageLoader::HEIGHT);
        assert!(take_journal().is_empty());
    }

    #[test]
    fn test_unknown_entry_does_not_win_alternatives() {
        let panel = panel("tray { alternative = g }\nbox { alternative = g }\nfill");
        let names: Vec<&str> = panel.widgets().iter().map(Widget::name).collect();
        assert_eq!(names, vec!["box", "fill"]);
    }

    #[test]
    fn test_reconfigure_widgets_moves_to_new_monitor() {
        let screen = Screen::new(
            2000,
            800,
            vec![Monitor::new(0, 0, 1000, 800), Monitor::new(1000, 0, 1000, 800)],
        );
        let source = source("box { width = 10 }\nfill");
        let tree = source.parse().unwrap();
        let mut panel =
            Panel::init(FakeWindowSystem::new(screen), env(), &tree, Settings::default(), 0).unwrap();

        let mut settings = Settings::default();
        settings.monitor = 1;
        panel.reconfigure_widgets(settings).unwrap();

        assert_eq!(panel.placement().monitor, 1);
        assert_eq!(panel.placement().x, 1000);
        assert_eq!(panel.ws().updated.last().map(|p| p.x), Some(1000));
        let put = panel.ws().puts.last().unwrap();
        assert_eq!((put.x, put.width), (0, 1000));
    }

    #[test]
    fn test_reconfigure_switches_render_strategy() {
        let mut panel = panel("fill");
        let source = ConfigSource::from_text(
            "panel { background = bg.png\n transparent = yes\n height = 30 }\nfill",
            "/themes/test",
        );
        let tree = source.parse().unwrap();
        panel.reconfigure(&tree, Settings::default(), 0).unwrap();
        assert_eq!(panel.render_name(), "pseudo");
        assert_eq!(panel.placement().height, 30);
        assert_eq!(panel.ws().updated.last().map(|p| p.height), Some(30));
    }

    #[test]
    fn test_reconfigure_widgets_refreshes_widths() {
        let mut panel = panel("box { width = 10 }\nfill");
        take_journal();
        let mut settings = Settings::default();
        settings.drag_threshold = 50;
        panel.reconfigure_widgets(settings).unwrap();
        assert_eq!(panel.widgets()[0].width, 50);
        assert_eq!(panel.widgets()[1].x, 52);
        assert_eq!(panel.settings().drag_threshold, 50);
        assert_eq!(count(&take_journal(), |e| matches!(e, Lifecycle::Reconfigured(_))), 2);
    }

    #[test]
    fn test_free_destroys_widgets_and_window() {
        let panel = panel("box\nfill");
        let window = panel.window();
        take_journal();
        let ws = panel.free().unwrap();
        assert_eq!(ws.destroyed, vec![window]);
        assert_eq!(count(&take_journal(), |e| matches!(e, Lifecycle::Destroyed(_))), 2);
    }
}
