//! X11 side of the panel, on top of x11rb

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::properties::{WmHints, WmSizeHints, WmSizeHintsSpecification};
use x11rb::protocol::randr::ConnectionExt as RandrExt;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::constants::x11;
use crate::geometry::{Monitor, Placement, Screen};
use crate::window::{PanelEvent, PointerEvent, WindowId, WindowSystem};

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_wm_strut: Atom,
    pub net_wm_strut_partial: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_showing_desktop: Atom,
    pub motif_wm_hints: Atom,
    pub xrootpmap_id: Atom,
    pub xdnd_aware: Atom,
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .with_context(|| format!("Failed to intern {} atom", name))?
        .reply()
        .with_context(|| format!("Failed to get reply for {} atom", name))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        Ok(Self {
            net_wm_strut: intern(conn, "_NET_WM_STRUT")?,
            net_wm_strut_partial: intern(conn, "_NET_WM_STRUT_PARTIAL")?,
            net_wm_desktop: intern(conn, "_NET_WM_DESKTOP")?,
            net_wm_window_type: intern(conn, "_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_dock: intern(conn, "_NET_WM_WINDOW_TYPE_DOCK")?,
            net_showing_desktop: intern(conn, "_NET_SHOWING_DESKTOP")?,
            motif_wm_hints: intern(conn, "_MOTIF_WM_HINTS")?,
            xrootpmap_id: intern(conn, "_XROOTPMAP_ID")?,
            xdnd_aware: intern(conn, "XdndAware")?,
        })
    }
}

/// Monitors reported by RandR; empty when the extension can't tell.
fn query_monitors(conn: &RustConnection, root: Window) -> Vec<Monitor> {
    let reply = conn
        .randr_get_monitors(root, true)
        .map_err(anyhow::Error::from)
        .and_then(|cookie| cookie.reply().map_err(anyhow::Error::from));
    match reply {
        Ok(reply) => {
            let monitors: Vec<Monitor> = reply
                .monitors
                .iter()
                .map(|m| Monitor::new(m.x.into(), m.y.into(), m.width.into(), m.height.into()))
                .collect();
            for (index, m) in monitors.iter().enumerate() {
                debug!(index, x = m.x, y = m.y, width = m.width, height = m.height, "Found monitor");
            }
            monitors
        }
        Err(e) => {
            warn!(error = %e, "RandR monitors unavailable, treating the screen as one monitor");
            Vec::new()
        }
    }
}

pub struct X11Connection {
    conn: RustConnection,
    root: Window,
    depth: u8,
    visual: Visualid,
    lsb_first: bool,
    atoms: CachedAtoms,
    screen: Screen,
    gc: Option<Gcontext>,
}

impl X11Connection {
    /// Connect to `$DISPLAY` and start watching the root window.
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 display")?;
        let setup = conn.setup();
        let x_screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| anyhow!("X11 screen {} doesn't exist", screen_num))?;
        let root = x_screen.root;
        let depth = x_screen.root_depth;
        let visual = x_screen.root_visual;
        let (width, height) = (
            i32::from(x_screen.width_in_pixels),
            i32::from(x_screen.height_in_pixels),
        );
        let lsb_first = setup.image_byte_order == ImageOrder::LSB_FIRST;
        info!(screen = screen_num, width, height, depth, "Connected to X11");

        let atoms = CachedAtoms::new(&conn)?;
        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new()
                .event_mask(EventMask::STRUCTURE_NOTIFY | EventMask::PROPERTY_CHANGE),
        )
        .context("Failed to watch the root window")?;

        let monitors = query_monitors(&conn, root);
        Ok(Self {
            conn,
            root,
            depth,
            visual,
            lsb_first,
            atoms,
            screen: Screen::new(width, height, monitors),
            gc: None,
        })
    }

    fn set_panel_properties(&self, window: Window, placement: &Placement) -> Result<()> {
        let cardinals = placement.strut.cardinals();
        debug!(window, reserves = !placement.strut.is_zero(), "Setting panel strut");
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_strut,
                AtomEnum::CARDINAL,
                &cardinals[..x11::STRUT_LEN],
            )
            .context("Failed to set _NET_WM_STRUT")?;
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_strut_partial,
                AtomEnum::CARDINAL,
                &cardinals,
            )
            .context("Failed to set _NET_WM_STRUT_PARTIAL")?;

        let size_hints = WmSizeHints {
            position: Some((WmSizeHintsSpecification::ProgramSpecified, placement.x, placement.y)),
            size: Some((
                WmSizeHintsSpecification::ProgramSpecified,
                placement.width,
                placement.height,
            )),
            min_size: Some((placement.width, placement.height)),
            max_size: Some((placement.width, placement.height)),
            ..WmSizeHints::new()
        };
        size_hints
            .set_normal_hints(&self.conn, window)
            .context("Failed to set WM_NORMAL_HINTS")?;
        Ok(())
    }

    fn set_static_properties(&self, window: Window) -> Result<()> {
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_desktop,
                AtomEnum::CARDINAL,
                &[x11::ALL_DESKTOPS],
            )
            .context("Failed to set _NET_WM_DESKTOP")?;
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_window_type,
                AtomEnum::ATOM,
                &[self.atoms.net_wm_window_type_dock],
            )
            .context("Failed to set _NET_WM_WINDOW_TYPE")?;

        let mut wm_hints = WmHints::new();
        wm_hints.input = Some(false);
        wm_hints
            .set(&self.conn, window)
            .context("Failed to set WM_HINTS")?;

        // flags, functions, decorations, input mode, status
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.motif_wm_hints,
                self.atoms.motif_wm_hints,
                &[x11::MWM_HINTS_DECORATIONS, 0, 0, 0, 0],
            )
            .context("Failed to set _MOTIF_WM_HINTS")?;
        self.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                x11::WM_CLASS,
            )
            .context("Failed to set WM_CLASS")?;
        self.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.xdnd_aware,
                AtomEnum::ATOM,
                &[x11::XDND_VERSION],
            )
            .context("Failed to set XdndAware")?;
        Ok(())
    }

    fn send_root_message(&self, window: Window, type_: Atom, data: [u32; 5]) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_,
            data: ClientMessageData::from(data),
        };
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                event,
            )
            .context("Failed to send client message to the root window")?;
        Ok(())
    }

    fn put_desktop(&self, window: Window) -> Result<()> {
        // source indication 2: pager
        self.send_root_message(window, self.atoms.net_wm_desktop, [x11::ALL_DESKTOPS, 2, 0, 0, 0])
    }

    fn encode_pixels(&self, pixels: &[u32]) -> Vec<u8> {
        let mut data = Vec::with_capacity(pixels.len() * 4);
        for pixel in pixels {
            let bytes = if self.lsb_first {
                pixel.to_le_bytes()
            } else {
                pixel.to_be_bytes()
            };
            data.extend_from_slice(&bytes);
        }
        data
    }

    fn decode_pixels(&self, data: &[u8]) -> Vec<u32> {
        data.chunks_exact(4)
            .map(|c| {
                let bytes = [c[0], c[1], c[2], c[3]];
                let pixel = if self.lsb_first {
                    u32::from_le_bytes(bytes)
                } else {
                    u32::from_be_bytes(bytes)
                };
                pixel | 0xFF00_0000
            })
            .collect()
    }
}

fn to_i16(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn to_u16(v: i32) -> u16 {
    v.clamp(0, i32::from(u16::MAX)) as u16
}

impl WindowSystem for X11Connection {
    fn screen(&self) -> &Screen {
        &self.screen
    }

    fn refresh_screen(&mut self, width: i32, height: i32) -> Result<()> {
        let monitors = query_monitors(&self.conn, self.root);
        self.screen = Screen::new(width, height, monitors);
        Ok(())
    }

    fn create_panel_window(&mut self, placement: &Placement) -> Result<WindowId> {
        let window = self.conn.generate_id().context("Failed to generate X11 window ID")?;
        self.conn
            .create_window(
                self.depth,
                window,
                self.root,
                to_i16(placement.x),
                to_i16(placement.y),
                to_u16(placement.width).max(1),
                to_u16(placement.height).max(1),
                0,
                WindowClass::INPUT_OUTPUT,
                self.visual,
                &CreateWindowAux::new().event_mask(
                    EventMask::EXPOSURE
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::POINTER_MOTION
                        | EventMask::ENTER_WINDOW
                        | EventMask::LEAVE_WINDOW
                        | EventMask::STRUCTURE_NOTIFY,
                ),
            )
            .context("Failed to create panel window")?;

        self.set_static_properties(window)?;
        self.set_panel_properties(window, placement)?;

        let gc = self.conn.generate_id().context("Failed to generate ID for graphics context")?;
        self.conn
            .create_gc(gc, window, &CreateGCAux::new())
            .context("Failed to create graphics context")?;
        self.gc = Some(gc);
        Ok(window)
    }

    fn update_panel_window(&mut self, window: WindowId, placement: &Placement) -> Result<()> {
        self.conn
            .configure_window(
                window,
                &ConfigureWindowAux::new()
                    .x(placement.x)
                    .y(placement.y)
                    .width(placement.width.max(1) as u32)
                    .height(placement.height.max(1) as u32),
            )
            .context("Failed to move panel window")?;
        self.set_panel_properties(window, placement)
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.put_desktop(window)?;
        self.conn.map_window(window).context("Failed to map panel window")?;
        self.put_desktop(window)?;
        self.conn.flush()?;
        info!(window, "Mapped panel window");
        Ok(())
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        if let Some(gc) = self.gc.take() {
            self.conn.free_gc(gc)?;
        }
        self.conn
            .destroy_window(window)
            .context("Failed to destroy panel window")?;
        Ok(())
    }

    fn put_image(
        &mut self,
        window: WindowId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        pixels: &[u32],
    ) -> Result<()> {
        let gc = self.gc.ok_or_else(|| anyhow!("No graphics context for window {}", window))?;
        if width <= 0 || height <= 0 {
            return Ok(());
        }
        // split into row bands that fit one request
        let row_bytes = width as usize * 4;
        let max_rows = ((self.conn.maximum_request_bytes().saturating_sub(64)) / row_bytes).max(1);
        for (band, rows) in pixels.chunks(max_rows * width as usize).enumerate() {
            let band_height = rows.len() / width as usize;
            let data = self.encode_pixels(rows);
            self.conn
                .put_image(
                    ImageFormat::Z_PIXMAP,
                    window,
                    gc,
                    to_u16(width),
                    band_height as u16,
                    to_i16(x),
                    to_i16(y + (band * max_rows) as i32),
                    0,
                    self.depth,
                    &data,
                )
                .context("Failed to put panel image")?;
        }
        Ok(())
    }

    fn root_background(&mut self, x: i32, y: i32, width: i32, height: i32) -> Result<Option<Vec<u32>>> {
        let reply = self
            .conn
            .get_property(false, self.root, self.atoms.xrootpmap_id, AtomEnum::PIXMAP, 0, 1)
            .context("Failed to query _XROOTPMAP_ID")?
            .reply()
            .context("Failed to get reply for _XROOTPMAP_ID")?;
        let Some(pixmap) = reply.value32().and_then(|mut v| v.next()) else {
            return Ok(None);
        };

        let image = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                pixmap,
                to_i16(x),
                to_i16(y),
                to_u16(width),
                to_u16(height),
                !0,
            )
            .context("Failed to request the background pixmap")?
            .reply();
        match image {
            Ok(image) if image.data.len() == (width * height * 4) as usize => {
                Ok(Some(self.decode_pixels(&image.data)))
            }
            Ok(image) => {
                warn!(depth = image.depth, "Unsupported background pixmap format");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Failed to read the background pixmap");
                Ok(None)
            }
        }
    }

    fn set_showing_desktop(&mut self, showing: bool) -> Result<()> {
        self.send_root_message(
            self.root,
            self.atoms.net_showing_desktop,
            [u32::from(showing), 0, 0, 0, 0],
        )?;
        self.conn.flush()?;
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<PanelEvent>> {
        let Some(event) = self.conn.poll_for_event().context("Lost the X11 connection")? else {
            return Ok(None);
        };
        let pointer = |window, event| PanelEvent::Pointer { window, event };
        Ok(Some(match event {
            Event::Expose(e) if e.count == 0 => PanelEvent::Expose { window: e.window },
            Event::ConfigureNotify(e) if e.window == self.root => PanelEvent::RootConfigured {
                width: e.width.into(),
                height: e.height.into(),
            },
            Event::PropertyNotify(e) if e.window == self.root && e.atom == self.atoms.xrootpmap_id => {
                PanelEvent::RootBackgroundChanged
            }
            Event::ButtonPress(e) => pointer(
                e.event,
                PointerEvent::Press {
                    button: e.detail,
                    x: e.event_x.into(),
                    y: e.event_y.into(),
                },
            ),
            Event::ButtonRelease(e) => pointer(
                e.event,
                PointerEvent::Release {
                    button: e.detail,
                    x: e.event_x.into(),
                    y: e.event_y.into(),
                },
            ),
            Event::MotionNotify(e) => pointer(
                e.event,
                PointerEvent::Motion {
                    x: e.event_x.into(),
                    y: e.event_y.into(),
                },
            ),
            Event::EnterNotify(e) => pointer(e.event, PointerEvent::Enter),
            Event::LeaveNotify(e) => pointer(e.event, PointerEvent::Leave),
            Event::Error(e) => {
                warn!(error = ?e, "X11 error");
                PanelEvent::Other
            }
            _ => PanelEvent::Other,
        }))
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        use nix::errno::Errno;
        use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
        use std::os::fd::AsFd;

        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(self.conn.stream().as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(n) => Ok(n > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(e).context("Failed to poll the X11 connection"),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush().context("Failed to flush X11 connection")?;
        Ok(())
    }
}
