// SPDX-License-Identifier: MIT
//
// Render engine: paints the host's redraw stream onto a surface.
//
// `Painter` owns the drawing state (which attribute ids are reversed, the
// cursor saved around drawing events) and applies one notification at a
// time with the surface lock held for the whole batch. `RenderEngine` runs
// the host's receive loop on its own thread and takes part in shutdown.
//
// Failures at the terminal boundary (writing past the bottom-right corner,
// copying from outside the grid) are swallowed and counted. Protocol
// violations end the loop.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use n_rpc::{Host, Inbound, Value};
use n_term::cell::Attr;
use n_term::color::CellColor;
use n_term::surface::{Surface, SurfaceError, text_width};

use crate::error::{ProtocolError, RenderError};
use crate::redraw::{CursorGoto, GridClear, GridLine, GridScroll, HlAttrDefine, Subtype};
use crate::shutdown::{Coordinator, Stoppable};

/// The only grid drawn without multigrid.
const GLOBAL_GRID: i64 = 1;

// ─── Painter ─────────────────────────────────────────────────────────────────

/// Applies redraw batches to a shared surface.
pub struct Painter<S: Surface> {
    surface: Arc<Mutex<S>>,
    reversed: HashSet<u32>,
    saved_cursor: (u16, u16),
    swallowed: u64,
}

impl<S: Surface> Painter<S> {
    pub fn new(surface: Arc<Mutex<S>>) -> Self {
        Self {
            surface,
            reversed: HashSet::new(),
            saved_cursor: (0, 0),
            swallowed: 0,
        }
    }

    /// Whether attribute id `hl` currently draws in reverse video.
    #[must_use]
    pub fn is_reversed(&self, hl: u32) -> bool {
        self.reversed.contains(&hl)
    }

    /// Boundary failures swallowed so far.
    #[must_use]
    pub const fn swallowed(&self) -> u64 {
        self.swallowed
    }

    /// Apply one host notification. Anything but `redraw` is ignored.
    ///
    /// # Errors
    ///
    /// A protocol violation, or a failed refresh.
    pub fn handle_batch(&mut self, method: &str, records: &[Value]) -> Result<(), RenderError> {
        if method != "redraw" {
            log::debug!("skipping event {method}");
            return Ok(());
        }

        let surface = Arc::clone(&self.surface);
        let mut surface = lock(&surface);
        for record in records {
            let Some((name, instances)) = record.as_array().and_then(|r| r.split_first()) else {
                return Err(ProtocolError::Malformed {
                    event: "redraw",
                    reason: "record is not a non-empty array".into(),
                }
                .into());
            };
            let Some(sub) = name.as_str().and_then(Subtype::from_name) else {
                log::trace!("ignoring redraw event {name}");
                continue;
            };

            self.begin(sub, &*surface);
            let applied = self.apply(sub, instances, &mut *surface);
            self.end(sub, &mut *surface);
            applied?;
        }
        Ok(())
    }

    fn begin(&mut self, sub: Subtype, surface: &S) {
        if sub.saves_cursor() {
            self.saved_cursor = surface.cursor();
        }
    }

    fn end(&mut self, sub: Subtype, surface: &mut S) {
        if sub.saves_cursor() {
            let (row, col) = self.saved_cursor;
            if let Err(e) = surface.move_cursor(row, col) {
                self.swallow(e);
            }
        }
    }

    fn apply(&mut self, sub: Subtype, instances: &[Value], surface: &mut S) -> Result<(), RenderError> {
        // `flush` has no fields; one refresh per record.
        if sub == Subtype::Flush {
            surface.refresh()?;
            return Ok(());
        }
        for inst in instances {
            match sub {
                Subtype::GridLine => self.grid_line(&GridLine::parse(inst)?, surface)?,
                Subtype::HlAttrDefine => self.hl_attr_define(&HlAttrDefine::parse(inst)?, surface),
                Subtype::GridScroll => self.grid_scroll(&GridScroll::parse(inst)?, surface)?,
                Subtype::GridCursorGoto => self.cursor_goto(&CursorGoto::parse(inst)?, surface)?,
                Subtype::GridClear => {
                    check_grid(GridClear::parse(inst)?.grid)?;
                    surface.clear();
                }
                Subtype::Flush => {}
            }
        }
        Ok(())
    }

    fn grid_line(&mut self, line: &GridLine, surface: &mut S) -> Result<(), ProtocolError> {
        check_grid(line.grid)?;
        let mut col = line.col_start;
        // Cells without an id reuse the previous cell's; pair 0 before any.
        let mut hl = 0;
        for cell in &line.cells {
            if let Some(id) = cell.hl_id {
                hl = id;
            }
            let text = cell.expanded();
            let attrs = if self.is_reversed(hl) {
                Attr::INVERSE
            } else {
                Attr::empty()
            };
            if let Err(e) = surface.write_str(line.row, col, &text, hl, attrs) {
                self.swallow(e);
            }
            col = col.saturating_add(text_width(&text));
        }
        Ok(())
    }

    fn hl_attr_define(&mut self, def: &HlAttrDefine, surface: &mut S) {
        surface.define_pair(
            def.id,
            CellColor::from_cterm(def.fg),
            CellColor::from_cterm(def.bg),
        );
        if def.reverse {
            self.reversed.insert(def.id);
        } else {
            self.reversed.remove(&def.id);
        }
    }

    fn grid_scroll(&mut self, scroll: &GridScroll, surface: &mut S) -> Result<(), ProtocolError> {
        check_grid(scroll.grid)?;
        if scroll.cols != 0 {
            return Err(ProtocolError::ColumnScroll(scroll.cols));
        }
        if scroll.rows == 0 {
            return Err(ProtocolError::ZeroRowScroll);
        }

        let (top, bot, rows) = (i64::from(scroll.top), i64::from(scroll.bot), scroll.rows);
        let mut copy_row = |row: i64| {
            for col in scroll.left..scroll.right {
                let moved = match (u16::try_from(row + rows), u16::try_from(row)) {
                    (Ok(src), Ok(dst)) => surface.copy_cell((src, col), (dst, col)),
                    _ => Err(SurfaceError::Overflow),
                };
                if let Err(e) = moved {
                    self.swallow(e);
                }
            }
        };
        // Walk away from the rows being overwritten so no source is
        // clobbered before it is read.
        if rows > 0 {
            (top..bot - rows).for_each(&mut copy_row);
        } else {
            (top - rows..bot).rev().for_each(&mut copy_row);
        }
        Ok(())
    }

    fn cursor_goto(&mut self, goto: &CursorGoto, surface: &mut S) -> Result<(), ProtocolError> {
        check_grid(goto.grid)?;
        if let Err(e) = surface.move_cursor(goto.row, goto.col) {
            self.swallow(e);
        }
        Ok(())
    }

    fn swallow(&mut self, err: SurfaceError) {
        self.swallowed += 1;
        log::trace!("swallowed surface error: {err}");
    }
}

fn check_grid(grid: i64) -> Result<(), ProtocolError> {
    if grid == GLOBAL_GRID {
        Ok(())
    } else {
        Err(ProtocolError::UnsupportedGrid(grid))
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Lifecycle {
    started: bool,
    stopping: bool,
    exited: bool,
}

/// Drives the host receive loop and paints what arrives.
pub struct RenderEngine<H: Host, S: Surface> {
    host: Arc<H>,
    painter: Mutex<Painter<S>>,
    lifecycle: Mutex<Lifecycle>,
    exited: Condvar,
    coordinator: Arc<Coordinator>,
}

impl<H, S> RenderEngine<H, S>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
{
    pub fn new(host: Arc<H>, surface: Arc<Mutex<S>>, coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            host,
            painter: Mutex::new(Painter::new(surface)),
            lifecycle: Mutex::new(Lifecycle::default()),
            exited: Condvar::new(),
            coordinator,
        })
    }

    /// Run the receive loop on a thread named `render`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be created.
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<JoinHandle<Result<(), RenderError>>> {
        let engine = Arc::clone(self);
        thread::Builder::new()
            .name("render".into())
            .spawn(move || engine.run())
    }

    /// Receive and paint until the host closes or the loop is stopped.
    ///
    /// However it ends, the engine is marked exited and every engine on
    /// the coordinator is stopped.
    ///
    /// # Errors
    ///
    /// A host transport failure, a protocol violation, or a failed refresh.
    pub fn run(&self) -> Result<(), RenderError> {
        let _exit = ExitGuard { engine: self };
        {
            let mut lc = lock(&self.lifecycle);
            if lc.stopping {
                log::debug!("render loop stopped before it started");
                return Ok(());
            }
            lc.started = true;
        }

        log::debug!("render loop started");
        let mut painter = lock(&self.painter);
        while let Some(msg) = self.host.recv()? {
            match msg {
                Inbound::Notification { method, params } => {
                    painter.handle_batch(&method, &params)?;
                }
                Inbound::Request { id, method, .. } => {
                    log::debug!("host request {method} [{id}] answered with nil");
                    self.host.respond(id, Ok(Value::Nil))?;
                }
            }
        }
        Ok(())
    }

    fn swallowed(&self) -> u64 {
        lock(&self.painter).swallowed()
    }
}

impl<H, S> Stoppable for RenderEngine<H, S>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
{
    /// Stop the receive loop and wait until it has exited.
    ///
    /// Only the first call does anything. A stop before the loop starts
    /// makes the loop return as soon as it is run.
    fn stop(&self) {
        let mut lc = lock(&self.lifecycle);
        if lc.stopping {
            return;
        }
        lc.stopping = true;
        log::debug!("stopping render loop");
        self.host.stop_loop();
        if !lc.started {
            return;
        }
        while !lc.exited {
            lc = self
                .exited
                .wait(lc)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn name(&self) -> &'static str {
        "render"
    }
}

/// Marks the engine exited and cascades the stop, on every way out of `run`.
struct ExitGuard<'a, H, S>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
{
    engine: &'a RenderEngine<H, S>,
}

impl<H, S> Drop for ExitGuard<'_, H, S>
where
    H: Host + 'static,
    S: Surface + Send + 'static,
{
    fn drop(&mut self) {
        {
            let mut lc = lock(&self.engine.lifecycle);
            lc.stopping = true;
            lc.exited = true;
            self.engine.exited.notify_all();
        }
        self.engine.coordinator.stop_all();
        log::debug!(
            "render loop finished, {} surface errors swallowed",
            self.engine.swallowed()
        );
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
