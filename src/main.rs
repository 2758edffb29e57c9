// SPDX-License-Identifier: MIT
//
// n-client: a terminal front-end for an embedded Neovim.
//
// The host runs as a child (`nvim --embed`) and speaks msgpack-rpc over
// its stdio. This binary wires the crates together:
//
//   n-rpc  → host session (spawn, async calls, inbound notifications)
//   n-term → raw terminal, cell surface, key decoder, signals
//
// Two threads, two loops:
//
//   render thread:  host.recv → redraw batch → Painter → Screen → refresh
//   main thread:    stdin → KeyDecoder → encode_key → nvim_input
//
// Whichever loop ends first stops the other through the shutdown
// coordinator. The main thread then closes the session, joins the render
// thread, restores the terminal, and reports the first error.

mod config;
mod error;
mod input;
mod redraw;
mod render;
mod shutdown;

#[cfg(test)]
mod testing;

use std::io;
use std::process;
use std::sync::{Arc, Mutex};

use n_rpc::{Host, RpcError, Session, Value};
use n_term::decoder::{DecoderFlags, KeyDecoder};
use n_term::input::CanonFlags;
use n_term::signal;
use n_term::surface::Screen;
use n_term::terminal::{Size, Terminal};

use crate::config::Config;
use crate::error::{AppError, RenderError};
use crate::input::InputEngine;
use crate::render::RenderEngine;
use crate::shutdown::{Coordinator, Stoppable};

// ─── Attach ─────────────────────────────────────────────────────────────────

/// Ask the host to start drawing for a `size` UI with RGB colors and the
/// line-based grid events.
fn attach<H: Host + ?Sized>(host: &H, size: Size) -> Result<(), RpcError> {
    log::debug!("attaching UI at {}x{}", size.cols, size.rows);
    let options = Value::Map(vec![
        (Value::from("rgb"), Value::from(true)),
        (Value::from("ext_linegrid"), Value::from(true)),
    ]);
    host.async_call(
        "nvim_ui_attach",
        vec![Value::from(size.cols), Value::from(size.rows), options],
    )
}

// ─── Run ────────────────────────────────────────────────────────────────────

fn run(config: &Config) -> Result<(), AppError> {
    // Before any thread exists, so only the input loop ever takes them.
    signal::block_forwarded()?;

    let host = Arc::new(Session::spawn(&config.nvim, config.file.as_deref())?);

    let mut terminal = Terminal::new();
    terminal.enter()?;
    let size = terminal.size();
    let surface = Arc::new(Mutex::new(Screen::new(size, io::stdout())));

    let coordinator = Coordinator::new();
    let render = RenderEngine::new(Arc::clone(&host), Arc::clone(&surface), Arc::clone(&coordinator));
    let input = InputEngine::new(Arc::clone(&host), Arc::clone(&surface), Arc::clone(&coordinator));
    coordinator.register(&(render.clone() as Arc<dyn Stoppable>));
    coordinator.register(&(input.clone() as Arc<dyn Stoppable>));

    let render_thread = render.spawn()?;

    let input_result = attach(host.as_ref(), size)
        .map_err(AppError::from)
        .and_then(|()| {
            let keys = KeyDecoder::stdin(DecoderFlags::EINTR, CanonFlags::DELBS)?;
            input.run(keys).map_err(AppError::from)
        });

    // The input loop's exit already did this; an early failure did not.
    coordinator.stop_all();
    host.close();
    let render_result = render_thread
        .join()
        .unwrap_or(Err(RenderError::Panicked));
    terminal.leave()?;

    input_result?;
    render_result?;
    Ok(())
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() {
    let config = Config::from_args();
    if let Err(e) = config.init_logging() {
        eprintln!("n-client: {e}");
        process::exit(1);
    }

    if let Err(e) = run(&config) {
        log::error!("{e}");
        eprintln!("n-client: {e}");
        process::exit(1);
    }
    log::info!("n-client exited cleanly");
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use pretty_assertions::assert_eq;

    #[test]
    fn attach_requests_rgb_and_linegrid() {
        let host = FakeHost::default();
        attach(&host, Size { cols: 80, rows: 24 }).unwrap();

        let options = Value::Map(vec![
            (Value::from("rgb"), Value::from(true)),
            (Value::from("ext_linegrid"), Value::from(true)),
        ]);
        assert_eq!(
            host.calls(),
            vec![(
                "nvim_ui_attach".to_owned(),
                vec![Value::from(80), Value::from(24), options]
            )]
        );
    }
}
