//! QuickJS surface
//!
//! A headless page host on `rquickjs`. Each navigation builds a fresh
//! context with `window` aliased to the global object and a native
//! `external.notify(message)` primitive. Posted messages are queued on a
//! channel and delivered to message handlers by [`QuickJsSurface::pump`],
//! never from inside a running script.

use super::{HandlerId, MessageHandler, NavigationHandler, Signals, Surface};
use crate::bindings::js_literal;
use crate::core::error::{SurfaceError, SurfaceResult};
use crossbeam_channel::{unbounded, Receiver, Sender};
use rquickjs::function::Rest;
use rquickjs::{Context, Function, Object, Runtime};
use std::cell::RefCell;

/// Upper bound on message/job rounds in one `pump`
const MAX_PUMP_ROUNDS: usize = 1024;

const OK_PREFIX: &str = "ok:";
const ERR_PREFIX: &str = "err:";

pub struct QuickJsSurface {
    // context must drop before runtime
    context: RefCell<Context>,
    runtime: Runtime,
    signals: Signals,
    outbox_tx: Sender<String>,
    outbox_rx: Receiver<String>,
}

impl QuickJsSurface {
    /// Create a surface showing an empty page
    pub fn new() -> SurfaceResult<Self> {
        let runtime = Runtime::new().map_err(runtime_error)?;
        let (outbox_tx, outbox_rx) = unbounded();
        let context = create_page(&runtime, outbox_tx.clone())?;

        Ok(Self {
            context: RefCell::new(context),
            runtime,
            signals: Signals::new(),
            outbox_tx,
            outbox_rx,
        })
    }

    /// Load a new page: fresh global state, then `page_script`, then
    /// navigation-completed
    ///
    /// A failing page script is reported after the signal has fired, the
    /// way a browser still finishes loading a page with a broken script.
    pub fn navigate(&self, page_script: &str) -> SurfaceResult<()> {
        let context = create_page(&self.runtime, self.outbox_tx.clone())?;
        *self.context.borrow_mut() = context;

        // messages from the previous page are gone with it
        let dropped = self.outbox_rx.try_iter().count();
        if dropped > 0 {
            tracing::debug!(target: "surface", "Dropped {} undelivered messages on navigation", dropped);
        }

        let loaded = self.evaluate_script(page_script).map(|_| ());
        if let Err(e) = &loaded {
            tracing::warn!(target: "surface", "Page script failed: {}", e);
        }
        self.run_pending_jobs();

        tracing::debug!(target: "surface", "Navigation completed");
        self.signals.emit_navigation_completed(self);
        loaded
    }

    /// Deliver queued messages and run pending promise jobs until both are
    /// drained; returns the number of messages delivered
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            self.run_pending_jobs();
            let batch: Vec<String> = self.outbox_rx.try_iter().collect();
            if batch.is_empty() {
                return delivered;
            }
            for message in batch {
                delivered += 1;
                self.signals.emit_message(self, &message);
            }
        }
        tracing::warn!(
            target: "surface",
            "Stopped pumping after {} rounds with messages still queued",
            MAX_PUMP_ROUNDS
        );
        delivered
    }

    /// Run queued promise jobs; returns how many ran
    pub fn run_pending_jobs(&self) -> usize {
        let mut executed = 0;
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => executed += 1,
                Ok(false) => break,
                Err(_) => {
                    executed += 1;
                    tracing::warn!(target: "surface", "A pending job threw");
                }
            }
        }
        executed
    }

    /// Messages posted but not yet delivered
    pub fn queued_messages(&self) -> usize {
        self.outbox_rx.len()
    }

    pub fn handler_count(&self) -> usize {
        self.signals.handler_count()
    }
}

impl Surface for QuickJsSurface {
    fn evaluate_script(&self, script: &str) -> SurfaceResult<String> {
        // exceptions are caught in script so their message survives
        let wrapped = format!(
            "(function () {{ try {{ return {ok} + String((0, eval)({source})); }} \
             catch (e) {{ return {err} + String(e && e.stack ? e + \"\\n\" + e.stack : e); }} }})()",
            ok = js_literal(OK_PREFIX),
            err = js_literal(ERR_PREFIX),
            source = js_literal(script),
        );

        let context = self.context.borrow();
        let completion = context
            .with(|ctx| ctx.eval::<String, _>(wrapped))
            .map_err(|e| SurfaceError::Runtime(e.to_string()))?;

        if let Some(value) = completion.strip_prefix(OK_PREFIX) {
            Ok(value.to_string())
        } else if let Some(error) = completion.strip_prefix(ERR_PREFIX) {
            Err(SurfaceError::Evaluation(error.trim_end().to_string()))
        } else {
            Err(SurfaceError::Runtime(format!(
                "unexpected completion {:?}",
                completion
            )))
        }
    }

    fn connect_navigation_completed(&self, handler: NavigationHandler) -> HandlerId {
        self.signals.connect_navigation(handler)
    }

    fn connect_message_received(&self, handler: MessageHandler) -> HandlerId {
        self.signals.connect_message(handler)
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        self.signals.disconnect(id)
    }
}

/// Fresh page context with the host globals installed
fn create_page(runtime: &Runtime, outbox: Sender<String>) -> SurfaceResult<Context> {
    let context = Context::full(runtime).map_err(runtime_error)?;

    context
        .with(|ctx| -> rquickjs::Result<()> {
            let global = ctx.globals();

            let external = Object::new(ctx.clone())?;
            external.set(
                "notify",
                Function::new(ctx.clone(), move |message: String| {
                    tracing::trace!(target: "surface", "Script posted {} bytes", message.len());
                    let _ = outbox.send(message);
                })?,
            )?;
            global.set("external", external)?;

            let console = Object::new(ctx.clone())?;
            console.set(
                "log",
                Function::new(ctx.clone(), |args: Rest<String>| {
                    tracing::info!(target: "script", "{}", args.0.join(" "));
                })?,
            )?;
            console.set(
                "warn",
                Function::new(ctx.clone(), |args: Rest<String>| {
                    tracing::warn!(target: "script", "{}", args.0.join(" "));
                })?,
            )?;
            console.set(
                "error",
                Function::new(ctx.clone(), |args: Rest<String>| {
                    tracing::error!(target: "script", "{}", args.0.join(" "));
                })?,
            )?;
            global.set("console", console)?;

            ctx.eval::<(), _>("globalThis.window = globalThis;")?;
            Ok(())
        })
        .map_err(runtime_error)?;

    Ok(context)
}

fn runtime_error(error: rquickjs::Error) -> SurfaceError {
    SurfaceError::Runtime(error.to_string())
}
