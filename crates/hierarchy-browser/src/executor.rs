//! In-process execution of downloaded parts.
//!
//! A part is JavaScript evaluated by an embedded QuickJS engine. The script
//! sees the invocation as a command line: `argv` (and `process.argv`) is
//! `[uniqueId, title, id]`. `print` and `console.*` output is captured and
//! returned. The engine has no filesystem, network or process bindings, and
//! every run gets a fresh runtime bounded in memory and wall-clock time.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use hierarchy_model::WPObject;
use log::info;
use rquickjs::function::Func;
use rquickjs::{Context, Ctx, Runtime};

use crate::error::PartExecutionError;

const PRELUDE: &str = r"
globalThis.print = (...args) => __capture(args.map((a) =>
    typeof a === 'string' ? a : a === undefined ? 'undefined' : JSON.stringify(a)
).join(' '));
globalThis.console = { log: print, info: print, warn: print, error: print, debug: print };
globalThis.process = { argv: argv };
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorLimits {
    pub timeout: Duration,
    pub memory_limit: usize,
}

impl Default for ExecutorLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            memory_limit: 64 * 1024 * 1024,
        }
    }
}

/// What a part printed while it ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartOutput {
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PartExecutor {
    limits: ExecutorLimits,
}

impl PartExecutor {
    #[must_use]
    pub fn new(limits: ExecutorLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> ExecutorLimits {
        self.limits
    }

    /// Run `script` for `object`. Blocks until the script returns, throws or
    /// hits a limit.
    ///
    /// # Errors
    /// `Script` when the script throws, `Timeout` or `MemoryLimit` when it
    /// exceeds its limits, `Engine` when the engine cannot be set up.
    pub fn run(
        &self,
        unique_id: &str,
        script: &str,
        object: &WPObject,
    ) -> Result<PartOutput, PartExecutionError> {
        info!("Running part {unique_id} on {}", object.id);
        let engine_error = |err: rquickjs::Error| PartExecutionError::Engine(err.to_string());

        let runtime = Runtime::new().map_err(engine_error)?;
        runtime.set_memory_limit(self.limits.memory_limit);
        let deadline = Instant::now() + self.limits.timeout;
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));
        let context = Context::full(&runtime).map_err(engine_error)?;

        let output = Rc::new(RefCell::new(Vec::new()));
        let argv = vec![unique_id.to_string(), object.title.clone(), object.id.clone()];

        context.with(|ctx| -> Result<(), PartExecutionError> {
            install_globals(&ctx, argv, Rc::clone(&output)).map_err(engine_error)?;
            match ctx.eval::<rquickjs::Value<'_>, _>(script) {
                Ok(_) => Ok(()),
                Err(rquickjs::Error::Exception) => {
                    Err(self.classify(&exception_message(&ctx), deadline))
                }
                Err(rquickjs::Error::Allocation) => Err(PartExecutionError::MemoryLimit),
                Err(err) => Err(engine_error(err)),
            }
        })?;

        let lines = std::mem::take(&mut *output.borrow_mut());
        Ok(PartOutput { lines })
    }

    fn classify(&self, message: &str, deadline: Instant) -> PartExecutionError {
        if Instant::now() >= deadline {
            PartExecutionError::Timeout(self.limits.timeout)
        } else if message.contains("out of memory") {
            PartExecutionError::MemoryLimit
        } else {
            PartExecutionError::Script(message.to_string())
        }
    }
}

fn install_globals(
    ctx: &Ctx<'_>,
    argv: Vec<String>,
    output: Rc<RefCell<Vec<String>>>,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    globals.set("argv", argv)?;
    globals.set(
        "__capture",
        Func::from(move |line: String| output.borrow_mut().push(line)),
    )?;
    ctx.eval::<rquickjs::Value<'_>, _>(PRELUDE)?;
    Ok(())
}

fn exception_message(ctx: &Ctx<'_>) -> String {
    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        return exception
            .message()
            .unwrap_or_else(|| "uncaught exception".to_string());
    }
    caught
        .as_string()
        .and_then(|s| s.to_string().ok())
        .unwrap_or_else(|| format!("{caught:?}"))
}
