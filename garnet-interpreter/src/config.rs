use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::sync::{Arc, Mutex};

use garnet_core::LocationDetail;

/// The sink every console-facing built-in (and every warning) goes through.
pub trait Console: Send + Sync {
    /// Write some text, without a trailing newline.
    fn write(&self, text: &str);
    /// Write a line of text.
    fn write_line(&self, text: &str) {
        self.write(text);
        self.write("\n");
    }
    /// Read a line of input (including its trailing newline), or `None` at the end of input.
    fn read_line(&self) -> Option<String>;
    /// Read a single key press, or `None` at the end of input.
    fn read_key(&self) -> Option<char>;
}

/// A console bound to the process' standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl Console for StdConsole {
    fn write(&self, text: &str) {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    fn read_key(&self) -> Option<char> {
        let mut buffer = [0u8; 1];
        match io::stdin().lock().read(&mut buffer) {
            Ok(1) => Some(char::from(buffer[0])),
            _ => None,
        }
    }
}

/// A console that records everything written to it and replays scripted input.
///
/// This is mostly useful for tests and embedders that want to inspect a program's output.
#[derive(Debug, Default)]
pub struct CapturedConsole {
    output: Mutex<String>,
    input: Mutex<Vec<String>>,
}

impl CapturedConsole {
    /// Create a new, empty, capturing console.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a capturing console that will answer `read_line` with the given lines, in order.
    pub fn with_input<I, S>(lines: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut input: Vec<String> = lines.into_iter().map(Into::into).collect();
        input.reverse();
        Arc::new(Self {
            output: Mutex::default(),
            input: Mutex::new(input),
        })
    }

    /// Everything written so far.
    pub fn output(&self) -> String {
        self.output.lock().map(|out| out.clone()).unwrap_or_default()
    }

    /// Take everything written so far, leaving the capture empty.
    pub fn take(&self) -> String {
        self.output
            .lock()
            .map(|mut out| std::mem::take(&mut *out))
            .unwrap_or_default()
    }
}

impl Console for CapturedConsole {
    fn write(&self, text: &str) {
        if let Ok(mut output) = self.output.lock() {
            output.push_str(text);
        }
    }

    fn read_line(&self) -> Option<String> {
        self.input.lock().ok()?.pop().map(|mut line| {
            if !line.ends_with('\n') {
                line.push('\n');
            }
            line
        })
    }

    fn read_key(&self) -> Option<char> {
        let mut input = self.input.lock().ok()?;
        let line = input.last_mut()?;
        if line.is_empty() {
            input.pop();
            return Some('\n');
        }
        Some(line.remove(0))
    }
}

/// The interpreter's configuration, consumed once by [`Universe::new`](crate::universe::Universe::new).
#[derive(Clone)]
pub struct Config {
    /// How much of a location is rendered in error messages and warnings.
    pub location_detail: LocationDetail,
    /// How many runtime-created symbols are kept before random eviction kicks in.
    pub mortal_symbol_capacity: usize,
    /// Whether host interop projections are prepared ahead of time (only affects latency).
    pub compile_interop: bool,
    /// Whether `Thread.new` really spawns a host thread.
    pub thread_safety: bool,
    /// Whether filesystem-touching built-ins (`File`) are left out.
    pub sandbox: bool,
    /// The maximum depth of nested method and block invocations.
    pub max_call_depth: usize,
    /// The stack size of the host threads running guest code.
    pub stack_size: usize,
    /// Where console output goes and console input comes from.
    pub console: Arc<dyn Console>,
}

impl Config {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how much of a location is rendered in diagnostics.
    pub fn location_detail(mut self, detail: LocationDetail) -> Self {
        self.location_detail = detail;
        self
    }

    /// Set the capacity of the mortal symbol cache.
    pub fn mortal_symbol_capacity(mut self, capacity: usize) -> Self {
        self.mortal_symbol_capacity = capacity;
        self
    }

    /// Set whether interop projections are prepared ahead of time.
    pub fn compile_interop(mut self, enabled: bool) -> Self {
        self.compile_interop = enabled;
        self
    }

    /// Set whether guest threads map onto host threads.
    pub fn thread_safety(mut self, enabled: bool) -> Self {
        self.thread_safety = enabled;
        self
    }

    /// Set whether the filesystem-touching built-ins are left out.
    pub fn sandbox(mut self, enabled: bool) -> Self {
        self.sandbox = enabled;
        self
    }

    /// Set the maximum call depth.
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the stack size of worker threads.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    /// Set the console sink.
    pub fn console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location_detail: LocationDetail::Line,
            mortal_symbol_capacity: 10_000,
            compile_interop: false,
            thread_safety: true,
            sandbox: false,
            max_call_depth: 1_000,
            stack_size: 256 * 1024 * 1024,
            console: Arc::new(StdConsole),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("location_detail", &self.location_detail)
            .field("mortal_symbol_capacity", &self.mortal_symbol_capacity)
            .field("compile_interop", &self.compile_interop)
            .field("thread_safety", &self.thread_safety)
            .field("sandbox", &self.sandbox)
            .field("max_call_depth", &self.max_call_depth)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}
