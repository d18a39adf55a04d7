//! Module host: instantiates the engine and wires its imports.
//!
//! Every module, the primary engine and anything it loads later, is
//! instantiated in one wasmtime [`Store`] against one [`Linker`], so all of
//! them share the same linear memory, function table and host imports.
//!
//! Import surface:
//!
//! | module    | name           | signature      |
//! |-----------|----------------|----------------|
//! | `js`      | `memory`       | shared memory  |
//! | `js`      | `table`        | funcref table  |
//! | `console` | `log`          | `(i32)`        |
//! | `console` | `logstr`       | `(i32)`        |
//! | `io`      | `outputString` | `(i32)`        |
//! | `io`      | `loadWasm`     | `(i32, i32)`   |
//! | `io`      | `getTimeInMs`  | `() -> i64`    |
//! | `io`      | `read`         | `()`           |

use std::thread;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};
use wasmtime::{
    Caller, Engine, Instance, Linker, Memory, MemoryType, Module, Ref, RefType, Store, Table,
    TableType,
};

use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::imports::HostImports;
use crate::memory::Marshaller;

const PAGE_SIZE: usize = 64 * 1024;

/// Compiles module images off the worker thread.
///
/// Compilation is fire-and-forget from the engine's point of view: the
/// finished module is queued and instantiated by the host before the next
/// entry point runs.
struct ModuleLoader {
    engine: Engine,
    done_tx: UnboundedSender<std::result::Result<Module, String>>,
    done_rx: UnboundedReceiver<std::result::Result<Module, String>>,
    in_flight: usize,
}

impl ModuleLoader {
    fn new(engine: Engine) -> Self {
        let (done_tx, done_rx) = unbounded_channel();
        Self {
            engine,
            done_tx,
            done_rx,
            in_flight: 0,
        }
    }

    fn spawn(&mut self, image: Vec<u8>) {
        let engine = self.engine.clone();
        let done = self.done_tx.clone();
        let size = image.len();
        let spawned = thread::Builder::new()
            .name("module-loader".into())
            .spawn(move || {
                let compiled = Module::new(&engine, &image).map_err(|e| e.to_string());
                let _ = done.send(compiled);
            });
        match spawned {
            Ok(_) => {
                self.in_flight += 1;
                debug!(size, "compiling module image");
            }
            Err(e) => error!("failed to start module loader: {}", e),
        }
    }

    fn try_take(&mut self) -> Option<std::result::Result<Module, String>> {
        let finished = self.done_rx.try_recv().ok()?;
        self.in_flight -= 1;
        Some(finished)
    }

    fn take_blocking(&mut self) -> Option<std::result::Result<Module, String>> {
        if self.in_flight == 0 {
            return None;
        }
        let finished = self.done_rx.blocking_recv()?;
        self.in_flight -= 1;
        Some(finished)
    }
}

/// State held by the wasmtime store.
pub struct HostState {
    imports: Box<dyn HostImports>,
    marshaller: Marshaller,
    memory: Option<Memory>,
    last_output: String,
    loader: ModuleLoader,
}

fn memory_of(caller: &Caller<'_, HostState>) -> wasmtime::Result<Memory> {
    caller
        .data()
        .memory
        .ok_or_else(|| wasmtime::Error::msg("linear memory not attached"))
}

fn address(raw: i32) -> usize {
    raw as u32 as usize
}

fn log(mut caller: Caller<'_, HostState>, value: i32) {
    caller.data_mut().imports.log_value(value);
}

fn log_str(mut caller: Caller<'_, HostState>, addr: i32) -> wasmtime::Result<()> {
    let memory = memory_of(&caller)?;
    let text = caller
        .data()
        .marshaller
        .read_string(memory.data(&caller), address(addr))
        .map_err(wasmtime::Error::new)?;
    caller.data_mut().imports.log_text(&text);
    Ok(())
}

fn output_string(mut caller: Caller<'_, HostState>, addr: i32) -> wasmtime::Result<()> {
    let memory = memory_of(&caller)?;
    let text = caller
        .data()
        .marshaller
        .read_string(memory.data(&caller), address(addr))
        .map_err(wasmtime::Error::new)?;
    let state = caller.data_mut();
    state.imports.emit_output(&text);
    state.last_output = text;
    Ok(())
}

fn load_wasm(mut caller: Caller<'_, HostState>, addr: i32, size: i32) -> wasmtime::Result<()> {
    let memory = memory_of(&caller)?;
    let image = caller
        .data()
        .marshaller
        .read_bytes(memory.data(&caller), address(addr), address(size))
        .map_err(wasmtime::Error::new)?
        .to_vec();
    caller.data_mut().loader.spawn(image);
    Ok(())
}

fn time_in_ms(mut caller: Caller<'_, HostState>) -> i64 {
    caller.data_mut().imports.now_millis()
}

fn read(mut caller: Caller<'_, HostState>) -> wasmtime::Result<()> {
    let Some(line) = caller.data_mut().imports.blocking_read() else {
        return Ok(());
    };
    let memory = memory_of(&caller)?;
    let marshaller = caller.data().marshaller;
    marshaller
        .append_string(memory.data_mut(&mut caller), &line)
        .map_err(wasmtime::Error::new)
}

/// Owns the loaded modules and their shared memory.
pub struct ModuleHost {
    store: Store<HostState>,
    linker: Linker<HostState>,
    memory: Memory,
    modules: Vec<Instance>,
}

impl ModuleHost {
    /// Create a host with an empty module set.
    pub fn new(config: &RuntimeConfig, imports: Box<dyn HostImports>) -> Result<Self> {
        let engine = Engine::default();
        let state = HostState {
            imports,
            marshaller: Marshaller::new(config.input_address),
            memory: None,
            last_output: String::new(),
            loader: ModuleLoader::new(engine.clone()),
        };
        let mut store = Store::new(&engine, state);

        let memory = Memory::new(&mut store, MemoryType::new(config.initial_pages, None))
            .map_err(|e| RuntimeError::wasm("memory", e))?;
        let table = Table::new(
            &mut store,
            TableType::new(RefType::FUNCREF, config.table_size, None),
            Ref::Func(None),
        )
        .map_err(|e| RuntimeError::wasm("table", e))?;
        store.data_mut().memory = Some(memory);

        let mut linker = Linker::new(&engine);
        Self::define_imports(&mut linker, &store, memory, table)
            .map_err(|e| RuntimeError::wasm("linker", e))?;

        Ok(Self {
            store,
            linker,
            memory,
            modules: Vec::new(),
        })
    }

    fn define_imports(
        linker: &mut Linker<HostState>,
        store: &Store<HostState>,
        memory: Memory,
        table: Table,
    ) -> wasmtime::Result<()> {
        linker.define(store, "js", "memory", memory)?;
        linker.define(store, "js", "table", table)?;
        linker.func_wrap("console", "log", log)?;
        linker.func_wrap("console", "logstr", log_str)?;
        linker.func_wrap("io", "outputString", output_string)?;
        linker.func_wrap("io", "loadWasm", load_wasm)?;
        linker.func_wrap("io", "getTimeInMs", time_in_ms)?;
        linker.func_wrap("io", "read", read)?;
        Ok(())
    }

    /// Compile and instantiate the primary engine, then run its `init`.
    pub fn load_primary(&mut self, image: &[u8]) -> Result<()> {
        let module = Module::new(self.store.engine(), image)
            .map_err(|e| RuntimeError::wasm("compile", e))?;
        let instance = self
            .linker
            .instantiate(&mut self.store, &module)
            .map_err(|e| RuntimeError::wasm("instantiate", e))?;
        self.modules.insert(0, instance);

        let init = instance
            .get_typed_func::<(), ()>(&mut self.store, "init")
            .map_err(|_| RuntimeError::MissingExport("init"))?;
        init.call(&mut self.store, ())
            .map_err(|e| RuntimeError::wasm("init", e))?;
        info!("primary module initialised");
        Ok(())
    }

    /// Read and evaluate one form.
    pub fn evaluate_one(&mut self, text: &str) -> Result<String> {
        self.call_entry("readAndEval", text)
    }

    /// Read one form and return its printed datum.
    pub fn evaluate_quoted(&mut self, text: &str) -> Result<String> {
        self.call_entry("readAndEvalquote", text)
    }

    /// Read and evaluate every form in `text`.
    pub fn evaluate_all(&mut self, text: &str) -> Result<String> {
        self.call_entry("readAndEvalAll", text)
    }

    /// Change the engine's debug level.
    pub fn set_debug_level(&mut self, level: i32) -> Result<()> {
        self.wait_for_loads();
        let func = self
            .primary()?
            .get_typed_func::<i32, ()>(&mut self.store, "setDebugLevel")
            .map_err(|_| RuntimeError::MissingExport("setDebugLevel"))?;
        func.call(&mut self.store, level)
            .map_err(|e| RuntimeError::wasm("setDebugLevel", e))
    }

    fn call_entry(&mut self, export: &'static str, text: &str) -> Result<String> {
        // Modules requested by the previous call are visible to this one.
        self.wait_for_loads();
        let func = self
            .primary()?
            .get_typed_func::<(), ()>(&mut self.store, export)
            .map_err(|_| RuntimeError::MissingExport(export))?;
        self.write_input(text)?;
        debug!(export, "calling engine");
        func.call(&mut self.store, ())
            .map_err(|e| RuntimeError::wasm(export, e))?;
        Ok(self.store.data().last_output.clone())
    }

    fn primary(&self) -> Result<Instance> {
        self.modules.first().copied().ok_or(RuntimeError::NotLoaded)
    }

    /// Store `text` in the input cell, growing memory first if needed.
    pub fn write_input(&mut self, text: &str) -> Result<()> {
        let marshaller = self.store.data().marshaller;
        let needed = marshaller.input_address() + text.len() + 1;
        let size = self.memory.data_size(&self.store);
        if needed > size {
            let pages = (needed - size).div_ceil(PAGE_SIZE) as u64;
            self.memory
                .grow(&mut self.store, pages)
                .map_err(|e| RuntimeError::wasm("grow", e))?;
        }
        marshaller.write_string(self.memory.data_mut(&mut self.store), text)?;
        Ok(())
    }

    /// The pending text at the input cell.
    pub fn read_input(&self) -> Result<String> {
        let marshaller = self.store.data().marshaller;
        Ok(marshaller.read_input(self.memory.data(&self.store))?)
    }

    /// The most recent chunk passed to `io.outputString`.
    pub fn last_output(&self) -> &str {
        &self.store.data().last_output
    }

    /// Instantiate every module whose compilation has finished.
    ///
    /// Returns the number of modules added.
    pub fn poll_loaded(&mut self) -> usize {
        let mut added = 0;
        while let Some(finished) = self.store.data_mut().loader.try_take() {
            added += self.instantiate_loaded(finished);
        }
        added
    }

    /// Wait for every pending compilation and instantiate the results.
    pub fn wait_for_loads(&mut self) -> usize {
        let mut added = self.poll_loaded();
        while let Some(finished) = self.store.data_mut().loader.take_blocking() {
            added += self.instantiate_loaded(finished);
        }
        added
    }

    fn instantiate_loaded(&mut self, finished: std::result::Result<Module, String>) -> usize {
        let module = match finished {
            Ok(module) => module,
            Err(e) => {
                error!("dropping module image that failed to compile: {}", e);
                return 0;
            }
        };
        match self.linker.instantiate(&mut self.store, &module) {
            Ok(instance) => {
                self.modules.push(instance);
                info!(count = self.modules.len(), "loaded module");
                1
            }
            Err(e) => {
                error!("dropping module that failed to instantiate: {}", e);
                0
            }
        }
    }

    /// Number of instantiated modules, the primary included.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}
