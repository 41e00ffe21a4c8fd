use super::abi::{check_statements, Abi, Symbols};
use super::builtins::{BuiltinFn, BuiltinId, Builtins};
use super::call::CallFrame;
use super::debugger::{DebugHandler, Watch};
use super::edict::Edicts;
use super::resources::{Resource, Resources};
use super::{Config, Hooks, Memory, Ptr, Stack, Strings, Value, Word, Zone};
use crate::error;
use crate::prog::{Def, DebugInfo, Error, Etype, FunctionDef, Image, PROG_ID_VERSION};
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Result<T> = std::result::Result<T, Error>;

/// Runs after a successful load, before the `.ctor` functions.
pub type LoadFn = fn(&mut Progs) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Function 0.
    Null,
    Statement(u32),
    Builtin(i32),
    /// A builtin that could not be bound; calling it is an error.
    Missing(i32),
}

#[derive(Clone)]
pub struct Function {
    pub def: FunctionDef,
    pub name: String,
    pub entry: Entry,
    pub(crate) native: Option<BuiltinFn>,
    /// Statements executed in this function, or calls for a builtin.
    pub profile: u64,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function {{ name: {:?}, entry: {:?} }}", self.name, self.entry)
    }
}

/// ## Regions of the flat address space
///
/// Each region starts on a 64-cell boundary.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    /// Cells of initialised globals from the image.
    pub globals: u32,
    pub edict_area: u32,
    /// Cells per edict; entity values are multiples of this.
    pub edict_size: u32,
    pub zone_base: u32,
    pub zone_size: u32,
    pub stack_bottom: u32,
    /// Total cells; the stack ends here.
    pub globals_size: u32,
}

fn align64(n: u64) -> u64 {
    (n + 63) & !63
}

impl Layout {
    pub fn compute(image: &Image, config: &Config) -> Result<Layout> {
        let globals = image.globals.len() as u64;
        let edict_size = image.entityfields().max(1) as u64;
        let edict_area = align64(globals);
        let zone_base = align64(edict_area + config.max_edicts as u64 * edict_size);
        let stack_bottom = align64(zone_base + config.zone_size as u64);
        let globals_size = align64(stack_bottom + config.stack_size as u64);
        if globals_size > i32::max_value() as u64 {
            return Err(error!(OutOfMemory; "{} cells is too large an address space", globals_size));
        }
        Ok(Layout {
            globals: globals as u32,
            edict_area: edict_area as u32,
            edict_size: edict_size as u32,
            zone_base: zone_base as u32,
            zone_size: config.zone_size,
            stack_bottom: stack_bottom as u32,
            globals_size: globals_size as u32,
        })
    }
}

/// ## A QuakeC virtual machine
///
/// One loaded image with its memory, strings, edicts and builtins. All
/// state lives here; independent instances can run on different
/// threads.

pub struct Progs {
    pub config: Config,
    pub hooks: Hooks,
    pub(crate) path: PathBuf,
    pub(crate) image: Image,
    pub(crate) functions: Vec<Function>,
    pub(crate) symbols: Symbols,
    pub(crate) abi: Abi,
    pub(crate) debug: Option<DebugInfo>,
    pub(crate) memory: Memory,
    pub(crate) layout: Layout,
    pub(crate) zone: Option<Zone>,
    pub(crate) strings: Strings,
    pub(crate) builtins: Builtins,
    pub(crate) resources: Resources,
    pub(crate) edicts: Edicts,
    pub(crate) frames: Stack<CallFrame>,
    pub(crate) locals: Stack<u32>,
    pub(crate) xstatement: u32,
    pub(crate) xfunction: usize,
    pub(crate) argc: usize,
    pub(crate) trace: bool,
    pub(crate) watch: Option<Watch>,
    pub(crate) debug_handler: Option<Box<dyn DebugHandler + Send>>,
    pub(crate) output: Box<dyn Write + Send>,
    pub(crate) interrupt: Arc<AtomicBool>,
    pub(crate) load_funcs: Vec<LoadFn>,
}

impl std::fmt::Debug for Progs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Progs {{ path: {:?}, functions: {}, layout: {:?} }}",
            self.path,
            self.functions.len(),
            self.layout
        )
    }
}

impl Default for Progs {
    fn default() -> Progs {
        Progs::new(Config::default())
    }
}

impl Progs {
    pub fn new(config: Config) -> Progs {
        let frames = Stack::new(config.max_call_depth, "stack overflow", "prog stack underflow");
        let locals = Stack::new(
            config.locals_stack_size,
            "locals stack overflow",
            "locals stack underflow",
        );
        Progs {
            trace: config.trace,
            config,
            hooks: Hooks::default(),
            path: PathBuf::new(),
            image: Image::default(),
            functions: vec![],
            symbols: Symbols::default(),
            abi: Abi::default(),
            debug: None,
            memory: Memory::default(),
            layout: Layout::default(),
            zone: None,
            strings: Strings::default(),
            builtins: Builtins::new(),
            resources: Resources::default(),
            edicts: Edicts::default(),
            frames,
            locals,
            xstatement: 0,
            xfunction: 0,
            argc: 0,
            watch: None,
            debug_handler: None,
            output: Box::new(std::io::stdout()),
            interrupt: Arc::new(AtomicBool::new(false)),
            load_funcs: vec![],
        }
    }

    /// Where `print` and tracing go; stdout by default.
    pub fn set_output(&mut self, output: Box<dyn Write + Send>) {
        self.output = output;
    }

    pub fn print(&mut self, s: &str) {
        if self.output.write_all(s.as_bytes()).is_err() {
            log::warn!("progs output failed");
        }
        let _ = self.output.flush();
    }

    /// Setting the flag stops the running `execute` at the next
    /// statement.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub fn add_load_func(&mut self, func: LoadFn) {
        self.load_funcs.push(func);
    }

    pub fn register_builtin(&mut self, name: &str, id: BuiltinId, func: BuiltinFn) -> Result<i32> {
        self.builtins.register(name, id, func)
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn register_resource<R: Resource>(&mut self, name: &str, resource: R) -> Result<()> {
        self.resources.register(name, resource)
    }

    pub fn find_resource<R: Resource>(&self, name: &str) -> Option<&R> {
        self.resources.find(name)
    }

    pub fn find_resource_mut<R: Resource>(&mut self, name: &str) -> Option<&mut R> {
        self.resources.find_mut(name)
    }

    pub fn set_debug_handler(&mut self, handler: Option<Box<dyn DebugHandler + Send>>) {
        self.debug_handler = handler;
    }

    pub fn has_debug_handler(&self) -> bool {
        self.debug_handler.is_some()
    }

    /// Reads an image through the `load_file` hook and loads it. The
    /// debug file it names is looked for next to it.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let bytes = (self.hooks.load_file)(path)
            .map_err(|e| error!(Io; "{}: {}", path.display(), e))?;
        self.path = path.to_path_buf();
        self.load(&bytes)
    }

    /// Replaces whatever was loaded. On failure nothing stays loaded.
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        match self.load_image(bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.unload();
                Err(e)
            }
        }
    }

    fn unload(&mut self) {
        self.resources.clear();
        let memory = std::mem::take(&mut self.memory);
        if !memory.is_empty() {
            (self.hooks.free)(memory.into_cells());
        }
        self.image = Image::default();
        self.functions.clear();
        self.symbols = Symbols::default();
        self.abi = Abi::default();
        self.debug = None;
        self.layout = Layout::default();
        self.zone = None;
        self.strings = Strings::default();
        self.edicts = Edicts::default();
        self.frames.clear();
        self.locals.clear();
        self.xstatement = 0;
        self.xfunction = 0;
        self.argc = 0;
        self.watch = None;
    }

    fn load_image(&mut self, bytes: &[u8]) -> Result<()> {
        self.unload();
        let image = Image::parse(bytes)?;
        if let Some(crc) = self.config.required_crc {
            if image.header.crc != crc {
                return Err(error!(CrcMismatch;
                    "progs has CRC {} but {} is required",
                    image.header.crc,
                    crc
                ));
            }
        }
        if self.config.reserved_edicts >= self.config.max_edicts {
            return Err(error!(OutOfMemory;
                "{} reserved edicts leave no room in {}",
                self.config.reserved_edicts,
                self.config.max_edicts
            ));
        }

        let layout = Layout::compute(&image, &self.config)?;
        let size = layout.globals_size as usize;
        let mut cells = match (self.hooks.allocate)(size) {
            Some(cells) if cells.len() >= size => cells,
            _ => return Err(error!(OutOfMemory; "unable to allocate {} cells for progs", size)),
        };
        cells.truncate(size);
        for cell in cells.iter_mut() {
            *cell = 0;
        }
        cells[..image.globals.len()].copy_from_slice(&image.globals);
        self.memory = Memory::new(cells);
        self.layout = layout;
        log::debug!("progs layout {:?}", layout);

        self.symbols = Symbols::build(&image);
        self.strings.load(image.strings.clone());
        self.image = image;
        self.functions = self.link_functions()?;

        if layout.zone_size > 0 {
            let zone = Zone::new(layout.zone_base, layout.zone_size);
            zone.init(&mut self.memory)?;
            self.zone = Some(zone);
        }
        self.edicts.reset(self.config.max_edicts, 1 + self.config.reserved_edicts);

        if self.config.load_debug {
            self.load_named_debug();
        }

        self.abi = Abi::resolve(&self.image, &self.symbols)?;
        if let Some(ofs) = self.abi.stack_ofs {
            self.memory.set(ofs, layout.globals_size)?;
        }
        if let Some(resolve) = self.hooks.resolve {
            resolve(self)?;
        }
        check_statements(&self.image, &self.abi)?;

        log::info!(
            "loaded progs version {} crc {}: {} functions, {} statements, {} globals, {} fields",
            self.image.version(),
            self.image.header.crc,
            self.image.functions.len(),
            self.image.statements.len(),
            self.image.globals.len(),
            self.image.entityfields()
        );

        for func in self.load_funcs.clone() {
            func(self)?;
        }
        let ctors: Vec<usize> = self
            .functions
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name == ".ctor")
            .map(|(i, _)| i)
            .collect();
        for ctor in ctors {
            self.execute(ctor as i32)?;
        }
        Ok(())
    }

    /// Binds each builtin descriptor to a registered builtin.
    fn link_functions(&self) -> Result<Vec<Function>> {
        let mut functions = Vec::with_capacity(self.image.functions.len());
        let mut unresolved = vec![];
        for (i, def) in self.image.functions.iter().enumerate() {
            let name = self.image.string(def.name).into_owned();
            let mut native = None;
            let entry = if i == 0 {
                Entry::Null
            } else if def.first_statement > 0 {
                Entry::Statement(def.first_statement as u32)
            } else {
                let found = if def.first_statement == 0 {
                    self.builtins.by_name(&name)
                } else {
                    let id = -def.first_statement;
                    let id = match self.hooks.bi_map {
                        Some(map) => map(id),
                        None => id,
                    };
                    self.builtins.by_id(id)
                };
                match found {
                    Some(builtin) => {
                        native = Some(builtin.func);
                        Entry::Builtin(builtin.id)
                    }
                    None => {
                        if self.config.permissive_builtins {
                            log::warn!("builtin {} (#{}) not found", name, -def.first_statement);
                        } else {
                            log::error!("builtin {} (#{}) not found", name, -def.first_statement);
                            unresolved.push(name.clone());
                        }
                        Entry::Missing(-def.first_statement)
                    }
                }
            };
            functions.push(Function {
                def: *def,
                name,
                entry,
                native,
                profile: 0,
            });
        }
        if !unresolved.is_empty() {
            return Err(error!(UnresolvedBuiltin; "{}", unresolved.join(", ")));
        }
        Ok(functions)
    }

    fn load_named_debug(&mut self) {
        let handle = match self.global::<i32>(".debug_file") {
            Ok(handle) => handle,
            Err(_) => return,
        };
        let name = match self.strings.get_str(handle) {
            Ok(name) if !name.is_empty() => name.into_owned(),
            _ => return,
        };
        let path = match self.path.parent() {
            Some(dir) => dir.join(&name),
            None => PathBuf::from(&name),
        };
        if let Err(e) = self.load_debug(&path) {
            log::warn!("{}: {}; debug info ignored", path.display(), e);
        }
    }

    /// Loads debug symbols for the current image; a file built for a
    /// different image is refused.
    pub fn load_debug(&mut self, path: &Path) -> Result<()> {
        let bytes = (self.hooks.load_file)(path)
            .map_err(|e| error!(Io; "{}: {}", path.display(), e))?;
        self.load_debug_bytes(&bytes)
    }

    pub fn load_debug_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let info = DebugInfo::parse(bytes, &self.image)?;
        log::debug!(
            "debug info: {} functions, {} lines",
            info.auxfunctions.len(),
            info.linenos.len()
        );
        self.debug = Some(info);
        Ok(())
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn is_loaded(&self) -> bool {
        !self.functions.is_empty()
    }

    pub fn is_legacy(&self) -> bool {
        self.image.version() == PROG_ID_VERSION
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug.as_ref()
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, fnum: usize) -> Option<&Function> {
        self.functions.get(fnum)
    }

    pub fn find_function(&self, name: &str) -> Option<i32> {
        self.symbols.functions.get(name).map(|&i| i as i32)
    }

    pub fn function_name(&self, fnum: i32) -> String {
        if fnum < 0 {
            return match self.builtins.by_id(-fnum) {
                Some(b) => b.name.clone(),
                None => format!("builtin #{}", -fnum),
            };
        }
        match self.functions.get(fnum as usize) {
            Some(f) => f.name.clone(),
            None => format!("function {}", fnum),
        }
    }

    pub fn find_global(&self, name: &str) -> Option<Def> {
        self.symbols.globals.get(name).copied()
    }

    pub fn find_field(&self, name: &str) -> Option<Def> {
        self.symbols.fields.get(name).copied()
    }

    /// Name of the global or, inside a function with debug info, the
    /// local at `ofs`.
    pub fn global_name(&self, ofs: u16) -> Option<String> {
        if let Some(debug) = &self.debug {
            if let Some(name) = debug.local_name(&self.image, self.xfunction, ofs as u32) {
                return Some(name);
            }
        }
        self.symbols.global_name(ofs).map(|s| s.to_string())
    }

    fn global_def(&self, name: &str) -> Result<Def> {
        match self.find_global(name) {
            Some(def) => Ok(def),
            None => Err(error!(MissingSymbol; "no global named {}", name)),
        }
    }

    pub fn global_ptr(&self, name: &str) -> Result<Ptr> {
        Ok(Ptr(self.global_def(name)?.offset as u32))
    }

    pub fn global<T: Word>(&self, name: &str) -> Result<T> {
        self.memory.get(self.global_def(name)?.offset as u32)
    }

    pub fn set_global<T: Word>(&mut self, name: &str, v: T) -> Result<()> {
        let def = self.global_def(name)?;
        self.memory.set(def.offset as u32, v)
    }

    /// A global read as its declared type.
    pub fn global_value(&self, name: &str) -> Result<Value> {
        let def = self.global_def(name)?;
        self.memory.value(def.offset as u32, def.etype())
    }

    pub fn time(&self) -> Result<f32> {
        self.memory.get(self.abi.time_ofs)
    }

    pub fn set_time(&mut self, time: f32) -> Result<()> {
        self.memory.set(self.abi.time_ofs, time)
    }

    fn param_ofs(&self, i: usize) -> Result<u32> {
        match self.abi.param_ofs.get(i) {
            Some(&ofs) => Ok(ofs),
            None => Err(error!(OutOfBounds; "there is no parameter {}", i)),
        }
    }

    pub fn param<T: Word>(&self, i: usize) -> Result<T> {
        self.memory.get(self.param_ofs(i)?)
    }

    pub fn set_param<T: Word>(&mut self, i: usize, v: T) -> Result<()> {
        let ofs = self.param_ofs(i)?;
        self.memory.set(ofs, v)
    }

    /// Count of arguments passed to the running builtin.
    pub fn argc(&self) -> usize {
        self.argc
    }

    pub fn return_value<T: Word>(&self) -> Result<T> {
        self.memory.get(self.abi.return_ofs)
    }

    pub fn set_return<T: Word>(&mut self, v: T) -> Result<()> {
        self.memory.set(self.abi.return_ofs, v)
    }

    pub fn string(&self, handle: i32) -> Result<Cow<'_, str>> {
        self.strings.get_str(handle)
    }

    pub fn strings(&self) -> &Strings {
        &self.strings
    }

    pub fn param_string(&self, i: usize) -> Result<String> {
        let handle = self.param::<i32>(i)?;
        Ok(self.strings.get_str(handle)?.into_owned())
    }

    /// Returns `s` from a builtin.
    pub fn return_string(&mut self, s: &str) -> Result<()> {
        let handle = self.strings.make_return(s);
        self.set_return(handle)
    }

    pub fn make_temp_string(&mut self, s: &str) -> i32 {
        self.strings.make_temp(s)
    }

    pub fn make_dynamic_string(&mut self, s: &str) -> i32 {
        self.strings.make_dynamic(s)
    }

    pub fn make_return_string(&mut self, s: &str) -> i32 {
        self.strings.make_return(s)
    }

    pub fn free_string(&mut self, handle: i32) -> Result<()> {
        self.strings.free(handle)
    }

    /// Text for a value, resolving strings, functions and entities.
    pub fn value_string(&self, value: Value) -> String {
        match value {
            Value::String(h) => match self.strings.get_str(h) {
                Ok(s) => format!("{:?}", s),
                Err(_) => format!("<bad string {}>", h),
            },
            Value::Func(0) => "NULL function".to_string(),
            Value::Func(f) => format!("{}()", self.function_name(f)),
            Value::Entity(e) => match self.entity_to_edict(e) {
                Ok(n) => format!("entity {}", n),
                Err(_) => format!("<bad entity {}>", e),
            },
            Value::Field(ofs) => {
                let name = self
                    .image
                    .fielddefs
                    .iter()
                    .find(|d| d.offset as u32 == ofs)
                    .map(|d| self.image.string(d.name).into_owned());
                match name {
                    Some(name) => format!(".{}", name),
                    None => format!(".{}", ofs),
                }
            }
            other => other.to_string(),
        }
    }

    fn zone(&self) -> Result<Zone> {
        match self.zone {
            Some(zone) => Ok(zone),
            None => Err(error!(Zone; "no zone configured")),
        }
    }

    pub fn zone_info(&self) -> Option<Zone> {
        self.zone
    }

    pub fn set_zone_error_hook(&mut self, hook: Option<super::ZoneErrorFn>) {
        if let Some(zone) = &mut self.zone {
            zone.set_error_hook(hook);
        }
    }

    pub fn zone_malloc(&mut self, size: u32) -> Result<Ptr> {
        self.zone()?.malloc(&mut self.memory, size)
    }

    pub fn zone_tag_malloc(&mut self, size: u32, tag: u32) -> Result<Ptr> {
        self.zone()?.tag_malloc(&mut self.memory, size, tag)
    }

    pub fn zone_free(&mut self, ptr: Ptr) -> Result<()> {
        self.zone()?.free(&mut self.memory, ptr)
    }

    pub fn zone_free_tags(&mut self, tag: u32) -> Result<()> {
        self.zone()?.free_tags(&mut self.memory, tag)
    }

    pub fn zone_realloc(&mut self, ptr: Ptr, size: u32) -> Result<Ptr> {
        self.zone()?.realloc(&mut self.memory, ptr, size)
    }

    pub fn zone_check(&self) -> Result<()> {
        self.zone()?.check_heap(&self.memory)
    }

    pub fn zone_dump(&self) -> Result<String> {
        self.zone()?.dump(&self.memory)
    }

    /// A value of type `etype` at global offset `ofs`.
    pub fn global_at(&self, ofs: u32, etype: Etype) -> Result<Value> {
        self.memory.value(ofs, etype)
    }
}
