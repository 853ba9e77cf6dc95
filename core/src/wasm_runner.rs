/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * Wasmtime Runtime Execution for Bridge Guests.
 *
 * Compiles a guest .wasm, links the bridge imports, instantiates it, caches
 * the exports the bridge relies on (memory, allocator, dispatcher, version)
 * and runs the version handshake. Host-initiated calls (start, exported
 * functions, callback proxies) go through the same GuestEnv seam as calls
 * made from inside guest imports.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

use crate::bridge::{self, Bridge};
use crate::callback;
use crate::config::BridgeConfig;
use crate::dispatch::{self, Throw};
use crate::env::GuestEnv;
use crate::error::BridgeError;
use crate::handle_table::Handle;
use crate::value::HostValue;
use crate::version::Handshake;
use crate::wasm_host_imports;
use crate::wasm_interop::{self, GuestManifest};
use tracing::{debug, info};
use wasmtime::{
    AsContextMut, Caller, Engine, Extern, Instance, Linker, Memory, Module, Store, TypedFunc, Val,
};

// =============================================================================
// Host State
// =============================================================================

/// Guest exports the bridge calls back into, resolved once after instantiation.
#[derive(Default, Clone)]
struct GuestExports {
    memory: Option<Memory>,
    alloc: Option<TypedFunc<i32, i32>>,
    dispatch: Option<TypedFunc<(i32, i32, i32), i32>>,
    version: Option<TypedFunc<(), i32>>,
}

impl GuestExports {
    fn resolve(store: &mut Store<HostState>, instance: &Instance) -> Result<Self, BridgeError> {
        let config = store.data().bridge.config().clone();
        Ok(GuestExports {
            memory: instance.get_memory(&mut *store, &config.memory_export),
            alloc: typed_export(store, instance, &config.alloc_export)?,
            dispatch: typed_export(store, instance, &config.dispatch_export)?,
            version: typed_export(store, instance, &config.version_export)?,
        })
    }
}

fn typed_export<P, R>(
    store: &mut Store<HostState>,
    instance: &Instance,
    name: &str,
) -> Result<Option<TypedFunc<P, R>>, BridgeError>
where
    P: wasmtime::WasmParams,
    R: wasmtime::WasmResults,
{
    instance
        .get_func(&mut *store, name)
        .map(|func| func.typed::<P, R>(&*store))
        .transpose()
        .map_err(|e| BridgeError::InvalidModule(format!("export '{}': {}", name, e)))
}

/// Store data for a guest instance.
pub struct HostState {
    pub bridge: Bridge,
    exports: GuestExports,
}

impl HostState {
    pub fn new(config: BridgeConfig) -> Self {
        HostState {
            bridge: Bridge::new(config),
            exports: GuestExports::default(),
        }
    }
}

/// Maps a failed guest call to a bridge error, keeping bridge errors raised
/// by nested imports intact.
fn guest_error(err: wasmtime::Error) -> BridgeError {
    match err.downcast_ref::<BridgeError>() {
        Some(bridge_err) => bridge_err.clone(),
        None => BridgeError::GuestTrap(format!("{:#}", err)),
    }
}

fn call_alloc(
    mut ctx: impl AsContextMut<Data = HostState>,
    func: Option<TypedFunc<i32, i32>>,
    size: u32,
) -> Result<u32, BridgeError> {
    let Some(func) = func else {
        let name = ctx.as_context_mut().data().bridge.config().alloc_export.clone();
        return Err(BridgeError::AllocatorMissing(name));
    };
    func.call(ctx, size as i32).map(|ptr| ptr as u32).map_err(guest_error)
}

fn call_dispatch(
    mut ctx: impl AsContextMut<Data = HostState>,
    func: Option<TypedFunc<(i32, i32, i32), i32>>,
    args: (i32, i32, i32),
) -> Result<i32, BridgeError> {
    let Some(func) = func else {
        let name = ctx.as_context_mut().data().bridge.config().dispatch_export.clone();
        return Err(BridgeError::DispatcherMissing(name));
    };
    func.call(ctx, args).map_err(guest_error)
}

// =============================================================================
// GuestEnv for wasmtime
// =============================================================================

/// Inside a host import. Exports not cached yet (a start section calling
/// into the bridge) are looked up through the caller.
impl GuestEnv for Caller<'_, HostState> {
    fn bridge(&mut self) -> &mut Bridge {
        &mut self.data_mut().bridge
    }

    fn memory_and_bridge(&mut self) -> Result<(&mut [u8], &mut Bridge), BridgeError> {
        let memory = match self.data().exports.memory {
            Some(memory) => memory,
            None => {
                let name = self.data().bridge.config().memory_export.clone();
                self.get_export(&name)
                    .and_then(Extern::into_memory)
                    .ok_or(BridgeError::MemoryMissing)?
            }
        };
        let (data, state) = memory.data_and_store_mut(self);
        Ok((data, &mut state.bridge))
    }

    fn alloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        let func = match self.data().exports.alloc.clone() {
            Some(func) => Some(func),
            None => {
                let name = self.data().bridge.config().alloc_export.clone();
                caller_func(self, &name)?
            }
        };
        call_alloc(self, func, size)
    }

    fn dispatch(&mut self, table_index: u32, argv: i32, closure_data: i32) -> Result<i32, BridgeError> {
        let func = match self.data().exports.dispatch.clone() {
            Some(func) => Some(func),
            None => {
                let name = self.data().bridge.config().dispatch_export.clone();
                caller_func(self, &name)?
            }
        };
        call_dispatch(self, func, (table_index as i32, argv, closure_data))
    }

    fn guest_version(&mut self) -> Result<Option<i32>, BridgeError> {
        let func = match self.data().exports.version.clone() {
            Some(func) => Some(func),
            None => {
                let name = self.data().bridge.config().version_export.clone();
                caller_func::<(), i32>(self, &name)?
            }
        };
        func.map(|f| f.call(&mut *self, ()).map_err(guest_error)).transpose()
    }
}

fn caller_func<P, R>(
    caller: &mut Caller<'_, HostState>,
    name: &str,
) -> Result<Option<TypedFunc<P, R>>, BridgeError>
where
    P: wasmtime::WasmParams,
    R: wasmtime::WasmResults,
{
    caller
        .get_export(name)
        .and_then(Extern::into_func)
        .map(|func| func.typed::<P, R>(&*caller))
        .transpose()
        .map_err(|e| BridgeError::InvalidModule(format!("export '{}': {}", name, e)))
}

/// Host-initiated calls, outside any guest frame.
impl GuestEnv for Store<HostState> {
    fn bridge(&mut self) -> &mut Bridge {
        &mut self.data_mut().bridge
    }

    fn memory_and_bridge(&mut self) -> Result<(&mut [u8], &mut Bridge), BridgeError> {
        let memory = self.data().exports.memory.ok_or(BridgeError::MemoryMissing)?;
        let (data, state) = memory.data_and_store_mut(self);
        Ok((data, &mut state.bridge))
    }

    fn alloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        let func = self.data().exports.alloc.clone();
        call_alloc(self, func, size)
    }

    fn dispatch(&mut self, table_index: u32, argv: i32, closure_data: i32) -> Result<i32, BridgeError> {
        let func = self.data().exports.dispatch.clone();
        call_dispatch(self, func, (table_index as i32, argv, closure_data))
    }

    fn guest_version(&mut self) -> Result<Option<i32>, BridgeError> {
        let func = self.data().exports.version.clone();
        func.map(|f| f.call(&mut *self, ()).map_err(guest_error)).transpose()
    }
}

// =============================================================================
// Guest Instance
// =============================================================================

pub struct GuestInstance {
    store: Store<HostState>,
    instance: Instance,
    manifest: GuestManifest,
}

impl GuestInstance {
    pub fn new(bytes: &[u8], config: BridgeConfig) -> Result<Self, BridgeError> {
        let manifest = wasm_interop::inspect(bytes, &config)?;
        manifest.check(&config)?;

        let engine = Engine::default();
        let module =
            Module::from_binary(&engine, bytes).map_err(|e| BridgeError::Compile(e.to_string()))?;

        let mut linker = Linker::<HostState>::new(&engine);
        wasm_host_imports::link_bridge_imports(&mut linker, &config.import_module)?;

        let mut store = Store::new(&engine, HostState::new(config));
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| BridgeError::Instantiate(format!("{:#}", e)))?;

        let exports = GuestExports::resolve(&mut store, &instance)?;
        store.data_mut().exports = exports;
        let handshake = bridge::initialize(&mut store)?;
        info!(
            target: "ark_host_bridge::version",
            imports = manifest.bridge_imports.len(),
            matched = handshake.is_match(),
            "guest instantiated"
        );

        Ok(GuestInstance {
            store,
            instance,
            manifest,
        })
    }

    pub fn manifest(&self) -> &GuestManifest {
        &self.manifest
    }

    pub fn bridge(&self) -> &Bridge {
        &self.store.data().bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.store.data_mut().bridge
    }

    pub fn handshake(&self) -> Option<Handshake> {
        self.bridge().handshake()
    }

    /// Runs the configured start export.
    pub fn run_start(&mut self) -> Result<(), BridgeError> {
        let name = self.bridge().config().start_export.clone();
        let start = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, &name)
            .map_err(|_| BridgeError::MissingExport(name))?;
        start.call(&mut self.store, ()).map_err(guest_error)
    }

    /// Calls any exported function with raw wasm values.
    pub fn call_export(&mut self, name: &str, args: &[Val]) -> Result<Vec<Val>, BridgeError> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| BridgeError::MissingExport(name.to_string()))?;
        let result_count = func.ty(&self.store).results().len();
        let mut results = vec![Val::I32(0); result_count];
        debug!(target: "ark_host_bridge::invoke", name, "call export");
        func.call(&mut self.store, args, &mut results)
            .map_err(guest_error)?;
        Ok(results)
    }

    /// Calls an export returning a handle and resolves it.
    pub fn call_export_value(&mut self, name: &str, args: &[Val]) -> Result<HostValue, BridgeError> {
        let results = self.call_export(name, args)?;
        match results.first() {
            Some(Val::I32(handle)) => self.bridge().resolve(Handle::from_wire(*handle)),
            _ => Err(BridgeError::InvalidModule(format!(
                "export '{}' does not return a handle",
                name
            ))),
        }
    }

    /// Invokes a host function value, callback proxies included, from outside
    /// any guest call.
    pub fn call_function(
        &mut self,
        callee: &HostValue,
        this: &HostValue,
        args: &[HostValue],
    ) -> Result<HostValue, Throw> {
        let outcome = dispatch::call(&mut self.store, callee, this, args);
        callback::drain_releases(&mut self.store);
        outcome
    }

    /// The value raised by the last guest `throw`, if not yet taken.
    pub fn take_exception(&mut self) -> Option<HostValue> {
        self.bridge_mut().take_exception()
    }

    pub fn console_output(&self) -> String {
        self.bridge().console().output()
    }
}

/// Instantiates a guest with the default configuration, runs its start
/// export and returns what it wrote to the console.
pub fn run_guest(bytes: &[u8]) -> Result<String, BridgeError> {
    let mut guest = GuestInstance::new(bytes, BridgeConfig::default())?;
    guest.run_start()?;
    Ok(guest.console_output())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{ProtocolVersion, HOST_PROTOCOL_VERSION};
    use wasm_encoder::{
        BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
        Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction, MemArg,
        MemorySection, MemoryType, Module as WasmModule, TypeSection, ValType,
    };

    // Import indices.
    const MAKE_INT: u32 = 0;
    const MAKE_STR: u32 = 1;
    const THROW: u32 = 2;
    const MAKE_CALLBACK: u32 = 3;
    const GET_INDEX: u32 = 4;
    const MEMORY_GROW: u32 = 5;
    const INIT: u32 = 6;
    const NEW_ARRAY: u32 = 7;
    const PUSH: u32 = 8;
    const CALL_METHOD: u32 = 9;

    const HELLO_PTR: i32 = 16;
    const LOG_PTR: i32 = 32;

    fn store8() -> MemArg {
        MemArg {
            offset: 0,
            align: 0,
            memory_index: 0,
        }
    }

    fn body(locals: Vec<(u32, ValType)>, instructions: &[Instruction<'_>]) -> Function {
        let mut func = Function::new(locals);
        for instruction in instructions {
            func.instruction(instruction);
        }
        func.instruction(&Instruction::End);
        func
    }

    /// A guest that exercises the bridge from wasm: allocation with growth,
    /// a dispatcher that echoes its first argument and counts frees, string
    /// construction, throw, callbacks, and console logging from `_start`.
    fn fixture(version: Option<i32>) -> Vec<u8> {
        let i32_ = ValType::I32;
        let mut module = WasmModule::new();

        let mut types = TypeSection::new();
        types.ty().function(vec![i32_], vec![i32_]); // 0
        types.ty().function(vec![i32_, i32_], vec![i32_]); // 1
        types.ty().function(vec![i32_, i32_, i32_], vec![i32_]); // 2
        types.ty().function(vec![i32_], vec![]); // 3
        types.ty().function(vec![], vec![i32_]); // 4
        types.ty().function(vec![], vec![]); // 5
        module.section(&types);

        let mut imports = ImportSection::new();
        for (name, ty) in [
            ("make_int", 0),
            ("make_str", 1),
            ("throw", 3),
            ("make_callback", 1),
            ("get_index", 1),
            ("memory_grow", 3),
            ("init", 5),
            ("new_array", 4),
            ("push", 1),
            ("call_method", 2),
        ] {
            imports.import("ark", name, EntityType::Function(ty));
        }
        module.section(&imports);

        let mut defined: Vec<(&str, u32, Function)> = vec![
            (
                "ark_alloc",
                0,
                body(
                    vec![(1, i32_)],
                    &[
                        Instruction::GlobalGet(0),
                        Instruction::LocalSet(1),
                        Instruction::GlobalGet(0),
                        Instruction::LocalGet(0),
                        Instruction::I32Add,
                        Instruction::GlobalSet(0),
                        Instruction::GlobalGet(0),
                        Instruction::MemorySize(0),
                        Instruction::I32Const(16),
                        Instruction::I32Shl,
                        Instruction::I32GtU,
                        Instruction::If(BlockType::Empty),
                        Instruction::I32Const(1),
                        Instruction::MemoryGrow(0),
                        Instruction::Drop,
                        Instruction::MemorySize(0),
                        Instruction::Call(MEMORY_GROW),
                        Instruction::End,
                        Instruction::LocalGet(1),
                    ],
                ),
            ),
            (
                "ark_dispatch",
                2,
                body(
                    vec![],
                    &[
                        Instruction::LocalGet(1),
                        Instruction::I32Const(-1),
                        Instruction::I32Eq,
                        Instruction::If(BlockType::Result(i32_)),
                        Instruction::GlobalGet(1),
                        Instruction::I32Const(1),
                        Instruction::I32Add,
                        Instruction::GlobalSet(1),
                        Instruction::I32Const(0),
                        Instruction::Else,
                        Instruction::LocalGet(1),
                        Instruction::I32Const(0),
                        Instruction::Call(GET_INDEX),
                        Instruction::End,
                    ],
                ),
            ),
            (
                "answer",
                4,
                body(vec![], &[Instruction::I32Const(42), Instruction::Call(MAKE_INT)]),
            ),
            (
                "greet",
                4,
                body(
                    vec![],
                    &[
                        Instruction::I32Const(HELLO_PTR),
                        Instruction::I32Const(5),
                        Instruction::Call(MAKE_STR),
                    ],
                ),
            ),
            (
                "boom",
                4,
                body(
                    vec![],
                    &[
                        Instruction::I32Const(HELLO_PTR),
                        Instruction::I32Const(5),
                        Instruction::Call(MAKE_STR),
                        Instruction::Call(THROW),
                        Instruction::I32Const(0),
                    ],
                ),
            ),
            (
                "mk_callback",
                4,
                body(
                    vec![],
                    &[
                        Instruction::I32Const(3),
                        Instruction::I32Const(99),
                        Instruction::Call(MAKE_CALLBACK),
                    ],
                ),
            ),
            (
                "grow_str",
                4,
                body(
                    vec![],
                    &[
                        Instruction::I32Const(1),
                        Instruction::MemoryGrow(0),
                        Instruction::Drop,
                        Instruction::MemorySize(0),
                        Instruction::Call(MEMORY_GROW),
                        Instruction::I32Const(65_536),
                        Instruction::I32Const(0x41),
                        Instruction::I32Store8(store8()),
                        Instruction::I32Const(65_537),
                        Instruction::I32Const(0x42),
                        Instruction::I32Store8(store8()),
                        Instruction::I32Const(65_536),
                        Instruction::I32Const(2),
                        Instruction::Call(MAKE_STR),
                    ],
                ),
            ),
            ("freed_count", 4, body(vec![], &[Instruction::GlobalGet(1)])),
            (
                "_start",
                5,
                body(
                    vec![(1, i32_)],
                    &[
                        Instruction::Call(INIT),
                        Instruction::Call(NEW_ARRAY),
                        Instruction::LocalSet(0),
                        Instruction::LocalGet(0),
                        Instruction::I32Const(HELLO_PTR),
                        Instruction::I32Const(5),
                        Instruction::Call(MAKE_STR),
                        Instruction::Call(PUSH),
                        Instruction::Drop,
                        Instruction::I32Const(Handle::CONSOLE.to_wire()),
                        Instruction::I32Const(LOG_PTR),
                        Instruction::I32Const(3),
                        Instruction::Call(MAKE_STR),
                        Instruction::LocalGet(0),
                        Instruction::Call(CALL_METHOD),
                        Instruction::Drop,
                    ],
                ),
            ),
        ];
        if let Some(version) = version {
            defined.push((
                "ark_bridge_version",
                4,
                body(vec![], &[Instruction::I32Const(version)]),
            ));
        }

        let mut functions = FunctionSection::new();
        for (_, ty, _) in &defined {
            functions.function(*ty);
        }
        module.section(&functions);

        let mut memories = MemorySection::new();
        memories.memory(MemoryType {
            minimum: 1,
            maximum: Some(4),
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        module.section(&memories);

        let mut globals = GlobalSection::new();
        for init in [1024, 0] {
            globals.global(
                GlobalType {
                    val_type: i32_,
                    mutable: true,
                    shared: false,
                },
                &ConstExpr::i32_const(init),
            );
        }
        module.section(&globals);

        let import_count = 10;
        let mut exports = ExportSection::new();
        exports.export("memory", ExportKind::Memory, 0);
        for (i, (name, _, _)) in defined.iter().enumerate() {
            exports.export(name, ExportKind::Func, import_count + i as u32);
        }
        module.section(&exports);

        let mut codes = CodeSection::new();
        for (_, _, func) in &defined {
            codes.function(func);
        }
        module.section(&codes);

        let mut data = DataSection::new();
        data.active(0, &ConstExpr::i32_const(HELLO_PTR), b"hello".to_vec());
        data.active(0, &ConstExpr::i32_const(LOG_PTR), b"log".to_vec());
        module.section(&data);

        module.finish()
    }

    fn instance(version: Option<i32>) -> GuestInstance {
        GuestInstance::new(&fixture(version), BridgeConfig::default()).expect("instantiate failed")
    }

    fn single_i32(results: Vec<Val>) -> i32 {
        match results.as_slice() {
            [Val::I32(n)] => *n,
            _ => panic!("expected a single i32 result"),
        }
    }

    fn freed_count(guest: &mut GuestInstance) -> i32 {
        single_i32(guest.call_export("freed_count", &[]).expect("call failed"))
    }

    #[test]
    fn test_run_guest_logs_to_console() {
        let output = run_guest(&fixture(None)).expect("run failed");
        assert_eq!(output, "hello\n");
    }

    #[test]
    fn test_manifest_lists_bridge_imports() {
        let guest = instance(None);
        let manifest = guest.manifest();
        assert_eq!(manifest.bridge_imports.len(), 10);
        assert!(manifest.exports_memory && manifest.exports_alloc && manifest.exports_dispatch);
        assert!(manifest.exports_start);
        assert!(!manifest.exports_version);
    }

    #[test]
    fn test_handshake_outcomes() {
        let matched = instance(Some(HOST_PROTOCOL_VERSION.encode()));
        assert_eq!(matched.handshake(), Some(Handshake::Match(HOST_PROTOCOL_VERSION)));

        let newer = ProtocolVersion::new(HOST_PROTOCOL_VERSION.major + 1, 0, 0);
        let mismatched = instance(Some(newer.encode()));
        assert_eq!(
            mismatched.handshake(),
            Some(Handshake::Mismatch {
                host: HOST_PROTOCOL_VERSION,
                guest: newer
            })
        );

        let silent = instance(None);
        assert_eq!(
            silent.handshake(),
            Some(Handshake::Missing {
                host: HOST_PROTOCOL_VERSION
            })
        );
    }

    #[test]
    fn test_exported_values() {
        let mut guest = instance(None);
        let answer = guest.call_export_value("answer", &[]).unwrap();
        assert!(matches!(answer, HostValue::Int32(42)));
        let greeting = guest.call_export_value("greet", &[]).unwrap();
        assert_eq!(greeting.as_str(), Some("hello"));
    }

    #[test]
    fn test_throw_traps_and_records_value() {
        let mut guest = instance(None);
        let err = guest.call_export("boom", &[]).unwrap_err();
        assert!(err.to_string().contains("hello"), "unexpected error: {}", err);
        let raised = guest.take_exception().expect("no exception recorded");
        assert_eq!(raised.as_str(), Some("hello"));
        assert!(guest.take_exception().is_none());
    }

    #[test]
    fn test_growth_inside_guest_then_read() {
        let mut guest = instance(None);
        let value = guest.call_export_value("grow_str", &[]).unwrap();
        assert_eq!(value.as_str(), Some("AB"));
        assert_eq!(guest.bridge().views().growth_notices(), 1);
    }

    #[test]
    fn test_string_extraction_allocates_in_guest() {
        let mut guest = instance(None);
        let text = "x".repeat(70_000);
        let handle = guest.bridge_mut().register(HostValue::string(&text)).to_wire();
        let ptr = crate::marshal::get_value_string(&mut guest.store, handle).unwrap() as u32;
        assert_eq!(guest.bridge().views().growth_notices(), 1);
        let (memory, bridge) = guest.store.memory_and_bridge().unwrap();
        let back = bridge.views_mut().ensure_fresh(memory).c_str(ptr).unwrap();
        assert_eq!(back.len(), 70_000);
    }

    #[test]
    fn test_callback_round_trip_through_guest_dispatcher() {
        let mut guest = instance(None);
        let proxy = guest.call_export_value("mk_callback", &[]).unwrap();
        let result = guest
            .call_function(&proxy, &HostValue::Undefined, &[HostValue::string("echo")])
            .unwrap();
        assert_eq!(result.as_str(), Some("echo"));
    }

    #[test]
    fn test_dropped_callback_notifies_guest() {
        let mut guest = instance(None);
        let handle = single_i32(guest.call_export("mk_callback", &[]).unwrap());
        assert_eq!(freed_count(&mut guest), 0);
        crate::invoke::dec_ref(&mut guest.store, handle);
        assert_eq!(freed_count(&mut guest), 1);
        assert_eq!(guest.bridge().callbacks().stats().swept, 1);
    }

    #[test]
    fn test_released_callback_is_not_freed_twice() {
        let mut guest = instance(None);
        let handle = single_i32(guest.call_export("mk_callback", &[]).unwrap());
        crate::invoke::release_callback(&mut guest.store, handle).unwrap();
        assert_eq!(freed_count(&mut guest), 1);
        crate::invoke::dec_ref(&mut guest.store, handle);
        assert_eq!(freed_count(&mut guest), 1);
    }

    #[test]
    fn test_unknown_import_is_rejected() {
        let mut module = WasmModule::new();
        let mut types = TypeSection::new();
        types.ty().function(vec![], vec![]);
        module.section(&types);
        let mut imports = ImportSection::new();
        imports.import("ark", "teleport", EntityType::Function(0));
        module.section(&imports);
        let err = GuestInstance::new(&module.finish(), BridgeConfig::default()).err();
        assert!(matches!(err, Some(BridgeError::UnknownImport { .. })));
    }

    #[test]
    fn test_missing_start_export() {
        let mut module = WasmModule::new();
        let mut types = TypeSection::new();
        types.ty().function(vec![], vec![]);
        module.section(&types);
        let mut guest = GuestInstance::new(&module.finish(), BridgeConfig::default()).unwrap();
        assert_eq!(
            guest.run_start().unwrap_err(),
            BridgeError::MissingExport("_start".to_string())
        );
        assert!(matches!(
            guest.call_export("nope", &[]),
            Err(BridgeError::MissingExport(_))
        ));
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(matches!(
            GuestInstance::new(b"not wasm", BridgeConfig::default()),
            Err(BridgeError::InvalidModule(_))
        ));
    }
}
