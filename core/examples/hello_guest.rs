/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of the Ark Sovereign Compiler.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

// Assembles a minimal guest in memory and runs it through the bridge.
//
//   cargo run --example hello_guest

use ark_host_bridge::handle_table::Handle;
use ark_host_bridge::run_guest;
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, ImportSection, Instruction, MemorySection, MemoryType, Module, TypeSection,
    ValType,
};

const GREETING: &[u8] = b"hello from the guest";
const GREETING_PTR: i32 = 16;
const LOG_PTR: i32 = 64;

fn guest_module() -> Vec<u8> {
    let mut module = Module::new();

    let mut types = TypeSection::new();
    types.ty().function(vec![ValType::I32, ValType::I32], vec![ValType::I32]); // 0
    types
        .ty()
        .function(vec![ValType::I32, ValType::I32, ValType::I32], vec![ValType::I32]); // 1
    types.ty().function(vec![], vec![ValType::I32]); // 2
    types.ty().function(vec![], vec![]); // 3
    module.section(&types);

    let mut imports = ImportSection::new();
    imports.import("ark", "make_str", EntityType::Function(0));
    imports.import("ark", "call_method", EntityType::Function(1));
    imports.import("ark", "new_array", EntityType::Function(2));
    imports.import("ark", "push", EntityType::Function(0));
    module.section(&imports);

    let mut functions = FunctionSection::new();
    functions.function(3);
    module.section(&functions);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: 1,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memories);

    let mut exports = ExportSection::new();
    exports.export("memory", ExportKind::Memory, 0);
    exports.export("_start", ExportKind::Func, 4);
    module.section(&exports);

    // args = []; args.push("hello from the guest"); console.log(...args)
    let mut start = Function::new(vec![(1, ValType::I32)]);
    start
        .instruction(&Instruction::Call(2))
        .instruction(&Instruction::LocalSet(0))
        .instruction(&Instruction::LocalGet(0))
        .instruction(&Instruction::I32Const(GREETING_PTR))
        .instruction(&Instruction::I32Const(GREETING.len() as i32))
        .instruction(&Instruction::Call(0))
        .instruction(&Instruction::Call(3))
        .instruction(&Instruction::Drop)
        .instruction(&Instruction::I32Const(Handle::CONSOLE.to_wire()))
        .instruction(&Instruction::I32Const(LOG_PTR))
        .instruction(&Instruction::I32Const(3))
        .instruction(&Instruction::Call(0))
        .instruction(&Instruction::LocalGet(0))
        .instruction(&Instruction::Call(1))
        .instruction(&Instruction::Drop)
        .instruction(&Instruction::End);
    let mut codes = CodeSection::new();
    codes.function(&start);
    module.section(&codes);

    let mut data = DataSection::new();
    data.active(0, &ConstExpr::i32_const(GREETING_PTR), GREETING.to_vec());
    data.active(0, &ConstExpr::i32_const(LOG_PTR), b"log".to_vec());
    module.section(&data);

    module.finish()
}

fn main() {
    match run_guest(&guest_module()) {
        Ok(output) => print!("{}", output),
        Err(e) => eprintln!("Bridge Error: {}", e),
    }
}
