//! The function lowerer (§4.2): per-function prologue/epilogue around the
//! expression lowerer, import thunks, the handful of runtime helper methods
//! every class carries regardless of what the module uses, and the instance
//! initializer (§4.3) that wires memory/table/imports/exports together.

use crate::abc::{Instruction, LabelId};
use crate::abc::{ConstantPool, Method, MethodBody};
use crate::config::LowerConfig;
use crate::error::Result;
use crate::wasm_module::{Global, GlobalInit, Import, NumType, WasmModule};

use super::labels::{FreeLocals, LabelStack};
use super::stack::StackDepth;
use super::{expr, ModuleRefs};

/// Lowers one locally-defined function body into a `Method`.
pub fn lower_function(
    module: &WasmModule,
    pool: &mut ConstantPool,
    refs: &mut ModuleRefs,
    local_idx: usize,
    config: &LowerConfig,
) -> Result<Method> {
    let body = &module.functions[local_idx];
    let name = module.function_names[local_idx].clone();
    let func_type = module
        .local_func_type(local_idx)
        .ok_or_else(|| crate::error::Error::internal("function has no declared type", &name))?
        .clone();

    let param_count = func_type.params.len() as u32;
    let mut locals = func_type.params.clone();
    let mut declared_locals = Vec::new();
    let mut locals_reader = body
        .get_locals_reader()
        .map_err(|e| crate::error::Error::malformed(format!("{e}"), &name))?;
    for _ in 0..locals_reader.get_count() {
        let (count, valtype) = locals_reader
            .read()
            .map_err(|e| crate::error::Error::malformed(format!("{e}"), &name))?;
        let ty = NumType::from_valtype(valtype, &name)?;
        for _ in 0..count {
            locals.push(ty);
            declared_locals.push(ty);
        }
    }

    let first_free = locals.len() as u32 + 1;
    let mut ctx = super::Ctx {
        module,
        pool,
        refs,
        function_name: name.clone(),
        locals,
        result_type: func_type.results.first().copied(),
        out: Vec::new(),
        stack: StackDepth::new(),
        labels: LabelStack::new(),
        free: FreeLocals::new(first_free),
        pending_compare: None,
        label_counter: 0,
        trace: config.trace.clone(),
    };

    emit_trace_enter(&mut ctx, &name);

    // Coerce each incoming argument to its declared AVM2 type: the method
    // array declares every parameter untyped (§ ABC encoding notes in
    // `abc::class`), so the caller hands over whatever it had on hand.
    for i in 0..param_count {
        let slot = super::Ctx::avm_local(i);
        ctx.emit(Instruction::GetLocal(slot));
        emit_numeric_coercion(&mut ctx, ctx.locals[i as usize]);
        ctx.emit(Instruction::SetLocal(slot));
    }

    // Zero-initialize declared locals beyond the parameters (§4.2 step 2).
    for (i, ty) in declared_locals.iter().enumerate() {
        let slot = super::Ctx::avm_local(param_count + i as u32);
        ctx.emit(Instruction::PushByte(0));
        if matches!(ty, NumType::F32 | NumType::F64) {
            ctx.emit(Instruction::ConvertD);
        }
        ctx.emit(Instruction::SetLocal(slot));
    }

    let mut op_cursor = super::cursor::OpCursor::new(
        body.get_operators_reader()
            .map_err(|e| crate::error::Error::malformed(format!("{e}"), &name))?,
    );
    let stop = expr::lower_ops(&mut ctx, &mut op_cursor, true)?;
    if stop != expr::Stop::FunctionEnd {
        return Err(ctx.err_malformed("function body did not close at its own `end`"));
    }

    let already_returns = matches!(
        ctx.out.last(),
        Some(Instruction::ReturnValue) | Some(Instruction::ReturnVoid)
    );
    if !already_returns {
        if ctx.result_type.is_some() {
            ctx.emit(Instruction::ReturnValue);
        } else {
            ctx.emit(Instruction::ReturnVoid);
        }
    }

    Ok(Method {
        name,
        param_count,
        returns: ctx.result_type.map(NumType::avm_type_name),
        body: MethodBody::new(ctx.out, ctx.stack.max(), ctx.free.max_local()),
    })
}

/// Synthesizes a body-less thunk for an imported function: forward to the
/// host callback stored in its slot, then reattach domain memory, since the
/// host call may have resized (or replaced) the backing `ByteArray` (§4.2
/// step 5).
pub fn lower_import_thunk(module: &WasmModule, pool: &mut ConstantPool, import: &Import) -> Result<Method> {
    let func_name = format!("func${}", import.base);
    let ty = module
        .import_func_type(import)
        .ok_or_else(|| crate::error::Error::internal("import has no declared type", &func_name))?
        .clone();
    let param_count = ty.params.len() as u32;

    let mut out = Vec::new();
    let slot_qname = pool.intern_qname(format!("import${}${}", import.module, import.base));
    let call_qname = pool.intern_qname("call");

    out.push(Instruction::GetLocal(0));
    out.push(Instruction::GetProperty(slot_qname)); // the host Function value
    out.push(Instruction::PushNull); // `this` for Function.call
    for i in 0..param_count {
        out.push(Instruction::GetLocal(super::Ctx::avm_local(i)));
    }

    let result = ty.results.first().copied();
    match result {
        None => {
            out.push(Instruction::CallPropVoid {
                name: call_qname,
                argc: param_count + 1,
            });
            emit_reattach_domain_memory_from_this(&mut out, pool);
            out.push(Instruction::ReturnVoid);
        }
        Some(result_ty) => {
            out.push(Instruction::CallProperty {
                name: call_qname,
                argc: param_count + 1,
            });
            match result_ty {
                NumType::I32 => out.push(Instruction::ConvertI),
                NumType::F32 | NumType::F64 => out.push(Instruction::ConvertD),
            }
            // Stash the result across the reattachment sequence below.
            let result_local = param_count + 1; // one past every parameter slot
            out.push(Instruction::SetLocal(result_local));
            emit_reattach_domain_memory_from_this(&mut out, pool);
            out.push(Instruction::GetLocal(result_local));
            out.push(Instruction::ReturnValue);
        }
    }

    let max_local = param_count + 1; // the stashed result, when present
    Ok(Method {
        name: func_name,
        param_count,
        returns: result.map(NumType::avm_type_name),
        body: MethodBody::new(out, 3, max_local),
    })
}

fn emit_numeric_coercion(ctx: &mut super::Ctx, ty: NumType) {
    match ty {
        NumType::I32 => ctx.emit(Instruction::ConvertI),
        NumType::F32 | NumType::F64 => ctx.emit(Instruction::ConvertD),
    }
}

/// Emits `trace("enter <name>")` at the top of a traced function, using the
/// AS3 global `trace()` the same way `findpropstrict`+`callproperty` reaches
/// any other unqualified global identifier.
fn emit_trace_enter(ctx: &mut super::Ctx, name: &str) {
    if !ctx.trace.is_traced(name) {
        return;
    }
    let msg = ctx.pool.intern_string(format!("wasm: enter {name}"));
    let trace_qname = ctx.pool.intern_qname("trace");
    ctx.emit(Instruction::FindPropStrict(trace_qname));
    ctx.emit(Instruction::PushString(msg));
    ctx.emit(Instruction::CallPropVoid {
        name: trace_qname,
        argc: 1,
    });
}

/// Expects the `ByteArray` value to assign already on top of the stack.
fn emit_reattach_domain_memory(out: &mut Vec<Instruction>, pool: &mut ConstantPool) {
    let app_domain = pool.intern_qname("flash.system.ApplicationDomain");
    let current_domain = pool.intern_qname("currentDomain");
    let domain_memory = pool.intern_qname("domainMemory");
    out.push(Instruction::GetLex(app_domain));
    out.push(Instruction::GetProperty(current_domain));
    out.push(Instruction::Swap);
    out.push(Instruction::SetProperty(domain_memory));
}

fn emit_reattach_domain_memory_from_this(out: &mut Vec<Instruction>, pool: &mut ConstantPool) {
    let wasm_memory = pool.intern_qname("wasm$memory");
    out.push(Instruction::GetLocal(0));
    out.push(Instruction::GetProperty(wasm_memory));
    emit_reattach_domain_memory(out, pool);
}

/// `Math.clz32`-equivalent: count-leading-zeros by binary search over
/// shifts `{16, 8, 4, 2, 1}`, since AVM2 has no native intrinsic for it.
pub fn helper_clz32(pool: &mut ConstantPool) -> Method {
    let mut out = Vec::new();
    let mut next_label = 0u32;

    out.push(Instruction::PushByte(0));
    out.push(Instruction::SetLocal(2)); // n = 0

    let past_zero_check = LabelId(next_label);
    next_label += 1;
    out.push(Instruction::GetLocal(1));
    out.push(Instruction::PushByte(0));
    out.push(Instruction::StrictEquals);
    out.push(Instruction::IfFalse(past_zero_check));
    out.push(Instruction::PushByte(32));
    out.push(Instruction::ReturnValue);
    out.push(Instruction::Label(past_zero_check));

    emit_clz_step(&mut out, pool, &mut next_label, -65536, 16, true);
    emit_clz_step(&mut out, pool, &mut next_label, -16_777_216, 8, true);
    emit_clz_step(&mut out, pool, &mut next_label, -268_435_456, 4, true);
    emit_clz_step(&mut out, pool, &mut next_label, -1_073_741_824, 2, true);
    emit_clz_step(&mut out, pool, &mut next_label, i32::MIN, 1, false);

    out.push(Instruction::GetLocal(2));
    out.push(Instruction::ReturnValue);

    Method {
        name: "clz32".to_string(),
        param_count: 1,
        returns: Some("int"),
        body: MethodBody::new(out, 2, 2),
    }
}

fn emit_clz_step(
    out: &mut Vec<Instruction>,
    pool: &mut ConstantPool,
    next_label: &mut u32,
    mask: i32,
    add: i32,
    do_shift: bool,
) {
    let skip = LabelId(*next_label);
    *next_label += 1;
    out.push(Instruction::GetLocal(1));
    let mask_idx = pool.intern_int(mask);
    out.push(Instruction::PushInt(mask_idx));
    out.push(Instruction::BitAnd);
    out.push(Instruction::PushByte(0));
    out.push(Instruction::StrictEquals);
    out.push(Instruction::IfFalse(skip));
    out.push(Instruction::GetLocal(2));
    out.push(Instruction::PushByte(add as i8));
    out.push(Instruction::Add);
    out.push(Instruction::ConvertI);
    out.push(Instruction::SetLocal(2));
    if do_shift {
        out.push(Instruction::GetLocal(1));
        out.push(Instruction::PushByte(add as i8));
        out.push(Instruction::LShift);
        out.push(Instruction::SetLocal(1));
    }
    out.push(Instruction::Label(skip));
}

/// `memory.grow`: resizes `this.wasm$memory` by `pages` 64KiB pages,
/// reattaches it as domain memory (the resize may have reallocated the
/// underlying buffer), and returns the previous size in pages.
pub fn helper_memory_grow(pool: &mut ConstantPool) -> Method {
    let mut out = Vec::new();
    let wasm_memory = pool.intern_qname("wasm$memory");
    let length_name = pool.intern_qname("length");

    out.push(Instruction::GetLocal(0));
    out.push(Instruction::GetProperty(wasm_memory));
    out.push(Instruction::SetLocal(2)); // mem

    out.push(Instruction::GetLocal(2));
    out.push(Instruction::GetProperty(length_name));
    out.push(Instruction::PushByte(16));
    out.push(Instruction::URShift);
    out.push(Instruction::SetLocal(3)); // old = mem.length >>> 16

    out.push(Instruction::GetLocal(2));
    out.push(Instruction::GetLocal(1));
    out.push(Instruction::GetLocal(3));
    out.push(Instruction::Add);
    out.push(Instruction::ConvertI);
    out.push(Instruction::PushByte(16));
    out.push(Instruction::LShift);
    out.push(Instruction::SetProperty(length_name)); // mem.length = (pages + old) << 16

    out.push(Instruction::GetLocal(2));
    emit_reattach_domain_memory(&mut out, pool);

    out.push(Instruction::GetLocal(3));
    out.push(Instruction::ReturnValue);

    Method {
        name: "wasm$memory_grow".to_string(),
        param_count: 1,
        returns: Some("int"),
        body: MethodBody::new(out, 3, 3),
    }
}

/// `memory.size`: current size of `this.wasm$memory` in 64KiB pages.
pub fn helper_memory_size(pool: &mut ConstantPool) -> Method {
    let mut out = Vec::new();
    let wasm_memory = pool.intern_qname("wasm$memory");
    let length_name = pool.intern_qname("length");

    out.push(Instruction::GetLocal(0));
    out.push(Instruction::GetProperty(wasm_memory));
    out.push(Instruction::GetProperty(length_name));
    out.push(Instruction::PushByte(16));
    out.push(Instruction::URShift);
    out.push(Instruction::ReturnValue);

    Method {
        name: "wasm$memory_size".to_string(),
        param_count: 0,
        returns: Some("int"),
        body: MethodBody::new(out, 2, 0),
    }
}

/// Writes each byte of `data` (one `String` char code per byte, §3 data
/// segment encoding) into domain memory starting at `byteOffset`.
pub fn helper_memory_init(pool: &mut ConstantPool) -> Method {
    let mut out = Vec::new();
    let length_name = pool.intern_qname("length");
    let char_code_at = pool.intern_qname("charCodeAt");

    let loop_start = LabelId(0);
    let loop_end = LabelId(1);

    out.push(Instruction::PushByte(0));
    out.push(Instruction::SetLocal(3)); // i = 0

    out.push(Instruction::Label(loop_start));
    out.push(Instruction::GetLocal(3));
    out.push(Instruction::GetLocal(2));
    out.push(Instruction::GetProperty(length_name));
    out.push(Instruction::LessThan);
    out.push(Instruction::IfFalse(loop_end));

    // `si8` pops address first, then value, so the byte value has to be
    // computed and pushed before the address that will sit on top of it.
    out.push(Instruction::GetLocal(2));
    out.push(Instruction::GetLocal(3));
    out.push(Instruction::CallProperty {
        name: char_code_at,
        argc: 1,
    });
    out.push(Instruction::ConvertI);

    out.push(Instruction::GetLocal(1));
    out.push(Instruction::GetLocal(3));
    out.push(Instruction::Add);
    out.push(Instruction::ConvertI);

    out.push(Instruction::Si8);

    out.push(Instruction::GetLocal(3));
    out.push(Instruction::PushByte(1));
    out.push(Instruction::Add);
    out.push(Instruction::ConvertI);
    out.push(Instruction::SetLocal(3));

    out.push(Instruction::Jump(loop_start));
    out.push(Instruction::Label(loop_end));
    out.push(Instruction::ReturnVoid);

    Method {
        name: "wasm$memory_init".to_string(),
        param_count: 2,
        returns: None,
        body: MethodBody::new(out, 3, 3),
    }
}

/// Writes `this.wasm$scratch.position = 0; this.wasm$scratch.<write>(x);
/// this.wasm$scratch.position = 0; return this.wasm$scratch.<read>();` —
/// the shared shape behind the `demote`/`reinterpret` helpers below: storing
/// at one width and reading back at another, through a buffer dedicated to
/// this trick (never attached as domain memory, so it can never collide
/// with the guest's own linear memory).
fn helper_scratch_roundtrip(
    pool: &mut ConstantPool,
    name: &str,
    returns: &'static str,
    write_method: &str,
    read_method: &str,
) -> Method {
    let mut out = Vec::new();
    let wasm_scratch = pool.intern_qname("wasm$scratch");
    let position = pool.intern_qname("position");
    let write_name = pool.intern_qname(write_method);
    let read_name = pool.intern_qname(read_method);

    out.push(Instruction::GetLocal(0));
    out.push(Instruction::GetProperty(wasm_scratch));
    out.push(Instruction::SetLocal(2)); // scratch

    out.push(Instruction::GetLocal(2));
    out.push(Instruction::PushByte(0));
    out.push(Instruction::SetProperty(position));

    out.push(Instruction::GetLocal(2));
    out.push(Instruction::GetLocal(1));
    out.push(Instruction::CallPropVoid {
        name: write_name,
        argc: 1,
    });

    out.push(Instruction::GetLocal(2));
    out.push(Instruction::PushByte(0));
    out.push(Instruction::SetProperty(position));

    out.push(Instruction::GetLocal(2));
    out.push(Instruction::CallProperty {
        name: read_name,
        argc: 0,
    });
    out.push(Instruction::ReturnValue);

    Method {
        name: name.to_string(),
        param_count: 1,
        returns: Some(returns),
        body: MethodBody::new(out, 2, 3),
    }
}

/// `f32.demote_f64`: `writeFloat` narrows to IEEE-754 single on the way in,
/// `readFloat` widens the stored single back to `Number` on the way out —
/// together reproducing Wasm's precision-faithful narrowing.
pub fn helper_demote_f64_f32(pool: &mut ConstantPool) -> Method {
    helper_scratch_roundtrip(pool, "wasm$demote_f64_f32", "Number", "writeFloat", "readFloat")
}

/// `i32.reinterpret_f32`: write the `Number` as a 32-bit float, read the
/// same four bytes back as a 32-bit int — a bit-pattern reinterpretation,
/// not a value conversion.
pub fn helper_reinterpret_i32_f32(pool: &mut ConstantPool) -> Method {
    helper_scratch_roundtrip(pool, "wasm$reinterpret_i32_f32", "int", "writeFloat", "readInt")
}

/// `f32.reinterpret_i32`: the mirror image of the above.
pub fn helper_reinterpret_f32_i32(pool: &mut ConstantPool) -> Method {
    helper_scratch_roundtrip(pool, "wasm$reinterpret_f32_i32", "Number", "writeInt", "readFloat")
}

/// Builds the instance constructor (§4.3): super(), global initializers,
/// the backing memory `ByteArray`, data segment writes, the function table,
/// imports copied in from the one constructor parameter, and the exports
/// object.
pub fn instance_initializer(
    module: &WasmModule,
    pool: &mut ConstantPool,
    refs: &ModuleRefs,
) -> Result<MethodBody> {
    let mut out = Vec::new();
    let mut stack = StackDepth::new();
    macro_rules! emit {
        ($instr:expr) => {{
            let instr = $instr;
            let (pops, pushes) = instr.stack_effect();
            stack.apply(pops, pushes);
            out.push(instr);
        }};
    }

    emit!(Instruction::GetLocal(0));
    emit!(Instruction::ConstructSuper { argc: 0 });

    for global_name in &refs.referenced_globals {
        if let Some(global) = find_global(module, global_name) {
            let qname = pool.intern_qname(format!("global${global_name}"));
            emit!(Instruction::GetLocal(0));
            emit_global_init(&mut out, &mut stack, pool, global);
            emit!(Instruction::SetProperty(qname));
        }
    }

    // The backing memory: a little-endian ByteArray sized to the module's
    // declared initial pages, or a generous default if it declares none.
    let byte_array_qname = pool.intern_qname("ByteArray");
    let length_qname = pool.intern_qname("length");
    let endian_qname = pool.intern_qname("flash.utils.Endian");
    let little_endian_qname = pool.intern_qname("LITTLE_ENDIAN");
    let endian_prop_qname = pool.intern_qname("endian");
    let wasm_memory_qname = pool.intern_qname("wasm$memory");

    let initial_bytes: u32 = if module.memory_limits.initial_pages > 0 {
        module.memory_limits.initial_pages.saturating_mul(65536)
    } else {
        1 << 24
    };

    emit!(Instruction::FindPropStrict(byte_array_qname));
    emit!(Instruction::ConstructProp {
        name: byte_array_qname,
        argc: 0,
    });
    emit!(Instruction::SetLocal(2)); // mem

    emit!(Instruction::GetLocal(2));
    let len_idx = pool.intern_int(initial_bytes as i32);
    emit!(Instruction::PushInt(len_idx));
    emit!(Instruction::SetProperty(length_qname));

    emit!(Instruction::GetLocal(2));
    emit!(Instruction::GetLex(endian_qname));
    emit!(Instruction::GetProperty(little_endian_qname));
    emit!(Instruction::SetProperty(endian_prop_qname));

    emit!(Instruction::GetLocal(0));
    emit!(Instruction::GetLocal(2));
    emit!(Instruction::SetProperty(wasm_memory_qname));

    emit!(Instruction::GetLocal(2));
    let app_domain = pool.intern_qname("flash.system.ApplicationDomain");
    let current_domain = pool.intern_qname("currentDomain");
    let domain_memory = pool.intern_qname("domainMemory");
    emit!(Instruction::GetLex(app_domain));
    emit!(Instruction::GetProperty(current_domain));
    emit!(Instruction::Swap);
    emit!(Instruction::SetProperty(domain_memory));

    // A small dedicated scratch buffer for the demote/reinterpret helpers —
    // never attached as domain memory, so it never shares bytes with the
    // guest's own linear memory.
    let wasm_scratch_qname = pool.intern_qname("wasm$scratch");
    emit!(Instruction::FindPropStrict(byte_array_qname));
    emit!(Instruction::ConstructProp {
        name: byte_array_qname,
        argc: 0,
    });
    emit!(Instruction::SetLocal(2)); // scratch

    emit!(Instruction::GetLocal(2));
    emit!(Instruction::PushByte(8));
    emit!(Instruction::SetProperty(length_qname));

    emit!(Instruction::GetLocal(0));
    emit!(Instruction::GetLocal(2));
    emit!(Instruction::SetProperty(wasm_scratch_qname));

    // Data segments: one `wasm$memory_init` call per segment.
    let memory_init_qname = pool.intern_qname("wasm$memory_init");
    for segment in &module.data_segments {
        emit!(Instruction::GetLocal(0));
        let offset_idx = pool.intern_int(segment.offset as i32);
        emit!(Instruction::PushInt(offset_idx));
        let data_str = data_segment_string(&segment.bytes);
        let str_idx = pool.intern_string(data_str);
        emit!(Instruction::PushString(str_idx));
        emit!(Instruction::CallPropVoid {
            name: memory_init_qname,
            argc: 2,
        });
    }

    // The function table, populated from function-table segments via
    // late-bound indexing (the same `table[i]` encoding `call_indirect` reads).
    let array_qname = pool.intern_qname("Array");
    let wasm_table_qname = pool.intern_qname("wasm$table");
    let late_name = pool.intern_late_multiname_public();

    emit!(Instruction::GetLocal(0));
    emit!(Instruction::FindPropStrict(array_qname));
    emit!(Instruction::ConstructProp {
        name: array_qname,
        argc: 0,
    });
    emit!(Instruction::SetProperty(wasm_table_qname));

    for (offset, names) in &module.table_segments {
        for (i, func_name) in names.iter().enumerate() {
            let func_qname = pool.intern_qname(func_name);
            let index = offset + i as u32;
            emit!(Instruction::GetLocal(0));
            emit!(Instruction::GetProperty(wasm_table_qname));
            let idx_idx = pool.intern_int(index as i32);
            emit!(Instruction::PushInt(idx_idx));
            emit!(Instruction::GetLocal(0));
            emit!(Instruction::GetProperty(func_qname));
            emit!(Instruction::SetPropertyLate(late_name));
        }
    }

    // Imports: copy each host callback out of the constructor's one
    // parameter (`importsObj[module][base]`) into its slot.
    for import in &module.imports {
        let module_qname = pool.intern_qname(&import.module);
        let base_qname = pool.intern_qname(&import.base);
        let slot_qname = pool.intern_qname(format!("import${}${}", import.module, import.base));
        emit!(Instruction::GetLocal(0));
        emit!(Instruction::GetLocal(1));
        emit!(Instruction::GetProperty(module_qname));
        emit!(Instruction::GetProperty(base_qname));
        emit!(Instruction::SetProperty(slot_qname));
    }

    // The exports object: one named property per Wasm export.
    let object_qname = pool.intern_qname("Object");
    let exports_qname = pool.intern_qname("exports");
    emit!(Instruction::GetLocal(0));
    emit!(Instruction::FindPropStrict(object_qname));
    emit!(Instruction::ConstructProp {
        name: object_qname,
        argc: 0,
    });
    emit!(Instruction::SetProperty(exports_qname));

    for export in &module.exports {
        let value_qname = match export.target {
            crate::wasm_module::ExportTarget::Function(idx) => {
                if idx < module.num_imported_funcs() {
                    let import = &module.imports[idx as usize];
                    pool.intern_qname(format!("import${}${}", import.module, import.base))
                } else {
                    let local_idx = (idx - module.num_imported_funcs()) as usize;
                    pool.intern_qname(&module.function_names[local_idx])
                }
            }
            crate::wasm_module::ExportTarget::Global(idx) => {
                let name = module
                    .globals
                    .get(idx as usize)
                    .and_then(|g| g.name.clone())
                    .unwrap_or_else(|| format!("g{idx}"));
                pool.intern_qname(format!("global${name}"))
            }
            crate::wasm_module::ExportTarget::Memory => wasm_memory_qname,
            crate::wasm_module::ExportTarget::Table => wasm_table_qname,
        };
        emit!(Instruction::GetLocal(0));
        emit!(Instruction::GetProperty(exports_qname));
        let name_idx = pool.intern_string(export.name.clone());
        emit!(Instruction::PushString(name_idx));
        emit!(Instruction::GetLocal(0));
        emit!(Instruction::GetProperty(value_qname));
        emit!(Instruction::SetPropertyLate(late_name));
    }

    emit!(Instruction::ReturnVoid);

    Ok(MethodBody::new(out, stack.max(), 2))
}

fn find_global<'m>(module: &'m WasmModule, name: &str) -> Option<&'m Global> {
    module.globals.iter().enumerate().find_map(|(idx, g)| {
        let effective = g.name.clone().unwrap_or_else(|| format!("g{idx}"));
        (effective == name).then_some(g)
    })
}

fn emit_global_init(
    out: &mut Vec<Instruction>,
    stack: &mut StackDepth,
    pool: &mut ConstantPool,
    global: &Global,
) {
    macro_rules! emit {
        ($instr:expr) => {{
            let instr = $instr;
            let (pops, pushes) = instr.stack_effect();
            stack.apply(pops, pushes);
            out.push(instr);
        }};
    }
    match global.init {
        GlobalInit::I32(v) => {
            let idx = pool.intern_int(v);
            emit!(Instruction::PushInt(idx));
        }
        GlobalInit::F32(v) => {
            let v = f64::from(v);
            if v.is_nan() {
                emit!(Instruction::PushNan);
            } else {
                let idx = pool.intern_double(v);
                emit!(Instruction::PushDouble(idx));
            }
        }
        GlobalInit::F64(v) => {
            if v.is_nan() {
                emit!(Instruction::PushNan);
            } else {
                let idx = pool.intern_double(v);
                emit!(Instruction::PushDouble(idx));
            }
        }
    }
}

/// Maps each byte to the `char` of the same code point, so the ABC string
/// pool's UTF-8 encoding round-trips back to the original bytes through
/// `String.charCodeAt` (§3 data segment encoding, used by `wasm$memory_init`).
fn data_segment_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
