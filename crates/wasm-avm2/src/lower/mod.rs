//! The lowering engine: expression lowerer (§4.1), function lowerer (§4.2),
//! and module assembler (§4.3), wired together by `compile`/`compile_with_config`.

pub mod calls;
pub mod control_flow;
mod cursor;
pub mod expr;
pub mod function;
pub mod labels;
pub mod locals;
pub mod memory;
pub mod misc;
pub mod numeric;
pub mod stack;

use std::collections::HashMap;

use crate::abc::{AbcClass, AbcFile, ConstantPool, Instruction, MethodBody, Trait, TraitKind};
use crate::config::LowerConfig;
use crate::error::{Error, Result};
use crate::swf::SwfMovie;
use crate::wasm_module::{ExportTarget, NumType, WasmModule};
use labels::{FreeLocals, LabelStack};
use stack::StackDepth;

/// A comparison pending a fold into a branch (§4.1.2), set by the numeric
/// lowerer one token before it is consumed by `if`/`br_if` lowering; never
/// left dangling because it is only set after peeking that the very next
/// operator will consume it.
#[derive(Debug, Clone, Copy)]
pub enum PendingCompare {
    /// Direct signed/float comparator; `for_br` selects direct-vs-inverse form.
    Signed(SignedCompareOp),
    Unsigned(UnsignedCompareOp),
    /// `i32.eqz` of the value currently on top of stack.
    EqZero,
}

#[derive(Debug, Clone, Copy)]
pub enum SignedCompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy)]
pub enum UnsignedCompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// Module-wide state the expression lowerer mutates as it discovers
/// references (§9 "Globals discovered lazily"): the set of globals and
/// imports that need a Slot trait, registered on first use rather than
/// up front.
#[derive(Debug, Default)]
pub struct ModuleRefs {
    pub referenced_globals: Vec<String>,
    global_index: HashMap<String, usize>,
}

impl ModuleRefs {
    pub fn register_global(&mut self, name: &str) {
        if !self.global_index.contains_key(name) {
            self.global_index.insert(name.to_string(), self.referenced_globals.len());
            self.referenced_globals.push(name.to_string());
        }
    }
}

/// Per-function lowering context: the accumulator the spec calls the
/// "method builder" (§3), plus everything `emit` needs to reach module
/// metadata and the shared constant pool.
pub struct Ctx<'m> {
    pub module: &'m WasmModule<'m>,
    pub pool: &'m mut ConstantPool,
    pub refs: &'m mut ModuleRefs,
    pub function_name: String,
    pub locals: Vec<NumType>,
    pub result_type: Option<NumType>,
    pub out: Vec<Instruction>,
    pub stack: StackDepth,
    pub labels: LabelStack,
    pub free: FreeLocals,
    pub pending_compare: Option<PendingCompare>,
    pub label_counter: u32,
    pub trace: crate::config::TraceOptions,
}

impl<'m> Ctx<'m> {
    /// Appends an instruction and updates the stack high-watermark in the
    /// same step, exactly as §4.2 requires ("the computed max_stack").
    pub fn emit(&mut self, instr: Instruction) {
        let (pops, pushes) = instr.stack_effect();
        self.stack.apply(pops, pushes);
        self.out.push(instr);
    }

    pub fn fresh_label_name(&mut self, kind: &str) -> String {
        let name = format!("{kind}${}", self.label_counter);
        self.label_counter += 1;
        name
    }

    /// AVM2 local slot for Wasm local `k` (§3 invariant: local 0 is the receiver).
    #[must_use]
    pub fn avm_local(wasm_local: u32) -> u32 {
        wasm_local + 1
    }

    pub fn err_unsupported(&self, construct: impl Into<String>) -> Error {
        Error::unsupported(construct, &self.function_name)
    }

    pub fn err_malformed(&self, detail: impl Into<String>) -> Error {
        Error::malformed(detail, &self.function_name)
    }

    pub fn err_internal(&self, detail: impl Into<String>) -> Error {
        Error::internal(detail, &self.function_name)
    }
}

pub fn compile(wasm: &[u8]) -> Result<Vec<u8>> {
    compile_with_config(wasm, &LowerConfig::default())
}

pub fn compile_with_config(wasm: &[u8], config: &LowerConfig) -> Result<Vec<u8>> {
    let module = WasmModule::parse(wasm)?;
    let class = assemble_class(&module, config)?;
    let mut pool = ConstantPool::new();
    let class = finalize_traits(&mut pool, class);
    let abc = AbcFile {
        pool,
        class,
        sprite_wrapper: config.sprite,
    };
    let abc_bytes = abc.encode();
    let movie = SwfMovie::new(abc_bytes, config.sprite, "Instance");
    Ok(movie.encode())
}

/// Lowers a module to its synthesized class without encoding it, so tests
/// can inspect individual methods' instruction streams directly (§8
/// end-to-end scenarios assert on instruction *shape*, not on live
/// execution or raw bytes).
#[cfg(feature = "test-harness")]
pub fn lower_to_class(wasm: &[u8], config: &LowerConfig) -> Result<AbcClass> {
    let module = WasmModule::parse(wasm)?;
    assemble_class(&module, config)
}

/// Produces a raw ABC blob instead of a full SWF (§6 Output: "extension-dispatched").
pub fn compile_to_abc(wasm: &[u8], config: &LowerConfig) -> Result<Vec<u8>> {
    let module = WasmModule::parse(wasm)?;
    let class = assemble_class(&module, config)?;
    let mut pool = ConstantPool::new();
    let class = finalize_traits(&mut pool, class);
    let abc = AbcFile {
        pool,
        class,
        sprite_wrapper: config.sprite,
    };
    Ok(abc.encode())
}

fn assemble_class(module: &WasmModule, config: &LowerConfig) -> Result<AbcClass> {
    let mut pool = ConstantPool::new();
    let mut refs = ModuleRefs::default();
    let mut methods = Vec::new();

    for (local_idx, _) in module.functions.iter().enumerate() {
        let method = function::lower_function(module, &mut pool, &mut refs, local_idx, config)?;
        methods.push(method);
    }
    for import in &module.imports {
        let thunk = function::lower_import_thunk(module, &mut pool, import)?;
        methods.push(thunk);
    }
    methods.push(function::helper_clz32(&mut pool));
    methods.push(function::helper_memory_grow(&mut pool));
    methods.push(function::helper_memory_size(&mut pool));
    methods.push(function::helper_memory_init(&mut pool));
    methods.push(function::helper_demote_f64_f32(&mut pool));
    methods.push(function::helper_reinterpret_i32_f32(&mut pool));
    methods.push(function::helper_reinterpret_f32_i32(&mut pool));

    // §9: walk exports to catch globals exported but never read/written.
    for export in &module.exports {
        if let ExportTarget::Global(idx) = export.target {
            if let Some(global) = module.globals.get(idx as usize) {
                let name = global.name.clone().unwrap_or_else(|| format!("g{idx}"));
                refs.register_global(&name);
            }
        }
    }

    let mut traits = Vec::new();
    traits.push(Trait {
        name: "wasm$memory".to_string(),
        kind: TraitKind::Slot { type_name: "ByteArray" },
    });
    traits.push(Trait {
        name: "wasm$table".to_string(),
        kind: TraitKind::Slot { type_name: "Array" },
    });
    traits.push(Trait {
        name: "wasm$scratch".to_string(),
        kind: TraitKind::Slot { type_name: "ByteArray" },
    });
    traits.push(Trait {
        name: "exports".to_string(),
        kind: TraitKind::Slot { type_name: "Object" },
    });
    for global_name in &refs.referenced_globals {
        let global = module
            .globals
            .iter()
            .find(|g| g.name.as_deref() == Some(global_name.as_str()));
        let type_name = global.map_or("int", |g| g.ty.avm_type_name());
        traits.push(Trait {
            name: format!("global${global_name}"),
            kind: TraitKind::Slot { type_name },
        });
    }
    for import in &module.imports {
        traits.push(Trait {
            name: format!("import${}${}", import.module, import.base),
            kind: TraitKind::Slot { type_name: "Function" },
        });
    }
    // Method bodies 0/1 are the instance/class initializers (`encode_method_bodies`);
    // every entry in `methods` is shifted up by 2 to match.
    let method_base = 2u32;
    for (i, _) in module.functions.iter().enumerate() {
        traits.push(Trait {
            name: module.function_names[i].clone(),
            kind: TraitKind::Method {
                method_index: method_base + i as u32,
            },
        });
    }
    let import_base = method_base + module.functions.len() as u32;
    for (i, import) in module.imports.iter().enumerate() {
        traits.push(Trait {
            name: format!("func${}", import.base),
            kind: TraitKind::Method {
                method_index: import_base + i as u32,
            },
        });
    }
    let helper_base = import_base + module.imports.len() as u32;
    for (i, name) in [
        "clz32",
        "wasm$memory_grow",
        "wasm$memory_size",
        "wasm$memory_init",
        "wasm$demote_f64_f32",
        "wasm$reinterpret_i32_f32",
        "wasm$reinterpret_f32_i32",
    ]
    .iter()
    .enumerate()
    {
        traits.push(Trait {
            name: (*name).to_string(),
            kind: TraitKind::Method {
                method_index: helper_base + i as u32,
            },
        });
    }

    let instance_init = function::instance_initializer(module, &mut pool, &refs)?;
    let class_init = MethodBody::new(vec![Instruction::ReturnVoid], 0, 0);

    let class = AbcClass {
        name: "Instance".to_string(),
        traits,
        methods,
        instance_init,
        class_init,
    };
    class
        .check_unique_trait_names()
        .map_err(|detail| Error::internal(detail, "<module>"))?;
    Ok(class)
}

/// Interns every name the class assembly referenced into the shared pool,
/// so `AbcClass`'s encoder can resolve qname indices by name.
fn finalize_traits(pool: &mut ConstantPool, class: AbcClass) -> AbcClass {
    pool.intern_qname(&class.name);
    pool.intern_qname("Wrapper");
    for t in &class.traits {
        pool.intern_qname(&t.name);
        if let TraitKind::Slot { type_name } = t.kind {
            pool.intern_qname(type_name);
        }
    }
    for type_name in ["int", "Number", "ByteArray", "Array", "Object", "Function"] {
        pool.intern_qname(type_name);
    }
    class
}
