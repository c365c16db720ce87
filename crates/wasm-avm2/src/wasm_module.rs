//! Parses a Wasm binary into the module metadata and per-function bodies
//! the lowerer needs (§3 "Module metadata"). Grounded on the teacher's
//! `translate::wasm_module::WasmModule`: a single `Parser::parse_all` pass
//! collecting each section into a plain struct, validated by `wasmparser`
//! up front so the lowerer never has to handle malformed binaries itself.

use wasmparser::{FunctionBody, GlobalType, Parser, Payload, ValType};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumType {
    I32,
    F32,
    F64,
}

impl NumType {
    pub(crate) fn from_valtype(ty: ValType, function: &str) -> Result<Self> {
        match ty {
            ValType::I32 => Ok(Self::I32),
            ValType::F32 => Ok(Self::F32),
            ValType::F64 => Ok(Self::F64),
            other => Err(Error::unsupported(format!("{other:?} value type"), function)),
        }
    }

    /// The AVM2 type a value of this Wasm type is represented as (§3:
    /// `avm(i32)=int`, `avm(f32)=avm(f64)=Number`).
    #[must_use]
    pub fn avm_type_name(self) -> &'static str {
        match self {
            Self::I32 => "int",
            Self::F32 | Self::F64 => "Number",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuncType {
    pub params: Vec<NumType>,
    pub results: Vec<NumType>,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub name: Option<String>,
    pub ty: NumType,
    pub mutable: bool,
    pub init: GlobalInit,
}

#[derive(Debug, Clone, Copy)]
pub enum GlobalInit {
    I32(i32),
    F32(f32),
    F64(f64),
}

#[derive(Debug, Clone)]
pub struct DataSegment {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryLimits {
    pub initial_pages: u32,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub module: String,
    pub base: String,
    pub type_index: u32,
}

#[derive(Debug, Clone)]
pub enum ExportTarget {
    Function(u32),
    Global(u32),
    Memory,
    Table,
}

#[derive(Debug, Clone)]
pub struct Export {
    pub name: String,
    pub target: ExportTarget,
}

/// A parsed, validated Wasm module ready for lowering.
pub struct WasmModule<'a> {
    pub func_types: Vec<FuncType>,
    pub function_type_indices: Vec<u32>,
    pub functions: Vec<FunctionBody<'a>>,
    pub function_names: Vec<String>,
    pub imports: Vec<Import>,
    pub globals: Vec<Global>,
    pub memory_limits: MemoryLimits,
    pub data_segments: Vec<DataSegment>,
    /// Ordered function-name vector per §3 "function-table segments".
    pub table_segments: Vec<(u32, Vec<String>)>,
    pub table_size: u32,
    pub exports: Vec<Export>,
}

impl<'a> WasmModule<'a> {
    pub fn parse(wasm: &'a [u8]) -> Result<Self> {
        wasmparser::validate(wasm)
            .map_err(|e| Error::internal(format!("module failed validation: {e}"), "<module>"))?;

        let mut func_types = Vec::new();
        let mut function_type_indices = Vec::new();
        let mut functions = Vec::new();
        let mut imports = Vec::new();
        let mut num_imported_funcs = 0u32;
        let mut globals: Vec<Global> = Vec::new();
        let mut memory_limits = MemoryLimits::default();
        let mut data_segments = Vec::new();
        let mut table_elements: Vec<(u32, Vec<u32>)> = Vec::new();
        let mut table_size = 0u32;
        let mut exports = Vec::new();
        let mut func_names: Vec<Option<String>> = Vec::new();

        for payload in Parser::new(0).parse_all(wasm) {
            match payload? {
                Payload::TypeSection(reader) => {
                    for rec_group in reader {
                        for sub_type in rec_group?.into_types() {
                            if let wasmparser::CompositeInnerType::Func(f) =
                                &sub_type.composite_type.inner
                            {
                                let params = f
                                    .params()
                                    .iter()
                                    .map(|t| NumType::from_valtype(*t, "<module>"))
                                    .collect::<Result<Vec<_>>>()?;
                                let results = f
                                    .results()
                                    .iter()
                                    .map(|t| NumType::from_valtype(*t, "<module>"))
                                    .collect::<Result<Vec<_>>>()?;
                                func_types.push(FuncType { params, results });
                            }
                        }
                    }
                }
                Payload::ImportSection(reader) => {
                    for import in reader {
                        let import = import?;
                        if let wasmparser::TypeRef::Func(type_index) = import.ty {
                            imports.push(Import {
                                module: import.module.to_string(),
                                base: import.name.to_string(),
                                type_index,
                            });
                            num_imported_funcs += 1;
                        }
                    }
                }
                Payload::FunctionSection(reader) => {
                    for type_index in reader {
                        function_type_indices.push(type_index?);
                        func_names.push(None);
                    }
                }
                Payload::GlobalSection(reader) => {
                    for global in reader {
                        let global = global?;
                        let ty = NumType::from_valtype(global.ty.content_type, "<module>")?;
                        let init = eval_const_init(&global.init_expr, ty, "<module>")?;
                        globals.push(Global {
                            name: None,
                            ty,
                            mutable: global.ty.mutable,
                            init,
                        });
                    }
                }
                Payload::MemorySection(reader) => {
                    if let Some(memory) = reader.into_iter().next() {
                        let memory = memory?;
                        memory_limits = MemoryLimits {
                            initial_pages: memory.initial as u32,
                            max_pages: memory.maximum.map(|m| m as u32),
                        };
                    }
                }
                Payload::TableSection(reader) => {
                    for table in reader {
                        table_size = table_size.max(table?.ty.initial as u32);
                    }
                }
                Payload::ElementSection(reader) => {
                    for element in reader {
                        let element = element?;
                        if let wasmparser::ElementKind::Active {
                            table_index,
                            offset_expr,
                        } = element.kind
                        {
                            let table_idx = table_index.unwrap_or(0);
                            let GlobalInit::I32(offset) =
                                eval_const_init(&offset_expr, NumType::I32, "<module>")?
                            else {
                                unreachable!("I32 init always yields GlobalInit::I32")
                            };
                            let indices: Vec<u32> = match element.items {
                                wasmparser::ElementItems::Functions(reader) => reader
                                    .into_iter()
                                    .collect::<std::result::Result<_, _>>()?,
                                wasmparser::ElementItems::Expressions(_, _) => {
                                    return Err(Error::unsupported(
                                        "reference-typed element expressions",
                                        "<module>",
                                    ));
                                }
                            };
                            let _ = table_idx; // single function table assumed (§1 scope)
                            table_elements.push((offset as u32, indices));
                        }
                    }
                }
                Payload::ExportSection(reader) => {
                    for export in reader {
                        let export = export?;
                        let target = match export.kind {
                            wasmparser::ExternalKind::Func => ExportTarget::Function(export.index),
                            wasmparser::ExternalKind::Global => ExportTarget::Global(export.index),
                            wasmparser::ExternalKind::Memory => ExportTarget::Memory,
                            wasmparser::ExternalKind::Table => ExportTarget::Table,
                            wasmparser::ExternalKind::Tag => {
                                return Err(Error::malformed("exported tag", "<module>"));
                            }
                        };
                        match export.kind {
                            wasmparser::ExternalKind::Global => {
                                let idx = export.index as usize;
                                if idx < globals.len() {
                                    globals[idx].name = Some(export.name.to_string());
                                }
                            }
                            wasmparser::ExternalKind::Func => {
                                // Exported imports are re-exports of the host
                                // function, not a local body; nothing to name.
                                if export.index >= num_imported_funcs {
                                    let local_idx =
                                        (export.index - num_imported_funcs) as usize;
                                    if local_idx < func_names.len() {
                                        func_names[local_idx] = Some(export.name.to_string());
                                    }
                                }
                            }
                            _ => {}
                        }
                        exports.push(Export {
                            name: export.name.to_string(),
                            target,
                        });
                    }
                }
                Payload::CodeSectionEntry(body) => {
                    functions.push(body);
                }
                Payload::DataSection(reader) => {
                    for data in reader {
                        let data = data?;
                        match data.kind {
                            wasmparser::DataKind::Active { offset_expr, .. } => {
                                let GlobalInit::I32(offset) =
                                    eval_const_init(&offset_expr, NumType::I32, "<module>")?
                                else {
                                    unreachable!("I32 init always yields GlobalInit::I32")
                                };
                                data_segments.push(DataSegment {
                                    offset: offset as u32,
                                    bytes: data.data.to_vec(),
                                });
                            }
                            wasmparser::DataKind::Passive => {
                                return Err(Error::unsupported("passive data segment", "<module>"));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        // Name every local function that wasn't already named by an export:
        // index k+num_imported by the Wasm convention "func$<k>".
        let function_names = func_names
            .into_iter()
            .enumerate()
            .map(|(i, n)| n.unwrap_or_else(|| format!("func${i}")))
            .collect();

        let table_segments = table_elements
            .into_iter()
            .map(|(offset, indices)| {
                let names = indices
                    .iter()
                    .map(|&idx| {
                        if (idx as usize) < num_imported_funcs as usize {
                            imports[idx as usize].base.clone()
                        } else {
                            format!("func${idx}")
                        }
                    })
                    .collect();
                (offset, names)
            })
            .collect();

        if functions.is_empty() && imports.is_empty() {
            tracing::warn!("module declares no functions");
        }

        Ok(Self {
            func_types,
            function_type_indices,
            functions,
            function_names,
            imports,
            globals,
            memory_limits,
            data_segments,
            table_segments,
            table_size,
            exports,
        })
    }

    #[must_use]
    pub fn num_imported_funcs(&self) -> u32 {
        self.imports.len() as u32
    }

    /// The function type of local function `local_idx` (0-based, after imports).
    #[must_use]
    pub fn local_func_type(&self, local_idx: usize) -> Option<&FuncType> {
        let type_idx = *self.function_type_indices.get(local_idx)?;
        self.func_types.get(type_idx as usize)
    }

    #[must_use]
    pub fn import_func_type(&self, import: &Import) -> Option<&FuncType> {
        self.func_types.get(import.type_index as usize)
    }
}

fn eval_const_init(
    expr: &wasmparser::ConstExpr,
    expected: NumType,
    function: &str,
) -> Result<GlobalInit> {
    let mut reader = expr.get_operators_reader();
    let op = reader
        .read()
        .map_err(|e| Error::malformed(format!("bad const expr: {e}"), function))?;
    let value = match (op, expected) {
        (wasmparser::Operator::I32Const { value }, NumType::I32) => GlobalInit::I32(value),
        (wasmparser::Operator::F32Const { value }, NumType::F32) => {
            GlobalInit::F32(f32::from_bits(value.bits()))
        }
        (wasmparser::Operator::F64Const { value }, NumType::F64) => {
            GlobalInit::F64(f64::from_bits(value.bits()))
        }
        _ => return Err(Error::malformed("non-constant global initializer", function)),
    };
    Ok(value)
}
