pub mod class;
pub mod instruction;
pub mod opcode;
pub mod pool;

pub use class::{AbcClass, AbcFile, Method, MethodBody, Trait, TraitKind};
pub use instruction::{encode_method_body, Instruction, LabelId};
pub use opcode::Opcode;
pub use pool::ConstantPool;
