//! WASM to AVM2 (ActionScript Bytecode) cross-compiler.
//!
//! Translates a WebAssembly MVP module's `i32`/`f32`/`f64` functions into a
//! single AVM2 class embedded in a loadable SWF movie: one Wasm function per
//! AVM2 method, Wasm linear memory as a `flash.utils.ByteArray` reattached to
//! `ApplicationDomain.currentDomain.domainMemory`, and the Wasm function
//! table as a plain `Array` of `Function` values.

pub mod abc;
pub mod config;
pub mod error;
pub mod lower;
pub mod sim;
pub mod swf;
pub mod wasm_module;

#[cfg(feature = "test-harness")]
pub mod test_harness;

pub use config::{LowerConfig, TraceOptions};
pub use error::{Error, Result};
pub use lower::{compile, compile_to_abc, compile_with_config};
