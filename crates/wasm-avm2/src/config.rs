//! Compilation options, mirroring the shape of a real cross-compiler's knob set:
//! a flat struct the driver (CLI or embedder) fills in and passes to `compile_with_config`.

/// Debug/trace instrumentation controls (§4.2, §6 CLI surface).
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
    /// Emit `debugfile`/`debugline` at each expression boundary.
    pub debug: bool,
    /// Emit trace callouts at each expression boundary.
    pub trace: bool,
    /// Emit trace callouts only at function entry/exit.
    pub trace_funcs: bool,
    /// If set, only these function names are traced.
    pub trace_only: Option<Vec<String>>,
    /// Function names excluded from tracing even if otherwise enabled.
    pub trace_exclude: Option<Vec<String>>,
}

impl TraceOptions {
    #[must_use]
    pub fn is_traced(&self, function: &str) -> bool {
        if !self.trace && !self.trace_funcs {
            return false;
        }
        if let Some(exclude) = &self.trace_exclude {
            if exclude.iter().any(|n| n == function) {
                return false;
            }
        }
        match &self.trace_only {
            Some(only) => only.iter().any(|n| n == function),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LowerConfig {
    /// Emit a `Wrapper extends Sprite` class and register it as the SymbolClass,
    /// for loading the movie directly with a Flash/AIR loader.
    pub sprite: bool,
    pub trace: TraceOptions,
}
