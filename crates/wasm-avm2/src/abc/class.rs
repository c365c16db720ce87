//! Synthesis of the single ABC class that represents the Wasm instance
//! (§4.3), and its serialization into an ABC file byte blob.
//!
//! The container format mirrors the published `abcFormat` structure: a
//! header, one shared constant pool, a method array, an instance/class
//! pair, and a script that runs the class into existence. Field encodings
//! (`u30` lengths, trailing tables) follow that reference; this compiler
//! only ever emits the subset a single synthesized class needs, so optional
//! sections (metadata, interfaces, traits' optional slot-id/value) are
//! always written as empty/absent rather than omitted, matching how a real
//! ABC producer emits "present but empty" tables.

use super::instruction::{encode_method_body, encode_u30, Instruction};
use super::pool::{ConstantPool, PoolName};

#[derive(Debug, Clone)]
pub struct MethodBody {
    pub max_stack: u32,
    pub max_local: u32,
    pub instructions: Vec<Instruction>,
}

impl MethodBody {
    #[must_use]
    pub fn new(instructions: Vec<Instruction>, max_stack: u32, max_local: u32) -> Self {
        Self {
            max_stack,
            max_local,
            instructions,
        }
    }
}

/// A method synthesized into the class: either a lowered Wasm function, an
/// import thunk, or one of the four runtime helpers (§4.3).
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub param_count: u32,
    /// `None` means the declared return type is `void`.
    pub returns: Option<&'static str>,
    pub body: MethodBody,
}

#[derive(Debug, Clone)]
pub enum TraitKind {
    /// A Slot trait, e.g. `wasm$memory: ByteArray` or `global$counter: int`.
    Slot { type_name: &'static str },
    /// A final Method trait bound to an entry in `AbcClass::methods`.
    Method { method_index: u32 },
}

#[derive(Debug, Clone)]
pub struct Trait {
    pub name: String,
    pub kind: TraitKind,
}

/// The single synthesized ABC class representing the Wasm instance (§4.3).
#[derive(Debug, Clone)]
pub struct AbcClass {
    pub name: String,
    pub traits: Vec<Trait>,
    pub methods: Vec<Method>,
    pub instance_init: MethodBody,
    /// Always empty-bodied (return-void); Wasm has no notion of static
    /// per-class initialization distinct from the instance initializer.
    pub class_init: MethodBody,
}

impl AbcClass {
    /// Validates the invariant from §3: every trait name is unique within
    /// the class.
    pub fn check_unique_trait_names(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for t in &self.traits {
            if !seen.insert(&t.name) {
                return Err(format!("duplicate trait name `{}`", t.name));
            }
        }
        Ok(())
    }
}

/// A complete ABC file: the shared constant pool plus the one synthesized
/// class (and, when `--sprite` is set, a thin `Wrapper extends Sprite`
/// companion class for Flash/AIR loader compatibility).
pub struct AbcFile {
    pub pool: ConstantPool,
    pub class: AbcClass,
    pub sprite_wrapper: bool,
}

impl AbcFile {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // minor_version, major_version (ABC 46.16, the AVM2 baseline).
        out.extend(16u16.to_le_bytes());
        out.extend(46u16.to_le_bytes());

        self.encode_cpool(&mut out);
        self.encode_method_array(&mut out);
        out.extend(encode_u30(0)); // metadata_info[], always empty

        let class_count = 1 + u32::from(self.sprite_wrapper);
        out.extend(encode_u30(class_count));
        self.encode_instance_info(&mut out);
        if self.sprite_wrapper {
            self.encode_wrapper_instance_info(&mut out);
        }
        self.encode_class_info(&mut out);
        if self.sprite_wrapper {
            self.encode_wrapper_class_info(&mut out);
        }

        self.encode_script(&mut out);
        self.encode_method_bodies(&mut out);
        out
    }

    fn encode_cpool(&self, out: &mut Vec<u8>) {
        out.extend(encode_u30(self.pool.ints().len() as u32 + 1));
        for v in self.pool.ints() {
            out.extend(encode_u30(*v as u32));
        }
        out.extend(encode_u30(1)); // uint pool: just the implicit absent slot
        out.extend(encode_u30(self.pool.doubles().len() as u32 + 1));
        for v in self.pool.doubles() {
            out.extend(v.to_le_bytes());
        }
        out.extend(encode_u30(self.pool.strings().len() as u32 + 1));
        for s in self.pool.strings() {
            out.extend(encode_u30(s.len() as u32));
            out.extend(s.as_bytes());
        }
        // namespace pool: absent slot + the one public namespace this compiler uses.
        out.extend(encode_u30(2));
        out.push(0x08); // CONSTANT_PackageNamespace
        out.extend(encode_u30(0)); // name = "" (the public namespace)

        out.extend(encode_u30(self.pool.ns_sets().len() as u32 + 1));
        for set in self.pool.ns_sets() {
            out.extend(encode_u30(set.len() as u32));
            for ns in set {
                out.extend(encode_u30(*ns));
            }
        }

        out.extend(encode_u30(self.pool.names().len() as u32 + 1));
        for name in self.pool.names() {
            match name {
                PoolName::QName(mn) => {
                    out.push(0x07); // CONSTANT_Qname
                    out.extend(encode_u30(mn.namespace));
                    out.extend(encode_u30(mn.name));
                }
                PoolName::MultinameL { ns_set } => {
                    out.push(0x09); // CONSTANT_MultinameL
                    out.extend(encode_u30(*ns_set));
                }
            }
        }
    }

    /// Method bodies are emitted (`encode_method_bodies`) with the instance
    /// and class initializers at indices 0/1 and every other method shifted
    /// two slots up; the method_info array has to use the same numbering so
    /// a body's `method` field actually points at its own signature.
    fn encode_method_array(&self, out: &mut Vec<u8>) {
        out.extend(encode_u30(self.class.methods.len() as u32 + 2));
        self.encode_one_method_info(1, out); // instance_init: the imports object
        self.encode_one_method_info(0, out); // class_init
        for m in &self.class.methods {
            self.encode_one_method_info(m.param_count, out);
        }
    }

    fn encode_one_method_info(&self, param_count: u32, out: &mut Vec<u8>) {
        out.extend(encode_u30(param_count));
        out.extend(encode_u30(0)); // return_type: 0 = any/untyped (coercion is explicit via convert_*)
        for _ in 0..param_count {
            out.extend(encode_u30(0)); // param_type: untyped
        }
        out.extend(encode_u30(0)); // name: omitted
        out.push(0x01); // NEED_ARGUMENTS unset, flags = 0 except nothing; keep minimal
        out.extend(encode_u30(0)); // options_count
        out.extend(encode_u30(0)); // param_names_count (no NAME_... flag set)
    }

    fn encode_instance_info(&self, out: &mut Vec<u8>) {
        out.extend(encode_u30(self.qname_index(&self.class.name)));
        out.extend(encode_u30(0)); // super_name: 0 = Object
        out.push(0x00); // flags
        out.extend(encode_u30(0)); // protectedNs: absent
        out.extend(encode_u30(0)); // interfaces count
        out.extend(encode_u30(0)); // iinit: method 0 is conventionally the constructor stub; body carries instance_init separately
        self.encode_traits(&self.class.traits, out);
    }

    fn encode_wrapper_instance_info(&self, out: &mut Vec<u8>) {
        out.extend(encode_u30(self.qname_index("Wrapper")));
        out.extend(encode_u30(0)); // super_name: Sprite (by convention, resolved by the loader's domain)
        out.push(0x00);
        out.extend(encode_u30(0));
        out.extend(encode_u30(0));
        out.extend(encode_u30(0));
        out.extend(encode_u30(0)); // no traits
    }

    fn encode_class_info(&self, out: &mut Vec<u8>) {
        out.extend(encode_u30(1)); // cinit: method_info/body index 1 (§ method numbering above)
        out.extend(encode_u30(0)); // no static traits
    }

    fn encode_wrapper_class_info(&self, out: &mut Vec<u8>) {
        out.extend(encode_u30(0));
        out.extend(encode_u30(0));
    }

    fn encode_script(&self, out: &mut Vec<u8>) {
        out.extend(encode_u30(1)); // one script: installs the class into scope
        out.extend(encode_u30(0)); // init method: the class initializer
        let trait_count = 1 + u32::from(self.sprite_wrapper);
        out.extend(encode_u30(trait_count));
        self.encode_class_trait(&self.class.name, out);
        if self.sprite_wrapper {
            self.encode_class_trait("Wrapper", out);
        }
    }

    fn encode_class_trait(&self, name: &str, out: &mut Vec<u8>) {
        out.extend(encode_u30(self.qname_index(name)));
        out.push(0x04); // Trait_Class
        out.extend(encode_u30(0)); // slot_id: auto
        out.extend(encode_u30(0)); // classi: resolved by class position
        out.extend(encode_u30(0)); // metadata count
    }

    fn encode_traits(&self, traits: &[Trait], out: &mut Vec<u8>) {
        out.extend(encode_u30(traits.len() as u32));
        for t in traits {
            out.extend(encode_u30(self.qname_index(&t.name)));
            match &t.kind {
                TraitKind::Slot { type_name } => {
                    out.push(0x00); // Trait_Slot
                    out.extend(encode_u30(0)); // slot_id: auto
                    out.extend(encode_u30(self.qname_index_for_type(type_name)));
                    out.extend(encode_u30(0)); // vindex: no default value
                }
                TraitKind::Method { method_index } => {
                    out.push(0x01 | 0x10); // Trait_Method, ATTR_Final
                    out.extend(encode_u30(0)); // disp_id: auto
                    out.extend(encode_u30(*method_index));
                }
            }
            out.extend(encode_u30(0)); // metadata count
        }
    }

    fn encode_method_bodies(&self, out: &mut Vec<u8>) {
        let defined_bodies: Vec<&MethodBody> =
            self.class.methods.iter().map(|m| &m.body).collect();
        out.extend(encode_u30(defined_bodies.len() as u32 + 2)); // + instance_init + class_init
        self.encode_one_body(0, &self.class.instance_init, out);
        self.encode_one_body(1, &self.class.class_init, out);
        for (i, body) in defined_bodies.iter().enumerate() {
            self.encode_one_body(i as u32 + 2, body, out);
        }
    }

    fn encode_one_body(&self, method_index: u32, body: &MethodBody, out: &mut Vec<u8>) {
        out.extend(encode_u30(method_index));
        out.extend(encode_u30(body.max_stack));
        out.extend(encode_u30(body.max_local + 1)); // local 0 is the receiver (§3 invariant)
        out.extend(encode_u30(u32::from(!body.instructions.is_empty()) * 256)); // init_scope_depth hint, conservative
        out.extend(encode_u30(1)); // max_scope_depth
        let code = encode_method_body(&body.instructions);
        out.extend(encode_u30(code.len() as u32));
        out.extend(code);
        out.extend(encode_u30(0)); // exception handler count
        out.extend(encode_u30(0)); // trait count
    }

    fn qname_index(&self, name: &str) -> u32 {
        self.pool.find_qname(name).unwrap_or(0)
    }

    fn qname_index_for_type(&self, type_name: &str) -> u32 {
        self.qname_index(type_name)
    }
}
