//! Scope tree and symbol registration.
//!
//! A tree of `Rc<RefCell<Scope>>` nodes with parent-chain lookup and
//! `push_scope`/`pop_scope` driven by the inference walker. Cross-file
//! import resolution deliberately does **not** live here: the analyzer only
//! accepts already-resolved external symbols as input, and `lumina-project`
//! owns turning import specs into those.

use lumina_ast::nodes::Visibility;
use lumina_types::Type;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// Primitive type names pre-registered in every root scope.
const PRIMITIVES: &[&str] = &[
    "int", "float", "string", "bool", "void", "any", "i8", "i16", "i32", "i64", "i128", "u8", "u16", "u32",
    "u64", "u128", "usize", "f32", "f64",
];

/// Runtime namespaces injected into every emitted module. Typed `any` so
/// member access and calls through them don't constrain inference.
const RUNTIME_NAMESPACES: &[&str] = &["io", "str", "math", "list", "fs", "http"];

#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub name: String,
    pub type_params: Vec<String>,
    pub const_params: Vec<String>,
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub visibility: Visibility,
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub name: String,
    pub fields: FxHashMap<String, (Type, Visibility)>,
    pub field_order: Vec<String>,
    pub type_params: Vec<String>,
    pub const_params: Vec<String>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone)]
pub struct EnumVariantInfo {
    pub name: String,
    pub payload: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub name: String,
    pub variants: Vec<EnumVariantInfo>,
    pub type_params: Vec<String>,
    pub visibility: Visibility,
}

impl EnumInfo {
    #[must_use]
    pub fn variant(&self, name: &str) -> Option<&EnumVariantInfo> {
        self.variants.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct TraitMethodInfo {
    pub name: String,
    pub has_self: bool,
    pub param_types: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone)]
pub struct TraitInfo {
    pub name: String,
    pub methods: Vec<TraitMethodInfo>,
}

/// A method callable on `for_type`, registered by an `impl` block and
/// optionally belonging to `trait_name`.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub signature: FuncInfo,
    pub trait_name: Option<String>,
    pub for_type: String,
    pub has_self: bool,
}

#[derive(Debug, Clone)]
pub enum Symbol {
    TypeAlias(Type),
    Struct(StructInfo),
    Enum(EnumInfo),
    Trait(TraitInfo),
    Function(FuncInfo),
}

impl Symbol {
    #[must_use]
    pub fn is_public(&self) -> bool {
        match self {
            Symbol::TypeAlias(_) | Symbol::Trait(_) => true,
            Symbol::Struct(info) => info.visibility == Visibility::Public,
            Symbol::Enum(info) => info.visibility == Visibility::Public,
            Symbol::Function(info) => info.visibility == Visibility::Public,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&FuncInfo> {
        match self {
            Symbol::Function(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_struct(&self) -> Option<&StructInfo> {
        match self {
            Symbol::Struct(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_enum(&self) -> Option<&EnumInfo> {
        match self {
            Symbol::Enum(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_type(&self) -> Option<Type> {
        match self {
            Symbol::TypeAlias(t) => Some(t.clone()),
            Symbol::Struct(s) => Some(Type::adt(s.name.clone())),
            Symbol::Enum(e) => Some(Type::adt(e.name.clone())),
            Symbol::Trait(_) | Symbol::Function(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct Scope {
    pub id: u32,
    pub parent: Option<ScopeRef>,
    pub symbols: FxHashMap<String, Symbol>,
    pub variables: FxHashMap<String, (u32, Type)>,
}

impl Scope {
    fn new(id: u32, parent: Option<ScopeRef>) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            id,
            parent,
            symbols: FxHashMap::default(),
            variables: FxHashMap::default(),
        }))
    }

    fn lookup_symbol(&self, name: &str) -> Option<Symbol> {
        if let Some(sym) = self.symbols.get(name) {
            return Some(sym.clone());
        }
        self.parent.as_ref().and_then(|p| p.borrow().lookup_symbol(name))
    }

    fn lookup_variable(&self, name: &str) -> Option<(u32, Type)> {
        if let Some(v) = self.variables.get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.borrow().lookup_variable(name))
    }
}

/// Flat, whole-program symbol table plus a scope tree for lexical lookups.
/// Methods live in a single global table keyed by receiver type name since
/// Lumina has no nested-module scoping inside one compilation unit (that
/// lives in `lumina-project`).
pub struct SymbolTable {
    scopes: FxHashMap<u32, ScopeRef>,
    root: ScopeRef,
    current: ScopeRef,
    next_id: u32,
    methods: FxHashMap<String, Vec<MethodInfo>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let root = Scope::new(0, None);
        let mut table = Self {
            scopes: FxHashMap::default(),
            root: Rc::clone(&root),
            current: Rc::clone(&root),
            next_id: 1,
            methods: FxHashMap::default(),
        };
        table.scopes.insert(0, root);
        table.init_builtins();
        table
    }
}

impl SymbolTable {
    fn init_builtins(&mut self) {
        use lumina_types::Primitive;
        let mut root = self.root.borrow_mut();
        for name in PRIMITIVES {
            if let Some(p) = Primitive::from_str(name) {
                root.symbols.insert((*name).to_string(), Symbol::TypeAlias(Type::Primitive(p)));
            }
        }
        for name in RUNTIME_NAMESPACES {
            root.variables.insert((*name).to_string(), (0, Type::Primitive(Primitive::Any)));
        }
    }

    pub fn push_scope(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let scope = Scope::new(id, Some(Rc::clone(&self.current)));
        self.scopes.insert(id, Rc::clone(&scope));
        self.current = scope;
        id
    }

    pub fn pop_scope(&mut self) {
        let parent = self.current.borrow().parent.clone();
        if let Some(p) = parent {
            self.current = p;
        }
    }

    /// Inserts `symbol` in the current scope, returning `false` (instead of
    /// erroring) if `name` already exists there — the caller turns that into
    /// a `DUP-DECL` diagnostic rather than aborting analysis.
    pub fn insert_symbol(&mut self, name: &str, symbol: Symbol) -> bool {
        let mut scope = self.current.borrow_mut();
        if scope.symbols.contains_key(name) {
            return false;
        }
        scope.symbols.insert(name.to_string(), symbol);
        true
    }

    pub fn insert_variable(&mut self, name: &str, node_id: u32, ty: Type) {
        self.current.borrow_mut().variables.insert(name.to_string(), (node_id, ty));
    }

    #[must_use]
    pub fn lookup_symbol(&self, name: &str) -> Option<Symbol> {
        self.current.borrow().lookup_symbol(name)
    }

    #[must_use]
    pub fn lookup_variable(&self, name: &str) -> Option<Type> {
        self.current.borrow().lookup_variable(name).map(|(_, t)| t)
    }

    #[must_use]
    pub fn lookup_function(&self, name: &str) -> Option<FuncInfo> {
        self.lookup_symbol(name).and_then(|s| s.as_function().cloned())
    }

    #[must_use]
    pub fn lookup_struct(&self, name: &str) -> Option<StructInfo> {
        self.lookup_symbol(name).and_then(|s| s.as_struct().cloned())
    }

    #[must_use]
    pub fn lookup_enum(&self, name: &str) -> Option<EnumInfo> {
        self.lookup_symbol(name).and_then(|s| s.as_enum().cloned())
    }

    /// All known enum infos, used to resolve a bare constructor call name
    /// (`Some(x)`) to its owning enum.
    #[must_use]
    pub fn all_enums(&self) -> Vec<EnumInfo> {
        self.root
            .borrow()
            .symbols
            .values()
            .filter_map(|s| s.as_enum().cloned())
            .collect()
    }

    /// Symbols another document may import from this one: every public
    /// declaration in the root scope, excluding the pre-registered builtins.
    #[must_use]
    pub fn exported_symbols(&self) -> Vec<(String, Symbol)> {
        self.root
            .borrow()
            .symbols
            .iter()
            .filter(|(name, symbol)| !PRIMITIVES.contains(&name.as_str()) && symbol.is_public())
            .map(|(name, symbol)| (name.clone(), symbol.clone()))
            .collect()
    }

    /// Looks up a root-scope declaration by name regardless of visibility;
    /// the project manager uses this to distinguish a private symbol from a
    /// missing one at an import site.
    #[must_use]
    pub fn root_symbol(&self, name: &str) -> Option<Symbol> {
        self.root.borrow().symbols.get(name).cloned()
    }

    pub fn register_method(&mut self, method: MethodInfo) {
        self.methods.entry(method.for_type.clone()).or_default().push(method);
    }

    #[must_use]
    pub fn lookup_methods(&self, type_name: &str, method_name: &str) -> Vec<&MethodInfo> {
        self.methods
            .get(type_name)
            .map(|methods| methods.iter().filter(|m| m.signature.name == method_name).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn current_scope_id(&self) -> u32 {
        self.current.borrow().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let table = SymbolTable::default();
        assert!(table.lookup_symbol("i32").is_some());
        assert!(table.lookup_symbol("string").is_some());
    }

    #[test]
    fn duplicate_insert_reports_false_not_panic() {
        let mut table = SymbolTable::default();
        assert!(table.insert_symbol("Foo", Symbol::TypeAlias(Type::adt("Foo"))));
        assert!(!table.insert_symbol("Foo", Symbol::TypeAlias(Type::adt("Foo"))));
    }

    #[test]
    fn nested_scope_sees_parent_symbols() {
        let mut table = SymbolTable::default();
        table.insert_symbol("Foo", Symbol::TypeAlias(Type::adt("Foo")));
        table.push_scope();
        assert!(table.lookup_symbol("Foo").is_some());
        table.pop_scope();
    }

    #[test]
    fn variable_shadowing_in_nested_scope() {
        let mut table = SymbolTable::default();
        table.insert_variable("x", 1, Type::Primitive(lumina_types::Primitive::I32));
        table.push_scope();
        table.insert_variable("x", 2, Type::Primitive(lumina_types::Primitive::Bool));
        assert_eq!(table.lookup_variable("x"), Some(Type::Primitive(lumina_types::Primitive::Bool)));
        table.pop_scope();
        assert_eq!(table.lookup_variable("x"), Some(Type::Primitive(lumina_types::Primitive::I32)));
    }
}
