use std::rc::Rc;

use colored::Colorize;
use hashbrown::HashMap;

use crate::{
    index::{Index, IndexVec, simple_index},
    intern::InternedSymbol,
    span::Span,
};

simple_index! {
    /// Identifies a user-defined aggregate (struct or enum) within an
    /// [`AdtTable`]
    pub struct AdtId;
}

/// Thin shared pointer to a structural type description. Types are cheap to
/// clone and compared structurally; the front end hands every typed tree node
/// one of these, fully resolved.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type(Rc<TypeKind>);

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn unit() -> Self {
        Self::new(TypeKind::Unit)
    }

    pub fn bool() -> Self {
        Self::new(TypeKind::Bool)
    }

    pub fn int() -> Self {
        Self::new(TypeKind::Int)
    }

    pub fn float() -> Self {
        Self::new(TypeKind::Float)
    }

    pub fn char() -> Self {
        Self::new(TypeKind::Char)
    }

    pub fn str() -> Self {
        Self::new(TypeKind::Str)
    }

    pub fn adt(id: AdtId) -> Self {
        Self::new(TypeKind::Adt(id))
    }

    pub fn array(ty: Type, length: usize) -> Self {
        Self::new(TypeKind::Array { ty, length })
    }

    pub fn pointer(pointee: Type) -> Self {
        Self::new(TypeKind::Pointer(pointee))
    }

    pub fn param(index: u32, name: InternedSymbol) -> Self {
        Self::new(TypeKind::Param { index, name })
    }

    pub fn error() -> Self {
        Self::new(TypeKind::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// ()
    Unit,
    /// true, false
    Bool,
    /// 'a', '\n'
    Char,
    /// 64-bit signed integer, the only integer width this tier models
    Int,
    /// 64-bit float
    Float,
    /// An owned, immutable string
    Str,
    /// A user-defined struct or enum
    Adt(AdtId),
    /// [T; length]
    Array { ty: Type, length: usize },
    /// *T
    ///
    /// A non-owning reference to a T living in some interpreter frame
    Pointer(Type),
    /// A generic type parameter of the enclosing declaration, deferred until
    /// instantiation
    Param { index: u32, name: InternedSymbol },
    /// The type produced by an earlier, already-reported error. Never worth a
    /// second diagnostic.
    Error,
}

impl core::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        core::fmt::Debug::fmt(&self.0, f)
    }
}

impl core::ops::Deref for Type {
    type Target = TypeKind;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl TypeKind {
    pub fn is_unit(&self) -> bool {
        matches!(self, TypeKind::Unit)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, TypeKind::Bool)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, TypeKind::Int)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeKind::Error)
    }

    pub fn as_adt(&self) -> Option<AdtId> {
        match self {
            TypeKind::Adt(id) => Some(*id),
            _ => None,
        }
    }
}

/// The set of operations a type declaration can request automatic
/// implementations for
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum DeriveKind {
    Eq,
    Ord,
    Hash,
    Clone,
}

impl DeriveKind {
    /// Suffix appended to the type name to form the generated function's
    /// symbol (`Point__op_eq`, `Point__clone`, ...)
    pub fn symbol_suffix(self) -> &'static str {
        match self {
            DeriveKind::Eq => "__op_eq",
            DeriveKind::Ord => "__op_cmp",
            DeriveKind::Hash => "__hash",
            DeriveKind::Clone => "__clone",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: InternedSymbol,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariantDef {
    pub name: InternedSymbol,
    /// Payload fields in declaration order; empty for unit variants. The
    /// variant's tag is its declaration index.
    pub fields: Vec<FieldDef>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum AdtKind {
    Struct { fields: Vec<FieldDef> },
    Enum { variants: Vec<VariantDef> },
}

#[derive(Debug, Clone)]
pub struct AdtDef {
    pub name: InternedSymbol,
    pub generic_params: Vec<InternedSymbol>,
    pub kind: AdtKind,
    /// Operations this declaration requested automatic implementations for,
    /// in source order
    pub derives: Vec<DeriveKind>,
    pub span: Span,
}

impl AdtDef {
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, AdtKind::Enum { .. })
    }

    pub fn derives(&self, op: DeriveKind) -> bool {
        self.derives.contains(&op)
    }

    pub fn struct_fields(&self) -> Option<&[FieldDef]> {
        match &self.kind {
            AdtKind::Struct { fields } => Some(fields),
            AdtKind::Enum { .. } => None,
        }
    }

    pub fn variants(&self) -> Option<&[VariantDef]> {
        match &self.kind {
            AdtKind::Enum { variants } => Some(variants),
            AdtKind::Struct { .. } => None,
        }
    }
}

/// All aggregate definitions known to one compilation invocation, produced by
/// the type checker and treated as read-only below it
#[derive(Debug, Default)]
pub struct AdtTable {
    defs: IndexVec<AdtId, AdtDef>,
    ids: HashMap<InternedSymbol, AdtId>,
}

impl AdtTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next insert will take. Self-referential layouts need it
    /// before the definition exists.
    pub fn next_id(&self) -> AdtId {
        self.defs.next_index()
    }

    pub fn insert(&mut self, def: AdtDef) -> AdtId {
        let name = def.name;
        let id = self.defs.push(def);
        self.ids.insert(name, id);
        id
    }

    pub fn get(&self, id: AdtId) -> &AdtDef {
        &self.defs[id]
    }

    pub fn id_of(&self, name: InternedSymbol) -> Option<AdtId> {
        self.ids.get(&name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AdtId, &AdtDef)> {
        self.defs.enumerate()
    }

    /// Formats a type so aggregates print with their declared names instead
    /// of raw ids
    pub fn display_type(&self, ty: &Type) -> String {
        match &**ty {
            TypeKind::Adt(id) => self.get(*id).name.value().to_owned(),
            TypeKind::Array { ty, length } => format!("[{}; {length}]", self.display_type(ty)),
            TypeKind::Pointer(ty) => format!("*{}", self.display_type(ty)),
            _ => ty.to_string(),
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &**self {
            TypeKind::Unit => write!(f, "()"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::Char => write!(f, "char"),
            TypeKind::Int => write!(f, "int"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Str => write!(f, "str"),
            TypeKind::Adt(id) => write!(f, "adt#{}", id.index()),
            TypeKind::Array { ty, length } => write!(f, "[{ty}; {length}]"),
            TypeKind::Pointer(ty) => write!(f, "*{ty}"),
            TypeKind::Param { name, .. } => write!(f, "{name}"),
            TypeKind::Error => write!(f, "{}", "{unknown}".red()),
        }
    }
}
