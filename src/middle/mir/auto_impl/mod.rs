//! Automatic implementation synthesis.
//!
//! Each type declaration may request generated implementations of the
//! comparison, hashing, and cloning operations. The generator walks the
//! declaration's layout, checks that every field supports the requested
//! operation, and emits a free MIR function per request through the ordinary
//! [`FunctionBuilder`] path. Generated functions follow a fixed naming
//! scheme (`Point__op_eq`, `Shape__hash`, ...) so nested calls can be
//! emitted before their target exists.

mod clone;
mod eq;
mod hash;
mod ord;

use hashbrown::HashSet;

use crate::{
    intern::InternedSymbol,
    middle::{
        mir::{Callee, Function, StructuralError, builder::FunctionBuilder},
        ty::{AdtDef, AdtId, AdtKind, AdtTable, DeriveKind, FieldDef, Type, TypeKind},
    },
    span::Span,
};

/// One requested operation for one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeriveRequest {
    pub adt: AdtId,
    pub operation: DeriveKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeriveError {
    #[error("cannot derive {operation} for `{adt}`: field `{field}` of type `{ty}` does not support it")]
    MissingOperation {
        adt: InternedSymbol,
        field: InternedSymbol,
        ty: String,
        operation: DeriveKind,
        span: Span,
    },
    #[error("cannot derive {operation} for `{adt}`: its layout recursively contains itself via `{through}`")]
    RecursiveLayout {
        adt: InternedSymbol,
        through: InternedSymbol,
        operation: DeriveKind,
        span: Span,
    },
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// The symbol a generated operation is registered under
pub fn derive_symbol(adts: &AdtTable, adt: AdtId, operation: DeriveKind) -> InternedSymbol {
    InternedSymbol::new(&format!(
        "{}{}",
        adts.get(adt).name,
        operation.symbol_suffix()
    ))
}

pub struct AutoImplGenerator<'a> {
    adts: &'a AdtTable,
}

impl<'a> AutoImplGenerator<'a> {
    pub fn new(adts: &'a AdtTable) -> Self {
        Self { adts }
    }

    /// Synthesizes the function for one request.
    ///
    /// The whole request fails up front if any field lacks the operation or
    /// the layout contains itself by value; no partial function is emitted.
    pub fn generate(&self, request: DeriveRequest) -> Result<Function, DeriveError> {
        let def = self.adts.get(request.adt);

        log::debug!("auto_impl: deriving {} for `{}`", request.operation, def.name);

        self.check_recursion(request, def)?;
        self.check_capability(request, def)?;

        let function = match request.operation {
            DeriveKind::Eq => eq::generate(self.adts, request.adt, def)?,
            DeriveKind::Ord => ord::generate(self.adts, request.adt, def)?,
            DeriveKind::Hash => hash::generate(self.adts, request.adt, def)?,
            DeriveKind::Clone => clone::generate(self.adts, request.adt, def)?,
        };

        Ok(function)
    }

    /// Rejects layouts that contain themselves by value. Pointer fields
    /// break the cycle; arrays and nested aggregates are followed.
    fn check_recursion(&self, request: DeriveRequest, def: &AdtDef) -> Result<(), DeriveError> {
        let mut visiting = HashSet::new();
        visiting.insert(request.adt);

        for field in fields_of(def) {
            self.visit_field_type(request, def, &field.ty, &mut visiting)?;
        }

        Ok(())
    }

    fn visit_field_type(
        &self,
        request: DeriveRequest,
        origin: &AdtDef,
        ty: &Type,
        visiting: &mut HashSet<AdtId>,
    ) -> Result<(), DeriveError> {
        match &**ty {
            TypeKind::Adt(id) => {
                let nested = self.adts.get(*id);

                if !visiting.insert(*id) {
                    return Err(DeriveError::RecursiveLayout {
                        adt: origin.name,
                        through: nested.name,
                        operation: request.operation,
                        span: origin.span,
                    });
                }

                for field in fields_of(nested) {
                    self.visit_field_type(request, origin, &field.ty, visiting)?;
                }

                visiting.remove(id);
                Ok(())
            }
            TypeKind::Array { ty, .. } => self.visit_field_type(request, origin, ty, visiting),
            // a pointer makes the layout finite again
            TypeKind::Pointer(_) => Ok(()),
            _ => Ok(()),
        }
    }

    /// Every field and payload must support the requested operation
    fn check_capability(&self, request: DeriveRequest, def: &AdtDef) -> Result<(), DeriveError> {
        for field in fields_of(def) {
            if !self.supports(&field.ty, request.operation) {
                return Err(DeriveError::MissingOperation {
                    adt: def.name,
                    field: field.name,
                    ty: self.adts.display_type(&field.ty),
                    operation: request.operation,
                    span: field.span,
                });
            }
        }

        Ok(())
    }

    fn supports(&self, ty: &Type, operation: DeriveKind) -> bool {
        match &**ty {
            TypeKind::Unit
            | TypeKind::Bool
            | TypeKind::Char
            | TypeKind::Int
            | TypeKind::Float
            | TypeKind::Str => true,
            TypeKind::Adt(id) => self.adts.get(*id).derives(operation),
            // shallow copy and identity comparison only
            TypeKind::Pointer(_) => {
                matches!(operation, DeriveKind::Clone | DeriveKind::Eq)
            }
            // deferred to instantiation
            TypeKind::Param { .. } => true,
            TypeKind::Array { .. } | TypeKind::Error => false,
        }
    }
}

/// Every field of a declaration regardless of shape, payload fields included
fn fields_of(def: &AdtDef) -> impl Iterator<Item = &FieldDef> {
    let (struct_fields, variants): (&[FieldDef], &[_]) = match &def.kind {
        AdtKind::Struct { fields } => (fields, &[]),
        AdtKind::Enum { variants } => (&[], variants),
    };

    struct_fields
        .iter()
        .chain(variants.iter().flat_map(|variant| variant.fields.iter()))
}

/// How one field participates in a generated operation: inline instructions
/// for primitives and pointers, a call for everything else
pub(super) fn callee_for(
    adts: &AdtTable,
    ty: &Type,
    operation: DeriveKind,
) -> Option<Callee> {
    match &**ty {
        TypeKind::Adt(id) => Some(Callee::Named(derive_symbol(adts, *id, operation))),
        TypeKind::Param { .. } => Some(Callee::DeriveOf(operation, ty.clone())),
        _ => None,
    }
}

pub(super) fn new_builder(
    adts: &AdtTable,
    adt: AdtId,
    def: &AdtDef,
    operation: DeriveKind,
    parameter_count: usize,
    return_type: Type,
) -> FunctionBuilder {
    FunctionBuilder::new(
        derive_symbol(adts, adt, operation),
        std::iter::repeat_n(Type::adt(adt), parameter_count),
        return_type,
        def.span,
    )
}
