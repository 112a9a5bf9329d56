//! The compiler's middle tier: type descriptors, the typed input tree, MIR,
//! and the lowering passes between them.

pub mod hir;
pub mod mir;
pub mod ty;
