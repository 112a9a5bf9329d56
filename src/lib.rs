//! The middle tier of the Tarn compiler: MIR construction and validation,
//! automatic implementation synthesis, lowering from the typed tree, and
//! compile-time evaluation.

pub mod diagnostics;
pub mod index;
pub mod intern;
pub mod interp;
pub mod middle;
pub mod span;
