//! Type kinds and printable type names

pub mod type_system;

pub use type_system::TypeKind;
