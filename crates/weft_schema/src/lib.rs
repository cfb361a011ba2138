//! Static schema model for the weft GraphQL engine.
//!
//! This crate provides the read-only type model shared by all requests:
//! - `types`: type references, type definitions and field definitions
//! - `enums`: enum definitions including flag-style bitmask enums
//! - `scalar`: the pluggable scalar conversion contract
//! - `schema`: the schema container and its builder
//!
//! The model is built once and never mutated at request time.

pub mod enums;
pub mod scalar;
pub mod schema;
pub mod types;

pub use enums::{EnumDef, EnumValueDef, FlagTable};
pub use scalar::{ScalarHandler, WireKind};
pub use schema::{Schema, SchemaBuilder};
pub use types::{
    FieldDef, FieldFlags, InputObjectDef, InputValueDef, InterfaceDef, ObjectDef, ScalarDef,
    TypeDef, TypeRef, UnionDef,
};
