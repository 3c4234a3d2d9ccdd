//! Pure resolvers deriving a child layout from its parent and a script.
//!
//! Both resolvers deep-copy the parent, rebase it onto the target version and
//! apply ops strictly in declared order. Enum references inside copied fields
//! stay names; they are bound against the target version only at read time.

mod entries;
mod fields;

pub use entries::{apply_enum_op, resolve_enum};
pub use fields::{apply_struct_op, resolve_struct};

#[cfg(test)]
#[path = "tests/resolve_tests.rs"]
mod tests;
