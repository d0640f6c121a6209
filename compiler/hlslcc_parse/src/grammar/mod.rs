//! Grammar productions.
//!
//! # Module Structure
//!
//! - `attr.rs`: `[name(args)]` attribute lists (the rule prefix matcher)
//! - `types.rs`: type specifiers, template arguments, struct bodies
//! - `decl.rs`: the one parametrized declaration routine
//! - `expr.rs`: expressions by precedence climbing
//! - `stmt.rs`: statement rule table
//! - `item.rs`: top-level rule table (cbuffers, functions, globals)

mod attr;
mod decl;
mod expr;
mod item;
mod stmt;
mod types;

pub(crate) use attr::parse_attributes;
pub(crate) use decl::DeclFlags;
pub(crate) use item::TOP_LEVEL_RULES;
pub(crate) use stmt::STATEMENT_RULES;
