//! HLSL syntax data structures.
//!
//! This crate holds everything the front end produces and the rest of the
//! compiler consumes before lowering:
//! - Source locations (`SourceLocation`, `SourceFiles`) with `#line` support
//! - Interned identifiers (`Name`, `NameTable`)
//! - Tokens (`TokenKind`, `Token`, `TokenStream`)
//! - The syntax tree (`ast`), allocated from an `AstArena`
//! - The process-wide page pool backing every arena (`page_pool`)
//!
//! # Design Philosophy
//!
//! - **Index, don't point**: tokens are addressed by cursor position and
//!   nodes by `ExprId`/`StmtId`, so backtracking is a single integer restore.
//! - **Bulk lifetime**: nodes are never freed one at a time. Dropping the
//!   arena hands its pages back to the pool for the next compilation.

pub mod ast;
mod location;
mod name;
pub mod page_pool;
mod token;

pub use ast::{AstArena, ExprId, StmtId};
pub use location::{FileId, SourceFiles, SourceLocation};
pub use name::{Name, NameTable};
pub use token::{
    LexAnomaly, NumericType, SamplerKind, ScalarKind, Shape, TextureKind, Token, TokenKind,
    TokenStream,
};
