//! HLSL syntax tree.
//!
//! All expression and statement nodes of one translation unit live in an
//! [`AstArena`] and refer to each other through [`ExprId`]/[`StmtId`].
//! The tree has no cycles; it is rooted at [`TranslationUnit::declarations`].

mod decl;
mod expr;
mod stmt;

use std::fmt;
use std::ops::{Index, IndexMut};

pub use decl::{
    Attribute, CBufferDeclaration, Declaration, DeclaratorList, FullySpecifiedType,
    FunctionDefinition, FunctionPrototype, Parameter, StructSpecifier, TypeName, TypeQualifier,
    TypeSpecifier,
};
pub use expr::{Expression, Literal, Operator};
pub use stmt::{CaseLabel, CaseStatement, Statement, StmtKind, SwitchBody};

use crate::page_pool::{PagePool, PagedVec};
use crate::{NameTable, SourceFiles};

// ── Node ids ──

/// Index of an expression in its [`AstArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        ExprId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

/// Index of a statement in its [`AstArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct StmtId(u32);

impl StmtId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        StmtId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StmtId({})", self.0)
    }
}

// ── Arena ──

static EXPR_PAGES: PagePool<Expression> = PagePool::new();
static STMT_PAGES: PagePool<Statement> = PagePool::new();

/// Node storage for one translation unit.
///
/// Nodes are only ever appended. Dropping the arena returns its pages to
/// the process-wide pool.
pub struct AstArena {
    exprs: PagedVec<Expression>,
    stmts: PagedVec<Statement>,
}

impl AstArena {
    pub fn new() -> Self {
        AstArena {
            exprs: PagedVec::new(&EXPR_PAGES),
            stmts: PagedVec::new(&STMT_PAGES),
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "node count is bounded by token count"
    )]
    pub fn alloc_expr(&mut self, expr: Expression) -> ExprId {
        ExprId(self.exprs.push(expr) as u32)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "node count is bounded by token count"
    )]
    pub fn alloc_stmt(&mut self, stmt: Statement) -> StmtId {
        StmtId(self.stmts.push(stmt) as u32)
    }

    pub fn get_expr(&self, id: ExprId) -> Option<&Expression> {
        self.exprs.get(id.index())
    }

    pub fn get_stmt(&self, id: StmtId) -> Option<&Statement> {
        self.stmts.get(id.index())
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

impl Default for AstArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AstArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstArena")
            .field("exprs", &self.exprs.len())
            .field("stmts", &self.stmts.len())
            .finish()
    }
}

// Ids are only minted by the arena that owns them, so indexing with a
// foreign id is a caller bug.
impl Index<ExprId> for AstArena {
    type Output = Expression;

    fn index(&self, id: ExprId) -> &Expression {
        match self.exprs.get(id.index()) {
            Some(e) => e,
            None => panic!("{id:?} is not in this arena"),
        }
    }
}

impl IndexMut<ExprId> for AstArena {
    fn index_mut(&mut self, id: ExprId) -> &mut Expression {
        match self.exprs.get_mut(id.index()) {
            Some(e) => e,
            None => panic!("{id:?} is not in this arena"),
        }
    }
}

impl Index<StmtId> for AstArena {
    type Output = Statement;

    fn index(&self, id: StmtId) -> &Statement {
        match self.stmts.get(id.index()) {
            Some(s) => s,
            None => panic!("{id:?} is not in this arena"),
        }
    }
}

// ── Translation unit ──

/// One top-level construct, in source order.
#[derive(Clone, PartialEq, Debug)]
pub enum TopLevel {
    Function(FunctionDefinition),
    Declaration(DeclaratorList),
    CBuffer(CBufferDeclaration),
}

/// A parsed source file.
#[derive(Debug)]
pub struct TranslationUnit {
    pub arena: AstArena,
    pub declarations: Vec<TopLevel>,
    pub names: NameTable,
    pub files: SourceFiles,
}

impl TranslationUnit {
    /// Function definitions (not forward declarations) in source order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.declarations.iter().filter_map(|d| match d {
            TopLevel::Function(f) if f.body.is_some() => Some(f),
            _ => None,
        })
    }

    /// The last definition of the function called `name`.
    pub fn find_function(&self, name: &str) -> Option<&FunctionDefinition> {
        let name = self.names.get(name)?;
        self.functions().filter(|f| f.prototype.name == name).last()
    }

    /// Struct definitions reachable from top-level declarations.
    pub fn find_struct(&self, name: &str) -> Option<&StructSpecifier> {
        let name = self.names.get(name)?;
        self.declarations.iter().find_map(|d| match d {
            TopLevel::Declaration(list) => match &list.ty.specifier.name {
                TypeName::Struct(spec) if spec.name == Some(name) => Some(&**spec),
                _ => None,
            },
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests;
