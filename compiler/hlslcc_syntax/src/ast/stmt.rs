//! Statement nodes.

use crate::{ExprId, SourceLocation, StmtId};

use super::{Attribute, DeclaratorList};

#[derive(Clone, PartialEq, Debug)]
pub struct Statement {
    pub kind: StmtKind,
    /// `[unroll]`, `[loop]`, `[branch]` and friends.
    pub attributes: Vec<Attribute>,
    pub loc: SourceLocation,
}

#[derive(Clone, PartialEq, Debug)]
pub enum StmtKind {
    Compound(Vec<StmtId>),
    /// `None` is the empty statement `;`.
    Expression(Option<ExprId>),
    Declaration(DeclaratorList),
    If {
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    Switch {
        condition: ExprId,
        body: SwitchBody,
    },
    For {
        init: Option<StmtId>,
        condition: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    },
    While {
        condition: ExprId,
        body: StmtId,
    },
    DoWhile {
        body: StmtId,
        condition: ExprId,
    },
    Break,
    Continue,
    Discard,
    Return(Option<ExprId>),
}

/// Cases in source order. Statements belong to the labels that precede
/// them; fallthrough is implicit.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SwitchBody {
    pub cases: Vec<CaseStatement>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct CaseStatement {
    pub labels: Vec<CaseLabel>,
    pub statements: Vec<StmtId>,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum CaseLabel {
    Case(ExprId),
    Default,
}
