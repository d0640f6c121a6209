//! Statements and control flow.
//!
//! Every loop becomes an infinite [`Instruction::Loop`] whose exit tests are
//! explicit `if (!cond) break;` instructions:
//!
//! - `for (init; c; step) body` runs `init`, then `loop { if (!c) break; body; step }`
//! - `while (c) body` is `loop { if (!c) break; body }`
//! - `do body while (c)` is `loop { body; if (!c) break; }`
//!
//! A `continue` repeats whatever the loop runs after its body before jumping.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_ir::{CaseLabel, ConstValue, ExprOp, Instruction, Rvalue, SwitchCase, TypeId, VarMode};
use hlslcc_stack::ensure_sufficient_stack;
use hlslcc_syntax::ast::{self, DeclaratorList, StmtKind, SwitchBody};
use hlslcc_syntax::{ExprId, SourceLocation, StmtId};

use crate::{ContinueAction, Lowerer};

impl Lowerer<'_> {
    pub(crate) fn lower_statement(&mut self, id: StmtId) -> Result<(), SourceError> {
        ensure_sufficient_stack(|| self.lower_statement_inner(id))
    }

    fn lower_statement_inner(&mut self, id: StmtId) -> Result<(), SourceError> {
        let unit = self.unit;
        let stmt = &unit.arena[id];
        let loc = stmt.loc;
        match &stmt.kind {
            StmtKind::Compound(items) => self.in_scope(|this| {
                for &item in items {
                    this.lower_statement(item)?;
                }
                Ok(())
            }),
            StmtKind::Expression(Some(expr)) => self.lower_expr(*expr).map(drop),
            StmtKind::Expression(None) => Ok(()),
            StmtKind::Declaration(list) => self.lower_local_declaration(list),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.lower_expr(*condition)?;
                let cond = self.condition(cond, loc)?;
                let then_code = self.lower_branch(*then_branch)?;
                let else_code = match else_branch {
                    Some(branch) => self.lower_branch(*branch)?,
                    None => Vec::new(),
                };
                self.emit(Instruction::If {
                    condition: cond,
                    then_branch: then_code,
                    else_branch: else_code,
                });
                Ok(())
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => self.in_scope(|this| {
                if let Some(init) = init {
                    this.lower_statement(*init)?;
                }
                let action = step.map_or(ContinueAction::Nothing, ContinueAction::Step);
                this.lower_loop(*condition, *body, action, loc)
            }),
            StmtKind::While { condition, body } => {
                self.lower_loop(Some(*condition), *body, ContinueAction::Nothing, loc)
            }
            StmtKind::DoWhile { body, condition } => {
                self.lower_loop(None, *body, ContinueAction::Condition(*condition), loc)
            }
            StmtKind::Switch { condition, body } => self.lower_switch(*condition, body, loc),
            StmtKind::Break => {
                self.emit(Instruction::Break);
                Ok(())
            }
            StmtKind::Continue => {
                let Some(&action) = self.loops.last() else {
                    return Err(self.error(ErrorCode::E2008, loc, "'continue' outside of a loop"));
                };
                self.run_continue_action(action, loc)?;
                self.emit(Instruction::Continue);
                Ok(())
            }
            StmtKind::Discard => {
                self.emit(Instruction::Discard);
                Ok(())
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => {
                        let value = self.lower_expr(*expr)?;
                        if self.return_type == TypeId::VOID {
                            return Err(self.error(
                                ErrorCode::E2006,
                                loc,
                                "void function returns a value",
                            ));
                        }
                        Some(self.convert(value, self.return_type, loc)?)
                    }
                    None => None,
                };
                self.emit(Instruction::Return(value));
                Ok(())
            }
        }
    }

    /// A branch of an `if`, in its own block and scope.
    fn lower_branch(&mut self, stmt: StmtId) -> Result<Vec<Instruction>, SourceError> {
        self.in_block(|this| this.in_scope(|this| this.lower_statement(stmt)))
    }

    fn lower_local_declaration(&mut self, list: &DeclaratorList) -> Result<(), SourceError> {
        let base = self.resolve_type(&list.ty.specifier)?;
        for decl in &list.declarations {
            let ty = self.apply_array_dims(base, &decl.array_dims, decl.loc)?;
            let var = self.local(self.name(decl.identifier), ty, VarMode::Auto);
            self.declare_var(decl.identifier, var);
            if let Some(init) = decl.initializer {
                self.lower_initializer(var, init)?;
            }
        }
        Ok(())
    }

    // ── Loops ──

    fn lower_loop(
        &mut self,
        test_first: Option<ExprId>,
        body: StmtId,
        action: ContinueAction,
        loc: SourceLocation,
    ) -> Result<(), SourceError> {
        self.loops.push(action);
        let code = self.in_block(|this| {
            if let Some(condition) = test_first {
                this.exit_unless(condition, loc)?;
            }
            this.in_scope(|this| this.lower_statement(body))?;
            this.run_continue_action(action, loc)
        });
        self.loops.pop();
        self.emit(Instruction::Loop { body: code? });
        Ok(())
    }

    fn run_continue_action(&mut self, action: ContinueAction, loc: SourceLocation) -> Result<(), SourceError> {
        match action {
            ContinueAction::Nothing => Ok(()),
            ContinueAction::Step(step) => self.lower_expr(step).map(drop),
            ContinueAction::Condition(condition) => self.exit_unless(condition, loc),
        }
    }

    /// `if (!condition) break;`, folded when the condition is constant.
    fn exit_unless(&mut self, condition: ExprId, loc: SourceLocation) -> Result<(), SourceError> {
        let cond = self.lower_expr(condition)?;
        let cond = self.condition(cond, loc)?;
        match cond.as_constant().and_then(<[ConstValue]>::first) {
            Some(value) if value.is_true() => {}
            Some(_) => self.emit(Instruction::Break),
            None => self.emit(Instruction::If {
                condition: Rvalue::expr(TypeId::BOOL, ExprOp::LogicNot, vec![cond]),
                then_branch: vec![Instruction::Break],
                else_branch: Vec::new(),
            }),
        }
        Ok(())
    }

    // ── Switch ──

    fn lower_switch(
        &mut self,
        condition: ExprId,
        body: &SwitchBody,
        loc: SourceLocation,
    ) -> Result<(), SourceError> {
        let selector = self.lower_expr(condition)?;
        let unsigned = selector.ty == TypeId::UINT;
        let selector = if unsigned {
            selector
        } else {
            self.convert(selector, TypeId::INT, loc)?
        };

        let cases = self.in_scope(|this| {
            let mut cases = Vec::with_capacity(body.cases.len());
            for case in &body.cases {
                let mut labels = Vec::with_capacity(case.labels.len());
                for label in &case.labels {
                    labels.push(match *label {
                        ast::CaseLabel::Default => CaseLabel::Default,
                        ast::CaseLabel::Case(value) => {
                            let value = this.eval_const_int(value).ok_or_else(|| {
                                this.error(
                                    ErrorCode::E2011,
                                    loc,
                                    "case label must be an integer constant",
                                )
                            })?;
                            #[expect(
                                clippy::cast_possible_truncation,
                                clippy::cast_sign_loss,
                                reason = "case labels wrap to the selector type"
                            )]
                            let value = if unsigned {
                                ConstValue::Uint(value as u32)
                            } else {
                                ConstValue::Int(value as i32)
                            };
                            CaseLabel::Value(value)
                        }
                    });
                }
                let code = this.in_block(|this| {
                    for &stmt in &case.statements {
                        this.lower_statement(stmt)?;
                    }
                    Ok(())
                })?;
                cases.push(SwitchCase { labels, body: code });
            }
            Ok::<_, SourceError>(cases)
        })?;

        self.emit(Instruction::Switch { selector, cases });
        Ok(())
    }
}
