//! The contract between the traversal engines and the value-flow clients.
//!
//! The engines never see concrete value kinds; they compose [`Action`]s and
//! call back through the [`Analyzer`] trait. [`ValuePtr`] is the owning
//! handle the factories hand out; cloning it deep-clones the analyzer, which
//! is exactly what a branch fork needs.

use std::ops::{BitOr, BitOrAssign};

use ccheck_config::Settings;

use crate::mathlib::Bigint;
use crate::symbols::SymbolDatabase;
use crate::token::TokenId;
use crate::tokenlist::TokenList;

/// What an analyzer observed at one token. Combines by bitwise OR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Action(u16);

impl Action {
    pub const NONE: Action = Action(0);
    pub const READ: Action = Action(1 << 0);
    pub const WRITE: Action = Action(1 << 1);
    pub const INVALID: Action = Action(1 << 2);
    pub const INCONCLUSIVE: Action = Action(1 << 3);
    pub const MATCH: Action = Action(1 << 4);
    pub const IDEMPOTENT: Action = Action(1 << 5);
    pub const INCREMENTAL: Action = Action(1 << 6);
    pub const SYMBOLIC_MATCH: Action = Action(1 << 7);
    pub const INTERNAL: Action = Action(1 << 8);

    pub fn get(self, f: Action) -> bool {
        self.0 & f.0 != 0
    }

    pub fn set(&mut self, f: Action, state: bool) {
        if state {
            self.0 |= f.0;
        } else {
            self.0 &= !f.0;
        }
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn is_read(self) -> bool {
        self.get(Action::READ)
    }

    pub fn is_write(self) -> bool {
        self.get(Action::WRITE)
    }

    pub fn is_invalid(self) -> bool {
        self.get(Action::INVALID)
    }

    pub fn is_inconclusive(self) -> bool {
        self.get(Action::INCONCLUSIVE)
    }

    pub fn is_modified(self) -> bool {
        self.is_write() || self.is_invalid()
    }

    pub fn is_idempotent(self) -> bool {
        self.get(Action::IDEMPOTENT)
    }

    pub fn is_incremental(self) -> bool {
        self.get(Action::INCREMENTAL)
    }

    pub fn is_symbolic_match(self) -> bool {
        self.get(Action::SYMBOLIC_MATCH)
    }

    pub fn is_internal(self) -> bool {
        self.get(Action::INTERNAL)
    }

    pub fn matches(self) -> bool {
        self.get(Action::MATCH)
    }
}

impl BitOr for Action {
    type Output = Action;

    fn bitor(self, rhs: Action) -> Action {
        Action(self.0 | rhs.0)
    }
}

impl BitOrAssign for Action {
    fn bitor_assign(&mut self, rhs: Action) {
        self.0 |= rhs.0;
    }
}

/// Why a traversal stopped. Merged by first-non-`None` wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Terminate {
    #[default]
    None,
    Bail,
    Escape,
    Modified,
    Inconclusive,
    Conditional,
}

/// The merged outcome of a traversal.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalyzerResult {
    pub action: Action,
    pub terminate: Terminate,
}

impl AnalyzerResult {
    pub fn new(action: Action, terminate: Terminate) -> Self {
        AnalyzerResult { action, terminate }
    }

    pub fn update(&mut self, rhs: AnalyzerResult) {
        if self.terminate == Terminate::None {
            self.terminate = rhs.terminate;
        }
        self.action |= rhs.action;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Flags for [`Analyzer::assume`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Assume(u8);

impl Assume {
    pub const NONE: Assume = Assume(0);
    pub const QUIET: Assume = Assume(1 << 0);
    pub const ABSOLUTE: Assume = Assume(1 << 1);
    pub const CONTAINER_EMPTY: Assume = Assume(1 << 2);

    pub fn get(self, f: Assume) -> bool {
        self.0 & f.0 != 0
    }
}

impl BitOr for Assume {
    type Output = Assume;

    fn bitor(self, rhs: Assume) -> Assume {
        Assume(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evaluate {
    Integral,
    ContainerEmpty,
}

/// Everything an analyzer may look at. The token list is the only mutable
/// part; updates attach values to tokens.
pub struct Ctx<'a> {
    pub tokens: &'a mut TokenList,
    pub symbols: &'a SymbolDatabase,
    pub settings: &'a Settings,
}

pub trait Analyzer {
    /// Analyze a token. Pure inspection.
    fn analyze(&self, ctx: &Ctx<'_>, tok: TokenId, dir: Direction) -> Action;
    /// Update the state of the value at this token.
    fn update(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, action: Action, dir: Direction);
    /// Try to fold `tok` to a set of possible integer outcomes.
    fn evaluate(
        &self,
        ctx: &Ctx<'_>,
        eval: Evaluate,
        tok: Option<TokenId>,
        context_tok: Option<TokenId>,
    ) -> Vec<Bigint>;
    /// Lower any known values to possible.
    fn lower_to_possible(&mut self) -> bool;
    /// Lower any values to inconclusive.
    fn lower_to_inconclusive(&mut self) -> bool;
    /// Whether a branch whose body may modify the expression should still be
    /// explored.
    fn update_scope(&self, ctx: &Ctx<'_>, end_block: TokenId, modified: bool) -> bool;
    /// Whether the tracked value is conditional.
    fn is_conditional(&self) -> bool;
    /// Whether analysis should stop on this condition.
    fn stop_on_condition(&self, ctx: &Ctx<'_>, cond_tok: TokenId) -> bool;
    /// Record that `tok` is known true/false from here on.
    fn assume(&mut self, ctx: &mut Ctx<'_>, tok: Option<TokenId>, state: bool, flags: Assume);
    /// Derived analyzer for the expression at `tok` (assignments seen
    /// mid-traversal).
    fn reanalyze(&self, ctx: &Ctx<'_>, tok: TokenId, msg: &str) -> Option<ValuePtr>;
    /// The analyzer cannot continue.
    fn invalid(&self) -> bool {
        false
    }
    fn clone_box(&self) -> Box<dyn Analyzer>;
}

/// Owning capability handle around a polymorphic analyzer. Cloning clones
/// the analyzer state; forked branches never share mutable state.
pub struct ValuePtr {
    inner: Box<dyn Analyzer>,
}

impl ValuePtr {
    pub fn new<A: Analyzer + 'static>(analyzer: A) -> Self {
        ValuePtr {
            inner: Box::new(analyzer),
        }
    }

    pub fn from_box(inner: Box<dyn Analyzer>) -> Self {
        ValuePtr { inner }
    }
}

impl Clone for ValuePtr {
    fn clone(&self) -> Self {
        ValuePtr {
            inner: self.inner.clone_box(),
        }
    }
}

impl Analyzer for ValuePtr {
    fn analyze(&self, ctx: &Ctx<'_>, tok: TokenId, dir: Direction) -> Action {
        self.inner.analyze(ctx, tok, dir)
    }

    fn update(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, action: Action, dir: Direction) {
        self.inner.update(ctx, tok, action, dir);
    }

    fn evaluate(
        &self,
        ctx: &Ctx<'_>,
        eval: Evaluate,
        tok: Option<TokenId>,
        context_tok: Option<TokenId>,
    ) -> Vec<Bigint> {
        self.inner.evaluate(ctx, eval, tok, context_tok)
    }

    fn lower_to_possible(&mut self) -> bool {
        self.inner.lower_to_possible()
    }

    fn lower_to_inconclusive(&mut self) -> bool {
        self.inner.lower_to_inconclusive()
    }

    fn update_scope(&self, ctx: &Ctx<'_>, end_block: TokenId, modified: bool) -> bool {
        self.inner.update_scope(ctx, end_block, modified)
    }

    fn is_conditional(&self) -> bool {
        self.inner.is_conditional()
    }

    fn stop_on_condition(&self, ctx: &Ctx<'_>, cond_tok: TokenId) -> bool {
        self.inner.stop_on_condition(ctx, cond_tok)
    }

    fn assume(&mut self, ctx: &mut Ctx<'_>, tok: Option<TokenId>, state: bool, flags: Assume) {
        self.inner.assume(ctx, tok, state, flags);
    }

    fn reanalyze(&self, ctx: &Ctx<'_>, tok: TokenId, msg: &str) -> Option<ValuePtr> {
        self.inner.reanalyze(ctx, tok, msg)
    }

    fn invalid(&self) -> bool {
        self.inner.invalid()
    }

    fn clone_box(&self) -> Box<dyn Analyzer> {
        self.inner.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_combine_by_or() {
        let mut a = Action::READ;
        a |= Action::WRITE;
        assert!(a.is_read());
        assert!(a.is_write());
        assert!(a.is_modified());
        assert!(!a.is_inconclusive());
        assert!((Action::INVALID).is_modified());
        assert!(Action::NONE.is_none());
    }

    #[test]
    fn result_merge_first_terminate_wins() {
        let mut r = AnalyzerResult::new(Action::READ, Terminate::Bail);
        r.update(AnalyzerResult::new(Action::WRITE, Terminate::Escape));
        assert_eq!(r.terminate, Terminate::Bail);
        assert!(r.action.is_write());

        let mut r = AnalyzerResult::new(Action::NONE, Terminate::None);
        r.update(AnalyzerResult::new(Action::NONE, Terminate::Escape));
        assert_eq!(r.terminate, Terminate::Escape);
    }

    #[test]
    fn assume_flags() {
        let flags = Assume::QUIET | Assume::ABSOLUTE;
        assert!(flags.get(Assume::QUIET));
        assert!(!flags.get(Assume::CONTAINER_EMPTY));
    }
}
