//! Match state: the per-element cursor over a compiled model.

use std::rc::Rc;

use log::trace;

use crate::element_type::ElementTypeId;

use super::and_state::AndState;
use super::compiled::{CompiledModel, Leaf, LeafId};
use super::token::LeafKind;

/// Current position in a [`CompiledModel`] for one open element.
///
/// A failed transition leaves the state untouched.
#[derive(Debug, Clone)]
pub struct MatchState {
    model: Rc<CompiledModel>,
    pos: LeafId,
    and_state: AndState,
    min_and_depth: usize,
}

impl MatchState {
    pub fn new(model: Rc<CompiledModel>) -> Self {
        let and_state = AndState::new(model.and_state_size());
        Self {
            pos: model.initial(),
            model,
            and_state,
            min_and_depth: 0,
        }
    }

    pub fn model(&self) -> &Rc<CompiledModel> {
        &self.model
    }

    pub fn current_position(&self) -> LeafId {
        self.pos
    }

    pub fn current_leaf(&self) -> &Leaf {
        self.model.leaf(self.pos)
    }

    pub fn min_and_depth(&self) -> usize {
        self.min_and_depth
    }

    /// Accept a start tag for `e` if the model allows it here.
    pub fn try_transition(&mut self, e: ElementTypeId) -> bool {
        let moved = self.model.try_transition(
            self.pos,
            LeafKind::Element(e),
            &mut self.and_state,
            self.min_and_depth,
        );
        trace!("transition {e} from leaf {}: {}", self.pos.index(), moved.is_some());
        self.advance(moved)
    }

    /// Accept character data if the model allows it here.
    pub fn try_transition_pcdata(&mut self) -> bool {
        let moved =
            self.model
                .try_transition_pcdata(self.pos, &mut self.and_state, self.min_and_depth);
        self.advance(moved)
    }

    /// Everything acceptable next; `None` stands for `#PCDATA`.
    pub fn possible_transitions(&self) -> Vec<Option<ElementTypeId>> {
        self.model
            .possible_transitions(self.pos, &self.and_state, self.min_and_depth)
    }

    /// The element may end here.
    pub fn is_finished(&self) -> bool {
        self.current_leaf().is_final() && self.min_and_depth == 0
    }

    /// The leaf that must come next, if the model forces one.
    pub fn implied_start_tag(&self) -> Option<LeafId> {
        self.model
            .implied_start_tag(self.pos, &self.and_state, self.min_and_depth)
    }

    /// Move to the leaf returned by [`implied_start_tag`](Self::implied_start_tag).
    /// Returns false, without moving, if no leaf is required.
    pub fn do_required_transition(&mut self) -> bool {
        let moved = self
            .model
            .do_required_transition(self.pos, &mut self.and_state);
        self.advance(moved)
    }

    /// If `e` is a valid next token that cannot be skipped, return its leaf.
    ///
    /// Used when `e` is excluded: excluding a token the model requires
    /// deserves its own diagnostic.
    pub fn invalid_exclusion(&self, e: ElementTypeId) -> Option<LeafId> {
        let token = self.model.transition_token(
            self.pos,
            LeafKind::Element(e),
            &self.and_state,
            self.min_and_depth,
        )?;
        let leaf = self.model.leaf(token);
        (!leaf.inherently_optional() && !leaf.or_group_member()).then_some(token)
    }

    fn advance(&mut self, moved: Option<(LeafId, usize)>) -> bool {
        match moved {
            Some((pos, min_and_depth)) => {
                self.pos = pos;
                self.min_and_depth = min_and_depth;
                true
            }
            None => false,
        }
    }
}

impl PartialEq for MatchState {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.model, &other.model)
            && self.pos == other.pos
            && self.and_state == other.and_state
            && self.min_and_depth == other.min_and_depth
    }
}

impl Eq for MatchState {}
