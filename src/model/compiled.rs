//! The compiled form of a content model: an arena of leaf tokens, each with
//! its outgoing edges, plus the AND groups those leaves belong to.
//!
//! A [`CompiledModel`] is immutable once [`compile`](super::compile) returns
//! and is shared by every [`MatchState`](super::MatchState) opened over it.

use crate::element_type::ElementTypeId;

use super::and_state::AndState;
use super::token::LeafKind;

/// Index of a leaf token in its model's arena. The initial pseudo-leaf is
/// always [`LeafId::INITIAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafId(pub(crate) usize);

impl LeafId {
    pub const INITIAL: LeafId = LeafId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of an AND group in its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AndGroupId(pub(crate) usize);

/// Guard and side effects of one edge leaving a leaf inside an AND group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Every and-state bit at or above this index is cleared when the edge fires.
    pub clear_and_state_start: usize,
    pub and_depth: usize,
    /// The target member becomes mandatory once entered.
    pub isolated: bool,
    /// The edge may only fire while this bit is clear.
    pub require_clear: Option<usize>,
    /// Bit set when the edge fires.
    pub to_set: Option<usize>,
}

impl Transition {
    fn is_open(&self, and_state: &AndState, min_and_depth: usize) -> bool {
        self.require_clear.is_none_or(|bit| and_state.is_clear(bit))
            && self.and_depth >= min_and_depth
    }

    fn apply(&self, and_state: &mut AndState) {
        if let Some(bit) = self.to_set {
            and_state.set(bit);
        }
        and_state.clear_from(self.clear_and_state_start);
    }
}

/// Membership of a leaf in its innermost AND group.
#[derive(Debug, Clone)]
pub struct AndInfo {
    pub ancestor: AndGroupId,
    /// Which member of `ancestor` contains the leaf.
    pub group_index: usize,
    /// Parallel to [`Leaf::follow`].
    pub follow: Vec<Transition>,
}

/// How a leaf accepts character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PcdataTransition {
    #[default]
    None,
    /// An unguarded edge to this `#PCDATA` leaf.
    Simple(LeafId),
    /// Found by a guarded search of the follow list.
    Complex,
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub(crate) kind: LeafKind,
    pub(crate) inherently_optional: bool,
    pub(crate) or_group_member: bool,
    /// Ordinal of this leaf among the leaves naming the same element type.
    pub(crate) type_index: usize,
    pub(crate) is_final: bool,
    pub(crate) required_index: Option<usize>,
    pub(crate) follow: Vec<LeafId>,
    pub(crate) and_info: Option<AndInfo>,
    pub(crate) pcdata_transition: PcdataTransition,
}

impl Leaf {
    pub(crate) fn new(kind: LeafKind, type_index: usize, and_info: Option<AndInfo>) -> Self {
        Self {
            kind,
            inherently_optional: false,
            or_group_member: false,
            type_index,
            is_final: false,
            required_index: None,
            follow: Vec::new(),
            and_info,
            pcdata_transition: PcdataTransition::None,
        }
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    pub fn element_type(&self) -> Option<ElementTypeId> {
        self.kind.element_type()
    }

    pub fn is_initial(&self) -> bool {
        self.kind == LeafKind::Initial
    }

    pub fn is_pcdata(&self) -> bool {
        self.kind == LeafKind::Pcdata
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn inherently_optional(&self) -> bool {
        self.inherently_optional
    }

    pub fn or_group_member(&self) -> bool {
        self.or_group_member
    }

    pub fn type_index(&self) -> usize {
        self.type_index
    }

    pub fn follow(&self) -> &[LeafId] {
        &self.follow
    }

    pub fn and_info(&self) -> Option<&AndInfo> {
        self.and_info.as_ref()
    }

    pub fn pcdata_transition(&self) -> PcdataTransition {
        self.pcdata_transition
    }

    /// Edges whose guard passes, paired with their targets.
    fn open_edges<'a>(
        &'a self,
        and_state: &'a AndState,
        min_and_depth: usize,
    ) -> impl Iterator<Item = (usize, LeafId)> + 'a {
        self.follow
            .iter()
            .copied()
            .enumerate()
            .filter(move |&(i, _)| match &self.and_info {
                None => true,
                Some(info) => info.follow[i].is_open(and_state, min_and_depth),
            })
    }
}

/// AND group bookkeeping kept after compilation.
#[derive(Debug, Clone)]
pub struct AndGroup {
    pub and_depth: usize,
    /// First and-state bit owned by this group's members.
    pub and_index: usize,
    /// Member index of this group within `ancestor`.
    pub and_group_index: usize,
    pub ancestor: Option<AndGroupId>,
    pub member_optional: Vec<bool>,
}

impl AndGroup {
    pub fn n_members(&self) -> usize {
        self.member_optional.len()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub(crate) leaves: Vec<Leaf>,
    pub(crate) and_groups: Vec<AndGroup>,
    pub(crate) and_state_size: usize,
    pub(crate) contains_pcdata: bool,
}

impl CompiledModel {
    pub fn initial(&self) -> LeafId {
        LeafId::INITIAL
    }

    pub fn leaf(&self, id: LeafId) -> &Leaf {
        &self.leaves[id.0]
    }

    pub fn leaves(&self) -> impl Iterator<Item = (LeafId, &Leaf)> {
        self.leaves.iter().enumerate().map(|(i, l)| (LeafId(i), l))
    }

    pub fn and_group(&self, id: AndGroupId) -> &AndGroup {
        &self.and_groups[id.0]
    }

    pub fn and_state_size(&self) -> usize {
        self.and_state_size
    }

    /// False when the model has no `#PCDATA` token at all, so character data
    /// can be rejected without looking at the current position.
    pub fn contains_pcdata(&self) -> bool {
        self.contains_pcdata
    }

    /// AND nesting depth of a leaf: one more than its innermost AND group's.
    pub fn leaf_and_depth(&self, id: LeafId) -> usize {
        self.leaf(id)
            .and_info
            .as_ref()
            .map_or(0, |info| self.and_group(info.ancestor).and_depth + 1)
    }

    /// Lowest AND depth an edge from `id` must have, given which members
    /// have already been matched.
    pub(crate) fn compute_min_and_depth(&self, id: LeafId, and_state: &AndState) -> usize {
        let Some(info) = &self.leaf(id).and_info else {
            return 0;
        };
        let mut group_index = info.group_index;
        let mut ancestor = Some(info.ancestor);
        while let Some(gid) = ancestor {
            let group = self.and_group(gid);
            let pending = group
                .member_optional
                .iter()
                .enumerate()
                .any(|(k, &optional)| {
                    k != group_index && !optional && and_state.is_clear(group.and_index + k)
                });
            if pending {
                return group.and_depth + 1;
            }
            group_index = group.and_group_index;
            ancestor = group.ancestor;
        }
        0
    }

    /// First open edge from `from` to a leaf of the given kind.
    pub(crate) fn transition_token(
        &self,
        from: LeafId,
        to: LeafKind,
        and_state: &AndState,
        min_and_depth: usize,
    ) -> Option<LeafId> {
        self.find_edge(from, to, and_state, min_and_depth)
            .map(|(_, target)| target)
    }

    /// Take the first open edge from `from` to a leaf of the given kind.
    /// Returns the new position and its minimum AND depth.
    pub(crate) fn try_transition(
        &self,
        from: LeafId,
        to: LeafKind,
        and_state: &mut AndState,
        min_and_depth: usize,
    ) -> Option<(LeafId, usize)> {
        let (i, target) = self.find_edge(from, to, and_state, min_and_depth)?;
        Some(self.take_edge(from, i, target, and_state))
    }

    pub(crate) fn try_transition_pcdata(
        &self,
        from: LeafId,
        and_state: &mut AndState,
        min_and_depth: usize,
    ) -> Option<(LeafId, usize)> {
        match self.leaf(from).pcdata_transition {
            PcdataTransition::None => None,
            PcdataTransition::Simple(target) => Some((target, min_and_depth)),
            PcdataTransition::Complex => {
                self.try_transition(from, LeafKind::Pcdata, and_state, min_and_depth)
            }
        }
    }

    /// Element types (or `None` for `#PCDATA`) reachable in one step.
    pub(crate) fn possible_transitions(
        &self,
        from: LeafId,
        and_state: &AndState,
        min_and_depth: usize,
    ) -> Vec<Option<ElementTypeId>> {
        self.leaf(from)
            .open_edges(and_state, min_and_depth)
            .map(|(_, target)| self.leaf(target).element_type())
            .collect()
    }

    /// The structurally required next leaf, if its edge is open.
    pub(crate) fn implied_start_tag(
        &self,
        from: LeafId,
        and_state: &AndState,
        min_and_depth: usize,
    ) -> Option<LeafId> {
        let leaf = self.leaf(from);
        let i = leaf.required_index?;
        match &leaf.and_info {
            Some(info) if !info.follow[i].is_open(and_state, min_and_depth) => None,
            _ => Some(leaf.follow[i]),
        }
    }

    pub(crate) fn do_required_transition(
        &self,
        from: LeafId,
        and_state: &mut AndState,
    ) -> Option<(LeafId, usize)> {
        let i = self.leaf(from).required_index?;
        let target = self.leaf(from).follow[i];
        Some(self.take_edge(from, i, target, and_state))
    }

    fn find_edge(
        &self,
        from: LeafId,
        to: LeafKind,
        and_state: &AndState,
        min_and_depth: usize,
    ) -> Option<(usize, LeafId)> {
        self.leaf(from)
            .open_edges(and_state, min_and_depth)
            .find(|&(_, target)| self.leaf(target).kind == to)
    }

    fn take_edge(
        &self,
        from: LeafId,
        i: usize,
        target: LeafId,
        and_state: &mut AndState,
    ) -> (LeafId, usize) {
        if let Some(info) = &self.leaf(from).and_info {
            info.follow[i].apply(and_state);
        }
        (target, self.compute_min_and_depth(target, and_state))
    }
}
