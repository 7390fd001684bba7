//! Content model compiler.
//!
//! Compilation runs in two passes over the token tree:
//!
//! 1. **analyze** walks the tree once, numbering leaves into an arena and
//!    computing each subtree's first set, last set and optionality. Adjacent
//!    subtrees are wired together as it goes: SEQ links each member's last
//!    set to the next member's first set, AND links every member to every
//!    other member, and `+`/`*` link a subtree's last set back to its own
//!    first set.
//! 2. **finish** visits every leaf, drops duplicate edges, and reports
//!    ambiguities: two different leaves for the same element type reachable
//!    from one leaf.

use itertools::Itertools;
use log::debug;

use super::compiled::{
    AndGroup, AndGroupId, AndInfo, CompiledModel, Leaf, LeafId, PcdataTransition, Transition,
};
use super::token::{Connector, ContentToken, LeafKind, LeafToken, ModelGroup, Occurrence};

/// Two distinct leaves reachable from `from` by the same input token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentModelAmbiguity {
    pub from: LeafId,
    pub to1: LeafId,
    pub to2: LeafId,
    pub and_depth: usize,
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    pub model: CompiledModel,
    pub ambiguities: Vec<ContentModelAmbiguity>,
    /// The model contains `#PCDATA`, but some position cannot accept it.
    pub pcdata_unreachable: bool,
}

/// Compile a model group. `n_element_types` is the number of element type
/// indices allocated so far; ids at or above it are still accepted.
pub fn compile(group: &ModelGroup, n_element_types: usize) -> CompileResult {
    let mut builder = Builder::new(n_element_types);
    let mut first = FirstSet::default();
    let mut last = LastSet::new();
    let optional = builder.analyze_group(group, AndContext::TOP, &mut first, &mut last);

    for &leaf in &last {
        builder.leaves[leaf.0].is_final = true;
    }
    builder.add_transitions(&[LeafId::INITIAL], &first, Edge::required(0, 0));
    if optional {
        builder.leaves[LeafId::INITIAL.0].is_final = true;
    }

    let mut finisher = Finisher::new(builder.leaves.len(), builder.next_type_index.len());
    for id in 0..builder.leaves.len() {
        finisher.finish_leaf(&mut builder, LeafId(id));
    }

    let model = CompiledModel {
        leaves: builder.leaves,
        and_groups: builder.and_groups,
        and_state_size: builder.and_state_size,
        contains_pcdata: builder.contains_pcdata,
    };
    let pcdata_unreachable = model.contains_pcdata && finisher.pcdata_unreachable;
    debug!(
        "compiled content model: {} leaves, {} and groups, and-state size {}, {} ambiguities",
        model.leaves.len(),
        model.and_groups.len(),
        model.and_state_size,
        finisher.ambiguities.len()
    );
    CompileResult {
        model,
        ambiguities: finisher.ambiguities,
        pcdata_unreachable,
    }
}

// ─── Analysis ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct FirstSet {
    tokens: Vec<LeafId>,
    /// Index into `tokens` of the leaf that must come first, if any.
    required_index: Option<usize>,
}

impl FirstSet {
    fn single(leaf: LeafId) -> Self {
        Self {
            tokens: vec![leaf],
            required_index: Some(0),
        }
    }

    fn append(&mut self, other: FirstSet) {
        let n = self.tokens.len();
        self.tokens.extend(other.tokens);
        if let Some(r) = other.required_index {
            self.required_index = Some(n + r);
        }
    }

    fn set_not_required(&mut self) {
        self.required_index = None;
    }
}

type LastSet = Vec<LeafId>;

/// The innermost AND group enclosing the token being analyzed, and which of
/// its members the token sits in.
#[derive(Debug, Clone, Copy)]
struct AndContext {
    group: Option<AndGroupId>,
    member_index: usize,
}

impl AndContext {
    const TOP: AndContext = AndContext {
        group: None,
        member_index: 0,
    };
}

/// Attributes stamped onto every edge added by one `add_transitions` call.
#[derive(Debug, Clone, Copy)]
struct Edge {
    maybe_required: bool,
    transition: Transition,
}

impl Edge {
    fn plain(maybe_required: bool, clear_from: usize, and_depth: usize) -> Self {
        Self {
            maybe_required,
            transition: Transition {
                clear_and_state_start: clear_from,
                and_depth,
                isolated: false,
                require_clear: None,
                to_set: None,
            },
        }
    }

    fn required(clear_from: usize, and_depth: usize) -> Self {
        Self::plain(true, clear_from, and_depth)
    }

    fn optional(clear_from: usize, and_depth: usize) -> Self {
        Self::plain(false, clear_from, and_depth)
    }
}

struct Builder {
    leaves: Vec<Leaf>,
    and_groups: Vec<AndGroup>,
    and_state_size: usize,
    contains_pcdata: bool,
    /// Next ordinal per element type slot; slot 0 is `#PCDATA`.
    next_type_index: Vec<usize>,
}

impl Builder {
    fn new(n_element_types: usize) -> Self {
        Self {
            leaves: vec![Leaf::new(LeafKind::Initial, 0, None)],
            and_groups: Vec::new(),
            and_state_size: 0,
            contains_pcdata: false,
            next_type_index: vec![0; n_element_types + 1],
        }
    }

    /// Depth given to edges added inside `group`.
    fn and_depth(&self, group: Option<AndGroupId>) -> usize {
        group.map_or(0, |g| self.and_groups[g.0].and_depth + 1)
    }

    /// First and-state bit free for groups nested inside `group`.
    fn and_index(&self, group: Option<AndGroupId>) -> usize {
        group.map_or(0, |g| {
            let g = &self.and_groups[g.0];
            g.and_index + g.n_members()
        })
    }

    /// Returns whether the token can match nothing.
    fn analyze(
        &mut self,
        token: &ContentToken,
        ctx: AndContext,
        or_member: bool,
        first: &mut FirstSet,
        last: &mut LastSet,
    ) -> bool {
        match token {
            ContentToken::Leaf(leaf) => {
                let id = self.analyze_leaf(leaf, ctx, or_member, first, last);
                let optional = self.apply_occurrence(leaf.occurrence, false, ctx, first, last);
                self.leaves[id.0].inherently_optional = optional;
                optional
            }
            ContentToken::Group(group) => self.analyze_group(group, ctx, first, last),
        }
    }

    fn apply_occurrence(
        &mut self,
        occurrence: Occurrence,
        mut optional: bool,
        ctx: AndContext,
        first: &mut FirstSet,
        last: &mut LastSet,
    ) -> bool {
        if occurrence.is_optional() {
            optional = true;
        }
        if optional {
            first.set_not_required();
        }
        if occurrence.repeats() {
            let edge = Edge::optional(self.and_index(ctx.group), self.and_depth(ctx.group));
            self.add_transitions(last, first, edge);
        }
        optional
    }

    fn analyze_leaf(
        &mut self,
        leaf: &LeafToken,
        ctx: AndContext,
        or_member: bool,
        first: &mut FirstSet,
        last: &mut LastSet,
    ) -> LeafId {
        let id = LeafId(self.leaves.len());
        let slot = type_slot(leaf.kind);
        if slot >= self.next_type_index.len() {
            self.next_type_index.resize(slot + 1, 0);
        }
        let type_index = self.next_type_index[slot];
        self.next_type_index[slot] += 1;
        if leaf.kind == LeafKind::Pcdata {
            self.contains_pcdata = true;
        }

        let and_info = ctx.group.map(|ancestor| AndInfo {
            ancestor,
            group_index: ctx.member_index,
            follow: Vec::new(),
        });
        let mut node = Leaf::new(leaf.kind, type_index, and_info);
        node.or_group_member = or_member;
        self.leaves.push(node);

        *first = FirstSet::single(id);
        *last = vec![id];
        id
    }

    fn analyze_group(
        &mut self,
        group: &ModelGroup,
        ctx: AndContext,
        first: &mut FirstSet,
        last: &mut LastSet,
    ) -> bool {
        let optional = match group.connector {
            Connector::Or => self.analyze_or(group, ctx, first, last),
            Connector::Seq => self.analyze_seq(group, ctx, first, last),
            Connector::And => self.analyze_and(group, ctx, first, last),
        };
        self.apply_occurrence(group.occurrence, optional, ctx, first, last)
    }

    fn analyze_or(
        &mut self,
        group: &ModelGroup,
        ctx: AndContext,
        first: &mut FirstSet,
        last: &mut LastSet,
    ) -> bool {
        let mut optional = false;
        for (i, member) in group.members.iter().enumerate() {
            if i == 0 {
                optional = self.analyze(member, ctx, true, first, last);
            } else {
                let mut member_first = FirstSet::default();
                let mut member_last = LastSet::new();
                let member_optional =
                    self.analyze(member, ctx, true, &mut member_first, &mut member_last);
                first.append(member_first);
                last.extend(member_last);
                optional |= member_optional;
            }
            first.set_not_required();
        }
        optional
    }

    fn analyze_seq(
        &mut self,
        group: &ModelGroup,
        ctx: AndContext,
        first: &mut FirstSet,
        last: &mut LastSet,
    ) -> bool {
        let Some((head, tail)) = group.members.split_first() else {
            return true;
        };
        let mut optional = self.analyze(head, ctx, false, first, last);
        let edge = Edge::required(self.and_index(ctx.group), self.and_depth(ctx.group));
        for member in tail {
            let mut member_first = FirstSet::default();
            let mut member_last = LastSet::new();
            let member_optional =
                self.analyze(member, ctx, false, &mut member_first, &mut member_last);
            self.add_transitions(last, &member_first, edge);
            if optional {
                first.append(member_first);
            }
            if member_optional {
                last.extend(member_last);
            } else {
                *last = member_last;
            }
            optional &= member_optional;
        }
        optional
    }

    fn analyze_and(
        &mut self,
        group: &ModelGroup,
        ctx: AndContext,
        first: &mut FirstSet,
        last: &mut LastSet,
    ) -> bool {
        let n = group.members.len();
        let id = AndGroupId(self.and_groups.len());
        let and_depth = self.and_depth(ctx.group);
        let and_index = self.and_index(ctx.group);
        self.and_groups.push(AndGroup {
            and_depth,
            and_index,
            and_group_index: ctx.member_index,
            ancestor: ctx.group,
            member_optional: vec![false; n],
        });
        self.and_state_size = self.and_state_size.max(and_index + n);

        let mut firsts = Vec::with_capacity(n);
        let mut lasts = Vec::with_capacity(n);
        let mut optional = true;
        for (i, member) in group.members.iter().enumerate() {
            let member_ctx = AndContext {
                group: Some(id),
                member_index: i,
            };
            let mut member_first = FirstSet::default();
            let mut member_last = LastSet::new();
            let member_optional =
                self.analyze(member, member_ctx, false, &mut member_first, &mut member_last);
            self.and_groups[id.0].member_optional[i] = member_optional;
            first.append(member_first.clone());
            first.set_not_required();
            last.extend(member_last.iter().copied());
            optional &= member_optional;
            firsts.push(member_first);
            lasts.push(member_last);
        }

        for (i, j) in (0..n).cartesian_product(0..n).filter(|(i, j)| i != j) {
            let edge = Edge {
                maybe_required: false,
                transition: Transition {
                    clear_and_state_start: and_index + n,
                    and_depth: and_depth + 1,
                    isolated: !self.and_groups[id.0].member_optional[j],
                    require_clear: Some(and_index + j),
                    to_set: Some(and_index + i),
                },
            };
            self.add_transitions(&lasts[i], &firsts[j], edge);
        }
        optional
    }

    fn add_transitions(&mut self, from: &[LeafId], to: &FirstSet, edge: Edge) {
        for &leaf in from {
            let leaf = &mut self.leaves[leaf.0];
            if edge.maybe_required
                && let Some(r) = to.required_index
            {
                leaf.required_index = Some(leaf.follow.len() + r);
            }
            leaf.follow.extend_from_slice(&to.tokens);
            if let Some(info) = &mut leaf.and_info {
                info.follow
                    .extend(std::iter::repeat_n(edge.transition, to.tokens.len()));
            }
        }
    }
}

/// Slot used to bucket leaves by what they match: `#PCDATA` (and the
/// initial pseudo-leaf) share slot 0, element type `i` uses slot `i + 1`.
fn type_slot(kind: LeafKind) -> usize {
    match kind {
        LeafKind::Element(e) => e.index() + 1,
        LeafKind::Pcdata | LeafKind::Initial => 0,
    }
}

// ─── Finish ─────────────────────────────────────────────────────────────────

struct Finisher {
    /// Per target leaf: lowest AND depth of an edge already kept.
    min_and_depth: Vec<usize>,
    /// Per type slot: index of the kept edge that currently wins.
    element_transition: Vec<Option<usize>>,
    ambiguities: Vec<ContentModelAmbiguity>,
    pcdata_unreachable: bool,
}

impl Finisher {
    fn new(n_leaves: usize, n_slots: usize) -> Self {
        Self {
            min_and_depth: vec![usize::MAX; n_leaves],
            element_transition: vec![None; n_slots],
            ambiguities: Vec::new(),
            pcdata_unreachable: false,
        }
    }

    fn reset(&mut self) {
        self.min_and_depth.fill(usize::MAX);
        self.element_transition.fill(None);
    }

    fn slot(&mut self, kind: LeafKind) -> usize {
        let slot = type_slot(kind);
        if slot >= self.element_transition.len() {
            self.element_transition.resize(slot + 1, None);
        }
        slot
    }

    fn finish_leaf(&mut self, builder: &mut Builder, id: LeafId) {
        self.reset();
        if builder.leaves[id.0].and_info.is_some() {
            self.finish_and_leaf(builder, id);
        } else {
            self.finish_plain_leaf(builder, id);
        }
    }

    /// Deduplicate targets, order them by leaf, and flag element types
    /// reachable through more than one leaf.
    fn finish_plain_leaf(&mut self, builder: &mut Builder, id: LeafId) {
        let leaf = &mut builder.leaves[id.0];
        let required = leaf.required_index.map(|r| leaf.follow[r]);
        let mut targets: Vec<LeafId> = std::mem::take(&mut leaf.follow)
            .into_iter()
            .unique()
            .collect();
        targets.sort();

        let mut pcdata = PcdataTransition::None;
        for (j, &target) in targets.iter().enumerate() {
            let target_leaf = &builder.leaves[target.0];
            if target_leaf.kind == LeafKind::Pcdata {
                pcdata = if target_leaf.and_info.is_none() {
                    PcdataTransition::Simple(target)
                } else {
                    PcdataTransition::Complex
                };
            }
            let slot = self.slot(target_leaf.kind);
            if let Some(prev) = self.element_transition[slot] {
                self.ambiguities.push(ContentModelAmbiguity {
                    from: id,
                    to1: targets[prev],
                    to2: target,
                    and_depth: 0,
                });
            }
            self.element_transition[slot] = Some(j);
        }
        if pcdata == PcdataTransition::None {
            self.pcdata_unreachable = true;
        }

        let leaf = &mut builder.leaves[id.0];
        leaf.required_index = required.and_then(|r| targets.iter().position(|&t| t == r));
        leaf.follow = targets;
        leaf.pcdata_transition = pcdata;
    }

    /// Edges of a leaf inside an AND group are already ordered by decreasing
    /// AND depth; an edge is kept only if it reaches its target at a lower
    /// depth than any edge before it.
    fn finish_and_leaf(&mut self, builder: &mut Builder, id: LeafId) {
        let leaf = &mut builder.leaves[id.0];
        let follow = std::mem::take(&mut leaf.follow);
        let required_index = leaf.required_index;
        let Some(info) = leaf.and_info.as_mut() else {
            return;
        };
        let transitions = std::mem::take(&mut info.follow);
        let (ancestor, group_index) = (info.ancestor, info.group_index);

        let mut kept: Vec<LeafId> = Vec::with_capacity(follow.len());
        let mut kept_transitions: Vec<Transition> = Vec::with_capacity(follow.len());
        let mut new_required = None;
        let mut pcdata = PcdataTransition::None;
        let mut pcdata_min_covered = 0;

        for (i, (&target, &t)) in follow.iter().zip(&transitions).enumerate() {
            if t.and_depth >= self.min_and_depth[target.0] {
                continue;
            }
            self.min_and_depth[target.0] = t.and_depth;
            let j = kept.len();
            kept.push(target);
            kept_transitions.push(t);
            if required_index == Some(i) {
                new_required = Some(j);
            }

            let kind = builder.leaves[target.0].kind;
            if kind == LeafKind::Pcdata {
                if pcdata == PcdataTransition::None {
                    if self.pcdata_blocked_by_ancestor(builder, ancestor, group_index, t) {
                        self.pcdata_unreachable = true;
                    }
                    if t.isolated {
                        pcdata_min_covered = t.and_depth;
                    }
                    pcdata = PcdataTransition::Complex;
                } else {
                    if pcdata_min_covered > t.and_depth + 1 {
                        self.pcdata_unreachable = true;
                    }
                    pcdata_min_covered = if t.isolated { t.and_depth } else { 0 };
                }
            }

            let slot = self.slot(kind);
            match self.element_transition[slot] {
                Some(prev_j) => {
                    let prev = kept[prev_j];
                    let prev_t = kept_transitions[prev_j];
                    if prev != target && (prev_t.and_depth == t.and_depth || !prev_t.isolated) {
                        self.ambiguities.push(ContentModelAmbiguity {
                            from: id,
                            to1: prev,
                            to2: target,
                            and_depth: t.and_depth,
                        });
                    }
                    if prev_t.isolated {
                        self.element_transition[slot] = Some(j);
                    }
                }
                None => self.element_transition[slot] = Some(j),
            }
        }

        if pcdata_min_covered > 0 || pcdata == PcdataTransition::None {
            self.pcdata_unreachable = true;
        }

        let leaf = &mut builder.leaves[id.0];
        leaf.follow = kept;
        leaf.required_index = new_required;
        leaf.pcdata_transition = pcdata;
        if let Some(info) = leaf.and_info.as_mut() {
            info.follow = kept_transitions;
        }
    }

    /// True if the nearest enclosing AND group with another mandatory member
    /// is left by this `#PCDATA` edge before that member can be matched.
    fn pcdata_blocked_by_ancestor(
        &self,
        builder: &Builder,
        ancestor: AndGroupId,
        mut group_index: usize,
        t: Transition,
    ) -> bool {
        let mut current = Some(ancestor);
        while let Some(gid) = current {
            let group = &builder.and_groups[gid.0];
            let has_mandatory_sibling = group
                .member_optional
                .iter()
                .enumerate()
                .any(|(k, &optional)| k != group_index && !optional);
            if has_mandatory_sibling {
                return t.and_depth <= group.and_depth;
            }
            group_index = group.and_group_index;
            current = group.ancestor;
        }
        false
    }
}
