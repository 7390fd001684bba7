use std::rc::Rc;

use super::*;
use crate::element_type::ElementTypeId;

const TITLE: ElementTypeId = ElementTypeId::new(0);
const PARA: ElementTypeId = ElementTypeId::new(1);
const LIST: ElementTypeId = ElementTypeId::new(2);

const A: ElementTypeId = ElementTypeId::new(0);
const B: ElementTypeId = ElementTypeId::new(1);
const C: ElementTypeId = ElementTypeId::new(2);
const X: ElementTypeId = ElementTypeId::new(3);
const Y: ElementTypeId = ElementTypeId::new(4);

fn el(e: ElementTypeId) -> ContentToken {
    ContentToken::element(e)
}

fn build(token: ContentToken) -> Rc<CompiledModel> {
    Rc::new(compile(&token.into_group(), 8).model)
}

fn ambiguities(token: ContentToken) -> Vec<ContentModelAmbiguity> {
    compile(&token.into_group(), 8).ambiguities
}

/// Feed every element in order; true if all were accepted and the model
/// can end afterwards.
fn accepts(model: &Rc<CompiledModel>, input: &[ElementTypeId]) -> bool {
    let mut state = MatchState::new(model.clone());
    input.iter().all(|&e| state.try_transition(e)) && state.is_finished()
}

#[test]
fn test_title_then_para_or_list() {
    let model = build(ContentToken::seq(vec![
        el(TITLE),
        ContentToken::or(vec![el(PARA), el(LIST)]).plus(),
    ]));

    let mut state = MatchState::new(model.clone());
    assert!(!state.is_finished());
    assert!(state.try_transition(TITLE));
    assert!(!state.is_finished());
    assert!(state.try_transition(PARA));
    assert!(state.try_transition(PARA));
    assert!(state.is_finished());

    assert!(accepts(&model, &[TITLE, LIST]));
    assert!(accepts(&model, &[TITLE, PARA, LIST, PARA]));
    assert!(!accepts(&model, &[TITLE]));
    assert!(!accepts(&model, &[PARA]));
}

#[test]
fn test_possible_transitions_after_title() {
    let model = build(ContentToken::seq(vec![
        el(TITLE),
        ContentToken::or(vec![el(PARA), el(LIST)]).plus(),
    ]));
    let mut state = MatchState::new(model);
    assert_eq!(state.possible_transitions(), vec![Some(TITLE)]);
    assert!(state.try_transition(TITLE));
    assert_eq!(state.possible_transitions(), vec![Some(PARA), Some(LIST)]);
}

#[test]
fn test_pcdata_only() {
    let model = build(ContentToken::pcdata());
    assert!(model.contains_pcdata());
    let mut state = MatchState::new(model);
    assert!(state.is_finished());
    for _ in 0..3 {
        assert!(!state.try_transition(A));
        assert!(state.try_transition_pcdata());
        assert!(state.is_finished());
    }
}

#[test]
fn test_mixed_content() {
    let model = build(ContentToken::or(vec![ContentToken::pcdata(), el(A)]).rep());
    let mut state = MatchState::new(model);
    assert!(state.try_transition_pcdata());
    assert!(state.try_transition(A));
    assert!(state.try_transition_pcdata());
    assert!(state.try_transition(A));
    assert!(state.is_finished());
    assert!(!state.try_transition(B));
}

#[test]
fn test_element_content_rejects_data() {
    let model = build(ContentToken::seq(vec![el(A), el(B)]));
    assert!(!model.contains_pcdata());
    let mut state = MatchState::new(model);
    assert!(!state.try_transition_pcdata());
}

#[test]
fn test_failed_transition_leaves_state_alone() {
    let model = build(ContentToken::seq(vec![el(A), el(B)]));
    let mut state = MatchState::new(model);
    let before = state.clone();
    assert!(!state.try_transition(B));
    assert_eq!(state, before);
}

#[test]
fn test_and_group_accepts_every_permutation() {
    let model = build(ContentToken::and(vec![el(A), el(B), el(C)]));
    let perms = [
        [A, B, C],
        [A, C, B],
        [B, A, C],
        [B, C, A],
        [C, A, B],
        [C, B, A],
    ];
    for perm in perms {
        assert!(accepts(&model, &perm), "{perm:?}");
    }
}

#[test]
fn test_and_group_requires_every_mandatory_member() {
    let model = build(ContentToken::and(vec![el(A), el(B), el(C)]));
    assert!(!accepts(&model, &[A, B]));
    assert!(!accepts(&model, &[C]));

    let mut state = MatchState::new(model);
    assert!(state.try_transition(A));
    assert!(state.try_transition(B));
    assert!(!state.try_transition(A));
    assert_eq!(state.possible_transitions(), vec![Some(C)]);
}

#[test]
fn test_and_group_with_optional_member() {
    let model = build(ContentToken::and(vec![el(A), el(B).opt()]));
    assert!(accepts(&model, &[A]));
    assert!(accepts(&model, &[A, B]));
    assert!(accepts(&model, &[B, A]));
    assert!(!accepts(&model, &[B]));
}

#[test]
fn test_and_group_inside_sequence() {
    let model = build(ContentToken::seq(vec![
        el(X),
        ContentToken::and(vec![el(A), el(B)]),
        el(Y),
    ]));
    assert!(accepts(&model, &[X, A, B, Y]));
    assert!(accepts(&model, &[X, B, A, Y]));

    let mut state = MatchState::new(model);
    assert!(state.try_transition(X));
    assert!(state.try_transition(A));
    assert!(!state.try_transition(Y));
    assert!(state.try_transition(B));
    assert!(!state.is_finished());
    assert!(state.try_transition(Y));
    assert!(state.is_finished());
}

#[test]
fn test_repeated_and_group() {
    let model = build(ContentToken::and(vec![el(A), el(B)]).plus());
    assert!(accepts(&model, &[A, B]));
    assert!(accepts(&model, &[A, B, A, B]));
    assert!(accepts(&model, &[A, B, B, A]));
    assert!(!accepts(&model, &[A, B, A]));
}

#[test]
fn test_optional_then_same_name_is_ambiguous() {
    let found = ambiguities(ContentToken::seq(vec![el(A).opt(), el(A)]));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].from, LeafId::INITIAL);
    assert_eq!(found[0].and_depth, 0);
}

#[test]
fn test_same_name_twice_in_or_is_ambiguous() {
    assert_eq!(ambiguities(ContentToken::or(vec![el(A), el(A)])).len(), 1);
}

#[test]
fn test_or_siblings_are_not_ambiguous() {
    assert!(ambiguities(ContentToken::or(vec![el(A), el(B)])).is_empty());
    assert!(
        ambiguities(ContentToken::seq(vec![
            ContentToken::or(vec![el(A), el(B)]),
            el(A)
        ]))
        .is_empty()
    );
}

#[test]
fn test_ambiguous_model_prefers_first_edge() {
    let model = build(ContentToken::seq(vec![el(A).opt(), el(A)]));
    let mut state = MatchState::new(model);
    assert!(state.try_transition(A));
    assert_eq!(state.current_position(), LeafId(1));
}

#[test]
fn test_implied_start_tag_and_required_transition() {
    let model = build(ContentToken::seq(vec![el(TITLE), el(PARA)]));
    let mut state = MatchState::new(model.clone());

    let required = state.implied_start_tag().unwrap();
    assert_eq!(model.leaf(required).element_type(), Some(TITLE));
    assert!(state.do_required_transition());
    assert_eq!(state.current_leaf().element_type(), Some(TITLE));
    assert!(state.do_required_transition());
    assert_eq!(state.current_leaf().element_type(), Some(PARA));
    assert!(state.is_finished());
    assert_eq!(state.implied_start_tag(), None);
    assert!(!state.do_required_transition());
}

#[test]
fn test_no_implied_start_tag_for_choice() {
    let model = build(ContentToken::or(vec![el(A), el(B)]));
    assert_eq!(MatchState::new(model).implied_start_tag(), None);
}

#[test]
fn test_invalid_exclusion() {
    let required = build(ContentToken::seq(vec![el(TITLE), el(PARA)]));
    let state = MatchState::new(required);
    assert!(state.invalid_exclusion(TITLE).is_some());
    assert!(state.invalid_exclusion(PARA).is_none());

    let optional = build(ContentToken::seq(vec![el(TITLE).opt(), el(PARA)]));
    assert!(MatchState::new(optional).invalid_exclusion(TITLE).is_none());

    let choice = build(ContentToken::or(vec![el(A), el(B)]));
    assert!(MatchState::new(choice).invalid_exclusion(A).is_none());
}

#[test]
fn test_replay_is_deterministic() {
    let model = build(ContentToken::seq(vec![
        el(X),
        ContentToken::and(vec![el(A), el(B).opt(), el(C).plus()]),
        el(Y).rep(),
    ]));
    let input = [X, C, C, A, B, Y, Y];

    let run = || {
        let mut state = MatchState::new(model.clone());
        for &e in &input {
            assert!(state.try_transition(e), "{e}");
        }
        state
    };
    let first = run();
    let second = run();
    assert!(first.is_finished());
    assert_eq!(first, second);
}

#[test]
fn test_states_over_different_models_differ() {
    let one = build(ContentToken::seq(vec![el(A)]));
    let two = build(ContentToken::seq(vec![el(A)]));
    assert_ne!(MatchState::new(one), MatchState::new(two));
}
