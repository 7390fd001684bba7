//! Property-based tests for the open element counters.
//!
//! Inclusion, exclusion and open counts are kept incrementally on push and
//! pop. They must always agree with a scan of the open element stack, and a
//! balanced run of pushes and pops must leave them where they started.

use proptest::prelude::*;
use sgml_content::{
    ContentState, Dtd, ElementDecl, ElementTypeId, Location, OpenElement, Options,
};

const N: usize = 5;

/// `e{i}` has `ANY` content, includes `e{i+1}` and excludes `e{i+2}`
/// (indices modulo 5).
fn dtd() -> (Dtd, Vec<ElementTypeId>) {
    let mut dtd = Dtd::new("e0");
    let ids: Vec<ElementTypeId> = (0..N)
        .map(|i| dtd.insert_element_type(format!("e{i}")))
        .collect();
    for i in 0..N {
        let decl = ElementDecl::new([format!("e{i}")])
            .inclusions(vec![ids[(i + 1) % N]])
            .exclusions(vec![ids[(i + 2) % N]]);
        dtd.declare_element_keyword(decl, "ANY", &Options::default())
            .unwrap();
    }
    (dtd, ids)
}

/// Counters recomputed from the stack.
fn scan(state: &ContentState, e: ElementTypeId) -> (bool, bool, bool) {
    let open = state.open_elements();
    let is_open = open.iter().any(|o| o.element_type() == e);
    let defs = || open.iter().filter_map(|o| o.definition());
    let excluded = defs().any(|d| d.exclusions().contains(&e));
    let included = !excluded && defs().any(|d| d.inclusions().contains(&e));
    (is_open, included, excluded)
}

fn counters(state: &ContentState, e: ElementTypeId) -> (bool, bool, bool) {
    (
        state.element_is_open(e),
        state.element_is_included(e),
        state.element_is_excluded(e),
    )
}

/// `Some(i)` pushes `e{i}`, `None` pops (ignored on an empty stack).
fn op_strategy() -> impl Strategy<Value = Option<usize>> {
    prop_oneof![
        2 => (0..N).prop_map(Some),
        1 => Just(None::<usize>),
    ]
}

#[cfg(test)]
mod proptest_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_counters_agree_with_stack(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let (dtd, ids) = dtd();
            let mut state = ContentState::new(&dtd);
            for op in ops {
                match op {
                    Some(i) => {
                        let e = OpenElement::new(
                            dtd.element_type(ids[i]),
                            i % 2 == 0,
                            false,
                            None,
                            Location::zero(),
                        );
                        state.push_element(e);
                    }
                    None if state.tag_level() > 0 => state.pop_element(),
                    None => {}
                }
                for &e in &ids {
                    prop_assert_eq!(counters(&state, e), scan(&state, e));
                }
                let nets = state.open_elements().iter().filter(|o| o.net_enabling()).count();
                prop_assert_eq!(state.net_enabling_count(), nets);
            }

            while state.tag_level() > 0 {
                state.pop_element();
            }
            for &e in &ids {
                prop_assert_eq!(counters(&state, e), (false, false, false));
            }
            prop_assert_eq!(state.total_exclude_count(), 0);
            prop_assert_eq!(state.net_enabling_count(), 0);
        }

        #[test]
        fn test_document_order_index_increases(pushes in prop::collection::vec(0..N, 1..20)) {
            let (dtd, ids) = dtd();
            let mut state = ContentState::new(&dtd);
            for i in pushes {
                let e = OpenElement::new(dtd.element_type(ids[i]), false, false, None, Location::zero());
                state.push_element(e);
            }
            let indices: Vec<usize> = state.open_elements().iter().map(|o| o.index()).collect();
            prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
