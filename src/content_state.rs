//! The stack of open elements and the per-element-type counters that make
//! exception and nesting checks constant time.

use std::rc::Rc;

use log::trace;

use crate::dtd::Dtd;
use crate::element_type::{DeclaredContent, ElementDefinition, ElementType, ElementTypeId, OmitFlags};
use crate::location::Location;
use crate::model::{ContentToken, LeafKind, compile};
use crate::open_element::OpenElement;

/// Id of the pseudo element that contains the document element. It is never
/// a DTD index.
pub const DOCUMENT_ELEMENT_CONTAINER: ElementTypeId = ElementTypeId::new(usize::MAX);

/// What an open element is and where its content currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenElementInfo {
    pub gi: String,
    /// Name of the last token matched (`#PCDATA` for data); `None` before
    /// any token matched.
    pub match_type: Option<String>,
    /// Ordinal of that token among the tokens of the same name.
    pub match_index: usize,
    pub included: bool,
}

#[derive(Debug, Clone)]
pub struct ContentState {
    /// Open elements, outermost first. The document element container is
    /// kept apart and is never counted.
    open_elements: Vec<OpenElement>,
    container: OpenElement,
    open_element_count: Vec<usize>,
    include_count: Vec<usize>,
    exclude_count: Vec<usize>,
    total_exclude_count: usize,
    net_enabling_count: usize,
    next_index: usize,
    last_ended_element_type: Option<ElementTypeId>,
}

impl ContentState {
    pub fn new(dtd: &Dtd) -> Self {
        let mut state = Self {
            open_elements: Vec::new(),
            container: document_element_container(dtd),
            open_element_count: Vec::new(),
            include_count: Vec::new(),
            exclude_count: Vec::new(),
            total_exclude_count: 0,
            net_enabling_count: 0,
            next_index: 0,
            last_ended_element_type: None,
        };
        state.start_content(dtd);
        state
    }

    /// Reset to the start of the instance: nothing open, the document
    /// element expected next.
    pub fn start_content(&mut self, dtd: &Dtd) {
        let n = dtd.n_element_type_index();
        self.open_elements.clear();
        self.container = document_element_container(dtd);
        self.open_element_count = vec![0; n];
        self.include_count = vec![0; n];
        self.exclude_count = vec![0; n];
        self.total_exclude_count = 0;
        self.net_enabling_count = 0;
        self.next_index = 0;
        self.last_ended_element_type = None;
    }

    pub fn push_element(&mut self, mut e: OpenElement) {
        let t = e.element_type().index();
        self.open_element_count[t] += 1;
        if let Some(def) = e.definition() {
            for incl in def.inclusions() {
                self.include_count[incl.index()] += 1;
            }
            for excl in def.exclusions() {
                self.exclude_count[excl.index()] += 1;
                self.total_exclude_count += 1;
            }
        }
        if e.net_enabling() {
            self.net_enabling_count += 1;
        }
        e.set_index(self.next_index);
        self.next_index += 1;
        trace!("push element {} at level {}", e.element_type(), self.tag_level() + 1);
        self.open_elements.push(e);
    }

    /// Pop the current element and return it.
    ///
    /// # Panics
    ///
    /// If no element is open.
    pub fn pop_save_element(&mut self) -> OpenElement {
        assert!(self.tag_level() > 0, "pop with no open element");
        let Some(e) = self.open_elements.pop() else {
            unreachable!();
        };
        let t = e.element_type().index();
        self.open_element_count[t] -= 1;
        if let Some(def) = e.definition() {
            for incl in def.inclusions() {
                self.include_count[incl.index()] -= 1;
            }
            for excl in def.exclusions() {
                self.exclude_count[excl.index()] -= 1;
                self.total_exclude_count -= 1;
            }
        }
        if e.net_enabling() {
            self.net_enabling_count -= 1;
        }
        self.last_ended_element_type = Some(e.element_type());
        trace!("pop element {} to level {}", e.element_type(), self.tag_level());
        e
    }

    pub fn pop_element(&mut self) {
        self.pop_save_element();
    }

    /// The innermost open element, or the document element container when
    /// nothing is open.
    pub fn current_element(&self) -> &OpenElement {
        self.open_elements.last().unwrap_or(&self.container)
    }

    pub fn current_element_mut(&mut self) -> &mut OpenElement {
        self.open_elements.last_mut().unwrap_or(&mut self.container)
    }

    /// Open elements, outermost first.
    pub fn open_elements(&self) -> &[OpenElement] {
        &self.open_elements
    }

    pub fn tag_level(&self) -> usize {
        self.open_elements.len()
    }

    pub fn element_is_included(&self, e: ElementTypeId) -> bool {
        self.include_count[e.index()] != 0 && self.exclude_count[e.index()] == 0
    }

    pub fn element_is_excluded(&self, e: ElementTypeId) -> bool {
        self.exclude_count[e.index()] != 0
    }

    pub fn element_is_open(&self, e: ElementTypeId) -> bool {
        self.open_element_count[e.index()] != 0
    }

    pub fn total_exclude_count(&self) -> usize {
        self.total_exclude_count
    }

    pub fn net_enabling_count(&self) -> usize {
        self.net_enabling_count
    }

    /// The document element has ended.
    pub fn after_document_element(&self) -> bool {
        self.tag_level() == 0 && self.current_element().is_finished()
    }

    pub fn last_ended_element_type(&self) -> Option<ElementTypeId> {
        self.last_ended_element_type
    }

    /// The element type called `name`, creating it with an undefined `ANY`
    /// definition if the DTD has no such name.
    pub fn lookup_create_undefined_element(
        &mut self,
        name: &str,
        location: Location,
        dtd: &mut Dtd,
        allow_immediate_recursion: bool,
    ) -> ElementTypeId {
        let id = match dtd.lookup_element_type(name) {
            Some(id) => id,
            None => {
                let id = dtd.insert_element_type(name);
                dtd.element_type_mut(id).set_definition(Rc::new(ElementDefinition::undefined(
                    location,
                    allow_immediate_recursion,
                )));
                id
            }
        };
        let n = dtd.n_element_type_index();
        self.open_element_count.resize(n, 0);
        self.include_count.resize(n, 0);
        self.exclude_count.resize(n, 0);
        id
    }

    /// False if one of the `count` elements below the current one has the
    /// same type and the same match state, meaning further implied start
    /// tags would only repeat themselves.
    pub fn check_imply_loop(&self, count: usize) -> bool {
        let Some((head, below)) = self.open_elements.split_last() else {
            return true;
        };
        !below.iter().rev().take(count).any(|e| {
            e.element_type() == head.element_type() && e.match_state() == head.match_state()
        })
    }

    /// Name and content position of every open element, outermost first.
    pub fn open_element_info(&self, dtd: &Dtd) -> Vec<OpenElementInfo> {
        self.open_elements
            .iter()
            .map(|e| {
                let position = e.current_leaf().filter(|leaf| !leaf.is_initial());
                OpenElementInfo {
                    gi: dtd.element_type(e.element_type()).name().to_string(),
                    match_type: position.map(|leaf| match leaf.kind() {
                        LeafKind::Element(t) => dtd.element_type(t).name().to_string(),
                        LeafKind::Pcdata | LeafKind::Initial => "#PCDATA".to_string(),
                    }),
                    match_index: position.map_or(0, |leaf| leaf.type_index() + 1),
                    included: e.included(),
                }
            })
            .collect()
    }
}

/// The pseudo element whose content is exactly one document element.
fn document_element_container(dtd: &Dtd) -> OpenElement {
    let model = ContentToken::seq(vec![ContentToken::element(dtd.document_element_type())]);
    let result = compile(&model.into_group(), dtd.n_element_type_index());
    debug_assert!(result.ambiguities.is_empty());
    let mut container = ElementType::new("", DOCUMENT_ELEMENT_CONTAINER);
    container.set_definition(Rc::new(ElementDefinition::new(
        Location::zero(),
        Some(0),
        OmitFlags::default(),
        DeclaredContent::ModelGroup(Rc::new(result.model)),
    )));
    OpenElement::new(&container, false, false, None, Location::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtd::ElementDecl;
    use crate::options::Options;

    struct Fixture {
        dtd: Dtd,
        doc: ElementTypeId,
        p: ElementTypeId,
        fn_: ElementTypeId,
        note: ElementTypeId,
    }

    /// `doc` contains `p*` and includes `note`; `note` excludes `fn`.
    fn fixture() -> Fixture {
        let mut dtd = Dtd::new("doc");
        let doc = dtd.document_element_type();
        let p = dtd.insert_element_type("p");
        let fn_ = dtd.insert_element_type("fn");
        let note = dtd.insert_element_type("note");
        let options = Options::default();
        dtd.declare_element(
            ElementDecl::new(["doc"]).inclusions(vec![note]),
            ContentToken::seq(vec![ContentToken::element(p).rep()]).into_group(),
            &options,
        )
        .unwrap();
        dtd.declare_element_keyword(ElementDecl::new(["p", "fn"]), "RCDATA", &options)
            .unwrap();
        dtd.declare_element_keyword(
            ElementDecl::new(["note"]).exclusions(vec![fn_]),
            "ANY",
            &options,
        )
        .unwrap();
        Fixture {
            dtd,
            doc,
            p,
            fn_,
            note,
        }
    }

    fn open(state: &mut ContentState, dtd: &Dtd, e: ElementTypeId) {
        let element = OpenElement::new(dtd.element_type(e), false, false, None, Location::zero());
        state.push_element(element);
    }

    #[test]
    fn container_expects_document_element() {
        let f = fixture();
        let mut state = ContentState::new(&f.dtd);
        assert_eq!(state.tag_level(), 0);
        assert!(!state.after_document_element());
        assert!(!state.current_element_mut().try_transition(f.p));
        assert!(state.current_element_mut().try_transition(f.doc));
        assert!(state.after_document_element());
    }

    #[test]
    fn counters_follow_push_and_pop() {
        let f = fixture();
        let mut state = ContentState::new(&f.dtd);
        open(&mut state, &f.dtd, f.doc);
        assert!(state.element_is_open(f.doc));
        assert!(state.element_is_included(f.note));
        assert!(!state.element_is_excluded(f.fn_));

        open(&mut state, &f.dtd, f.note);
        assert!(state.element_is_excluded(f.fn_));
        assert_eq!(state.total_exclude_count(), 1);
        assert_eq!(state.open_elements()[1].index(), 1);

        let popped = state.pop_save_element();
        assert_eq!(popped.element_type(), f.note);
        assert_eq!(state.last_ended_element_type(), Some(f.note));
        assert!(!state.element_is_excluded(f.fn_));
        assert_eq!(state.total_exclude_count(), 0);

        state.pop_element();
        assert_eq!(state.tag_level(), 0);
        assert!(!state.element_is_open(f.doc));
        assert!(!state.element_is_included(f.note));
    }

    #[test]
    fn exclusion_overrides_inclusion() {
        let mut f = fixture();
        let mut state = ContentState::new(&f.dtd);
        open(&mut state, &f.dtd, f.doc);
        // A note inside a note: the inner note is both included and excluded.
        let def = f.dtd.element_type(f.note).definition().unwrap().clone();
        let excluding = Rc::new((*def).clone().with_exclusions(vec![f.note]));
        f.dtd.element_type_mut(f.note).set_definition(excluding);
        open(&mut state, &f.dtd, f.note);
        assert!(state.element_is_excluded(f.note));
        assert!(!state.element_is_included(f.note));
    }

    #[test]
    #[should_panic(expected = "pop with no open element")]
    fn pop_on_empty_stack_panics() {
        let f = fixture();
        let mut state = ContentState::new(&f.dtd);
        state.pop_element();
    }

    #[test]
    fn net_enabling_count() {
        let f = fixture();
        let mut state = ContentState::new(&f.dtd);
        let element = OpenElement::new(f.dtd.element_type(f.doc), true, false, None, Location::zero());
        state.push_element(element);
        assert_eq!(state.net_enabling_count(), 1);
        state.pop_element();
        assert_eq!(state.net_enabling_count(), 0);
    }

    #[test]
    fn undefined_elements_extend_counters() {
        let mut f = fixture();
        let mut state = ContentState::new(&f.dtd);
        let u = state.lookup_create_undefined_element("u", Location::new(3, 0), &mut f.dtd, true);
        assert_eq!(u.index(), f.dtd.n_element_type_index() - 1);
        assert!(f.dtd.element_type(u).is_undefined());
        assert!(!state.element_is_open(u));
        open(&mut state, &f.dtd, u);
        assert!(state.element_is_open(u));
        assert_eq!(
            state.lookup_create_undefined_element("u", Location::zero(), &mut f.dtd, true),
            u
        );
    }

    #[test]
    fn imply_loop_detects_repeated_state() {
        let f = fixture();
        let mut state = ContentState::new(&f.dtd);
        open(&mut state, &f.dtd, f.note);
        assert!(state.check_imply_loop(5));
        open(&mut state, &f.dtd, f.note);
        assert!(!state.check_imply_loop(5));
        assert!(state.check_imply_loop(0));
        open(&mut state, &f.dtd, f.p);
        assert!(state.check_imply_loop(5));
    }

    #[test]
    fn open_element_info_reports_positions() {
        let f = fixture();
        let mut state = ContentState::new(&f.dtd);
        open(&mut state, &f.dtd, f.doc);
        assert_eq!(
            state.open_element_info(&f.dtd),
            vec![OpenElementInfo {
                gi: "doc".into(),
                match_type: None,
                match_index: 0,
                included: false,
            }]
        );
        assert!(state.current_element_mut().try_transition(f.p));
        let info = state.open_element_info(&f.dtd);
        assert_eq!(info[0].match_type.as_deref(), Some("p"));
        assert_eq!(info[0].match_index, 1);
    }

    #[test]
    fn start_content_resets() {
        let f = fixture();
        let mut state = ContentState::new(&f.dtd);
        open(&mut state, &f.dtd, f.doc);
        state.start_content(&f.dtd);
        assert_eq!(state.tag_level(), 0);
        assert!(!state.element_is_open(f.doc));
        assert_eq!(state.last_ended_element_type(), None);
    }
}
