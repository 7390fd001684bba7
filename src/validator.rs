//! Drives a [`ContentState`] from tags and character data, inferring the
//! tags that omitted tag minimization left out.
//!
//! Recovery is speculative: the validator snapshots the content state, tries
//! to imply end and start tags until the pending token fits, and rolls back
//! (events and diagnostics included) when it does not.

use std::rc::Rc;

use itertools::Itertools;
use log::{debug, trace};

use crate::content_state::{ContentState, DOCUMENT_ELEMENT_CONTAINER, OpenElementInfo};
use crate::diagnostic::{Diagnostic, Message};
use crate::dtd::Dtd;
use crate::element_type::{ContentKind, ElementDefinition, ElementTypeId};
use crate::location::Location;
use crate::model::MatchState;
use crate::open_element::OpenElement;
use crate::options::Options;

/// An element boundary, either from the input or implied by minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementEvent {
    Start {
        element: ElementTypeId,
        location: Location,
        implied: bool,
        /// Allowed by an inclusion exception rather than by the model.
        included: bool,
    },
    End {
        element: ElementTypeId,
        location: Location,
        implied: bool,
        included: bool,
    },
}

impl ElementEvent {
    pub fn element(&self) -> ElementTypeId {
        match *self {
            ElementEvent::Start { element, .. } | ElementEvent::End { element, .. } => element,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, ElementEvent::Start { .. })
    }

    pub fn is_implied(&self) -> bool {
        match *self {
            ElementEvent::Start { implied, .. } | ElementEvent::End { implied, .. } => implied,
        }
    }
}

/// A start tag as the tokenizer saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    name: String,
    location: Location,
    net_enabling: bool,
    conref: bool,
}

impl StartTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: Location::zero(),
            net_enabling: false,
            conref: false,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// The tag was closed with a null end tag delimiter.
    pub fn net_enabling(mut self) -> Self {
        self.net_enabling = true;
        self
    }

    /// A content reference attribute was specified; the element has no
    /// content and no end tag.
    pub fn conref(mut self) -> Self {
        self.conref = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

impl From<&str> for StartTag {
    fn from(name: &str) -> Self {
        StartTag::new(name)
    }
}

/// Everything recovery may change, so a failed attempt can be undone.
struct Snapshot {
    state: ContentState,
    events: usize,
    messages: usize,
    pcdata_recovering: bool,
}

/// Validates one document instance against a DTD.
#[derive(Debug, Clone)]
pub struct InstanceValidator {
    dtd: Dtd,
    state: ContentState,
    options: Options,
    events: Vec<ElementEvent>,
    messages: Vec<Message>,
    /// Character data was rejected; further data is accepted silently
    /// until the next element boundary.
    pcdata_recovering: bool,
}

impl InstanceValidator {
    /// Start validating an instance. Element types that are referenced but
    /// were never declared get an undefined `ANY` definition.
    pub fn new(mut dtd: Dtd, options: Options) -> Self {
        let undeclared = dtd
            .element_types()
            .filter(|e| e.definition().is_none())
            .map(|e| e.id())
            .collect_vec();
        for e in undeclared {
            debug!("element type {} used but not declared", dtd.element_type(e).name());
            dtd.element_type_mut(e)
                .set_definition(Rc::new(ElementDefinition::undefined(Location::zero(), true)));
        }
        let state = ContentState::new(&dtd);
        Self {
            dtd,
            state,
            options,
            events: Vec::new(),
            messages: Vec::new(),
            pcdata_recovering: false,
        }
    }

    pub fn dtd(&self) -> &Dtd {
        &self.dtd
    }

    pub fn content_state(&self) -> &ContentState {
        &self.state
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn events(&self) -> &[ElementEvent] {
        &self.events
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn take_events(&mut self) -> Vec<ElementEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    pub fn open_element_info(&self) -> Vec<OpenElementInfo> {
        self.state.open_element_info(&self.dtd)
    }

    // ─── Input ──────────────────────────────────────────────────────────────

    pub fn start_tag(&mut self, tag: impl Into<StartTag>) {
        let tag = tag.into();
        trace!("start tag {} at {}", tag.name, tag.location);
        let e = self.state.lookup_create_undefined_element(
            &tag.name,
            tag.location,
            &mut self.dtd,
            true,
        );
        self.accept_start_tag(e, &tag);
    }

    pub fn end_tag(&mut self, name: &str, location: Location) {
        trace!("end tag {name} at {location}");
        let open = self
            .dtd
            .lookup_element_type(name)
            .filter(|&e| self.state.element_is_open(e));
        let Some(e) = open else {
            self.message(
                location,
                Diagnostic::EndTagForNonOpenElement {
                    name: name.to_string(),
                },
            );
            return;
        };
        while self.state.current_element().element_type() != e {
            self.check_finished(location);
            self.imply_current_element_end(location);
        }
        self.check_finished(location);
        self.pop_element(location, false);
    }

    /// A null end tag: ends the innermost net-enabling element.
    pub fn null_end_tag(&mut self, location: Location) {
        if self.state.net_enabling_count() == 0 {
            debug!("null end tag at {location} with no net-enabling element open");
            return;
        }
        while !self.state.current_element().net_enabling() {
            self.check_finished(location);
            self.imply_current_element_end(location);
        }
        self.check_finished(location);
        self.pop_element(location, false);
    }

    /// Character data starting at `location`.
    pub fn data(&mut self, location: Location) {
        if self.state.current_element_mut().try_transition_pcdata() || self.pcdata_recovering {
            return;
        }
        let snapshot = self.snapshot();
        let mut start_implied = 0;
        while self.try_imply_tag(location, &mut start_implied) {
            if self.state.current_element_mut().try_transition_pcdata() {
                return;
            }
        }
        self.restore(snapshot);
        if self.options.validate || self.state.after_document_element() {
            self.message(location, Diagnostic::PcdataNotAllowed);
        }
        self.pcdata_recovering = true;
    }

    /// End of the instance: every open element is ended.
    pub fn end_document(&mut self, location: Location) {
        while self.state.tag_level() > 0 {
            if !self.state.current_element().is_finished() {
                let name = self.current_name();
                self.message(location, Diagnostic::ElementNotFinished { name });
            }
            self.imply_current_element_end(location);
        }
        if self.options.validate && !self.state.current_element().is_finished() {
            self.message(location, Diagnostic::NoDocumentElement);
        }
    }

    // ─── Start tags ─────────────────────────────────────────────────────────

    fn accept_start_tag(&mut self, e: ElementTypeId, tag: &StartTag) {
        let undefined = self.dtd.element_type(e).is_undefined();
        if undefined && !self.options.implydef_element {
            let name = self.name(e);
            self.message(tag.location, Diagnostic::UndefinedElement { name });
        }

        let snapshot = if self.state.element_is_excluded(e) {
            // Reported before the snapshot so a failed recovery keeps it.
            if self.options.validate {
                self.check_exclusion(e, tag.location);
            }
            self.snapshot()
        } else {
            if self.state.current_element_mut().try_transition(e) {
                self.push_element_check(e, tag, false, false);
                return;
            }
            if self.state.element_is_included(e) {
                self.push_element_check(e, tag, true, false);
                return;
            }
            self.snapshot()
        };

        let mut start_implied = 0;
        while self.try_imply_tag(tag.location, &mut start_implied) {
            if self.try_start_tag(e, tag) {
                return;
            }
        }
        self.restore(snapshot);

        if self.options.validate && !undefined {
            self.handle_bad_start_tag(e, tag);
            return;
        }
        let report = if self.options.validate {
            self.options.implydef_element
        } else {
            self.state.after_document_element()
        };
        if report {
            let name = self.name(e);
            self.message(tag.location, Diagnostic::ElementNotAllowed { name });
        }
        // Advance past `e` when the model allows it; otherwise stay put.
        self.state.current_element_mut().try_transition(e);
        self.push_element_check(e, tag, false, false);
    }

    fn try_start_tag(&mut self, e: ElementTypeId, tag: &StartTag) -> bool {
        if self.state.element_is_excluded(e) {
            self.check_exclusion(e, tag.location);
            return false;
        }
        if self.state.current_element_mut().try_transition(e) {
            self.push_element_check(e, tag, false, false);
            return true;
        }
        if self.state.element_is_included(e) {
            self.push_element_check(e, tag, true, false);
            return true;
        }
        false
    }

    /// One step of omitted tag recovery: end the current element if it may
    /// end here, otherwise start the element its content requires next.
    fn try_imply_tag(&mut self, location: Location, start_implied: &mut usize) -> bool {
        if !self.options.omittag {
            return false;
        }
        let current = self.state.current_element();
        if current.is_finished() {
            if self.state.tag_level() == 0 || !can_omit_end_tag(current) {
                return false;
            }
            *start_implied = start_implied.saturating_sub(1);
            self.pop_element(location, true);
            return true;
        }

        let required = current
            .implied_start_tag()
            .and_then(|leaf| Some((leaf.element_type()?, leaf.type_index() + 1)));
        let Some((e, occurrence)) = required else {
            return false;
        };
        if self.state.element_is_excluded(e) {
            let diagnostic = Diagnostic::RequiredElementExcluded {
                occurrence,
                name: self.name(e),
                parent: self.current_name(),
            };
            self.message(location, diagnostic);
        }
        self.state.current_element_mut().do_required_transition();

        *start_implied += 1;
        if *start_implied > self.options.imply_check_limit
            && !self.state.check_imply_loop(*start_implied)
        {
            debug!("implied start tags at {location} loop; giving up");
            return false;
        }

        let name = self.name(e);
        let mut diagnostics = Vec::new();
        if let Some(def) = self.dtd.element_type(e).definition() {
            if !matches!(def.declared_content(), ContentKind::ModelGroup | ContentKind::Any) {
                diagnostics.push(Diagnostic::OmitStartTagDeclaredContent { name: name.clone() });
            }
            if def.is_undefined() {
                if !self.options.implydef_element {
                    diagnostics.push(Diagnostic::UndefinedElement { name: name.clone() });
                }
            } else if !def.can_omit_start_tag() {
                diagnostics.push(Diagnostic::OmitStartTagDeclare { name: name.clone() });
            }
        }
        for diagnostic in diagnostics {
            self.message(location, diagnostic);
        }
        debug!("implied start tag for {name} at {location}");
        self.push_element_check(e, &StartTag::new(name).at(location), false, true);
        true
    }

    /// The tag fits nowhere even after recovery. Infer a single missing
    /// start tag if exactly one element type could contain it, ending
    /// finished elements on the way out; otherwise open it where it stands.
    fn handle_bad_start_tag(&mut self, e: ElementTypeId, tag: &StartTag) {
        let snapshot = self.snapshot();
        loop {
            let missing = self.find_missing_tag(e);
            match missing.as_slice() {
                [] => {}
                &[m] => {
                    let missing_name = self.name(m);
                    self.message(
                        tag.location,
                        Diagnostic::MissingElementInferred {
                            name: self.name(e),
                            missing: missing_name.clone(),
                        },
                    );
                    let included = !self.state.current_element_mut().try_transition(m);
                    let inferred = StartTag::new(missing_name).at(tag.location);
                    self.push_element_check(m, &inferred, included, true);
                    let included = !self.state.current_element_mut().try_transition(e);
                    self.push_element_check(e, tag, included, false);
                    return;
                }
                candidates => {
                    let candidates = candidates.iter().map(|&m| self.name(m)).collect_vec();
                    self.message(
                        tag.location,
                        Diagnostic::MissingElementMultiple {
                            name: self.name(e),
                            candidates,
                        },
                    );
                    self.push_element_check(e, tag, false, false);
                    return;
                }
            }
            let current = self.state.current_element();
            if !self.options.omittag
                || !current.is_finished()
                || self.state.tag_level() == 0
                || !can_omit_end_tag(current)
            {
                break;
            }
            self.pop_element(tag.location, true);
        }
        self.restore(snapshot);
        let name = self.name(e);
        self.message(tag.location, Diagnostic::ElementNotAllowed { name });
        // Same as in `accept_start_tag`: advance if possible.
        self.state.current_element_mut().try_transition(e);
        self.push_element_check(e, tag, false, false);
    }

    /// Element types that may come next in the current element and whose
    /// own content would accept `e` first, in DTD order.
    fn find_missing_tag(&self, e: ElementTypeId) -> Vec<ElementTypeId> {
        let current = self.state.current_element();
        if current.current_position().is_none() || self.state.element_is_excluded(e) {
            return Vec::new();
        }
        let Some(state) = current.match_state() else {
            return Vec::new();
        };
        state
            .possible_transitions()
            .into_iter()
            .flatten()
            .unique()
            .filter(|&m| !self.state.element_is_excluded(m) && self.could_start_with(m, e))
            .sorted()
            .collect()
    }

    fn could_start_with(&self, m: ElementTypeId, e: ElementTypeId) -> bool {
        let Some(def) = self.dtd.element_type(m).definition() else {
            return false;
        };
        let Some(model) = def.compiled_model() else {
            return false;
        };
        let accepted =
            MatchState::new(model.clone()).try_transition(e) || def.inclusions().contains(&e);
        accepted && !def.exclusions().contains(&e)
    }

    fn check_exclusion(&mut self, e: ElementTypeId, location: Location) {
        let Some(occurrence) = self
            .state
            .current_element()
            .invalid_exclusion(e)
            .map(|leaf| leaf.type_index() + 1)
        else {
            return;
        };
        let diagnostic = Diagnostic::RequiredElementExcluded {
            occurrence,
            name: self.name(e),
            parent: self.current_name(),
        };
        self.message(location, diagnostic);
    }

    fn push_element_check(&mut self, e: ElementTypeId, tag: &StartTag, included: bool, implied: bool) {
        if self.state.tag_level() == self.options.taglvl {
            let limit = self.options.taglvl;
            self.message(tag.location, Diagnostic::TaglvlExceeded { limit });
        }
        let element = self.dtd.element_type(e);
        let map = element.map().or(self.state.current_element().map());
        let mut open = OpenElement::new(element, tag.net_enabling, included, map, tag.location);
        if tag.conref {
            open.set_conref();
        }
        self.events.push(ElementEvent::Start {
            element: e,
            location: tag.location,
            implied,
            included,
        });
        if open.declared_empty() {
            self.events.push(ElementEvent::End {
                element: e,
                location: tag.location,
                implied: true,
                included,
            });
            return;
        }
        if self.options.warn_immediate_recursion && e == self.state.current_element().element_type() {
            self.message(tag.location, Diagnostic::ImmediateRecursion);
        }
        self.state.push_element(open);
        self.pcdata_recovering = false;
    }

    // ─── End tags ───────────────────────────────────────────────────────────

    fn imply_current_element_end(&mut self, location: Location) {
        let name = self.current_name();
        if !self.options.omittag {
            self.message(location, Diagnostic::OmitEndTagOmittag { name });
        } else if !can_omit_end_tag(self.state.current_element()) {
            self.message(location, Diagnostic::OmitEndTagDeclare { name });
        }
        self.pop_element(location, true);
    }

    fn check_finished(&mut self, location: Location) {
        if self.options.validate && !self.state.current_element().is_finished() {
            let name = self.current_name();
            self.message(location, Diagnostic::ElementNotFinished { name });
        }
    }

    fn pop_element(&mut self, location: Location, implied: bool) {
        let open = self.state.pop_save_element();
        self.pcdata_recovering = false;
        self.events.push(ElementEvent::End {
            element: open.element_type(),
            location,
            implied,
            included: open.included(),
        });
    }

    // ─── Helpers ────────────────────────────────────────────────────────────

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            events: self.events.len(),
            messages: self.messages.len(),
            pcdata_recovering: self.pcdata_recovering,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.state = snapshot.state;
        self.events.truncate(snapshot.events);
        self.messages.truncate(snapshot.messages);
        self.pcdata_recovering = snapshot.pcdata_recovering;
    }

    fn message(&mut self, location: Location, diagnostic: Diagnostic) {
        trace!("{location}: {diagnostic}");
        self.messages.push(Message {
            location,
            diagnostic,
        });
    }

    fn name(&self, e: ElementTypeId) -> String {
        if e == DOCUMENT_ELEMENT_CONTAINER {
            return String::new();
        }
        self.dtd.element_type(e).name().to_string()
    }

    fn current_name(&self) -> String {
        self.name(self.state.current_element().element_type())
    }
}

/// Elements without a definition may always end implicitly.
fn can_omit_end_tag(element: &OpenElement) -> bool {
    element.definition().is_none_or(|d| d.can_omit_end_tag())
}
