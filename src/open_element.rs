//! An element instance whose end tag has not been seen yet.

use std::rc::Rc;

use crate::element_type::{ContentKind, ElementDefinition, ElementType, ElementTypeId, ShortRefMapId};
use crate::location::Location;
use crate::model::{Leaf, LeafId, MatchState};

#[derive(Debug, Clone)]
pub struct OpenElement {
    element_type: ElementTypeId,
    definition: Option<Rc<ElementDefinition>>,
    declared_content: ContentKind,
    /// Present for model group content only.
    match_state: Option<MatchState>,
    net_enabling: bool,
    included: bool,
    map: Option<ShortRefMapId>,
    start_location: Location,
    index: usize,
}

impl OpenElement {
    /// Open an element of type `element`. An element type without a
    /// definition is treated as declared `EMPTY`.
    pub fn new(
        element: &ElementType,
        net_enabling: bool,
        included: bool,
        map: Option<ShortRefMapId>,
        start_location: Location,
    ) -> Self {
        let definition = element.definition().cloned();
        let declared_content = definition
            .as_ref()
            .map_or(ContentKind::Empty, |d| d.declared_content());
        let match_state = definition
            .as_ref()
            .and_then(|d| d.compiled_model())
            .map(|model| MatchState::new(model.clone()));
        Self {
            element_type: element.id(),
            definition,
            declared_content,
            match_state,
            net_enabling,
            included,
            map,
            start_location,
            index: 0,
        }
    }

    pub fn element_type(&self) -> ElementTypeId {
        self.element_type
    }

    pub fn definition(&self) -> Option<&Rc<ElementDefinition>> {
        self.definition.as_ref()
    }

    pub fn declared_content(&self) -> ContentKind {
        self.declared_content
    }

    pub fn match_state(&self) -> Option<&MatchState> {
        self.match_state.as_ref()
    }

    pub fn net_enabling(&self) -> bool {
        self.net_enabling
    }

    /// Opened by an inclusion exception rather than by the model.
    pub fn included(&self) -> bool {
        self.included
    }

    pub fn map(&self) -> Option<ShortRefMapId> {
        self.map
    }

    pub fn set_map(&mut self, map: Option<ShortRefMapId>) {
        self.map = map;
    }

    pub fn start_location(&self) -> Location {
        self.start_location
    }

    /// Document-order index assigned when the element was pushed.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// The element may end here. Only model group content can be unfinished.
    pub fn is_finished(&self) -> bool {
        match (&self.match_state, self.declared_content) {
            (Some(state), ContentKind::ModelGroup) => state.is_finished(),
            _ => true,
        }
    }

    pub fn try_transition(&mut self, e: ElementTypeId) -> bool {
        match self.declared_content {
            ContentKind::ModelGroup => self
                .match_state
                .as_mut()
                .is_some_and(|state| state.try_transition(e)),
            ContentKind::Any => {
                e != self.element_type
                    || self
                        .definition
                        .as_ref()
                        .is_some_and(|d| d.allow_immediate_recursion())
            }
            ContentKind::Cdata | ContentKind::Rcdata | ContentKind::Empty => false,
        }
    }

    /// Character data is decided by the model for model group content and
    /// always accepted otherwise.
    pub fn try_transition_pcdata(&mut self) -> bool {
        match (&mut self.match_state, self.declared_content) {
            (Some(state), ContentKind::ModelGroup) => {
                state.model().contains_pcdata() && state.try_transition_pcdata()
            }
            _ => true,
        }
    }

    pub fn invalid_exclusion(&self, e: ElementTypeId) -> Option<&Leaf> {
        let state = self.model_state()?;
        state
            .invalid_exclusion(e)
            .map(|leaf| state.model().leaf(leaf))
    }

    pub fn implied_start_tag(&self) -> Option<&Leaf> {
        let state = self.model_state()?;
        state
            .implied_start_tag()
            .map(|leaf| state.model().leaf(leaf))
    }

    pub fn do_required_transition(&mut self) -> bool {
        match (&mut self.match_state, self.declared_content) {
            (Some(state), ContentKind::ModelGroup) => state.do_required_transition(),
            _ => false,
        }
    }

    pub fn current_position(&self) -> Option<LeafId> {
        self.model_state().map(MatchState::current_position)
    }

    pub fn current_leaf(&self) -> Option<&Leaf> {
        self.model_state().map(MatchState::current_leaf)
    }

    pub fn declared_empty(&self) -> bool {
        self.declared_content == ContentKind::Empty
    }

    /// A content reference attribute was specified: the element is empty.
    pub fn set_conref(&mut self) {
        self.declared_content = ContentKind::Empty;
    }

    /// Content is parsed as `CDATA` or `RCDATA`.
    pub fn requires_special_parse(&self) -> bool {
        matches!(self.declared_content, ContentKind::Cdata | ContentKind::Rcdata)
    }

    fn model_state(&self) -> Option<&MatchState> {
        match self.declared_content {
            ContentKind::ModelGroup => self.match_state.as_ref(),
            _ => None,
        }
    }
}
