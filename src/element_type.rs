//! Element types and their declarations.
//!
//! An [`ElementType`] is created once per element name in a DTD and is
//! identified by a dense [`ElementTypeId`]. Its [`ElementDefinition`] is
//! immutable once built and shared behind an `Rc`, so several element types
//! declared by one name group can point at the same definition.

use std::fmt;
use std::rc::Rc;

use phf::{Map, phf_map};

use crate::location::Location;
use crate::model::CompiledModel;

/// Dense index of an element type within its DTD.
///
/// Indices are handed out by a single counter
/// ([`Dtd::alloc_element_type_index`](crate::Dtd::alloc_element_type_index)),
/// which lets per-type counters live in plain vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementTypeId(usize);

impl ElementTypeId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a rank stem within its DTD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RankStemId(pub usize);

/// Index of a short reference map within its DTD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortRefMapId(pub usize);

/// The kind of declared content, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    ModelGroup,
    Any,
    Cdata,
    Rcdata,
    Empty,
}

/// Reserved names that can stand in place of a model group.
const CONTENT_KEYWORDS: Map<&'static str, ContentKind> = phf_map! {
    "ANY" => ContentKind::Any,
    "CDATA" => ContentKind::Cdata,
    "RCDATA" => ContentKind::Rcdata,
    "EMPTY" => ContentKind::Empty,
};

impl ContentKind {
    /// Look up a declared-content keyword. Reserved names are case-insensitive.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        CONTENT_KEYWORDS
            .get(keyword.to_ascii_uppercase().as_str())
            .copied()
    }
}

/// Declared content of an element.
#[derive(Debug, Clone)]
pub enum DeclaredContent {
    ModelGroup(Rc<CompiledModel>),
    Any,
    Cdata,
    Rcdata,
    Empty,
}

impl DeclaredContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            DeclaredContent::ModelGroup(_) => ContentKind::ModelGroup,
            DeclaredContent::Any => ContentKind::Any,
            DeclaredContent::Cdata => ContentKind::Cdata,
            DeclaredContent::Rcdata => ContentKind::Rcdata,
            DeclaredContent::Empty => ContentKind::Empty,
        }
    }

    /// Content for a keyword kind. `ModelGroup` has no keyword form.
    pub fn from_kind(kind: ContentKind) -> Option<Self> {
        match kind {
            ContentKind::ModelGroup => None,
            ContentKind::Any => Some(DeclaredContent::Any),
            ContentKind::Cdata => Some(DeclaredContent::Cdata),
            ContentKind::Rcdata => Some(DeclaredContent::Rcdata),
            ContentKind::Empty => Some(DeclaredContent::Empty),
        }
    }
}

/// Omitted tag minimization flags from the element declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OmitFlags {
    pub omit_start: bool,
    pub omit_end: bool,
    /// The declaration spelled out the minimization parameters.
    pub omit_spec: bool,
}

impl OmitFlags {
    pub const NONE: OmitFlags = OmitFlags {
        omit_start: false,
        omit_end: false,
        omit_spec: true,
    };

    pub const END: OmitFlags = OmitFlags {
        omit_start: false,
        omit_end: true,
        omit_spec: true,
    };

    pub const BOTH: OmitFlags = OmitFlags {
        omit_start: true,
        omit_end: true,
        omit_spec: true,
    };
}

/// An element declaration: declared content, exceptions and minimization.
#[derive(Debug, Clone)]
pub struct ElementDefinition {
    location: Location,
    /// `None` for definitions synthesized for undefined elements.
    index: Option<usize>,
    omit: OmitFlags,
    content: DeclaredContent,
    allow_immediate_recursion: bool,
    inclusions: Vec<ElementTypeId>,
    exclusions: Vec<ElementTypeId>,
    rank_suffix: String,
    rank_stems: Vec<RankStemId>,
}

impl ElementDefinition {
    pub fn new(
        location: Location,
        index: Option<usize>,
        omit: OmitFlags,
        content: DeclaredContent,
    ) -> Self {
        Self {
            location,
            index,
            omit,
            content,
            allow_immediate_recursion: true,
            inclusions: Vec::new(),
            exclusions: Vec::new(),
            rank_suffix: String::new(),
            rank_stems: Vec::new(),
        }
    }

    /// The definition given to an element that was used but never declared:
    /// `ANY` content with an omissible end tag.
    pub fn undefined(location: Location, allow_immediate_recursion: bool) -> Self {
        Self {
            allow_immediate_recursion,
            ..Self::new(
                location,
                None,
                OmitFlags {
                    omit_start: false,
                    omit_end: true,
                    omit_spec: false,
                },
                DeclaredContent::Any,
            )
        }
    }

    pub fn with_inclusions(mut self, inclusions: Vec<ElementTypeId>) -> Self {
        self.inclusions = inclusions;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Vec<ElementTypeId>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_rank(mut self, suffix: impl Into<String>, stems: Vec<RankStemId>) -> Self {
        self.rank_suffix = suffix.into();
        self.rank_stems = stems;
        self
    }

    pub fn with_immediate_recursion(mut self, allow: bool) -> Self {
        self.allow_immediate_recursion = allow;
        self
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_undefined(&self) -> bool {
        self.index.is_none()
    }

    pub fn omit_flags(&self) -> OmitFlags {
        self.omit
    }

    pub fn can_omit_start_tag(&self) -> bool {
        self.omit.omit_start
    }

    pub fn can_omit_end_tag(&self) -> bool {
        self.omit.omit_end
    }

    pub fn omitted_tag_spec(&self) -> bool {
        self.omit.omit_spec
    }

    pub fn content(&self) -> &DeclaredContent {
        &self.content
    }

    pub fn declared_content(&self) -> ContentKind {
        self.content.kind()
    }

    pub fn compiled_model(&self) -> Option<&Rc<CompiledModel>> {
        match &self.content {
            DeclaredContent::ModelGroup(model) => Some(model),
            _ => None,
        }
    }

    pub fn allow_immediate_recursion(&self) -> bool {
        self.allow_immediate_recursion
    }

    pub fn inclusions(&self) -> &[ElementTypeId] {
        &self.inclusions
    }

    pub fn exclusions(&self) -> &[ElementTypeId] {
        &self.exclusions
    }

    pub fn rank_suffix(&self) -> &str {
        &self.rank_suffix
    }

    pub fn rank_stems(&self) -> &[RankStemId] {
        &self.rank_stems
    }
}

/// An element type: a name, its dense index and its definition, if any.
#[derive(Debug, Clone)]
pub struct ElementType {
    name: String,
    id: ElementTypeId,
    definition: Option<Rc<ElementDefinition>>,
    map: Option<ShortRefMapId>,
    rank_stem: Option<RankStemId>,
}

impl ElementType {
    pub fn new(name: impl Into<String>, id: ElementTypeId) -> Self {
        Self {
            name: name.into(),
            id,
            definition: None,
            map: None,
            rank_stem: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ElementTypeId {
        self.id
    }

    pub fn definition(&self) -> Option<&Rc<ElementDefinition>> {
        self.definition.as_ref()
    }

    pub fn set_definition(&mut self, definition: Rc<ElementDefinition>) {
        self.definition = Some(definition);
    }

    /// True until a real declaration has been attached.
    pub fn is_undefined(&self) -> bool {
        self.definition.as_ref().is_none_or(|d| d.is_undefined())
    }

    pub fn map(&self) -> Option<ShortRefMapId> {
        self.map
    }

    pub fn set_map(&mut self, map: Option<ShortRefMapId>) {
        self.map = map;
    }

    pub fn rank_stem(&self) -> Option<RankStemId> {
        self.rank_stem
    }

    pub fn set_rank_stem(&mut self, rank_stem: Option<RankStemId>) {
        self.rank_stem = rank_stem;
    }

    pub fn is_ranked_element(&self) -> bool {
        self.rank_stem.is_some()
    }
}
