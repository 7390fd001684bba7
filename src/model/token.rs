//! Content token grammar: the tree form of a declared content model.
//!
//! The declaration parser hands the compiler a tree whose element names are
//! already resolved to [`ElementTypeId`]s. A model like `(title, (para|list)+)`
//! is a SEQ group holding a `title` leaf and an OR group with occurrence `+`.

use crate::element_type::ElementTypeId;

/// Occurrence indicator attached to every content token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occurrence {
    /// No indicator: exactly once.
    #[default]
    Once,
    /// `?`: zero or one.
    Opt,
    /// `+`: one or more.
    Plus,
    /// `*`: zero or more.
    Rep,
}

impl Occurrence {
    /// True for `?` and `*`.
    pub fn is_optional(self) -> bool {
        matches!(self, Occurrence::Opt | Occurrence::Rep)
    }

    /// True for `+` and `*`.
    pub fn repeats(self) -> bool {
        matches!(self, Occurrence::Plus | Occurrence::Rep)
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Occurrence::Once => "",
            Occurrence::Opt => "?",
            Occurrence::Plus => "+",
            Occurrence::Rep => "*",
        }
    }
}

/// Group connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `,`: members in order.
    Seq,
    /// `|`: exactly one member.
    Or,
    /// `&`: every member, in any order.
    And,
}

/// What a leaf token matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    /// Start tag of the given element type.
    Element(ElementTypeId),
    /// `#PCDATA`.
    Pcdata,
    /// The position before any token has been matched.
    Initial,
}

impl LeafKind {
    pub fn element_type(self) -> Option<ElementTypeId> {
        match self {
            LeafKind::Element(e) => Some(e),
            LeafKind::Pcdata | LeafKind::Initial => None,
        }
    }
}

/// A leaf content token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafToken {
    pub kind: LeafKind,
    pub occurrence: Occurrence,
}

/// A model group: a connector applied to one or more member tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    pub connector: Connector,
    pub members: Vec<ContentToken>,
    pub occurrence: Occurrence,
}

/// A node in the content model tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentToken {
    Leaf(LeafToken),
    Group(ModelGroup),
}

impl ContentToken {
    /// An element token occurring once.
    pub fn element(e: ElementTypeId) -> Self {
        ContentToken::Leaf(LeafToken {
            kind: LeafKind::Element(e),
            occurrence: Occurrence::Once,
        })
    }

    /// A `#PCDATA` token. Data may always repeat, so the indicator is `*`.
    pub fn pcdata() -> Self {
        ContentToken::Leaf(LeafToken {
            kind: LeafKind::Pcdata,
            occurrence: Occurrence::Rep,
        })
    }

    pub fn seq(members: Vec<ContentToken>) -> Self {
        ContentToken::Group(ModelGroup::new(Connector::Seq, members))
    }

    pub fn or(members: Vec<ContentToken>) -> Self {
        ContentToken::Group(ModelGroup::new(Connector::Or, members))
    }

    pub fn and(members: Vec<ContentToken>) -> Self {
        ContentToken::Group(ModelGroup::new(Connector::And, members))
    }

    /// Replace the occurrence indicator. `#PCDATA` keeps its implicit `*`.
    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        match &mut self {
            ContentToken::Leaf(leaf) if leaf.kind == LeafKind::Pcdata => {}
            ContentToken::Leaf(leaf) => leaf.occurrence = occurrence,
            ContentToken::Group(group) => group.occurrence = occurrence,
        }
        self
    }

    pub fn opt(self) -> Self {
        self.with_occurrence(Occurrence::Opt)
    }

    pub fn plus(self) -> Self {
        self.with_occurrence(Occurrence::Plus)
    }

    pub fn rep(self) -> Self {
        self.with_occurrence(Occurrence::Rep)
    }

    pub fn occurrence(&self) -> Occurrence {
        match self {
            ContentToken::Leaf(leaf) => leaf.occurrence,
            ContentToken::Group(group) => group.occurrence,
        }
    }

    /// Number of group tokens in this subtree, counting this token if it is
    /// a group. Leaves count zero.
    pub fn grpgtcnt(&self) -> usize {
        match self {
            ContentToken::Leaf(_) => 0,
            ContentToken::Group(group) => group.grpgtcnt(),
        }
    }

    /// Unwrap a group token; used when the declaration's outermost token is
    /// handed to the compiler.
    pub fn into_group(self) -> ModelGroup {
        match self {
            ContentToken::Group(group) => group,
            leaf @ ContentToken::Leaf(_) => ModelGroup::new(Connector::Seq, vec![leaf]),
        }
    }
}

impl ModelGroup {
    pub fn new(connector: Connector, members: Vec<ContentToken>) -> Self {
        Self {
            connector,
            members,
            occurrence: Occurrence::Once,
        }
    }

    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn grpgtcnt(&self) -> usize {
        1 + self.members.iter().map(ContentToken::grpgtcnt).sum::<usize>()
    }
}
