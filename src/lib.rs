//! SGML element content models: compilation, matching and instance
//! validation with omitted tag inference.
//!
//! Element declarations are compiled into position automata
//! ([`CompiledModel`]) that decide one token at a time whether a child element
//! or character data may come next. [`ContentState`] tracks the open elements
//! of a document instance and [`InstanceValidator`] drives it from tags,
//! implying the tags that omitted tag minimization left out.
//!
//! # Example
//!
//! ```rust
//! use sgml_content::{
//!     ContentToken, Dtd, ElementDecl, InstanceValidator, Location, OmitFlags, Options,
//! };
//!
//! // <!ELEMENT memo      O O (to, body)>
//! // <!ELEMENT (to|body) - O (#PCDATA)>
//! let mut dtd = Dtd::new("memo");
//! let to = dtd.insert_element_type("to");
//! let body = dtd.insert_element_type("body");
//! let options = Options::default();
//!
//! let model = ContentToken::seq(vec![ContentToken::element(to), ContentToken::element(body)]);
//! let decl = ElementDecl::new(["memo"]).omit(OmitFlags::BOTH);
//! dtd.declare_element(decl, model.into_group(), &options)?;
//! let text = ContentToken::seq(vec![ContentToken::pcdata()]);
//! let decl = ElementDecl::new(["to", "body"]).omit(OmitFlags::END);
//! dtd.declare_element(decl, text.into_group(), &options)?;
//!
//! let mut validator = InstanceValidator::new(dtd, options);
//! validator.start_tag("to");
//! validator.data(Location::new(0, 4));
//! validator.start_tag("body");
//! validator.data(Location::new(1, 6));
//! validator.end_document(Location::new(2, 0));
//!
//! assert!(validator.messages().is_empty());
//! // <memo>, </to>, </body> and </memo> were implied.
//! let implied = validator.events().iter().filter(|e| e.is_implied()).count();
//! assert_eq!(implied, 4);
//! # Ok::<(), anyhow::Error>(())
//! ```

mod content_state;
mod diagnostic;
mod dtd;
mod element_type;
mod location;
pub mod model;
mod open_element;
mod options;
mod validator;

pub use content_state::{ContentState, DOCUMENT_ELEMENT_CONTAINER, OpenElementInfo};
pub use diagnostic::{Diagnostic, Message, Severity, ordinal};
pub use dtd::{Dtd, ElementDecl, RankStem};
pub use element_type::{
    ContentKind, DeclaredContent, ElementDefinition, ElementType, ElementTypeId, OmitFlags,
    RankStemId, ShortRefMapId,
};
pub use location::Location;
pub use model::{
    CompileResult, CompiledModel, ContentModelAmbiguity, ContentToken, MatchState, ModelGroup,
    Occurrence, compile,
};
pub use open_element::OpenElement;
pub use options::{AmbiguityPolicy, Options};
pub use validator::{ElementEvent, InstanceValidator, StartTag};
