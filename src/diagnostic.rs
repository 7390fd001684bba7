//! Diagnostics produced while declaring elements and validating an instance.

use std::fmt;

use itertools::Itertools;

use crate::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Something the host should tell the user about.
///
/// Element names are captured when the diagnostic is made, so it can outlive
/// the DTD it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    GrpgtcntExceeded {
        limit: usize,
    },
    PcdataUnreachable,
    /// Two occurrences of `token` can both match after `from` (or at the
    /// start when `from` is `None`). `and_matches` counts the enclosing AND
    /// groups whose members have all been matched.
    AmbiguousModel {
        from: Option<(String, usize)>,
        and_matches: usize,
        token: String,
        first: usize,
        second: usize,
    },
    DuplicateElementDefinition {
        name: String,
    },
    UndefinedElement {
        name: String,
    },
    ElementNotAllowed {
        name: String,
    },
    MissingElementInferred {
        name: String,
        missing: String,
    },
    MissingElementMultiple {
        name: String,
        candidates: Vec<String>,
    },
    RequiredElementExcluded {
        occurrence: usize,
        name: String,
        parent: String,
    },
    PcdataNotAllowed,
    EndTagForNonOpenElement {
        name: String,
    },
    ElementNotFinished {
        name: String,
    },
    OmitEndTagDeclare {
        name: String,
    },
    OmitEndTagOmittag {
        name: String,
    },
    OmitStartTagDeclare {
        name: String,
    },
    OmitStartTagDeclaredContent {
        name: String,
    },
    TaglvlExceeded {
        limit: usize,
    },
    ImmediateRecursion,
    NoDocumentElement,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::PcdataUnreachable | Diagnostic::ImmediateRecursion => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GrpgtcntExceeded { limit } => {
                write!(f, "grand total of content tokens exceeds GRPGTCNT ({limit})")
            }
            Self::PcdataUnreachable => write!(
                f,
                "#PCDATA can occur in this content model but not at every point"
            ),
            Self::AmbiguousModel {
                from: None,
                token,
                first,
                second,
                ..
            } => write!(
                f,
                "content model is ambiguous: when no tokens have been matched, \
                 both the {} and {} occurrences of \"{token}\" are possible",
                ordinal(*first),
                ordinal(*second)
            ),
            Self::AmbiguousModel {
                from: Some((from, occurrence)),
                and_matches,
                token,
                first,
                second,
            } => {
                write!(
                    f,
                    "content model is ambiguous: when the current token is the {} occurrence of \"{from}\"",
                    ordinal(*occurrence)
                )?;
                match and_matches {
                    0 => {}
                    1 => write!(f, " and the innermost containing AND group has been matched")?,
                    n => write!(f, " and the innermost {n} containing AND groups have been matched")?,
                }
                write!(
                    f,
                    ", both the {} and {} occurrences of \"{token}\" are possible",
                    ordinal(*first),
                    ordinal(*second)
                )
            }
            Self::DuplicateElementDefinition { name } => {
                write!(f, "duplicate definition of element \"{name}\"")
            }
            Self::UndefinedElement { name } => write!(f, "element \"{name}\" undefined"),
            Self::ElementNotAllowed { name } => {
                write!(f, "document type does not allow element \"{name}\" here")
            }
            Self::MissingElementInferred { name, missing } => write!(
                f,
                "document type does not allow element \"{name}\" here; \
                 assuming missing \"{missing}\" start-tag"
            ),
            Self::MissingElementMultiple { name, candidates } => write!(
                f,
                "document type does not allow element \"{name}\" here; \
                 missing one of {} start-tag",
                candidates.iter().map(|c| format!("\"{c}\"")).join(", ")
            ),
            Self::RequiredElementExcluded {
                occurrence,
                name,
                parent,
            } => write!(
                f,
                "the {} occurrence of \"{name}\" in the content model for \"{parent}\" \
                 cannot be excluded at this point because it is contextually required",
                ordinal(*occurrence)
            ),
            Self::PcdataNotAllowed => write!(f, "character data is not allowed here"),
            Self::EndTagForNonOpenElement { name } => {
                write!(f, "end tag for element \"{name}\" which is not open")
            }
            Self::ElementNotFinished { name } => {
                write!(f, "end tag for \"{name}\" which is not finished")
            }
            Self::OmitEndTagDeclare { name } => write!(
                f,
                "end tag for \"{name}\" omitted, but its declaration does not permit this"
            ),
            Self::OmitEndTagOmittag { name } => write!(
                f,
                "end tag for \"{name}\" omitted, but OMITTAG NO was specified"
            ),
            Self::OmitStartTagDeclare { name } => write!(
                f,
                "start tag for \"{name}\" omitted, but its declaration does not permit this"
            ),
            Self::OmitStartTagDeclaredContent { name } => write!(
                f,
                "start tag omitted for element \"{name}\" with declared content"
            ),
            Self::TaglvlExceeded { limit } => {
                write!(f, "number of open elements exceeds TAGLVL ({limit})")
            }
            Self::ImmediateRecursion => write!(f, "immediately recursive element"),
            Self::NoDocumentElement => write!(f, "no document element"),
        }
    }
}

/// A diagnostic together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub location: Location,
    pub diagnostic: Diagnostic,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.location,
            self.diagnostic.severity(),
            self.diagnostic
        )
    }
}

/// English ordinal: 1st, 2nd, 3rd, 4th, ..., 11th, 12th, 13th, 21st.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals() {
        let got: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 101, 111]
            .into_iter()
            .map(ordinal)
            .collect();
        assert_eq!(
            got,
            [
                "1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "101st",
                "111th"
            ]
        );
    }

    #[test]
    fn ambiguity_wording() {
        let initial = Diagnostic::AmbiguousModel {
            from: None,
            and_matches: 0,
            token: "a".into(),
            first: 1,
            second: 2,
        };
        assert_eq!(
            initial.to_string(),
            "content model is ambiguous: when no tokens have been matched, \
             both the 1st and 2nd occurrences of \"a\" are possible"
        );

        let nested = Diagnostic::AmbiguousModel {
            from: Some(("b".into(), 1)),
            and_matches: 2,
            token: "a".into(),
            first: 1,
            second: 3,
        };
        assert_eq!(
            nested.to_string(),
            "content model is ambiguous: when the current token is the 1st occurrence of \"b\" \
             and the innermost 2 containing AND groups have been matched, \
             both the 1st and 3rd occurrences of \"a\" are possible"
        );
    }

    #[test]
    fn message_display_includes_location_and_severity() {
        let message = Message {
            location: Location::new(2, 4),
            diagnostic: Diagnostic::PcdataNotAllowed,
        };
        assert_eq!(message.to_string(), "3:5: error: character data is not allowed here");
        assert!(!Diagnostic::ImmediateRecursion.is_error());
    }

    #[test]
    fn candidates_are_joined() {
        let d = Diagnostic::MissingElementMultiple {
            name: "p".into(),
            candidates: vec!["body".into(), "front".into()],
        };
        assert!(d.to_string().ends_with("missing one of \"body\", \"front\" start-tag"));
    }
}
