//! Parser options that affect declaration checking and instance validation.

use clap::{ArgAction, Args, ValueEnum};

/// What to do with a content model that is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AmbiguityPolicy {
    /// Report each ambiguity and keep the declaration; matching takes the
    /// first edge in transition order.
    #[default]
    Report,
    /// Report and refuse the declaration.
    Reject,
    /// Keep the declaration silently.
    Ignore,
}

/// Options for [`Dtd`](crate::Dtd) declarations and the
/// [`InstanceValidator`](crate::InstanceValidator).
///
/// Derives [`clap::Args`] so a host binary can `#[command(flatten)]` it.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct Options {
    /// Do not report validity errors in the instance.
    #[arg(long = "no-validate", action = ArgAction::SetFalse)]
    pub validate: bool,

    /// Disable omitted tag minimization.
    #[arg(long = "no-omittag", action = ArgAction::SetFalse)]
    pub omittag: bool,

    /// Accept undeclared element types without an error.
    #[arg(long)]
    pub implydef_element: bool,

    /// Maximum number of open elements.
    #[arg(long, default_value_t = 24)]
    pub taglvl: usize,

    /// Maximum number of content tokens in a model group.
    #[arg(long, default_value_t = 96)]
    pub grpgtcnt: usize,

    /// Warn about mixed content where `#PCDATA` cannot always occur.
    #[arg(long)]
    pub warn_mixed_content: bool,

    /// Warn when an element directly contains an element of its own type.
    #[arg(long)]
    pub warn_immediate_recursion: bool,

    #[arg(long, value_enum, default_value_t = AmbiguityPolicy::Report)]
    pub ambiguity: AmbiguityPolicy,

    /// Number of consecutive implied start tags after which omitted-tag
    /// recovery checks for a loop.
    #[arg(long, default_value_t = 30)]
    pub imply_check_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            validate: true,
            omittag: true,
            implydef_element: false,
            taglvl: 24,
            grpgtcnt: 96,
            warn_mixed_content: false,
            warn_immediate_recursion: false,
            ambiguity: AmbiguityPolicy::Report,
            imply_check_limit: 30,
        }
    }
}
