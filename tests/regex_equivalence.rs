//! A compiled content model accepts exactly the token strings the equivalent
//! regular expression accepts.
//!
//! Models are written in declaration syntax over the element names `a`..`e`;
//! `#PCDATA` is the token `x`. AND groups expand to the alternation of their
//! member permutations.

use std::iter::Peekable;
use std::rc::Rc;
use std::str::Chars;

use itertools::Itertools;
use regex::Regex;
use rstest::rstest;
use sgml_content::{ContentToken, ElementTypeId, MatchState, Occurrence, compile};

const NAMES: &str = "abcde";
const PCDATA: char = 'x';
const MAX_LEN: usize = 5;

struct ModelParser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl ModelParser<'_> {
    fn parse(src: &str) -> (ContentToken, String) {
        let mut parser = ModelParser {
            chars: src.chars().peekable(),
        };
        let parsed = parser.token();
        assert!(parser.chars.next().is_none(), "trailing input in {src}");
        parsed
    }

    fn token(&mut self) -> (ContentToken, String) {
        match self.chars.next() {
            Some('(') => self.group(),
            Some('#') => {
                while self.chars.next_if(char::is_ascii_uppercase).is_some() {}
                (ContentToken::pcdata(), format!("{PCDATA}*"))
            }
            Some(c) => {
                let index = NAMES.find(c).unwrap_or_else(|| panic!("unknown name {c}"));
                let token = ContentToken::element(ElementTypeId::new(index));
                self.occurrence(token, c.to_string())
            }
            None => panic!("unexpected end of model"),
        }
    }

    fn group(&mut self) -> (ContentToken, String) {
        let mut members = vec![self.token()];
        let mut connector = None;
        loop {
            match self.chars.next() {
                Some(')') => break,
                Some(c @ (',' | '|' | '&')) => {
                    assert!(connector.is_none_or(|k| k == c), "mixed connectors");
                    connector = Some(c);
                    members.push(self.token());
                }
                other => panic!("unexpected {other:?} in group"),
            }
        }
        let (tokens, patterns): (Vec<_>, Vec<_>) = members.into_iter().unzip();
        let (token, pattern) = match connector.unwrap_or(',') {
            ',' => (ContentToken::seq(tokens), patterns.concat()),
            '|' => (ContentToken::or(tokens), patterns.join("|")),
            _ => {
                let n = patterns.len();
                let alternatives = patterns
                    .iter()
                    .permutations(n)
                    .map(|p| p.into_iter().join(""))
                    .join("|");
                (ContentToken::and(tokens), alternatives)
            }
        };
        self.occurrence(token, format!("(?:{pattern})"))
    }

    fn occurrence(&mut self, token: ContentToken, pattern: String) -> (ContentToken, String) {
        let occurrence = match self.chars.peek() {
            Some('?') => Occurrence::Opt,
            Some('+') => Occurrence::Plus,
            Some('*') => Occurrence::Rep,
            _ => return (token, pattern),
        };
        self.chars.next();
        let pattern = format!("(?:{pattern}){}", occurrence.indicator());
        (token.with_occurrence(occurrence), pattern)
    }
}

fn accepts(state: &MatchState, input: &[char]) -> bool {
    let mut state = state.clone();
    for &c in input {
        let moved = match c {
            PCDATA => state.try_transition_pcdata(),
            _ => state.try_transition(ElementTypeId::new(NAMES.find(c).unwrap())),
        };
        if !moved {
            return false;
        }
    }
    state.is_finished()
}

fn strings(alphabet: &[char], max_len: usize) -> Vec<Vec<char>> {
    let mut all = vec![Vec::new()];
    let mut frontier = vec![Vec::new()];
    for _ in 0..max_len {
        frontier = frontier
            .iter()
            .cartesian_product(alphabet)
            .map(|(prefix, &c)| {
                let mut s = prefix.clone();
                s.push(c);
                s
            })
            .collect();
        all.extend(frontier.iter().cloned());
    }
    all
}

#[rstest]
#[case("(a,b,c)")]
#[case("(a|b|c)")]
#[case("(a,b?,c)")]
#[case("(a+,b)")]
#[case("(a*,b)")]
#[case("(a,(b|c)*,d)")]
#[case("(a,b)+")]
#[case("((a|b),c?)+")]
#[case("(a?,b?,c?)")]
#[case("((a,b)|(c,d))")]
#[case("((a|b)*,c)")]
#[case("(#PCDATA|a|b)*")]
#[case("(#PCDATA)")]
#[case("(a&b)")]
#[case("(a&b?)")]
#[case("(a&b&c)")]
#[case("(a,(b&c),d)")]
#[case("(a&(b|c))")]
#[case("((a,b)&c)")]
fn test_model_matches_regex(#[case] model: &str) {
    let (token, pattern) = ModelParser::parse(model);
    let result = compile(&token.into_group(), NAMES.len());
    assert!(result.ambiguities.is_empty(), "{model} is ambiguous");
    let reference = Regex::new(&format!("^{pattern}$")).unwrap();
    let state = MatchState::new(Rc::new(result.model));

    let alphabet = NAMES
        .chars()
        .chain([PCDATA])
        .filter(|&c| model.contains(c) || (c == PCDATA && model.contains('#')))
        .collect_vec();
    for input in strings(&alphabet, MAX_LEN) {
        let text: String = input.iter().collect();
        assert_eq!(
            accepts(&state, &input),
            reference.is_match(&text),
            "{model} on {text:?} (regex {pattern})"
        );
    }
}

#[rstest]
#[case("(a?,a)")]
#[case("(a|a)")]
#[case("(a*,a)")]
#[case("((a,b)?,a)")]
fn test_ambiguous_models_are_reported(#[case] model: &str) {
    let (token, _) = ModelParser::parse(model);
    let result = compile(&token.into_group(), NAMES.len());
    assert!(!result.ambiguities.is_empty(), "{model} should be ambiguous");
}
