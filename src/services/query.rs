//! Trigram posting queries derived from a regex syntax tree.
//!
//! A [`TrigramQuery`] is a boolean formula over trigrams that every file
//! matching the regex must satisfy. It is a necessary condition only: the
//! index uses it to prune candidates and the snippet extractor still runs
//! the real regex over each candidate.
//!
//! The analysis walks the `Hir` bottom-up tracking, per node, a small set
//! of strings the node's matches are built from:
//! - an *exact* set when every match of the node is one of the strings
//! - a *suffix* set when every match ends with one of the strings
//! - no set when nothing useful is known
//!
//! Concatenation takes cross products of sets while they stay small, which
//! is what makes `(?i)` literals (a chain of two- or three-letter classes)
//! produce useful trigrams.

use crate::types::Trigram;
use regex_syntax::hir::{Class, Hir, HirKind};
use std::collections::BTreeSet;
use std::fmt;

/// Largest string set tracked per node before folding it into the query.
pub const MAX_SET: usize = 16;

/// Boolean formula over trigrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrigramQuery {
    /// Every file may match.
    All,
    /// No file can match.
    None,
    /// Files containing this trigram.
    Trigram(Trigram),
    /// Files satisfying every sub-query.
    And(Vec<TrigramQuery>),
    /// Files satisfying at least one sub-query.
    Or(Vec<TrigramQuery>),
}

impl TrigramQuery {
    /// Derives the posting query for a parsed regex.
    #[must_use]
    pub fn from_hir(hir: &Hir) -> Self {
        analyze(hir).into_query()
    }

    /// Conjunction with `All` dropped, `None` absorbing and nested `And`s flattened.
    #[must_use]
    pub fn and_all(queries: impl IntoIterator<Item = TrigramQuery>) -> Self {
        let mut terms = Vec::new();
        for q in queries {
            match q {
                Self::All => {}
                Self::None => return Self::None,
                Self::And(sub) => terms.extend(sub),
                other => terms.push(other),
            }
        }
        dedup_terms(&mut terms);
        match terms.len() {
            0 => Self::All,
            1 => terms.remove(0),
            _ => Self::And(terms),
        }
    }

    /// Disjunction with `None` dropped, `All` absorbing and nested `Or`s flattened.
    #[must_use]
    pub fn or_all(queries: impl IntoIterator<Item = TrigramQuery>) -> Self {
        let mut terms = Vec::new();
        for q in queries {
            match q {
                Self::None => {}
                Self::All => return Self::All,
                Self::Or(sub) => terms.extend(sub),
                other => terms.push(other),
            }
        }
        dedup_terms(&mut terms);
        match terms.len() {
            0 => Self::None,
            1 => terms.remove(0),
            _ => Self::Or(terms),
        }
    }

    /// Query requiring every trigram of `bytes`; `All` if shorter than 3 bytes.
    #[must_use]
    pub fn literal(bytes: &[u8]) -> Self {
        Self::and_all(Trigram::from_bytes(bytes).map(Self::Trigram))
    }

    /// Number of distinct trigrams referenced by the query.
    #[must_use]
    pub fn trigram_count(&self) -> usize {
        let mut seen = BTreeSet::new();
        self.collect_trigrams(&mut seen);
        seen.len()
    }

    fn collect_trigrams(&self, seen: &mut BTreeSet<Trigram>) {
        match self {
            Self::All | Self::None => {}
            Self::Trigram(t) => {
                seen.insert(*t);
            }
            Self::And(qs) | Self::Or(qs) => qs.iter().for_each(|q| q.collect_trigrams(seen)),
        }
    }
}

fn dedup_terms(terms: &mut Vec<TrigramQuery>) {
    let mut unique: Vec<TrigramQuery> = Vec::with_capacity(terms.len());
    for t in terms.drain(..) {
        if !unique.contains(&t) {
            unique.push(t);
        }
    }
    *terms = unique;
}

impl fmt::Display for TrigramQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "+"),
            Self::None => write!(f, "-"),
            Self::Trigram(t) => write!(f, "{:?}", t.to_string()),
            Self::And(qs) => write_joined(f, qs, " "),
            Self::Or(qs) => {
                write!(f, "(")?;
                write_joined(f, qs, " | ")?;
                write!(f, ")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, qs: &[TrigramQuery], sep: &str) -> fmt::Result {
    for (i, q) in qs.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{q}")?;
    }
    Ok(())
}

type StringSet = BTreeSet<Vec<u8>>;

/// What the analysis knows about one syntax node.
struct Info {
    set: Option<StringSet>,
    /// Whether `set` lists whole matches (true) or only match suffixes.
    exact: bool,
    query: TrigramQuery,
}

impl Info {
    fn exact(set: StringSet) -> Self {
        Self {
            set: Some(set),
            exact: true,
            query: TrigramQuery::All,
        }
    }

    fn empty_string() -> Self {
        Self::exact(StringSet::from([Vec::new()]))
    }

    fn unknown(query: TrigramQuery) -> Self {
        Self {
            set: None,
            exact: false,
            query,
        }
    }

    fn into_query(self) -> TrigramQuery {
        match self.set {
            Some(set) => TrigramQuery::and_all([self.query, set_query(&set)]),
            None => self.query,
        }
    }
}

/// Every match contains one of the strings, so at least one string's
/// trigrams must all be present.
fn set_query(set: &StringSet) -> TrigramQuery {
    if set.is_empty() {
        return TrigramQuery::None;
    }
    if set.iter().any(|s| s.len() < 3) {
        return TrigramQuery::All;
    }
    TrigramQuery::or_all(set.iter().map(|s| TrigramQuery::literal(s)))
}

fn cross(a: &StringSet, b: &StringSet) -> StringSet {
    let mut out = StringSet::new();
    for x in a {
        for y in b {
            let mut s = Vec::with_capacity(x.len() + y.len());
            s.extend_from_slice(x);
            s.extend_from_slice(y);
            out.insert(s);
        }
    }
    out
}

/// Keeps the last two bytes of each string: enough to form trigrams that
/// span into whatever is concatenated next.
fn suffixes(set: &StringSet) -> StringSet {
    set.iter()
        .map(|s| s[s.len().saturating_sub(2)..].to_vec())
        .collect()
}

fn analyze(hir: &Hir) -> Info {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => Info::empty_string(),
        HirKind::Literal(lit) => Info::exact(StringSet::from([lit.0.to_vec()])),
        HirKind::Class(class) => match class_strings(class) {
            Some(set) => Info::exact(set),
            None => Info::unknown(TrigramQuery::All),
        },
        HirKind::Capture(cap) => analyze(&cap.sub),
        HirKind::Repetition(rep) => {
            if rep.min == 0 {
                Info::unknown(TrigramQuery::All)
            } else if rep.min == 1 && rep.max == Some(1) {
                analyze(&rep.sub)
            } else {
                Info::unknown(analyze(&rep.sub).into_query())
            }
        }
        HirKind::Concat(subs) => subs
            .iter()
            .map(analyze)
            .fold(Info::empty_string(), concat),
        HirKind::Alternation(subs) => alternate(subs.iter().map(analyze).collect()),
    }
}

fn concat(a: Info, b: Info) -> Info {
    let b_set = match b.set {
        Some(set) if b.exact => set,
        Some(set) => {
            // b only knows its suffixes; they remain suffixes of a·b.
            let query = TrigramQuery::and_all([a.into_query(), b.query]);
            return Info {
                set: Some(set),
                exact: false,
                query,
            };
        }
        None => return Info::unknown(TrigramQuery::and_all([a.into_query(), b.query])),
    };

    let Some(a_set) = a.set else {
        return Info {
            set: Some(b_set),
            exact: false,
            query: TrigramQuery::and_all([a.query, b.query]),
        };
    };

    let product = cross(&a_set, &b_set);
    if product.len() <= MAX_SET {
        return Info {
            set: Some(product),
            exact: a.exact,
            query: TrigramQuery::and_all([a.query, b.query]),
        };
    }

    let query = TrigramQuery::and_all([a.query, b.query, set_query(&a_set)]);
    let carried = cross(&suffixes(&a_set), &b_set);
    let set = if carried.len() <= MAX_SET {
        carried
    } else {
        b_set
    };
    Info {
        set: Some(set),
        exact: false,
        query,
    }
}

fn alternate(branches: Vec<Info>) -> Info {
    if branches.iter().all(|b| b.set.is_some()) {
        let exact = branches.iter().all(|b| b.exact);
        let mut union = StringSet::new();
        let mut queries = Vec::with_capacity(branches.len());
        for b in branches {
            if let Some(set) = b.set {
                union.extend(set);
            }
            queries.push(b.query);
        }
        if union.len() <= MAX_SET {
            return Info {
                set: Some(union),
                exact,
                query: TrigramQuery::or_all(queries),
            };
        }
        // Too many strings to carry upward; require one of them here.
        return Info::unknown(TrigramQuery::and_all([
            TrigramQuery::or_all(queries),
            set_query(&union),
        ]));
    }

    Info::unknown(TrigramQuery::or_all(
        branches.into_iter().map(Info::into_query),
    ))
}

/// Expands a small class into the encodings of its members.
fn class_strings(class: &Class) -> Option<StringSet> {
    match class {
        Class::Unicode(cls) => {
            let mut total = 0usize;
            for r in cls.ranges() {
                total += (u32::from(r.end()) - u32::from(r.start())) as usize + 1;
                if total > MAX_SET {
                    return None;
                }
            }
            let mut set = StringSet::new();
            for r in cls.ranges() {
                for cp in u32::from(r.start())..=u32::from(r.end()) {
                    if let Some(c) = char::from_u32(cp) {
                        let mut buf = [0u8; 4];
                        set.insert(c.encode_utf8(&mut buf).as_bytes().to_vec());
                    }
                }
            }
            Some(set)
        }
        Class::Bytes(cls) => {
            let mut total = 0usize;
            for r in cls.ranges() {
                total += usize::from(r.end() - r.start()) + 1;
                if total > MAX_SET {
                    return None;
                }
            }
            Some(
                cls.ranges()
                    .iter()
                    .flat_map(|r| r.start()..=r.end())
                    .map(|b| vec![b])
                    .collect(),
            )
        }
    }
}
