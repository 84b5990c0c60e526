//! Two-way ordered merge.
//!
//! Both inputs must be sorted ascending by key with no duplicate keys, which
//! `BTreeMap` iteration guarantees. Each key is visited exactly once, in
//! ascending order, in a single forward pass.

use std::cmp::Ordering;
use std::iter::Peekable;

/// One step of the diff between the source of truth and the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStep<K, S, C> {
    /// Only in the source: create it.
    Create(K, S),
    /// Only in the current state: delete it.
    Delete(K, C),
    /// In both: descend or refresh.
    Matched(K, S, C),
}

impl<K, S, C> MergeStep<K, S, C> {
    pub fn key(&self) -> &K {
        match self {
            MergeStep::Create(k, _) | MergeStep::Delete(k, _) | MergeStep::Matched(k, _, _) => k,
        }
    }
}

pub struct SortedMerge<I: Iterator, J: Iterator> {
    source: Peekable<I>,
    current: Peekable<J>,
}

/// Merge `source` (authoritative) against `current`.
pub fn merge<I, J>(source: I, current: J) -> SortedMerge<I::IntoIter, J::IntoIter>
where
    I: IntoIterator,
    J: IntoIterator,
{
    SortedMerge {
        source: source.into_iter().peekable(),
        current: current.into_iter().peekable(),
    }
}

impl<K, S, C, I, J> Iterator for SortedMerge<I, J>
where
    K: Ord,
    I: Iterator<Item = (K, S)>,
    J: Iterator<Item = (K, C)>,
{
    type Item = MergeStep<K, S, C>;

    fn next(&mut self) -> Option<Self::Item> {
        let order = match (self.source.peek(), self.current.peek()) {
            (None, None) => return None,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((s, _)), Some((c, _))) => s.cmp(c),
        };

        match order {
            Ordering::Less => self.source.next().map(|(k, s)| MergeStep::Create(k, s)),
            Ordering::Greater => self.current.next().map(|(k, c)| MergeStep::Delete(k, c)),
            Ordering::Equal => {
                let (k, s) = self.source.next()?;
                let (_, c) = self.current.next()?;
                Some(MergeStep::Matched(k, s, c))
            }
        }
    }
}
