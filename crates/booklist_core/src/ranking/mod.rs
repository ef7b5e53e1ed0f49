//! Cross-list frequency ranking.
//!
//! Pure computation over member sets; storage access is injected by the
//! caller so the ordering rules can be tested without a database.
//!
//! # Invariants
//! - Frequency counts distinct member lists, so it lies in `1..=lists`.
//! - Order: frequency DESC, earliest source rank ASC, book id ASC.
//! - Ranks are `1..=n` with no gaps and no shared values.

use crate::model::book::BookId;
use crate::model::list::RankingEntry;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Counts, per book, how many of the given member sets contain it.
pub fn count_frequencies<'a>(
    member_sets: impl IntoIterator<Item = &'a BTreeSet<BookId>>,
) -> BTreeMap<BookId, u32> {
    let mut frequencies = BTreeMap::new();
    for members in member_sets {
        for book_id in members {
            *frequencies.entry(*book_id).or_insert(0) += 1;
        }
    }
    frequencies
}

/// Orders books by frequency and assigns strict 1-based ranks.
///
/// `earliest_source_rank` supplies the first tie-break; books it has no value
/// for sort after every book that has one.
pub fn rank_by_frequency<E>(
    frequencies: &BTreeMap<BookId, u32>,
    mut earliest_source_rank: impl FnMut(BookId) -> Result<Option<i64>, E>,
) -> Result<Vec<RankingEntry>, E> {
    let mut keyed = Vec::with_capacity(frequencies.len());
    for (&book_id, &frequency) in frequencies {
        let tie_break = earliest_source_rank(book_id)?.unwrap_or(i64::MAX);
        keyed.push((Reverse(frequency), tie_break, book_id));
    }
    keyed.sort_unstable();

    Ok(keyed
        .into_iter()
        .zip(1u32..)
        .map(|((Reverse(frequency), _, book_id), rank)| RankingEntry {
            book_id,
            frequency,
            rank,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{count_frequencies, rank_by_frequency};
    use std::collections::{BTreeSet, HashMap};
    use std::convert::Infallible;

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn frequency_counts_lists_not_occurrences() {
        let (a, b, c, d) = (1, 2, 3, 4);
        let lists = [set(&[a, b]), set(&[b, c]), set(&[b, c, d])];
        let frequencies = count_frequencies(&lists);

        assert_eq!(frequencies[&a], 1);
        assert_eq!(frequencies[&b], 3);
        assert_eq!(frequencies[&c], 2);
        assert_eq!(frequencies[&d], 1);
    }

    #[test]
    fn ties_break_on_earliest_rank_then_id() {
        let lists = [set(&[10, 20]), set(&[20, 30]), set(&[20, 30, 40])];
        let frequencies = count_frequencies(&lists);
        let earliest: HashMap<i64, i64> = [(10, 5), (20, 2), (30, 1), (40, 3)].into();

        let ranked = rank_by_frequency(&frequencies, |id| {
            Ok::<_, Infallible>(earliest.get(&id).copied())
        })
        .unwrap();

        let order: Vec<(i64, u32, u32)> = ranked
            .iter()
            .map(|entry| (entry.book_id, entry.frequency, entry.rank))
            .collect();
        assert_eq!(order, vec![(20, 3, 1), (30, 2, 2), (40, 1, 3), (10, 1, 4)]);
    }

    #[test]
    fn equal_earliest_rank_falls_back_to_book_id() {
        let lists = [set(&[7, 3, 9])];
        let frequencies = count_frequencies(&lists);

        let ranked =
            rank_by_frequency(&frequencies, |_| Ok::<_, Infallible>(Some(1))).unwrap();

        let ids: Vec<i64> = ranked.iter().map(|entry| entry.book_id).collect();
        assert_eq!(ids, vec![3, 7, 9]);
        let ranks: Vec<u32> = ranked.iter().map(|entry| entry.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn missing_tie_break_sorts_last() {
        let lists = [set(&[1, 2])];
        let frequencies = count_frequencies(&lists);

        let ranked = rank_by_frequency(&frequencies, |id| {
            Ok::<_, Infallible>(if id == 1 { None } else { Some(50) })
        })
        .unwrap();

        assert_eq!(ranked[0].book_id, 2);
        assert_eq!(ranked[1].book_id, 1);
    }

    #[test]
    fn no_member_sets_yields_empty_ranking() {
        let frequencies = count_frequencies(std::iter::empty::<&BTreeSet<i64>>());
        let ranked = rank_by_frequency(&frequencies, |_| Ok::<_, Infallible>(Some(1))).unwrap();
        assert!(ranked.is_empty());
    }
}
