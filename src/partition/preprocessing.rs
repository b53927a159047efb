//! Grouping preprocessing (spec §4.C.3): three passes over the initial
//! modalities, each producing an `old -> new` index vector, composed into a
//! single final mapping before the merge-based construction ever runs.
//!
//! Grounded on `KWGrouper.cpp`. Pure-value merging and reliable-subgroup
//! construction have no positional analogue there (the original only folds
//! a contiguous, frequency-sorted tail) -- those two passes are built from
//! the textual description directly. Small-group folding follows
//! `ComputeTableReducedLineNumber`/`BuildReducedTable`'s bucket-counting
//! shape: find the smallest frequency threshold that folds the table down
//! to the target line count, then fold everything at or below it into one
//! aggregation bucket per target class (or a single bucket when
//! `one_single_garbage_group` is set), generalizing the original's
//! single contiguous last-row bucket to the spec's per-class buckets.

use std::collections::BTreeMap;

use crate::cost::grouping::GroupingCost;
use crate::cost::Cost;
use crate::frequency::{FrequencyTable, FrequencyVector};
use crate::interrupt::InterruptionToken;
use crate::partition::subgroup::two_class_subgroup;
use crate::Frequency;

/// The composed result of all three preprocessing passes.
#[derive(Debug, Clone)]
pub struct PreprocessingOutcome {
    pub table: FrequencyTable,
    /// original modality index -> final preprocessed group index
    pub group_assignment: Vec<usize>,
}

fn dense_counts(vector: &FrequencyVector) -> &[Frequency] {
    vector.counts().expect("grouping preprocessing applies to dense vectors only")
}

/// which class, if any, holds every instance of this vector. `None` for an
/// empty or genuinely mixed vector.
fn pure_class(vector: &FrequencyVector) -> Option<usize> {
    let counts = dense_counts(vector);
    let mut found = None;
    for (class, &count) in counts.iter().enumerate() {
        if count > 0 {
            if found.is_some() {
                return None;
            }
            found = Some(class);
        }
    }
    found
}

/// dominant (argmax) target class of a vector; ties broken by lowest index.
fn dominant_class(vector: &FrequencyVector) -> usize {
    let counts = dense_counts(vector);
    counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, &c)| c)
        .map(|(class, _)| class)
        .unwrap_or(0)
}

/// Pass 1 (§4.C.3 item 1): every modality whose target counts sit entirely
/// in one class is merged with the other pure modalities of that class,
/// one aggregated vector per class. Mixed modalities pass through
/// unchanged, keeping their relative order; pure buckets are appended after
/// them in class-index order.
fn merge_pure_values(source: &FrequencyTable) -> (FrequencyTable, Vec<usize>) {
    let class_value_number = source.vector_size();
    let mut mixed_indices = Vec::new();
    let mut pure_buckets: Vec<Option<FrequencyVector>> = vec![None; class_value_number];
    let mut row_kind = vec![None; source.vector_count()];

    for (i, vector) in source.vectors().iter().enumerate() {
        match pure_class(vector) {
            Some(class) => {
                row_kind[i] = Some(class);
                match &mut pure_buckets[class] {
                    Some(existing) => existing.absorb(vector),
                    slot @ None => *slot = Some(vector.clone()),
                }
            }
            None => {
                mixed_indices.push(i);
            }
        }
    }

    let mut new_index_of_mixed = vec![None; source.vector_count()];
    for (new_index, &old_index) in mixed_indices.iter().enumerate() {
        new_index_of_mixed[old_index] = Some(new_index);
    }
    let mut new_index_of_class = vec![None; class_value_number];
    let mut next_index = mixed_indices.len();
    for (class, bucket) in pure_buckets.iter().enumerate() {
        if bucket.is_some() {
            new_index_of_class[class] = Some(next_index);
            next_index += 1;
        }
    }

    let mut vectors: Vec<FrequencyVector> = mixed_indices.iter().map(|&i| source.get_vector(i).clone()).collect();
    for bucket in pure_buckets.into_iter().flatten() {
        vectors.push(bucket);
    }

    let group_assignment = (0..source.vector_count())
        .map(|i| match row_kind[i] {
            Some(class) => new_index_of_class[class].expect("pure bucket for a seen class always exists"),
            None => new_index_of_mixed[i].expect("every mixed row gets a new index"),
        })
        .collect();

    (FrequencyTable::new(vectors), group_assignment)
}

/// base-16 encodes `ranks`, each field zero-padded to the minimum width that
/// fits `subgroup_count - 1` in hex, so distinct rank tuples never collide
/// and the key stays as short as the per-run subgroup counts allow.
fn encode_key(ranks: &[usize], subgroup_counts: &[usize]) -> String {
    let mut key = String::new();
    for (&rank, &count) in ranks.iter().zip(subgroup_counts.iter()) {
        let width = if count <= 1 {
            1
        } else {
            ((count - 1).max(1).ilog2() / 4 + 1) as usize
        };
        key.push_str(&format!("{rank:0width$x}"));
    }
    key
}

/// Pass 2 (§4.C.3 item 2): run a 2-class subgrouper once per target class,
/// one-vs-rest. A reliable subgroup is the equivalence class of modalities
/// that land in the same subgroup in *every* one-vs-rest run.
fn build_reliable_subgroups(
    source: &FrequencyTable,
    total_instance_number: usize,
    interrupt: &dyn InterruptionToken,
) -> (FrequencyTable, Vec<usize>) {
    let class_value_number = source.vector_size();
    let row_count = source.vector_count();
    if row_count <= 1 || class_value_number <= 1 {
        return (source.clone(), (0..row_count).collect());
    }

    let mut per_class_ranks: Vec<Vec<usize>> = Vec::with_capacity(class_value_number);
    let mut per_class_counts: Vec<usize> = Vec::with_capacity(class_value_number);

    for class in 0..class_value_number {
        let synthetic_vectors = source
            .vectors()
            .iter()
            .map(|v| {
                let counts = dense_counts(v);
                let in_class = counts[class];
                let rest: Frequency = counts.iter().sum::<Frequency>() - in_class;
                FrequencyVector::dense(vec![rest, in_class], 1)
            })
            .collect();
        let synthetic_table = FrequencyTable::new(synthetic_vectors);

        // only part costs matter here (§4.C.4): wrap in the null-cost decorator.
        let evaluator = Cost::Null(Box::new(Cost::Grouping(
            GroupingCost::new(row_count, 2, 0.0, 0, total_instance_number.max(2))
                .expect("row_count and total_instance_number are always valid here"),
        )));
        let outcome = two_class_subgroup(&synthetic_table, &evaluator, interrupt);
        let subgroup_count = outcome.group_assignment.iter().copied().max().map_or(0, |m| m + 1);
        per_class_ranks.push(outcome.group_assignment);
        per_class_counts.push(subgroup_count);

        if interrupt.is_requested() {
            break;
        }
    }

    let mut class_index = BTreeMap::new();
    let mut keys = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let ranks: Vec<usize> = per_class_ranks.iter().map(|ranks| ranks[row]).collect();
        keys.push(encode_key(&ranks, &per_class_counts));
    }
    for key in &keys {
        let next = class_index.len();
        class_index.entry(key.clone()).or_insert(next);
    }

    let group_assignment: Vec<usize> = keys.iter().map(|key| class_index[key]).collect();
    let mut vectors: Vec<Option<FrequencyVector>> = vec![None; class_index.len()];
    for (row, &group) in group_assignment.iter().enumerate() {
        match &mut vectors[group] {
            Some(existing) => existing.absorb(source.get_vector(row)),
            slot @ None => *slot = Some(source.get_vector(row).clone()),
        }
    }
    let vectors = vectors.into_iter().map(|v| v.expect("every group index is populated by some row")).collect();

    (FrequencyTable::new(vectors), group_assignment)
}

/// the smallest `n` such that folding every group whose total frequency is
/// `<= n` leaves at most `max_output_group_number` groups (§4.C.3 item 3).
/// Bucket-counted over the distinct frequency values present.
fn fold_threshold(frequencies: &[Frequency], dominant_classes: &[usize], max_output_group_number: usize, one_single_garbage_group: bool) -> Frequency {
    let mut candidates: Vec<Frequency> = frequencies.to_vec();
    candidates.sort_unstable();
    candidates.dedup();

    for &threshold in &candidates {
        let above = frequencies.iter().filter(|&&f| f > threshold).count();
        let folded_classes: std::collections::BTreeSet<usize> = frequencies
            .iter()
            .zip(dominant_classes.iter())
            .filter(|&(&f, _)| f <= threshold)
            .map(|(_, &c)| c)
            .collect();
        let bucket_count = if folded_classes.is_empty() {
            0
        } else if one_single_garbage_group {
            1
        } else {
            folded_classes.len()
        };
        if above + bucket_count <= max_output_group_number {
            return threshold;
        }
    }
    candidates.last().copied().unwrap_or(0)
}

/// Pass 3 (§4.C.3 item 3): fold groups below the computed threshold into an
/// aggregation bucket per dominant target class, or a single bucket when
/// `one_single_garbage_group` is set.
fn merge_small_groups(
    source: &FrequencyTable,
    max_output_group_number: usize,
    one_single_garbage_group: bool,
) -> (FrequencyTable, Vec<usize>) {
    let row_count = source.vector_count();
    if row_count <= max_output_group_number.max(1) {
        return (source.clone(), (0..row_count).collect());
    }

    let frequencies: Vec<Frequency> = source.vectors().iter().map(FrequencyVector::total).collect();
    let dominant_classes: Vec<usize> = source.vectors().iter().map(dominant_class).collect();
    let threshold = fold_threshold(&frequencies, &dominant_classes, max_output_group_number, one_single_garbage_group);

    let mut kept_indices = Vec::new();
    let mut new_index_of_kept = vec![None; row_count];
    for (i, &f) in frequencies.iter().enumerate() {
        if f > threshold {
            new_index_of_kept[i] = Some(kept_indices.len());
            kept_indices.push(i);
        }
    }

    let mut new_index_of_class: BTreeMap<usize, usize> = BTreeMap::new();
    let mut buckets: Vec<FrequencyVector> = Vec::new();
    let mut single_bucket_slot: Option<usize> = None;

    let mut group_assignment = vec![0usize; row_count];
    for i in 0..row_count {
        if let Some(kept) = new_index_of_kept[i] {
            group_assignment[i] = kept;
            continue;
        }

        let slot = if one_single_garbage_group {
            *single_bucket_slot.get_or_insert_with(|| {
                buckets.push(source.get_vector(i).clone());
                buckets.len() - 1
            })
        } else {
            let class = dominant_classes[i];
            match new_index_of_class.get(&class) {
                Some(&slot) => slot,
                None => {
                    buckets.push(source.get_vector(i).clone());
                    let slot = buckets.len() - 1;
                    new_index_of_class.insert(class, slot);
                    slot
                }
            }
        };
        group_assignment[i] = kept_indices.len() + slot;
    }
    // second pass: the loop above only seeds each bucket with its first
    // member (to know its slot); now absorb every other folded row.
    let mut seeded = vec![false; buckets.len()];
    for i in 0..row_count {
        if new_index_of_kept[i].is_some() {
            continue;
        }
        let slot = group_assignment[i] - kept_indices.len();
        if !seeded[slot] {
            seeded[slot] = true;
            continue;
        }
        buckets[slot].absorb(source.get_vector(i));
    }

    let mut vectors: Vec<FrequencyVector> = kept_indices.iter().map(|&i| source.get_vector(i).clone()).collect();
    vectors.extend(buckets);

    (FrequencyTable::new(vectors), group_assignment)
}

/// Runs all three preprocessing passes in order and composes their
/// `old -> new` index vectors into one final mapping (§4.C.3).
pub fn preprocess(
    source: &FrequencyTable,
    total_instance_number: usize,
    output_max_group_number: usize,
    one_single_garbage_group: bool,
    interrupt: &dyn InterruptionToken,
) -> PreprocessingOutcome {
    log::debug!("preprocessing: pure-value merge, {} source rows", source.vector_count());
    let (table1, map1) = merge_pure_values(source);
    log::debug!("preprocessing: reliable-subgroup construction, {} rows after pure-value merge", table1.vector_count());
    let (table2, map2) = build_reliable_subgroups(&table1, total_instance_number, interrupt);
    log::debug!("preprocessing: small-group folding, {} reliable subgroups", table2.vector_count());
    let (table3, map3) = merge_small_groups(&table2, output_max_group_number, one_single_garbage_group);

    let group_assignment = map1.iter().map(|&m1| map3[map2[m1]]).collect();
    PreprocessingOutcome {
        table: table3,
        group_assignment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(counts: &[i32]) -> FrequencyVector {
        FrequencyVector::dense(counts.to_vec(), 1)
    }

    #[test]
    fn merge_pure_values_aggregates_by_class() {
        let table = FrequencyTable::new(vec![
            dense(&[5, 0]), // pure class 0
            dense(&[3, 0]), // pure class 0
            dense(&[0, 4]), // pure class 1
            dense(&[2, 1]), // mixed
        ]);
        let (merged, assignment) = merge_pure_values(&table);
        assert_eq!(merged.vector_count(), 3); // one mixed row + 2 pure buckets
        assert_eq!(assignment[0], assignment[1]); // both pure-class-0 rows merge
        assert_ne!(assignment[0], assignment[2]);
        assert_eq!(merged.total(), table.total());
    }

    #[test]
    fn merge_pure_values_preserves_total_frequency() {
        let table = FrequencyTable::new(vec![dense(&[5, 0]), dense(&[0, 4]), dense(&[1, 1])]);
        let (merged, _) = merge_pure_values(&table);
        assert_eq!(merged.total(), table.total());
    }

    #[test]
    fn merge_small_groups_is_a_no_op_below_the_cap() {
        let table = FrequencyTable::new(vec![dense(&[5, 0]), dense(&[0, 4])]);
        let (folded, assignment) = merge_small_groups(&table, 5, false);
        assert_eq!(folded.vector_count(), 2);
        assert_eq!(assignment, vec![0, 1]);
    }

    #[test]
    fn merge_small_groups_folds_down_to_the_cap() {
        let table = FrequencyTable::new(vec![
            dense(&[100, 0]),
            dense(&[1, 0]),
            dense(&[1, 0]),
            dense(&[0, 1]),
            dense(&[0, 1]),
        ]);
        let (folded, assignment) = merge_small_groups(&table, 2, true);
        assert!(folded.vector_count() <= 2);
        assert_eq!(folded.total(), table.total());
        let max_group = assignment.iter().copied().max().unwrap();
        assert!(max_group < folded.vector_count());
    }

    #[test]
    fn preprocess_composes_mappings_and_preserves_total_frequency() {
        let table = FrequencyTable::new(vec![
            dense(&[10, 0]),
            dense(&[9, 0]),
            dense(&[0, 10]),
            dense(&[0, 9]),
            dense(&[1, 1]),
        ]);
        let outcome = preprocess(&table, 100, 10, false, &crate::interrupt::NeverInterrupted);
        assert_eq!(outcome.group_assignment.len(), 5);
        assert_eq!(outcome.table.total(), table.total());
        let max_group = outcome.group_assignment.iter().copied().max().unwrap();
        assert!(max_group < outcome.table.vector_count());
    }
}
