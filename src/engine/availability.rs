use std::collections::BTreeMap;

use crate::model::*;

// ── Booked periods ────────────────────────────────────────────────

/// Group every rental's booked period by house.
///
/// One pass over `rentals`; each house's list keeps scan order and is neither
/// sorted nor merged. Houses without rentals do not appear.
pub fn booked_periods_by_house<'a>(
    rentals: impl IntoIterator<Item = &'a Rental>,
) -> BTreeMap<Id, Vec<Period>> {
    let mut by_house: BTreeMap<Id, Vec<Period>> = BTreeMap::new();
    for rental in rentals {
        by_house.entry(rental.house_id).or_default().push(rental.period());
    }
    by_house
}

// ── Free periods ──────────────────────────────────────────────────

/// Free nights of `window` once every `occupied` span is taken out.
pub fn free_spans(window: &Span, occupied: &[Span]) -> Vec<Span> {
    let mut taken: Vec<Span> = occupied
        .iter()
        .filter(|s| s.overlaps(window))
        .copied()
        .collect();
    taken.sort_by_key(|s| s.start);
    let taken = merge_overlapping(&taken);
    subtract_intervals(&[*window], &taken)
}

/// Merge sorted overlapping/adjacent spans into disjoint spans.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`; both sorted by start, `to_remove` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
