//! Three-way merge over two sequences sorted ascending by basename — the
//! central algorithmic primitive used by the probe engine's glob-tree walk.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeItem<L, R> {
    OnlyInLeft(L),
    OnlyInRight(R),
    InBoth(L, R),
}

/// Merges two sequences sorted ascending by the `String` half of each
/// `(basename, value)` pair. Duplicate keys within a side are matched up
/// positionally against equal keys on the other side.
pub fn merge_sorted<L, R>(
    left: Vec<(String, L)>,
    right: Vec<(String, R)>,
) -> Vec<MergeItem<(String, L), (String, R)>> {
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    let mut out = Vec::new();

    loop {
        match (left.peek(), right.peek()) {
            (Some((lk, _)), Some((rk, _))) => match lk.cmp(rk) {
                std::cmp::Ordering::Less => out.push(MergeItem::OnlyInLeft(left.next().unwrap())),
                std::cmp::Ordering::Greater => {
                    out.push(MergeItem::OnlyInRight(right.next().unwrap()))
                }
                std::cmp::Ordering::Equal => {
                    let l = left.next().unwrap();
                    let r = right.next().unwrap();
                    out.push(MergeItem::InBoth(l, r));
                }
            },
            (Some(_), None) => out.push(MergeItem::OnlyInLeft(left.next().unwrap())),
            (None, Some(_)) => out.push(MergeItem::OnlyInRight(right.next().unwrap())),
            (None, None) => break,
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<(String, ())> {
        items.iter().map(|s| (s.to_string(), ())).collect()
    }

    #[test]
    fn merges_disjoint_and_shared_keys() {
        let left = names(&["a", "b", "d"]);
        let right = names(&["b", "c", "d"]);

        let merged = merge_sorted(left, right);

        let shapes: Vec<&str> = merged
            .iter()
            .map(|item| match item {
                MergeItem::OnlyInLeft(_) => "L",
                MergeItem::OnlyInRight(_) => "R",
                MergeItem::InBoth(_, _) => "B",
            })
            .collect();

        assert_eq!(shapes, vec!["L", "B", "R", "B"]);
    }

    #[test]
    fn empty_sides_are_all_one_direction() {
        let left = names(&["a", "b"]);
        let right: Vec<(String, ())> = Vec::new();

        let merged = merge_sorted(left, right);
        assert!(matches!(merged[0], MergeItem::OnlyInLeft(_)));
        assert!(matches!(merged[1], MergeItem::OnlyInLeft(_)));
    }
}
