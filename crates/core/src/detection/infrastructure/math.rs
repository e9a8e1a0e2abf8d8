//! Union-find helpers used to cluster raw cascade hits.

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Partition `items` into equivalence classes of the transitive closure of
/// `similar`.
///
/// Returns one label per item plus the class count. Labels are assigned in
/// order of each class's first member, so output is stable for a given
/// input order.
///
/// `before_row` runs ahead of each item's pairwise pass; an error from it
/// stops the quadratic scan early.
pub fn partition<T, E>(
    items: &[T],
    similar: impl Fn(&T, &T) -> bool,
    mut before_row: impl FnMut() -> Result<(), E>,
) -> Result<(Vec<usize>, usize), E> {
    let n = items.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        before_row()?;
        for j in (i + 1)..n {
            if similar(&items[i], &items[j]) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut root_label: Vec<Option<usize>> = vec![None; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let root = find(&mut parent, i);
        let label = *root_label[root].get_or_insert_with(|| {
            classes += 1;
            classes - 1
        });
        labels.push(label);
    }
    Ok((labels, classes))
}
