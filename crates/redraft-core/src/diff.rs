//! Line-based unified diff between two draft texts.
//!
//! Lines are aligned with a Longest Common Subsequence table, then grouped
//! into hunks with a fixed number of context lines. Output uses the familiar
//! `---`/`+++` header and `@@ -l,n +l,n @@` hunk ranges. Lines carry no
//! trailing newline.

/// Context lines shown around each change.
pub const DEFAULT_CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize),
    Delete(usize),
    Insert(usize),
}

impl Op {
    fn is_change(&self) -> bool {
        !matches!(self, Op::Equal(_))
    }
}

/// Compute a unified diff of `a` against `b`.
///
/// Returns an empty vector when the texts have identical lines.
pub fn unified_diff(
    a: &str,
    b: &str,
    from_label: &str,
    to_label: &str,
    context: usize,
) -> Vec<String> {
    let lines_a: Vec<&str> = a.lines().collect();
    let lines_b: Vec<&str> = b.lines().collect();
    let ops = edit_script(&lines_a, &lines_b);

    let hunks = group_hunks(&ops, context);
    if hunks.is_empty() {
        return Vec::new();
    }

    // pos_a[k] / pos_b[k]: lines of a / b consumed before ops[k]
    let mut pos_a = Vec::with_capacity(ops.len() + 1);
    let mut pos_b = Vec::with_capacity(ops.len() + 1);
    let (mut ca, mut cb) = (0usize, 0usize);
    for op in &ops {
        pos_a.push(ca);
        pos_b.push(cb);
        match op {
            Op::Equal(_) => {
                ca += 1;
                cb += 1;
            }
            Op::Delete(_) => ca += 1,
            Op::Insert(_) => cb += 1,
        }
    }
    pos_a.push(ca);
    pos_b.push(cb);

    let mut out = vec![format!("--- {from_label}"), format!("+++ {to_label}")];
    for (start, end) in hunks {
        out.push(format!(
            "@@ -{} +{} @@",
            format_range(pos_a[start], pos_a[end] - pos_a[start]),
            format_range(pos_b[start], pos_b[end] - pos_b[start]),
        ));
        for op in &ops[start..end] {
            out.push(match *op {
                Op::Equal(i) => format!(" {}", lines_a[i]),
                Op::Delete(i) => format!("-{}", lines_a[i]),
                Op::Insert(j) => format!("+{}", lines_b[j]),
            });
        }
    }
    out
}

/// `start,len` with 1-based start; a single line omits the length and an
/// empty range points at the line before it.
fn format_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, len),
    }
}

/// Half-open op ranges of each hunk. Changes separated by at most
/// `2 * context` unchanged lines share a hunk.
fn group_hunks(ops: &[Op], context: usize) -> Vec<(usize, usize)> {
    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.is_change())
        .map(|(k, _)| k)
        .collect();
    let Some(&first) = changes.first() else {
        return Vec::new();
    };

    let mut hunks = Vec::new();
    let mut group_first = first;
    let mut group_last = first;
    for &k in &changes[1..] {
        if k - group_last - 1 > 2 * context {
            hunks.push((
                group_first.saturating_sub(context),
                (group_last + context + 1).min(ops.len()),
            ));
            group_first = k;
        }
        group_last = k;
    }
    hunks.push((
        group_first.saturating_sub(context),
        (group_last + context + 1).min(ops.len()),
    ));
    hunks
}

/// Edit script from `a` to `b`. Within a changed region deletions come
/// before insertions.
fn edit_script(a: &[&str], b: &[&str]) -> Vec<Op> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let mut ops: Vec<Op> = (0..prefix).map(Op::Equal).collect();

    let (mut i, mut j) = (0usize, 0usize);
    for (ma, mb) in lcs_alignment(mid_a, mid_b) {
        ops.extend((i..ma).map(|x| Op::Delete(prefix + x)));
        ops.extend((j..mb).map(|y| Op::Insert(prefix + y)));
        ops.push(Op::Equal(prefix + ma));
        i = ma + 1;
        j = mb + 1;
    }
    ops.extend((i..mid_a.len()).map(|x| Op::Delete(prefix + x)));
    ops.extend((j..mid_b.len()).map(|y| Op::Insert(prefix + y)));

    ops.extend((a.len() - suffix..a.len()).map(Op::Equal));
    ops
}

/// Matching `(index_a, index_b)` pairs of the longest common subsequence.
fn lcs_alignment(a: &[&str], b: &[&str]) -> Vec<(usize, usize)> {
    let m = a.len();
    let n = b.len();
    if m == 0 || n == 0 {
        return Vec::new();
    }

    // dp[i][j] = length of LCS of a[0..i] and b[0..j]
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            if a[i - 1] == b[j - 1] {
                dp[i][j] = dp[i - 1][j - 1] + 1;
            } else {
                dp[i][j] = dp[i][j - 1].max(dp[i - 1][j]);
            }
        }
    }

    let mut alignment = Vec::new();
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            alignment.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[i][j - 1] > dp[i - 1][j] {
            j -= 1;
        } else {
            i -= 1;
        }
    }
    alignment.reverse();
    alignment
}
