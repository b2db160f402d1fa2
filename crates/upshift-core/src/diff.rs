//! Line-based unified diffs for dry-run reporting.
//!
//! Release targets are source files and changelogs, so inputs are short and
//! the quadratic matching step only ever sees the changed region (the common
//! prefix and suffix are trimmed first).

/// Number of unchanged context lines around each hunk.
const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Render a unified diff between two texts, without file headers.
///
/// Lines carry no trailing newline markers. Returns an empty string when the
/// texts are identical.
pub fn unified(old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }

    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let ops = diff_ops(&old_lines, &new_lines);

    // Collect op ranges worth showing: every change, padded with context.
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        if op.0 != Op::Equal {
            let start = index.saturating_sub(CONTEXT);
            let end = (index + CONTEXT + 1).min(ops.len());
            match ranges.last_mut() {
                Some(last) if start <= last.1 => last.1 = end,
                _ => ranges.push((start, end)),
            }
        }
    }

    let mut out = String::new();
    for &(start, end) in &ranges {
        // Line numbers for the hunk header: count lines consumed before it.
        let old_before = ops[..start]
            .iter()
            .filter(|(op, ..)| *op != Op::Insert)
            .count();
        let new_before = ops[..start]
            .iter()
            .filter(|(op, ..)| *op != Op::Delete)
            .count();
        let old_len = ops[start..end]
            .iter()
            .filter(|(op, ..)| *op != Op::Insert)
            .count();
        let new_len = ops[start..end]
            .iter()
            .filter(|(op, ..)| *op != Op::Delete)
            .count();

        out.push_str(&hunk_header(old_before, old_len, new_before, new_len));
        out.push('\n');

        for &(op, old_index, new_index) in &ops[start..end] {
            let (marker, line) = match op {
                Op::Equal => (' ', old_lines[old_index]),
                Op::Delete => ('-', old_lines[old_index]),
                Op::Insert => ('+', new_lines[new_index]),
            };
            out.push(marker);
            out.push_str(line);
            out.push('\n');
        }
    }

    // No trailing newline on the rendered diff.
    out.pop();
    out
}

fn hunk_header(old_before: usize, old_len: usize, new_before: usize, new_len: usize) -> String {
    let range = |before: usize, len: usize| {
        // Unified convention: a zero-length range names the line before it.
        let start = if len == 0 { before } else { before + 1 };
        if len == 1 {
            format!("{start}")
        } else {
            format!("{start},{len}")
        }
    };
    format!(
        "@@ -{} +{} @@",
        range(old_before, old_len),
        range(new_before, new_len)
    )
}

/// Produce the per-line edit script: `(op, old_index, new_index)` triples in
/// output order. Indexes are only meaningful for the sides an op consumes.
fn diff_ops(old: &[&str], new: &[&str]) -> Vec<(Op, usize, usize)> {
    // Trim the common prefix and suffix so the LCS table only covers the
    // changed region.
    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    for index in 0..prefix {
        ops.push((Op::Equal, index, index));
    }

    // Longest-common-subsequence table over the middle region.
    let (rows, cols) = (old_mid.len(), new_mid.len());
    let mut table = vec![0usize; (rows + 1) * (cols + 1)];
    for i in (0..rows).rev() {
        for j in (0..cols).rev() {
            table[i * (cols + 1) + j] = if old_mid[i] == new_mid[j] {
                table[(i + 1) * (cols + 1) + j + 1] + 1
            } else {
                table[(i + 1) * (cols + 1) + j].max(table[i * (cols + 1) + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < rows && j < cols {
        if old_mid[i] == new_mid[j] {
            ops.push((Op::Equal, prefix + i, prefix + j));
            i += 1;
            j += 1;
        } else if table[(i + 1) * (cols + 1) + j] >= table[i * (cols + 1) + j + 1] {
            ops.push((Op::Delete, prefix + i, 0));
            i += 1;
        } else {
            ops.push((Op::Insert, 0, prefix + j));
            j += 1;
        }
    }
    while i < rows {
        ops.push((Op::Delete, prefix + i, 0));
        i += 1;
    }
    while j < cols {
        ops.push((Op::Insert, 0, prefix + j));
        j += 1;
    }

    for index in 0..suffix {
        ops.push((
            Op::Equal,
            old.len() - suffix + index,
            new.len() - suffix + index,
        ));
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_produce_empty_diff() {
        assert_eq!(unified("a\nb\n", "a\nb\n"), "");
    }

    #[test]
    fn single_line_change() {
        let diff = unified("version = 1.2.3.dev\n", "version = 1.2.3\n");
        assert!(diff.contains("-version = 1.2.3.dev"));
        assert!(diff.contains("+version = 1.2.3"));
        assert!(diff.starts_with("@@"));
    }

    #[test]
    fn context_lines_surround_the_change() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\ni\n";
        let new = "a\nb\nc\nd\nX\nf\ng\nh\ni\n";
        let diff = unified(old, new);
        assert!(diff.contains(" b"));
        assert!(diff.contains("-e"));
        assert!(diff.contains("+X"));
        // First line "a" is beyond the 3-line context window.
        assert!(!diff.contains(" a"));
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let old: Vec<String> = (0..30).map(|n| format!("line {n}")).collect();
        let mut new = old.clone();
        new[2] = "changed 2".into();
        new[25] = "changed 25".into();
        let diff = unified(&old.join("\n"), &new.join("\n"));
        assert_eq!(diff.matches("@@").count(), 4); // two hunks, two markers each
    }

    #[test]
    fn pure_insertion() {
        let diff = unified("a\nc\n", "a\nb\nc\n");
        assert!(diff.contains("+b"));
        assert!(diff.lines().all(|line| !line.starts_with('-')));
    }

    #[test]
    fn no_trailing_newline() {
        let diff = unified("a\n", "b\n");
        assert!(!diff.ends_with('\n'));
    }
}
