//! Commit count table.

use histweave_model::repo::RepoStats;

/// Print the table to stderr, keeping stdout free for the event stream.
pub fn print_table(stats: &[RepoStats]) {
    eprint!("{}", render_table(stats));
}

/// One row per repository plus a `TOTAL` row.
pub fn render_table(stats: &[RepoStats]) -> String {
    let mut rows: Vec<(String, String)> = stats
        .iter()
        .map(|s| (s.repo.label.clone(), s.commit_count.to_string()))
        .collect();
    rows.push(("TOTAL".to_string(), RepoStats::total(stats).to_string()));

    let label_width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0)
        .max("label".len());
    let count_width = rows
        .iter()
        .map(|(_, count)| count.len())
        .max()
        .unwrap_or(0)
        .max("count".len());

    let rule = format!("{}-+-{}\n", "-".repeat(label_width), "-".repeat(count_width));
    let mut out = format!("{:<label_width$} | {:>count_width$}\n", "label", "count");
    out.push_str(&rule);
    let total_index = rows.len() - 1;
    for (index, (label, count)) in rows.iter().enumerate() {
        if index == total_index {
            out.push_str(&rule);
        }
        out.push_str(&format!("{label:<label_width$} | {count:>count_width$}\n"));
    }
    out
}
