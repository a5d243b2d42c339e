//! Global ordering of per-repository streams.

use histweave_model::event::Event;
use histweave_model::repo::RepoSpec;

/// Merge per-repository sequences into one globally ordered sequence.
///
/// Events are ordered by their serialized `timestamp|author|kind|path`
/// text, not by a structured comparison. Timestamps sort correctly only
/// while they share a digit width; downstream consumers depend on this
/// exact order. The sort is stable.
///
/// With `fake_initial_commit`, a root marker for every configured
/// repository is placed first, in configuration order, at the timestamp of
/// the first merged event. An empty merge yields nothing at all.
pub fn merge_streams(
    streams: Vec<Vec<Event>>,
    repos: &[RepoSpec],
    fake_initial_commit: bool,
) -> Vec<Event> {
    let mut keyed: Vec<(String, Event)> = streams
        .into_iter()
        .flatten()
        .map(|event| (event.to_line(), event))
        .collect();

    if keyed.is_empty() {
        return Vec::new();
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut merged = Vec::with_capacity(keyed.len() + repos.len());
    if fake_initial_commit {
        let first_timestamp = keyed[0].1.timestamp;
        merged.extend(
            repos
                .iter()
                .map(|repo| Event::root_marker(first_timestamp, &repo.label)),
        );
    }
    merged.extend(keyed.into_iter().map(|(_, event)| event));
    merged
}
