use crate::models::Commit;

/// Case-insensitive substring match on author name or message. An empty query keeps everything.
pub fn filter_commits(commits: &[Commit], query: &str) -> Vec<Commit> {
    if query.is_empty() {
        return commits.to_vec();
    }

    let needle = query.to_lowercase();
    commits
        .iter()
        .filter(|commit| {
            commit.author.name.to_lowercase().contains(&needle)
                || commit.message.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Newest author date first. Stable, so equal dates keep API order.
pub fn sort_newest_first(commits: &mut [Commit]) {
    commits.sort_by(|a, b| b.author.date.cmp(&a.author.date));
}
