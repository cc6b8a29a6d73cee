use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::models::User;

#[derive(Debug, PartialEq)]
pub enum AssigneeMatch<'a> {
    Exact(&'a User),
    /// Closest fuzzy candidate; the caller should confirm it.
    Suggested(&'a User),
    NotFound,
}

/// Find the user meant by `input`: an id, an exact username (any case),
/// or failing that the best fuzzy match on username and email.
pub fn resolve<'a>(users: &'a [User], input: &str) -> AssigneeMatch<'a> {
    let input = input.trim();
    if input.is_empty() {
        return AssigneeMatch::NotFound;
    }

    if let Ok(id) = input.parse::<i64>() {
        if let Some(user) = users.iter().find(|u| u.id == id) {
            return AssigneeMatch::Exact(user);
        }
    }

    if let Some(user) = users
        .iter()
        .find(|u| u.username.eq_ignore_ascii_case(input))
    {
        return AssigneeMatch::Exact(user);
    }

    let matcher = SkimMatcherV2::default();
    let mut best_match: Option<(i64, &User)> = None;

    for user in users {
        let search_text = format!("{} {}", user.username, user.email);
        if let Some(score) = matcher.fuzzy_match(&search_text, input) {
            if best_match.map_or(true, |(best, _)| score > best) {
                best_match = Some((score, user));
            }
        }
    }

    match best_match {
        Some((_score, user)) => AssigneeMatch::Suggested(user),
        None => AssigneeMatch::NotFound,
    }
}
