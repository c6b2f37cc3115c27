use std::collections::{BTreeMap, BTreeSet};

use crate::models::Event;

/// Which genres the all-events view is narrowed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenreSelection {
    /// No narrowing; events without genres are shown too.
    #[default]
    All,
    /// Only events sharing at least one of these exact labels.
    Only(BTreeSet<String>),
}

impl GenreSelection {
    pub fn none() -> Self {
        GenreSelection::Only(BTreeSet::new())
    }

    pub fn is_selected(&self, genre: &str) -> bool {
        match self {
            GenreSelection::All => true,
            GenreSelection::Only(genres) => genres.contains(genre),
        }
    }

    /// Whether an event with these effective genres passes.
    pub fn matches(&self, genres: &[String]) -> bool {
        match self {
            GenreSelection::All => true,
            GenreSelection::Only(selected) => genres.iter().any(|g| selected.contains(g)),
        }
    }

    /// Exactly these genres, repeats ignored. Naming every genre in
    /// `available` is the same as `All`.
    pub fn only<I, S>(genres: I, available: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selected: BTreeSet<String> = genres.into_iter().map(Into::into).collect();
        if !available.is_empty() && available.iter().all(|g| selected.contains(g)) {
            GenreSelection::All
        } else {
            GenreSelection::Only(selected)
        }
    }

    /// Flip one genre. Starting from `All` means starting from every genre in
    /// `available`; ending up with all of them selected goes back to `All`.
    pub fn toggle(&mut self, genre: &str, available: &[String]) {
        let mut next = match self {
            GenreSelection::All => available.iter().cloned().collect(),
            GenreSelection::Only(selected) => selected.clone(),
        };
        if !next.remove(genre) {
            next.insert(genre.to_string());
        }
        let covers_all = !available.is_empty() && available.iter().all(|g| next.contains(g));
        *self = if covers_all {
            GenreSelection::All
        } else {
            GenreSelection::Only(next)
        };
    }

    /// Drop every spelling of a genre that was just hidden.
    pub fn forget(&mut self, genre_key: &str) {
        if let GenreSelection::Only(selected) = self {
            selected.retain(|g| g.to_lowercase() != genre_key);
        }
    }
}

/// A genre and how many visible events carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreCount {
    pub genre: String,
    pub count: usize,
    pub selected: bool,
}

/// Count effective genres across `events`, sorted by label.
pub fn genre_counts<F>(events: &[&Event], selection: &GenreSelection, is_hidden: F) -> Vec<GenreCount>
where
    F: Fn(&str) -> bool,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for event in events {
        for genre in event.effective_genres(&is_hidden) {
            *counts.entry(genre).or_insert(0) += 1;
        }
    }
    let mut facets: Vec<GenreCount> = counts
        .into_iter()
        .map(|(genre, count)| GenreCount {
            selected: selection.is_selected(&genre),
            genre,
            count,
        })
        .collect();
    facets.sort_by(|a, b| {
        a.genre
            .to_lowercase()
            .cmp(&b.genre.to_lowercase())
            .then_with(|| a.genre.cmp(&b.genre))
    });
    facets
}

/// Keep the events the selection lets through. Under a narrowed selection,
/// events with no effective genres are dropped.
pub fn filter_by_genre<'e, F>(events: &[&'e Event], selection: &GenreSelection, is_hidden: F) -> Vec<&'e Event>
where
    F: Fn(&str) -> bool,
{
    if *selection == GenreSelection::All {
        return events.to_vec();
    }
    events
        .iter()
        .copied()
        .filter(|event| {
            let genres = event.effective_genres(&is_hidden);
            !genres.is_empty() && selection.matches(&genres)
        })
        .collect()
}
