//! Load states per direction and their combined aggregate.

use std::sync::Arc;

/// Direction of a load relative to the displayed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    /// Initial or replacement load of the whole list.
    Refresh,
    /// Load at the start of the list.
    Prepend,
    /// Load at the end of the list.
    Append,
}

/// State of a single load direction.
///
/// Valid transitions per direction are `Loading -> NotLoading` and
/// `Loading -> Error`; a direction never re-enters `Loading` from `Loading`,
/// and `Error` is terminal until an explicit retry re-triggers `Loading`.
#[derive(Clone)]
pub enum LoadState {
    /// A load is in flight.
    Loading,
    /// No load in flight.
    NotLoading {
        /// Whether pagination has reached its end in this direction.
        end_of_pagination_reached: bool,
    },
    /// The last load in this direction failed.
    ///
    /// The cause is shared; equality is by `Arc` identity, so two states
    /// compare equal only when they carry the same failure instance.
    Error(Arc<anyhow::Error>),
}

impl LoadState {
    /// `NotLoading` with `end_of_pagination_reached = false`.
    pub const fn not_loading() -> Self {
        Self::NotLoading {
            end_of_pagination_reached: false,
        }
    }

    /// `NotLoading` with `end_of_pagination_reached = true`.
    pub const fn complete() -> Self {
        Self::NotLoading {
            end_of_pagination_reached: true,
        }
    }

    /// Whether this state is an error.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        !(matches!(self, Self::Loading) && matches!(next, Self::Loading))
    }
}

impl PartialEq for LoadState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Loading, Self::Loading) => true,
            (
                Self::NotLoading {
                    end_of_pagination_reached: a,
                },
                Self::NotLoading {
                    end_of_pagination_reached: b,
                },
            ) => a == b,
            (Self::Error(a), Self::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for LoadState {}

impl std::fmt::Debug for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading"),
            Self::NotLoading {
                end_of_pagination_reached,
            } => write!(f, "NotLoading(end_of_pagination_reached={end_of_pagination_reached})"),
            Self::Error(e) => write!(f, "Error({e})"),
        }
    }
}

/// One [`LoadState`] per [`LoadType`] for a single origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStates {
    /// State of the refresh direction.
    pub refresh: LoadState,
    /// State of the prepend direction.
    pub prepend: LoadState,
    /// State of the append direction.
    pub append: LoadState,
}

impl LoadStates {
    /// All three directions idle, pagination not exhausted.
    pub const fn idle() -> Self {
        Self {
            refresh: LoadState::not_loading(),
            prepend: LoadState::not_loading(),
            append: LoadState::not_loading(),
        }
    }

    /// Get the state of one direction.
    pub fn get(&self, load_type: LoadType) -> &LoadState {
        match load_type {
            LoadType::Refresh => &self.refresh,
            LoadType::Prepend => &self.prepend,
            LoadType::Append => &self.append,
        }
    }

    /// Replace the state of one direction.
    pub fn set(&mut self, load_type: LoadType, state: LoadState) {
        match load_type {
            LoadType::Refresh => self.refresh = state,
            LoadType::Prepend => self.prepend = state,
            LoadType::Append => self.append = state,
        }
    }

    /// First error among the three directions, if any.
    pub fn error(&self) -> Option<&Arc<anyhow::Error>> {
        [&self.refresh, &self.prepend, &self.append]
            .into_iter()
            .find_map(|s| match s {
                LoadState::Error(e) => Some(e),
                _ => None,
            })
    }

    /// Whether all three directions are `NotLoading`.
    pub fn is_idle(&self) -> bool {
        [&self.refresh, &self.prepend, &self.append]
            .into_iter()
            .all(|s| matches!(s, LoadState::NotLoading { .. }))
    }
}

impl Default for LoadStates {
    fn default() -> Self {
        Self::idle()
    }
}

/// Snapshot-in-time aggregate of load states across origins.
///
/// `source` reflects the local paging source; `mediator` is present only
/// when a remote mediator participates. Compared structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedLoadStates {
    /// States reported by the local source.
    pub source: LoadStates,
    /// States reported by the remote mediator, when one is installed.
    pub mediator: Option<LoadStates>,
}

impl CombinedLoadStates {
    /// Combined states from a local source only.
    pub const fn from_source(source: LoadStates) -> Self {
        Self {
            source,
            mediator: None,
        }
    }

    /// Effective state of one direction, preferring the mediator when it is
    /// loading or failed.
    pub fn get(&self, load_type: LoadType) -> &LoadState {
        if let Some(mediator) = &self.mediator {
            let m = mediator.get(load_type);
            if !matches!(m, LoadState::NotLoading { .. }) {
                return m;
            }
        }
        self.source.get(load_type)
    }

    /// Effective refresh state.
    pub fn refresh(&self) -> &LoadState {
        self.get(LoadType::Refresh)
    }

    /// Effective prepend state.
    pub fn prepend(&self) -> &LoadState {
        self.get(LoadType::Prepend)
    }

    /// Effective append state.
    pub fn append(&self) -> &LoadState {
        self.get(LoadType::Append)
    }

    /// Whether every direction of every origin is `NotLoading`.
    ///
    /// The aggregate is idle only when refresh, prepend and append are all
    /// `NotLoading`; an error or in-flight load in any single direction
    /// makes the whole aggregate non-idle.
    pub fn is_idle(&self) -> bool {
        self.source.is_idle() && self.mediator.as_ref().map_or(true, LoadStates::is_idle)
    }

    /// First error in any direction of any origin.
    ///
    /// Errors surface immediately and independently of other directions.
    pub fn error(&self) -> Option<&Arc<anyhow::Error>> {
        self.source
            .error()
            .or_else(|| self.mediator.as_ref().and_then(LoadStates::error))
    }
}

impl Default for CombinedLoadStates {
    fn default() -> Self {
        Self::from_source(LoadStates::idle())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_equality_is_by_instance() {
        let cause = Arc::new(anyhow::anyhow!("boom"));
        let a = LoadState::Error(Arc::clone(&cause));
        let b = LoadState::Error(cause);
        let c = LoadState::Error(Arc::new(anyhow::anyhow!("boom")));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn loading_to_loading_is_illegal() {
        assert!(!LoadState::Loading.can_transition_to(&LoadState::Loading));
        assert!(LoadState::Loading.can_transition_to(&LoadState::not_loading()));
        assert!(LoadState::Loading.can_transition_to(&LoadState::Error(Arc::new(
            anyhow::anyhow!("boom")
        ))));
    }

    #[test]
    fn combined_is_idle_only_when_all_directions_idle() {
        let mut states = LoadStates::idle();
        assert!(CombinedLoadStates::from_source(states.clone()).is_idle());

        states.set(LoadType::Append, LoadState::Loading);
        assert!(!CombinedLoadStates::from_source(states).is_idle());
    }

    #[test]
    fn error_surfaces_from_any_direction() {
        let cause = Arc::new(anyhow::anyhow!("prepend failed"));
        let mut states = LoadStates::idle();
        states.set(LoadType::Prepend, LoadState::Error(Arc::clone(&cause)));
        let combined = CombinedLoadStates::from_source(states);
        assert!(Arc::ptr_eq(combined.error().unwrap(), &cause));
        assert!(combined.prepend().is_error());
        assert!(!combined.append().is_error());
    }

    #[test]
    fn mediator_loading_overrides_source() {
        let mut mediator = LoadStates::idle();
        mediator.set(LoadType::Refresh, LoadState::Loading);
        let combined = CombinedLoadStates {
            source: LoadStates::idle(),
            mediator: Some(mediator),
        };
        assert_eq!(combined.refresh(), &LoadState::Loading);
    }
}
