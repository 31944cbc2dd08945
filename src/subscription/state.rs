// Subscription state exposed to consumers.
// Snapshot of data, error and loading flag, plus the controller's phase.

/// Lifecycle phase of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    /// Data is current; no refresh in flight.
    ServingFresh,
    /// Cached data is shown while a background refresh runs.
    ServingStale,
    Error,
    /// The consumer deactivated; no further updates.
    TornDown,
}

impl Phase {
    pub fn display(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Loading => "Loading",
            Phase::ServingFresh => "Fresh",
            Phase::ServingStale => "Refreshing",
            Phase::Error => "Error",
            Phase::TornDown => "Torn down",
        }
    }
}

/// What a consumer sees.
#[derive(Debug, Clone)]
pub struct SubscriptionState<T> {
    /// Latest filtered payload, if any.
    pub data: Option<T>,
    /// Latest fetch or filter failure message.
    pub error: Option<String>,
    pub is_loading: bool,
    pub phase: Phase,
}

impl<T> Default for SubscriptionState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            phase: Phase::Idle,
        }
    }
}

impl<T> SubscriptionState<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Whether a background refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(self.phase, Phase::ServingStale)
    }

    pub fn is_torn_down(&self) -> bool {
        matches!(self.phase, Phase::TornDown)
    }

    pub(crate) fn begin_loading(&mut self) {
        self.is_loading = true;
        self.error = None;
        self.phase = Phase::Loading;
    }

    pub(crate) fn serve(&mut self, data: T, phase: Phase) {
        self.data = Some(data);
        self.error = None;
        self.is_loading = false;
        self.phase = phase;
    }

    /// Record a failure. Existing data is kept.
    pub(crate) fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.is_loading = false;
        self.phase = Phase::Error;
    }
}
