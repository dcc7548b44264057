//! Tunables of the arena services.

/// Default advisory round length in seconds.
pub const DEFAULT_ROUND_TIMER_SECS: u32 = 20;

/// Default per-topic buffer of the local event bus.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Arena configuration.
///
/// # Example
///
/// ```
/// use duel_arena_runtime::ArenaConfig;
///
/// let config = ArenaConfig::default().with_round_timer_secs(30);
/// assert_eq!(config.round_timer_secs, 30);
/// assert!(config.auto_resolve);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// `timerSec` written to every new round
    pub round_timer_secs: u32,
    /// Resolve each round automatically once its timer elapses
    pub auto_resolve: bool,
    /// Buffered events per topic before slow subscribers start lagging
    pub bus_capacity: usize,
}

impl ArenaConfig {
    /// Defaults: 20 second rounds, automatic resolution on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            round_timer_secs: DEFAULT_ROUND_TIMER_SECS,
            auto_resolve: true,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }

    /// Set the round timer
    #[must_use]
    pub const fn with_round_timer_secs(mut self, secs: u32) -> Self {
        self.round_timer_secs = secs;
        self
    }

    /// Enable or disable automatic resolution
    #[must_use]
    pub const fn with_auto_resolve(mut self, enabled: bool) -> Self {
        self.auto_resolve = enabled;
        self
    }

    /// Set the per-topic bus capacity
    #[must_use]
    pub const fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
