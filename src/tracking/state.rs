//! Tracking mode and per-target stabilization phase.

/// How detected poses are turned into anchor updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    /// Follow the target continuously with exponential pose smoothing.
    #[default]
    Dynamic,
    /// Accumulate consistent poses, then lock the anchor in place.
    Static,
}

/// Static-mode lifecycle of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetPhase {
    /// Collecting mutually consistent poses; the anchor stays hidden.
    #[default]
    Accumulating,
    /// Enough consistent poses were seen; the anchor pose is frozen.
    Stabilized,
}
