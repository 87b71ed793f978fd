/// How transitions that span more than one layer boundary are issued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SplitPolicy {
    /// Every transition is a single barrier right before its target layer.
    Never,
    /// Begin halves are only issued at boundaries that already carry a batch.
    #[default]
    Batched,
    /// Any transition whose layers are two or more apart is split, beginning
    /// right after its source layer.
    Eager,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGraphConfig {
    /// With `false` a rebuild only computes layers, declared states are ignored.
    pub track_resource_states: bool,
    pub split_policy: SplitPolicy,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            track_resource_states: true,
            split_policy: SplitPolicy::default(),
        }
    }
}

impl FrameGraphConfig {
    pub fn with_state_tracking(mut self, enabled: bool) -> Self {
        self.track_resource_states = enabled;
        self
    }

    pub fn with_split_policy(mut self, policy: SplitPolicy) -> Self {
        self.split_policy = policy;
        self
    }
}
