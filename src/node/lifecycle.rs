use std::fmt;

/// Process lifecycle, advanced only by [`super::NodeBuilder`] and [`super::Node`].
///
/// `Uninitialized -> StoreConnected -> Serving -> Draining -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    StoreConnected,
    Serving,
    Draining,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "Uninitialized",
            LifecycleState::StoreConnected => "StoreConnected",
            LifecycleState::Serving => "Serving",
            LifecycleState::Draining => "Draining",
            LifecycleState::Stopped => "Stopped",
        }
    }

    /// Whether `next` directly follows `self`. A node that fails to start
    /// serving may stop straight from `StoreConnected`.
    pub fn can_advance_to(
        &self,
        next: LifecycleState,
    ) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Uninitialized, StoreConnected)
                | (StoreConnected, Serving)
                | (StoreConnected, Stopped)
                | (Serving, Draining)
                | (Draining, Stopped)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleState::*;

    #[test]
    fn only_forward_single_steps_are_allowed() {
        let order = [Uninitialized, StoreConnected, Serving, Draining, Stopped];
        for (i, from) in order.iter().enumerate() {
            for (j, to) in order.iter().enumerate() {
                let expected = j == i + 1 || (*from == StoreConnected && *to == Stopped);
                assert_eq!(from.can_advance_to(*to), expected, "{from} -> {to}");
            }
        }
    }
}
