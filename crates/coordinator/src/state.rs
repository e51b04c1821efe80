/// Coordinator generation state. Transitions are monotone within a
/// single generation; only `Stop` returns to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Recovery,
    AcceptingManifest,
    AcceptingMarbles,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CoordinatorState::Uninitialized => "Uninitialized",
            CoordinatorState::Recovery => "Recovery",
            CoordinatorState::AcceptingManifest => "AcceptingManifest",
            CoordinatorState::AcceptingMarbles => "AcceptingMarbles",
        };
        write!(f, "{s}")
    }
}
