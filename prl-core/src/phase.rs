/// Stages of one participant session
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Setup,
    Rating,
    Learning,
    Debrief,
}
