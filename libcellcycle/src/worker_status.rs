/// The stage the processor is currently working through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Loading,
    Segmenting,
    Normalizing,
    Summarizing,
    Differentiating,
    Writing,
    Done,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::Segmenting => "Segmenting",
            Self::Normalizing => "Normalizing",
            Self::Summarizing => "Summarizing",
            Self::Differentiating => "dQ/dV",
            Self::Writing => "Writing",
            Self::Done => "Done",
        }
    }
}

/// Progress message sent from the processor to whoever drives it
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(progress: f32, stage: Stage) -> Self {
        Self { progress, stage }
    }
}
