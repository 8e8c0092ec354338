pub mod domain;
pub mod ports;

pub use domain::{
    HistoryRecord, ImageKind, ImageRef, Phase, PhaseKind, PhotoId, PhotoRecord, Position,
    PromptTemplate, Settings, SettingsPatch,
};
pub use ports::{
    BlobStore, GeneratedImage, GenerationRequest, ImageFetchService, ImageGenerationService,
    KeyValueStore, PortError, PortResult,
};
