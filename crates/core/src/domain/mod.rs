//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod menu;
pub mod params;
pub mod routing;
pub mod stimulus;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    AudioEnumerator, AudioError, DeviceId, DeviceInfo, PlaybackBackend, PlaybackHandle,
    PlaybackOutcome, PlaybackRequest,
};
pub use config::{
    AppConfig, CalibrateConfig, ConfigError, ConfigManager, DeviceConfig, FrontEnd, NoiseConfig,
};
pub use menu::{
    Action, KeyInput, MenuEffect, MenuEntry, MenuOption, MenuState, QuitDialog, Screen,
};
pub use params::{
    EditOutcome, EditStatus, NumericKind, ParamError, ParamGroup, ParamId, ParamSpec,
    ParamValue, ParameterStore,
};
pub use routing::{playback_pair, ChannelRouting, PlaybackControl, PlaybackFeed};
pub use stimulus::{
    synthesize_noise, synthesize_tone, DeviceSettings, NoiseSettings, Stimulus, StimulusKind,
    SynthesisError, ToneSettings,
};
