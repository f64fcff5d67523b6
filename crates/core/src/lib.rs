pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, ConfigFile, ConfigManager, Settings};
pub use controller::{ActivePlaylistInfo, Controller};
pub use ddp::{chunk_frame, DdpPacket, DdpSender, DDP_HEADER_LEN, MAX_CHUNK_BYTES};
pub use effect::{
    sample_palette, validate_params, EffectConfig, EffectKind, Layer, Palette, ParamValue, Params,
};
pub use error::{EngineError, Result};
pub use frame::{apply_brightness, composite_layer, frame_buffer, BlendMode};
pub use health::FixtureHealth;
pub use playlist::{start_playlist, Playlist, PlaylistHandle, PlaylistItem};
pub use preset::Preset;
pub use schedule::{
    ramp_envelope, solar_times, ActiveRuleInfo, Holiday, HolidayDate, HolidayFilter, HolidayMode,
    Location, Nth, Rule, Schedule, ScheduleEngine, SequenceItem, SolarTimes, TimeSpec,
};
pub use session::{ActiveTargets, SessionCommand, SessionInfo, SessionSpec, SessionState, Supervisor};
pub use target::{resolve, resolved_length, spans_intersect, Span};

mod clock;
mod config;
mod controller;
mod ddp;
mod effect;
mod error;
mod frame;
mod health;
mod playlist;
mod preset;
mod schedule;
mod session;
mod store;
mod target;

pub use store::{CatalogStores, DocumentStore, Named};
