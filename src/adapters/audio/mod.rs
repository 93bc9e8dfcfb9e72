/// Audio source adapters
///
/// Linux capture via PulseAudio.
pub mod pulse;

pub use pulse::PulseAudioSource;
