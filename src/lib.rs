//! SoundFont 2 and 3 parsing, and resolution of notes into synthesis voices.
//!
//! ```no_run
//! use soundfont_voices::{ControllerState, SoundFont};
//!
//! let data = std::fs::read("piano.sf2").unwrap();
//! let sf = SoundFont::from_bytes(&data).unwrap();
//! if let Some(voice) = sf.get_voice(0, 0, 60, 100) {
//!     let params = voice.get_all_params(&ControllerState::for_note(60, 100));
//!     println!("{} at rate {}", params.sample_name, params.playback_rate);
//! }
//! ```

pub mod chunk;
pub mod error;
pub mod generator;
pub mod modulator;
pub mod parser;
pub mod records;
pub mod soundfont;
pub mod stream;
pub mod voice;

#[cfg(test)]
mod fixture;

pub use error::{ParseError, Result};
pub use generator::{BoundedValue, GeneratorSet, GeneratorType, GeneratorValue};
pub use modulator::{ControllerState, Modulator, ModulatorSource};
pub use parser::{parse, parse_with_options, ParseOptions, ParseResult, SampleEncoding};
pub use records::{Info, RangeValue, SampleHeader};
pub use soundfont::{SoundFont, Zone};
pub use voice::{Voice, VoiceParams};
