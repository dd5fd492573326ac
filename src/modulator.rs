use crate::generator::GeneratorType;
use crate::records::ModulatorList;
use log::warn;

/// Number of addressable controllers: `cc << 7 | index` spans 0..=255.
pub const CONTROLLER_COUNT: usize = 256;

const CURVE_SCALE: f64 = 40.0 / 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Linear,
    Concave,
    Convex,
    Switch,
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDirection {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePolarity {
    Unipolar,
    Bipolar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    NoController,
    NoteOnVelocity,
    NoteOnKeyNumber,
    PolyPressure,
    ChannelPressure,
    PitchWheel,
    PitchWheelSensitivity,
    Link,
    Reserved(u8),
    MidiCC(u8),
}

impl Controller {
    pub const NOTE_ON_VELOCITY: usize = 2;
    pub const NOTE_ON_KEY_NUMBER: usize = 3;
    pub const POLY_PRESSURE: usize = 10;
    pub const CHANNEL_PRESSURE: usize = 13;
    pub const PITCH_WHEEL: usize = 14;
    pub const PITCH_WHEEL_SENSITIVITY: usize = 16;
    pub const LINK: usize = 127;
}

/// A decoded modulator source operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModulatorSource {
    pub source_type: SourceType,
    pub polarity: SourcePolarity,
    pub direction: SourceDirection,
    pub cc: bool,
    pub index: u8,
}

impl ModulatorSource {
    /// Unpack the source bitfield: curve type in bits 10..=15, polarity in
    /// bit 9, direction in bit 8, the CC flag in bit 7 and the controller
    /// index in bits 0..=6.
    pub fn parse(v: u16) -> Self {
        let source_type = match (v >> 10) & 0x3f {
            0 => SourceType::Linear,
            1 => SourceType::Concave,
            2 => SourceType::Convex,
            3 => SourceType::Switch,
            x => SourceType::Unknown(x as u8),
        };
        let polarity = if (v & 0x200) == 0x200 {
            SourcePolarity::Bipolar
        } else {
            SourcePolarity::Unipolar
        };
        let direction = if (v & 0x100) == 0x100 {
            SourceDirection::Reverse
        } else {
            SourceDirection::Forward
        };
        ModulatorSource {
            source_type,
            polarity,
            direction,
            cc: (v & 0x80) == 0x80,
            index: (v & 0x7f) as u8,
        }
    }

    /// Lookup key into [`ControllerState`].
    pub fn controller_type(&self) -> usize {
        (usize::from(self.cc) << 7) | usize::from(self.index)
    }

    pub fn controller(&self) -> Controller {
        if self.cc {
            return Controller::MidiCC(self.index);
        }
        match self.index as usize {
            0 => Controller::NoController,
            Controller::NOTE_ON_VELOCITY => Controller::NoteOnVelocity,
            Controller::NOTE_ON_KEY_NUMBER => Controller::NoteOnKeyNumber,
            Controller::POLY_PRESSURE => Controller::PolyPressure,
            Controller::CHANNEL_PRESSURE => Controller::ChannelPressure,
            Controller::PITCH_WHEEL => Controller::PitchWheel,
            Controller::PITCH_WHEEL_SENSITIVITY => Controller::PitchWheelSensitivity,
            Controller::LINK => Controller::Link,
            x => Controller::Reserved(x as u8),
        }
    }

    /// The null source: no controller, nothing to read.
    pub fn is_none(&self) -> bool {
        self.controller_type() == 0
    }

    /// Map a normalized controller value in `[0, 1]` to the modulator's
    /// signal.
    ///
    /// The direction reverses the controller travel, the polarity rescales it
    /// to `[-1, 1]` when bipolar and the curve shapes the magnitude. Bipolar
    /// curves keep the sign. Values outside `[0, 1]` can produce NaN.
    pub fn map(&self, value: f64) -> f64 {
        let v = match self.direction {
            SourceDirection::Forward => value,
            SourceDirection::Reverse => 1.0 - value,
        };
        match self.polarity {
            SourcePolarity::Unipolar => self.curve(v),
            SourcePolarity::Bipolar => {
                let v = 2.0 * v - 1.0;
                match self.source_type {
                    SourceType::Switch => {
                        if v >= 0.0 {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                    _ => v.signum() * self.curve(v.abs()),
                }
            }
        }
    }

    fn curve(&self, x: f64) -> f64 {
        match self.source_type {
            SourceType::Linear => x,
            SourceType::Concave => (-CURVE_SCALE * (1.0 - x).log10()).clamp(0.0, 1.0),
            SourceType::Convex => (1.0 + CURVE_SCALE * x.log10()).clamp(0.0, 1.0),
            SourceType::Switch => {
                if x >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            SourceType::Unknown(t) => {
                warn!("Unknown modulator curve type {}, using linear", t);
                x
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Linear,
    AbsoluteValue,
}

impl Transform {
    pub fn from_code(v: u16) -> Self {
        match v {
            2 => Transform::AbsoluteValue,
            _ => Transform::Linear,
        }
    }
}

/// A decoded modulator, ready to be evaluated against controller values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulator {
    pub source: ModulatorSource,
    pub destination: u16,
    pub amount: f64,
    pub amount_source: ModulatorSource,
    pub transform: Transform,
}

impl Modulator {
    pub fn new(source: u16, destination: u16, amount: f64, amount_source: u16) -> Self {
        Modulator {
            source: ModulatorSource::parse(source),
            destination,
            amount,
            amount_source: ModulatorSource::parse(amount_source),
            transform: Transform::Linear,
        }
    }

    pub fn from_list(list: &ModulatorList) -> Self {
        Modulator {
            source: ModulatorSource::parse(list.source_oper),
            destination: list.destination_oper,
            amount: f64::from(list.value),
            amount_source: ModulatorSource::parse(list.amount_source_oper),
            transform: Transform::from_code(list.trans_oper),
        }
    }

    pub fn destination_type(&self) -> Option<GeneratorType> {
        GeneratorType::from_code(self.destination)
    }

    /// The amount this modulator adds to its destination generator. A null
    /// amount source scales by one.
    pub fn contribution(&self, state: &ControllerState) -> f64 {
        let primary = self.source.map(state.get(self.source.controller_type()));
        let secondary = if self.amount_source.is_none() {
            1.0
        } else {
            self.amount_source
                .map(state.get(self.amount_source.controller_type()))
        };
        let v = self.amount * primary * secondary;
        match self.transform {
            Transform::Linear => v,
            Transform::AbsoluteValue => v.abs(),
        }
    }
}

/// The modulators every voice carries ahead of the preset and instrument
/// ones.
pub fn default_modulators() -> Vec<Modulator> {
    const DEFAULTS: [(u16, GeneratorType, f64, u16); 10] = [
        // velocity to attenuation
        (0x0502, GeneratorType::InitialAttenuation, 960.0, 0),
        // velocity to filter cutoff
        (0x0102, GeneratorType::InitialFilterFc, -2400.0, 0),
        // channel pressure to vibrato depth
        (0x000d, GeneratorType::VibLfoToPitch, 50.0, 0),
        // mod wheel to vibrato depth
        (0x0081, GeneratorType::VibLfoToPitch, 50.0, 0),
        // volume
        (0x0587, GeneratorType::InitialAttenuation, 960.0, 0),
        // pan
        (0x028a, GeneratorType::Pan, 1000.0, 0),
        // expression
        (0x058b, GeneratorType::InitialAttenuation, 960.0, 0),
        // reverb send
        (0x00db, GeneratorType::ReverbEffectsSend, 200.0, 0),
        // chorus send
        (0x00dd, GeneratorType::ChorusEffectsSend, 200.0, 0),
        // pitch wheel, scaled by the bend range
        (0x020e, GeneratorType::CoarseTune, 127.0, 0x0010),
    ];
    DEFAULTS
        .iter()
        .map(|&(source, dest, amount, amount_source)| {
            Modulator::new(source, dest.code(), amount, amount_source)
        })
        .collect()
}

/// Normalized controller values, indexed by [`ModulatorSource::controller_type`].
#[derive(Clone, PartialEq)]
pub struct ControllerState {
    values: [f64; CONTROLLER_COUNT],
}

impl std::fmt::Debug for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v != 0.0),
            )
            .finish()
    }
}

impl Default for ControllerState {
    /// MIDI power-on state: volume 100, pan centered, full expression, pitch
    /// wheel centered with a two semitone bend range.
    fn default() -> Self {
        let mut state = ControllerState {
            values: [0.0; CONTROLLER_COUNT],
        };
        state.set_cc(7, 100);
        state.set_cc(10, 64);
        state.set_cc(11, 127);
        state.set_pitch_wheel(0x2000);
        state.set(Controller::PITCH_WHEEL_SENSITIVITY, 2.0 / 127.0);
        state
    }
}

impl ControllerState {
    /// Default state with the note-on sources set.
    pub fn for_note(key: u8, velocity: u8) -> Self {
        let mut state = ControllerState::default();
        state.set_note(key, velocity);
        state
    }

    pub fn get(&self, controller_type: usize) -> f64 {
        self.values.get(controller_type).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, controller_type: usize, value: f64) {
        if let Some(v) = self.values.get_mut(controller_type) {
            *v = value;
        }
    }

    /// Set a MIDI continuous controller from its 7-bit value. Values are
    /// normalized over 128 steps so that 64 is the center.
    pub fn set_cc(&mut self, cc: u8, value: u8) {
        self.set(0x80 | usize::from(cc & 0x7f), f64::from(value & 0x7f) / 128.0);
    }

    pub fn set_note(&mut self, key: u8, velocity: u8) {
        self.set(Controller::NOTE_ON_KEY_NUMBER, f64::from(key & 0x7f) / 128.0);
        self.set(Controller::NOTE_ON_VELOCITY, f64::from(velocity & 0x7f) / 128.0);
    }

    /// Set the pitch wheel from its 14-bit value, 0x2000 is centered.
    pub fn set_pitch_wheel(&mut self, value: u16) {
        self.set(Controller::PITCH_WHEEL, f64::from(value.min(0x3fff)) / 16384.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_source() {
        let data = [
            (0x0502, SourceType::Concave, false, true, false, 2),
            (0x0102, SourceType::Linear, false, true, false, 2),
            (0x000d, SourceType::Linear, false, false, false, 13),
            (0x0081, SourceType::Linear, false, false, true, 1),
            (0x0587, SourceType::Concave, false, true, true, 7),
            (0x028a, SourceType::Linear, true, false, true, 10),
            (0x058b, SourceType::Concave, false, true, true, 11),
            (0x00db, SourceType::Linear, false, false, true, 91),
            (0x00dd, SourceType::Linear, false, false, true, 93),
            (0x020e, SourceType::Linear, true, false, false, 14),
        ];
        for (bits, source_type, bipolar, reverse, cc, index) in data {
            let s = ModulatorSource::parse(bits);
            assert_eq!(s.source_type, source_type, "{:#06x}", bits);
            assert_eq!(s.polarity == SourcePolarity::Bipolar, bipolar, "{:#06x}", bits);
            assert_eq!(s.direction == SourceDirection::Reverse, reverse, "{:#06x}", bits);
            assert_eq!(s.cc, cc, "{:#06x}", bits);
            assert_eq!(s.index, index, "{:#06x}", bits);
        }
    }

    #[test]
    fn test_controller_type() {
        assert_eq!(ModulatorSource::parse(0x0081).controller_type(), 129);
        assert_eq!(ModulatorSource::parse(0x0081).controller(), Controller::MidiCC(1));
        assert_eq!(ModulatorSource::parse(0x0502).controller_type(), 2);
        assert_eq!(
            ModulatorSource::parse(0x0502).controller(),
            Controller::NoteOnVelocity
        );
        assert_eq!(ModulatorSource::parse(0x020e).controller(), Controller::PitchWheel);
        assert_eq!(ModulatorSource::parse(0x0005).controller(), Controller::Reserved(5));
        assert!(ModulatorSource::parse(0).is_none());
        assert!(!ModulatorSource::parse(0x0080).is_none());
    }

    #[test]
    fn test_unknown_type() {
        let s = ModulatorSource::parse(0x1c00);
        assert_eq!(s.source_type, SourceType::Unknown(7));
        assert_abs_diff_eq!(s.map(0.3), 0.3);
    }

    #[test]
    fn test_linear_identity() {
        let s = ModulatorSource::parse(0x0000);
        for i in 0..=20 {
            let x = i as f64 / 20.0;
            assert_abs_diff_eq!(s.map(x), x);
        }
    }

    #[test]
    fn test_direction_and_polarity() {
        let reverse = ModulatorSource::parse(0x0102);
        assert_abs_diff_eq!(reverse.map(0.0), 1.0);
        assert_abs_diff_eq!(reverse.map(0.25), 0.75);

        let bipolar = ModulatorSource::parse(0x028a);
        assert_abs_diff_eq!(bipolar.map(0.0), -1.0);
        assert_abs_diff_eq!(bipolar.map(0.5), 0.0);
        assert_abs_diff_eq!(bipolar.map(1.0), 1.0);

        let bipolar_reverse = ModulatorSource::parse(0x038a);
        assert_abs_diff_eq!(bipolar_reverse.map(0.0), 1.0);
        assert_abs_diff_eq!(bipolar_reverse.map(1.0), -1.0);
    }

    #[test]
    fn test_curves() {
        let concave = ModulatorSource::parse(0x0400);
        assert_abs_diff_eq!(concave.map(0.0), 0.0);
        assert_abs_diff_eq!(concave.map(1.0), 1.0);
        assert!(concave.map(0.5) < 0.5);

        let convex = ModulatorSource::parse(0x0800);
        assert_abs_diff_eq!(convex.map(0.0), 0.0);
        assert_abs_diff_eq!(convex.map(1.0), 1.0);
        assert!(convex.map(0.5) > 0.5);

        let switch = ModulatorSource::parse(0x0c00);
        assert_abs_diff_eq!(switch.map(0.49), 0.0);
        assert_abs_diff_eq!(switch.map(0.5), 1.0);

        let bipolar_concave = ModulatorSource::parse(0x0600);
        assert_abs_diff_eq!(bipolar_concave.map(0.5), 0.0);
        assert_abs_diff_eq!(bipolar_concave.map(0.0), -1.0);
        assert_abs_diff_eq!(bipolar_concave.map(0.75), -bipolar_concave.map(0.25));
    }

    #[test]
    fn test_concave_out_of_range_is_nan() {
        let concave = ModulatorSource::parse(0x0400);
        assert!(concave.map(1.5).is_nan());
        let m = Modulator::new(0x0481, GeneratorType::Pan.code(), 100.0, 0);
        let mut state = ControllerState::default();
        state.set(0x81, 1.5);
        assert!(m.contribution(&state).is_nan());
    }

    #[test]
    fn test_contribution() {
        let mut state = ControllerState::default();
        state.set_cc(1, 127);
        let m = Modulator::new(0x0081, GeneratorType::VibLfoToPitch.code(), 50.0, 0);
        assert_abs_diff_eq!(m.contribution(&state), 50.0 * 127.0 / 128.0);
        state.set(0x81, 1.0);
        assert_abs_diff_eq!(m.contribution(&state), 50.0);

        let bend = Modulator::new(0x020e, GeneratorType::CoarseTune.code(), 127.0, 0x0010);
        assert_abs_diff_eq!(bend.contribution(&state), 0.0);
        state.set_pitch_wheel(0x3fff);
        assert_abs_diff_eq!(bend.contribution(&state), 2.0, epsilon = 1e-3);

        let list = ModulatorList {
            source_oper: 0x028a,
            destination_oper: GeneratorType::Pan.code(),
            value: -300,
            amount_source_oper: 0,
            trans_oper: 2,
        };
        let abs = Modulator::from_list(&list);
        assert_eq!(abs.transform, Transform::AbsoluteValue);
        state.set_cc(10, 0);
        assert_abs_diff_eq!(abs.contribution(&state), 300.0);
    }

    #[test]
    fn test_default_modulators() {
        let mods = default_modulators();
        assert_eq!(mods.len(), 10);
        assert!(mods.iter().all(|m| m.destination_type().is_some()));
        assert_eq!(mods[9].amount_source.controller(), Controller::PitchWheelSensitivity);

        // At rest only velocity and the volume controllers contribute.
        let state = ControllerState::for_note(60, 127);
        let attenuation: f64 = mods
            .iter()
            .filter(|m| m.destination_type() == Some(GeneratorType::InitialAttenuation))
            .map(|m| m.contribution(&state))
            .sum();
        assert!(attenuation > 0.0 && attenuation < 100.0);
        // Pan 64 is centered.
        assert_abs_diff_eq!(mods[5].contribution(&state), 0.0);
    }

    #[test]
    fn test_controller_state() {
        let mut state = ControllerState::for_note(64, 127);
        assert_abs_diff_eq!(state.get(Controller::NOTE_ON_VELOCITY), 127.0 / 128.0);
        assert_abs_diff_eq!(state.get(Controller::NOTE_ON_KEY_NUMBER), 0.5);
        assert_abs_diff_eq!(state.get(Controller::PITCH_WHEEL), 0.5);
        state.set_cc(74, 0);
        assert_eq!(state.get(0x80 | 74), 0.0);
        state.set(1000, 1.0);
        assert_eq!(state.get(1000), 0.0);
    }
}
