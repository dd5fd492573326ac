use crate::generator::{GeneratorSet, GeneratorType, GENERATOR_CODE_COUNT};
use crate::modulator::{ControllerState, Modulator};
use crate::records::SampleHeader;
use std::collections::{BTreeMap, BTreeSet};
use strum::IntoEnumIterator;

pub fn timecent_to_seconds(timecents: f64) -> f64 {
    2f64.powf(timecents / 1200.0)
}

/// Other generators read together with `t` when its parameter is derived.
fn parameter_inputs(t: GeneratorType) -> &'static [GeneratorType] {
    use GeneratorType::*;
    match t {
        CoarseTune | FineTune | ScaleTuning => &[CoarseTune, FineTune, ScaleTuning],
        HoldVolEnv | KeynumToVolEnvHold => &[HoldVolEnv, KeynumToVolEnvHold],
        DecayVolEnv | KeynumToVolEnvDecay => &[DecayVolEnv, KeynumToVolEnvDecay],
        HoldModEnv | KeynumToModEnvHold => &[HoldModEnv, KeynumToModEnvHold],
        DecayModEnv | KeynumToModEnvDecay => &[DecayModEnv, KeynumToModEnvDecay],
        _ => &[],
    }
}

/// Synthesis parameters of a voice, as consumed by a playback engine.
///
/// Times are in seconds, sends, pan and sustain levels in 1/1000 units, the
/// sample window in frames relative to `sample`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceParams<'a> {
    pub start: i64,
    pub end: i64,
    pub loop_start: i64,
    pub loop_end: i64,
    pub mod_lfo_to_pitch: f64,
    pub vib_lfo_to_pitch: f64,
    pub mod_env_to_pitch: f64,
    pub initial_filter_fc: f64,
    pub initial_filter_q: f64,
    pub mod_lfo_to_filter_fc: f64,
    pub mod_env_to_filter_fc: f64,
    pub mod_lfo_to_volume: f64,
    pub chorus_effects_send: f64,
    pub reverb_effects_send: f64,
    pub pan: f64,
    pub delay_mod_lfo: f64,
    pub freq_mod_lfo: f64,
    pub delay_vib_lfo: f64,
    pub freq_vib_lfo: f64,
    pub mod_delay: f64,
    pub mod_attack: f64,
    pub mod_hold: f64,
    pub mod_decay: f64,
    pub mod_sustain: f64,
    pub mod_release: f64,
    pub vol_delay: f64,
    pub vol_attack: f64,
    pub vol_hold: f64,
    pub vol_decay: f64,
    pub vol_sustain: f64,
    pub vol_release: f64,
    pub initial_attenuation: f64,
    pub playback_rate: f64,
    pub sample: &'a [u8],
    pub sample_rate: u32,
    pub sample_name: &'a str,
    pub sample_modes: i32,
    pub exclusive_class: i32,
}

/// A resolved note: generators, modulators and the sample they play.
///
/// The controller indexes are built once here and never change.
#[derive(Debug, Clone)]
pub struct Voice<'a> {
    pub key: u8,
    pub velocity: u8,
    pub generators: GeneratorSet,
    pub modulators: Vec<Modulator>,
    pub sample: &'a [u8],
    pub sample_header: &'a SampleHeader,
    controller_to_destinations: BTreeMap<usize, BTreeSet<u16>>,
    controller_to_modulators: BTreeMap<usize, Vec<usize>>,
    destination_to_modulators: BTreeMap<u16, Vec<usize>>,
}

impl<'a> Voice<'a> {
    /// `generators` must hold every generator, e.g. a set built on top of
    /// [`GeneratorSet::defaults`].
    pub fn new(
        key: u8,
        velocity: u8,
        generators: GeneratorSet,
        modulators: Vec<Modulator>,
        sample: &'a [u8],
        sample_header: &'a SampleHeader,
    ) -> Self {
        let mut controller_to_destinations: BTreeMap<usize, BTreeSet<u16>> = BTreeMap::new();
        let mut controller_to_modulators: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut destination_to_modulators: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
        for (ix, m) in modulators.iter().enumerate() {
            let mut triggers = vec![m.source.controller_type()];
            if !m.amount_source.is_none() {
                triggers.push(m.amount_source.controller_type());
            }
            triggers.dedup();
            for controller_type in triggers {
                controller_to_destinations
                    .entry(controller_type)
                    .or_default()
                    .insert(m.destination);
                controller_to_modulators
                    .entry(controller_type)
                    .or_default()
                    .push(ix);
            }
            destination_to_modulators
                .entry(m.destination)
                .or_default()
                .push(ix);
        }
        Voice {
            key,
            velocity,
            generators,
            modulators,
            sample,
            sample_header,
            controller_to_destinations,
            controller_to_modulators,
            destination_to_modulators,
        }
    }

    /// Destination generator codes driven by `controller_type`.
    pub fn destinations(&self, controller_type: usize) -> Option<&BTreeSet<u16>> {
        self.controller_to_destinations.get(&controller_type)
    }

    /// Modulators reading `controller_type` as primary or amount source.
    pub fn modulators_for_controller(
        &self,
        controller_type: usize,
    ) -> impl Iterator<Item = &Modulator> + '_ {
        self.controller_to_modulators
            .get(&controller_type)
            .into_iter()
            .flatten()
            .filter_map(move |&ix| self.modulators.get(ix))
    }

    pub fn modulators_for_destination(
        &self,
        destination: u16,
    ) -> impl Iterator<Item = &Modulator> + '_ {
        self.destination_to_modulators
            .get(&destination)
            .into_iter()
            .flatten()
            .filter_map(move |&ix| self.modulators.get(ix))
    }

    fn base_values(&self) -> [f64; GENERATOR_CODE_COUNT] {
        let mut values = [0.0; GENERATOR_CODE_COUNT];
        for t in GeneratorType::iter() {
            if !t.is_range() {
                values[t as usize] = f64::from(self.generators.value_or_default(t).value);
            }
        }
        values
    }

    /// Base value of `destination` plus every modulator contribution that is
    /// a number.
    fn modulated_value(
        &self,
        destination: GeneratorType,
        base: f64,
        state: &ControllerState,
    ) -> f64 {
        self.modulators_for_destination(destination.code())
            .map(|m| m.contribution(state))
            .filter(|v| !v.is_nan())
            .fold(base, |acc, v| acc + v)
    }

    fn modulated_values(&self, state: &ControllerState) -> [f64; GENERATOR_CODE_COUNT] {
        let mut values = self.base_values();
        for t in GeneratorType::iter().filter(|t| t.is_value_generator()) {
            values[t as usize] = self.modulated_value(t, values[t as usize], state);
        }
        values
    }

    fn clamped(&self, t: GeneratorType, values: &[f64; GENERATOR_CODE_COUNT]) -> f64 {
        self.generators
            .value_or_default(t)
            .clamp_value(values[t as usize])
    }

    fn key_scaled_time(
        &self,
        values: &[f64; GENERATOR_CODE_COUNT],
        time: GeneratorType,
        keynum_to: GeneratorType,
    ) -> f64 {
        let key_offset = (f64::from(self.key) - 60.0) * self.clamped(keynum_to, values);
        timecent_to_seconds(self.clamped(time, values) + key_offset)
    }

    fn playback_rate(&self, values: &[f64; GENERATOR_CODE_COUNT]) -> f64 {
        let coarse_tune = self.clamped(GeneratorType::CoarseTune, values);
        let fine_tune = self.clamped(GeneratorType::FineTune, values) / 100.0;
        let overriding_root_key = self.clamped(GeneratorType::OverridingRootKey, values);
        let scale_tuning = self.clamped(GeneratorType::ScaleTuning, values) / 100.0;
        let root_key = if overriding_root_key < 0.0 {
            f64::from(self.sample_header.original_pitch)
        } else {
            overriding_root_key
        };
        let base_pitch = coarse_tune + fine_tune
            + f64::from(self.sample_header.pitch_correction) / 100.0
            - root_key;
        2f64.powf((f64::from(self.key) + base_pitch) * scale_tuning / 12.0)
    }

    fn address(
        &self,
        values: &[f64; GENERATOR_CODE_COUNT],
        coarse: GeneratorType,
        fine: GeneratorType,
    ) -> i64 {
        self.clamped(coarse, values) as i64 * 32768 + self.clamped(fine, values) as i64
    }

    /// Write the output parameter(s) derived from generator `t`.
    fn apply_generator(
        &self,
        t: GeneratorType,
        values: &[f64; GENERATOR_CODE_COUNT],
        params: &mut VoiceParams<'a>,
    ) {
        use GeneratorType::*;
        let value = |g| self.clamped(g, values);
        match t {
            StartAddrsOffset | StartAddrsCoarseOffset => {
                params.start = self.address(values, StartAddrsCoarseOffset, StartAddrsOffset);
            }
            EndAddrsOffset | EndAddrsCoarseOffset => {
                let length =
                    i64::from(self.sample_header.end) - i64::from(self.sample_header.start);
                params.end = length + self.address(values, EndAddrsCoarseOffset, EndAddrsOffset);
            }
            StartloopAddrsOffset | StartloopAddrsCoarseOffset => {
                params.loop_start = i64::from(self.sample_header.loop_start)
                    + self.address(values, StartloopAddrsCoarseOffset, StartloopAddrsOffset);
            }
            EndloopAddrsOffset | EndloopAddrsCoarseOffset => {
                params.loop_end = i64::from(self.sample_header.loop_end)
                    + self.address(values, EndloopAddrsCoarseOffset, EndloopAddrsOffset);
            }
            ModLfoToPitch => params.mod_lfo_to_pitch = value(t),
            VibLfoToPitch => params.vib_lfo_to_pitch = value(t),
            ModEnvToPitch => params.mod_env_to_pitch = value(t),
            InitialFilterFc => params.initial_filter_fc = value(t),
            InitialFilterQ => params.initial_filter_q = value(t),
            ModLfoToFilterFc => params.mod_lfo_to_filter_fc = value(t),
            ModEnvToFilterFc => params.mod_env_to_filter_fc = value(t),
            ModLfoToVolume => params.mod_lfo_to_volume = value(t),
            ChorusEffectsSend => params.chorus_effects_send = value(t) / 1000.0,
            ReverbEffectsSend => params.reverb_effects_send = value(t) / 1000.0,
            Pan => params.pan = value(t) / 1000.0,
            DelayModLFO => params.delay_mod_lfo = timecent_to_seconds(value(t)),
            FreqModLFO => params.freq_mod_lfo = value(t),
            DelayVibLFO => params.delay_vib_lfo = timecent_to_seconds(value(t)),
            FreqVibLFO => params.freq_vib_lfo = value(t),
            DelayModEnv => params.mod_delay = timecent_to_seconds(value(t)),
            AttackModEnv => params.mod_attack = timecent_to_seconds(value(t)),
            HoldModEnv | KeynumToModEnvHold => {
                params.mod_hold = self.key_scaled_time(values, HoldModEnv, KeynumToModEnvHold);
            }
            DecayModEnv | KeynumToModEnvDecay => {
                params.mod_decay = self.key_scaled_time(values, DecayModEnv, KeynumToModEnvDecay);
            }
            SustainModEnv => params.mod_sustain = value(t) / 1000.0,
            ReleaseModEnv => params.mod_release = timecent_to_seconds(value(t)),
            DelayVolEnv => params.vol_delay = timecent_to_seconds(value(t)),
            AttackVolEnv => params.vol_attack = timecent_to_seconds(value(t)),
            HoldVolEnv | KeynumToVolEnvHold => {
                params.vol_hold = self.key_scaled_time(values, HoldVolEnv, KeynumToVolEnvHold);
            }
            DecayVolEnv | KeynumToVolEnvDecay => {
                params.vol_decay = self.key_scaled_time(values, DecayVolEnv, KeynumToVolEnvDecay);
            }
            SustainVolEnv => params.vol_sustain = value(t) / 1000.0,
            ReleaseVolEnv => params.vol_release = timecent_to_seconds(value(t)),
            InitialAttenuation => params.initial_attenuation = value(t),
            CoarseTune | FineTune | ScaleTuning | OverridingRootKey => {
                params.playback_rate = self.playback_rate(values);
            }
            SampleModes => params.sample_modes = value(t) as i32,
            ExclusiveClass => params.exclusive_class = value(t) as i32,
            Instrument | KeyRange | VelRange | Keynum | Velocity | SampleID => {}
        }
    }

    /// Recompute the parameters affected by a change of `controller_type`.
    ///
    /// Only the destinations driven by the controller, and the generators
    /// their parameters are derived with, are modulated. Only the fields
    /// derived from those destinations are written.
    /// Returns the generators that were recomputed.
    pub fn get_params(
        &self,
        controller_type: usize,
        state: &ControllerState,
        params: &mut VoiceParams<'a>,
    ) -> Vec<GeneratorType> {
        let updated: Vec<GeneratorType> = match self.destinations(controller_type) {
            Some(destinations) => destinations
                .iter()
                .filter_map(|&code| GeneratorType::from_code(code))
                .filter(|t| t.is_value_generator())
                .collect(),
            None => return vec![],
        };
        let base = self.base_values();
        let mut values = base;
        for &t in &updated {
            for &input in std::iter::once(&t).chain(parameter_inputs(t)) {
                let i = input as usize;
                values[i] = self.modulated_value(input, base[i], state);
            }
        }
        for &t in &updated {
            self.apply_generator(t, &values, params);
        }
        updated
    }

    /// Compute every parameter from scratch.
    pub fn get_all_params(&self, state: &ControllerState) -> VoiceParams<'a> {
        let header: &'a SampleHeader = self.sample_header;
        let mut params = VoiceParams {
            sample: self.sample,
            sample_rate: header.sample_rate,
            sample_name: &header.sample_name,
            ..VoiceParams::default()
        };
        let values = self.modulated_values(state);
        for t in GeneratorType::iter() {
            self.apply_generator(t, &values, &mut params);
        }
        params
    }
}
