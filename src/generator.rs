use crate::records::{GeneratorAmount, GeneratorList, RangeValue};
use log::warn;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Number of generator codes defined by the format (0..=60).
pub const GENERATOR_CODE_COUNT: usize = 61;

const INT16_MIN: i32 = -32768;
const INT16_MAX: i32 = 32767;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, EnumIter)]
pub enum GeneratorType {
    StartAddrsOffset = 0,
    EndAddrsOffset = 1,
    StartloopAddrsOffset = 2,
    EndloopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    DelayModLFO = 21,
    FreqModLFO = 22,
    DelayVibLFO = 23,
    FreqVibLFO = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeynumToModEnvHold = 31,
    KeynumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeynumToVolEnvHold = 39,
    KeynumToVolEnvDecay = 40,
    Instrument = 41,
    KeyRange = 43,
    VelRange = 44,
    StartloopAddrsCoarseOffset = 45,
    Keynum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    EndloopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleID = 53,
    SampleModes = 54,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
}

impl GeneratorType {
    /// Map a generator code to its kind. Unused, reserved and `endOper`
    /// codes have no kind.
    pub fn from_code(code: u16) -> Option<GeneratorType> {
        use GeneratorType::*;
        let t = match code {
            0 => StartAddrsOffset,
            1 => EndAddrsOffset,
            2 => StartloopAddrsOffset,
            3 => EndloopAddrsOffset,
            4 => StartAddrsCoarseOffset,
            5 => ModLfoToPitch,
            6 => VibLfoToPitch,
            7 => ModEnvToPitch,
            8 => InitialFilterFc,
            9 => InitialFilterQ,
            10 => ModLfoToFilterFc,
            11 => ModEnvToFilterFc,
            12 => EndAddrsCoarseOffset,
            13 => ModLfoToVolume,
            15 => ChorusEffectsSend,
            16 => ReverbEffectsSend,
            17 => Pan,
            21 => DelayModLFO,
            22 => FreqModLFO,
            23 => DelayVibLFO,
            24 => FreqVibLFO,
            25 => DelayModEnv,
            26 => AttackModEnv,
            27 => HoldModEnv,
            28 => DecayModEnv,
            29 => SustainModEnv,
            30 => ReleaseModEnv,
            31 => KeynumToModEnvHold,
            32 => KeynumToModEnvDecay,
            33 => DelayVolEnv,
            34 => AttackVolEnv,
            35 => HoldVolEnv,
            36 => DecayVolEnv,
            37 => SustainVolEnv,
            38 => ReleaseVolEnv,
            39 => KeynumToVolEnvHold,
            40 => KeynumToVolEnvDecay,
            41 => Instrument,
            43 => KeyRange,
            44 => VelRange,
            45 => StartloopAddrsCoarseOffset,
            46 => Keynum,
            47 => Velocity,
            48 => InitialAttenuation,
            50 => EndloopAddrsCoarseOffset,
            51 => CoarseTune,
            52 => FineTune,
            53 => SampleID,
            54 => SampleModes,
            56 => ScaleTuning,
            57 => ExclusiveClass,
            58 => OverridingRootKey,
            _ => return None,
        };
        Some(t)
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        use GeneratorType::*;
        match self {
            StartAddrsOffset => "startAddrsOffset",
            EndAddrsOffset => "endAddrsOffset",
            StartloopAddrsOffset => "startloopAddrsOffset",
            EndloopAddrsOffset => "endloopAddrsOffset",
            StartAddrsCoarseOffset => "startAddrsCoarseOffset",
            ModLfoToPitch => "modLfoToPitch",
            VibLfoToPitch => "vibLfoToPitch",
            ModEnvToPitch => "modEnvToPitch",
            InitialFilterFc => "initialFilterFc",
            InitialFilterQ => "initialFilterQ",
            ModLfoToFilterFc => "modLfoToFilterFc",
            ModEnvToFilterFc => "modEnvToFilterFc",
            EndAddrsCoarseOffset => "endAddrsCoarseOffset",
            ModLfoToVolume => "modLfoToVolume",
            ChorusEffectsSend => "chorusEffectsSend",
            ReverbEffectsSend => "reverbEffectsSend",
            Pan => "pan",
            DelayModLFO => "delayModLFO",
            FreqModLFO => "freqModLFO",
            DelayVibLFO => "delayVibLFO",
            FreqVibLFO => "freqVibLFO",
            DelayModEnv => "delayModEnv",
            AttackModEnv => "attackModEnv",
            HoldModEnv => "holdModEnv",
            DecayModEnv => "decayModEnv",
            SustainModEnv => "sustainModEnv",
            ReleaseModEnv => "releaseModEnv",
            KeynumToModEnvHold => "keynumToModEnvHold",
            KeynumToModEnvDecay => "keynumToModEnvDecay",
            DelayVolEnv => "delayVolEnv",
            AttackVolEnv => "attackVolEnv",
            HoldVolEnv => "holdVolEnv",
            DecayVolEnv => "decayVolEnv",
            SustainVolEnv => "sustainVolEnv",
            ReleaseVolEnv => "releaseVolEnv",
            KeynumToVolEnvHold => "keynumToVolEnvHold",
            KeynumToVolEnvDecay => "keynumToVolEnvDecay",
            Instrument => "instrument",
            KeyRange => "keyRange",
            VelRange => "velRange",
            StartloopAddrsCoarseOffset => "startloopAddrsCoarseOffset",
            Keynum => "keynum",
            Velocity => "velocity",
            InitialAttenuation => "initialAttenuation",
            EndloopAddrsCoarseOffset => "endloopAddrsCoarseOffset",
            CoarseTune => "coarseTune",
            FineTune => "fineTune",
            SampleID => "sampleID",
            SampleModes => "sampleModes",
            ScaleTuning => "scaleTuning",
            ExclusiveClass => "exclusiveClass",
            OverridingRootKey => "overridingRootKey",
        }
    }

    /// `keyRange` and `velRange` carry a lo/hi byte pair instead of a word.
    pub fn is_range(self) -> bool {
        matches!(self, GeneratorType::KeyRange | GeneratorType::VelRange)
    }

    /// Generators that select the next layer down: `instrument` in a preset
    /// zone, `sampleID` in an instrument zone.
    pub fn is_index(self) -> bool {
        matches!(self, GeneratorType::Instrument | GeneratorType::SampleID)
    }

    pub fn is_substitution(self) -> bool {
        matches!(self, GeneratorType::Keynum | GeneratorType::Velocity)
    }

    /// Sample addressing and playback mode generators, only meaningful in
    /// instrument zones.
    pub fn is_sample_generator(self) -> bool {
        use GeneratorType::*;
        matches!(
            self,
            StartAddrsOffset
                | EndAddrsOffset
                | StartloopAddrsOffset
                | EndloopAddrsOffset
                | StartAddrsCoarseOffset
                | EndAddrsCoarseOffset
                | StartloopAddrsCoarseOffset
                | EndloopAddrsCoarseOffset
                | SampleModes
                | ExclusiveClass
                | OverridingRootKey
        )
    }

    /// Generators that must never appear in a preset zone.
    pub fn is_preset_excluded(self) -> bool {
        self.is_sample_generator() || self.is_substitution()
    }

    /// Generators that feed a voice parameter and can be modulated.
    pub fn is_value_generator(self) -> bool {
        !(self.is_sample_generator()
            || self.is_substitution()
            || self.is_index()
            || self.is_range())
    }

    /// Default value and legal range of every generator.
    pub fn default_value(self) -> GeneratorValue {
        use GeneratorType::*;
        let (min, value, max) = match self {
            StartAddrsOffset => (0, 0, INT16_MAX),
            EndAddrsOffset => (INT16_MIN, 0, 0),
            StartloopAddrsOffset => (INT16_MIN, 0, INT16_MAX),
            EndloopAddrsOffset => (INT16_MIN, 0, INT16_MAX),
            StartAddrsCoarseOffset => (0, 0, INT16_MAX),
            ModLfoToPitch | VibLfoToPitch | ModEnvToPitch => (-12000, 0, 12000),
            InitialFilterFc => (1500, 13500, 13500),
            InitialFilterQ => (0, 0, 960),
            ModLfoToFilterFc | ModEnvToFilterFc => (-12000, 0, 12000),
            EndAddrsCoarseOffset => (INT16_MIN, 0, 0),
            ModLfoToVolume => (-960, 0, 960),
            ChorusEffectsSend | ReverbEffectsSend => (0, 0, 1000),
            Pan => (-500, 0, 500),
            DelayModLFO | DelayVibLFO => (-12000, -12000, 5000),
            FreqModLFO | FreqVibLFO => (-16000, 0, 4500),
            DelayModEnv | HoldModEnv | DelayVolEnv | HoldVolEnv => (-12000, -12000, 5000),
            AttackModEnv | DecayModEnv | ReleaseModEnv => (-12000, -12000, 8000),
            AttackVolEnv | DecayVolEnv | ReleaseVolEnv => (-12000, -12000, 8000),
            SustainModEnv => (0, 0, 1000),
            SustainVolEnv => (0, 0, 1440),
            KeynumToModEnvHold | KeynumToModEnvDecay => (-1200, 0, 1200),
            KeynumToVolEnvHold | KeynumToVolEnvDecay => (-1200, 0, 1200),
            Instrument => (-1, -1, INT16_MAX),
            KeyRange | VelRange => return GeneratorValue::Range(RangeValue::FULL),
            StartloopAddrsCoarseOffset => (INT16_MIN, 0, INT16_MAX),
            Keynum | Velocity => (-1, -1, 127),
            InitialAttenuation => (0, 0, 1440),
            EndloopAddrsCoarseOffset => (INT16_MIN, 0, INT16_MAX),
            CoarseTune => (-120, 0, 120),
            FineTune => (-99, 0, 99),
            SampleID => (-1, -1, INT16_MAX),
            SampleModes => (0, 0, 3),
            ScaleTuning => (0, 100, 100),
            ExclusiveClass => (0, 0, 127),
            OverridingRootKey => (-1, -1, 127),
        };
        GeneratorValue::Value(BoundedValue::new(min, value, max))
    }

    /// Legal range of a value generator, with its default as the value.
    pub fn bounds(self) -> BoundedValue {
        match self.default_value() {
            GeneratorValue::Value(v) => v,
            GeneratorValue::Range(_) => BoundedValue::new(0, 0, 127),
        }
    }
}

/// A raw generator value together with the range it is clamped to when used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedValue {
    pub min: i32,
    pub value: i32,
    pub max: i32,
}

impl BoundedValue {
    pub fn new(min: i32, value: i32, max: i32) -> Self {
        BoundedValue { min, value, max }
    }

    pub fn clamp(&self) -> i32 {
        self.min.max(self.value.min(self.max))
    }

    /// Clamp an arbitrary value, e.g. a modulated one, to these bounds.
    pub fn clamp_value(&self, value: f64) -> f64 {
        (self.min as f64).max(value.min(self.max as f64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorValue {
    Value(BoundedValue),
    Range(RangeValue),
}

/// The generators of one zone, keyed by generator kind.
///
/// Layers are combined with [`GeneratorSet::overlay`], where the upper layer
/// wins for every generator it defines.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratorSet {
    values: [Option<GeneratorValue>; GENERATOR_CODE_COUNT],
}

impl Default for GeneratorSet {
    fn default() -> Self {
        GeneratorSet {
            values: [None; GENERATOR_CODE_COUNT],
        }
    }
}

impl std::fmt::Debug for GeneratorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(t, v)| (t.name(), v)))
            .finish()
    }
}

impl GeneratorSet {
    /// Every generator at its default value.
    pub fn defaults() -> Self {
        let mut set = GeneratorSet::default();
        for t in GeneratorType::iter() {
            set.set(t, t.default_value());
        }
        set
    }

    /// Generators of a preset zone. Instrument-only generators are dropped.
    pub fn from_preset_generators(generators: &[GeneratorList]) -> Self {
        let mut set = GeneratorSet::default();
        for gen in generators {
            match gen.generator_type() {
                Some(t) if !t.is_preset_excluded() => set.insert(t, gen),
                _ => {}
            }
        }
        set
    }

    /// Generators of an instrument zone. A non-negative `keynum` or
    /// `velocity` also pins `keyRange` or `velRange` to that single value.
    pub fn from_instrument_generators(generators: &[GeneratorList]) -> Self {
        let mut set = GeneratorSet::default();
        for gen in generators {
            if let Some(t) = gen.generator_type() {
                set.insert(t, gen);
            }
        }
        for (src, dst) in [
            (GeneratorType::Keynum, GeneratorType::KeyRange),
            (GeneratorType::Velocity, GeneratorType::VelRange),
        ] {
            if let Some(v) = set.value(src) {
                let v = v.clamp();
                if v >= 0 {
                    let v = v as u8;
                    set.set(dst, GeneratorValue::Range(RangeValue::new(v, v)));
                }
            }
        }
        set
    }

    fn insert(&mut self, t: GeneratorType, gen: &GeneratorList) {
        match (gen.value, t.default_value()) {
            (GeneratorAmount::Range(r), GeneratorValue::Range(_)) => {
                self.set(t, GeneratorValue::Range(r));
            }
            (GeneratorAmount::Value(v), GeneratorValue::Value(bounds)) => {
                self.set(
                    t,
                    GeneratorValue::Value(BoundedValue::new(bounds.min, v as i32, bounds.max)),
                );
            }
            _ => warn!("Generator {} has a mismatched amount: {:?}", t.name(), gen.value),
        }
    }

    pub fn get(&self, t: GeneratorType) -> Option<&GeneratorValue> {
        self.values[t as usize].as_ref()
    }

    pub fn set(&mut self, t: GeneratorType, value: GeneratorValue) {
        self.values[t as usize] = Some(value);
    }

    pub fn contains(&self, t: GeneratorType) -> bool {
        self.values[t as usize].is_some()
    }

    pub fn value(&self, t: GeneratorType) -> Option<BoundedValue> {
        match self.get(t) {
            Some(GeneratorValue::Value(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn range(&self, t: GeneratorType) -> Option<RangeValue> {
        match self.get(t) {
            Some(GeneratorValue::Range(r)) => Some(*r),
            _ => None,
        }
    }

    /// The value of `t`, falling back to its default when the zone does not
    /// define it.
    pub fn value_or_default(&self, t: GeneratorType) -> BoundedValue {
        self.value(t).unwrap_or_else(|| t.bounds())
    }

    pub fn key_range(&self) -> Option<RangeValue> {
        self.range(GeneratorType::KeyRange)
    }

    pub fn vel_range(&self) -> Option<RangeValue> {
        self.range(GeneratorType::VelRange)
    }

    /// Whether a note passes this zone's key and velocity filters. A missing
    /// range does not restrict.
    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        self.key_range().map_or(true, |r| r.contains(key))
            && self.vel_range().map_or(true, |r| r.contains(velocity))
    }

    pub fn overlay(&self, upper: &GeneratorSet) -> GeneratorSet {
        let mut merged = self.clone();
        for (t, v) in upper.iter() {
            merged.set(t, *v);
        }
        merged
    }

    /// Add preset zone generators onto this instrument-level set.
    ///
    /// Preset values are offsets: the result is the sum of both values
    /// wrapped in the instrument generator's bounds. Ranges and the
    /// `instrument` index only select zones and are not carried over.
    pub fn add_preset(&mut self, preset: &GeneratorSet) {
        for (t, v) in preset.iter() {
            if let GeneratorValue::Value(delta) = v {
                if t.is_range() || t.is_index() {
                    continue;
                }
                let base = self.value_or_default(t);
                self.set(
                    t,
                    GeneratorValue::Value(BoundedValue::new(
                        base.min,
                        base.value + delta.value,
                        base.max,
                    )),
                );
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeneratorType, &GeneratorValue)> + '_ {
        GeneratorType::iter().filter_map(move |t| self.get(t).map(|v| (t, v)))
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
