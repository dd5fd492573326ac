//! In-memory SoundFont images for tests.

use crate::generator::GeneratorType;
use crate::records::sample_type;

pub fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = unpadded_chunk(id, body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn unpadded_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn list(signature: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut body = signature.to_vec();
    for c in chunks {
        body.extend_from_slice(c);
    }
    chunk(b"LIST", &body)
}

fn zstr(s: &str) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.push(0);
    if out.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn name(s: &str) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.resize(20, 0);
    out
}

#[derive(Clone, Default)]
pub struct Zone {
    generators: Vec<u8>,
    generator_count: u16,
    modulators: Vec<u8>,
    modulator_count: u16,
}

impl Zone {
    pub fn new() -> Self {
        Zone::default()
    }

    pub fn gen(mut self, t: GeneratorType, value: i16) -> Self {
        self.generators.extend_from_slice(&t.code().to_le_bytes());
        self.generators.extend_from_slice(&value.to_le_bytes());
        self.generator_count += 1;
        self
    }

    pub fn range(mut self, t: GeneratorType, lo: u8, hi: u8) -> Self {
        self.generators.extend_from_slice(&t.code().to_le_bytes());
        self.generators.extend_from_slice(&[lo, hi]);
        self.generator_count += 1;
        self
    }

    pub fn modulator(
        mut self,
        source: u16,
        dest: GeneratorType,
        amount: i16,
        amount_source: u16,
    ) -> Self {
        for v in [source, dest.code(), amount as u16, amount_source, 0] {
            self.modulators.extend_from_slice(&v.to_le_bytes());
        }
        self.modulator_count += 1;
        self
    }
}

struct Sample {
    name: &'static str,
    sample_rate: u32,
    original_pitch: u8,
    pitch_correction: i8,
}

/// Builds a SoundFont file image. [`SoundFontBuilder::test_kit`] is the drum
/// kit most tests run against; the other methods derive broken or unusual
/// variants from it.
pub struct SoundFontBuilder {
    presets: Vec<(&'static str, u16, u16, Vec<Zone>)>,
    instruments: Vec<(&'static str, Vec<Zone>)>,
    samples: Vec<Sample>,
    frames_per_sample: u32,
    sf3: bool,
    big_endian: bool,
    sm24: bool,
    ifil: bool,
    rom: bool,
    dropped_pdta_chunk: Option<usize>,
    last_sample_end: Option<u32>,
}

impl SoundFontBuilder {
    pub fn test_kit() -> Self {
        let sample = |name, sample_rate, original_pitch, pitch_correction| Sample {
            name,
            sample_rate,
            original_pitch,
            pitch_correction,
        };
        let tr909 = vec![
            Zone::new()
                .range(GeneratorType::KeyRange, 35, 36)
                .gen(GeneratorType::SampleID, 0),
            Zone::new()
                .range(GeneratorType::KeyRange, 37, 38)
                .gen(GeneratorType::SampleID, 1),
            Zone::new()
                .range(GeneratorType::KeyRange, 39, 40)
                .gen(GeneratorType::AttackVolEnv, -2786)
                .gen(GeneratorType::DecayVolEnv, -1586)
                .gen(GeneratorType::ReleaseVolEnv, -884)
                .gen(GeneratorType::AttackModEnv, -2786)
                .gen(GeneratorType::DecayModEnv, -1586)
                .gen(GeneratorType::SustainModEnv, 5)
                .gen(GeneratorType::ReleaseModEnv, -884)
                .gen(GeneratorType::ModEnvToPitch, 1)
                .gen(GeneratorType::ModEnvToFilterFc, 2)
                .gen(GeneratorType::SampleID, 2),
            Zone::new()
                .range(GeneratorType::KeyRange, 41, 42)
                .range(GeneratorType::VelRange, 0, 63)
                .gen(GeneratorType::SampleID, 3),
            Zone::new()
                .range(GeneratorType::KeyRange, 41, 42)
                .range(GeneratorType::VelRange, 64, 127)
                .gen(GeneratorType::SampleID, 4),
        ];
        let tr909_mod = vec![
            Zone::new()
                .gen(GeneratorType::AttackVolEnv, -3628)
                .gen(GeneratorType::DecayVolEnv, -2515)
                .gen(GeneratorType::Pan, 300),
            Zone::new()
                .range(GeneratorType::KeyRange, 39, 40)
                .gen(GeneratorType::DecayVolEnv, -1842)
                .gen(GeneratorType::SampleID, 2)
                .modulator(0x0081, GeneratorType::VibLfoToPitch, 25, 0),
            Zone::new()
                .gen(GeneratorType::Keynum, 60)
                .gen(GeneratorType::SampleID, 0),
        ];
        SoundFontBuilder {
            presets: vec![
                ("tr909", 0, 0, vec![Zone::new().gen(GeneratorType::Instrument, 0)]),
                (
                    "tr909-mod",
                    1,
                    0,
                    vec![
                        Zone::new()
                            .gen(GeneratorType::Pan, 100)
                            .gen(GeneratorType::SampleModes, 1),
                        Zone::new()
                            .range(GeneratorType::KeyRange, 0, 127)
                            .gen(GeneratorType::Instrument, 1),
                    ],
                ),
            ],
            instruments: vec![("tr909", tr909), ("tr909-mod", tr909_mod)],
            samples: vec![
                sample("bassdrum1", 44100, 76, 6),
                sample("snare1", 22050, 60, 0),
                sample("crash", 22050, 60, 0),
                sample("hihat", 22050, 60, 0),
                sample("openhat", 22050, 60, 0),
            ],
            frames_per_sample: 40,
            sf3: false,
            big_endian: false,
            sm24: false,
            ifil: true,
            rom: false,
            dropped_pdta_chunk: None,
            last_sample_end: None,
        }
    }

    pub fn preset(mut self, name: &'static str, program: u16, zones: Vec<Zone>) -> Self {
        self.presets.push((name, program, 0, zones));
        self
    }

    pub fn instrument(mut self, name: &'static str, zones: Vec<Zone>) -> Self {
        self.instruments.push((name, zones));
        self
    }

    /// Version 3 file whose odd-sized `smpl` is written without a pad byte.
    pub fn sf3(mut self) -> Self {
        self.sf3 = true;
        self
    }

    /// Write the outer RIFF size big-endian.
    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn with_sm24(mut self) -> Self {
        self.sm24 = true;
        self
    }

    /// Add the `irom` and `iver` tags of a ROM-backed bank.
    pub fn with_rom(mut self) -> Self {
        self.rom = true;
        self
    }

    pub fn without_ifil(mut self) -> Self {
        self.ifil = false;
        self
    }

    pub fn drop_pdta_chunk(mut self, index: usize) -> Self {
        self.dropped_pdta_chunk = Some(index);
        self
    }

    /// Let the last sample header point past the end of `smpl`.
    pub fn sample_end_past_data(mut self) -> Self {
        self.last_sample_end = Some(1000);
        self
    }

    fn info(&self) -> Vec<u8> {
        let mut chunks = vec![];
        if self.ifil {
            let major: u16 = if self.sf3 { 3 } else { 2 };
            let mut version = major.to_le_bytes().to_vec();
            version.extend_from_slice(&0u16.to_le_bytes());
            chunks.push(chunk(b"ifil", &version));
        }
        chunks.push(chunk(b"isng", &zstr("EMU8000")));
        chunks.push(chunk(b"INAM", &zstr("TestSoundFont")));
        chunks.push(chunk(b"ICMT", &zstr("drum kit for tests")));
        chunks.push(chunk(b"ICOP", &zstr("public domain")));
        chunks.push(chunk(b"ICRD", &zstr("October 17, 2026")));
        chunks.push(chunk(b"IENG", &zstr("Test Engineer")));
        chunks.push(chunk(b"IPRD", &zstr("SBAWE32")));
        chunks.push(chunk(b"ISFT", &zstr("sf2voice")));
        if self.rom {
            chunks.push(chunk(b"irom", &zstr("1MGM")));
            let mut version = 1u16.to_le_bytes().to_vec();
            version.extend_from_slice(&2u16.to_le_bytes());
            chunks.push(chunk(b"iver", &version));
        }
        list(b"INFO", &chunks)
    }

    /// Frame `i` of sample `s` is `s << 8 | i`.
    fn sdta(&self) -> Vec<u8> {
        let mut smpl = vec![];
        for s in 0..self.samples.len() {
            for i in 0..self.frames_per_sample {
                smpl.push(i as u8);
                smpl.push(s as u8);
            }
        }
        let mut body = b"sdta".to_vec();
        if self.sf3 {
            smpl.push(0xff);
            body.extend(unpadded_chunk(b"smpl", &smpl));
            // The LIST itself is left odd-sized and unpadded.
            return unpadded_chunk(b"LIST", &body);
        }
        body.extend(chunk(b"smpl", &smpl));
        if self.sm24 {
            let lsb = vec![0u8; smpl.len() / 2];
            body.extend(chunk(b"sm24", &lsb));
        }
        chunk(b"LIST", &body)
    }

    fn zones(zones: &[Vec<Zone>]) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u16>) {
        let mut bags = vec![];
        let mut mods = vec![];
        let mut gens = vec![];
        let mut first_bags = vec![];
        let (mut gen_ix, mut mod_ix, mut bag_ix) = (0u16, 0u16, 0u16);
        for owner in zones {
            first_bags.push(bag_ix);
            for zone in owner {
                bags.extend_from_slice(&gen_ix.to_le_bytes());
                bags.extend_from_slice(&mod_ix.to_le_bytes());
                gens.extend_from_slice(&zone.generators);
                mods.extend_from_slice(&zone.modulators);
                gen_ix += zone.generator_count;
                mod_ix += zone.modulator_count;
                bag_ix += 1;
            }
        }
        first_bags.push(bag_ix);
        bags.extend_from_slice(&gen_ix.to_le_bytes());
        bags.extend_from_slice(&mod_ix.to_le_bytes());
        gens.extend_from_slice(&[0; 4]);
        mods.extend_from_slice(&[0; 10]);
        (bags, mods, gens, first_bags)
    }

    fn pdta(&self) -> Vec<u8> {
        let preset_zones: Vec<Vec<Zone>> = self.presets.iter().map(|p| p.3.clone()).collect();
        let (pbag, pmod, pgen, preset_bags) = Self::zones(&preset_zones);
        let mut phdr = vec![];
        let headers = self
            .presets
            .iter()
            .map(|p| (p.0, p.1, p.2))
            .chain(std::iter::once(("EOP", 0, 0)));
        for ((preset_name, preset, bank), bag) in headers.zip(&preset_bags) {
            phdr.extend(name(preset_name));
            phdr.extend_from_slice(&preset.to_le_bytes());
            phdr.extend_from_slice(&bank.to_le_bytes());
            phdr.extend_from_slice(&bag.to_le_bytes());
            phdr.extend_from_slice(&[0; 12]);
        }

        let instrument_zones: Vec<Vec<Zone>> =
            self.instruments.iter().map(|i| i.1.clone()).collect();
        let (ibag, imod, igen, instrument_bags) = Self::zones(&instrument_zones);
        let mut inst = vec![];
        let names = self
            .instruments
            .iter()
            .map(|i| i.0)
            .chain(std::iter::once("EOI"));
        for (instrument_name, bag) in names.zip(&instrument_bags) {
            inst.extend(name(instrument_name));
            inst.extend_from_slice(&bag.to_le_bytes());
        }

        let mut shdr = vec![];
        let frames = self.frames_per_sample;
        for (ix, sample) in self.samples.iter().enumerate() {
            let start = ix as u32 * frames;
            let end = match self.last_sample_end {
                Some(end) if ix == self.samples.len() - 1 => end,
                _ => start + 32,
            };
            shdr.extend(name(sample.name));
            for v in [start, end, start + 8, start + 24, sample.sample_rate] {
                shdr.extend_from_slice(&v.to_le_bytes());
            }
            shdr.push(sample.original_pitch);
            shdr.push(sample.pitch_correction as u8);
            shdr.extend_from_slice(&0u16.to_le_bytes());
            shdr.extend_from_slice(&sample_type::MONO.to_le_bytes());
        }
        shdr.extend(name("EOS"));
        shdr.extend_from_slice(&[0; 26]);

        let mut chunks = vec![
            chunk(b"phdr", &phdr),
            chunk(b"pbag", &pbag),
            chunk(b"pmod", &pmod),
            chunk(b"pgen", &pgen),
            chunk(b"inst", &inst),
            chunk(b"ibag", &ibag),
            chunk(b"imod", &imod),
            chunk(b"igen", &igen),
            chunk(b"shdr", &shdr),
        ];
        if let Some(ix) = self.dropped_pdta_chunk {
            chunks.remove(ix);
        }
        list(b"pdta", &chunks)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = b"sfbk".to_vec();
        body.extend(self.info());
        body.extend(self.sdta());
        body.extend(self.pdta());
        let size = body.len() as u32;
        let mut out = b"RIFF".to_vec();
        if self.big_endian {
            out.extend_from_slice(&size.to_be_bytes());
        } else {
            out.extend_from_slice(&size.to_le_bytes());
        }
        out.extend(body);
        out
    }
}

pub fn test_soundfont() -> Vec<u8> {
    SoundFontBuilder::test_kit().build()
}
