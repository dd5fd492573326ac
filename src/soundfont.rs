use crate::error::Result;
use crate::generator::{GeneratorSet, GeneratorType};
use crate::modulator::{default_modulators, Modulator};
use crate::parser::{parse_with_options, ParseOptions, ParseResult};
use crate::records::{Bag, GeneratorList, ModulatorList};
use crate::voice::Voice;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::ops::Range;

/// Generators and modulators of one preset or instrument zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub generators: GeneratorSet,
    pub modulators: Vec<ModulatorList>,
}

impl Zone {
    /// Layer `zone` over this global zone. The zone's generators win and the
    /// global modulators come first.
    fn merge(&self, zone: Zone) -> Zone {
        let mut modulators = self.modulators.clone();
        modulators.extend(zone.modulators);
        Zone {
            generators: self.generators.overlay(&zone.generators),
            modulators,
        }
    }
}

/// Slice `items` per bag in `range`, using `index` to pick the bag field.
/// Bag `i` owns `[index(bag[i]), index(bag[i + 1]))`.
fn zone_lists<'a, T>(
    items: &'a [T],
    bags: &[Bag],
    range: Range<usize>,
    index: fn(&Bag) -> u16,
) -> Vec<&'a [T]> {
    range
        .map(|i| {
            let (from, to) = match (bags.get(i), bags.get(i + 1)) {
                (Some(a), Some(b)) => (index(a) as usize, index(b) as usize),
                _ => {
                    warn!("Bag {} is out of range ({} bags)", i, bags.len());
                    return &items[..0];
                }
            };
            match items.get(from..to) {
                Some(list) => list,
                None => {
                    warn!(
                        "Bag {} range [{}, {}) exceeds {} records",
                        i,
                        from,
                        to,
                        items.len()
                    );
                    let to = to.min(items.len());
                    &items[from.min(to)..to]
                }
            }
        })
        .collect()
}

fn zones(
    generators: &[GeneratorList],
    modulators: &[ModulatorList],
    bags: &[Bag],
    range: Range<usize>,
    make: fn(&[GeneratorList]) -> GeneratorSet,
) -> Vec<Zone> {
    let gens = zone_lists(generators, bags, range.clone(), |b| b.generator_index);
    let mods = zone_lists(modulators, bags, range, |b| b.modulator_index);
    gens.into_iter()
        .zip(mods)
        .map(|(g, m)| Zone {
            generators: make(g),
            modulators: m.to_vec(),
        })
        .collect()
}

/// Query layer over a parsed file: zone lookup and voice resolution.
///
/// Nothing here mutates the parse result, so a `SoundFont` can be shared
/// between threads and queried concurrently.
#[derive(Debug, Clone)]
pub struct SoundFont {
    pub parsed: ParseResult,
}

impl SoundFont {
    pub fn new(parsed: ParseResult) -> Self {
        SoundFont { parsed }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ParseOptions::default())
    }

    pub fn from_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<Self> {
        Ok(SoundFont::new(parse_with_options(data, options)?))
    }

    fn preset_bag_range(&self, preset: usize) -> Option<Range<usize>> {
        let headers = &self.parsed.preset_headers;
        let start = headers.get(preset)?.preset_bag_index;
        let end = match headers.get(preset + 1) {
            Some(next) => next.preset_bag_index,
            None => self
                .parsed
                .preset_bag_limit
                .unwrap_or(self.parsed.preset_bags.len().saturating_sub(1) as u16),
        };
        Some(start as usize..end as usize)
    }

    fn instrument_bag_range(&self, instrument: usize) -> Option<Range<usize>> {
        let instruments = &self.parsed.instruments;
        let start = instruments.get(instrument)?.instrument_bag_index;
        let end = match instruments.get(instrument + 1) {
            Some(next) => next.instrument_bag_index,
            None => self
                .parsed
                .instrument_bag_limit
                .unwrap_or(self.parsed.instrument_bags.len().saturating_sub(1) as u16),
        };
        Some(start as usize..end as usize)
    }

    /// The zones of preset header `preset`, in file order.
    pub fn preset_zones(&self, preset: usize) -> Vec<Zone> {
        match self.preset_bag_range(preset) {
            Some(range) => zones(
                &self.parsed.preset_generators,
                &self.parsed.preset_modulators,
                &self.parsed.preset_bags,
                range,
                GeneratorSet::from_preset_generators,
            ),
            None => vec![],
        }
    }

    /// The zones of instrument `instrument`, in file order.
    pub fn instrument_zones(&self, instrument: usize) -> Vec<Zone> {
        match self.instrument_bag_range(instrument) {
            Some(range) => zones(
                &self.parsed.instrument_generators,
                &self.parsed.instrument_modulators,
                &self.parsed.instrument_bags,
                range,
                GeneratorSet::from_instrument_generators,
            ),
            None => vec![],
        }
    }

    /// First zone of `instrument` matching the note, layered over the
    /// instrument's global zone. The global zone is the first zone without a
    /// `sampleID` and applies to the zones that follow it.
    pub fn find_instrument_zone(&self, instrument: usize, key: u8, velocity: u8) -> Option<Zone> {
        let mut global: Option<Zone> = None;
        for zone in self.instrument_zones(instrument) {
            if !zone.generators.contains(GeneratorType::SampleID) {
                if global.is_none() {
                    global = Some(zone);
                }
                continue;
            }
            if !zone.generators.matches(key, velocity) {
                continue;
            }
            return Some(match &global {
                Some(global) => global.merge(zone),
                None => zone,
            });
        }
        None
    }

    /// First zone of preset header `preset` whose instrument has a zone
    /// matching the note. Returns the preset zone layered over the preset's
    /// global zone, and the matching instrument zone.
    pub fn find_instrument(&self, preset: usize, key: u8, velocity: u8) -> Option<(Zone, Zone)> {
        let mut global: Option<Zone> = None;
        for zone in self.preset_zones(preset) {
            let instrument = match zone.generators.value(GeneratorType::Instrument) {
                Some(v) if v.value >= 0 => v.value as usize,
                Some(_) => continue,
                None => {
                    if global.is_none() {
                        global = Some(zone);
                    }
                    continue;
                }
            };
            if !zone.generators.matches(key, velocity) {
                continue;
            }
            if let Some(instrument_zone) = self.find_instrument_zone(instrument, key, velocity) {
                let preset_zone = match &global {
                    Some(global) => global.merge(zone),
                    None => zone,
                };
                return Some((preset_zone, instrument_zone));
            }
        }
        None
    }

    /// Combine a preset zone and an instrument zone into a voice.
    ///
    /// Instrument values sit on top of the defaults and preset values are
    /// added to them. Modulators are the defaults followed by the preset's and
    /// the instrument's.
    pub fn create_voice(
        &self,
        preset_zone: &Zone,
        instrument_zone: &Zone,
        key: u8,
        velocity: u8,
    ) -> Option<Voice<'_>> {
        let mut generators = GeneratorSet::defaults().overlay(&instrument_zone.generators);
        generators.add_preset(&preset_zone.generators);

        let sample_id = instrument_zone.generators.value(GeneratorType::SampleID)?.value;
        let (header, sample) = match usize::try_from(sample_id).ok().and_then(|id| {
            Some((
                self.parsed.sample_headers.get(id)?,
                self.parsed.samples.get(id)?,
            ))
        }) {
            Some(found) => found,
            None => {
                warn!("sample not found: {}", sample_id);
                return None;
            }
        };

        let mut modulators = default_modulators();
        modulators.extend(preset_zone.modulators.iter().map(Modulator::from_list));
        modulators.extend(instrument_zone.modulators.iter().map(Modulator::from_list));
        debug!(
            "voice: key {} velocity {} sample {} ({} modulators)",
            key,
            velocity,
            header.sample_name,
            modulators.len()
        );
        Some(Voice::new(key, velocity, generators, modulators, sample, header))
    }

    /// Resolve the voice that plays `key` at `velocity` on a preset.
    ///
    /// A missing preset or a note no zone covers is logged and yields `None`.
    pub fn get_voice(&self, bank: u16, program: u16, key: u8, velocity: u8) -> Option<Voice<'_>> {
        let preset = match self
            .parsed
            .preset_headers
            .iter()
            .position(|p| p.bank == bank && p.preset == program)
        {
            Some(ix) => ix,
            None => {
                warn!("preset not found: bank {} program {}", bank, program);
                return None;
            }
        };
        let (preset_zone, instrument_zone) = match self.find_instrument(preset, key, velocity) {
            Some(zones) => zones,
            None => {
                warn!(
                    "instrument not found: bank {} program {} key {} velocity {}",
                    bank, program, key, velocity
                );
                return None;
            }
        };
        self.create_voice(&preset_zone, &instrument_zone, key, velocity)
    }

    /// Preset names by bank, then program.
    pub fn preset_names(&self) -> BTreeMap<u16, BTreeMap<u16, String>> {
        let mut names: BTreeMap<u16, BTreeMap<u16, String>> = BTreeMap::new();
        for p in &self.parsed.preset_headers {
            names
                .entry(p.bank)
                .or_default()
                .insert(p.preset, p.preset_name.clone());
        }
        names
    }

    /// A file name friendly version of `s`.
    pub fn safe_name(s: &str) -> String {
        s.chars()
            .map(|x| match x {
                '/' | '\\' | '"' | '?' | '*' | ':' | '<' | '>' | '|' => '_',
                _ => x,
            })
            .collect()
    }
}
