use anyhow::{bail, Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{info, warn};
use soundfont_voices::records::sample_type;
use soundfont_voices::{ControllerState, GeneratorType, ParseOptions, SampleEncoding, SoundFont};
use std::fs;
use std::path::Path;

fn load(matches: &ArgMatches) -> Result<SoundFont> {
    let path = matches.value_of("FILE").context("missing FILE")?;
    let data = fs::read(path).with_context(|| format!("reading {}", path))?;
    let options = ParseOptions {
        padding: !matches.is_present("no-padding"),
        big_endian: matches.is_present("big-endian"),
    };
    SoundFont::from_bytes_with_options(&data, options)
        .with_context(|| format!("parsing {}", path))
}

fn number<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = matches.value_of(name).unwrap_or("0");
    value
        .parse()
        .with_context(|| format!("invalid --{}: {}", name, value))
}

fn print_info(sf: &SoundFont) {
    let parsed = &sf.parsed;
    let info = &parsed.info;
    println!("Name: {}", info.name);
    println!("Version: {}.{}", info.version.major, info.version.minor);
    println!("Sound engine: {}", info.sound_engine);
    let optional = [
        ("Comment", &info.comment),
        ("Copyright", &info.copyright),
        ("Created", &info.creation_date),
        ("Engineer", &info.engineer),
        ("Product", &info.product),
        ("Software", &info.software),
        ("ROM", &info.rom_name),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("{}: {}", label, value);
        }
    }
    if let Some(v) = info.rom_version {
        println!("ROM version: {}.{}", v.major, v.minor);
    }
    println!("Sample encoding: {:?}", parsed.sample_encoding());
    println!("Presets: {}", parsed.preset_headers.len());
    println!("Instruments: {}", parsed.instruments.len());
    println!("Samples: {}", parsed.sample_headers.len());
}

fn print_presets(sf: &SoundFont, zones: bool) {
    for (ix, preset) in sf.parsed.preset_headers.iter().enumerate() {
        println!("{:03}:{:03} {}", preset.bank, preset.preset, preset.preset_name);
        if !zones {
            continue;
        }
        for (zone_ix, zone) in sf.preset_zones(ix).iter().enumerate() {
            println!("  Preset zone {}: {:?}", zone_ix, zone.generators);
            if !zone.modulators.is_empty() {
                println!("    Modulators: {:?}", zone.modulators);
            }
            let instrument = match zone.generators.value(GeneratorType::Instrument) {
                Some(v) if v.value >= 0 => v.value as usize,
                _ => continue,
            };
            if let Some(inst) = sf.parsed.instruments.get(instrument) {
                println!("    Instrument: {}", inst.instrument_name);
            }
            for (inst_zone_ix, inst_zone) in sf.instrument_zones(instrument).iter().enumerate() {
                println!("      Instrument zone {}: {:?}", inst_zone_ix, inst_zone.generators);
                if !inst_zone.modulators.is_empty() {
                    println!("        Modulators: {:?}", inst_zone.modulators);
                }
            }
        }
    }
}

fn print_voice(sf: &SoundFont, matches: &ArgMatches) -> Result<()> {
    let bank = number(matches, "bank")?;
    let program = number(matches, "program")?;
    let key: u8 = number(matches, "key")?;
    let velocity: u8 = number(matches, "velocity")?;
    if key > 127 || velocity > 127 {
        bail!("key and velocity must be in 0..=127");
    }
    let voice = match sf.get_voice(bank, program, key, velocity) {
        Some(voice) => voice,
        None => {
            println!(
                "Not playable: bank {} program {} key {} velocity {}",
                bank, program, key, velocity
            );
            return Ok(());
        }
    };
    let p = voice.get_all_params(&ControllerState::for_note(key, velocity));
    println!("Sample: {} ({} Hz, {} bytes)", p.sample_name, p.sample_rate, p.sample.len());
    println!(
        "Window: start {} end {} loop {}..{} mode {}",
        p.start, p.end, p.loop_start, p.loop_end, p.sample_modes
    );
    println!("Playback rate: {:.6}", p.playback_rate);
    println!("Attenuation: {:.1} cB, pan {:.3}", p.initial_attenuation, p.pan);
    println!("Filter: fc {:.0} q {:.0}", p.initial_filter_fc, p.initial_filter_q);
    println!(
        "Volume envelope: delay {:.3} attack {:.3} hold {:.3} \
         decay {:.3} sustain {:.3} release {:.3}",
        p.vol_delay, p.vol_attack, p.vol_hold, p.vol_decay, p.vol_sustain, p.vol_release
    );
    println!(
        "Modulation envelope: delay {:.3} attack {:.3} hold {:.3} \
         decay {:.3} sustain {:.3} release {:.3}",
        p.mod_delay, p.mod_attack, p.mod_hold, p.mod_decay, p.mod_sustain, p.mod_release
    );
    println!(
        "Modulation LFO: delay {:.3} freq {:.0} to pitch {:.0} to filter {:.0} to volume {:.0}",
        p.delay_mod_lfo,
        p.freq_mod_lfo,
        p.mod_lfo_to_pitch,
        p.mod_lfo_to_filter_fc,
        p.mod_lfo_to_volume
    );
    println!(
        "Vibrato LFO: delay {:.3} freq {:.0} to pitch {:.0}",
        p.delay_vib_lfo, p.freq_vib_lfo, p.vib_lfo_to_pitch
    );
    println!("Sends: chorus {:.3} reverb {:.3}", p.chorus_effects_send, p.reverb_effects_send);
    println!("Exclusive class: {}", p.exclusive_class);
    Ok(())
}

fn export_samples(sf: &SoundFont, folder: &Path) -> Result<()> {
    if sf.parsed.sample_encoding() == SampleEncoding::Compressed {
        warn!("Compressed samples cannot be exported");
        return Ok(());
    }
    info!("saving samples to {}", folder.display());
    fs::create_dir_all(folder)?;
    for (ix, (header, data)) in sf
        .parsed
        .sample_headers
        .iter()
        .zip(&sf.parsed.samples)
        .enumerate()
    {
        match header.sample_type {
            sample_type::MONO | sample_type::RIGHT | sample_type::LEFT => {
                let h = wav::Header::new(wav::WAV_FORMAT_PCM, 1, header.sample_rate, 16);
                let name = format!("{} - {}.wav", ix, SoundFont::safe_name(&header.sample_name));
                let file_path = folder.join(name);
                info!("saving sample {} to {}", header.sample_name, file_path.display());
                let out: Vec<i16> = data
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect();
                let mut out_file = fs::File::create(&file_path)
                    .with_context(|| format!("creating {}", file_path.display()))?;
                wav::write(h, &wav::BitDepth::Sixteen(out), &mut out_file)?;
            }
            _ => {
                warn!(
                    "Unsupported sample type: {}, name: {}",
                    header.sample_type, header.sample_name
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let file = Arg::with_name("FILE")
        .help("SoundFont file (.sf2 or .sf3)")
        .required(true)
        .index(1);
    let matches = App::new("sf2voice")
        .about("Inspect SoundFont files and resolve notes into voices")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .help("Log the chunk structure while parsing"),
        )
        .arg(
            Arg::with_name("big-endian")
                .long("big-endian")
                .global(true)
                .help("Read the outer RIFF size as big-endian"),
        )
        .arg(
            Arg::with_name("no-padding")
                .long("no-padding")
                .global(true)
                .help("Do not skip RIFF pad bytes after odd-sized chunks"),
        )
        .subcommand(
            SubCommand::with_name("info")
                .about("Print file metadata")
                .arg(file.clone()),
        )
        .subcommand(
            SubCommand::with_name("presets")
                .about("List presets")
                .arg(file.clone())
                .arg(
                    Arg::with_name("zones")
                        .long("zones")
                        .help("Also dump preset and instrument zones"),
                ),
        )
        .subcommand(
            SubCommand::with_name("voice")
                .about("Resolve a note and print its voice parameters")
                .arg(file.clone())
                .arg(Arg::with_name("bank").long("bank").takes_value(true).default_value("0"))
                .arg(Arg::with_name("program").long("program").takes_value(true).default_value("0"))
                .arg(Arg::with_name("key").long("key").takes_value(true).default_value("60"))
                .arg(
                    Arg::with_name("velocity")
                        .long("velocity")
                        .takes_value(true)
                        .default_value("100"),
                ),
        )
        .subcommand(
            SubCommand::with_name("export")
                .about("Write the PCM samples as WAV files")
                .arg(file)
                .arg(Arg::with_name("DIR").required(true).index(2)),
        )
        .get_matches();

    let level = if matches.is_present("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match matches.subcommand() {
        ("info", Some(m)) => print_info(&load(m)?),
        ("presets", Some(m)) => print_presets(&load(m)?, m.is_present("zones")),
        ("voice", Some(m)) => print_voice(&load(m)?, m)?,
        ("export", Some(m)) => {
            let folder = Path::new(m.value_of("DIR").context("missing DIR")?);
            export_samples(&load(m)?, folder)?;
        }
        _ => unreachable!(),
    }
    Ok(())
}
