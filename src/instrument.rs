//! General MIDI instrument table: hyphenated lowercase names to program
//! numbers, per the collaborator interface the generator and SMF-reader
//! reverse-lowering both depend on.

/// A General MIDI program, 0-127, plus whether it denotes the percussion
/// kit (channel 10, program number not applicable in the usual sense).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GmInstrument {
    pub program: u8,
    pub percussion: bool,
}

/// The General MIDI Level 1 instrument list, 0-based, as explicit
/// discriminants rather than a name/number table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GmProgram {
    AcousticGrandPiano = 0,
    BrightAcousticPiano = 1,
    ElectricGrandPiano = 2,
    HonkyTonkPiano = 3,
    ElectricPiano1 = 4,
    ElectricPiano2 = 5,
    Harpsichord = 6,
    Clavinet = 7,
    Celesta = 8,
    Glockenspiel = 9,
    MusicBox = 10,
    Vibraphone = 11,
    Marimba = 12,
    Xylophone = 13,
    TubularBells = 14,
    Dulcimer = 15,
    DrawbarOrgan = 16,
    PercussiveOrgan = 17,
    RockOrgan = 18,
    ChurchOrgan = 19,
    ReedOrgan = 20,
    Accordion = 21,
    Harmonica = 22,
    TangoAccordion = 23,
    AcousticGuitarNylon = 24,
    AcousticGuitarSteel = 25,
    ElectricGuitarJazz = 26,
    ElectricGuitarClean = 27,
    ElectricGuitarMuted = 28,
    OverdrivenGuitar = 29,
    DistortionGuitar = 30,
    GuitarHarmonics = 31,
    AcousticBass = 32,
    ElectricBassFinger = 33,
    ElectricBassPick = 34,
    FretlessBass = 35,
    SlapBass1 = 36,
    SlapBass2 = 37,
    SynthBass1 = 38,
    SynthBass2 = 39,
    Violin = 40,
    Viola = 41,
    Cello = 42,
    Contrabass = 43,
    TremoloStrings = 44,
    PizzicatoStrings = 45,
    OrchestralHarp = 46,
    Timpani = 47,
    StringEnsemble1 = 48,
    StringEnsemble2 = 49,
    SynthStrings1 = 50,
    SynthStrings2 = 51,
    ChoirAahs = 52,
    VoiceOohs = 53,
    SynthChoir = 54,
    OrchestraHit = 55,
    Trumpet = 56,
    Trombone = 57,
    Tuba = 58,
    MutedTrumpet = 59,
    FrenchHorn = 60,
    BrassSection = 61,
    SynthBrass1 = 62,
    SynthBrass2 = 63,
    SopranoSax = 64,
    AltoSax = 65,
    TenorSax = 66,
    BaritoneSax = 67,
    Oboe = 68,
    EnglishHorn = 69,
    Bassoon = 70,
    Clarinet = 71,
    Piccolo = 72,
    Flute = 73,
    Recorder = 74,
    PanFlute = 75,
    BlownBottle = 76,
    Shakuhachi = 77,
    Whistle = 78,
    Ocarina = 79,
    LeadSquare = 80,
    LeadSawtooth = 81,
    LeadCalliope = 82,
    LeadChiff = 83,
    LeadCharang = 84,
    LeadVoice = 85,
    LeadFifths = 86,
    LeadBassAndLead = 87,
    PadNewAge = 88,
    PadWarm = 89,
    PadPolysynth = 90,
    PadChoir = 91,
    PadBowed = 92,
    PadMetallic = 93,
    PadHalo = 94,
    PadSweep = 95,
    FxRain = 96,
    FxSoundtrack = 97,
    FxCrystal = 98,
    FxAtmosphere = 99,
    FxBrightness = 100,
    FxGoblins = 101,
    FxEchoes = 102,
    FxSciFi = 103,
    Sitar = 104,
    Banjo = 105,
    Shamisen = 106,
    Koto = 107,
    Kalimba = 108,
    Bagpipe = 109,
    Fiddle = 110,
    Shanai = 111,
    TinkleBell = 112,
    Agogo = 113,
    SteelDrums = 114,
    Woodblock = 115,
    TaikoDrum = 116,
    MelodicTom = 117,
    SynthDrum = 118,
    ReverseCymbal = 119,
    GuitarFretNoise = 120,
    BreathNoise = 121,
    Seashore = 122,
    BirdTweet = 123,
    TelephoneRing = 124,
    Helicopter = 125,
    Applause = 126,
    Gunshot = 127,
}

impl GmProgram {
    pub const ALL: [GmProgram; 128] = [
        GmProgram::AcousticGrandPiano, GmProgram::BrightAcousticPiano, GmProgram::ElectricGrandPiano, GmProgram::HonkyTonkPiano, GmProgram::ElectricPiano1, GmProgram::ElectricPiano2, GmProgram::Harpsichord, GmProgram::Clavinet,
        GmProgram::Celesta, GmProgram::Glockenspiel, GmProgram::MusicBox, GmProgram::Vibraphone, GmProgram::Marimba, GmProgram::Xylophone, GmProgram::TubularBells, GmProgram::Dulcimer,
        GmProgram::DrawbarOrgan, GmProgram::PercussiveOrgan, GmProgram::RockOrgan, GmProgram::ChurchOrgan, GmProgram::ReedOrgan, GmProgram::Accordion, GmProgram::Harmonica, GmProgram::TangoAccordion,
        GmProgram::AcousticGuitarNylon, GmProgram::AcousticGuitarSteel, GmProgram::ElectricGuitarJazz, GmProgram::ElectricGuitarClean, GmProgram::ElectricGuitarMuted, GmProgram::OverdrivenGuitar, GmProgram::DistortionGuitar, GmProgram::GuitarHarmonics,
        GmProgram::AcousticBass, GmProgram::ElectricBassFinger, GmProgram::ElectricBassPick, GmProgram::FretlessBass, GmProgram::SlapBass1, GmProgram::SlapBass2, GmProgram::SynthBass1, GmProgram::SynthBass2,
        GmProgram::Violin, GmProgram::Viola, GmProgram::Cello, GmProgram::Contrabass, GmProgram::TremoloStrings, GmProgram::PizzicatoStrings, GmProgram::OrchestralHarp, GmProgram::Timpani,
        GmProgram::StringEnsemble1, GmProgram::StringEnsemble2, GmProgram::SynthStrings1, GmProgram::SynthStrings2, GmProgram::ChoirAahs, GmProgram::VoiceOohs, GmProgram::SynthChoir, GmProgram::OrchestraHit,
        GmProgram::Trumpet, GmProgram::Trombone, GmProgram::Tuba, GmProgram::MutedTrumpet, GmProgram::FrenchHorn, GmProgram::BrassSection, GmProgram::SynthBrass1, GmProgram::SynthBrass2,
        GmProgram::SopranoSax, GmProgram::AltoSax, GmProgram::TenorSax, GmProgram::BaritoneSax, GmProgram::Oboe, GmProgram::EnglishHorn, GmProgram::Bassoon, GmProgram::Clarinet,
        GmProgram::Piccolo, GmProgram::Flute, GmProgram::Recorder, GmProgram::PanFlute, GmProgram::BlownBottle, GmProgram::Shakuhachi, GmProgram::Whistle, GmProgram::Ocarina,
        GmProgram::LeadSquare, GmProgram::LeadSawtooth, GmProgram::LeadCalliope, GmProgram::LeadChiff, GmProgram::LeadCharang, GmProgram::LeadVoice, GmProgram::LeadFifths, GmProgram::LeadBassAndLead,
        GmProgram::PadNewAge, GmProgram::PadWarm, GmProgram::PadPolysynth, GmProgram::PadChoir, GmProgram::PadBowed, GmProgram::PadMetallic, GmProgram::PadHalo, GmProgram::PadSweep,
        GmProgram::FxRain, GmProgram::FxSoundtrack, GmProgram::FxCrystal, GmProgram::FxAtmosphere, GmProgram::FxBrightness, GmProgram::FxGoblins, GmProgram::FxEchoes, GmProgram::FxSciFi,
        GmProgram::Sitar, GmProgram::Banjo, GmProgram::Shamisen, GmProgram::Koto, GmProgram::Kalimba, GmProgram::Bagpipe, GmProgram::Fiddle, GmProgram::Shanai,
        GmProgram::TinkleBell, GmProgram::Agogo, GmProgram::SteelDrums, GmProgram::Woodblock, GmProgram::TaikoDrum, GmProgram::MelodicTom, GmProgram::SynthDrum, GmProgram::ReverseCymbal,
        GmProgram::GuitarFretNoise, GmProgram::BreathNoise, GmProgram::Seashore, GmProgram::BirdTweet, GmProgram::TelephoneRing, GmProgram::Helicopter, GmProgram::Applause, GmProgram::Gunshot,
    ];

    pub fn program(self) -> u8 {
        self as u8
    }

    /// The hyphenated lowercase name this variant is addressed by in Alda
    /// instrument declarations.
    pub fn name(self) -> &'static str {
        match self {
            GmProgram::AcousticGrandPiano => "acoustic-grand-piano",
            GmProgram::BrightAcousticPiano => "bright-acoustic-piano",
            GmProgram::ElectricGrandPiano => "electric-grand-piano",
            GmProgram::HonkyTonkPiano => "honky-tonk-piano",
            GmProgram::ElectricPiano1 => "electric-piano-1",
            GmProgram::ElectricPiano2 => "electric-piano-2",
            GmProgram::Harpsichord => "harpsichord",
            GmProgram::Clavinet => "clavinet",
            GmProgram::Celesta => "celesta",
            GmProgram::Glockenspiel => "glockenspiel",
            GmProgram::MusicBox => "music-box",
            GmProgram::Vibraphone => "vibraphone",
            GmProgram::Marimba => "marimba",
            GmProgram::Xylophone => "xylophone",
            GmProgram::TubularBells => "tubular-bells",
            GmProgram::Dulcimer => "dulcimer",
            GmProgram::DrawbarOrgan => "drawbar-organ",
            GmProgram::PercussiveOrgan => "percussive-organ",
            GmProgram::RockOrgan => "rock-organ",
            GmProgram::ChurchOrgan => "church-organ",
            GmProgram::ReedOrgan => "reed-organ",
            GmProgram::Accordion => "accordion",
            GmProgram::Harmonica => "harmonica",
            GmProgram::TangoAccordion => "tango-accordion",
            GmProgram::AcousticGuitarNylon => "acoustic-guitar-nylon",
            GmProgram::AcousticGuitarSteel => "acoustic-guitar-steel",
            GmProgram::ElectricGuitarJazz => "electric-guitar-jazz",
            GmProgram::ElectricGuitarClean => "electric-guitar-clean",
            GmProgram::ElectricGuitarMuted => "electric-guitar-muted",
            GmProgram::OverdrivenGuitar => "overdriven-guitar",
            GmProgram::DistortionGuitar => "distortion-guitar",
            GmProgram::GuitarHarmonics => "guitar-harmonics",
            GmProgram::AcousticBass => "acoustic-bass",
            GmProgram::ElectricBassFinger => "electric-bass-finger",
            GmProgram::ElectricBassPick => "electric-bass-pick",
            GmProgram::FretlessBass => "fretless-bass",
            GmProgram::SlapBass1 => "slap-bass-1",
            GmProgram::SlapBass2 => "slap-bass-2",
            GmProgram::SynthBass1 => "synth-bass-1",
            GmProgram::SynthBass2 => "synth-bass-2",
            GmProgram::Violin => "violin",
            GmProgram::Viola => "viola",
            GmProgram::Cello => "cello",
            GmProgram::Contrabass => "contrabass",
            GmProgram::TremoloStrings => "tremolo-strings",
            GmProgram::PizzicatoStrings => "pizzicato-strings",
            GmProgram::OrchestralHarp => "orchestral-harp",
            GmProgram::Timpani => "timpani",
            GmProgram::StringEnsemble1 => "string-ensemble-1",
            GmProgram::StringEnsemble2 => "string-ensemble-2",
            GmProgram::SynthStrings1 => "synth-strings-1",
            GmProgram::SynthStrings2 => "synth-strings-2",
            GmProgram::ChoirAahs => "choir-aahs",
            GmProgram::VoiceOohs => "voice-oohs",
            GmProgram::SynthChoir => "synth-choir",
            GmProgram::OrchestraHit => "orchestra-hit",
            GmProgram::Trumpet => "trumpet",
            GmProgram::Trombone => "trombone",
            GmProgram::Tuba => "tuba",
            GmProgram::MutedTrumpet => "muted-trumpet",
            GmProgram::FrenchHorn => "french-horn",
            GmProgram::BrassSection => "brass-section",
            GmProgram::SynthBrass1 => "synth-brass-1",
            GmProgram::SynthBrass2 => "synth-brass-2",
            GmProgram::SopranoSax => "soprano-sax",
            GmProgram::AltoSax => "alto-sax",
            GmProgram::TenorSax => "tenor-sax",
            GmProgram::BaritoneSax => "baritone-sax",
            GmProgram::Oboe => "oboe",
            GmProgram::EnglishHorn => "english-horn",
            GmProgram::Bassoon => "bassoon",
            GmProgram::Clarinet => "clarinet",
            GmProgram::Piccolo => "piccolo",
            GmProgram::Flute => "flute",
            GmProgram::Recorder => "recorder",
            GmProgram::PanFlute => "pan-flute",
            GmProgram::BlownBottle => "blown-bottle",
            GmProgram::Shakuhachi => "shakuhachi",
            GmProgram::Whistle => "whistle",
            GmProgram::Ocarina => "ocarina",
            GmProgram::LeadSquare => "lead-square",
            GmProgram::LeadSawtooth => "lead-sawtooth",
            GmProgram::LeadCalliope => "lead-calliope",
            GmProgram::LeadChiff => "lead-chiff",
            GmProgram::LeadCharang => "lead-charang",
            GmProgram::LeadVoice => "lead-voice",
            GmProgram::LeadFifths => "lead-fifths",
            GmProgram::LeadBassAndLead => "lead-bass-and-lead",
            GmProgram::PadNewAge => "pad-new-age",
            GmProgram::PadWarm => "pad-warm",
            GmProgram::PadPolysynth => "pad-polysynth",
            GmProgram::PadChoir => "pad-choir",
            GmProgram::PadBowed => "pad-bowed",
            GmProgram::PadMetallic => "pad-metallic",
            GmProgram::PadHalo => "pad-halo",
            GmProgram::PadSweep => "pad-sweep",
            GmProgram::FxRain => "fx-rain",
            GmProgram::FxSoundtrack => "fx-soundtrack",
            GmProgram::FxCrystal => "fx-crystal",
            GmProgram::FxAtmosphere => "fx-atmosphere",
            GmProgram::FxBrightness => "fx-brightness",
            GmProgram::FxGoblins => "fx-goblins",
            GmProgram::FxEchoes => "fx-echoes",
            GmProgram::FxSciFi => "fx-sci-fi",
            GmProgram::Sitar => "sitar",
            GmProgram::Banjo => "banjo",
            GmProgram::Shamisen => "shamisen",
            GmProgram::Koto => "koto",
            GmProgram::Kalimba => "kalimba",
            GmProgram::Bagpipe => "bagpipe",
            GmProgram::Fiddle => "fiddle",
            GmProgram::Shanai => "shanai",
            GmProgram::TinkleBell => "tinkle-bell",
            GmProgram::Agogo => "agogo",
            GmProgram::SteelDrums => "steel-drums",
            GmProgram::Woodblock => "woodblock",
            GmProgram::TaikoDrum => "taiko-drum",
            GmProgram::MelodicTom => "melodic-tom",
            GmProgram::SynthDrum => "synth-drum",
            GmProgram::ReverseCymbal => "reverse-cymbal",
            GmProgram::GuitarFretNoise => "guitar-fret-noise",
            GmProgram::BreathNoise => "breath-noise",
            GmProgram::Seashore => "seashore",
            GmProgram::BirdTweet => "bird-tweet",
            GmProgram::TelephoneRing => "telephone-ring",
            GmProgram::Helicopter => "helicopter",
            GmProgram::Applause => "applause",
            GmProgram::Gunshot => "gunshot",
        }
    }
}

/// Looks up a hyphenated lowercase instrument name. `"midi"` is the single
/// name denoting the percussion kit (channel 10).
pub fn lookup(name: &str) -> Option<GmInstrument> {
    if name == "midi" {
        return Some(GmInstrument {
            program: 0,
            percussion: true,
        });
    }
    GmProgram::ALL
        .iter()
        .find(|p| p.name() == name)
        .map(|p| GmInstrument {
            program: p.program(),
            percussion: false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_instrument() {
        let piano = lookup("acoustic-grand-piano").unwrap();
        assert_eq!(piano.program, 0);
        assert!(!piano.percussion);
    }

    #[test]
    fn test_lookup_percussion() {
        let kit = lookup("midi").unwrap();
        assert!(kit.percussion);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        assert!(lookup("not-a-real-instrument").is_none());
    }

    #[test]
    fn test_table_is_0_to_127() {
        assert_eq!(GmProgram::ALL.len(), 128);
        for i in 0..128u8 {
            assert!(GmProgram::ALL.iter().any(|p| p.program() == i), "missing program {i}");
        }
    }

    #[test]
    fn test_program_matches_discriminant() {
        assert_eq!(GmProgram::AcousticGrandPiano.program(), 0);
        assert_eq!(GmProgram::Gunshot.program(), 127);
    }
}
