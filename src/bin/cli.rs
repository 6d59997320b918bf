//! bytesonic CLI: play a file as sound or MIDI, or render it to WAV.
//!
//! Usage:
//!   bs-cli path/to/file
//!   bs-cli path/to/file --settings settings.json --wav output.wav --seconds 30
//!   bs-cli path/to/file --midi 0
//!   bs-cli --list-midi
//!
//! While playing, commands are read from stdin, one per line
//! (`speed 0.02`, `range 100 800`, `bits 16`, `midi on`, `stop`, `quit`, ...).

use bs_core::{
    BitWidth, Fragment, FrequencyMode, FrequencyRange, NoteRange, ParamChange, TransitionCurve,
};
use bs_master::{list_ports, load_settings, Session, Settings};
use crossbeam_channel::RecvTimeoutError;
use std::io::{BufRead, Write};
use std::time::Duration;
use std::{env, fs};

const USAGE: &str = "Usage: bs-cli <file> [--settings s.json] [--wav out.wav] [--seconds N] [--midi PORT] [--list-midi]";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--list-midi") {
        list_midi();
        return;
    }

    let path = args.get(1).filter(|a| !a.starts_with("--")).unwrap_or_else(|| {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    });

    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let mut settings = match flag("--settings") {
        Some(p) => load_settings(&p).unwrap_or_else(|e| {
            eprintln!("Failed to load settings {}: {}", p, e);
            std::process::exit(1);
        }),
        None => Settings::default(),
    };

    let midi_port = flag("--midi").map(|p| {
        p.parse::<usize>().unwrap_or_else(|_| {
            eprintln!("--midi expects a port index, got {}", p);
            std::process::exit(1);
        })
    });
    if midi_port.is_some() {
        settings.midi_mode = true;
    }

    let seconds = flag("--seconds")
        .map(|s| {
            s.parse::<f64>().unwrap_or_else(|_| {
                eprintln!("--seconds expects a number, got {}", s);
                std::process::exit(1);
            })
        })
        .unwrap_or(300.0);

    let mut session = Session::new(settings);
    session.load_file(path).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", path, e);
        std::process::exit(1);
    });

    let src = session.source();
    let s = session.settings();
    println!("File:      {} ({} bytes)", path, src.as_bytes().len());
    println!("Words:     {} ({}-bit)", src.len(s.bit_width), s.bit_width.bits());
    println!("Fragment:  {}..={}", s.fragment.from, s.fragment.to);
    println!("Speed:     {} s/word", s.reading_speed);
    println!(
        "Output:    {}",
        if s.midi_mode { "MIDI" } else { "oscillator" }
    );
    println!();

    match flag("--wav") {
        Some(wav) => render_to_wav(&session, &wav, seconds),
        None => play_live(&mut session, midi_port),
    }
}

fn list_midi() {
    match list_ports() {
        Ok(ports) if ports.is_empty() => println!("No MIDI output ports."),
        Ok(ports) => {
            for port in ports {
                println!("{:>3}: {}", port.index, port.name);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

enum Live {
    Play,
    Stop,
    Quit,
    Change(ParamChange),
}

fn play_live(session: &mut Session, midi_port: Option<usize>) {
    if let Err(e) = session.open_output(midi_port).and_then(|_| session.play()) {
        eprintln!("Failed to start playback: {}", e);
        std::process::exit(1);
    }
    println!("Playing... (type `help` for commands)");

    let (tx, rx) = crossbeam_channel::unbounded::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut was_playing = false;
    let mut idle_polls = 0u32;
    loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(line) => match parse_command(&line) {
                Ok(Some(Live::Quit)) => break,
                Ok(Some(Live::Play)) => report(session.play()),
                Ok(Some(Live::Stop)) => report(session.stop()),
                Ok(Some(Live::Change(change))) => {
                    log::debug!("apply {:?}", change);
                    report(session.apply(change))
                }
                Ok(None) => {}
                Err(msg) => eprintln!("{}", msg),
            },
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed: keep going until playback ends
            Err(RecvTimeoutError::Disconnected) if session.is_playing() || idle_polls < 20 => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let status = session.status();
        if status.playing {
            print!(
                "\rWord: {:>8} | Block: {}..={} | Loop: {}   ",
                status.position(),
                status.block.start,
                status.block.end,
                status.iteration
            );
            let _ = std::io::stdout().flush();
            idle_polls = 0;
        } else {
            if was_playing {
                println!("\rStopped.                                        ");
            }
            idle_polls = idle_polls.saturating_add(1);
        }
        was_playing = status.playing;
    }

    session.close_output();
    println!("\rDone.          ");
}

fn report(result: Result<(), bs_master::SessionError>) {
    if let Err(e) = result {
        eprintln!("{}", e);
    }
}

const HELP: &str = "\
play | stop | quit
speed <seconds>          curve immediate|linear|exponential   gap on|off
range <from> <to>        notes <from> <to>                    mode continuous|tempered
bits 8|16                fragment <from> <to>                 midi on|off
rate <hz>                gain <g>                             filter <hz>   lfo <hz>
channel <0-15>           velocity <0-127>                     modulation <0-127>
solid on|off             loop on|off";

fn parse_command(line: &str) -> Result<Option<Live>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, rest)) = words.split_first() else {
        return Ok(None);
    };

    fn arg<T: std::str::FromStr>(rest: &[&str], i: usize) -> Result<T, String> {
        let raw = rest.get(i).ok_or_else(|| "missing argument".to_string())?;
        raw.parse().map_err(|_| format!("bad argument: {}", raw))
    }
    fn switch(rest: &[&str]) -> Result<bool, String> {
        match rest.first().copied() {
            Some("on") | Some("true") | Some("1") => Ok(true),
            Some("off") | Some("false") | Some("0") => Ok(false),
            _ => Err("expected on|off".to_string()),
        }
    }

    let change = match name {
        "play" => return Ok(Some(Live::Play)),
        "stop" => return Ok(Some(Live::Stop)),
        "quit" | "q" | "exit" => return Ok(Some(Live::Quit)),
        "help" | "?" => {
            println!("{}", HELP);
            return Ok(None);
        }
        "speed" => ParamChange::ReadingSpeed(arg(rest, 0)?),
        "curve" => ParamChange::Transition(match rest.first().copied() {
            Some("immediate") => TransitionCurve::Immediate,
            Some("linear") => TransitionCurve::Linear,
            Some("exponential") | Some("exp") => TransitionCurve::Exponential,
            _ => return Err("expected immediate|linear|exponential".to_string()),
        }),
        "gap" => ParamChange::RandomGap(switch(rest)?),
        "range" => ParamChange::FrequencyRange(FrequencyRange {
            from: arg(rest, 0)?,
            to: arg(rest, 1)?,
        }),
        "notes" => ParamChange::NoteRange(NoteRange {
            from: arg(rest, 0)?,
            to: arg(rest, 1)?,
        }),
        "mode" => ParamChange::FrequencyMode(match rest.first().copied() {
            Some("continuous") => FrequencyMode::Continuous,
            Some("tempered") => FrequencyMode::Tempered,
            _ => return Err("expected continuous|tempered".to_string()),
        }),
        "bits" => ParamChange::BitWidth(match rest.first().copied() {
            Some("8") => BitWidth::Eight,
            Some("16") => BitWidth::Sixteen,
            _ => return Err("expected 8|16".to_string()),
        }),
        "fragment" => ParamChange::Fragment(Fragment {
            from: arg(rest, 0)?,
            to: arg(rest, 1)?,
        }),
        "midi" => ParamChange::MidiMode(switch(rest)?),
        "rate" => ParamChange::SampleRate(arg(rest, 0)?),
        "gain" => ParamChange::Gain(arg(rest, 0)?),
        "channel" => ParamChange::MidiChannel(arg(rest, 0)?),
        "velocity" => ParamChange::Velocity(arg(rest, 0)?),
        "modulation" => ParamChange::Modulation(arg(rest, 0)?),
        "solid" => ParamChange::SolidMode(switch(rest)?),
        "loop" => ParamChange::Loop(switch(rest)?),
        "filter" => ParamChange::FilterCutoff(arg(rest, 0)?),
        "lfo" => ParamChange::LfoRate(arg(rest, 0)?),
        other => return Err(format!("unknown command: {} (try `help`)", other)),
    };
    Ok(Some(Live::Change(change)))
}

fn render_to_wav(session: &Session, path: &str, seconds: f64) {
    let sample_rate = session.settings().sample_rate;
    println!("Rendering to {} at {} Hz (at most {} s)...", path, sample_rate, seconds);

    let wav = session.render_to_wav(seconds).unwrap_or_else(|e| {
        eprintln!("Failed to render: {}", e);
        std::process::exit(1);
    });
    println!("Rendered {} bytes", wav.len());

    fs::write(path, &wav).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {}", path, e);
        std::process::exit(1);
    });

    println!("Done.");
}
