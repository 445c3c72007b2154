/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Replays a synthetic voice stream through the jitter buffer.
//!
//! Frames are generated on the sender clock, delayed by a base latency plus
//! random jitter, optionally lost or reordered, and polled out on a 1ms
//! clock the way a media thread would.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use jitterbuf::{CodecId, FrameType, Info, JitterBuffer, PollResult, Settings};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Codec {
    GsmEfr,
    G723,
    G729,
    G729a,
    G711Plc,
    G711,
    Other,
}

impl From<Codec> for CodecId {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::GsmEfr => CodecId::GsmEfr,
            Codec::G723 => CodecId::G723_1,
            Codec::G729 => CodecId::G729,
            Codec::G729a => CodecId::G729A,
            Codec::G711Plc => CodecId::G711Plc,
            Codec::G711 => CodecId::G711,
            Codec::Other => CodecId::Other,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(about = "Jitter buffer simulator with synthetic network conditions", version)]
struct Args {
    #[clap(long, default_value_t = 1000, help = "Number of frames to send")]
    frames: u32,

    #[clap(long, default_value_t = 20, help = "Frame duration in ms")]
    frame_ms: i64,

    #[clap(long, default_value_t = 60, help = "Base one-way delay in ms")]
    base_delay: i64,

    #[clap(long, default_value_t = 40, help = "Maximum extra random delay in ms")]
    jitter: i64,

    #[clap(long, default_value_t = 0.0, help = "Network loss in percent")]
    loss: f64,

    #[clap(
        long,
        default_value_t = 0.0,
        help = "Probability that a frame is held back behind its successor"
    )]
    reorder: f64,

    #[clap(long, value_enum, default_value_t = Codec::G711Plc)]
    codec: Codec,

    #[clap(long, default_value_t = 42, help = "Random seed")]
    seed: u64,

    #[clap(long, help = "JSON file with jitter buffer settings")]
    settings: Option<PathBuf>,

    #[clap(long, help = "Print final statistics as JSON")]
    json_stats: bool,
}

#[derive(Debug, Default)]
struct Tally {
    voice: u64,
    control: u64,
    silence: u64,
    interp_ms: i64,
}

/// (arrival time, sender timestamp) for every frame that survives the network
fn generate_arrivals(args: &Args, rng: &mut StdRng) -> Vec<(i64, i64)> {
    let mut arrivals = Vec::with_capacity(args.frames as usize);
    for i in 0..args.frames as i64 {
        if rng.random_bool(args.loss / 100.0) {
            continue;
        }
        let ts = i * args.frame_ms;
        let mut arrival = ts + args.base_delay + rng.random_range(0..=args.jitter);
        if rng.random_bool(args.reorder) {
            arrival += 2 * args.frame_ms;
        }
        arrivals.push((arrival, ts));
    }
    arrivals.sort();
    arrivals
}

fn run(args: &Args, settings: Settings) -> Result<(Tally, Info), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let arrivals = generate_arrivals(args, &mut rng);
    let codec = CodecId::from(args.codec);

    let mut jb: JitterBuffer<u32> = JitterBuffer::new();
    jb.set_settings(settings)?;

    let end = arrivals.last().map_or(0, |(arrival, _)| *arrival) + 1000;
    let mut pending = arrivals.into_iter().peekable();
    let mut tally = Tally::default();

    for now in 0..end {
        while let Some(&(arrival, ts)) = pending.peek() {
            if arrival > now {
                break;
            }
            pending.next();
            jb.put(ts as u32, FrameType::Voice, args.frame_ms, ts, arrival, codec)?;
        }

        if now < jb.next() {
            continue;
        }
        match jb.get(now, args.frame_ms) {
            PollResult::Frame(frame) => match frame.frame_type {
                FrameType::Voice => tally.voice += 1,
                FrameType::Control => tally.control += 1,
                FrameType::Silence => tally.silence += 1,
            },
            PollResult::Interp(ms) => tally.interp_ms += ms,
            PollResult::NoFrame | PollResult::Empty => {}
        }
    }

    Ok((tally, jb.get_info()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if !(0.0..=100.0).contains(&args.loss) || !(0.0..=1.0).contains(&args.reorder) {
        return Err("loss must be within 0..=100 and reorder within 0..=1".into());
    }
    if args.frame_ms <= 0 || args.jitter < 0 {
        return Err("frame-ms must be positive and jitter non-negative".into());
    }

    let settings = match &args.settings {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Settings::default(),
    };
    log::info!("simulating {} frames with {settings:?}", args.frames);

    let (tally, info) = run(&args, settings)?;

    if args.json_stats {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let mos = jitterbuf::guess_mos(info.losspct as f32, info.delay, args.codec.into());
    println!("Frames sent:        {}", args.frames);
    println!("Frames received:    {}", info.frames_received);
    println!("Frames played:      {}", tally.voice);
    println!("Interpolated:       {}ms", tally.interp_ms);
    println!("Late / dropped:     {} / {}", info.frames_late, info.frames_dropped);
    println!("Out of order:       {}", info.frames_ooo);
    println!("Jitter / IQR:       {}ms / {}ms", info.jitter, info.iqr);
    println!("Delay / target:     {}ms / {}ms", info.delay, info.delay_target);
    println!("Loss above delay:   {}%", info.losspct);
    println!("Estimated MOS:      {mos:.2}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["jb_sim"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_clean_network_plays_everything() {
        let args = args(&["--frames", "200", "--jitter", "0"]);
        let (tally, info) = run(&args, Settings::default()).unwrap();
        assert_eq!(tally.voice, 200);
        assert_eq!(tally.interp_ms, 0);
        assert_eq!(info.frames_late, 0);
    }

    #[test]
    fn test_loss_is_concealed() {
        let args = args(&["--frames", "300", "--loss", "10", "--seed", "7"]);
        let settings = Settings {
            max_successive_interp: 5,
            ..Settings::default()
        };
        let (tally, info) = run(&args, settings).unwrap();
        assert!(info.frames_received < 300);
        assert!(tally.voice <= info.frames_received);
        assert!(tally.interp_ms > 0);
    }
}
