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

use jitterbuf::{CodecId, FrameType, JitterBuffer, PollResult, Settings};

fn print_warning(msg: &str) {
    eprintln!("[jb warn] {msg}");
}

fn print_error(msg: &str) {
    eprintln!("[jb error] {msg}");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Jitter Buffer Example");
    println!("=====================");

    let mut jb: JitterBuffer<Vec<u8>> = JitterBuffer::new();
    jb.set_settings(Settings {
        max_jb: 400,
        max_successive_interp: 10,
        ..Default::default()
    })?;
    jb.set_output(Some(print_warning), Some(print_error), None);

    println!("Settings: {:?}", jb.get_settings());

    // 20ms G.711 frames with a repeating jitter pattern; every 17th is lost.
    let frame_ms = 20;
    println!("\nSimulating incoming frames with jitter...");
    for i in 0..60i64 {
        if i % 17 == 16 {
            continue;
        }
        let ts = i * frame_ms;
        let jitter = match i % 5 {
            0 => 5,
            1 => 0,
            2 => 35,
            3 => 2,
            _ => 12,
        };
        jb.put(
            vec![0u8; 160],
            FrameType::Voice,
            frame_ms,
            ts,
            ts + 40 + jitter,
            CodecId::G711Plc,
        )?;

        if i % 10 == 0 {
            println!(
                "Frame {}: target delay {}ms, queued {}",
                i,
                jb.target_delay(),
                jb.queued_voice_frames()
            );
        }
    }

    println!("\nPlaying out...");
    let mut played = 0;
    let mut interpolated = 0;
    let mut now = 0;
    while now < 60 * frame_ms + 500 {
        if now >= jb.next() {
            match jb.get(now, frame_ms) {
                PollResult::Frame(frame) => {
                    played += 1;
                    log::trace!("t={now} played ts={}", frame.timestamp);
                }
                PollResult::Interp(ms) => {
                    interpolated += 1;
                    println!("t={now}: conceal {ms}ms");
                }
                PollResult::NoFrame | PollResult::Empty => {}
            }
        }
        now += 1;
    }

    let info = jb.get_info();
    println!("\nFinal Statistics:");
    println!("================");
    println!("Frames played: {played}");
    println!("Interpolations: {interpolated}");
    println!("Frames received: {}", info.frames_received);
    println!("Frames late: {}", info.frames_late);
    println!("Frames lost: {}", info.frames_lost);
    println!("Out of order: {}", info.frames_ooo);
    println!("Jitter: {}ms, IQR: {}ms", info.jitter, info.iqr);
    println!("Delay: {}ms, target: {}ms", info.delay, info.delay_target);
    println!(
        "Estimated MOS: {:.2}",
        jitterbuf::guess_mos(info.losspct as f32, info.delay, CodecId::G711Plc)
    );

    Ok(())
}
