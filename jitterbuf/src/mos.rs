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

//! Codec-aware call quality estimate.
//!
//! Each codec family gets a linear E-model style fit
//! `mos = base - loss_weight * loss_percent - delay_weight * delay_ms`.
//! Codecs that conceal loss well have a small loss weight; plain G.711
//! without concealment degrades fastest and doubles as the curve for
//! unknown codecs.

use crate::frame::CodecId;

#[derive(Debug, Clone, Copy, PartialEq)]
struct MosCurve {
    base: f32,
    loss_weight: f32,
    delay_weight: f32,
}

/// Shared by every curve: one-way delay costs the same regardless of codec.
const DELAY_WEIGHT: f32 = 0.0071;

fn curve(codec: CodecId) -> MosCurve {
    let (base, loss_weight) = match codec {
        CodecId::GsmEfr => (4.31, 0.23),
        CodecId::G723_1 => (3.99, 0.16),
        CodecId::G729 | CodecId::G729A => (4.13, 0.14),
        CodecId::G711Plc => (4.42, 0.087),
        CodecId::G711 | CodecId::Other => (4.42, 0.63),
    };
    MosCurve {
        base,
        loss_weight,
        delay_weight: DELAY_WEIGHT,
    }
}

/// Estimate the MOS for a given loss percentage and one-way delay.
///
/// Non-increasing in both `loss_percent` and `delay_ms` for a fixed codec.
pub fn guess_mos(loss_percent: f32, delay_ms: i64, codec: CodecId) -> f32 {
    let c = curve(codec);
    c.base - c.loss_weight * loss_percent - c.delay_weight * delay_ms as f32
}
