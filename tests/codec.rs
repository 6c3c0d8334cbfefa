//! End-to-end encode/decode scenarios over real files.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use rand::{ChaChaRng, Rng, SeedableRng};

use cubist::partition::Shape3D;
use cubist::plane::Volume;
use cubist::yuv::YuvReader;
use cubist::{decoder, paths, rdo, resample, stats};
use cubist::{
    decode_sequence, encode_sequence, run_codec, CodecError, Config, DecodingType, EncodingType,
};

static SEQUENCE_ID: AtomicUsize = AtomicUsize::new(0);

// <tmp>/cubist-tests-<pid>/<n>/<rows>_<cols>/seq.yuv
fn write_sequence(rows: usize, cols: usize, data: &[u8]) -> PathBuf {
    let id = SEQUENCE_ID.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir()
        .join(format!("cubist-tests-{}", std::process::id()))
        .join(id.to_string())
        .join(format!("{}_{}", rows, cols));
    fs::create_dir_all(&dir).unwrap();

    let path = dir.join("seq.yuv");
    fs::write(&path, data).unwrap();
    path
}

// one 4:2:0 frame from per-pixel generators over (row, col)
fn frame(rows: usize, cols: usize, y: impl Fn(usize, usize) -> u8, uv: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(rows * cols * 3 / 2);
    for r in 0..rows {
        for c in 0..cols {
            data.push(y(r, c));
        }
    }
    data.extend(std::iter::repeat(uv).take(2 * (rows / 2) * (cols / 2)));
    data
}

fn noise_frames(rows: usize, cols: usize, count: usize, seed: u8) -> Vec<u8> {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    (0..count * rows * cols * 3 / 2).map(|_| ra.gen::<u8>()).collect()
}

fn run(path: &PathBuf, config: &Config) {
    encode_sequence(path, config).unwrap();
    decode_sequence(path, config).unwrap();
}

fn decoded_bytes(path: &PathBuf) -> Vec<u8> {
    fs::read(paths::decoded_sequence_path(path)).unwrap()
}

#[test]
fn constant_gray_at_full_rate_decodes_exactly() {
    // scenario A: the whole frame is flat, so every mode is lossless and the
    // RD hull keeps only its cheapest vertex
    let source = frame(16, 16, |_, _| 128, 128);
    let path = write_sequence(16, 16, &source);
    let config = Config::new(16, 16, 1, 24.0, EncodingType::PickRepeat, DecodingType::Repeat).unwrap();

    run(&path, &config);

    assert_eq!(decoded_bytes(&path), source);
    // coarsest mode: 2x2 luma grid plus one sample per chroma plane
    assert_eq!(fs::read(paths::code_path(&path)).unwrap().len(), 6);
    assert_eq!(fs::read(paths::metadata_path(&path)).unwrap().len(), 4 + 1);
}

#[test]
fn constant_gray_at_low_rate_decodes_exactly() {
    // scenario B: a constant field survives any reconstruction
    let source = frame(16, 16, |_, _| 128, 128);
    let path = write_sequence(16, 16, &source);
    let config = Config::new(16, 16, 1, 1.5, EncodingType::PickRepeat, DecodingType::Repeat).unwrap();

    run(&path, &config);

    assert_eq!(decoded_bytes(&path), source);
    assert!(decoded_bytes(&path).iter().all(|&b| b == 128));
}

#[test]
fn full_rate_round_trips_are_byte_exact_for_every_pairing() {
    // property 7: at 24 bpp the densest mode wins on non-degenerate content
    // and reproduces the source exactly under every valid pairing
    let pairings = [
        (EncodingType::PickRepeat, DecodingType::Repeat),
        (EncodingType::PickRepeat, DecodingType::Interpolate),
        (EncodingType::PickInterpolate, DecodingType::Interpolate),
        (EncodingType::AverageRepeat, DecodingType::Repeat),
        (EncodingType::AverageRepeat, DecodingType::Interpolate),
        (EncodingType::AverageInterpolate, DecodingType::Interpolate),
    ];

    let source = noise_frames(16, 16, 2, 42);
    for &(encoding, decoding) in &pairings {
        let path = write_sequence(16, 16, &source);
        let config = Config::new(16, 16, 1, 24.0, encoding, decoding).unwrap();
        run(&path, &config);
        assert_eq!(decoded_bytes(&path), source, "pairing {}/{}", encoding, decoding);
    }
}

#[test]
fn edge_clipped_blocks_round_trip() {
    // property 10: 24x24 frames tile into 16s plus clipped 8-wide edges
    let source = noise_frames(24, 24, 2, 7);
    let path = write_sequence(24, 24, &source);
    let config = Config::new(16, 16, 1, 24.0, EncodingType::PickRepeat, DecodingType::Repeat).unwrap();

    run(&path, &config);

    assert_eq!(decoded_bytes(&path), source);
}

#[test]
fn cross_boundary_reconstruction_keeps_a_ramp_continuous() {
    // scenario C: a horizontal luma ramp must come back with no block-edge
    // discontinuity
    let mut source = frame(32, 32, |_, c| c as u8, 128);
    source.extend(frame(32, 32, |_, c| c as u8, 128));
    let path = write_sequence(32, 32, &source);
    let config =
        Config::new(16, 16, 2, 4.0, EncodingType::PickInterpolate, DecodingType::Interpolate).unwrap();

    run(&path, &config);

    let decoded = decoded_bytes(&path);
    let frame_size = 32 * 32 * 3 / 2;
    assert_eq!(decoded.len(), 2 * frame_size);
    for f in 0..2 {
        let y = &decoded[f * frame_size..f * frame_size + 32 * 32];
        for r in 0..32 {
            for c in 0..31 {
                let a = i16::from(y[r * 32 + c]);
                let b = i16::from(y[r * 32 + c + 1]);
                assert!((a - b).abs() <= 1, "frame {} row {} col {}: {} vs {}", f, r, c, a, b);
            }
        }
    }
}

#[test]
fn trailing_frames_shorter_than_a_part_are_dropped() {
    // scenario D: 9 frames with a 4-frame part depth keep exactly 8
    let source = noise_frames(16, 16, 9, 3);
    let path = write_sequence(16, 16, &source);
    let config = Config::new(16, 16, 4, 2.0, EncodingType::PickRepeat, DecodingType::Repeat).unwrap();

    run(&path, &config);

    assert_eq!(decoded_bytes(&path).len(), 8 * 16 * 16 * 3 / 2);
    assert_eq!(fs::read(paths::metadata_path(&path)).unwrap().len(), 4 + 2);
}

#[test]
fn encoding_is_deterministic() {
    // property 8
    let source = noise_frames(16, 16, 4, 11);
    let path = write_sequence(16, 16, &source);
    let config =
        Config::new(16, 16, 2, 1.5, EncodingType::AverageRepeat, DecodingType::Repeat).unwrap();

    encode_sequence(&path, &config).unwrap();
    let code_a = fs::read(paths::code_path(&path)).unwrap();
    let meta_a = fs::read(paths::metadata_path(&path)).unwrap();

    encode_sequence(&path, &config).unwrap();
    assert_eq!(fs::read(paths::code_path(&path)).unwrap(), code_a);
    assert_eq!(fs::read(paths::metadata_path(&path)).unwrap(), meta_a);
}

#[test]
fn reported_distortion_matches_the_decoded_output() {
    // property 9: with a matching pairing, the in-loop model used during RD
    // search is the real decoder
    let source = noise_frames(16, 16, 1, 25);
    let path = write_sequence(16, 16, &source);
    let config =
        Config::new(16, 16, 1, 3.0, EncodingType::AverageRepeat, DecodingType::Repeat).unwrap();

    run(&path, &config);

    // rebuild the single block's in-loop reconstruction for the chosen mode
    let mode_id = fs::read(paths::metadata_path(&path)).unwrap()[4];
    let mode = config.get_mode(mode_id as usize, config.block).unwrap();

    let mut reader = YuvReader::new(Box::new(std::io::Cursor::new(source)), 16, 16);
    let frame = reader.read_frame().unwrap().unwrap();
    let shape = Shape3D::new(16, 16, 1);
    let planes: Vec<Volume> = frame
        .planes
        .iter()
        .map(|p| Volume::from_vec(p.clone(), shape))
        .collect();

    let y = resample::averages_3d(&planes[0], mode.y_chunk, mode.y_points);
    let u = resample::averages_3d(&planes[1], mode.uv_chunk, mode.uv_points);
    let v = resample::averages_3d(&planes[2], mode.uv_chunk, mode.uv_points);
    let (yd, ud, vd) = decoder::reconstruct_samples(&y, &u, &v, &mode, DecodingType::Repeat);
    let expected = rdo::merged_mse([&planes[0], &planes[1], &planes[2]], [&yd, &ud, &vd]);

    let (actual, _) = stats::calculate_metrics(&path, &paths::decoded_sequence_path(&path)).unwrap();
    assert!((actual - expected).abs() < 1e-9, "{} vs {}", actual, expected);
}

#[test]
fn corrupt_mode_byte_is_rejected() {
    // scenario F
    let source = noise_frames(16, 16, 2, 9);
    let path = write_sequence(16, 16, &source);
    let config = Config::new(16, 16, 1, 2.0, EncodingType::PickRepeat, DecodingType::Repeat).unwrap();

    encode_sequence(&path, &config).unwrap();
    let mut meta = fs::read(paths::metadata_path(&path)).unwrap();
    meta[4] = 0xff;
    fs::write(paths::metadata_path(&path), &meta).unwrap();

    match decode_sequence(&path, &config) {
        Err(CodecError::InvalidModeIndex(0xff)) => {}
        other => panic!("expected InvalidModeIndex, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn truncated_code_stream_is_rejected() {
    let source = noise_frames(16, 16, 2, 13);
    let path = write_sequence(16, 16, &source);
    let config = Config::new(16, 16, 1, 2.0, EncodingType::PickRepeat, DecodingType::Repeat).unwrap();

    encode_sequence(&path, &config).unwrap();
    let code = fs::read(paths::code_path(&path)).unwrap();
    fs::write(paths::code_path(&path), &code[..code.len() - 1]).unwrap();

    match decode_sequence(&path, &config) {
        Err(CodecError::TruncatedInput) => {}
        other => panic!("expected TruncatedInput, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn run_codec_emits_every_artifact_of_a_batch_step() {
    let source = noise_frames(16, 16, 2, 21);
    let path = write_sequence(16, 16, &source);
    let config = Config::new(16, 16, 1, 2.0, EncodingType::PickRepeat, DecodingType::Repeat).unwrap();

    let record = run_codec(&path, &config).unwrap();
    assert_eq!(record.frames, 2);
    assert!(record.encoding_time_s >= 0.0 && record.decoding_time_s >= 0.0);

    assert!(paths::code_path(&path).exists());
    assert!(paths::metadata_path(&path).exists());
    assert!(paths::decoded_sequence_path(&path).exists());
    assert!(paths::intensity_map_path(&path).exists());
    assert!(paths::error_map_path(&paths::decoded_sequence_path(&path)).exists());
    #[cfg(feature = "serde_json")]
    assert!(paths::stats_path(&path).exists());
}

#[test]
fn stats_and_maps_cover_the_whole_sequence() {
    let source = noise_frames(16, 16, 4, 17);
    let path = write_sequence(16, 16, &source);
    let config =
        Config::new(16, 16, 2, 2.0, EncodingType::AverageRepeat, DecodingType::Interpolate).unwrap();

    run(&path, &config);

    let record = stats::gather_stats(&path, &config, 0.1, 0.1).unwrap();
    assert_eq!(record.frames, 4);
    assert!(record.bpp > 0.0 && record.bpp <= record.bpp_including_meta);
    assert!(record.psnr > 0.0);

    stats::write_error_map(&path, &paths::decoded_sequence_path(&path)).unwrap();
    let map = fs::read(paths::error_map_path(&paths::decoded_sequence_path(&path))).unwrap();
    assert_eq!(map.len(), 4 * 16 * 16);

    stats::write_intensity_map(&path, &config).unwrap();
    let map = fs::read(paths::intensity_map_path(&path)).unwrap();
    assert_eq!(map.len(), 4 * 16 * 16);
}

#[cfg(not(feature = "quick_test"))]
#[test]
fn larger_sequence_with_deep_blocks_round_trips() {
    let source = noise_frames(64, 64, 8, 29);
    let path = write_sequence(64, 64, &source);
    let config = Config::new(16, 16, 4, 2.0, EncodingType::AverageInterpolate, DecodingType::Interpolate)
        .unwrap();

    run(&path, &config);

    assert_eq!(decoded_bytes(&path).len(), 8 * 64 * 64 * 3 / 2);
    let (mse, psnr) = stats::calculate_metrics(&path, &paths::decoded_sequence_path(&path)).unwrap();
    assert!(mse > 0.0 && mse < rdo::DISTORTION_MAX);
    assert!(psnr.is_finite());
}
