use std::path::PathBuf;
use std::str::FromStr;

use clap::{App, Arg};

use cubist::{CodecError, Config, DecodingType, EncodingType, Result};

struct CliConfig {
    input: PathBuf,
    config: Config,
    emit_stats: bool,
}

fn parse_block(s: &str) -> Result<(usize, usize, usize)> {
    let dims: Vec<usize> = s.split('x').filter_map(|d| d.parse().ok()).collect();
    match dims.as_slice() {
        [rows, cols, frames] => Ok((*rows, *cols, *frames)),
        _ => Err(CodecError::ConfigInvalid(format!(
            "block shape must be given as RxCxF, got {:?}",
            s
        ))),
    }
}

impl CliConfig {
    fn from_cli() -> Result<CliConfig> {
        let matches = App::new("cubist")
            .version("0.1.0")
            .about("Experimental video codec built on adaptive 3D block subsampling")
            .arg(Arg::with_name("INPUT")
                .help("Raw planar YUV 4:2:0 input, inside a directory named H_W")
                .required(true)
                .index(1))
            .arg(Arg::with_name("BLOCK")
                .help("Base block shape as rows x cols x frames")
                .short("b")
                .long("block")
                .takes_value(true)
                .default_value("16x16x16"))
            .arg(Arg::with_name("BPP")
                .help("Target bits per pixel, in (0, 24]")
                .long("bpp")
                .takes_value(true)
                .default_value("1.0"))
            .arg(Arg::with_name("ENCODING")
                .help("Sample extraction strategy")
                .short("e")
                .long("encoding")
                .takes_value(true)
                .possible_values(&[
                    "pick_repeat",
                    "pick_interpolate",
                    "average_repeat",
                    "average_interpolate",
                ])
                .default_value("pick_repeat"))
            .arg(Arg::with_name("DECODING")
                .help("Reconstruction strategy")
                .short("d")
                .long("decoding")
                .takes_value(true)
                .possible_values(&["repeat", "interpolate"])
                .default_value("repeat"))
            .arg(Arg::with_name("STATS")
                .help("Write a .stats JSON record plus error and intensity maps")
                .long("stats"))
            .get_matches();

        let (rows, cols, frames) = parse_block(matches.value_of("BLOCK").unwrap())?;
        let target_bpp: f64 = matches
            .value_of("BPP")
            .unwrap()
            .parse()
            .map_err(|_| CodecError::ConfigInvalid("target bpp is not a number".to_string()))?;
        let encoding = EncodingType::from_str(matches.value_of("ENCODING").unwrap())?;
        let decoding = DecodingType::from_str(matches.value_of("DECODING").unwrap())?;

        Ok(CliConfig {
            input: PathBuf::from(matches.value_of("INPUT").unwrap()),
            config: Config::new(rows, cols, frames, target_bpp, encoding, decoding)?,
            emit_stats: matches.is_present("STATS"),
        })
    }
}

fn run() -> Result<()> {
    let cli = CliConfig::from_cli()?;

    if cli.emit_stats {
        let record = cubist::run_codec(&cli.input, &cli.config)?;
        println!(
            "{}: {:.4} bpp, {:.2} dB PSNR, encoded in {:.2}s, decoded in {:.2}s",
            record.experiment, record.bpp, record.psnr, record.encoding_time_s, record.decoding_time_s
        );
    } else {
        cubist::encode_sequence(&cli.input, &cli.config)?;
        cubist::decode_sequence(&cli.input, &cli.config)?;
    }

    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("cubist: {}", e);
        std::process::exit(1);
    }
}
