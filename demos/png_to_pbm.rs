//! Convert a PNG screenshot into the PBM frame the display would receive.
//!
//! ```text
//! cargo run --example png_to_pbm -- screenshot.png dashboard.pbm
//! ```

use std::env;
use std::fs;
use std::process::ExitCode;

use homedash::{pack_pbm, Bitmap, PbmHeader};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let (input, output) = match args.as_slice() {
        [input, output] => (input.as_str(), output.as_str()),
        _ => {
            eprintln!("usage: png_to_pbm <input.png> <output.pbm>");
            return ExitCode::FAILURE;
        }
    };

    match convert(input, output) {
        Ok(header) => {
            println!(
                "{} -> {}: {}x{}, {} payload bytes",
                input,
                output,
                header.width,
                header.height,
                header.payload_len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn convert(input: &str, output: &str) -> Result<PbmHeader, homedash::Error> {
    let image = image::open(input)?.to_rgba8();
    let bitmap = Bitmap::from_raster(&image)?;
    println!(
        "{} of {} pixels are white",
        bitmap.white_count(),
        bitmap.pixels().len()
    );

    let pbm = pack_pbm(&bitmap);
    fs::write(output, &pbm).map_err(|e| homedash::Error::Io(e.to_string()))?;
    PbmHeader::parse(&pbm)
}
