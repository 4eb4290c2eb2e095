use std::error::Error;

use clap::Parser;
use cheri_caps::capability::{
    cc128::{Cc128, Cc128Bitfield},
    cc64::{Cc64, Cc64Bitfield},
    CompressedCapability,
};
use cheri_caps_testgen::{init_tracing, FormatVariant};

/// Print the fields of a compressed capability word and what it decodes to.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    hex: String,

    /// The address stored alongside the word, in hex
    #[arg(long, default_value = "0")]
    cursor: String,

    #[arg(long, default_value = "cc128")]
    format: FormatVariant,

    /// The word is in memory format, i.e. it still has to be XORed with the null mask
    #[arg(long, default_value_t = false)]
    mem: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_hex(text: &str) -> Result<u128, std::num::ParseIntError> {
    let text = text.trim_start_matches("0x").replace('_', "");
    u128::from_str_radix(&text, 16)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let word = parse_hex(&args.hex)?;
    let cursor = parse_hex(&args.cursor)?;
    tracing::debug!(word, cursor, format = ?args.format, mem = args.mem, "unpacking");

    match args.format {
        FormatVariant::Cc64 => {
            let (word, cursor) = (u32::try_from(word)?, u32::try_from(cursor)?);
            let pesbt = if args.mem { word ^ Cc64::NULL_XOR_MASK } else { word };
            let cap = Cc64::decompress_raw(pesbt, cursor, true);
            println!("{:?}", Cc64Bitfield::new(pesbt));
            println!("{:?}", Cc64::extract_bounds_bits(pesbt));
            println!("{:?}", cap);
            println!("{}", cap);
        }
        FormatVariant::Cc128 => {
            let (word, cursor) = (u64::try_from(word)?, u64::try_from(cursor)?);
            let pesbt = if args.mem { word ^ Cc128::NULL_XOR_MASK } else { word };
            let cap = Cc128::decompress_raw(pesbt, cursor, true);
            println!("{:?}", Cc128Bitfield::new(pesbt));
            println!("{:?}", Cc128::extract_bounds_bits(pesbt));
            println!("{:?}", cap);
            println!("{}", cap);
        }
    }

    Ok(())
}
