use std::error::Error;

use clap::Parser;
use csv::WriterBuilder;

use rand::{rngs::StdRng, seq::SliceRandom, thread_rng, SeedableRng};
use cheri_caps_testgen::{format_len_pow2s, gen_any_edge, gen_edge, gen_in_category, init_tracing, variant_edge_cases, CapTestCaseSerDe, FormatVariant, RandomCategory};


#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The filename to output generated tests into
    #[arg(short)]
    out_file: Option<String>,

    #[arg(long)]
    seed: Option<u64>,

    /// Number of capabilities to generate for each category.
    #[arg(short, long, default_value_t=10)]
    n_caps_per_category: usize,

    #[arg(long, default_value="cc128")]
    format: FormatVariant,

    /// Capabilities made with setbounds, for every length power of two
    #[arg(long, default_value_t=false)]
    bounded: bool,
    /// Random compressed words
    #[arg(long, default_value_t=false)]
    raw: bool,
    #[arg(long, default_value_t=false)]
    all_edge_cases: bool,
    #[arg(long, num_args=0..)]
    edge: Vec<usize>,
    /// Edge cases picked at random for each capability
    #[arg(long, default_value_t=false)]
    random_edge_cases: bool,

    #[arg(long, default_value_t=false)]
    list_edge_cases: bool,

    #[arg(long, default_value_t=false)]
    shuffle: bool,

    /// Log more, repeat for even more. RUST_LOG overrides this.
    #[arg(short, long, action=clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.list_edge_cases {
        for (i, edge) in variant_edge_cases().iter().enumerate() {
            println!("{}: {}", i, edge.name());
        }
        return Ok(())
    }

    let categories = {
        let mut cs = vec![];
        if args.bounded {
            cs.push(RandomCategory::Bounded);
        }
        if args.raw {
            cs.push(RandomCategory::Raw);
        }
        cs
    };
    let edge_cases = if args.all_edge_cases {
        variant_edge_cases().to_vec()
    } else {
        let mut es = vec![];
        for e in args.edge {
            match variant_edge_cases().get(e) {
                Some(edge) => es.push(*edge),
                None => return Err(format!("No edge case {e}, there are {} (see --list-edge-cases)", variant_edge_cases().len()).into()),
            }
        }
        es
    };

    if categories.is_empty() && edge_cases.is_empty() && !args.random_edge_cases {
        return Err("Please select at least one capability category to generate using cmdline options (see -h)".into());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(thread_rng())?,
    };

    let mut tests: Vec<CapTestCaseSerDe> = vec![];

    for category in &categories {
        match category {
            RandomCategory::Bounded => {
                for len_pow2 in format_len_pow2s(args.format) {
                    tracing::debug!(len_pow2, "generating bounded capabilities");
                    for _ in 0..args.n_caps_per_category {
                        tests.push(gen_in_category(&mut rng, args.format, *category, Some(len_pow2)));
                    }
                }
            }
            RandomCategory::Raw => {
                for _ in 0..args.n_caps_per_category {
                    tests.push(gen_in_category(&mut rng, args.format, *category, None));
                }
            }
        }
        tracing::info!(?category, total = tests.len(), "generated category");
    }
    for edge in &edge_cases {
        for _ in 0..args.n_caps_per_category {
            tests.push(gen_edge(&mut rng, args.format, *edge));
        }
        tracing::info!(edge = edge.name(), total = tests.len(), "generated edge case");
    }
    if args.random_edge_cases {
        for _ in 0..args.n_caps_per_category {
            tests.push(gen_any_edge(&mut rng, args.format));
        }
        tracing::info!(total = tests.len(), "generated random edge cases");
    }

    let is_dumping_to_null = if cfg!(unix) {
        args.out_file.as_ref().map(|path| path.as_str() == "/dev/null") == Some(true)
    } else {
        false
    };
    if is_dumping_to_null {
        tracing::debug!("output is /dev/null, not serializing");
        return Ok(());
    }

    let io_wtr: Box<dyn std::io::Write> = match &args.out_file {
        Some(real_file) => Box::new(std::fs::File::create(real_file)?),
        None => Box::new(std::io::stdout()),
    };
    let mut wtr = WriterBuilder::new().delimiter(b':').from_writer(io_wtr);
    if args.shuffle {
        tests.shuffle(&mut rng);
    }
    let n_tests = tests.len();
    for test in tests {
        wtr.serialize(test)?;
    }
    wtr.flush()?;
    tracing::info!(n_tests, out_file = args.out_file.as_deref().unwrap_or("<stdout>"), format = ?args.format, "wrote tests");

    Ok(())
}
