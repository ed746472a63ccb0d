use anyhow::Result;
use clap::{Parser, Subcommand};

mod align;
mod index;
mod io;
mod util;

#[derive(Parser, Debug)]
#[command(
    name = "bowtie-rust",
    author,
    version,
    about = "Rust implementation inspired by Bowtie",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the Ebwt index and the bit-packed reference image
    Index {
        /// Reference FASTA file
        reference: String,
        /// Output prefix for index files
        #[arg(short, long, default_value = "ref")]
        output: String,
        /// Occ sampling block size
        #[arg(long, default_value_t = 128)]
        block: usize,
        /// k-mer width of the ftab lookup table
        #[arg(long = "ftab-chars", default_value_t = 5)]
        ftab_chars: u32,
    },
    /// Align reads (FASTQ) with quality-aware bounded-mismatch backtracking
    Align {
        /// Index prefix (as given to the index command)
        #[arg(short = 'i', long = "index")]
        index: String,
        /// Reads FASTQ file
        reads: String,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        /// Maximum summed phred quality over mismatched positions
        #[arg(long = "qual-thresh", default_value_t = 70)]
        qual_thresh: u32,
        /// Depth below which no mismatches are allowed
        #[arg(long = "unrev", default_value_t = 28)]
        unrev_off: u32,
        /// Depth bounding the at-most-one-mismatch region
        #[arg(long = "one-rev", default_value_t = 28)]
        one_rev_off: u32,
        /// Depth bounding the at-most-two-mismatches region
        #[arg(long = "two-rev", default_value_t = 28)]
        two_rev_off: u32,
        /// Require exactly one mismatch in each half of the read
        /// (halves split at --one-rev / --two-rev)
        #[arg(long = "half-and-half")]
        half_and_half: bool,
        /// PRNG seed for tie-breaking and row selection
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        /// Cross-check every read against the naive oracle (slow)
        #[arg(long)]
        sanity: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Index { reference, output, block, ftab_chars } => {
            let stats = index::build_index(&reference, &output, block, ftab_chars)?;
            println!("reference: {}", reference);
            println!("sequences: {}", stats.n_seqs);
            println!("total_len: {}", stats.total_len);
            println!("index saved with prefix: {}", output);
            Ok(())
        }
        Commands::Align {
            index,
            reads,
            out,
            qual_thresh,
            unrev_off,
            one_rev_off,
            two_rev_off,
            half_and_half,
            seed,
            threads,
            sanity,
        } => {
            let opt = align::AlignOpt {
                qual_thresh,
                unrev_off,
                one_rev_off,
                two_rev_off,
                half_and_half,
                seed,
                threads,
                sanity,
            };
            align::align_fastq_with_opt(&index, &reads, out.as_deref(), opt)
        }
    }
}
