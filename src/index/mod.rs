pub mod bwt;
pub mod fm;
pub mod reference;
pub mod sa;

use anyhow::{bail, Context, Result};

use crate::io::fasta::FastaReader;
use crate::util::dna;

#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub n_seqs: usize,
    pub total_len: usize,
}

/// 从 FASTA 构建全套索引文件：
/// `<output>.fm`（Ebwt 镜像）与 `<output>.3.ebwt`/`<output>.4.ebwt`
/// （位压缩参考镜像）。
pub fn build_index(reference: &str, output: &str, block: usize, ftab_chars: u32) -> Result<IndexStats> {
    let fh = std::fs::File::open(reference)
        .with_context(|| format!("cannot open reference FASTA '{}'", reference))?;
    let mut reader = FastaReader::new(std::io::BufReader::new(fh));

    let mut seqs: Vec<(String, Vec<u8>)> = Vec::new();
    let mut total_len = 0usize;
    while let Some(rec) = reader.next_record()? {
        total_len += rec.seq.len();
        seqs.push((rec.id, dna::seq_to_codes(&rec.seq)));
    }
    if seqs.is_empty() {
        bail!("FASTA file '{}' contains no sequences", reference);
    }
    if total_len == 0 {
        bail!("FASTA file '{}' contains only empty sequences", reference);
    }

    let codes: Vec<Vec<u8>> = seqs.iter().map(|(_, c)| c.clone()).collect();
    reference::write_ref_image(output, &codes)
        .with_context(|| format!("cannot write reference image for '{}'", output))?;

    let mut ebwt = fm::Ebwt::build_reversed(&seqs, block, ftab_chars);
    ebwt.set_meta(fm::IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });
    let fm_path = format!("{}.fm", output);
    ebwt.save_to_file(&fm_path)
        .with_context(|| format!("cannot write index to '{}'", fm_path))?;

    Ok(IndexStats { n_seqs: seqs.len(), total_len })
}
