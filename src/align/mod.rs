pub mod backtrack;
pub mod oracle;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::io::Write;
use std::sync::Arc;

use crate::index::fm::Ebwt;
use crate::index::reference::BitPackedReference;
use crate::io::fastq::{FastqReader, FastqRecord};
use crate::util::dna;

pub use backtrack::{
    split_seedlings, Backtracker, HitSink, QueryMutation, RawHit, SearchPolicy, SPREAD,
};
pub use oracle::{naive_oracle, OracleHit};

/// 驱动层比对选项。区域深度按对齐链 5' 端起算。
#[derive(Clone, Copy, Debug)]
pub struct AlignOpt {
    pub qual_thresh: u32,
    pub unrev_off: u32,
    pub one_rev_off: u32,
    pub two_rev_off: u32,
    /// 两半各恰好一个错配，边界取 one_rev_off / two_rev_off
    pub half_and_half: bool,
    pub seed: u64,
    pub threads: usize,
    /// 每条读都用朴素 oracle 复核回溯结果（很慢，调试用）
    pub sanity: bool,
}

impl Default for AlignOpt {
    fn default() -> Self {
        Self {
            qual_thresh: 70,
            unrev_off: 28,
            one_rev_off: 28,
            two_rev_off: 28,
            half_and_half: false,
            seed: 0,
            threads: 1,
            sanity: false,
        }
    }
}

impl AlignOpt {
    fn policy(&self) -> SearchPolicy {
        SearchPolicy {
            unrev_off: self.unrev_off,
            one_rev_off: self.one_rev_off,
            two_rev_off: self.two_rev_off,
            qual_thresh: self.qual_thresh,
            half_and_half: self.half_and_half,
            ..SearchPolicy::default()
        }
    }
}

/// 反转文本偏移 -> 正向参考偏移。
#[inline]
pub fn fwd_offset(contig_len: u32, rev_off: u32, qlen: u32) -> u32 {
    contig_len - rev_off - qlen
}

/// 正向比对的存储序查询：读段反转，5' 端最后被消费。
pub fn stored_query_fw(codes: &[u8]) -> Vec<u8> {
    codes.iter().rev().copied().collect()
}

/// 反向互补比对的存储序查询：逐位互补、不反转；质量串不动。
pub fn stored_query_rc(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&c| dna::complement_code(c)).collect()
}

/// 一条读的最终比对结果（正向参考坐标；mms 为对齐链 5' 下标，升序）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub ref_idx: u32,
    pub fwd_off: u32,
    pub is_rc: bool,
    pub mms: Vec<u32>,
}

/// 把 RawHit 换算成正向坐标并无条件接受的 sink。
struct FirstHitSink<'a> {
    ebwt: &'a Ebwt,
    qlen: u32,
    is_rc: bool,
    hit: Option<Alignment>,
}

impl HitSink for FirstHitSink<'_> {
    fn report_chase_one(&mut self, hit: &RawHit<'_>) -> bool {
        let clen = self.ebwt.contigs[hit.ref_idx as usize].len;
        let mut mms: Vec<u32> = hit.mms.iter().map(|&m| self.qlen - 1 - m).collect();
        mms.sort_unstable();
        self.hit = Some(Alignment {
            ref_idx: hit.ref_idx,
            fwd_off: fwd_offset(clen, hit.off, self.qlen),
            is_rc: self.is_rc,
            mms,
        });
        true
    }
}

/// 对一条读依次尝试正向与反向互补两个方向，返回第一个命中。
/// 奇数号读先试反向，抵消方向偏好。读段含模糊碱基时不比对。
pub fn align_read(
    ebwt: &Ebwt,
    bt: &mut Backtracker<'_>,
    rec: &FastqRecord,
    read_idx: u64,
    opt: &AlignOpt,
) -> Result<Option<Alignment>> {
    if rec.seq.is_empty() {
        bail!("read '{}' is empty", rec.id);
    }
    if rec.seq.len() > SPREAD {
        bail!("read '{}' is {} bp, longer than the {} bp limit", rec.id, rec.seq.len(), SPREAD);
    }
    if opt.half_and_half && (rec.seq.len() as u32) < opt.two_rev_off {
        debug!("read '{}' is shorter than the 3' half boundary, skipped", rec.id);
        return Ok(None);
    }
    let codes = dna::seq_to_codes(&rec.seq);
    if codes.iter().any(|&c| c >= 4) {
        debug!("read '{}' contains ambiguous bases, skipped", rec.id);
        return Ok(None);
    }
    let qual: Vec<u8> = rec.qual.iter().map(|&q| q.clamp(dna::QUAL_MIN, dna::QUAL_MAX)).collect();

    let mut order = [false, true]; // is_rc
    if read_idx % 2 == 1 {
        order.swap(0, 1);
    }
    for (oi, &is_rc) in order.iter().enumerate() {
        let (stored, stored_qual) = if is_rc {
            (stored_query_rc(&codes), qual.clone())
        } else {
            let rq: Vec<u8> = qual.iter().rev().copied().collect();
            (stored_query_fw(&codes), rq)
        };
        bt.reseed(opt.seed ^ (read_idx.wrapping_mul(2).wrapping_add(oi as u64)));
        bt.set_query(&stored, &stored_qual, &rec.id, &[]);
        let mut sink = FirstHitSink { ebwt, qlen: codes.len() as u32, is_rc, hit: None };
        if bt.backtrack(0, &mut sink) {
            return Ok(sink.hit);
        }
    }
    Ok(None)
}

/// 用 oracle 复核一条读的比对结果：存在性必须一致，命中必须落在
/// oracle 的合格集合内。失败时报出读段与策略的完整信息。
fn sanity_check_read(
    refs_fwd: &[Vec<u8>],
    rec: &FastqRecord,
    opt: &AlignOpt,
    result: &Option<Alignment>,
) -> Result<()> {
    let codes = dna::seq_to_codes(&rec.seq);
    if codes.iter().any(|&c| c >= 4) {
        return Ok(());
    }
    if opt.half_and_half && (rec.seq.len() as u32) < opt.two_rev_off {
        return Ok(());
    }
    let qual: Vec<u8> = rec.qual.iter().map(|&q| q.clamp(dna::QUAL_MIN, dna::QUAL_MAX)).collect();
    let policy = opt.policy();
    let fw_hits = naive_oracle(refs_fwd, &codes, &qual, &policy, 0, &[]);
    let rc_codes = dna::revcomp_codes(&codes);
    let rc_qual: Vec<u8> = qual.iter().rev().copied().collect();
    let rc_hits = naive_oracle(refs_fwd, &rc_codes, &rc_qual, &policy, 0, &[]);
    let exists = !fw_hits.is_empty() || !rc_hits.is_empty();

    let describe = || {
        format!(
            "read '{}' seq {} quals {} policy (thresh {}, regions {}/{}/{})",
            rec.id,
            String::from_utf8_lossy(&rec.seq),
            String::from_utf8_lossy(&rec.qual),
            opt.qual_thresh,
            opt.unrev_off,
            opt.one_rev_off,
            opt.two_rev_off
        )
    };
    match result {
        None => {
            if exists {
                let h = fw_hits.first().or(rc_hits.first()).unwrap();
                bail!(
                    "oracle disagreement: backtracker missed a hit at (ref {}, off {}, mms {:#b}) for {}",
                    h.ref_idx, h.off, h.mms, describe()
                );
            }
        }
        Some(aln) => {
            if !exists {
                bail!("oracle disagreement: spurious hit {:?} for {}", aln, describe());
            }
            let set = if aln.is_rc { &rc_hits } else { &fw_hits };
            let diffs = aln.mms.iter().fold(0u64, |acc, &p| acc | (1 << p));
            if !set.iter().any(|h| h.ref_idx == aln.ref_idx && h.off == aln.fwd_off && h.mms == diffs) {
                bail!("oracle disagreement: hit {:?} not in oracle set for {}", aln, describe());
            }
        }
    }
    Ok(())
}

/// 把比对结果排成一行输出：
/// name, 链向, 参考名, 正向偏移, 序列, 质量, 错配描述。
/// 错配描述 `p:R>Q` 的 p 是对齐链 5' 下标，R 为参考碱基（经位压缩
/// 参考镜像解码），Q 为对齐链上的读碱基。
fn format_alignment(
    ebwt: &Ebwt,
    bpr: &BitPackedReference,
    rec: &FastqRecord,
    aln: &Alignment,
) -> String {
    let qlen = rec.seq.len();
    let codes = dna::seq_to_codes(&rec.seq);
    let aligned: Vec<u8> = if aln.is_rc { dna::revcomp_codes(&codes) } else { codes };
    let mut refbuf = vec![0u8; qlen];
    bpr.get_stretch(&mut refbuf, aln.ref_idx, aln.fwd_off, qlen);
    let descs: Vec<String> = aln
        .mms
        .iter()
        .map(|&p| {
            format!(
                "{}:{}>{}",
                p,
                dna::code_to_base(refbuf[p as usize]) as char,
                dna::code_to_base(aligned[p as usize]) as char
            )
        })
        .collect();
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        rec.id,
        if aln.is_rc { '-' } else { '+' },
        ebwt.contigs[aln.ref_idx as usize].name,
        aln.fwd_off,
        String::from_utf8_lossy(&rec.seq),
        String::from_utf8_lossy(&rec.qual),
        descs.join(",")
    )
}

/// 逐批读取 FASTQ 并行比对，结果写到 out_path（缺省 stdout）。
pub fn align_fastq_with_opt(
    index_prefix: &str,
    fastq_path: &str,
    out_path: Option<&str>,
    opt: AlignOpt,
) -> Result<()> {
    if opt.half_and_half && (opt.one_rev_off == 0 || opt.two_rev_off <= opt.one_rev_off) {
        bail!("half-and-half mode requires 0 < one-rev < two-rev");
    }
    let fm_path = format!("{}.fm", index_prefix);
    let ebwt = Arc::new(Ebwt::load_from_file(&fm_path)?);
    let bpr = Arc::new(BitPackedReference::load(index_prefix)?);
    if !bpr.loaded() {
        bail!(
            "reference image files '{}.3.ebwt'/'{}.4.ebwt' are missing; re-run the index command",
            index_prefix, index_prefix
        );
    }

    let fq = std::fs::File::open(fastq_path)
        .with_context(|| format!("cannot open reads file '{}'", fastq_path))?;
    let mut reader = FastqReader::new(std::io::BufReader::new(fq));

    let mut out: Box<dyn Write> = if let Some(p) = out_path {
        Box::new(std::io::BufWriter::new(std::fs::File::create(p)?))
    } else {
        Box::new(std::io::BufWriter::new(std::io::stdout()))
    };
    for (t, c) in ebwt.contigs.iter().enumerate() {
        writeln!(out, "# ref\t{}\t{}", c.name, bpr.approx_len(t as u32))?;
    }

    // sanity 模式用位压缩镜像还原正向参考文本
    let refs_fwd: Arc<Vec<Vec<u8>>> = Arc::new(if opt.sanity {
        (0..bpr.num_refs()).map(|t| bpr.to_codes(t)).collect()
    } else {
        Vec::new()
    });

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build()
        .map_err(|e| anyhow!("cannot build thread pool: {}", e))?;

    let batch_size = 1000;
    let mut next_idx = 0u64;
    let mut n_reads = 0u64;
    let mut n_aligned = 0u64;
    loop {
        let mut batch: Vec<FastqRecord> = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match reader.next_record()? {
                Some(rec) => batch.push(rec),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }
        let base_idx = next_idx;
        next_idx += batch.len() as u64;

        let ebwt_ref = Arc::clone(&ebwt);
        let bpr_ref = Arc::clone(&bpr);
        let refs_ref = Arc::clone(&refs_fwd);
        let results: Vec<Result<Option<String>>> = pool.install(|| {
            batch
                .par_iter()
                .enumerate()
                .map_init(
                    || Backtracker::new(&ebwt_ref, opt.policy()),
                    |bt, (i, rec)| {
                        let idx = base_idx + i as u64;
                        let aln = align_read(&ebwt_ref, bt, rec, idx, &opt)?;
                        if opt.sanity {
                            sanity_check_read(&refs_ref, rec, &opt, &aln)?;
                        }
                        Ok(aln.map(|a| format_alignment(&ebwt_ref, &bpr_ref, rec, &a)))
                    },
                )
                .collect()
        });

        for res in results {
            n_reads += 1;
            if let Some(line) = res? {
                n_aligned += 1;
                writeln!(out, "{}", line)?;
            }
        }
    }
    out.flush()?;
    info!("{} reads processed, {} aligned", n_reads, n_aligned);
    Ok(())
}
