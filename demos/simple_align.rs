//! 演示如何在 library 模式下使用 bowtie-rust 进行回溯比对。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_align
//! ```

use bowtie_rust::align::{Backtracker, HitSink, RawHit, SearchPolicy};
use bowtie_rust::index::fm::Ebwt;
use bowtie_rust::util::dna;

struct PrintSink {
    qlen: u32,
    contig_len: u32,
}

impl HitSink for PrintSink {
    fn report_chase_one(&mut self, hit: &RawHit<'_>) -> bool {
        let fwd = self.contig_len - hit.off - self.qlen;
        let mms: Vec<u32> = hit.mms.iter().map(|&m| self.qlen - 1 - m).collect();
        println!("  命中: 正向偏移={}, 错配(5' 下标)={:?}", fwd, mms);
        true
    }
}

fn main() {
    // 1. 构建参考与索引（索引文本是反转后的参考）
    let reference = b"ACGTACGTAGCTGATCGTAGCTAGCTAGCTGATCGTAGCTAGCTAGCTGAT";
    println!("参考序列: {}", std::str::from_utf8(reference).unwrap());
    println!("参考长度: {} bp", reference.len());

    let seqs = vec![("ref1".to_string(), dna::seq_to_codes(reference))];
    let ebwt = Ebwt::build_reversed(&seqs, 16, 4);
    println!("Ebwt 构建完成：行数={}, ftab 宽度={}", ebwt.num_rows(), ebwt.ftab_chars);

    // 2. 精确匹配
    let read = b"GCTGATCGTAG";
    println!("\n精确匹配 '{}':", std::str::from_utf8(read).unwrap());
    let policy = SearchPolicy {
        unrev_off: read.len() as u32,
        one_rev_off: read.len() as u32,
        two_rev_off: read.len() as u32,
        qual_thresh: 0,
        ..SearchPolicy::default()
    };
    let mut bt = Backtracker::new(&ebwt, policy);
    let stored: Vec<u8> = dna::seq_to_codes(read).into_iter().rev().collect();
    bt.set_query(&stored, &[], "exact", &[]);
    let mut sink = PrintSink { qlen: read.len() as u32, contig_len: reference.len() as u32 };
    if !bt.backtrack(0, &mut sink) {
        println!("  未命中");
    }

    // 3. 带一个低质量错配的读段
    let read = b"GCTGATCGAAG"; // 下标 8 处 A/T 错配
    let mut qual = vec![b'I'; read.len()];
    qual[8] = b'#'; // phred 2
    println!("\n一个错配 '{}'（下标 8 质量最低）:", std::str::from_utf8(read).unwrap());
    let policy = SearchPolicy {
        unrev_off: 4,
        one_rev_off: read.len() as u32,
        two_rev_off: read.len() as u32,
        qual_thresh: 10,
        ..SearchPolicy::default()
    };
    let mut bt = Backtracker::new(&ebwt, policy);
    let stored: Vec<u8> = dna::seq_to_codes(read).into_iter().rev().collect();
    let stored_q: Vec<u8> = qual.iter().rev().copied().collect();
    bt.set_query(&stored, &stored_q, "onemm", &[]);
    let mut sink = PrintSink { qlen: read.len() as u32, contig_len: reference.len() as u32 };
    if !bt.backtrack(0, &mut sink) {
        println!("  未命中");
    }

    // 4. seedling 枚举
    let read = b"GCTGATCGAAG";
    println!("\nseedling 枚举 '{}':", std::str::from_utf8(read).unwrap());
    let policy = SearchPolicy {
        unrev_off: 0,
        one_rev_off: read.len() as u32,
        two_rev_off: read.len() as u32,
        qual_thresh: 60,
        report_seedlings: 1,
        ..SearchPolicy::default()
    };
    let mut bt = Backtracker::new(&ebwt, policy);
    let stored: Vec<u8> = dna::seq_to_codes(read).into_iter().rev().collect();
    bt.set_query(&stored, &[], "seedling", &[]);
    let mut sink = PrintSink { qlen: read.len() as u32, contig_len: reference.len() as u32 };
    bt.backtrack(0, &mut sink);
    for s in bowtie_rust::align::split_seedlings(bt.seedlings()) {
        let decoded: Vec<(u32, char)> = s
            .iter()
            .map(|&(pos, b)| (read.len() as u32 - 1 - pos as u32, dna::code_to_base(b) as char))
            .collect();
        println!("  seedling（5' 下标, 参考碱基）: {:?}", decoded);
    }

    println!("\n完成！");
}
