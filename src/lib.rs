//! # bowtie-rust
//!
//! 受 [Bowtie](https://github.com/BenLangmead/bowtie) 启发的 Rust 版短读段比对器。
//!
//! 本 crate 实现了基于 FM 索引的质量感知、有界错配回溯比对，包括：
//!
//! - **索引构建**：从 FASTA 参考序列构建 Ebwt（后缀数组 + BWT + Occ 采样
//!   + k-mer ftab），以及位压缩参考镜像（模糊碱基段外置记录）
//! - **位压缩参考**：2-bit/碱基的随机访问与区段读取，N 段零空间开销
//! - **回溯搜索**：按区域策略与加权汉明距离预算随机化回溯，
//!   支持 half-and-half 约束与 seedling 枚举
//! - **朴素 oracle**：暴力对照实现，用于测试与 sanity 校验
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use bowtie_rust::align::{Backtracker, HitSink, RawHit, SearchPolicy};
//! use bowtie_rust::index::fm::Ebwt;
//! use bowtie_rust::util::dna;
//!
//! struct Print;
//! impl HitSink for Print {
//!     fn report_chase_one(&mut self, hit: &RawHit<'_>) -> bool {
//!         println!("hit: ref={} off={} mms={:?}", hit.ref_idx, hit.off, hit.mms);
//!         true
//!     }
//! }
//!
//! let seqs = vec![("chr1".to_string(), dna::seq_to_codes(b"ACGTACGTAC"))];
//! let ebwt = Ebwt::build_reversed(&seqs, 16, 4);
//! let mut bt = Backtracker::new(&ebwt, SearchPolicy::default());
//! // 存储序查询：读段反转，5' 端最后被消费
//! let stored: Vec<u8> = dna::seq_to_codes(b"CGTAC").into_iter().rev().collect();
//! bt.set_query(&stored, &[], "read1", &[]);
//! bt.backtrack(0, &mut Print);
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — FASTA / FASTQ 文件解析
//! - [`index`] — Ebwt 与位压缩参考镜像的构建与装载
//! - [`align`] — 回溯搜索核心、比对驱动与朴素 oracle
//! - [`util`] — 碱基编码与 phred 质量工具

pub mod align;
pub mod index;
pub mod io;
pub mod util;
