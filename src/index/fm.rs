use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::index::{bwt, sa};
use crate::util::dna::{self, SIGMA};

const EBWT_MAGIC: u64 = 0x4254_5253_4546_4D31; // "BTRSEFM1"
const EBWT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Contig {
    pub name: String,
    pub len: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// FM 索引（Ebwt）。为了让回溯从 read 的 5' 端开始消费，索引文本是
/// 各 contig **反转**后的字母序列，以 0 分隔拼接：
/// 反转文本偏移 o 处长 L 的匹配对应正向坐标 `len - o - L`。
///
/// - 字母表 {0:$, 1:A, 2:C, 3:G, 4:T, 5:N}；N 参与索引但永远不与
///   查询碱基（1..=4）匹配，因此比对不会跨越模糊碱基。
/// - Occ 按定长块采样，块内顺扫补偿；SA 完整保存（MVP，可换稀疏）。
/// - ftab 预存全部 4^k 个 k-mer 的箭头对，k-mer 最右字符占最低位对。
#[derive(Debug, Serialize, Deserialize)]
pub struct Ebwt {
    pub magic: u64,
    pub version: u32,
    pub sigma: u8,
    pub block: u32,
    /// C[i] = 文本中字母 < i 的累计数量
    pub c: Vec<u32>,
    pub bwt: Vec<u8>,
    /// occ_samples[block_id * sigma + letter] = 块首之前 letter 的出现数
    pub occ_samples: Vec<u32>,
    pub sa: Vec<u32>,
    pub contigs: Vec<Contig>,
    /// k-mer -> 箭头对；空区间记 (0, 0)
    pub ftab: Vec<(u32, u32)>,
    pub ftab_chars: u32,
    pub meta: IndexMeta,
}

/// 指向某一行的 Occ 采样块缓存视图：LF 映射只需读一次采样再扫本块。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideLocus {
    pub row: u32,
    block: u32,
}

impl Ebwt {
    /// 由正向 contig 序列码（0..=4）构建反转文本索引。
    pub fn build_reversed(seqs: &[(String, Vec<u8>)], block: usize, ftab_chars: u32) -> Self {
        let mut text: Vec<u8> = Vec::new();
        let mut contigs: Vec<Contig> = Vec::with_capacity(seqs.len());
        for (name, codes) in seqs {
            let start = text.len() as u32;
            text.extend(codes.iter().rev().map(|&c| dna::code_to_letter(c)));
            contigs.push(Contig { name: name.clone(), len: codes.len() as u32, offset: start });
            text.push(0);
        }
        let sa_arr = sa::build_sa(&text);
        let bwt_arr = bwt::build_bwt(&text, &sa_arr);
        Self::from_parts(bwt_arr, sa_arr, contigs, block, ftab_chars)
    }

    pub fn from_parts(
        bwt: Vec<u8>,
        sa: Vec<u32>,
        contigs: Vec<Contig>,
        block: usize,
        ftab_chars: u32,
    ) -> Self {
        let n = bwt.len();
        // C 表
        let mut freq = vec![0u32; SIGMA];
        for &ch in &bwt {
            freq[ch as usize] += 1;
        }
        let mut c = vec![0u32; SIGMA];
        let mut acc = 0u32;
        for i in 0..SIGMA {
            c[i] = acc;
            acc += freq[i];
        }

        // Occ 采样
        let num_blocks = n.div_ceil(block.max(1));
        let mut occ_samples = vec![0u32; num_blocks * SIGMA];
        let mut running = vec![0u32; SIGMA];
        for bi in 0..num_blocks {
            occ_samples[bi * SIGMA..(bi + 1) * SIGMA].copy_from_slice(&running);
            for &ch in &bwt[bi * block..((bi + 1) * block).min(n)] {
                running[ch as usize] += 1;
            }
        }

        let mut ebwt = Self {
            magic: EBWT_MAGIC,
            version: EBWT_VERSION,
            sigma: SIGMA as u8,
            block: block as u32,
            c,
            bwt,
            occ_samples,
            sa,
            contigs,
            ftab: Vec::new(),
            ftab_chars,
            meta: IndexMeta::default(),
        };
        ebwt.ftab = ebwt.build_ftab(ftab_chars);
        ebwt
    }

    /// 逐 k-mer 反向搜索填表。4^k 项，k 较小时构建开销可忽略。
    fn build_ftab(&self, k: u32) -> Vec<(u32, u32)> {
        let entries = 1usize << (2 * k);
        let mut ftab = vec![(0u32, 0u32); entries];
        let mut pat = vec![0u8; k as usize];
        for (x, slot) in ftab.iter_mut().enumerate() {
            for (j, p) in pat.iter_mut().enumerate() {
                *p = ((x >> (2 * (k as usize - 1 - j))) & 3) as u8;
            }
            if let Some(pair) = self.backward_search(&pat) {
                *slot = pair;
            }
        }
        ftab
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    #[inline]
    pub fn num_rows(&self) -> u32 {
        self.bwt.len() as u32
    }

    /// 碱基 b 的全局行区间（C 表相邻两项）。
    #[inline]
    pub fn fchr(&self, b: u8) -> (u32, u32) {
        debug_assert!(b < 4);
        (self.c[b as usize + 1], self.c[b as usize + 2])
    }

    /// k-mer 箭头对查询；packed 的最低位对是 k-mer 最右字符。
    #[inline]
    pub fn ftab_lookup(&self, packed: u32) -> (u32, u32) {
        self.ftab[packed as usize]
    }

    pub fn locus(&self, row: u32) -> SideLocus {
        let block = if row == 0 { 0 } else { (row - 1) / self.block };
        SideLocus { row, block }
    }

    /// 从箭头对一次性初始化两个 locus。
    pub fn init_from_top_bot(&self, top: u32, bot: u32) -> (SideLocus, SideLocus) {
        (self.locus(top), self.locus(bot))
    }

    /// 单碱基 LF 映射：返回扩展字符 b 后 locus 所指行的新行号。
    pub fn map_lf(&self, l: &SideLocus, b: u8) -> u32 {
        debug_assert!(b < 4);
        let letter = b + 1;
        self.c[letter as usize] + self.occ_at_locus(l, letter)
    }

    /// 四碱基同时 LF 映射：对每个 locus 只扫一遍所在块。
    pub fn map_lf_ex(&self, ltop: &SideLocus, lbot: &SideLocus, tops: &mut [u32; 4], bots: &mut [u32; 4]) {
        let ot = self.occ4_at_locus(ltop);
        let ob = self.occ4_at_locus(lbot);
        for b in 0..4 {
            tops[b] = self.c[b + 1] + ot[b];
            bots[b] = self.c[b + 1] + ob[b];
        }
    }

    #[inline]
    fn occ_at_locus(&self, l: &SideLocus, letter: u8) -> u32 {
        if l.row == 0 {
            return 0;
        }
        let start = (l.block * self.block) as usize;
        let mut cnt = self.occ_samples[l.block as usize * SIGMA + letter as usize];
        for &ch in &self.bwt[start..l.row as usize] {
            cnt += (ch == letter) as u32;
        }
        cnt
    }

    #[inline]
    fn occ4_at_locus(&self, l: &SideLocus) -> [u32; 4] {
        let mut cnt = [0u32; 4];
        if l.row == 0 {
            return cnt;
        }
        let base = l.block as usize * SIGMA;
        for b in 0..4 {
            cnt[b] = self.occ_samples[base + b + 1];
        }
        let start = (l.block * self.block) as usize;
        for &ch in &self.bwt[start..l.row as usize] {
            if (1..=4).contains(&ch) {
                cnt[(ch - 1) as usize] += 1;
            }
        }
        cnt
    }

    /// 对碱基码模式（0..=3）做精确反向搜索。
    pub fn backward_search(&self, pat: &[u8]) -> Option<(u32, u32)> {
        if self.bwt.is_empty() || pat.is_empty() {
            return None;
        }
        let mut top = 0u32;
        let mut bot = self.num_rows();
        for &b in pat.iter().rev() {
            if b >= 4 {
                return None;
            }
            let (lt, lb) = self.init_from_top_bot(top, bot);
            top = self.map_lf(&lt, b);
            bot = self.map_lf(&lb, b);
            if top >= bot {
                return None;
            }
        }
        Some((top, bot))
    }

    /// 行号 -> (contig 序号, 反转文本内偏移)。分隔符行或越过 contig
    /// 末尾（长度 qlen 放不下）时返回 None。
    pub fn row_to_pos(&self, row: u32, qlen: u32) -> Option<(u32, u32)> {
        let pos = self.sa[row as usize];
        let mut lo = 0usize;
        let mut hi = self.contigs.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let ct = &self.contigs[mid];
            if pos < ct.offset {
                hi = mid;
            } else if pos >= ct.offset + ct.len {
                lo = mid + 1;
            } else {
                let off = pos - ct.offset;
                if off + qlen > ct.len {
                    return None;
                }
                return Some((mid as u32, off));
            }
        }
        None
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let mut f = std::fs::File::create(path)?;
        bincode::serialize_into(&mut f, self)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        let idx: Self = bincode::deserialize_from(f)?;
        if idx.magic != EBWT_MAGIC {
            return Err(anyhow!(
                "invalid index file '{}': bad magic number (expected 0x{:016X}, got 0x{:016X})",
                path,
                EBWT_MAGIC,
                idx.magic
            ));
        }
        if idx.version != EBWT_VERSION {
            return Err(anyhow!(
                "unsupported index version in '{}': expected {}, got {}",
                path,
                EBWT_VERSION,
                idx.version
            ));
        }
        Ok(idx)
    }
}
