use log::trace;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::index::fm::Ebwt;
use crate::util::dna;

/// 查询长度上限；scratch 帧按此宽度切片。
pub const SPREAD: usize = 64;

/// elims 低 4 位全部置位：该深度已无可回溯碱基。
const ELIM_ALL: u8 = 0b1111;

/// seedling 内部 (pos, base) 对之间的次分隔符；主分隔符由消费方追加。
pub const SEEDLING_SEP: u8 = 0xfe;

/// 对查询碱基的一次替换："存储序第 pos 位由 old_base 改为 new_base"。
/// 用于以 seedling 为种子的再搜索。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMutation {
    pub pos: u8,
    pub old_base: u8,
    pub new_base: u8,
}

impl QueryMutation {
    pub fn new(pos: u8, old_base: u8, new_base: u8) -> Self {
        debug_assert!(old_base < 4 && new_base < 4 && old_base != new_base);
        Self { pos, old_base, new_base }
    }
}

/// 回溯搜索的区域与预算策略。深度自存储序查询的消费端起算：
/// [0, unrev_off) 不可回溯，[unrev_off, one_rev_off) 至多 1 个错配，
/// [one_rev_off, two_rev_off) 至多 2 个，其余只受加权距离预算约束。
#[derive(Debug, Clone, Copy)]
pub struct SearchPolicy {
    pub unrev_off: u32,
    pub one_rev_off: u32,
    pub two_rev_off: u32,
    /// 加权汉明距离（错配处 phred 之和）上限
    pub qual_thresh: u32,
    /// > 0 时进入 seedling 枚举模式，最多记录这么多错配
    pub report_seedlings: u32,
    /// 两半各恰好一个错配（边界取 one_rev_off / two_rev_off）
    pub half_and_half: bool,
    pub seed: u64,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            unrev_off: 0,
            one_rev_off: 0,
            two_rev_off: 0,
            qual_thresh: 70,
            report_seedlings: 0,
            half_and_half: false,
            seed: 0,
        }
    }
}

/// 送往 sink 的一次命中。off 为反转文本坐标；mms 为存储序查询下标。
#[derive(Debug)]
pub struct RawHit<'a> {
    pub ref_idx: u32,
    pub off: u32,
    pub row: u32,
    pub top: u32,
    pub bot: u32,
    pub mms: &'a [u32],
    pub qry: &'a [u8],
    pub qual: &'a [u8],
    pub name: &'a str,
}

/// 命中收集方。返回 true 表示已接受，本区间不再尝试其他行。
pub trait HitSink {
    fn report_chase_one(&mut self, hit: &RawHit<'_>) -> bool;
}

/// 质量感知的有界错配回溯搜索器。一个实例绑定一个只读 Ebwt，
/// scratch（箭头四元组、淘汰位图、错配栈）一次分配、跨查询复用；
/// 实例本身单线程使用，多 worker 各持一个实例即可并行。
pub struct Backtracker<'a> {
    ebwt: &'a Ebwt,
    qry: Vec<u8>,
    qual: Vec<u8>,
    name: String,
    qlen: usize,
    unrev_off: u32,
    one_rev_off: u32,
    two_rev_off: u32,
    qual_thresh: u32,
    report_seedlings: u32,
    half_and_half: bool,
    five_depth: u32,
    three_depth: u32,
    muts: Vec<QueryMutation>,
    /// 各递归帧的箭头四元组，帧步长 SPREAD*8
    pairs: Vec<u32>,
    /// 各递归帧的淘汰位图，帧步长 SPREAD
    elims: Vec<u8>,
    /// 错配位置栈（存储序查询下标）
    mms: Vec<u32>,
    /// 各深度选中的碱基
    chars: Vec<u8>,
    seedlings: Vec<u8>,
    rand: StdRng,
}

impl<'a> Backtracker<'a> {
    pub fn new(ebwt: &'a Ebwt, policy: SearchPolicy) -> Self {
        debug_assert!(policy.unrev_off <= policy.one_rev_off);
        debug_assert!(policy.one_rev_off <= policy.two_rev_off);
        Self {
            ebwt,
            qry: Vec::new(),
            qual: Vec::new(),
            name: String::new(),
            qlen: 0,
            unrev_off: policy.unrev_off,
            one_rev_off: policy.one_rev_off,
            two_rev_off: policy.two_rev_off,
            qual_thresh: policy.qual_thresh,
            report_seedlings: policy.report_seedlings,
            half_and_half: policy.half_and_half,
            five_depth: policy.one_rev_off,
            three_depth: policy.two_rev_off,
            muts: Vec::new(),
            pairs: Vec::new(),
            elims: Vec::new(),
            mms: Vec::new(),
            chars: vec![0; SPREAD],
            seedlings: Vec::new(),
            rand: StdRng::seed_from_u64(policy.seed),
        }
    }

    /// 设定当前查询（存储序碱基码 + phred+33 质量 + 名字）。
    /// 传入的序列被拷贝到内部缓冲；qual 为空时按 phred 40 填充。
    /// 随后立即套用 muts 列表（就地替换碱基）。
    pub fn set_query(&mut self, seq: &[u8], qual: &[u8], name: &str, muts: &[QueryMutation]) {
        debug_assert!(!seq.is_empty() && seq.len() <= SPREAD);
        debug_assert!(seq.iter().all(|&c| c < 4));
        self.qry.clear();
        self.qry.extend_from_slice(seq);
        self.qlen = seq.len();
        self.qual.clear();
        if qual.is_empty() {
            self.qual.resize(self.qlen, 40 + 33);
        } else {
            debug_assert!(qual.len() >= seq.len());
            debug_assert!(qual.iter().all(|&q| dna::qual_in_range(q)));
            self.qual.extend_from_slice(&qual[..self.qlen]);
        }
        self.name.clear();
        self.name.push_str(name);
        self.muts.clear();
        self.muts.extend_from_slice(muts);
        self.apply_mutations();
        self.ensure_scratch();
    }

    /// 替换 mutation 列表：先撤销旧的，再套用新的。
    pub fn set_muts(&mut self, muts: &[QueryMutation]) {
        self.undo_mutations();
        self.muts.clear();
        self.muts.extend_from_slice(muts);
        self.apply_mutations();
        self.ensure_scratch();
    }

    pub fn set_unrev_off(&mut self, unrev_off: u32) -> u32 {
        std::mem::replace(&mut self.unrev_off, unrev_off)
    }

    pub fn set_one_rev_off(&mut self, one_rev_off: u32) -> u32 {
        std::mem::replace(&mut self.one_rev_off, one_rev_off)
    }

    pub fn set_two_rev_off(&mut self, two_rev_off: u32) -> u32 {
        std::mem::replace(&mut self.two_rev_off, two_rev_off)
    }

    /// 截短生效查询长度（不得超过实际序列长度）。
    pub fn set_qlen(&mut self, qlen: usize) {
        self.qlen = self.qry.len().min(qlen);
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rand = StdRng::seed_from_u64(seed);
    }

    pub fn seedlings(&self) -> &[u8] {
        &self.seedlings
    }

    pub fn clear_seedlings(&mut self) {
        self.seedlings.clear();
    }

    /// 按当前查询与策略重算 scratch 需求；只增不减。
    fn ensure_scratch(&mut self) {
        let qlen = self.qlen as u32;
        let msd = (qlen - self.unrev_off.min(qlen) + 4) as usize;
        if self.pairs.len() < SPREAD * msd * 8 {
            self.pairs.resize(SPREAD * msd * 8, 0);
        }
        if self.elims.len() < SPREAD * msd {
            self.elims.resize(SPREAD * msd, 0);
        }
        let mms_need = SPREAD + self.muts.len() + 4;
        if self.mms.len() < mms_need {
            self.mms.resize(mms_need, 0);
        }
    }

    fn apply_mutations(&mut self) {
        for i in 0..self.muts.len() {
            let m = self.muts[i];
            debug_assert!((m.pos as usize) < self.qlen);
            debug_assert_eq!(self.qry[m.pos as usize], m.old_base);
            self.qry[m.pos as usize] = m.new_base;
        }
    }

    fn undo_mutations(&mut self) {
        for i in 0..self.muts.len() {
            let m = self.muts[i];
            debug_assert_eq!(self.qry[m.pos as usize], m.new_base);
            self.qry[m.pos as usize] = m.old_base;
        }
    }

    #[inline]
    fn pair_top(&self, frame: usize, d: u32, b: u8) -> u32 {
        self.pairs[frame * SPREAD * 8 + d as usize * 8 + b as usize]
    }

    #[inline]
    fn pair_bot(&self, frame: usize, d: u32, b: u8) -> u32 {
        self.pairs[frame * SPREAD * 8 + d as usize * 8 + 4 + b as usize]
    }

    #[inline]
    fn pair_spread(&self, frame: usize, d: u32, b: u8) -> u32 {
        self.pair_bot(frame, d, b) - self.pair_top(frame, d, b)
    }

    #[inline]
    fn elim(&self, frame: usize, d: u32) -> u8 {
        self.elims[frame * SPREAD + d as usize]
    }

    /// 搜索入口。iham 为调用方带入的初始加权距离（seedling 再搜索用）。
    /// 若 ftab 覆盖的前几列全部落在不可回溯区内，则用 k-mer 表一步越过。
    pub fn backtrack<S: HitSink>(&mut self, iham: u32, sink: &mut S) -> bool {
        assert!(self.qlen > 0, "backtrack called before set_query");
        self.ensure_scratch();
        let qlen = self.qlen as u32;
        let k = self.ebwt.ftab_chars;
        let m = self.unrev_off.min(qlen);
        if k > 0 && m >= k {
            // 最右字符占最低位对
            let mut packed = 0u32;
            for j in (qlen - k)..qlen {
                debug_assert!(self.qry[j as usize] < 4);
                packed = (packed << 2) | self.qry[j as usize] as u32;
            }
            let (top, bot) = self.ebwt.ftab_lookup(packed);
            if qlen == k && bot > top {
                if self.report_seedlings > 0 {
                    // 零错配的整读命中不算 seedling，重新逐列搜索
                    return self.bt_frame(
                        0, 0, self.unrev_off, self.one_rev_off, self.two_rev_off, 0, 0, iham, iham, sink,
                    );
                }
                return self.report(0, top, bot, sink);
            } else if bot > top {
                return self.bt_frame(
                    0, k, self.unrev_off, self.one_rev_off, self.two_rev_off, top, bot, iham, iham, sink,
                );
            }
            // k-mer 区间已闭合
            return false;
        }
        self.bt_frame(0, 0, self.unrev_off, self.one_rev_off, self.two_rev_off, 0, 0, iham, iham, sink)
    }

    /// 一个递归帧：从 depth 起逐列推进，维护本帧 [depth, d] 上的
    /// 备选/合格箭头对计数，遇到空区间时随机挑一个最低质量的备选
    /// 回溯目标递归下去。
    #[allow(clippy::too_many_arguments)]
    fn bt_frame<S: HitSink>(
        &mut self,
        stack_depth: usize,
        depth: u32,
        unrev_off: u32,
        one_rev_off: u32,
        two_rev_off: u32,
        mut top: u32,
        mut bot: u32,
        ham: u32,
        iham: u32,
        sink: &mut S,
    ) -> bool {
        let qlen = self.qlen as u32;
        debug_assert!(ham <= self.qual_thresh);
        debug_assert!(depth < qlen);
        trace!(
            "bt_frame: stack_depth={} depth={} top={} bot={} ham={}",
            stack_depth, depth, top, bot, ham
        );
        if self.half_and_half {
            debug_assert_eq!(self.report_seedlings, 0);
            // 边界处必须已经攒够相应数量的错配
            if depth == self.five_depth {
                if stack_depth < 1 {
                    return false;
                }
            } else if depth == self.three_depth && stack_depth < 2 {
                return false;
            }
        }

        let frame = stack_depth;
        // 本帧内尚未淘汰的备选箭头对总数
        let mut alt_num = 0u32;
        // 质量等于 low_alt_qual 的备选（即下一次回溯的候选）数量与行距和
        let mut eligible_num = 0u32;
        let mut eligible_sz = 0u32;
        let mut low_alt_qual = 0xffu8;
        let mut d = depth;
        let (mut ltop, mut lbot) = self.ebwt.init_from_top_bot(top, bot);

        while d < qlen {
            let cur = (qlen - d - 1) as usize;
            let c = self.qry[cur];
            debug_assert!(c < 4);
            let q = dna::phred(self.qual[cur]);
            let mut cur_is_eligible = false;
            let mut cur_overrides_eligible = false;
            let cur_is_alternative = d >= unrev_off && ham + q as u32 <= self.qual_thresh;
            if cur_is_alternative {
                if q < low_alt_qual {
                    // 本深度的箭头对暂定为新的最优候选
                    cur_is_eligible = true;
                    cur_overrides_eligible = true;
                } else if q == low_alt_qual {
                    cur_is_eligible = true;
                }
            }

            if top == 0 && bot == 0 {
                // 第一列：直接由全局行区间给出箭头四元组
                debug_assert_eq!(d, 0);
                for b in 0..4u8 {
                    let (t, bo) = self.ebwt.fchr(b);
                    let base = frame * SPREAD * 8 + d as usize * 8;
                    self.pairs[base + b as usize] = t;
                    self.pairs[base + 4 + b as usize] = bo;
                }
                top = self.pair_top(frame, d, c);
                bot = self.pair_bot(frame, d, c);
            } else if cur_is_alternative {
                let mut tops = [0u32; 4];
                let mut bots = [0u32; 4];
                self.ebwt.map_lf_ex(&ltop, &lbot, &mut tops, &mut bots);
                let base = frame * SPREAD * 8 + d as usize * 8;
                self.pairs[base..base + 4].copy_from_slice(&tops);
                self.pairs[base + 4..base + 8].copy_from_slice(&bots);
                top = tops[c as usize];
                bot = bots[c as usize];
            } else {
                // 不可能成为回溯点，只算匹配碱基那一对
                top = self.ebwt.map_lf(&ltop, c);
                bot = self.ebwt.map_lf(&lbot, c);
            }
            if top != bot {
                let l = self.ebwt.init_from_top_bot(top, bot);
                ltop = l.0;
                lbot = l.1;
            }

            self.elims[frame * SPREAD + d as usize] = 1 << c;
            if cur_is_alternative {
                for b in 0..4u8 {
                    let spread = self.pair_spread(frame, d, b);
                    if spread == 0 {
                        // 区间已闭合，本帧中该碱基不再可选
                        self.elims[frame * SPREAD + d as usize] |= 1 << b;
                    }
                    if b != c && spread > 0 && self.elim(frame, d) & (1 << b) == 0 {
                        if cur_is_eligible {
                            if cur_overrides_eligible {
                                // 确认该深度真有可回溯目标后才重置候选集
                                low_alt_qual = q;
                                eligible_num = 0;
                                eligible_sz = 0;
                                cur_overrides_eligible = false;
                            }
                            eligible_sz += spread;
                            eligible_num += 1;
                        }
                        alt_num += 1;
                    }
                }
            }
            debug_assert!(self.sanity_check_eligibility(
                frame, depth, d, unrev_off, low_alt_qual, eligible_sz, eligible_num
            ));

            // 已匹配但仍须制造错配的情形
            let mut keep_going_despite_match = false;
            // 在两半边界前夕错配数仍不足时，强制回溯直至备选耗尽：
            // 零错配跨越半区的匹配交给调用方的另一阶段，绝不在此上报
            let hnh_forced = self.half_and_half
                && top < bot
                && ((d + 1 == self.five_depth && stack_depth == 0)
                    || (d + 1 == self.three_depth && stack_depth < 2));
            if cur == 0
                && top < bot
                && self.report_seedlings > 0
                && (stack_depth as u32) < self.report_seedlings
                && alt_num > 0
            {
                debug_assert!(!self.half_and_half);
                keep_going_despite_match = true;
                if stack_depth > 0 {
                    self.report_seedling(stack_depth);
                }
            }

            while (top == bot && alt_num > 0) || keep_going_despite_match || hnh_forced {
                keep_going_despite_match = false;
                if alt_num == 0 {
                    // 被迫制造错配却已无处可去
                    debug_assert!(hnh_forced);
                    return false;
                }
                trace!(
                    "  mismatch at d={} alt={} eligible=({}, {})",
                    d, alt_num, eligible_num, eligible_sz
                );
                // 在全部最低质量候选中按行距加权随机挑选回溯目标
                let r = self.rand.next_u32() % eligible_sz;
                let mut cum_sz = 0u32;
                let mut found = false;
                let mut i = depth;
                let mut j = 0u8;
                let mut bttop = 0u32;
                let mut btbot = 0u32;
                let mut btham = ham;
                'scan: for ii in depth..=d {
                    if ii < unrev_off {
                        continue;
                    }
                    let icur = (qlen - ii - 1) as usize;
                    let qi = dna::phred(self.qual[icur]);
                    if qi == low_alt_qual && self.elim(frame, ii) != ELIM_ALL {
                        for jj in 0..4u8 {
                            if self.elim(frame, ii) & (1 << jj) == 0 {
                                debug_assert!(self.pair_spread(frame, ii, jj) > 0);
                                cum_sz += self.pair_spread(frame, ii, jj);
                                if r < cum_sz {
                                    found = true;
                                    i = ii;
                                    j = jj;
                                    bttop = self.pair_top(frame, ii, jj);
                                    btbot = self.pair_bot(frame, ii, jj);
                                    btham += qi as u32;
                                    break 'scan;
                                }
                            }
                        }
                    }
                }
                debug_assert!(found && btbot > bttop);
                debug_assert!(btham <= self.qual_thresh);
                let icur = (qlen - i - 1) as usize;

                // 回溯目标落在哪个区域，就把相应的可回溯额度"花掉"
                let mut bt_unrev = unrev_off;
                let mut bt_one = one_rev_off;
                let mut bt_two = two_rev_off;
                if i < one_rev_off {
                    bt_unrev = one_rev_off;
                    bt_one = two_rev_off;
                } else if i < two_rev_off {
                    if !self.half_and_half {
                        bt_one = two_rev_off;
                    } else {
                        // 两半各自独立的 1 错配区：收紧 2-revisitable 边界，
                        // 避免多次回溯进 3' 半
                        bt_two = one_rev_off;
                    }
                }

                self.mms[stack_depth] = icur as u32;
                self.chars[i as usize] = j;
                let ret = if i + 1 == qlen {
                    self.report(stack_depth + 1, bttop, btbot, sink)
                } else {
                    self.bt_frame(stack_depth + 1, i + 1, bt_unrev, bt_one, bt_two, bttop, btbot, btham, iham, sink)
                };
                if ret {
                    return true;
                }

                // 递归失败：淘汰该目标并更新计数
                self.chars[i as usize] = self.qry[icur];
                debug_assert_ne!(self.elim(frame, i), ELIM_ALL);
                self.elims[frame * SPREAD + i as usize] |= 1 << j;
                eligible_sz -= btbot - bttop;
                eligible_num -= 1;
                alt_num -= 1;
                if alt_num == 0 {
                    // 所有合法回溯目标都试过了
                    return false;
                }
                if eligible_num == 0 {
                    // 重扫本帧，下一档最低质量成为新的候选门槛
                    low_alt_qual = 0xff;
                    for kk in depth..=d {
                        let kcur = (qlen - kk - 1) as usize;
                        let kq = dna::phred(self.qual[kcur]);
                        let k_is_alt = kk >= unrev_off && ham + kq as u32 <= self.qual_thresh;
                        if !k_is_alt {
                            continue;
                        }
                        let mut k_overrides = kq < low_alt_qual;
                        if kq <= low_alt_qual {
                            for l in 0..4u8 {
                                if self.elim(frame, kk) & (1 << l) == 0 {
                                    if k_overrides {
                                        low_alt_qual = kq;
                                        k_overrides = false;
                                        eligible_num = 0;
                                        eligible_sz = 0;
                                    }
                                    eligible_num += 1;
                                    debug_assert!(self.pair_spread(frame, kk, l) > 0);
                                    eligible_sz += self.pair_spread(frame, kk, l);
                                }
                            }
                        }
                    }
                }
                debug_assert!(eligible_num > 0 && eligible_num <= alt_num);
                debug_assert!(eligible_sz >= eligible_num);
                debug_assert!(self.sanity_check_eligibility(
                    frame, depth, d, unrev_off, low_alt_qual, eligible_sz, eligible_num
                ));
            }

            if top == bot && alt_num == 0 {
                // 错配且无备选，本帧失败
                return false;
            }
            // 匹配，推进一列
            self.chars[d as usize] = self.qry[cur];
            d += 1;
        }

        debug_assert!(bot > top);
        if self.report_seedlings > 0 {
            debug_assert!(stack_depth as u32 <= self.report_seedlings);
        }
        if stack_depth as u32 >= self.report_seedlings {
            return self.report(stack_depth, top, bot, sink);
        }
        false
    }

    /// 命中上报。seedling 模式只记录错配集并继续搜索；普通模式先撤销
    /// mutation、把 mutation 位置并入错配栈，再交给 sink。
    fn report<S: HitSink>(&mut self, stack_depth: usize, top: u32, bot: u32, sink: &mut S) -> bool {
        if self.report_seedlings > 0 {
            debug_assert!(stack_depth as u32 <= self.report_seedlings);
            self.report_seedling(stack_depth);
            return false;
        }
        self.undo_mutations();
        for (i, m) in self.muts.iter().enumerate() {
            self.mms[stack_depth + i] = m.pos as u32;
        }
        let hit = self.report_hit(stack_depth + self.muts.len(), top, bot, sink);
        self.apply_mutations();
        hit
    }

    /// 在 [top, bot) 中随机起点循环尝试各行，直到 sink 接受或全部拒绝。
    fn report_hit<S: HitSink>(&mut self, n_mms: usize, top: u32, bot: u32, sink: &mut S) -> bool {
        let spread = bot - top;
        let r = top + self.rand.next_u32() % spread;
        for k in 0..spread {
            let mut ri = r + k;
            if ri >= bot {
                ri -= spread;
            }
            let Some((ref_idx, off)) = self.ebwt.row_to_pos(ri, self.qlen as u32) else {
                continue;
            };
            let hit = RawHit {
                ref_idx,
                off,
                row: ri,
                top,
                bot,
                mms: &self.mms[..n_mms],
                qry: &self.qry,
                qual: &self.qual,
                name: &self.name,
            };
            if sink.report_chase_one(&hit) {
                return true;
            }
        }
        false
    }

    /// 把当前错配集追加到 seedling 缓冲：(pos, base) 对，对间以 0xfe 分隔。
    fn report_seedling(&mut self, stack_depth: usize) {
        debug_assert!(self.report_seedlings > 0);
        for i in 0..stack_depth {
            let pos = self.mms[i];
            debug_assert!((pos as usize) < self.qlen);
            self.seedlings.push(pos as u8);
            // chars 以深度为下标
            let ci = (self.qlen as u32 - pos - 1) as usize;
            let c = self.chars[ci];
            debug_assert!(c < 4 && c != self.qry[pos as usize]);
            self.seedlings.push(c);
            if i < stack_depth - 1 {
                self.seedlings.push(SEEDLING_SEP);
            }
        }
    }

    /// 重算本帧的 (low_alt_qual, eligible_num, eligible_sz) 并与增量
    /// 维护的值对照；只在 debug 断言中调用。
    fn sanity_check_eligibility(
        &self,
        frame: usize,
        depth: u32,
        d: u32,
        unrev_off: u32,
        low_alt_qual: u8,
        eligible_sz: u32,
        eligible_num: u32,
    ) -> bool {
        let qlen = self.qlen as u32;
        let mut cum_sz = 0u32;
        let mut visited = 0u32;
        for i in depth.max(unrev_off)..=d {
            let icur = (qlen - i - 1) as usize;
            let qi = dna::phred(self.qual[icur]);
            if qi == low_alt_qual && self.elim(frame, i) != ELIM_ALL {
                for j in 0..4u8 {
                    if self.elim(frame, i) & (1 << j) == 0 {
                        cum_sz += self.pair_spread(frame, i, j);
                        visited += 1;
                    }
                }
            }
        }
        cum_sz == eligible_sz && visited == eligible_num
    }
}

/// 把 seedling 缓冲解析为错配集列表。同一 seedling 内的对以 0xfe 连接，
/// 相邻 seedling 直接相连（pos < SPREAD < 0xfe，无歧义）。
pub fn split_seedlings(buf: &[u8]) -> Vec<Vec<(u8, u8)>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < buf.len() {
        let mut cur = vec![(buf[i], buf[i + 1])];
        i += 2;
        while i < buf.len() && buf[i] == SEEDLING_SEP {
            cur.push((buf[i + 1], buf[i + 2]));
            i += 3;
        }
        out.push(cur);
    }
    out
}
