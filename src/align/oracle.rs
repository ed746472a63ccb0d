use crate::align::backtrack::SearchPolicy;
use crate::util::dna;

/// 朴素对照实现找到的一个合格比对。off 为正向参考坐标，
/// mms 为按对齐链 5' 端下标编码的错配位集。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleHit {
    pub ref_idx: u32,
    pub off: u32,
    pub mms: u64,
    pub ham: u32,
}

/// 暴力扫描每条参考的每个比对位置，套用与回溯搜索完全相同的
/// 接受准则：加权距离 <= qual_thresh；[0, unrev_off) 不得错配；
/// [unrev_off, one_rev_off) 至多 1 个；[one_rev_off, two_rev_off)
/// 至多 2 个；half_and_half 模式下两半各恰好 1 个。参考中的模糊
/// 碱基不可比对（索引中也不会产生这样的行）。
///
/// query/qual 按对齐链 5'->3' 给出；mut_positions（同坐标系）
/// 会并入每个命中的错配位集。O(ref * qlen)，仅供测试与 sanity 校验。
pub fn naive_oracle(
    refs: &[Vec<u8>],
    query: &[u8],
    qual: &[u8],
    policy: &SearchPolicy,
    iham: u32,
    mut_positions: &[u32],
) -> Vec<OracleHit> {
    let plen = query.len();
    let mut hits = Vec::new();
    for (ri, text) in refs.iter().enumerate() {
        if text.len() < plen {
            continue;
        }
        'offset: for j in 0..=(text.len() - plen) {
            let mut ham = iham;
            let mut rev1mm = 0u32;
            let mut rev2mm = 0u32;
            let mut diffs = 0u64;
            // 自 3' 端向 5' 端扫描，越界预算尽早剪枝
            for p in (0..plen).rev() {
                let t = text[j + p];
                if t >= 4 {
                    continue 'offset;
                }
                if query[p] != t {
                    ham += dna::phred(qual[p]) as u32;
                    if ham > policy.qual_thresh {
                        continue 'offset;
                    }
                    let p = p as u32;
                    if p < policy.unrev_off {
                        continue 'offset;
                    } else if p < policy.one_rev_off {
                        rev1mm += 1;
                        if rev1mm > 1 {
                            continue 'offset;
                        }
                    } else if p < policy.two_rev_off {
                        rev2mm += 1;
                        if rev2mm > 2 || (policy.half_and_half && rev2mm > 1) {
                            continue 'offset;
                        }
                    }
                    diffs |= 1 << p;
                }
            }
            if policy.half_and_half && (rev1mm != 1 || rev2mm != 1) {
                continue;
            }
            for &p in mut_positions {
                diffs |= 1 << p;
            }
            hits.push(OracleHit { ref_idx: ri as u32, off: j as u32, mms: diffs, ham });
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::backtrack::{Backtracker, HitSink, RawHit};
    use crate::index::fm::Ebwt;
    use crate::util::dna::seq_to_codes;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[derive(Default)]
    struct CollectSink {
        hits: Vec<(u32, u32, Vec<u32>)>,
    }

    impl HitSink for CollectSink {
        fn report_chase_one(&mut self, hit: &RawHit<'_>) -> bool {
            self.hits.push((hit.ref_idx, hit.off, hit.mms.to_vec()));
            true
        }
    }

    fn policy(unrev: u32, one: u32, two: u32, thresh: u32) -> SearchPolicy {
        SearchPolicy {
            unrev_off: unrev,
            one_rev_off: one,
            two_rev_off: two,
            qual_thresh: thresh,
            ..SearchPolicy::default()
        }
    }

    #[test]
    fn oracle_scores_and_filters_by_region() {
        let refs = vec![seq_to_codes(b"AAAAACCCCC")];
        let query = seq_to_codes(b"AAAATCCCCC");
        let qual = vec![b'?'; 10]; // phred 30
        let hits = naive_oracle(&refs, &query, &qual, &policy(4, 10, 10, 30), 0, &[]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].off, 0);
        assert_eq!(hits[0].mms, 1 << 4);
        assert_eq!(hits[0].ham, 30);

        // 错配落入不可回溯区
        assert!(naive_oracle(&refs, &query, &qual, &policy(5, 10, 10, 30), 0, &[]).is_empty());
        // 预算不足
        assert!(naive_oracle(&refs, &query, &qual, &policy(4, 10, 10, 29), 0, &[]).is_empty());
    }

    #[test]
    fn oracle_rejects_alignment_over_ambiguous_base() {
        let refs = vec![seq_to_codes(b"AANAA")];
        let query = seq_to_codes(b"AAAAA");
        let qual = vec![b'I'; 5];
        assert!(naive_oracle(&refs, &query, &qual, &policy(0, 5, 5, 70), 0, &[]).is_empty());
        let query2 = seq_to_codes(b"AA");
        let hits = naive_oracle(&refs, &query2, &qual[..2].to_vec(), &policy(0, 2, 2, 70), 0, &[]);
        assert_eq!(hits.len(), 2); // 两侧各一处
    }

    #[test]
    fn oracle_half_and_half_counts_per_half() {
        let refs = vec![seq_to_codes(b"ACGTAGGCTAAC")];
        let qual = vec![b'+'; 12];
        let mut pol = policy(0, 6, 12, 60);
        pol.half_and_half = true;
        let good = seq_to_codes(b"ACTTAGGCAAAC"); // 下标 2 与 8
        assert_eq!(naive_oracle(&refs, &good, &qual, &pol, 0, &[]).len(), 1);
        let same_half = seq_to_codes(b"AGTTAGGCTAAC"); // 下标 1 与 2
        assert!(naive_oracle(&refs, &same_half, &qual, &pol, 0, &[]).is_empty());
        let exact = seq_to_codes(b"ACGTAGGCTAAC");
        assert!(naive_oracle(&refs, &exact, &qual, &pol, 0, &[]).is_empty());
    }

    /// 随机小规模一致性检验：回溯器命中必在 oracle 集合内，且
    /// 命中存在性两者一致。
    #[test]
    fn backtracker_agrees_with_oracle_on_random_inputs() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..60 {
            // 随机参考，带少量 N
            let rlen = rng.gen_range(20..40);
            let refs_codes: Vec<Vec<u8>> = (0..2)
                .map(|_| {
                    (0..rlen)
                        .map(|_| {
                            if rng.gen_ratio(1, 12) {
                                4u8
                            } else {
                                rng.gen_range(0..4u8)
                            }
                        })
                        .collect()
                })
                .collect();
            let seqs: Vec<(String, Vec<u8>)> = refs_codes
                .iter()
                .enumerate()
                .map(|(i, c)| (format!("r{}", i), c.clone()))
                .collect();
            let ebwt = Ebwt::build_reversed(&seqs, 8, 3);

            // 从参考中抽一段做读段，掺入错配
            let qlen = rng.gen_range(8..14usize);
            let src = rng.gen_range(0..refs_codes.len());
            let max_start = refs_codes[src].len() - qlen;
            let start = rng.gen_range(0..=max_start);
            let mut query: Vec<u8> = refs_codes[src][start..start + qlen]
                .iter()
                .map(|&c| if c >= 4 { 0 } else { c })
                .collect();
            for _ in 0..rng.gen_range(0..3) {
                let p = rng.gen_range(0..qlen);
                query[p] = (query[p] + rng.gen_range(1..4)) % 4;
            }
            let qual: Vec<u8> = (0..qlen).map(|_| rng.gen_range(33..=73u8)).collect();

            // 每三轮里有一轮启用 half-and-half（要求 0 < one < two <= qlen）
            let half_and_half = round % 3 == 2;
            let (unrev, one, two) = if half_and_half {
                let one = rng.gen_range(1..qlen as u32);
                let two = rng.gen_range(one + 1..=qlen as u32);
                (rng.gen_range(0..=one), one, two)
            } else {
                let unrev = rng.gen_range(0..=qlen as u32 / 2);
                let one = rng.gen_range(unrev..=qlen as u32);
                let two = rng.gen_range(one..=qlen as u32);
                (unrev, one, two)
            };
            let mut pol = policy(unrev, one, two, rng.gen_range(0..90));
            pol.half_and_half = half_and_half;
            pol.seed = round;

            let oracle_hits = naive_oracle(&refs_codes, &query, &qual, &pol, 0, &[]);

            let stored: Vec<u8> = query.iter().rev().copied().collect();
            let stored_q: Vec<u8> = qual.iter().rev().copied().collect();
            let mut bt = Backtracker::new(&ebwt, pol);
            bt.set_query(&stored, &stored_q, "rnd", &[]);
            let mut sink = CollectSink::default();
            let found = bt.backtrack(0, &mut sink);

            assert_eq!(
                found,
                !oracle_hits.is_empty(),
                "round {}: existence mismatch (oracle {} hits, query {:?}, policy {:?})",
                round,
                oracle_hits.len(),
                query,
                pol
            );
            if found {
                let (ri, rev_off, mms) = &sink.hits[0];
                let clen = ebwt.contigs[*ri as usize].len;
                let fwd = clen - rev_off - qlen as u32;
                let mut diffs = 0u64;
                for &m in mms {
                    diffs |= 1 << (qlen as u32 - 1 - m);
                }
                let matched = oracle_hits
                    .iter()
                    .any(|h| h.ref_idx == *ri && h.off == fwd && h.mms == diffs);
                assert!(
                    matched,
                    "round {}: hit (ref {}, off {}, mms {:#b}) not in oracle set {:?}",
                    round, ri, fwd, diffs, oracle_hits
                );
            }
        }
    }
}
