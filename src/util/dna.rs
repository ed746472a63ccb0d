/// 碱基编码约定：A/C/G/T 压缩为 2-bit 码 {0,1,2,3}，所有模糊碱基
/// （N 及其他 IUPAC 符号）统一为 4。位压缩参考序列中只存放 0..=3。
pub const BASE_AMBIG: u8 = 4;

/// 索引文本字母表大小：{0:$, 1:A, 2:C, 3:G, 4:T, 5:N}。
/// 查询碱基码 b 对应索引字母 b+1，0 预留为 contig 分隔符。
pub const SIGMA: usize = 6;

/// Phred+33 质量字符的合法范围（phred 0..=40）。
pub const QUAL_MIN: u8 = 33;
pub const QUAL_MAX: u8 = 73;

#[inline]
pub fn base_to_code(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' | b'U' => 3,
        _ => BASE_AMBIG, // N 与其他符号一律视为模糊
    }
}

#[inline]
pub fn code_to_base(c: u8) -> u8 {
    match c {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

/// 2-bit 码的互补：A<->T, C<->G；模糊碱基保持为 4。
#[inline]
pub fn complement_code(c: u8) -> u8 {
    if c < 4 { 3 - c } else { BASE_AMBIG }
}

/// 查询碱基码 -> 索引文本字母（0 为分隔符，模糊碱基记为 5）。
#[inline]
pub fn code_to_letter(c: u8) -> u8 {
    if c < 4 { c + 1 } else { 5 }
}

pub fn seq_to_codes(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| base_to_code(b)).collect()
}

pub fn revcomp_codes(codes: &[u8]) -> Vec<u8> {
    codes.iter().rev().map(|&c| complement_code(c)).collect()
}

/// Phred+33 字符 -> phred 数值；低于 33 的非法字符按 0 处理。
#[inline]
pub fn phred(q: u8) -> u8 {
    q.saturating_sub(33)
}

#[inline]
pub fn qual_in_range(q: u8) -> bool {
    (QUAL_MIN..=QUAL_MAX).contains(&q)
}
