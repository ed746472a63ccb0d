use anyhow::{anyhow, bail, Context, Result};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::util::dna::BASE_AMBIG;

/// 参考序列中一段"模糊前导 + 明确碱基"的描述记录。
/// off = 本段前导模糊碱基（N）数量，len = 随后的明确碱基数量，
/// first = 本记录是否开启一条新的参考序列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefRecord {
    pub off: u32,
    pub len: u32,
    pub first: bool,
}

/// 位压缩参考序列。明确碱基以 2-bit 码存放在 `buf` 中（每字节 4 个，
/// 低位在前），模糊碱基不占空间，由 `RefRecord` 的 off 字段隐式恢复。
/// 结构记录来自 `<prefix>.3.ebwt`，压缩载荷来自 `<prefix>.4.ebwt`。
///
/// 构建完成后完全只读，可在多个工作线程间以引用共享。
#[derive(Debug)]
pub struct BitPackedReference {
    recs: Vec<RefRecord>,
    ref_lens: Vec<u32>,
    ref_offs: Vec<u32>,
    ref_rec_offs: Vec<u32>,
    buf: Vec<u8>,
    nrefs: u32,
    loaded: bool,
}

fn read_u32<R: Read>(r: &mut R, swap: bool, what: &str, path: &str) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)
        .with_context(|| format!("error reading {} from reference index file '{}'", what, path))?;
    let v = u32::from_ne_bytes(b);
    Ok(if swap { v.swap_bytes() } else { v })
}

impl BitPackedReference {
    /// 从 `<prefix>.3.ebwt` / `<prefix>.4.ebwt` 装载。
    /// 任一文件打开失败时返回未装载对象（`loaded() == false`）；
    /// 文件内容损坏或长度不符则报错并指明文件名。
    pub fn load(prefix: &str) -> Result<Self> {
        let s3 = format!("{}.3.ebwt", prefix);
        let s4 = format!("{}.4.ebwt", prefix);
        let f3 = match std::fs::File::open(&s3) {
            Ok(f) => f,
            Err(_) => return Ok(Self::unloaded()),
        };
        let mut r3 = BufReader::new(f3);

        // 字节序哨兵：写入端按本机字节序写下 1
        let one = read_u32(&mut r3, false, "endianness sentinel", &s3)?;
        let swap = match one {
            1 => false,
            0x0100_0000 => true,
            _ => bail!("bad endianness sentinel 0x{:08X} in reference index file '{}'", one, s3),
        };
        let sz = read_u32(&mut r3, swap, "record count", &s3)?;

        let mut recs: Vec<RefRecord> = Vec::with_capacity(sz as usize);
        let mut ref_lens: Vec<u32> = Vec::new();
        let mut ref_offs: Vec<u32> = Vec::new();
        let mut ref_rec_offs: Vec<u32> = Vec::new();
        let mut nrefs = 0u32;
        // 到目前为止所有明确碱基的累计数（即 buf 中的位压缩偏移）
        let mut cumsz = 0u32;
        // 当前参考序列内 off+len 的累计（序列总长）
        let mut cumlen = 0u32;
        for _ in 0..sz {
            let off = read_u32(&mut r3, swap, "record", &s3)?;
            let len = read_u32(&mut r3, swap, "record", &s3)?;
            let first = read_u32(&mut r3, swap, "record", &s3)? != 0;
            recs.push(RefRecord { off, len, first });
            if first {
                ref_rec_offs.push(recs.len() as u32 - 1);
                ref_offs.push(cumsz);
                if nrefs > 0 {
                    ref_lens.push(cumlen);
                }
                cumlen = 0;
                nrefs += 1;
            }
            cumsz += len;
            cumlen += off + len;
        }
        // 末尾补哨兵项，标记最后一条参考序列的结束
        ref_rec_offs.push(recs.len() as u32);
        ref_offs.push(cumsz);
        ref_lens.push(cumlen);
        if nrefs as usize != ref_lens.len() {
            bail!("reference index file '{}' contains no 'first' record", s3);
        }

        let f4 = match std::fs::File::open(&s4) {
            Ok(f) => f,
            Err(_) => return Ok(Self::unloaded()),
        };
        let mut r4 = BufReader::new(f4);
        let nbytes = cumsz.div_ceil(4) as usize;
        let mut buf = vec![0u8; nbytes];
        r4.read_exact(&mut buf).with_context(|| {
            format!("only partial payload available in reference index file '{}' (expected {} bytes)", s4, nbytes)
        })?;
        let mut probe = [0u8; 1];
        if r4.read(&mut probe)? != 0 {
            bail!("trailing bytes after {}-byte payload in reference index file '{}'", nbytes, s4);
        }

        Ok(Self { recs, ref_lens, ref_offs, ref_rec_offs, buf, nrefs, loaded: true })
    }

    fn unloaded() -> Self {
        Self {
            recs: Vec::new(),
            ref_lens: Vec::new(),
            ref_offs: Vec::new(),
            ref_rec_offs: Vec::new(),
            buf: Vec::new(),
            nrefs: 0,
            loaded: false,
        }
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn num_refs(&self) -> u32 {
        self.nrefs
    }

    /// 参考序列 t 的总长（含内部 N 段，不含末尾被截掉的 N 段）。
    pub fn approx_len(&self, t: u32) -> u32 {
        assert!(t < self.nrefs, "reference index {} out of range ({} refs)", t, self.nrefs);
        self.ref_lens[t as usize]
    }

    #[inline]
    fn decode(&self, buf_off: u32) -> u8 {
        let shift = (buf_off & 3) << 1;
        (self.buf[(buf_off >> 2) as usize] >> shift) & 3
    }

    /// 读取参考 t 偏移 toff 处的单个碱基码；模糊或越界返回 4。
    /// 逐条线性扫描该参考的记录；记录数通常很小。
    pub fn get_base(&self, t: u32, toff: u32) -> u8 {
        if t >= self.nrefs {
            return BASE_AMBIG;
        }
        let reci = self.ref_rec_offs[t as usize];
        let recf = self.ref_rec_offs[t as usize + 1];
        let mut buf_off = self.ref_offs[t as usize];
        let mut seen = 0u32;
        for i in reci..recf {
            let rec = self.recs[i as usize];
            seen += rec.off;
            if toff < seen {
                return BASE_AMBIG;
            }
            if toff < seen + rec.len {
                return self.decode(buf_off + (toff - seen));
            }
            buf_off += rec.len;
            seen += rec.len;
        }
        BASE_AMBIG
    }

    /// 批量读取 count 个碱基码到 dest；等价于连续 get_base，但一趟扫完。
    /// 超出最后一条记录的位置一律填 4。
    pub fn get_stretch(&self, dest: &mut [u8], t: u32, toff: u32, count: usize) {
        assert!(dest.len() >= count);
        if t >= self.nrefs {
            dest[..count].fill(BASE_AMBIG);
            return;
        }
        let reci = self.ref_rec_offs[t as usize];
        let recf = self.ref_rec_offs[t as usize + 1];
        let mut buf_off = self.ref_offs[t as usize];
        let mut toff = toff;
        let mut seen = 0u32;
        let mut cur = 0usize;
        let mut left = count;
        for i in reci..recf {
            let rec = self.recs[i as usize];
            seen += rec.off;
            while toff < seen && left > 0 {
                dest[cur] = BASE_AMBIG;
                cur += 1;
                toff += 1;
                left -= 1;
            }
            if left == 0 {
                return;
            }
            buf_off += toff - seen;
            seen += rec.len;
            while toff < seen && left > 0 {
                dest[cur] = self.decode(buf_off);
                cur += 1;
                buf_off += 1;
                toff += 1;
                left -= 1;
            }
            if left == 0 {
                return;
            }
        }
        dest[cur..cur + left].fill(BASE_AMBIG);
    }

    /// 还原参考 t 的完整序列码（测试与 sanity 校验用）。
    pub fn to_codes(&self, t: u32) -> Vec<u8> {
        let n = self.approx_len(t) as usize;
        let mut v = vec![0u8; n];
        self.get_stretch(&mut v, t, 0, n);
        v
    }
}

/// 把正向参考序列码（0..=4）写成上述两个索引文件。
/// 每条序列末尾的模糊碱基段被丢弃；全模糊序列留下一条空记录。
pub fn write_ref_image<P: AsRef<Path>>(prefix: P, seqs: &[Vec<u8>]) -> Result<()> {
    let prefix = prefix.as_ref().to_str().ok_or_else(|| anyhow!("non-UTF8 index prefix"))?;
    let mut recs: Vec<RefRecord> = Vec::new();
    let mut packed: Vec<u8> = Vec::new();
    let mut nbases = 0u32;
    for seq in seqs {
        let mut first = true;
        let mut i = 0usize;
        while i < seq.len() {
            let amb_start = i;
            while i < seq.len() && seq[i] >= 4 {
                i += 1;
            }
            if i == seq.len() {
                break; // 末尾 N 段不落盘
            }
            let plain_start = i;
            while i < seq.len() && seq[i] < 4 {
                i += 1;
            }
            recs.push(RefRecord {
                off: (plain_start - amb_start) as u32,
                len: (i - plain_start) as u32,
                first,
            });
            first = false;
            for &c in &seq[plain_start..i] {
                let shift = (nbases & 3) << 1;
                if shift == 0 {
                    packed.push(0);
                }
                *packed.last_mut().unwrap() |= c << shift;
                nbases += 1;
            }
        }
        if first {
            // 空序列或全 N：保留一条开启记录，长度计为 0
            recs.push(RefRecord { off: 0, len: 0, first: true });
        }
    }

    let s3 = format!("{}.3.ebwt", prefix);
    let s4 = format!("{}.4.ebwt", prefix);
    let mut w3 = BufWriter::new(
        std::fs::File::create(&s3).with_context(|| format!("cannot create '{}'", s3))?,
    );
    w3.write_all(&1u32.to_ne_bytes())?;
    w3.write_all(&(recs.len() as u32).to_ne_bytes())?;
    for rec in &recs {
        w3.write_all(&rec.off.to_ne_bytes())?;
        w3.write_all(&rec.len.to_ne_bytes())?;
        w3.write_all(&(rec.first as u32).to_ne_bytes())?;
    }
    w3.flush()?;

    // 载荷长度补齐到 4 碱基边界（div_ceil 已经向上取整到整字节）
    let mut w4 = BufWriter::new(
        std::fs::File::create(&s4).with_context(|| format!("cannot create '{}'", s4))?,
    );
    w4.write_all(&packed)?;
    w4.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna;
    use std::io::Write as _;

    fn image_from(seqs: &[&[u8]]) -> (tempfile::TempDir, String, BitPackedReference) {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("ref").to_str().unwrap().to_string();
        let codes: Vec<Vec<u8>> = seqs.iter().map(|s| dna::seq_to_codes(s)).collect();
        write_ref_image(&prefix, &codes).unwrap();
        let bpr = BitPackedReference::load(&prefix).unwrap();
        assert!(bpr.loaded());
        (dir, prefix, bpr)
    }

    fn expected_codes(seq: &[u8]) -> Vec<u8> {
        let mut v = dna::seq_to_codes(seq);
        while v.last() == Some(&dna::BASE_AMBIG) {
            v.pop(); // 末尾 N 不计入 approx_len
        }
        v
    }

    #[test]
    fn roundtrip_single_sequence() {
        let seq = b"ACGTNNACGTACGT";
        let (_dir, _prefix, bpr) = image_from(&[seq]);
        assert_eq!(bpr.num_refs(), 1);
        let want = expected_codes(seq);
        assert_eq!(bpr.approx_len(0) as usize, want.len());
        for (o, &c) in want.iter().enumerate() {
            assert_eq!(bpr.get_base(0, o as u32), c, "offset {}", o);
        }
    }

    #[test]
    fn roundtrip_multiple_sequences() {
        let seqs: &[&[u8]] = &[b"NNACGNNTTNN", b"GGGG", b"NACGTN"];
        let (_dir, _prefix, bpr) = image_from(seqs);
        assert_eq!(bpr.num_refs(), 3);
        for (t, seq) in seqs.iter().enumerate() {
            let want = expected_codes(seq);
            assert_eq!(bpr.approx_len(t as u32) as usize, want.len(), "ref {}", t);
            for (o, &c) in want.iter().enumerate() {
                assert_eq!(bpr.get_base(t as u32, o as u32), c, "ref {} offset {}", t, o);
            }
        }
    }

    #[test]
    fn stretch_matches_get_base() {
        let seqs: &[&[u8]] = &[b"NNACGNNTT", b"ACGTACGTNNNNNACGT"];
        let (_dir, _prefix, bpr) = image_from(seqs);
        for t in 0..bpr.num_refs() {
            let n = bpr.approx_len(t) as usize;
            // 刻意越过序列末尾读取，尾部应全为 4
            let mut dest = vec![0u8; n + 5];
            bpr.get_stretch(&mut dest, t, 0, n + 5);
            for (o, &c) in dest.iter().enumerate() {
                assert_eq!(c, bpr.get_base(t, o as u32), "ref {} offset {}", t, o);
            }
            for &c in &dest[n..] {
                assert_eq!(c, dna::BASE_AMBIG);
            }
            // 从中间偏移读取
            if n > 3 {
                let mut mid = vec![0u8; n - 2];
                bpr.get_stretch(&mut mid, t, 2, n - 2);
                for (i, &c) in mid.iter().enumerate() {
                    assert_eq!(c, bpr.get_base(t, (i + 2) as u32));
                }
            }
        }
    }

    #[test]
    fn pathological_many_short_ambiguous_runs() {
        // N 与明确碱基交替出现，记录数与碱基数同量级
        let mut seq = Vec::new();
        for i in 0..200 {
            seq.push(b"ACGT"[i % 4]);
            seq.push(b'N');
            if i % 3 == 0 {
                seq.push(b'N');
            }
        }
        seq.extend_from_slice(b"ACGT");
        let (_dir, _prefix, bpr) = image_from(&[&seq]);
        let want = expected_codes(&seq);
        assert_eq!(bpr.approx_len(0) as usize, want.len());
        for (o, &c) in want.iter().enumerate() {
            assert_eq!(bpr.get_base(0, o as u32), c, "offset {}", o);
        }
        let mut dest = vec![0u8; want.len()];
        bpr.get_stretch(&mut dest, 0, 0, want.len());
        assert_eq!(dest, want);
    }

    #[test]
    fn all_ambiguous_sequence() {
        let (_dir, _prefix, bpr) = image_from(&[b"NNNNN", b"ACGT"]);
        assert_eq!(bpr.num_refs(), 2);
        assert_eq!(bpr.approx_len(0), 0);
        assert_eq!(bpr.get_base(0, 0), dna::BASE_AMBIG);
        assert_eq!(bpr.get_base(1, 0), 0);
    }

    #[test]
    fn out_of_range_reads_return_ambig() {
        let (_dir, _prefix, bpr) = image_from(&[b"ACGT"]);
        assert_eq!(bpr.get_base(0, 100), dna::BASE_AMBIG);
        assert_eq!(bpr.get_base(7, 0), dna::BASE_AMBIG);
    }

    #[test]
    fn missing_files_yield_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("nothing").to_str().unwrap().to_string();
        let bpr = BitPackedReference::load(&prefix).unwrap();
        assert!(!bpr.loaded());
        assert_eq!(bpr.num_refs(), 0);
    }

    #[test]
    fn short_payload_is_fatal() {
        let (_dir, prefix, _bpr) = image_from(&[b"ACGTACGTACGT"]);
        let s4 = format!("{}.4.ebwt", prefix);
        let full = std::fs::read(&s4).unwrap();
        std::fs::write(&s4, &full[..full.len() - 1]).unwrap();
        let err = BitPackedReference::load(&prefix).unwrap_err();
        assert!(err.to_string().contains(".4.ebwt"), "{}", err);
    }

    #[test]
    fn trailing_payload_is_fatal() {
        let (_dir, prefix, _bpr) = image_from(&[b"ACGT"]);
        let s4 = format!("{}.4.ebwt", prefix);
        let mut f = std::fs::OpenOptions::new().append(true).open(&s4).unwrap();
        f.write_all(&[0u8]).unwrap();
        drop(f);
        let err = BitPackedReference::load(&prefix).unwrap_err();
        assert!(err.to_string().contains("trailing"), "{}", err);
    }

    #[test]
    fn byte_swapped_image_loads_identically() {
        let seqs: &[&[u8]] = &[b"NNACGNNTTNN", b"ACGTACGT"];
        let (_dir, prefix, native) = image_from(seqs);
        // 手工构造字节序对调的结构文件，载荷保持不变
        let s3 = format!("{}.3.ebwt", prefix);
        let raw = std::fs::read(&s3).unwrap();
        let mut swapped = Vec::with_capacity(raw.len());
        for chunk in raw.chunks_exact(4) {
            let v = u32::from_ne_bytes(chunk.try_into().unwrap()).swap_bytes();
            swapped.extend_from_slice(&v.to_ne_bytes());
        }
        std::fs::write(&s3, &swapped).unwrap();
        let reloaded = BitPackedReference::load(&prefix).unwrap();
        assert!(reloaded.loaded());
        assert_eq!(reloaded.num_refs(), native.num_refs());
        assert_eq!(reloaded.buf, native.buf);
        assert_eq!(reloaded.recs, native.recs);
        for t in 0..native.num_refs() {
            assert_eq!(reloaded.to_codes(t), native.to_codes(t));
        }
    }

    #[test]
    fn bad_sentinel_is_fatal() {
        let (_dir, prefix, _bpr) = image_from(&[b"ACGT"]);
        let s3 = format!("{}.3.ebwt", prefix);
        let mut raw = std::fs::read(&s3).unwrap();
        raw[0..4].copy_from_slice(&7u32.to_ne_bytes());
        std::fs::write(&s3, &raw).unwrap();
        let err = BitPackedReference::load(&prefix).unwrap_err();
        assert!(err.to_string().contains("sentinel"), "{}", err);
    }
}
