/// 构建后缀数组（倍增法，O(n log^2 n)）。
/// 输入为数值化索引文本（0:$, 1..=4:ACGT, 5:N），允许多个 0 充当
/// contig 之间的分隔符。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<i32> = text.iter().map(|&b| b as i32).collect();
    let mut next: Vec<i32> = vec![0; n];

    let key = |rank: &[i32], i: usize, k: usize| -> (i32, i32) {
        let second = if i + k < rank.len() { rank[i + k] } else { -1 };
        (rank[i], second)
    };

    let mut k = 1usize;
    loop {
        sa.sort_unstable_by(|&i, &j| key(&rank, i, k).cmp(&key(&rank, j, k)));

        next[sa[0]] = 0;
        for w in 1..n {
            let inc = (key(&rank, sa[w], k) != key(&rank, sa[w - 1], k)) as i32;
            next[sa[w]] = next[sa[w - 1]] + inc;
        }
        rank.copy_from_slice(&next);
        if rank[sa[n - 1]] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }

    sa.into_iter().map(|x| x as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_sa(text: &[u8]) -> Vec<u32> {
        let mut sa: Vec<u32> = (0..text.len() as u32).collect();
        sa.sort_by_key(|&i| &text[i as usize..]);
        sa
    }

    #[test]
    fn sa_basic() {
        // 文本 ACGT$ -> 1 2 3 4 0；后缀字典序：$, A.., C.., G.., T..
        let text = [1u8, 2, 3, 4, 0];
        assert_eq!(build_sa(&text), vec![4, 0, 1, 2, 3]);
    }

    #[test]
    fn sa_matches_naive_with_separators_and_repeats() {
        let texts: &[&[u8]] = &[
            &[1, 2, 1, 2, 3, 0],
            &[1, 1, 1, 1, 0],
            &[1, 2, 3, 0, 1, 2, 3, 0],
            &[4, 3, 2, 1, 5, 1, 2, 0],
        ];
        for text in texts {
            assert_eq!(build_sa(text), naive_sa(text), "text {:?}", text);
        }
    }
}
