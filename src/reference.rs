// Host reference implementations
// Each algorithm has a single-threaded version and a rayon version; both are timed as
// CPU baselines and the single-threaded one is the oracle device results are checked against.

use rayon::prelude::*;

/// Wrapping sum.
pub fn sum(values: &[u32]) -> u32 {
    values.iter().fold(0u32, |acc, &v| acc.wrapping_add(v))
}

pub fn par_sum(values: &[u32]) -> u32 {
    values
        .par_iter()
        .copied()
        .reduce(|| 0u32, |a, b| a.wrapping_add(b))
}

/// Inclusive prefix sum with wrapping addition.
pub fn prefix_sum(values: &[u32]) -> Vec<u32> {
    let mut acc = 0u32;
    values
        .iter()
        .map(|&v| {
            acc = acc.wrapping_add(v);
            acc
        })
        .collect()
}

/// Chunked parallel scan: local scans, a serial scan of chunk totals, then a parallel fix-up.
pub fn par_prefix_sum(values: &[u32]) -> Vec<u32> {
    const CHUNK: usize = 1 << 16;
    if values.len() <= CHUNK {
        return prefix_sum(values);
    }

    let mut out = values.to_vec();
    out.par_chunks_mut(CHUNK).for_each(|chunk| {
        let mut acc = 0u32;
        for v in chunk.iter_mut() {
            acc = acc.wrapping_add(*v);
            *v = acc;
        }
    });

    let mut carries = Vec::with_capacity(out.len().div_ceil(CHUNK));
    let mut carry = 0u32;
    for chunk in out.chunks(CHUNK) {
        carries.push(carry);
        if let Some(&last) = chunk.last() {
            carry = carry.wrapping_add(last);
        }
    }

    out.par_chunks_mut(CHUNK)
        .zip(carries.par_iter())
        .for_each(|(chunk, &carry)| {
            if carry != 0 {
                for v in chunk.iter_mut() {
                    *v = v.wrapping_add(carry);
                }
            }
        });
    out
}

pub fn sort<T: Ord + Copy>(values: &[T]) -> Vec<T> {
    let mut out = values.to_vec();
    out.sort_unstable();
    out
}

pub fn par_sort<T: Ord + Copy + Send>(values: &[T]) -> Vec<T> {
    let mut out = values.to_vec();
    out.par_sort_unstable();
    out
}

/// LSD radix sort with `bits`-wide digits over the low `key_bits` of each key.
/// Stable per pass, so the final order is by the low `key_bits` bits with ties in input order.
pub fn radix_sort(keys: &[u32], bits: u32, key_bits: u32) -> Vec<u32> {
    let n = keys.len();
    let radix = 1usize << bits;
    let mask = (radix - 1) as u32;
    let mut current = keys.to_vec();
    let mut scratch = vec![0u32; n];

    let mut shift = 0;
    while shift < key_bits {
        let mut histogram = vec![0usize; radix];
        for &key in &current {
            histogram[((key >> shift) & mask) as usize] += 1;
        }

        // Exclusive prefix sum
        let mut sum = 0;
        for count in histogram.iter_mut() {
            let temp = *count;
            *count = sum;
            sum += temp;
        }

        for &key in &current {
            let digit = ((key >> shift) & mask) as usize;
            scratch[histogram[digit]] = key;
            histogram[digit] += 1;
        }
        std::mem::swap(&mut current, &mut scratch);
        shift += bits;
    }
    current
}

/// Row-major transpose of a `rows` x `cols` matrix.
pub fn transpose<T: Copy + Default>(src: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = vec![T::default(); rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = src[r * cols + c];
        }
    }
    out
}

pub fn par_transpose<T: Copy + Default + Send + Sync>(src: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = vec![T::default(); rows * cols];
    if rows == 0 {
        return out;
    }
    out.par_chunks_mut(rows).enumerate().for_each(|(c, column)| {
        for (r, slot) in column.iter_mut().enumerate() {
            *slot = src[r * cols + c];
        }
    });
    out
}

/// C = A x B with A of shape m x k and B of shape k x n, all row-major.
pub fn matmul(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for (i, row) in c.chunks_mut(n.max(1)).take(m).enumerate() {
        matmul_row(a, b, k, n, i, row);
    }
    c
}

pub fn par_matmul(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    if n == 0 {
        return c;
    }
    c.par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| matmul_row(a, b, k, n, i, row));
    c
}

fn matmul_row(a: &[f32], b: &[f32], k: usize, n: usize, i: usize, row: &mut [f32]) {
    for p in 0..k {
        let a_ip = a[i * k + p];
        let b_row = &b[p * n..(p + 1) * n];
        for (c_ij, &b_pj) in row.iter_mut().zip(b_row) {
            *c_ij += a_ip * b_pj;
        }
    }
}

pub fn vector_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

pub fn par_vector_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.par_iter().zip(b.par_iter()).map(|(x, y)| x + y).collect()
}
