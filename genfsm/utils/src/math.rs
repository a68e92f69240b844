use std::cmp;

fn bits_helper(n: u64, i: u64) -> u64 {
    if n == 0 {
        i
    } else {
        bits_helper(n / 2, i + 1)
    }
}

/// Number of bits needed to represent `n` distinct values, i.e., the values
/// `0..n`. Always at least one.
pub fn bits_needed_for(n: u64) -> u64 {
    cmp::max(bits_helper(n.saturating_sub(1), 0), 1)
}

/// Value of `n` after truncation to a signed register of `width` bits.
pub fn wrap_signed(n: i64, width: u64) -> i64 {
    if width == 0 || width >= 64 {
        return n;
    }
    let shift = 64 - width as u32;
    (n << shift) >> shift
}
