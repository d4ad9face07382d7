//! Bitmap 操作实现
//!
//! 位 `i` 存放在第 `i / 64` 个字的第 `i % 64` 位。

use crate::error::{Error, ErrorKind, Result};

/// 每个字的位数
pub const BITS_PER_WORD: usize = u64::BITS as usize;

/// 容纳 `bits` 位所需的字数
pub const fn words_for(bits: usize) -> usize {
    (bits + BITS_PER_WORD - 1) / BITS_PER_WORD
}

/// 测试位图中某一位是否被设置
///
/// 超出位图范围的索引视为未设置。
pub fn test_bit(bitmap: &[u64], index: usize) -> bool {
    let word = index / BITS_PER_WORD;
    let bit = index % BITS_PER_WORD;

    match bitmap.get(word) {
        Some(w) => (w >> bit) & 1 != 0,
        None => false,
    }
}

/// 设置位图中的某一位
///
/// # 返回
///
/// 成功返回 ()，如果索引超出范围返回错误
pub fn set_bit(bitmap: &mut [u64], index: usize) -> Result<()> {
    let word = index / BITS_PER_WORD;
    let bit = index % BITS_PER_WORD;

    let w = bitmap
        .get_mut(word)
        .ok_or(Error::new(ErrorKind::InvalidInput, "Bitmap index out of range"))?;
    *w |= 1 << bit;
    Ok(())
}

/// 清除位图中的某一位
///
/// # 返回
///
/// 成功返回 ()，如果索引超出范围返回错误
pub fn clear_bit(bitmap: &mut [u64], index: usize) -> Result<()> {
    let word = index / BITS_PER_WORD;
    let bit = index % BITS_PER_WORD;

    let w = bitmap
        .get_mut(word)
        .ok_or(Error::new(ErrorKind::InvalidInput, "Bitmap index out of range"))?;
    *w &= !(1 << bit);
    Ok(())
}

/// 设置前 `count` 位，其余位清零
pub fn fill_ones(bitmap: &mut [u64], count: usize) {
    for (i, w) in bitmap.iter_mut().enumerate() {
        let lo = i * BITS_PER_WORD;
        *w = if count >= lo + BITS_PER_WORD {
            u64::MAX
        } else if count > lo {
            (1u64 << (count - lo)) - 1
        } else {
            0
        };
    }
}

/// 在位图中查找第一个被设置的位（值为 1 的位）
///
/// 按字扫描，字内用 `trailing_zeros` 定位最低位。
///
/// # 参数
///
/// * `bitmap` - 位图数据
/// * `end` - 结束位置（不包含）
///
/// # 返回
///
/// 成功返回第一个被设置位的索引，如果没有找到返回 None
pub fn find_first_one(bitmap: &[u64], end: usize) -> Option<usize> {
    bitmap
        .iter()
        .enumerate()
        .find(|(_, &w)| w != 0)
        .map(|(i, &w)| i * BITS_PER_WORD + w.trailing_zeros() as usize)
        .filter(|&index| index < end)
}

/// 统计位图中被设置的位数
pub fn count_ones(bitmap: &[u64]) -> usize {
    bitmap.iter().map(|w| w.count_ones() as usize).sum()
}
