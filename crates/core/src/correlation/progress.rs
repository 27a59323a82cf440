//! How far into the game a ply is, in whole percent

use super::Direction;

/// Chronological progress of the ply at index `ply` out of `total`.
///
/// Forward traversal reports `floor(100 * ply / total)`. Backward traversal
/// reports 100 minus the rounded-up share of the game from this ply to the
/// end, which lands in the same `[ply, ply + 1)` bucket, so both directions
/// print the same number for the same ply.
pub fn percent_complete(ply: usize, total: usize, direction: Direction) -> u32 {
    if total == 0 {
        return 100;
    }
    let ply = ply.min(total);
    match direction {
        Direction::Forward => (ply * 100 / total) as u32,
        Direction::Backward => {
            let remaining = total - ply;
            100 - ((remaining * 100).div_ceil(total)) as u32
        }
    }
}
