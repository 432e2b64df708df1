//! Sort key generation: a CE stream in, compressed level bytes out.
//!
//! Each level below primary is buffered separately and appended behind a
//! 0x01 separator, so a key is a prefix of any stronger key for the same
//! text. Runs of common weights collapse into counted bytes chosen so that
//! byte order still matches weight order: a run followed by a lower weight
//! (or the level end) encodes upward from LOW, a run followed by a higher
//! weight encodes downward from HIGH, with MIDDLE bytes absorbing overflow.

use crate::data::{CollationData, CollationSettings};
use crate::elements::{
    primary, secondary, tertiary, CASE_MASK, COMMON_WEIGHT16, LEVEL_SEPARATOR_BYTE,
    MERGE_SEPARATOR_BYTE, MERGE_SEPARATOR_CE, MERGE_SEPARATOR_PRIMARY, NO_CE, ONLY_TERTIARY_MASK,
};
use crate::iter::CeSource;
use crate::{CaseFirst, CollationError, Strength};

pub const LEVEL_PRIMARY: u8 = 0x01;
pub const LEVEL_SECONDARY: u8 = 0x02;
pub const LEVEL_CASE: u8 = 0x04;
pub const LEVEL_TERTIARY: u8 = 0x08;
pub const LEVEL_QUATERNARY: u8 = 0x10;
pub const LEVEL_IDENTICAL: u8 = 0x20;

/// The level set implied by a settings word.
#[must_use]
pub fn levels_for(settings: &CollationSettings) -> u8 {
    let strength = settings.strength();
    let mut levels = LEVEL_PRIMARY;
    if strength >= Strength::Secondary {
        levels |= LEVEL_SECONDARY;
    }
    if settings.case_level() {
        levels |= LEVEL_CASE;
    }
    if strength >= Strength::Tertiary {
        levels |= LEVEL_TERTIARY;
    }
    if strength >= Strength::Quaternary {
        levels |= LEVEL_QUATERNARY;
    }
    if strength >= Strength::Identical {
        levels |= LEVEL_IDENTICAL;
    }
    levels
}

const PRIMARY_TERMINATOR_LOW: u8 = 0x03;
const PRIMARY_TERMINATOR_HIGH: u8 = 0xFF;

const SEC_COMMON_LOW: u8 = 0x05;
const SEC_COMMON_MIDDLE: u8 = 0x45;
const SEC_COMMON_HIGH: u8 = 0x85;
const SEC_COMMON_MAX: u32 = 0x40;

const TER_COMMON_LOW: u8 = 0x05;
const TER_COMMON_MIDDLE: u8 = 0x25;
const TER_COMMON_HIGH: u8 = 0x45;
const TER_COMMON_MAX: u32 = 0x20;

const QUAT_COMMON_LOW: u8 = 0x1C;
const QUAT_COMMON_MIDDLE: u8 = 0x8C;
const QUAT_COMMON_HIGH: u8 = 0xFC;
const QUAT_COMMON_MAX: u32 = 0x70;

/// Sorts after variable primaries, before any common run byte.
pub(crate) const QUAT_HIRAGANA_BYTE: u8 = 0x1B;

fn flush_common(
    out: &mut Vec<u8>,
    count: &mut u32,
    low: u8,
    middle: u8,
    high: u8,
    max: u32,
    next_is_higher: bool,
) {
    if *count == 0 {
        return;
    }
    let mut c = *count - 1;
    while c >= max {
        out.push(middle);
        c -= max;
    }
    if next_is_higher {
        out.push(high - c as u8);
    } else {
        out.push(low + c as u8);
    }
    *count = 0;
}

fn push_nibble(bytes: &mut Vec<u8>, pending: &mut u8, nibble: u8) {
    if *pending == 0 {
        *pending = nibble << 4;
    } else {
        bytes.push(*pending | nibble);
        *pending = 0;
    }
}

#[allow(clippy::too_many_arguments)]
fn flush_case_commons(
    bytes: &mut Vec<u8>,
    pending: &mut u8,
    count: &mut u32,
    low: u8,
    middle: u8,
    high: u8,
    max: u32,
    next_is_higher: bool,
) {
    if *count == 0 {
        return;
    }
    let mut c = *count - 1;
    while c >= max {
        push_nibble(bytes, pending, middle);
        c -= max;
    }
    let nibble = if next_is_higher { high - c as u8 } else { low + c as u8 };
    push_nibble(bytes, pending, nibble);
    *count = 0;
}

/// Appends the nonzero byte prefix of the trailing three weight bytes.
/// Weights have no interior zero bytes, so stopping at the first zero is
/// the same as trimming trailing zeros.
fn append_trailing_weight_bytes(out: &mut Vec<u8>, w: u32) {
    for shift in [16u32, 8, 0] {
        let b = ((w >> shift) & 0xFF) as u8;
        if b == 0 {
            break;
        }
        out.push(b);
    }
}

fn append_weight_bytes(out: &mut Vec<u8>, w: u32) {
    out.push((w >> 24) as u8);
    append_trailing_weight_bytes(out, w);
}

fn append_weight16_bytes(out: &mut Vec<u8>, w: u32) {
    out.push((w >> 8) as u8);
    let low = (w & 0xFF) as u8;
    if low != 0 {
        out.push(low);
    }
}

/// Writes the key levels selected in `levels` (primary through quaternary;
/// the identical level needs the original text and is appended by the
/// caller). Exhausts `iter` up to its NO_CE.
pub(crate) fn write_sort_key_up_to_quaternary<I: CeSource>(
    iter: &mut I,
    data: &CollationData,
    settings: &CollationSettings,
    levels: u8,
    key: &mut Vec<u8>,
) -> Result<(), CollationError> {
    let shifted = settings.shifted();
    let variable_top = settings.variable_top();
    let french = settings.backward_secondary();
    let upper_first = settings.case_first() == CaseFirst::Upper;
    // tertiary folding: strip case bits under a case level; flip them for
    // upper-first (which disables run compression, since the common
    // lower-case weight no longer sits at 0x0500)
    let (fold_mask, fold_xor, ter_compress) = if settings.case_level() {
        (ONLY_TERTIARY_MASK, 0, true)
    } else if upper_first {
        (0xFFFF, CASE_MASK, false)
    } else {
        (0xFFFF, 0, true)
    };
    let (case_low, case_middle, case_high, case_max, case_mixed, case_other) = if upper_first {
        (3u8, 7u8, 12u8, 4u32, 13u8, 14u8)
    } else {
        (1, 7, 13, 6, 14, 15)
    };

    let mut primaries: Vec<u8> = Vec::new();
    let mut prev_lead: u8 = 0;

    let mut sec: Vec<u8> = Vec::new();
    let mut sec_commons = 0u32;
    let mut french_seg: Vec<u8> = Vec::new();

    let mut case_bytes: Vec<u8> = Vec::new();
    let mut case_pending = 0u8;
    let mut case_commons = 0u32;

    let mut ter: Vec<u8> = Vec::new();
    let mut ter_commons = 0u32;

    let mut quat: Vec<u8> = Vec::new();
    let mut quat_commons = 0u32;

    let mut after_variable = false;

    loop {
        let ce = iter.next_ce()?;
        if ce == NO_CE {
            break;
        }
        let hira = iter.hiragana() == 1;

        if ce == MERGE_SEPARATOR_CE {
            if levels & LEVEL_PRIMARY != 0 {
                primaries.push(MERGE_SEPARATOR_BYTE);
                prev_lead = 0;
            }
            if levels & LEVEL_SECONDARY != 0 {
                if french {
                    french_seg.reverse();
                    sec.append(&mut french_seg);
                } else {
                    flush_common(
                        &mut sec,
                        &mut sec_commons,
                        SEC_COMMON_LOW,
                        SEC_COMMON_MIDDLE,
                        SEC_COMMON_HIGH,
                        SEC_COMMON_MAX,
                        false,
                    );
                }
                sec.push(MERGE_SEPARATOR_BYTE);
            }
            if levels & LEVEL_CASE != 0 {
                flush_case_commons(
                    &mut case_bytes,
                    &mut case_pending,
                    &mut case_commons,
                    case_low,
                    case_middle,
                    case_high,
                    case_max,
                    false,
                );
                if case_pending != 0 {
                    case_bytes.push(case_pending);
                    case_pending = 0;
                }
                case_bytes.push(MERGE_SEPARATOR_BYTE);
            }
            if levels & LEVEL_TERTIARY != 0 {
                flush_common(
                    &mut ter,
                    &mut ter_commons,
                    TER_COMMON_LOW,
                    TER_COMMON_MIDDLE,
                    TER_COMMON_HIGH,
                    TER_COMMON_MAX,
                    false,
                );
                ter.push(MERGE_SEPARATOR_BYTE);
            }
            if levels & LEVEL_QUATERNARY != 0 {
                flush_common(
                    &mut quat,
                    &mut quat_commons,
                    QUAT_COMMON_LOW,
                    QUAT_COMMON_MIDDLE,
                    QUAT_COMMON_HIGH,
                    QUAT_COMMON_MAX,
                    false,
                );
                quat.push(MERGE_SEPARATOR_BYTE);
            }
            after_variable = false;
            continue;
        }

        let p = primary(ce);
        if shifted {
            if p == 0 {
                // ignorables behind a variable vanish with it
                if after_variable {
                    continue;
                }
            } else if p > MERGE_SEPARATOR_PRIMARY && p < variable_top {
                if levels & LEVEL_QUATERNARY != 0 {
                    flush_common(
                        &mut quat,
                        &mut quat_commons,
                        QUAT_COMMON_LOW,
                        QUAT_COMMON_MIDDLE,
                        QUAT_COMMON_HIGH,
                        QUAT_COMMON_MAX,
                        false,
                    );
                    append_weight_bytes(&mut quat, data.reorder_primary(p));
                }
                after_variable = true;
                continue;
            } else {
                after_variable = false;
            }
        }

        if levels & LEVEL_PRIMARY != 0 && p != 0 {
            let rp = data.reorder_primary(p);
            let lead = (rp >> 24) as u8;
            if prev_lead == lead {
                append_trailing_weight_bytes(&mut primaries, rp);
            } else {
                if prev_lead != 0 {
                    primaries.push(if lead < prev_lead {
                        PRIMARY_TERMINATOR_LOW
                    } else {
                        PRIMARY_TERMINATOR_HIGH
                    });
                }
                primaries.push(lead);
                append_trailing_weight_bytes(&mut primaries, rp);
                prev_lead = if data.is_compressible(lead) { lead } else { 0 };
            }
        }

        let s = secondary(ce);
        if levels & LEVEL_SECONDARY != 0 && s != 0 {
            if french {
                // per-segment reversal; weights are single bytes here
                french_seg.push((s >> 8) as u8);
            } else if s == COMMON_WEIGHT16 {
                sec_commons += 1;
            } else {
                flush_common(
                    &mut sec,
                    &mut sec_commons,
                    SEC_COMMON_LOW,
                    SEC_COMMON_MIDDLE,
                    SEC_COMMON_HIGH,
                    SEC_COMMON_MAX,
                    s > COMMON_WEIGHT16,
                );
                append_weight16_bytes(&mut sec, s);
            }
        }

        let t16 = tertiary(ce);
        if levels & LEVEL_CASE != 0 && t16 != 0 {
            let rank = (t16 & CASE_MASK) >> 14; // 0 lower, 1 mixed, 2 upper
            let common = if upper_first { rank == 2 } else { rank == 0 };
            if common {
                case_commons += 1;
            } else {
                flush_case_commons(
                    &mut case_bytes,
                    &mut case_pending,
                    &mut case_commons,
                    case_low,
                    case_middle,
                    case_high,
                    case_max,
                    true,
                );
                push_nibble(
                    &mut case_bytes,
                    &mut case_pending,
                    if rank == 1 { case_mixed } else { case_other },
                );
            }
        }

        if levels & LEVEL_TERTIARY != 0 {
            let t = (t16 & fold_mask) ^ fold_xor;
            if t != 0 {
                if ter_compress && t == COMMON_WEIGHT16 {
                    ter_commons += 1;
                } else if ter_compress {
                    flush_common(
                        &mut ter,
                        &mut ter_commons,
                        TER_COMMON_LOW,
                        TER_COMMON_MIDDLE,
                        TER_COMMON_HIGH,
                        TER_COMMON_MAX,
                        t > COMMON_WEIGHT16,
                    );
                    append_weight16_bytes(&mut ter, t);
                } else {
                    append_weight16_bytes(&mut ter, t);
                }
            }
        }

        if levels & LEVEL_QUATERNARY != 0 && p != 0 {
            if hira {
                flush_common(
                    &mut quat,
                    &mut quat_commons,
                    QUAT_COMMON_LOW,
                    QUAT_COMMON_MIDDLE,
                    QUAT_COMMON_HIGH,
                    QUAT_COMMON_MAX,
                    false,
                );
                quat.push(QUAT_HIRAGANA_BYTE);
            } else {
                quat_commons += 1;
            }
        }
    }

    if levels & LEVEL_SECONDARY != 0 {
        if french {
            french_seg.reverse();
            sec.append(&mut french_seg);
        } else {
            flush_common(
                &mut sec,
                &mut sec_commons,
                SEC_COMMON_LOW,
                SEC_COMMON_MIDDLE,
                SEC_COMMON_HIGH,
                SEC_COMMON_MAX,
                false,
            );
        }
    }
    if levels & LEVEL_CASE != 0 {
        flush_case_commons(
            &mut case_bytes,
            &mut case_pending,
            &mut case_commons,
            case_low,
            case_middle,
            case_high,
            case_max,
            false,
        );
        if case_pending != 0 {
            case_bytes.push(case_pending);
        }
    }
    if levels & LEVEL_TERTIARY != 0 {
        flush_common(
            &mut ter,
            &mut ter_commons,
            TER_COMMON_LOW,
            TER_COMMON_MIDDLE,
            TER_COMMON_HIGH,
            TER_COMMON_MAX,
            false,
        );
    }
    if levels & LEVEL_QUATERNARY != 0 {
        flush_common(
            &mut quat,
            &mut quat_commons,
            QUAT_COMMON_LOW,
            QUAT_COMMON_MIDDLE,
            QUAT_COMMON_HIGH,
            QUAT_COMMON_MAX,
            false,
        );
    }

    let mut total = primaries.len();
    for (flag, buf) in [
        (LEVEL_SECONDARY, &sec),
        (LEVEL_CASE, &case_bytes),
        (LEVEL_TERTIARY, &ter),
        (LEVEL_QUATERNARY, &quat),
    ] {
        if levels & flag != 0 {
            total += buf.len() + 1;
        }
    }
    key.try_reserve(total).map_err(|_| CollationError::Memory)?;

    if levels & LEVEL_PRIMARY != 0 {
        key.extend_from_slice(&primaries);
    }
    for (flag, buf) in [
        (LEVEL_SECONDARY, &sec),
        (LEVEL_CASE, &case_bytes),
        (LEVEL_TERTIARY, &ter),
        (LEVEL_QUATERNARY, &quat),
    ] {
        if levels & flag != 0 {
            key.push(LEVEL_SEPARATOR_BYTE);
            key.extend_from_slice(buf);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baked;
    use crate::elements::ce_from_parts;

    struct FakeCes {
        ces: Vec<u64>,
        at: usize,
        hira: Vec<bool>,
    }

    impl FakeCes {
        fn new(ces: Vec<u64>) -> Self {
            let hira = vec![false; ces.len()];
            Self { ces, at: 0, hira }
        }
    }

    impl CeSource for FakeCes {
        fn next_ce(&mut self) -> Result<u64, CollationError> {
            let ce = self.ces.get(self.at).copied().unwrap_or(NO_CE);
            self.at += 1;
            Ok(ce)
        }

        fn hiragana(&self) -> i8 {
            i8::from(self.hira.get(self.at.wrapping_sub(1)).copied().unwrap_or(false))
        }
    }

    fn key_of(ces: Vec<u64>, settings: &CollationSettings, levels: u8) -> Vec<u8> {
        let data = baked::root_fragment();
        let mut iter = FakeCes::new(ces);
        let mut key = Vec::new();
        write_sort_key_up_to_quaternary(&mut iter, &data, settings, levels, &mut key).unwrap();
        key
    }

    /// Expands a run-compressed level back into a weight-byte count.
    fn decompress_commons(bytes: &[u8], low: u8, middle: u8, high: u8, max: u32) -> u32 {
        let mut count = 0;
        for &b in bytes {
            if b == middle {
                count += max;
            } else if b >= low && b <= middle {
                count += u32::from(b - low) + 1;
            } else if b > middle && b <= high {
                count += u32::from(high - b) + 1;
            } else {
                panic!("unexpected byte {b:#x}");
            }
        }
        count
    }

    fn letter(i: u32) -> u64 {
        ce_from_parts((0x2904 + 2 * i) << 16, 0x0500, 0x0500)
    }

    #[test]
    fn secondary_run_compression_round_trips() {
        let settings = CollationSettings::default();
        for n in [1usize, 5, 0x40, 0x41, 0x95, 0xC1] {
            let key = key_of(vec![letter(0); n], &settings, LEVEL_SECONDARY);
            // key = separator + compressed secondary level
            assert_eq!(key[0], LEVEL_SEPARATOR_BYTE);
            assert_eq!(
                decompress_commons(
                    &key[1..],
                    SEC_COMMON_LOW,
                    SEC_COMMON_MIDDLE,
                    SEC_COMMON_HIGH,
                    SEC_COMMON_MAX
                ),
                n as u32
            );
        }
    }

    #[test]
    fn runs_order_correctly_around_a_difference() {
        let settings = CollationSettings::default();
        let mark = ce_from_parts(0, 0x8600, 0x0500);
        // a longer common run before a higher weight sorts earlier
        let one = key_of(vec![letter(0), mark], &settings, LEVEL_SECONDARY);
        let two = key_of(vec![letter(0), letter(1), mark], &settings, LEVEL_SECONDARY);
        let three = key_of(
            vec![letter(0), letter(1), letter(2), mark],
            &settings,
            LEVEL_SECONDARY,
        );
        assert!(three < two && two < one);
        // while before the level end a longer run sorts later
        let plain_one = key_of(vec![letter(0)], &settings, LEVEL_SECONDARY);
        let plain_two = key_of(vec![letter(0), letter(1)], &settings, LEVEL_SECONDARY);
        assert!(plain_one < plain_two && plain_two < three);
    }

    #[test]
    fn primary_lead_compression_preserves_order() {
        let settings = CollationSettings::default();
        let digit = ce_from_parts(0x2706 << 16, 0x0500, 0x0500);
        let aa = key_of(vec![letter(0), letter(0)], &settings, LEVEL_PRIMARY);
        let ab = key_of(vec![letter(0), letter(1)], &settings, LEVEL_PRIMARY);
        let a_digit = key_of(vec![letter(0), digit], &settings, LEVEL_PRIMARY);
        // same compressible lead byte is written once
        assert_eq!(aa.len(), 3);
        assert!(aa < ab);
        // a lower lead after the run gets a low terminator, sorting first
        assert!(a_digit < aa);
    }

    #[test]
    fn shifted_variables_move_to_quaternary() {
        let mut settings = CollationSettings::default();
        settings.set_strength(Strength::Quaternary);
        settings.set_variable_top(0x0C00_0000);
        let space = ce_from_parts(0x0500_0000, 0x0500, 0x0500);

        settings.set_shifted(false);
        let plain = key_of(vec![space, letter(0)], &settings, LEVEL_PRIMARY | LEVEL_QUATERNARY);
        settings.set_shifted(true);
        let shifted = key_of(vec![space, letter(0)], &settings, LEVEL_PRIMARY | LEVEL_QUATERNARY);

        // shifted: the space's primary byte disappears from the primary level
        assert_eq!(plain[0], 0x05);
        assert_eq!(shifted[0], 0x29);
        // and reappears on the quaternary level, before the common run
        let sep = shifted.iter().position(|&b| b == LEVEL_SEPARATOR_BYTE).unwrap();
        assert_eq!(shifted[sep + 1], 0x05);
    }

    #[test]
    fn hiragana_sorts_before_katakana_on_quaternary() {
        let settings = CollationSettings::default();
        let data = baked::root_fragment();
        let ka = ce_from_parts(0x7004 << 16, 0x0500, 0x0500);

        let mut kata = FakeCes::new(vec![ka]);
        let mut kata_key = Vec::new();
        write_sort_key_up_to_quaternary(&mut kata, &data, &settings, LEVEL_QUATERNARY, &mut kata_key)
            .unwrap();

        let mut hira = FakeCes::new(vec![ka]);
        hira.hira[0] = true;
        let mut hira_key = Vec::new();
        write_sort_key_up_to_quaternary(&mut hira, &data, &settings, LEVEL_QUATERNARY, &mut hira_key)
            .unwrap();

        assert!(hira_key < kata_key);
        assert_eq!(hira_key[1], QUAT_HIRAGANA_BYTE);
    }

    #[test]
    fn case_level_nibbles() {
        let mut settings = CollationSettings::default();
        settings.set_case_level(true);
        let lower = letter(0);
        let upper = ce_from_parts(0x2904 << 16, 0x0500, 0x8500);

        let ll = key_of(vec![lower, lower], &settings, LEVEL_CASE);
        let lu = key_of(vec![lower, upper], &settings, LEVEL_CASE);
        let ul = key_of(vec![upper, lower], &settings, LEVEL_CASE);
        assert!(ll < lu && lu < ul);

        settings.set_case_first(CaseFirst::Upper);
        let ll = key_of(vec![lower, lower], &settings, LEVEL_CASE);
        let lu = key_of(vec![lower, upper], &settings, LEVEL_CASE);
        let ul = key_of(vec![upper, lower], &settings, LEVEL_CASE);
        assert!(ul < lu && lu < ll);
    }
}
