//! Braille window placement: which rectangle of the screen maps onto the
//! braille cells. Every function here is pure — it computes an intent, the
//! caller (the cursor tracker or a command handler) applies it to a
//! [`core_session::Session`] and re-clamps. Same shape as a scroll-intent
//! calculator: compute, don't mutate.

use core_session::Geometry;

/// Horizontal placement policy: slide centers the window on `x`; paging
/// snaps to the nearest page-aligned column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalPolicy {
    Sliding,
    Paging,
}

/// `placeBrailleWindowHorizontally`: recomputes `winx` so that column `x`
/// is visible, per the configured policy.
pub fn place_horizontally(x: u16, text_count: u16, policy: HorizontalPolicy) -> u16 {
    if text_count == 0 {
        return 0;
    }
    match policy {
        HorizontalPolicy::Sliding => x.saturating_sub(text_count / 2),
        HorizontalPolicy::Paging => (x / text_count) * text_count,
    }
}

/// Right-edge placement, used when the braille window needs its *right*
/// edge (rather than its left edge) aligned to a column — the case for
/// contracted braille, where the number of screen columns per cell run is
/// not fixed. `contracted_length`, when present, is called repeatedly with
/// `text_count` and must report the number of screen columns the next run
/// of cells would cover; `None` means contraction is unavailable and plain
/// page alignment is used.
pub fn place_right_edge(col: u16, text_count: u16, contracted_length: Option<impl Fn(u16) -> u16>) -> u16 {
    if text_count == 0 {
        return 0;
    }
    match contracted_length {
        None => (col / text_count) * text_count,
        Some(get_len) => {
            let mut winx = 0u16;
            loop {
                let len = get_len(text_count);
                if len == 0 {
                    break;
                }
                let next = winx.saturating_add(len);
                if next > col || next == winx {
                    break;
                }
                winx = next;
            }
            winx
        }
    }
}

/// `slideBrailleWindowVertically`: moves `winy` just enough to bring row
/// `y` into view, preferring to keep the window still when `y` is already
/// visible.
pub fn slide_vertically(winy: u16, y: u16, text_rows: u16) -> u16 {
    if y < winy {
        y
    } else if text_rows > 0 && y >= winy + text_rows {
        y - (text_rows - 1)
    } else {
        winy
    }
}

/// `move*`: adjusts `winx` by a raw signed amount, clamped into the
/// session's valid range.
pub fn move_horizontally(winx: u16, delta: i32, geometry: &Geometry) -> u16 {
    let proposed = winx as i32 + delta;
    proposed.clamp(0, geometry.max_winx() as i32) as u16
}

pub fn move_vertically(winy: u16, delta: i32, geometry: &Geometry) -> u16 {
    let proposed = winy as i32 + delta;
    proposed.clamp(0, geometry.max_winy() as i32) as u16
}

/// A word-break character is whitespace that is not the cursor's column.
fn is_word_break(row: &[char], index: u16, cursor_x: Option<u16>) -> bool {
    row.get(index as usize).map(|c| c.is_whitespace()).unwrap_or(false) && cursor_x != Some(index)
}

/// `shiftBrailleWindowRight` in word-wrap mode: rather than jumping a full
/// `text_count` columns (which might land mid-word), scan backward from
/// the naive target for the nearest word-break and land just past it.
pub fn shift_right_word_wrap(row: &[char], winx: u16, text_count: u16, cursor_x: Option<u16>) -> u16 {
    let naive_end = winx.saturating_add(text_count);
    let limit = (row.len() as u16).min(naive_end);
    let mut boundary = naive_end;
    let mut idx = limit;
    while idx > winx {
        idx -= 1;
        if is_word_break(row, idx, cursor_x) {
            boundary = idx + 1;
            break;
        }
    }
    boundary.min(row.len() as u16)
}

/// `shiftBrailleWindowLeft` in word-wrap mode: back up to the previous
/// word-break below `winx`, then skip past any leading whitespace that
/// immediately follows it.
pub fn shift_left_word_wrap(row: &[char], winx: u16, text_count: u16, cursor_x: Option<u16>) -> u16 {
    let naive_start = winx.saturating_sub(text_count);
    let mut boundary = naive_start;
    let mut idx = winx;
    while idx > naive_start {
        idx -= 1;
        if is_word_break(row, idx, cursor_x) {
            boundary = idx;
            break;
        }
    }
    let mut pos = boundary;
    while (pos as usize) < row.len() && is_word_break(row, pos, cursor_x) {
        pos += 1;
    }
    pos
}

/// `shift*` without word wrap (and without contraction): a raw
/// `text_count`-sized hop, still clamped into range.
pub fn shift_by_text_count(winx: u16, text_count: u16, forward: bool, geometry: &Geometry) -> u16 {
    let delta = if forward { text_count as i32 } else { -(text_count as i32) };
    move_horizontally(winx, delta, geometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_centers_on_cursor_column() {
        // Scenario 1: cols=80, textCount=40, posx=50 -> winx = max(50-20,0) = 30.
        assert_eq!(place_horizontally(50, 40, HorizontalPolicy::Sliding), 30);
    }

    #[test]
    fn paging_aligns_to_text_count_multiples() {
        // Scenario 2: textCount=40, posx=50 -> winx = 50/40*40 = 40.
        assert_eq!(place_horizontally(50, 40, HorizontalPolicy::Paging), 40);
    }

    #[test]
    fn paging_result_is_always_a_multiple_of_text_count() {
        for x in 0..200u16 {
            let winx = place_horizontally(x, 40, HorizontalPolicy::Paging);
            assert_eq!(winx % 40, 0);
            assert!(x >= winx && x < winx + 40);
        }
    }

    #[test]
    fn slide_vertically_moves_up_when_above_window() {
        assert_eq!(slide_vertically(10, 3, 5), 3);
    }

    #[test]
    fn slide_vertically_moves_down_when_below_window() {
        assert_eq!(slide_vertically(0, 12, 5), 8); // 12 - (5-1)
    }

    #[test]
    fn slide_vertically_stays_put_when_already_visible() {
        assert_eq!(slide_vertically(4, 6, 5), 4);
    }

    #[test]
    fn shift_right_word_wrap_lands_after_word_boundary() {
        // Scenario 3: "hello world", winx=0, textCount=8 -> winx=6.
        let row: Vec<char> = "hello world".chars().collect();
        assert_eq!(shift_right_word_wrap(&row, 0, 8, None), 6);
    }

    #[test]
    fn shift_right_word_wrap_ignores_cursor_position_as_a_break() {
        let row: Vec<char> = "hello world".chars().collect();
        // Cursor sitting on the space means it's not a valid break point.
        let without_cursor = shift_right_word_wrap(&row, 0, 8, None);
        let with_cursor_on_space = shift_right_word_wrap(&row, 0, 8, Some(5));
        assert_ne!(without_cursor, with_cursor_on_space);
    }

    #[test]
    fn shift_left_word_wrap_skips_leading_whitespace() {
        let row: Vec<char> = "hello world wide web".chars().collect();
        let winx = shift_left_word_wrap(&row, 12, 8, None);
        assert!(row.get(winx as usize).map(|c| !c.is_whitespace()).unwrap_or(true));
    }

    #[test]
    fn right_edge_placement_without_contraction_pages() {
        let no_contraction: Option<fn(u16) -> u16> = None;
        assert_eq!(place_right_edge(85, 40, no_contraction), 80);
    }

    #[test]
    fn right_edge_placement_with_contraction_advances_while_making_progress() {
        // Each contracted run covers 5 columns; advance until exceeding col=17.
        let result = place_right_edge(17, 8, Some(|_: u16| 5u16));
        assert_eq!(result, 15);
    }

    #[test]
    fn move_horizontally_clamps_into_range() {
        let geo = core_session::Geometry { cols: 80, rows: 25, text_rows: 23 };
        assert_eq!(move_horizontally(0, -10, &geo), 0);
        assert_eq!(move_horizontally(70, 100, &geo), geo.max_winx());
    }
}
